//! Multi-record mutations.
//!
//! Each bulk call is one request with all-or-nothing semantics at the client
//! boundary: on success every id in the request was processed and the local
//! state is brought in line; on failure neither the cache nor the selection
//! changes and the error is returned unchanged. The cache is never updated
//! speculatively before the gateway answers.

use crate::cache::ServiceCache;
use crate::errors::Result;
use crate::gateway::ServiceGateway;
use crate::record::{
    BulkUpdateItem, ServiceInput, ServiceRecord, validate_bulk_size, validate_interval,
};
use crate::selection::SelectionTracker;
use std::sync::Arc;
use tracing::{info, warn};

pub struct BulkOperationCoordinator {
    gateway: Arc<dyn ServiceGateway>,
    cache: Arc<ServiceCache>,
    selection: Arc<SelectionTracker>,
}

impl BulkOperationCoordinator {
    pub fn new(
        gateway: Arc<dyn ServiceGateway>,
        cache: Arc<ServiceCache>,
        selection: Arc<SelectionTracker>,
    ) -> Self {
        Self {
            gateway,
            cache,
            selection,
        }
    }

    /// Set `new_interval` on every selected record.
    ///
    /// On success the cache is refetched (the server's copy is authoritative
    /// for the updated records) and the selection is cleared. A failing
    /// refresh afterwards does not fail the bulk call; it is reported through
    /// the cache's error slot like any refresh failure. Returns the number of
    /// records updated.
    pub async fn bulk_update_interval(&self, new_interval: u32) -> Result<usize> {
        validate_interval(new_interval)?;

        let updates: Vec<BulkUpdateItem> = self
            .cache
            .with_records(|records, selection| {
                records
                    .iter()
                    .filter(|r| selection.contains(&r.id))
                    .map(|r| BulkUpdateItem::retimed(r, new_interval))
                    .collect()
            })
            .await;
        validate_bulk_size(updates.len())?;

        if let Err(e) = self.gateway.bulk_update(&updates).await {
            warn!(count = updates.len(), "bulk interval update failed: {}", e);
            return Err(e);
        }
        info!(count = updates.len(), new_interval, "bulk interval update applied");

        if let Err(e) = self.cache.refresh().await {
            warn!("refresh after bulk update failed: {}", e);
        }
        self.selection.clear();
        Ok(updates.len())
    }

    /// Delete `ids` in one request, then drop them from the cache and clear
    /// the selection. Returns how many cached records were removed.
    pub async fn bulk_delete(&self, ids: &[String]) -> Result<usize> {
        validate_bulk_size(ids.len())?;

        if let Err(e) = self.gateway.bulk_delete(ids).await {
            warn!(count = ids.len(), "bulk delete failed: {}", e);
            return Err(e);
        }

        let removed = self.cache.remove_local(ids).await;
        self.selection.clear();
        info!(requested = ids.len(), removed, "bulk delete applied");
        Ok(removed)
    }

    /// Delete whatever is currently selected.
    pub async fn bulk_delete_selected(&self) -> Result<usize> {
        let ids = self.selection.ids();
        self.bulk_delete(&ids).await
    }

    /// Validate every input, create them in one request and append the
    /// returned records. The selection is left alone.
    pub async fn bulk_create(&self, inputs: &[ServiceInput]) -> Result<Vec<ServiceRecord>> {
        validate_bulk_size(inputs.len())?;
        for input in inputs {
            input.validate()?;
        }

        let created = match self.gateway.bulk_create(inputs).await {
            Ok(created) => created,
            Err(e) => {
                warn!(count = inputs.len(), "bulk create failed: {}", e);
                return Err(e);
            }
        };

        self.cache.append_local(created.clone()).await;
        info!(count = created.len(), "bulk create applied");
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SyncError;
    use crate::record::fixtures::record;
    use crate::testing::{Call, MockGateway};

    struct Fixture {
        mock: Arc<MockGateway>,
        cache: Arc<ServiceCache>,
        selection: Arc<SelectionTracker>,
        bulk: BulkOperationCoordinator,
    }

    async fn fixture(records: Vec<ServiceRecord>) -> Fixture {
        let mock = Arc::new(MockGateway::with_records(records));
        let gateway: Arc<dyn ServiceGateway> = mock.clone();
        let selection = Arc::new(SelectionTracker::new());
        let cache = Arc::new(ServiceCache::new(gateway.clone(), selection.clone()));
        cache.refresh().await.unwrap();
        let bulk = BulkOperationCoordinator::new(gateway, cache.clone(), selection.clone());
        Fixture {
            mock,
            cache,
            selection,
            bulk,
        }
    }

    #[tokio::test]
    async fn test_bulk_update_interval_sends_one_request_then_refreshes() {
        let f = fixture(vec![record("1", 60)]).await;
        f.selection.toggle("1");

        assert_eq!(f.bulk.bulk_update_interval(120).await.unwrap(), 1);

        assert_eq!(
            f.mock.mutation_calls(),
            vec![Call::BulkUpdate(vec![BulkUpdateItem {
                id: "1".into(),
                name: "service-1".into(),
                url: "https://1.example.com/health".into(),
                interval: 120,
            }])]
        );
        // One refresh from the fixture, one after the bulk call.
        assert_eq!(f.mock.list_calls(), 2);
        assert_eq!(f.cache.get("1").await.unwrap().interval, 120);
        assert!(f.selection.is_empty());
    }

    #[tokio::test]
    async fn test_bulk_update_only_touches_selected_records() {
        let f = fixture(vec![record("1", 60), record("2", 60), record("3", 60)]).await;
        f.selection.select_all(["1", "3"]);

        f.bulk.bulk_update_interval(900).await.unwrap();

        let Call::BulkUpdate(items) = &f.mock.mutation_calls()[0] else {
            panic!("expected a bulk update");
        };
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(f.cache.get("2").await.unwrap().interval, 60);
    }

    #[tokio::test]
    async fn test_bulk_update_rejects_bad_interval_and_empty_selection() {
        let f = fixture(vec![record("1", 60)]).await;

        f.selection.toggle("1");
        assert!(f.bulk.bulk_update_interval(10).await.unwrap_err().is_validation());
        assert!(f.bulk.bulk_update_interval(7200).await.unwrap_err().is_validation());
        assert!(f.selection.contains("1"));

        f.selection.clear();
        assert!(f.bulk.bulk_update_interval(120).await.unwrap_err().is_validation());

        assert!(f.mock.mutation_calls().is_empty());
    }

    #[tokio::test]
    async fn test_bulk_update_failure_leaves_everything_untouched() {
        let f = fixture(vec![record("1", 60), record("2", 60)]).await;
        f.selection.select_all(["1", "2"]);
        f.mock.fail_next_call("Failed to persist updates: disk full");

        let err = f.bulk.bulk_update_interval(120).await.unwrap_err();

        assert_eq!(err.to_string(), "Failed to persist updates: disk full");
        assert_eq!(f.selection.len(), 2);
        assert_eq!(f.mock.list_calls(), 1);
        assert_eq!(f.cache.get("1").await.unwrap().interval, 60);
        assert!(f.cache.error().await.is_none());
    }

    #[tokio::test]
    async fn test_bulk_update_refresh_failure_still_clears_selection() {
        let f = fixture(vec![record("1", 60)]).await;
        f.selection.toggle("1");
        f.mock.fail_next_list("Network Error");

        assert_eq!(f.bulk.bulk_update_interval(120).await.unwrap(), 1);
        assert!(f.selection.is_empty());
        assert_eq!(f.cache.error().await.as_deref(), Some("Network Error"));
    }

    #[tokio::test]
    async fn test_bulk_delete_patches_cache_without_refetch() {
        let f = fixture(vec![record("A", 60), record("B", 60), record("C", 60)]).await;
        f.selection.select_all(["A", "B"]);

        let removed = f
            .bulk
            .bulk_delete(&["A".to_string(), "B".to_string()])
            .await
            .unwrap();

        assert_eq!(removed, 2);
        assert_eq!(f.cache.ids().await, vec!["C"]);
        assert!(f.selection.is_empty());
        assert_eq!(f.mock.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_bulk_delete_unknown_id_is_all_or_nothing() {
        let f = fixture(vec![record("A", 60), record("B", 60)]).await;
        f.selection.select_all(["A"]);

        let err = f
            .bulk
            .bulk_delete(&["A".to_string(), "ghost".to_string()])
            .await
            .unwrap_err();

        match err {
            SyncError::NotFound { missing_ids, .. } => assert_eq!(missing_ids, vec!["ghost"]),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(f.cache.len().await, 2);
        assert!(f.selection.contains("A"));
        assert!(f.cache.error().await.is_none());
        assert_eq!(f.mock.server_records().len(), 2);
    }

    #[tokio::test]
    async fn test_bulk_delete_selected_uses_current_selection() {
        let f = fixture(vec![record("A", 60), record("B", 60)]).await;
        f.selection.toggle("B");

        assert_eq!(f.bulk.bulk_delete_selected().await.unwrap(), 1);
        assert_eq!(f.cache.ids().await, vec!["A"]);
        assert_eq!(f.mock.mutation_calls(), vec![Call::BulkDelete(vec!["B".into()])]);
    }

    #[tokio::test]
    async fn test_bulk_create_validates_every_input_first() {
        let f = fixture(vec![]).await;

        let inputs = vec![
            ServiceInput::new("ok", "https://ok.example.com", 60),
            ServiceInput::new("bad", "https://bad.example.com", 5),
        ];
        assert!(f.bulk.bulk_create(&inputs).await.unwrap_err().is_validation());
        assert!(f.mock.mutation_calls().is_empty());

        let inputs = vec![
            ServiceInput::new("one", "https://one.example.com", 60),
            ServiceInput::new("two", "https://two.example.com", 120),
        ];
        let created = f.bulk.bulk_create(&inputs).await.unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(f.cache.records().await, created);
    }
}
