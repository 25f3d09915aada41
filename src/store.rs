//! The explicitly constructed store that ties the engine together.
//!
//! `SyncStore` owns one cache, one selection and the coordinators that act on
//! them, all sharing a single gateway. Consumers receive it by reference; there
//! is no process-wide instance.

use crate::bulk::BulkOperationCoordinator;
use crate::cache::ServiceCache;
use crate::config::Config;
use crate::errors::{Result, SyncError};
use crate::gateway::ServiceGateway;
use crate::http::HttpGateway;
use crate::notifications::NotificationSettings;
use crate::scheduler::SyncScheduler;
use crate::selection::SelectionTracker;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct SyncStore {
    cache: Arc<ServiceCache>,
    selection: Arc<SelectionTracker>,
    bulk: BulkOperationCoordinator,
    notifications: NotificationSettings,
}

impl SyncStore {
    pub fn new(gateway: Arc<dyn ServiceGateway>) -> Self {
        let selection = Arc::new(SelectionTracker::new());
        let cache = Arc::new(ServiceCache::new(gateway.clone(), selection.clone()));
        let bulk = BulkOperationCoordinator::new(gateway.clone(), cache.clone(), selection.clone());
        let notifications = NotificationSettings::new(gateway);
        Self {
            cache,
            selection,
            bulk,
            notifications,
        }
    }

    /// Build a store talking HTTP to `config.api_url`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let gateway = HttpGateway::new(&config.api_url, config.http_timeout)?;
        Ok(Self::new(Arc::new(gateway)))
    }

    pub fn cache(&self) -> &Arc<ServiceCache> {
        &self.cache
    }

    pub fn selection(&self) -> &SelectionTracker {
        &self.selection
    }

    pub fn bulk(&self) -> &BulkOperationCoordinator {
        &self.bulk
    }

    pub fn notifications(&self) -> &NotificationSettings {
        &self.notifications
    }

    /// Toggle `id` in the selection. Ids that are not cached cannot be
    /// selected.
    pub async fn toggle_selection(&self, id: &str) -> Result<bool> {
        self.cache
            .with_records(|records, selection| {
                if records.iter().any(|r| r.id == id) {
                    Ok(selection.toggle(id))
                } else {
                    Err(SyncError::not_found(format!("service {id} is not loaded")))
                }
            })
            .await
    }

    /// Select every cached record. Returns the selection size.
    pub async fn select_all(&self) -> usize {
        let selected = self
            .cache
            .with_records(|records, selection| {
                selection.select_all(records.iter().map(|r| r.id.clone()))
            })
            .await;
        debug!(selected, "selected all services");
        selected
    }

    pub fn clear_selection(&self) {
        self.selection.clear();
    }

    /// A scheduler refreshing this store's cache every `period`.
    pub fn scheduler(&self, period: Duration) -> SyncScheduler {
        SyncScheduler::new(self.cache.clone(), period)
    }
}
