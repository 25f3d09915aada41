//! In-memory view of the remote service collection.
//!
//! DESIGN
//! ======
//! `ServiceCache` is the only writer of the record list. A refresh replaces
//! the list wholesale; single-record mutations patch it from the gateway's
//! response without refetching.
//!
//! Every refresh draws a ticket from a monotonically increasing counter. A
//! response may only be applied if no newer refresh is still live and no
//! newer refresh or local patch has settled. Successful local patches settle
//! a fresh ticket, so neither an older overlapping refresh nor a refresh
//! issued before a patch can overwrite newer state. A refresh that is
//! dropped before it settles gives up its ticket and blocks nobody.
//!
//! No lock is held across a gateway call. Once the state lock is taken the
//! apply step runs to completion without awaiting, which makes dropping an
//! in-flight refresh (scheduler shutdown) safe at any point.

use crate::errors::{Result, SyncError};
use crate::gateway::ServiceGateway;
use crate::record::{ServiceInput, ServiceRecord, ServiceStatus};
use crate::selection::SelectionTracker;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct CacheState {
    records: Vec<ServiceRecord>,
    error: Option<String>,
}

/// Point-in-time copy of everything a view renders.
#[derive(Debug, Clone, Default)]
pub struct CacheSnapshot {
    pub records: Vec<ServiceRecord>,
    pub loading: bool,
    pub error: Option<String>,
}

/// Result of a refresh that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The response replaced the record list; carries the new length.
    Applied(usize),
    /// A newer refresh or local patch was issued meanwhile; the response was
    /// discarded.
    Superseded,
}

pub struct ServiceCache {
    gateway: Arc<dyn ServiceGateway>,
    selection: Arc<SelectionTracker>,
    state: RwLock<CacheState>,
    tickets: Mutex<Tickets>,
}

#[derive(Debug, Default)]
struct Tickets {
    last_issued: u64,
    /// Highest ticket whose refresh completed or that a local patch took.
    settled: u64,
    /// Refreshes issued but not yet settled or dropped.
    live: BTreeSet<u64>,
}

impl Tickets {
    fn issue(&mut self) -> u64 {
        self.last_issued += 1;
        self.live.insert(self.last_issued);
        self.last_issued
    }

    /// Retire `ticket` and report whether its response may still be applied.
    fn settle(&mut self, ticket: u64) -> bool {
        self.live.remove(&ticket);
        let current = ticket > self.settled && self.live.range(ticket + 1..).next().is_none();
        if current {
            self.settled = ticket;
        }
        current
    }

    /// Claim a ticket newer than every refresh issued so far.
    fn invalidate(&mut self) {
        self.last_issued += 1;
        self.settled = self.last_issued;
    }
}

/// Holds a refresh ticket; dropping it unsettled releases the ticket, which
/// also covers the refresh future itself being dropped mid-call.
struct RefreshTicket<'a> {
    tickets: &'a Mutex<Tickets>,
    ticket: u64,
}

impl<'a> RefreshTicket<'a> {
    fn issue(tickets: &'a Mutex<Tickets>) -> Self {
        let ticket = tickets.lock().issue();
        Self { tickets, ticket }
    }

    fn settle(&self) -> bool {
        self.tickets.lock().settle(self.ticket)
    }
}

impl Drop for RefreshTicket<'_> {
    fn drop(&mut self) {
        self.tickets.lock().live.remove(&self.ticket);
    }
}

impl ServiceCache {
    pub fn new(gateway: Arc<dyn ServiceGateway>, selection: Arc<SelectionTracker>) -> Self {
        Self {
            gateway,
            selection,
            state: RwLock::new(CacheState::default()),
            tickets: Mutex::new(Tickets::default()),
        }
    }

    /// Refetch the full list and replace `records` with it.
    ///
    /// On failure the previous records stay available and `error` is set.
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        let guard = RefreshTicket::issue(&self.tickets);
        let ticket = guard.ticket;
        debug!(ticket, "refreshing service list");

        let response = self.gateway.list().await;

        let mut state = self.state.write().await;
        if !guard.settle() {
            debug!(ticket, "discarding superseded refresh response");
            return Ok(RefreshOutcome::Superseded);
        }

        match response {
            Ok(records) => {
                let count = records.len();
                state.records = records;
                state.error = None;
                self.selection
                    .reconcile(state.records.iter().map(|r| r.id.as_str()));
                debug!(ticket, count, "service list refreshed");
                Ok(RefreshOutcome::Applied(count))
            }
            Err(e) => {
                warn!(ticket, "failed to refresh service list: {}", e);
                state.error = Some(e.user_message());
                Err(e)
            }
        }
    }

    /// Validate, create on the server, then append the returned record.
    pub async fn create(&self, data: ServiceInput) -> Result<ServiceRecord> {
        data.validate()?;

        let created = match self.gateway.create(&data).await {
            Ok(record) => record,
            Err(e) => return Err(self.record_failure(e).await),
        };

        let mut state = self.state.write().await;
        state.records.push(created.clone());
        self.invalidate_refreshes();
        info!(id = %created.id, name = %created.name, "service created");
        Ok(created)
    }

    /// Validate, update on the server, then replace the record in place.
    pub async fn update(&self, id: &str, data: ServiceInput) -> Result<ServiceRecord> {
        data.validate()?;

        let updated = match self.gateway.update(id, &data).await {
            Ok(record) => record,
            Err(e) => return Err(self.record_failure(e).await),
        };

        let mut state = self.state.write().await;
        match state.records.iter_mut().find(|r| r.id == id) {
            Some(slot) => {
                *slot = updated.clone();
                self.invalidate_refreshes();
                info!(id, "service updated");
            }
            // Removed locally while the call was in flight; the next refresh
            // brings it back if it still exists.
            None => debug!(id, "updated service is no longer cached"),
        }
        Ok(updated)
    }

    /// Delete on the server, then drop the record and its selection.
    pub async fn delete(&self, id: &str) -> Result<()> {
        if let Err(e) = self.gateway.delete(id).await {
            return Err(self.record_failure(e).await);
        }

        let mut state = self.state.write().await;
        state.records.retain(|r| r.id != id);
        self.selection.remove(id);
        self.invalidate_refreshes();
        info!(id, "service deleted");
        Ok(())
    }

    /// Fetch the live status report for one service. Does not touch the cache.
    pub async fn status(&self, id: &str) -> Result<ServiceStatus> {
        self.gateway.status(id).await
    }

    /// Append records the gateway reported as created.
    pub(crate) async fn append_local(&self, records: Vec<ServiceRecord>) {
        let mut state = self.state.write().await;
        debug!(count = records.len(), "appending created services");
        state.records.extend(records);
        self.invalidate_refreshes();
    }

    /// Drop records the gateway reported as deleted.
    pub(crate) async fn remove_local(&self, ids: &[String]) -> usize {
        let doomed: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut state = self.state.write().await;
        let before = state.records.len();
        state.records.retain(|r| !doomed.contains(r.id.as_str()));
        self.selection
            .reconcile(state.records.iter().map(|r| r.id.as_str()));
        self.invalidate_refreshes();
        before - state.records.len()
    }

    pub async fn snapshot(&self) -> CacheSnapshot {
        let state = self.state.read().await;
        CacheSnapshot {
            records: state.records.clone(),
            loading: self.loading(),
            error: state.error.clone(),
        }
    }

    pub async fn records(&self) -> Vec<ServiceRecord> {
        self.state.read().await.records.clone()
    }

    pub async fn get(&self, id: &str) -> Option<ServiceRecord> {
        let state = self.state.read().await;
        state.records.iter().find(|r| r.id == id).cloned()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.state.read().await.records.iter().any(|r| r.id == id)
    }

    pub async fn ids(&self) -> Vec<String> {
        let state = self.state.read().await;
        state.records.iter().map(|r| r.id.clone()).collect()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.records.is_empty()
    }

    /// True while at least one refresh is in flight.
    pub fn loading(&self) -> bool {
        !self.tickets.lock().live.is_empty()
    }

    pub async fn error(&self) -> Option<String> {
        self.state.read().await.error.clone()
    }

    /// Run `f` against the records and the selection while no mutation can
    /// interleave.
    pub(crate) async fn with_records<T>(
        &self,
        f: impl FnOnce(&[ServiceRecord], &SelectionTracker) -> T,
    ) -> T {
        let state = self.state.read().await;
        f(&state.records, &self.selection)
    }

    fn invalidate_refreshes(&self) {
        self.tickets.lock().invalidate();
    }

    /// Surface a failed mutation through `error`. Validation failures never
    /// reached the server and are passed through untouched.
    async fn record_failure(&self, err: SyncError) -> SyncError {
        if err.is_remote() {
            warn!("service mutation failed: {}", err);
            self.state.write().await.error = Some(err.user_message());
        }
        err
    }
}
