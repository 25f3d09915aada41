//! Scripted in-memory gateway for unit tests.
//!
//! Behaves like the real backend (ids assigned on create, 404 for unknown
//! ids, bulk calls rejected as a whole when any id is missing) and records
//! every call so tests can assert what reached the wire.

use crate::errors::{Result, SyncError};
use crate::gateway::ServiceGateway;
use crate::record::{
    BulkUpdateItem, Health, NotificationConfig, ServiceInput, ServiceRecord, ServiceStatus,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::{Notify, oneshot};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    List,
    Create(ServiceInput),
    Update(String, ServiceInput),
    Delete(String),
    Status(String),
    BulkCreate(Vec<ServiceInput>),
    BulkUpdate(Vec<BulkUpdateItem>),
    BulkDelete(Vec<String>),
    GetNotifications,
    UpdateNotifications(NotificationConfig),
}

#[derive(Default)]
struct MockState {
    records: Vec<ServiceRecord>,
    notification: NotificationConfig,
    calls: Vec<Call>,
    list_failures: VecDeque<String>,
    list_gates: VecDeque<oneshot::Receiver<()>>,
    call_failures: VecDeque<String>,
    notification_gates: VecDeque<oneshot::Receiver<()>>,
}

#[derive(Default)]
pub struct MockGateway {
    state: Mutex<MockState>,
    list_started: Notify,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<ServiceRecord>) -> Self {
        let gateway = Self::default();
        gateway.state.lock().records = records;
        gateway
    }

    /// Replace the server-side collection, as another client would.
    pub fn set_server_records(&self, records: Vec<ServiceRecord>) {
        self.state.lock().records = records;
    }

    pub fn server_records(&self) -> Vec<ServiceRecord> {
        self.state.lock().records.clone()
    }

    pub fn fail_next_list(&self, message: &str) {
        self.state.lock().list_failures.push_back(message.to_string());
    }

    /// Fail the next non-list call with a 500.
    pub fn fail_next_call(&self, message: &str) {
        self.state.lock().call_failures.push_back(message.to_string());
    }

    /// The next `list()` snapshots the collection immediately but does not
    /// return until the sender fires (or is dropped).
    pub fn gate_next_list(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.state.lock().list_gates.push_back(rx);
        tx
    }

    /// The next notification settings call waits for the sender before it
    /// reaches the server.
    pub fn gate_next_notification_call(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.state.lock().notification_gates.push_back(rx);
        tx
    }

    async fn pass_notification_gate(&self) {
        let gate = self.state.lock().notification_gates.pop_front();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
    }

    /// Resolves once a `list()` call has taken its snapshot.
    pub async fn list_started(&self) {
        self.list_started.notified().await;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, Call::List)).count()
    }

    /// Calls other than `list()`, in order.
    pub fn mutation_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, Call::List))
            .collect()
    }

    fn begin(&self, call: Call) -> Result<parking_lot::MutexGuard<'_, MockState>> {
        let mut state = self.state.lock();
        state.calls.push(call);
        if let Some(message) = state.call_failures.pop_front() {
            return Err(SyncError::gateway(Some(500), message));
        }
        Ok(state)
    }
}

fn missing(ids: Vec<String>) -> SyncError {
    SyncError::NotFound {
        message: "Some services not found".to_string(),
        missing_ids: ids,
    }
}

fn new_record(input: &ServiceInput) -> ServiceRecord {
    ServiceRecord {
        id: uuid::Uuid::new_v4().to_string(),
        name: input.name.clone(),
        url: input.url.clone(),
        interval: input.interval,
        status: Health::Unknown,
        last_checked: None,
        created_at: Some(chrono::Utc::now()),
        updated_at: Some(chrono::Utc::now()),
        went_offline_at: None,
        consecutive_failures: 0,
    }
}

#[async_trait]
impl ServiceGateway for MockGateway {
    async fn list(&self) -> Result<Vec<ServiceRecord>> {
        let (gate, snapshot) = {
            let mut state = self.state.lock();
            state.calls.push(Call::List);
            if let Some(message) = state.list_failures.pop_front() {
                return Err(SyncError::gateway(None, message));
            }
            (state.list_gates.pop_front(), state.records.clone())
        };

        self.list_started.notify_one();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        Ok(snapshot)
    }

    async fn create(&self, data: &ServiceInput) -> Result<ServiceRecord> {
        let mut state = self.begin(Call::Create(data.clone()))?;
        let record = new_record(data);
        state.records.push(record.clone());
        Ok(record)
    }

    async fn update(&self, id: &str, data: &ServiceInput) -> Result<ServiceRecord> {
        let mut state = self.begin(Call::Update(id.to_string(), data.clone()))?;
        let record = state
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| SyncError::not_found("service not found"))?;
        record.name = data.name.clone();
        record.url = data.url.clone();
        record.interval = data.interval;
        Ok(record.clone())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut state = self.begin(Call::Delete(id.to_string()))?;
        let before = state.records.len();
        state.records.retain(|r| r.id != id);
        if state.records.len() == before {
            return Err(SyncError::not_found("service not found"));
        }
        Ok(())
    }

    async fn status(&self, id: &str) -> Result<ServiceStatus> {
        let state = self.begin(Call::Status(id.to_string()))?;
        let record = state
            .records
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| SyncError::not_found("service not found"))?;
        Ok(ServiceStatus {
            service_id: record.id.clone(),
            status: record.status,
            last_checked: record.last_checked,
            response_time: 0,
            error: None,
        })
    }

    async fn bulk_create(&self, data: &[ServiceInput]) -> Result<Vec<ServiceRecord>> {
        let mut state = self.begin(Call::BulkCreate(data.to_vec()))?;
        let created: Vec<ServiceRecord> = data.iter().map(new_record).collect();
        state.records.extend(created.iter().cloned());
        Ok(created)
    }

    async fn bulk_update(&self, updates: &[BulkUpdateItem]) -> Result<()> {
        let mut state = self.begin(Call::BulkUpdate(updates.to_vec()))?;
        let unknown: Vec<String> = updates
            .iter()
            .filter(|u| !state.records.iter().any(|r| r.id == u.id))
            .map(|u| u.id.clone())
            .collect();
        if !unknown.is_empty() {
            return Err(missing(unknown));
        }
        for update in updates {
            if let Some(record) = state.records.iter_mut().find(|r| r.id == update.id) {
                record.name = update.name.clone();
                record.url = update.url.clone();
                record.interval = update.interval;
            }
        }
        Ok(())
    }

    async fn bulk_delete(&self, ids: &[String]) -> Result<()> {
        let mut state = self.begin(Call::BulkDelete(ids.to_vec()))?;
        let unknown: Vec<String> = ids
            .iter()
            .filter(|id| !state.records.iter().any(|r| &r.id == *id))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(missing(unknown));
        }
        state.records.retain(|r| !ids.contains(&r.id));
        Ok(())
    }

    async fn notification_config(&self) -> Result<NotificationConfig> {
        self.pass_notification_gate().await;
        let state = self.begin(Call::GetNotifications)?;
        Ok(state.notification.clone())
    }

    async fn update_notification_config(&self, config: &NotificationConfig) -> Result<()> {
        self.pass_notification_gate().await;
        let mut state = self.begin(Call::UpdateNotifications(config.clone()))?;
        state.notification = config.clone();
        Ok(())
    }
}
