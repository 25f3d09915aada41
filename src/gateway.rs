//! Contract of the remote service collection.
//!
//! The engine only ever talks to the backend through [`ServiceGateway`], so
//! the cache, scheduler and bulk coordinator can be driven by the HTTP
//! implementation in production and by a scripted double in tests.

use crate::errors::Result;
use crate::record::{
    BulkUpdateItem, NotificationConfig, ServiceInput, ServiceRecord, ServiceStatus,
};
use async_trait::async_trait;

#[async_trait]
pub trait ServiceGateway: Send + Sync {
    /// Full record list, in server order.
    async fn list(&self) -> Result<Vec<ServiceRecord>>;

    /// Server assigns `id`, `status = unknown` and no `lastChecked`.
    async fn create(&self, data: &ServiceInput) -> Result<ServiceRecord>;

    async fn update(&self, id: &str, data: &ServiceInput) -> Result<ServiceRecord>;

    async fn delete(&self, id: &str) -> Result<()>;

    async fn status(&self, id: &str) -> Result<ServiceStatus>;

    /// All-or-nothing; returns the created records.
    async fn bulk_create(&self, data: &[ServiceInput]) -> Result<Vec<ServiceRecord>>;

    /// All-or-nothing.
    async fn bulk_update(&self, updates: &[BulkUpdateItem]) -> Result<()>;

    /// All-or-nothing.
    async fn bulk_delete(&self, ids: &[String]) -> Result<()>;

    async fn notification_config(&self) -> Result<NotificationConfig>;

    async fn update_notification_config(&self, config: &NotificationConfig) -> Result<()>;
}
