//! Uptime Monitor Sync Library
//!
//! This library keeps a local, consistent view of the services registered
//! with an uptime monitor backend: a refreshable cache, a multi-record
//! selection, bulk mutations and a periodic background refresh.

pub mod config;
pub mod errors;
pub mod record;
pub mod gateway;
pub mod http;
pub mod metrics;
pub mod cache;
pub mod selection;
pub mod scheduler;
pub mod bulk;
pub mod notifications;
pub mod store;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use errors::{Result, SyncError};
pub use gateway::ServiceGateway;
pub use http::HttpGateway;
pub use metrics::{GatewayMetricsSnapshot, MeteredGateway};
pub use cache::{CacheSnapshot, RefreshOutcome, ServiceCache};
pub use selection::SelectionTracker;
pub use scheduler::{DEFAULT_REFRESH_PERIOD, SyncScheduler};
pub use bulk::BulkOperationCoordinator;
pub use notifications::NotificationSettings;
pub use record::{
    BulkUpdateItem, Health, NotificationConfig, ServiceInput, ServiceRecord, ServiceStatus,
};
pub use store::SyncStore;
