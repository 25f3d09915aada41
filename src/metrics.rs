//! Call statistics for any gateway

use crate::errors::Result;
use crate::gateway::ServiceGateway;
use crate::record::{
    BulkUpdateItem, NotificationConfig, ServiceInput, ServiceRecord, ServiceStatus,
};
use async_trait::async_trait;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Gateway decorator that records attempts, outcomes and durations
#[derive(Debug)]
pub struct MeteredGateway<G> {
    inner: G,
    metrics: GatewayMetrics,
}

impl<G: ServiceGateway> MeteredGateway<G> {
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            metrics: GatewayMetrics::default(),
        }
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    /// Get gateway metrics
    pub async fn metrics(&self) -> GatewayMetricsSnapshot {
        self.metrics.snapshot().await
    }

    /// Reset metrics
    pub async fn reset_metrics(&self) {
        self.metrics.reset().await;
    }

    async fn track<T, F>(&self, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let start_time = Instant::now();
        let result = call.await;
        self.metrics.record(result.is_ok(), start_time.elapsed()).await;
        result
    }
}

#[async_trait]
impl<G: ServiceGateway> ServiceGateway for MeteredGateway<G> {
    async fn list(&self) -> Result<Vec<ServiceRecord>> {
        self.track(self.inner.list()).await
    }

    async fn create(&self, data: &ServiceInput) -> Result<ServiceRecord> {
        self.track(self.inner.create(data)).await
    }

    async fn update(&self, id: &str, data: &ServiceInput) -> Result<ServiceRecord> {
        self.track(self.inner.update(id, data)).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.track(self.inner.delete(id)).await
    }

    async fn status(&self, id: &str) -> Result<ServiceStatus> {
        self.track(self.inner.status(id)).await
    }

    async fn bulk_create(&self, data: &[ServiceInput]) -> Result<Vec<ServiceRecord>> {
        self.track(self.inner.bulk_create(data)).await
    }

    async fn bulk_update(&self, updates: &[BulkUpdateItem]) -> Result<()> {
        self.track(self.inner.bulk_update(updates)).await
    }

    async fn bulk_delete(&self, ids: &[String]) -> Result<()> {
        self.track(self.inner.bulk_delete(ids)).await
    }

    async fn notification_config(&self) -> Result<NotificationConfig> {
        self.track(self.inner.notification_config()).await
    }

    async fn update_notification_config(&self, config: &NotificationConfig) -> Result<()> {
        self.track(self.inner.update_notification_config(config)).await
    }
}

#[derive(Debug, Default)]
struct GatewayMetrics {
    counters: RwLock<Counters>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    attempts: u64,
    successes: u64,
    failures: u64,
    total_duration: Duration,
    min_duration: Option<Duration>,
    max_duration: Option<Duration>,
}

impl GatewayMetrics {
    async fn record(&self, success: bool, duration: Duration) {
        let mut counters = self.counters.write().await;
        counters.attempts += 1;
        if success {
            counters.successes += 1;
        } else {
            counters.failures += 1;
        }
        counters.total_duration += duration;
        counters.min_duration = Some(counters.min_duration.map_or(duration, |m| m.min(duration)));
        counters.max_duration = Some(counters.max_duration.map_or(duration, |m| m.max(duration)));
    }

    async fn snapshot(&self) -> GatewayMetricsSnapshot {
        self.counters.read().await.snapshot()
    }

    async fn reset(&self) {
        *self.counters.write().await = Counters::default();
    }
}

impl Counters {
    fn snapshot(&self) -> GatewayMetricsSnapshot {
        let success_rate = if self.attempts > 0 {
            (self.successes as f64 / self.attempts as f64) * 100.0
        } else {
            0.0
        };

        let avg_duration_ms = if self.attempts > 0 {
            (self.total_duration.as_millis() / u128::from(self.attempts)) as u64
        } else {
            0
        };

        GatewayMetricsSnapshot {
            attempts: self.attempts,
            successes: self.successes,
            failures: self.failures,
            success_rate,
            avg_duration_ms,
            min_duration_ms: self.min_duration.map(|d| d.as_millis() as u64),
            max_duration_ms: self.max_duration.map(|d| d.as_millis() as u64),
        }
    }
}

/// Snapshot of gateway metrics
#[derive(Debug, Clone)]
pub struct GatewayMetricsSnapshot {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub success_rate: f64,
    pub avg_duration_ms: u64,
    pub min_duration_ms: Option<u64>,
    pub max_duration_ms: Option<u64>,
}
