//! Last known notification settings.

use crate::errors::Result;
use crate::gateway::ServiceGateway;
use crate::record::NotificationConfig;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::{info, warn};

pub struct NotificationSettings {
    gateway: Arc<dyn ServiceGateway>,
    config: RwLock<NotificationConfig>,
    in_flight: AtomicUsize,
}

/// Counts a gateway call as in flight until dropped, including when the
/// calling future is dropped mid-call.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl NotificationSettings {
    pub fn new(gateway: Arc<dyn ServiceGateway>) -> Self {
        Self {
            gateway,
            config: RwLock::new(NotificationConfig::default()),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Load the settings from the server.
    ///
    /// A failure is logged and the previously known settings are kept; the
    /// error is still returned so one-shot callers can report it.
    pub async fn fetch(&self) -> Result<NotificationConfig> {
        let response = {
            let _in_flight = InFlight::enter(&self.in_flight);
            self.gateway.notification_config().await
        };

        match response {
            Ok(config) => {
                *self.config.write().await = config.clone();
                Ok(config)
            }
            Err(e) => {
                warn!("failed to load notification settings: {}", e);
                Err(e)
            }
        }
    }

    /// Write `config` through to the server. The local copy changes only when
    /// the server accepted it.
    pub async fn update(&self, config: NotificationConfig) -> Result<()> {
        let response = {
            let _in_flight = InFlight::enter(&self.in_flight);
            self.gateway.update_notification_config(&config).await
        };

        if let Err(e) = response {
            warn!("failed to save notification settings: {}", e);
            return Err(e);
        }
        info!(enabled = config.enabled, "notification settings saved");
        *self.config.write().await = config;
        Ok(())
    }

    pub async fn config(&self) -> NotificationConfig {
        self.config.read().await.clone()
    }

    /// True while any fetch or update is in flight.
    pub fn loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }
}
