//! HTTP implementation of the service gateway

use crate::errors::{Result, SyncError};
use crate::gateway::ServiceGateway;
use crate::record::{
    BulkCreateRequest, BulkDeleteRequest, BulkOperationResponse, BulkUpdateItem,
    BulkUpdateRequest, NotificationConfig, ServiceInput, ServiceRecord, ServiceStatus,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};
use url::Url;

/// Gateway backed by the monitor's REST API
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

/// Error body shape used by every backend handler.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    missing_ids: Vec<String>,
}

impl HttpGateway {
    /// Create a new HTTP gateway rooted at `base_url` (e.g. `http://host:8080/api`)
    pub fn new(base_url: &str, http_timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| SyncError::Config(format!("invalid API url '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(SyncError::Config(format!(
                "API url '{base_url}' cannot be used as a base"
            )));
        }

        let client = Client::builder()
            .timeout(http_timeout)
            .user_agent(format!("uptime_sync/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url,
            timeout: http_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Send a request, enforcing the per-call timeout and mapping failures
    async fn execute(&self, request: RequestBuilder) -> Result<Response> {
        let response = timeout(self.timeout, request.send())
            .await
            .map_err(|_| {
                SyncError::gateway(
                    None,
                    format!("timeout of {}ms exceeded", self.timeout.as_millis()),
                )
            })??;

        Self::handle_response(response).await
    }

    async fn execute_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.execute(request).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Turn a non-2xx response into a typed error carrying the body's `error` field
    async fn handle_response(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_default();
        let message = parsed
            .error
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("Request failed with status code {}", status.as_u16()));

        warn!(status = status.as_u16(), "gateway request failed: {}", message);

        if status == StatusCode::NOT_FOUND {
            return Err(SyncError::NotFound {
                message,
                missing_ids: parsed.missing_ids,
            });
        }

        Err(SyncError::gateway(Some(status.as_u16()), message))
    }
}

#[async_trait]
impl ServiceGateway for HttpGateway {
    async fn list(&self) -> Result<Vec<ServiceRecord>> {
        let url = self.endpoint(&["services"]);
        debug!(%url, "listing services");
        // `null` decodes as an empty collection.
        let records: Option<Vec<ServiceRecord>> = self.execute_json(self.client.get(url)).await?;
        Ok(records.unwrap_or_default())
    }

    async fn create(&self, data: &ServiceInput) -> Result<ServiceRecord> {
        let url = self.endpoint(&["services"]);
        debug!(%url, name = %data.name, "creating service");
        self.execute_json(self.client.post(url).json(data)).await
    }

    async fn update(&self, id: &str, data: &ServiceInput) -> Result<ServiceRecord> {
        let url = self.endpoint(&["services", id]);
        debug!(%url, "updating service");
        self.execute_json(self.client.put(url).json(data)).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let url = self.endpoint(&["services", id]);
        debug!(%url, "deleting service");
        self.execute(self.client.delete(url)).await?;
        Ok(())
    }

    async fn status(&self, id: &str) -> Result<ServiceStatus> {
        let url = self.endpoint(&["services", id, "status"]);
        self.execute_json(self.client.get(url)).await
    }

    async fn bulk_create(&self, data: &[ServiceInput]) -> Result<Vec<ServiceRecord>> {
        let url = self.endpoint(&["services", "bulk"]);
        debug!(%url, count = data.len(), "bulk creating services");
        let body = BulkCreateRequest { services: data };
        let response: BulkOperationResponse =
            self.execute_json(self.client.post(url).json(&body)).await?;
        Ok(response.services)
    }

    async fn bulk_update(&self, updates: &[BulkUpdateItem]) -> Result<()> {
        let url = self.endpoint(&["services", "bulk"]);
        debug!(%url, count = updates.len(), "bulk updating services");
        let body = BulkUpdateRequest { services: updates };
        self.execute(self.client.put(url).json(&body)).await?;
        Ok(())
    }

    async fn bulk_delete(&self, ids: &[String]) -> Result<()> {
        let url = self.endpoint(&["services", "bulk"]);
        debug!(%url, count = ids.len(), "bulk deleting services");
        let body = BulkDeleteRequest { ids };
        self.execute(self.client.delete(url).json(&body)).await?;
        Ok(())
    }

    async fn notification_config(&self) -> Result<NotificationConfig> {
        let url = self.endpoint(&["notifications", "config"]);
        self.execute_json(self.client.get(url)).await
    }

    async fn update_notification_config(&self, config: &NotificationConfig) -> Result<()> {
        let url = self.endpoint(&["notifications", "config"]);
        self.execute(self.client.post(url).json(config)).await?;
        Ok(())
    }
}
