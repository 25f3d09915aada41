//! Service records and the request payloads exchanged with the backend

use crate::errors::{Result, SyncError};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub const MIN_INTERVAL_SECS: u32 = 30;
pub const MAX_INTERVAL_SECS: u32 = 3600;
pub const MAX_NAME_LEN: usize = 100;
pub const MAX_URL_LEN: usize = 2048;
pub const MAX_BULK_ITEMS: usize = 100;

/// Health of a monitored service. Only the server ever sets this.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Health {
    #[serde(rename = "online", alias = "up")]
    Up,
    #[serde(rename = "offline", alias = "down")]
    Down,
    #[default]
    #[serde(rename = "unknown", other)]
    Unknown,
}

impl std::fmt::Display for Health {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Health::Up => write!(f, "up"),
            Health::Down => write!(f, "down"),
            Health::Unknown => write!(f, "unknown"),
        }
    }
}

/// One monitored service entry as returned by the backend.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecord {
    pub id: String,
    pub name: String,
    pub url: String,
    pub interval: u32,
    #[serde(default)]
    pub status: Health,
    #[serde(default, deserialize_with = "optional_timestamp")]
    pub last_checked: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "optional_timestamp", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "optional_timestamp", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "optional_timestamp", skip_serializing_if = "Option::is_none")]
    pub went_offline_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub consecutive_failures: u32,
}

impl ServiceRecord {
    /// The editable part of the record, e.g. to seed an edit form.
    pub fn input(&self) -> ServiceInput {
        ServiceInput {
            name: self.name.clone(),
            url: self.url.clone(),
            interval: self.interval,
        }
    }

    pub fn never_checked(&self) -> bool {
        self.last_checked.is_none()
    }
}

/// Create/update payload: `{name, url, interval}`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceInput {
    pub name: String,
    pub url: String,
    pub interval: u32,
}

impl ServiceInput {
    pub fn new(name: impl Into<String>, url: impl Into<String>, interval: u32) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            interval,
        }
    }

    /// Check every field against the limits the backend enforces.
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        validate_url(&self.url)?;
        validate_interval(self.interval)
    }

    pub fn with_interval(mut self, interval: u32) -> Self {
        self.interval = interval;
        self
    }
}

/// One entry of a bulk update request.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BulkUpdateItem {
    pub id: String,
    pub name: String,
    pub url: String,
    pub interval: u32,
}

impl BulkUpdateItem {
    /// Carry the record's name and url unchanged with a new interval.
    pub fn retimed(record: &ServiceRecord, interval: u32) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            url: record.url.clone(),
            interval,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct BulkCreateRequest<'a> {
    pub services: &'a [ServiceInput],
}

#[derive(Debug, Serialize)]
pub(crate) struct BulkUpdateRequest<'a> {
    pub services: &'a [BulkUpdateItem],
}

#[derive(Debug, Serialize)]
pub(crate) struct BulkDeleteRequest<'a> {
    pub ids: &'a [String],
}

/// Body returned by the bulk endpoints.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BulkOperationResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub services: Vec<ServiceRecord>,
}

/// Point-in-time status report from `GET /services/{id}/status`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub service_id: String,
    #[serde(default)]
    pub status: Health,
    #[serde(default, deserialize_with = "optional_timestamp")]
    pub last_checked: Option<DateTime<Utc>>,
    /// Milliseconds
    #[serde(default)]
    pub response_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Pushover alerting settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationConfig {
    #[serde(default)]
    pub user_key: String,
    #[serde(default)]
    pub app_token: String,
    #[serde(default)]
    pub enabled: bool,
}

pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(SyncError::validation("name is required"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(SyncError::validation(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

pub fn validate_url(raw: &str) -> Result<()> {
    if raw.len() > MAX_URL_LEN {
        return Err(SyncError::validation(format!(
            "url must be at most {MAX_URL_LEN} characters"
        )));
    }
    let parsed = url::Url::parse(raw)
        .map_err(|e| SyncError::validation(format!("url '{raw}' is not a valid URL: {e}")))?;
    match parsed.scheme() {
        "http" | "https" if parsed.has_host() => Ok(()),
        "http" | "https" => Err(SyncError::validation(format!("url '{raw}' has no host"))),
        other => Err(SyncError::validation(format!(
            "url scheme '{other}' is not supported, use http or https"
        ))),
    }
}

pub fn validate_interval(interval: u32) -> Result<()> {
    if !(MIN_INTERVAL_SECS..=MAX_INTERVAL_SECS).contains(&interval) {
        return Err(SyncError::validation(format!(
            "interval must be between {MIN_INTERVAL_SECS} and {MAX_INTERVAL_SECS} seconds"
        )));
    }
    Ok(())
}

pub fn validate_bulk_size(len: usize) -> Result<()> {
    if len == 0 {
        return Err(SyncError::validation("no services selected"));
    }
    if len > MAX_BULK_ITEMS {
        return Err(SyncError::validation(format!(
            "bulk operations are limited to {MAX_BULK_ITEMS} services, got {len}"
        )));
    }
    Ok(())
}

/// Accepts null, a missing field, or the backend's zero time as "never".
fn optional_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<DateTime<Utc>> = Option::deserialize(deserializer)?;
    Ok(value.filter(|ts| ts.year() > 1))
}
