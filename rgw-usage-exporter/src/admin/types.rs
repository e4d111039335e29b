//! Request/response shapes for the RGW admin API
//!
//! Struct-to-query encoding follows the same "only present, non-empty,
//! non-zero fields go on the wire" rule the spec requires: each request
//! struct builds its own query string rather than relying on a generic
//! serializer, since the allow-list per operation differs.

use serde::Deserialize;

/// `GET /admin/user`
#[derive(Debug, Clone, Default)]
pub struct GetUserRequest {
    pub id: String,
    pub with_stats: bool,
}

impl GetUserRequest {
    pub fn query(&self) -> Vec<(&'static str, String)> {
        let mut q = vec![("format", "json".to_string()), ("uid", self.id.clone())];
        if self.with_stats {
            q.push(("stats", "True".to_string()));
        }
        q
    }
}

/// `GET /admin/bucket`
#[derive(Debug, Clone, Default)]
pub struct GetBucketInfoRequest {
    pub bucket: String,
}

impl GetBucketInfoRequest {
    pub fn query(&self) -> Vec<(&'static str, String)> {
        vec![("format", "json".to_string()), ("bucket", self.bucket.clone())]
    }
}

/// `GET /admin/usage`
#[derive(Debug, Clone, Default)]
pub struct GetUsageRequest {
    pub user: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub show_entries: bool,
    pub show_summary: bool,
}

impl GetUsageRequest {
    pub fn query(&self) -> Vec<(&'static str, String)> {
        let mut q = vec![("format", "json".to_string())];
        if let Some(user) = &self.user {
            if !user.is_empty() {
                q.push(("uid", user.clone()));
            }
        }
        if let Some(start) = &self.start {
            if !start.is_empty() {
                q.push(("start", start.clone()));
            }
        }
        if let Some(end) = &self.end {
            if !end.is_empty() {
                q.push(("end", end.clone()));
            }
        }
        if self.show_entries {
            q.push(("show-entries", "True".to_string()));
        }
        if self.show_summary {
            q.push(("show-summary", "True".to_string()));
        } else {
            q.push(("show-summary", "False".to_string()));
        }
        q
    }
}

/// Envelope RGW returns for any admin API call with status >= 300.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusErrorEnvelope {
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "RequestId", default)]
    pub request_id: Option<String>,
    #[serde(rename = "HostId", default)]
    pub host_id: Option<String>,
}

/// Body of a `GET /admin/usage` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsageResponse {
    #[serde(default)]
    pub entries: Vec<UsageResponseEntry>,
    #[serde(default)]
    pub summary: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UsageResponseEntry {
    pub user: String,
    pub buckets: Vec<UsageResponseBucket>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UsageResponseBucket {
    pub bucket: String,
    pub categories: Vec<crate::model::UsageCategory>,
}
