//! Record shapes shared by the admin client, the state store, and the
//! aggregator. All are self-describing JSON when persisted to a KV
//! namespace.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One access key pair on a user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessKey {
    pub access_key: String,
    pub secret_key: String,
    #[serde(default)]
    pub kind: String,
}

/// One capability grant on a user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    #[serde(rename = "type")]
    pub cap_type: String,
    pub permission: String,
}

/// Quota descriptor, shared between user-level and bucket-level quotas.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Quota {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub max_size: Option<i64>,
    #[serde(default)]
    pub max_size_kb: Option<i64>,
    #[serde(default)]
    pub max_objects: Option<i64>,
    #[serde(default)]
    pub check_on_raw: bool,
    /// "user" | "bucket"
    #[serde(default)]
    pub quota_kind: String,
}

impl Quota {
    /// True when the quota is present, enabled, and sized above zero — the
    /// condition under which the exporter emits quota series at all.
    pub fn is_active(&self) -> bool {
        self.enabled.unwrap_or(false) && (self.max_size.unwrap_or(0) > 0 || self.max_objects.unwrap_or(0) > 0)
    }
}

/// Object/size statistics, optional on both users and buckets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stats {
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default)]
    pub size_rounded: Option<i64>,
    #[serde(default)]
    pub num_objects: Option<i64>,
}

/// One RGW account, identified by `(id, tenant)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "user_id")]
    pub id: String,
    #[serde(default)]
    pub tenant: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub suspended: bool,
    #[serde(default)]
    pub max_buckets: i64,
    #[serde(default)]
    pub keys: Vec<AccessKey>,
    #[serde(default)]
    pub caps: Vec<Capability>,
    #[serde(default)]
    pub default_placement: String,
    #[serde(default)]
    pub default_storage_class: String,
    #[serde(default)]
    pub user_quota: Quota,
    #[serde(default)]
    pub bucket_quota: Quota,
    #[serde(default)]
    pub stats: Option<Stats>,
}

impl User {
    /// Identity per §3: `(id, tenant)`, with an empty tenant meaning the
    /// identity is just `id`.
    pub fn identity_key(&self) -> String {
        crate::keycodec::encode_user(&self.id, &self.tenant)
    }
}

/// Per-category usage counters inside a bucket's usage stats.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageStat {
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default)]
    pub size_actual: Option<i64>,
    #[serde(default)]
    pub size_utilized: Option<i64>,
    #[serde(default)]
    pub size_kb: Option<i64>,
    #[serde(default)]
    pub size_kb_actual: Option<i64>,
    #[serde(default)]
    pub size_kb_utilized: Option<i64>,
    #[serde(default)]
    pub num_objects: Option<i64>,
}

/// Bucket usage stats, split into the main and multimeta namespaces.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BucketUsage {
    #[serde(rename = "rgw.main", default)]
    pub main: Option<UsageStat>,
    #[serde(rename = "rgw.multimeta", default)]
    pub multimeta: Option<UsageStat>,
}

/// One RGW bucket.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bucket {
    pub bucket: String,
    /// `id$tenant` or just `id` — normalize through [`crate::keycodec::split_identity`].
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub tenant: String,
    #[serde(default)]
    pub zonegroup: String,
    #[serde(default)]
    pub placement_rule: String,
    #[serde(default)]
    pub explicit_placement_pools: Vec<String>,
    #[serde(default)]
    pub num_shards: i64,
    #[serde(default)]
    pub index_type: String,
    #[serde(default)]
    pub marker: String,
    pub mtime: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub creation_time: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub usage: Option<BucketUsage>,
    #[serde(default)]
    pub bucket_quota: Quota,
}

/// One category record inside a usage entry (e.g. `get_obj`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageCategory {
    pub category: String,
    #[serde(default)]
    pub bytes_sent: u64,
    #[serde(default)]
    pub bytes_received: u64,
    #[serde(default)]
    pub ops: u64,
    #[serde(default)]
    pub successful_ops: u64,
}

/// Per-(user,bucket) usage record, as persisted under the bucket-key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageEntry {
    pub user: String,
    #[serde(default)]
    pub bucket: String,
    pub categories: Vec<UsageCategory>,
}

/// Derived per-category API-ops counters, keyed by category name.
pub type ApiOpsMap = HashMap<String, u64>;

/// Derived user-level metrics, written to the user-metrics namespace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserMetrics {
    pub user_key: String,
    pub id: String,
    pub tenant: String,
    pub display_name: String,
    pub email: String,
    pub storage_class: String,
    pub buckets_total: u64,
    pub objects_total: u64,
    pub data_size_bytes: u64,
    pub ops: u64,
    pub read_ops: u64,
    pub write_ops: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub successful_ops: u64,
    pub error_rate: f64,
    pub throughput_bytes: u64,
    pub api_ops: ApiOpsMap,
    pub quota: Quota,
    #[serde(default)]
    pub read_ops_per_sec: f64,
    #[serde(default)]
    pub write_ops_per_sec: f64,
    #[serde(default)]
    pub bytes_sent_per_sec: f64,
    #[serde(default)]
    pub bytes_received_per_sec: f64,
    #[serde(default)]
    pub throughput_per_sec: f64,
    #[serde(default)]
    pub api_ops_per_sec: HashMap<String, f64>,
}

impl UserMetrics {
    /// The label form the exporter emits: `id$tenant` when tenanted, else `id`.
    pub fn label_user(&self) -> String {
        if self.tenant.is_empty() {
            self.id.clone()
        } else {
            format!("{}${}", self.id, self.tenant)
        }
    }
}

/// Derived bucket-level metrics, written to the bucket-metrics namespace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BucketMetrics {
    pub bucket_key: String,
    pub bucket: String,
    pub owner: String,
    pub zonegroup: String,
    pub read_ops: u64,
    pub write_ops: u64,
    pub total_ops: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub throughput_bytes: u64,
    pub num_objects: u64,
    pub size_bytes: u64,
    pub creation_time: Option<chrono::DateTime<chrono::Utc>>,
    pub api_ops: ApiOpsMap,
    pub num_shards: i64,
    pub quota: Quota,
    #[serde(default)]
    pub read_ops_per_sec: f64,
    #[serde(default)]
    pub write_ops_per_sec: f64,
    #[serde(default)]
    pub bytes_sent_per_sec: f64,
    #[serde(default)]
    pub bytes_received_per_sec: f64,
    #[serde(default)]
    pub throughput_per_sec: f64,
    #[serde(default)]
    pub api_ops_per_sec: HashMap<String, f64>,
}

/// Cluster-wide totals, the single record keyed `"cluster"`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterMetrics {
    pub read_ops: u64,
    pub write_ops: u64,
    pub ops: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub throughput_bytes: u64,
}

pub const CLUSTER_METRICS_KEY: &str = "cluster";
