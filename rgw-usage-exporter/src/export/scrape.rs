//! Prometheus text-exposition rendering.
//!
//! Hand-rendered rather than built on a registry/collector crate: the
//! series carry per-entity dynamic labels (user identity, bucket name,
//! owner) read fresh from the metric KVs on every scrape, which doesn't
//! fit a process-wide static registry's model. See `DESIGN.md` for the
//! tradeoff.

use std::fmt::Write as _;
use std::sync::Arc;

use crate::config::LabelsConfig;
use crate::health::HealthCounters;
use crate::model::{BucketMetrics, ClusterMetrics, UserMetrics, CLUSTER_METRICS_KEY};
use crate::store::{Namespace, StateStore, Store};

/// Render the full `/metrics` body, or `None` if the aggregator has the
/// metric-calc flag set (refuse to populate mid-aggregation, per §4.F).
pub async fn render(store: &Store, labels: &LabelsConfig, health: &HealthCounters) -> Option<String> {
    if store
        .flag_is_set(crate::store::FLAG_METRIC_CALC)
        .await
        .unwrap_or(false)
    {
        return None;
    }

    let mut out = String::new();
    render_users(&mut out, store, labels).await;
    render_buckets(&mut out, store, labels).await;
    render_cluster(&mut out, store, labels).await;
    render_health(&mut out, health);
    Some(out)
}

fn common_labels(labels: &LabelsConfig) -> String {
    format!(
        "rgw_cluster_id=\"{}\",node=\"{}\",instance_id=\"{}\"",
        escape(&labels.cluster_id),
        escape(&labels.node_name),
        escape(&labels.instance_id)
    )
}

async fn render_users(out: &mut String, store: &Store, labels: &LabelsConfig) {
    let keys = store.keys(Namespace::UserMetrics).await.unwrap_or_default();
    if keys.is_empty() {
        return;
    }

    write_help(out, "rgw_user_buckets_total", "Number of buckets owned by the user.");
    write_help(out, "rgw_user_objects_total", "Number of objects owned by the user.");
    write_help(out, "rgw_user_data_size_bytes", "Total data size owned by the user.");
    write_help(out, "rgw_user_ops_total", "Total API operations for the user.");
    write_help(out, "rgw_user_read_ops_total", "Total read operations for the user.");
    write_help(out, "rgw_user_write_ops_total", "Total write operations for the user.");
    write_help(out, "rgw_user_bytes_sent_total", "Total bytes sent to the user.");
    write_help(out, "rgw_user_bytes_received_total", "Total bytes received from the user.");
    write_help(out, "rgw_user_throughput_bytes_total", "Total bytes transferred for the user.");
    write_help(out, "rgw_user_error_rate", "Percentage of operations that did not succeed.");
    write_help(out, "rgw_user_quota_enabled", "Whether the user quota is enabled.");
    write_help(out, "rgw_user_quota_size_bytes", "User quota size limit in bytes.");
    write_help(out, "rgw_user_quota_size_objects", "User quota object count limit.");
    write_help(out, "rgw_user_metadata", "Static user metadata, value always 1.");

    let common = common_labels(labels);
    for key in keys {
        let Some(m) = store.get_json::<UserMetrics>(Namespace::UserMetrics, &key).await.ok().flatten() else {
            continue;
        };
        let user = m.label_user();
        let user_label = format!("{common},user=\"{}\"", escape(&user));

        writeln!(out, "rgw_user_buckets_total{{{user_label}}} {}", m.buckets_total).ok();
        writeln!(out, "rgw_user_objects_total{{{user_label}}} {}", m.objects_total).ok();
        writeln!(out, "rgw_user_data_size_bytes{{{user_label}}} {}", m.data_size_bytes).ok();
        writeln!(out, "rgw_user_ops_total{{{user_label}}} {}", m.ops).ok();
        writeln!(out, "rgw_user_read_ops_total{{{user_label}}} {}", m.read_ops).ok();
        writeln!(out, "rgw_user_write_ops_total{{{user_label}}} {}", m.write_ops).ok();
        writeln!(out, "rgw_user_bytes_sent_total{{{user_label}}} {}", m.bytes_sent).ok();
        writeln!(out, "rgw_user_bytes_received_total{{{user_label}}} {}", m.bytes_received).ok();
        writeln!(out, "rgw_user_throughput_bytes_total{{{user_label}}} {}", m.throughput_bytes).ok();
        writeln!(out, "rgw_user_error_rate{{{user_label}}} {}", m.error_rate).ok();

        if m.quota.is_active() {
            writeln!(out, "rgw_user_quota_enabled{{{user_label}}} 1").ok();
            if let Some(size) = m.quota.max_size.filter(|v| *v > 0) {
                writeln!(out, "rgw_user_quota_size_bytes{{{user_label}}} {size}").ok();
            }
            if let Some(objects) = m.quota.max_objects.filter(|v| *v > 0) {
                writeln!(out, "rgw_user_quota_size_objects{{{user_label}}} {objects}").ok();
            }
        }

        writeln!(
            out,
            "rgw_user_metadata{{{common},user=\"{}\",display_name=\"{}\",email=\"{}\",storage_class=\"{}\"}} 1",
            escape(&user),
            escape(&m.display_name),
            escape(&m.email),
            escape(&m.storage_class),
        )
        .ok();
    }
}

async fn render_buckets(out: &mut String, store: &Store, labels: &LabelsConfig) {
    let keys = store.keys(Namespace::BucketMetrics).await.unwrap_or_default();
    if keys.is_empty() {
        return;
    }

    write_help(out, "rgw_bucket_size_bytes", "Bucket data size in bytes.");
    write_help(out, "rgw_bucket_objects_total", "Number of objects in the bucket.");
    write_help(out, "rgw_bucket_shards_total", "Number of index shards for the bucket.");
    write_help(out, "rgw_bucket_ops_total", "Total API operations against the bucket.");
    write_help(out, "rgw_bucket_read_ops_total", "Total read operations against the bucket.");
    write_help(out, "rgw_bucket_write_ops_total", "Total write operations against the bucket.");
    write_help(out, "rgw_bucket_bytes_sent_total", "Total bytes sent from the bucket.");
    write_help(out, "rgw_bucket_bytes_received_total", "Total bytes received into the bucket.");
    write_help(out, "rgw_bucket_throughput_bytes_total", "Total bytes transferred for the bucket.");
    write_help(out, "rgw_bucket_quota_enabled", "Whether the bucket quota is enabled.");
    write_help(out, "rgw_bucket_quota_size_bytes", "Bucket quota size limit in bytes.");
    write_help(out, "rgw_bucket_quota_size_objects", "Bucket quota object count limit.");

    let common = common_labels(labels);
    for key in keys {
        let Some(m) = store.get_json::<BucketMetrics>(Namespace::BucketMetrics, &key).await.ok().flatten() else {
            continue;
        };
        let bucket_label = format!(
            "{common},bucket=\"{}\",owner=\"{}\",zonegroup=\"{}\"",
            escape(&m.bucket),
            escape(&m.owner),
            escape(&m.zonegroup),
        );

        writeln!(out, "rgw_bucket_size_bytes{{{bucket_label}}} {}", m.size_bytes).ok();
        writeln!(out, "rgw_bucket_objects_total{{{bucket_label}}} {}", m.num_objects).ok();
        writeln!(out, "rgw_bucket_shards_total{{{bucket_label}}} {}", m.num_shards).ok();
        writeln!(out, "rgw_bucket_ops_total{{{bucket_label}}} {}", m.total_ops).ok();
        writeln!(out, "rgw_bucket_read_ops_total{{{bucket_label}}} {}", m.read_ops).ok();
        writeln!(out, "rgw_bucket_write_ops_total{{{bucket_label}}} {}", m.write_ops).ok();
        writeln!(out, "rgw_bucket_bytes_sent_total{{{bucket_label}}} {}", m.bytes_sent).ok();
        writeln!(out, "rgw_bucket_bytes_received_total{{{bucket_label}}} {}", m.bytes_received).ok();
        writeln!(out, "rgw_bucket_throughput_bytes_total{{{bucket_label}}} {}", m.throughput_bytes).ok();

        if m.quota.is_active() {
            writeln!(out, "rgw_bucket_quota_enabled{{{bucket_label}}} 1").ok();
            if let Some(size) = m.quota.max_size.filter(|v| *v > 0) {
                writeln!(out, "rgw_bucket_quota_size_bytes{{{bucket_label}}} {size}").ok();
            }
            if let Some(objects) = m.quota.max_objects.filter(|v| *v > 0) {
                writeln!(out, "rgw_bucket_quota_size_objects{{{bucket_label}}} {objects}").ok();
            }
        }
    }
}

async fn render_cluster(out: &mut String, store: &Store, labels: &LabelsConfig) {
    let Some(m) = store
        .get_json::<ClusterMetrics>(Namespace::ClusterMetrics, CLUSTER_METRICS_KEY)
        .await
        .ok()
        .flatten()
    else {
        return;
    };

    write_help(out, "rgw_cluster_ops_total", "Cluster-wide total operations.");
    write_help(out, "rgw_cluster_bytes_sent_total", "Cluster-wide total bytes sent.");
    write_help(out, "rgw_cluster_bytes_received_total", "Cluster-wide total bytes received.");
    write_help(out, "rgw_cluster_throughput_bytes_total", "Cluster-wide total throughput.");

    let common = common_labels(labels);
    writeln!(out, "rgw_cluster_ops_total{{{common}}} {}", m.ops).ok();
    writeln!(out, "rgw_cluster_bytes_sent_total{{{common}}} {}", m.bytes_sent).ok();
    writeln!(out, "rgw_cluster_bytes_received_total{{{common}}} {}", m.bytes_received).ok();
    writeln!(out, "rgw_cluster_throughput_bytes_total{{{common}}} {}", m.throughput_bytes).ok();
}

fn render_health(out: &mut String, health: &HealthCounters) {
    let (target_up, scrape_errors) = health.snapshot();
    write_help(out, "target_up", "Whether the most recent admin API call succeeded.");
    write_help(out, "scrape_errors_total", "Monotone count of sync/aggregation errors.");
    writeln!(out, "target_up {}", if target_up { 1 } else { 0 }).ok();
    writeln!(out, "scrape_errors_total {scrape_errors}").ok();
}

fn write_help(out: &mut String, name: &str, help: &str) {
    writeln!(out, "# HELP {name} {help}").ok();
    writeln!(out, "# TYPE {name} gauge").ok();
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    #[tokio::test]
    async fn refuses_to_render_while_metric_calc_is_in_progress() {
        let store = Store::Memory(MemoryStore::new());
        store.set_flag(crate::store::FLAG_METRIC_CALC).await.unwrap();
        let health = HealthCounters::new();
        let labels = LabelsConfig::default();
        assert!(render(&store, &labels, &health).await.is_none());
    }

    #[tokio::test]
    async fn renders_cluster_and_health_series_when_idle() {
        let store = Store::Memory(MemoryStore::new());
        let health = HealthCounters::new();
        health.set_target_up(true);
        let labels = LabelsConfig::default();
        let body = render(&store, &labels, &health).await.unwrap();
        assert!(body.contains("target_up 1"));
        assert!(body.contains("scrape_errors_total 0"));
    }

    #[tokio::test]
    async fn emits_a_user_series_for_a_synced_user() {
        let store = Store::Memory(MemoryStore::new());
        let metrics = UserMetrics {
            user_key: "alice.none".into(),
            id: "alice".into(),
            ops: 3,
            read_ops: 3,
            bytes_sent: 900,
            throughput_bytes: 900,
            ..Default::default()
        };
        store
            .put_json(Namespace::UserMetrics, "alice.none", &metrics)
            .await
            .unwrap();
        let health = HealthCounters::new();
        let labels = LabelsConfig::default();
        let body = render(&store, &labels, &health).await.unwrap();
        assert!(body.contains("rgw_user_ops_total{rgw_cluster_id=\"\",node=\"\",instance_id=\"\",user=\"alice\"} 3"));
    }
}
