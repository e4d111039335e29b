//! Cluster pass: sums `BucketMetrics` into the single `"cluster"` record.
//! Runs last, after the user and bucket passes have written their metric
//! KVs for this cycle.
//!
//! Bucket metrics, not user metrics, are the source of truth here: every
//! usage record is joined exactly once into its bucket's row, while the
//! user pass joins the *same* usage records again under their owner's
//! prefix. Summing both namespaces would double-count every op and byte
//! the cluster ever saw.

use std::sync::Arc;

use crate::error::Result;
use crate::model::{BucketMetrics, ClusterMetrics, CLUSTER_METRICS_KEY};
use crate::store::{Namespace, StateStore, Store};

pub async fn run(store: Arc<Store>) -> Result<()> {
    let mut totals = ClusterMetrics::default();

    for key in store.keys(Namespace::BucketMetrics).await? {
        if let Some(m) = store.get_json::<BucketMetrics>(Namespace::BucketMetrics, &key).await? {
            totals.read_ops += m.read_ops;
            totals.write_ops += m.write_ops;
            totals.ops += m.total_ops;
            totals.bytes_sent += m.bytes_sent;
            totals.bytes_received += m.bytes_received;
            totals.throughput_bytes += m.throughput_bytes;
        }
    }

    store
        .put_json(Namespace::ClusterMetrics, CLUSTER_METRICS_KEY, &totals)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    #[tokio::test]
    async fn sums_bucket_metrics_only_s1_shaped() {
        // spec.md §8 S1: one user, one bucket, one usage entry with ops=3.
        // Cluster ops must equal 3, not 6 — summing both metric
        // namespaces would double-count the single underlying usage record.
        let store = Arc::new(Store::Memory(MemoryStore::new()));

        let user_metrics = crate::model::UserMetrics {
            user_key: "alice.none".into(),
            id: "alice".into(),
            ops: 3,
            read_ops: 3,
            successful_ops: 3,
            bytes_sent: 900,
            throughput_bytes: 900,
            ..Default::default()
        };
        store
            .put_json(Namespace::UserMetrics, "alice.none", &user_metrics)
            .await
            .unwrap();

        let bucket_metrics = BucketMetrics {
            bucket_key: "alice.none.photos".into(),
            bucket: "photos".into(),
            total_ops: 3,
            read_ops: 3,
            bytes_sent: 900,
            throughput_bytes: 900,
            ..Default::default()
        };
        store
            .put_json(Namespace::BucketMetrics, "alice.none.photos", &bucket_metrics)
            .await
            .unwrap();

        run(store.clone()).await.unwrap();

        let cluster = store
            .get_json::<ClusterMetrics>(Namespace::ClusterMetrics, CLUSTER_METRICS_KEY)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cluster.ops, 3);
        assert_eq!(cluster.read_ops, 3);
        assert_eq!(cluster.bytes_sent, 900);
        assert_eq!(cluster.throughput_bytes, 900);
    }

    #[tokio::test]
    async fn sums_across_multiple_buckets() {
        let store = Arc::new(Store::Memory(MemoryStore::new()));

        for (key, ops, bytes) in [("a.none.one", 3u64, 900u64), ("b.none.two", 5u64, 200u64)] {
            let m = BucketMetrics {
                bucket_key: key.into(),
                total_ops: ops,
                write_ops: ops,
                bytes_received: bytes,
                throughput_bytes: bytes,
                ..Default::default()
            };
            store.put_json(Namespace::BucketMetrics, key, &m).await.unwrap();
        }

        run(store.clone()).await.unwrap();

        let cluster = store
            .get_json::<ClusterMetrics>(Namespace::ClusterMetrics, CLUSTER_METRICS_KEY)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cluster.ops, 8);
        assert_eq!(cluster.write_ops, 8);
        assert_eq!(cluster.bytes_received, 1100);
        assert_eq!(cluster.throughput_bytes, 1100);
    }

    #[tokio::test]
    async fn empty_store_produces_zeroed_cluster_record() {
        let store = Arc::new(Store::Memory(MemoryStore::new()));
        run(store.clone()).await.unwrap();
        let cluster = store
            .get_json::<ClusterMetrics>(Namespace::ClusterMetrics, CLUSTER_METRICS_KEY)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cluster.ops, 0);
    }
}
