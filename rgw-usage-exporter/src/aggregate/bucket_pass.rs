//! Bucket pass: joins each bucket record against its single matching usage
//! record (same composite key), producing one `BucketMetrics` record.

use std::sync::Arc;
use std::time::Duration;

use crate::aggregate::categories::{classify, OpClass};
use crate::aggregate::rates::{RateState, Sample};
use crate::error::Result;
use crate::health::HealthCounters;
use crate::keycodec;
use crate::model::{Bucket, BucketMetrics, UsageEntry};
use crate::store::{Namespace, StateStore, Store};
use crate::sync::pool::{run_pool, PoolReport};

pub async fn run(
    store: Arc<Store>,
    rate_state: Arc<RateState>,
    health: Arc<HealthCounters>,
    pool_width: usize,
) -> Result<PoolReport> {
    let bucket_keys = store.keys(Namespace::BucketData).await?;

    let report = run_pool(bucket_keys, pool_width, 1, Duration::from_secs(0), move |bucket_key| {
        let store = store.clone();
        let rate_state = rate_state.clone();
        let health = health.clone();
        async move {
            let Some(bucket) = store.get_json::<Bucket>(Namespace::BucketData, &bucket_key).await? else {
                return Ok(());
            };
            let usage = store
                .get_json::<UsageEntry>(Namespace::UserUsageData, &bucket_key)
                .await?;

            let (owner_id, owner_tenant) = keycodec::split_identity(&bucket.owner);
            let mut metrics = BucketMetrics {
                bucket_key: bucket_key.clone(),
                bucket: bucket.bucket.clone(),
                owner: keycodec::join_identity(&owner_id, &owner_tenant),
                zonegroup: bucket.zonegroup.clone(),
                num_objects: bucket
                    .usage
                    .as_ref()
                    .and_then(|u| u.main.as_ref())
                    .and_then(|m| m.num_objects)
                    .unwrap_or(0)
                    .max(0) as u64,
                size_bytes: bucket
                    .usage
                    .as_ref()
                    .and_then(|u| u.main.as_ref())
                    .and_then(|m| m.size)
                    .unwrap_or(0)
                    .max(0) as u64,
                creation_time: bucket.creation_time,
                num_shards: bucket.num_shards,
                quota: bucket.bucket_quota.clone(),
                ..Default::default()
            };

            if let Some(usage) = usage.as_ref() {
                for category in &usage.categories {
                    metrics.total_ops += category.ops;
                    metrics.bytes_sent += category.bytes_sent;
                    metrics.bytes_received += category.bytes_received;
                    *metrics.api_ops.entry(category.category.clone()).or_insert(0) += category.ops;
                    match classify(&category.category) {
                        OpClass::Read => metrics.read_ops += category.ops,
                        OpClass::Write => metrics.write_ops += category.ops,
                        OpClass::Unknown => {}
                    }
                }
            }

            metrics.throughput_bytes = metrics.bytes_sent + metrics.bytes_received;

            let sample = Sample {
                bytes_sent: metrics.bytes_sent,
                bytes_received: metrics.bytes_received,
                read_ops: metrics.read_ops,
                write_ops: metrics.write_ops,
                api_ops: metrics.api_ops.clone(),
            };
            let rates = rate_state.observe(&bucket_key, sample);
            metrics.read_ops_per_sec = rates.read_ops_per_sec;
            metrics.write_ops_per_sec = rates.write_ops_per_sec;
            metrics.bytes_sent_per_sec = rates.bytes_sent_per_sec;
            metrics.bytes_received_per_sec = rates.bytes_received_per_sec;
            metrics.throughput_per_sec = rates.throughput_per_sec;
            metrics.api_ops_per_sec = rates.api_ops_per_sec;

            store
                .put_json(Namespace::BucketMetrics, &bucket_key, &metrics)
                .await
                .inspect_err(|_| health.incr_scrape_errors())
        }
    })
    .await;

    Ok(report)
}
