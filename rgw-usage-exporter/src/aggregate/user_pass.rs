//! User pass: joins user records against bucket and usage keys that share
//! their user-key prefix, producing one `UserMetrics` record per user.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::aggregate::categories::{classify, OpClass};
use crate::aggregate::rates::{RateState, Sample};
use crate::error::Result;
use crate::health::HealthCounters;
use crate::keycodec;
use crate::model::{User, UsageEntry, UserMetrics};
use crate::store::{Namespace, StateStore, Store};
use crate::sync::pool::{run_pool, PoolReport};

/// Recover the user-key that owns a bucket- or usage-key, by decoding its
/// `(id, tenant)` prefix and re-encoding as a user key. The result is
/// always a genuine prefix of `key` (spec.md §8 invariant 2); verified
/// via [`keycodec::is_prefix_of`] rather than taken on faith.
fn owner_user_key(key: &str) -> Result<String> {
    let (id, tenant, _bucket) = keycodec::decode(key)?;
    let owner = keycodec::encode_user(&id, &tenant);
    debug_assert!(
        keycodec::is_prefix_of(&owner, key),
        "encoded owner key {owner:?} must be a prefix of {key:?}"
    );
    Ok(owner)
}

pub async fn run(
    store: Arc<Store>,
    rate_state: Arc<RateState>,
    health: Arc<HealthCounters>,
    pool_width: usize,
) -> Result<PoolReport> {
    let user_keys = store.keys(Namespace::UserData).await?;
    let bucket_keys = store.keys(Namespace::BucketData).await?;
    let usage_keys = store.keys(Namespace::UserUsageData).await?;

    let mut buckets_by_user_prefix: HashMap<String, u64> = HashMap::new();
    for key in &bucket_keys {
        match owner_user_key(key) {
            Ok(owner) => *buckets_by_user_prefix.entry(owner).or_insert(0) += 1,
            Err(e) => tracing::warn!(key = %key, error = %e, "skipping malformed bucket key in user pass"),
        }
    }

    let mut usage_keys_by_user_prefix: HashMap<String, Vec<String>> = HashMap::new();
    for key in &usage_keys {
        match owner_user_key(key) {
            Ok(owner) => usage_keys_by_user_prefix.entry(owner).or_default().push(key.clone()),
            Err(e) => tracing::warn!(key = %key, error = %e, "skipping malformed usage key in user pass"),
        }
    }

    let report = run_pool(user_keys, pool_width, 1, Duration::from_secs(0), move |user_key| {
        let store = store.clone();
        let rate_state = rate_state.clone();
        let health = health.clone();
        let buckets_total = buckets_by_user_prefix.get(&user_key).copied().unwrap_or(0);
        let usage_keys = usage_keys_by_user_prefix.get(&user_key).cloned().unwrap_or_default();
        async move {
            let Some(user) = store.get_json::<User>(Namespace::UserData, &user_key).await? else {
                return Ok(());
            };

            let mut metrics = UserMetrics {
                user_key: user_key.clone(),
                id: user.id.clone(),
                tenant: user.tenant.clone(),
                display_name: user.display_name.clone(),
                email: user.email.clone(),
                storage_class: user.default_storage_class.clone(),
                buckets_total,
                objects_total: user.stats.as_ref().and_then(|s| s.num_objects).unwrap_or(0).max(0) as u64,
                data_size_bytes: user.stats.as_ref().and_then(|s| s.size).unwrap_or(0).max(0) as u64,
                quota: user.user_quota.clone(),
                ..Default::default()
            };

            for usage_key in &usage_keys {
                let Some(entry) = store.get_json::<UsageEntry>(Namespace::UserUsageData, usage_key).await? else {
                    continue;
                };
                accumulate(&mut metrics, &entry);
            }

            metrics.throughput_bytes = metrics.bytes_sent + metrics.bytes_received;
            metrics.error_rate = if metrics.ops == 0 {
                0.0
            } else {
                metrics.ops.saturating_sub(metrics.successful_ops) as f64 / metrics.ops as f64 * 100.0
            };

            let sample = Sample {
                bytes_sent: metrics.bytes_sent,
                bytes_received: metrics.bytes_received,
                read_ops: metrics.read_ops,
                write_ops: metrics.write_ops,
                api_ops: metrics.api_ops.clone(),
            };
            let rates = rate_state.observe(&user_key, sample);
            metrics.read_ops_per_sec = rates.read_ops_per_sec;
            metrics.write_ops_per_sec = rates.write_ops_per_sec;
            metrics.bytes_sent_per_sec = rates.bytes_sent_per_sec;
            metrics.bytes_received_per_sec = rates.bytes_received_per_sec;
            metrics.throughput_per_sec = rates.throughput_per_sec;
            metrics.api_ops_per_sec = rates.api_ops_per_sec;

            store
                .put_json(Namespace::UserMetrics, &user_key, &metrics)
                .await
                .inspect_err(|_| health.incr_scrape_errors())
        }
    })
    .await;

    Ok(report)
}

fn accumulate(metrics: &mut UserMetrics, entry: &UsageEntry) {
    for category in &entry.categories {
        metrics.ops += category.ops;
        metrics.successful_ops += category.successful_ops;
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
