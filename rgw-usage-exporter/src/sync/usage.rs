//! SyncUsage — periodic per-user usage enumeration
//!
//! Fans out over user identities rather than buckets: one `GetUsage` call
//! per user returns all of that user's bucket-level category counters in
//! one response, which this syncer then splits into one KV record per
//! `(user, bucket)`.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::admin::{types::GetUsageRequest, AdminClient};
use crate::config::{AdminConfig, PoolConfig};
use crate::error::Result;
use crate::health::HealthCounters;
use crate::keycodec;
use crate::model::UsageEntry;
use crate::store::{FlagGuard, Namespace, StateStore, Store, FLAG_SYNC_USAGES};
use crate::sync::pool::run_pool;

/// Bucket name RGW reports for usage not attributable to any single
/// bucket. Never skipped — mapped to a stable placeholder key instead.
const ROOT_PLACEHOLDER: &str = "root";

/// Bucket name marking a non-bucket-specific aggregate row. Skipped
/// entirely: it has no bucket identity to key a record under.
const NOT_BUCKET_SPECIFIC: &str = "-";

pub struct SyncUsage {
    admin_config: AdminConfig,
    pool_config: PoolConfig,
    store: Arc<Store>,
    health: Arc<HealthCounters>,
}

impl SyncUsage {
    pub fn new(
        admin_config: AdminConfig,
        pool_config: PoolConfig,
        store: Arc<Store>,
        health: Arc<HealthCounters>,
    ) -> Self {
        Self {
            admin_config,
            pool_config,
            store,
            health,
        }
    }

    pub async fn run_once(&self, cancel: &CancellationToken) -> Result<()> {
        if self.store.flag_is_set(FLAG_SYNC_USAGES).await? {
            tracing::debug!("sync_usages already in progress, skipping tick");
            return Ok(());
        }
        let _guard = FlagGuard::acquire(self.store.clone(), FLAG_SYNC_USAGES).await?;
        self.run_cycle(cancel).await
    }

    async fn run_cycle(&self, cancel: &CancellationToken) -> Result<()> {
        let client = match AdminClient::new(
            self.admin_config.admin_url.clone(),
            self.admin_config.access_key.clone(),
            self.admin_config.secret_key.clone(),
            None,
        ) {
            Ok(client) => {
                self.health.set_target_up(true);
                Arc::new(client)
            }
            Err(e) => {
                self.health.set_target_up(false);
                self.health.incr_scrape_errors();
                return Err(e);
            }
        };

        let ids = match client.list_users(cancel).await {
            Ok(ids) => ids,
            Err(e) => {
                if e.aborts_cycle() {
                    self.health.set_target_up(false);
                }
                self.health.incr_scrape_errors();
                return Err(e);
            }
        };

        let width = self.pool_config.worker_pool_width;
        let attempts = self.pool_config.retry_attempts;
        let backoff = Duration::from_secs(self.pool_config.retry_backoff_secs);
        let store = self.store.clone();
        let cancel = cancel.clone();

        let report = run_pool(ids, width, attempts, backoff, move |user_id| {
            let client = client.clone();
            let store = store.clone();
            let cancel = cancel.clone();
            async move {
                let usage = client
                    .get_usage(
                        &GetUsageRequest {
                            user: Some(user_id),
                            show_entries: true,
                            show_summary: false,
                            ..Default::default()
                        },
                        &cancel,
                    )
                    .await?;

                for entry in &usage.entries {
                    let (id, tenant) = keycodec::split_identity(&entry.user);
                    for bucket in &entry.buckets {
                        if bucket.bucket == NOT_BUCKET_SPECIFIC {
                            continue;
                        }
                        let bucket_name = if bucket.bucket.is_empty() {
                            ROOT_PLACEHOLDER
                        } else {
                            bucket.bucket.as_str()
                        };
                        let key = keycodec::encode_bucket(&id, &tenant, bucket_name);
                        let record = UsageEntry {
                            user: entry.user.clone(),
                            bucket: bucket_name.to_string(),
                            categories: bucket.categories.clone(),
                        };
                        store.put_json(Namespace::UserUsageData, &key, &record).await?;
                    }
                }
                Ok(())
            }
        })
        .await;

        // Count each item's terminal disposition once, not once per retry
        // attempt — a transient failure that eventually succeeds must leave
        // scrape_errors_total unchanged (spec.md §8 S5).
        self.health.incr_scrape_errors_by(report.failed as u64);

        tracing::info!(
            succeeded = report.succeeded,
            failed = report.failed,
            "sync_usages cycle complete"
        );
        Ok(())
    }
}
