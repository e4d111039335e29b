//! SyncBuckets — periodic bucket enumeration
//!
//! The composite key is built from the bucket's *owner*, not the bucket
//! name alone: `split_identity(bucket.owner)` recovers `(owner_id,
//! owner_tenant)` so the resulting key is a genuine bucket-key, prefixed
//! by the owning user's key.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::admin::{types::GetBucketInfoRequest, AdminClient};
use crate::config::{AdminConfig, PoolConfig};
use crate::error::Result;
use crate::health::HealthCounters;
use crate::keycodec;
use crate::store::{FlagGuard, Namespace, StateStore, Store, FLAG_SYNC_BUCKETS};
use crate::sync::pool::run_pool;

pub struct SyncBuckets {
    admin_config: AdminConfig,
    pool_config: PoolConfig,
    store: Arc<Store>,
    health: Arc<HealthCounters>,
}

impl SyncBuckets {
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
        if self.store.flag_is_set(FLAG_SYNC_BUCKETS).await? {
            tracing::debug!("sync_buckets already in progress, skipping tick");
            return Ok(());
        }
        let _guard = FlagGuard::acquire(self.store.clone(), FLAG_SYNC_BUCKETS).await?;
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

        let names = match client.list_buckets(cancel).await {
            Ok(names) => names,
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

        let report = run_pool(names, width, attempts, backoff, move |bucket| {
            let client = client.clone();
            let store = store.clone();
            let cancel = cancel.clone();
            async move {
                let info = client.get_bucket_info(&GetBucketInfoRequest { bucket }, &cancel).await?;

                let (owner_id, owner_tenant) = keycodec::split_identity(&info.owner);
                let key = keycodec::encode_bucket(&owner_id, &owner_tenant, &info.bucket);
                store.put_json(Namespace::BucketData, &key, &info).await
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
            "sync_buckets cycle complete"
        );
        Ok(())
    }
}
