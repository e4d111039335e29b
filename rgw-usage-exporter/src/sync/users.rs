//! SyncUsers — periodic user enumeration
//!
//! Reentrant-safe: a tick that finds `sync_users_in_progress` already set
//! skips entirely rather than queuing up, mirroring the syncer state
//! machine's `Ready -[tick ∧ in_progress]-> Ready`.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::admin::{types::GetUserRequest, AdminClient};
use crate::config::{AdminConfig, PoolConfig};
use crate::error::Result;
use crate::health::HealthCounters;
use crate::store::{FlagGuard, Namespace, StateStore, Store, FLAG_SYNC_USERS};
use crate::sync::pool::run_pool;

pub struct SyncUsers {
    admin_config: AdminConfig,
    pool_config: PoolConfig,
    store: Arc<Store>,
    health: Arc<HealthCounters>,
}

impl SyncUsers {
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

    /// Run one cycle, or skip it if the previous one is still in progress.
    /// Per-item failures never surface here — they're absorbed into the
    /// pool report and logged. The in-progress flag is released by
    /// `_guard`'s drop even if `run_cycle` panics.
    pub async fn run_once(&self, cancel: &CancellationToken) -> Result<()> {
        if self.store.flag_is_set(FLAG_SYNC_USERS).await? {
            tracing::debug!("sync_users already in progress, skipping tick");
            return Ok(());
        }
        let _guard = FlagGuard::acquire(self.store.clone(), FLAG_SYNC_USERS).await?;
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

        let report = run_pool(ids, width, attempts, backoff, move |id| {
            let client = client.clone();
            let store = store.clone();
            let cancel = cancel.clone();
            async move {
                let user = client
                    .get_user(
                        &GetUserRequest {
                            id,
                            with_stats: true,
                        },
                        &cancel,
                    )
                    .await?;

                let key = user.identity_key();
                store.put_json(Namespace::UserData, &key, &user).await
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
            "sync_users cycle complete"
        );
        Ok(())
    }
}
