//! Aggregator: the sole writer of the three metric namespaces.
//!
//! Gated behind the three sync in-progress flags — per the state machine
//! `Idle -[tick ∧ ¬any(sync_in_progress)]-> Running -[done]-> Idle` — so
//! user/bucket/usage writes from a syncer are only ever joined once that
//! syncer's cycle has fully landed.

pub mod bucket_pass;
pub mod categories;
pub mod cluster_pass;
pub mod rates;
pub mod user_pass;

use std::sync::Arc;

use rates::RateState;

use crate::error::Result;
use crate::health::HealthCounters;
use crate::store::{FlagGuard, StateStore, Store, ALL_SYNC_FLAGS, FLAG_METRIC_CALC};

pub struct Aggregator {
    store: Arc<Store>,
    user_rates: Arc<RateState>,
    bucket_rates: Arc<RateState>,
    health: Arc<HealthCounters>,
    pool_width: usize,
}

impl Aggregator {
    pub fn new(store: Arc<Store>, health: Arc<HealthCounters>, pool_width: usize) -> Self {
        Self {
            store,
            user_rates: Arc::new(RateState::new()),
            bucket_rates: Arc::new(RateState::new()),
            health,
            pool_width,
        }
    }

    /// Run one aggregation tick, or skip it if any syncer is mid-cycle.
    pub async fn run_once(&self) -> Result<()> {
        for flag in ALL_SYNC_FLAGS {
            if self.store.flag_is_set(flag).await? {
                tracing::debug!(flag, "a syncer is in progress, skipping aggregation tick");
                return Ok(());
            }
        }

        let _guard = FlagGuard::acquire(self.store.clone(), FLAG_METRIC_CALC).await?;
        self.run_cycle().await
    }

    async fn run_cycle(&self) -> Result<()> {
        let user_report = user_pass::run(
            self.store.clone(),
            self.user_rates.clone(),
            self.health.clone(),
            self.pool_width,
        )
        .await?;
        let bucket_report = bucket_pass::run(
            self.store.clone(),
            self.bucket_rates.clone(),
            self.health.clone(),
            self.pool_width,
        )
        .await?;
        cluster_pass::run(self.store.clone()).await?;

        tracing::info!(
            user_succeeded = user_report.succeeded,
            user_failed = user_report.failed,
            bucket_succeeded = bucket_report.succeeded,
            bucket_failed = bucket_report.failed,
            "aggregation cycle complete"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::store::Namespace;

    #[tokio::test]
    async fn aggregator_skips_tick_while_a_syncer_is_in_progress() {
        let store = Arc::new(Store::Memory(MemoryStore::new()));
        store.set_flag(crate::store::FLAG_SYNC_USERS).await.unwrap();

        let aggregator = Aggregator::new(store.clone(), Arc::new(HealthCounters::new()), 4);
        aggregator.run_once().await.unwrap();

        assert!(store.keys(Namespace::ClusterMetrics).await.unwrap().is_empty());
    }
}
