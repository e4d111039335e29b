//! Orchestrator: hosts the periodic schedule and the scrape server, and
//! drains everything on shutdown.
//!
//! Each syncer, the aggregator, the bus publisher, and the scrape server
//! run as independent tasks, cancelled together through one shared
//! `CancellationToken` — the same shutdown primitive the teacher's
//! `agents::background_worker` uses for managed task cancellation,
//! generalized here from per-task tokens to one root token for the whole
//! process.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::aggregate::Aggregator;
use crate::config::Config;
use crate::error::Result;
use crate::export::{self, publish::BusPublisher};
use crate::health::HealthCounters;
use crate::store::{nats::NatsKvStore, memory::MemoryStore, StateStore, Store};
use crate::sync::{SyncBuckets, SyncUsage, SyncUsers};

pub struct Orchestrator {
    config: Config,
    store: Arc<Store>,
    health: Arc<HealthCounters>,
}

impl Orchestrator {
    /// Build the state store per configuration, and clear any stale
    /// control-namespace flags left by a previous, uncleanly-terminated run.
    pub async fn bootstrap(config: Config) -> Result<Self> {
        let store = Arc::new(build_store(&config).await?);
        store.clear_control_flags().await?;

        Ok(Self {
            config,
            store,
            health: Arc::new(HealthCounters::new()),
        })
    }

    /// Run every task until a shutdown signal arrives, then drain.
    pub async fn run(self) -> Result<()> {
        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();

        let sync_users = SyncUsers::new(
            self.config.admin.clone(),
            self.config.pool.clone(),
            self.store.clone(),
            self.health.clone(),
        );
        let sync_buckets = SyncBuckets::new(
            self.config.admin.clone(),
            self.config.pool.clone(),
            self.store.clone(),
            self.health.clone(),
        );
        let sync_usage = SyncUsage::new(
            self.config.admin.clone(),
            self.config.pool.clone(),
            self.store.clone(),
            self.health.clone(),
        );
        let aggregator = Aggregator::new(
            self.store.clone(),
            self.health.clone(),
            self.config.pool.worker_pool_width,
        );
        let publisher = BusPublisher::connect(&self.config.bus).await?;

        let sync_interval = Duration::from_secs(self.config.schedule.interval);

        let users_cancel = cancel.clone();
        tasks.spawn(async move {
            let mut ticker = tokio::time::interval(sync_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = sync_users.run_once(&users_cancel).await {
                            tracing::warn!(syncer = "sync_users", error = %e, "syncer cycle error");
                        }
                    }
                    _ = users_cancel.cancelled() => break,
                }
            }
        });

        let buckets_cancel = cancel.clone();
        tasks.spawn(async move {
            let mut ticker = tokio::time::interval(sync_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = sync_buckets.run_once(&buckets_cancel).await {
                            tracing::warn!(syncer = "sync_buckets", error = %e, "syncer cycle error");
                        }
                    }
                    _ = buckets_cancel.cancelled() => break,
                }
            }
        });

        let usage_cancel = cancel.clone();
        tasks.spawn(async move {
            let mut ticker = tokio::time::interval(sync_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = sync_usage.run_once(&usage_cancel).await {
                            tracing::warn!(syncer = "sync_usages", error = %e, "syncer cycle error");
                        }
                    }
                    _ = usage_cancel.cancelled() => break,
                }
            }
        });

        let aggregate_cancel = cancel.clone();
        let aggregate_interval = Duration::from_secs(self.config.schedule.aggregate_interval_secs);
        tasks.spawn(async move {
            let mut ticker = tokio::time::interval(aggregate_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = aggregator.run_once().await {
                            tracing::warn!(error = %e, "aggregation cycle error");
                        }
                    }
                    _ = aggregate_cancel.cancelled() => break,
                }
            }
        });

        let publish_cancel = cancel.clone();
        let publish_interval = Duration::from_secs(self.config.schedule.aggregate_interval_secs);
        let publish_store = self.store.clone();
        tasks.spawn(async move {
            let mut ticker = tokio::time::interval(publish_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = publisher.publish_snapshot(&publish_store).await {
                            tracing::warn!(error = %e, "bus publish error");
                        }
                    }
                    _ = publish_cancel.cancelled() => break,
                }
            }
        });

        if self.config.scrape.prometheus {
            let scrape_cancel = cancel.clone();
            let scrape_store = self.store.clone();
            let scrape_health = self.health.clone();
            let scrape_labels = self.config.labels.clone();
            let scrape_config = self.config.scrape.clone();
            tasks.spawn(async move {
                if let Err(e) = export::serve(&scrape_config, scrape_labels, scrape_store, scrape_health, scrape_cancel).await {
                    tracing::error!(error = %e, "scrape server exited with error");
                }
            });
        }

        shutdown_signal().await;
        tracing::info!("shutdown signal received, draining in-flight work");
        cancel.cancel();

        while tasks.join_next().await.is_some() {}
        Ok(())
    }
}

async fn build_store(config: &Config) -> Result<Store> {
    if config.kv.sync_external_nats {
        let client = NatsKvStore::connect(&config.kv.sync_control_url, &config.kv).await?;
        Ok(Store::Nats(client))
    } else {
        Ok(Store::Memory(MemoryStore::new()))
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
