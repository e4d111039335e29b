//! State store façade: six data namespaces plus one control namespace,
//! each a flat key-value collection of opaque bytes.
//!
//! Callers serialize records to/from JSON themselves; the store only
//! guarantees last-writer-wins semantics per key, no cross-namespace
//! transactions.

pub mod memory;
pub mod nats;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;

/// One of the seven named KV collections the pipeline reads/writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    UserData,
    BucketData,
    UserUsageData,
    UserMetrics,
    BucketMetrics,
    ClusterMetrics,
    SyncControl,
}

impl Namespace {
    /// Suffix appended to the configured prefix, matching the persisted
    /// layout `<prefix>_<suffix>`.
    pub fn suffix(self) -> &'static str {
        match self {
            Namespace::UserData => "user_data",
            Namespace::BucketData => "bucket_data",
            Namespace::UserUsageData => "user_usage_data",
            Namespace::UserMetrics => "user_metrics",
            Namespace::BucketMetrics => "bucket_metrics",
            Namespace::ClusterMetrics => "cluster_metrics",
            Namespace::SyncControl => "sync_control",
        }
    }

    pub const DATA: [Namespace; 6] = [
        Namespace::UserData,
        Namespace::BucketData,
        Namespace::UserUsageData,
        Namespace::UserMetrics,
        Namespace::BucketMetrics,
        Namespace::ClusterMetrics,
    ];
}

/// A single named KV namespace: opaque byte values keyed by opaque strings.
#[async_trait]
pub trait Namespaced: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn keys(&self) -> Result<Vec<String>>;
}

/// The state store façade: resolves a [`Namespace`] to its backing
/// [`Namespaced`] collection.
#[async_trait]
pub trait StateStore: Send + Sync {
    fn namespace(&self, ns: Namespace) -> &dyn Namespaced;

    /// Read and JSON-decode a record.
    async fn get_json<T: DeserializeOwned>(&self, ns: Namespace, key: &str) -> Result<Option<T>> {
        match self.namespace(ns).get(key).await? {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes)
                    .map_err(|e| crate::error::Error::Decode(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// JSON-encode and write a record.
    async fn put_json<T: Serialize + Sync>(&self, ns: Namespace, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value).map_err(|e| crate::error::Error::Decode(e.to_string()))?;
        self.namespace(ns).put(key, bytes).await
    }

    async fn delete(&self, ns: Namespace, key: &str) -> Result<()> {
        self.namespace(ns).delete(key).await
    }

    async fn keys(&self, ns: Namespace) -> Result<Vec<String>> {
        self.namespace(ns).keys().await
    }

    /// Clear every entry in the control namespace. Called once at
    /// orchestrator startup to drop stale in-progress flags left by a
    /// previous, uncleanly-terminated run.
    async fn clear_control_flags(&self) -> Result<()> {
        let keys = self.keys(Namespace::SyncControl).await?;
        for key in keys {
            self.delete(Namespace::SyncControl, &key).await?;
        }
        Ok(())
    }

    /// True when the named control flag is currently set.
    async fn flag_is_set(&self, flag: &str) -> Result<bool> {
        Ok(self.namespace(Namespace::SyncControl).get(flag).await?.is_some())
    }

    async fn set_flag(&self, flag: &str) -> Result<()> {
        self.namespace(Namespace::SyncControl).put(flag, vec![1]).await
    }

    async fn clear_flag(&self, flag: &str) -> Result<()> {
        self.namespace(Namespace::SyncControl).delete(flag).await
    }
}

pub const FLAG_SYNC_USERS: &str = "sync_users_in_progress";
pub const FLAG_SYNC_BUCKETS: &str = "sync_buckets_in_progress";
pub const FLAG_SYNC_USAGES: &str = "sync_usages_in_progress";
pub const FLAG_METRIC_CALC: &str = "metric_calc_in_progress";

pub const ALL_SYNC_FLAGS: [&str; 3] = [FLAG_SYNC_USERS, FLAG_SYNC_BUCKETS, FLAG_SYNC_USAGES];

/// Concrete store used by the binary: either backend, chosen at startup by
/// configuration. Exists so the rest of the pipeline can hold a single
/// `Arc<Store>` instead of being generic over the backend.
pub enum Store {
    Nats(nats::NatsKvStore),
    Memory(memory::MemoryStore),
}

#[async_trait]
impl StateStore for Store {
    fn namespace(&self, ns: Namespace) -> &dyn Namespaced {
        match self {
            Store::Nats(s) => s.namespace(ns),
            Store::Memory(s) => s.namespace(ns),
        }
    }
}

/// Holds a control-namespace flag set for as long as the guard lives, and
/// clears it on drop — including when the holding scope unwinds via panic.
///
/// Spec §4.D point 7 requires the in-progress flag to be released "on exit
/// (including panic/abort paths)"; without this, a panic mid-cycle would
/// leave the flag set forever, wedging that syncer (or the aggregator,
/// which refuses to run while any sync flag is set).
///
/// `Drop` can't await, so the clear is spawned as a detached task. Every
/// caller of [`FlagGuard::acquire`] runs inside a tokio task owned by the
/// orchestrator's `JoinSet`, so a runtime handle is always available at
/// drop time.
pub struct FlagGuard {
    store: Arc<Store>,
    flag: &'static str,
}

impl FlagGuard {
    /// Set `flag` in the control namespace and return a guard that clears
    /// it unconditionally when dropped.
    pub async fn acquire(store: Arc<Store>, flag: &'static str) -> Result<Self> {
        store.set_flag(flag).await?;
        Ok(Self { store, flag })
    }
}

impl Drop for FlagGuard {
    fn drop(&mut self) {
        let store = self.store.clone();
        let flag = self.flag;
        tokio::spawn(async move {
            if let Err(e) = store.clear_flag(flag).await {
                tracing::error!(flag, error = %e, "failed to clear control flag on guard drop");
            }
        });
    }
}

#[cfg(test)]
mod flag_guard_tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use futures::FutureExt;

    #[tokio::test]
    async fn guard_clears_flag_when_dropped_normally() {
        let store = Arc::new(Store::Memory(MemoryStore::new()));
        {
            let _guard = FlagGuard::acquire(store.clone(), FLAG_SYNC_USERS).await.unwrap();
            assert!(store.flag_is_set(FLAG_SYNC_USERS).await.unwrap());
        }
        // Drop spawns the clear; yield so it runs.
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        assert!(!store.flag_is_set(FLAG_SYNC_USERS).await.unwrap());
    }

    #[tokio::test]
    async fn guard_clears_flag_even_when_scope_unwinds_via_panic() {
        let store = Arc::new(Store::Memory(MemoryStore::new()));
        let store_for_panic = store.clone();

        let result = std::panic::AssertUnwindSafe(async {
            let _guard = FlagGuard::acquire(store_for_panic.clone(), FLAG_SYNC_USERS)
                .await
                .unwrap();
            panic!("simulated mid-cycle panic");
        })
        .catch_unwind()
        .await;
        assert!(result.is_err());

        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        assert!(!store.flag_is_set(FLAG_SYNC_USERS).await.unwrap());
    }
}
