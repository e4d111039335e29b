//! In-memory state store backend
//!
//! Used by tests and anywhere the orchestrator is driven without a NATS
//! server. Mirrors the teacher's `DashMap`-backed concurrent state
//! tracking (`agents::background_worker::TaskInfo` storage) generalized
//! from "task id -> status" to "key -> bytes" per namespace.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::Result;
use crate::store::{Namespace, Namespaced, StateStore};

#[derive(Debug, Default)]
struct MemoryNamespace {
    data: DashMap<String, Vec<u8>>,
}

#[async_trait]
impl Namespaced for MemoryNamespace {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.data.get(key).map(|v| v.clone()))
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.data.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.data.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.data.iter().map(|e| e.key().clone()).collect())
    }
}

/// All seven namespaces backed by an in-process `DashMap` each.
#[derive(Debug, Default)]
pub struct MemoryStore {
    user_data: MemoryNamespace,
    bucket_data: MemoryNamespace,
    user_usage_data: MemoryNamespace,
    user_metrics: MemoryNamespace,
    bucket_metrics: MemoryNamespace,
    cluster_metrics: MemoryNamespace,
    sync_control: MemoryNamespace,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    fn namespace(&self, ns: Namespace) -> &dyn Namespaced {
        match ns {
            Namespace::UserData => &self.user_data,
            Namespace::BucketData => &self.bucket_data,
            Namespace::UserUsageData => &self.user_usage_data,
            Namespace::UserMetrics => &self.user_metrics,
            Namespace::BucketMetrics => &self.bucket_metrics,
            Namespace::ClusterMetrics => &self.cluster_metrics,
            Namespace::SyncControl => &self.sync_control,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = MemoryStore::new();
        store.namespace(Namespace::UserData).put("k", b"v".to_vec()).await.unwrap();
        let got = store.namespace(Namespace::UserData).get("k").await.unwrap();
        assert_eq!(got, Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn control_flags_clear_on_demand() {
        let store = MemoryStore::new();
        store.set_flag("sync_users_in_progress").await.unwrap();
        assert!(store.flag_is_set("sync_users_in_progress").await.unwrap());
        store.clear_control_flags().await.unwrap();
        assert!(!store.flag_is_set("sync_users_in_progress").await.unwrap());
    }

    #[tokio::test]
    async fn delete_removes_key() {
        let store = MemoryStore::new();
        store.namespace(Namespace::BucketData).put("a", b"1".to_vec()).await.unwrap();
        store.namespace(Namespace::BucketData).delete("a").await.unwrap();
        assert_eq!(store.namespace(Namespace::BucketData).get("a").await.unwrap(), None);
    }
}
