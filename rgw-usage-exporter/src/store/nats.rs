//! NATS JetStream key-value backend
//!
//! One JetStream KV bucket per namespace, named `<prefix>_<namespace>` as
//! specified in the persisted state layout. This reuses the same
//! `async-nats` client the teacher already depends on for its event bus
//! (`events.rs`), just pointed at JetStream KV instead of core pub/sub.

use async_trait::async_trait;
use futures::TryStreamExt;

use crate::config::KvConfig;
use crate::error::{Error, Result};
use crate::store::{Namespace, Namespaced, StateStore};

struct NatsNamespace {
    store: async_nats::jetstream::kv::Store,
}

#[async_trait]
impl Namespaced for NatsNamespace {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.store
            .get(key)
            .await
            .map(|opt| opt.map(|bytes| bytes.to_vec()))
            .map_err(|e| Error::Kv(e.to_string()))
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.store
            .put(key, value.into())
            .await
            .map(|_revision| ())
            .map_err(|e| Error::Kv(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.store
            .delete(key)
            .await
            .map_err(|e| Error::Kv(e.to_string()))
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let stream = self.store.keys().await.map_err(|e| Error::Kv(e.to_string()))?;
        stream
            .try_collect()
            .await
            .map_err(|e| Error::Kv(e.to_string()))
    }
}

/// All seven namespaces backed by JetStream KV buckets under a shared
/// bucket-name prefix.
pub struct NatsKvStore {
    user_data: NatsNamespace,
    bucket_data: NatsNamespace,
    user_usage_data: NatsNamespace,
    user_metrics: NatsNamespace,
    bucket_metrics: NatsNamespace,
    cluster_metrics: NatsNamespace,
    sync_control: NatsNamespace,
}

impl NatsKvStore {
    /// Connect to NATS and open (creating if needed) the seven KV buckets.
    pub async fn connect(nats_url: &str, kv: &KvConfig) -> Result<Self> {
        let client = async_nats::connect(nats_url)
            .await
            .map_err(|e| Error::Kv(format!("failed to connect to NATS at {nats_url}: {e}")))?;
        let js = async_nats::jetstream::new(client);

        let prefix = &kv.sync_control_bucket_prefix;
        let open = |ns: Namespace| {
            let js = js.clone();
            let bucket = format!("{prefix}_{}", ns.suffix());
            async move {
                let store = js
                    .create_key_value(async_nats::jetstream::kv::Config {
                        bucket: bucket.clone(),
                        ..Default::default()
                    })
                    .await
                    .map_err(|e| Error::Kv(format!("failed to open KV bucket {bucket}: {e}")))?;
                Ok::<_, Error>(NatsNamespace { store })
            }
        };

        Ok(Self {
            user_data: open(Namespace::UserData).await?,
            bucket_data: open(Namespace::BucketData).await?,
            user_usage_data: open(Namespace::UserUsageData).await?,
            user_metrics: open(Namespace::UserMetrics).await?,
            bucket_metrics: open(Namespace::BucketMetrics).await?,
            cluster_metrics: open(Namespace::ClusterMetrics).await?,
            sync_control: open(Namespace::SyncControl).await?,
        })
    }
}

#[async_trait]
impl StateStore for NatsKvStore {
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
