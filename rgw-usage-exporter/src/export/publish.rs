//! Bus publisher: serializes the current usage snapshot and publishes it
//! to the configured NATS subject, once per export cycle.
//!
//! Connection setup follows the teacher's `events::create_client` shape —
//! exponential backoff on connect — while the retry policy the syncers use
//! for admin-API fetches stays the fixed 2s/3-attempt scheme specified for
//! that unrelated concern.

use std::time::Duration;

use async_nats::Client;

use crate::config::BusConfig;
use crate::error::{Error, Result};
use crate::model::UsageEntry;
use crate::store::{Namespace, StateStore, Store};

pub struct BusPublisher {
    client: Option<Client>,
    subject: String,
}

impl BusPublisher {
    /// Connect if `use_nats` is set; otherwise returns a no-op publisher.
    pub async fn connect(bus: &BusConfig) -> Result<Self> {
        if !bus.use_nats || bus.nats_url.is_empty() {
            return Ok(Self {
                client: None,
                subject: bus.nats_subject.clone(),
            });
        }

        let client = connect_with_retries(&bus.nats_url, 3, Duration::from_secs(1)).await?;
        Ok(Self {
            client: Some(client),
            subject: bus.nats_subject.clone(),
        })
    }

    /// Publish the current usage snapshot. A no-op when the bus is disabled.
    pub async fn publish_snapshot(&self, store: &Store) -> Result<()> {
        let Some(client) = &self.client else {
            return Ok(());
        };

        let keys = store.keys(Namespace::UserUsageData).await?;
        let mut snapshot = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(entry) = store.get_json::<UsageEntry>(Namespace::UserUsageData, &key).await? {
                snapshot.push(entry);
            }
        }

        let payload = serde_json::to_vec(&snapshot).map_err(|e| Error::Decode(e.to_string()))?;
        client
            .publish(self.subject.clone(), payload.into())
            .await
            .map_err(|e| Error::Bus(format!("publish to {} failed: {e}", self.subject)))?;
        Ok(())
    }
}

async fn connect_with_retries(url: &str, max_retries: u32, base_delay: Duration) -> Result<Client> {
    let mut attempt = 0;
    loop {
        match async_nats::connect(url).await {
            Ok(client) => {
                if attempt > 0 {
                    tracing::info!(attempt, "NATS bus connection established");
                } else {
                    tracing::info!(url, "NATS bus connected");
                }
                return Ok(client);
            }
            Err(e) => {
                attempt += 1;
                if attempt > max_retries {
                    return Err(Error::Bus(format!(
                        "failed to connect to NATS bus at {url} after {attempt} attempts: {e}"
                    )));
                }
                let delay = base_delay * 2_u32.pow(attempt - 1);
                tracing::warn!(attempt, ?delay, error = %e, "NATS bus connection attempt failed, retrying");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    #[tokio::test]
    async fn disabled_bus_is_a_noop_publisher() {
        let bus = BusConfig {
            use_nats: false,
            ..BusConfig::default()
        };
        let publisher = BusPublisher::connect(&bus).await.unwrap();
        let store = Store::Memory(MemoryStore::new());
        assert!(publisher.publish_snapshot(&store).await.is_ok());
    }
}
