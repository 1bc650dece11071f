use async_trait::async_trait;
use log::debug;

use crate::errors::PublishError;
use crate::settings::BrokerSettings;

/// Seam between the submit pipeline and the messaging broker.
///
/// Implementations publish a serialized record to one well-known topic.
/// Delivery is at most once per call: a failed call publishes nothing and
/// a retried HTTP request produces a duplicate message.
#[async_trait]
pub trait OrderPublisher: Send + Sync {
    /// Publish a serialized payload to the configured topic.
    ///
    /// # Errors
    ///
    /// Returns `PublishError::ConnectFailed` if the broker is unreachable,
    /// or `PublishError::PublishFailed` if the broker rejects the publish.
    async fn publish(&self, payload: &[u8]) -> Result<(), PublishError>;
}

/// NATS-backed publisher. A fresh connection is opened for every call and
/// released before returning, whatever the outcome; concurrent publishes
/// never share a broker handle.
pub struct NatsPublisher {
    broker: BrokerSettings,
}

impl NatsPublisher {
    #[must_use]
    pub fn new(broker: BrokerSettings) -> Self {
        Self { broker }
    }
}

#[async_trait]
impl OrderPublisher for NatsPublisher {
    async fn publish(&self, payload: &[u8]) -> Result<(), PublishError> {
        debug!(
            "connecting to broker {} (cluster {}, client {})",
            self.broker.url, self.broker.cluster_id, self.broker.client_id
        );

        let client = async_nats::ConnectOptions::new()
            .name(&self.broker.client_id)
            .connect(self.broker.url.as_str())
            .await
            .map_err(|e| PublishError::ConnectFailed(e.to_string()))?;

        client
            .publish(self.broker.topic.clone(), payload.to_vec().into())
            .await
            .map_err(|e| PublishError::PublishFailed(e.to_string()))?;

        // Flush before the connection drops so the message is on the wire,
        // not sitting in a client-side buffer.
        client
            .flush()
            .await
            .map_err(|e| PublishError::PublishFailed(e.to_string()))?;

        debug!("published {} bytes to {}", payload.len(), self.broker.topic);
        Ok(())
    }
}
