//! Mock publisher implementations for isolated pipeline testing.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::errors::PublishError;
use crate::publisher::OrderPublisher;

/// Publisher that records every payload instead of contacting a broker.
#[derive(Default)]
pub struct RecordingPublisher {
    messages: Mutex<Vec<Vec<u8>>>,
}

impl RecordingPublisher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Payloads published so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if a previous test poisoned the lock.
    #[must_use]
    pub fn messages(&self) -> Vec<Vec<u8>> {
        self.messages.lock().expect("messages lock").clone()
    }
}

#[async_trait]
impl OrderPublisher for RecordingPublisher {
    async fn publish(&self, payload: &[u8]) -> Result<(), PublishError> {
        self.messages
            .lock()
            .expect("messages lock")
            .push(payload.to_vec());
        Ok(())
    }
}

/// Publisher that always fails, for exercising the pipeline's 500 path.
pub struct FailingPublisher {
    connect: bool,
}

impl FailingPublisher {
    /// Fails as if the broker were unreachable.
    #[must_use]
    pub fn connect_refused() -> Self {
        Self { connect: true }
    }

    /// Fails as if the broker rejected the publish.
    #[must_use]
    pub fn rejected() -> Self {
        Self { connect: false }
    }
}

#[async_trait]
impl OrderPublisher for FailingPublisher {
    async fn publish(&self, _payload: &[u8]) -> Result<(), PublishError> {
        if self.connect {
            Err(PublishError::ConnectFailed("connection refused".to_string()))
        } else {
            Err(PublishError::PublishFailed("publish timed out".to_string()))
        }
    }
}
