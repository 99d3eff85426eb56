//! Sensor feed transports
//!
//! A feed delivers raw `(topic, payload)` messages one at a time, in broker
//! order. The MQTT feed is the production transport; the channel feed lets
//! tests and replays drive the same loop.

pub mod channel;
pub mod connection;
pub mod mqtt;

pub use channel::*;
pub use connection::*;
pub use mqtt::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Broker refused connection: {0}")]
    Refused(String),

    #[error("Subscription failed: {0}")]
    SubscribeError(String),

    #[error("Feed not connected")]
    NotConnected,

    #[error("Feed closed")]
    Closed,

    #[error("Timeout waiting for broker")]
    Timeout,
}

pub type IngestResult<T> = Result<T, IngestError>;

/// One raw message as delivered by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl FeedMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Trait for all sensor feeds
#[async_trait::async_trait]
pub trait SensorFeed: Send {
    /// Feed name/identifier
    fn name(&self) -> &str;

    /// Connect and subscribe. On success the feed is `Subscribed`.
    async fn connect(&mut self) -> IngestResult<()>;

    /// Wait for the next message. Any error means the session is over.
    async fn next_message(&mut self) -> IngestResult<FeedMessage>;

    /// Tear the session down
    async fn disconnect(&mut self) -> IngestResult<()>;

    /// Current connection state
    fn state(&self) -> ConnectionState;
}
