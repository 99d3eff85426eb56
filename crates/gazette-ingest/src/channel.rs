//! In-process feed backed by a tokio channel

use crate::{ConnectionState, FeedMessage, IngestError, IngestResult, SensorFeed};
use tokio::sync::mpsc;

pub type FeedSender = mpsc::Sender<FeedMessage>;
pub type FeedReceiver = mpsc::Receiver<FeedMessage>;

/// Create a channel for feeding messages into a [`ChannelFeed`]
pub fn create_feed_channel(buffer_size: usize) -> (FeedSender, FeedReceiver) {
    mpsc::channel(buffer_size.max(1))
}

/// Replays whatever is pushed into the sending half.
///
/// Dropping every sender ends the session with [`IngestError::Closed`].
pub struct ChannelFeed {
    name: String,
    rx: FeedReceiver,
    state: ConnectionState,
}

impl ChannelFeed {
    pub fn new(name: impl Into<String>, rx: FeedReceiver) -> Self {
        Self {
            name: name.into(),
            rx,
            state: ConnectionState::Disconnected,
        }
    }
}

#[async_trait::async_trait]
impl SensorFeed for ChannelFeed {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&mut self) -> IngestResult<()> {
        self.state = ConnectionState::Subscribed;
        Ok(())
    }

    async fn next_message(&mut self) -> IngestResult<FeedMessage> {
        if !self.state.is_subscribed() {
            return Err(IngestError::NotConnected);
        }
        match self.rx.recv().await {
            Some(message) => Ok(message),
            None => {
                self.state = ConnectionState::Disconnected;
                Err(IngestError::Closed)
            }
        }
    }

    async fn disconnect(&mut self) -> IngestResult<()> {
        self.state = ConnectionState::Disconnected;
        Ok(())
    }

    fn state(&self) -> ConnectionState {
        self.state
    }
}
