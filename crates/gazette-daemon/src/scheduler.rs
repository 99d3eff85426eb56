//! Session loop: connect, drain messages into the aggregator, reconnect

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};
use gazette_aggregator::SensorAggregator;
use gazette_ingest::{ReconnectPolicy, SensorFeed};

/// Scheduler drives the feed and owns the aggregator
pub struct Scheduler {
    feed: Box<dyn SensorFeed>,
    aggregator: SensorAggregator,
    policy: ReconnectPolicy,
    running: bool,
    sessions: u32,
}

impl Scheduler {
    pub fn new(
        feed: Box<dyn SensorFeed>,
        aggregator: SensorAggregator,
        policy: ReconnectPolicy,
    ) -> Self {
        Self {
            feed,
            aggregator,
            policy,
            running: false,
            sessions: 0,
        }
    }

    /// Reconnect forever with a fixed delay between sessions
    pub async fn run(&mut self) -> Result<()> {
        self.running = true;

        info!("Scheduler started");
        info!("Feed: {}", self.feed.name());
        info!("Reconnect delay: {}s", self.policy.delay.as_secs_f64());

        let mut failures: u32 = 0;
        while self.running {
            match self.run_session().await {
                Ok(handled) => {
                    failures = 0;
                    info!("Session ended after {} messages", handled);
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    warn!(attempt = failures, "Session failed: {:#}", e);
                }
            }

            if !self.running {
                break;
            }
            let delay = self.policy.delay_for(failures);
            info!("Reconnecting in {:?}", delay);
            tokio::time::sleep(delay).await;
        }

        info!("Scheduler stopped");
        Ok(())
    }

    /// One connection lifetime. Returns the number of messages handled.
    pub async fn run_session(&mut self) -> Result<u64> {
        self.sessions += 1;
        if let Err(e) = self.feed.connect().await {
            if self.aggregator.has_unsaved_changes() {
                self.aggregator.persist(Utc::now());
            }
            return Err(e).context("Failed to connect feed");
        }
        info!(feed = self.feed.name(), session = self.sessions, "Feed subscribed");

        let mut handled: u64 = 0;
        loop {
            match self.feed.next_message().await {
                Ok(message) => {
                    self.aggregator
                        .handle_message(&message.topic, &message.payload);
                    handled += 1;
                }
                Err(e) => {
                    warn!("Feed disconnected: {}", e);
                    break;
                }
            }
        }

        self.aggregator.persist(Utc::now());
        Ok(handled)
    }

    /// Stop the loop, drop the connection, and flush everything to disk
    pub async fn stop(&mut self) -> Result<()> {
        info!("Stopping scheduler...");
        self.running = false;

        if let Err(e) = self.feed.disconnect().await {
            warn!("Error disconnecting feed: {}", e);
        }

        self.aggregator.persist(Utc::now());

        info!("Scheduler stopped successfully");
        Ok(())
    }

    #[allow(dead_code)]
    pub fn aggregator(&self) -> &SensorAggregator {
        &self.aggregator
    }

    #[allow(dead_code)]
    pub fn sessions(&self) -> u32 {
        self.sessions
    }
}
