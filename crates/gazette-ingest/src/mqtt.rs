//! MQTT feed over rumqttc

use crate::{ConnectionState, FeedMessage, IngestError, IngestResult, SensorFeed};
use gazette_core::TOPIC_FILTER;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS,
    SubscribeReasonCode,
};
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

/// Broker connection settings
#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
    /// Keep-alive interval in seconds
    pub keep_alive: u64,
    /// Seconds to wait for CONNACK / SUBACK
    pub handshake_timeout: u64,
    pub topic_filter: String,
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            host: "mosquitto".to_string(),
            port: 1883,
            username: None,
            password: None,
            client_id: "gazette-status".to_string(),
            keep_alive: 60,
            handshake_timeout: 10,
            topic_filter: TOPIC_FILTER.to_string(),
        }
    }
}

impl MqttSettings {
    pub fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(Duration::from_secs(self.keep_alive.max(5)));
        options.set_clean_session(true);
        if let (Some(user), Some(pass)) = (&self.username, &self.password) {
            options.set_credentials(user, pass);
        }
        options
    }
}

/// Feed subscribed to every sensor state topic
pub struct MqttFeed {
    settings: MqttSettings,
    session: Option<(AsyncClient, EventLoop)>,
    state: ConnectionState,
}

impl MqttFeed {
    pub fn new(settings: MqttSettings) -> Self {
        Self {
            settings,
            session: None,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn settings(&self) -> &MqttSettings {
        &self.settings
    }

    fn set_state(&mut self, next: ConnectionState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "MQTT state change");
            self.state = next;
        }
    }

    async fn handshake(&mut self) -> IngestResult<()> {
        let wait = Duration::from_secs(self.settings.handshake_timeout.max(1));
        let filter = self.settings.topic_filter.clone();
        let (client, eventloop) = self.session.as_mut().ok_or(IngestError::NotConnected)?;

        // CONNACK
        loop {
            let event = timeout(wait, eventloop.poll())
                .await
                .map_err(|_| IngestError::Timeout)?
                .map_err(|e| IngestError::ConnectionError(e.to_string()))?;
            if let Event::Incoming(Packet::ConnAck(ack)) = event {
                if ack.code != ConnectReturnCode::Success {
                    return Err(IngestError::Refused(format!("{:?}", ack.code)));
                }
                break;
            }
        }
        info!(host = %self.settings.host, port = self.settings.port, "Connected to MQTT broker");

        client
            .subscribe(filter.as_str(), QoS::AtMostOnce)
            .await
            .map_err(|e| IngestError::SubscribeError(e.to_string()))?;

        // SUBACK
        loop {
            let event = timeout(wait, eventloop.poll())
                .await
                .map_err(|_| IngestError::Timeout)?
                .map_err(|e| IngestError::ConnectionError(e.to_string()))?;
            if let Event::Incoming(Packet::SubAck(ack)) = event {
                if ack
                    .return_codes
                    .iter()
                    .any(|c| matches!(c, SubscribeReasonCode::Failure))
                {
                    return Err(IngestError::SubscribeError(format!(
                        "broker rejected filter '{}'",
                        filter
                    )));
                }
                break;
            }
        }
        info!(filter = %filter, "Subscribed to sensor topics");
        Ok(())
    }
}

#[async_trait::async_trait]
impl SensorFeed for MqttFeed {
    fn name(&self) -> &str {
        "mqtt"
    }

    async fn connect(&mut self) -> IngestResult<()> {
        if self.state.is_subscribed() {
            return Ok(());
        }
        self.set_state(ConnectionState::Connecting);
        info!(
            host = %self.settings.host,
            port = self.settings.port,
            authenticated = self.settings.username.is_some(),
            "Attempting MQTT connection"
        );

        self.session = Some(AsyncClient::new(self.settings.options(), 32));
        match self.handshake().await {
            Ok(()) => {
                self.set_state(ConnectionState::Subscribed);
                Ok(())
            }
            Err(e) => {
                self.session = None;
                self.set_state(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    async fn next_message(&mut self) -> IngestResult<FeedMessage> {
        if !self.state.is_subscribed() {
            return Err(IngestError::NotConnected);
        }
        let (_, eventloop) = self.session.as_mut().ok_or(IngestError::NotConnected)?;

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    return Ok(FeedMessage {
                        topic: publish.topic,
                        payload: publish.payload.to_vec(),
                    });
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    warn!("Broker sent DISCONNECT");
                    self.session = None;
                    self.set_state(ConnectionState::Disconnected);
                    return Err(IngestError::Closed);
                }
                Ok(_) => {}
                Err(e) => {
                    self.session = None;
                    self.set_state(ConnectionState::Disconnected);
                    return Err(IngestError::ConnectionError(e.to_string()));
                }
            }
        }
    }

    async fn disconnect(&mut self) -> IngestResult<()> {
        if let Some((client, _)) = self.session.take() {
            if let Err(e) = client.disconnect().await {
                debug!(error = %e, "MQTT disconnect request failed");
            }
        }
        self.set_state(ConnectionState::Disconnected);
        Ok(())
    }

    fn state(&self) -> ConnectionState {
        self.state
    }
}
