#![allow(dead_code)]

use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use thiserror::Error;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use poller::PubSubTransport;

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
    pub keep_alive: Duration,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            username: None,
            password: None,
            client_id: "solaredge-collector".to_string(),
            keep_alive: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("mqtt client error: {0}")]
    Client(#[from] rumqttc::ClientError),
    #[error("mqtt connection error: {0}")]
    Connection(#[from] rumqttc::ConnectionError),
    #[error("mqtt broker did not acknowledge connection within {0:?}")]
    ConnectTimeout(Duration),
}

const CHANNEL_CAPACITY: usize = 64;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const PUBLISH_PUMP_BUDGET: Duration = Duration::from_millis(5);

/// Pub/sub transport over rumqttc. The event loop is serviced in bounded
/// slices by the poll loop rather than a background task, keeping the
/// process single-threaded; rumqttc's own reconnect covers broker drops
/// mid-run.
pub enum MqttTransport {
    Connected {
        client: AsyncClient,
        event_loop: EventLoop,
    },
    Disabled,
}

impl MqttTransport {
    pub fn disabled() -> Self {
        MqttTransport::Disabled
    }

    /// Connects and waits for the broker's ConnAck; a broker that cannot
    /// be reached at startup is a fatal condition for the caller.
    pub async fn connect(config: MqttConfig) -> Result<Self, TransportError> {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(config.keep_alive);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        let (client, mut event_loop) = AsyncClient::new(options, CHANNEL_CAPACITY);

        let deadline = Instant::now() + CONNECT_TIMEOUT;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            match timeout(left, event_loop.poll()).await {
                Ok(Ok(Event::Incoming(Packet::ConnAck(ack)))) => {
                    info!(host = %config.host, port = config.port, code = ?ack.code, "mqtt connected");
                    break;
                }
                Ok(Ok(event)) => debug!(?event, "mqtt event during connect"),
                Ok(Err(err)) => return Err(TransportError::Connection(err)),
                Err(_) => return Err(TransportError::ConnectTimeout(CONNECT_TIMEOUT)),
            }
        }

        Ok(MqttTransport::Connected { client, event_loop })
    }

    /// Drains the event loop briefly so enqueued packets reach the wire
    /// even when many publishes land back to back within one cycle.
    async fn pump(event_loop: &mut EventLoop, budget: Duration) {
        let deadline = Instant::now() + budget;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                break;
            }
            match timeout(left, event_loop.poll()).await {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => {
                    warn!(error = %err, "mqtt event loop error");
                    break;
                }
                Err(_) => break,
            }
        }
    }
}

impl PubSubTransport for MqttTransport {
    type Error = TransportError;

    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        match self {
            MqttTransport::Connected { client, event_loop } => {
                client
                    .publish(topic, QoS::AtMostOnce, false, payload)
                    .await?;
                Self::pump(event_loop, PUBLISH_PUMP_BUDGET).await;
                Ok(())
            }
            MqttTransport::Disabled => Ok(()),
        }
    }

    async fn service(&mut self, budget: Duration) {
        match self {
            MqttTransport::Connected { event_loop, .. } => {
                let deadline = Instant::now() + budget;
                loop {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        break;
                    }
                    match timeout(left, event_loop.poll()).await {
                        Ok(Ok(event)) => debug!(?event, "mqtt event"),
                        Ok(Err(err)) => {
                            // ride out the native reconnect, but never
                            // spin faster than the remaining budget allows
                            warn!(error = %err, "mqtt connection error, awaiting reconnect");
                            let backoff = left.min(Duration::from_millis(500));
                            sleep(backoff).await;
                        }
                        Err(_) => break,
                    }
                }
            }
            MqttTransport::Disabled => sleep(budget).await,
        }
    }
}
