use std::time::Duration;

use tokio::time::Instant;

use mqtt_transport::{MqttConfig, MqttTransport};
use poller::PubSubTransport;

#[test]
fn config_defaults_are_anonymous_localhost() {
    let config = MqttConfig::default();
    assert_eq!(config.host, "localhost");
    assert_eq!(config.port, 1883);
    assert!(config.username.is_none());
    assert!(config.password.is_none());
    assert_eq!(config.keep_alive, Duration::from_secs(5));
}

#[tokio::test]
async fn disabled_transport_accepts_publishes() {
    let mut transport = MqttTransport::disabled();
    transport
        .publish("solaredge/7E123456", b"{}".to_vec())
        .await
        .expect("publish on disabled transport");
}

#[tokio::test(start_paused = true)]
async fn disabled_transport_burns_the_full_service_budget() {
    let mut transport = MqttTransport::disabled();
    let budget = Duration::from_secs(3);

    let start = Instant::now();
    transport.service(budget).await;
    assert!(start.elapsed() >= budget);
}

#[tokio::test(start_paused = true)]
async fn service_returns_at_the_deadline_while_broker_is_down() {
    // Nothing listens on this port, so every poll fails; the bounded
    // backoff must still let service return once the budget is spent.
    let config = MqttConfig {
        host: "127.0.0.1".to_string(),
        port: 1,
        ..MqttConfig::default()
    };
    let options = rumqttc::MqttOptions::new(&config.client_id, &config.host, config.port);
    let (client, event_loop) = rumqttc::AsyncClient::new(options, 8);
    let mut transport = MqttTransport::Connected { client, event_loop };

    let budget = Duration::from_secs(2);
    let start = Instant::now();
    transport.service(budget).await;
    assert!(start.elapsed() >= budget);
}
