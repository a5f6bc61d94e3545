use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use collector_app::Args;
use ha_discovery::DiscoveryMapper;
use influx_sink::{InfluxSink, SinkConfig};
use inverter_client::{ClientConfig, Connection, SolarEdgeDevice};
use mqtt_transport::{MqttConfig, MqttTransport};
use poller::{Orchestrator, PolledDevice, PollerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    args.validate().context("argument validation failed")?;
    let unit_ids = args.unit_ids()?;

    let sink = InfluxSink::connect(SinkConfig {
        url: args.influx_url(),
        database: args.influx_db.clone(),
        token: args.influx_token.clone(),
        org: args.influx_org.clone(),
    });
    sink.ping().await.with_context(|| {
        format!(
            "database connection failed: {}/{}",
            args.influx_url(),
            args.influx_db
        )
    })?;

    let transport = if args.mqtt_enabled() {
        let config = MqttConfig {
            host: args.mqtt_host.clone().expect("mqtt host checked"),
            port: args.mqtt_port,
            username: args.mqtt_user.clone(),
            password: args.mqtt_pass.clone(),
            ..MqttConfig::default()
        };
        MqttTransport::connect(config)
            .await
            .context("mqtt broker connection failed")?
    } else {
        info!("mqtt publishing disabled");
        MqttTransport::disabled()
    };

    let connection = Connection::connect(ClientConfig {
        host: args.host.clone(),
        port: args.port,
        timeout_ms: args.request_timeout().as_millis() as u64,
        ..ClientConfig::default()
    })
    .await
    .with_context(|| format!("modbus connection failed: {}:{}", args.host, args.port))?;

    // Master first, then its sub-devices, then chained secondaries; the
    // shared bus is queried strictly in this order.
    let mut devices = Vec::new();
    let master = SolarEdgeDevice::inverter(connection.clone(), unit_ids[0]);
    for meter in master.meters(args.meters) {
        devices.push(PolledDevice::new(meter, false));
    }
    for battery in master.batteries(args.batteries) {
        devices.push(PolledDevice::new(battery, false));
    }
    devices.insert(0, PolledDevice::new(master, true));
    for unit_id in &unit_ids[1..] {
        devices.push(PolledDevice::new(
            SolarEdgeDevice::inverter(connection.clone(), *unit_id),
            false,
        ));
    }

    let orchestrator = Orchestrator::new(
        devices,
        sink,
        transport,
        DiscoveryMapper::default(),
        PollerConfig {
            interval: args.poll_interval(),
            topic_prefix: args.mqtt_prefix.clone(),
            ..PollerConfig::default()
        },
    );

    notify_ready();
    info!(
        host = %args.host,
        port = args.port,
        units = ?unit_ids,
        interval_s = args.interval,
        "collector starting"
    );

    // A sink or broker failure mid-run lands here; exiting non-zero lets
    // the supervisor restart with a clean slate.
    orchestrator.run().await.context("poll loop failed")
}

#[cfg(target_os = "linux")]
fn notify_ready() {
    if let Err(err) = sd_notify::notify(true, &[sd_notify::NotifyState::Ready]) {
        warn!(error = %err, "systemd ready notify failed");
    }
}

#[cfg(not(target_os = "linux"))]
fn notify_ready() {}
