use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

/// Polls a SolarEdge inverter over Modbus TCP and publishes readings to
/// InfluxDB and, optionally, MQTT with Home Assistant discovery.
#[derive(Debug, Parser)]
#[command(name = "solaredge-collector")]
pub struct Args {
    /// Modbus TCP address
    pub host: String,
    /// Modbus TCP port
    pub port: u16,

    /// Connection timeout in seconds
    #[arg(long, default_value_t = 1)]
    pub timeout: u64,
    /// Modbus device addresses, comma separated; the first is the master
    #[arg(long, default_value = "1")]
    pub unit: String,
    /// Update interval in seconds
    #[arg(long, default_value_t = 10)]
    pub interval: u64,
    /// Attached meter count on the master inverter
    #[arg(long, default_value_t = 0)]
    pub meters: usize,
    /// Attached battery count on the master inverter
    #[arg(long, default_value_t = 0)]
    pub batteries: usize,

    /// InfluxDB host
    #[arg(long, default_value = "localhost")]
    pub influx_host: String,
    /// InfluxDB port
    #[arg(long, default_value_t = 8086)]
    pub influx_port: u16,
    /// Full InfluxDB URL; overrides host/port when set
    #[arg(long)]
    pub influx_url: Option<String>,
    /// InfluxDB database/bucket
    #[arg(long, default_value = "solaredge")]
    pub influx_db: String,
    /// InfluxDB auth token
    #[arg(long)]
    pub influx_token: Option<String>,
    /// InfluxDB v2 organization
    #[arg(long)]
    pub influx_org: Option<String>,

    /// MQTT hostname (without port)
    #[arg(long)]
    pub mqtt_host: Option<String>,
    /// MQTT port
    #[arg(long, default_value_t = 1883)]
    pub mqtt_port: u16,
    /// MQTT username
    #[arg(long)]
    pub mqtt_user: Option<String>,
    /// MQTT password
    #[arg(long)]
    pub mqtt_pass: Option<String>,
    /// Topic prefix for state payloads
    #[arg(long, default_value = "solaredge")]
    pub mqtt_prefix: String,
}

impl Args {
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("port must be between 1 and 65535");
        }
        if self.timeout == 0 {
            anyhow::bail!("timeout must be >= 1 second");
        }
        if self.interval == 0 {
            anyhow::bail!("interval must be >= 1 second");
        }
        if self.mqtt_port == 0 {
            anyhow::bail!("mqtt_port must be between 1 and 65535");
        }
        if self.mqtt_prefix.trim().is_empty() {
            anyhow::bail!("mqtt_prefix must be non-empty");
        }
        self.unit_ids()?;
        Ok(())
    }

    /// Parsed device address list; the first entry is the master.
    pub fn unit_ids(&self) -> Result<Vec<u8>> {
        let ids = self
            .unit
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                entry
                    .parse::<u8>()
                    .with_context(|| format!("invalid unit id '{entry}'"))
            })
            .collect::<Result<Vec<u8>>>()?;
        if ids.is_empty() {
            anyhow::bail!("unit list must contain at least one device address");
        }
        Ok(ids)
    }

    pub fn influx_url(&self) -> String {
        self.influx_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.influx_host, self.influx_port))
    }

    /// MQTT is enabled only when host and both credentials are given.
    pub fn mqtt_enabled(&self) -> bool {
        self.mqtt_host.is_some() && self.mqtt_user.is_some() && self.mqtt_pass.is_some()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}
