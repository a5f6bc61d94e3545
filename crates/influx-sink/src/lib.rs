#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use influxdb::{Client, InfluxDbWriteable, Timestamp, WriteQuery};
use thiserror::Error;
use tracing::{debug, info};

use poller::MetricsSink;
use types::MeasurementRecord;

#[derive(Debug, Clone)]
pub struct SinkConfig {
    pub url: String,
    pub database: String,
    pub token: Option<String>,
    /// InfluxDB v2 organization. The v1-compatibility write endpoint
    /// resolves the org from the token's DBRP mapping, so this is
    /// informational at the wire level but kept for operator visibility.
    pub org: Option<String>,
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("influxdb error: {0}")]
    Influx(#[from] influxdb::Error),
}

/// Metrics sink backed by an InfluxDB HTTP endpoint. The mock variant
/// captures records instead of talking to a server, for harness tests.
#[derive(Clone)]
pub struct InfluxSink {
    client: Option<Client>,
    captured: Arc<Mutex<Vec<MeasurementRecord>>>,
}

impl InfluxSink {
    pub fn connect(config: SinkConfig) -> Self {
        let mut client = Client::new(&config.url, &config.database);
        if let Some(token) = &config.token {
            client = client.with_token(token);
        }
        info!(
            url = %config.url,
            database = %config.database,
            org = config.org.as_deref().unwrap_or("-"),
            "influxdb sink ready"
        );
        Self {
            client: Some(client),
            captured: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn new_mock() -> Self {
        Self {
            client: None,
            captured: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Startup reachability check; a refused connection here is fatal for
    /// the process.
    pub async fn ping(&self) -> Result<(), SinkError> {
        if let Some(client) = &self.client {
            client.ping().await?;
        }
        Ok(())
    }

    /// Records captured by a mock sink, in write order.
    pub fn captured(&self) -> Vec<MeasurementRecord> {
        self.captured.lock().expect("captured lock").clone()
    }

    fn to_query(record: &MeasurementRecord) -> WriteQuery {
        let mut query = Timestamp::Milliseconds(u128::from(record.timestamp_ms))
            .into_query(&record.measurement);
        for (name, value) in &record.tags {
            query = query.add_tag(name.as_str(), value.as_str());
        }
        for (name, value) in &record.fields {
            query = query.add_field(name.as_str(), *value);
        }
        query
    }
}

impl MetricsSink for InfluxSink {
    type Error = SinkError;

    async fn write(&self, batch: &[MeasurementRecord]) -> Result<(), SinkError> {
        match &self.client {
            Some(client) => {
                for record in batch {
                    client.query(Self::to_query(record)).await?;
                }
                debug!(records = batch.len(), "influxdb batch written");
            }
            None => {
                self.captured
                    .lock()
                    .expect("captured lock")
                    .extend_from_slice(batch);
            }
        }
        Ok(())
    }
}
