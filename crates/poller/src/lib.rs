#![allow(dead_code)]
#![allow(async_fn_in_trait)]

use std::collections::{BTreeMap, HashMap};
use std::error::Error as StdError;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use metrics::counter;
use thiserror::Error;
use tracing::{debug, info, warn};

use ha_discovery::DiscoveryMapper;
use telemetry::ScaledValueDecoder;
use types::{
    DeviceKind, MeasurementRecord, NormalizedReading, RawReading, IDENTITY_FIELDS,
    PROTOCOL_METADATA_FIELDS,
};

/// Yields one flat reading per poll. An empty mapping signals a transient
/// device failure and is treated as a skipped poll, not an error.
pub trait DeviceReader {
    type Error: StdError + Send + Sync + 'static;

    fn kind(&self) -> DeviceKind;
    async fn read_all(&mut self) -> Result<RawReading, Self::Error>;
}

/// Accepts one batch of measurement records per cycle.
pub trait MetricsSink {
    type Error: StdError + Send + Sync + 'static;

    async fn write(&self, batch: &[MeasurementRecord]) -> Result<(), Self::Error>;
}

/// Topic/payload publication plus cooperative event-loop servicing. The
/// orchestrator calls `service` in short slices so broker keepalive and
/// incoming control traffic never starve during the inter-cycle idle.
pub trait PubSubTransport {
    type Error: StdError + Send + Sync + 'static;

    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), Self::Error>;
    async fn service(&mut self, budget: Duration);
}

#[derive(Debug, Error)]
pub enum PollerError {
    #[error("metrics sink write failed: {0}")]
    Sink(#[source] Box<dyn StdError + Send + Sync>),
    #[error("pub/sub publish failed: {0}")]
    Publish(#[source] Box<dyn StdError + Send + Sync>),
}

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub interval: Duration,
    /// Longest uninterrupted stretch the transport may go unserviced.
    pub service_slice: Duration,
    pub topic_prefix: String,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            service_slice: Duration::from_secs(1),
            topic_prefix: "solaredge".to_string(),
        }
    }
}

/// One polled endpoint. Each device keeps its own decoder so the
/// precomputed scale layout survives across cycles.
pub struct PolledDevice<R> {
    reader: R,
    primary: bool,
    decoder: ScaledValueDecoder,
}

impl<R: DeviceReader> PolledDevice<R> {
    pub fn new(reader: R, primary: bool) -> Self {
        Self {
            reader,
            primary,
            decoder: ScaledValueDecoder::new(),
        }
    }
}

/// Drives read -> decode -> filter -> derive -> publish for every device,
/// then flushes the cycle batch and idles out the remainder of the
/// interval. Runs forever on a single task; a sink or transport failure
/// propagates out so a supervisor can restart the process.
pub struct Orchestrator<R, S, P> {
    devices: Vec<PolledDevice<R>>,
    sink: S,
    transport: P,
    mapper: DiscoveryMapper,
    config: PollerConfig,
    /// Most recent record per serial, kept as a skip-on-unchanged hook.
    last_seen: HashMap<String, MeasurementRecord>,
}

impl<R, S, P> Orchestrator<R, S, P>
where
    R: DeviceReader,
    S: MetricsSink,
    P: PubSubTransport,
{
    pub fn new(
        devices: Vec<PolledDevice<R>>,
        sink: S,
        transport: P,
        mapper: DiscoveryMapper,
        config: PollerConfig,
    ) -> Self {
        Self {
            devices,
            sink,
            transport,
            mapper,
            config,
            last_seen: HashMap::new(),
        }
    }

    pub async fn run(mut self) -> Result<(), PollerError> {
        info!(
            devices = self.devices.len(),
            interval_ms = self.config.interval.as_millis(),
            "poll loop starting"
        );

        loop {
            // Anchor on actual wall-clock entry so an overrun shrinks the
            // next idle instead of accumulating.
            let cycle_start = Instant::now();
            let batch = self.run_cycle().await?;

            if !batch.is_empty() {
                self.sink
                    .write(&batch)
                    .await
                    .map_err(|err| PollerError::Sink(Box::new(err)))?;
                counter!("collector_records_written_total").increment(batch.len() as u64);
            }

            counter!("collector_cycles_total").increment(1);
            let elapsed = cycle_start.elapsed();
            let idle = remaining_idle(self.config.interval, elapsed);
            debug!(
                elapsed_ms = elapsed.as_millis(),
                idle_ms = idle.as_millis(),
                records = batch.len(),
                "poll cycle complete"
            );

            if idle.is_zero() {
                // Behind schedule: start the next cycle immediately, but
                // still give the broker one slice so keepalive survives.
                self.transport.service(self.config.service_slice).await;
            } else {
                self.idle(idle).await;
            }
        }
    }

    /// One full pass over every configured device. Public so a harness can
    /// exercise a single cycle without entering the endless loop.
    pub async fn run_cycle(&mut self) -> Result<Vec<MeasurementRecord>, PollerError> {
        let mut batch = Vec::with_capacity(self.devices.len());
        let timestamp_ms = unix_ms();

        for index in 0..self.devices.len() {
            let (kind, normalized) = {
                let device = &mut self.devices[index];
                let kind = device.reader.kind();
                let fetch_start = Instant::now();

                let raw = match device.reader.read_all().await {
                    Ok(raw) => raw,
                    Err(err) => {
                        warn!(device = index, error = %err, "device read failed");
                        counter!("collector_skipped_total", "reason" => "read_error")
                            .increment(1);
                        continue;
                    }
                };

                // The model check applies to every kind: an absent block
                // decodes all-zero registers into blank identity strings.
                if raw.is_empty() || !has_identity(&raw) || !telemetry::has_model(&raw) {
                    debug!(device = index, "empty or incomplete reading, skipping");
                    counter!("collector_skipped_total", "reason" => "incomplete")
                        .increment(1);
                    continue;
                }

                // Batteries report no status/temperature pair, so the
                // reboot heuristic only applies to inverters and meters.
                if matches!(kind, DeviceKind::Inverter | DeviceKind::Meter)
                    && !telemetry::is_plausible(&raw)
                {
                    debug!(device = index, "reboot transient suspected, skipping");
                    counter!("collector_skipped_total", "reason" => "anomaly").increment(1);
                    continue;
                }

                let mut normalized = device.decoder.decode(&raw);
                if device.primary && kind == DeviceKind::Inverter {
                    telemetry::augment(&mut normalized, fetch_start.elapsed());
                }
                (kind, normalized)
            };

            self.publish_device(&normalized).await?;

            let record = MeasurementRecord {
                measurement: kind.measurement().to_string(),
                tags: identity_tags(&normalized),
                timestamp_ms,
                fields: normalized.fields,
            };
            if let Some(serial) = record.tags.get("c_serialnumber") {
                self.last_seen.insert(serial.clone(), record.clone());
            }
            batch.push(record);
        }

        Ok(batch)
    }

    /// State payload plus per-entity discovery documents, emitted
    /// immediately rather than batched.
    async fn publish_device(&mut self, normalized: &NormalizedReading) -> Result<(), PollerError> {
        let Some(serial) = normalized.tags.get("c_serialnumber") else {
            return Ok(());
        };

        let state_topic = format!("{}/{}", self.config.topic_prefix, serial);
        let state: BTreeMap<&str, f64> = normalized
            .fields
            .iter()
            .filter(|(name, _)| !PROTOCOL_METADATA_FIELDS.contains(&name.as_str()))
            .map(|(name, value)| (name.as_str(), *value))
            .collect();
        let payload = serde_json::to_vec(&state).unwrap_or_default();
        self.transport
            .publish(&state_topic, payload)
            .await
            .map_err(|err| PollerError::Publish(Box::new(err)))?;

        for entity in self.mapper.entities() {
            if !normalized.fields.contains_key(*entity) {
                continue;
            }
            let entry = self.mapper.entry(entity, serial, &state_topic);
            let topic = self.mapper.config_topic(serial, entity);
            let payload = serde_json::to_vec(&entry).unwrap_or_default();
            self.transport
                .publish(&topic, payload)
                .await
                .map_err(|err| PollerError::Publish(Box::new(err)))?;
        }

        counter!("collector_publications_total").increment(1);
        Ok(())
    }

    /// Burns the idle window in bounded service slices.
    async fn idle(&mut self, budget: Duration) {
        let deadline = Instant::now() + budget;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                break;
            }
            self.transport.service(left.min(self.config.service_slice)).await;
        }
    }
}

/// Time left in the interval after a cycle; zero when the cycle overran.
pub fn remaining_idle(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

/// A reading missing any identity point yields no record and no
/// publications.
pub fn has_identity(raw: &RawReading) -> bool {
    IDENTITY_FIELDS.iter().all(|name| raw.contains_key(*name))
}

/// Identity points become sink tags whether the device reports them as
/// strings or register numbers.
fn identity_tags(normalized: &NormalizedReading) -> BTreeMap<String, String> {
    let mut tags = BTreeMap::new();
    let names = IDENTITY_FIELDS.iter().chain(std::iter::once(&"c_option"));
    for name in names {
        if let Some(text) = normalized.tags.get(*name) {
            tags.insert((*name).to_string(), text.clone());
        } else if let Some(value) = normalized.fields.get(*name) {
            tags.insert((*name).to_string(), format_numeric_tag(*value));
        }
    }
    tags
}

fn format_numeric_tag(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
