#![allow(dead_code)]

pub mod registers;

use std::cmp::min;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};
use tokio_modbus::client::tcp;
use tokio_modbus::client::Context;
use tokio_modbus::prelude::{Reader, Slave, SlaveContext};
use tracing::{debug, warn};

use poller::DeviceReader;
use types::{DeviceKind, RawReading};

use registers::{RegisterBlock, BATTERY_BLOCKS, INVERTER_BLOCK, METER_BLOCKS};

/// Connection options for a SolarEdge Modbus TCP endpoint. One connection
/// serves the master inverter and every chained unit behind it; the bus is
/// serial-multiplexed, so requests are strictly one at a time.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Retries per request after the initial attempt.
    pub retry_count: usize,
    /// Base delay between retries in milliseconds (exponential backoff).
    pub retry_backoff_ms: u64,
    pub retry_max_backoff_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1502,
            timeout_ms: 1_000,
            retry_count: 2,
            retry_backoff_ms: 100,
            retry_max_backoff_ms: 2_000,
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid socket address {0}:{1}")]
    InvalidAddress(String, u16),
    #[error("modbus transport error: {0}")]
    Modbus(std::io::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Shared Modbus TCP transport; the mutex serializes unit access.
#[derive(Debug)]
pub struct Connection {
    config: ClientConfig,
    context: Mutex<Context>,
}

impl Connection {
    pub async fn connect(config: ClientConfig) -> Result<Arc<Self>, ClientError> {
        let addr = format!("{}:{}", config.host, config.port)
            .parse::<SocketAddr>()
            .map_err(|_| ClientError::InvalidAddress(config.host.clone(), config.port))?;
        let context = tcp::connect(addr).await?;
        Ok(Arc::new(Self {
            config,
            context: Mutex::new(context),
        }))
    }

    pub async fn read_block(
        &self,
        unit_id: u8,
        start: u16,
        count: u16,
    ) -> Result<Vec<u16>, ClientError> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut ctx = self.context.lock().await;
        ctx.set_slave(Slave(unit_id));

        let mut attempts = 0usize;
        let mut last_error = None;
        loop {
            let request = ctx.read_holding_registers(start, count);
            let result = timeout(Duration::from_millis(self.config.timeout_ms), request).await;
            match result {
                Ok(Ok(values)) => {
                    debug!(unit_id, start, count, "modbus read ok");
                    return Ok(values);
                }
                Ok(Err(err)) => {
                    warn!(unit_id, start, count, error = %err, "modbus read error");
                    last_error = Some(ClientError::Modbus(err));
                }
                Err(_) => {
                    warn!(unit_id, start, count, "modbus read timeout");
                    last_error = Some(ClientError::Timeout {
                        timeout_ms: self.config.timeout_ms,
                    });
                }
            }

            if attempts >= self.config.retry_count {
                return Err(last_error.unwrap_or(ClientError::Timeout {
                    timeout_ms: self.config.timeout_ms,
                }));
            }

            let delay_ms = self.retry_delay_ms(attempts);
            attempts += 1;
            sleep(Duration::from_millis(delay_ms)).await;
        }
    }

    fn retry_delay_ms(&self, attempt: usize) -> u64 {
        let base = self.config.retry_backoff_ms.max(1);
        let shift = u32::try_from(attempt).unwrap_or(u32::MAX).min(31);
        let factor = 1u64.checked_shl(shift).unwrap_or(u64::MAX);
        let delay = base.saturating_mul(factor);
        let max = self.config.retry_max_backoff_ms.max(base);
        min(delay, max)
    }
}

/// One addressable SolarEdge endpoint: the inverter itself or an attached
/// meter/battery block behind the same unit id.
pub struct SolarEdgeDevice {
    connection: Arc<Connection>,
    unit_id: u8,
    block: &'static RegisterBlock,
}

impl SolarEdgeDevice {
    pub fn inverter(connection: Arc<Connection>, unit_id: u8) -> Self {
        Self {
            connection,
            unit_id,
            block: &INVERTER_BLOCK,
        }
    }

    /// Meters attached to this inverter, bus order. SolarEdge maps up to
    /// three; the count comes from configuration because the register map
    /// cannot be probed cheaply.
    pub fn meters(&self, count: usize) -> Vec<SolarEdgeDevice> {
        METER_BLOCKS
            .iter()
            .take(count)
            .map(|block| SolarEdgeDevice {
                connection: Arc::clone(&self.connection),
                unit_id: self.unit_id,
                block,
            })
            .collect()
    }

    pub fn batteries(&self, count: usize) -> Vec<SolarEdgeDevice> {
        BATTERY_BLOCKS
            .iter()
            .take(count)
            .map(|block| SolarEdgeDevice {
                connection: Arc::clone(&self.connection),
                unit_id: self.unit_id,
                block,
            })
            .collect()
    }

    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }
}

impl DeviceReader for SolarEdgeDevice {
    type Error = ClientError;

    fn kind(&self) -> DeviceKind {
        self.block.kind
    }

    async fn read_all(&mut self) -> Result<RawReading, ClientError> {
        let registers = self
            .connection
            .read_block(self.unit_id, self.block.base, self.block.length)
            .await?;
        Ok(self.block.decode(&registers))
    }
}
