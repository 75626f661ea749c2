//! Telemetry sink: ships every acquired sample to InfluxDB as line
//! protocol, alongside a reachability flag per machine.
//!
//! Sink failures are never allowed to interfere with alerting; the
//! orchestrator logs them and moves on.

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{instrument, trace};

use crate::{MetricReading, config::InfluxConfig, targets::MonitoredTarget, util};

pub type SinkResult<T> = Result<T, SinkError>;

#[derive(Debug, PartialEq, Eq)]
pub enum SinkError {
    MissingToken,
    Transport(String),
    Rejected { status: u16, body: String },
}

impl Display for SinkError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::MissingToken => write!(f, "no influx token configured"),
            SinkError::Transport(message) => write!(f, "transport error: {message}"),
            SinkError::Rejected { status, body } => {
                write!(f, "write rejected with status {status}: {body}")
            }
        }
    }
}

impl std::error::Error for SinkError {}

impl From<reqwest::Error> for SinkError {
    fn from(value: reqwest::Error) -> Self {
        SinkError::Transport(value.to_string())
    }
}

#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn write_sample(
        &self,
        target: &MonitoredTarget,
        reading: &MetricReading,
    ) -> SinkResult<()>;

    async fn close(&self) -> SinkResult<()>;
}

/// Tag values need commas, spaces and equals signs escaped.
fn escape_tag(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace(',', "\\,")
        .replace(' ', "\\ ")
        .replace('=', "\\=")
}

/// Renders the two lines written per sample: the metric values and the
/// reachability flag. Absent metrics are written as zero, matching what
/// the dashboards expect.
fn sample_lines(
    target: &MonitoredTarget,
    reading: &MetricReading,
    timestamp: i64,
) -> (String, String) {
    let machine = escape_tag(&target.name);
    let ip = escape_tag(&target.address);
    let cpu = reading.cpu.unwrap_or(0.0);
    let ram = reading.ram.unwrap_or(0.0);
    let disk = reading.disk.unwrap_or(0.0);
    let up = i32::from(reading.has_any());

    let metrics = format!(
        "machine_metrics,machine={machine},ip={ip} cpu={cpu},ram={ram},disk={disk} {timestamp}"
    );
    let status = format!("machine_status,machine={machine},ip={ip} status={up}i {timestamp}");

    (metrics, status)
}

#[derive(Debug)]
pub struct InfluxSink {
    url: String,
    org: String,
    bucket: String,
    token: String,
    client: reqwest::Client,
}

impl InfluxSink {
    pub fn new(config: &InfluxConfig) -> SinkResult<Self> {
        let token = config
            .token
            .clone()
            .or_else(util::get_influx_token)
            .ok_or(SinkError::MissingToken)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            url: config.url.trim_end_matches('/').to_string(),
            org: config.org.clone(),
            bucket: config.bucket.clone(),
            token,
            client,
        })
    }
}

#[async_trait]
impl MetricsSink for InfluxSink {
    #[instrument(skip(self, reading), fields(target = %target.name))]
    async fn write_sample(
        &self,
        target: &MonitoredTarget,
        reading: &MetricReading,
    ) -> SinkResult<()> {
        let timestamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let (metrics, status) = sample_lines(target, reading, timestamp);

        let response = self
            .client
            .post(format!("{}/api/v2/write", self.url))
            .query(&[
                ("org", self.org.as_str()),
                ("bucket", self.bucket.as_str()),
                ("precision", "ns"),
            ])
            .header("Authorization", format!("Token {}", self.token))
            .body(format!("{metrics}\n{status}"))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Rejected { status, body });
        }

        trace!("wrote sample for {}", target.name);
        Ok(())
    }

    async fn close(&self) -> SinkResult<()> {
        Ok(())
    }
}
