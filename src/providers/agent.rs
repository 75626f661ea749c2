//! Remote-native strategy: queries a metrics agent running on the target.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::trace;

use crate::{MetricReading, config::AgentConfig, targets::MonitoredTarget, util};

use super::{MetricProvider, Outcome, Unavailability};

pub struct AgentProvider {
    /// HTTP client (reused across requests for efficiency)
    client: reqwest::Client,
    port: u16,
    token: Option<String>,
}

impl AgentProvider {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.timeout))
                .build()
                .expect("Failed to build HTTP client"),
            port: config.port,
            token: config.token.clone().or_else(util::get_agent_secret),
        }
    }
}

#[async_trait]
impl MetricProvider for AgentProvider {
    fn name(&self) -> &'static str {
        "agent"
    }

    fn supports(&self, _target: &MonitoredTarget) -> bool {
        true
    }

    async fn acquire(&self, target: &MonitoredTarget) -> Outcome {
        let url = format!("http://{}:{}/metrics", target.address, self.port);

        trace!("requesting metrics from {url}");

        let mut request = self.client.get(&url);

        if let Some(token) = &self.token {
            request = request.header("X-MONITORING-SECRET", token);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Outcome::Unavailable(Unavailability::Timeout),
            Err(e) => return Outcome::Unavailable(Unavailability::ProtocolError(e.to_string())),
        };

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Outcome::Unavailable(Unavailability::PermissionDenied);
            }
            StatusCode::NOT_FOUND => return Outcome::Unavailable(Unavailability::NotFound),
            status if !status.is_success() => {
                return Outcome::Unavailable(Unavailability::ProtocolError(format!(
                    "unexpected status {status}"
                )));
            }
            _ => {}
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return Outcome::Unavailable(Unavailability::ProtocolError(e.to_string())),
        };

        match serde_json::from_str::<MetricReading>(&body) {
            Ok(reading) => Outcome::Reading(reading),
            Err(e) => Outcome::Unavailable(Unavailability::ProtocolError(e.to_string())),
        }
    }
}
