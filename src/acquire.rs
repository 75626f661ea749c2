//! Strategy selection for metric acquisition.

use tracing::{debug, instrument};

use crate::{
    MetricReading,
    config::Config,
    providers::{
        MetricProvider, Outcome, agent::AgentProvider, local::LocalProvider, snmp::SnmpProvider,
    },
    targets::MonitoredTarget,
};

pub struct MetricAcquirer {
    /// Providers in priority order; the first usable reading wins.
    providers: Vec<Box<dyn MetricProvider>>,
}

impl MetricAcquirer {
    pub fn new(providers: Vec<Box<dyn MetricProvider>>) -> Self {
        Self { providers }
    }

    /// Builds the standard chain: local readings for loopback targets,
    /// the remote agent when one is configured, then SNMP as the last
    /// resort for plain network equipment.
    pub fn from_config(config: &Config) -> Self {
        let mut providers: Vec<Box<dyn MetricProvider>> = vec![Box::new(LocalProvider::new())];
        if let Some(agent) = &config.agent {
            providers.push(Box::new(AgentProvider::new(agent)));
        }
        providers.push(Box::new(SnmpProvider::new(&config.snmp)));
        Self::new(providers)
    }

    /// Asks each supporting provider in turn and returns the first reading
    /// that actually carries a metric. Readings with every field absent do
    /// not count as an answer.
    #[instrument(skip(self, target), fields(target = %target.name))]
    pub async fn acquire(&self, target: &MonitoredTarget) -> Option<MetricReading> {
        for provider in &self.providers {
            if !provider.supports(target) {
                continue;
            }

            match provider.acquire(target).await {
                Outcome::Reading(reading) if reading.has_any() => {
                    debug!("{} answered for {}", provider.name(), target.address);
                    return Some(reading);
                }
                Outcome::Reading(_) => {
                    debug!(
                        "{} reached {} but returned no metrics",
                        provider.name(),
                        target.address
                    );
                }
                Outcome::Unavailable(unavailable) => {
                    debug!(
                        "{} could not reach {}: {}",
                        provider.name(),
                        target.address,
                        unavailable
                    );
                }
            }
        }

        None
    }
}
