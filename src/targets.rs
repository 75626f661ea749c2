//! Target directory records and the startup validation filter.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{error, warn};

/// Addresses treated as the executing host itself.
pub const LOOPBACK_ALIASES: [&str; 3] = ["localhost", "127.0.0.1", "::1"];

static DOTTED_QUAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,3}\.){3}\d{1,3}$").expect("dotted quad pattern compiles"));

/// A raw entry of the backend's target directory.
///
/// The directory may be served by older backends with French/Mongo field
/// names; aliases keep both vocabularies parseable. The address falls back
/// from `ipAddress` to the serial-number field, which legacy deployments
/// repurposed for addresses.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetRecord {
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    #[serde(default, alias = "nom")]
    pub name: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default, alias = "numeroSerie")]
    pub serial_number: Option<String>,
}

impl TargetRecord {
    pub fn address(&self) -> Option<&str> {
        self.ip_address.as_deref().or(self.serial_number.as_deref())
    }
}

/// A validated machine under monitoring, immutable for the process lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoredTarget {
    pub id: String,
    pub name: String,
    pub address: String,
}

pub fn is_loopback(address: &str) -> bool {
    LOOPBACK_ALIASES.contains(&address)
}

/// Loopback alias, or dotted-quad IPv4 with every octet in 0..=255.
/// Leading zeros are tolerated.
pub fn is_valid_address(address: &str) -> bool {
    if is_loopback(address) {
        return true;
    }
    DOTTED_QUAD.is_match(address)
        && address
            .split('.')
            .all(|octet| octet.parse::<u8>().is_ok())
}

/// Drops directory entries that cannot be monitored: records without an
/// identifier and records without a usable address never enter the
/// monitored set.
pub fn filter_targets(records: Vec<TargetRecord>) -> Vec<MonitoredTarget> {
    let mut monitored = vec![];

    for record in records {
        let name = record
            .name
            .clone()
            .unwrap_or_else(|| String::from("unknown"));

        let Some(id) = record.id.clone() else {
            error!("target {name} has no identifier, excluded from monitoring");
            continue;
        };

        let Some(address) = record.address() else {
            warn!("target {name} has no address, excluded from monitoring");
            continue;
        };

        if !is_valid_address(address) {
            warn!("target {name} has invalid address {address}, excluded from monitoring");
            continue;
        }

        monitored.push(MonitoredTarget {
            id,
            name,
            address: address.to_string(),
        });
    }

    monitored
}
