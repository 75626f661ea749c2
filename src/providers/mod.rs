//! Metric acquisition strategies.
//!
//! Each provider implements one way of reading `{cpu, ram, disk}` from a
//! target. Providers never raise past this boundary: an attempt yields a
//! typed [`Outcome`], and internal failures degrade to
//! [`Outcome::Unavailable`] with a reason the acquirer can log and tests
//! can assert on.

use std::fmt;

use async_trait::async_trait;

use crate::{MetricReading, targets::MonitoredTarget};

pub mod agent;
pub mod local;
pub mod snmp;

/// Result of one acquisition attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Reading(MetricReading),
    Unavailable(Unavailability),
}

/// Why a provider could not produce a reading.
#[derive(Debug, Clone, PartialEq)]
pub enum Unavailability {
    Timeout,
    PermissionDenied,
    ProtocolError(String),
    NotFound,
}

impl fmt::Display for Unavailability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unavailability::Timeout => write!(f, "request timed out"),
            Unavailability::PermissionDenied => write!(f, "permission denied"),
            Unavailability::ProtocolError(msg) => write!(f, "protocol error: {msg}"),
            Unavailability::NotFound => write!(f, "not found"),
        }
    }
}

/// One acquisition strategy.
///
/// Implementations must be `Send + Sync`: the acquirer holds them as trait
/// objects inside the orchestrator task.
#[async_trait]
pub trait MetricProvider: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Whether this strategy applies to the given target at all. Returning
    /// false skips the provider without counting as a failed attempt.
    fn supports(&self, target: &MonitoredTarget) -> bool;

    async fn acquire(&self, target: &MonitoredTarget) -> Outcome;
}
