//! Breach detection and severity grading for metric readings.

use std::fmt::{self, Display, Formatter};

use crate::{MetricReading, Resource, config::Thresholds};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Moderate,
    Elevated,
    Critical,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Moderate => "Moderate",
            Severity::Elevated => "Elevated",
            Severity::Critical => "Critical",
        }
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A metric that crossed its configured threshold on one target.
#[derive(Debug, Clone, PartialEq)]
pub struct BreachEvent {
    pub target_id: String,
    pub resource: Resource,
    pub value: f32,
    pub threshold: f32,
    pub severity: Severity,
}

/// A value only breaches when it is strictly above the threshold. Severity
/// grows with the overshoot: more than 15 points above is critical, more
/// than 10 is elevated, anything else is moderate.
pub fn classify(value: f32, threshold: f32) -> Option<Severity> {
    if value <= threshold {
        return None;
    }

    let severity = if value > threshold + 15.0 {
        Severity::Critical
    } else if value > threshold + 10.0 {
        Severity::Elevated
    } else {
        Severity::Moderate
    };

    Some(severity)
}

/// Grades every present metric of a reading against its threshold.
pub fn evaluate(
    target_id: &str,
    reading: &MetricReading,
    thresholds: &Thresholds,
) -> Vec<BreachEvent> {
    Resource::ALL
        .into_iter()
        .filter_map(|resource| {
            let value = reading.get(resource)?;
            let threshold = thresholds.for_resource(resource);
            classify(value, threshold).map(|severity| BreachEvent {
                target_id: target_id.to_string(),
                resource,
                value,
                threshold,
                severity,
            })
        })
        .collect()
}
