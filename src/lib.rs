pub mod acquire;
pub mod backend;
pub mod config;
pub mod ledger;
pub mod orchestrator;
pub mod providers;
pub mod sink;
pub mod targets;
pub mod thresholds;
pub mod util;

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single sample of a target's resource utilization, in percent.
///
/// Each resource is independently present or absent: a provider may be able
/// to read one of them but not the others. This is also the JSON body served
/// by remote metric agents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricReading {
    pub cpu: Option<f32>,
    pub ram: Option<f32>,
    pub disk: Option<f32>,
}

impl MetricReading {
    /// True if at least one resource could be read.
    pub fn has_any(&self) -> bool {
        self.cpu.is_some() || self.ram.is_some() || self.disk.is_some()
    }

    pub fn get(&self, resource: Resource) -> Option<f32> {
        match resource {
            Resource::Cpu => self.cpu,
            Resource::Ram => self.ram,
            Resource::Disk => self.disk,
        }
    }
}

/// The resource kinds monitored on every target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Cpu,
    Ram,
    Disk,
}

impl Resource {
    pub const ALL: [Resource; 3] = [Resource::Cpu, Resource::Ram, Resource::Disk];

    pub fn label(&self) -> &'static str {
        match self {
            Resource::Cpu => "CPU",
            Resource::Ram => "RAM",
            Resource::Disk => "DISK",
        }
    }

    /// Lowercase keyword used to bind incident titles to a resource.
    pub fn keyword(&self) -> &'static str {
        match self {
            Resource::Cpu => "cpu",
            Resource::Ram => "ram",
            Resource::Disk => "disk",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
