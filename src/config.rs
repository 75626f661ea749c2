use tracing::trace;

use crate::Resource;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    /// Seconds between two polling cycles
    #[serde(default = "default_interval")]
    pub interval: u64,

    /// Minimum seconds between two normal incidents for the same
    /// target/resource pair
    #[serde(default = "default_cooldown")]
    pub cooldown: u64,

    /// Number of breaching ticks after an external resolution before a
    /// relapse incident is raised
    #[serde(default = "default_post_resolution_checks")]
    pub post_resolution_checks: u32,

    #[serde(default)]
    pub thresholds: Thresholds,

    pub backend: BackendConfig,

    /// Time-series sink; samples are dropped when absent
    pub influx: Option<InfluxConfig>,

    /// Remote metric agents; the strategy is skipped when absent
    pub agent: Option<AgentConfig>,

    #[serde(default)]
    pub snmp: SnmpConfig,
}

/// Incident tracker backend (authentication, target directory, incidents).
#[derive(Debug, Clone, serde::Deserialize)]
pub struct BackendConfig {
    pub url: String,
    pub email: String,
    /// Falls back to the BACKEND_PASSWORD environment variable
    pub password: Option<String>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct InfluxConfig {
    pub url: String,
    pub org: String,
    pub bucket: String,
    /// Falls back to the INFLUX_TOKEN environment variable
    pub token: Option<String>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct AgentConfig {
    #[serde(default = "crate::util::get_default_agent_port")]
    pub port: u16,
    /// Shared secret sent as X-MONITORING-SECRET; falls back to the
    /// AGENT_SECRET environment variable
    pub token: Option<String>,
    #[serde(default = "default_agent_timeout")]
    pub timeout: u64,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct SnmpConfig {
    #[serde(default = "default_snmp_community")]
    pub community: String,
    #[serde(default = "default_snmp_port")]
    pub port: u16,
    #[serde(default = "default_snmp_timeout")]
    pub timeout: u64,
}

impl Default for SnmpConfig {
    fn default() -> Self {
        Self {
            community: default_snmp_community(),
            port: default_snmp_port(),
            timeout: default_snmp_timeout(),
        }
    }
}

/// Breach thresholds in percent, shared by all targets.
#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub struct Thresholds {
    #[serde(default = "default_cpu_threshold")]
    pub cpu: f32,
    #[serde(default = "default_ram_threshold")]
    pub ram: f32,
    #[serde(default = "default_disk_threshold")]
    pub disk: f32,
}

impl Thresholds {
    pub fn for_resource(&self, resource: Resource) -> f32 {
        match resource {
            Resource::Cpu => self.cpu,
            Resource::Ram => self.ram,
            Resource::Disk => self.disk,
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cpu: default_cpu_threshold(),
            ram: default_ram_threshold(),
            disk: default_disk_threshold(),
        }
    }
}

fn default_interval() -> u64 {
    10
}

fn default_cooldown() -> u64 {
    300
}

fn default_post_resolution_checks() -> u32 {
    3
}

fn default_cpu_threshold() -> f32 {
    80.0
}

fn default_ram_threshold() -> f32 {
    85.0
}

fn default_disk_threshold() -> f32 {
    90.0
}

fn default_agent_timeout() -> u64 {
    5
}

fn default_snmp_community() -> String {
    String::from("public")
}

fn default_snmp_port() -> u16 {
    161
}

fn default_snmp_timeout() -> u64 {
    2
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|_| anyhow::anyhow!("Invalid configuration file provided!"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
