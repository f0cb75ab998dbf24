//! Configuration system for routersim.
//!
//! Resolution order: environment variables → config file → defaults.
//! Command-line flags of the daemon are applied on top of the result.
//!
//! Config file location:
//!   1. $ROUTERSIM_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/routersim/config.toml
//!   3. ~/.config/routersim/config.toml

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Routing strategy selector. Chosen once at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    #[serde(rename = "flooding")]
    Flooding,
    #[serde(rename = "dvr")]
    DistanceVector,
    #[default]
    #[serde(rename = "lsr")]
    LinkState,
}

impl Algorithm {
    /// Protocol tag carried in the `proto` field of every packet.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Flooding => "flooding",
            Self::DistanceVector => "dvr",
            Self::LinkState => "lsr",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Algorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "flooding" | "flood" => Ok(Self::Flooding),
            "dvr" | "dv" | "distance-vector" => Ok(Self::DistanceVector),
            "lsr" | "ls" | "link-state" => Ok(Self::LinkState),
            other => Err(ConfigError::InvalidValue("algorithm", other.to_string())),
        }
    }
}

/// Which transport backend carries packets between nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// One TCP connection per packet, loopback or LAN.
    #[default]
    Tcp,
    /// In-process pub/sub channels; every topology node runs in one process.
    Channel,
}

impl FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" | "socket" => Ok(Self::Tcp),
            "channel" | "pubsub" => Ok(Self::Channel),
            other => Err(ConfigError::InvalidValue("transport", other.to_string())),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub node: NodeConfig,
    pub timers: TimerConfig,
    pub packets: PacketConfig,
    pub limits: LimitsConfig,
    pub transport: TransportConfig,
    pub topology: TopologyPaths,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// This node's id. Usually given on the command line.
    pub id: String,
    pub algorithm: Algorithm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    pub hello_interval_ms: u64,
    pub info_interval_ms: u64,
    /// A neighbor silent for longer than this is considered down. 0 = never.
    pub neighbor_timeout_ms: u64,
    /// Periodic routing table dump. 0 = only on change.
    pub table_print_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacketConfig {
    /// TTL for hello, echo and info packets.
    pub control_ttl: u32,
    /// TTL for user messages originated by this node.
    pub message_ttl: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Flooding dedup set size before the oldest half is dropped.
    pub flood_seen_capacity: usize,
    /// Max remembered (origin, seq) LSP keys.
    pub lsp_seen_capacity: usize,
    /// LSP keys older than this are forgotten.
    pub lsp_seen_window_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub kind: TransportKind,
    /// Host used for nodes without an explicit address in the names file.
    pub host: String,
    /// Base of the derived per-node TCP port range (base..base+1000).
    pub base_port: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyPaths {
    /// Topology JSON (`{"type":"topo","config":{...}}`). Empty = unset.
    pub topo_path: PathBuf,
    /// Names JSON (`{"type":"names","config":{...}}`). Empty = unset.
    pub names_path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Local HTTP API port. 0 = disabled.
    pub port: u16,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            hello_interval_ms: 2_000,
            info_interval_ms: 3_000,
            neighbor_timeout_ms: 0,
            table_print_interval_ms: 0,
        }
    }
}

impl Default for PacketConfig {
    fn default() -> Self {
        Self {
            control_ttl: 8,
            message_ttl: 16,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            flood_seen_capacity: 10_000,
            lsp_seen_capacity: 10_000,
            lsp_seen_window_secs: 300,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::Tcp,
            host: "127.0.0.1".to_string(),
            base_port: 50_000,
        }
    }
}

impl TimerConfig {
    pub fn hello_interval(&self) -> Duration {
        Duration::from_millis(self.hello_interval_ms.max(1))
    }

    pub fn info_interval(&self) -> Duration {
        Duration::from_millis(self.info_interval_ms.max(1))
    }

    pub fn neighbor_timeout(&self) -> Option<Duration> {
        (self.neighbor_timeout_ms > 0).then(|| Duration::from_millis(self.neighbor_timeout_ms))
    }

    pub fn table_print_interval(&self) -> Option<Duration> {
        (self.table_print_interval_ms > 0)
            .then(|| Duration::from_millis(self.table_print_interval_ms))
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

pub fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("routersim")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid {0}: {1}")]
    InvalidValue(&'static str, String),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl RouterConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_at(&Self::file_path())
    }

    /// Load `path`, then apply env overrides.
    pub fn load_at(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load a specific file without env overrides. Missing file = defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(RouterConfig::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("ROUTERSIM_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write the default config to `path` if nothing is there yet.
    pub fn write_default_if_missing(path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))?;
        }
        let text = toml::to_string_pretty(&RouterConfig::default())
            .map_err(ConfigError::SerializeFailed)?;
        std::fs::write(path, text).map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))
    }

    /// Apply ROUTERSIM_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("ROUTERSIM_NODE__ID") {
            self.node.id = v;
        }
        if let Ok(v) = std::env::var("ROUTERSIM_NODE__ALGORITHM") {
            if let Ok(a) = v.parse() {
                self.node.algorithm = a;
            }
        }
        if let Ok(v) = std::env::var("ROUTERSIM_TIMERS__HELLO_INTERVAL_MS") {
            if let Ok(ms) = v.parse() {
                self.timers.hello_interval_ms = ms;
            }
        }
        if let Ok(v) = std::env::var("ROUTERSIM_TIMERS__INFO_INTERVAL_MS") {
            if let Ok(ms) = v.parse() {
                self.timers.info_interval_ms = ms;
            }
        }
        if let Ok(v) = std::env::var("ROUTERSIM_TRANSPORT__KIND") {
            if let Ok(k) = v.parse() {
                self.transport.kind = k;
            }
        }
        if let Ok(v) = std::env::var("ROUTERSIM_API__PORT") {
            if let Ok(p) = v.parse() {
                self.api.port = p;
            }
        }
    }
}
