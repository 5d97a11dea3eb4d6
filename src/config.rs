// Configuration file handling

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::logging::{NoopLogger, RpcLogger, TracingLogger};

pub const ENV_CLIENT_STREAM_CONFIG: &str = "CLIENT_STREAM_CONFIG";
pub const ENV_CLIENT_STREAM_COMPRESSION: &str = "CLIENT_STREAM_COMPRESSION";
pub const CONFIG_FILE_NAME: &str = ".clientstreamrc.toml";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub call: CallConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMode {
    #[default]
    None,
    Gzip,
}

impl CompressionMode {
    /// Read `CLIENT_STREAM_COMPRESSION`, if set
    pub fn from_env() -> Option<Self> {
        let value = std::env::var(ENV_CLIENT_STREAM_COMPRESSION).ok()?;
        Self::parse(&value)
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "gzip" => Some(Self::Gzip),
            "none" | "" => Some(Self::None),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallConfig {
    /// Requests queued ahead of the transport before `write` waits
    #[serde(default = "default_buffer")]
    pub buffer: usize,

    /// Deadline for the whole call in seconds
    #[serde(default)]
    pub timeout_seconds: Option<u64>,

    #[serde(default)]
    pub compression: CompressionMode,

    /// Extra request metadata
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            buffer: default_buffer(),
            timeout_seconds: None,
            compression: CompressionMode::default(),
            metadata: HashMap::new(),
        }
    }
}

impl CallConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Emit rpc debug events through `tracing`
    #[serde(default)]
    pub enabled: bool,

    /// Filter used when `RUST_LOG` is unset
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            filter: default_filter(),
        }
    }
}

fn default_buffer() -> usize {
    16
}

fn default_filter() -> String {
    String::from("grpc_client_stream=debug,warn")
}

impl Config {
    /// Load configuration from default locations
    pub fn load() -> Option<Self> {
        let mut config = Self::candidate_paths()
            .into_iter()
            .find(|path| path.exists())
            .and_then(|path| Self::load_from_file(&path))?;
        config.apply_env();
        Some(config)
    }

    /// Load configuration, falling back to defaults
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|| {
            let mut config = Self::default();
            config.apply_env();
            config
        })
    }

    // Checked in order:
    // 1. $CLIENT_STREAM_CONFIG
    // 2. .clientstreamrc.toml (current directory)
    // 3. ~/.clientstreamrc.toml (home directory)
    fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(path) = std::env::var_os(ENV_CLIENT_STREAM_CONFIG) {
            paths.push(PathBuf::from(path));
        }
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd.join(CONFIG_FILE_NAME));
        }
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(CONFIG_FILE_NAME));
        }
        paths
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> Option<Self> {
        match toml::from_str(content) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!("Ignoring invalid configuration: {}", e);
                None
            }
        }
    }

    fn apply_env(&mut self) {
        if let Some(mode) = CompressionMode::from_env() {
            self.call.compression = mode;
        }
    }

    /// Generate configuration as TOML
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_else(|_| String::new())
    }

    /// Logger matching the logging section
    pub fn logger(&self) -> Arc<dyn RpcLogger> {
        if self.logging.enabled {
            Arc::new(TracingLogger)
        } else {
            Arc::new(NoopLogger)
        }
    }
}
