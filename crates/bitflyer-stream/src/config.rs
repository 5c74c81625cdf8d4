/*
[INPUT]:  YAML configuration file, BITFLYER__* environment overrides
[OUTPUT]: Parsed stream runner configuration
[POS]:    Configuration layer - stream and connection setup
[UPDATE]: When adding new configuration options
*/

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bitflyer_adapter::http::API_BASE_URL;
use bitflyer_adapter::{ConnectionConfig, ProductCode, REALTIME_ENDPOINT, RealtimeConfig, StreamKind};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Top-level configuration for the stream runner
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StreamConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Extra WebSocket handshake headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// API key file (key line, secret line, mode 0600)
    #[serde(default)]
    pub credentials_path: Option<PathBuf>,
    #[serde(default)]
    pub connection: ConnectionSettings,
    #[serde(default)]
    pub streams: Vec<StreamSpec>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_base_url: default_api_base_url(),
            headers: BTreeMap::new(),
            credentials_path: None,
            connection: ConnectionSettings::default(),
            streams: Vec::new(),
        }
    }
}

/// Realtime connection policy, durations in seconds
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionSettings {
    pub retry_max: u32,
    pub retry_wait_secs: u64,
    pub ping_interval_secs: u64,
    pub ping_timeout_secs: u64,
    pub write_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            retry_max: 10,
            retry_wait_secs: 3,
            ping_interval_secs: 5,
            ping_timeout_secs: 10,
            write_timeout_secs: 10,
            read_timeout_secs: 60,
        }
    }
}

impl From<&ConnectionSettings> for ConnectionConfig {
    fn from(settings: &ConnectionSettings) -> Self {
        ConnectionConfig {
            retry_max: settings.retry_max,
            retry_wait: Duration::from_secs(settings.retry_wait_secs),
            ping_interval: Duration::from_secs(settings.ping_interval_secs),
            ping_timeout: Duration::from_secs(settings.ping_timeout_secs),
            write_timeout: Duration::from_secs(settings.write_timeout_secs),
            read_timeout: Duration::from_secs(settings.read_timeout_secs),
        }
    }
}

/// Stream selection as written in YAML and on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum StreamSelection {
    Ticker,
    Board,
    BoardSnapshot,
    Executions,
}

impl From<StreamSelection> for StreamKind {
    fn from(selection: StreamSelection) -> Self {
        match selection {
            StreamSelection::Ticker => StreamKind::Ticker,
            StreamSelection::Board => StreamKind::Board,
            StreamSelection::BoardSnapshot => StreamKind::BoardSnapshot,
            StreamSelection::Executions => StreamKind::Executions,
        }
    }
}

/// One stream to run
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StreamSpec {
    pub product_code: ProductCode,
    pub stream: StreamSelection,
    /// Only meaningful for `board`
    #[serde(default)]
    pub merge: bool,
}

fn default_endpoint() -> String {
    REALTIME_ENDPOINT.to_string()
}

fn default_api_base_url() -> String {
    API_BASE_URL.to_string()
}

impl StreamConfig {
    /// Load configuration from a YAML file, then apply `BITFLYER__*`
    /// environment overrides (e.g. `BITFLYER__CONNECTION__RETRY_MAX=3`).
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).format(config::FileFormat::Yaml))
            .add_source(
                config::Environment::with_prefix("BITFLYER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml_str(content: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn realtime_config(&self) -> RealtimeConfig {
        RealtimeConfig {
            endpoint: self.endpoint.clone(),
            headers: self
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
            connection: ConnectionConfig::from(&self.connection),
        }
    }

    /// Whether any configured stream needs the REST client for seeding
    pub fn needs_rest(&self) -> bool {
        self.credentials_path.is_some()
            || self
                .streams
                .iter()
                .any(|spec| spec.stream == StreamSelection::Board && spec.merge)
    }
}
