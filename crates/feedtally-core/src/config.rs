//! Configuration types for feedtally.
//!
//! [`Config::load`] layers, lowest priority first: the embedded defaults, a
//! TOML file (an explicit path, else `~/.config/feedtally/config.toml` when
//! present), then `FEEDTALLY__SECTION__KEY` environment variables.
//! [`Config::defaults`] returns the embedded defaults without touching the
//! filesystem or environment (useful in tests).
//!
//! The loaded value is handed to the pipeline entry point explicitly; nothing
//! downstream reads the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use serde::Deserialize;

use crate::extract::RuleSpec;

// ---------------------------------------------------------------------------
// Embedded defaults
// ---------------------------------------------------------------------------

const DEFAULT_CONFIG: &str = r#"
[store]
endpoint             = ""
folder               = "LogsArchive"
sheets_root          = "Logs-Sheets"
request_timeout_secs = 180
connect_timeout_secs = 15
user_agent           = "feedtally/0.1"

[fetch]
chunk_size          = 20
retry_chunk_divisor = 3
base_delay_ms       = 250
jitter_ms           = 150
transport_attempts  = 3

[publish]
chunk_size    = 80
max_attempts  = 5
base_delay_ms = 1500
jitter_ms     = 250
clear_first   = false

[run]
timezone             = "Europe/Rome"
only_active_partners = true
publish_totals       = true
publish_partners     = true
"#;

/// Upper bound the remote batch endpoint accepts per request.
pub const MAX_FETCH_CHUNK: usize = 30;

const ENV_PREFIX: &str = "FEEDTALLY";

// ---------------------------------------------------------------------------
// Public config types
// ---------------------------------------------------------------------------

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

/// `[store]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Reader web app URL (listing, batch fetch, partner directory).
    #[serde(default)]
    pub endpoint: String,
    /// Writer web app URL for upserts; falls back to `endpoint`.
    #[serde(default)]
    pub writer_endpoint: Option<String>,
    #[serde(default = "default_folder")]
    pub folder: String,
    #[serde(default = "default_sheets_root")]
    pub sheets_root: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_folder() -> String { "LogsArchive".to_string() }
fn default_sheets_root() -> String { "Logs-Sheets".to_string() }
fn default_request_timeout_secs() -> u64 { 180 }
fn default_connect_timeout_secs() -> u64 { 15 }
fn default_user_agent() -> String { "feedtally/0.1".to_string() }

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            writer_endpoint: None,
            folder: default_folder(),
            sheets_root: default_sheets_root(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl StoreConfig {
    pub fn writer_url(&self) -> &str {
        self.writer_endpoint
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(self.endpoint.trim())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// `[fetch]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_fetch_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_retry_chunk_divisor")]
    pub retry_chunk_divisor: usize,
    #[serde(default = "default_fetch_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
    #[serde(default = "default_transport_attempts")]
    pub transport_attempts: u32,
}

fn default_fetch_chunk_size() -> usize { 20 }
fn default_retry_chunk_divisor() -> usize { 3 }
fn default_fetch_base_delay_ms() -> u64 { 250 }
fn default_jitter_ms() -> u64 { 150 }
fn default_transport_attempts() -> u32 { 3 }

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_fetch_chunk_size(),
            retry_chunk_divisor: default_retry_chunk_divisor(),
            base_delay_ms: default_fetch_base_delay_ms(),
            jitter_ms: default_jitter_ms(),
            transport_attempts: default_transport_attempts(),
        }
    }
}

impl FetchConfig {
    /// Chunk size of the first pass, capped at [`MAX_FETCH_CHUNK`].
    pub fn first_pass_chunk(&self) -> usize {
        self.chunk_size.clamp(1, MAX_FETCH_CHUNK)
    }

    /// Chunk size of the retry pass; always at least one.
    pub fn retry_pass_chunk(&self) -> usize {
        (self.first_pass_chunk() / self.retry_chunk_divisor.max(1)).max(1)
    }
}

/// `[publish]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PublishConfig {
    #[serde(default = "default_publish_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_publish_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound of the random extra delay between chunks.
    #[serde(default = "default_publish_jitter_ms")]
    pub jitter_ms: u64,
    #[serde(default)]
    pub clear_first: bool,
}

fn default_publish_chunk_size() -> usize { 80 }
fn default_max_attempts() -> u32 { 5 }
fn default_publish_base_delay_ms() -> u64 { 1500 }
fn default_publish_jitter_ms() -> u64 { 250 }

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_publish_chunk_size(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_publish_base_delay_ms(),
            jitter_ms: default_publish_jitter_ms(),
            clear_first: false,
        }
    }
}

/// `[run]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_true")]
    pub only_active_partners: bool,
    #[serde(default = "default_true")]
    pub publish_totals: bool,
    #[serde(default = "default_true")]
    pub publish_partners: bool,
}

fn default_timezone() -> String { "Europe/Rome".to_string() }
fn default_true() -> bool { true }

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            only_active_partners: true,
            publish_totals: true,
            publish_partners: true,
        }
    }
}

impl RunConfig {
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .trim()
            .parse()
            .map_err(|_| ConfigError::Timezone(self.timezone.clone()))
    }
}

/// `[extraction]` section: extra rules merged into the built-in table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Source(#[from] config::ConfigError),
    #[error("config file not found: {0}")]
    Missing(PathBuf),
    #[error("store.endpoint is not set")]
    NoEndpoint,
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("unknown timezone: {0}")]
    Timezone(String),
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Config {
    /// Load the layered configuration. `path`, when given, must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) if !p.exists() => return Err(ConfigError::Missing(p.to_path_buf())),
            Some(p) => config::File::from(p).required(true),
            None => config::File::from(config_path().as_path()).required(false),
        };

        let cfg: Config = config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(cfg)
    }

    /// Parse a configuration from a TOML string layered over the defaults.
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        let cfg: Config = config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .add_source(config::File::from_str(src, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        Ok(cfg)
    }

    /// Return the built-in defaults without touching the filesystem.
    pub fn defaults() -> Self {
        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .build()
            .expect("built-in default config must be valid TOML")
            .try_deserialize()
            .expect("built-in default config must deserialize correctly")
    }

    /// Check the settings a run cannot do without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.endpoint.trim().is_empty() {
            return Err(ConfigError::NoEndpoint);
        }
        if self.fetch.chunk_size == 0 {
            return Err(ConfigError::Zero("fetch.chunk_size"));
        }
        if self.publish.chunk_size == 0 {
            return Err(ConfigError::Zero("publish.chunk_size"));
        }
        if self.publish.max_attempts == 0 {
            return Err(ConfigError::Zero("publish.max_attempts"));
        }
        self.run.tz()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

fn config_path() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
                .join(".config")
        })
        .join("feedtally")
        .join("config.toml")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
