//! Configuration file
//!
//! One TOML file, `~/.config/bfs/config.toml` (or `$BFS_CONFIG_DIR/config.toml`),
//! holds the `[store]` connection defaults and the aliases. Any connection
//! setting an alias leaves out is inherited from `[store]`:
//!
//! ```toml
//! schema_version = 1
//!
//! [store]
//! region = "eu-central-1"
//! timeout_secs = 60
//!
//! [store.retry]
//! max_attempts = 5
//!
//! [[aliases]]
//! name = "gcs"
//! endpoint = "https://storage.googleapis.com"
//! list_max_keys = "off"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::alias::Alias;
use crate::error::{Error, Result};
use crate::store::UrlStyle;

/// Schema written by this version; older files are upgraded on load
pub const SCHEMA_VERSION: u32 = 1;

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "BFS_CONFIG_DIR";

/// Region the store treats as the default location
pub const DEFAULT_REGION: &str = "us-east-1";

/// Host of Google Cloud Storage's S3-compatible API
pub const GOOGLE_STORAGE_HOST: &str = "storage.googleapis.com";

const CONFIG_FILE: &str = "config.toml";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Per-chunk retry of transfers, with exponential backoff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per chunk, the first one included
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10_000,
        }
    }
}

/// Whether listings send a per-request key limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ListMaxKeys {
    /// Send it unless the endpoint is known to reject it
    #[default]
    Auto,
    On,
    Off,
}

impl ListMaxKeys {
    /// Resolve `Auto` against the service host
    pub fn enabled_for(self, host: &str) -> bool {
        match self {
            ListMaxKeys::On => true,
            ListMaxKeys::Off => false,
            ListMaxKeys::Auto => !host.eq_ignore_ascii_case(GOOGLE_STORAGE_HOST),
        }
    }
}

/// The `[store]` table: connection settings aliases inherit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreDefaults {
    /// Region requests are signed for until a bucket's own region is learned
    pub region: String,
    pub url_style: UrlStyle,
    pub list_max_keys: ListMaxKeys,
    /// Applied to every store call
    pub timeout_secs: u64,
    pub retry: RetryConfig,
}

impl Default for StoreDefaults {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            url_style: UrlStyle::default(),
            list_max_keys: ListMaxKeys::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retry: RetryConfig::default(),
        }
    }
}

impl StoreDefaults {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(Error::Config("[store] timeout_secs must be at least 1".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config(
                "[store.retry] max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Contents of the configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub schema_version: u32,

    #[serde(default)]
    pub store: StoreDefaults,

    #[serde(default)]
    pub aliases: Vec<Alias>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            store: StoreDefaults::default(),
            aliases: Vec::new(),
        }
    }
}

impl Config {
    pub fn alias(&self, name: &str) -> Option<&Alias> {
        self.aliases.iter().find(|a| a.name == name)
    }
}

/// Loads and saves the configuration file
#[derive(Debug)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Manager for the file under `$BFS_CONFIG_DIR`, else the user config dir
    pub fn new() -> Result<Self> {
        let dir = match std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::config_dir()
                .ok_or_else(|| Error::Config("Could not determine config directory".into()))?
                .join("bfs"),
        };
        Ok(Self::with_path(dir.join(CONFIG_FILE)))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Read the file; a missing file is an empty configuration
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&self.config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        if config.schema_version > SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "{} uses schema version {}, this bfs reads up to {SCHEMA_VERSION}; upgrade bfs",
                self.config_path.display(),
                config.schema_version,
            )));
        }
        if config.schema_version < SCHEMA_VERSION {
            tracing::info!(
                from = config.schema_version,
                to = SCHEMA_VERSION,
                "Upgrading configuration schema"
            );
            config.schema_version = SCHEMA_VERSION;
        }
        config.store.validate()?;
        Ok(config)
    }

    /// Write the file, readable by the owner only on Unix
    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(&self.config_path, toml::to_string_pretty(config)?)?;

        // Holds secret keys
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.config_path, std::fs::Permissions::from_mode(0o600))?;
        }
        tracing::debug!(path = %self.config_path.display(), "Saved configuration");
        Ok(())
    }
}
