//! Store connections by name
//!
//! An alias names one S3-compatible endpoint with its credentials. Its
//! connection settings (region, URL style, listing key limits, timeout and
//! retry) are optional; unset ones come from the `[store]` table of the
//! configuration file when the alias is read through [`AliasManager`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::{ConfigManager, DEFAULT_REGION, ListMaxKeys, RetryConfig, StoreDefaults};
use crate::error::{Error, Result};
use crate::resolver::ResolverConfig;
use crate::store::{Protocol, UrlStyle};

/// A named store connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    pub name: String,

    /// Endpoint URL; the scheme selects http or https
    pub endpoint: String,

    /// Empty to take keys from the environment
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub access_key: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub secret_key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_style: Option<UrlStyle>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_max_keys: Option<ListMaxKeys>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,
}

impl Alias {
    /// An alias with every connection setting inherited
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            session_token: None,
            region: None,
            url_style: None,
            list_max_keys: None,
            timeout_secs: None,
            retry: None,
        }
    }

    /// Fill unset connection settings from `[store]`
    pub fn inherit(&mut self, defaults: &StoreDefaults) {
        self.region.get_or_insert_with(|| defaults.region.clone());
        self.url_style.get_or_insert(defaults.url_style);
        self.list_max_keys.get_or_insert(defaults.list_max_keys);
        self.timeout_secs.get_or_insert(defaults.timeout_secs);
        self.retry.get_or_insert_with(|| defaults.retry.clone());
    }

    pub fn region(&self) -> &str {
        self.region.as_deref().unwrap_or(DEFAULT_REGION)
    }

    pub fn url_style(&self) -> UrlStyle {
        self.url_style.unwrap_or_default()
    }

    pub fn list_max_keys(&self) -> ListMaxKeys {
        self.list_max_keys.unwrap_or_default()
    }

    /// Uniform store-call timeout
    pub fn timeout(&self) -> Duration {
        let secs = self
            .timeout_secs
            .unwrap_or_else(|| StoreDefaults::default().timeout_secs);
        Duration::from_secs(secs.max(1))
    }

    pub fn retry_config(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }

    /// Addressing settings derived from the endpoint URL
    pub fn resolver_config(&self) -> Result<ResolverConfig> {
        let url = Url::parse(&self.endpoint)?;
        let protocol = match url.scheme() {
            "http" => Protocol::Http,
            "https" => Protocol::Https,
            other => {
                return Err(Error::Config(format!(
                    "Unsupported endpoint scheme '{other}' for alias '{}'",
                    self.name
                )));
            }
        };
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::Config(format!("Endpoint of alias '{}' has no host", self.name)))?;
        Ok(ResolverConfig {
            host: host.to_string(),
            port: url.port(),
            protocol,
            url_style: self.url_style(),
            default_region: self.region().to_string(),
        })
    }

    /// Keys stored with the alias, else the `AWS_*` environment variables
    pub fn credentials(&self) -> Result<Credentials> {
        self.credentials_with(|name| std::env::var(name).ok())
    }

    fn credentials_with(&self, env: impl Fn(&str) -> Option<String>) -> Result<Credentials> {
        if !self.access_key.is_empty() {
            return Ok(Credentials {
                access_key_id: self.access_key.clone(),
                secret_access_key: self.secret_key.clone(),
                session_token: self.session_token.clone(),
                source: format!("alias {}", self.name),
            });
        }

        let var = |name: &str| env(name).filter(|v| !v.is_empty());
        match (var("AWS_ACCESS_KEY_ID"), var("AWS_SECRET_ACCESS_KEY")) {
            (Some(access_key_id), Some(secret_access_key)) => Ok(Credentials {
                access_key_id,
                secret_access_key,
                session_token: var("AWS_SESSION_TOKEN"),
                source: "%AWS_ACCESS_KEY_ID%".to_string(),
            }),
            _ => Err(Error::Auth(format!(
                "No credentials for alias '{}' and AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY are not set",
                self.name
            ))),
        }
    }
}

/// Access credentials plus where they came from
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    /// Provenance, safe to log
    pub source: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Reads and edits the aliases of the configuration file
pub struct AliasManager {
    config_manager: ConfigManager,
}

impl AliasManager {
    pub fn with_config_manager(config_manager: ConfigManager) -> Self {
        Self { config_manager }
    }

    /// Manager over the default configuration file
    pub fn new() -> Result<Self> {
        Ok(Self::with_config_manager(ConfigManager::new()?))
    }

    /// All aliases with inherited settings filled in
    pub fn list(&self) -> Result<Vec<Alias>> {
        let config = self.config_manager.load()?;
        let store = config.store;
        Ok(config
            .aliases
            .into_iter()
            .map(|mut alias| {
                alias.inherit(&store);
                alias
            })
            .collect())
    }

    /// One alias with inherited settings filled in
    pub fn get(&self, name: &str) -> Result<Alias> {
        let config = self.config_manager.load()?;
        let mut alias = config
            .alias(name)
            .cloned()
            .ok_or_else(|| Error::AliasNotFound(name.to_string()))?;
        alias.inherit(&config.store);
        Ok(alias)
    }

    /// Add or replace an alias as given; unset settings stay inherited
    pub fn set(&self, alias: Alias) -> Result<()> {
        alias.resolver_config()?;
        if alias.timeout_secs == Some(0) {
            return Err(Error::Config(format!(
                "Timeout of alias '{}' must be at least one second",
                alias.name
            )));
        }

        let mut config = self.config_manager.load()?;
        match config.aliases.iter_mut().find(|a| a.name == alias.name) {
            Some(existing) => *existing = alias,
            None => config.aliases.push(alias),
        }
        self.config_manager.save(&config)
    }

    pub fn remove(&self, name: &str) -> Result<()> {
        let mut config = self.config_manager.load()?;
        let before = config.aliases.len();
        config.aliases.retain(|a| a.name != name);
        if config.aliases.len() == before {
            return Err(Error::AliasNotFound(name.to_string()));
        }
        self.config_manager.save(&config)
    }
}
