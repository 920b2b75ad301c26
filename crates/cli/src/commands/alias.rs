//! `bfs alias`: named store connections
//!
//! Connection settings left off `alias set` are not written to the alias;
//! they follow the `[store]` table of the configuration file.

use bfs_core::path::is_valid_alias_name;
use bfs_core::{Alias, AliasManager, ConfigManager, Error, ListMaxKeys, RetryConfig, UrlStyle};
use clap::{Subcommand, ValueEnum};
use serde::Serialize;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

use super::report;

#[derive(Subcommand, Debug)]
pub enum AliasCommands {
    /// Add or replace an alias
    Set(SetArgs),

    /// List configured aliases
    List(ListArgs),

    /// Show the settings an alias connects with
    Show(ShowArgs),

    /// Remove an alias
    Remove(RemoveArgs),
}

#[derive(clap::Args, Debug)]
pub struct SetArgs {
    /// Alias name (e.g., "s3", "minio", "gcs")
    pub name: String,

    /// Endpoint URL; the scheme selects http or https
    pub endpoint: String,

    /// Access key ID (omit to use AWS_ACCESS_KEY_ID)
    pub access_key: Option<String>,

    /// Secret access key (omit to use AWS_SECRET_ACCESS_KEY)
    pub secret_key: Option<String>,

    /// Temporary session token
    #[arg(long)]
    pub session_token: Option<String>,

    /// Region to sign for until a bucket's own region is learned
    #[arg(long)]
    pub region: Option<String>,

    /// Bucket addressing
    #[arg(long, value_enum)]
    pub url_style: Option<UrlStyleArg>,

    /// Per-request key limits on listings
    #[arg(long, value_enum)]
    pub list_max_keys: Option<ListMaxKeysArg>,

    /// Timeout for each store call, in seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Attempts per transfer chunk before giving up
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_attempts: Option<u32>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum UrlStyleArg {
    Path,
    Virtual,
}

impl From<UrlStyleArg> for UrlStyle {
    fn from(arg: UrlStyleArg) -> Self {
        match arg {
            UrlStyleArg::Path => UrlStyle::Path,
            UrlStyleArg::Virtual => UrlStyle::Virtual,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListMaxKeysArg {
    /// Send unless the endpoint is known to reject it
    Auto,
    On,
    Off,
}

impl From<ListMaxKeysArg> for ListMaxKeys {
    fn from(arg: ListMaxKeysArg) -> Self {
        match arg {
            ListMaxKeysArg::Auto => ListMaxKeys::Auto,
            ListMaxKeysArg::On => ListMaxKeys::On,
            ListMaxKeysArg::Off => ListMaxKeys::Off,
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Include each alias's connection settings
    #[arg(short, long)]
    pub long: bool,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    pub name: String,
}

#[derive(clap::Args, Debug)]
pub struct RemoveArgs {
    pub name: String,
}

/// An alias as bfs will connect with it; keys are never printed
#[derive(Serialize, Debug)]
struct AliasView {
    name: String,
    endpoint: String,
    region: String,
    url_style: UrlStyle,
    list_max_keys: ListMaxKeys,
    timeout_secs: u64,
    max_attempts: u32,
    env_credentials: bool,
    /// Settings taken from `[store]`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    inherited: Vec<&'static str>,
}

impl AliasView {
    /// `effective` has `[store]` applied; `raw` is the alias as written
    fn new(effective: &Alias, raw: Option<&Alias>) -> Self {
        let mut inherited = Vec::new();
        if let Some(raw) = raw {
            for (setting, unset) in [
                ("region", raw.region.is_none()),
                ("url_style", raw.url_style.is_none()),
                ("list_max_keys", raw.list_max_keys.is_none()),
                ("timeout_secs", raw.timeout_secs.is_none()),
                ("retry", raw.retry.is_none()),
            ] {
                if unset {
                    inherited.push(setting);
                }
            }
        }

        Self {
            name: effective.name.clone(),
            endpoint: effective.endpoint.clone(),
            region: effective.region().to_string(),
            url_style: effective.url_style(),
            list_max_keys: effective.list_max_keys(),
            timeout_secs: effective.timeout().as_secs(),
            max_attempts: effective.retry_config().max_attempts,
            env_credentials: effective.access_key.is_empty(),
            inherited,
        }
    }

    fn summary(&self) -> String {
        let style = match self.url_style {
            UrlStyle::Path => "path",
            UrlStyle::Virtual => "virtual",
        };
        let keys = if self.env_credentials {
            ", keys from environment"
        } else {
            ""
        };
        format!(
            "{:<12} {} (region: {}, style: {style}, timeout: {}s{keys})",
            self.name, self.endpoint, self.region, self.timeout_secs
        )
    }
}

pub async fn execute(cmd: AliasCommands, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);
    let config_manager = match ConfigManager::new() {
        Ok(manager) => manager,
        Err(e) => return report(&formatter, &e),
    };

    let result = match cmd {
        AliasCommands::Set(args) => execute_set(&args, config_manager, &formatter),
        AliasCommands::List(args) => execute_list(&args, config_manager, &formatter),
        AliasCommands::Show(args) => execute_show(&args, &config_manager, &formatter),
        AliasCommands::Remove(args) => execute_remove(&args, config_manager, &formatter),
    };
    match result {
        Ok(()) => ExitCode::Success,
        Err(e) => report(&formatter, &e),
    }
}

/// The alias `set` writes; unset flags stay unset
fn alias_from_args(args: &SetArgs) -> bfs_core::Result<Alias> {
    if !is_valid_alias_name(&args.name) {
        return Err(Error::InvalidPath(format!(
            "Invalid alias name '{}': use letters, digits, '-' and '_'",
            args.name
        )));
    }
    if args.access_key.is_some() != args.secret_key.is_some() {
        return Err(Error::Config(
            "Pass both access key and secret key, or neither".into(),
        ));
    }

    let mut alias = Alias::new(
        &args.name,
        &args.endpoint,
        args.access_key.clone().unwrap_or_default(),
        args.secret_key.clone().unwrap_or_default(),
    );
    alias.session_token = args.session_token.clone();
    alias.region = args.region.clone();
    alias.url_style = args.url_style.map(UrlStyle::from);
    alias.list_max_keys = args.list_max_keys.map(ListMaxKeys::from);
    alias.timeout_secs = args.timeout;
    alias.retry = args.max_attempts.map(|max_attempts| RetryConfig {
        max_attempts,
        ..RetryConfig::default()
    });
    Ok(alias)
}

fn execute_set(
    args: &SetArgs,
    config_manager: ConfigManager,
    formatter: &Formatter,
) -> bfs_core::Result<()> {
    let alias = alias_from_args(args)?;
    AliasManager::with_config_manager(config_manager)
        .set(alias)
        .map_err(|e| match e {
            Error::InvalidUrl(msg) => Error::Config(format!("Invalid endpoint: {msg}")),
            other => other,
        })?;

    if formatter.is_json() {
        formatter.json(&serde_json::json!({ "alias": args.name, "configured": true }));
    } else {
        formatter.success(&format!("Alias '{}' configured", args.name));
    }
    Ok(())
}

fn execute_list(
    args: &ListArgs,
    config_manager: ConfigManager,
    formatter: &Formatter,
) -> bfs_core::Result<()> {
    let aliases = AliasManager::with_config_manager(config_manager).list()?;
    let views: Vec<AliasView> = aliases.iter().map(|a| AliasView::new(a, None)).collect();

    if formatter.is_json() {
        formatter.json(&serde_json::json!({ "aliases": views }));
    } else if views.is_empty() {
        formatter.println("No aliases configured.");
    } else {
        for view in &views {
            if args.long {
                formatter.println(&view.summary());
            } else {
                formatter.println(&format!("{:<12} {}", view.name, view.endpoint));
            }
        }
    }
    Ok(())
}

fn execute_show(
    args: &ShowArgs,
    config_manager: &ConfigManager,
    formatter: &Formatter,
) -> bfs_core::Result<()> {
    let config = config_manager.load()?;
    let raw = config
        .alias(&args.name)
        .ok_or_else(|| Error::AliasNotFound(args.name.clone()))?;
    let mut effective = raw.clone();
    effective.inherit(&config.store);
    let view = AliasView::new(&effective, Some(raw));

    if formatter.is_json() {
        formatter.json(&view);
        return Ok(());
    }

    let mark = |setting: &str| {
        if view.inherited.iter().any(|s| *s == setting) {
            formatter.dim(" (from [store])")
        } else {
            String::new()
        }
    };
    formatter.println(&format!("Name      : {}", view.name));
    formatter.println(&format!("Endpoint  : {}", view.endpoint));
    formatter.println(&format!("Region    : {}{}", view.region, mark("region")));
    formatter.println(&format!("URL style : {:?}{}", view.url_style, mark("url_style")));
    formatter.println(&format!(
        "Max keys  : {:?}{}",
        view.list_max_keys,
        mark("list_max_keys")
    ));
    formatter.println(&format!(
        "Timeout   : {}s{}",
        view.timeout_secs,
        mark("timeout_secs")
    ));
    formatter.println(&format!("Attempts  : {}{}", view.max_attempts, mark("retry")));
    if view.env_credentials {
        formatter.println("Keys      : AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY");
    }
    Ok(())
}

fn execute_remove(
    args: &RemoveArgs,
    config_manager: ConfigManager,
    formatter: &Formatter,
) -> bfs_core::Result<()> {
    AliasManager::with_config_manager(config_manager).remove(&args.name)?;

    if formatter.is_json() {
        formatter.json(&serde_json::json!({ "alias": args.name, "removed": true }));
    } else {
        formatter.success(&format!("Alias '{}' removed", args.name));
    }
    Ok(())
}
