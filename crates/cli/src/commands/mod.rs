//! CLI command definitions and execution
//!
//! Every remote command opens a [`Session`] on the alias named by its path
//! and drives the filesystem operations through it.

use std::sync::Arc;

use bfs_core::path::{is_root, is_valid_alias_name};
use bfs_core::{AliasManager, Error, ParsedPath, RemotePath, Session, parse_path};
use bfs_s3::S3Store;
use clap::{Parser, Subcommand};

use crate::exit_code::ExitCode;
use crate::interrupt::Interrupt;
use crate::output::{Formatter, OutputConfig};

mod acl;
mod alias;
pub mod cp;
mod info;
mod ls;
mod mkdir;
mod mv;
mod rm;
mod stat;

/// bfs - filesystem view of S3-compatible storage
///
/// Browses buckets as directories and transfers files to and from any
/// S3-compatible service, following bucket regions automatically.
#[derive(Parser, Debug)]
#[command(name = "bfs")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format: human-readable or JSON
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true, default_value = "false")]
    pub no_color: bool,

    /// Disable progress bar
    #[arg(long, global = true, default_value = "false")]
    pub no_progress: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, default_value = "false")]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true, default_value = "false")]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage storage service aliases
    #[command(subcommand)]
    Alias(alias::AliasCommands),

    /// List buckets, folders and files
    Ls(ls::LsArgs),

    /// Show a file or folder and its permissions
    Stat(stat::StatArgs),

    /// Create a bucket or a folder
    Mkdir(mkdir::MkdirArgs),

    /// Remove files, folders or buckets
    Rm(rm::RmArgs),

    /// Copy files (local<->remote, remote<->remote)
    Cp(cp::CpArgs),

    /// Move or rename files (copy + delete source)
    Mv(mv::MvArgs),

    /// Show or change file permissions
    #[command(subcommand)]
    Acl(acl::AclCommands),

    /// Show what a store connection supports
    Info(info::InfoArgs),
}

impl Cli {
    pub fn output_config(&self) -> OutputConfig {
        OutputConfig {
            json: self.json,
            no_color: self.no_color,
            no_progress: self.no_progress,
            quiet: self.quiet,
        }
    }
}

/// Execute the CLI command and return an exit code
pub async fn execute(cli: Cli) -> ExitCode {
    let output_config = cli.output_config();

    match cli.command {
        Commands::Alias(cmd) => alias::execute(cmd, output_config).await,
        Commands::Ls(args) => ls::execute(args, output_config, Interrupt::install()).await,
        Commands::Stat(args) => stat::execute(args, output_config).await,
        Commands::Mkdir(args) => mkdir::execute(args, output_config).await,
        Commands::Rm(args) => rm::execute(args, output_config, Interrupt::install()).await,
        Commands::Cp(args) => cp::execute(args, output_config, Interrupt::install()).await,
        Commands::Mv(args) => mv::execute(args, output_config, Interrupt::install()).await,
        Commands::Acl(cmd) => acl::execute(cmd, output_config).await,
        Commands::Info(args) => info::execute(args, output_config).await,
    }
}

/// Parse a remote argument; a bare alias name stands for its root
pub(crate) fn parse_remote(arg: &str) -> bfs_core::Result<RemotePath> {
    if !arg.contains('/') && is_valid_alias_name(arg) {
        return Ok(RemotePath::root(arg));
    }
    match parse_path(arg)? {
        ParsedPath::Remote(path) => Ok(path),
        ParsedPath::Local(path) => Err(Error::InvalidPath(format!(
            "'{}' is a local path, expected alias/bucket/key",
            path.display()
        ))),
    }
}

/// Session path of an entry listed in `dir`
pub(crate) fn child_path(dir: &str, name: &str) -> String {
    if is_root(dir) {
        format!("/{name}")
    } else {
        format!("{}/{name}", dir.trim_end_matches('/'))
    }
}

/// Print an error and pick its exit code
pub(crate) fn report(formatter: &Formatter, err: &Error) -> ExitCode {
    formatter.error_with_details(&err.to_string(), err.details());
    ExitCode::from(err)
}

/// Open a session on a configured alias
pub(crate) async fn open_session(alias_name: &str, formatter: &Formatter) -> Result<Session, ExitCode> {
    let alias = AliasManager::new()
        .and_then(|manager| manager.get(alias_name))
        .map_err(|e| report(formatter, &e))?;
    let store = S3Store::new(&alias)
        .await
        .map_err(|e| report(formatter, &e))?;
    let mut session =
        Session::for_alias(Arc::new(store), &alias).map_err(|e| report(formatter, &e))?;

    tracing::debug!(alias = %alias.name, endpoint = %alias.endpoint, "Opening session");
    session.open().await.map_err(|e| report(formatter, &e))?;
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::try_parse_from(["bfs", "--json", "--debug", "ls", "s3/photos"])
            .expect("valid arguments");
        assert!(cli.json);
        assert!(cli.debug);
        assert!(cli.output_config().json);
        assert!(matches!(cli.command, Commands::Ls(_)));
    }

    #[test]
    fn test_parse_acl_set() {
        let cli = Cli::try_parse_from(["bfs", "acl", "set", "s3/photos/a.jpg", "--grant", "E:R"])
            .expect("valid arguments");
        assert!(matches!(cli.command, Commands::Acl(_)));
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        assert!(Cli::try_parse_from(["bfs", "cat", "s3/photos/a.jpg"]).is_err());
    }

    #[test]
    fn test_parse_remote_bare_alias() {
        let path = parse_remote("s3").unwrap();
        assert!(path.is_root());
        assert_eq!(path.alias, "s3");
    }

    #[test]
    fn test_parse_remote_key() {
        let path = parse_remote("s3/photos/2024/a.jpg").unwrap();
        assert_eq!(path.bucket, "photos");
        assert_eq!(path.key, "2024/a.jpg");
        assert_eq!(path.fs_path(), "/photos/2024/a.jpg");
    }

    #[test]
    fn test_child_path() {
        assert_eq!(child_path("/", "photos"), "/photos");
        assert_eq!(child_path("/photos", "2024"), "/photos/2024");
        assert_eq!(child_path("/photos/", "2024"), "/photos/2024");
    }

    #[test]
    fn test_parse_remote_rejects_local() {
        let err = parse_remote("./photo.jpg").unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
