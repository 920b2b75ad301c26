//! acl command - Show or change file permissions
//!
//! Permissions are shown as group rights: `O` (owner), `U` (authenticated
//! users) and `E` (everyone), each with `F` (full) or any of `R`, `W`, `A`
//! (read ACL) and `P` (write ACL). A trailing `+` marks grants outside these
//! groups; they are kept untouched on every change.

use bfs_core::{PermissionView, Rights, RightsChange};
use clap::{Args, Subcommand};
use serde::Serialize;

use super::{open_session, parse_remote, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// ACL subcommands
#[derive(Subcommand, Debug)]
pub enum AclCommands {
    /// Show the permissions of a file or folder
    Get(GetArgs),

    /// Change the permissions of a file
    Set(SetArgs),
}

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Path (alias/bucket/key)
    pub path: String,
}

#[derive(Args, Debug)]
pub struct SetArgs {
    /// File path (alias/bucket/key)
    pub path: String,

    /// Replace the recognized rights with exactly these (e.g. "O:F,E:R")
    #[arg(long, conflicts_with_all = ["grant", "revoke"])]
    pub exact: Option<String>,

    /// Rights to add (e.g. "E:R")
    #[arg(long)]
    pub grant: Option<String>,

    /// Rights to remove (e.g. "U:W")
    #[arg(long)]
    pub revoke: Option<String>,
}

#[derive(Debug, Serialize)]
struct AclOutput {
    path: String,
    #[serde(flatten)]
    view: PermissionView,
}

impl SetArgs {
    fn change(&self) -> bfs_core::Result<RightsChange> {
        if let Some(exact) = &self.exact {
            return Ok(RightsChange::exact(exact.parse()?));
        }
        let parse = |value: &Option<String>| -> bfs_core::Result<Rights> {
            value.as_deref().map_or(Ok(Rights::NONE), str::parse)
        };
        let change = RightsChange {
            grant: parse(&self.grant)?,
            revoke: parse(&self.revoke)?,
        };
        if change == RightsChange::default() {
            return Err(bfs_core::Error::General(
                "Nothing to change: pass --exact, --grant or --revoke".into(),
            ));
        }
        Ok(change)
    }
}

/// Execute an acl subcommand
pub async fn execute(cmd: AclCommands, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let (raw_path, change) = match &cmd {
        AclCommands::Get(args) => (args.path.as_str(), None),
        AclCommands::Set(args) => match args.change() {
            Ok(change) => (args.path.as_str(), Some(change)),
            Err(e) => {
                formatter.error(&e.to_string());
                return ExitCode::UsageError;
            }
        },
    };

    let path = match parse_remote(raw_path) {
        Ok(p) => p,
        Err(e) => return report(&formatter, &e),
    };

    let mut session = match open_session(&path.alias, &formatter).await {
        Ok(s) => s,
        Err(code) => return code,
    };

    let fs_path = path.fs_path();
    let result = match change {
        None => match session.read_single(&fs_path).await {
            Ok(entry) => session.load_properties(&fs_path, entry.is_dir()).await,
            Err(e) => Err(e),
        },
        Some(change) => session
            .change_permissions(&fs_path, path.is_dir, &change)
            .await
            .map(Some),
    };
    session.close();

    let view = match result {
        Ok(Some(view)) => view,
        Ok(None) => {
            formatter.error(&format!(
                "'{}' has no permissions to show; buckets are not supported",
                path.to_full_path()
            ));
            return ExitCode::UnsupportedFeature;
        }
        Err(e) => return report(&formatter, &e),
    };

    if formatter.is_json() {
        formatter.json(&AclOutput {
            path: path.to_full_path(),
            view,
        });
    } else {
        formatter.println(&format!("{} {}", path.to_full_path(), view.summary));
        if let Some(owner) = &view.owner {
            let name = owner.display_name.as_deref().unwrap_or(&owner.id);
            formatter.println(&format!("  owner: {name}"));
        }
    }
    ExitCode::Success
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_args(exact: Option<&str>, grant: Option<&str>, revoke: Option<&str>) -> SetArgs {
        SetArgs {
            path: "s3/photos/a.jpg".into(),
            exact: exact.map(String::from),
            grant: grant.map(String::from),
            revoke: revoke.map(String::from),
        }
    }

    #[test]
    fn test_exact_change_replaces_rights() {
        let change = set_args(Some("O:F,E:R"), None, None).change().unwrap();
        assert_eq!(change, RightsChange::exact("O:F,E:R".parse().unwrap()));
    }

    #[test]
    fn test_grant_and_revoke() {
        let change = set_args(None, Some("E:R"), Some("U:W")).change().unwrap();
        assert_eq!(change.grant, "E:R".parse().unwrap());
        assert_eq!(change.revoke, "U:W".parse().unwrap());
    }

    #[test]
    fn test_empty_change_is_rejected() {
        let err = set_args(None, None, None).change().unwrap_err();
        assert!(err.to_string().starts_with("Nothing to change"));
    }

    #[test]
    fn test_bad_rights_are_rejected() {
        assert!(set_args(None, Some("X:R"), None).change().is_err());
    }
}
