//! rm command - Remove files, folders or buckets
//!
//! Folders and buckets need `--recursive`; their contents are removed
//! depth-first before the folder itself.

use bfs_core::Session;
use clap::Args;
use serde::Serialize;

use super::{child_path, open_session, parse_remote, report};
use crate::exit_code::ExitCode;
use crate::interrupt::Interrupt;
use crate::output::{Formatter, OutputConfig};

/// Remove files, folders or buckets
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Path(s) to remove (alias/bucket/key, alias/bucket/folder/ or alias/bucket)
    #[arg(required = true)]
    pub paths: Vec<String>,

    /// Remove folders and buckets with everything in them
    #[arg(short, long)]
    pub recursive: bool,

    /// Only show what would be deleted (dry run)
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
struct RmOutput {
    status: &'static str,
    deleted: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failed: Option<Vec<String>>,
    total: usize,
}

/// Why removing one path stopped early
enum Stop {
    Failed(ExitCode),
    Interrupted,
}

/// Execute the rm command
pub async fn execute(args: RmArgs, output_config: OutputConfig, interrupt: Interrupt) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let mut deleted = Vec::new();
    let mut failed = Vec::new();
    let mut code = ExitCode::Success;

    for arg in &args.paths {
        match remove_path(arg, &args, &formatter, &interrupt, &mut deleted).await {
            Ok(()) => {}
            Err(Stop::Interrupted) => {
                formatter.warning("Interrupted.");
                code = ExitCode::Interrupted;
                break;
            }
            Err(Stop::Failed(failure)) => {
                failed.push(arg.clone());
                if failure == ExitCode::AuthError || failure == ExitCode::UsageError {
                    return failure;
                }
                code = failure;
            }
        }
    }

    if formatter.is_json() {
        let output = RmOutput {
            status: if code == ExitCode::Success {
                "success"
            } else {
                "partial"
            },
            total: deleted.len(),
            deleted,
            failed: (!failed.is_empty()).then_some(failed),
        };
        formatter.json(&output);
    } else if !args.dry_run && !deleted.is_empty() {
        formatter.success(&format!("Removed {} item(s).", deleted.len()));
    }

    code
}

async fn remove_path(
    arg: &str,
    args: &RmArgs,
    formatter: &Formatter,
    interrupt: &Interrupt,
    deleted: &mut Vec<String>,
) -> Result<(), Stop> {
    let path = parse_remote(arg).map_err(|e| Stop::Failed(report(formatter, &e)))?;
    if path.is_root() {
        formatter.error("Refusing to remove the root of an alias");
        return Err(Stop::Failed(ExitCode::UsageError));
    }

    let mut session = open_session(&path.alias, formatter)
        .await
        .map_err(Stop::Failed)?;

    let fs_path = path.fs_path();
    let is_dir = if path.key.is_empty() || path.is_dir {
        true
    } else {
        session
            .read_single(&fs_path)
            .await
            .map_err(|e| Stop::Failed(report(formatter, &e)))?
            .is_dir()
    };

    if is_dir && !args.recursive {
        formatter.error(&format!(
            "'{}' is a folder. Use -r/--recursive to remove it.",
            path.to_full_path()
        ));
        return Err(Stop::Failed(ExitCode::UsageError));
    }

    let result = if is_dir {
        remove_tree(&mut session, &fs_path, args, formatter, interrupt, deleted).await
    } else {
        remove_one(&mut session, &fs_path, false, args, formatter, deleted).await
    };
    session.close();
    result
}

/// Remove a folder's contents depth-first, then the folder
async fn remove_tree(
    session: &mut Session,
    root: &str,
    args: &RmArgs,
    formatter: &Formatter,
    interrupt: &Interrupt,
    deleted: &mut Vec<String>,
) -> Result<(), Stop> {
    let mut stack = vec![(root.trim_end_matches('/').to_string(), false)];

    while let Some((dir, expanded)) = stack.pop() {
        if interrupt.was_pressed() {
            return Err(Stop::Interrupted);
        }
        if expanded {
            remove_one(session, &dir, true, args, formatter, deleted).await?;
            continue;
        }

        let listing = session
            .list(&dir)
            .await
            .map_err(|e| Stop::Failed(report(formatter, &e)))?;
        stack.push((dir.clone(), true));
        for entry in listing.children() {
            let child = child_path(&dir, &entry.name);
            if entry.is_dir() {
                stack.push((child, false));
            } else {
                if interrupt.was_pressed() {
                    return Err(Stop::Interrupted);
                }
                remove_one(session, &child, false, args, formatter, deleted).await?;
            }
        }
    }
    Ok(())
}

async fn remove_one(
    session: &mut Session,
    path: &str,
    is_dir: bool,
    args: &RmArgs,
    formatter: &Formatter,
    deleted: &mut Vec<String>,
) -> Result<(), Stop> {
    if args.dry_run {
        formatter.println(&format!("Would remove: {path}"));
        return Ok(());
    }
    session
        .delete(path, is_dir)
        .await
        .map_err(|e| Stop::Failed(report(formatter, &e)))?;
    tracing::debug!(path, is_dir, "Removed");
    deleted.push(path.to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Cli;
    use clap::Parser;

    #[test]
    fn test_rm_args() {
        let cli = Cli::try_parse_from(["bfs", "rm", "-r", "s3/photos/2024/", "s3/photos/a.jpg"])
            .unwrap();
        let crate::commands::Commands::Rm(args) = cli.command else {
            panic!("expected rm");
        };
        assert!(args.recursive);
        assert!(!args.dry_run);
        assert_eq!(args.paths.len(), 2);
    }

    #[test]
    fn test_rm_requires_a_path() {
        assert!(Cli::try_parse_from(["bfs", "rm"]).is_err());
    }
}
