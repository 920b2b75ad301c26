//! stat command - Show a file or folder
//!
//! Displays the directory entry for a path together with its permissions.

use bfs_core::{DirEntry, EntryKind, PermissionView, Session};
use clap::Args;
use serde::Serialize;

use super::{open_session, parse_remote, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Show a file or folder and its permissions
#[derive(Args, Debug)]
pub struct StatArgs {
    /// Path (alias/bucket[/key])
    pub path: String,
}

#[derive(Debug, Serialize)]
struct StatOutput {
    path: String,
    #[serde(flatten)]
    entry: DirEntry,
    #[serde(skip_serializing_if = "Option::is_none")]
    permissions: Option<PermissionView>,
}

/// Execute the stat command
pub async fn execute(args: StatArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let path = match parse_remote(&args.path) {
        Ok(p) => p,
        Err(e) => return report(&formatter, &e),
    };

    let mut session = match open_session(&path.alias, &formatter).await {
        Ok(s) => s,
        Err(code) => return code,
    };

    let fs_path = path.fs_path();
    let result = stat(&mut session, &fs_path).await;
    session.close();

    let (entry, permissions) = match result {
        Ok(found) => found,
        Err(e) => return report(&formatter, &e),
    };

    let output = StatOutput {
        path: path.to_full_path(),
        entry,
        permissions,
    };
    if formatter.is_json() {
        formatter.json(&output);
    } else {
        for line in describe(&output) {
            formatter.println(&line);
        }
    }
    ExitCode::Success
}

async fn stat(
    session: &mut Session,
    path: &str,
) -> bfs_core::Result<(DirEntry, Option<PermissionView>)> {
    let entry = session.read_single(path).await?;
    let permissions = session.load_properties(path, entry.is_dir()).await?;
    Ok((entry, permissions))
}

fn describe(output: &StatOutput) -> Vec<String> {
    let entry = &output.entry;
    let mut lines = vec![format!("Name      : {}", output.path)];
    let kind = match entry.kind {
        EntryKind::File => "file",
        EntryKind::Directory | EntryKind::Parent => "folder",
    };
    lines.push(format!("Type      : {kind}"));
    if let Some(size) = entry.size_bytes {
        let human = entry.size_human.as_deref().unwrap_or_default();
        lines.push(format!("Size      : {human} ({size} bytes)"));
    }
    if let Some(modified) = entry.last_modified {
        lines.push(format!(
            "Modified  : {}",
            modified.strftime("%Y-%m-%d %H:%M:%S UTC")
        ));
    }
    if let Some(owner) = &entry.owner {
        lines.push(format!("Owner     : {owner}"));
    }
    if let Some(view) = &output.permissions {
        lines.push(format!("Rights    : {}", view.summary));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_file() {
        let mut entry = DirEntry::file("a.jpg", 1536);
        entry.owner = Some("alice".into());
        let output = StatOutput {
            path: "s3/photos/a.jpg".into(),
            entry,
            permissions: None,
        };
        let lines = describe(&output);
        assert_eq!(lines[0], "Name      : s3/photos/a.jpg");
        assert_eq!(lines[1], "Type      : file");
        assert!(lines[2].starts_with("Size      : 1.5"));
        assert!(lines[2].ends_with("KiB (1536 bytes)"));
        assert_eq!(lines[3], "Owner     : alice");
    }

    #[test]
    fn test_describe_folder() {
        let output = StatOutput {
            path: "s3/photos/2024".into(),
            entry: DirEntry::directory("2024"),
            permissions: None,
        };
        let lines = describe(&output);
        assert_eq!(lines, vec!["Name      : s3/photos/2024", "Type      : folder"]);
    }
}
