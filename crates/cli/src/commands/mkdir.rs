//! mkdir command - Create a bucket or a folder
//!
//! `alias/bucket` creates a bucket; anything deeper creates a folder marker.

use clap::Args;
use serde::Serialize;

use super::{open_session, parse_remote, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Create a bucket or a folder
#[derive(Args, Debug)]
pub struct MkdirArgs {
    /// Target path (alias/bucket or alias/bucket/folder)
    pub target: String,
}

#[derive(Debug, Serialize)]
struct MkdirOutput {
    status: &'static str,
    path: String,
    kind: &'static str,
}

/// Execute the mkdir command
pub async fn execute(args: MkdirArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let path = match parse_remote(&args.target) {
        Ok(p) => p,
        Err(e) => return report(&formatter, &e),
    };
    if path.is_root() {
        formatter.error("Bucket name cannot be empty");
        return ExitCode::UsageError;
    }

    let mut session = match open_session(&path.alias, &formatter).await {
        Ok(s) => s,
        Err(code) => return code,
    };

    let result = session.create_directory(&path.fs_path()).await;
    session.close();
    if let Err(e) = result {
        return report(&formatter, &e);
    }

    let kind = if path.key.is_empty() { "bucket" } else { "folder" };
    let full_path = path.to_full_path();
    if formatter.is_json() {
        formatter.json(&MkdirOutput {
            status: "success",
            path: full_path,
            kind,
        });
    } else {
        formatter.success(&format!("Created {kind} '{full_path}'."));
    }
    ExitCode::Success
}
