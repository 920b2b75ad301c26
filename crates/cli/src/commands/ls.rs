//! ls command - List buckets, folders and files
//!
//! Lists buckets when given an alias only, or the directory named by a bucket path.

use std::collections::VecDeque;

use bfs_core::{DirEntry, Session};
use clap::Args;
use serde::Serialize;

use super::{child_path, open_session, parse_remote, report};
use crate::exit_code::ExitCode;
use crate::interrupt::Interrupt;
use crate::output::{Formatter, ListSpinner, OutputConfig};

/// List buckets, folders and files
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Remote path (alias/ or alias/bucket[/folder])
    pub path: String,

    /// List subfolders recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Summarize output (show totals)
    #[arg(long)]
    pub summarize: bool,
}

/// One listed entry with the directory it was found in
#[derive(Debug, Serialize)]
struct LsItem {
    path: String,
    #[serde(flatten)]
    entry: DirEntry,
}

/// Output structure for ls command (JSON format)
#[derive(Debug, Serialize)]
struct LsOutput {
    items: Vec<LsItem>,
    /// Set when the listing was stopped before it finished
    truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<Summary>,
}

#[derive(Debug, Serialize)]
struct Summary {
    total_files: usize,
    total_folders: usize,
    total_size_bytes: u64,
    total_size_human: String,
}

impl Summary {
    fn of(items: &[LsItem]) -> Self {
        let total_size_bytes = items.iter().filter_map(|i| i.entry.size_bytes).sum();
        Self {
            total_files: items.iter().filter(|i| !i.entry.is_dir()).count(),
            total_folders: items.iter().filter(|i| i.entry.is_dir()).count(),
            total_size_bytes,
            total_size_human: humansize::format_size(total_size_bytes, humansize::BINARY),
        }
    }
}

/// Execute the ls command
pub async fn execute(args: LsArgs, output_config: OutputConfig, interrupt: Interrupt) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let path = match parse_remote(&args.path) {
        Ok(p) => p,
        Err(e) => return report(&formatter, &e),
    };

    let mut session = match open_session(&path.alias, &formatter).await {
        Ok(s) => s,
        Err(code) => return code,
    };

    let result = collect(&mut session, &path.fs_path(), &args, &formatter, &interrupt).await;
    session.close();

    let (items, truncated) = match result {
        Ok(listed) => listed,
        Err(e) => return report(&formatter, &e),
    };

    if formatter.is_json() {
        let output = LsOutput {
            summary: args.summarize.then(|| Summary::of(&items)),
            items,
            truncated,
        };
        formatter.json(&output);
    } else {
        for item in &items {
            formatter.println(&format_line(item, args.recursive));
        }
        if truncated {
            formatter.warning("Listing interrupted, results are incomplete.");
        }
        if args.summarize {
            let summary = Summary::of(&items);
            formatter.println(&format!(
                "\nTotal: {} files, {} folders, {}",
                summary.total_files, summary.total_folders, summary.total_size_human
            ));
        }
    }

    if truncated {
        ExitCode::Interrupted
    } else {
        ExitCode::Success
    }
}

/// List `start`, and with `--recursive` every folder below it
async fn collect(
    session: &mut Session,
    start: &str,
    args: &LsArgs,
    formatter: &Formatter,
    interrupt: &Interrupt,
) -> bfs_core::Result<(Vec<LsItem>, bool)> {
    let mut items = Vec::new();
    let mut pending = VecDeque::from([start.to_string()]);

    while let Some(dir) = pending.pop_front() {
        let mut spinner = ListSpinner::new(formatter.config(), &dir, interrupt.watch());
        let listing = session.list_with_progress(&dir, &mut spinner).await;
        spinner.finish();
        let listing = listing?;

        for entry in listing.children() {
            if args.recursive && entry.is_dir() {
                pending.push_back(child_path(&dir, &entry.name));
            }
            items.push(LsItem {
                path: dir.clone(),
                entry: entry.clone(),
            });
        }

        if interrupt.was_pressed() {
            return Ok((items, true));
        }
    }

    Ok((items, false))
}

/// `[date] size name`, with the folder prefix in recursive listings
fn format_line(item: &LsItem, with_path: bool) -> String {
    let entry = &item.entry;
    let date = entry
        .last_modified
        .map(|d| d.strftime("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| " ".repeat(19));
    let size = entry.size_human.as_deref().unwrap_or("0 B");
    let suffix = if entry.is_dir() { "/" } else { "" };
    let name = if with_path {
        let dir = item.path.trim_start_matches('/');
        if dir.is_empty() {
            entry.name.clone()
        } else {
            format!("{dir}/{}", entry.name)
        }
    } else {
        entry.name.clone()
    };
    format!("[{date}] {size:>10} {name}{suffix}")
}
