//! cp command - Copy files
//!
//! Copies files between the local filesystem and a store, or within one
//! store. Transfers report progress and can be skipped or aborted with Ctrl-C.

use std::path::{Path, PathBuf};

use bfs_core::{
    DirEntry, Error, ParsedPath, PutProperties, RemotePath, Session, TransferOutcome, parse_path,
};
use clap::Args;
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use super::{child_path, open_session, report};
use crate::exit_code::ExitCode;
use crate::interrupt::Interrupt;
use crate::output::{Formatter, OutputConfig, TransferBar};

/// Copy files
#[derive(Args, Debug)]
pub struct CpArgs {
    /// Source path (local path or alias/bucket/key)
    pub source: String,

    /// Destination path (local path or alias/bucket/key)
    pub target: String,

    /// Copy folders recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Continue with the next file after a failure
    #[arg(long)]
    pub continue_on_error: bool,

    /// Only show what would be copied (dry run)
    #[arg(long)]
    pub dry_run: bool,

    /// Content type for uploaded files (guessed from the file name otherwise)
    #[arg(long)]
    pub content_type: Option<String>,
}

/// Whether sources are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Copy,
    Move,
}

impl Mode {
    fn verb(self) -> &'static str {
        match self {
            Mode::Copy => "copy",
            Mode::Move => "move",
        }
    }
}

#[derive(Debug, Serialize)]
struct CpItem {
    source: String,
    target: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_human: Option<String>,
}

#[derive(Debug, Serialize)]
struct CpOutput {
    status: &'static str,
    items: Vec<CpItem>,
    failed: usize,
}

/// Why a file or the whole operation stopped
pub(crate) enum Stop {
    Failed(ExitCode),
    Interrupted,
}

/// One planned transfer
#[derive(Debug, Clone, PartialEq, Eq)]
struct Item {
    source: String,
    target: String,
    size: u64,
}

/// Shared state of one cp/mv invocation
pub(crate) struct Run<'a> {
    pub(crate) formatter: &'a Formatter,
    pub(crate) interrupt: &'a Interrupt,
    pub(crate) mode: Mode,
    pub(crate) recursive: bool,
    pub(crate) continue_on_error: bool,
    pub(crate) dry_run: bool,
    pub(crate) content_type: Option<String>,
    items: Vec<CpItem>,
    failed: usize,
}

impl<'a> Run<'a> {
    pub(crate) fn new(formatter: &'a Formatter, interrupt: &'a Interrupt, mode: Mode) -> Self {
        Self {
            formatter,
            interrupt,
            mode,
            recursive: false,
            continue_on_error: false,
            dry_run: false,
            content_type: None,
            items: Vec::new(),
            failed: 0,
        }
    }

    fn record(&mut self, item: &Item, status: &'static str, bytes: Option<u64>) {
        if !self.formatter.is_json() && status == "success" {
            let size = bytes
                .map(|b| format!(" ({})", humansize::format_size(b, humansize::BINARY)))
                .unwrap_or_default();
            self.formatter
                .println(&format!("{} -> {}{size}", item.source, item.target));
        }
        self.items.push(CpItem {
            source: item.source.clone(),
            target: item.target.clone(),
            status,
            size_bytes: bytes,
            size_human: bytes.map(|b| humansize::format_size(b, humansize::BINARY)),
        });
    }

    /// Decide whether to go on after a failed item
    fn failed(&mut self, item: &Item, code: ExitCode) -> Result<(), Stop> {
        self.failed += 1;
        self.record(item, "failed", None);
        if self.continue_on_error {
            Ok(())
        } else {
            Err(Stop::Failed(code))
        }
    }

    fn finish(&mut self, outcome: Result<(), Stop>) -> ExitCode {
        let code = match outcome {
            Ok(()) if self.failed > 0 => ExitCode::GeneralError,
            Ok(()) => ExitCode::Success,
            Err(Stop::Failed(code)) => code,
            Err(Stop::Interrupted) => ExitCode::Interrupted,
        };

        if self.formatter.is_json() {
            self.formatter.json(&CpOutput {
                status: if code == ExitCode::Success {
                    "success"
                } else {
                    "partial"
                },
                failed: self.failed,
                items: std::mem::take(&mut self.items),
            });
        } else {
            let done = self.items.iter().filter(|i| i.status == "success").count();
            let skipped = self.items.iter().filter(|i| i.status == "skipped").count();
            if code == ExitCode::Interrupted {
                self.formatter.warning("Interrupted.");
            }
            if skipped > 0 {
                self.formatter.warning(&format!("Skipped {skipped} file(s)."));
            }
            if self.failed > 0 {
                self.formatter.warning(&format!(
                    "Completed with errors: {done} succeeded, {} failed",
                    self.failed
                ));
            } else if done > 1 {
                let verb = match self.mode {
                    Mode::Copy => "Copied",
                    Mode::Move => "Moved",
                };
                self.formatter.success(&format!("{verb} {done} file(s)."));
            }
        }
        code
    }
}

/// Execute the cp command
pub async fn execute(args: CpArgs, output_config: OutputConfig, interrupt: Interrupt) -> ExitCode {
    let formatter = Formatter::new(output_config);
    let mut run = Run::new(&formatter, &interrupt, Mode::Copy);
    run.recursive = args.recursive;
    run.continue_on_error = args.continue_on_error;
    run.dry_run = args.dry_run;
    run.content_type = args.content_type;

    transfer(&mut run, &args.source, &args.target).await
}

/// Dispatch on the direction of a copy or move
pub(crate) async fn transfer(run: &mut Run<'_>, source: &str, target: &str) -> ExitCode {
    let formatter = run.formatter;
    let source = match parse_path(source) {
        Ok(p) => p,
        Err(e) => return report(formatter, &e),
    };
    let target = match parse_path(target) {
        Ok(p) => p,
        Err(e) => return report(formatter, &e),
    };

    let (mut session, outcome) = match (&source, &target) {
        (ParsedPath::Local(src), ParsedPath::Remote(dst)) => {
            let mut session = match open_session(&dst.alias, formatter).await {
                Ok(s) => s,
                Err(code) => return code,
            };
            let outcome = upload(run, &mut session, src, dst).await;
            (session, outcome)
        }
        (ParsedPath::Remote(src), ParsedPath::Local(dst)) => {
            let mut session = match open_session(&src.alias, formatter).await {
                Ok(s) => s,
                Err(code) => return code,
            };
            let outcome = download(run, &mut session, src, dst).await;
            (session, outcome)
        }
        (ParsedPath::Remote(src), ParsedPath::Remote(dst)) => {
            if src.alias != dst.alias {
                let err = Error::UnsupportedFeature(format!(
                    "Cannot {} between aliases '{}' and '{}'",
                    run.mode.verb(),
                    src.alias,
                    dst.alias
                ));
                return report(formatter, &err);
            }
            let mut session = match open_session(&src.alias, formatter).await {
                Ok(s) => s,
                Err(code) => return code,
            };
            let outcome = remote_copy(run, &mut session, src, dst).await;
            (session, outcome)
        }
        (ParsedPath::Local(_), ParsedPath::Local(_)) => {
            formatter.error(&format!(
                "Cannot {} between two local paths. Use the system command.",
                run.mode.verb()
            ));
            return ExitCode::UsageError;
        }
    };

    session.close();
    run.finish(outcome)
}

async fn upload(
    run: &mut Run<'_>,
    session: &mut Session,
    src: &Path,
    dst: &RemotePath,
) -> Result<(), Stop> {
    let formatter = run.formatter;
    if dst.is_root() {
        formatter.error("Destination must name a bucket");
        return Err(Stop::Failed(ExitCode::UsageError));
    }
    if !src.exists() {
        formatter.error(&format!("Source not found: {}", src.display()));
        return Err(Stop::Failed(ExitCode::NotFound));
    }
    if src.is_dir() && !run.recursive {
        formatter.error("Source is a directory. Use -r/--recursive to copy directories.");
        return Err(Stop::Failed(ExitCode::UsageError));
    }

    let plan = upload_plan(src, dst)
        .map_err(|e| Stop::Failed(report(formatter, &Error::from(e))))?;
    for (local, item) in plan {
        upload_one(run, session, &local, &item).await?;
    }
    Ok(())
}

/// Local files under `src` with their destination paths
fn upload_plan(src: &Path, dst: &RemotePath) -> std::io::Result<Vec<(PathBuf, Item)>> {
    let destination = |key: String, local: &Path, size: u64| {
        let target = RemotePath::new(&dst.alias, &dst.bucket, key);
        Item {
            source: local.display().to_string(),
            target: target.fs_path(),
            size,
        }
    };

    if src.is_file() {
        let size = std::fs::metadata(src)?.len();
        let key = if dst.key.is_empty() || dst.key.ends_with('/') {
            let filename = src.file_name().unwrap_or_default().to_string_lossy();
            format!("{}{filename}", dst.key)
        } else {
            dst.key.clone()
        };
        return Ok(vec![(src.to_path_buf(), destination(key, src, size))]);
    }

    let base = dst.key.trim_end_matches('/');
    let mut plan = Vec::new();
    for (local, relative) in walk_dir(src, src)? {
        let relative = relative.replace('\\', "/");
        let key = if base.is_empty() {
            relative
        } else {
            format!("{base}/{relative}")
        };
        let size = std::fs::metadata(&local)?.len();
        let item = destination(key, &local, size);
        plan.push((local, item));
    }
    Ok(plan)
}

fn walk_dir(dir: &Path, base: &Path) -> std::io::Result<Vec<(PathBuf, String)>> {
    let mut files = Vec::new();
    let mut entries = std::fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let path = entry.path();
        if path.is_file() {
            let relative = path.strip_prefix(base).unwrap_or(&path);
            let relative = relative.to_string_lossy().to_string();
            files.push((path, relative));
        } else if path.is_dir() {
            files.extend(walk_dir(&path, base)?);
        }
    }
    Ok(files)
}

async fn upload_one(
    run: &mut Run<'_>,
    session: &mut Session,
    local: &Path,
    item: &Item,
) -> Result<(), Stop> {
    let formatter = run.formatter;
    if run.dry_run {
        formatter.println(&format!("Would {}: {} -> {}", run.mode.verb(), item.source, item.target));
        return Ok(());
    }

    let mut file = match tokio::fs::File::open(local).await {
        Ok(f) => f,
        Err(e) => {
            let code = report(formatter, &Error::from(e));
            return run.failed(item, code);
        }
    };
    let content_type = run.content_type.clone().or_else(|| {
        mime_guess::from_path(local)
            .first()
            .map(|m| m.essence_str().to_string())
    });
    let properties = PutProperties { content_type };

    let name = local.file_name().unwrap_or_default().to_string_lossy();
    let mut bar = TransferBar::new(formatter.config(), &name, item.size, run.interrupt.watch());
    let outcome = session
        .upload(&mut file, &item.target, item.size, properties, &mut bar)
        .await;
    bar.finish();

    match outcome {
        Ok(TransferOutcome::Completed(receipt)) => {
            tracing::debug!(key = %receipt.key, parts = receipt.parts, "Upload finished");
            if run.mode == Mode::Move
                && let Err(e) = tokio::fs::remove_file(local).await
            {
                let code = report(formatter, &Error::from(e));
                return run.failed(item, code);
            }
            run.record(item, "success", Some(receipt.bytes));
            Ok(())
        }
        Ok(TransferOutcome::Skipped) => {
            run.record(item, "skipped", None);
            Ok(())
        }
        Ok(TransferOutcome::Aborted) => Err(Stop::Interrupted),
        Err(e) => {
            let code = report(formatter, &e);
            if e.is_fatal() {
                return Err(Stop::Failed(code));
            }
            run.failed(item, code)
        }
    }
}

async fn download(
    run: &mut Run<'_>,
    session: &mut Session,
    src: &RemotePath,
    dst: &Path,
) -> Result<(), Stop> {
    let formatter = run.formatter;
    let entry = if src.key.is_empty() {
        DirEntry::directory(src.bucket.clone())
    } else {
        session
            .read_single(&src.fs_path())
            .await
            .map_err(|e| Stop::Failed(report(formatter, &e)))?
    };
    if entry.is_dir() && !run.recursive {
        formatter.error("Source is a folder. Use -r/--recursive to copy folders.");
        return Err(Stop::Failed(ExitCode::UsageError));
    }

    let plan = if entry.is_dir() {
        download_plan(session, &src.fs_path(), dst)
            .await
            .map_err(|e| Stop::Failed(report(formatter, &e)))?
    } else {
        let target = if dst.is_dir() || dst.to_string_lossy().ends_with('/') {
            dst.join(&entry.name)
        } else {
            dst.to_path_buf()
        };
        vec![Item {
            source: src.fs_path(),
            target: target.display().to_string(),
            size: entry.size_bytes.unwrap_or_default(),
        }]
    };

    for item in plan {
        download_one(run, session, &item).await?;
    }
    Ok(())
}

/// Files below a remote folder with their local destinations
async fn download_plan(
    session: &mut Session,
    root: &str,
    dst: &Path,
) -> bfs_core::Result<Vec<Item>> {
    let root = root.trim_end_matches('/');
    let mut plan = Vec::new();
    let mut pending = vec![(root.to_string(), dst.to_path_buf())];

    while let Some((dir, local)) = pending.pop() {
        let listing = session.list(&dir).await?;
        for entry in listing.children() {
            let remote = child_path(&dir, &entry.name);
            let target = local.join(&entry.name);
            if entry.is_dir() {
                pending.push((remote, target));
            } else {
                plan.push(Item {
                    source: remote,
                    target: target.display().to_string(),
                    size: entry.size_bytes.unwrap_or_default(),
                });
            }
        }
    }
    plan.sort_by(|a, b| a.source.cmp(&b.source));
    Ok(plan)
}

async fn download_one(run: &mut Run<'_>, session: &mut Session, item: &Item) -> Result<(), Stop> {
    let formatter = run.formatter;
    if run.dry_run {
        formatter.println(&format!("Would {}: {} -> {}", run.mode.verb(), item.source, item.target));
        return Ok(());
    }

    let target = Path::new(&item.target);
    if let Some(parent) = target.parent()
        && !parent.as_os_str().is_empty()
        && let Err(e) = tokio::fs::create_dir_all(parent).await
    {
        let code = report(formatter, &Error::from(e));
        return run.failed(item, code);
    }
    let mut file = match tokio::fs::File::create(target).await {
        Ok(f) => f,
        Err(e) => {
            let code = report(formatter, &Error::from(e));
            return run.failed(item, code);
        }
    };

    let name = target.file_name().unwrap_or_default().to_string_lossy();
    let mut bar = TransferBar::new(formatter.config(), &name, item.size, run.interrupt.watch());
    let outcome = session.download(&item.source, &mut file, &mut bar).await;
    bar.finish();
    let flushed = file.flush().await;
    drop(file);

    match outcome {
        Ok(TransferOutcome::Completed(receipt)) => {
            if let Err(e) = flushed {
                let code = report(formatter, &Error::from(e));
                return run.failed(item, code);
            }
            if receipt.resumed > 0 {
                tracing::debug!(path = %item.source, resumed = receipt.resumed, "Download resumed");
            }
            if run.mode == Mode::Move
                && let Err(e) = session.delete(&item.source, false).await
            {
                let code = report(formatter, &e);
                return run.failed(item, code);
            }
            run.record(item, "success", Some(receipt.bytes));
            Ok(())
        }
        Ok(TransferOutcome::Skipped) => {
            discard_partial(target).await;
            run.record(item, "skipped", None);
            Ok(())
        }
        Ok(TransferOutcome::Aborted) => {
            discard_partial(target).await;
            Err(Stop::Interrupted)
        }
        Err(e) => {
            formatter.warning(&format!("Partial data left in {}", item.target));
            let code = report(formatter, &e);
            if e.is_fatal() {
                return Err(Stop::Failed(code));
            }
            run.failed(item, code)
        }
    }
}

async fn discard_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::debug!(path = %path.display(), error = %e, "Could not remove partial file");
    }
}

async fn remote_copy(
    run: &mut Run<'_>,
    session: &mut Session,
    src: &RemotePath,
    dst: &RemotePath,
) -> Result<(), Stop> {
    let formatter = run.formatter;
    let entry = session
        .read_single(&src.fs_path())
        .await
        .map_err(|e| Stop::Failed(report(formatter, &e)))?;

    let target = if dst.key.is_empty() || dst.key.ends_with('/') {
        RemotePath::new(&dst.alias, &dst.bucket, format!("{}{}", dst.key, entry.name))
    } else {
        dst.clone()
    };
    let item = Item {
        source: src.fs_path(),
        target: target.fs_path(),
        size: entry.size_bytes.unwrap_or_default(),
    };

    if run.dry_run {
        formatter.println(&format!("Would {}: {} -> {}", run.mode.verb(), item.source, item.target));
        return Ok(());
    }

    let result = match run.mode {
        Mode::Copy => session.copy(&item.source, entry.is_dir(), &item.target).await,
        Mode::Move => session.rename(&item.source, entry.is_dir(), &item.target).await,
    };
    match result {
        Ok(()) => {
            run.record(&item, "success", entry.size_bytes);
            Ok(())
        }
        Err(e) => Err(Stop::Failed(report(formatter, &e))),
    }
}
