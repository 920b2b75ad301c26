//! mv command - Move or rename files
//!
//! Within one store this is a server-side rename (copy + delete). Across the
//! local boundary the file is transferred and the source removed afterwards.

use clap::Args;

use super::cp::{Mode, Run, transfer};
use crate::exit_code::ExitCode;
use crate::interrupt::Interrupt;
use crate::output::{Formatter, OutputConfig};

/// Move or rename files
#[derive(Args, Debug)]
pub struct MvArgs {
    /// Source path (local path or alias/bucket/key)
    pub source: String,

    /// Destination path (local path or alias/bucket/key)
    pub target: String,

    /// Move folders recursively (transfers only)
    #[arg(short, long)]
    pub recursive: bool,

    /// Continue with the next file after a failure
    #[arg(long)]
    pub continue_on_error: bool,

    /// Only show what would be moved (dry run)
    #[arg(long)]
    pub dry_run: bool,
}

/// Execute the mv command
pub async fn execute(args: MvArgs, output_config: OutputConfig, interrupt: Interrupt) -> ExitCode {
    let formatter = Formatter::new(output_config);
    let mut run = Run::new(&formatter, &interrupt, Mode::Move);
    run.recursive = args.recursive;
    run.continue_on_error = args.continue_on_error;
    run.dry_run = args.dry_run;

    transfer(&mut run, &args.source, &args.target).await
}
