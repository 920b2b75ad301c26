//! bfs - filesystem view of S3-compatible storage
//!
//! Browses buckets as directories and moves files to and from any
//! S3-compatible service.

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use bucketfs::commands::{self, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // --debug wins over RUST_LOG
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let exit_code = commands::execute(cli).await;

    std::process::exit(exit_code.as_i32());
}
