//! info command - Show what a store connection supports

use bfs_core::Capability;
use clap::Args;
use serde::Serialize;

use super::{open_session, parse_remote, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Show what a store connection supports
#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Alias name (or any path behind it)
    pub alias: String,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    alias: String,
    endpoint: String,
    auth_region: String,
    supported: Vec<&'static str>,
    unsupported: Vec<&'static str>,
}

/// Execute the info command
pub async fn execute(args: InfoArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let path = match parse_remote(&args.alias) {
        Ok(p) => p,
        Err(e) => return report(&formatter, &e),
    };

    let mut session = match open_session(&path.alias, &formatter).await {
        Ok(s) => s,
        Err(code) => return code,
    };

    let capabilities = session.capabilities();
    let resolver = session.resolver();
    let output = InfoOutput {
        alias: path.alias.clone(),
        endpoint: resolver.service_endpoint().endpoint_url(),
        auth_region: resolver.auth_region().to_string(),
        supported: capabilities.supported().map(Capability::name).collect(),
        unsupported: capabilities.unsupported().map(Capability::name).collect(),
    };
    session.close();

    if formatter.is_json() {
        formatter.json(&output);
    } else {
        formatter.println(&format!("Alias     : {}", output.alias));
        formatter.println(&format!("Endpoint  : {}", output.endpoint));
        formatter.println(&format!("Region    : {}", output.auth_region));
        formatter.println("Supported :");
        for name in &output.supported {
            formatter.println(&format!("  {name}"));
        }
        formatter.println("Unsupported :");
        for name in &output.unsupported {
            formatter.println(&format!("  {}", formatter.dim(name)));
        }
    }
    ExitCode::Success
}
