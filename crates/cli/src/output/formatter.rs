//! Printing for commands
//!
//! Results go to stdout, diagnostics to stderr. In `--json` mode stdout
//! carries JSON documents only and errors become `{"error": ...}` objects.

use console::style;
use serde::Serialize;

use super::OutputConfig;

#[derive(Debug, Clone)]
pub struct Formatter {
    config: OutputConfig,
}

impl Formatter {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    pub fn is_json(&self) -> bool {
        self.config.json
    }

    fn colors_enabled(&self) -> bool {
        !self.config.no_color && !self.config.json
    }

    /// A completed mutation; silent in JSON and quiet modes
    pub fn success(&self, message: &str) {
        if self.config.quiet || self.config.json {
            return;
        }
        if self.colors_enabled() {
            println!("{} {message}", style("✓").green());
        } else {
            println!("✓ {message}");
        }
    }

    /// Printed even in quiet mode
    pub fn error(&self, message: &str) {
        self.error_with_details(message, None);
    }

    /// An error followed by the store's diagnostic text
    pub fn error_with_details(&self, message: &str, details: Option<&str>) {
        if self.config.json {
            let mut error = serde_json::json!({ "error": message });
            if let Some(details) = details {
                error["details"] = details.into();
            }
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&error).unwrap_or_else(|_| message.to_string())
            );
            return;
        }

        if self.colors_enabled() {
            eprintln!("{} {message}", style("✗").red());
        } else {
            eprintln!("✗ {message}");
        }
        for line in details.into_iter().flat_map(str::lines) {
            eprintln!("  {}", self.dim(line));
        }
    }

    pub fn dim(&self, text: &str) -> String {
        if self.colors_enabled() {
            style(text).dim().to_string()
        } else {
            text.to_string()
        }
    }

    pub fn warning(&self, message: &str) {
        if self.config.quiet || self.config.json {
            return;
        }
        if self.colors_enabled() {
            eprintln!("{} {message}", style("⚠").yellow());
        } else {
            eprintln!("⚠ {message}");
        }
    }

    /// One JSON document on stdout
    pub fn json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Error serializing output: {e}"),
        }
    }

    pub fn println(&self, message: &str) {
        if !self.config.quiet {
            println!("{message}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formatter(json: bool, no_color: bool) -> Formatter {
        Formatter::new(OutputConfig {
            json,
            no_color,
            ..Default::default()
        })
    }

    #[test]
    fn test_json_mode_disables_colors() {
        let f = formatter(true, false);
        assert!(f.is_json());
        assert!(!f.colors_enabled());
    }

    #[test]
    fn test_colors_follow_no_color() {
        assert!(formatter(false, false).colors_enabled());
        assert!(!formatter(false, true).colors_enabled());
    }

    #[test]
    fn test_dim_without_colors_is_plain() {
        let f = formatter(false, true);
        assert_eq!(f.dim("Resource: /photos"), "Resource: /photos");
    }
}
