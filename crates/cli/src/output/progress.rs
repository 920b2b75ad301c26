//! Transfer bars and listing spinners
//!
//! Both double as the core's progress hooks, so Ctrl-C reaches a running
//! transfer or listing through them.

use std::time::Duration;

use bfs_core::{Cancel, ListProgress, TransferProgress};
use indicatif::ProgressStyle;

use super::OutputConfig;
use crate::interrupt::InterruptWatch;

const BAR_TEMPLATE: &str =
    "{spinner:.green} {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg}";

/// An indicatif bar, absent in quiet, JSON and `--no-progress` modes
#[derive(Debug)]
struct ProgressBar {
    bar: Option<indicatif::ProgressBar>,
}

impl ProgressBar {
    fn hidden(config: &OutputConfig) -> bool {
        config.quiet || config.json || config.no_progress
    }

    fn new(config: &OutputConfig, total: u64) -> Self {
        let bar = (!Self::hidden(config)).then(|| {
            let bar = indicatif::ProgressBar::new(total);
            let style = ProgressStyle::default_bar()
                .template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-");
            bar.set_style(style);
            bar
        });

        Self { bar }
    }

    fn spinner(config: &OutputConfig, message: &str) -> Self {
        let bar = (!Self::hidden(config)).then(|| {
            let bar = indicatif::ProgressBar::new_spinner();
            let style = ProgressStyle::default_spinner()
                .template(SPINNER_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            bar.set_style(style);
            bar.set_message(message.to_string());
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        });

        Self { bar }
    }

    fn set_position(&self, pos: u64) {
        if let Some(bar) = &self.bar {
            bar.set_position(pos);
        }
    }

    fn set_message(&self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(message.to_string());
        }
    }

    fn finish_and_clear(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }

    #[cfg(test)]
    fn is_visible(&self) -> bool {
        self.bar.is_some()
    }
}

/// Byte progress for one transferred file
#[derive(Debug)]
pub struct TransferBar {
    bar: ProgressBar,
    watch: InterruptWatch,
    cancelled: Option<Cancel>,
}

impl TransferBar {
    pub fn new(config: &OutputConfig, name: &str, total: u64, watch: InterruptWatch) -> Self {
        let bar = ProgressBar::new(config, total);
        bar.set_message(name);
        Self {
            bar,
            watch,
            cancelled: None,
        }
    }

    /// How the transfer was cancelled, if it was
    pub fn cancelled(&self) -> Option<Cancel> {
        self.cancelled
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl TransferProgress for TransferBar {
    fn cancel_requested(&mut self) -> Option<Cancel> {
        let cancel = self.watch.check();
        if cancel.is_some() {
            self.cancelled = cancel;
        }
        cancel
    }

    fn set_transferred(&mut self, bytes: u64) {
        self.bar.set_position(bytes);
    }
}

/// Spinner counting entries while a large directory is listed
#[derive(Debug)]
pub struct ListSpinner {
    bar: ProgressBar,
    watch: InterruptWatch,
}

impl ListSpinner {
    pub fn new(config: &OutputConfig, path: &str, watch: InterruptWatch) -> Self {
        Self {
            bar: ProgressBar::spinner(config, &format!("Listing {path}")),
            watch,
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ListProgress for ListSpinner {
    fn next_page(&mut self, entries: usize) -> bool {
        self.bar.set_message(&format!("Listed {entries} entries"));
        self.watch.check().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interrupt::Interrupt;

    #[test]
    fn test_bars_hidden_outside_interactive_mode() {
        for config in [
            OutputConfig {
                quiet: true,
                ..Default::default()
            },
            OutputConfig {
                json: true,
                ..Default::default()
            },
            OutputConfig {
                no_progress: true,
                ..Default::default()
            },
        ] {
            assert!(!ProgressBar::new(&config, 100).is_visible());
            assert!(!ProgressBar::spinner(&config, "Listing /").is_visible());
        }
        assert!(ProgressBar::new(&OutputConfig::default(), 100).is_visible());
    }

    #[test]
    fn test_transfer_bar_reports_cancel() {
        let config = OutputConfig {
            no_progress: true,
            ..Default::default()
        };
        let interrupt = Interrupt::default();
        let mut bar = TransferBar::new(&config, "photo.jpg", 10, interrupt.watch());
        assert_eq!(bar.cancel_requested(), None);
        assert_eq!(bar.cancelled(), None);

        interrupt.press();
        assert_eq!(bar.cancel_requested(), Some(Cancel::Skip));
        assert_eq!(bar.cancelled(), Some(Cancel::Skip));
    }

    #[test]
    fn test_list_spinner_stops_on_interrupt() {
        let config = OutputConfig {
            quiet: true,
            ..Default::default()
        };
        let interrupt = Interrupt::default();
        let mut spinner = ListSpinner::new(&config, "/photos", interrupt.watch());
        assert!(spinner.next_page(1000));

        interrupt.press();
        assert!(!spinner.next_page(2000));
    }
}
