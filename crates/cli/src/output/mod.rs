//! Terminal output: result printing and transfer progress

mod formatter;
mod progress;

pub use formatter::Formatter;
pub use progress::{ListSpinner, TransferBar};

/// Global output flags
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    pub json: bool,
    pub no_color: bool,
    pub no_progress: bool,
    /// Suppress everything but errors
    pub quiet: bool,
}
