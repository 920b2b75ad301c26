//! Ctrl-C handling for long-running operations
//!
//! Presses are counted for the whole process. Each transferred item watches
//! the counter from the moment it starts: one press skips the item, a second
//! press during the same item aborts the operation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use bfs_core::Cancel;

/// Shared Ctrl-C press counter
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    presses: Arc<AtomicU32>,
}

impl Interrupt {
    /// Start counting Ctrl-C presses
    ///
    /// Must be called from within a tokio runtime.
    pub fn install() -> Self {
        let interrupt = Self::default();
        let presses = Arc::clone(&interrupt.presses);
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                let count = presses.fetch_add(1, Ordering::SeqCst) + 1;
                tracing::debug!(presses = count, "Interrupt received");
            }
        });
        interrupt
    }

    /// Record a press without a signal
    pub fn press(&self) {
        self.presses.fetch_add(1, Ordering::SeqCst);
    }

    pub fn presses(&self) -> u32 {
        self.presses.load(Ordering::SeqCst)
    }

    pub fn was_pressed(&self) -> bool {
        self.presses() > 0
    }

    /// Watch presses from now on
    pub fn watch(&self) -> InterruptWatch {
        InterruptWatch {
            interrupt: self.clone(),
            baseline: self.presses(),
        }
    }
}

/// Presses seen since one item started
#[derive(Debug, Clone)]
pub struct InterruptWatch {
    interrupt: Interrupt,
    baseline: u32,
}

impl InterruptWatch {
    pub fn check(&self) -> Option<Cancel> {
        match self.interrupt.presses().saturating_sub(self.baseline) {
            0 => None,
            1 => Some(Cancel::Skip),
            _ => Some(Cancel::Abort),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_escalates_skip_to_abort() {
        let interrupt = Interrupt::default();
        let watch = interrupt.watch();
        assert_eq!(watch.check(), None);

        interrupt.press();
        assert_eq!(watch.check(), Some(Cancel::Skip));

        interrupt.press();
        assert_eq!(watch.check(), Some(Cancel::Abort));
    }

    #[test]
    fn test_watch_ignores_earlier_presses() {
        let interrupt = Interrupt::default();
        interrupt.press();

        let watch = interrupt.watch();
        assert!(interrupt.was_pressed());
        assert_eq!(watch.check(), None);
    }
}
