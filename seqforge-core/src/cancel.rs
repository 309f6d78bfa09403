//! Cooperative cancellation for long-running passes.
//!
//! Indexing, graph simplification, and anchor matching check a shared
//! [`CancelToken`] between units of work and abort cleanly. Cancellation is
//! neither success nor failure; callers receive [`Progress::Cancelled`]
//! instead of a partial result. Timeouts are the caller's responsibility,
//! built on the same token.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation signal. Cloning yields a handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Running passes stop at their next check point.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Outcome of a cancellable operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress<T> {
    /// The operation ran to completion.
    Finished(T),
    /// The operation observed a cancelled token and aborted; no partial
    /// state escaped.
    Cancelled,
}

impl<T> Progress<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Progress::Cancelled)
    }

    pub fn into_finished(self) -> Option<T> {
        match self {
            Progress::Finished(value) => Some(value),
            Progress::Cancelled => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Progress<U> {
        match self {
            Progress::Finished(value) => Progress::Finished(f(value)),
            Progress::Cancelled => Progress::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_starts_clear() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn cancel_is_visible_through_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn progress_helpers() {
        let finished: Progress<u32> = Progress::Finished(7);
        assert_eq!(finished.into_finished(), Some(7));
        let cancelled: Progress<u32> = Progress::Cancelled;
        assert!(cancelled.is_cancelled());
        assert_eq!(cancelled.map(|v| v + 1), Progress::Cancelled);
    }
}
