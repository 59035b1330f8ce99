//! Cooperative cancellation for long-running state operations.
//!
//! A `Cancellation` handle is threaded through slot advancement, block
//! processing and bulk signature verification; those operations poll it at
//! their natural checkpoints (between slots, between operations, per batch
//! chunk) and abort with a `Cancelled`-class error when it fires.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cloneable cancellation token.
///
/// The default token never fires, so callers without a cancellation
/// requirement can pass `&Cancellation::default()`.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    cause: Mutex<Option<String>>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the token. Every clone observes the cancellation; the first
    /// recorded cause wins.
    pub fn cancel(&self, cause: impl Into<String>) {
        let mut recorded = self.inner.cause.lock();
        if recorded.is_none() {
            *recorded = Some(cause.into());
        }
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// The cause recorded by the first `cancel` call, if any.
    pub fn cause(&self) -> Option<String> {
        self.inner.cause.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_across_clones() {
        let token = Cancellation::new();
        let clone = token.clone();

        assert!(!clone.is_cancelled());

        token.cancel("shutting down");
        clone.cancel("too late");

        assert!(clone.is_cancelled());
        assert_eq!(token.cause().as_deref(), Some("shutting down"));
    }
}
