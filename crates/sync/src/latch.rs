//! Per-domain REMOTE/LOCAL mode latch.
//!
//! Once a domain observes an infrastructure failure it latches into local
//! mode and stays there - repeated slow network timeouts must not degrade
//! every subsequent interaction. The latch is owned by the domain's
//! coordinator and `reset()` is its only external mutator; there is no
//! module-level mode state anywhere in this crate.

use std::sync::atomic::{AtomicBool, Ordering};

/// Which backing store currently serves a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// The remote transactional store is the source of truth.
    Remote,
    /// The local shadow store serves all operations.
    Local,
}

/// Monotonic per-domain mode state: `Remote -> Local` only, until an
/// explicit [`reset`](ModeLatch::reset).
#[derive(Debug)]
pub struct ModeLatch {
    domain: &'static str,
    local: AtomicBool,
}

impl ModeLatch {
    /// A fresh latch in remote mode.
    #[must_use]
    pub const fn new(domain: &'static str) -> Self {
        Self {
            domain,
            local: AtomicBool::new(false),
        }
    }

    /// The domain this latch belongs to.
    #[must_use]
    pub const fn domain(&self) -> &'static str {
        self.domain
    }

    /// Current mode.
    #[must_use]
    pub fn mode(&self) -> SyncMode {
        if self.is_local() {
            SyncMode::Local
        } else {
            SyncMode::Remote
        }
    }

    /// Whether the domain is latched into local mode.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.local.load(Ordering::Acquire)
    }

    /// Latch into local mode.
    ///
    /// Returns `true` only for the call that performed the flip, so the
    /// "working offline" notice fires exactly once.
    pub fn trip(&self) -> bool {
        let flipped = !self.local.swap(true, Ordering::AcqRel);
        if flipped {
            tracing::warn!(domain = self.domain, "latched into local mode");
        }
        flipped
    }

    /// Return to remote mode.
    ///
    /// Called on domain re-initialization only: successful sign-in/sign-up
    /// for the session domain, cart re-initialization after a fresh
    /// sign-in, and sign-out (so the next session starts remote).
    pub fn reset(&self) {
        if self.local.swap(false, Ordering::AcqRel) {
            tracing::info!(domain = self.domain, "mode latch reset to remote");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_remote() {
        let latch = ModeLatch::new("cart");
        assert_eq!(latch.mode(), SyncMode::Remote);
        assert!(!latch.is_local());
    }

    #[test]
    fn test_trip_is_monotonic_and_reports_flip_once() {
        let latch = ModeLatch::new("cart");
        assert!(latch.trip());
        assert!(!latch.trip());
        assert!(!latch.trip());
        assert_eq!(latch.mode(), SyncMode::Local);
    }

    #[test]
    fn test_reset_returns_to_remote() {
        let latch = ModeLatch::new("session");
        latch.trip();
        latch.reset();
        assert_eq!(latch.mode(), SyncMode::Remote);
        // A fresh flip after reset reports once again.
        assert!(latch.trip());
    }
}
