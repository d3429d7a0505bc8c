//! Abstract user-notification channel.
//!
//! The coordinator reports mode transitions and user-visible errors
//! through a [`Notifier`]; rendering (toast, banner) is the consumer's
//! concern and out of scope here.

use std::sync::Arc;

use parking_lot::Mutex;

/// What a notice is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// A domain switched to local mode; the user's actions still succeed
    /// but only on this device.
    OfflineFallback,
    /// The backend rejected the credential; the caller should force a
    /// sign-out.
    Unauthorized,
    /// A write was rejected as stale; the user may retry.
    Conflict,
    /// Local storage is running out of room.
    StorageWarning,
}

/// A non-blocking, user-facing notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    /// The "working offline" notice emitted when a domain flips to local
    /// mode. Fired exactly once per flip.
    #[must_use]
    pub fn offline(domain: &str) -> Self {
        Self {
            kind: NoticeKind::OfflineFallback,
            message: format!("{domain} is working offline; changes are saved on this device"),
        }
    }

    #[must_use]
    pub fn unauthorized(domain: &str) -> Self {
        Self {
            kind: NoticeKind::Unauthorized,
            message: format!("{domain}: your session is no longer valid, please sign in again"),
        }
    }

    #[must_use]
    pub fn conflict(domain: &str) -> Self {
        Self {
            kind: NoticeKind::Conflict,
            message: format!("{domain}: that change clashed with a newer one, please retry"),
        }
    }
}

/// Sink for user-facing notices.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Notifier that forwards notices to the log.
///
/// The default for headless consumers and tests that don't inspect
/// notices.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        tracing::warn!(kind = ?notice.kind, "{}", notice.message);
    }
}

/// Notifier that records notices for later inspection.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl MemoryNotifier {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// All notices received so far, in order.
    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    /// Number of notices of the given kind received so far.
    #[must_use]
    pub fn count_of(&self, kind: NoticeKind) -> usize {
        self.notices.lock().iter().filter(|n| n.kind == kind).count()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }
}
