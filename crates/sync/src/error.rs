//! Classified failures from the remote backend.
//!
//! Every remote operation resolves to one of four kinds, and the whole
//! failover policy hangs off the distinction: infrastructure failures
//! ([`SyncError::Unreachable`], [`SyncError::Unknown`]) are recovered
//! locally, while [`SyncError::Unauthorized`] and [`SyncError::Conflict`]
//! always surface to the caller and never flip a domain into local mode.

use thiserror::Error;

/// A classified remote-store failure.
///
/// `Clone` so a settled result can be shared between de-duplicated
/// concurrent fetches.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// The backend could not be reached: network failure, timeout, or a
    /// server-side (5xx) error.
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// The credential was missing, expired, or rejected. A user-visible
    /// auth failure, not an infrastructure failure - the caller is
    /// expected to force a sign-out.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The write was rejected as stale. Retryable by the user; never
    /// merged automatically.
    #[error("conflict: {0}")]
    Conflict(String),

    /// An unclassified failure.
    #[error("unexpected backend failure: {0}")]
    Unknown(String),
}

impl SyncError {
    /// Whether this failure flips the owning domain into local mode.
    ///
    /// Only infrastructure failures do; auth and conflict failures leave
    /// the mode latch untouched.
    #[must_use]
    pub const fn triggers_fallback(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Unknown(_))
    }

    /// Short kind tag for log fields.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Unreachable(_) => "unreachable",
            Self::Unauthorized(_) => "unauthorized",
            Self::Conflict(_) => "conflict",
            Self::Unknown(_) => "unknown",
        }
    }
}
