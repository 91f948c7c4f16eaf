//! Common error infrastructure for the engine.
//!
//! The engine absorbs most recoverable conditions locally (logged no-ops),
//! so the error surface is small: a severity classification shared by all
//! error types, and the scheduler's misuse errors.
//!
//! # Taxonomy
//!
//! - **Misuse**: programmer error at the API boundary (hook subscription
//!   before any timer registration, starting a zero-duration timer).
//!   Reported via `tracing::warn!`, the operation degrades to a no-op.
//! - **NotFound**: removal or routing against something that does not
//!   exist. Silent no-op, to permit broadcast patterns.
//! - **Internal**: engine invariant violations. Guarded by debug
//!   assertions and structurally prevented by ownership rules.

use crate::scheduler::OwnerId;

/// Severity level of an engine error, used for categorization and logging
/// priorities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// API misuse; the offending call degraded to a no-op.
    Misuse,

    /// Target not found; silently absorbed.
    NotFound,

    /// Engine invariant violation; indicates a bug in the engine itself.
    Internal,
}

impl ErrorSeverity {
    /// Returns a human-readable description of this severity level.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Misuse => "misuse",
            Self::NotFound => "not-found",
            Self::Internal => "internal",
        }
    }

    /// Returns true if the caller can recover by correcting its input.
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Internal)
    }
}

/// Common trait for engine error types.
///
/// Provides a uniform classification interface so callers can decide
/// whether to log, retry, or escalate without matching on concrete
/// variants.
pub trait EngineError: core::fmt::Display + core::fmt::Debug {
    /// Returns the severity level of this error.
    fn severity(&self) -> ErrorSeverity;

    /// Returns a static string identifier for this error variant.
    fn error_code(&self) -> &'static str {
        core::any::type_name::<Self>()
    }
}

/// Errors produced by [`Scheduler`](crate::scheduler::Scheduler) misuse.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    /// A hook was subscribed for an owner that has never registered a
    /// timer. The owner must register at least one timer (even a disabled
    /// one) before its first subscription, because the manifest that
    /// tracks teardown is created on first registration.
    #[error("owner {0} has no timer manifest; register a timer before subscribing hooks")]
    ManifestMissing(OwnerId),

    /// The timer handle is stale: it was unregistered, its owner was torn
    /// down, or it was never issued by this scheduler.
    #[error("timer handle is stale or was never registered")]
    StaleTimer,
}

impl EngineError for ScheduleError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::ManifestMissing(_) => ErrorSeverity::Misuse,
            Self::StaleTimer => ErrorSeverity::Misuse,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::ManifestMissing(_) => "schedule.manifest_missing",
            Self::StaleTimer => "schedule.stale_timer",
        }
    }
}
