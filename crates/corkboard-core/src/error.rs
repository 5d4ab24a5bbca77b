use std::fmt;

use crate::model::task::Task;

/// Machine-readable error codes for client-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    ValidationFailed,
    TaskNotFound,
    NoCandidates,
    StorageFailed,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::ValidationFailed => "E2001",
            Self::TaskNotFound => "E2002",
            Self::NoCandidates => "E2003",
            Self::StorageFailed => "E5001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and API error bodies.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::ValidationFailed => "Validation failed",
            Self::TaskNotFound => "Task not found",
            Self::NoCandidates => "No assignment candidates",
            Self::StorageFailed => "Storage operation failed",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to callers.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in corkboard.toml and retry."),
            Self::ValidationFailed => {
                Some("Correct the offending field and resubmit the request.")
            }
            Self::TaskNotFound => Some("Refetch the board; the task may have been deleted."),
            Self::NoCandidates => Some("Provide at least one candidate user for assignment."),
            Self::StorageFailed => Some("Check database file permissions and disk space."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Failures surfaced by board operations.
///
/// A version mismatch is deliberately absent here: a rejected optimistic
/// update is a [`UpdateOutcome::Conflict`], a distinct outcome the caller
/// must resolve, not a failure.
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    /// A field-level constraint was violated. `field` names the offender.
    #[error("validation failed for '{field}': {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// The referenced task does not exist on the given board.
    #[error("task not found: {id}")]
    TaskNotFound { id: String },

    /// Smart assign was invoked with an empty candidate pool.
    #[error("smart assign requires at least one candidate")]
    NoCandidates,

    /// An underlying SQLite failure. Not retried at this layer.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Anything else unexpected; opaque to the caller.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl BoardError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Validation { .. } => ErrorCode::ValidationFailed,
            Self::TaskNotFound { .. } => ErrorCode::TaskNotFound,
            Self::NoCandidates => ErrorCode::NoCandidates,
            Self::Storage(_) => ErrorCode::StorageFailed,
            Self::Internal(_) => ErrorCode::InternalUnexpected,
        }
    }
}

/// Result of an optimistic update: either the write was accepted, or it was
/// rejected as stale and recorded as a pending conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The write was applied; carries the new authoritative record.
    Applied(Task),
    /// The writer's expected version was stale. Carries the current
    /// authoritative record, now holding one more pending snapshot.
    Conflict(Task),
}

impl UpdateOutcome {
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// The authoritative record either way.
    #[must_use]
    pub const fn task(&self) -> &Task {
        match self {
            Self::Applied(task) | Self::Conflict(task) => task,
        }
    }
}
