//! Error taxonomy for `qdone`.
//!
//! Every fallible operation in the workspace returns [`QdoneError`]. The
//! variants mirror the kinds a caller actually needs to branch on: whether to
//! retry, whether to exit with a usage message, and whether a batch send
//! partially succeeded.

use thiserror::Error;

/// One rejected entry from a batch send.
#[derive(Debug, Clone)]
pub struct FailedEntry {
    pub id: String,
    pub code: String,
    pub message: String,
}

/// Specialised `Result` for `qdone` operations.
pub type Result<T> = std::result::Result<T, QdoneError>;

#[derive(Debug, Error)]
pub enum QdoneError {
    /// Invalid CLI arguments or option combination. Exits with code 1 and a
    /// usage hint; never retried.
    #[error("usage error: {0}")]
    Usage(String),

    /// The named queue does not exist. The resolver handles this locally by
    /// creating the queue chain; it only escapes to a caller if creation
    /// itself then fails.
    #[error("queue does not exist: {0}")]
    NotExist(String),

    /// Request-throttled or KMS-throttled. Retried by the backoff controller.
    #[error("request throttled: {0}")]
    Throttled(String),

    /// A queue was created moments ago and is not yet visible to reads.
    /// Retried the same way as `Throttled`.
    #[error("queue not yet consistent: {0}")]
    EventualConsistency(String),

    /// `SendMessageBatch` returned a non-empty `Failed` array. Carries the
    /// rejected entries so the caller can report them.
    #[error("{} of {total} batch entries failed", entries.len())]
    BatchPartial { total: usize, entries: Vec<FailedEntry> },

    /// Authentication or authorisation failure talking to the queue service.
    /// Never retried.
    #[error("access denied: {0} (check credentials and IAM policy)")]
    AccessDenied(String),

    /// The job's child process exited non-zero or was killed. Not an error of
    /// the queue layer — the worker loop counts it, it does not propagate it.
    #[error("child process failed: {0}")]
    ChildFailure(String),

    /// Visibility-timeout extension failed. Logged and swallowed by the
    /// executor; surfaced here only so callers that want to observe it can.
    #[error("visibility extension failed: {0}")]
    ExtensionFailure(String),

    /// Any other error surfaced by the queue client.
    #[error("queue client error: {0}")]
    Client(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl QdoneError {
    /// Whether the backoff controller (component A) should retry an action
    /// that failed with this error.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Throttled(_) | Self::EventualConsistency(_))
    }

    /// Process exit code for this error when it escapes to `main`.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) => 1,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttled_and_eventual_consistency_are_retryable() {
        assert!(QdoneError::Throttled("slow down".into()).is_retryable());
        assert!(QdoneError::EventualConsistency("not yet".into()).is_retryable());
    }

    #[test]
    fn usage_and_access_denied_are_not_retryable() {
        assert!(!QdoneError::Usage("bad flag".into()).is_retryable());
        assert!(!QdoneError::AccessDenied("no creds".into()).is_retryable());
        assert!(!QdoneError::ChildFailure("exit 1".into()).is_retryable());
    }

    #[test]
    fn batch_partial_reports_failed_count() {
        let err = QdoneError::BatchPartial {
            total: 3,
            entries: vec![FailedEntry {
                id: "1".into(),
                code: "InternalError".into(),
                message: "boom".into(),
            }],
        };
        assert_eq!(err.to_string(), "1 of 3 batch entries failed");
    }
}
