//! # Recovery Errors
//!
//! Crate-wide error taxonomy for the recovery subsystem.
//!
//! Propagation policy:
//! - `DirectoryUnavailable` and `ArtifactCreateFailed` during arming are
//!   non-fatal to editing; they disable recovery for that session only.
//! - `SyncFailed` permanently disables recovery for the session and is
//!   never retried automatically.
//! - `MalformedRecoveryRecord` skips a single scan candidate.
//! - `NotificationSendFailed` never affects on-disk recovery state.
//! - `NoMatchingRecovery` is an expected outcome, not a failure.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for recovery operations
pub type RecoveryResult<T> = Result<T, RecoveryError>;

/// Recovery subsystem errors
#[derive(Debug, Error)]
pub enum RecoveryError {
    /// The recovery directory is missing and could not be created.
    #[error("recovery directory unavailable: {path}: {source}")]
    DirectoryUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A backing-store or notification artifact could not be created.
    #[error("cannot create recovery artifact in {dir}: {source}")]
    ArtifactCreateFailed {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The backing-store flush (or checkpoint copy) failed.
    #[error("file backup failed: {path}: {source}")]
    SyncFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A notification file on disk could not be parsed.
    #[error("{path}: malformed recovery file")]
    MalformedRecoveryRecord { path: PathBuf },

    /// The notification mail could not be submitted.
    #[error("not sending email: {0}")]
    NotificationSendFailed(String),

    /// No abandoned session matches the requested document name.
    #[error("no files named {0}, readable by you, to recover")]
    NoMatchingRecovery(String),
}

impl RecoveryError {
    /// True for the one outcome callers treat as informational.
    pub fn is_expected(&self) -> bool {
        matches!(self, RecoveryError::NoMatchingRecovery(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_path_context() {
        let err = RecoveryError::ArtifactCreateFailed {
            dir: PathBuf::from("/var/tmp/recover"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        let display = format!("{}", err);
        assert!(display.contains("/var/tmp/recover"));
        assert!(display.contains("denied"));
    }

    #[test]
    fn test_no_matching_recovery_is_expected() {
        assert!(RecoveryError::NoMatchingRecovery("foo.txt".into()).is_expected());
        let err = RecoveryError::MalformedRecoveryRecord {
            path: PathBuf::from("recover.abc"),
        };
        assert!(!err.is_expected());
    }
}
