//! # Recovery Scanning and Selection
//!
//! Walks the recovery directory to find sessions that can be resumed.
//! The lock on each notification artifact is the sole liveness signal:
//!
//! - lock held elsewhere: the session is live, skip silently;
//! - lock acquired: the session is abandoned, a candidate;
//! - lock call failed outright: assume abandoned anyway and proceed,
//!   the documented (and observable) risk being a collision with a live
//!   session on a platform with broken lock semantics.
//!
//! Orphaned notification files, whose backing store no longer exists,
//! are deleted opportunistically during any scan. They appear when the
//! backing file was removed but the process died before removing the
//! notification.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Local};
use tracing::warn;

use crate::errors::{RecoveryError, RecoveryResult};
use crate::header;
use crate::recdir::NOTIFICATION_PREFIX;
use crate::report::{MessageSink, Severity};
use crate::session::{SessionLock, TryLock};

/// One recoverable session, as presented to the user.
#[derive(Debug, Clone)]
pub struct Recoverable {
    /// Document display name from the `file` header.
    pub document: String,
    /// Last modification time of the notification artifact.
    pub modified: DateTime<Local>,
}

/// Everything a resumed session needs: the backing store to reopen and
/// the lock acquired during the scan, transferred as-is.
#[derive(Debug)]
pub struct ResumeHandle {
    pub backing_path: PathBuf,
    pub notification_path: PathBuf,
    pub lock: SessionLock,
}

/// A scan candidate: an abandoned, well-formed, non-orphaned entry.
struct Candidate {
    entry_path: PathBuf,
    lock: SessionLock,
    file: Vec<u8>,
    backing_path: PathBuf,
    mtime: SystemTime,
}

/// Walk the directory, yielding candidates and deleting orphans.
///
/// Candidates keep their scan lock for the caller to transfer or drop;
/// dropping the returned vector releases every lock.
fn scan(dir: &Path, sink: &dyn MessageSink) -> RecoveryResult<Vec<Candidate>> {
    let entries = fs::read_dir(dir).map_err(|e| RecoveryError::DirectoryUnavailable {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut candidates = Vec::new();
    for entry in entries.flatten() {
        if !entry
            .file_name()
            .to_string_lossy()
            .starts_with(NOTIFICATION_PREFIX)
        {
            continue;
        }
        let path = entry.path();

        // If it's readable, it's recoverable.
        let Ok(file) = File::open(&path) else {
            continue;
        };

        let lock = match SessionLock::try_acquire(file) {
            TryLock::Locked(lock) => lock,
            TryLock::Held(_) => continue, // live session
            TryLock::Failed(file, e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "lock probe failed; treating entry as abandoned"
                );
                SessionLock::unheld(file)
            }
        };

        let prelude = match header::read_prelude(BufReader::new(lock.file())) {
            Ok(prelude) => prelude,
            Err(_) => {
                let err = RecoveryError::MalformedRecoveryRecord { path: path.clone() };
                sink.report(Severity::Error, &err.to_string());
                continue;
            }
        };

        let backing_path = prelude.backing_path();
        match fs::metadata(&backing_path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Orphan: toss it.
                let _ = fs::remove_file(&path);
                continue;
            }
            _ => {}
        }

        let mtime = lock
            .file()
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(UNIX_EPOCH);

        candidates.push(Candidate {
            entry_path: path,
            lock,
            file: prelude.file,
            backing_path,
            mtime,
        });
    }
    Ok(candidates)
}

/// List every recoverable session in the directory.
///
/// Live sessions are never reported; orphans are deleted as a side
/// effect. An empty directory is a normal outcome, reported as
/// informational.
pub fn list(dir: &Path, sink: &dyn MessageSink) -> RecoveryResult<Vec<Recoverable>> {
    let candidates = scan(dir, sink)?;

    let found: Vec<Recoverable> = candidates
        .iter()
        .map(|c| Recoverable {
            document: String::from_utf8_lossy(&c.file).into_owned(),
            modified: DateTime::from(c.mtime),
        })
        .collect();

    if found.is_empty() {
        sink.report(Severity::Info, "No files to recover");
    }
    Ok(found)
}

/// Pick the best abandoned session for `document` and hand over its
/// backing store and scan lock.
///
/// Among matches the latest modification time wins (second granularity;
/// equal times resolve to the entry scanned last). Counts of older
/// versions and unrelated recoverable files are reported as advisories,
/// never failures. No match is the expected `NoMatchingRecovery`
/// outcome.
pub fn select(
    dir: &Path,
    document: &str,
    sink: &dyn MessageSink,
) -> RecoveryResult<ResumeHandle> {
    let candidates = scan(dir, sink)?;
    let found = candidates.len();

    let mut requested = 0usize;
    let mut best: Option<Candidate> = None;
    for candidate in candidates {
        if candidate.file != document.as_bytes() {
            continue;
        }
        requested += 1;
        let newer = match &best {
            Some(current) => candidate.mtime >= current.mtime,
            None => true,
        };
        if newer {
            best = Some(candidate);
        }
    }

    let Some(best) = best else {
        let err = RecoveryError::NoMatchingRecovery(document.to_string());
        sink.report(Severity::Info, &err.to_string());
        return Err(err);
    };

    if requested > 1 {
        sink.report(
            Severity::Info,
            "There are older versions of this file for you to recover",
        );
    }
    if found > requested {
        sink.report(
            Severity::Info,
            "There are other files for you to recover",
        );
    }

    Ok(ResumeHandle {
        backing_path: best.backing_path,
        notification_path: best.entry_path,
        lock: best.lock,
    })
}
