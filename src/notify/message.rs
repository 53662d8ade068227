//! Notification file construction.
//!
//! A notification file is the mail prepared for delivery if its session
//! is later found abandoned: the two metadata header records, a blank
//! separator, then a word-wrapped advisory message telling the owner how
//! to recover.

use std::io::Write;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use crate::errors::{RecoveryError, RecoveryResult};
use crate::header::{self, HeaderKind, HeaderRecord};
use crate::recdir::{self, NOTIFICATION_PREFIX};
use crate::report::{MessageSink, Severity};
use crate::session::{SessionLock, TryLock};

use super::account;

/// Column width for the advisory body, matching the header fold width.
const WRAP_COLUMNS: usize = 60;

/// What a notification file describes.
#[derive(Debug, Clone, Copy)]
pub struct NotificationSpec<'a> {
    /// Document display name.
    pub doc_name: &'a str,
    /// Backing-store artifact the notification refers to.
    pub backing_path: &'a Path,
    /// Program name for the recovery hint.
    pub program: &'a str,
}

/// Create, lock, and write a notification artifact.
///
/// The returned lock is held in the common case. Failure to obtain it is
/// reported but not fatal; the session then runs without liveness
/// protection, which only risks a scanner offering the file for recovery
/// while the session still lives.
pub fn build_notification(
    dir: &Path,
    spec: &NotificationSpec<'_>,
    sink: &dyn MessageSink,
) -> RecoveryResult<(PathBuf, SessionLock)> {
    let uid = account::current_uid();
    let Some(user) = account::username_for_uid(uid) else {
        sink.report(
            Severity::Error,
            &format!("Information on user id {} not found", uid),
        );
        return Err(RecoveryError::ArtifactCreateFailed {
            dir: dir.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no passwd entry for uid {}", uid),
            ),
        });
    };

    let (path, file) = recdir::create_unique(dir, NOTIFICATION_PREFIX)?;

    // Hold the lock from as early as possible; the window between
    // creation and locking is the protocol's accepted race.
    let lock = match SessionLock::try_acquire(file) {
        TryLock::Locked(lock) => lock,
        TryLock::Held(file) | TryLock::Failed(file, _) => {
            sink.report(Severity::Error, "Unable to lock recovery file");
            SessionLock::unheld(file)
        }
    };

    if let Err(e) = write_contents(&lock, spec, &user) {
        sink.report(Severity::Error, &format!("Recovery file: {}", e));
        drop(lock);
        let _ = std::fs::remove_file(&path);
        return Err(RecoveryError::ArtifactCreateFailed {
            dir: dir.to_path_buf(),
            source: e,
        });
    }

    Ok((path, lock))
}

fn write_contents(
    lock: &SessionLock,
    spec: &NotificationSpec<'_>,
    user: &str,
) -> std::io::Result<()> {
    let mut out = String::new();
    out.push_str(&header::encode(&HeaderRecord {
        kind: HeaderKind::File,
        value: spec.doc_name.as_bytes().to_vec(),
    }));
    out.push_str(&header::encode(&HeaderRecord {
        kind: HeaderKind::Path,
        value: spec.backing_path.as_os_str().as_bytes().to_vec(),
    }));
    out.push('\n');
    out.push_str(&advisory_body(spec, user));

    let mut writer = lock.file();
    writer.write_all(out.as_bytes())?;
    writer.flush()?;
    lock.file().sync_all()
}

fn advisory_body(spec: &NotificationSpec<'_>, user: &str) -> String {
    let now = chrono::Local::now().format("%a %b %e %H:%M:%S %Y");
    let host = account::local_hostname();

    let text = format!(
        "On {}, the user {} was editing a file named {} on the \
         machine {}, when it was saved for recovery. You can recover \
         most, if not all, of the changes to this file using the -r \
         option to {}:\n\n\t{} -r {}\n",
        now, user, spec.doc_name, host, spec.program, spec.program, spec.doc_name
    );
    wrap_text(&text, WRAP_COLUMNS)
}

/// Greedy word wrap that preserves required newlines. Words longer than
/// the width are emitted unbroken.
fn wrap_text(text: &str, width: usize) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        if line.len() <= width {
            out.push_str(line);
            continue;
        }
        let mut column = 0usize;
        for word in line.split(' ') {
            if column == 0 {
                out.push_str(word);
                column = word.len();
            } else if column + 1 + word.len() <= width {
                out.push(' ');
                out.push_str(word);
                column += 1 + word.len();
            } else {
                out.push('\n');
                out.push_str(word);
                column = word.len();
            }
        }
    }
    out
}
