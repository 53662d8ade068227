//! # Recovery Session State Machine
//!
//! One `RecoverySession` per open document. The basic scheme:
//!
//! - when an edit session starts, recovery is *armed*: a backing-store
//!   artifact exists, mode 0700, and no notification file exists yet;
//! - on the first real modification the session is *activated*: the
//!   notification file is created and exclusively locked, the document
//!   is flushed to the backing store, and the backing store drops to
//!   mode 0600.
//!
//! The owner-execute bit therefore distinguishes a freshly-armed, still
//! empty backing file (which a cleanup pass may delete) from a live
//! recoverable snapshot. The held lock on the notification file is what
//! distinguishes a live session from an abandoned one.
//!
//! Arming is deliberately decoupled from activation so that merely
//! opening a document never pays for a full-document flush.
//!
//! All I/O here is synchronous. Callers that drive `sync` from a
//! periodic timer must serialize it against user-driven calls on the
//! same session, e.g. behind an `Arc<Mutex<RecoverySession>>`; `&mut
//! self` makes the flush a critical section within one thread of
//! control.

mod lock;

pub use lock::{SessionLock, TryLock};

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::config::RecoveryConfig;
use crate::errors::{RecoveryError, RecoveryResult};
use crate::notify::{self, MailTransport, NotificationSpec};
use crate::recdir::{self, BACKING_PREFIX};
use crate::report::{MessageSink, Severity};
use crate::scanner::ResumeHandle;

/// Backing store right after arming: the execute bit marks "no snapshot
/// yet".
const ARMED_MODE: u32 = 0o700;

/// Backing store once an initial snapshot exists.
const ACTIVE_MODE: u32 = 0o600;

/// Buffer-engine operations consumed by recovery. The engine owns
/// document content and its serialization; recovery only directs when
/// content must reach stable storage.
pub trait BufferEngine {
    /// Flush all document content to the backing store.
    fn flush_to_storage(&mut self) -> io::Result<()>;

    /// Force the entire document to be read (and thus paged into the
    /// backing store) before the initial flush.
    fn read_whole_document(&mut self) -> io::Result<()>;
}

/// Recovery state of one editing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Recovery never armed, or arming failed.
    Inactive,
    /// Artifacts exist; content is persisted.
    Armed,
    /// Content has changed since the last successful sync.
    Dirty,
    /// A sync failed; recovery is permanently off for this session.
    Failed,
    /// The session ended.
    Terminated,
}

/// Per-call requests for `sync`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncFlags {
    /// Keep both artifacts on disk when the session ends.
    pub preserve: bool,
    /// Mail the session's notification after a successful sync.
    pub notify: bool,
    /// Take an independent, permanent checkpoint of the backing store.
    pub snapshot: bool,
    /// Terminate this session after the other requests. Tearing down
    /// the wider document session remains the caller's job.
    pub end_session: bool,
}

/// Crash-recovery state for one open document.
pub struct RecoverySession {
    config: RecoveryConfig,
    doc_name: String,
    sink: Arc<dyn MessageSink>,
    transport: Arc<dyn MailTransport>,
    backing_path: Option<PathBuf>,
    notification_path: Option<PathBuf>,
    notification_lock: Option<SessionLock>,
    state: SessionState,
    preserve_on_exit: bool,
    activated: bool,
}

impl RecoverySession {
    /// A new, inactive session for a document about to be edited.
    pub fn new(
        config: RecoveryConfig,
        doc_name: impl Into<String>,
        sink: Arc<dyn MessageSink>,
        transport: Arc<dyn MailTransport>,
    ) -> Self {
        Self {
            config,
            doc_name: doc_name.into(),
            sink,
            transport,
            backing_path: None,
            notification_path: None,
            notification_lock: None,
            state: SessionState::Inactive,
            preserve_on_exit: false,
            activated: false,
        }
    }

    /// An armed session resumed from an abandoned one found by the
    /// scanner. The lock is the one acquired during the scan, so the
    /// resumed session's hold is continuous with the original; it is
    /// never reacquired.
    pub fn resume_from(
        config: RecoveryConfig,
        doc_name: impl Into<String>,
        sink: Arc<dyn MessageSink>,
        transport: Arc<dyn MailTransport>,
        handle: ResumeHandle,
    ) -> Self {
        Self {
            config,
            doc_name: doc_name.into(),
            sink,
            transport,
            backing_path: Some(handle.backing_path),
            notification_path: Some(handle.notification_path),
            notification_lock: Some(handle.lock),
            state: SessionState::Armed,
            preserve_on_exit: false,
            // The notification file already exists; first modification
            // only needs the permission transition and flush.
            activated: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn document(&self) -> &str {
        &self.doc_name
    }

    pub fn backing_path(&self) -> Option<&Path> {
        self.backing_path.as_deref()
    }

    pub fn notification_path(&self) -> Option<&Path> {
        self.notification_path.as_deref()
    }

    pub fn preserve_on_exit(&self) -> bool {
        self.preserve_on_exit
    }

    /// Whether this session's notification lock is actually held.
    pub fn is_lock_held(&self) -> bool {
        self.notification_lock
            .as_ref()
            .map(SessionLock::is_held)
            .unwrap_or(false)
    }

    /// Arm recovery: create the backing-store artifact.
    ///
    /// Failure is non-fatal to editing; the session simply stays
    /// inactive and the user is warned once.
    pub fn arm(&mut self) -> RecoveryResult<()> {
        if self.state != SessionState::Inactive {
            return Ok(());
        }
        match self.try_arm() {
            Ok(()) => {
                self.state = SessionState::Armed;
                info!(doc = %self.doc_name, "recovery armed");
                Ok(())
            }
            Err(e) => {
                self.sink.report(Severity::Error, &e.to_string());
                self.sink.report(
                    Severity::Error,
                    "Modifications not recoverable if the session fails",
                );
                Err(e)
            }
        }
    }

    fn try_arm(&mut self) -> RecoveryResult<()> {
        recdir::ensure_recovery_dir(&self.config.recover_dir)?;
        let (path, file) = recdir::create_unique(&self.config.recover_dir, BACKING_PREFIX)?;
        drop(file);
        fs::set_permissions(&path, fs::Permissions::from_mode(ARMED_MODE)).map_err(|e| {
            RecoveryError::ArtifactCreateFailed {
                dir: self.config.recover_dir.clone(),
                source: e,
            }
        })?;
        self.backing_path = Some(path);
        Ok(())
    }

    /// Record a content mutation. Cheap; no I/O.
    pub fn mark_dirty(&mut self) {
        if self.state == SessionState::Armed {
            self.state = SessionState::Dirty;
        }
    }

    /// First-modification hook: build and lock the notification file,
    /// force an initial snapshot into the backing store, and clear the
    /// owner-execute bit. Runs its body at most once per session.
    ///
    /// On failure recovery is turned off for this session; editing
    /// continues.
    pub fn activate(&mut self, engine: &mut dyn BufferEngine) -> RecoveryResult<()> {
        if self.activated
            || !matches!(self.state, SessionState::Armed | SessionState::Dirty)
        {
            return Ok(());
        }
        self.activated = true;

        match self.try_activate(engine) {
            Ok(()) => {
                info!(doc = %self.doc_name, "recovery activated");
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Failed;
                self.sink.report(
                    Severity::Error,
                    "Modifications not recoverable if the session fails",
                );
                Err(e)
            }
        }
    }

    fn try_activate(&mut self, engine: &mut dyn BufferEngine) -> RecoveryResult<()> {
        let Some(backing) = self.backing_path.clone() else {
            return Ok(());
        };

        // A resumed session already has its notification file and lock.
        if self.notification_path.is_none() {
            let spec = NotificationSpec {
                doc_name: &self.doc_name,
                backing_path: &backing,
                program: &self.config.program,
            };
            let (path, lock) =
                notify::build_notification(&self.config.recover_dir, &spec, &*self.sink)?;
            self.notification_path = Some(path);
            self.notification_lock = Some(lock);

            engine
                .read_whole_document()
                .and_then(|()| engine.flush_to_storage())
                .map_err(|e| {
                    self.sink.report(
                        Severity::Error,
                        &format!("Preservation failed: {}", backing.display()),
                    );
                    RecoveryError::SyncFailed {
                        path: backing.clone(),
                        source: e,
                    }
                })?;
        }

        // Execute bit off: this backing file now holds a real snapshot.
        let _ = fs::set_permissions(&backing, fs::Permissions::from_mode(ACTIVE_MODE));
        Ok(())
    }

    /// Sync the session, honoring the per-call requests in `flags`.
    ///
    /// No-op unless the session is armed or dirty. A failed flush
    /// permanently disables recovery for this session; later calls
    /// return `Ok` without touching the disk.
    pub fn sync(&mut self, engine: &mut dyn BufferEngine, flags: SyncFlags) -> RecoveryResult<()> {
        if !matches!(self.state, SessionState::Armed | SessionState::Dirty) {
            return Ok(());
        }

        if self.state == SessionState::Dirty {
            if let Err(e) = engine.flush_to_storage() {
                // Latch the failure: no retries, no further I/O.
                self.state = SessionState::Failed;
                self.preserve_on_exit = false;
                let backing = self
                    .backing_path
                    .clone()
                    .unwrap_or_else(|| self.config.recover_dir.clone());
                self.sink.report(
                    Severity::Error,
                    &format!("File backup failed: {}: {}", backing.display(), e),
                );
                return Err(RecoveryError::SyncFailed {
                    path: backing,
                    source: e,
                });
            }
            self.state = SessionState::Armed;

            if flags.preserve {
                self.preserve_on_exit = true;
            }
            if flags.notify {
                if let Some(path) = self.notification_path.clone() {
                    let _ = notify::dispatch(&path, &*self.transport, &*self.sink);
                }
            }
        }

        let mut result = Ok(());
        if flags.snapshot {
            result = self.snapshot(flags.notify);
        }

        if flags.end_session {
            self.terminate();
        }
        result
    }

    /// Take an independent, permanent checkpoint: copy the current
    /// backing store into a fresh artifact and prepare a new
    /// notification file referencing it. Neither the session's paths nor
    /// its lock change. The checkpoint's own notification file is left
    /// unlocked so it is recoverable even while this session lives.
    pub fn snapshot(&mut self, send_notification: bool) -> RecoveryResult<()> {
        if !matches!(self.state, SessionState::Armed | SessionState::Dirty) {
            return Ok(());
        }
        let Some(backing) = self.backing_path.clone() else {
            return Ok(());
        };

        let (snap_path, snap_file) =
            recdir::create_unique(&self.config.recover_dir, BACKING_PREFIX)?;

        let result = copy_into(&backing, &snap_file).and_then(|()| {
            let spec = NotificationSpec {
                doc_name: &self.doc_name,
                backing_path: &snap_path,
                program: &self.config.program,
            };
            let (note_path, lock) =
                notify::build_notification(&self.config.recover_dir, &spec, &*self.sink)
                    .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
            drop(lock.release());
            if send_notification {
                let _ = notify::dispatch(&note_path, &*self.transport, &*self.sink);
            }
            Ok(())
        });

        match result {
            Ok(()) => {
                info!(doc = %self.doc_name, snapshot = %snap_path.display(), "checkpoint written");
                Ok(())
            }
            Err(e) => {
                drop(snap_file);
                let _ = fs::remove_file(&snap_path);
                self.sink
                    .report(Severity::Error, &format!("{}: {}", snap_path.display(), e));
                Err(RecoveryError::SyncFailed {
                    path: snap_path,
                    source: e,
                })
            }
        }
    }

    /// End the session. Unless preservation was requested, both
    /// artifacts are deleted; either way the notification lock is
    /// released. Idempotent.
    pub fn terminate(&mut self) {
        if self.state == SessionState::Terminated {
            return;
        }

        if !self.preserve_on_exit {
            if let Some(path) = &self.backing_path {
                let _ = fs::remove_file(path);
            }
            if let Some(path) = &self.notification_path {
                let _ = fs::remove_file(path);
            }
        }
        if let Some(lock) = self.notification_lock.take() {
            drop(lock.release());
        }
        self.state = SessionState::Terminated;
        info!(doc = %self.doc_name, preserved = self.preserve_on_exit, "recovery session ended");
    }
}

/// Copy the backing store byte-for-byte into a new artifact, with fsync.
fn copy_into(src: &Path, dst: &File) -> io::Result<()> {
    let mut reader = File::open(src)?;
    let mut writer = dst;

    let mut buffer = [0u8; 8192];
    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buffer[..n])?;
    }
    dst.sync_all()
}
