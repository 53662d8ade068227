//! lifeline - crash recovery for interactive text editors
//!
//! Lets an editing session survive a process or machine crash without
//! losing flushed edits, and lets the user later resume from the most
//! recent surviving snapshot.
//!
//! Each session maintains two files in a shared recovery directory: a
//! backing store holding a crash-safe copy of document content, and a
//! notification file holding metadata plus the advisory mail to send if
//! the session is found abandoned. An exclusive advisory lock on the
//! notification file, held for the life of the session, is the sole
//! signal distinguishing a live session from an abandoned one.
//!
//! Every step degrades to "unrecoverable" rather than corrupting data:
//! arming failures leave editing untouched, a failed sync permanently
//! disables recovery for that one session, and malformed or orphaned
//! artifacts are skipped or swept during scans.

pub mod config;
pub mod errors;
pub mod header;
pub mod notify;
pub mod recdir;
pub mod report;
pub mod scanner;
pub mod session;
pub mod timer;

pub use config::RecoveryConfig;
pub use errors::{RecoveryError, RecoveryResult};
pub use notify::{MailEnvelope, MailTransport, MockMailTransport, SmtpMailTransport};
pub use report::{MemorySink, MessageSink, Severity, TracingSink};
pub use scanner::{Recoverable, ResumeHandle};
pub use session::{BufferEngine, RecoverySession, SessionLock, SessionState, SyncFlags};
pub use timer::SyncTimer;
