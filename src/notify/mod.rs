//! # Notification Dispatch
//!
//! Turns a prepared notification file into an outbound mail message.
//! The recipient is the artifact's on-disk owner; the sender is root at
//! the local host. Transmission failures are reported as a single "not
//! sending email" condition and never affect on-disk recovery state.

mod account;
mod message;
mod transport;

pub use message::{build_notification, NotificationSpec};
pub use transport::{MailEnvelope, MailTransport, MockMailTransport, SmtpMailTransport};

use std::fs::File;
use std::io::BufReader;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use crate::errors::{RecoveryError, RecoveryResult};
use crate::header;
use crate::report::{MessageSink, Severity};

/// Prepare and submit the mail for a notification artifact.
///
/// Failures are reported through the sink as well as returned, so most
/// callers can ignore the result; recovery data on disk stays valid
/// either way.
pub fn dispatch(
    path: &Path,
    transport: &dyn MailTransport,
    sink: &dyn MessageSink,
) -> RecoveryResult<()> {
    let result = prepare(path).and_then(|(envelope, body)| transport.send(&envelope, &body));
    if let Err(e) = &result {
        sink.report(Severity::Error, &e.to_string());
    }
    result
}

fn prepare(path: &Path) -> RecoveryResult<(MailEnvelope, String)> {
    let send_err =
        |reason: String| RecoveryError::NotificationSendFailed(reason);

    let file = File::open(path)
        .map_err(|e| send_err(format!("{}: {}", path.display(), e)))?;
    let uid = file
        .metadata()
        .map_err(|e| send_err(format!("{}: {}", path.display(), e)))?
        .uid();

    // The metadata records are not mail headers; decode them for the
    // subject line and hand the rest of the file over as the body.
    let (prelude, body) = header::read_notification(BufReader::new(&file))
        .map_err(|e| send_err(format!("{}: {}", path.display(), e)))?;

    let user = account::username_for_uid(uid)
        .ok_or_else(|| send_err(format!("information on user id {} not found", uid)))?;
    let host = account::local_hostname();

    let name = prelude.display_name();
    let basename = name.rsplit('/').next().unwrap_or(&name);
    let envelope = MailEnvelope {
        from: format!("root@{}", host),
        to: format!("{}@{}", user, host),
        subject: format!("Saved the file {}", basename),
    };

    let body = String::from_utf8_lossy(&body)
        .trim_start_matches('\n')
        .to_string();
    Ok((envelope, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::MemorySink;
    use tempfile::TempDir;

    #[test]
    fn test_dispatch_addresses_owner_and_sends_body() {
        let tmp = TempDir::new().unwrap();
        let sink = MemorySink::new();
        let backing = tmp.path().join("vi.snap");
        std::fs::write(&backing, b"content").unwrap();

        let spec = NotificationSpec {
            doc_name: "work/report.txt",
            backing_path: &backing,
            program: "vi",
        };
        let (path, _lock) = build_notification(tmp.path(), &spec, &sink).unwrap();

        let transport = MockMailTransport::new();
        dispatch(&path, &transport, &sink).unwrap();

        assert_eq!(transport.sent_count(), 1);
        let sent = transport.sent.read().unwrap();
        let (envelope, body) = &sent[0];

        let user = account::username_for_uid(account::current_uid()).unwrap();
        assert!(envelope.to.starts_with(&format!("{}@", user)));
        assert!(envelope.from.starts_with("root@"));
        assert_eq!(envelope.subject, "Saved the file report.txt");
        assert!(body.contains("saved for recovery"));
        assert!(!body.contains("X-vi-data"));
    }

    #[test]
    fn test_dispatch_missing_file_reports_not_sent() {
        let tmp = TempDir::new().unwrap();
        let sink = MemorySink::new();
        let transport = MockMailTransport::new();

        let err = dispatch(&tmp.path().join("recover.gone"), &transport, &sink).unwrap_err();
        assert!(matches!(err, RecoveryError::NotificationSendFailed(_)));
        assert!(sink.contains("not sending email"));
        assert_eq!(transport.sent_count(), 0);
    }
}
