//! # User Message Reporting
//!
//! The editor's message line is an external collaborator; this module
//! defines the narrow seam the recovery code reports through. Production
//! code routes messages to the `tracing` subscriber, tests capture them
//! in memory.

use std::sync::RwLock;

/// Message severity, mirroring the editor's message classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Advisory message ("No files to recover").
    Info,
    /// Something went wrong; editing continues.
    Error,
}

/// Sink for user-facing recovery messages.
pub trait MessageSink: Send + Sync {
    /// Report a message to the user.
    fn report(&self, severity: Severity, message: &str);
}

/// Production sink: forwards messages to the `tracing` subscriber.
#[derive(Debug, Default)]
pub struct TracingSink;

impl MessageSink for TracingSink {
    fn report(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info => tracing::info!(target: "lifeline", "{}", message),
            Severity::Error => tracing::error!(target: "lifeline", "{}", message),
        }
    }
}

/// In-memory sink for testing.
#[derive(Debug, Default)]
pub struct MemorySink {
    /// Captured messages (for testing)
    pub messages: RwLock<Vec<(Severity, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of captured messages
    pub fn count(&self) -> usize {
        self.messages.read().unwrap().len()
    }

    /// True if any captured message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.messages
            .read()
            .unwrap()
            .iter()
            .any(|(_, m)| m.contains(needle))
    }

    /// Clear captured messages
    pub fn clear(&self) {
        self.messages.write().unwrap().clear();
    }
}

impl MessageSink for MemorySink {
    fn report(&self, severity: Severity, message: &str) {
        self.messages
            .write()
            .unwrap()
            .push((severity, message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_captures_messages() {
        let sink = MemorySink::new();
        sink.report(Severity::Error, "File backup failed: /x/y");
        sink.report(Severity::Info, "No files to recover");

        assert_eq!(sink.count(), 2);
        assert!(sink.contains("backup failed"));
        assert!(!sink.contains("orphan"));

        sink.clear();
        assert_eq!(sink.count(), 0);
    }
}
