//! # Recovery Configuration
//!
//! Option loading is the surrounding editor's concern; recovery consumes
//! an already-resolved directory path plus the program name used in
//! advisory messages.

use std::path::PathBuf;

/// Resolved recovery settings
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Directory holding all recovery artifacts
    pub recover_dir: PathBuf,

    /// Editor program name, used in the "-r" hint of advisory messages
    pub program: String,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            recover_dir: PathBuf::from("/var/tmp/lifeline.recover"),
            program: "vi".to_string(),
        }
    }
}
