//! # Recovery Directory Management
//!
//! Owns the on-disk directory where all recovery artifacts live and
//! creates uniquely-named artifacts inside it.
//!
//! Two naming families share the directory:
//! - backing-store artifacts, prefixed `vi.`
//! - notification artifacts, prefixed `recover.`
//!
//! The scanner relies on these prefixes to tell the two apart. Artifact
//! names carry an unpredictable random suffix and are created with
//! `O_CREAT|O_EXCL` semantics, so there is never a separate
//! check-then-create step to race against.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::errors::{RecoveryError, RecoveryResult};

/// Name prefix for backing-store artifacts.
pub const BACKING_PREFIX: &str = "vi.";

/// Name prefix for notification artifacts.
pub const NOTIFICATION_PREFIX: &str = "recover.";

/// Owner rwx plus the sticky bit: only the owner may remove entries.
const DIR_MODE: u32 = 0o1700;

/// Artifacts start owner read/write; the session machine adjusts the
/// execute bit on backing stores itself.
const ARTIFACT_MODE: u32 = 0o600;

const SUFFIX_LEN: usize = 8;
const CREATE_ATTEMPTS: usize = 32;

/// Ensure the recovery directory exists with restrictive permissions.
///
/// Creates the directory on demand. Any failure other than "already
/// exists" is a definite `DirectoryUnavailable`; this never fails
/// silently.
pub fn ensure_recovery_dir(dir: &Path) -> RecoveryResult<()> {
    match fs::metadata(dir) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|e| RecoveryError::DirectoryUnavailable {
                path: dir.to_path_buf(),
                source: e,
            })?;
            fs::set_permissions(dir, fs::Permissions::from_mode(DIR_MODE)).map_err(|e| {
                RecoveryError::DirectoryUnavailable {
                    path: dir.to_path_buf(),
                    source: e,
                }
            })
        }
        Err(e) => Err(RecoveryError::DirectoryUnavailable {
            path: dir.to_path_buf(),
            source: e,
        }),
    }
}

/// Atomically create and open a new, uniquely-named artifact.
///
/// The name is `<prefix><random suffix>`; creation uses `create_new` so
/// an existing file (or a planted symlink) can never be opened. Returns
/// the path and the open read/write handle, mode `0600`.
pub fn create_unique(dir: &Path, prefix: &str) -> RecoveryResult<(PathBuf, File)> {
    for _ in 0..CREATE_ATTEMPTS {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SUFFIX_LEN)
            .map(char::from)
            .collect();
        let path = dir.join(format!("{}{}", prefix, suffix));

        match OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .mode(ARTIFACT_MODE)
            .open(&path)
        {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(RecoveryError::ArtifactCreateFailed {
                    dir: dir.to_path_buf(),
                    source: e,
                })
            }
        }
    }

    Err(RecoveryError::ArtifactCreateFailed {
        dir: dir.to_path_buf(),
        source: io::Error::new(
            io::ErrorKind::AlreadyExists,
            "no unused artifact name after repeated attempts",
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_recovery_dir_creates_with_sticky_owner_mode() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("recover");

        ensure_recovery_dir(&dir).unwrap();

        let mode = fs::metadata(&dir).unwrap().permissions().mode();
        assert_eq!(mode & 0o7777, 0o1700);

        // Second call is a no-op on an existing directory.
        ensure_recovery_dir(&dir).unwrap();
    }

    #[test]
    fn test_ensure_recovery_dir_reports_unusable_path() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        fs::write(&blocker, b"x").unwrap();

        // A path component that is a regular file cannot become a directory.
        let err = ensure_recovery_dir(&blocker.join("recover")).unwrap_err();
        assert!(matches!(err, RecoveryError::DirectoryUnavailable { .. }));
    }

    #[test]
    fn test_create_unique_names_and_mode() {
        let tmp = TempDir::new().unwrap();

        let (path_a, _file_a) = create_unique(tmp.path(), BACKING_PREFIX).unwrap();
        let (path_b, _file_b) = create_unique(tmp.path(), BACKING_PREFIX).unwrap();

        assert_ne!(path_a, path_b);
        let name = path_a.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("vi."));
        assert_eq!(name.len(), BACKING_PREFIX.len() + SUFFIX_LEN);

        let mode = fs::metadata(&path_a).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_create_unique_missing_directory_fails() {
        let tmp = TempDir::new().unwrap();
        let err = create_unique(&tmp.path().join("absent"), NOTIFICATION_PREFIX).unwrap_err();
        assert!(matches!(err, RecoveryError::ArtifactCreateFailed { .. }));
    }
}
