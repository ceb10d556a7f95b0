//! Atomic commit of a file's materialized text.
//!
//! The only module permitted to mutate persistent storage. Commits follow
//! the tempfile + fsync + rename pattern: a crash mid-write never leaves a
//! partially written file, and a file that changed on disk since its
//! snapshot was captured is skipped rather than overwritten.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use serde::Deserialize;
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

use crate::example::FileId;
use crate::snapshot::FileSnapshot;

/// Where accepted output lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Replace the source file in place, transactionally.
    #[default]
    Overwrite,
    /// Write a `<name>.new` sibling and leave the source file untouched.
    /// Skips the concurrent-modification check, since nothing is replaced.
    Copy,
}

#[derive(Error, Debug)]
pub enum CommitError {
    #[error("{file}: changed on disk since session start, refusing to overwrite")]
    ConcurrentModification { file: FileId },

    #[error("{file}: write failed: {source}")]
    WriteFailed {
        file: FileId,
        #[source]
        source: std::io::Error,
    },
}

/// A successful commit: where the bytes landed and how many.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub file: FileId,
    pub path: PathBuf,
    pub bytes_written: usize,
}

/// Commit `new_text` for the snapshot's file.
///
/// In [`WriteMode::Overwrite`], the on-disk state is first checked against
/// the snapshot's fingerprint; any external change aborts with
/// [`CommitError::ConcurrentModification`] and the file is left exactly as
/// the outside editor left it. The write itself goes to a temp file in the
/// same directory, is fsynced, takes over the original's permission bits,
/// and is renamed over the target. On any I/O failure the original is
/// untouched.
pub fn commit(
    snapshot: &FileSnapshot,
    new_text: &str,
    mode: WriteMode,
) -> Result<CommitOutcome, CommitError> {
    let source_path = snapshot.file().path();
    let target = match mode {
        WriteMode::Overwrite => {
            verify_unchanged(snapshot)?;
            source_path.to_path_buf()
        }
        WriteMode::Copy => copy_target(source_path),
    };

    atomic_write(snapshot, source_path, &target, new_text.as_bytes())?;

    tracing::debug!(
        file = %snapshot.file(),
        target = %target.display(),
        bytes = new_text.len(),
        "committed accepted output"
    );

    Ok(CommitOutcome {
        file: snapshot.file().clone(),
        path: target,
        bytes_written: new_text.len(),
    })
}

/// Compare the file's current on-disk identity against the snapshot.
///
/// Stat data first: unchanged mtime and size mean unchanged content without
/// re-reading. On any stat difference the content hash is the authority, so
/// a file that was touched but not altered still commits.
fn verify_unchanged(snapshot: &FileSnapshot) -> Result<(), CommitError> {
    let path = snapshot.file().path();
    let io_failed = |source| CommitError::WriteFailed {
        file: snapshot.file().clone(),
        source,
    };

    let metadata = fs::metadata(path).map_err(io_failed)?;
    let fingerprint = snapshot.fingerprint();
    if FileTime::from_last_modification_time(&metadata) == fingerprint.mtime
        && metadata.len() as usize == fingerprint.byte_len
    {
        return Ok(());
    }

    let bytes = fs::read(path).map_err(io_failed)?;
    if xxh3_64(&bytes) != fingerprint.content_hash {
        return Err(CommitError::ConcurrentModification {
            file: snapshot.file().clone(),
        });
    }
    Ok(())
}

fn atomic_write(
    snapshot: &FileSnapshot,
    source_path: &Path,
    target: &Path,
    content: &[u8],
) -> Result<(), CommitError> {
    let io_failed = |source| CommitError::WriteFailed {
        file: snapshot.file().clone(),
        source,
    };

    // Temp file in the target's directory so the rename stays on one
    // filesystem and is atomic.
    let parent = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(io_failed)?;
    temp.write_all(content).map_err(io_failed)?;
    temp.as_file().sync_all().map_err(io_failed)?;

    // Keep the original's permission bits rather than the tempfile's
    // restrictive defaults.
    if let Ok(metadata) = fs::metadata(source_path) {
        fs::set_permissions(temp.path(), metadata.permissions()).map_err(io_failed)?;
    }

    temp.persist(target).map_err(|e| io_failed(e.error))?;
    Ok(())
}

fn copy_target(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".new");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overwrite_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mod.py");
        fs::write(&path, "old\n").unwrap();

        let snapshot = FileSnapshot::capture(&path).unwrap();
        let outcome = commit(&snapshot, "new\n", WriteMode::Overwrite).unwrap();

        assert_eq!(outcome.path, path);
        assert_eq!(outcome.bytes_written, 4);
        assert_eq!(fs::read_to_string(&path).unwrap(), "new\n");
    }

    #[test]
    fn external_change_aborts_commit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mod.py");
        fs::write(&path, "old\n").unwrap();

        let snapshot = FileSnapshot::capture(&path).unwrap();

        // Outside editor changes the file mid-session. Bump mtime past the
        // filesystem's timestamp granularity so the stat fast path cannot
        // mask the change.
        fs::write(&path, "edited elsewhere\n").unwrap();
        let bumped = FileTime::from_unix_time(
            FileTime::from_last_modification_time(&fs::metadata(&path).unwrap()).unix_seconds()
                + 5,
            0,
        );
        filetime::set_file_mtime(&path, bumped).unwrap();

        let result = commit(&snapshot, "new\n", WriteMode::Overwrite);
        assert!(matches!(
            result,
            Err(CommitError::ConcurrentModification { .. })
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), "edited elsewhere\n");
    }

    #[test]
    fn touched_but_identical_file_still_commits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mod.py");
        fs::write(&path, "same\n").unwrap();

        let snapshot = FileSnapshot::capture(&path).unwrap();

        let bumped = FileTime::from_unix_time(
            snapshot.fingerprint().mtime.unix_seconds() + 5,
            0,
        );
        filetime::set_file_mtime(&path, bumped).unwrap();

        assert!(commit(&snapshot, "new\n", WriteMode::Overwrite).is_ok());
        assert_eq!(fs::read_to_string(&path).unwrap(), "new\n");
    }

    #[test]
    fn copy_mode_writes_sibling_and_keeps_original() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mod.py");
        fs::write(&path, "old\n").unwrap();

        let snapshot = FileSnapshot::capture(&path).unwrap();
        let outcome = commit(&snapshot, "new\n", WriteMode::Copy).unwrap();

        assert_eq!(outcome.path, dir.path().join("mod.py.new"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "old\n");
        assert_eq!(fs::read_to_string(&outcome.path).unwrap(), "new\n");
    }

    #[test]
    fn copy_mode_ignores_external_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mod.py");
        fs::write(&path, "old\n").unwrap();

        let snapshot = FileSnapshot::capture(&path).unwrap();
        fs::write(&path, "edited elsewhere\n").unwrap();

        assert!(commit(&snapshot, "new\n", WriteMode::Copy).is_ok());
        assert_eq!(fs::read_to_string(&path).unwrap(), "edited elsewhere\n");
    }

    #[cfg(unix)]
    #[test]
    fn permissions_survive_overwrite() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mod.py");
        fs::write(&path, "old\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();

        let snapshot = FileSnapshot::capture(&path).unwrap();
        commit(&snapshot, "new\n", WriteMode::Overwrite).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn missing_file_is_write_failed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mod.py");
        fs::write(&path, "old\n").unwrap();
        let snapshot = FileSnapshot::capture(&path).unwrap();
        fs::remove_file(&path).unwrap();

        let result = commit(&snapshot, "new\n", WriteMode::Overwrite);
        assert!(matches!(result, Err(CommitError::WriteFailed { .. })));
    }
}
