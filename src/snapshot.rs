//! Pristine file state captured at session start.
//!
//! Every locate and materialize step runs against a [`FileSnapshot`], and the
//! writer refuses to commit over a file whose on-disk state no longer matches
//! the snapshot's fingerprint.

use std::fs;
use std::path::Path;

use filetime::FileTime;
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

use crate::example::FileId;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("failed to read {file}: {source}")]
    Io {
        file: FileId,
        #[source]
        source: std::io::Error,
    },

    #[error("{file} is not valid UTF-8")]
    NonUtf8 { file: FileId },
}

/// Identity fingerprint of a file's on-disk state: content hash plus the
/// stat data (mtime, size) that lets the writer skip re-hashing unchanged
/// files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    pub content_hash: u64,
    pub mtime: FileTime,
    pub byte_len: usize,
}

impl Fingerprint {
    pub fn of_bytes(bytes: &[u8], mtime: FileTime) -> Self {
        Self {
            content_hash: xxh3_64(bytes),
            mtime,
            byte_len: bytes.len(),
        }
    }
}

/// Line-terminator flavor of a file, preserved through rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Newline {
    #[default]
    Lf,
    CrLf,
}

impl Newline {
    pub fn as_str(self) -> &'static str {
        match self {
            Newline::Lf => "\n",
            Newline::CrLf => "\r\n",
        }
    }

    pub fn detect(text: &str) -> Self {
        if text.contains("\r\n") {
            Newline::CrLf
        } else {
            Newline::Lf
        }
    }
}

/// A file's pristine text as read at session start, before any edits.
#[derive(Debug, Clone)]
pub struct FileSnapshot {
    file: FileId,
    text: String,
    fingerprint: Fingerprint,
    newline: Newline,
}

impl FileSnapshot {
    /// Read and fingerprint a file from disk.
    pub fn capture(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let path = path.as_ref();
        let file = FileId::new(path);
        let bytes = fs::read(path).map_err(|source| SnapshotError::Io {
            file: file.clone(),
            source,
        })?;
        let metadata = fs::metadata(path).map_err(|source| SnapshotError::Io {
            file: file.clone(),
            source,
        })?;
        let mtime = FileTime::from_last_modification_time(&metadata);
        let fingerprint = Fingerprint::of_bytes(&bytes, mtime);
        let text = String::from_utf8(bytes).map_err(|_| SnapshotError::NonUtf8 {
            file: file.clone(),
        })?;
        let newline = Newline::detect(&text);
        Ok(Self {
            file,
            text,
            fingerprint,
            newline,
        })
    }

    /// Build a snapshot from in-memory text. The fingerprint hashes the text
    /// and carries a zero mtime; useful for copy-mode sessions and tests,
    /// where no on-disk identity check happens.
    pub fn from_text(file: impl Into<FileId>, text: impl Into<String>) -> Self {
        let text = text.into();
        let fingerprint = Fingerprint::of_bytes(text.as_bytes(), FileTime::zero());
        let newline = Newline::detect(&text);
        Self {
            file: file.into(),
            text,
            fingerprint,
            newline,
        }
    }

    pub fn file(&self) -> &FileId {
        &self.file
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn newline(&self) -> Newline {
        self.newline
    }
}
