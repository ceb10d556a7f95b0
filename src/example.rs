//! Data model for discovered doctest examples and their execution results.
//!
//! Everything here crosses the collaborator boundary: the host runner's
//! parser produces [`Example`]s at collection time, and its executor delivers
//! one [`ActualOutput`] per example. Both are plain data - the engine never
//! introspects runner objects.

use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::compare::CompareOptions;

/// Identity of a source file under synchronization.
///
/// Wraps the path the host parser reported the file under. All session
/// bookkeeping (snapshots, batches, reports) keys on this.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(transparent)]
pub struct FileId(PathBuf);

impl FileId {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl From<&Path> for FileId {
    fn from(path: &Path) -> Self {
        Self::new(path)
    }
}

impl From<PathBuf> for FileId {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

impl From<&PathBuf> for FileId {
    fn from(path: &PathBuf) -> Self {
        Self::new(path)
    }
}

impl From<&str> for FileId {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

/// Stable identity of one example: owning file, block start line, ordinal.
///
/// Used to deduplicate result delivery and to key pending edits. Two
/// collection passes over an unchanged file produce equal ids.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExampleId {
    file: FileId,
    start_line: usize,
    ordinal: usize,
}

impl ExampleId {
    pub fn new(file: FileId, start_line: usize, ordinal: usize) -> Self {
        Self {
            file,
            start_line,
            ordinal,
        }
    }

    pub fn file(&self) -> &FileId {
        &self.file
    }

    /// 0-based line at which the expected-output block starts.
    pub fn start_line(&self) -> usize {
        self.start_line
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }
}

impl fmt::Display for ExampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 1-based line for humans, matching how runners report locations.
        write!(f, "{}:{}#{}", self.file, self.start_line + 1, self.ordinal)
    }
}

/// One discovered documentation-test example.
///
/// `block_lines` is the 0-based, end-exclusive line range of the
/// *expected-output block only* - not the executed snippet. An example whose
/// last recorded run produced no output has an empty range positioned where
/// output would be inserted.
///
/// Read-only after collection; discarded at session end.
#[derive(Debug, Clone)]
pub struct Example {
    file: FileId,
    ordinal: usize,
    block_lines: Range<usize>,
    expected: String,
    options: CompareOptions,
}

impl Example {
    pub fn new(
        file: impl Into<FileId>,
        ordinal: usize,
        block_lines: Range<usize>,
        expected: impl Into<String>,
        options: CompareOptions,
    ) -> Self {
        Self {
            file: file.into(),
            ordinal,
            block_lines,
            expected: expected.into(),
            options,
        }
    }

    pub fn id(&self) -> ExampleId {
        ExampleId::new(self.file.clone(), self.block_lines.start, self.ordinal)
    }

    pub fn file(&self) -> &FileId {
        &self.file
    }

    pub fn block_lines(&self) -> Range<usize> {
        self.block_lines.clone()
    }

    /// The expected output exactly as currently written (no indentation).
    pub fn expected(&self) -> &str {
        &self.expected
    }

    pub fn options(&self) -> CompareOptions {
        self.options
    }
}

/// Captured outcome of executing one example.
///
/// An explicit tagged variant handed across the runner boundary, replacing
/// any duck-typed inspection of runner internals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActualOutput {
    /// Captured stdout of the example.
    Text(String),
    /// The example raised an error: category name plus human-readable detail.
    Error { kind: String, detail: String },
}

impl ActualOutput {
    pub fn text(s: impl Into<String>) -> Self {
        ActualOutput::Text(s.into())
    }

    pub fn error(kind: impl Into<String>, detail: impl Into<String>) -> Self {
        ActualOutput::Error {
            kind: kind.into(),
            detail: detail.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ActualOutput::Error { .. })
    }
}

/// One example's result as recorded by the session.
///
/// `seq` is the arrival ordinal stamped at recording time; it establishes a
/// total order for tie-breaking between edits. Immutable once recorded.
#[derive(Debug, Clone)]
pub struct ActualResult {
    pub example: ExampleId,
    pub output: ActualOutput,
    pub seq: u64,
}
