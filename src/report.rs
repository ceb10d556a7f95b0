//! Session diagnostics: what was applied, what was skipped, and why.
//!
//! The engine never surfaces output to a terminal itself; the host runner's
//! reporting layer consumes a [`SessionReport`], which is serializable for
//! that purpose. Every degraded path (locate failure, duplicate delivery,
//! concurrent modification, write failure) lands here instead of aborting
//! the session.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use similar::TextDiff;

use crate::example::{ExampleId, FileId};

/// One per-example problem, rendered for the external reporting layer.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Diagnostic {
    /// `file:line#ordinal` of the example concerned.
    pub example: String,
    pub message: String,
}

impl Diagnostic {
    fn new(example: &ExampleId, message: impl Into<String>) -> Self {
        Self {
            example: example.to_string(),
            message: message.into(),
        }
    }
}

/// Everything that happened to one file during the session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FileReport {
    /// Examples whose output already matched.
    pub matched: usize,
    /// Edits spliced into the committed file.
    pub applied_edits: usize,
    /// Where the new content was written (differs from the source path in
    /// copy mode). `None` when nothing was written.
    pub written_to: Option<PathBuf>,
    pub locate_failures: Vec<Diagnostic>,
    pub duplicate_results: Vec<Diagnostic>,
    pub write_failure: Option<String>,
    pub concurrent_modification: bool,
}

impl FileReport {
    pub fn was_written(&self) -> bool {
        self.written_to.is_some()
    }

    pub fn failure_count(&self) -> usize {
        self.locate_failures.len()
            + self.duplicate_results.len()
            + usize::from(self.write_failure.is_some())
            + usize::from(self.concurrent_modification)
    }
}

/// Accumulated per-file diagnostics for a whole session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionReport {
    files: BTreeMap<FileId, FileReport>,
}

impl SessionReport {
    pub fn new() -> Self {
        Self::default()
    }

    fn file_mut(&mut self, file: &FileId) -> &mut FileReport {
        self.files.entry(file.clone()).or_default()
    }

    pub fn file(&self, file: &FileId) -> Option<&FileReport> {
        self.files.get(file)
    }

    pub fn files(&self) -> impl Iterator<Item = (&FileId, &FileReport)> {
        self.files.iter()
    }

    pub(crate) fn record_match(&mut self, file: &FileId) {
        self.file_mut(file).matched += 1;
    }

    pub(crate) fn record_locate_failure(
        &mut self,
        example: &ExampleId,
        message: impl Into<String>,
    ) {
        self.file_mut(example.file())
            .locate_failures
            .push(Diagnostic::new(example, message));
    }

    pub(crate) fn record_duplicate(&mut self, example: &ExampleId, message: impl Into<String>) {
        self.file_mut(example.file())
            .duplicate_results
            .push(Diagnostic::new(example, message));
    }

    pub(crate) fn record_applied(&mut self, file: &FileId, edits: usize, written_to: PathBuf) {
        let report = self.file_mut(file);
        report.applied_edits += edits;
        report.written_to = Some(written_to);
    }

    pub(crate) fn record_write_failure(&mut self, file: &FileId, message: impl Into<String>) {
        self.file_mut(file).write_failure = Some(message.into());
    }

    pub(crate) fn record_concurrent_modification(&mut self, file: &FileId) {
        self.file_mut(file).concurrent_modification = true;
    }

    /// Total edits spliced into committed files across the session.
    pub fn total_applied(&self) -> usize {
        self.files.values().map(|f| f.applied_edits).sum()
    }

    pub fn total_failures(&self) -> usize {
        self.files.values().map(FileReport::failure_count).sum()
    }

    /// True when every file either matched or was rewritten cleanly.
    pub fn is_clean(&self) -> bool {
        self.total_failures() == 0
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Render a unified diff of a file's rewrite, for human-facing reporting.
pub fn unified_diff(original: &str, edited: &str) -> String {
    TextDiff::from_lines(original, edited)
        .unified_diff()
        .context_radius(3)
        .header("recorded", "actual")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_id() -> ExampleId {
        ExampleId::new(FileId::new("pkg/mod.py"), 9, 0)
    }

    #[test]
    fn failures_are_counted_per_file() {
        let mut report = SessionReport::new();
        let id = example_id();
        report.record_locate_failure(&id, "block moved");
        report.record_duplicate(&id, "delivered twice");
        report.record_concurrent_modification(id.file());

        let file_report = report.file(id.file()).unwrap();
        assert_eq!(file_report.failure_count(), 3);
        assert!(!report.is_clean());
    }

    #[test]
    fn applied_edits_accumulate() {
        let mut report = SessionReport::new();
        let file = FileId::new("a.py");
        report.record_applied(&file, 2, PathBuf::from("a.py"));
        report.record_match(&file);
        assert_eq!(report.total_applied(), 2);
        assert!(report.is_clean());
        assert!(report.file(&file).unwrap().was_written());
    }

    #[test]
    fn report_serializes_to_json() {
        let mut report = SessionReport::new();
        report.record_locate_failure(&example_id(), "gone");
        let json = report.to_json().unwrap();
        assert!(json.contains("pkg/mod.py"));
        assert!(json.contains("gone"));
    }

    #[test]
    fn unified_diff_shows_changed_lines() {
        let diff = unified_diff("a\n3\nb\n", "a\n4\nb\n");
        assert!(diff.contains("-3"));
        assert!(diff.contains("+4"));
    }
}
