//! Accumulates pending edits per file and materializes them into new text.
//!
//! Edits are applied in descending span-start order. Because every span was
//! computed against the same pristine text, back-to-front application means
//! earlier replacements never invalidate still-pending offsets - this is the
//! invariant that makes multi-example-per-file rewriting correct without a
//! second locate pass.

use std::collections::{BTreeMap, HashSet};

use thiserror::Error;

use crate::edit::{EditError, PendingEdit};
use crate::example::{ExampleId, FileId};

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("duplicate edit recorded for example {example}")]
    DuplicateEdit { example: ExampleId },

    #[error("edit for example {example} overlaps the span recorded for example {existing}")]
    OverlappingSpans {
        example: ExampleId,
        existing: ExampleId,
    },

    #[error("no edits recorded for file {file}")]
    UnknownFile { file: FileId },

    #[error(transparent)]
    Edit(#[from] EditError),
}

/// The ordered set of pending edits for one file.
///
/// Grows monotonically during the session and is consumed exactly once, at
/// commit.
#[derive(Debug, Default)]
pub struct FileBatch {
    edits: Vec<PendingEdit>,
    seen: HashSet<ExampleId>,
}

impl FileBatch {
    fn record(&mut self, edit: PendingEdit) -> Result<(), BatchError> {
        if self.seen.contains(&edit.example) {
            return Err(BatchError::DuplicateEdit {
                example: edit.example,
            });
        }
        if let Some(existing) = self
            .edits
            .iter()
            .find(|recorded| recorded.span.overlaps(&edit.span))
        {
            return Err(BatchError::OverlappingSpans {
                example: edit.example,
                existing: existing.example.clone(),
            });
        }
        self.seen.insert(edit.example.clone());
        self.edits.push(edit);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn edits(&self) -> &[PendingEdit] {
        &self.edits
    }

    /// Splice every edit into `pristine` and return the reconstructed file
    /// body. Pure; does not touch disk.
    pub fn materialize(&self, pristine: &str) -> Result<String, BatchError> {
        for edit in &self.edits {
            edit.validate(pristine)?;
        }

        let mut order: Vec<&PendingEdit> = self.edits.iter().collect();
        order.sort_by(|a, b| {
            b.span
                .start
                .cmp(&a.span.start)
                .then_with(|| b.seq.cmp(&a.seq))
        });

        let mut text = pristine.to_string();
        for edit in order {
            text.replace_range(edit.span.start..edit.span.end, &edit.new_text);
        }
        Ok(text)
    }
}

/// Per-session store of file batches.
#[derive(Debug, Default)]
pub struct EditBatchManager {
    batches: BTreeMap<FileId, FileBatch>,
}

impl EditBatchManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an edit to its file's batch. Rejects a second edit for the
    /// same example identity and any span overlapping one already recorded.
    pub fn record(&mut self, edit: PendingEdit) -> Result<(), BatchError> {
        let file = edit.example.file().clone();
        self.batches.entry(file).or_default().record(edit)
    }

    /// Apply all of a file's edits against its pristine text.
    pub fn materialize(&self, file: &FileId, pristine: &str) -> Result<String, BatchError> {
        let batch = self
            .batches
            .get(file)
            .ok_or_else(|| BatchError::UnknownFile { file: file.clone() })?;
        batch.materialize(pristine)
    }

    /// Remove and return a file's batch for commit. Each batch is consumed
    /// exactly once.
    pub fn take(&mut self, file: &FileId) -> Option<FileBatch> {
        self.batches.remove(file)
    }

    pub fn batch(&self, file: &FileId) -> Option<&FileBatch> {
        self.batches.get(file)
    }

    /// Files with at least one pending edit, in path order.
    pub fn files(&self) -> Vec<FileId> {
        self.batches
            .iter()
            .filter(|(_, batch)| !batch.is_empty())
            .map(|(file, _)| file.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.values().all(FileBatch::is_empty)
    }

    pub fn total_edits(&self) -> usize {
        self.batches.values().map(FileBatch::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::ByteSpan;

    fn id(ordinal: usize) -> ExampleId {
        ExampleId::new(FileId::new("f.py"), ordinal * 10, ordinal)
    }

    fn edit(ordinal: usize, span: ByteSpan, text: &str, seq: u64) -> PendingEdit {
        PendingEdit::new(id(ordinal), span, text, seq)
    }

    #[test]
    fn duplicate_example_is_rejected() {
        let mut manager = EditBatchManager::new();
        manager
            .record(edit(0, ByteSpan::new(0, 1), "a", 0))
            .unwrap();
        let result = manager.record(edit(0, ByteSpan::new(5, 6), "b", 1));
        assert!(matches!(result, Err(BatchError::DuplicateEdit { .. })));
    }

    #[test]
    fn overlapping_spans_are_rejected() {
        let mut manager = EditBatchManager::new();
        manager
            .record(edit(0, ByteSpan::new(0, 5), "a", 0))
            .unwrap();
        let result = manager.record(edit(1, ByteSpan::new(4, 8), "b", 1));
        assert!(matches!(result, Err(BatchError::OverlappingSpans { .. })));
    }

    #[test]
    fn materialize_applies_back_to_front() {
        let pristine = "line1\nline2\nline3\n";
        let mut manager = EditBatchManager::new();
        manager
            .record(edit(0, ByteSpan::new(0, 5), "LINE1", 0))
            .unwrap();
        manager
            .record(edit(1, ByteSpan::new(6, 11), "LINE2!", 1))
            .unwrap();
        manager
            .record(edit(2, ByteSpan::new(12, 17), "L3", 2))
            .unwrap();

        let file = FileId::new("f.py");
        let text = manager.materialize(&file, pristine).unwrap();
        assert_eq!(text, "LINE1\nLINE2!\nL3\n");
    }

    #[test]
    fn record_order_does_not_change_result() {
        let pristine = "aa bb cc";
        let make = |manager: &mut EditBatchManager, seqs: [(usize, usize, usize, &str); 3]| {
            for (ordinal, start, end, text) in seqs {
                manager
                    .record(edit(
                        ordinal,
                        ByteSpan::new(start, end),
                        text,
                        ordinal as u64,
                    ))
                    .unwrap();
            }
        };

        let file = FileId::new("f.py");
        let mut forward = EditBatchManager::new();
        make(&mut forward, [(0, 0, 2, "AA"), (1, 3, 5, "BB"), (2, 6, 8, "CC")]);
        let mut backward = EditBatchManager::new();
        make(&mut backward, [(2, 6, 8, "CC"), (1, 3, 5, "BB"), (0, 0, 2, "AA")]);

        assert_eq!(
            forward.materialize(&file, pristine).unwrap(),
            backward.materialize(&file, pristine).unwrap()
        );
    }

    #[test]
    fn insertion_at_point() {
        let pristine = "before\nafter\n";
        let mut manager = EditBatchManager::new();
        manager
            .record(edit(0, ByteSpan::new(7, 7), "middle\n", 0))
            .unwrap();
        let text = manager
            .materialize(&FileId::new("f.py"), pristine)
            .unwrap();
        assert_eq!(text, "before\nmiddle\nafter\n");
    }

    #[test]
    fn replacement_with_empty_text_removes_span() {
        let pristine = "keep\ndrop\nkeep\n";
        let mut manager = EditBatchManager::new();
        manager
            .record(edit(0, ByteSpan::new(5, 10), "", 0))
            .unwrap();
        let text = manager
            .materialize(&FileId::new("f.py"), pristine)
            .unwrap();
        assert_eq!(text, "keep\nkeep\n");
    }

    #[test]
    fn span_past_end_of_text_fails() {
        let mut manager = EditBatchManager::new();
        manager
            .record(edit(0, ByteSpan::new(10, 20), "x", 0))
            .unwrap();
        let result = manager.materialize(&FileId::new("f.py"), "short");
        assert!(matches!(result, Err(BatchError::Edit(_))));
    }

    #[test]
    fn unknown_file_fails() {
        let manager = EditBatchManager::new();
        let result = manager.materialize(&FileId::new("nope.py"), "text");
        assert!(matches!(result, Err(BatchError::UnknownFile { .. })));
    }

    #[test]
    fn take_consumes_the_batch() {
        let mut manager = EditBatchManager::new();
        manager
            .record(edit(0, ByteSpan::new(0, 1), "a", 0))
            .unwrap();
        let file = FileId::new("f.py");
        assert!(manager.take(&file).is_some());
        assert!(manager.take(&file).is_none());
    }
}
