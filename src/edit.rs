//! The fundamental edit primitive: byte-span replacement against pristine text.
//!
//! Every accepted output change compiles down to a single [`PendingEdit`].
//! Intelligence lives in span acquisition (the locator) and in batching (the
//! batch manager), not in application.

use thiserror::Error;

use crate::example::ExampleId;

/// Half-open byte range `[start, end)` measured against a file's pristine
/// text. A zero-width span is a pure insertion point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ByteSpan {
    /// Starting byte offset (inclusive)
    pub start: usize,
    /// Ending byte offset (exclusive)
    pub end: usize,
}

impl ByteSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Whether two spans share any byte. Zero-width spans never overlap.
    pub fn overlaps(&self, other: &ByteSpan) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("invalid byte span [{start}, {end}) in text of length {text_len}")]
    InvalidSpan {
        start: usize,
        end: usize,
        text_len: usize,
    },

    #[error("byte span [{start}, {end}) does not fall on character boundaries")]
    NotCharBoundary { start: usize, end: usize },
}

/// A single span replacement derived from one mismatching example.
///
/// Invariant: `span` and `new_text` are computed strictly against the
/// pristine snapshot captured at session start, never against an edited
/// in-memory version, so edits to the same file compose in any order.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a PendingEdit does nothing until its batch is materialized"]
pub struct PendingEdit {
    /// The example this edit belongs to, for deduplication.
    pub example: ExampleId,
    /// Span to replace, against pristine text.
    pub span: ByteSpan,
    /// Replacement text: the actual output re-rendered as an expected block.
    pub new_text: String,
    /// Arrival ordinal, used only for tie-breaking.
    pub seq: u64,
}

impl PendingEdit {
    pub fn new(example: ExampleId, span: ByteSpan, new_text: impl Into<String>, seq: u64) -> Self {
        Self {
            example,
            span,
            new_text: new_text.into(),
            seq,
        }
    }

    /// Validate this edit's span against the pristine text it will splice into.
    pub fn validate(&self, pristine: &str) -> Result<(), EditError> {
        let ByteSpan { start, end } = self.span;
        if start > end || end > pristine.len() {
            return Err(EditError::InvalidSpan {
                start,
                end,
                text_len: pristine.len(),
            });
        }
        if !pristine.is_char_boundary(start) || !pristine.is_char_boundary(end) {
            return Err(EditError::NotCharBoundary { start, end });
        }
        Ok(())
    }
}
