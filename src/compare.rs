//! Expected-vs-actual output comparison.
//!
//! Pure functions: a [`Verdict`] is computed from the expected text, the
//! captured [`ActualOutput`], and the per-example [`CompareOptions`]. Each
//! option is honored independently and they compose - whitespace
//! normalization runs before ellipsis matching so both can be active at once.

use serde::{Deserialize, Serialize};

use crate::example::ActualOutput;

/// Marker in expected text that matches any substring of actual output.
pub const ELLIPSIS_MARKER: &str = "...";

/// Sentinel written in expected blocks where the output has an empty line.
/// A truly blank line would terminate the block in the host parser.
pub const BLANKLINE_SENTINEL: &str = "<BLANKLINE>";

/// Header line of a rendered error block.
pub const ERROR_HEADER: &str = "Traceback (most recent call last):";

/// Per-example comparison rules. Each flag is independently on/off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompareOptions {
    /// Runs of whitespace compare equal regardless of exact characters.
    pub normalize_whitespace: bool,
    /// `...` in expected matches any substring of actual, segments in order.
    pub ellipsis: bool,
    /// For error results, only the error category must match; detail ignored.
    pub relaxed_errors: bool,
}

impl CompareOptions {
    pub fn all() -> Self {
        Self {
            normalize_whitespace: true,
            ellipsis: true,
            relaxed_errors: true,
        }
    }
}

/// Outcome of comparing one example's expected text against its actual output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Match,
    /// Carries the actual output rendered as plain text, ready to become the
    /// replacement expected block.
    Mismatch { actual: String },
}

impl Verdict {
    pub fn is_match(&self) -> bool {
        matches!(self, Verdict::Match)
    }
}

/// Compare an example's recorded expected text against its actual output.
///
/// Returns [`Verdict::Match`] only if every applicable rule is satisfied.
pub fn compare(expected: &str, actual: &ActualOutput, options: CompareOptions) -> Verdict {
    match actual {
        ActualOutput::Text(text) => {
            if text_matches(expected, text, options) {
                Verdict::Match
            } else {
                Verdict::Mismatch {
                    actual: text.clone(),
                }
            }
        }
        ActualOutput::Error { kind, detail } => {
            let rendered = render_error(kind, detail);
            let matched = if options.relaxed_errors {
                expected_error_kind(expected).is_some_and(|expected_kind| expected_kind == kind.as_str())
            } else {
                text_matches(expected, &rendered, options)
            };
            if matched {
                Verdict::Match
            } else {
                Verdict::Mismatch { actual: rendered }
            }
        }
    }
}

/// Render an error result in the block format the host runner writes:
/// a traceback header followed by the `Kind: detail` line.
pub fn render_error(kind: &str, detail: &str) -> String {
    if detail.is_empty() {
        format!("{ERROR_HEADER}\n{kind}")
    } else {
        format!("{ERROR_HEADER}\n{kind}: {detail}")
    }
}

/// Extract the error category from an expected error block.
///
/// The category is the leading identifier of the last nonblank line
/// (`ValueError: boom` -> `ValueError`). Returns `None` when the block does
/// not look like an error block at all.
fn expected_error_kind(expected: &str) -> Option<&str> {
    if !expected.lines().next().is_some_and(|first| {
        first == ERROR_HEADER || first.starts_with("Traceback")
    }) {
        return None;
    }
    let last = expected.lines().rev().find(|line| !line.trim().is_empty())?;
    let last = last.trim();
    let kind = match last.split_once(':') {
        Some((kind, _)) => kind,
        None => last,
    };
    let kind = kind.trim();
    (!kind.is_empty()).then_some(kind)
}

fn text_matches(expected: &str, actual: &str, options: CompareOptions) -> bool {
    let expected = strip_sentinels(expected);
    let expected = expected.trim_end_matches(['\r', '\n']);
    let actual = actual.trim_end_matches(['\r', '\n']);

    let (expected, actual) = if options.normalize_whitespace {
        (normalize_whitespace(expected), normalize_whitespace(actual))
    } else {
        (expected.to_string(), actual.to_string())
    };

    if options.ellipsis {
        ellipsis_match(&expected, &actual)
    } else {
        expected == actual
    }
}

/// Replace `<BLANKLINE>` sentinel lines with the empty lines they stand for.
fn strip_sentinels(expected: &str) -> String {
    expected
        .lines()
        .map(|line| {
            if line.trim() == BLANKLINE_SENTINEL {
                ""
            } else {
                line
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collapse every whitespace run to a single space.
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Match `expected` against `actual` treating `...` as a wildcard.
///
/// Literal segments between markers must appear in `actual` in order,
/// non-overlapping. A leading/trailing literal segment must anchor at the
/// corresponding end of `actual`.
fn ellipsis_match(expected: &str, actual: &str) -> bool {
    let segments: Vec<&str> = expected.split(ELLIPSIS_MARKER).collect();
    if segments.len() == 1 {
        return expected == actual;
    }

    let first = segments[0];
    if !actual.starts_with(first) {
        return false;
    }
    let mut cursor = first.len();

    for segment in &segments[1..segments.len() - 1] {
        if segment.is_empty() {
            continue;
        }
        match actual[cursor..].find(segment) {
            Some(found) => cursor += found + segment.len(),
            None => return false,
        }
    }

    let last = segments[segments.len() - 1];
    if last.is_empty() {
        return true;
    }
    actual.len() >= cursor + last.len() && actual.ends_with(last)
}
