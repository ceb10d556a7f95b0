//! Recovers the exact byte span of an example's expected-output block.
//!
//! Spans are located against the pristine snapshot of the file, never against
//! partially edited text. Location is strict: if the block has been hand
//! edited in a way that breaks its structural markers (prompt lines inside
//! the range, indentation that undercuts the block's), location fails and the
//! example is reported rather than guessed at.

use thiserror::Error;

use crate::edit::ByteSpan;
use crate::example::Example;

/// Primary prompt marker; a line carrying it is source, never output.
const PS1: &str = ">>>";

#[derive(Error, Debug)]
pub enum LocateError {
    #[error(
        "expected-output block lines {start}..{end} out of bounds for a file with {line_count} lines"
    )]
    OutOfBounds {
        start: usize,
        end: usize,
        line_count: usize,
    },

    #[error("expected-output block at line {line} no longer looks like output: {reason}")]
    StructureChanged { line: usize, reason: String },
}

/// A located expected-output block, ready to be replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedBlock {
    /// Byte span of the block, including the final line terminator when
    /// present. For an example with no recorded output this is a zero-width
    /// insertion point at the start of the line where output belongs.
    pub span: ByteSpan,
    /// Leading whitespace shared by the block's lines.
    pub indent: String,
    /// Whether the span ends on a line terminator. When false the block is
    /// the last line of a file with no trailing newline.
    pub newline_terminated: bool,
}

/// Byte geometry of one line of text.
#[derive(Debug, Clone, Copy)]
struct LineSpan {
    /// Offset of the first byte of the line.
    start: usize,
    /// Offset just past the content, excluding any terminator.
    content_end: usize,
    /// Offset just past the terminator (`\n` or `\r\n`), or `content_end`
    /// for an unterminated final line.
    term_end: usize,
}

fn line_spans(text: &str) -> Vec<LineSpan> {
    let mut spans = Vec::new();
    let bytes = text.as_bytes();
    let mut start = 0;
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'\n' {
            let content_end = if i > start && bytes[i - 1] == b'\r' {
                i - 1
            } else {
                i
            };
            spans.push(LineSpan {
                start,
                content_end,
                term_end: i + 1,
            });
            start = i + 1;
        }
    }
    if start < bytes.len() {
        spans.push(LineSpan {
            start,
            content_end: bytes.len(),
            term_end: bytes.len(),
        });
    }
    spans
}

fn leading_whitespace(line: &str) -> &str {
    let end = line
        .char_indices()
        .find(|(_, c)| !c.is_whitespace())
        .map_or(line.len(), |(i, _)| i);
    &line[..end]
}

/// Locate the expected-output block of `example` within `pristine`.
///
/// Tolerates blank trailing lines inside the recorded range (they are left
/// out of the returned span). Fails with [`LocateError::StructureChanged`]
/// when the block's text no longer matches what was recorded at collection.
pub fn locate(pristine: &str, example: &Example) -> Result<LocatedBlock, LocateError> {
    let lines = line_spans(pristine);
    let range = example.block_lines();

    if range.start > lines.len() || range.end > lines.len() {
        return Err(LocateError::OutOfBounds {
            start: range.start,
            end: range.end,
            line_count: lines.len(),
        });
    }

    // No recorded output: a zero-width insertion point at the line where
    // output belongs, indented like whatever currently sits there.
    if range.is_empty() {
        let (offset, indent) = match lines.get(range.start) {
            Some(line) => (
                line.start,
                leading_whitespace(&pristine[line.start..line.content_end]).to_string(),
            ),
            None => (pristine.len(), String::new()),
        };
        return Ok(LocatedBlock {
            span: ByteSpan::new(offset, offset),
            indent,
            newline_terminated: true,
        });
    }

    let content_of = |line: &LineSpan| &pristine[line.start..line.content_end];

    // Tolerate blank trailing lines: they belong to the surrounding file,
    // not to the block.
    let mut last = range.end - 1;
    while last > range.start && content_of(&lines[last]).trim().is_empty() {
        last -= 1;
    }

    let first_line = content_of(&lines[range.start]);
    if first_line.trim().is_empty() {
        return Err(LocateError::StructureChanged {
            line: range.start + 1,
            reason: "block starts with a blank line".to_string(),
        });
    }
    let indent = leading_whitespace(first_line).to_string();

    let mut recorded = Vec::with_capacity(last - range.start + 1);
    for idx in range.start..=last {
        let content = content_of(&lines[idx]);
        if content.trim().is_empty() {
            return Err(LocateError::StructureChanged {
                line: idx + 1,
                reason: "blank line inside expected-output block".to_string(),
            });
        }
        let Some(rest) = content.strip_prefix(indent.as_str()) else {
            return Err(LocateError::StructureChanged {
                line: idx + 1,
                reason: "indentation no longer matches the block".to_string(),
            });
        };
        if rest.starts_with(PS1) {
            return Err(LocateError::StructureChanged {
                line: idx + 1,
                reason: "prompt marker inside expected-output block".to_string(),
            });
        }
        recorded.push(rest);
    }

    // The block must still read as it did at collection time; anything else
    // means the file was hand edited underneath the recorded line range.
    let on_disk = recorded.join("\n");
    let expected = example.expected().trim_end_matches(['\r', '\n']);
    if on_disk != expected {
        return Err(LocateError::StructureChanged {
            line: range.start + 1,
            reason: "recorded expected text no longer matches file contents".to_string(),
        });
    }

    let end_line = lines[last];
    Ok(LocatedBlock {
        span: ByteSpan::new(lines[range.start].start, end_line.term_end),
        indent,
        newline_terminated: end_line.term_end > end_line.content_end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::CompareOptions;

    fn example(lines: std::ops::Range<usize>, expected: &str) -> Example {
        Example::new("f.py", 0, lines, expected, CompareOptions::default())
    }

    #[test]
    fn locates_single_line_block() {
        let text = "def f():\n    \"\"\"\n    >>> f()\n    3\n    \"\"\"\n";
        let block = locate(text, &example(3..4, "3")).unwrap();
        assert_eq!(&text[block.span.start..block.span.end], "    3\n");
        assert_eq!(block.indent, "    ");
        assert!(block.newline_terminated);
    }

    #[test]
    fn locates_multi_line_block() {
        let text = "    >>> g()\n    a\n    b\nrest\n";
        let block = locate(text, &example(1..3, "a\nb")).unwrap();
        assert_eq!(&text[block.span.start..block.span.end], "    a\n    b\n");
    }

    #[test]
    fn keeps_deeper_indentation_inside_block() {
        let text = ">>> h()\nx\n  y\n";
        let block = locate(text, &example(1..3, "x\n  y")).unwrap();
        assert_eq!(&text[block.span.start..block.span.end], "x\n  y\n");
        assert_eq!(block.indent, "");
    }

    #[test]
    fn tolerates_blank_trailing_lines() {
        let text = "    3\n\n\nnext\n";
        let block = locate(text, &example(0..3, "3")).unwrap();
        assert_eq!(&text[block.span.start..block.span.end], "    3\n");
    }

    #[test]
    fn empty_range_is_an_insertion_point() {
        let text = "    >>> f()\n    next_statement\n";
        let block = locate(text, &example(1..1, "")).unwrap();
        assert!(block.span.is_empty());
        assert_eq!(block.span.start, text.find("    next").unwrap());
        assert_eq!(block.indent, "    ");
    }

    #[test]
    fn out_of_bounds_range_is_reported() {
        let result = locate("one\ntwo\n", &example(5..7, "x"));
        assert!(matches!(result, Err(LocateError::OutOfBounds { .. })));
    }

    #[test]
    fn prompt_marker_in_block_is_structural_damage() {
        let text = "    >>> f()\n    3\n";
        let result = locate(text, &example(0..2, ">>> f()\n3"));
        assert!(matches!(
            result,
            Err(LocateError::StructureChanged { line: 1, .. })
        ));
    }

    #[test]
    fn undercut_indentation_is_structural_damage() {
        let text = "    a\n  b\n";
        let result = locate(text, &example(0..2, "a\nb"));
        assert!(matches!(
            result,
            Err(LocateError::StructureChanged { line: 2, .. })
        ));
    }

    #[test]
    fn hand_edited_text_is_structural_damage() {
        let text = "    3\n";
        let result = locate(text, &example(0..1, "4"));
        assert!(matches!(result, Err(LocateError::StructureChanged { .. })));
    }

    #[test]
    fn crlf_terminators_are_excluded_from_content() {
        let text = "    3\r\nnext\r\n";
        let block = locate(text, &example(0..1, "3")).unwrap();
        assert_eq!(&text[block.span.start..block.span.end], "    3\r\n");
    }

    #[test]
    fn unterminated_final_line() {
        let text = "    3";
        let block = locate(text, &example(0..1, "3")).unwrap();
        assert_eq!(&text[block.span.start..block.span.end], "    3");
        assert!(!block.newline_terminated);
    }
}
