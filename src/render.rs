//! Re-renders captured output as a valid expected-output block.
//!
//! The captured text is massaged the way the host runner's own conventions
//! demand before it can sit inside a source file: empty lines become the
//! `<BLANKLINE>` sentinel, pathologically long output is truncated so it
//! cannot crash an editor, volatile values (heap addresses, temp paths) are
//! redacted, and every line is re-indented to the original block's depth.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::compare::BLANKLINE_SENTINEL;
use crate::snapshot::Newline;

/// Lines at or above this length are elided down to their ends.
const MAX_LINE_CHARS: usize = 1000;
/// Outputs with more lines than this keep only their head and tail.
const MAX_LINES: usize = 1000;
const KEEP_CHARS: usize = 50;
const KEEP_LINES: usize = 50;

static MEMORY_ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r" 0x[0-9a-fA-F]+").expect("literal regex"));
static TEMP_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/tmp/[0-9a-fA-F]+").expect("literal regex"));

/// Replace volatile values that would make the accepted output churn on
/// every run: heap addresses and generated temp paths.
pub fn redact_volatile(line: &str) -> String {
    let line = MEMORY_ADDRESS.replace_all(line, " 0x...");
    TEMP_PATH.replace_all(&line, "/tmp/...").into_owned()
}

fn elide_line(line: &str) -> String {
    if line.chars().count() < MAX_LINE_CHARS {
        return line.to_string();
    }
    let head: String = line.chars().take(KEEP_CHARS).collect();
    let tail_start = line.chars().count() - KEEP_CHARS;
    let tail: String = line.chars().skip(tail_start).collect();
    format!("{head}...{tail}")
}

/// Render `raw` actual output as an expected-output block.
///
/// `indent` is the original block's leading whitespace, `newline` the file's
/// terminator flavor, and `newline_terminated` whether the replaced span
/// ended on a terminator. Empty output renders to the empty string, which
/// removes the block outright when spliced.
pub fn render_block(raw: &str, indent: &str, newline: Newline, newline_terminated: bool) -> String {
    let mut lines: Vec<String> = raw
        .lines()
        .map(|line| {
            if line.is_empty() {
                BLANKLINE_SENTINEL.to_string()
            } else {
                redact_volatile(&elide_line(line))
            }
        })
        .collect();

    if lines.len() > MAX_LINES {
        let tail = lines.split_off(lines.len() - KEEP_LINES);
        lines.truncate(KEEP_LINES);
        lines.push("...".to_string());
        lines.extend(tail);
    }

    if lines.is_empty() {
        return String::new();
    }

    let mut block = lines
        .iter()
        .map(|line| format!("{indent}{line}"))
        .collect::<Vec<_>>()
        .join(newline.as_str());
    if newline_terminated {
        block.push_str(newline.as_str());
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indents_every_line() {
        let block = render_block("a\nb", "    ", Newline::Lf, true);
        assert_eq!(block, "    a\n    b\n");
    }

    #[test]
    fn empty_lines_become_sentinels() {
        let block = render_block("a\n\nb", "  ", Newline::Lf, true);
        assert_eq!(block, "  a\n  <BLANKLINE>\n  b\n");
    }

    #[test]
    fn empty_output_renders_to_nothing() {
        assert_eq!(render_block("", "    ", Newline::Lf, true), "");
    }

    #[test]
    fn crlf_files_get_crlf_blocks() {
        let block = render_block("a\nb", "", Newline::CrLf, true);
        assert_eq!(block, "a\r\nb\r\n");
    }

    #[test]
    fn unterminated_block_has_no_trailing_newline() {
        assert_eq!(render_block("4", "", Newline::Lf, false), "4");
    }

    #[test]
    fn long_lines_are_elided() {
        let line = "x".repeat(1500);
        let block = render_block(&line, "", Newline::Lf, true);
        let rendered = block.trim_end();
        assert_eq!(rendered.len(), 50 + 3 + 50);
        assert!(rendered.starts_with(&"x".repeat(50)));
        assert!(rendered.contains("..."));
    }

    #[test]
    fn elision_respects_char_boundaries() {
        let line = "\u{e9}".repeat(1200);
        let block = render_block(&line, "", Newline::Lf, true);
        assert!(block.trim_end().chars().count() == 50 + 3 + 50);
    }

    #[test]
    fn long_outputs_keep_head_and_tail() {
        let raw = (0..1500).map(|i| i.to_string()).collect::<Vec<_>>().join("\n");
        let block = render_block(&raw, "", Newline::Lf, true);
        let lines: Vec<&str> = block.lines().collect();
        assert_eq!(lines.len(), 50 + 1 + 50);
        assert_eq!(lines[0], "0");
        assert_eq!(lines[50], "...");
        assert_eq!(lines[100], "1499");
    }

    #[test]
    fn memory_addresses_are_redacted() {
        assert_eq!(
            redact_volatile("<__main__.A at 0x10b80ce50>"),
            "<__main__.A at 0x...>"
        );
    }

    #[test]
    fn temp_paths_are_redacted() {
        assert_eq!(
            redact_volatile("/tmp/abcd234/generated-0.py"),
            "/tmp/.../generated-0.py"
        );
    }
}
