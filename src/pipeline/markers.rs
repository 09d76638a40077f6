//! Marker transform: `([ ... ])` → pandoc display math.
//!
//! Authors type equations between `([` and `])` because Word has no plain-text
//! display-math syntax of its own. pandoc's `tex_math_dollars` extension only
//! understands `$...$` and `$$...$$`, so every marker is rewritten into a
//! `$$` block on its own lines.
//!
//! ## Rule Order
//!
//! 1. Fold CRLF (and a lone CR) to LF so the spacing rule sees one kind of
//!    line break.
//! 2. Walk the text left to right. Whichever starts first wins:
//!    - a marker (non-greedy, dot matches newline) is replaced with
//!      `\n\n$$\n{trimmed content}\n$$\n\n`; its content is never rescanned;
//!    - an existing `$$ … $$` block is copied as is, with a blank line added
//!      before the opening delimiter and after the closing one when missing.
//! 3. Repeat step 2 until the text stops changing.
//!
//! A `$$` alone on its line opens a *fence*. A fence closes at the next `$$`
//! that is alone on its line and followed by a blank line or the end of the
//! text, which is exactly the shape step 2 produces for a marker. Any other
//! `$$` pairs with the next delimiter, unless that delimiter opens a closed
//! fence, in which case it stays literal.
//!
//! Step 2 only consumes markers and inserts line breaks beside delimiters
//! that lack them, so step 3 settles after a few passes and the result is a
//! fixed point. Markers inside an existing `$$` block are left alone. Inline
//! `$...$` math is never touched.

use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

static RE_MATH_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\(\[(.*?)\]\)").unwrap());
static RE_CARRIAGE_RETURN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\r\n?").unwrap());

/// One `([ ... ])` occurrence in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MathBlock {
    /// Text between the delimiters, untrimmed.
    pub content: String,
    /// Byte span of the whole marker, delimiters included.
    pub span: Range<usize>,
}

/// List every marker in `text`, in order of appearance.
pub fn find_math_blocks(text: &str) -> Vec<MathBlock> {
    RE_MATH_MARKER
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(MathBlock {
                content: caps[1].to_string(),
                span: whole.range(),
            })
        })
        .collect()
}

/// Rewrite markers into `$$` display math and space out every display block.
///
/// Unbalanced `([` / `])` tokens stay as literal text. A second `([` inside a
/// marker belongs to the equation: `([ a ([ b ]) c ])` becomes a block holding
/// `a ([ b` followed by the literal text ` c ])`.
///
/// The function is idempotent: `to_markdown_with_math(&to_markdown_with_math(s))`
/// equals `to_markdown_with_math(s)`.
pub fn to_markdown_with_math(input: &str) -> String {
    let mut text = normalise_line_endings(input);
    loop {
        let next = rewrite_pass(&text);
        if next == text {
            return next;
        }
        text = next;
    }
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    RE_CARRIAGE_RETURN.replace_all(input, "\n").into_owned()
}

// ── Rule 2: Markers and display blocks ───────────────────────────────────────

fn rewrite_pass(text: &str) -> String {
    let delimiters = display_delimiters(text);
    let mut out = String::with_capacity(text.len() + 16);
    let mut cursor = 0;

    loop {
        let marker = RE_MATH_MARKER.find_at(text, cursor);
        let open = delimiters.iter().copied().find(|&d| d >= cursor);

        match (marker, open) {
            (Some(m), open) if open.is_none_or(|d| m.start() < d) => {
                out.push_str(&text[cursor..m.start()]);
                let content = &text[m.start() + 2..m.end() - 2];
                out.push_str("\n\n$$\n");
                out.push_str(content.trim());
                out.push_str("\n$$\n\n");
                cursor = m.end();
            }
            (_, Some(open)) => {
                let Some(close) = closing_delimiter(text, &delimiters, open) else {
                    // Unpaired: copy it and keep scanning after it.
                    out.push_str(&text[cursor..open + 2]);
                    cursor = open + 2;
                    continue;
                };
                let end = close + 2;

                out.push_str(&text[cursor..open]);
                if !out.is_empty() && !out.ends_with("\n\n") {
                    out.push_str(if out.ends_with('\n') { "\n" } else { "\n\n" });
                }

                out.push_str(&text[open..end]);

                let rest = &text[end..];
                if !rest.is_empty() && !rest.starts_with("\n\n") {
                    out.push_str(if rest.starts_with('\n') { "\n" } else { "\n\n" });
                }
                cursor = end;
            }
            _ => break,
        }
    }

    out.push_str(&text[cursor..]);
    out
}

/// Byte offsets of every `$$` that is not escaped as `\$$`.
fn display_delimiters(input: &str) -> Vec<usize> {
    let bytes = input.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'$' && bytes[i + 1] == b'$' {
            if i == 0 || bytes[i - 1] != b'\\' {
                found.push(i);
            }
            i += 2;
        } else {
            i += 1;
        }
    }
    found
}

/// `$$` alone at the start of a line, followed by a line break.
fn opens_fence(text: &str, at: usize) -> bool {
    let bytes = text.as_bytes();
    (at == 0 || bytes[at - 1] == b'\n') && bytes.get(at + 2) == Some(&b'\n')
}

/// `$$` alone on its line, followed by a blank line or the end of the text.
fn closes_fence(text: &str, at: usize) -> bool {
    let after = &text[at + 2..];
    at > 0
        && text.as_bytes()[at - 1] == b'\n'
        && (after.is_empty() || after == "\n" || after.starts_with("\n\n"))
}

fn fence_end(text: &str, delimiters: &[usize], open: usize) -> Option<usize> {
    delimiters
        .iter()
        .copied()
        .filter(|&d| d > open + 2)
        .find(|&d| closes_fence(text, d))
}

/// Delimiter closing the block opened at `open`, or `None` if it is unpaired.
fn closing_delimiter(text: &str, delimiters: &[usize], open: usize) -> Option<usize> {
    if opens_fence(text, open) {
        if let Some(close) = fence_end(text, delimiters, open) {
            return Some(close);
        }
    }
    let next = delimiters.iter().copied().find(|&d| d > open)?;
    if opens_fence(text, next) && fence_end(text, delimiters, next).is_some() {
        return None;
    }
    Some(next)
}

// ── Tests ────────────────────────────────────────────────────────────────────
