//! Typographic normalisation applied to each extracted paragraph.
//!
//! Word's autocorrect turns `"`, `'` and `--` into curly quotes and dashes,
//! and pastes from the web bring non-breaking spaces along. Inside a math
//! marker those characters reach the TeX reader and break the equation, so
//! they are folded back to ASCII before the marker transform runs.

/// Replace NBSPs, en/em dashes and curly quotes with their ASCII forms.
///
/// | From                | To    |
/// |---------------------|-------|
/// | U+00A0 (NBSP)       | space |
/// | U+2013 (en dash)    | `--`  |
/// | U+2014 (em dash)    | `---` |
/// | U+201C / U+201D     | `"`   |
/// | U+2019              | `'`   |
pub fn normalize_quotes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '\u{00A0}' => out.push(' '),
            '\u{2013}' => out.push_str("--"),
            '\u{2014}' => out.push_str("---"),
            '\u{201C}' | '\u{201D}' => out.push('"'),
            '\u{2019}' => out.push('\''),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nbsp_becomes_space() {
        assert_eq!(normalize_quotes("a\u{00A0}b"), "a b");
    }

    #[test]
    fn test_dashes() {
        assert_eq!(normalize_quotes("1\u{2013}2"), "1--2");
        assert_eq!(normalize_quotes("wait\u{2014}what"), "wait---what");
    }

    #[test]
    fn test_quotes() {
        assert_eq!(
            normalize_quotes("\u{201C}it\u{2019}s\u{201D}"),
            "\"it's\""
        );
    }

    #[test]
    fn test_left_single_quote_untouched() {
        assert_eq!(normalize_quotes("\u{2018}x"), "\u{2018}x");
    }

    #[test]
    fn test_plain_ascii_passthrough() {
        let s = "E = mc^2, $x$ and ([ y ])";
        assert_eq!(normalize_quotes(s), s);
    }
}
