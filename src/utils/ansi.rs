//! ANSI escape sequence stripping.
//!
//! Toolchain output is matched against parser rules after color and cursor
//! control sequences have been removed, so rule patterns never need to
//! account for terminal styling.

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

static ANSI_ESCAPE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    // CSI sequences (colors, cursor movement) and OSC sequences (titles,
    // hyperlinks) terminated by BEL or ST.
    Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)").unwrap()
});

/// Remove ANSI escape sequences from `text`.
///
/// Returns a borrowed `Cow` when the text contains no escapes.
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    ANSI_ESCAPE_REGEX.replace_all(text, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_borrowed() {
        let stripped = strip_ansi("no escapes here");
        assert!(matches!(stripped, Cow::Borrowed(_)));
        assert_eq!(stripped, "no escapes here");
    }

    #[test]
    fn test_strips_color_codes() {
        assert_eq!(strip_ansi("\x1b[31merror\x1b[0m: boom"), "error: boom");
        assert_eq!(strip_ansi("\x1b[1;4;32mok\x1b[m"), "ok");
    }

    #[test]
    fn test_strips_osc_hyperlink() {
        assert_eq!(strip_ansi("\x1b]8;;https://a.dev\x07link\x1b]8;;\x07"), "link");
    }
}
