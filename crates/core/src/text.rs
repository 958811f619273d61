//! Text normalization utilities
//!
//! Model output reaches the synthesizer through [`clean_markdown`]; client
//! transcripts and STT surfaces go through [`strip_punctuation_and_emoji`].

use once_cell::sync::Lazy;
use regex::Regex;

static FENCED_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```.*?```").expect("fenced code pattern"));
static IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").expect("image pattern"));
static LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("link pattern"));
static HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s{0,3}#{1,6}\s+").expect("heading pattern"));
static EMPHASIS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\*{1,3}|_{1,3})([^*_]+)(\*{1,3}|_{1,3})").expect("emphasis pattern"));
static INLINE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"`([^`]*)`").expect("inline code pattern"));
static BLOCKQUOTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s{0,3}>\s?").expect("blockquote pattern"));
static LIST_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(?:[-*+]|\d+\.)\s+").expect("list marker pattern"));
static HORIZONTAL_RULE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s{0,3}(?:-{3,}|\*{3,}|_{3,})\s*$").expect("rule pattern"));

/// Strip markdown syntax so it is never spoken
///
/// Fenced code blocks are dropped entirely; links keep their label; emphasis
/// and inline code keep their content.
pub fn clean_markdown(text: &str) -> String {
    let text = FENCED_CODE.replace_all(text, "");
    let text = IMAGE.replace_all(&text, "");
    let text = LINK.replace_all(&text, "$1");
    let text = HEADING.replace_all(&text, "");
    let text = EMPHASIS.replace_all(&text, "$2");
    let text = INLINE_CODE.replace_all(&text, "$1");
    let text = BLOCKQUOTE.replace_all(&text, "");
    let text = LIST_MARKER.replace_all(&text, "");
    let text = HORIZONTAL_RULE.replace_all(&text, "");
    text.trim().to_string()
}

fn is_cjk_punctuation(c: char) -> bool {
    matches!(
        c,
        '。' | '，'
            | '！'
            | '？'
            | '；'
            | '：'
            | '、'
            | '“'
            | '”'
            | '‘'
            | '’'
            | '（'
            | '）'
            | '《'
            | '》'
            | '【'
            | '】'
            | '「'
            | '」'
            | '『'
            | '』'
            | '…'
            | '—'
            | '～'
            | '·'
    )
}

fn is_emoji(c: char) -> bool {
    matches!(
        c as u32,
        0x1F000..=0x1FAFF   // pictographs, symbols, supplemental
            | 0x2600..=0x27BF   // misc symbols, dingbats
            | 0x2B00..=0x2BFF
            | 0xFE00..=0xFE0F   // variation selectors
            | 0x200D..=0x200D   // zero-width joiner
    )
}

fn is_boundary_trim(c: char) -> bool {
    c.is_whitespace() || c.is_ascii_punctuation() || is_cjk_punctuation(c) || is_emoji(c)
}

/// Trim punctuation, emoji and whitespace from both ends
///
/// Interior characters are untouched, so `Wait... ok` keeps its ellipsis.
pub fn strip_punctuation_and_emoji(text: &str) -> String {
    text.trim_matches(is_boundary_trim).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_markdown_basics() {
        assert_eq!(clean_markdown("# Title\nBody"), "Body");
        assert_eq!(clean_markdown("**bold** and *italic*"), "bold and italic");
        assert_eq!(clean_markdown("see [docs](https://x.dev) now"), "see docs now");
        assert_eq!(clean_markdown("run `ls` please"), "run ls please");
    }

    #[test]
    fn test_clean_markdown_drops_code_blocks() {
        let text = "before\n```rust\nfn main() {}\n```\nafter";
        assert_eq!(clean_markdown(text), "before\n\nafter");
    }

    #[test]
    fn test_clean_markdown_lists_and_quotes() {
        assert_eq!(clean_markdown("- one\n- two"), "one\ntwo");
        assert_eq!(clean_markdown("> quoted"), "quoted");
        assert_eq!(clean_markdown("1. first"), "first");
    }

    #[test]
    fn test_strip_boundary_punctuation() {
        assert_eq!(strip_punctuation_and_emoji("你好，世界。"), "你好，世界");
        assert_eq!(strip_punctuation_and_emoji("...wait..."), "wait");
        assert_eq!(strip_punctuation_and_emoji("🙂嗯🙂"), "嗯");
        assert_eq!(strip_punctuation_and_emoji("！？"), "");
    }

    #[test]
    fn test_strip_keeps_interior() {
        assert_eq!(strip_punctuation_and_emoji("Wait... ok!"), "Wait... ok");
    }
}
