//! Narration for "thinking" blocks: a lighter pass than the reply pipeline.

use std::sync::LazyLock;

use regex::Regex;

static NUMBERED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\.(\s*)").unwrap());
static BULLET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^[-•·] (.+?)$").unwrap());
static LINE_BREAKS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n+").unwrap());
static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static DISALLOWED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^\w\s\x{3040}-\x{309F}\x{30A0}-\x{30FF}\x{4E00}-\x{9FAF}、。！？0-9]").unwrap()
});

/// Returns `None` when nothing speakable is left.
pub fn normalize_thinking(thinking: &str) -> Option<String> {
    let text = NUMBERED.replace_all(thinking.trim(), "${1}、");
    let text = BULLET.replace_all(&text, "${1}");
    let text = LINE_BREAKS.replace_all(&text, "、");
    let text = WHITESPACE_RUN.replace_all(&text, " ");
    let text = DISALLOWED.replace_all(&text, "");

    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_steps_join_with_commas() {
        let out = normalize_thinking("1. まず確認\n2. 次に実行").unwrap();
        assert_eq!(out, "1、まず確認、2、次に実行");
        assert!(!out.contains('\n'));
    }

    #[test]
    fn bullets_and_symbols_are_dropped() {
        let out = normalize_thinking("- 設定を読む\n• 差分を見る\n· 直す (小さく)").unwrap();
        assert_eq!(out, "設定を読む、差分を見る、直す 小さく");
    }

    #[test]
    fn latin_words_survive() {
        assert_eq!(
            normalize_thinking("Check the config!").as_deref(),
            Some("Check the config")
        );
    }

    #[test]
    fn nothing_speakable() {
        assert_eq!(normalize_thinking("   "), None);
        assert_eq!(normalize_thinking("--- ## ***"), None);
    }
}
