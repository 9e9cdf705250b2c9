//! Written text → spoken Japanese narration.
//!
//! Each rule is a standalone `fn(&str) -> String`; [`normalize_text`] applies
//! them in a fixed order. The order matters: extensions are rewritten before
//! `N.` list markers so `main.py` never becomes `main、py`, and line breaks are
//! turned into punctuation before the final collapse.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

pub const CODE_PLACEHOLDER: &str = "。コード部分があります。";

static CODE_BLOCK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n*```[\s\S]*?```\n*").unwrap());

static PROJECT_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z]:\\Users\\[^\\]+\\Documents\\[^\\]+\\[^\\]+\\([^\s\\]+)").unwrap()
});
static WINDOWS_HOME_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z]:\\Users\\[^\\]+\\(\S+)").unwrap());
static UNIX_HOME_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(?:home|Users)/[^/\s]+/(\S+)").unwrap());

/// Extension → spoken category. `.json` is listed before `.js` for clarity only;
/// the trailing boundary check keeps `.js` from matching inside `.json`.
const EXTENSIONS: &[(&str, &str)] = &[
    ("py", "ファイル"),
    ("json", "設定ファイル"),
    ("js", "スクリプト"),
    ("md", "文書"),
    ("txt", "テキスト"),
    ("log", "ログ"),
];

static EXTENSION_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    EXTENSIONS
        .iter()
        .map(|(ext, spoken)| {
            let re = Regex::new(&format!(r"(\w+)\.{ext}([^A-Za-z0-9_]|$)")).unwrap();
            (re, *spoken)
        })
        .collect()
});

const SYMBOLS: &[&str] = &["✅", "❌", "⚠️", "⚠", "📊", "🎯", "💡", "🔧", "📝"];

static RULE_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[=\-─━]{3,}").unwrap());
static HASH_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#{2,}").unwrap());
static STAR_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*{2,}").unwrap());

static DASH_BULLET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^- (.+?)$").unwrap());
static NUMBERED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\.(\s*)").unwrap());

static PARAGRAPH_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\n+").unwrap());
static OPEN_BRACKETS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[（(「『]").unwrap());
static CLOSE_BRACKETS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[）)」』]").unwrap());

static SESSION_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"SESSION_(\d{4})(\d{2})(\d{2})_(\d{2})(\d{2})(\d{2})_\d+").unwrap()
});
static ISO_DATETIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4})-(\d{2})-(\d{2})T(\d{2}):(\d{2}):(\d{2})").unwrap()
});
static SPACED_DATETIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4})-(\d{2})-(\d{2})\s+(\d{2}):(\d{2}):(\d{2})").unwrap()
});
static TIME_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{2}):(\d{2}):(\d{2})").unwrap());

/// ASCII words, the unit both the term dictionary and acronym spelling work on.
static ASCII_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z0-9_]+").unwrap());

const TERMS: &[(&str, &str)] = &[
    ("todo", "タスク"),
    ("api", "エーピーアイ"),
    ("url", "アドレス"),
    ("json", "ジェイソン"),
    ("html", "エイチティーエムエル"),
    ("css", "スタイルシート"),
    ("cli", "コマンドライン"),
    ("id", "アイディー"),
    ("ok", "オーケー"),
    ("ng", "エヌジー"),
    ("error", "エラー"),
    ("warning", "警告"),
    ("info", "情報"),
    ("debug", "デバッグ"),
    ("git", "ギット"),
    ("commit", "コミット"),
    ("push", "プッシュ"),
    ("pull", "プル"),
    ("branch", "ブランチ"),
    ("file", "ファイル"),
    ("folder", "フォルダ"),
    ("update", "更新"),
    ("create", "作成"),
    ("delete", "削除"),
];

const ALPHABET: [&str; 26] = [
    "エー", "ビー", "シー", "ディー", "イー", "エフ", "ジー", "エイチ", "アイ", "ジェイ", "ケー", "エル",
    "エム", "エヌ", "オー", "ピー", "キュー", "アール", "エス", "ティー", "ユー", "ブイ", "ダブリュー",
    "エックス", "ワイ", "ゼット",
];

static PUNCTUATION_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[。、]+").unwrap());
static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Full narration pipeline for assistant reply text.
///
/// May return an empty string; callers must not enqueue it.
pub fn normalize_text(text: &str) -> String {
    let rules: [fn(&str) -> String; 11] = [
        replace_code_blocks,
        collapse_paths,
        speak_extensions,
        strip_decorations,
        rewrite_list_markers,
        rewrite_line_breaks,
        rewrite_brackets,
        spell_out_timestamps,
        replace_terms,
        spell_out_acronyms,
        collapse_punctuation,
    ];
    rules.iter().fold(text.to_string(), |acc, rule| rule(&acc))
}

pub fn replace_code_blocks(text: &str) -> String {
    CODE_BLOCK.replace_all(text, CODE_PLACEHOLDER).into_owned()
}

pub fn collapse_paths(text: &str) -> String {
    let text = PROJECT_PATH.replace_all(text, "プロジェクト内の${1}");
    let text = WINDOWS_HOME_PATH.replace_all(&text, "ユーザーフォルダの${1}");
    UNIX_HOME_PATH
        .replace_all(&text, "ユーザーフォルダの${1}")
        .into_owned()
}

pub fn speak_extensions(text: &str) -> String {
    EXTENSION_PATTERNS
        .iter()
        .fold(text.to_string(), |acc, (re, spoken)| {
            re.replace_all(&acc, format!("${{1}}{spoken}${{2}}").as_str())
                .into_owned()
        })
}

pub fn strip_decorations(text: &str) -> String {
    let mut text = text.to_string();
    for symbol in SYMBOLS {
        text = text.replace(symbol, "");
    }
    let text = RULE_LINE.replace_all(&text, "");
    let text = HASH_RUN.replace_all(&text, "");
    STAR_RUN.replace_all(&text, "").into_owned()
}

/// Drop `- ` bullets and read `1.` as `1、`. Runs before line-break handling.
pub fn rewrite_list_markers(text: &str) -> String {
    let text = DASH_BULLET.replace_all(text, "${1}");
    NUMBERED.replace_all(&text, "${1}、").into_owned()
}

pub fn rewrite_line_breaks(text: &str) -> String {
    PARAGRAPH_BREAK.replace_all(text, "。").replace('\n', "、")
}

pub fn rewrite_brackets(text: &str) -> String {
    let text = OPEN_BRACKETS.replace_all(text, "。");
    CLOSE_BRACKETS.replace_all(&text, "。").into_owned()
}

/// Parse a captured digit group as an integer so `05` reads as `5`.
/// Full-width digits count; any other digit script leaves the match alone.
fn num(caps: &Captures, i: usize) -> Option<u32> {
    caps[i].chars().try_fold(0u32, |acc, c| {
        let digit = match c {
            '０'..='９' => c as u32 - '０' as u32,
            _ => c.to_digit(10)?,
        };
        acc.checked_mul(10)?.checked_add(digit)
    })
}

fn spoken_date_time(caps: &Captures, first: usize) -> Option<String> {
    Some(format!(
        "{}年{}月{}日 {}時{}分{}秒",
        num(caps, first)?,
        num(caps, first + 1)?,
        num(caps, first + 2)?,
        num(caps, first + 3)?,
        num(caps, first + 4)?,
        num(caps, first + 5)?,
    ))
}

fn spoken_time(caps: &Captures) -> Option<String> {
    Some(format!(
        "{}時{}分{}秒",
        num(caps, 1)?,
        num(caps, 2)?,
        num(caps, 3)?
    ))
}

fn unchanged(caps: &Captures) -> String {
    caps[0].to_string()
}

pub fn spell_out_timestamps(text: &str) -> String {
    let text = SESSION_ID.replace_all(text, |caps: &Captures| {
        spoken_date_time(caps, 1)
            .map_or_else(|| unchanged(caps), |spoken| format!("セッション {spoken}"))
    });
    let text = ISO_DATETIME.replace_all(&text, |caps: &Captures| {
        spoken_date_time(caps, 1).unwrap_or_else(|| unchanged(caps))
    });
    let text = SPACED_DATETIME.replace_all(&text, |caps: &Captures| {
        spoken_date_time(caps, 1).unwrap_or_else(|| unchanged(caps))
    });
    TIME_ONLY
        .replace_all(&text, |caps: &Captures| {
            spoken_time(caps).unwrap_or_else(|| unchanged(caps))
        })
        .into_owned()
}

/// Case-insensitive whole-word dictionary lookup.
pub fn replace_terms(text: &str) -> String {
    ASCII_WORD
        .replace_all(text, |caps: &Captures| {
            let word = &caps[0];
            let lower = word.to_ascii_lowercase();
            TERMS
                .iter()
                .find(|(term, _)| *term == lower)
                .map_or_else(|| word.to_string(), |(_, spoken)| (*spoken).to_string())
        })
        .into_owned()
}

/// Spell uppercase acronyms the dictionary missed, letter by letter.
pub fn spell_out_acronyms(text: &str) -> String {
    ASCII_WORD
        .replace_all(text, |caps: &Captures| {
            let word = &caps[0];
            if word.len() >= 2 && word.bytes().all(|b| b.is_ascii_uppercase()) {
                word.bytes()
                    .map(|b| ALPHABET[usize::from(b - b'A')])
                    .collect::<String>()
            } else {
                word.to_string()
            }
        })
        .into_owned()
}

/// Collapse punctuation runs and whitespace, then trim. Idempotent.
pub fn collapse_punctuation(text: &str) -> String {
    let text = PUNCTUATION_RUN.replace_all(text, |caps: &Captures| {
        if caps[0].contains('。') { "。" } else { "、" }
    });
    let text: Cow<str> = WHITESPACE_RUN.replace_all(&text, " ");
    text.trim().to_string()
}
