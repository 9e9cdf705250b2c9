//! Claude Code JSONL transcript records.
//!
//! Each transcript line is one JSON object. Only `message.role`,
//! `message.content` and `timestamp` matter here; everything else is ignored.

use serde::Deserialize;
use serde_json::Value;

use crate::dedup::Fingerprint;

/// Characters of serialized content that feed the fingerprint.
const FINGERPRINT_CONTENT_CHARS: usize = 100;

#[derive(Debug, Deserialize)]
pub struct TranscriptRecord {
    #[serde(default)]
    pub message: Option<TranscriptMessage>,
    #[serde(default)]
    pub timestamp: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct TranscriptMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Value,
}

/// One entry of `message.content`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentItem {
    Text { text: String },
    Thinking { thinking: String },
    #[serde(other)]
    Other,
}

impl ContentItem {
    /// Items with an unknown shape, or missing their payload field, become `Other`.
    fn from_value(value: &Value) -> Self {
        Self::deserialize(value).unwrap_or(Self::Other)
    }
}

impl TranscriptRecord {
    pub fn parse(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }

    pub fn role(&self) -> Option<&str> {
        self.message.as_ref()?.role.as_deref()
    }

    pub fn is_assistant(&self) -> bool {
        self.role() == Some("assistant")
    }

    pub fn items(&self) -> Vec<ContentItem> {
        self.message
            .as_ref()
            .map(TranscriptMessage::items)
            .unwrap_or_default()
    }

    /// Digest of (truncated content, role, timestamp).
    pub fn fingerprint(&self) -> Fingerprint {
        let (content, role) = match &self.message {
            Some(message) => {
                let content = match &message.content {
                    Value::Null => String::new(),
                    other => other
                        .to_string()
                        .chars()
                        .take(FINGERPRINT_CONTENT_CHARS)
                        .collect(),
                };
                (content, message.role.clone().unwrap_or_default())
            }
            None => (String::new(), String::new()),
        };
        let timestamp = match &self.timestamp {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        Fingerprint::from_parts(&[&content, &role, &timestamp])
    }
}

impl TranscriptMessage {
    pub fn items(&self) -> Vec<ContentItem> {
        match &self.content {
            Value::Array(values) => values.iter().map(ContentItem::from_value).collect(),
            Value::String(text) => vec![ContentItem::Text { text: text.clone() }],
            _ => Vec::new(),
        }
    }
}

/// Concatenated reply text and thinking text of a message, in item order.
pub fn split_text_and_thinking(items: &[ContentItem]) -> (String, String) {
    let mut text = String::new();
    let mut thinking = String::new();
    for item in items {
        match item {
            ContentItem::Text { text: t } => text.push_str(t),
            ContentItem::Thinking { thinking: t } => thinking.push_str(t),
            ContentItem::Other => {}
        }
    }
    (text, thinking)
}
