//! Splits long narration into playback-sized chunks.
//!
//! Boundaries are tried coarse to fine: paragraphs (`。。`), sentences (`。`),
//! then clauses (`、`). Lengths are counted in characters.

pub const PARAGRAPH_MARK: &str = "。。";
const SENTENCE_MARK: &str = "。";
const CLAUSE_MARK: &str = "、";

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Greedy packer: appends pieces to the current chunk until the next one
/// would push it past `max`.
struct Packer {
    max: usize,
    chunks: Vec<String>,
    current: String,
    current_len: usize,
}

impl Packer {
    fn new(max: usize) -> Self {
        Self {
            max,
            chunks: Vec::new(),
            current: String::new(),
            current_len: 0,
        }
    }

    fn push(&mut self, piece: &str, mark: &str) {
        let len = char_len(piece) + char_len(mark);
        if self.current_len > 0 && self.current_len + len > self.max {
            self.flush();
        }
        self.current.push_str(piece);
        self.current.push_str(mark);
        self.current_len += len;
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.chunks.push(std::mem::take(&mut self.current));
        }
        self.current_len = 0;
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.chunks
    }
}

/// Split `text` into chunks of at most `max` characters where a boundary
/// allows it. A single clause longer than `max` is kept whole.
pub fn split_naturally(text: &str, max: usize) -> Vec<String> {
    if char_len(text) <= max {
        return vec![text.to_string()];
    }

    let mut packer = Packer::new(max);
    for paragraph in text.split(PARAGRAPH_MARK) {
        if paragraph.trim().is_empty() {
            continue;
        }
        if char_len(paragraph) + char_len(PARAGRAPH_MARK) <= max {
            packer.push(paragraph, PARAGRAPH_MARK);
            continue;
        }

        for sentence in paragraph.split(SENTENCE_MARK) {
            if sentence.trim().is_empty() {
                continue;
            }
            if char_len(sentence) + char_len(SENTENCE_MARK) <= max {
                packer.push(sentence, SENTENCE_MARK);
                continue;
            }

            let clauses: Vec<&str> = sentence
                .split(CLAUSE_MARK)
                .filter(|c| !c.trim().is_empty())
                .collect();
            for (i, clause) in clauses.iter().enumerate() {
                let mark = if i + 1 == clauses.len() {
                    SENTENCE_MARK
                } else {
                    CLAUSE_MARK
                };
                packer.push(clause, mark);
            }
        }
    }
    packer.finish()
}
