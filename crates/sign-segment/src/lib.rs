//! Greedy longest-match segmentation of tokens into sign clips.
//!
//! At every position the engine tries, in order:
//! 1. the first multi-token phrase (in [`DictionaryIndex`] order) whose tokens
//!    equal the upcoming tokens, followed by a 160 ms pause;
//! 2. the token as a single dictionary word, followed by a 140 ms pause;
//! 3. fingerspelling the token letter by letter, followed by a 120 ms pause.
//!
//! The scan is total: every token yields output, and the same tokens against
//! the same index always yield the same queue.
//!
//! # Example
//! ```
//! use sign_lexicon::DictionaryIndex;
//! use sign_segment::MatchEngine;
//! use sign_types::{MatchMode, QueueItem};
//!
//! let engine = MatchEngine::new(DictionaryIndex::empty());
//! let queue = engine.segment_text("Hi", MatchMode::Dictionary);
//! assert_eq!(queue.len(), 3);
//! assert_eq!(queue[2], QueueItem::pause(120));
//! ```

use std::sync::Arc;

use sign_lexicon::DictionaryIndex;
use sign_types::{
    FINGERSPELL_PAUSE_MS, MatchMode, PATH_LETTERS, PATH_WORDS, PHRASE_PAUSE_MS, QueueItem,
    SPACE_KEY, WORD_PAUSE_MS, clip_file_for_key, tokenize,
};

/// Owns the current dictionary index and turns tokens into queues.
#[derive(Clone, Debug)]
pub struct MatchEngine {
    index: Arc<DictionaryIndex>,
}

impl Default for MatchEngine {
    fn default() -> Self {
        Self::new(DictionaryIndex::empty())
    }
}

impl MatchEngine {
    pub fn new(index: DictionaryIndex) -> Self {
        Self {
            index: Arc::new(index),
        }
    }

    pub fn with_shared(index: Arc<DictionaryIndex>) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &DictionaryIndex {
        &self.index
    }

    pub fn replace_index(&mut self, index: Arc<DictionaryIndex>) {
        self.index = index;
    }

    /// Normalize, tokenize and segment raw text.
    pub fn segment_text(&self, text: &str, mode: MatchMode) -> Vec<QueueItem> {
        self.segment(&tokenize(text), mode)
    }

    pub fn segment(&self, tokens: &[String], mode: MatchMode) -> Vec<QueueItem> {
        let mut queue = Vec::with_capacity(tokens.len() * 4);
        match mode {
            MatchMode::LettersOnly => {
                for token in tokens {
                    fingerspell(token, &mut queue);
                }
            }
            MatchMode::Dictionary => self.greedy_scan(tokens, &mut queue),
        }
        queue
    }

    fn greedy_scan(&self, tokens: &[String], queue: &mut Vec<QueueItem>) {
        let mut i = 0;
        while i < tokens.len() {
            let phrase = self
                .index
                .phrase_entries()
                .iter()
                .filter(|p| p.token_count() > 1)
                .find(|p| p.matches_at(tokens, i));
            if let Some(phrase) = phrase {
                queue.push(word_item(&phrase.tokens.join(" "), Some(&phrase.file)));
                queue.push(QueueItem::pause(PHRASE_PAUSE_MS));
                i += phrase.token_count();
                continue;
            }

            let token = &tokens[i];
            if let Some(file) = self.index.word_file(token) {
                queue.push(word_item(token, Some(file)));
                queue.push(QueueItem::pause(WORD_PAUSE_MS));
            } else {
                fingerspell(token, queue);
            }
            i += 1;
        }
    }
}

/// A word clip; without an explicit file the name is derived from `key`.
pub fn word_item(key: &str, file: Option<&str>) -> QueueItem {
    let file = match file.filter(|f| !f.is_empty()) {
        Some(file) => file.to_string(),
        None => clip_file_for_key(key),
    };
    QueueItem::Word {
        key: key.to_string(),
        src: format!("{PATH_WORDS}{file}"),
    }
}

pub fn letter_item(ch: char) -> QueueItem {
    QueueItem::Letter {
        key: ch.to_string(),
        src: format!("{PATH_LETTERS}{ch}.mp4"),
    }
}

fn space_item() -> QueueItem {
    QueueItem::Word {
        key: SPACE_KEY.to_string(),
        src: format!("{PATH_LETTERS}{SPACE_KEY}.mp4"),
    }
}

/// Append one clip per letter of `token`, then a 120 ms pause.
///
/// Spaces use the `SPACE` clip; any other non-letter is skipped.
pub fn fingerspell(token: &str, queue: &mut Vec<QueueItem>) {
    for ch in token.chars() {
        match ch {
            'A'..='Z' => queue.push(letter_item(ch)),
            ' ' => queue.push(space_item()),
            _ => {}
        }
    }
    queue.push(QueueItem::pause(FINGERSPELL_PAUSE_MS));
}
