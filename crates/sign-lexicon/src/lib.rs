//! Dictionary index for greedy longest-match segmentation.
//!
//! [`DictionaryIndex::build`] turns a [`Dictionary`] artifact into the two
//! lookup structures the matcher needs:
//! - phrase entries, tokenized with [`sign_types::tokenize`] and ordered by
//!   token count (descending) then key (ascending), so the first hit while
//!   scanning is always the longest, alphabetically first match;
//! - a word table from a single token to its clip file.
//!
//! Entries with a blank key or no clip file are dropped while building. An
//! empty index is valid and makes every token fall back to fingerspelling.
//!
//! Loading the artifact from disk lives in [`loader`].
//!
//! # Example
//! ```
//! use sign_lexicon::{DictionaryIndex, parse_dictionary_str};
//!
//! # fn main() -> anyhow::Result<()> {
//! let dict = parse_dictionary_str(
//!     r#"{"phrases": [{"key": "GOOD MORNING", "file": "GM.mp4"}], "words": {"HI": "HI.mp4"}}"#,
//! )?;
//! let index = DictionaryIndex::build(&dict);
//! assert_eq!(index.phrase_entries()[0].tokens, vec!["GOOD", "MORNING"]);
//! assert_eq!(index.word_file("HI"), Some("HI.mp4"));
//! # Ok(()) }
//! ```

pub mod loader;

use std::collections::HashMap;
use std::sync::Arc;

use sign_types::{Dictionary, WordEntry, clip_file_for_key, tokenize};
use tracing::{debug, info};

pub use loader::{load_dictionary, parse_dictionary, parse_dictionary_str};

/// A phrase ready for position-wise comparison against a token stream.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PhraseIndexEntry {
    pub key: String,
    pub tokens: Vec<String>,
    pub file: String,
}

impl PhraseIndexEntry {
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Whether `tokens[start..start + token_count]` equals this phrase.
    pub fn matches_at(&self, tokens: &[String], start: usize) -> bool {
        let end = start + self.tokens.len();
        end <= tokens.len() && tokens[start..end] == self.tokens[..]
    }
}

/// Derived lookup structures, rebuilt whenever the dictionary changes.
#[derive(Clone, Debug, Default)]
pub struct DictionaryIndex {
    phrases: Vec<PhraseIndexEntry>,
    words: HashMap<String, String>,
}

impl DictionaryIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn build(dict: &Dictionary) -> Self {
        let mut phrases = Vec::with_capacity(dict.phrases.len());
        for entry in &dict.phrases {
            let tokens = tokenize(&entry.key);
            let file = entry.file.as_deref().map(str::trim).unwrap_or_default();
            if tokens.is_empty() || file.is_empty() {
                debug!("skipping phrase entry {:?}: blank key or missing file", entry.key);
                continue;
            }
            phrases.push(PhraseIndexEntry {
                key: entry.key.clone(),
                tokens,
                file: file.to_string(),
            });
        }
        phrases.sort_by(|a, b| {
            b.token_count()
                .cmp(&a.token_count())
                .then_with(|| a.key.cmp(&b.key))
        });

        let mut words = HashMap::with_capacity(dict.words.len());
        for (key, entry) in &dict.words {
            if key.trim().is_empty() {
                debug!("skipping word entry with blank key");
                continue;
            }
            match resolve_word_file(key, entry) {
                Some(file) => {
                    words.insert(key.clone(), file);
                }
                None => debug!("skipping word entry {key:?}: empty filename"),
            }
        }

        info!(
            "dictionary index built: {} phrases, {} words",
            phrases.len(),
            words.len()
        );
        Self { phrases, words }
    }

    pub fn build_shared(dict: &Dictionary) -> Arc<Self> {
        Arc::new(Self::build(dict))
    }

    /// Phrase entries in matching order.
    pub fn phrase_entries(&self) -> &[PhraseIndexEntry] {
        &self.phrases
    }

    /// Clip file for a single dictionary word.
    pub fn word_file(&self, token: &str) -> Option<&str> {
        self.words.get(token).map(String::as_str)
    }

    pub fn phrase_count(&self) -> usize {
        self.phrases.len()
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty() && self.words.is_empty()
    }
}

// A bare empty filename is treated as absent; an object without `file`
// falls back to the derived `KEY.mp4` name.
fn resolve_word_file(key: &str, entry: &WordEntry) -> Option<String> {
    match entry {
        WordEntry::File(file) => {
            let file = file.trim();
            (!file.is_empty()).then(|| file.to_string())
        }
        WordEntry::Object { file } => match file.as_deref().map(str::trim) {
            Some(file) if !file.is_empty() => Some(file.to_string()),
            _ => Some(clip_file_for_key(key)),
        },
    }
}
