//! Shared types for turning text into a queue of sign-language clips.
//!
//! The dictionary artifact ([`Dictionary`], [`PhraseEntry`], [`WordEntry`])
//! mirrors the JSON shape served alongside the clip assets. The queue side
//! ([`QueueItem`]) is what the matcher produces and the player consumes.
//! [`normalize`] and [`tokenize`] define what a token is for both sides.
//!
//! ```rust
//! use sign_types::{QueueItem, tokenize};
//!
//! assert_eq!(tokenize("Good morning!"), vec!["GOOD", "MORNING"]);
//! let item = QueueItem::pause(120);
//! assert_eq!(item.label(), "PAUSE_120ms");
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Directory prefix for word and phrase clips.
pub const PATH_WORDS: &str = "./assets/asl/words/";
/// Directory prefix for fingerspelling clips.
pub const PATH_LETTERS: &str = "./assets/asl/letters/";
/// Extension used by every clip asset.
pub const CLIP_EXT: &str = ".mp4";

/// Gap after a fingerspelled token.
pub const FINGERSPELL_PAUSE_MS: u64 = 120;
/// Gap after a single dictionary word.
pub const WORD_PAUSE_MS: u64 = 140;
/// Gap after a multi-token phrase.
pub const PHRASE_PAUSE_MS: u64 = 160;

/// Key of the clip used for a literal space while fingerspelling.
pub const SPACE_KEY: &str = "SPACE";

/// Dictionary artifact: multi-token phrases plus single-token words.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Dictionary {
    #[serde(default)]
    pub phrases: Vec<PhraseEntry>,
    #[serde(default)]
    pub words: BTreeMap<String, WordEntry>,
}

/// A phrase mapping such as `GOOD MORNING -> GOOD_MORNING.mp4`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PhraseEntry {
    #[serde(default)]
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Reserved; matching ignores it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

/// A word value is either a bare filename or an object with a `file` field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WordEntry {
    File(String),
    Object {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file: Option<String>,
    },
}

/// How text is turned into clips.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Greedy phrase, then word, then fingerspelling.
    #[default]
    Dictionary,
    /// Fingerspell every token, ignoring the dictionary.
    LettersOnly,
}

impl MatchMode {
    /// Parse the wire name used by the command surface.
    pub fn from_name(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "dictionary" | "dict" => Some(MatchMode::Dictionary),
            "letters_only" | "letters-only" | "letters" => Some(MatchMode::LettersOnly),
            _ => None,
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MatchMode::Dictionary => "dictionary",
            MatchMode::LettersOnly => "letters_only",
        })
    }
}

/// One playable or timed unit of the playback queue.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueItem {
    /// A matched phrase or dictionary word (also the `SPACE` clip).
    Word { key: String, src: String },
    /// A single fingerspelled character.
    Letter { key: String, src: String },
    /// A timed gap with no media.
    Pause { duration_ms: u64 },
}

impl QueueItem {
    pub fn pause(duration_ms: u64) -> Self {
        QueueItem::Pause { duration_ms }
    }

    /// Display label: the key for clips, `PAUSE_<ms>ms` for gaps.
    pub fn label(&self) -> String {
        match self {
            QueueItem::Word { key, .. } | QueueItem::Letter { key, .. } => key.clone(),
            QueueItem::Pause { duration_ms } => format!("PAUSE_{duration_ms}ms"),
        }
    }

    /// Media source for clip items.
    pub fn src(&self) -> Option<&str> {
        match self {
            QueueItem::Word { src, .. } | QueueItem::Letter { src, .. } => Some(src),
            QueueItem::Pause { .. } => None,
        }
    }

    pub fn is_pause(&self) -> bool {
        matches!(self, QueueItem::Pause { .. })
    }
}

/// Uppercase, collapse every run outside `[A-Z0-9]` into one space, trim.
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;
    for c in raw.chars().flat_map(char::to_uppercase) {
        if c.is_ascii_uppercase() || c.is_ascii_digit() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        } else {
            pending_space = true;
        }
    }
    out
}

/// Clip filename for a key the dictionary gives no explicit file for.
///
/// `GOOD MORNING` becomes `GOOD_MORNING.mp4`. No existence check happens here.
pub fn clip_file_for_key(key: &str) -> String {
    let joined = key.split_whitespace().collect::<Vec<_>>().join("_");
    format!("{joined}{CLIP_EXT}")
}

/// Split normalized text into tokens; blank input yields no tokens.
pub fn tokenize(raw: &str) -> Vec<String> {
    let normalized = normalize(raw);
    if normalized.is_empty() {
        return Vec::new();
    }
    normalized.split(' ').map(str::to_string).collect()
}
