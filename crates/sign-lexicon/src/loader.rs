//! Read the dictionary artifact from disk.
//!
//! Parsing is lenient per entry: a phrase or word that does not fit the
//! expected shape is skipped, the rest of the artifact is kept. Only an
//! unreadable file or invalid JSON is reported as an error.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use sign_types::{Dictionary, PhraseEntry, WordEntry};
use tracing::{debug, info};

/// Load and parse the dictionary at `path`.
pub fn load_dictionary(path: impl AsRef<Path>) -> Result<Dictionary> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read dictionary {}", path.display()))?;
    let dict = parse_dictionary_str(&raw)
        .with_context(|| format!("failed to parse dictionary {}", path.display()))?;
    info!(
        "loaded dictionary {} ({} phrases, {} words)",
        path.display(),
        dict.phrases.len(),
        dict.words.len()
    );
    Ok(dict)
}

pub fn parse_dictionary_str(raw: &str) -> Result<Dictionary> {
    let value: Value = serde_json::from_str(raw).context("dictionary is not valid JSON")?;
    Ok(parse_dictionary(&value))
}

/// Extract whatever is usable from an arbitrary JSON value.
pub fn parse_dictionary(value: &Value) -> Dictionary {
    let mut dict = Dictionary::default();

    if let Some(phrases) = value.get("phrases").and_then(Value::as_array) {
        for raw in phrases {
            match phrase_from_value(raw) {
                Some(entry) => dict.phrases.push(entry),
                None => debug!("skipping malformed phrase entry: {raw}"),
            }
        }
    }

    if let Some(words) = value.get("words").and_then(Value::as_object) {
        for (key, raw) in words {
            match serde_json::from_value::<WordEntry>(raw.clone()) {
                Ok(entry) => {
                    dict.words.insert(key.clone(), entry);
                }
                Err(_) => debug!("skipping malformed word entry {key:?}: {raw}"),
            }
        }
    }

    dict
}

// A phrase needs a string key; `file` and `weight` are optional here and the
// index decides what is usable.
fn phrase_from_value(raw: &Value) -> Option<PhraseEntry> {
    let obj = raw.as_object()?;
    let key = obj.get("key")?.as_str()?.to_string();
    let file = obj.get("file").and_then(Value::as_str).map(str::to_string);
    let weight = obj.get("weight").and_then(Value::as_f64);
    Some(PhraseEntry { key, file, weight })
}
