//! Domain-curated synonym table used for query expansion.

use crate::error::{Result, SearchError};
use crate::tokenizer::{default_normalizer, Normalizer};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// token -> equivalent tokens, both sides in normalized form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SynonymTable {
    entries: BTreeMap<String, BTreeSet<String>>,
}

impl SynonymTable {
    pub fn new() -> Self { Self::default() }

    /// Build from the raw artifact shape, normalizing keys and values so they
    /// line up with normalized query tokens. A key that does not normalize to
    /// exactly one token (a stopword, a phrase) cannot match a query token and
    /// is dropped.
    pub fn from_raw(raw: BTreeMap<String, Vec<String>>, normalizer: &Normalizer) -> Self {
        let mut entries: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (key, values) in raw {
            let mut key_tokens = normalizer.normalize(&key);
            if key_tokens.len() != 1 {
                tracing::warn!(key = %key, tokens = key_tokens.len(), "skipping synonym entry");
                continue;
            }
            let key_token = key_tokens.remove(0);
            let targets = entries.entry(key_token.clone()).or_default();
            for value in values {
                targets.extend(normalizer.normalize(&value).into_iter().filter(|t| *t != key_token));
            }
        }
        Self { entries }
    }

    /// Read a `mapping<string, sequence<string>>` JSON artifact.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let raw: BTreeMap<String, Vec<String>> =
            serde_json::from_str(&text).map_err(|e| SearchError::CorruptArtifact {
                name: "synonyms".into(),
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        let table = Self::from_raw(raw, default_normalizer());
        tracing::info!(entries = table.len(), path = %path.display(), "loaded synonym table");
        Ok(table)
    }

    pub fn get(&self, token: &str) -> Option<&BTreeSet<String>> { self.entries.get(token) }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}
