//! Field-weighted BM25.
//!
//! For every expanded token `t` and candidate `d`:
//!
//! ```text
//! idf(t)   = ln((N - df + 0.5) / (df + 0.5) + 1)
//! tf(t, d) = sum over fields of count(t, field, d) * weight(field)
//! score    = idf * tf * (k1 + 1) / (tf + k1 * (1 - b + b * len(d) / avglen))
//! ```
//!
//! `df(t)` is the number of distinct documents containing `t` in any weighted
//! field. It is computed once per token before any document is scored, so the
//! result does not depend on token or document order.

use crate::error::{Result, SearchError};
use crate::{DocKey, Field, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub const DEFAULT_K1: f64 = 1.5;
pub const DEFAULT_B: f64 = 0.75;

fn default_k1() -> f64 { DEFAULT_K1 }
fn default_b() -> f64 { DEFAULT_B }

pub fn default_field_weights() -> BTreeMap<Field, f64> {
    BTreeMap::from([(Field::Title, 5.0), (Field::Description, 3.0), (Field::Brand, 2.0), (Field::Origin, 1.0)])
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScorerConfig {
    #[serde(default = "default_k1")]
    pub k1: f64,
    #[serde(default = "default_b")]
    pub b: f64,
    #[serde(default = "default_field_weights")]
    pub field_weights: BTreeMap<Field, f64>,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self { k1: DEFAULT_K1, b: DEFAULT_B, field_weights: default_field_weights() }
    }
}

impl ScorerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.k1.is_finite() && self.k1 > 0.0) {
            return Err(SearchError::InvalidConfig(format!("k1 must be > 0, got {}", self.k1)));
        }
        if !(0.0..=1.0).contains(&self.b) {
            return Err(SearchError::InvalidConfig(format!("b must be within [0, 1], got {}", self.b)));
        }
        for (field, weight) in &self.field_weights {
            if !(weight.is_finite() && *weight >= 0.0) {
                return Err(SearchError::InvalidConfig(format!("weight for {field} must be >= 0, got {weight}")));
            }
        }
        Ok(())
    }
}

/// A validated scorer. Construction is the only place parameters are checked.
#[derive(Debug, Clone)]
pub struct Bm25Scorer {
    config: ScorerConfig,
}

impl Bm25Scorer {
    pub fn new(config: ScorerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ScorerConfig { &self.config }

    fn weighted_fields(&self) -> impl Iterator<Item = (Field, f64)> + '_ {
        self.config.field_weights.iter().map(|(&f, &w)| (f, w))
    }

    /// Distinct documents containing `token` in any weighted field.
    pub fn document_frequency(&self, index: &IndexSet, token: &str) -> usize {
        let mut docs: BTreeSet<&DocKey> = BTreeSet::new();
        for (field, _) in self.weighted_fields() {
            if let Some(keys) = index.term_docs(field, token) {
                docs.extend(keys.iter());
            }
        }
        docs.len()
    }

    pub fn idf(&self, num_docs: u32, df: usize) -> f64 {
        let n = num_docs as f64;
        let df = df as f64;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// Field-weighted occurrence count of `token` in document `key`.
    pub fn term_frequency(&self, index: &IndexSet, token: &str, key: &str) -> f64 {
        self.weighted_fields()
            .map(|(field, weight)| index.term_count(field, token, key) as f64 * weight)
            .sum()
    }

    /// One term's contribution. Non-decreasing in `tf`, saturating towards
    /// `idf * (k1 + 1)`. A zero tf short-circuits so that b = 1 with an
    /// empty document never reaches a 0 / 0.
    pub fn term_score(&self, idf: f64, tf: f64, doc_len: f64, avg_doc_len: f64) -> f64 {
        let k1 = self.config.k1;
        let b = self.config.b;
        if tf <= 0.0 {
            return 0.0;
        }
        idf * (tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * (doc_len / avg_doc_len)))
    }

    /// Score every candidate against the expanded tokens.
    pub fn score_all<'k, I>(&self, index: &IndexSet, tokens: &BTreeSet<String>, candidates: I) -> HashMap<DocKey, f64>
    where
        I: IntoIterator<Item = &'k DocKey>,
    {
        let idfs: Vec<(&str, f64)> = tokens
            .iter()
            .map(|t| (t.as_str(), self.idf(index.num_docs, self.document_frequency(index, t))))
            .collect();
        let avg_doc_len = index.avg_doc_length();

        candidates
            .into_iter()
            .map(|key| {
                let doc_len = index.doc_length(key);
                let score = idfs
                    .iter()
                    .map(|&(token, idf)| {
                        let tf = self.term_frequency(index, token, key);
                        self.term_score(idf, tf, doc_len, avg_doc_len)
                    })
                    .sum();
                (key.clone(), score)
            })
            .collect()
    }
}
