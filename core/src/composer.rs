use crate::error::{Result, SearchError};
use crate::tokenizer::Normalizer;
use crate::{DocKey, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

fn default_alpha() -> f64 { 1.0 }
fn default_beta() -> f64 { 0.5 }
fn default_gamma() -> f64 { 1.5 }

/// finalScore = alpha * bm25 + beta * reviewBonus + gamma * exactTitleBonus
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComposerWeights {
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default = "default_beta")]
    pub beta: f64,
    #[serde(default = "default_gamma")]
    pub gamma: f64,
}

impl Default for ComposerWeights {
    fn default() -> Self {
        Self { alpha: default_alpha(), beta: default_beta(), gamma: default_gamma() }
    }
}

impl ComposerWeights {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("alpha", self.alpha), ("beta", self.beta), ("gamma", self.gamma)] {
            if !value.is_finite() {
                return Err(SearchError::InvalidConfig(format!("{name} must be finite, got {value}")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedDoc {
    pub key: DocKey,
    pub bm25: f64,
    pub score: f64,
}

/// Average rating scaled to [0, 1] for a 5-point scale; 0 without reviews.
pub fn review_bonus(index: &IndexSet, key: &str) -> f64 {
    index.review(key).map_or(0.0, |agg| agg.average_rating / 5.0)
}

/// 1 when the title's token set is non-empty and equals the expanded query.
pub fn exact_title_bonus(index: &IndexSet, normalizer: &Normalizer, key: &str, expanded: &BTreeSet<String>) -> f64 {
    let Some(meta) = index.doc(key) else { return 0.0 };
    let title: BTreeSet<String> = normalizer.normalize(&meta.title).into_iter().collect();
    if !title.is_empty() && title == *expanded {
        1.0
    } else {
        0.0
    }
}

/// Combine BM25 with the bonus signals and rank: score descending, then key
/// ascending.
pub fn compose(
    index: &IndexSet,
    normalizer: &Normalizer,
    expanded: &BTreeSet<String>,
    bm25: HashMap<DocKey, f64>,
    weights: &ComposerWeights,
) -> Vec<RankedDoc> {
    let mut ranked: Vec<RankedDoc> = bm25
        .into_iter()
        .map(|(key, bm25)| {
            let score = weights.alpha * bm25
                + weights.beta * review_bonus(index, &key)
                + weights.gamma * exact_title_bonus(index, normalizer, &key, expanded);
            RankedDoc { key, bm25, score }
        })
        .collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.key.cmp(&b.key)));
    ranked
}
