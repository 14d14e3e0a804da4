//! Query-time pipeline: normalize + expand, filter candidates, BM25, compose.

use crate::composer::{compose, ComposerWeights};
use crate::error::Result;
use crate::query::{apply_feature_filters, MatchMode, QueryProcessor};
use crate::scorer::{Bm25Scorer, ScorerConfig};
use crate::synonyms::SynonymTable;
use crate::tokenizer::{default_normalizer, Normalizer};
use crate::{Field, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    pub scorer: ScorerConfig,
    pub weights: ComposerWeights,
    pub match_mode: MatchMode,
    /// Fields consulted when collecting candidates.
    pub fields: Vec<Field>,
    /// feature name -> required value
    pub filters: BTreeMap<String, String>,
    pub limit: Option<usize>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            scorer: ScorerConfig::default(),
            weights: ComposerWeights::default(),
            match_mode: MatchMode::Any,
            fields: vec![Field::Title, Field::Description],
            filters: BTreeMap::new(),
            limit: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub description: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub total_documents: u32,
    pub filtered_documents: usize,
    pub results: Vec<SearchHit>,
}

pub fn search(index: &IndexSet, synonyms: &SynonymTable, query: &str, config: &SearchConfig) -> Result<SearchResponse> {
    search_with(default_normalizer(), index, synonyms, query, config)
}

pub fn search_with(
    normalizer: &Normalizer,
    index: &IndexSet,
    synonyms: &SynonymTable,
    query: &str,
    config: &SearchConfig,
) -> Result<SearchResponse> {
    let scorer = Bm25Scorer::new(config.scorer.clone())?;
    config.weights.validate()?;

    let processed = QueryProcessor::new(normalizer, synonyms).process(index, query, &config.fields, config.match_mode);
    let candidates = apply_feature_filters(index, processed.candidates, &config.filters);
    let filtered_documents = candidates.len();

    let bm25 = scorer.score_all(index, &processed.expanded, candidates.iter());
    let ranked = compose(index, normalizer, &processed.expanded, bm25, &config.weights);

    let limit = config.limit.unwrap_or(usize::MAX);
    let results = ranked
        .into_iter()
        .take(limit)
        .filter_map(|r| {
            let meta = index.doc(&r.key)?;
            Some(SearchHit {
                title: meta.title.clone(),
                url: meta.url.clone(),
                description: meta.description.clone(),
                score: r.score,
            })
        })
        .collect();

    Ok(SearchResponse { total_documents: index.num_docs, filtered_documents, results })
}
