use crate::builder::canonical_feature_name;
use crate::synonyms::SynonymTable;
use crate::tokenizer::Normalizer;
use crate::{DocKey, Field, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Union of the documents matched by each token.
    #[default]
    Any,
    /// Only documents matched by every token.
    All,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessedQuery {
    /// Normalized query tokens before expansion, in query order.
    pub base: Vec<String>,
    /// Base tokens plus one level of synonyms, ordered lexicographically.
    pub expanded: BTreeSet<String>,
    pub candidates: BTreeSet<DocKey>,
}

/// One level of synonym expansion: synonyms of synonyms are not followed.
pub fn expand_query(base: &[String], synonyms: &SynonymTable) -> BTreeSet<String> {
    let mut expanded: BTreeSet<String> = base.iter().cloned().collect();
    for token in base {
        if let Some(equivalents) = synonyms.get(token) {
            expanded.extend(equivalents.iter().cloned());
        }
    }
    expanded
}

/// Documents containing `token` in any of `fields`.
fn token_docs(index: &IndexSet, token: &str, fields: &[Field]) -> BTreeSet<DocKey> {
    let mut docs = BTreeSet::new();
    for &field in fields {
        if let Some(keys) = index.term_docs(field, token) {
            docs.extend(keys.iter().cloned());
        }
    }
    docs
}

pub fn filter_candidates(
    index: &IndexSet,
    tokens: &BTreeSet<String>,
    fields: &[Field],
    mode: MatchMode,
) -> BTreeSet<DocKey> {
    match mode {
        MatchMode::Any => tokens.iter().flat_map(|t| token_docs(index, t, fields)).collect(),
        MatchMode::All => {
            let mut sets = tokens.iter().map(|t| token_docs(index, t, fields));
            let Some(first) = sets.next() else { return BTreeSet::new() };
            sets.fold(first, |acc, docs| acc.intersection(&docs).cloned().collect())
        }
    }
}

/// Keep only candidates whose feature values match every filter. Feature
/// names are matched by canonical spelling. A filter on an unknown feature
/// or value matches nothing.
pub fn apply_feature_filters(
    index: &IndexSet,
    candidates: BTreeSet<DocKey>,
    filters: &BTreeMap<String, String>,
) -> BTreeSet<DocKey> {
    filters.iter().fold(candidates, |acc, (feature, value)| {
        match index.feature_docs(&canonical_feature_name(feature), value) {
            Some(keys) => acc.intersection(keys).cloned().collect(),
            None => BTreeSet::new(),
        }
    })
}

pub struct QueryProcessor<'a> {
    normalizer: &'a Normalizer,
    synonyms: &'a SynonymTable,
}

impl<'a> QueryProcessor<'a> {
    pub fn new(normalizer: &'a Normalizer, synonyms: &'a SynonymTable) -> Self {
        Self { normalizer, synonyms }
    }

    pub fn process(&self, index: &IndexSet, query: &str, fields: &[Field], mode: MatchMode) -> ProcessedQuery {
        let base = self.normalizer.normalize(query);
        let expanded = expand_query(&base, self.synonyms);
        let candidates = filter_candidates(index, &expanded, fields, mode);
        tracing::debug!(query, base = base.len(), expanded = expanded.len(), candidates = candidates.len(), "processed query");
        ProcessedQuery { base, expanded, candidates }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_index_set;
    use crate::tokenizer::default_normalizer;
    use crate::{Corpus, Document};

    fn corpus() -> Corpus {
        let docs = [
            ("/p/1", "Red Shoes", "comfortable red shoes", "red"),
            ("/p/2", "Blue Shoes", "blue shoes for running", "blue"),
            ("/p/3", "Trainer", "lightweight", ""),
        ];
        Corpus::from_documents(docs.iter().map(|(k, t, d, color)| {
            let mut doc = Document { key: Some(k.to_string()), title: t.to_string(), description: d.to_string(), ..Default::default() };
            doc.features.insert("color".into(), color.to_string());
            doc
        }))
    }

    fn tokens(words: &[&str]) -> BTreeSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn keys(set: &BTreeSet<DocKey>) -> Vec<&str> {
        set.iter().map(String::as_str).collect()
    }

    #[test]
    fn expansion_is_one_level() {
        let mut raw = BTreeMap::new();
        raw.insert("sneaker".to_string(), vec!["trainer".to_string()]);
        raw.insert("trainer".to_string(), vec!["coach".to_string()]);
        let table = SynonymTable::from_raw(raw, default_normalizer());
        let expanded = expand_query(&["sneaker".to_string()], &table);
        assert_eq!(expanded, tokens(&["sneaker", "trainer"]));
    }

    #[test]
    fn duplicates_collapse() {
        let expanded = expand_query(&["shoe".to_string(), "shoe".to_string(), "red".to_string()], &SynonymTable::new());
        assert_eq!(expanded.into_iter().collect::<Vec<_>>(), vec!["red", "shoe"]);
    }

    #[test]
    fn any_mode_unions_fields_and_tokens() {
        let index = build_index_set(&corpus());
        let found = filter_candidates(&index, &tokens(&["red", "run"]), &[Field::Title, Field::Description], MatchMode::Any);
        assert_eq!(keys(&found), vec!["/p/1", "/p/2"]);
        let title_only = filter_candidates(&index, &tokens(&["run"]), &[Field::Title], MatchMode::Any);
        assert!(title_only.is_empty());
    }

    #[test]
    fn all_mode_intersects() {
        let index = build_index_set(&corpus());
        let fields = [Field::Title, Field::Description];
        let found = filter_candidates(&index, &tokens(&["shoe", "blue"]), &fields, MatchMode::All);
        assert_eq!(keys(&found), vec!["/p/2"]);
        let absent = filter_candidates(&index, &tokens(&["shoe", "velvet"]), &fields, MatchMode::All);
        assert!(absent.is_empty());
    }

    #[test]
    fn empty_token_set_matches_nothing() {
        let index = build_index_set(&corpus());
        let fields = [Field::Title, Field::Description];
        assert!(filter_candidates(&index, &BTreeSet::new(), &fields, MatchMode::Any).is_empty());
        assert!(filter_candidates(&index, &BTreeSet::new(), &fields, MatchMode::All).is_empty());
    }

    #[test]
    fn feature_filters_narrow_candidates() {
        let index = build_index_set(&corpus());
        let all: BTreeSet<DocKey> = ["/p/1", "/p/2", "/p/3"].iter().map(|k| k.to_string()).collect();
        let mut filters = BTreeMap::new();
        filters.insert("color".to_string(), "blue".to_string());
        assert_eq!(keys(&apply_feature_filters(&index, all.clone(), &filters)), vec!["/p/2"]);
        filters.insert("material".to_string(), "suede".to_string());
        assert!(apply_feature_filters(&index, all, &filters).is_empty());
    }

    #[test]
    fn feature_filter_names_are_canonicalized() {
        let index = build_index_set(&corpus());
        let all: BTreeSet<DocKey> = ["/p/1", "/p/2", "/p/3"].iter().map(|k| k.to_string()).collect();
        let mut filters = BTreeMap::new();
        filters.insert(" Color ".to_string(), "red".to_string());
        assert_eq!(keys(&apply_feature_filters(&index, all, &filters)), vec!["/p/1"]);
    }

    #[test]
    fn synonym_brings_in_trainer() {
        let index = build_index_set(&corpus());
        let mut raw = BTreeMap::new();
        raw.insert("sneaker".to_string(), vec!["trainer".to_string()]);
        let table = SynonymTable::from_raw(raw, default_normalizer());
        let processed = QueryProcessor::new(default_normalizer(), &table).process(
            &index,
            "sneaker",
            &[Field::Title, Field::Description],
            MatchMode::Any,
        );
        assert_eq!(keys(&processed.candidates), vec!["/p/3"]);
    }
}
