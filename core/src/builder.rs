//! Batch construction of an [`IndexSet`] from a [`Corpus`] snapshot.
//!
//! Each builder reads the corpus only and returns its own structure, so the
//! per-field and per-feature builds in [`IndexBuilder::build`] run on the
//! rayon pool with nothing shared but the corpus itself.

use crate::tokenizer::{default_normalizer, Normalizer};
use crate::{
    Corpus, DocMeta, DocumentLengthTable, FeatureIndex, Field, FieldIndex, IndexSet, PositionalIndex,
    ReviewAggregate, ReviewIndex,
};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub struct IndexBuilder<'a> {
    normalizer: &'a Normalizer,
}

impl Default for IndexBuilder<'static> {
    fn default() -> Self { Self::new(default_normalizer()) }
}

impl<'a> IndexBuilder<'a> {
    pub fn new(normalizer: &'a Normalizer) -> Self { Self { normalizer } }

    pub fn field_index(&self, corpus: &Corpus, field: Field) -> FieldIndex {
        let mut index = FieldIndex::new();
        for (key, doc) in corpus.iter() {
            for token in self.normalizer.normalize(doc.field_text(field)) {
                index.entry(token).or_default().insert(key.clone());
            }
        }
        index
    }

    pub fn positional_index(&self, corpus: &Corpus, field: Field) -> PositionalIndex {
        let mut index = PositionalIndex::new();
        for (key, doc) in corpus.iter() {
            for (pos, token) in self.normalizer.normalize(doc.field_text(field)).into_iter().enumerate() {
                index.entry(token).or_default().entry(key.clone()).or_default().push(pos as u32);
            }
        }
        index
    }

    pub fn document_lengths(&self, corpus: &Corpus) -> DocumentLengthTable {
        corpus
            .iter()
            .map(|(key, doc)| {
                let len = self.normalizer.normalize(&doc.title).len()
                    + self.normalizer.normalize(&doc.description).len();
                (key.clone(), len as u32)
            })
            .collect()
    }

    /// Build every index for the snapshot in parallel and join the results.
    pub fn build(&self, corpus: &Corpus) -> IndexSet {
        let (per_field, (features, (reviews, (doc_lengths, docs)))) = rayon::join(
            || {
                Field::ALL
                    .par_iter()
                    .map(|&field| (field, self.field_index(corpus, field), self.positional_index(corpus, field)))
                    .collect::<Vec<_>>()
            },
            || {
                rayon::join(
                    || {
                        feature_names(corpus)
                            .into_par_iter()
                            .map(|name| {
                                let index = build_feature_index(corpus, &name);
                                (name, index)
                            })
                            .collect::<BTreeMap<_, _>>()
                    },
                    || {
                        rayon::join(
                            || build_review_index(corpus),
                            || rayon::join(|| self.document_lengths(corpus), || doc_table(corpus)),
                        )
                    },
                )
            },
        );

        let mut set = IndexSet {
            reviews,
            features,
            doc_lengths,
            docs,
            num_docs: corpus.len() as u32,
            ..IndexSet::default()
        };
        for (field, index, positions) in per_field {
            set.fields.insert(field, index);
            set.positions.insert(field, positions);
        }
        tracing::info!(
            num_docs = set.num_docs,
            title_terms = set.fields.get(&Field::Title).map_or(0, |i| i.len()),
            description_terms = set.fields.get(&Field::Description).map_or(0, |i| i.len()),
            features = set.features.len(),
            reviewed = set.reviews.len(),
            "index set built"
        );
        set
    }
}

pub fn build_field_index(corpus: &Corpus, field: Field) -> FieldIndex {
    IndexBuilder::default().field_index(corpus, field)
}

pub fn build_positional_index(corpus: &Corpus, field: Field) -> PositionalIndex {
    IndexBuilder::default().positional_index(corpus, field)
}

pub fn build_document_length_table(corpus: &Corpus) -> DocumentLengthTable {
    IndexBuilder::default().document_lengths(corpus)
}

pub fn build_index_set(corpus: &Corpus) -> IndexSet {
    IndexBuilder::default().build(corpus)
}

/// Aggregates for reviewed documents; unreviewed ones get no entry.
pub fn build_review_index(corpus: &Corpus) -> ReviewIndex {
    corpus
        .iter()
        .filter_map(|(key, doc)| {
            let last = doc.reviews.last()?;
            let total: f64 = doc.reviews.iter().map(|r| r.rating).sum();
            let aggregate = ReviewAggregate {
                total_reviews: doc.reviews.len() as u32,
                average_rating: total / doc.reviews.len() as f64,
                last_rating: last.rating,
            };
            Some((key.clone(), aggregate))
        })
        .collect()
}

/// Crawled feature names that mean the same thing. Keys and values are
/// already in canonical spelling (see [`canonical_feature_name`]).
const FEATURE_ALIASES: &[(&str, &str)] = &[
    ("flavor", "flavors"),
    ("size", "sizes"),
    ("care_instruction", "care_instructions"),
];

/// Lowercase, trim, join words with `_`, then map known aliases, so that
/// "Flavor", "flavors" and "Care Instructions" land on one feature index.
pub fn canonical_feature_name(name: &str) -> String {
    let joined = name
        .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_");
    match FEATURE_ALIASES.iter().find(|(alias, _)| *alias == joined) {
        Some((_, canonical)) => canonical.to_string(),
        None => joined,
    }
}

/// value -> documents whose `feature` equals it, matching feature names by
/// their canonical spelling. Empty values are left out.
pub fn build_feature_index(corpus: &Corpus, feature: &str) -> FeatureIndex {
    let wanted = canonical_feature_name(feature);
    let mut index = FeatureIndex::new();
    for (key, doc) in corpus.iter() {
        let values = doc
            .features
            .iter()
            .filter(|(name, _)| canonical_feature_name(name) == wanted)
            .map(|(_, value)| value);
        for value in values {
            if value.trim().is_empty() {
                continue;
            }
            index.entry(value.clone()).or_default().insert(key.clone());
        }
    }
    index
}

/// Every distinct canonical feature name observed across the corpus.
pub fn feature_names(corpus: &Corpus) -> BTreeSet<String> {
    corpus
        .iter()
        .flat_map(|(_, doc)| doc.features.keys().map(|name| canonical_feature_name(name)))
        .filter(|name| !name.is_empty())
        .collect()
}

fn doc_table(corpus: &Corpus) -> HashMap<String, DocMeta> {
    corpus
        .iter()
        .map(|(key, doc)| {
            let url = doc.link().unwrap_or(key).to_string();
            let meta = DocMeta { title: doc.title.clone(), url, description: doc.description.clone() };
            (key.clone(), meta)
        })
        .collect()
}
