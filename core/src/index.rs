use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

pub type DocKey = String;

/// token -> keys of documents whose field contains the token.
pub type FieldIndex = BTreeMap<String, BTreeSet<DocKey>>;
/// token -> key -> zero-based token positions within the field.
pub type PositionalIndex = BTreeMap<String, BTreeMap<DocKey, Vec<u32>>>;
/// feature value -> keys of documents carrying that value.
pub type FeatureIndex = BTreeMap<String, BTreeSet<DocKey>>;
pub type ReviewIndex = BTreeMap<DocKey, ReviewAggregate>;
/// key -> normalized token count of title + description.
pub type DocumentLengthTable = BTreeMap<DocKey, u32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Title,
    Description,
    Brand,
    Origin,
}

impl Field {
    pub const ALL: [Field; 4] = [Field::Title, Field::Description, Field::Brand, Field::Origin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Description => "description",
            Field::Brand => "brand",
            Field::Origin => "origin",
        }
    }

    /// Title and description are the core fields; an index set without them
    /// must not be served.
    pub fn is_primary(&self) -> bool { matches!(self, Field::Title | Field::Description) }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown field '{s}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewAggregate {
    pub total_reviews: u32,
    pub average_rating: f64,
    pub last_rating: f64,
}

/// What a search hit needs to show, looked up directly by key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocMeta {
    pub title: String,
    pub url: String,
    pub description: String,
}

/// Immutable bundle of every index built from one corpus snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexSet {
    pub fields: BTreeMap<Field, FieldIndex>,
    pub positions: BTreeMap<Field, PositionalIndex>,
    pub reviews: ReviewIndex,
    pub features: BTreeMap<String, FeatureIndex>,
    pub doc_lengths: DocumentLengthTable,
    pub docs: HashMap<DocKey, DocMeta>,
    pub num_docs: u32,
}

impl IndexSet {
    pub fn new() -> Self { Self::default() }

    pub fn term_docs(&self, field: Field, token: &str) -> Option<&BTreeSet<DocKey>> {
        self.fields.get(&field).and_then(|idx| idx.get(token))
    }

    /// Raw occurrence count of `token` in `field` of document `key`.
    pub fn term_count(&self, field: Field, token: &str, key: &str) -> u32 {
        self.positions
            .get(&field)
            .and_then(|idx| idx.get(token))
            .and_then(|docs| docs.get(key))
            .map_or(0, |positions| positions.len() as u32)
    }

    /// Length from the length table, 1 when the document has no entry.
    pub fn doc_length(&self, key: &str) -> f64 {
        self.doc_lengths.get(key).map_or(1.0, |&len| len as f64)
    }

    /// Mean document length, 1 when the table is empty or all lengths are 0.
    pub fn avg_doc_length(&self) -> f64 {
        let total: u64 = self.doc_lengths.values().map(|&len| len as u64).sum();
        if total == 0 {
            return 1.0;
        }
        total as f64 / self.doc_lengths.len() as f64
    }

    pub fn review(&self, key: &str) -> Option<&ReviewAggregate> { self.reviews.get(key) }

    pub fn feature_docs(&self, feature: &str, value: &str) -> Option<&BTreeSet<DocKey>> {
        self.features.get(feature).and_then(|idx| idx.get(value))
    }

    pub fn doc(&self, key: &str) -> Option<&DocMeta> { self.docs.get(key) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lengths_default_to_one() {
        let mut set = IndexSet::new();
        assert_eq!(set.avg_doc_length(), 1.0);
        assert_eq!(set.doc_length("/missing"), 1.0);
        set.doc_lengths.insert("/empty".into(), 0);
        assert_eq!(set.avg_doc_length(), 1.0);
    }

    #[test]
    fn average_length_over_table() {
        let mut set = IndexSet::new();
        set.doc_lengths.insert("/a".into(), 2);
        set.doc_lengths.insert("/b".into(), 6);
        assert_eq!(set.avg_doc_length(), 4.0);
        assert_eq!(set.doc_length("/b"), 6.0);
    }

    #[test]
    fn field_parses_case_insensitively() {
        assert_eq!("Title".parse::<Field>(), Ok(Field::Title));
        assert!("price".parse::<Field>().is_err());
    }
}
