use crate::{DocKey, Field};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Review {
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub text: String,
}

/// One crawled product, as delivered by the corpus feed.
///
/// Accepts the crawler's own field names (`url`, `product_features`,
/// `product_reviews`) as well as the canonical ones. A record may carry both
/// `key` and `url`: the key identifies the document, the url is what results
/// link to. With only a `url`, it serves as both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub origin: String,
    #[serde(default, alias = "product_features")]
    pub features: BTreeMap<String, String>,
    #[serde(default, alias = "product_reviews")]
    pub reviews: Vec<Review>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl Document {
    /// The document key: `key` when present and non-blank, otherwise `url`.
    pub fn id(&self) -> Option<&str> {
        non_blank(&self.key).or_else(|| non_blank(&self.url))
    }

    /// Link shown in results: `url` when present, otherwise the key.
    pub fn link(&self) -> Option<&str> {
        non_blank(&self.url).or_else(|| non_blank(&self.key))
    }

    pub fn field_text(&self, field: Field) -> &str {
        match field {
            Field::Title => &self.title,
            Field::Description => &self.description,
            Field::Brand => &self.brand,
            Field::Origin => &self.origin,
        }
    }
}

/// An immutable corpus snapshot keyed by document key.
///
/// Only keyed documents make it in, so every index built from a `Corpus`
/// refers to keys that exist in it.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    docs: BTreeMap<DocKey, Document>,
    skipped: usize,
}

impl Corpus {
    pub fn from_documents<I: IntoIterator<Item = Document>>(documents: I) -> Self {
        let mut docs = BTreeMap::new();
        let mut skipped = 0usize;
        for (position, doc) in documents.into_iter().enumerate() {
            let key = match doc.id() {
                Some(k) => k.to_string(),
                None => {
                    tracing::warn!(position, title = %doc.title, "skipping document without key");
                    skipped += 1;
                    continue;
                }
            };
            match docs.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert(doc);
                }
                Entry::Occupied(slot) => {
                    tracing::warn!(key = %slot.key(), position, "duplicate document key, keeping first");
                    skipped += 1;
                }
            }
        }
        Self { docs, skipped }
    }

    pub fn len(&self) -> usize { self.docs.len() }

    pub fn is_empty(&self) -> bool { self.docs.is_empty() }

    /// Documents dropped at ingestion (unkeyed or duplicate).
    pub fn skipped(&self) -> usize { self.skipped }

    pub fn get(&self, key: &str) -> Option<&Document> { self.docs.get(key) }

    /// Iterate `(key, document)` in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&DocKey, &Document)> {
        self.docs.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(key: Option<&str>, title: &str) -> Document {
        Document { key: key.map(str::to_string), title: title.into(), ..Default::default() }
    }

    #[test]
    fn unkeyed_documents_are_skipped() {
        let corpus = Corpus::from_documents(vec![doc(Some("/p/1"), "a"), doc(None, "b"), doc(Some("  "), "c")]);
        assert_eq!(corpus.len(), 1);
        assert_eq!(corpus.skipped(), 2);
        assert!(corpus.get("/p/1").is_some());
    }

    #[test]
    fn duplicate_keys_keep_first() {
        let corpus = Corpus::from_documents(vec![doc(Some("/p/1"), "first"), doc(Some("/p/1"), "second")]);
        assert_eq!(corpus.len(), 1);
        assert_eq!(corpus.get("/p/1").map(|d| d.title.as_str()), Some("first"));
    }

    #[test]
    fn accepts_crawler_field_names() {
        let raw = r#"{"url":"/p/9","title":"Mug","product_features":{"color":"red"},"product_reviews":[{"rating":4}]}"#;
        let d: Document = serde_json::from_str(raw).unwrap();
        assert_eq!(d.id(), Some("/p/9"));
        assert_eq!(d.features.get("color").map(String::as_str), Some("red"));
        assert_eq!(d.reviews[0].rating, 4.0);
        assert!(d.reviews[0].text.is_empty());
    }

    #[test]
    fn key_and_url_together() {
        let raw = r#"{"key":"sku-1","url":"https://shop.example/p/1","title":"Mug"}"#;
        let d: Document = serde_json::from_str(raw).unwrap();
        assert_eq!(d.id(), Some("sku-1"));
        assert_eq!(d.link(), Some("https://shop.example/p/1"));
        let corpus = Corpus::from_documents(vec![d]);
        assert!(corpus.get("sku-1").is_some());
    }

    #[test]
    fn blank_key_falls_back_to_url() {
        let d = Document { key: Some(" ".into()), url: Some("/p/2".into()), ..Default::default() };
        assert_eq!(d.id(), Some("/p/2"));
        assert_eq!(d.link(), Some("/p/2"));
    }
}
