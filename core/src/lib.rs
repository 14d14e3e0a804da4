//! Indexing and ranking core for a crawled product catalog.
//!
//! A [`Corpus`] snapshot is turned into an immutable [`IndexSet`] by
//! [`builder`]; queries run against a snapshot through [`search`]:
//! normalize and expand ([`query`]), BM25 over weighted fields ([`scorer`]),
//! then review and exact-title bonuses ([`composer`]).

pub mod builder;
pub mod composer;
pub mod corpus;
pub mod error;
pub mod index;
pub mod persist;
pub mod query;
pub mod scorer;
pub mod search;
pub mod state;
pub mod synonyms;
pub mod tokenizer;

pub use corpus::{Corpus, Document, Review};
pub use error::{Result, SearchError};
pub use index::{
    DocKey, DocMeta, DocumentLengthTable, FeatureIndex, Field, FieldIndex, IndexSet, PositionalIndex,
    ReviewAggregate, ReviewIndex,
};
pub use search::{search, SearchConfig, SearchHit, SearchResponse};
pub use state::IndexState;
pub use synonyms::SynonymTable;
