use crate::builder::build_index_set;
use crate::error::Result;
use crate::search::{search, SearchConfig, SearchResponse};
use crate::synonyms::SynonymTable;
use crate::{Corpus, IndexSet};
use parking_lot::RwLock;
use std::sync::Arc;

/// Process-scoped holder of the active index snapshot.
///
/// Readers clone the `Arc` and keep working on that snapshot for as long as
/// they like. A reload builds the replacement off-lock and only takes the
/// write lock to swap the pointer, so nobody ever observes a half-built set.
pub struct IndexState {
    current: RwLock<Arc<IndexSet>>,
    synonyms: Arc<SynonymTable>,
}

impl IndexState {
    pub fn init(corpus: &Corpus, synonyms: SynonymTable) -> Self {
        Self::from_index_set(build_index_set(corpus), synonyms)
    }

    pub fn from_index_set(set: IndexSet, synonyms: SynonymTable) -> Self {
        Self { current: RwLock::new(Arc::new(set)), synonyms: Arc::new(synonyms) }
    }

    pub fn snapshot(&self) -> Arc<IndexSet> { self.current.read().clone() }

    pub fn synonyms(&self) -> &SynonymTable { &self.synonyms }

    /// Rebuild from a new corpus snapshot and swap it in.
    pub fn reload(&self, corpus: &Corpus) -> Arc<IndexSet> {
        self.replace(build_index_set(corpus))
    }

    /// Swap in an already-built set, returning the previous one.
    pub fn replace(&self, set: IndexSet) -> Arc<IndexSet> {
        let num_docs = set.num_docs;
        let previous = std::mem::replace(&mut *self.current.write(), Arc::new(set));
        tracing::info!(num_docs, previous = previous.num_docs, "index snapshot swapped");
        previous
    }

    pub fn search(&self, query: &str, config: &SearchConfig) -> Result<SearchResponse> {
        let snapshot = self.snapshot();
        search(&snapshot, &self.synonyms, query, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Document;

    fn corpus(keys: &[&str]) -> Corpus {
        Corpus::from_documents(keys.iter().map(|k| Document {
            key: Some(k.to_string()),
            title: "red shoes".into(),
            ..Default::default()
        }))
    }

    #[test]
    fn reload_swaps_without_touching_old_snapshot() {
        let state = IndexState::init(&corpus(&["/a"]), SynonymTable::new());
        let old = state.snapshot();
        let previous = state.reload(&corpus(&["/a", "/b"]));
        assert_eq!(old.num_docs, 1);
        assert!(Arc::ptr_eq(&old, &previous));
        assert_eq!(state.snapshot().num_docs, 2);
        assert_eq!(state.search("red", &SearchConfig::default()).unwrap().filtered_documents, 2);
    }

    #[test]
    fn concurrent_readers_see_whole_snapshots() {
        let state = Arc::new(IndexState::init(&corpus(&["/a"]), SynonymTable::new()));
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let state = Arc::clone(&state);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        let snap = state.snapshot();
                        assert_eq!(snap.num_docs as usize, snap.doc_lengths.len());
                    }
                })
            })
            .collect();
        for n in 2..6 {
            let keys: Vec<String> = (0..n).map(|i| format!("/p/{i}")).collect();
            let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
            state.reload(&corpus(&refs));
        }
        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(state.snapshot().num_docs, 5);
    }
}
