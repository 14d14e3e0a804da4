use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use unicode_normalization::UnicodeNormalization;
use std::collections::HashSet;

lazy_static! {
    static ref NON_WORD: Regex = Regex::new(r"[^\p{L}\p{N}\s]").expect("valid regex");
    static ref DEFAULT: Normalizer = Normalizer::default();
}

/// English stopwords, written the way they look after punctuation is stripped.
/// Contractions are left out on purpose: "i'll" would become "ill".
pub const DEFAULT_STOPWORDS: &[&str] = &[
    "a","about","above","after","again","against","all","am","an","and","any","are","as","at",
    "be","because","been","before","being","below","between","both","but","by",
    "can","cannot","could",
    "did","do","does","doing","down","during",
    "each","few","for","from","further",
    "had","has","have","having","he","her","here","hers","herself","him","himself","his","how",
    "i","if","in","into","is","it","its","itself",
    "me","more","most","my","myself",
    "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
    "same","she","should","so","some","such",
    "than","that","the","their","theirs","them","themselves","then","there","these","they","this","those","through","to","too",
    "under","until","up","very",
    "was","we","were","what","when","where","which","while","who","whom","why","with","would",
    "you","your","yours","yourself","yourselves",
];

/// Turns raw text into the token sequence every index and query is built from.
///
/// Steps, in order: NFKC + lowercase, strip everything that is not a letter,
/// digit or whitespace, split on whitespace, drop stopwords, stem, drop
/// stems that are themselves stopwords.
/// The normalizer holds no mutable state, so one instance can be shared by
/// every indexing and query thread.
pub struct Normalizer {
    stopwords: HashSet<String>,
    stemmer: Option<Stemmer>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_STOPWORDS.iter().copied(), Some(Algorithm::English))
    }
}

impl Normalizer {
    pub fn new<I, S>(stopwords: I, algorithm: Option<Algorithm>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            stopwords: stopwords.into_iter().map(|s| s.as_ref().to_lowercase()).collect(),
            stemmer: algorithm.map(Stemmer::create),
        }
    }

    /// A normalizer that only folds, strips and splits.
    pub fn plain() -> Self {
        Self::new(std::iter::empty::<&str>(), None)
    }

    pub fn is_stopword(&self, token: &str) -> bool { self.stopwords.contains(token) }

    pub fn normalize(&self, text: &str) -> Vec<String> {
        let folded = text.nfkc().collect::<String>().to_lowercase();
        let stripped = NON_WORD.replace_all(&folded, "");
        stripped
            .split_whitespace()
            .filter(|token| !self.is_stopword(token))
            .map(|token| self.stem(token))
            .filter(|token| !token.is_empty() && !self.is_stopword(token))
            .collect()
    }

    /// Stem until the token stops changing, so that normalized output fed
    /// back through `normalize` comes out unchanged.
    fn stem(&self, token: &str) -> String {
        let Some(stemmer) = &self.stemmer else { return token.to_string() };
        let mut current = token.to_string();
        // Snowball never lengthens a word; the token length bounds the passes.
        for _ in 0..=token.len() {
            let next = stemmer.stem(&current);
            if next == current {
                break;
            }
            current = next.into_owned();
        }
        current
    }
}

/// The process-wide normalizer used by the index builder and the query path.
pub fn default_normalizer() -> &'static Normalizer { &DEFAULT }

/// Normalize with the default English normalizer.
pub fn normalize(text: &str) -> Vec<String> {
    DEFAULT.normalize(text)
}
