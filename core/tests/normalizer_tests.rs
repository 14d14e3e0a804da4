use catalog_core::tokenizer::{normalize, Normalizer};

#[test]
fn it_normalizes_and_stems() {
    let words = normalize("Running Runners RUN! The shoe's laces.");
    assert!(words.contains(&"run".to_string()));
    // apostrophes are stripped, not split on
    assert!(words.contains(&"shoe".to_string()));
    assert!(words.contains(&"lace".to_string()));
}

#[test]
fn it_filters_stopwords() {
    let words = normalize("The quick brown fox and the lazy dog");
    assert!(!words.contains(&"the".to_string()));
    assert!(!words.contains(&"and".to_string()));
    assert_eq!(words.len(), 5);
}

#[test]
fn it_is_deterministic() {
    let text = "Comfortable red running shoes, made in Portugal (size 42)";
    assert_eq!(normalize(text), normalize(text));
}

#[test]
fn normalizing_twice_is_a_no_op() {
    let once = normalize("Comfortable red running shoes with leather laces, size 42");
    let twice = normalize(&once.join(" "));
    assert_eq!(once, twice);
}

#[test]
fn normalizing_normalized_tokens_changes_nothing() {
    let inputs = [
        "others",
        "haves",
        "doings",
        "agreed",
        "cannots",
        "Others agreed the doings were done",
        "Generously sized, hand-stitched leathers; abilities unmatched",
    ];
    for text in inputs {
        let once = normalize(text);
        let twice = normalize(&once.join(" "));
        assert_eq!(once, twice, "normalizing {text:?} is not stable");
    }
}

#[test]
fn digits_survive() {
    assert_eq!(normalize("Size 42-B"), vec!["size", "42b"]);
}

#[test]
fn custom_normalizer_without_stemming() {
    let n = Normalizer::new(["with"], None);
    assert_eq!(n.normalize("Shoes with Laces"), vec!["shoes", "laces"]);
}
