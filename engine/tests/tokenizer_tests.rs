use engine::tokenizer::tokenize;

#[test]
fn it_normalizes_and_lowercases() {
    let words = tokenize("Installing PLUGINS! The ｆｕｌｌwidth café.");
    assert!(words.contains(&"installing".to_string()));
    assert!(words.contains(&"plugins".to_string()));
    // NFKC folds fullwidth forms
    assert!(words.contains(&"fullwidth".to_string()));
    assert!(words.contains(&"café".to_string()));
}

#[test]
fn it_keeps_stopwords_and_does_not_stem() {
    let words = tokenize("The quick brown fox and the lazy dog running");
    assert_eq!(words.iter().filter(|w| *w == "the").count(), 2);
    assert!(words.contains(&"and".to_string()));
    assert!(words.contains(&"running".to_string()));
    assert!(!words.contains(&"run".to_string()));
}
