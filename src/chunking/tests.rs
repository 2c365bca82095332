use super::*;
use crate::RagError;

#[test]
fn two_short_sentences_fit_one_chunk() {
    let chunks = chunk_text("Cats are mammals. Dogs are loyal.", 40, 10)
        .expect("chunking should succeed");

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0], "Cats are mammals. Dogs are loyal.");
}

#[test]
fn rejects_zero_chunk_size() {
    let result = chunk_text("Some text.", 0, 0);
    assert!(matches!(result, Err(RagError::InvalidParameters(_))));
}

#[test]
fn rejects_overlap_not_smaller_than_chunk_size() {
    let result = chunk_text("Some text.", 100, 100);
    assert!(matches!(result, Err(RagError::InvalidParameters(_))));

    let result = chunk_text("Some text.", 100, 150);
    assert!(matches!(result, Err(RagError::InvalidParameters(_))));
}

#[test]
fn rejects_empty_text() {
    let result = chunk_text("", 100, 10);
    assert!(matches!(result, Err(RagError::InvalidInput(_))));

    let result = chunk_text("   \n\t  ", 100, 10);
    assert!(matches!(result, Err(RagError::InvalidInput(_))));
}

#[test]
fn splits_long_text_into_multiple_chunks() {
    let text = "The quick brown fox jumps over the lazy dog. \
                Rust gives memory safety without garbage collection. \
                Vector search ranks candidates by cosine similarity. \
                Retrieval grounds the answer in stored context.";

    let chunks = chunk_text(text, 100, 20).expect("chunking should succeed");

    assert!(chunks.len() > 1);
    for chunk in &chunks {
        assert!(!chunk.trim().is_empty());
    }
}

#[test]
fn every_sentence_appears_in_order() {
    let sentences = [
        "Alpha is the first letter.",
        "Beta follows alpha closely.",
        "Gamma comes in third place.",
        "Delta rounds out the group.",
    ];
    let text = sentences.join(" ");

    let chunks = chunk_text(&text, 60, 10).expect("chunking should succeed");
    let combined = chunks.join(" ");

    // No sentence may be dropped, and first occurrences must stay ordered.
    let mut last_pos = 0;
    for sentence in sentences {
        let pos = combined.find(sentence).expect("sentence should survive chunking");
        assert!(pos >= last_pos, "sentence out of order: {sentence}");
        last_pos = pos;
    }
}

#[test]
fn consecutive_chunks_share_overlap_sentences() {
    let text = "First sentence here. Second sentence here. Third sentence here. \
                Fourth sentence here. Fifth sentence here.";

    let chunks = chunk_text(&text, 45, 25).expect("chunking should succeed");
    assert!(chunks.len() > 1);

    for pair in chunks.windows(2) {
        let prev_tail = pair[0]
            .rsplit(". ")
            .next()
            .expect("chunk should have content");
        let prev_tail = prev_tail.trim_end_matches('.');
        assert!(
            pair[1].contains(prev_tail),
            "chunk '{}' does not carry overlap from '{}'",
            pair[1],
            pair[0]
        );
    }
}

#[test]
fn oversized_sentence_emitted_whole() {
    let long_sentence = format!("{} end.", "word ".repeat(50).trim());
    let chunks = chunk_text(&long_sentence, 30, 5).expect("chunking should succeed");

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0], long_sentence);
}

#[test]
fn falls_back_when_no_terminators_exist() {
    // No sentence terminators at all, so the boundary heuristic finds nothing
    // and the period fallback closes the text itself.
    let text = "just a run of words without any terminator";
    let chunks = chunk_text(text, 1000, 100).expect("chunking should succeed");

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0], "just a run of words without any terminator.");
}

#[test]
fn normalizes_interior_whitespace() {
    let chunks = chunk_text("Spaced   out\n\nsentence   here. Another  one  follows.", 200, 20)
        .expect("chunking should succeed");

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0], "Spaced out sentence here. Another one follows.");
}

#[test]
fn chunk_with_config_uses_budgets() {
    let config = ChunkingConfig::default();
    assert_eq!(config.chunk_size, 1000);
    assert_eq!(config.overlap, 200);

    let chunks = chunk_with_config("One sentence. Two sentence.", &config)
        .expect("chunking should succeed");
    assert_eq!(chunks.len(), 1);
}

#[test]
fn question_and_exclamation_terminators() {
    let text = "Is this a question? Yes it is! And a statement.";
    let chunks = chunk_text(text, 25, 5).expect("chunking should succeed");

    assert!(chunks.len() >= 2);
    assert!(chunks[0].starts_with("Is this a question?"));
}
