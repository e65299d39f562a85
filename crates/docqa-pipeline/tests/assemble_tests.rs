use docqa_core::error::Error;
use docqa_core::types::{RetrievalResult, SourceOffset, TextUnit};
use docqa_pipeline::{assemble, render_unit, ContextAssembler};

fn result(seq: usize, text: &str, score: f32) -> RetrievalResult {
    RetrievalResult {
        unit: TextUnit {
            id: format!("u{seq}"),
            text: text.to_string(),
            offset: SourceOffset { page: 1, start: 0, end: text.len() },
            sequence_index: seq,
        },
        score,
    }
}

#[test]
fn empty_results_is_empty_context() {
    assert!(matches!(assemble(&[], 1000), Err(Error::EmptyContext)));
}

#[test]
fn zero_budget_is_invalid() {
    assert!(matches!(ContextAssembler::new(0), Err(Error::InvalidConfig(_))));
}

#[test]
fn selected_units_are_laid_out_in_document_order() {
    let results = vec![result(7, "seventh", 0.9), result(2, "second", 0.8), result(4, "fourth", 0.5)];
    let ctx = assemble(&results, 10_000).unwrap();
    assert_eq!(ctx.source_units, vec!["u2", "u4", "u7"]);
    assert_eq!(
        ctx.text,
        "[page 1, part 2]\nsecond\n\n[page 1, part 4]\nfourth\n\n[page 1, part 7]\nseventh"
    );
}

#[test]
fn budget_drops_lowest_scored_first() {
    let results = vec![result(0, &"a".repeat(100), 0.2), result(1, &"b".repeat(100), 0.9), result(2, &"c".repeat(100), 0.6)];
    let one = render_unit(&results[1].unit).chars().count();
    // Room for two units and a separator, not three.
    let budget = one * 2 + 2 + 10;
    let ctx = assemble(&results, budget).unwrap();
    assert_eq!(ctx.source_units, vec!["u1", "u2"]);
    assert!(ctx.text.chars().count() <= budget);
}

#[test]
fn stops_at_first_unit_that_does_not_fit() {
    // A small low-scored unit after a large one that overflows is not used to fill the gap.
    let results = vec![result(0, "short", 0.9), result(1, &"x".repeat(500), 0.8), result(2, "tiny", 0.1)];
    let ctx = assemble(&results, 100).unwrap();
    assert_eq!(ctx.source_units, vec!["u0"]);
}

#[test]
fn top_unit_too_large_is_empty_context() {
    let results = vec![result(0, &"x".repeat(500), 0.9)];
    assert!(matches!(assemble(&results, 100), Err(Error::EmptyContext)));
}

#[test]
fn duplicate_units_are_included_once() {
    let results = vec![result(3, "same", 0.9), result(3, "same", 0.9), result(1, "other", 0.4)];
    let ctx = assemble(&results, 1000).unwrap();
    assert_eq!(ctx.source_units, vec!["u1", "u3"]);
}

#[test]
fn budget_counts_characters_not_bytes() {
    let text = "é".repeat(40);
    let results = vec![result(0, &text, 0.9)];
    let exact = render_unit(&results[0].unit).chars().count();
    assert!(assemble(&results, exact).is_ok());
    assert!(matches!(assemble(&results, exact - 1), Err(Error::EmptyContext)));
}
