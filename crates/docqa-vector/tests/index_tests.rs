use docqa_core::error::Error;
use docqa_core::types::{IndexEntry, SourceOffset};
use docqa_vector::VectorIndex;

fn entry(seq: usize, vector: Vec<f32>) -> IndexEntry {
    IndexEntry {
        unit_id: format!("u{seq}"),
        vector,
        text: format!("text {seq}"),
        offset: SourceOffset { page: 1, start: seq * 10, end: seq * 10 + 10 },
        sequence_index: seq,
    }
}

fn populated() -> VectorIndex {
    let index = VectorIndex::new();
    index
        .insert(vec![
            entry(0, vec![1.0, 0.0, 0.0]),
            entry(1, vec![0.7, 0.7, 0.0]),
            entry(2, vec![0.0, 1.0, 0.0]),
            entry(3, vec![-1.0, 0.0, 0.0]),
            entry(4, vec![0.0, 0.0, 0.0]),
        ])
        .expect("insert");
    index
}

#[test]
fn search_returns_k_best_non_increasing() {
    let index = populated();
    for k in 1..=5 {
        let hits = index.search(&[1.0, 0.2, 0.0], k).expect("search");
        assert_eq!(hits.len(), k);
        for pair in hits.windows(2) { assert!(pair[0].score >= pair[1].score); }
        for h in &hits { assert!((-1.0..=1.0).contains(&h.score)); }
    }
    let hits = index.search(&[1.0, 0.2, 0.0], 2).expect("search");
    assert_eq!(hits[0].unit.id, "u0");
    assert_eq!(hits[1].unit.id, "u1");
}

#[test]
fn k_above_size_returns_everything() {
    let index = populated();
    let hits = index.search(&[0.0, 1.0, 0.0], 50).expect("search");
    assert_eq!(hits.len(), 5);
}

#[test]
fn zero_k_is_invalid() {
    assert!(matches!(populated().search(&[1.0, 0.0, 0.0], 0), Err(Error::InvalidConfig(_))));
}

#[test]
fn zero_vectors_rank_last_with_minus_one() {
    let hits = populated().search(&[0.0, 1.0, 0.0], 5).expect("search");
    let last = hits.last().expect("non-empty");
    assert_eq!(last.score, -1.0);
    // u3 is orthogonal (0.0) and must beat the zero vector
    assert!(hits.iter().position(|h| h.unit.id == "u3") < hits.iter().position(|h| h.unit.id == "u4"));
}

#[test]
fn ties_go_to_the_earlier_unit() {
    let index = VectorIndex::new();
    index.insert(vec![entry(5, vec![0.0, 1.0]), entry(2, vec![0.0, 3.0]), entry(9, vec![1.0, 0.0])]).expect("insert");
    let hits = index.search(&[0.0, 1.0], 3).expect("search");
    assert_eq!(hits.iter().map(|h| h.unit.sequence_index).collect::<Vec<_>>(), vec![2, 5, 9]);
}

#[test]
fn mixed_dimensions_are_rejected_atomically() {
    let index = populated();
    let err = index.insert(vec![entry(10, vec![1.0, 0.0, 0.0]), entry(11, vec![1.0, 0.0])]);
    assert!(matches!(err, Err(Error::DimensionMismatch { expected: 3, actual: 2 })));
    assert_eq!(index.len(), 5, "nothing from the failed batch was appended");

    let fresh = VectorIndex::new();
    assert!(matches!(fresh.insert(vec![entry(0, vec![1.0]), entry(1, vec![1.0, 2.0])]), Err(Error::DimensionMismatch { .. })));
    assert!(fresh.is_empty());
    assert_eq!(fresh.dimension(), None);
}

#[test]
fn query_dimension_must_match() {
    assert!(matches!(populated().search(&[1.0, 0.0], 1), Err(Error::DimensionMismatch { expected: 3, actual: 2 })));
}

#[test]
fn empty_index_search_is_not_an_error() {
    assert!(VectorIndex::new().search(&[1.0, 2.0], 3).expect("search").is_empty());
}

#[test]
fn clear_resets_dimension() {
    let index = populated();
    index.clear();
    assert!(index.is_empty());
    assert_eq!(index.dimension(), None);
    index.insert(vec![entry(0, vec![1.0, 0.0])]).expect("new dimension accepted after clear");
    assert_eq!(index.dimension(), Some(2));
}

#[test]
fn committed_rebuild_replaces_contents() {
    let index = populated();
    {
        let mut rebuild = index.begin_rebuild();
        assert!(rebuild.is_empty());
        rebuild.insert(vec![entry(0, vec![0.5, 0.5])]).expect("insert");
        rebuild.commit();
    }
    assert_eq!(index.len(), 1);
    assert_eq!(index.dimension(), Some(2));
}

#[test]
fn abandoned_rebuild_restores_previous_contents() {
    let index = populated();
    let failed: Result<(), Error> = (|| {
        let mut rebuild = index.begin_rebuild();
        rebuild.insert(vec![entry(0, vec![0.5, 0.5])])?;
        rebuild.insert(vec![entry(1, vec![0.5, 0.5, 0.5])])?;
        rebuild.commit();
        Ok(())
    })();
    assert!(failed.is_err());
    assert_eq!(index.len(), 5);
    assert_eq!(index.dimension(), Some(3));
    let hits = index.search(&[1.0, 0.0, 0.0], 1).expect("search");
    assert_eq!(hits[0].unit.id, "u0");
}
