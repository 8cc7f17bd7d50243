use crate::catalog::OwnershipEvent;
use crate::error::Error;
use crate::interaction::{build_chunk, load_item_ids, Assembler, ItemIndex};

fn event(user: u32, item: i64) -> OwnershipEvent {
    OwnershipEvent {
        user,
        item,
        owned: 1.0,
    }
}

/// user0 owns {10, 15}, user1 owns {10, 20}, user2 owns {10}.
fn three_user_rows() -> Vec<OwnershipEvent> {
    vec![
        event(0, 10),
        event(0, 15),
        event(1, 10),
        event(1, 20),
        event(2, 10),
    ]
}

#[test]
fn item_index_is_sorted_and_deduplicated() {
    let index = ItemIndex::from_rows(&[event(0, 20), event(1, 10), event(2, 20)]);

    assert_eq!(index.ids(), &[10, 20]);
    assert_eq!(index.column(10), Some(0));
    assert_eq!(index.column(20), Some(1));
    assert_eq!(index.column(99), None);
}

#[test]
fn chunk_has_fixed_columns_and_preserves_user_order() {
    let rows = three_user_rows();
    let index = ItemIndex::from_rows(&rows);

    let chunk = build_chunk(&rows, &[2, 0], &index, u64::MAX).unwrap();

    assert_eq!(chunk.rows(), 2);
    assert_eq!(chunk.cols(), 3);
    // First row is user2 (items {10}), second is user0 (items {10, 15}).
    assert_eq!(chunk.row(0).0, &[0]);
    assert_eq!(chunk.row(1).0, &[0, 1]);
}

#[test]
fn chunk_fails_when_dense_intermediate_exceeds_budget() {
    let rows = three_user_rows();
    let index = ItemIndex::from_rows(&rows);

    // 3 users x 3 items x 4 bytes = 36 bytes.
    let err = build_chunk(&rows, &[0, 1, 2], &index, 35).unwrap_err();

    assert!(matches!(err, Error::ResourceExhausted { .. }));
    assert!(err.to_string().contains("chunk size"));
}

#[test]
fn assemble_matches_concrete_scenario() {
    let interactions = Assembler::new(2).assemble(&three_user_rows()).unwrap();

    assert_eq!(interactions.item_ids, vec![10, 15, 20]);
    let m = &interactions.matrix;
    assert_eq!((m.rows(), m.cols()), (3, 3));
    assert_eq!(m.row(0).0, &[0, 1]);
    assert_eq!(m.row(1).0, &[0, 2]);
    assert_eq!(m.row(2).0, &[0]);
}

#[test]
fn assemble_is_invariant_under_chunk_size() {
    let rows = three_user_rows();

    let chunked = Assembler::new(2).assemble(&rows).unwrap();
    let single = Assembler::new(3).assemble(&rows).unwrap();
    let one_by_one = Assembler::new(1).assemble(&rows).unwrap();

    assert_eq!(chunked.matrix, single.matrix);
    assert_eq!(chunked.matrix, one_by_one.matrix);
    assert_eq!(chunked.item_ids, single.item_ids);
}

#[test]
fn assemble_tolerates_empty_input() {
    let interactions = Assembler::new(10).assemble(&[]).unwrap();

    assert_eq!(interactions.matrix.rows(), 0);
    assert_eq!(interactions.matrix.cols(), 0);
    assert!(interactions.item_ids.is_empty());
}

#[test]
fn assemble_rejects_zero_chunk_size() {
    let err = Assembler::new(0).assemble(&three_user_rows()).unwrap_err();
    assert!(matches!(err, Error::TypeConstraint(_)));
}

#[test]
fn chunks_are_lazy_and_sized_by_the_batch() {
    let rows = three_user_rows();
    let index = ItemIndex::from_rows(&rows);
    let assembler = Assembler::new(2);

    let chunks: Vec<_> = assembler
        .chunks(&rows, &index)
        .unwrap()
        .map(Result::unwrap)
        .collect();

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].rows(), 2);
    assert_eq!(chunks[1].rows(), 1);
    assert!(chunks.iter().all(|c| c.cols() == 3));
}

#[test]
fn item_ids_round_trip_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("item_ids.bin");

    let interactions = Assembler::new(2).assemble(&three_user_rows()).unwrap();
    interactions.save_item_ids(&path).unwrap();

    assert_eq!(load_item_ids(&path).unwrap(), vec![10, 15, 20]);
}
