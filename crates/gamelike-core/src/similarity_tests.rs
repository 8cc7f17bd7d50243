use crate::error::Error;
use crate::matrix::DenseMatrix;
use crate::similarity::{derive, SimilarityMatrix};

fn spec_embeddings() -> DenseMatrix {
    DenseMatrix::from_rows(vec![
        vec![-0.7, 0.2, 0.1],
        vec![-0.2, 0.6, 0.9],
        vec![0.3, -0.2, -0.7],
    ])
    .unwrap()
}

#[test]
fn cosine_matches_the_reference_scenario() {
    let matrix = derive(&spec_embeddings(), &[1, 2, 3]).unwrap();

    assert!((matrix.get(1, 2).unwrap() - 0.432_990_6).abs() < 1e-4);
    assert!((matrix.get(1, 3).unwrap() - -0.553_040_9).abs() < 1e-4);
    assert!((matrix.get(2, 3).unwrap() - -0.935_182_7).abs() < 1e-4);
}

#[test]
fn diagonal_is_one_for_nonzero_vectors() {
    let matrix = derive(&spec_embeddings(), &[1, 2, 3]).unwrap();
    for id in [1, 2, 3] {
        assert!((matrix.get(id, id).unwrap() - 1.0).abs() < 1e-6);
    }
}

#[test]
fn matrix_is_symmetric() {
    let matrix = derive(&spec_embeddings(), &[1, 2, 3]).unwrap();
    for a in [1, 2, 3] {
        for b in [1, 2, 3] {
            let forward = matrix.get(a, b).unwrap();
            let backward = matrix.get(b, a).unwrap();
            assert!((forward - backward).abs() < 1e-6);
        }
    }
}

#[test]
fn non_matrix_input_is_a_type_constraint_violation() {
    // Ragged rows are the closest thing to "not a 2-D array" a typed API
    // can be handed.
    let err = DenseMatrix::from_rows(vec![vec![1.0, 2.0], vec![1.0]]).unwrap_err();
    assert!(matches!(err, Error::TypeConstraint(_)));
}

#[test]
fn label_count_must_match_row_count() {
    let err = derive(&spec_embeddings(), &[1, 2]).unwrap_err();
    assert!(matches!(err, Error::TypeConstraint(_)));
}

#[test]
fn zero_norm_vectors_get_zero_similarity() {
    let embeddings =
        DenseMatrix::from_rows(vec![vec![0.0, 0.0], vec![1.0, 0.0]]).unwrap();
    let matrix = derive(&embeddings, &[7, 8]).unwrap();

    assert_eq!(matrix.get(7, 8).unwrap(), 0.0);
    assert_eq!(matrix.get(7, 7).unwrap(), 0.0);
    assert!((matrix.get(8, 8).unwrap() - 1.0).abs() < 1e-6);
}

#[test]
fn empty_embedding_set_warns_but_succeeds() {
    let matrix = derive(&DenseMatrix::zeros(0, 0), &[]).unwrap();
    assert!(matrix.is_empty());
}

#[test]
fn top_k_excludes_the_self_match_and_sorts_descending() {
    let matrix = derive(&spec_embeddings(), &[1, 2, 3]).unwrap();

    let like_1 = matrix.top_k(1, 5).unwrap();

    assert_eq!(like_1.len(), 2);
    assert_eq!(like_1[0].0, 2); // 0.4330 beats -0.5530
    assert_eq!(like_1[1].0, 3);
    assert!(like_1[0].1 > like_1[1].1);
}

#[test]
fn top_k_rejects_unknown_items() {
    let matrix = derive(&spec_embeddings(), &[1, 2, 3]).unwrap();
    let err = matrix.top_k(99, 3).unwrap_err();
    assert!(matches!(err, Error::TypeConstraint(_)));
}

#[test]
fn csv_round_trips_labels_and_values() {
    let matrix = derive(&spec_embeddings(), &[1, 2, 3]).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("similarities.csv");
    matrix.write_csv(&path).unwrap();

    let loaded = SimilarityMatrix::read_csv(&path).unwrap();
    assert_eq!(loaded.item_ids(), matrix.item_ids());
    for a in [1, 2, 3] {
        for b in [1, 2, 3] {
            let original = matrix.get(a, b).unwrap();
            let reloaded = loaded.get(a, b).unwrap();
            assert!((original - reloaded).abs() < 1e-6);
        }
    }
}
