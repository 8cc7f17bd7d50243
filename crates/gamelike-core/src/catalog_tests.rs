use serde_json::{json, Value};

use crate::catalog::{join_catalog, normalize_catalog, normalize_ownership, OwnershipEvent};
use crate::error::Error;
use crate::source::Record;

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => panic!("test fixture must be a json object"),
    }
}

fn game_columns() -> Vec<String> {
    ["id", "app_name", "genres", "release_date", "url"]
        .map(String::from)
        .to_vec()
}

#[test]
fn catalog_dedupes_and_fills_missing_values() {
    // One exact duplicate and three rows with a null in a different
    // optional column each.
    let rows = vec![
        record(json!({"id": 10, "app_name": "game1", "genres": "action", "release_date": "2013", "url": "google.com"})),
        record(json!({"id": 10, "app_name": "game1", "genres": "action", "release_date": "2013", "url": "google.com"})),
        record(json!({"id": 20, "app_name": "game2", "genres": null, "release_date": "2013", "url": "google.com"})),
        record(json!({"id": 30, "app_name": "game3", "genres": "action", "release_date": null, "url": "google.com"})),
        record(json!({"id": 40, "app_name": "game4", "genres": "action", "release_date": "2013", "url": null})),
    ];

    let catalog = normalize_catalog(&rows, &game_columns(), "id").unwrap();

    assert_eq!(catalog.len(), 4);
    assert_eq!(
        catalog.rows.iter().map(|r| r.id).collect::<Vec<_>>(),
        vec![10, 20, 30, 40]
    );
    // Nulls became empty strings, order otherwise preserved.
    assert_eq!(catalog.rows[1].fields, vec!["20", "game2", "", "2013", "google.com"]);
    assert_eq!(catalog.rows[2].fields, vec!["30", "game3", "action", "", "google.com"]);
    assert_eq!(catalog.rows[3].fields, vec!["40", "game4", "action", "2013", ""]);
}

#[test]
fn catalog_keeps_first_occurrence_of_duplicate_id() {
    let rows = vec![
        record(json!({"id": 10, "app_name": "first"})),
        record(json!({"id": 10, "app_name": "second"})),
    ];
    let columns = ["id", "app_name"].map(String::from).to_vec();

    let catalog = normalize_catalog(&rows, &columns, "id").unwrap();

    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog.rows[0].fields[1], "first");
}

#[test]
fn catalog_drops_rows_with_missing_id() {
    let rows = vec![
        record(json!({"id": null, "app_name": "ghost"})),
        record(json!({"app_name": "also ghost"})),
        record(json!({"id": "15", "app_name": "real"})),
    ];
    let columns = ["id", "app_name"].map(String::from).to_vec();

    let catalog = normalize_catalog(&rows, &columns, "id").unwrap();

    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog.rows[0].id, 15);
}

#[test]
fn catalog_rejects_unknown_id_column() {
    let rows = vec![record(json!({"id": 10}))];

    let err = normalize_catalog(&rows, &game_columns(), "game_id").unwrap_err();

    assert!(matches!(err, Error::Schema { .. }));
    assert!(err.to_string().contains("game_id"));
}

#[test]
fn catalog_rejects_id_column_absent_from_every_record() {
    // The id key exists in the configuration but on none of the records:
    // a misconfigured column name must not yield an empty catalog.
    let rows = vec![
        record(json!({"app_name": "game1"})),
        record(json!({"app_name": "game2"})),
    ];
    let columns = ["id", "app_name"].map(String::from).to_vec();

    let err = normalize_catalog(&rows, &columns, "id").unwrap_err();

    assert!(matches!(err, Error::Schema { .. }));
    assert!(err.to_string().contains("id"));
}

#[test]
fn catalog_rejects_kept_column_absent_from_every_record() {
    let rows = vec![
        record(json!({"id": 10, "app_name": "game1"})),
        record(json!({"id": 20, "app_name": "game2"})),
    ];
    let columns = ["id", "app_name", "genres"].map(String::from).to_vec();

    let err = normalize_catalog(&rows, &columns, "id").unwrap_err();

    assert!(matches!(err, Error::Schema { .. }));
    assert!(err.to_string().contains("genres"));
}

#[test]
fn catalog_accepts_column_present_on_only_some_records() {
    // Sparse data is fine; only a column absent everywhere is fatal.
    let rows = vec![
        record(json!({"id": 10})),
        record(json!({"id": 20, "app_name": "game2"})),
    ];
    let columns = ["id", "app_name"].map(String::from).to_vec();

    let catalog = normalize_catalog(&rows, &columns, "id").unwrap();

    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog.rows[0].fields, vec!["10", ""]);
}

#[test]
fn ownership_flattens_one_row_per_owned_item() {
    let records = vec![record(json!({
        "uid": "ignored-external-id",
        "items": [{"item_id": "10"}, {"item_id": "20"}],
    }))];

    let events = normalize_ownership(records.into_iter().map(Ok), "items", "item_id").unwrap();

    assert_eq!(
        events,
        vec![
            OwnershipEvent { user: 0, item: 10, owned: 1.0 },
            OwnershipEvent { user: 0, item: 20, owned: 1.0 },
        ]
    );
}

#[test]
fn ownership_row_count_equals_total_sub_records() {
    let records = vec![
        record(json!({"items": [{"item_id": 1}, {"item_id": 2}, {"item_id": 3}]})),
        record(json!({"items": []})),
        record(json!({"items": [{"item_id": 9}]})),
    ];

    let events = normalize_ownership(records.into_iter().map(Ok), "items", "item_id").unwrap();

    assert_eq!(events.len(), 4);
    // Dense zero-based user ids over input order, empty lists included.
    assert_eq!(
        events.iter().map(|e| e.user).collect::<Vec<_>>(),
        vec![0, 0, 0, 2]
    );
}

#[test]
fn ownership_aborts_on_missing_sub_item_field() {
    let records = vec![
        record(json!({"items": [{"item_id": 1}]})),
        record(json!({"items": [{"wrong_field": 2}]})),
    ];

    let err =
        normalize_ownership(records.into_iter().map(Ok), "items", "item_id").unwrap_err();

    assert!(matches!(err, Error::Schema { .. }));
    assert!(err.to_string().contains("item_id"));
}

#[test]
fn ownership_aborts_on_missing_owned_list() {
    let records = vec![record(json!({"user": "someone"}))];

    let err =
        normalize_ownership(records.into_iter().map(Ok), "items", "item_id").unwrap_err();

    assert!(matches!(err, Error::Schema { .. }));
    assert!(err.to_string().contains("items"));
}

#[test]
fn join_drops_rows_without_catalog_match() {
    let rows = vec![
        record(json!({"id": 10, "app_name": "known"})),
        record(json!({"id": 20, "app_name": "also known"})),
    ];
    let columns = ["id", "app_name"].map(String::from).to_vec();
    let catalog = normalize_catalog(&rows, &columns, "id").unwrap();

    let events = vec![
        OwnershipEvent { user: 0, item: 10, owned: 1.0 },
        OwnershipEvent { user: 0, item: 99, owned: 1.0 },
        OwnershipEvent { user: 1, item: 20, owned: 1.0 },
    ];

    let joined = join_catalog(events, &catalog);

    assert_eq!(joined.len(), 2);
    assert!(joined.iter().all(|e| e.item != 99));
}

#[test]
fn catalog_csv_round_trips_through_disk() {
    let rows = vec![
        record(json!({"id": 10, "app_name": "game1", "genres": null, "release_date": "2013", "url": "google.com"})),
    ];
    let catalog = normalize_catalog(&rows, &game_columns(), "id").unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("games.csv");
    catalog.write_csv(&path).unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    let mut lines = written.lines();
    assert_eq!(lines.next().unwrap(), "id,app_name,genres,release_date,url");
    assert_eq!(lines.next().unwrap(), "10,game1,,2013,google.com");
}
