//! Record normalization: raw catalog and ownership records into flat,
//! join-ready rows.
//!
//! The raw catalog is a sequence of semi-structured item records; the raw
//! ownership file is one record per user, each carrying a nested list of
//! owned-item sub-records. Both are normalized here before anything touches
//! a matrix.

use rustc_hash::FxHashSet;
use serde_json::Value;
use std::path::Path;
use tracing::debug;

use crate::error::{Error, Result};
use crate::source::Record;

/// Item identity. Raw sources carry it as either a number or a numeric
/// string; it is normalized to an integer on ingest.
pub type ItemId = i64;

/// One row of the cleaned item table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRow {
    /// Unique item id.
    pub id: ItemId,
    /// Selected column values, positionally aligned with
    /// [`Catalog::columns`]. Missing values are the empty string, never a
    /// null marker, so downstream joins cannot silently drop rows.
    pub fields: Vec<String>,
}

/// Cleaned, deduplicated item table.
///
/// Produced by [`normalize_catalog`]; its id set drives the inner join in
/// [`join_catalog`] and its rows are written out as the tabular input for
/// the relational store's ingestion step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    /// Column names, in the order requested at normalization time.
    pub columns: Vec<String>,
    /// Deduplicated rows, input order preserved.
    pub rows: Vec<CatalogRow>,
}

impl Catalog {
    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the catalog holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Set of known item ids.
    #[must_use]
    pub fn id_set(&self) -> FxHashSet<ItemId> {
        self.rows.iter().map(|r| r.id).collect()
    }

    /// Writes the table as delimited text, one header row then one row per
    /// item.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = csv::Writer::from_path(path.as_ref())?;
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(&row.fields)?;
        }
        writer.flush().map_err(|e| Error::io(path.as_ref(), e))?;
        Ok(())
    }
}

/// One flattened user-owns-item indicator row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OwnershipEvent {
    /// Dense zero-based user id, assigned from input order.
    pub user: u32,
    /// Owned item.
    pub item: ItemId,
    /// Ownership indicator, always 1.0 for an emitted row.
    pub owned: f32,
}

/// Selects `keep_columns` from the raw catalog records, drops rows with a
/// missing id, removes duplicate ids keeping the first occurrence, and
/// fills remaining missing values with the empty string.
///
/// # Errors
///
/// [`Error::Schema`] when `id_column` is not among `keep_columns`, or when
/// a kept column (the id column included) appears on no record at all.
/// Rows with an absent or unparseable id are dropped and counted, not
/// fatal.
pub fn normalize_catalog(
    records: &[Record],
    keep_columns: &[String],
    id_column: &str,
) -> Result<Catalog> {
    if !keep_columns.iter().any(|c| c == id_column) {
        return Err(Error::schema(format!(
            "id column `{id_column}` not found among the kept columns, \
             make sure it is spelled correctly"
        )));
    }
    // A kept column no record carries is a misconfiguration, not sparse
    // data.
    if !records.is_empty() {
        for column in keep_columns {
            if !records.iter().any(|r| r.contains_key(column.as_str())) {
                return Err(Error::schema(format!(
                    "column `{column}` is missing from every catalog record"
                )));
            }
        }
    }

    let mut seen = FxHashSet::default();
    let mut rows = Vec::with_capacity(records.len());
    let mut dropped = 0_usize;

    for record in records {
        let Some(id) = record.get(id_column).and_then(parse_item_id) else {
            dropped += 1;
            continue;
        };
        if !seen.insert(id) {
            dropped += 1;
            continue;
        }
        let fields = keep_columns
            .iter()
            .map(|column| field_to_string(record.get(column.as_str())))
            .collect();
        rows.push(CatalogRow { id, fields });
    }

    debug!("dropped {dropped} rows from the raw catalog");
    Ok(Catalog {
        columns: keep_columns.to_vec(),
        rows,
    })
}

/// Flattens per-user ownership records into one [`OwnershipEvent`] per
/// owned item.
///
/// User ids are assigned as a dense zero-based sequence over the input
/// order; no external user identifier is consulted. This consumes a
/// fallible record stream so the (large) ownership file never has to be
/// materialized at once.
///
/// # Errors
///
/// [`Error::Schema`] when a record lacks `owned_list_field`, the field is
/// not a list, or any entry of the list lacks a parseable
/// `sub_item_field`. This is a batch job: one malformed record aborts the
/// whole run.
pub fn normalize_ownership<I>(
    records: I,
    owned_list_field: &str,
    sub_item_field: &str,
) -> Result<Vec<OwnershipEvent>>
where
    I: IntoIterator<Item = Result<Record>>,
{
    let mut events = Vec::new();
    let mut users = 0_u32;

    for record in records {
        let record = record?;
        let user = users;
        users = users.checked_add(1).ok_or_else(|| {
            Error::other("more than u32::MAX user records in the ownership input")
        })?;

        let owned = match record.get(owned_list_field) {
            Some(Value::Array(entries)) => entries,
            Some(_) => {
                return Err(Error::schema(format!(
                    "field `{owned_list_field}` on user record {user} is not a list"
                )))
            }
            None => {
                return Err(Error::schema(format!(
                    "field `{owned_list_field}` missing on user record {user}"
                )))
            }
        };

        for entry in owned {
            let item = entry
                .as_object()
                .and_then(|sub| sub.get(sub_item_field))
                .and_then(parse_item_id)
                .ok_or_else(|| {
                    Error::schema(format!(
                        "field `{sub_item_field}` missing or malformed on an \
                         owned-item entry of user record {user}"
                    ))
                })?;
            events.push(OwnershipEvent {
                user,
                item,
                owned: 1.0,
            });
        }
    }

    debug!(
        "flattened {} user records into {} ownership rows",
        users,
        events.len()
    );
    Ok(events)
}

/// Inner-joins ownership rows against the catalog's item ids.
///
/// Rows referencing an item the catalog does not know are excluded; the
/// count is logged, never fatal, since partial catalog coverage of the
/// observed ownership events is expected.
#[must_use]
pub fn join_catalog(events: Vec<OwnershipEvent>, catalog: &Catalog) -> Vec<OwnershipEvent> {
    let known = catalog.id_set();
    let before = events.len();
    let joined: Vec<OwnershipEvent> = events
        .into_iter()
        .filter(|e| known.contains(&e.item))
        .collect();
    debug!(
        "dropped {} ownership rows without a catalog match",
        before - joined.len()
    );
    joined
}

fn parse_item_id(value: &Value) -> Option<ItemId> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn field_to_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        // Nested values (e.g. a genre tag list) keep their json form.
        Some(other) => other.to_string(),
    }
}
