//! Forward-only readers for semi-structured input files.
//!
//! The ownership file is large, so it is consumed one record at a time
//! through [`JsonLines`] instead of being materialized wholesale. The
//! catalog file is small and loaded in one go with [`read_records`].

use std::fs::File;
use std::io::{BufRead, BufReader, Lines, Read};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::warn;

use crate::error::{Error, Result};

/// One semi-structured input record.
pub type Record = serde_json::Map<String, Value>;

/// Streaming reader over a JSON Lines file, yielding one [`Record`] per
/// non-blank line.
///
/// Each record is parsed independently, so the iterator never holds more
/// than one record in memory and a consumer can stop (or restart from a
/// fresh reader) at any point.
pub struct JsonLines {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
}

impl JsonLines {
    /// Opens `path` for streaming.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| Error::io(&path, e))?;
        Ok(Self {
            path,
            lines: BufReader::new(file).lines(),
        })
    }
}

impl Iterator for JsonLines {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.lines.next()? {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    return Some(parse_record(&line));
                }
                Err(e) => return Some(Err(Error::io(&self.path, e))),
            }
        }
    }
}

fn parse_record(text: &str) -> Result<Record> {
    match serde_json::from_str::<Value>(text)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::schema(format!(
            "expected a json object per record, got {}",
            type_name(&other)
        ))),
    }
}

/// Loads a whole record file into memory.
///
/// Accepts either a top-level JSON array of objects or JSON Lines, so the
/// same loader covers both catalog snapshots and small test fixtures.
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<Record>> {
    let path = path.as_ref();
    let mut text = String::new();
    File::open(path)
        .and_then(|mut f| f.read_to_string(&mut text))
        .map_err(|e| Error::io(path, e))?;

    let trimmed = text.trim_start();
    if trimmed.starts_with('[') {
        match serde_json::from_str::<Value>(&text)? {
            Value::Array(values) => {
                let mut records = Vec::with_capacity(values.len());
                for value in values {
                    match value {
                        Value::Object(map) => records.push(map),
                        other => {
                            return Err(Error::schema(format!(
                                "expected a json object per record, got {}",
                                type_name(&other)
                            )))
                        }
                    }
                }
                if records.is_empty() {
                    warn!("{} contains 0 records", path.display());
                }
                Ok(records)
            }
            _ => unreachable!("leading '[' implies a json array"),
        }
    } else {
        trimmed
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(parse_record)
            .collect()
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
