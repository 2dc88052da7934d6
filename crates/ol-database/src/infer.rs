//! Whole-set schema inference.
//!
//! The schema for a table is derived over the *entire* record set before any
//! row is written: union of field names in first-seen order, one storage
//! type per field wide enough for every observed value. This replaces
//! deriving columns from whichever row is currently being inserted, which
//! breaks down as soon as the set is ragged.

use indexmap::IndexMap;
use ol_types::{RecordSet, Value};
use std::fmt;
use thiserror::Error;

/// Storage type committed for one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    Blob,
}

impl ColumnType {
    pub fn sql_type(self) -> &'static str {
        match self {
            ColumnType::Integer => "BIGINT",
            ColumnType::Real => "DOUBLE",
            ColumnType::Text => "VARCHAR",
            ColumnType::Blob => "BLOB",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_type())
    }
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("table '{table}': field '{field}' mixes {left} with {right}, no single storage type holds both")]
    Conflict {
        table: String,
        field: String,
        left: ColumnType,
        right: ColumnType,
    },
}

/// Ordered column-name -> storage-type mapping derived from one record set.
/// Every column is nullable; a field absent from a record inserts as NULL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferredSchema {
    columns: IndexMap<String, ColumnType>,
}

impl InferredSchema {
    pub fn columns(&self) -> impl Iterator<Item = (&str, ColumnType)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.columns.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// How a single value observes, before widening. `Date` observes as text
/// (stored as its ISO string); binary observes as blob, explicitly, and
/// never coerces into anything else.
fn observe(value: &Value) -> Option<ColumnType> {
    match value {
        Value::Int(_) => Some(ColumnType::Integer),
        Value::Real(_) => Some(ColumnType::Real),
        Value::Text(_) | Value::Date(_) => Some(ColumnType::Text),
        Value::Bytes(_) => Some(ColumnType::Blob),
        Value::Null => None,
    }
}

/// Widen two observed types to the narrowest common storage type, or fail.
fn widen(a: ColumnType, b: ColumnType) -> Result<ColumnType, (ColumnType, ColumnType)> {
    use ColumnType::*;
    match (a, b) {
        (Integer, Integer) => Ok(Integer),
        (Real, Real) | (Integer, Real) | (Real, Integer) => Ok(Real),
        (Text, Text) | (Text, Integer) | (Integer, Text) | (Text, Real) | (Real, Text) => Ok(Text),
        (Blob, Blob) => Ok(Blob),
        (Blob, other) | (other, Blob) => Err((Blob, other)),
    }
}

/// Derive the schema for `set`. Deterministic, order-independent in the type
/// mapping: permuting the records can only permute first-seen column order,
/// never change a column's resolved type.
pub fn infer_schema(set: &RecordSet) -> Result<InferredSchema, SchemaError> {
    let mut columns: IndexMap<String, Option<ColumnType>> = IndexMap::new();

    for record in &set.records {
        for (field, value) in record.iter() {
            let observed = observe(value);
            match columns.get_mut(field) {
                None => {
                    columns.insert(field.to_string(), observed);
                }
                Some(slot) => {
                    *slot = match (*slot, observed) {
                        (None, obs) => obs,
                        (cur, None) => cur,
                        (Some(cur), Some(obs)) => {
                            Some(widen(cur, obs).map_err(|(left, right)| {
                                SchemaError::Conflict {
                                    table: set.name.clone(),
                                    field: field.to_string(),
                                    left,
                                    right,
                                }
                            })?)
                        }
                    };
                }
            }
        }
    }

    // A column seen only as NULL still needs a storage type; text is the
    // widest scalar slot available.
    let columns = columns
        .into_iter()
        .map(|(name, ty)| (name, ty.unwrap_or(ColumnType::Text)))
        .collect();

    Ok(InferredSchema { columns })
}
