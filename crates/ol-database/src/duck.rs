//! DuckDB snapshot store.
//!
//! One store file per snapshot date. A regeneration deletes and rebuilds the
//! whole file; stores are never patched in place. The store owns the schemas
//! committed during the current regeneration and rejects any record that
//! does not conform to them. A `snapshot_meta` row, written only by
//! `finalize`, marks the store authoritative; a store without it is a
//! partial merge and must be treated as invalid.

use chrono::{Duration, NaiveDate, Utc};
use duckdb::types::ValueRef;
use duckdb::{Connection, params, params_from_iter};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::helpers::quote_ident;
use crate::infer::{ColumnType, InferredSchema};
use crate::paths::store_path;
use ol_types::{EMPTY_BINARY_SENTINEL, Record, Value};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duckdb: {0}")]
    Duck(#[from] duckdb::Error),
    #[error("no merged store exists for {date}")]
    MissingSnapshot { date: NaiveDate },
    #[error("store for {date} is not authoritative (partial merge), re-run the regeneration")]
    NotAuthoritative { date: NaiveDate },
    #[error("table '{table}' was not materialized in this regeneration")]
    NotMaterialized { table: String },
    #[error("table '{table}': record field '{field}' is not in the committed schema")]
    SchemaMismatch { table: String, field: String },
    #[error("table '{table}': field '{field}' cannot be coerced to {expected}")]
    Incoercible {
        table: String,
        field: String,
        expected: ColumnType,
    },
    #[error("table '{table}': column '{column}' has an unsupported storage type")]
    UnsupportedColumn { table: String, column: String },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub struct SnapshotStore {
    conn: Connection,
    date: NaiveDate,
    /// Schemas committed by `materialize` during this regeneration.
    schemas: HashMap<String, InferredSchema>,
}

impl SnapshotStore {
    /// Open a fresh store for `date`, deleting any previous generation.
    /// Regeneration is wholesale; replacing an existing store is logged.
    pub fn create(store_root: &Path, date: NaiveDate) -> Result<Self, StoreError> {
        std::fs::create_dir_all(store_root)?;
        let path = store_path(store_root, date);
        if path.exists() {
            std::fs::remove_file(&path)?;
            warn!(
                store = %path.display(),
                %date,
                "removed existing merged store, date is being regenerated"
            );
        }
        let conn = Connection::open(&path)?;
        let this = Self {
            conn,
            date,
            schemas: HashMap::new(),
        };
        this.init_meta()?;
        Ok(this)
    }

    /// Open an existing, fully merged store for reading. Fails when the file
    /// is absent or when the merge that produced it never completed.
    pub fn open_authoritative(store_root: &Path, date: NaiveDate) -> Result<Self, StoreError> {
        let path = store_path(store_root, date);
        if !path.exists() {
            return Err(StoreError::MissingSnapshot { date });
        }
        let conn = Connection::open(&path)?;
        let completed: i64 = conn.query_row(
            "SELECT COUNT(*) FROM snapshot_meta WHERE snapshot_date = ?",
            params![date.format("%Y-%m-%d").to_string()],
            |r| r.get(0),
        )?;
        if completed == 0 {
            return Err(StoreError::NotAuthoritative { date });
        }
        Ok(Self {
            conn,
            date,
            schemas: HashMap::new(),
        })
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    fn init_meta(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS snapshot_meta (
                snapshot_date TEXT NOT NULL,
                completed_at  TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// Create `table` from an inferred schema. Any table of the same name
    /// left over from a prior generation is dropped first; within one
    /// regeneration each table is materialized exactly once.
    pub fn materialize(&mut self, table: &str, schema: &InferredSchema) -> Result<(), StoreError> {
        let cols: Vec<String> = schema
            .columns()
            .map(|(name, ty)| format!("{} {}", quote_ident(name), ty.sql_type()))
            .collect();
        self.conn.execute_batch(&format!(
            "DROP TABLE IF EXISTS {table};\nCREATE TABLE {table} ({cols});",
            table = quote_ident(table),
            cols = cols.join(", "),
        ))?;
        self.schemas.insert(table.to_string(), schema.clone());
        Ok(())
    }

    /// Insert one record into a materialized table. Fields are laid out in
    /// committed column order; a field outside the committed schema is a
    /// hard error, never an implicit re-CREATE.
    pub fn insert(&self, table: &str, record: &Record) -> Result<(), StoreError> {
        let schema = self
            .schemas
            .get(table)
            .ok_or_else(|| StoreError::NotMaterialized {
                table: table.to_string(),
            })?;

        for field in record.field_names() {
            if schema.column_type(field).is_none() {
                return Err(StoreError::SchemaMismatch {
                    table: table.to_string(),
                    field: field.to_string(),
                });
            }
        }

        let mut names = Vec::with_capacity(schema.len());
        let mut values: Vec<duckdb::types::Value> = Vec::with_capacity(schema.len());
        for (name, ty) in schema.columns() {
            names.push(quote_ident(name));
            let value = record.get(name).unwrap_or(&Value::Null);
            values.push(coerce(table, name, value, ty)?);
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table),
            names.join(", "),
            vec!["?"; names.len()].join(", "),
        );
        self.conn.execute(&sql, params_from_iter(values))?;
        Ok(())
    }

    /// Read every row of `table` back as records keyed by column name.
    /// Dates re-emerge as ISO-8601 text; an empty blob renders as the
    /// "no data" sentinel so absence stays distinguishable from zero bytes.
    pub fn query_table(&self, table: &str) -> Result<Vec<Record>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {}", quote_ident(table)))?;
        let mut rows = stmt.query([])?;

        // Column metadata is only available once the statement has executed.
        let mut names: Option<Vec<String>> = None;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let names = names.get_or_insert_with(|| {
                row.as_ref()
                    .column_names()
                    .iter()
                    .map(|n| n.to_string())
                    .collect()
            });
            let mut record = Record::new();
            for (idx, name) in names.iter().enumerate() {
                let value = decode_ref(table, name, row.get_ref(idx)?)?;
                record.insert(name.clone(), value);
            }
            out.push(record);
        }
        Ok(out)
    }

    /// Names of all merged tables in this store, alphabetical.
    pub fn table_names(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT table_name FROM information_schema.tables
              WHERE table_name <> 'snapshot_meta'
              ORDER BY table_name",
        )?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(row.get::<_, String>(0)?);
        }
        Ok(out)
    }

    pub fn row_count(&self, table: &str) -> Result<i64, StoreError> {
        let n: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
            [],
            |r| r.get(0),
        )?;
        Ok(n)
    }

    /// Mark the regeneration complete. Until this runs, the store reads as
    /// non-authoritative.
    pub fn finalize(&self) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO snapshot_meta (snapshot_date, completed_at) VALUES (?, ?)",
            params![
                self.date.format("%Y-%m-%d").to_string(),
                Utc::now().to_rfc3339()
            ],
        )?;
        info!(date = %self.date, "merged store finalized");
        Ok(())
    }
}

/// Coerce a record value to its committed column type.
fn coerce(
    table: &str,
    field: &str,
    value: &Value,
    ty: ColumnType,
) -> Result<duckdb::types::Value, StoreError> {
    use duckdb::types::Value as Dv;
    let incoercible = || StoreError::Incoercible {
        table: table.to_string(),
        field: field.to_string(),
        expected: ty,
    };
    Ok(match (ty, value) {
        (_, Value::Null) => Dv::Null,
        (ColumnType::Integer, Value::Int(v)) => Dv::BigInt(*v),
        (ColumnType::Real, Value::Int(v)) => Dv::Double(*v as f64),
        (ColumnType::Real, Value::Real(v)) => Dv::Double(*v),
        (ColumnType::Text, Value::Int(v)) => Dv::Text(v.to_string()),
        (ColumnType::Text, Value::Real(v)) => Dv::Text(v.to_string()),
        (ColumnType::Text, Value::Text(s)) => Dv::Text(s.clone()),
        (ColumnType::Text, Value::Date(d)) => Dv::Text(d.format("%Y-%m-%d").to_string()),
        (ColumnType::Blob, Value::Bytes(b)) => Dv::Blob(b.clone()),
        _ => return Err(incoercible()),
    })
}

/// Map one DuckDB cell back to the record model.
fn decode_ref(table: &str, column: &str, cell: ValueRef<'_>) -> Result<Value, StoreError> {
    Ok(match cell {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(b) => Value::Int(i64::from(b)),
        ValueRef::TinyInt(v) => Value::Int(i64::from(v)),
        ValueRef::SmallInt(v) => Value::Int(i64::from(v)),
        ValueRef::Int(v) => Value::Int(i64::from(v)),
        ValueRef::BigInt(v) => Value::Int(v),
        ValueRef::UTinyInt(v) => Value::Int(i64::from(v)),
        ValueRef::USmallInt(v) => Value::Int(i64::from(v)),
        ValueRef::UInt(v) => Value::Int(i64::from(v)),
        ValueRef::Float(v) => Value::Real(f64::from(v)),
        ValueRef::Double(v) => Value::Real(v),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) if bytes.is_empty() => {
            Value::Text(EMPTY_BINARY_SENTINEL.to_string())
        }
        ValueRef::Blob(bytes) => Value::Bytes(bytes.to_vec()),
        ValueRef::Date32(days) => {
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)
                .expect("unix epoch is a valid date");
            match epoch.checked_add_signed(Duration::days(i64::from(days))) {
                Some(d) => Value::Date(d),
                None => {
                    return Err(StoreError::UnsupportedColumn {
                        table: table.to_string(),
                        column: column.to_string(),
                    });
                }
            }
        }
        _ => {
            return Err(StoreError::UnsupportedColumn {
                table: table.to_string(),
                column: column.to_string(),
            });
        }
    })
}
