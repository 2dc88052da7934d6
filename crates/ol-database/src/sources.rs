//! Record sources: ordered flat-record producers for named logical tables.
//!
//! Two providers exist. `PostgresSource` walks `information_schema` and
//! decodes every public table by the driver's type tag (never by sniffing a
//! stringified value). `CsvSource` reads one headered flat file as a single
//! logical table; CSV carries no driver types, so cells are sniffed
//! int -> real -> text at read time.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use sqlx::postgres::PgRow;
use sqlx::{Column, Row, TypeInfo};
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

use crate::helpers::quote_ident;
use crate::init::Connection;
use crate::paths::StagingLayout;
use ol_types::{Record, RecordSet, Value};

#[derive(Debug, Error)]
pub enum SourceError {
    /// The upstream source is unreachable. Terminal for the current run;
    /// callers must not retry.
    #[error("source '{source_name}' unavailable: {reason}")]
    Unavailable { source_name: String, reason: String },
    #[error("cannot decode column '{column}' of table '{table}': {reason}")]
    Decode {
        table: String,
        column: String,
        reason: String,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Producer of ordered flat record sets, one per named logical table.
#[async_trait]
pub trait RecordSource: Send + Sync {
    fn source_name(&self) -> &str;

    /// Which staged-file arrangement this source writes under the data root.
    fn layout(&self) -> StagingLayout;

    async fn table_names(&self) -> Result<Vec<String>, SourceError>;

    async fn fetch(&self, table: &str) -> Result<RecordSet, SourceError>;
}

// ---------- Postgres catalog source ----------

pub struct PostgresSource {
    pool: Connection,
}

impl PostgresSource {
    pub fn new(pool: Connection) -> Self {
        Self { pool }
    }

    fn unavailable(&self, err: sqlx::Error) -> SourceError {
        SourceError::Unavailable {
            source_name: self.source_name().to_string(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl RecordSource for PostgresSource {
    fn source_name(&self) -> &str {
        "postgres"
    }

    fn layout(&self) -> StagingLayout {
        StagingLayout::TableFirst
    }

    async fn table_names(&self) -> Result<Vec<String>, SourceError> {
        let rows = sqlx::query(
            "SELECT table_name FROM information_schema.tables
              WHERE table_schema = 'public' AND table_type = 'BASE TABLE'
              ORDER BY table_name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| self.unavailable(e))?;

        Ok(rows
            .iter()
            .map(|r| r.get::<String, _>("table_name"))
            .collect())
    }

    async fn fetch(&self, table: &str) -> Result<RecordSet, SourceError> {
        let sql = format!("SELECT * FROM {}", quote_ident(table));
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.unavailable(e))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(decode_pg_row(table, row)?);
        }
        debug!(table, rows = records.len(), "fetched postgres table");
        Ok(RecordSet::new(table, records))
    }
}

/// Decode one Postgres row into a `Record` by driver type tag. The value
/// kind is taken from the column's type info, never inferred from a
/// stringified representation.
fn decode_pg_row(table: &str, row: &PgRow) -> Result<Record, SourceError> {
    let mut record = Record::new();
    for (idx, col) in row.columns().iter().enumerate() {
        let value = decode_pg_value(row, idx, col.type_info().name()).map_err(|e| {
            SourceError::Decode {
                table: table.to_string(),
                column: col.name().to_string(),
                reason: e.to_string(),
            }
        })?;
        record.insert(col.name(), value);
    }
    Ok(record)
}

fn decode_pg_value(row: &PgRow, idx: usize, type_name: &str) -> Result<Value, sqlx::Error> {
    let value = match type_name {
        "INT2" => row
            .try_get::<Option<i16>, _>(idx)?
            .map_or(Value::Null, |v| Value::Int(i64::from(v))),
        "INT4" => row
            .try_get::<Option<i32>, _>(idx)?
            .map_or(Value::Null, |v| Value::Int(i64::from(v))),
        "INT8" => row
            .try_get::<Option<i64>, _>(idx)?
            .map_or(Value::Null, Value::Int),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(idx)?
            .map_or(Value::Null, |v| Value::Real(f64::from(v))),
        "FLOAT8" => row
            .try_get::<Option<f64>, _>(idx)?
            .map_or(Value::Null, Value::Real),
        "NUMERIC" => row
            .try_get::<Option<Decimal>, _>(idx)?
            .map_or(Value::Null, |d| Value::Real(d.to_f64().unwrap_or(f64::NAN))),
        "BOOL" => row
            .try_get::<Option<bool>, _>(idx)?
            .map_or(Value::Null, |b| Value::Int(i64::from(b))),
        "DATE" => row
            .try_get::<Option<NaiveDate>, _>(idx)?
            .map_or(Value::Null, Value::Date),
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(idx)?
            .map_or(Value::Null, |t| Value::Text(t.to_rfc3339())),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(idx)?
            .map_or(Value::Null, |t| Value::Text(t.to_string())),
        "BYTEA" => row
            .try_get::<Option<Vec<u8>>, _>(idx)?
            .map_or(Value::Null, Value::Bytes),
        // TEXT, VARCHAR, BPCHAR, NAME and anything else that decodes as text
        _ => row
            .try_get::<Option<String>, _>(idx)?
            .map_or(Value::Null, Value::Text),
    };
    Ok(value)
}

// ---------- flat CSV source ----------

pub struct CsvSource {
    table: String,
    path: PathBuf,
}

impl CsvSource {
    pub fn new(table: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            table: table.into(),
            path: path.into(),
        }
    }
}

#[async_trait]
impl RecordSource for CsvSource {
    fn source_name(&self) -> &str {
        "csv"
    }

    fn layout(&self) -> StagingLayout {
        StagingLayout::DateFirst
    }

    async fn table_names(&self) -> Result<Vec<String>, SourceError> {
        Ok(vec![self.table.clone()])
    }

    async fn fetch(&self, table: &str) -> Result<RecordSet, SourceError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)
            .map_err(|e| SourceError::Unavailable {
                source_name: self.source_name().to_string(),
                reason: format!("{}: {e}", self.path.display()),
            })?;

        let headers = reader.headers()?.clone();
        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            let mut record = Record::new();
            for (name, cell) in headers.iter().zip(row.iter()) {
                record.insert(name, sniff_cell(cell));
            }
            records.push(record);
        }
        debug!(table, rows = records.len(), "read csv table");
        Ok(RecordSet::new(table, records))
    }
}

/// CSV cells carry no type tag; narrowest numeric reading wins.
fn sniff_cell(cell: &str) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    if let Ok(v) = cell.parse::<i64>() {
        return Value::Int(v);
    }
    if let Ok(v) = cell.parse::<f64>() {
        return Value::Real(v);
    }
    Value::Text(cell.to_string())
}
