//! Authoritative path building for staged data, merged stores, and query
//! output. These names are part of the storage contract; changing them would
//! orphan existing snapshots.

use chrono::{NaiveDate, NaiveDateTime};
use std::path::{Path, PathBuf};

/// How one source arranges its staged files under the data root. Both
/// layouts are first-class and the catalog resolves them identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingLayout {
    /// `data/<source>/<table>/<date>/<table>.json`
    TableFirst,
    /// `data/<source>/<date>/<table>.json`
    DateFirst,
}

impl StagingLayout {
    pub fn staged_file(
        &self,
        data_root: &Path,
        source: &str,
        table: &str,
        date: NaiveDate,
    ) -> PathBuf {
        let day = date.format("%Y-%m-%d").to_string();
        let file = format!("{table}.json");
        match self {
            StagingLayout::TableFirst => data_root.join(source).join(table).join(day).join(file),
            StagingLayout::DateFirst => data_root.join(source).join(day).join(file),
        }
    }
}

/// `merged_store_date-YYYY-MM-DD.duckdb`
pub fn store_filename(date: NaiveDate) -> String {
    format!("merged_store_date-{}.duckdb", date.format("%Y-%m-%d"))
}

pub fn store_path(store_root: &Path, date: NaiveDate) -> PathBuf {
    store_root.join(store_filename(date))
}

/// `query_<date>_generated_at_<YYYY-MM-DD_HH-MM-SS>.json`: the generation
/// timestamp keeps repeated queries for one date from overwriting each other.
pub fn query_output_path(
    query_root: &Path,
    date: NaiveDate,
    generated_at: NaiveDateTime,
) -> PathBuf {
    query_root.join(format!(
        "query_{}_generated_at_{}.json",
        date.format("%Y-%m-%d"),
        generated_at.format("%Y-%m-%d_%H-%M-%S"),
    ))
}
