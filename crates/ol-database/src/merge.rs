//! Per-date merge orchestration: staged record sets in, one finalized
//! DuckDB store out.
//!
//! For every staged table of the date (deterministic table-name order):
//! load the staged JSON, infer the schema over the whole set, materialize,
//! insert every record. Record sets staged by different sources under the
//! same table name are concatenated (source-name order) and inferred as one
//! set, so the committed schema covers both. The first failing table aborts
//! the whole date and leaves the store non-finalized, which downstream reads
//! reject as non-authoritative.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::catalog::{CatalogError, DateSelector, SnapshotCatalog};
use crate::duck::{SnapshotStore, StoreError};
use crate::infer::{SchemaError, infer_schema};
use crate::models::{MergeReport, StagedSet, TableReport};
use ol_types::{Record, RecordSet};

#[derive(Debug, Error)]
pub enum MergeError {
    /// Nothing is staged for the date. Distinct from failure; reprocessing
    /// an unknown date is a no-op with a warning.
    #[error("no staged record sets for {date}")]
    NoStagedData { date: NaiveDate },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Store(#[from] StoreError),
    /// One table failed mid-regeneration; the whole date's store is left
    /// non-authoritative.
    #[error("merge for {date} aborted at table '{table}': {source}")]
    Table {
        date: NaiveDate,
        table: String,
        #[source]
        source: TableMergeError,
    },
}

#[derive(Debug, Error)]
pub enum TableMergeError {
    #[error("cannot read staged file: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot decode staged records: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Regenerate the merged store for `date` from everything the catalog
/// resolves. All-or-nothing at table granularity.
pub fn merge_snapshot(
    catalog: &SnapshotCatalog,
    store_root: &Path,
    date: NaiveDate,
) -> Result<MergeReport, MergeError> {
    let staged = catalog.resolve(DateSelector::On(date))?;
    if staged.is_empty() {
        warn!(%date, "no staged record sets for date, nothing to merge");
        return Err(MergeError::NoStagedData { date });
    }

    // Group by table name; sets within one table keep source-name order so
    // regeneration is deterministic.
    let mut by_table: BTreeMap<String, Vec<StagedSet>> = BTreeMap::new();
    for set in staged {
        by_table.entry(set.table.clone()).or_default().push(set);
    }

    let mut store = SnapshotStore::create(store_root, date)?;
    let mut tables = Vec::with_capacity(by_table.len());

    for (table, sets) in by_table {
        match merge_table(&mut store, &table, &sets) {
            Ok(Some(report)) => tables.push(report),
            Ok(None) => {}
            Err(source) => {
                error!(%date, table, error = %source, "table merge failed, aborting date");
                return Err(MergeError::Table {
                    date,
                    table,
                    source,
                });
            }
        }
    }

    store.finalize()?;
    let report = MergeReport { date, tables };
    info!(
        %date,
        tables = report.tables.len(),
        rows = report.total_rows(),
        "merged snapshot regenerated"
    );
    Ok(report)
}

fn merge_table(
    store: &mut SnapshotStore,
    table: &str,
    sets: &[StagedSet],
) -> Result<Option<TableReport>, TableMergeError> {
    let mut records: Vec<Record> = Vec::new();
    for set in sets {
        let file = BufReader::new(File::open(&set.path)?);
        let mut batch: Vec<Record> = serde_json::from_reader(file)?;
        records.append(&mut batch);
    }

    if records.is_empty() {
        warn!(table, "staged record set is empty, table not materialized");
        return Ok(None);
    }

    let set = RecordSet::new(table, records);
    let schema = infer_schema(&set)?;
    store.materialize(table, &schema)?;
    for record in &set.records {
        store.insert(table, record)?;
    }

    Ok(Some(TableReport {
        table: table.to_string(),
        rows: set.len(),
    }))
}
