//! Snapshot catalog: which staged data exists for which date.
//!
//! The staging tree tolerates two layouts per source directory, and both
//! must resolve to the same logical result:
//!   table-first: `data/<source>/<table>/<date>/<table>.json`
//!   date-first:  `data/<source>/<date>/<table>.json`
//! Resolution is one explicit walk over the tree; a (table, path) pair can
//! appear at most once by construction.

use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use crate::models::StagedSet;
use ol_types::parse_snapshot_date;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("cannot read staging directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Which staged snapshot(s) to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSelector {
    On(NaiveDate),
    Latest,
}

pub struct SnapshotCatalog {
    data_root: PathBuf,
}

impl SnapshotCatalog {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
        }
    }

    /// Every staged set under the data root, across all dates and sources,
    /// sorted by (table, source, date).
    pub fn scan(&self) -> Result<Vec<StagedSet>, CatalogError> {
        let mut out = Vec::new();
        if !self.data_root.exists() {
            warn!(root = %self.data_root.display(), "staging root does not exist, nothing staged");
            return Ok(out);
        }
        for source_dir in list_dirs(&self.data_root)? {
            let source = dir_name(&source_dir);
            for entry in list_dirs(&source_dir)? {
                let name = dir_name(&entry);
                if let Ok(date) = parse_snapshot_date(&name) {
                    // date-first: files directly under the date directory
                    for file in list_json_files(&entry)? {
                        out.push(StagedSet {
                            table: file_table_name(&file),
                            source: source.clone(),
                            date,
                            path: file,
                        });
                    }
                } else {
                    // table-first: one more level of date directories
                    let table = name;
                    for date_dir in list_dirs(&entry)? {
                        let Ok(date) = parse_snapshot_date(&dir_name(&date_dir)) else {
                            warn!(dir = %date_dir.display(), "skipping non-date directory in staging tree");
                            continue;
                        };
                        for file in list_json_files(&date_dir)? {
                            out.push(StagedSet {
                                table: table.clone(),
                                source: source.clone(),
                                date,
                                path: file,
                            });
                        }
                    }
                }
            }
        }
        out.sort();
        out.dedup();
        Ok(out)
    }

    /// Dates for which staged data exists for `table`, regardless of whether
    /// a merged store exists for any of them.
    pub fn list_dates(&self, table: &str) -> Result<BTreeSet<NaiveDate>, CatalogError> {
        Ok(self
            .scan()?
            .into_iter()
            .filter(|s| s.table == table)
            .map(|s| s.date)
            .collect())
    }

    /// Latest date with any staged data at all.
    pub fn latest_date(&self) -> Result<Option<NaiveDate>, CatalogError> {
        Ok(self.scan()?.into_iter().map(|s| s.date).max())
    }

    /// True when at least one staged set exists for `date`.
    pub fn record_exists(&self, date: NaiveDate) -> Result<bool, CatalogError> {
        Ok(self.scan()?.iter().any(|s| s.date == date))
    }

    /// Staged sets for the selected date. `Latest` with an empty staging
    /// tree resolves to nothing.
    pub fn resolve(&self, selector: DateSelector) -> Result<Vec<StagedSet>, CatalogError> {
        let all = self.scan()?;
        let date = match selector {
            DateSelector::On(d) => Some(d),
            DateSelector::Latest => all.iter().map(|s| s.date).max(),
        };
        let Some(date) = date else {
            return Ok(Vec::new());
        };
        Ok(all.into_iter().filter(|s| s.date == date).collect())
    }
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_table_name(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn read_dir(path: &Path) -> Result<std::fs::ReadDir, CatalogError> {
    std::fs::read_dir(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn list_dirs(path: &Path) -> Result<Vec<PathBuf>, CatalogError> {
    let mut out = Vec::new();
    for entry in read_dir(path)? {
        let entry = entry.map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let p = entry.path();
        if p.is_dir() {
            out.push(p);
        }
    }
    out.sort();
    Ok(out)
}

fn list_json_files(path: &Path) -> Result<Vec<PathBuf>, CatalogError> {
    let mut out = Vec::new();
    for entry in read_dir(path)? {
        let entry = entry.map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let p = entry.path();
        if p.is_file() && p.extension().is_some_and(|e| e == "json") {
            out.push(p);
        }
    }
    out.sort();
    Ok(out)
}
