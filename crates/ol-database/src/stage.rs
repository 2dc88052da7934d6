//! Staging: pull every table from every source and write one JSON-array
//! file per (source table, snapshot date) under the data root, in the
//! layout the source declares. Staged files are the only input the merge
//! step reads; a run that fails here leaves no half-written file behind
//! beyond the one that errored.

use chrono::NaiveDate;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::sources::{RecordSource, SourceError};

#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot encode staged records: {0}")]
    Json(#[from] serde_json::Error),
}

/// Fetch and stage every table of every source for `date`. Returns the
/// staged file paths in write order.
pub async fn stage_all(
    sources: &[Box<dyn RecordSource>],
    data_root: &Path,
    date: NaiveDate,
) -> Result<Vec<PathBuf>, StageError> {
    let mut written = Vec::new();
    for source in sources {
        for table in source.table_names().await? {
            let set = source.fetch(&table).await?;
            let path = source
                .layout()
                .staged_file(data_root, source.source_name(), &table, date);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = BufWriter::new(File::create(&path)?);
            serde_json::to_writer_pretty(file, &set.records)?;
            info!(
                source = source.source_name(),
                table,
                rows = set.len(),
                path = %path.display(),
                "staged record set"
            );
            written.push(path);
        }
    }
    Ok(written)
}
