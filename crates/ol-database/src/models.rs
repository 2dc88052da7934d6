//! Entities shared by the catalog, merger, and query layers.

use chrono::{DateTime, NaiveDate, Utc};
use ol_types::Record;
use serde::Serialize;
use std::path::PathBuf;

/// One staged record-set file discovered under the data root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct StagedSet {
    pub table: String,
    pub source: String,
    pub date: NaiveDate,
    pub path: PathBuf,
}

/// Outcome of one table inside a merge.
#[derive(Debug, Clone, Serialize)]
pub struct TableReport {
    pub table: String,
    pub rows: usize,
}

/// Outcome of a whole-date merge.
#[derive(Debug, Clone, Serialize)]
pub struct MergeReport {
    pub date: NaiveDate,
    pub tables: Vec<TableReport>,
}

impl MergeReport {
    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|t| t.rows).sum()
    }
}

/// One order-detail line, enriched with the product it refers to when the
/// foreign key resolves. A dangling `product_id` simply leaves the field
/// absent from the output document.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub detail: Record,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_bought: Option<Record>,
}

/// The nested order/detail/product output document.
#[derive(Debug, Clone, Serialize)]
pub struct MergedOrder {
    pub order: Record,
    pub details: Vec<OrderDetail>,
}

/// Outcome of one aggregation query, including where the immutable output
/// document landed.
#[derive(Debug, Clone)]
pub struct QueryReport {
    pub date: NaiveDate,
    pub orders: usize,
    pub generated_at: DateTime<Utc>,
    pub output_path: PathBuf,
}
