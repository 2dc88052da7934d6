//! Order aggregation: rebuild nested order documents out of a merged store.
//!
//! The join is a deterministic nested loop: for each order, collect its
//! details in original relative order; for each detail, attach the single
//! matching product under `product_bought` (a dangling foreign key leaves
//! the field absent). Complexity is O(|orders|*|details| + |details|*|products|),
//! a deliberate choice for single-business-day volumes; this is not built to
//! scale to large detail sets.

use chrono::{DateTime, NaiveDate, Utc};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::duck::{SnapshotStore, StoreError};
use crate::models::{MergedOrder, OrderDetail, QueryReport};
use crate::paths::query_output_path;
use ol_types::{DateError, Record, Value, ensure_not_future, parse_snapshot_date};

const ORDERS_TABLE: &str = "orders";
const DETAILS_TABLE: &str = "order_details";
const PRODUCTS_TABLE: &str = "products";

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid query date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("query date {0} is in the future")]
    FutureDate(NaiveDate),
    #[error("no usable merged store for {date}")]
    MissingSnapshot { date: NaiveDate },
    #[error("products are not unique on product_id (duplicate key {product_id})")]
    DuplicateProduct { product_id: String },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("cannot write query output: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot encode query output: {0}")]
    Json(#[from] serde_json::Error),
}

/// Validate `date_input`, join orders/details/products from the merged
/// store for that date, and persist one immutable output document named by
/// the query date plus the generation timestamp. Validation happens before
/// any storage access; a rejected date leaves no output file.
pub fn aggregate_orders(
    store_root: &Path,
    query_root: &Path,
    date_input: &str,
    now: DateTime<Utc>,
) -> Result<QueryReport, QueryError> {
    let date = parse_snapshot_date(date_input)
        .map_err(|_| QueryError::InvalidDate(date_input.to_string()))?;
    match ensure_not_future(date, now.date_naive()) {
        Ok(()) => {}
        Err(DateError::Future(d)) => return Err(QueryError::FutureDate(d)),
        Err(DateError::Invalid(s)) => return Err(QueryError::InvalidDate(s)),
    }

    let store = match SnapshotStore::open_authoritative(store_root, date) {
        Ok(store) => store,
        Err(StoreError::MissingSnapshot { date } | StoreError::NotAuthoritative { date }) => {
            return Err(QueryError::MissingSnapshot { date });
        }
        Err(e) => return Err(e.into()),
    };

    let orders = fetch_required(&store, ORDERS_TABLE, date)?;
    let details = fetch_required(&store, DETAILS_TABLE, date)?;
    let products = fetch_required(&store, PRODUCTS_TABLE, date)?;

    assert_unique_product_ids(&products)?;

    let merged = join_orders(&orders, &details, &products);

    std::fs::create_dir_all(query_root)?;
    let output_path = query_output_path(query_root, date, now.naive_utc());
    let file = BufWriter::new(File::create(&output_path)?);
    serde_json::to_writer_pretty(file, &merged)?;

    info!(
        %date,
        orders = merged.len(),
        output = %output_path.display(),
        "query output written"
    );
    Ok(QueryReport {
        date,
        orders: merged.len(),
        generated_at: now,
        output_path,
    })
}

/// All three record sets must be retrievable in full; anything else means
/// the date was never merged (or the store is unusable) and the query fails
/// with no partial output.
fn fetch_required(
    store: &SnapshotStore,
    table: &str,
    date: NaiveDate,
) -> Result<Vec<Record>, QueryError> {
    store.query_table(table).map_err(|e| {
        warn!(%date, table, error = %e, "required record set unavailable");
        QueryError::MissingSnapshot { date }
    })
}

/// product_id is asserted unique rather than silently taking the first
/// match when duplicates slip in. Null keys are skipped: a record with no
/// product_id can never be joined against, so it cannot collide either.
fn assert_unique_product_ids(products: &[Record]) -> Result<(), QueryError> {
    for (idx, product) in products.iter().enumerate() {
        let Some(id) = product.get("product_id") else {
            continue;
        };
        if id.is_null() {
            continue;
        }
        if products[..idx]
            .iter()
            .any(|earlier| earlier.get("product_id") == Some(id))
        {
            return Err(QueryError::DuplicateProduct {
                product_id: display_key(id),
            });
        }
    }
    Ok(())
}

fn join_orders(orders: &[Record], details: &[Record], products: &[Record]) -> Vec<MergedOrder> {
    orders
        .iter()
        .map(|order| {
            let order_details = details
                .iter()
                .filter(|detail| keys_match(order.get("order_id"), detail.get("order_id")))
                .map(|detail| OrderDetail {
                    detail: detail.clone(),
                    product_bought: products
                        .iter()
                        .find(|product| {
                            keys_match(detail.get("product_id"), product.get("product_id"))
                        })
                        .cloned(),
                })
                .collect();
            MergedOrder {
                order: order.clone(),
                details: order_details,
            }
        })
        .collect()
}

/// Join keys only match when both sides are present and equal; a missing
/// key on either side never pairs with another missing key.
fn keys_match(left: Option<&Value>, right: Option<&Value>) -> bool {
    match (left, right) {
        (Some(l), Some(r)) => !l.is_null() && l == r,
        _ => false,
    }
}

fn display_key(value: &Value) -> String {
    match value {
        Value::Int(v) => v.to_string(),
        Value::Real(v) => v.to_string(),
        Value::Text(s) => s.clone(),
        other => format!("{other:?}"),
    }
}
