//! Order Lake database crate
//!
//! This crate turns two heterogeneous sources (a Postgres catalog export and
//! a flat CSV file) into one dated DuckDB snapshot, then reassembles nested
//! order documents out of it:
//! - Staged JSON record sets on disk, one file per (source table, snapshot date).
//! - A snapshot catalog resolving which staged data exists for which date,
//!   tolerant of both the date-first and table-first staging layouts.
//! - Whole-set schema inference over ragged records, widening across
//!   {integer, real, text} with explicit blob classification.
//! - A per-date DuckDB store that materializes inferred tables, enforces the
//!   committed schema on insert, and marks itself authoritative only once
//!   every table merged.
//! - A nested-loop order/detail/product aggregation that persists immutable,
//!   timestamped query documents.
//!
//! Key modules:
//! - `sources`: `RecordSource` trait plus the Postgres and CSV providers.
//! - `stage`: fetch-everything-and-write-JSON staging step.
//! - `catalog`: staged-data discovery (`list_dates`, `resolve`, `record_exists`).
//! - `infer`: `InferredSchema` derivation for one record set.
//! - `duck`: the `SnapshotStore` DuckDB wrapper (materialize/insert/query).
//! - `merge`: per-date merge orchestration with table-granular abort.
//! - `queries`: order aggregation and query-output persistence.
//!
//! To get started, stage data via `stage::stage_all`, merge a date with
//! `merge::merge_snapshot`, then query it with `queries::aggregate_orders`.

pub mod catalog;
pub mod duck;
pub mod helpers;
pub mod infer;
pub mod init;
pub mod merge;
pub mod models;
pub mod paths;
pub mod queries;
pub mod sources;
pub mod stage;
