use chrono::NaiveDate;
use ol_database::catalog::{DateSelector, SnapshotCatalog};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn stage_table_first(root: &Path, source: &str, table: &str, date: &str) {
    let dir = root.join(source).join(table).join(date);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(format!("{table}.json")), "[]").unwrap();
}

fn stage_date_first(root: &Path, source: &str, table: &str, date: &str) {
    let dir = root.join(source).join(date);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(format!("{table}.json")), "[]").unwrap();
}

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[test]
fn test_both_layouts_resolve_identically() {
    let tmp = TempDir::new().unwrap();
    stage_table_first(tmp.path(), "postgres", "orders", "2024-03-09");
    stage_date_first(tmp.path(), "csv", "order_details", "2024-03-09");

    let catalog = SnapshotCatalog::new(tmp.path());
    let sets = catalog.resolve(DateSelector::On(d("2024-03-09"))).unwrap();
    assert_eq!(sets.len(), 2);

    let tables: Vec<&str> = sets.iter().map(|s| s.table.as_str()).collect();
    assert_eq!(tables, vec!["order_details", "orders"]);
    assert!(sets.iter().all(|s| s.date == d("2024-03-09")));
}

#[test]
fn test_resolution_never_duplicates_a_staged_path() {
    let tmp = TempDir::new().unwrap();
    stage_table_first(tmp.path(), "postgres", "orders", "2024-03-09");
    stage_table_first(tmp.path(), "postgres", "products", "2024-03-09");
    stage_date_first(tmp.path(), "csv", "order_details", "2024-03-09");

    let catalog = SnapshotCatalog::new(tmp.path());
    let sets = catalog.resolve(DateSelector::On(d("2024-03-09"))).unwrap();
    let mut paths: Vec<_> = sets.iter().map(|s| s.path.clone()).collect();
    let total = paths.len();
    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), total, "a staged file resolved more than once");
}

#[test]
fn test_list_dates_per_table() {
    let tmp = TempDir::new().unwrap();
    stage_table_first(tmp.path(), "postgres", "orders", "2024-03-08");
    stage_table_first(tmp.path(), "postgres", "orders", "2024-03-09");
    stage_table_first(tmp.path(), "postgres", "products", "2024-03-09");

    let catalog = SnapshotCatalog::new(tmp.path());
    let dates = catalog.list_dates("orders").unwrap();
    assert_eq!(
        dates.into_iter().collect::<Vec<_>>(),
        vec![d("2024-03-08"), d("2024-03-09")]
    );
    assert_eq!(catalog.list_dates("products").unwrap().len(), 1);
    assert!(catalog.list_dates("nothing").unwrap().is_empty());
}

#[test]
fn test_latest_selects_max_date_across_sources() {
    let tmp = TempDir::new().unwrap();
    stage_table_first(tmp.path(), "postgres", "orders", "2024-03-08");
    stage_date_first(tmp.path(), "csv", "order_details", "2024-03-10");

    let catalog = SnapshotCatalog::new(tmp.path());
    assert_eq!(catalog.latest_date().unwrap(), Some(d("2024-03-10")));

    let latest = catalog.resolve(DateSelector::Latest).unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].table, "order_details");
}

#[test]
fn test_record_exists_and_unknown_dates() {
    let tmp = TempDir::new().unwrap();
    stage_table_first(tmp.path(), "postgres", "orders", "2024-03-09");

    let catalog = SnapshotCatalog::new(tmp.path());
    assert!(catalog.record_exists(d("2024-03-09")).unwrap());
    assert!(!catalog.record_exists(d("1999-01-01")).unwrap());
    assert!(
        catalog
            .resolve(DateSelector::On(d("1999-01-01")))
            .unwrap()
            .is_empty()
    );
}

#[test]
fn test_missing_staging_root_is_empty_not_an_error() {
    let tmp = TempDir::new().unwrap();
    let catalog = SnapshotCatalog::new(tmp.path().join("never_created"));
    assert!(catalog.scan().unwrap().is_empty());
    assert_eq!(catalog.latest_date().unwrap(), None);
}
