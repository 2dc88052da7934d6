use anyhow::{Context, bail};
use chrono::Utc;
use ol_database::catalog::SnapshotCatalog;
use ol_database::init::init_db;
use ol_database::merge::{MergeError, merge_snapshot};
use ol_database::queries::aggregate_orders;
use ol_database::sources::{CsvSource, PostgresSource, RecordSource};
use ol_database::stage::stage_all;
use ol_types::parse_snapshot_date;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing::{info, warn};

struct Config {
    data_root: PathBuf,
    store_root: PathBuf,
    query_root: PathBuf,
    csv_path: PathBuf,
    csv_table: String,
}

impl Config {
    fn from_env() -> Self {
        let var = |key: &str, default: &str| {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        };
        Self {
            data_root: PathBuf::from(var("OL_DATA_ROOT", "./data")),
            store_root: PathBuf::from(var("OL_STORE_ROOT", "./merged_stores")),
            query_root: PathBuf::from(var("OL_QUERY_ROOT", "./query_output")),
            csv_path: PathBuf::from(var("OL_CSV_PATH", "./source_data/order_details.csv")),
            csv_table: var("OL_CSV_TABLE", "order_details"),
        }
    }
}

fn usage() -> ! {
    eprintln!(
        "usage: order-lake <command>\n\
         \n\
         commands:\n\
         \x20 run                stage, merge and query for today\n\
         \x20 stage              pull both sources and stage today's record sets\n\
         \x20 merge <date>       regenerate the merged store for YYYY-MM-DD\n\
         \x20 query <date|latest>  aggregate orders for a merged date\n\
         \x20 reprocess <date>   regenerate then aggregate a past date"
    );
    std::process::exit(2);
}

fn build_sources(cfg: &Config) -> anyhow::Result<Vec<Box<dyn RecordSource>>> {
    let pool = init_db().context("initializing Postgres catalog source")?;
    Ok(vec![
        Box::new(PostgresSource::new(pool)),
        Box::new(CsvSource::new(cfg.csv_table.clone(), cfg.csv_path.clone())),
    ])
}

async fn stage(cfg: &Config) -> anyhow::Result<()> {
    let today = Utc::now().date_naive();
    let sources = build_sources(cfg)?;
    let written = stage_all(&sources, &cfg.data_root, today).await?;
    info!(files = written.len(), %today, "staging complete");
    Ok(())
}

/// Merge one date. A date with nothing staged is a warning, not a failure.
fn merge(cfg: &Config, date_input: &str) -> anyhow::Result<bool> {
    let date = parse_snapshot_date(date_input)?;
    let catalog = SnapshotCatalog::new(&cfg.data_root);
    match merge_snapshot(&catalog, &cfg.store_root, date) {
        Ok(report) => {
            info!(
                %date,
                tables = report.tables.len(),
                rows = report.total_rows(),
                "merge complete"
            );
            Ok(true)
        }
        Err(MergeError::NoStagedData { date }) => {
            warn!(%date, "date not found in the staging folders, nothing regenerated");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

fn query(cfg: &Config, date_input: &str) -> anyhow::Result<()> {
    let date = if date_input == "latest" {
        let catalog = SnapshotCatalog::new(&cfg.data_root);
        match catalog.latest_date()? {
            Some(d) => d.format("%Y-%m-%d").to_string(),
            None => bail!("no staged snapshots exist, nothing to query"),
        }
    } else {
        date_input.to_string()
    };
    let report = aggregate_orders(&cfg.store_root, &cfg.query_root, &date, Utc::now())?;
    info!(
        date = %report.date,
        orders = report.orders,
        output = %report.output_path.display(),
        "query complete"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::INFO)
        .with_target(true)
        .with_ansi(true)
        .compact()
        .init();
    let _ = dotenvy::dotenv();

    let cfg = Config::from_env();
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("");

    match command {
        "run" => {
            let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();
            stage(&cfg).await?;
            if merge(&cfg, &today)? {
                query(&cfg, &today)?;
            }
        }
        "stage" => stage(&cfg).await?,
        "merge" => {
            let date = args.get(2).map(String::as_str).unwrap_or_else(|| usage());
            merge(&cfg, date)?;
        }
        "query" => {
            let date = args.get(2).map(String::as_str).unwrap_or_else(|| usage());
            query(&cfg, date)?;
        }
        "reprocess" => {
            let date = args.get(2).map(String::as_str).unwrap_or_else(|| usage());
            if merge(&cfg, date)? {
                query(&cfg, date)?;
            }
        }
        _ => usage(),
    }
    Ok(())
}
