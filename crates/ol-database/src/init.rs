use anyhow::{Context, anyhow};
use sqlx::{Pool, Postgres};

/// Shared Postgres connection type for the catalog source.
pub type Connection = Pool<Postgres>;

/// Expand a bare host spec into a full postgres URL. Docker-style specs are
/// tolerated: "host", "host:port", or "host:host_port:container_port" (the
/// container port is ignored). Credentials and database name come from the
/// environment.
fn pg_url_from_host_spec(spec: &str) -> String {
    let parts: Vec<&str> = spec.split(':').collect();
    let (host, port) = match parts.as_slice() {
        [h, host_port, _container_port] => (*h, *host_port),
        [h, p] => (*h, *p),
        [h] => (*h, "5432"),
        _ => ("127.0.0.1", "5432"),
    };
    let user = std::env::var("POSTGRES_USER").unwrap_or_else(|_| "postgres".to_string());
    let pass =
        std::env::var("POSTGRES_PASSWORD").unwrap_or_else(|_| "change-this-password".to_string());
    let db = std::env::var("OL_DB").unwrap_or_else(|_| "northwind".to_string());
    format!("postgres://{user}:{pass}@{host}:{port}/{db}")
}

fn load_env() {
    // .env wins; the checked-in example only keeps a fresh checkout runnable.
    let _ = dotenvy::from_filename(".env").or_else(|_| dotenvy::from_filename(".env.example"));
}

/// Lazy Postgres pool for the catalog source.
///
/// `DATABASE_URL` may be a full URL or a bare host spec (see
/// `pg_url_from_host_spec`). The pool connects on first use, so staging
/// against an unreachable database fails at fetch time, not here.
pub fn init_db() -> anyhow::Result<Connection> {
    load_env();

    let raw = std::env::var("DATABASE_URL").map_err(|_| {
        anyhow!("DATABASE_URL not set. Ensure .env exists or copy from .env.example.")
    })?;

    let url = if raw.contains("://") {
        raw
    } else {
        pg_url_from_host_spec(&raw)
    };

    let max_conns = std::env::var("OL_DB_MAX_CONNS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(4);
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(max_conns)
        .connect_lazy(&url)
        .with_context(|| format!("failed to create Postgres pool for URL '{url}'"))?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::pg_url_from_host_spec;

    #[test]
    fn expands_bare_host_specs() {
        assert!(pg_url_from_host_spec("db.local").ends_with("@db.local:5432/northwind"));
        assert!(pg_url_from_host_spec("db.local:6432").contains("@db.local:6432/"));
        // docker port-mapping form keeps the host side
        assert!(pg_url_from_host_spec("127.0.0.1:6432:5432").contains("@127.0.0.1:6432/"));
    }
}
