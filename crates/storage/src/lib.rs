//! Storage layer: SQLite run ledger.
//!
//! Holds DB pool setup, the migration runner and the ledger of completed
//! clustering runs keyed by run fingerprint.

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

pub mod runs;

/// Turns the configured ledger location into an SQLite URL. Locations that
/// already start with `sqlite:` (including `sqlite::memory:`) pass through.
pub fn ledger_url(location: &str) -> String {
    if location.starts_with("sqlite:") {
        return location.to_string();
    }
    let normalized = location.replace('\\', "/");
    if Path::new(location).is_absolute() {
        format!("sqlite:///{}", normalized.trim_start_matches('/'))
    } else {
        format!("sqlite://{normalized}")
    }
}

/// Opens the run ledger, creating the database file and its parent folder
/// on first use. In-memory ledgers are pinned to a single connection so every
/// query sees the same database.
pub async fn connect(location: &str) -> anyhow::Result<SqlitePool> {
    let url = ledger_url(location);
    if !location.starts_with("sqlite:") {
        if let Some(parent) = Path::new(location).parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating ledger folder {}", parent.display()))?;
        }
    }
    let options = SqliteConnectOptions::from_str(&url)
        .with_context(|| format!("parsing ledger url {url}"))?
        .create_if_missing(true);
    let max_connections = if url.contains(":memory:") { 1 } else { 5 };
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;
    debug!(%url, "ledger opened");
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
    // Creates the `runs` table; already-applied migrations are skipped.
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
