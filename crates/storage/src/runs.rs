use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

/// A stored clustering run. The report is kept as the JSON the CLI produced
/// so the ledger stays independent of the engine's types.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct RunRecord {
    pub fingerprint: String,
    pub created_at: i64,
    pub asset_count: i64,
    pub window_count: i64,
    pub cluster_count: i64,
    pub mode: String,
    pub report_json: String,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct RunListing {
    pub fingerprint: String,
    pub created_at: i64,
    pub asset_count: i64,
    pub window_count: i64,
    pub cluster_count: i64,
    pub mode: String,
}

#[derive(Debug, Clone)]
pub struct NewRun<'a> {
    pub fingerprint: &'a str,
    pub asset_count: usize,
    pub window_count: usize,
    pub cluster_count: usize,
    pub mode: &'a str,
    pub report_json: &'a str,
}

/// Stores a run, replacing any earlier report under the same fingerprint.
pub async fn record_run(pool: &SqlitePool, run: &NewRun<'_>) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO runs (fingerprint, created_at, asset_count, window_count, cluster_count, mode, report_json)
        VALUES (?1, strftime('%s','now'), ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(fingerprint) DO UPDATE SET
            created_at = excluded.created_at,
            asset_count = excluded.asset_count,
            window_count = excluded.window_count,
            cluster_count = excluded.cluster_count,
            mode = excluded.mode,
            report_json = excluded.report_json
        "#,
    )
    .bind(run.fingerprint)
    .bind(run.asset_count as i64)
    .bind(run.window_count as i64)
    .bind(run.cluster_count as i64)
    .bind(run.mode)
    .bind(run.report_json)
    .execute(pool)
    .await?;
    debug!(fingerprint = run.fingerprint, "recorded run");
    Ok(())
}

pub async fn find_run(pool: &SqlitePool, fingerprint: &str) -> anyhow::Result<Option<RunRecord>> {
    let record = sqlx::query_as::<_, RunRecord>(
        "SELECT fingerprint, created_at, asset_count, window_count, cluster_count, mode, report_json \
         FROM runs WHERE fingerprint = ?1",
    )
    .bind(fingerprint)
    .fetch_optional(pool)
    .await?;
    Ok(record)
}

/// Newest first.
pub async fn list_runs(pool: &SqlitePool) -> anyhow::Result<Vec<RunListing>> {
    let rows = sqlx::query_as::<_, RunListing>(
        "SELECT fingerprint, created_at, asset_count, window_count, cluster_count, mode \
         FROM runs ORDER BY created_at DESC, fingerprint ASC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn pool() -> SqlitePool {
        let pool = crate::connect("sqlite::memory:").await.unwrap();
        crate::migrate(&pool).await.unwrap();
        pool
    }

    fn run<'a>(fingerprint: &'a str, report_json: &'a str) -> NewRun<'a> {
        NewRun {
            fingerprint,
            asset_count: 10,
            window_count: 2,
            cluster_count: 3,
            mode: "hybrid",
            report_json,
        }
    }

    #[tokio::test]
    async fn record_then_find() {
        let pool = pool().await;
        assert!(find_run(&pool, "abc").await.unwrap().is_none());

        record_run(&pool, &run("abc", "{\"rows\":[]}")).await.unwrap();
        let stored = find_run(&pool, "abc").await.unwrap().unwrap();
        assert_eq!(stored.asset_count, 10);
        assert_eq!(stored.mode, "hybrid");
        assert_eq!(stored.report_json, "{\"rows\":[]}");
    }

    #[tokio::test]
    async fn rerun_replaces_report_wholesale() {
        let pool = pool().await;
        record_run(&pool, &run("abc", "old")).await.unwrap();
        record_run(&pool, &run("abc", "new")).await.unwrap();
        let listed = list_runs(&pool).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(find_run(&pool, "abc").await.unwrap().unwrap().report_json, "new");
    }

    #[tokio::test]
    async fn file_database_is_created_on_demand() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("nested").join("ledger.db");
        let pool = crate::connect(&path.to_string_lossy()).await.unwrap();
        crate::migrate(&pool).await.unwrap();
        record_run(&pool, &run("f1", "{}")).await.unwrap();
        assert!(path.exists());
    }
}
