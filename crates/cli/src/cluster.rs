use anyhow::{Context, Result};
use medoid_core::config::{AppConfig, ClusterMode};
use medoid_core::manifest;
use medoid_core::models::ClusterReport;
use medoid_core::pipeline::{self, RunSummary};
use medoid_core::{fingerprint, report};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;
use storage::runs::{self, NewRun};
use tracing::info;

/// Command-line tuning values layered over the loaded config.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub mode: Option<String>,
    pub tag_aware: bool,
    pub window_gap_minutes: Option<i64>,
    pub embedding_threshold: Option<f32>,
    pub max_embedding_clusters: Option<usize>,
    pub min_tag_cluster_size: Option<usize>,
}

impl Overrides {
    pub fn apply(&self, cfg: &mut AppConfig) -> Result<()> {
        if let Some(mode) = &self.mode {
            cfg.cluster.mode = mode.parse::<ClusterMode>()?;
        }
        if self.tag_aware {
            cfg.cluster.tag_aware = true;
        }
        if let Some(gap) = self.window_gap_minutes {
            cfg.cluster.window_gap_minutes = gap;
        }
        if let Some(t) = self.embedding_threshold {
            cfg.cluster.embedding_threshold = t;
        }
        if let Some(n) = self.max_embedding_clusters {
            cfg.cluster.max_embedding_clusters = n;
        }
        if let Some(n) = self.min_tag_cluster_size {
            cfg.cluster.min_tag_cluster_size = n;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterOutcome {
    pub fingerprint: String,
    /// True when the report came from the ledger instead of a fresh run.
    pub reused: bool,
    pub summary: Option<RunSummary>,
    pub report: ClusterReport,
}

/// Runs the engine over a manifest, or returns the stored report when the
/// ledger already holds one for the same input and config.
pub async fn run_cluster(cfg: &AppConfig, manifest_path: &Path, force: bool) -> Result<ClusterOutcome> {
    let manifest = manifest::load_manifest(manifest_path)?;
    pipeline::validate(&manifest.assets, cfg)?;
    let fp = fingerprint::run_fingerprint(&manifest.assets, &cfg.cluster, &cfg.dates)?;

    let pool = storage::connect(&cfg.database.path).await.context("db connect")?;
    storage::migrate(&pool).await.context("db migrate")?;

    if !force {
        if let Some(stored) = runs::find_run(&pool, &fp).await? {
            info!(fingerprint = %fp, "Input unchanged since last run; reusing stored report.");
            let report: ClusterReport = serde_json::from_str(&stored.report_json)
                .context("decoding stored report")?;
            return Ok(ClusterOutcome {
                fingerprint: fp,
                reused: true,
                summary: None,
                report,
            });
        }
    }

    let assets = manifest.assets;
    let run_cfg = cfg.clone();
    let output = tokio::task::spawn_blocking(move || pipeline::run(&assets, &run_cfg))
        .await
        .context("clustering task panicked")??;

    let summary = output.summary();
    let report_json = serde_json::to_string(&output.report)?;
    let mode = match cfg.cluster.mode {
        ClusterMode::Simple => "simple",
        ClusterMode::Hybrid => "hybrid",
    };
    runs::record_run(
        &pool,
        &NewRun {
            fingerprint: &output.fingerprint,
            asset_count: summary.assets,
            window_count: summary.windows,
            cluster_count: summary.clusters,
            mode,
            report_json: &report_json,
        },
    )
    .await?;

    Ok(ClusterOutcome {
        fingerprint: output.fingerprint,
        reused: false,
        summary: Some(summary),
        report: output.report,
    })
}

/// Writes the CSV report to `output`, or to stdout when no path is given.
pub fn write_report(report: &ClusterReport, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            let file = fs::File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            report::write_csv(report, std::io::BufWriter::new(file))?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            report::write_csv(report, &mut lock)?;
            lock.flush()?;
        }
    }
    Ok(())
}
