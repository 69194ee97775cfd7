use crate::config::AppConfig;
use crate::error::ClusterError;
use crate::models::{Asset, Cluster, ClusterReport, ResolvedTime, TimeWindow};
use crate::{capture_time, clustering, fingerprint, medoid, report, windows};
use chrono::Duration;
use rayon::prelude::*;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{info, warn};

pub struct RunOutput {
    pub fingerprint: String,
    pub resolved: Vec<ResolvedTime>,
    pub windows: Vec<TimeWindow>,
    pub clusters: Vec<Cluster>,
    pub report: ClusterReport,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RunSummary {
    pub assets: usize,
    pub windows: usize,
    pub clusters: usize,
    pub ambiguous_time: usize,
    pub discarded_signals: usize,
}

impl RunOutput {
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            assets: self.resolved.len(),
            windows: self.windows.len(),
            clusters: self.clusters.len(),
            ambiguous_time: self
                .resolved
                .iter()
                .filter(|r| r.resolved_datetime.is_none())
                .count(),
            discarded_signals: self.resolved.iter().map(|r| r.discarded.len()).sum(),
        }
    }
}

/// Checks config and input shape. Every fatal condition is raised here, so a
/// run that passes validation always produces a complete report. Assets with
/// no embedding at all are allowed and cluster as zero vectors.
pub fn validate(assets: &[Asset], config: &AppConfig) -> Result<(), ClusterError> {
    config.validate()?;
    let mut seen = HashSet::new();
    let mut dim: Option<usize> = None;
    for asset in assets {
        if !seen.insert(asset.id.as_str()) {
            return Err(ClusterError::DuplicateAsset(asset.id.clone()));
        }
        if asset.embedding.is_empty() {
            continue;
        }
        match dim {
            None => dim = Some(asset.embedding.len()),
            Some(expected) if expected != asset.embedding.len() => {
                return Err(ClusterError::DimensionMismatch {
                    id: asset.id.clone(),
                    expected,
                    found: asset.embedding.len(),
                })
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Resolve capture times, partition into windows, cluster each window,
/// pick medoids and assemble the report.
pub fn run(assets: &[Asset], config: &AppConfig) -> Result<RunOutput, ClusterError> {
    validate(assets, config)?;
    let started = Instant::now();
    let fingerprint = fingerprint::run_fingerprint(assets, &config.cluster, &config.dates)
        .map_err(|e| ClusterError::InvalidConfig(format!("cannot fingerprint run: {e}")))?;

    info!(assets = assets.len(), mode = ?config.cluster.mode, "Starting capture-time resolution...");
    let resolved = capture_time::resolve_all(assets, &config.dates);

    let gap = Duration::try_minutes(config.cluster.window_gap_minutes).ok_or_else(|| {
        ClusterError::InvalidConfig(format!(
            "window_gap_minutes {} is out of range",
            config.cluster.window_gap_minutes
        ))
    })?;
    let windows = windows::partition(assets, &resolved, gap);
    info!(windows = windows.len(), "Time windows built.");

    let dim = assets.iter().map(|a| a.embedding.len()).max().unwrap_or(0);
    let unit_vectors: Vec<Vec<f32>> = assets
        .iter()
        .map(|a| {
            if a.embedding.is_empty() {
                vec![0.0; dim]
            } else {
                medoid::normalize(&a.embedding)
            }
        })
        .collect();
    let degenerate = unit_vectors
        .iter()
        .filter(|v| v.iter().all(|x| *x == 0.0))
        .count();
    if degenerate > 0 {
        warn!(degenerate, "assets with zero-length embeddings");
    }

    // Windows are independent; each window's sweep stays sequential.
    let per_window: Vec<Vec<Cluster>> = windows
        .par_iter()
        .map(|w| {
            clustering::cluster_window(w, assets, &unit_vectors, &config.cluster)
                .into_iter()
                .filter_map(|draft| medoid::enrich(draft, assets, &unit_vectors))
                .collect()
        })
        .collect();
    let clusters: Vec<Cluster> = per_window.into_iter().flatten().collect();
    info!(clusters = clusters.len(), "Clustering complete.");

    let report = report::assemble(&clusters, assets);
    info!(
        rows = report.rows.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Report assembled."
    );

    Ok(RunOutput {
        fingerprint,
        resolved,
        windows,
        clusters,
        report,
    })
}
