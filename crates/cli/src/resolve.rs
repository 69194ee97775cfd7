use anyhow::Result;
use medoid_core::capture_time;
use medoid_core::config::AppConfig;
use medoid_core::manifest;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedView {
    pub id: String,
    pub path: String,
    pub resolved_datetime: Option<String>,
    pub trust_score: f32,
    pub signals_used: Vec<String>,
    pub discarded: Vec<String>,
    pub date_uncertain: bool,
}

/// Resolves capture times for every asset in the manifest without clustering.
pub fn resolve_manifest(cfg: &AppConfig, manifest_path: &Path) -> Result<Vec<ResolvedView>> {
    cfg.validate()?;
    let manifest = manifest::load_manifest(manifest_path)?;
    let resolved = capture_time::resolve_all(&manifest.assets, &cfg.dates);
    Ok(manifest
        .assets
        .iter()
        .zip(resolved)
        .map(|(asset, r)| ResolvedView {
            id: asset.id.clone(),
            path: asset.path.clone(),
            resolved_datetime: r
                .resolved_datetime
                .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
            trust_score: r.trust_score,
            signals_used: r.signals_used.iter().map(|s| s.to_string()).collect(),
            discarded: r.discarded.iter().map(|s| s.to_string()).collect(),
            date_uncertain: r.date_uncertain,
        })
        .collect())
}
