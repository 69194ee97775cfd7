//! Reads the asset manifest produced by the scanning and embedding stages.

use crate::models::Asset;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    /// Collection root the asset paths are relative to.
    #[serde(default)]
    pub root: Option<String>,
    pub assets: Vec<Asset>,
}

pub fn load_manifest(path: &Path) -> anyhow::Result<Manifest> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading manifest {}", path.display()))?;
    let manifest = parse_manifest(&content)
        .with_context(|| format!("parsing manifest {}", path.display()))?;
    info!(assets = manifest.assets.len(), path = %path.display(), "loaded manifest");
    Ok(manifest)
}

pub fn parse_manifest(content: &str) -> anyhow::Result<Manifest> {
    let mut manifest: Manifest = serde_json::from_str(content)?;
    for asset in manifest.assets.iter_mut() {
        asset.path = asset.path.replace('\\', "/");
    }
    Ok(manifest)
}
