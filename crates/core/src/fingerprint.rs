//! Content-addressed run fingerprint. Callers compare fingerprints to decide
//! whether a stored report is still valid; the engine itself keeps no state.

use crate::config::{ClusterConfig, DateConfig};
use crate::models::Asset;
use serde::Serialize;

#[derive(Serialize)]
struct FingerprintInput<'a> {
    version: u32,
    cluster: &'a ClusterConfig,
    dates: &'a DateConfig,
    assets: Vec<&'a Asset>,
}

/// blake3 over a canonical JSON encoding of the assets (sorted by id) and the
/// tuning sections of the config. Database location is not part of it.
pub fn run_fingerprint(
    assets: &[Asset],
    cluster: &ClusterConfig,
    dates: &DateConfig,
) -> anyhow::Result<String> {
    let mut sorted: Vec<&Asset> = assets.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.path.cmp(&b.path)));
    let input = FingerprintInput {
        version: 1,
        cluster,
        dates,
        assets: sorted,
    };
    let bytes = serde_json::to_vec(&input)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}
