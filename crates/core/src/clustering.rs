//! Per-window clustering: an optional pass that groups assets sharing a
//! dominant tag, then either one folder cluster per folder (simple mode) or a
//! greedy cosine-similarity sweep (hybrid mode) over whatever is left.

use crate::config::{ClusterConfig, ClusterMode};
use crate::medoid::cosine;
use crate::models::{Asset, ClusterDraft, ClusterType, TimeWindow};
use std::collections::BTreeMap;
use tracing::debug;

pub const RESIDUAL_HINT: &str = "residual";

/// Clusters one window. `unit_vectors` holds the normalized embedding of
/// every asset in the run, indexed like `assets`.
pub fn cluster_window(
    window: &TimeWindow,
    assets: &[Asset],
    unit_vectors: &[Vec<f32>],
    cfg: &ClusterConfig,
) -> Vec<ClusterDraft> {
    let mut pool = window.members.clone();
    pool.sort_by(|&a, &b| assets[a].id.cmp(&assets[b].id));

    let mut drafts = Vec::new();
    let remaining = if cfg.runs_tag_pass() {
        let (groups, rest) = tag_pass(&pool, assets, cfg.min_tag_cluster_size);
        for (tag, members) in groups {
            drafts.push(ClusterDraft {
                window: window.index,
                cluster_type: ClusterType::Tag,
                cluster_tag: Some(tag.clone()),
                label_hint: Some(tag),
                members,
            });
        }
        rest
    } else {
        pool
    };

    if remaining.is_empty() {
        return drafts;
    }

    match cfg.mode {
        ClusterMode::Simple => {
            let mut by_folder: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
            for idx in remaining {
                by_folder.entry(assets[idx].folder()).or_default().push(idx);
            }
            for members in by_folder.into_values() {
                drafts.push(ClusterDraft {
                    window: window.index,
                    cluster_type: ClusterType::Folder,
                    cluster_tag: None,
                    label_hint: None,
                    members,
                });
            }
        }
        ClusterMode::Hybrid => {
            let sweep = embedding_sweep(
                &remaining,
                unit_vectors,
                cfg.embedding_threshold,
                cfg.max_embedding_clusters,
            );
            for (n, members) in sweep.clusters.into_iter().enumerate() {
                drafts.push(ClusterDraft {
                    window: window.index,
                    cluster_type: ClusterType::Embedding,
                    cluster_tag: None,
                    label_hint: Some(format!("embedding_{}", n + 1)),
                    members,
                });
            }
            if !sweep.leftover.is_empty() {
                drafts.push(ClusterDraft {
                    window: window.index,
                    cluster_type: ClusterType::Folder,
                    cluster_tag: None,
                    label_hint: Some(RESIDUAL_HINT.to_string()),
                    members: sweep.leftover,
                });
            }
        }
    }

    debug!(
        window = window.index,
        assets = window.members.len(),
        clusters = drafts.len(),
        "clustered window"
    );
    drafts
}

/// Groups `pool` by dominant tag. Groups smaller than `min_size` are dropped
/// back into the remainder. Groups come out largest first, then by tag.
pub fn tag_pass(
    pool: &[usize],
    assets: &[Asset],
    min_size: usize,
) -> (Vec<(String, Vec<usize>)>, Vec<usize>) {
    let mut buckets: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for &idx in pool {
        if let Some(tag) = assets[idx].dominant_tag() {
            buckets.entry(tag).or_default().push(idx);
        }
    }

    let mut groups: Vec<(String, Vec<usize>)> = buckets
        .into_iter()
        .filter(|(_, members)| members.len() >= min_size)
        .collect();
    groups.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(&b.0)));

    let grouped: std::collections::HashSet<usize> =
        groups.iter().flat_map(|(_, m)| m.iter().copied()).collect();
    let rest = pool
        .iter()
        .copied()
        .filter(|idx| !grouped.contains(idx))
        .collect();
    (groups, rest)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepResult {
    pub clusters: Vec<Vec<usize>>,
    /// Assets still unclustered when the cluster cap was reached.
    pub leftover: Vec<usize>,
}

/// Summed similarities closer than this count as a tie, so rounding in the
/// running totals never decides the seed.
const TOTAL_TIE_EPSILON: f64 = 1e-9;

/// Greedy neighbourhood extraction. Each step takes the pool member whose
/// neighbourhood (members with cosine >= `threshold`, itself included) is
/// largest, breaking ties by summed similarity and then by pool order, and
/// removes that neighbourhood as one cluster. Centroids are never recomputed
/// between steps.
///
/// Neighbour lists are built once; each extraction only subtracts the removed
/// members from their surviving neighbours' counts and totals.
#[allow(clippy::needless_range_loop)]
pub fn embedding_sweep(
    pool: &[usize],
    unit_vectors: &[Vec<f32>],
    threshold: f32,
    max_clusters: usize,
) -> SweepResult {
    let n = pool.len();
    let mut neighbours: Vec<Vec<(usize, f32)>> = vec![Vec::new(); n];
    for i in 0..n {
        for j in (i + 1)..n {
            let s = cosine(&unit_vectors[pool[i]], &unit_vectors[pool[j]]);
            if s >= threshold {
                neighbours[i].push((j, s));
                neighbours[j].push((i, s));
            }
        }
    }

    let mut count: Vec<usize> = neighbours.iter().map(|nb| nb.len() + 1).collect();
    let mut total: Vec<f64> = neighbours
        .iter()
        .map(|nb| 1.0 + nb.iter().map(|&(_, s)| f64::from(s)).sum::<f64>())
        .collect();
    let mut alive = vec![true; n];
    let mut remaining = n;
    let mut result = SweepResult::default();

    while remaining > 0 {
        if max_clusters > 0 && result.clusters.len() >= max_clusters {
            break;
        }
        let Some(seed) = pick_seed(&alive, &count, &total) else {
            break;
        };

        let mut members: Vec<usize> = std::iter::once(seed)
            .chain(neighbours[seed].iter().map(|&(j, _)| j).filter(|&j| alive[j]))
            .collect();
        members.sort_unstable();
        for &m in &members {
            alive[m] = false;
        }
        remaining -= members.len();
        for &m in &members {
            for &(j, s) in &neighbours[m] {
                if alive[j] {
                    count[j] -= 1;
                    total[j] -= f64::from(s);
                }
            }
        }
        result.clusters.push(members.into_iter().map(|j| pool[j]).collect());
    }

    result.leftover = (0..n).filter(|&j| alive[j]).map(|j| pool[j]).collect();
    result
}

fn pick_seed(alive: &[bool], count: &[usize], total: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for i in (0..alive.len()).filter(|&i| alive[i]) {
        let better = match best {
            None => true,
            Some(b) => {
                count[i] > count[b]
                    || (count[i] == count[b] && total[i] - total[b] > TOTAL_TIE_EPSILON)
            }
        };
        if better {
            best = Some(i);
        }
    }
    best
}
