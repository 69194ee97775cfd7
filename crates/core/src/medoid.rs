//! Medoid selection and the vector helpers shared with the clustering sweep.

use crate::models::{Asset, Cluster, ClusterDraft};

/// Returns a unit-length copy of `v`, or a zero vector when `v` has no length.
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return vec![0.0; v.len()];
    }
    v.iter().map(|x| x / norm).collect()
}

fn is_zero(v: &[f32]) -> bool {
    v.iter().all(|x| *x == 0.0)
}

/// Cosine similarity of two unit vectors. Two zero vectors count as
/// identical; a zero vector is dissimilar to everything else.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    match (is_zero(a), is_zero(b)) {
        (true, true) => 1.0,
        (true, false) | (false, true) => 0.0,
        _ => a
            .iter()
            .zip(b)
            .map(|(x, y)| x * y)
            .sum::<f32>()
            .clamp(-1.0, 1.0),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Medoid {
    /// Position within the member list that was passed in.
    pub position: usize,
    pub cosine_to_centroid: f32,
}

/// Picks the member with the smallest total cosine distance to the others.
/// `vectors` must already be normalized. Ties go to the earliest position.
pub fn select_medoid(vectors: &[&[f32]]) -> Option<Medoid> {
    match vectors.len() {
        0 => return None,
        1 => {
            return Some(Medoid {
                position: 0,
                cosine_to_centroid: 1.0,
            })
        }
        _ => {}
    }

    let mut best = 0usize;
    let mut best_total = f32::INFINITY;
    for (i, a) in vectors.iter().enumerate() {
        let total: f32 = vectors
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(_, b)| 1.0 - cosine(a, b))
            .sum();
        if total < best_total {
            best_total = total;
            best = i;
        }
    }

    Some(Medoid {
        position: best,
        cosine_to_centroid: cosine_to_centroid(vectors, best),
    })
}

/// Cosine between member `pick` and the re-normalized mean of all members.
/// A degenerate centroid (all members zero, or cancelling out) yields 1.0.
pub fn cosine_to_centroid(vectors: &[&[f32]], pick: usize) -> f32 {
    let dim = vectors.first().map(|v| v.len()).unwrap_or(0);
    let mut centroid = vec![0.0f32; dim];
    for v in vectors {
        for (c, x) in centroid.iter_mut().zip(v.iter()) {
            *c += x;
        }
    }
    let n = vectors.len() as f32;
    for c in centroid.iter_mut() {
        *c /= n;
    }
    let unit = normalize(&centroid);
    if is_zero(&unit) {
        return 1.0;
    }
    cosine(vectors[pick], &unit)
}

/// Runs medoid selection for one clustering result. Returns `None` only for
/// an empty draft, which the clustering engine never emits.
pub fn enrich(draft: ClusterDraft, assets: &[Asset], unit_vectors: &[Vec<f32>]) -> Option<Cluster> {
    let vectors: Vec<&[f32]> = draft
        .members
        .iter()
        .map(|&i| unit_vectors[i].as_slice())
        .collect();
    let medoid = select_medoid(&vectors)?;
    let medoid_idx = draft.members[medoid.position];
    Some(Cluster {
        window: draft.window,
        cluster_type: draft.cluster_type,
        cluster_tag: draft.cluster_tag,
        label_hint: draft.label_hint,
        size: draft.members.len(),
        medoid: medoid_idx,
        medoid_id: assets[medoid_idx].id.clone(),
        cosine_to_centroid: medoid.cosine_to_centroid,
        members: draft.members,
    })
}
