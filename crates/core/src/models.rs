use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A raw time value as supplied by the scanner: text from EXIF/sidecars or
/// Unix seconds from the filesystem. Anything else is kept so a bad value
/// never fails the whole manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Epoch(i64),
    Fractional(f64),
    Text(String),
    Other(serde_json::Value),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimestampCandidates {
    #[serde(default)]
    pub camera_original: Option<RawTimestamp>,
    #[serde(default)]
    pub camera_modify: Option<RawTimestamp>,
    #[serde(default)]
    pub filesystem: Option<RawTimestamp>,
}

/// One photographic file as handed over by the scanning and embedding stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    /// Content hash; stable across runs.
    pub id: String,
    /// Path relative to the collection root, `/`-separated.
    pub path: String,
    #[serde(default)]
    pub timestamps: TimestampCandidates,
    #[serde(default)]
    pub tags: Vec<String>,
    pub embedding: Vec<f32>,
}

impl Asset {
    /// Parent directory of the asset path, `""` for files at the root.
    pub fn folder(&self) -> &str {
        let normalized = self.path.trim_end_matches('/');
        match normalized.rfind(['/', '\\']) {
            Some(idx) => &normalized[..idx],
            None => "",
        }
    }

    /// First tag after trimming and lowercasing, if any.
    pub fn dominant_tag(&self) -> Option<String> {
        self.tags
            .iter()
            .map(|t| t.trim().to_lowercase())
            .find(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    CameraOriginal,
    CameraModify,
    Filesystem,
    PathToken,
    Sequence,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::CameraOriginal => "camera_original",
            Signal::CameraModify => "camera_modify",
            Signal::Filesystem => "filesystem",
            Signal::PathToken => "path_token",
            Signal::Sequence => "sequence",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTime {
    pub resolved_datetime: Option<NaiveDateTime>,
    pub trust_score: f32,
    pub signals_used: Vec<Signal>,
    /// Signals that were present and sane but dropped as outliers.
    pub discarded: Vec<Signal>,
    pub date_uncertain: bool,
}

impl ResolvedTime {
    pub fn unresolved() -> Self {
        Self {
            resolved_datetime: None,
            trust_score: 0.0,
            signals_used: Vec::new(),
            discarded: Vec::new(),
            date_uncertain: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub index: usize,
    /// Asset indices in (time, id) order.
    pub members: Vec<usize>,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterType {
    Folder,
    Tag,
    Embedding,
}

impl ClusterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterType::Folder => "folder",
            ClusterType::Tag => "tag",
            ClusterType::Embedding => "embedding",
        }
    }
}

impl fmt::Display for ClusterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw clustering output for one window, before medoid selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterDraft {
    pub window: usize,
    pub cluster_type: ClusterType,
    pub cluster_tag: Option<String>,
    pub label_hint: Option<String>,
    pub members: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub window: usize,
    pub cluster_type: ClusterType,
    pub cluster_tag: Option<String>,
    pub label_hint: Option<String>,
    pub members: Vec<usize>,
    pub size: usize,
    pub medoid: usize,
    pub medoid_id: String,
    pub cosine_to_centroid: f32,
}

/// One row of the flattened cluster report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterRow {
    pub folder: String,
    pub cluster_type: ClusterType,
    pub cluster_tag: String,
    pub label_hint: String,
    pub cluster_size: usize,
    pub medoid_id: String,
    pub medoid_rel_path: String,
    pub cosine_to_centroid: f32,
    pub window: usize,
    pub member_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterReport {
    pub rows: Vec<ClusterRow>,
}
