use crate::error::ClusterError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub dates: DateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "runs/ledger.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterMode {
    #[default]
    Simple,
    Hybrid,
}

impl std::str::FromStr for ClusterMode {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simple" => Ok(ClusterMode::Simple),
            "hybrid" => Ok(ClusterMode::Hybrid),
            other => Err(ClusterError::InvalidConfig(format!(
                "unknown cluster mode '{other}' (expected simple|hybrid)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    #[serde(default)]
    pub mode: ClusterMode,
    #[serde(default)]
    pub tag_aware: bool,
    #[serde(default = "default_window_gap_minutes")]
    pub window_gap_minutes: i64,
    #[serde(default = "default_min_tag_cluster_size")]
    pub min_tag_cluster_size: usize,
    #[serde(default = "default_embedding_threshold")]
    pub embedding_threshold: f32,
    /// 0 = unlimited.
    #[serde(default)]
    pub max_embedding_clusters: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            mode: ClusterMode::Simple,
            tag_aware: false,
            window_gap_minutes: default_window_gap_minutes(),
            min_tag_cluster_size: default_min_tag_cluster_size(),
            embedding_threshold: default_embedding_threshold(),
            max_embedding_clusters: 0,
        }
    }
}

impl ClusterConfig {
    /// The tag pass always runs in hybrid mode.
    pub fn runs_tag_pass(&self) -> bool {
        self.tag_aware || self.mode == ClusterMode::Hybrid
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateConfig {
    #[serde(default = "default_sane_range")]
    pub sane_range: [i32; 2],
    #[serde(default = "default_outlier_days")]
    pub outlier_days: i64,
    #[serde(default)]
    pub weights: SignalWeights,
}

impl Default for DateConfig {
    fn default() -> Self {
        Self {
            sane_range: default_sane_range(),
            outlier_days: default_outlier_days(),
            weights: SignalWeights::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalWeights {
    pub camera_original: f32,
    pub camera_modify: f32,
    pub filesystem: f32,
    pub path_token: f32,
    pub sequence: f32,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            camera_original: 0.45,
            camera_modify: 0.2,
            filesystem: 0.1,
            path_token: 0.15,
            sequence: 0.1,
        }
    }
}

impl SignalWeights {
    pub fn weight(&self, signal: crate::models::Signal) -> f32 {
        use crate::models::Signal;
        match signal {
            Signal::CameraOriginal => self.camera_original,
            Signal::CameraModify => self.camera_modify,
            Signal::Filesystem => self.filesystem,
            Signal::PathToken => self.path_token,
            Signal::Sequence => self.sequence,
        }
    }

    fn entries(&self) -> [(&'static str, f32); 5] {
        [
            ("camera_original", self.camera_original),
            ("camera_modify", self.camera_modify),
            ("filesystem", self.filesystem),
            ("path_token", self.path_token),
            ("sequence", self.sequence),
        ]
    }
}

fn default_window_gap_minutes() -> i64 {
    60
}

fn default_min_tag_cluster_size() -> usize {
    3
}

fn default_embedding_threshold() -> f32 {
    0.86
}

fn default_sane_range() -> [i32; 2] {
    [1990, 2100]
}

fn default_outlier_days() -> i64 {
    30
}

impl AppConfig {
    /// Rejects values the engine cannot run with. Called before any work starts.
    pub fn validate(&self) -> Result<(), ClusterError> {
        let c = &self.cluster;
        if c.window_gap_minutes <= 0 {
            return Err(ClusterError::InvalidConfig(format!(
                "window_gap_minutes must be > 0, got {}",
                c.window_gap_minutes
            )));
        }
        if chrono::Duration::try_minutes(c.window_gap_minutes).is_none() {
            return Err(ClusterError::InvalidConfig(format!(
                "window_gap_minutes {} is too large to represent",
                c.window_gap_minutes
            )));
        }
        if c.min_tag_cluster_size < 1 {
            return Err(ClusterError::InvalidConfig(
                "min_tag_cluster_size must be >= 1".to_string(),
            ));
        }
        if !(c.embedding_threshold > 0.0 && c.embedding_threshold <= 1.0) {
            return Err(ClusterError::InvalidConfig(format!(
                "embedding_threshold must satisfy 0 < t <= 1, got {}",
                c.embedding_threshold
            )));
        }
        let d = &self.dates;
        if d.sane_range[0] > d.sane_range[1] {
            return Err(ClusterError::InvalidConfig(format!(
                "sane_range start {} is after end {}",
                d.sane_range[0], d.sane_range[1]
            )));
        }
        if d.outlier_days < 0 {
            return Err(ClusterError::InvalidConfig(format!(
                "outlier_days must be >= 0, got {}",
                d.outlier_days
            )));
        }
        for (name, w) in d.weights.entries() {
            if !w.is_finite() || w < 0.0 {
                return Err(ClusterError::InvalidConfig(format!(
                    "weight '{name}' must be a non-negative number, got {w}"
                )));
            }
        }
        Ok(())
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    let mut settings = config::Config::builder();
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    settings = settings.add_source(config::Environment::with_prefix("MEDOIDS").separator("__"));
    let cfg = settings.build()?;
    Ok(cfg.try_deserialize()?)
}
