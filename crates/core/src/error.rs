use thiserror::Error;

/// Conditions that stop a run before any output is produced.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("asset {id}: embedding has dimension {found}, expected {expected}")]
    DimensionMismatch {
        id: String,
        expected: usize,
        found: usize,
    },
    #[error("duplicate asset id: {0}")]
    DuplicateAsset(String),
}
