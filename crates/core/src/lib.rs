//! Core library: capture-time resolution, time windows, similarity
//! clustering, medoid selection and report assembly.

pub mod capture_time;
pub mod clustering;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod manifest;
pub mod medoid;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod windows;

pub use error::ClusterError;
