//! Public library modules for the CLI crate
pub mod cluster;
pub mod resolve;
