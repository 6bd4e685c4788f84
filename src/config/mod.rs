//! Configuration module for the NUMA exporter
//!
//! Provides CLI arguments and the resolved runtime settings.

mod settings;

pub use settings::*;
