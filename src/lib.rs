//! # numa-exporter - Per-NUMA-Node Resource Usage
//!
//! Reports, for each NUMA node of a virtualization host, how much of the
//! capacity reserved for pinned guests is free and how much is in use:
//!
//! - **Dedicated CPUs**: the compute service's dedicated set, split by guest
//!   vCPU pinning read from libvirt
//! - **Hugepages**: per-node totals and free counts from sysfs
//! - **SR-IOV VFs**: per whitelisted NIC, free when the VF MAC is all-zero
//!
//! Topology and reservation are read once at start-up; guest pinning,
//! hugepage counters and VF state are re-read on every scrape.
//!
//! ## Quick Start
//!
//! ```no_run
//! use numa_exporter::config::ExporterConfig;
//! use numa_exporter::metrics::render_text;
//! use numa_exporter::reconcile::ResourceReconciler;
//!
//! let reconciler = ResourceReconciler::from_config(&ExporterConfig::default()).unwrap();
//! let report = reconciler.scrape().unwrap();
//! print!("{}", render_text(&report.records()));
//! ```
//!
//! ## Serving Metrics
//!
//! ```no_run
//! use numa_exporter::api::MetricsServer;
//! use numa_exporter::config::ExporterConfig;
//! use numa_exporter::reconcile::ResourceReconciler;
//!
//! let reconciler = ResourceReconciler::from_config(&ExporterConfig::default()).unwrap();
//! let server = MetricsServer::bind("127.0.0.1", 9109, reconciler).unwrap();
//! server.run().unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod config;
pub mod error;
pub mod live;
pub mod metrics;
pub mod reconcile;
pub mod system;

#[cfg(test)]
mod fixtures;

// Re-export commonly used types
pub use config::{ExporterConfig, SiblingPolicy};
pub use error::{NumaExporterError, Result};
pub use reconcile::{ResourceReconciler, ScrapeReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```no_run
    //! use numa_exporter::prelude::*;
    //! ```

    pub use crate::api::MetricsServer;
    pub use crate::config::{ExporterConfig, SiblingPolicy};
    pub use crate::error::{NumaExporterError, Result};
    pub use crate::live::{CommandInspector, HostInspector};
    pub use crate::metrics::{render_text, MetricKind, MetricRecord};
    pub use crate::reconcile::{NodeUsage, ResourceReconciler, ScrapeReport};
    pub use crate::system::{CpuSet, HostReservation, HostTopology, NumaNode};
}
