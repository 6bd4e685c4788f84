//! Resource reconciliation
//!
//! Combines the start-up topology and reservation with fresh live state into
//! per-node free/used counts:
//!
//! - CPUs: `available = node ∩ reserved`, `used = available ∩ pinned`,
//!   `free = available − used`. CPUs outside the reservation are not counted.
//! - Hugepages: `used = total − free`, size from the global meminfo.
//! - VFs: slots with the all-zero MAC are free, all others used.
//!
//! A scrape either succeeds completely or returns an error; partial results
//! are never published as zeros.

use crate::config::{ExporterConfig, SiblingPolicy};
use crate::error::{collect_errors, NumaExporterError, Result};
use crate::live::{discover_pinned_cpus, CommandInspector, HostInspector, VfSlot};
use crate::metrics::{MetricKind, MetricRecord};
use crate::system::{
    format_cpu_list, CpuSet, HostReservation, HostTopology, HugepageReader, HugepageStat,
    NodeTopology, NumaNode, SysfsTopology,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Free and used reserved CPUs of a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CpuUsage {
    /// Reserved CPUs not pinned by any guest
    pub free: CpuSet,
    /// Reserved CPUs pinned by at least one guest
    pub used: CpuSet,
}

impl CpuUsage {
    /// Split the node's reserved CPUs into free and used
    pub fn compute(node_cpus: &CpuSet, reserved: &CpuSet, pinned: &CpuSet) -> Self {
        let available: CpuSet = node_cpus.intersection(reserved).copied().collect();
        let used: CpuSet = available.intersection(pinned).copied().collect();
        let free: CpuSet = available.difference(&used).copied().collect();
        Self { free, used }
    }
}

/// VF occupancy of one NIC
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NicUsage {
    /// NIC device name
    pub nic: String,
    /// Logical network from the whitelist; empty if the NIC is not listed
    pub network: String,
    /// VFs with the all-zero MAC
    pub free: u64,
    /// VFs with an assigned MAC
    pub used: u64,
}

impl NicUsage {
    /// Count free and used slots
    pub fn from_slots(nic: impl Into<String>, network: impl Into<String>, slots: &[VfSlot]) -> Self {
        let free = slots.iter().filter(|s| s.is_free()).count() as u64;
        Self {
            nic: nic.into(),
            network: network.into(),
            free,
            used: slots.len() as u64 - free,
        }
    }
}

/// Resource usage of one node
#[derive(Debug, Clone, Serialize)]
pub struct NodeUsage {
    /// Node identity
    pub node: NumaNode,
    /// Reserved CPU split
    pub cpus: CpuUsage,
    /// Hugepage counters
    pub hugepages: HugepageStat,
    /// NICs on this node, in name order
    pub nics: Vec<NicUsage>,
}

/// Result of one scrape
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeReport {
    /// Host the data was collected on
    pub host: String,
    /// Collection time
    pub collected_at: DateTime<Utc>,
    /// Per-node usage, in node order
    pub nodes: Vec<NodeUsage>,
}

impl ScrapeReport {
    /// Flatten into metric records, grouped by metric kind
    pub fn records(&self) -> Vec<MetricRecord> {
        let mut records = Vec::new();

        for kind in MetricKind::ALL {
            for usage in &self.nodes {
                let numa = usage.node.label.clone();
                match kind {
                    MetricKind::CpuUsed => records.push(MetricRecord::new(
                        kind,
                        vec![numa],
                        usage.cpus.used.len() as f64,
                    )),
                    MetricKind::CpuFree => records.push(MetricRecord::new(
                        kind,
                        vec![numa],
                        usage.cpus.free.len() as f64,
                    )),
                    MetricKind::HugepagesUsed => records.push(MetricRecord::new(
                        kind,
                        vec![numa, usage.hugepages.size.clone()],
                        usage.hugepages.used() as f64,
                    )),
                    MetricKind::HugepagesFree => records.push(MetricRecord::new(
                        kind,
                        vec![numa, usage.hugepages.size.clone()],
                        usage.hugepages.free as f64,
                    )),
                    MetricKind::VfsFree | MetricKind::VfsUsed => {
                        for nic in &usage.nics {
                            let value = if kind == MetricKind::VfsFree { nic.free } else { nic.used };
                            records.push(MetricRecord::new(
                                kind,
                                vec![numa.clone(), nic.nic.clone(), nic.network.clone()],
                                value as f64,
                            ));
                        }
                    }
                }
            }
        }

        records
    }
}

/// Computes per-node usage on demand
pub struct ResourceReconciler {
    topology: HostTopology,
    reservation: HostReservation,
    hugepages: HugepageReader,
    inspector: Box<dyn HostInspector>,
    sibling_policy: SiblingPolicy,
}

impl ResourceReconciler {
    /// Assemble a reconciler from already-discovered inventory
    pub fn new(
        topology: HostTopology,
        reservation: HostReservation,
        hugepages: HugepageReader,
        inspector: Box<dyn HostInspector>,
        sibling_policy: SiblingPolicy,
    ) -> Self {
        Self {
            topology,
            reservation,
            hugepages,
            inspector,
            sibling_policy,
        }
    }

    /// Read topology and reservation from the host and wire up the tools
    pub fn from_config(config: &ExporterConfig) -> Result<Self> {
        let reservation = HostReservation::load(&config.host_config)?;
        let reader = SysfsTopology::new(&config.sysfs_root);
        let topology = HostTopology::discover(
            &reader,
            reservation.nic_names(),
            config.sibling_policy == SiblingPolicy::Expand,
        )?;

        tracing::info!(
            "Discovered {} NUMA node(s), {} placed NIC(s); dedicated CPUs: {}",
            topology.nodes.len(),
            topology.nic_nodes.len(),
            format_cpu_list(&reservation.dedicated_cpus)
        );

        Ok(Self::new(
            topology,
            reservation,
            HugepageReader::new(&config.procfs_root, &config.sysfs_root),
            Box::new(CommandInspector::from_config(config)?),
            config.sibling_policy,
        ))
    }

    /// Pinned CPUs of all running guests, expanded per the sibling policy
    fn pinned_cpus(&self) -> Result<CpuSet> {
        let pinned = discover_pinned_cpus(self.inspector.as_ref())?;
        Ok(match self.sibling_policy {
            SiblingPolicy::Ignore => pinned,
            SiblingPolicy::Expand => self.topology.expand_siblings(&pinned),
        })
    }

    fn nic_usage(&self, node: &NumaNode, nic: &str) -> Result<NicUsage> {
        let slots = self
            .inspector
            .vf_slots(nic)
            .map_err(|e| e.with_context(format!("NIC {} on {}", nic, node)))?;
        let network = self.reservation.network_of(nic).unwrap_or_default();
        Ok(NicUsage::from_slots(nic, network, &slots))
    }

    /// Usage of one node; hugepage and NIC failures are reported together
    fn node_usage(&self, node: &NodeTopology, pinned: &CpuSet, size: &str) -> Result<NodeUsage> {
        let cpus = CpuUsage::compute(&node.cpus, &self.reservation.dedicated_cpus, pinned);

        let hugepages = self
            .hugepages
            .read_node(&node.node, size)
            .map_err(|e| e.with_context(format!("hugepages of {}", node.node)));

        let nics = collect_errors(
            self.topology
                .nics_on(&node.node)
                .map(|nic| self.nic_usage(&node.node, nic))
                .collect(),
        );

        let (hugepages, nics) = match (hugepages, nics) {
            (Ok(hugepages), Ok(nics)) => (hugepages, nics),
            (Err(e), Ok(_)) | (Ok(_), Err(e)) => return Err(e),
            (Err(a), Err(b)) => return Err(NumaExporterError::multiple(vec![a, b])),
        };

        tracing::debug!(
            "{}: {} free / {} used CPU(s), {} free / {} used hugepage(s), {} NIC(s)",
            node.node,
            cpus.free.len(),
            cpus.used.len(),
            hugepages.free,
            hugepages.used(),
            nics.len()
        );

        Ok(NodeUsage {
            node: node.node.clone(),
            cpus,
            hugepages,
            nics,
        })
    }

    /// Run one full pass over all nodes and NICs
    ///
    /// Every node and NIC is read even after a failure, so the error lists
    /// all of them.
    pub fn scrape(&self) -> Result<ScrapeReport> {
        let pinned = self.pinned_cpus()?;
        let size = self
            .hugepages
            .read_size()
            .map_err(|e| e.with_context("hugepage size"))?;

        let nodes = collect_errors(
            self.topology
                .nodes
                .iter()
                .map(|node| self.node_usage(node, &pinned, &size))
                .collect(),
        )?;

        Ok(ScrapeReport {
            host: hostname::get()
                .map(|h| h.to_string_lossy().to_string())
                .unwrap_or_default(),
            collected_at: Utc::now(),
            nodes,
        })
    }
}
