//! NUMA topology discovery from sysfs
//!
//! Reads the node list, per-node CPU membership, per-CPU thread siblings and
//! per-NIC node affinity. Topology is read once at start-up and held for the
//! lifetime of the process as a [`HostTopology`].

use crate::error::{IoResultExt, NumaExporterError, Result};
use crate::system::cpulist::{format_cpu_list, parse_cpu_list, CpuId, CpuSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// NUMA node identity, carrying both the numeric id and the sysfs label
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NumaNode {
    /// Node ID (the N in nodeN)
    pub id: u32,
    /// Directory name under /sys/devices/system/node, e.g. "node0"
    pub label: String,
}

impl NumaNode {
    /// Create a node with the canonical "node{id}" label
    pub fn new(id: u32) -> Self {
        Self {
            id,
            label: format!("node{}", id),
        }
    }

    /// Build a node from a sysfs directory name; `None` for non-node entries
    pub fn from_dir_name(name: &str) -> Option<Self> {
        let id = name.strip_prefix("node")?.parse::<u32>().ok()?;
        Some(Self {
            id,
            label: name.to_string(),
        })
    }
}

impl fmt::Display for NumaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Reader for kernel-exposed topology under a sysfs root
#[derive(Debug, Clone)]
pub struct SysfsTopology {
    sysfs_root: PathBuf,
}

impl SysfsTopology {
    /// Create a reader rooted at `sysfs_root` (normally `/sys`)
    pub fn new(sysfs_root: impl Into<PathBuf>) -> Self {
        Self {
            sysfs_root: sysfs_root.into(),
        }
    }

    fn node_base(&self) -> PathBuf {
        self.sysfs_root.join("devices/system/node")
    }

    /// Directory of a single node
    pub fn node_dir(&self, node: &NumaNode) -> PathBuf {
        self.node_base().join(&node.label)
    }

    /// Enumerate NUMA nodes, ordered by id
    pub fn discover_nodes(&self) -> Result<Vec<NumaNode>> {
        let base = self.node_base();
        let mut nodes = Vec::new();

        for entry in std::fs::read_dir(&base).with_path(&base)? {
            let entry = entry.with_path(&base)?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();

            if let Some(node) = NumaNode::from_dir_name(&name_str) {
                if entry.path().is_dir() {
                    nodes.push(node);
                }
            }
        }

        nodes.sort_by_key(|n| n.id);
        tracing::debug!("Discovered {} NUMA node(s) under {:?}", nodes.len(), base);
        Ok(nodes)
    }

    /// Read the CPUs belonging to a node
    pub fn discover_node_cpus(&self, node: &NumaNode) -> Result<CpuSet> {
        read_cpu_list_file(&self.node_dir(node).join("cpulist"))
    }

    /// Read the hyperthread siblings of a CPU (the CPU itself included)
    pub fn discover_sibling_group(&self, cpu: CpuId) -> Result<CpuSet> {
        let path = self
            .sysfs_root
            .join(format!("devices/system/cpu/cpu{}/topology/thread_siblings_list", cpu));
        read_cpu_list_file(&path)
    }

    /// Read the NUMA node a NIC is attached to; `None` when the kernel reports -1
    pub fn discover_nic_node(&self, nic: &str) -> Result<Option<u32>> {
        let path = self
            .sysfs_root
            .join("class/net")
            .join(nic)
            .join("device/numa_node");
        let content = std::fs::read_to_string(&path).with_path(&path)?;

        let value = content.trim().parse::<i64>().map_err(|_| {
            NumaExporterError::malformed(&path, format!("'{}' is not a node id", content.trim()))
        })?;

        match value {
            v if v < 0 => Ok(None),
            v => u32::try_from(v)
                .map(Some)
                .map_err(|_| NumaExporterError::malformed(&path, format!("node id {} out of range", v))),
        }
    }
}

fn read_cpu_list_file(path: &Path) -> Result<CpuSet> {
    let content = std::fs::read_to_string(path).with_path(path)?;
    parse_cpu_list(&content).map_err(|e| e.with_context(path.display().to_string()))
}

/// A node together with its CPUs
#[derive(Debug, Clone, Serialize)]
pub struct NodeTopology {
    /// Node identity
    pub node: NumaNode,
    /// CPUs belonging to this node
    pub cpus: CpuSet,
}

/// Process-lifetime topology snapshot
#[derive(Debug, Clone, Default, Serialize)]
pub struct HostTopology {
    /// Nodes ordered by id
    pub nodes: Vec<NodeTopology>,
    /// Whitelisted NICs placed on a node (NIC name -> node id)
    pub nic_nodes: BTreeMap<String, u32>,
    /// Whitelisted NICs without a usable node affinity
    pub unplaced_nics: Vec<String>,
    /// Thread sibling groups, only loaded when sibling expansion is enabled
    pub siblings: BTreeMap<CpuId, CpuSet>,
}

impl HostTopology {
    /// Discover nodes, CPUs and NIC placement
    ///
    /// Fails if any topology file is missing or malformed, or if a CPU is
    /// listed under two nodes.
    pub fn discover<'a>(
        reader: &SysfsTopology,
        nics: impl IntoIterator<Item = &'a str>,
        load_siblings: bool,
    ) -> Result<Self> {
        let mut nodes = Vec::new();
        let mut owner: BTreeMap<CpuId, String> = BTreeMap::new();

        for node in reader.discover_nodes()? {
            let cpus = reader.discover_node_cpus(&node)?;

            for &cpu in &cpus {
                if let Some(first) = owner.insert(cpu, node.label.clone()) {
                    return Err(NumaExporterError::TopologyOverlap {
                        cpu,
                        first,
                        second: node.label.clone(),
                    });
                }
            }

            tracing::debug!("{}: CPUs {}", node, format_cpu_list(&cpus));
            nodes.push(NodeTopology { node, cpus });
        }

        let mut topology = Self {
            nodes,
            ..Default::default()
        };

        for nic in nics {
            let affinity = reader.discover_nic_node(nic)?;
            match topology.place_nic(affinity) {
                Some(node_id) => {
                    topology.nic_nodes.insert(nic.to_string(), node_id);
                }
                None => {
                    tracing::warn!(
                        "NIC {} has no usable NUMA affinity ({:?}); its VFs will not be reported",
                        nic,
                        affinity
                    );
                    topology.unplaced_nics.push(nic.to_string());
                }
            }
        }

        if load_siblings {
            for cpu in owner.keys() {
                let group = reader.discover_sibling_group(*cpu)?;
                topology.siblings.insert(*cpu, group);
            }
        }

        Ok(topology)
    }

    /// Map a NIC affinity onto a known node
    ///
    /// A host with a single node places affinity-less (-1) NICs on it.
    fn place_nic(&self, affinity: Option<u32>) -> Option<u32> {
        match affinity {
            Some(id) => self.nodes.iter().find(|n| n.node.id == id).map(|n| n.node.id),
            None if self.nodes.len() == 1 => Some(self.nodes[0].node.id),
            None => None,
        }
    }

    /// NICs placed on the given node, in name order
    pub fn nics_on(&self, node: &NumaNode) -> impl Iterator<Item = &str> + '_ {
        let id = node.id;
        self.nic_nodes
            .iter()
            .filter(move |(_, n)| **n == id)
            .map(|(nic, _)| nic.as_str())
    }

    /// Extend a CPU set with the thread siblings of each member
    ///
    /// CPUs without a loaded sibling group are kept as they are.
    pub fn expand_siblings(&self, cpus: &CpuSet) -> CpuSet {
        let mut expanded = cpus.clone();
        for cpu in cpus {
            if let Some(group) = self.siblings.get(cpu) {
                expanded.extend(group.iter().copied());
            }
        }
        expanded
    }

    /// Print topology summary
    pub fn print_summary(&self) {
        println!("NUMA Topology:");
        println!("  Nodes: {}", self.nodes.len());

        for node in &self.nodes {
            println!("  {} (id {}):", node.node.label, node.node.id);
            println!("    CPUs: {}", format_cpu_list(&node.cpus));
            let nics: Vec<&str> = self.nics_on(&node.node).collect();
            if !nics.is_empty() {
                println!("    NICs: {}", nics.join(", "));
            }
        }

        if !self.unplaced_nics.is_empty() {
            println!("  Unplaced NICs: {}", self.unplaced_nics.join(", "));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::HostFixture;

    fn set(ids: &[CpuId]) -> CpuSet {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_node_from_dir_name() {
        assert_eq!(NumaNode::from_dir_name("node3"), Some(NumaNode::new(3)));
        assert_eq!(NumaNode::from_dir_name("node12").unwrap().id, 12);
        assert!(NumaNode::from_dir_name("possible").is_none());
        assert!(NumaNode::from_dir_name("nodeX").is_none());
        assert!(NumaNode::from_dir_name("node").is_none());
    }

    #[test]
    fn test_discover_nodes_sorted_and_filtered() {
        let host = HostFixture::new();
        host.node(10, "20-21");
        host.node(2, "4-5");
        host.node(0, "0-3");
        host.sysfs_file("devices/system/node/online", "0,2,10\n");

        let reader = SysfsTopology::new(host.sysfs());
        let nodes = reader.discover_nodes().unwrap();
        let ids: Vec<u32> = nodes.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![0, 2, 10]);
        assert_eq!(nodes[2].label, "node10");
    }

    #[test]
    fn test_discover_node_cpus() {
        let host = HostFixture::new();
        host.node(0, "0-3,8,10-11");
        host.node(1, "");

        let reader = SysfsTopology::new(host.sysfs());
        assert_eq!(
            reader.discover_node_cpus(&NumaNode::new(0)).unwrap(),
            set(&[0, 1, 2, 3, 8, 10, 11])
        );
        assert!(reader.discover_node_cpus(&NumaNode::new(1)).unwrap().is_empty());
    }

    #[test]
    fn test_missing_cpulist_is_error() {
        let host = HostFixture::new();
        host.sysfs_dir("devices/system/node/node0");

        let reader = SysfsTopology::new(host.sysfs());
        let err = reader.discover_node_cpus(&NumaNode::new(0)).unwrap_err();
        assert!(err.path().unwrap().ends_with("node0/cpulist"));
    }

    #[test]
    fn test_sibling_group() {
        let host = HostFixture::new();
        host.siblings(1, "1,5");

        let reader = SysfsTopology::new(host.sysfs());
        assert_eq!(reader.discover_sibling_group(1).unwrap(), set(&[1, 5]));
        assert!(reader.discover_sibling_group(2).is_err());
    }

    #[test]
    fn test_nic_node() {
        let host = HostFixture::new();
        host.nic_affinity("eth0", "1");
        host.nic_affinity("eth1", "-1");
        host.nic_affinity("eth2", "garbage");

        let reader = SysfsTopology::new(host.sysfs());
        assert_eq!(reader.discover_nic_node("eth0").unwrap(), Some(1));
        assert_eq!(reader.discover_nic_node("eth1").unwrap(), None);
        assert!(matches!(
            reader.discover_nic_node("eth2"),
            Err(NumaExporterError::MalformedFile { .. })
        ));
        assert!(matches!(
            reader.discover_nic_node("eth3"),
            Err(NumaExporterError::Io { .. })
        ));
    }

    #[test]
    fn test_host_topology_places_nics() {
        let host = HostFixture::new();
        host.node(0, "0-3");
        host.node(1, "4-7");
        host.nic_affinity("eth0", "0");
        host.nic_affinity("eth1", "1");
        host.nic_affinity("eth2", "-1");
        host.nic_affinity("eth3", "7");

        let reader = SysfsTopology::new(host.sysfs());
        let topology =
            HostTopology::discover(&reader, ["eth0", "eth1", "eth2", "eth3"], false).unwrap();

        assert_eq!(topology.nodes.len(), 2);
        assert_eq!(topology.nics_on(&NumaNode::new(0)).collect::<Vec<_>>(), vec!["eth0"]);
        assert_eq!(topology.nics_on(&NumaNode::new(1)).collect::<Vec<_>>(), vec!["eth1"]);
        assert_eq!(topology.unplaced_nics, vec!["eth2", "eth3"]);
        assert!(topology.siblings.is_empty());
    }

    #[test]
    fn test_single_node_host_places_affinityless_nic() {
        let host = HostFixture::new();
        host.node(0, "0-3");
        host.nic_affinity("eth0", "-1");

        let reader = SysfsTopology::new(host.sysfs());
        let topology = HostTopology::discover(&reader, ["eth0"], false).unwrap();
        assert_eq!(topology.nic_nodes.get("eth0"), Some(&0));
        assert!(topology.unplaced_nics.is_empty());
    }

    #[test]
    fn test_overlapping_nodes_rejected() {
        let host = HostFixture::new();
        host.node(0, "0-3");
        host.node(1, "3-5");

        let reader = SysfsTopology::new(host.sysfs());
        match HostTopology::discover(&reader, [], false) {
            Err(NumaExporterError::TopologyOverlap { cpu, first, second }) => {
                assert_eq!(cpu, 3);
                assert_eq!(first, "node0");
                assert_eq!(second, "node1");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_sibling_expansion() {
        let host = HostFixture::new();
        host.node(0, "0-3");
        host.siblings(0, "0,2");
        host.siblings(1, "1,3");
        host.siblings(2, "0,2");
        host.siblings(3, "1,3");

        let reader = SysfsTopology::new(host.sysfs());
        let topology = HostTopology::discover(&reader, [], true).unwrap();
        assert_eq!(topology.siblings.len(), 4);
        assert_eq!(topology.expand_siblings(&set(&[1])), set(&[1, 3]));
        assert_eq!(topology.expand_siblings(&set(&[9])), set(&[9]));
    }
}
