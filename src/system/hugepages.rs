//! Hugepage statistics
//!
//! The page size comes from the global `/proc/meminfo` and is applied to
//! every node; per-node totals come from `nodeN/meminfo`, whose lines look
//! like `Node 0 HugePages_Total:   150`.

use crate::error::{IoResultExt, NumaExporterError, Result};
use crate::system::numa::NumaNode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Hugepage counters of one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HugepageStat {
    /// Page size label, e.g. "2048kB"
    pub size: String,
    /// Pages configured on the node
    pub total: u64,
    /// Pages not yet allocated
    pub free: u64,
}

impl HugepageStat {
    /// Build a stat, rejecting free counts above the total
    pub fn new(size: impl Into<String>, total: u64, free: u64) -> Option<Self> {
        (free <= total).then(|| Self {
            size: size.into(),
            total,
            free,
        })
    }

    /// Pages in use
    pub fn used(&self) -> u64 {
        self.total - self.free
    }
}

/// Extract the `Hugepagesize:` value from meminfo text ("2048 kB" -> "2048kB")
pub fn parse_hugepage_size(meminfo: &str) -> Option<String> {
    meminfo.lines().find_map(|line| {
        let rest = line.strip_prefix("Hugepagesize:")?;
        let mut parts = rest.split_whitespace();
        let value = parts.next()?;
        value.parse::<u64>().ok()?;
        Some(format!("{}{}", value, parts.next().unwrap_or("")))
    })
}

/// Extract `(HugePages_Total, HugePages_Free)` for `node_id` from node meminfo text
pub fn parse_node_hugepages(meminfo: &str, node_id: u32) -> std::result::Result<(u64, u64), String> {
    let mut total = None;
    let mut free = None;

    for line in meminfo.lines() {
        let mut parts = line.split_whitespace();
        if parts.next() != Some("Node") {
            continue;
        }
        if parts.next().and_then(|id| id.parse::<u32>().ok()) != Some(node_id) {
            continue;
        }

        let slot = match parts.next() {
            Some("HugePages_Total:") => &mut total,
            Some("HugePages_Free:") => &mut free,
            _ => continue,
        };

        let value = parts.next().unwrap_or("");
        *slot = Some(
            value
                .parse::<u64>()
                .map_err(|_| format!("invalid value '{}' in line '{}'", value, line.trim()))?,
        );
    }

    match (total, free) {
        (Some(total), Some(free)) => Ok((total, free)),
        (None, _) => Err(format!("no 'Node {} HugePages_Total' line", node_id)),
        (_, None) => Err(format!("no 'Node {} HugePages_Free' line", node_id)),
    }
}

/// Reader for global and per-node hugepage files
#[derive(Debug, Clone)]
pub struct HugepageReader {
    meminfo: PathBuf,
    node_base: PathBuf,
}

impl HugepageReader {
    /// Create a reader over the given procfs and sysfs roots
    pub fn new(procfs_root: &Path, sysfs_root: &Path) -> Self {
        Self {
            meminfo: procfs_root.join("meminfo"),
            node_base: sysfs_root.join("devices/system/node"),
        }
    }

    /// Read the global hugepage size
    pub fn read_size(&self) -> Result<String> {
        let content = std::fs::read_to_string(&self.meminfo).with_path(&self.meminfo)?;
        parse_hugepage_size(&content)
            .ok_or_else(|| NumaExporterError::malformed(&self.meminfo, "no Hugepagesize line"))
    }

    /// Read the hugepage counters of a node, labelled with `size`
    pub fn read_node(&self, node: &NumaNode, size: &str) -> Result<HugepageStat> {
        let path = self.node_base.join(&node.label).join("meminfo");
        let content = std::fs::read_to_string(&path).with_path(&path)?;

        let (total, free) = parse_node_hugepages(&content, node.id)
            .map_err(|message| NumaExporterError::malformed(&path, message))?;

        HugepageStat::new(size, total, free).ok_or_else(|| {
            NumaExporterError::malformed(
                &path,
                format!("HugePages_Free ({}) exceeds HugePages_Total ({})", free, total),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::HostFixture;

    #[test]
    fn test_parse_hugepage_size() {
        let meminfo = "MemTotal: 1000 kB\nHugepagesize:       2048 kB\nHugetlb: 0 kB\n";
        assert_eq!(parse_hugepage_size(meminfo), Some("2048kB".to_string()));
        assert_eq!(
            parse_hugepage_size("Hugepagesize: 1048576 kB\n"),
            Some("1048576kB".to_string())
        );
        assert_eq!(parse_hugepage_size("MemTotal: 1000 kB\n"), None);
        assert_eq!(parse_hugepage_size("Hugepagesize: lots kB\n"), None);
    }

    #[test]
    fn test_parse_node_hugepages_matches_node_id() {
        let meminfo = "Node 1 HugePages_Total:   150\n\
                       Node 1 HugePages_Free:    100\n\
                       Node 11 HugePages_Total:  999\n\
                       Node 11 HugePages_Free:   999\n";
        assert_eq!(parse_node_hugepages(meminfo, 1), Ok((150, 100)));
        assert_eq!(parse_node_hugepages(meminfo, 11), Ok((999, 999)));
        assert!(parse_node_hugepages(meminfo, 2).is_err());
    }

    #[test]
    fn test_parse_node_hugepages_errors() {
        assert!(parse_node_hugepages("Node 0 HugePages_Total: 10\n", 0)
            .unwrap_err()
            .contains("HugePages_Free"));
        assert!(parse_node_hugepages("Node 0 HugePages_Total: x\nNode 0 HugePages_Free: 1\n", 0).is_err());
    }

    #[test]
    fn test_used_is_total_minus_free() {
        let stat = HugepageStat::new("2048kB", 150, 100).unwrap();
        assert_eq!(stat.used(), 50);
        assert!(HugepageStat::new("2048kB", 10, 11).is_none());
        assert_eq!(HugepageStat::new("2048kB", 0, 0).unwrap().used(), 0);
    }

    #[test]
    fn test_reader_scenario() {
        let host = HostFixture::new();
        host.hugepage_size(2048);
        host.node(0, "0-3");
        host.node_hugepages(0, 150, 100);

        let reader = HugepageReader::new(&host.procfs(), &host.sysfs());
        let size = reader.read_size().unwrap();
        assert_eq!(size, "2048kB");

        let stat = reader.read_node(&NumaNode::new(0), &size).unwrap();
        assert_eq!(stat.free, 100);
        assert_eq!(stat.used(), 50);
        assert_eq!(stat.size, "2048kB");
    }

    #[test]
    fn test_reader_rejects_inconsistent_counts() {
        let host = HostFixture::new();
        host.node_hugepages(0, 10, 20);

        let reader = HugepageReader::new(&host.procfs(), &host.sysfs());
        let err = reader.read_node(&NumaNode::new(0), "2048kB").unwrap_err();
        assert!(matches!(err, NumaExporterError::MalformedFile { .. }));
    }

    #[test]
    fn test_reader_missing_files() {
        let host = HostFixture::new();
        let reader = HugepageReader::new(&host.procfs(), &host.sysfs());
        assert!(matches!(reader.read_size(), Err(NumaExporterError::Io { .. })));
        assert!(matches!(
            reader.read_node(&NumaNode::new(0), "2048kB"),
            Err(NumaExporterError::Io { .. })
        ));
    }
}
