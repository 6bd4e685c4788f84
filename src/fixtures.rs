//! Fixture host trees for unit tests
//!
//! Builds a fake `/sys`, `/proc` and nova.conf under a temporary directory.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub(crate) struct HostFixture {
    dir: TempDir,
}

impl HostFixture {
    pub(crate) fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("sys/devices/system/node")).unwrap();
        fs::create_dir_all(dir.path().join("proc")).unwrap();
        Self { dir }
    }

    pub(crate) fn sysfs(&self) -> PathBuf {
        self.dir.path().join("sys")
    }

    pub(crate) fn procfs(&self) -> PathBuf {
        self.dir.path().join("proc")
    }

    pub(crate) fn host_config_path(&self) -> PathBuf {
        self.dir.path().join("nova.conf")
    }

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    pub(crate) fn sysfs_dir(&self, rel: &str) {
        fs::create_dir_all(self.sysfs().join(rel)).unwrap();
    }

    pub(crate) fn sysfs_file(&self, rel: &str, content: &str) {
        Self::write(&self.sysfs().join(rel), content);
    }

    /// Node directory with a cpulist
    pub(crate) fn node(&self, id: u32, cpulist: &str) {
        self.sysfs_file(
            &format!("devices/system/node/node{}/cpulist", id),
            &format!("{}\n", cpulist),
        );
    }

    /// Node meminfo in the kernel's column layout
    pub(crate) fn node_hugepages(&self, id: u32, total: u64, free: u64) {
        let content = format!(
            "Node {id} MemTotal:       65843172 kB\n\
             Node {id} MemFree:        60193420 kB\n\
             Node {id} MemUsed:         5649752 kB\n\
             Node {id} AnonHugePages:         0 kB\n\
             Node {id} HugePages_Total:   {total}\n\
             Node {id} HugePages_Free:    {free}\n\
             Node {id} HugePages_Surp:      0\n",
        );
        self.sysfs_file(&format!("devices/system/node/node{}/meminfo", id), &content);
    }

    pub(crate) fn siblings(&self, cpu: u32, list: &str) {
        self.sysfs_file(
            &format!("devices/system/cpu/cpu{}/topology/thread_siblings_list", cpu),
            &format!("{}\n", list),
        );
    }

    pub(crate) fn nic_affinity(&self, nic: &str, value: &str) {
        self.sysfs_file(
            &format!("class/net/{}/device/numa_node", nic),
            &format!("{}\n", value),
        );
    }

    /// Global /proc/meminfo with the given hugepage size in kB
    pub(crate) fn hugepage_size(&self, kb: u64) {
        let content = format!(
            "MemTotal:       131686344 kB\n\
             MemFree:        120386840 kB\n\
             HugePages_Total:     300\n\
             HugePages_Free:      200\n\
             HugePages_Rsvd:        0\n\
             HugePages_Surp:        0\n\
             Hugepagesize:       {} kB\n\
             Hugetlb:          614400 kB\n",
            kb
        );
        Self::write(&self.procfs().join("meminfo"), &content);
    }

    pub(crate) fn host_config(&self, content: &str) -> PathBuf {
        let path = self.host_config_path();
        Self::write(&path, content);
        path
    }
}
