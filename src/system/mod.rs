//! Host inventory readers
//!
//! Static inventory (NUMA topology, reservations) is read once at start-up;
//! hugepage counters are re-read on every scrape.

pub mod cpulist;
pub mod hugepages;
pub mod numa;
pub mod reservation;

pub use cpulist::{format_cpu_list, parse_cpu_list, CpuId, CpuSet, MAX_CPU_ID};
pub use hugepages::{HugepageReader, HugepageStat};
pub use numa::{HostTopology, NodeTopology, NumaNode, SysfsTopology};
pub use reservation::HostReservation;
