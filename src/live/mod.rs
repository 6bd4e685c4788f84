//! Live host state: guest CPU pinning and VF occupancy
//!
//! Everything here is re-read on every scrape. The [`HostInspector`] trait
//! is the seam between the reconciler and the external tools; tests swap in
//! canned data, production uses [`CommandInspector`].

pub mod command;
mod host;
pub mod iplink;
pub mod libvirt;

pub use command::CommandRunner;
pub use host::CommandInspector;
pub use iplink::{VfSlot, FREE_VF_MAC};

use crate::error::Result;
use crate::system::cpulist::CpuSet;

/// Capability to inspect running guests and NIC virtual functions
pub trait HostInspector {
    /// Identifiers of the running guests
    fn list_running_guests(&self) -> Result<Vec<String>>;

    /// Physical CPUs the guest's vCPUs are pinned to
    fn describe_guest(&self, id: &str) -> Result<CpuSet>;

    /// VF slots of a NIC, ordered by index
    fn vf_slots(&self, nic: &str) -> Result<Vec<VfSlot>>;
}

/// Union of the pin targets of every running guest
pub fn discover_pinned_cpus(inspector: &dyn HostInspector) -> Result<CpuSet> {
    let guests = inspector
        .list_running_guests()
        .map_err(|e| e.with_context("listing running guests"))?;

    let mut pinned = CpuSet::new();
    for guest in &guests {
        let cpus = inspector
            .describe_guest(guest)
            .map_err(|e| e.with_context(format!("guest {}", guest)))?;
        tracing::trace!("Guest {} pins {} CPU(s)", guest, cpus.len());
        pinned.extend(cpus);
    }

    tracing::debug!("{} running guest(s) pin {} CPU(s)", guests.len(), pinned.len());
    Ok(pinned)
}
