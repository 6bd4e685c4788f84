//! Administrative reservations from the host configuration file
//!
//! Reads the compute service configuration (nova.conf layout): the
//! `cpu_dedicated_set` range list and the `passthrough_whitelist` (or
//! `device_spec`) JSON declaring which NICs expose VFs to guests and the
//! logical network each one serves. Absent keys mean "nothing reserved".

use crate::error::{IoResultExt, NumaExporterError, Result};
use crate::system::cpulist::{parse_cpu_list, CpuSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

const DEDICATED_SET_KEY: &str = "cpu_dedicated_set";
const WHITELIST_KEYS: [&str; 2] = ["passthrough_whitelist", "device_spec"];

/// Reserved CPUs and whitelisted NICs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HostReservation {
    /// CPUs set aside for guest placement
    pub dedicated_cpus: CpuSet,
    /// Whitelisted NIC device name -> logical network
    pub nics: BTreeMap<String, String>,
}

/// One whitelist entry; only entries naming a device are usable here
#[derive(Debug, Deserialize)]
struct WhitelistEntry {
    devname: Option<String>,
    physical_network: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WhitelistValue {
    Many(Vec<WhitelistEntry>),
    One(WhitelistEntry),
}

impl HostReservation {
    /// Load reservations from a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_path(path)?;
        let reservation = Self::parse(&content).map_err(|message| {
            NumaExporterError::malformed(path, message)
        })?;

        tracing::info!(
            "Loaded reservation from {:?}: {} dedicated CPU(s), {} whitelisted NIC(s)",
            path,
            reservation.dedicated_cpus.len(),
            reservation.nics.len()
        );
        Ok(reservation)
    }

    /// Parse configuration text
    pub fn parse(content: &str) -> std::result::Result<Self, String> {
        let mut reservation = Self::default();

        for (key, value) in config_entries(content) {
            if key == DEDICATED_SET_KEY {
                reservation.dedicated_cpus = parse_cpu_list(value)
                    .map_err(|e| format!("{}: {}", DEDICATED_SET_KEY, e))?;
            } else if WHITELIST_KEYS.contains(&key) {
                reservation
                    .add_whitelist(value)
                    .map_err(|e| format!("{}: {}", key, e))?;
            }
        }

        Ok(reservation)
    }

    fn add_whitelist(&mut self, value: &str) -> std::result::Result<(), String> {
        let entries = match serde_json::from_str::<WhitelistValue>(value)
            .map_err(|e| e.to_string())?
        {
            WhitelistValue::Many(entries) => entries,
            WhitelistValue::One(entry) => vec![entry],
        };

        for entry in entries {
            let Some(devname) = entry.devname else {
                tracing::debug!("Skipping whitelist entry without devname");
                continue;
            };
            let network = entry.physical_network.unwrap_or_default();

            match self.nics.get(&devname) {
                Some(existing) => tracing::warn!(
                    "NIC {} whitelisted twice (networks '{}' and '{}'); keeping the first",
                    devname,
                    existing,
                    network
                ),
                None => {
                    self.nics.insert(devname, network);
                }
            }
        }

        Ok(())
    }

    /// Whitelisted NIC names in order
    pub fn nic_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.nics.keys().map(String::as_str)
    }

    /// Logical network of a NIC
    pub fn network_of(&self, nic: &str) -> Option<&str> {
        self.nics.get(nic).map(String::as_str)
    }
}

/// Iterate `key = value` lines, skipping blanks, comments and section headers
fn config_entries(content: &str) -> impl Iterator<Item = (&str, &str)> {
    content.lines().filter_map(|line| {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') || line.starts_with('[') {
            return None;
        }
        let (key, value) = line.split_once('=')?;
        Some((key.trim(), value.trim()))
    })
}
