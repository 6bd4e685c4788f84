//! Parser for `ip link show <nic>` virtual-function lines
//!
//! iproute2 prints one line per VF below the PF, in one of two layouts:
//!
//! ```text
//!     vf 0 MAC 00:00:00:00:00:00, spoof checking on, link-state auto
//!     vf 1     link/ether fa:16:3e:12:34:56 brd ff:ff:ff:ff:ff:ff, spoof checking on
//! ```

use serde::{Deserialize, Serialize};

/// MAC address of a VF no guest has claimed
pub const FREE_VF_MAC: &str = "00:00:00:00:00:00";

/// One virtual function slot of a NIC
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VfSlot {
    /// VF index within the NIC
    pub index: u32,
    /// Assigned MAC address
    pub mac: String,
}

impl VfSlot {
    /// A VF is free iff its MAC is the all-zero address
    pub fn is_free(&self) -> bool {
        self.mac.eq_ignore_ascii_case(FREE_VF_MAC)
    }
}

/// Extract VF slots, ordered by index
pub fn parse_vf_slots(stdout: &str) -> Result<Vec<VfSlot>, String> {
    let mut slots = Vec::new();

    for line in stdout.lines() {
        let mut tokens = line.split_whitespace();
        if tokens.next() != Some("vf") {
            continue;
        }

        let index = tokens
            .next()
            .and_then(|t| t.parse::<u32>().ok())
            .ok_or_else(|| format!("VF line without index: '{}'", line.trim()))?;

        let mac = tokens
            .skip_while(|t| *t != "MAC" && *t != "link/ether")
            .nth(1)
            .map(|t| t.trim_end_matches(',').to_string())
            .ok_or_else(|| format!("VF {} line without MAC: '{}'", index, line.trim()))?;

        slots.push(VfSlot { index, mac });
    }

    slots.sort_by_key(|s| s.index);
    Ok(slots)
}

#[cfg(test)]
mod tests {
    use super::*;

    const IP_LINK_OLD: &str = "\
4: ens1f0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 9000 qdisc mq state UP mode DEFAULT group default qlen 1000
    link/ether 3c:fd:fe:aa:bb:cc brd ff:ff:ff:ff:ff:ff
    vf 0 MAC 00:00:00:00:00:00, spoof checking on, link-state auto, trust off
    vf 1 MAC aa:bb:cc:dd:ee:ff, vlan 120, spoof checking on, link-state auto, trust off
    vf 2 MAC 00:00:00:00:00:00, spoof checking on, link-state auto, trust off
";

    const IP_LINK_NEW: &str = "\
6: ens2f0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 qdisc mq state UP mode DEFAULT group default qlen 1000
    link/ether b4:96:91:00:11:22 brd ff:ff:ff:ff:ff:ff
    vf 1     link/ether fa:16:3e:12:34:56 brd ff:ff:ff:ff:ff:ff, spoof checking off, link-state auto, trust on, query_rss off
    vf 0     link/ether 00:00:00:00:00:00 brd ff:ff:ff:ff:ff:ff, spoof checking off, link-state auto, trust off, query_rss off
";

    #[test]
    fn test_parse_old_layout() {
        let slots = parse_vf_slots(IP_LINK_OLD).unwrap();
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[1].mac, "aa:bb:cc:dd:ee:ff");

        let free = slots.iter().filter(|s| s.is_free()).count();
        assert_eq!(free, 2);
        assert_eq!(slots.len() - free, 1);
    }

    #[test]
    fn test_parse_new_layout_orders_by_index() {
        let slots = parse_vf_slots(IP_LINK_NEW).unwrap();
        assert_eq!(
            slots,
            vec![
                VfSlot { index: 0, mac: FREE_VF_MAC.to_string() },
                VfSlot { index: 1, mac: "fa:16:3e:12:34:56".to_string() },
            ]
        );
    }

    #[test]
    fn test_nic_without_vfs() {
        let stdout = "2: eno1: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500\n    link/ether 00:11:22:33:44:55 brd ff:ff:ff:ff:ff:ff\n";
        assert!(parse_vf_slots(stdout).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_vf_lines() {
        assert!(parse_vf_slots("    vf x MAC 00:00:00:00:00:00\n").is_err());
        assert!(parse_vf_slots("    vf 0 spoof checking on\n").is_err());
    }

    #[test]
    fn test_free_mac_case_insensitive() {
        let slot = VfSlot { index: 0, mac: "00:00:00:00:00:00".to_string() };
        assert!(slot.is_free());
        let slot = VfSlot { index: 0, mac: "AA:00:00:00:00:00".to_string() };
        assert!(!slot.is_free());
    }
}
