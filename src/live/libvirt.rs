//! Parsers for `virsh` output

use crate::error::{NumaExporterError, Result};
use crate::system::cpulist::{parse_cpu_list, CpuSet};

/// Guest identifiers from `virsh list --uuid`, one per line
pub fn parse_guest_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Physical CPUs pinned by a domain's `<cputune><vcpupin cpuset=.../>` entries
///
/// A domain without `<cputune>` pins nothing.
pub fn parse_vcpu_pins(xml: &str) -> Result<CpuSet> {
    let doc = roxmltree::Document::parse(xml).map_err(|e| NumaExporterError::InvalidGuestXml {
        message: e.to_string(),
    })?;

    let root = doc.root_element();
    if !root.has_tag_name("domain") {
        return Err(NumaExporterError::InvalidGuestXml {
            message: format!("root element is <{}>, expected <domain>", root.tag_name().name()),
        });
    }

    let mut pinned = CpuSet::new();
    let Some(cputune) = root.children().find(|n| n.has_tag_name("cputune")) else {
        return Ok(pinned);
    };

    for pin in cputune.children().filter(|n| n.has_tag_name("vcpupin")) {
        let cpuset = pin
            .attribute("cpuset")
            .ok_or_else(|| NumaExporterError::InvalidGuestXml {
                message: format!(
                    "<vcpupin vcpu='{}'> has no cpuset",
                    pin.attribute("vcpu").unwrap_or("?")
                ),
            })?;
        pinned.extend(parse_libvirt_cpuset(cpuset)?);
    }

    Ok(pinned)
}

/// Parse libvirt cpuset syntax: a range list with optional `^N` exclusions
///
/// "0-3,^2" -> {0,1,3}
pub fn parse_libvirt_cpuset(s: &str) -> Result<CpuSet> {
    let mut included = Vec::new();
    let mut excluded = Vec::new();

    for part in s.split(',') {
        let part = part.trim();
        match part.strip_prefix('^') {
            Some(rest) => excluded.push(rest),
            None => included.push(part),
        }
    }

    let mut cpus = parse_cpu_list(&included.join(","))
        .map_err(|e| e.with_context(format!("cpuset '{}'", s)))?;
    if cpus.is_empty() {
        return Err(NumaExporterError::cpu_list(s, "cpuset selects no CPUs"));
    }

    for cpu in parse_cpu_list(&excluded.join(","))
        .map_err(|e| e.with_context(format!("cpuset '{}'", s)))?
    {
        cpus.remove(&cpu);
    }

    Ok(cpus)
}
