//! Range-encoded CPU lists
//!
//! The kernel (`cpulist`, `thread_siblings_list`) and the host configuration
//! (`cpu_dedicated_set`) both describe CPU sets as comma-separated items,
//! each a single id or an inclusive `a-b` range: `"0-3,8,10-11"`.

use crate::error::{NumaExporterError, Result};
use std::collections::BTreeSet;

/// Logical CPU id, unique across the host
pub type CpuId = u32;

/// Ordered set of CPU ids
pub type CpuSet = BTreeSet<CpuId>;

/// Highest CPU id accepted in a list
pub const MAX_CPU_ID: CpuId = 1 << 16;

/// Parse a CPU list (e.g., "0-3,8,10-11" -> {0,1,2,3,8,10,11})
///
/// Surrounding whitespace is ignored and an empty string yields the empty
/// set, which is what sysfs reports for a CPU-less node.
pub fn parse_cpu_list(s: &str) -> Result<CpuSet> {
    let mut cpus = CpuSet::new();
    let trimmed = s.trim();

    if trimmed.is_empty() {
        return Ok(cpus);
    }

    for part in trimmed.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return Err(NumaExporterError::cpu_list(s.trim(), "empty item"));
        }

        if let Some((start, end)) = part.split_once('-') {
            let start = parse_cpu_id(s, start)?;
            let end = parse_cpu_id(s, end)?;
            if end < start {
                return Err(NumaExporterError::cpu_list(
                    s.trim(),
                    format!("range {} ends before it starts", part),
                ));
            }
            cpus.extend(start..=end);
        } else {
            cpus.insert(parse_cpu_id(s, part)?);
        }
    }

    Ok(cpus)
}

fn parse_cpu_id(input: &str, item: &str) -> Result<CpuId> {
    let id = item.trim().parse::<CpuId>().map_err(|_| {
        NumaExporterError::cpu_list(input.trim(), format!("'{}' is not a CPU id", item.trim()))
    })?;
    if id > MAX_CPU_ID {
        return Err(NumaExporterError::cpu_list(
            input.trim(),
            format!("CPU id {} exceeds {}", id, MAX_CPU_ID),
        ));
    }
    Ok(id)
}

/// Render a CPU set in compact range form ({0,1,2,3,8} -> "0-3,8")
pub fn format_cpu_list(cpus: &CpuSet) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut iter = cpus.iter().copied();

    let Some(first) = iter.next() else {
        return String::new();
    };

    let (mut start, mut end) = (first, first);
    for cpu in iter {
        if cpu == end + 1 {
            end = cpu;
            continue;
        }
        parts.push(format_range(start, end));
        start = cpu;
        end = cpu;
    }
    parts.push(format_range(start, end));

    parts.join(",")
}

fn format_range(start: CpuId, end: CpuId) -> String {
    if start == end {
        start.to_string()
    } else {
        format!("{}-{}", start, end)
    }
}
