//! Metric records and Prometheus text exposition
//!
//! Every exported value is a gauge. Records are rendered grouped by metric,
//! with `# HELP` and `# TYPE` emitted once per metric name.

use serde::Serialize;
use std::fmt::Write as _;

/// The exported gauges, in exposition order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum MetricKind {
    /// `numa_cpu_used`
    CpuUsed,
    /// `numa_cpu_free`
    CpuFree,
    /// `numa_hugepages_used`
    HugepagesUsed,
    /// `numa_hugepages_free`
    HugepagesFree,
    /// `numa_nic_VFs_free`
    VfsFree,
    /// `numa_nic_VFs_used`
    VfsUsed,
}

impl MetricKind {
    /// All kinds in exposition order
    pub const ALL: [MetricKind; 6] = [
        Self::CpuUsed,
        Self::CpuFree,
        Self::HugepagesUsed,
        Self::HugepagesFree,
        Self::VfsFree,
        Self::VfsUsed,
    ];

    /// Metric name
    pub fn name(&self) -> &'static str {
        match self {
            Self::CpuUsed => "numa_cpu_used",
            Self::CpuFree => "numa_cpu_free",
            Self::HugepagesUsed => "numa_hugepages_used",
            Self::HugepagesFree => "numa_hugepages_free",
            Self::VfsFree => "numa_nic_VFs_free",
            Self::VfsUsed => "numa_nic_VFs_used",
        }
    }

    /// HELP text
    pub fn help(&self) -> &'static str {
        match self {
            Self::CpuUsed => "Dedicated CPUs on the NUMA node pinned by running guests",
            Self::CpuFree => "Dedicated CPUs on the NUMA node not pinned by any guest",
            Self::HugepagesUsed => "Hugepages allocated on the NUMA node",
            Self::HugepagesFree => "Hugepages free on the NUMA node",
            Self::VfsFree => "SR-IOV virtual functions without an assigned MAC",
            Self::VfsUsed => "SR-IOV virtual functions with an assigned MAC",
        }
    }

    /// Label names, matching the order of [`MetricRecord::labels`]
    pub fn label_names(&self) -> &'static [&'static str] {
        match self {
            Self::CpuUsed | Self::CpuFree => &["numa"],
            Self::HugepagesUsed | Self::HugepagesFree => &["numa", "hugepage_size"],
            Self::VfsFree | Self::VfsUsed => &["numa", "nic", "network"],
        }
    }
}

/// One sample of a gauge
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRecord {
    /// Which gauge
    pub kind: MetricKind,
    /// Label values, positionally matching `kind.label_names()`
    pub labels: Vec<String>,
    /// Sample value
    pub value: f64,
}

impl MetricRecord {
    /// Create a record; `labels` must match `kind.label_names()` in length
    pub fn new(kind: MetricKind, labels: Vec<String>, value: f64) -> Self {
        debug_assert_eq!(labels.len(), kind.label_names().len());
        Self { kind, labels, value }
    }
}

/// Escape a label value for the text format
fn escape_label(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

/// Render records in Prometheus text exposition format
///
/// Metrics appear in [`MetricKind::ALL`] order; samples of one metric keep
/// their input order. Kinds without samples are omitted.
pub fn render_text(records: &[MetricRecord]) -> String {
    let mut out = String::new();

    for kind in MetricKind::ALL {
        let mut samples = records.iter().filter(|r| r.kind == kind).peekable();
        if samples.peek().is_none() {
            continue;
        }

        let _ = writeln!(out, "# HELP {} {}", kind.name(), kind.help());
        let _ = writeln!(out, "# TYPE {} gauge", kind.name());

        for record in samples {
            let labels = kind
                .label_names()
                .iter()
                .zip(&record.labels)
                .map(|(name, value)| format!("{}=\"{}\"", name, escape_label(value)))
                .collect::<Vec<_>>()
                .join(",");
            let _ = writeln!(out, "{}{{{}}} {}", kind.name(), labels, record.value);
        }
    }

    out
}
