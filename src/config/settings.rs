//! Configuration settings for the NUMA exporter
//!
//! Defines CLI arguments, subcommands and the resolved runtime
//! configuration handed to the readers.

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// numa-exporter - Per-NUMA-node CPU, hugepage and SR-IOV VF usage
#[derive(Parser, Debug, Clone)]
#[command(name = "numa-exporter")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Per-NUMA-node resource usage exporter for virtualization hosts")]
#[command(long_about = r#"
numa-exporter reports, per NUMA node, how much of the capacity reserved for
pinned guests is still free:

  - dedicated CPUs free/used (from guest vCPU pinning)
  - hugepages free/used
  - SR-IOV virtual functions free/used per whitelisted NIC

Examples:
  numa-exporter                               # One scrape, Prometheus text
  numa-exporter collect --format json         # One scrape, JSON report
  numa-exporter serve --bind 0.0.0.0          # Serve /metrics on port 9109
  numa-exporter topology                      # Show discovered topology
"#)]
pub struct CliArgs {
    /// Root of the sysfs tree
    #[arg(long, default_value = "/sys", value_name = "PATH", env = "NUMA_EXPORTER_SYSFS_ROOT")]
    pub sysfs_root: PathBuf,

    /// Root of the procfs tree
    #[arg(long, default_value = "/proc", value_name = "PATH", env = "NUMA_EXPORTER_PROCFS_ROOT")]
    pub procfs_root: PathBuf,

    /// Compute service configuration holding the CPU and NIC reservation
    #[arg(
        long,
        default_value = "/etc/nova/nova.conf",
        value_name = "PATH",
        env = "NUMA_EXPORTER_HOST_CONFIG"
    )]
    pub host_config: PathBuf,

    /// virsh executable
    #[arg(long, default_value = "virsh", value_name = "PROGRAM", env = "NUMA_EXPORTER_VIRSH")]
    pub virsh: String,

    /// libvirt connection URI passed to virsh --connect
    #[arg(long, value_name = "URI", env = "NUMA_EXPORTER_LIBVIRT_URI")]
    pub libvirt_uri: Option<String>,

    /// ip executable (iproute2)
    #[arg(long, default_value = "ip", value_name = "PROGRAM", env = "NUMA_EXPORTER_IP")]
    pub ip: String,

    /// Time budget for each external command (e.g., 10s, 1m)
    #[arg(long, default_value = "10s", value_name = "DURATION", env = "NUMA_EXPORTER_COMMAND_TIMEOUT")]
    pub command_timeout: String,

    /// Whether thread siblings of pinned CPUs count as used
    #[arg(long, value_enum, default_value = "ignore", env = "NUMA_EXPORTER_SIBLING_POLICY")]
    pub sibling_policy: SiblingPolicy,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, env = "NUMA_EXPORTER_LOG_JSON")]
    pub log_json: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run one scrape and print the result
    #[command(name = "collect")]
    Collect {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Serve metrics over HTTP
    #[command(name = "serve")]
    Serve {
        /// Listen port
        #[arg(short, long, default_value = "9109", env = "NUMA_EXPORTER_PORT")]
        port: u16,
        /// Bind address
        #[arg(short, long, default_value = "127.0.0.1", env = "NUMA_EXPORTER_BIND")]
        bind: String,
    },

    /// Print the discovered topology and reservation
    #[command(name = "topology")]
    Topology,
}

/// Output format for one-shot collection
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Prometheus text exposition
    #[default]
    Text,
    /// JSON report
    Json,
}

/// Treatment of hyper-thread siblings of pinned CPUs
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SiblingPolicy {
    /// Only the pinned CPUs themselves are used
    #[default]
    Ignore,
    /// Pinning a CPU also marks its thread siblings used
    Expand,
}

/// Resolved runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Root of the sysfs tree
    pub sysfs_root: PathBuf,
    /// Root of the procfs tree
    pub procfs_root: PathBuf,
    /// Compute service configuration file
    pub host_config: PathBuf,
    /// virsh executable
    pub virsh: String,
    /// Optional libvirt connection URI
    pub libvirt_uri: Option<String>,
    /// ip executable
    pub ip: String,
    /// Time budget for each external command
    pub command_timeout: Duration,
    /// Sibling expansion policy
    pub sibling_policy: SiblingPolicy,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            sysfs_root: PathBuf::from("/sys"),
            procfs_root: PathBuf::from("/proc"),
            host_config: PathBuf::from("/etc/nova/nova.conf"),
            virsh: "virsh".to_string(),
            libvirt_uri: None,
            ip: "ip".to_string(),
            command_timeout: Duration::from_secs(10),
            sibling_policy: SiblingPolicy::Ignore,
        }
    }
}

impl ExporterConfig {
    /// Create config from CLI arguments
    pub fn from_cli(args: &CliArgs) -> Result<Self, String> {
        let command_timeout = humantime::parse_duration(args.command_timeout.trim())
            .map_err(|e| format!("Invalid command timeout '{}': {}", args.command_timeout, e))?;
        if command_timeout.is_zero() {
            return Err("Command timeout must be greater than zero".to_string());
        }

        Ok(Self {
            sysfs_root: args.sysfs_root.clone(),
            procfs_root: args.procfs_root.clone(),
            host_config: args.host_config.clone(),
            virsh: args.virsh.clone(),
            libvirt_uri: args.libvirt_uri.clone().filter(|uri| !uri.is_empty()),
            ip: args.ip.clone(),
            command_timeout,
            sibling_policy: args.sibling_policy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("numa-exporter").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults_match_cli_defaults() {
        let config = ExporterConfig::from_cli(&parse(&[])).unwrap();
        let default = ExporterConfig::default();
        assert_eq!(config.sysfs_root, default.sysfs_root);
        assert_eq!(config.procfs_root, default.procfs_root);
        assert_eq!(config.host_config, default.host_config);
        assert_eq!(config.virsh, default.virsh);
        assert_eq!(config.ip, default.ip);
        assert_eq!(config.command_timeout, Duration::from_secs(10));
        assert_eq!(config.sibling_policy, SiblingPolicy::Ignore);
        assert!(config.libvirt_uri.is_none());
    }

    #[test]
    fn test_from_cli_overrides() {
        let args = parse(&[
            "--sysfs-root",
            "/tmp/sys",
            "--command-timeout",
            "1m 30s",
            "--sibling-policy",
            "expand",
            "--libvirt-uri",
            "qemu:///system",
            "-vv",
            "serve",
            "--port",
            "9200",
        ]);
        assert_eq!(args.verbose, 2);
        assert!(matches!(args.command, Some(Commands::Serve { port: 9200, .. })));

        let config = ExporterConfig::from_cli(&args).unwrap();
        assert_eq!(config.sysfs_root, PathBuf::from("/tmp/sys"));
        assert_eq!(config.command_timeout, Duration::from_secs(90));
        assert_eq!(config.sibling_policy, SiblingPolicy::Expand);
        assert_eq!(config.libvirt_uri.as_deref(), Some("qemu:///system"));
    }

    #[test]
    fn test_invalid_timeout() {
        assert!(ExporterConfig::from_cli(&parse(&["--command-timeout", "soon"])).is_err());
        assert!(ExporterConfig::from_cli(&parse(&["--command-timeout", "0s"])).is_err());
    }

    #[test]
    fn test_collect_format() {
        let args = parse(&["collect", "--format", "json"]);
        assert!(matches!(
            args.command,
            Some(Commands::Collect { format: OutputFormat::Json })
        ));
        assert!(CliArgs::try_parse_from(["numa-exporter", "collect", "--format", "xml"]).is_err());
    }
}
