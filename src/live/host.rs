//! Production inspector backed by `virsh` and `ip`

use crate::config::ExporterConfig;
use crate::error::{NumaExporterError, Result};
use crate::live::command::{render_command, CommandRunner};
use crate::live::iplink::{parse_vf_slots, VfSlot};
use crate::live::libvirt::{parse_guest_list, parse_vcpu_pins};
use crate::live::HostInspector;
use crate::system::cpulist::CpuSet;

/// Inspects guests through `virsh` and VFs through `ip link`
#[derive(Debug)]
pub struct CommandInspector {
    runner: CommandRunner,
    virsh: String,
    libvirt_uri: Option<String>,
    ip: String,
}

impl CommandInspector {
    /// Build an inspector from the exporter configuration
    pub fn from_config(config: &ExporterConfig) -> Result<Self> {
        Ok(Self {
            runner: CommandRunner::new(config.command_timeout)?,
            virsh: config.virsh.clone(),
            libvirt_uri: config.libvirt_uri.clone(),
            ip: config.ip.clone(),
        })
    }

    fn virsh_args<'a>(&'a self, args: &[&'a str]) -> Vec<&'a str> {
        let mut full = Vec::with_capacity(args.len() + 2);
        if let Some(uri) = &self.libvirt_uri {
            full.push("--connect");
            full.push(uri.as_str());
        }
        full.extend_from_slice(args);
        full
    }

    fn virsh(&self, args: &[&str]) -> Result<String> {
        self.runner.run(&self.virsh, &self.virsh_args(args))
    }
}

impl HostInspector for CommandInspector {
    fn list_running_guests(&self) -> Result<Vec<String>> {
        Ok(parse_guest_list(&self.virsh(&["list", "--uuid"])?))
    }

    fn describe_guest(&self, id: &str) -> Result<CpuSet> {
        let xml = self.virsh(&["dumpxml", id])?;
        parse_vcpu_pins(&xml)
    }

    fn vf_slots(&self, nic: &str) -> Result<Vec<VfSlot>> {
        let args = ["link", "show", nic];
        let stdout = self.runner.run(&self.ip, &args)?;
        parse_vf_slots(&stdout).map_err(|message| NumaExporterError::MalformedOutput {
            command: render_command(&self.ip, &args),
            message,
        })
    }
}
