//! numa-exporter CLI - Per-NUMA-node resource usage for virtualization hosts

use clap::Parser;
use numa_exporter::api::MetricsServer;
use numa_exporter::config::{CliArgs, Commands, ExporterConfig, OutputFormat, SiblingPolicy};
use numa_exporter::error::{NumaExporterError, Result};
use numa_exporter::metrics::render_text;
use numa_exporter::reconcile::ResourceReconciler;
use numa_exporter::system::{format_cpu_list, HostReservation, HostTopology, SysfsTopology};
use tracing_subscriber::EnvFilter;

fn main() {
    // Parse CLI arguments
    let args = CliArgs::parse();

    init_logging(args.verbose, args.log_json);

    // Handle result
    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Logs go to stderr so collected metrics on stdout stay clean; RUST_LOG wins over -v
fn init_logging(verbose: u8, json: bool) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn run(args: CliArgs) -> Result<()> {
    let config = ExporterConfig::from_cli(&args).map_err(NumaExporterError::ConfigError)?;
    tracing::debug!("Configuration: {:?}", config);

    match args.command.unwrap_or(Commands::Collect {
        format: OutputFormat::Text,
    }) {
        Commands::Collect { format } => cmd_collect(&config, format),
        Commands::Serve { port, bind } => cmd_serve(&config, &bind, port),
        Commands::Topology => cmd_topology(&config),
    }
}

fn cmd_collect(config: &ExporterConfig, format: OutputFormat) -> Result<()> {
    let reconciler = ResourceReconciler::from_config(config)?;
    let report = reconciler.scrape()?;

    match format {
        OutputFormat::Text => print!("{}", render_text(&report.records())),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| NumaExporterError::config(format!("Failed to encode report: {}", e)))?;
            println!("{}", json);
        }
    }

    Ok(())
}

fn cmd_serve(config: &ExporterConfig, bind: &str, port: u16) -> Result<()> {
    let reconciler = ResourceReconciler::from_config(config)?;
    let server = MetricsServer::bind(bind, port, reconciler)?;
    server.run()
}

fn cmd_topology(config: &ExporterConfig) -> Result<()> {
    let reservation = HostReservation::load(&config.host_config)?;
    let topology = HostTopology::discover(
        &SysfsTopology::new(&config.sysfs_root),
        reservation.nic_names(),
        config.sibling_policy == SiblingPolicy::Expand,
    )?;

    topology.print_summary();

    println!("\nReservation ({}):", config.host_config.display());
    println!("  Dedicated CPUs: {}", format_cpu_list(&reservation.dedicated_cpus));
    for (nic, network) in &reservation.nics {
        println!("  NIC {} -> {}", nic, if network.is_empty() { "-" } else { network });
    }

    if config.sibling_policy == SiblingPolicy::Expand {
        println!("\nThread siblings:");
        for (cpu, group) in &topology.siblings {
            println!("  CPU {}: {}", cpu, format_cpu_list(group));
        }
    }

    Ok(())
}
