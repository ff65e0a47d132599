//! p4ctl entry point.
//!
//! Loads the P4Info and device config produced by the P4 build, compiles the
//! intents of the topology file and drives the simulated switches until
//! ctrl-c or the tick limit.

use anyhow::Context;
use clap::{CommandFactory, Parser};
use log::{error, info, warn};
use p4ctl_agent::audit::{AuditCategory, AuditOutcome, AuditRecord};
use p4ctl_agent::audit_log;
use p4ctl_agent::config::AgentConfig;
use p4ctl_agent::daemon::{Orchestrator, RunContext};
use p4ctl_agent::schema::SchemaResolver;
use p4ctl_southbound::{ProgramDescriptor, SimulatedFabric};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// P4Runtime intent controller
#[derive(Parser, Debug)]
#[command(name = "p4ctl")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// P4Info file produced by the P4 compiler
    #[arg(long, default_value = "./build/advanced_tunnel.p4.p4info.json")]
    p4info: PathBuf,

    /// BMv2 JSON device config produced by the P4 compiler
    #[arg(long = "bmv2-json", default_value = "./build/advanced_tunnel.json")]
    bmv2_json: PathBuf,

    /// Topology file with switches, intents and counters
    #[arg(short = 't', long, default_value = "topology.yaml")]
    topology: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Stop after this many telemetry ticks
    #[arg(long)]
    ticks: Option<u64>,

    /// Do not read back installed entries
    #[arg(long)]
    no_readback: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    for (path, what) in [(&args.p4info, "p4info file"), (&args.bmv2_json, "BMv2 JSON file")] {
        if !path.exists() {
            let _ = Args::command().print_help();
            eprintln!("\n{} not found: {}\nHave you run 'make'?", what, path.display());
            return ExitCode::FAILURE;
        }
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    let resolver = SchemaResolver::load(&args.p4info)
        .with_context(|| format!("loading {}", args.p4info.display()))?;
    let program = ProgramDescriptor {
        name: program_name(&args.bmv2_json),
        p4info: std::fs::read(&args.p4info)
            .with_context(|| format!("reading {}", args.p4info.display()))?,
        device_config: std::fs::read(&args.bmv2_json)
            .with_context(|| format!("reading {}", args.bmv2_json.display()))?,
    };

    let mut config = AgentConfig::load(&args.topology)?;
    if args.no_readback {
        config.readback = false;
    }
    info!(
        "Loaded {}: {} switches, {} intents, {} counters",
        args.topology.display(),
        config.switches.len(),
        config.intents.len(),
        config.telemetry.counters.len()
    );
    audit_log!(AuditRecord::new(AuditCategory::ConfigurationChange, "p4ctl", "load_config")
        .with_object(args.topology.display().to_string())
        .with_details(serde_json::json!({
            "p4info": args.p4info.display().to_string(),
            "switches": config.switches.len(),
            "intents": config.intents.len(),
        }))
        .with_outcome(AuditOutcome::Success));

    let ctx = RunContext::from_config(&config, Arc::new(resolver), program)?.with_max_ticks(args.ticks);
    let orchestrator = Orchestrator::new(ctx, Arc::new(SimulatedFabric::new()));

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down");
            on_signal.cancel();
        }
    });

    let summary = orchestrator
        .run(&config.intents, &cancel, |report| println!("{}", report))
        .await?;

    println!("{}", summary.install);
    info!(
        "Telemetry: {} ticks, {} samples, {} failed reads",
        summary.telemetry.ticks, summary.telemetry.samples, summary.telemetry.failures
    );

    if !summary.install.is_success() {
        warn!("Some entries were not installed");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// `build/advanced_tunnel.json` -> `advanced_tunnel`
fn program_name(device_config: &Path) -> String {
    device_config
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "program".to_string())
}
