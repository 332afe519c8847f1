//! modelwatch CLI
//!
//! Replays recorded document model events through Lua observers and
//! reports what they received.
//!
//! # Environment Variables
//!
//! - `MW_LOG_LEVEL`: Log level filter (overridden by `RUST_LOG`)
//! - `MW_LOG_FORMAT`: `pretty` or `json`

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use modelwatch_core::config::BridgeConfig;
use modelwatch_core::logging::{LogFormat, init_logging};
use modelwatch_core::registry::ObserverInfo;
use modelwatch_core::{
    BridgeStats, EventKind, FaultRecord, HostSignals, ObserverBridge, ScriptHost, Trace,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// modelwatch - document model events for scripted observers
#[derive(Parser, Debug)]
#[command(name = "mw")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "MW_LOG_LEVEL", value_name = "LEVEL")]
    log_level: Option<String>,

    /// Log format
    #[arg(long, global = true, env = "MW_LOG_FORMAT", value_name = "FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the event kinds and the handler each one calls
    Kinds {
        /// Handler name prefix
        #[arg(long, default_value = "slot")]
        prefix: String,

        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Replay an event trace through the observers a script registers
    Replay {
        /// TOML event trace
        #[arg(long, value_name = "FILE")]
        trace: PathBuf,

        /// Lua script registering observers
        #[arg(long, value_name = "FILE")]
        script: Option<PathBuf>,

        /// modelwatch.toml
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Serialize)]
struct KindRow {
    kind: EventKind,
    scope: String,
    arguments: &'static str,
    handler: String,
}

#[derive(Serialize)]
struct ReplayReport {
    events: usize,
    observers: Vec<ObserverInfo>,
    stats: BridgeStats,
    faults: Vec<FaultRecord>,
    faults_total: u64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match &cli.command {
        Commands::Replay { config, .. } => config.as_deref(),
        Commands::Kinds { .. } => None,
    };
    let mut config = load_config(config_path)?;
    if let Some(level) = &cli.log_level {
        config.logging.level.clone_from(level);
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    config.validate().context("invalid configuration")?;
    init_logging(&config.logging).context("failed to initialize logging")?;

    match cli.command {
        Commands::Kinds { prefix, format } => {
            print_kinds(&prefix, format)?;
        }
        Commands::Replay {
            trace,
            script,
            format,
            ..
        } => {
            let report = replay(&trace, script.as_deref(), &config)?;
            print_report(&report, format)?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<BridgeConfig> {
    match path {
        Some(path) => BridgeConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(BridgeConfig::default()),
    }
}

fn print_kinds(prefix: &str, format: OutputFormat) -> Result<()> {
    let rows: Vec<KindRow> = EventKind::ALL
        .into_iter()
        .map(|kind| KindRow {
            kind,
            scope: kind.scope().to_string(),
            arguments: kind.arguments(),
            handler: kind.handler_name(prefix),
        })
        .collect();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Text => {
            println!("{:<18} {:<9} {:<18} HANDLER", "KIND", "SCOPE", "ARGUMENTS");
            for row in &rows {
                println!(
                    "{:<18} {:<9} {:<18} {}",
                    row.kind.name(),
                    row.scope,
                    row.arguments,
                    row.handler
                );
            }
        }
    }
    Ok(())
}

fn replay(trace_path: &Path, script: Option<&Path>, config: &BridgeConfig) -> Result<ReplayReport> {
    let trace = Trace::load(trace_path)
        .with_context(|| format!("failed to load trace {}", trace_path.display()))?;

    let host = HostSignals::new();
    let bridge = Arc::new(ObserverBridge::with_config(&host, config));
    let scripts =
        ScriptHost::new(&bridge, &config.script).context("failed to install observer API")?;

    if let Some(script) = script {
        let source = std::fs::read_to_string(script)
            .with_context(|| format!("failed to read script {}", script.display()))?;
        scripts
            .exec(&source, &format!("@{}", script.display()))
            .with_context(|| format!("script {} failed", script.display()))?;
    }
    tracing::info!(
        observers = bridge.observer_count(),
        events = trace.len(),
        "replaying trace"
    );

    let events = trace.replay(&host);
    let (faults, faults_total) = bridge
        .fault_log()
        .map_or((Vec::new(), 0), |log| (log.records(), log.total()));
    let report = ReplayReport {
        events,
        observers: bridge.observers(),
        stats: bridge.stats(),
        faults,
        faults_total,
    };
    bridge.shutdown();
    Ok(report)
}

fn print_report(report: &ReplayReport, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!(
        "replayed {} events through {} observers",
        report.events,
        report.observers.len()
    );
    for observer in &report.observers {
        println!("  {} ({}): {:?}", observer.name, observer.id, observer.capabilities);
    }
    println!();
    println!("{:<18} {:>9} {:>9} {:>6}", "KIND", "FORWARDED", "DELIVERED", "FAULTS");
    for kind in &report.stats.kinds {
        println!(
            "{:<18} {:>9} {:>9} {:>6}",
            kind.kind.name(),
            kind.forwarded,
            kind.delivered,
            kind.faults
        );
    }
    if report.faults_total > 0 {
        println!();
        println!("faults ({}):", report.faults_total);
        for record in &report.faults {
            println!(
                "  {} {} ({}): {}",
                record.kind, record.observer_name, record.observer, record.fault
            );
        }
    }
    Ok(())
}
