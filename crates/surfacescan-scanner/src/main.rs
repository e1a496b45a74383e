//! SurfaceScan Scanner - one-shot scan runner
//!
//! Runs a single scan against one target and prints the ScanResult as JSON.
//! The platform integrates the engine as a library; this binary exists for
//! operators and integration testing.

use anyhow::Result;
use clap::Parser;
use std::time::Duration;
use surfacescan_common::logging::{init_logging_with_config, LogConfig, LogFormat};
use surfacescan_common::EngineConfig;
use surfacescan_core::{Target, TargetKind};
use surfacescan_engine::{Correlation, ScanEngine, ScanStatus};
use surfacescan_probe::ScanProfile;
use tracing::info;

/// SurfaceScan one-shot scanner
#[derive(Parser, Debug)]
#[command(name = "surfacescan")]
#[command(version)]
#[command(about = "Attack-surface scan of a single target", long_about = None)]
struct Args {
    /// Target to scan (domain, IP, or subdomain)
    target: String,

    /// Target type (domain, ip, subdomain); auto-detected when omitted
    #[arg(long)]
    target_type: Option<String>,

    /// Probe profile (quick, web, full)
    #[arg(long, default_value = "quick")]
    profile: String,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<String>,

    /// Whole-scan deadline in seconds (0 = no deadline)
    #[arg(long, default_value_t = 0)]
    timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log format (pretty, json, compact)
    #[arg(long, default_value = "pretty")]
    log_format: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging_with_config(
        LogConfig::new()
            .level(&args.log_level)
            .format(LogFormat::parse(&args.log_format)),
    );

    info!("SurfaceScan starting");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    let config = config.merge_env();

    let target = match &args.target_type {
        Some(kind) => Target::new(kind.parse::<TargetKind>()?, &args.target)?,
        None => Target::parse(&args.target)?,
    };
    let profile = ScanProfile::parse(&args.profile);

    let engine = ScanEngine::new(config)?;

    let result = if args.timeout > 0 {
        engine
            .run_with_timeout(
                target,
                Correlation::default(),
                profile,
                Duration::from_secs(args.timeout),
            )
            .await
    } else {
        engine
            .run_with_profile(target, Correlation::default(), profile)
            .await
    };

    println!("{}", serde_json::to_string_pretty(&result)?);

    if result.status == ScanStatus::Error {
        std::process::exit(1);
    }
    Ok(())
}
