//! ddreloc - double-difference earthquake relocation.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Relocate a seismic catalog from catalog picks and waveform cross-correlation
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via DDRELOC_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    ddreloc_telemetry::init_logging()?;

    info!("Starting ddreloc v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > DDRELOC_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("DDRELOC_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = ddreloc_app::AppConfig::from_file(&config_path)?;

    let relocator = ddreloc_app::RelocatorBuilder::new(config).build()?;
    let report = relocator.run()?;

    info!(
        pairs = report.pairs,
        dt_cc = report.dt_cc,
        dt_ct = report.dt_ct,
        relocated = report.summary.relocated.len(),
        air_quakes = report.summary.air_quakes.len(),
        reused_artifacts = report.reused_artifacts,
        output = %report.output.display(),
        "Relocation complete"
    );
    Ok(())
}
