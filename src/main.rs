//! camscan - IP camera / NVR discovery
//!
//! Main entry point. Discovers devices on the given targets, resolves their
//! stream URLs and prints the device list as JSON on stdout.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use camscan::{
    models::Credential,
    network_scanner::expand_targets,
    path_catalog::CustomPathPair,
    pipeline::RunOptions,
    rtsp_discovery::ValidationMethod,
    state::{AppConfig, AppState},
};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(name = "camscan", version, about = "Discover IP cameras and resolve their RTSP streams")]
struct Args {
    /// IP addresses or CIDR ranges to scan
    #[arg(required = true)]
    targets: Vec<String>,

    /// Credential as user:pass; repeat in trial order
    #[arg(short, long = "credential", value_name = "USER:PASS")]
    credentials: Vec<String>,

    /// Custom main,sub path pair (sub optional); repeatable
    #[arg(long = "custom", value_name = "MAIN[,SUB]")]
    custom: Vec<String>,

    /// Validation method: sdp, rtp or frame
    #[arg(short, long)]
    method: Option<ValidationMethod>,

    /// Skip WS-Discovery and ONVIF queries
    #[arg(long)]
    no_onvif: bool,

    /// Skip ffprobe stream analysis
    #[arg(long)]
    no_analyze: bool,

    /// JSON path catalog overriding the built-in tables
    #[arg(long, value_name = "FILE")]
    catalog: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries the JSON report
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "camscan=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    tracing::info!("Starting camscan v{}", env!("CARGO_PKG_VERSION"));

    let mut config = AppConfig::default();
    if let Some(method) = args.method {
        config.validation_method = method;
    }
    if args.catalog.is_some() {
        config.path_catalog = args.catalog.clone();
    }

    let targets = expand_targets(&args.targets).context("invalid target")?;

    let mut credentials = Vec::with_capacity(args.credentials.len());
    for raw in &args.credentials {
        let credential = Credential::parse(raw)
            .with_context(|| format!("invalid credential '{}', expected user:pass", raw))?;
        credentials.push(credential);
    }

    let mut custom_pairs = Vec::with_capacity(args.custom.len());
    for raw in &args.custom {
        let pair = CustomPathPair::parse(raw)
            .with_context(|| format!("invalid custom path pair '{}'", raw))?;
        custom_pairs.push(pair);
    }

    tracing::info!(
        targets = targets.len(),
        credentials = credentials.len(),
        custom_pairs = custom_pairs.len(),
        method = %config.validation_method,
        onvif = !args.no_onvif,
        analyze = !args.no_analyze,
        "Configuration loaded"
    );

    let state = AppState::build(config).await?;
    let options = RunOptions {
        credentials,
        custom_pairs,
        onvif: !args.no_onvif,
        analyze: !args.no_analyze,
    };

    let result = tokio::select! {
        r = state.pipeline.run(targets, &options) => r,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, shutting down");
            state.pipeline.shutdown(SHUTDOWN_GRACE).await;
            return Ok(());
        }
    };

    state.pipeline.shutdown(SHUTDOWN_GRACE).await;
    let devices = result?;

    println!("{}", serde_json::to_string_pretty(&devices)?);
    Ok(())
}
