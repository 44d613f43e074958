use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use api::Pipeline;
use api::config::AppConfig;

/// Turn a folder of photos into a chronological movement trail
#[derive(Parser)]
#[command(version)]
struct Cli {
    /// Folder containing .jpg, .jpeg or .png photos
    dir: PathBuf,
    /// Where to write the JSON report
    #[arg(short, long, default_value = "movement_data.json")]
    output: PathBuf,
    /// fast, balanced or accurate
    #[arg(long, env = "TRAIL_MODE")]
    mode: Option<String>,
    /// Vision model name
    #[arg(long, env = "GEMINI_MODEL")]
    model: Option<String>,
    /// Upper bound on simultaneous vision calls
    #[arg(long, env = "TRAIL_MAX_CONCURRENCY")]
    max_concurrency: Option<usize>,
    /// Always ask the model, even for repeated images
    #[arg(long, action)]
    no_cache: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    api::telemetry::init_tracing();

    let cli = Cli::parse();
    let mut config = AppConfig::from_lookup(|key| match key {
        "TRAIL_MODE" => cli.mode.clone(),
        "GEMINI_MODEL" => cli.model.clone(),
        "TRAIL_MAX_CONCURRENCY" => cli.max_concurrency.map(|n| n.to_string()),
        _ => std::env::var(key).ok(),
    })?;
    if cli.no_cache {
        config.cache.enabled = false;
    }

    let pipeline = Pipeline::from_config(&config)?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, keeping the points resolved so far");
            interrupt.cancel();
        }
    });

    let report = pipeline
        .run_dir(&cli.dir, cancel)
        .await
        .with_context(|| format!("Failed to build trail from {:?}", cli.dir))?;

    let json = report.to_json_pretty().context("Failed to serialize report")?;
    tokio::fs::write(&cli.output, json)
        .await
        .with_context(|| format!("Failed to write {:?}", cli.output))?;

    for segment in report.segments() {
        println!("{} -> {}: {:.2} km", segment.from, segment.to, segment.distance_km);
    }
    println!(
        "{} points ({} from metadata, {} from vision), {} unresolved, {:.2} km total -> {}",
        report.points.len(),
        report.counts.metadata,
        report.counts.vision,
        report.counts.unresolved,
        report.total_distance_km,
        cli.output.display()
    );

    Ok(())
}
