use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use bubble_layout::codec::format_generated_at;
use bubble_layout::hit::{HitIndex, HitKind};
use bubble_layout::io::ReaderRegistry;
use bubble_layout::sampler::Sampler;
use bubble_layout::scale::YearRange;
use bubble_layout::{
    ArtifactLookup, ArtifactMeta, EventRecord, LayoutConfig, LayoutMode, PositionArtifact, RunMode,
    compute_positions,
};

mod server;

/// Precomputes bubble positions for event timeline charts.
#[derive(Parser)]
#[command(name = "bubble-layout")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Layout configuration file (.yaml, .yml or .json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Lay out every chart mode and write the positions artifact
    Precompute {
        /// Event records (.json, .yaml or .yml)
        #[arg(short, long)]
        input: PathBuf,

        /// Positions artifact to write
        #[arg(short, long, default_value = "positions.json")]
        output: PathBuf,

        /// Keep at most this many events, sampled per year
        #[arg(long)]
        sample_cap: Option<usize>,

        /// Seed for the sampler
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Fixed RFC3339 timestamp for meta.generatedAt
        #[arg(long)]
        generated_at: Option<String>,

        /// Run the short preview schedule instead of the full one
        #[arg(long)]
        preview: bool,

        /// Derive the time axis from the events instead of the configured years
        #[arg(long)]
        years_from_data: bool,
    },
    /// Hit-test a point against a positions artifact
    Query {
        /// Positions artifact to read
        #[arg(short, long)]
        positions: PathBuf,

        /// Chart mode key (all, byCity)
        #[arg(short, long, default_value = "all")]
        mode: String,

        #[arg(long, allow_negative_numbers = true)]
        x: f64,

        #[arg(long, allow_negative_numbers = true)]
        y: f64,

        /// Use the click tolerance instead of hover
        #[arg(long)]
        click: bool,
    },
    /// Serve a positions artifact over HTTP, reloading it when it changes
    Serve {
        /// Positions artifact to serve
        #[arg(short, long)]
        positions: PathBuf,

        /// Port to run the server on
        #[arg(long, default_value = "3000")]
        port: u16,
    },
}

struct PrecomputeArgs {
    input: PathBuf,
    output: PathBuf,
    sample_cap: Option<usize>,
    seed: u64,
    generated_at: Option<String>,
    preview: bool,
    years_from_data: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<LayoutConfig> {
    match path {
        Some(path) => LayoutConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(LayoutConfig::default()),
    }
}

fn generated_at(pinned: Option<&str>) -> anyhow::Result<String> {
    match pinned {
        Some(text) => {
            let at = DateTime::parse_from_rfc3339(text)
                .with_context(|| format!("invalid --generated-at timestamp: {text}"))?;
            Ok(format_generated_at(at.with_timezone(&Utc)))
        }
        None => Ok(format_generated_at(Utc::now())),
    }
}

async fn precompute(args: PrecomputeArgs, mut config: LayoutConfig) -> anyhow::Result<()> {
    if args.sample_cap.is_some() {
        config.sample_cap = args.sample_cap;
    }

    let records = ReaderRegistry::with_defaults()
        .read_events(&args.input)
        .with_context(|| format!("failed to read events from {}", args.input.display()))?;
    info!(events = records.len(), input = %args.input.display(), "Loaded events");

    if args.years_from_data {
        match YearRange::spanning(records.iter().map(|r| r.date)) {
            Some(range) => config.year_range = range,
            None => warn!("No events to derive a year range from, keeping the configured one"),
        }
    }
    config.validate()?;

    let selected: Vec<EventRecord> = match config.sample_cap {
        Some(cap) => {
            let mut rng = StdRng::seed_from_u64(args.seed);
            let sampled = Sampler::new(cap).sample(&records, EventRecord::year, &mut rng);
            info!(kept = sampled.len(), of = records.len(), cap, "Sampled events");
            sampled.into_iter().cloned().collect()
        }
        None => records,
    };

    let run = if args.preview {
        RunMode::Preview {
            ticks: config.preview_ticks,
        }
    } else {
        RunMode::Precompute
    };

    let records = Arc::new(selected);
    let config = Arc::new(config);
    let handles: Vec<_> = LayoutMode::ALL
        .into_iter()
        .map(|mode| {
            let records = Arc::clone(&records);
            let config = Arc::clone(&config);
            let handle = tokio::task::spawn_blocking(move || {
                let refs: Vec<&EventRecord> = records.iter().collect();
                compute_positions(&refs, mode, &config, run, |done, total| {
                    if done % 50 == 0 || done == total {
                        info!(mode = %mode, done, total, "Simulating");
                    }
                })
            });
            (mode, handle)
        })
        .collect();

    let mut artifact = PositionArtifact::new(ArtifactMeta {
        generated_at: generated_at(args.generated_at.as_deref())?,
        event_count: records.len(),
        canvas_width: config.canvas.width,
        canvas_height: config.canvas.height,
        year_range: [config.year_range.start, config.year_range.end],
    });
    for (mode, handle) in handles {
        let positions = handle
            .await
            .with_context(|| format!("{mode} layout task failed"))?
            .with_context(|| format!("{mode} layout failed"))?;
        artifact.insert(mode.key(), positions);
    }

    artifact
        .write(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    info!(
        output = %args.output.display(),
        events = records.len(),
        "Wrote positions"
    );
    Ok(())
}

fn query(
    positions: &Path,
    mode: &str,
    x: f64,
    y: f64,
    kind: HitKind,
    config: &LayoutConfig,
) -> anyhow::Result<String> {
    let artifact = ArtifactLookup::read(positions)
        .with_context(|| format!("failed to read {}", positions.display()))?;
    let lookup = artifact
        .mode(mode)
        .ok_or_else(|| anyhow::anyhow!("artifact has no '{mode}' layout"))?;
    let index = HitIndex::new(lookup.records().to_vec(), config.hit);
    Ok(serde_json::to_string(&index.query(x, y, kind))?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Precompute {
            input,
            output,
            sample_cap,
            seed,
            generated_at,
            preview,
            years_from_data,
        } => {
            let args = PrecomputeArgs {
                input,
                output,
                sample_cap,
                seed,
                generated_at,
                preview,
                years_from_data,
            };
            precompute(args, config).await?;
        }
        Commands::Query {
            positions,
            mode,
            x,
            y,
            click,
        } => {
            let kind = if click { HitKind::Click } else { HitKind::Hover };
            println!("{}", query(&positions, &mode, x, y, kind, &config)?);
        }
        Commands::Serve { positions, port } => {
            server::serve(&positions, port, config.hit).await?;
        }
    }

    Ok(())
}
