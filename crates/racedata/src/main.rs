use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use racedata_core::{sanitize, Datum, EngineConfig, JoinMode, RaceEngine, ResolveMode, ToDatum};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod render;

#[derive(Parser, Debug)]
#[command(author, version, about = "Race timing reconciliation and metrics", long_about = None)]
struct Cli {
    /// Directory holding `<TRACK>/<race>/` exports
    #[arg(long, global = true)]
    data_root: Option<PathBuf>,

    /// TOML file with engine settings, applied before environment overrides
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use the first file when a pattern matches several instead of failing
    #[arg(long, global = true)]
    best_effort: bool,

    /// Median multiple above which a lap counts as a pit lap
    #[arg(long, global = true)]
    pit_threshold: Option<f64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct RaceArgs {
    track: String,
    race: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List track directories under the data root
    Tracks,
    /// List races recorded for a track
    Races { track: String },
    /// Winner, fastest lap and lap count from the official results
    Summary(RaceArgs),
    /// Per-driver lap statistics joined with results
    Drivers {
        #[command(flatten)]
        race: RaceArgs,
        /// Print a table instead of JSON
        #[arg(long)]
        table: bool,
    },
    /// Pit-stop laps per car
    Pits(RaceArgs),
    /// Position changes between provisional and official results
    Compare {
        #[command(flatten)]
        race: RaceArgs,
        /// Only keep cars classified in both result sets
        #[arg(long)]
        inner: bool,
        /// Print a table instead of JSON
        #[arg(long)]
        table: bool,
    },
    /// Weather aggregates and timeline
    Weather(RaceArgs),
    /// Dump one export as JSON records
    Dump {
        #[command(flatten)]
        race: RaceArgs,
        /// Glob over file names in the race folder, e.g. "*Weather*"
        pattern: String,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    debug!(
        data_root = %config.data_root.display(),
        resolve_mode = ?config.resolve_mode,
        pit_threshold_ratio = config.pit_threshold_ratio,
        "engine configured"
    );
    let engine = RaceEngine::new(config);

    match cli.command {
        Command::Tracks => {
            let tracks = engine.tracks().context("listing tracks")?;
            print_json(&tracks.to_datum()?)
        }
        Command::Races { track } => {
            let races = engine
                .races(&track)
                .with_context(|| format!("listing races for {track}"))?;
            print_json(&races.to_datum()?)
        }
        Command::Summary(RaceArgs { track, race }) => {
            let summary = engine
                .summary(&track, &race)
                .with_context(|| format!("summarizing {track}/{race}"))?;
            print_json(&summary.to_datum()?)
        }
        Command::Drivers {
            race: RaceArgs { track, race },
            table,
        } => {
            let analysis = engine
                .drivers(&track, &race)
                .with_context(|| format!("analyzing drivers for {track}/{race}"))?;
            if table {
                println!("{}", render::drivers_table(&analysis));
                Ok(())
            } else {
                print_json(&analysis.to_datum()?)
            }
        }
        Command::Pits(RaceArgs { track, race }) => {
            let windows = engine
                .pit_windows(&track, &race)
                .with_context(|| format!("detecting pit windows for {track}/{race}"))?;
            print_json(&windows.to_datum()?)
        }
        Command::Compare {
            race: RaceArgs { track, race },
            inner,
            table,
        } => {
            let join = if inner { JoinMode::Inner } else { JoinMode::Outer };
            let comparison = engine
                .compare_results(&track, &race, join)
                .with_context(|| format!("comparing results for {track}/{race}"))?;
            if table {
                println!("{}", render::comparison_table(&comparison));
                Ok(())
            } else {
                print_json(&comparison.to_datum()?)
            }
        }
        Command::Weather(RaceArgs { track, race }) => {
            let weather = engine
                .weather(&track, &race)
                .with_context(|| format!("summarizing weather for {track}/{race}"))?;
            print_json(&weather.to_datum()?)
        }
        Command::Dump {
            race: RaceArgs { track, race },
            pattern,
        } => {
            let records = engine
                .records(&track, &race, &pattern)
                .with_context(|| format!("dumping '{pattern}' for {track}/{race}"))?;
            print_json(&records)
        }
    }
}

/// Config file, then environment, then flags.
fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let base = match &cli.config {
        Some(path) => EngineConfig::from_toml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let mut config = base
        .apply_env()
        .context("applying environment overrides")?;

    if let Some(root) = &cli.data_root {
        config.data_root = root.clone();
    }
    if cli.best_effort {
        config.resolve_mode = ResolveMode::BestEffort;
    }
    if let Some(ratio) = cli.pit_threshold {
        config.pit_threshold_ratio = ratio;
    }
    let config = config.validate().context("invalid configuration")?;
    info!(data_root = %config.data_root.display(), "configuration loaded");
    Ok(config)
}

fn print_json(datum: &Datum) -> Result<()> {
    let json = serde_json::to_string_pretty(&sanitize(datum)).context("encoding output")?;
    println!("{json}");
    Ok(())
}
