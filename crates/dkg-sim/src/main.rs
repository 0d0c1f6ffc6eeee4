//! DKG Simulator CLI
//!
//! Runs a complete key generation in-process and prints the outcome:
//! - FROST: one key slot per party
//! - WSTS: key slots spread over weighted parties

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use frost_dkg_core::{
    FrostSession, MapMode, SessionConfig, SessionReport, WstsSession, DEFAULT_PARTIES,
    DEFAULT_THRESHOLD,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, Level};

/// DKG Simulator - FROST/WSTS key generation driver
#[derive(Parser)]
#[command(name = "dkg-sim")]
#[command(about = "Simulated FROST and WSTS distributed key generation")]
#[command(version)]
struct Cli {
    /// JSON file with session parameters
    #[arg(short, long, env = "DKG_CONFIG")]
    config: Option<PathBuf>,

    /// Q/W map distribution mode
    #[arg(short, long, env = "DKG_MAP_MODE", value_enum)]
    map_mode: Option<MapModeArg>,

    /// Number of sessions to run back to back
    #[arg(short, long, env = "DKG_ITERATIONS", default_value_t = 1)]
    iterations: usize,

    /// Write the reports as JSON to this file
    #[arg(short, long, env = "DKG_REPORT")]
    report: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, env = "DKG_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plain FROST, one key slot per party
    Frost {
        /// Number of parties
        #[arg(short, long)]
        n: Option<usize>,

        /// Threshold (t-of-n)
        #[arg(short, long)]
        t: Option<usize>,
    },

    /// Weighted FROST
    Wsts {
        /// Number of parties
        #[arg(short, long)]
        parties: Option<usize>,

        /// Number of key slots
        #[arg(short, long)]
        keys: Option<usize>,

        /// Threshold over key slots
        #[arg(short, long)]
        t: Option<usize>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum MapModeArg {
    Broadcast,
    Recompute,
}

impl From<MapModeArg> for MapMode {
    fn from(mode: MapModeArg) -> Self {
        match mode {
            MapModeArg::Broadcast => MapMode::Broadcast,
            MapModeArg::Recompute => MapMode::Recompute,
        }
    }
}

/// Session parameters loaded from `--config`; flags take precedence
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    n_parties: Option<usize>,
    n_keys: Option<usize>,
    threshold: Option<usize>,
    map_mode: Option<MapMode>,
    /// Hex-encoded 32-byte session id
    session_id: Option<String>,
}

impl FileConfig {
    fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = serde_json::from_str(&json)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter =
        tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into());
    if cli.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let file = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let config = session_config(&cli, &file)?;

    if cli.iterations == 0 {
        bail!("At least one iteration is required");
    }

    let mut reports = Vec::with_capacity(cli.iterations);
    for iteration in 1..=cli.iterations {
        info!(
            iteration,
            n_parties = config.n_parties,
            n_keys = config.n_keys,
            threshold = config.threshold,
            "Starting session"
        );
        let session_config = config_for_iteration(&config, iteration);
        let report = match cli.command {
            Commands::Frost { .. } => FrostSession::new(session_config)?.run()?,
            Commands::Wsts { .. } => WstsSession::new(session_config)?.run()?,
        };
        print_report(iteration, &report);
        reports.push(report);
    }

    if let Some(path) = &cli.report {
        let json = serde_json::to_string_pretty(&reports)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        info!(path = ?path, "Reports saved");
    }

    Ok(())
}

fn session_config(cli: &Cli, file: &FileConfig) -> Result<SessionConfig> {
    let (n_parties, n_keys, threshold) = match cli.command {
        Commands::Frost { n, t } => {
            let n = n.or(file.n_parties).unwrap_or(DEFAULT_PARTIES);
            (n, n, t.or(file.threshold).unwrap_or(DEFAULT_THRESHOLD))
        }
        Commands::Wsts { parties, keys, t } => {
            let n_parties = parties.or(file.n_parties).unwrap_or(DEFAULT_PARTIES);
            let n_keys = keys.or(file.n_keys).unwrap_or(n_parties);
            (n_parties, n_keys, t.or(file.threshold).unwrap_or(DEFAULT_THRESHOLD))
        }
    };

    let map_mode = cli
        .map_mode
        .map(MapMode::from)
        .or(file.map_mode)
        .unwrap_or_default();
    let mut config = SessionConfig::wsts(n_parties, n_keys, threshold)?.with_map_mode(map_mode);

    if let Some(session_id) = &file.session_id {
        let bytes: [u8; 32] = hex::decode(session_id)?
            .try_into()
            .map_err(|_| anyhow::anyhow!("Session id must be 32 bytes"))?;
        config = config.with_session_id(bytes);
    }
    Ok(config)
}

/// Repeated runs must not share a proof context
fn config_for_iteration(config: &SessionConfig, iteration: usize) -> SessionConfig {
    if iteration == 1 {
        return config.clone();
    }
    let mut session_id = config.session_id;
    let counter = (iteration as u64).to_be_bytes();
    for (byte, mask) in session_id.iter_mut().rev().zip(counter.iter().rev()) {
        *byte ^= mask;
    }
    config.clone().with_session_id(session_id)
}

fn print_report(iteration: usize, report: &SessionReport) {
    println!("Session {}:", iteration);
    println!("  Parties: {}", report.n_parties);
    println!("  Key slots: {}", report.n_keys);
    println!("  Threshold: {}", report.threshold);
    println!("  Group Public Key: {}", report.group_public_key);
    for (idx, share) in report.public_signing_shares.iter().enumerate() {
        println!("  Public Signing Share {}: {}", idx + 1, share);
    }
    println!("  Rounds:");
    for timing in &report.rounds {
        println!("    {:<42} {:>6} ms", timing.round, timing.elapsed_ms);
    }
}
