use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use log::{error, info};
use perftcheck_core::position::{castling_mode, read_positions};
use perftcheck_core::{
    CheckReport, LibraryCounter, RunConfig, Summary, UciEngine, check_position,
};
use serde::Serialize;
use tools::common::{JsonlWriter, open_reader};

/// 合法手生成器（shakmaty）と UCI 参照エンジンの perft を突き合わせる。
///
/// # よく使うコマンド例
///
/// - 既定の7局面を深さ5で Stockfish と比較:
///   `cargo run --release -p tools --bin perftcheck -- --engine-path ./stockfish`
///
/// - 局面ファイルを深さ4で、結果を JSONL に書き出す:
///   `cargo run --release -p tools --bin perftcheck -- --positions-file suite.epd --depth 4 --out runs/perft.jsonl`
///
/// - 設定ファイルを使い、最初の失敗で止める:
///   `cargo run --release -p tools --bin perftcheck -- --config perftcheck.toml --fail-fast`
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Perft differential tester (shakmaty vs UCI reference engine)"
)]
struct Cli {
    /// TOML config file; command-line flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to the reference UCI engine binary
    #[arg(long)]
    engine_path: Option<PathBuf>,

    /// Extra argument passed to the engine process (can be specified multiple times)
    #[arg(long = "engine-arg", allow_hyphen_values = true)]
    engine_args: Vec<String>,

    /// Perft depth at the root of each position
    #[arg(long)]
    depth: Option<u32>,

    /// Position to check (FEN); can be given multiple times
    #[arg(long)]
    fen: Vec<String>,

    /// File with one FEN per line ("-" for stdin, .gz supported)
    #[arg(long, conflicts_with = "fen")]
    positions_file: Option<PathBuf>,

    /// Hash option (MiB)
    #[arg(long)]
    hash_mb: Option<u32>,

    /// Threads option
    #[arg(long)]
    threads: Option<usize>,

    /// UCI options to set (format: "Name=Value", can be specified multiple times)
    #[arg(long = "uci-option")]
    uci_options: Vec<String>,

    /// Timeout for a single `go perft` in seconds
    #[arg(long)]
    perft_timeout_secs: Option<u64>,

    /// Treat castling as Chess960 (king takes rook) on both sides
    #[arg(long, default_value_t = false)]
    chess960: bool,

    /// Count root moves in parallel on the library side
    #[arg(long, default_value_t = false)]
    parallel: bool,

    /// Write JSONL reports to this path ("-" for stdout, .gz compresses)
    #[arg(long)]
    out: Option<PathBuf>,

    /// Stop at the first failing position
    #[arg(long, default_value_t = false)]
    fail_fast: bool,
}

#[derive(Serialize)]
struct MetaLog {
    #[serde(rename = "type")]
    kind: &'static str,
    timestamp: String,
    engine_path: String,
    engine_args: Vec<String>,
    depth: u32,
    chess960: bool,
    positions: Vec<String>,
}

fn build_config(cli: &Cli) -> Result<RunConfig> {
    let mut cfg = match &cli.config {
        Some(path) => RunConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => RunConfig::default(),
    };
    if let Some(depth) = cli.depth {
        cfg.depth = depth;
    }
    if cli.chess960 {
        cfg.chess960 = true;
    }
    if cli.parallel {
        cfg.parallel = true;
    }
    if let Some(path) = &cli.engine_path {
        cfg.engine.path = path.clone();
    }
    if !cli.engine_args.is_empty() {
        cfg.engine.args = cli.engine_args.clone();
    }
    if let Some(hash) = cli.hash_mb {
        cfg.engine.hash_mb = hash;
    }
    if let Some(threads) = cli.threads {
        cfg.engine.threads = threads;
    }
    cfg.engine.options.extend(cli.uci_options.iter().cloned());
    if let Some(secs) = cli.perft_timeout_secs {
        cfg.engine.perft_timeout_secs = secs;
    }

    if let Some(path) = &cli.positions_file {
        let reader = open_reader(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        cfg.positions = read_positions(reader, castling_mode(cfg.chess960))
            .with_context(|| format!("invalid positions file {}", path.display()))?;
    } else if !cli.fen.is_empty() {
        cfg.positions = cli.fen.clone();
    }

    cfg.validate().context("invalid configuration")?;
    Ok(cfg)
}

fn run(cli: &Cli) -> Result<Summary> {
    let cfg = build_config(cli)?;
    let mode = castling_mode(cfg.chess960);
    let engine_cfg = cfg.engine_config();

    let mut report_out = match &cli.out {
        Some(path) => Some(
            JsonlWriter::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?,
        ),
        None => None,
    };
    if let Some(out) = report_out.as_mut() {
        out.write_record(&MetaLog {
            kind: "meta",
            timestamp: Local::now().to_rfc3339(),
            engine_path: engine_cfg.path.display().to_string(),
            engine_args: engine_cfg.args.clone(),
            depth: cfg.depth,
            chess960: cfg.chess960,
            positions: cfg.positions.clone(),
        })?;
    }

    let mut engine = UciEngine::spawn(&engine_cfg, "engine".to_string())?;
    let mut library = LibraryCounter::new(mode).with_parallel(cfg.parallel);
    info!(
        "checking {} position(s) at depth {} against {} (perft timeout {:?})",
        cfg.positions.len(),
        cfg.depth,
        engine_cfg.path.display(),
        Duration::from_secs(cfg.engine.perft_timeout_secs)
    );

    let mut reports: Vec<CheckReport> = Vec::with_capacity(cfg.positions.len());
    for fen in &cfg.positions {
        let report = check_position(&mut library, &mut engine, fen, cfg.depth, mode)
            .with_context(|| format!("while checking {fen}"))?;
        if report.outcome.is_pass() {
            info!("PASS");
        } else if let Some(divergent) = report.divergent_fen() {
            error!("{:?} diverges at {divergent}", report.outcome);
        }
        if let Some(out) = report_out.as_mut() {
            out.write_record(&report)?;
        }
        let failed = !report.outcome.is_pass();
        reports.push(report);
        if failed && cli.fail_fast {
            info!("stopping after first failure (--fail-fast)");
            break;
        }
    }

    let summary = Summary::from_reports(&reports);
    if summary.all_passed() {
        info!("ALL TESTS PASS");
    } else {
        info!("{} FAILURES", summary.failed);
    }
    if let Some(mut out) = report_out {
        out.write_record(&summary)?;
        out.close().context("failed to finalize report")?;
    }
    Ok(summary)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(summary) if summary.all_passed() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(1),
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags_override_defaults() {
        let cli = Cli::parse_from([
            "perftcheck",
            "--depth",
            "3",
            "--fen",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "--hash-mb",
            "16",
            "--uci-option",
            "Move Overhead=0",
        ]);
        let cfg = build_config(&cli).unwrap();
        assert_eq!(cfg.depth, 3);
        assert_eq!(cfg.positions.len(), 1);
        assert_eq!(cfg.engine.hash_mb, 16);
        assert_eq!(cfg.engine.options, vec!["Move Overhead=0"]);
    }

    #[test]
    fn invalid_fen_is_rejected_before_spawning() {
        let cli = Cli::parse_from(["perftcheck", "--fen", "garbage"]);
        assert!(build_config(&cli).is_err());
    }

    #[test]
    fn engine_arg_takes_one_value_per_flag() {
        let cli = Cli::parse_from([
            "perftcheck",
            "--engine-arg",
            "-c",
            "--engine-arg",
            "exit 0",
            "--fen",
            "garbage",
            "--depth",
            "2",
        ]);
        assert_eq!(cli.engine_args, vec!["-c", "exit 0"]);
        assert_eq!(cli.fen, vec!["garbage"]);
        assert_eq!(cli.depth, Some(2));
        let err = build_config(&cli).unwrap_err();
        assert!(format!("{err:#}").contains("invalid configuration"));
    }

    #[test]
    fn fen_and_positions_file_conflict() {
        let res = Cli::try_parse_from(["perftcheck", "--fen", "x", "--positions-file", "p.txt"]);
        assert!(res.is_err());
    }
}
