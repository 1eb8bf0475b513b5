//! movecoach: engine-backed feedback on chess moves.
//!
//! `calibrate` measures how deep the local engine can search within the time
//! budget. `analyze` evaluates a line of moves, classifies every move by how
//! much winning chance it gave away and prints the result as JSON.
//!
//! Tunables come from `MOVECOACH_*` environment variables (see
//! [`analysis::config`]); flags given here take precedence.

use std::path::PathBuf;

use analysis::{spawn_session, ExplorerClient, OpeningBook, PipelineConfig, SessionHandle};
use anyhow::Context;
use clap::{Parser, Subcommand};
use engine::StockfishEngine;

mod logging;
mod pipeline;

use pipeline::{run_analysis, AnalyzeOptions};

#[derive(Parser)]
#[command(name = "movecoach", about = "Engine-backed feedback on chess moves")]
struct Cli {
    /// Path to a UCI engine binary (defaults to `stockfish` on PATH)
    #[arg(long, global = true)]
    engine: Option<PathBuf>,

    /// Engine hash table size in MB
    #[arg(long, global = true)]
    hash_mb: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find the deepest search that fits the time budget and print it.
    Calibrate,

    /// Analyse a line of moves and print per-move feedback as JSON.
    Analyze {
        /// Moves in UCI notation, oldest first
        #[arg(long, num_args = 1.., required = true)]
        moves: Vec<String>,

        /// Position the first move is played from (defaults to the start position)
        #[arg(long)]
        fen: Option<String>,

        /// Search depth; calibrated first when omitted
        #[arg(long)]
        depth: Option<u8>,

        /// Ply index of the first move within the whole game
        #[arg(long, default_value_t = 0)]
        start_ply: usize,

        /// Evaluate the latest position first
        #[arg(long)]
        recent_first: bool,

        /// Look moves up in the opening explorer and never flag book moves
        #[arg(long)]
        book: bool,

        /// Save hurdles and request explanations for the worst moves
        #[arg(long)]
        review: bool,

        /// Where hurdles are saved
        #[arg(long)]
        hurdle_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_dir = std::env::var_os("MOVECOACH_LOG_DIR").map(PathBuf::from);
    let _guard = logging::init(log_dir.as_deref());

    let cli = Cli::parse();

    let mut config = PipelineConfig::from_env();
    if let Some(path) = cli.engine {
        config.engine_path = Some(path);
    }
    if let Some(hash_mb) = cli.hash_mb {
        config.hash_mb = hash_mb;
    }

    let engine = StockfishEngine::spawn_with_config(config.engine_config())
        .await
        .context("Failed to start engine")?;
    let session = spawn_session(engine, config.session_config());

    let result = run_command(&session, config, cli.command).await;

    session.shutdown().await;
    result
}

async fn run_command(
    session: &SessionHandle,
    mut config: PipelineConfig,
    command: Commands,
) -> anyhow::Result<()> {
    match command {
        Commands::Calibrate => {
            let report = session.calibrate().await?;
            tracing::info!(depth = report.recommended_depth, "Calibration finished");
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Analyze {
            moves,
            fen,
            depth,
            start_ply,
            recent_first,
            book,
            review,
            hurdle_dir,
        } => {
            if let Some(dir) = hurdle_dir {
                config.hurdle_dir = dir;
            }

            let explorer = if book {
                match ExplorerClient::new(config.book_endpoint.as_str(), config.book_timeout) {
                    Ok(client) => Some(client),
                    Err(e) => {
                        tracing::warn!("Opening book unavailable: {}", e);
                        None
                    }
                }
            } else {
                None
            };

            let options = AnalyzeOptions {
                moves,
                fen,
                depth,
                start_ply,
                recent_first,
                review,
            };
            let report = run_analysis(
                session,
                &config,
                &options,
                explorer.as_ref().map(|b| b as &dyn OpeningBook),
            )
            .await?;

            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
