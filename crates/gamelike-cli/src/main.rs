//! `gamelike` - batch pipeline runner and "games like this" lookup.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use comfy_table::Table;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gamelike_core::config::PipelineConfig;
use gamelike_core::similarity::SimilarityMatrix;
use gamelike_core::ItemId;

/// Game recommendation pipeline
#[derive(Parser, Debug)]
#[command(name = "gamelike")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full batch pipeline: normalize, assemble, evaluate, train,
    /// derive and persist the similarity matrix.
    Run {
        /// TOML configuration file; defaults and GAMELIKE_* environment
        /// variables fill the gaps.
        #[arg(short, long, env = "GAMELIKE_CONFIG")]
        config: Option<PathBuf>,
    },
    /// Look up the games most similar to one item from a persisted
    /// similarity matrix.
    Recommend {
        /// Path to similarities.csv written by a pipeline run.
        #[arg(short, long, env = "GAMELIKE_SIMILARITIES")]
        similarities: PathBuf,
        /// Item id to look up.
        #[arg(short, long)]
        item: ItemId,
        /// How many recommendations to print.
        #[arg(short = 'k', long, default_value = "10")]
        top_k: usize,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    match execute(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            // The core returns error kinds; only the binary decides what
            // the process status should be.
            #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

fn execute(args: Args) -> gamelike_core::Result<()> {
    match args.command {
        Command::Run { config } => {
            let config = PipelineConfig::load(config.as_deref())
                .map_err(gamelike_core::Error::other)?;
            let report = gamelike_core::run(&config)?;
            println!("{report}");
            Ok(())
        }
        Command::Recommend {
            similarities,
            item,
            top_k,
        } => {
            let matrix = SimilarityMatrix::read_csv(&similarities)?;
            let like = matrix.top_k(item, top_k)?;

            let mut table = Table::new();
            table.set_header(vec!["item_id", "similarity"]);
            for (id, score) in like {
                table.add_row(vec![id.to_string(), format!("{score:.4}")]);
            }
            println!("{table}");
            Ok(())
        }
    }
}
