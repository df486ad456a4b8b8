mod analyze;
mod collect;
mod sink;
mod summary;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::collect::CollectArgs;

#[derive(Debug, Parser)]
#[command(name = "tweetharvest")]
#[command(about = "Collect, deduplicate and analyse tweets from search results")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a scrape session and append accepted tweets to a JSON Lines file
    Collect(CollectArgs),
    /// Print the sentiment and trend summary of a JSON Lines file
    Analyze {
        /// File written by `collect`
        input: PathBuf,

        /// Custom `word,weight` lexicon instead of the built-in one
        #[arg(long)]
        lexicon: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Collect(args) => {
            let config = tweetharvest_core::load_app_config()?;
            init_tracing(&config.log_level, !config.env.is_production())?;
            collect::run_collect(&config, args).await
        }
        Commands::Analyze { input, lexicon } => {
            let level = std::env::var("TWEETHARVEST_LOG_LEVEL").unwrap_or_else(|_| "info".into());
            init_tracing(&level, true)?;
            analyze::run_analyze(&input, lexicon.as_deref()).await
        }
    }
}

fn init_tracing(log_level: &str, ansi: bool) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(ansi)
        .init();
    Ok(())
}
