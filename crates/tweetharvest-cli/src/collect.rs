//! `tweetharvest collect`: one scrape session from the command line.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use clap::Args;
use tweetharvest_analysis::Lexicon;
use tweetharvest_core::{AppConfig, DateRange, SearchMode};
use tweetharvest_scraper::{
    BrowserlessSessionFactory, BrowserlessSettings, Credential, EngineSettings, Orchestrator,
    ScrapeError, ScrapeRequest,
};

use crate::sink::JsonLinesSink;
use crate::summary;

#[derive(Debug, Args)]
pub(crate) struct CollectArgs {
    /// Search query, including any platform operators
    #[arg(long)]
    pub query: String,

    /// First day to search (inclusive), e.g. 2024-05-01
    #[arg(long)]
    pub since: NaiveDate,

    /// Day after the last day to search (exclusive)
    #[arg(long)]
    pub until: NaiveDate,

    /// Stop once this many unique tweets have been collected
    #[arg(long, default_value_t = 100)]
    pub target: u64,

    /// Number of concurrent browser sessions
    #[arg(long, default_value_t = 1)]
    pub parallelism: usize,

    /// Timeline ordering: `latest` or `top`
    #[arg(long, default_value = "latest")]
    pub mode: SearchMode,

    /// JSON Lines file that accepted tweets are appended to
    #[arg(long, default_value = "tweets.jsonl")]
    pub output: PathBuf,

    /// Relative tweet density per day, comma separated (one value per day)
    #[arg(long, value_delimiter = ',')]
    pub density_hints: Option<Vec<f64>>,

    /// Custom `word,weight` lexicon for the closing sentiment summary
    #[arg(long)]
    pub lexicon: Option<PathBuf>,
}

/// Runs a session to completion, printing progress until it ends or Ctrl-C
/// cancels it, then prints the analysis summary.
///
/// # Errors
///
/// Returns an error if the request is invalid, the output file cannot be
/// written, or every work unit failed.
pub(crate) async fn run_collect(config: &AppConfig, args: CollectArgs) -> anyhow::Result<()> {
    let range = DateRange::new(args.since, args.until)?;
    let lexicon = match &args.lexicon {
        Some(path) => Lexicon::load(path)?,
        None => Lexicon::builtin(),
    };

    let sink = Arc::new(
        JsonLinesSink::create(&args.output)
            .await
            .with_context(|| format!("failed to open {}", args.output.display()))?,
    );
    let factory = Arc::new(BrowserlessSessionFactory::new(
        BrowserlessSettings::from_config(config),
    )?);
    let credential = config
        .auth_token
        .as_deref()
        .map(Credential::new)
        .unwrap_or_default();
    if credential.expose().is_none() {
        tracing::warn!("TWEETHARVEST_AUTH_TOKEN is not set; search results may be limited");
    }

    let orchestrator = Orchestrator::new(
        EngineSettings::from_config(config),
        factory,
        sink.clone(),
        credential,
    );

    let mut request = ScrapeRequest::new(args.query, range, args.target, args.parallelism)
        .with_mode(args.mode);
    if let Some(hints) = args.density_hints {
        request = request.with_density_hints(hints);
    }

    let handle = orchestrator.start(request)?;
    println!("session {} started, writing to {}", handle.id(), args.output.display());

    let mut progress = handle.subscribe();
    let mut interrupted = false;
    loop {
        tokio::select! {
            changed = progress.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = progress.borrow_and_update().clone();
                println!("{}", summary::progress_line(&snapshot));
                if snapshot.is_terminal() {
                    break;
                }
            }
            signal = tokio::signal::ctrl_c(), if !interrupted => {
                signal.context("failed to listen for ctrl-c")?;
                interrupted = true;
                println!("interrupt received, finishing in-flight pages...");
                orchestrator.cancel(&handle);
            }
        }
    }

    let result = handle.wait().await;
    sink.flush().await.context("failed to flush output")?;

    match result {
        Ok(report) => {
            summary::print_report(&report, &lexicon);
            Ok(())
        }
        Err(ScrapeError::AllUnitsFailed { failures }) => {
            for failure in &failures {
                eprintln!("  {failure}");
            }
            anyhow::bail!("all {} work units failed", failures.len())
        }
        Err(e) => Err(e.into()),
    }
}
