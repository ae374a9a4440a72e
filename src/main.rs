use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;
use feedtally::dates::{recent_days, today_in, yesterday_in};
use feedtally::{render_preview, Pipeline, RunOptions};
use feedtally_core::config::Config;

#[derive(Parser)]
#[command(
    name = "feedtally",
    about = "Summarize a day of feed import logs into per-partner counters"
)]
struct Cli {
    /// Config file; defaults to ~/.config/feedtally/config.toml when present.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Day to summarize. Defaults to yesterday in the configured timezone.
    #[arg(long, value_name = "YYYY-MM-DD", conflicts_with = "last_days")]
    date: Option<NaiveDate>,

    /// Summarize each of the last N days, today first.
    #[arg(long, value_name = "N")]
    last_days: Option<u32>,

    /// Wipe the day's published rows before writing.
    #[arg(long)]
    clear_first: bool,

    /// Print a per-file breakdown and publish nothing.
    #[arg(long)]
    preview: bool,

    /// Verbose logging (RUST_LOG still wins when set).
    #[arg(long)]
    debug: bool,

    /// Append logs to this file instead of stderr.
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

fn init_tracing(debug: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(if debug { "debug" } else { "info" })
    });
    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .with_env_filter(filter)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug, cli.log_file.as_deref())?;

    let cfg = Config::load(cli.config.as_deref()).context("loading configuration")?;
    let pipeline = Pipeline::from_config(&cfg).context("invalid configuration")?;
    let tz = pipeline.settings().timezone;

    let dates = match (cli.date, cli.last_days) {
        (Some(date), _) => vec![date],
        (None, Some(n)) => recent_days(today_in(tz), n.max(1)),
        (None, None) => vec![yesterday_in(tz)],
    };
    let opts = RunOptions {
        clear_first: cli.clear_first || cfg.publish.clear_first,
        preview: cli.preview,
        updated_at: None,
    };
    tracing::info!(days = dates.len(), clear_first = opts.clear_first, preview = opts.preview, "feedtally run started");

    let results = pipeline.run_days(&dates, &opts).await;
    let mut failed = 0;
    for (date, result) in &results {
        match result {
            Ok(report) => {
                println!("{report}");
                if cli.preview {
                    if let Some(summary) = report.summary() {
                        print!("{}", render_preview(summary));
                    }
                }
            }
            Err(e) => {
                failed += 1;
                eprintln!("{date}: failed: {e}");
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} day(s) failed", results.len());
    }
    Ok(())
}
