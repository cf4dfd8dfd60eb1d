//! sg-classify - Street name gender classification
//!
//! Reads street names (one per line, blank line = missing name), classifies
//! each distinct name as masculine, feminine or neutral, and prints the names
//! grouped by label, a single group, or the full JSON report.

use anyhow::{Context, Result};
use clap::Parser;
use sg_common::config::ConfigResolver;
use sg_common::Gender;
use sg_classify::{build_classifier, build_registry, BatchClassifier, BatchReport};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "sg-classify", version, about = "Classify street names by the gender of the person they name")]
struct Args {
    /// Configuration file (default: $SG_CONFIG, then the platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// File of street names, one per line (default: stdin)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Print only the names of one gender: M, F or N
    #[arg(short, long)]
    gender: Option<String>,

    /// Print the full report as JSON
    #[arg(long, conflicts_with = "gender")]
    json: bool,

    /// Use direct registry lookup only
    #[arg(long)]
    no_fallback: bool,

    /// Override the configured number of concurrent workers
    #[arg(long)]
    concurrency: Option<usize>,

    /// Override the configured classification cache file
    #[arg(long)]
    cache: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout carries only results. The filter starts at
    // RUST_LOG (else info) so configuration loading is logged, then follows
    // the configured level unless RUST_LOG is set.
    let (filter, filter_handle) = reload::Layer::new(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        "Starting sg-classify v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let gender_filter = args
        .gender
        .as_deref()
        .map(str::parse::<Gender>)
        .transpose()?;

    let resolver = ConfigResolver::new(args.config.clone());
    let mut config = resolver.resolve()?;
    if args.no_fallback {
        config.fallback.enabled = false;
    }
    if let Some(concurrency) = args.concurrency {
        config.batch.concurrency = concurrency;
    }
    if let Some(cache) = args.cache.clone() {
        config.batch.cache_path = Some(cache);
    }
    config.validate()?;

    if std::env::var_os("RUST_LOG").is_none() {
        filter_handle
            .reload(EnvFilter::new(&config.logging.level))
            .context("Failed to apply configured log level")?;
    }

    // Registry failures are fatal: nothing can be classified without it
    let registry = Arc::new(build_registry(&config).context("Failed to build name-gender registry")?);
    let classifier = Arc::new(build_classifier(&config, registry, None)?);
    let batch = BatchClassifier::new(classifier, &config.batch);

    let names = read_names(args.input.as_ref())?;
    info!("Read {} street names", names.len());

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling batch");
            ctrl_c_token.cancel();
        }
    });

    let report = batch.run(names, &cancel).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if let Some(gender) = gender_filter {
        for name in report.names_for(gender) {
            println!("{}", name);
        }
    } else {
        print_summary(&report);
    }

    if report.cancelled {
        anyhow::bail!(
            "Batch cancelled after {} of {} names",
            report.classifications.len(),
            report.stats.distinct_names
        );
    }

    Ok(())
}

/// One name per line; a blank line is a missing name
fn read_names(input: Option<&PathBuf>) -> Result<Vec<Option<String>>> {
    let content = match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read stdin")?;
            buffer
        }
    };

    Ok(content
        .lines()
        .map(|line| {
            let line = line.trim();
            (!line.is_empty()).then(|| line.to_string())
        })
        .collect())
}

fn print_summary(report: &BatchReport) {
    let shares = report.shares();
    for gender in Gender::ALL {
        let names = report.names_for(gender);
        let share = match gender {
            Gender::Masculine => shares.masculine,
            Gender::Feminine => shares.feminine,
            Gender::Neutral => shares.neutral,
        };
        println!("# {} ({} names, {}%)", gender, names.len(), share);
        for name in names {
            println!("{}", name);
        }
        println!();
    }
}
