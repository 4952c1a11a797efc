//! Indexer binary: reconciles blob store objects with their index records.

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use indexer_client::IndexClient;
use indexer_engine::{Outcome, Reconciler, SkipReason};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Indexer - populate index records with object size, hashes and URL
#[derive(Parser, Debug)]
#[command(name = "indexer")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "INDEXER_CONFIG",
        default_value = "config/indexer.toml"
    )]
    config: String,

    /// Stop at the first object that fails
    #[arg(long, default_value_t = false)]
    fail_fast: bool,

    /// Object URLs, e.g. s3://bucket/dg.4503/abc/reads.bam
    #[arg(required = true)]
    urls: Vec<String>,
}

#[derive(Debug, Default)]
struct Summary {
    updated: usize,
    skipped: usize,
    failed: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries one result line per object
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Indexer v{}", env!("CARGO_PKG_VERSION"));

    let legacy_json = std::env::var("CONFIG_FILE").ok();
    let config = config::load(Path::new(&args.config), legacy_json.as_deref())?;
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("invalid configuration")?;

    let storage = indexer_storage::from_config(&config.storage)
        .await
        .context("failed to initialize storage")?;
    storage
        .health_check()
        .await
        .context("storage health check failed")?;
    tracing::info!(backend = storage.backend_name(), "Storage initialized");

    let index = IndexClient::new(&config.index).context("failed to initialize index client")?;
    let reconciler = Reconciler::new(config.index, Arc::new(index), storage);

    let summary = reconcile_all(&reconciler, &args.urls, args.fail_fast).await;
    tracing::info!(
        updated = summary.updated,
        skipped = summary.skipped,
        failed = summary.failed,
        "Finished"
    );

    if summary.failed > 0 {
        anyhow::bail!(
            "{} of {} objects failed to reconcile",
            summary.failed,
            args.urls.len()
        );
    }
    Ok(())
}

/// Reconcile each URL in turn, each with its own independent flow.
async fn reconcile_all(reconciler: &Reconciler, urls: &[String], fail_fast: bool) -> Summary {
    let mut summary = Summary::default();

    for url in urls {
        match reconciler.reconcile(url).await {
            Ok(Outcome::Updated { did, digests }) => {
                summary.updated += 1;
                println!("updated {did} {url} size={}", digests.size);
            }
            Ok(Outcome::Skipped { reason }) => {
                summary.skipped += 1;
                let (did, why) = match &reason {
                    SkipReason::AlreadyIndexed { did } => (did, "already indexed"),
                    SkipReason::ExistingRecord { did } => (did, "existing record"),
                };
                println!("skipped {did} {url} ({why})");
            }
            Err(err) => {
                summary.failed += 1;
                tracing::error!(
                    %url,
                    error = %err,
                    configuration = err.is_configuration(),
                    "Reconciliation failed"
                );
                println!("failed {url}");
                if fail_fast {
                    break;
                }
            }
        }
    }

    summary
}
