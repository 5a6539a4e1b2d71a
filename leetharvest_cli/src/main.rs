mod cli;

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use leetharvest_core::{
    Authenticator, CheckpointStore, Credentials, HarvestConfig, HarvestOrchestrator, HarvestReport,
};

use crate::cli::{Cli, Commands, CredentialArgs};

#[tokio::main]
#[tracing::instrument(level = "info")]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Harvest {
            credentials,
            data_dir,
            max_in_flight,
            page_size,
            resume,
            retries,
        } => {
            let config = HarvestConfig {
                max_in_flight,
                page_size,
                resume,
                ..HarvestConfig::default()
            };
            let (_, orchestrator, username) = connect(credentials, &data_dir, config).await?;
            println!("signed in as {username}");

            let mut report = orchestrator.harvest_all().await?;
            print_report("harvest", &report);

            let mut attempt = 0;
            while !report.failed.is_empty() && attempt < retries {
                attempt += 1;
                println!(
                    "retry pass {attempt}/{retries}: {} problem(s)",
                    report.failed.len()
                );
                report = orchestrator.retry_failed(report.failed).await?;
                print_report("retry", &report);
            }

            if !report.failed.is_empty() {
                println!(
                    "{} problem(s) still failing; run `leetharvest retry` to redo them",
                    report.failed.len()
                );
            }
        }

        Commands::Retry {
            credentials,
            data_dir,
        } => {
            let (store, orchestrator, username) =
                connect(credentials, &data_dir, HarvestConfig::default()).await?;
            println!("signed in as {username}");

            match store.read_dead_letters().await? {
                None => println!("no dead letters recorded; nothing to retry"),
                Some(entries) => {
                    println!("retrying {} problem(s)", entries.len());
                    let report = orchestrator.retry_failed(entries).await?;
                    print_report("retry", &report);
                    if !report.failed.is_empty() {
                        println!("{} problem(s) failed again", report.failed.len());
                    }
                }
            }
        }

        Commands::Status { data_dir, username } => {
            if !data_dir.join(&username).is_dir() {
                println!(
                    "no harvest directory for {username} under {}",
                    data_dir.display()
                );
                return Ok(());
            }
            let store = CheckpointStore::open(&data_dir, &username).await?;
            let outputs = store.output_slugs().await?;

            match store.read_manifest().await? {
                Some(manifest) => {
                    let missing = manifest
                        .problems
                        .iter()
                        .filter(|slug| !outputs.contains(slug))
                        .count();
                    println!("manifest:     {} problem(s) planned", manifest.count);
                    println!(
                        "outputs:      {} file(s) on disk ({missing} missing)",
                        outputs.len()
                    );
                }
                None => {
                    println!("manifest:     none");
                    println!("outputs:      {} file(s) on disk", outputs.len());
                }
            }

            match store.read_dead_letters().await? {
                Some(dead) => println!("dead letters: {}", dead.len()),
                None => println!("dead letters: none"),
            }
        }
    }

    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt = tracing_subscriber::fmt::layer().with_target(true);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt)
        .try_init()
        .map_err(|e| anyhow::anyhow!("tracing already initialized: {e}"))?;
    Ok(())
}

/// Validates the credentials, opens the user's checkpoint directory, and
/// wires the orchestrator onto the session-configured transport.
async fn connect(
    credentials: CredentialArgs,
    data_dir: &Path,
    config: HarvestConfig,
) -> anyhow::Result<(CheckpointStore, HarvestOrchestrator, String)> {
    let credentials = Credentials::new(
        credentials.session,
        credentials.csrf_token,
        credentials.cf_clearance,
    )?;
    let auth = Authenticator::new(credentials);
    let username = auth.validate().await?;

    let store = CheckpointStore::open(data_dir, &username).await?;
    let transport = Arc::new(auth.transport()?);
    let orchestrator = HarvestOrchestrator::new(transport, store.clone(), config)?;
    Ok((store, orchestrator, username))
}

fn print_report(pass: &str, report: &HarvestReport) {
    println!(
        "{pass} settled: {} submission(s) across {} problem(s); {} completed, {} skipped, {} degraded record(s), {} failed",
        report.discovered,
        report.unique_problems,
        report.completed,
        report.skipped,
        report.degraded,
        report.failed.len()
    );
}
