mod areas;
mod cli;
mod models;
mod orchestrator;
mod scrapers;
mod storage;

use anyhow::{bail, Result};
use areas::AreaTable;
use clap::Parser;
use cli::{Cli, Command};
use orchestrator::{Orchestrator, RunSummary};
use scrapers::types::TransportMode;
use scrapers::{ChromeLauncher, OnTheHouseApi};
use std::process::ExitCode;
use std::sync::Arc;
use storage::AreaStore;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    tokio::select! {
        result = run(cli) => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("{:#}", e);
                ExitCode::from(1)
            }
        },
        _ = tokio::signal::ctrl_c() => {
            warn!("Scraping interrupted by user");
            ExitCode::from(130)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let table = match &cli.areas_file {
        Some(path) => AreaTable::from_json_file(path)?,
        None => AreaTable::brisbane(),
    };

    match &cli.command {
        Command::List => {
            print_areas(&table, &AreaStore::new(&cli.output_dir));
            Ok(())
        }
        Command::Combine { csv } => {
            let store = AreaStore::new(&cli.output_dir);
            info!("Combining area files from {}", store.dir().display());
            let count = store.combine(&cli.combined_file)?;
            println!("Combined {} properties into {}", count, cli.combined_file.display());
            if let Some(csv) = csv {
                let rows = storage::export_csv(&cli.combined_file, csv)?;
                println!("Exported {} properties to {}", rows, csv.display());
            }
            Ok(())
        }
        Command::Area { name, postcode } => {
            let area = table.resolve(name, postcode.as_deref())?;
            let orchestrator = build_orchestrator(&cli, table)?;

            info!("🏠 Scraping {}, QLD {}", area.display_name(), area.postcode);
            info!("Max pages: {}, fetch details: {}", cli.max_pages, !cli.no_details);
            info!("Output: {}", orchestrator.store().path_for(&area.key).display());

            let report = orchestrator.scrape_area(&area).await?;
            let mut summary = RunSummary::default();
            summary.record(&report);
            print_summary(&summary);
            Ok(())
        }
        Command::All => {
            if table.is_empty() {
                bail!("No areas to scrape");
            }
            let orchestrator = build_orchestrator(&cli, table)?;

            info!("🏠 Scraping all {} areas", orchestrator.areas().len());
            info!("Max pages per area: {}, fetch details: {}", cli.max_pages, !cli.no_details);
            info!("Output directory: {}", cli.output_dir.display());

            let summary = orchestrator.scrape_all().await;
            print_summary(&summary);
            Ok(())
        }
    }
}

fn build_orchestrator(cli: &Cli, table: AreaTable) -> Result<Orchestrator> {
    let settings = cli.settings();
    let sessions = Arc::new(ChromeLauncher::new(settings.headless));
    let store = AreaStore::new(&cli.output_dir);
    let api_mode = settings.mode == TransportMode::Api;
    let http_timeout = settings.http_timeout;

    let mut orchestrator = Orchestrator::new(table, settings, store, sessions);
    if api_mode {
        orchestrator = orchestrator.with_direct(Arc::new(OnTheHouseApi::new(http_timeout)?));
    }
    Ok(orchestrator)
}

fn print_areas(table: &AreaTable, store: &AreaStore) {
    println!("\nAvailable areas ({}):\n", table.len());
    println!("{:<30} {:<10} {:>8}", "Area", "Postcode", "Saved");
    println!("{}", "-".repeat(50));
    for area in table.iter() {
        let saved = match store.load(&area.key) {
            Ok(records) if records.is_empty() => "-".to_string(),
            Ok(records) => records.len().to_string(),
            Err(e) => {
                warn!("{:#}", e);
                "invalid".to_string()
            }
        };
        println!("{:<30} {:<10} {:>8}", area.display_name(), area.postcode, saved);
    }
    println!();
}

fn print_summary(summary: &RunSummary) {
    println!("\n{}", "=".repeat(60));
    println!(
        "Areas: {} attempted, {} succeeded, {} failed",
        summary.attempted,
        summary.succeeded,
        summary.failed.len()
    );
    println!("Total properties: {}", summary.total_properties);
    println!("{}", "=".repeat(60));

    for (area, count) in &summary.per_area {
        println!("  {}: {}", area, count);
    }
    if !summary.failed.is_empty() {
        println!("\nFailed: {}", summary.failed.join(", "));
    }

    match summary.price_stats() {
        Some(stats) => {
            println!("\nWith disclosed prices: {}", stats.count);
            println!("  Min: ${}", thousands(stats.min));
            println!("  Max: ${}", thousands(stats.max));
            println!("  Avg: ${}", thousands(stats.avg));
        }
        None => println!("\nWith disclosed prices: 0"),
    }

    match summary.land_stats() {
        Some(stats) => {
            println!("\nWith land size data: {}", stats.count);
            println!("  Min: {} sqm", thousands(stats.min));
            println!("  Max: {} sqm", thousands(stats.max));
            println!("  Avg: {} sqm", thousands(stats.avg));
        }
        None => println!("\nWith land size data: 0"),
    }
    println!();
}

/// 1333333 -> "1,333,333"
fn thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        grouped.push('-');
    }
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}
