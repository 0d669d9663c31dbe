use clap::Parser;
use nomis_backfill::utils::{logger, validation::Validate};
use nomis_backfill::{run_backfill, CliConfig};

#[tokio::main]
async fn main() {
    let config = CliConfig::parse();

    logger::init_cli_logger(config.verbose);
    tracing::info!("Starting nomis-backfill");

    if let Err(e) = config.validate() {
        tracing::error!("Configuration validation failed: {}", e);
        eprintln!("Error: {}", e.user_friendly_message());
        eprintln!("Suggestion: {}", e.recovery_suggestion());
        std::process::exit(e.exit_code());
    }

    match run_backfill(&config).await {
        Ok(stats) => {
            tracing::info!(
                "Backfill finished: {} enriched, {} skipped, {} failed",
                stats.enriched_count,
                stats.skipped_count,
                stats.failed_count
            );
        }
        Err(e) => {
            tracing::error!(
                "Backfill failed: {} (Severity: {:?})",
                e,
                e.severity()
            );
            eprintln!("Error: {}", e.user_friendly_message());
            eprintln!("Suggestion: {}", e.recovery_suggestion());
            std::process::exit(e.exit_code());
        }
    }
}
