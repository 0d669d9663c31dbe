use crate::adapters::{NomisClient, PostgrestStore};
use crate::config::{cli::LocalStorage, CliConfig};
use crate::core::etl::{save_report, BackfillEngine};
use crate::core::pacer::FixedIntervalPacer;
use crate::domain::model::RunStatistics;
use crate::utils::error::Result;

/// Builds the adapters from `config` and runs one backfill.
pub async fn run_backfill(config: &CliConfig) -> Result<RunStatistics> {
    let store = PostgrestStore::new(config.store_settings()?)?;
    let source = NomisClient::new(config.nomis_settings())?;
    let pacer = FixedIntervalPacer::new(config.pace_every, config.pace_delay());

    let mut engine = BackfillEngine::new(store, source, pacer).with_dry_run(config.dry_run);
    let stats = engine.run().await?;
    tracing::debug!("Pacer inserted {} pauses", engine.pacer().pauses());

    // The run already completed; a lost report file must not change the exit code.
    if let Some(path) = &config.report_path {
        if let Err(e) = save_report(&LocalStorage::new("."), path, &stats).await {
            tracing::warn!("Could not write report to {}: {}", path, e);
        }
    }

    Ok(stats)
}
