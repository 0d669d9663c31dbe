use crate::domain::model::{CandidateRow, RunStatistics};
use crate::domain::ports::{Pacer, RowStore, StatisticsSource, Storage};
use crate::utils::error::Result;
use chrono::Utc;

/// Progress is printed at the same cadence the default pacer pauses at.
const PROGRESS_EVERY: usize = 10;
const MAX_ENRICHED_DETAILS: usize = 5;
const MAX_SKIPPED_DETAILS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Init,
    Fetching,
    Iterating,
    Reporting,
    Done,
    Aborted,
}

/// Drives one backfill run: fetch candidates, look each one up, write
/// values back and tally the outcome.
pub struct BackfillEngine<S: RowStore, L: StatisticsSource, P: Pacer> {
    store: S,
    source: L,
    pacer: P,
    dry_run: bool,
    phase: RunPhase,
}

impl<S: RowStore, L: StatisticsSource, P: Pacer> BackfillEngine<S, L, P> {
    pub fn new(store: S, source: L, pacer: P) -> Self {
        Self {
            store,
            source,
            pacer,
            dry_run: false,
            phase: RunPhase::Init,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn pacer(&self) -> &P {
        &self.pacer
    }

    fn enter(&mut self, phase: RunPhase) {
        tracing::debug!("Backfill phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    /// Runs the backfill to completion.
    ///
    /// Only a failed candidate fetch is returned as an error; per-row
    /// problems are counted in the returned statistics instead.
    pub async fn run(&mut self) -> Result<RunStatistics> {
        let mut stats = RunStatistics {
            dry_run: self.dry_run,
            started_at: Some(Utc::now()),
            ..Default::default()
        };

        println!("Starting demographic backfill...\n");
        if self.dry_run {
            println!("Dry run: values will be looked up but not written\n");
        }

        self.enter(RunPhase::Fetching);
        let rows = match self.store.fetch_candidates().await {
            Ok(rows) => rows,
            Err(e) => {
                self.enter(RunPhase::Aborted);
                tracing::error!("Error fetching rows: {}", e);
                return Err(e);
            }
        };
        stats.total_candidates = rows.len();
        println!("Found {} rows to backfill\n", rows.len());

        self.enter(RunPhase::Iterating);
        for (index, row) in rows.iter().enumerate() {
            if index > 0 && index % PROGRESS_EVERY == 0 {
                println!("Processed {}/{} rows...", index, rows.len());
            }
            self.pacer.before_request(index).await;
            self.process_row(row, &mut stats).await;
        }

        self.enter(RunPhase::Reporting);
        print_tallies(&stats);
        self.snapshot_store(&mut stats).await;
        stats.finished_at = Some(Utc::now());

        self.enter(RunPhase::Done);
        Ok(stats)
    }

    async fn process_row(&self, row: &CandidateRow, stats: &mut RunStatistics) {
        let area_code = row.area_code.as_deref().unwrap_or_default();

        let Some(value) = self.source.lookup(area_code).await else {
            stats.skipped_count += 1;
            if stats.skipped_count <= MAX_SKIPPED_DETAILS {
                println!("  Skipped {} ({}): no data from NOMIS", row.id, area_code);
            }
            return;
        };

        if self.dry_run {
            stats.enriched_count += 1;
            if stats.enriched_count <= MAX_ENRICHED_DETAILS {
                println!(
                    "  Would update {} ({}): {}% owner-occupied",
                    row.id, area_code, value
                );
            }
            return;
        }

        match self.store.apply_value(&row.id, value).await {
            Ok(()) => {
                stats.enriched_count += 1;
                if stats.enriched_count <= MAX_ENRICHED_DETAILS {
                    println!(
                        "  Updated {} ({}): {}% owner-occupied",
                        row.id, area_code, value
                    );
                }
            }
            Err(e) => {
                stats.failed_count += 1;
                tracing::error!("Failed to update {}: {}", row.id, e);
            }
        }
    }

    /// Store-wide counts for the closing report. Failures only blank the
    /// affected figure.
    async fn snapshot_store(&self, stats: &mut RunStatistics) {
        stats.store_total_rows = match self.store.count_all().await {
            Ok(count) => Some(count),
            Err(e) => {
                tracing::warn!("Could not count rows: {}", e);
                None
            }
        };
        stats.store_enriched_rows = match self.store.count_enriched().await {
            Ok(count) => Some(count),
            Err(e) => {
                tracing::warn!("Could not count enriched rows: {}", e);
                None
            }
        };

        println!("\nTotal rows: {}", display_count(stats.store_total_rows));
        println!(
            "Rows with a value: {}",
            display_count(stats.store_enriched_rows)
        );
    }
}

fn print_tallies(stats: &RunStatistics) {
    println!("\n=== Backfill Complete ===");
    println!("Candidates: {}", stats.total_candidates);
    if stats.dry_run {
        println!("Would enrich: {}", stats.enriched_count);
    } else {
        println!("Enriched: {}", stats.enriched_count);
    }
    println!("Skipped (no data): {}", stats.skipped_count);
    println!("Failed: {}", stats.failed_count);
}

fn display_count(count: Option<u64>) -> String {
    count.map_or_else(|| "unavailable".to_string(), |c| c.to_string())
}

/// Writes the run statistics as pretty JSON.
pub async fn save_report<T: Storage>(
    storage: &T,
    path: &str,
    stats: &RunStatistics,
) -> Result<()> {
    let json = serde_json::to_string_pretty(stats)?;
    storage.write_file(path, json.as_bytes()).await?;
    tracing::info!("Report written to {}", path);
    Ok(())
}
