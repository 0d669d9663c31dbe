pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::{NomisClient, PostgrestStore};
pub use app::run_backfill;
pub use config::{cli::LocalStorage, CliConfig, NomisSettings, StoreSettings};
pub use core::{
    etl::{save_report, BackfillEngine, RunPhase},
    pacer::FixedIntervalPacer,
};
pub use domain::model::{CandidateRow, RowId, RunStatistics};
pub use utils::error::{BackfillError, Result};
