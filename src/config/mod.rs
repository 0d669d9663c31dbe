pub mod cli;

use crate::utils::error::Result;
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_range, validate_required_field,
    validate_url, Validate,
};
use clap::Parser;
use std::time::Duration;

pub const DEFAULT_NOMIS_BASE_URL: &str = "https://www.nomisweb.co.uk/api/v01";
/// TS054 Tenure (Census 2021).
pub const NOMIS_TENURE_DATASET: &str = "NM_2072_1";
/// `c2021_tenure_9` category for owner-occupied households.
pub const NOMIS_OWNED_TENURE: &str = "1001";
/// Measure 20301 is the percentage of all households.
pub const NOMIS_PERCENT_MEASURE: &str = "20301";

#[derive(Debug, Clone, Parser)]
#[command(name = "nomis-backfill")]
#[command(about = "Backfill missing owner-occupied percentages from NOMIS")]
pub struct CliConfig {
    #[arg(long, env = "SUPABASE_URL", hide_env_values = true)]
    pub supabase_url: Option<String>,

    #[arg(long, env = "SUPABASE_KEY", hide_env_values = true)]
    pub supabase_key: Option<String>,

    #[arg(long, default_value = "demographic_feedback")]
    pub table: String,

    #[arg(long, default_value = "id")]
    pub id_column: String,

    #[arg(long, default_value = "oa21_code")]
    pub area_column: String,

    #[arg(long, default_value = "owner_occupied_pct")]
    pub value_column: String,

    #[arg(long, default_value = DEFAULT_NOMIS_BASE_URL)]
    pub nomis_base_url: String,

    /// Pause after this many rows
    #[arg(long, default_value = "10")]
    pub pace_every: usize,

    #[arg(long, default_value = "500")]
    pub pace_delay_ms: u64,

    #[arg(long, default_value = "30")]
    pub request_timeout_secs: u64,

    /// Look values up but never write them back
    #[arg(long)]
    pub dry_run: bool,

    /// Also write the final statistics as JSON to this file
    #[arg(long)]
    pub report_path: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

/// Connection and schema details of the row store.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub base_url: String,
    pub api_key: String,
    pub table: String,
    pub id_column: String,
    pub area_column: String,
    pub value_column: String,
    pub timeout: Duration,
}

impl StoreSettings {
    /// Settings for the default `demographic_feedback` schema.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            table: "demographic_feedback".to_string(),
            id_column: "id".to_string(),
            area_column: "oa21_code".to_string(),
            value_column: "owner_occupied_pct".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NomisSettings {
    pub base_url: String,
    pub dataset: String,
    pub tenure: String,
    pub measure: String,
    pub timeout: Duration,
}

impl Default for NomisSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_NOMIS_BASE_URL.to_string(),
            dataset: NOMIS_TENURE_DATASET.to_string(),
            tenure: NOMIS_OWNED_TENURE.to_string(),
            measure: NOMIS_PERCENT_MEASURE.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl CliConfig {
    /// Resolves the store settings, failing on missing credentials.
    pub fn store_settings(&self) -> Result<StoreSettings> {
        let base_url = validate_required_field("SUPABASE_URL", &self.supabase_url)?;
        let api_key = validate_required_field("SUPABASE_KEY", &self.supabase_key)?;
        validate_url("SUPABASE_URL", base_url)?;

        Ok(StoreSettings {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            table: self.table.clone(),
            id_column: self.id_column.clone(),
            area_column: self.area_column.clone(),
            value_column: self.value_column.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs),
        })
    }

    pub fn nomis_settings(&self) -> NomisSettings {
        NomisSettings {
            base_url: self.nomis_base_url.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs),
            ..NomisSettings::default()
        }
    }

    pub fn pace_delay(&self) -> Duration {
        Duration::from_millis(self.pace_delay_ms)
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        self.store_settings()?;

        validate_url("nomis_base_url", &self.nomis_base_url)?;
        validate_non_empty_string("table", &self.table)?;
        validate_non_empty_string("id_column", &self.id_column)?;
        validate_non_empty_string("area_column", &self.area_column)?;
        validate_non_empty_string("value_column", &self.value_column)?;
        validate_range("pace_every", self.pace_every, 1, usize::MAX)?;
        validate_range("request_timeout_secs", self.request_timeout_secs, 1, 300)?;

        if let Some(path) = &self.report_path {
            validate_path("report_path", path)?;
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }
}
