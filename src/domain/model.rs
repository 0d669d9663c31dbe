use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Primary key of a stored row, kept opaque.
///
/// Stores hand out either text (uuid) or integer keys; both are carried as
/// their textual form and only ever echoed back in an equality filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowId(pub String);

impl RowId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RowId {
    fn from(value: &str) -> Self {
        RowId(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRow {
    pub id: RowId,
    pub area_code: Option<String>,
    pub derived_value: Option<f64>,
}

impl CandidateRow {
    pub fn new(id: impl Into<RowId>, area_code: Option<&str>) -> Self {
        Self {
            id: id.into(),
            area_code: area_code.map(str::to_string),
            derived_value: None,
        }
    }

    /// A row is eligible when it has an area code and no value yet.
    pub fn is_candidate(&self) -> bool {
        self.derived_value.is_none()
            && self.area_code.as_deref().is_some_and(|code| !code.is_empty())
    }
}

/// Outcome of a single statistics lookup. `None` is the absence marker.
pub type LookupResult = Option<f64>;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStatistics {
    pub total_candidates: usize,
    pub enriched_count: usize,
    pub skipped_count: usize,
    pub failed_count: usize,
    pub store_total_rows: Option<u64>,
    pub store_enriched_rows: Option<u64>,
    pub dry_run: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunStatistics {
    pub fn processed(&self) -> usize {
        self.enriched_count + self.skipped_count + self.failed_count
    }

    /// Every fetched candidate was classified exactly once.
    pub fn is_complete(&self) -> bool {
        self.processed() == self.total_candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_requires_area_code_and_missing_value() {
        assert!(CandidateRow::new("1", Some("E00000002")).is_candidate());
        assert!(!CandidateRow::new("2", None).is_candidate());
        assert!(!CandidateRow::new("3", Some("")).is_candidate());

        let mut enriched = CandidateRow::new("4", Some("E00000002"));
        enriched.derived_value = Some(62.5);
        assert!(!enriched.is_candidate());
    }

    #[test]
    fn test_statistics_completeness() {
        let stats = RunStatistics {
            total_candidates: 5,
            enriched_count: 2,
            skipped_count: 2,
            failed_count: 1,
            ..Default::default()
        };
        assert!(stats.is_complete());

        let partial = RunStatistics {
            total_candidates: 5,
            enriched_count: 2,
            ..Default::default()
        };
        assert!(!partial.is_complete());
    }
}
