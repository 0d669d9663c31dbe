use crate::domain::model::{CandidateRow, LookupResult, RowId};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Persistent rows the backfill reads candidates from and writes values to.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// All rows with an area code and no derived value, in store order.
    async fn fetch_candidates(&self) -> Result<Vec<CandidateRow>>;

    /// Overwrites the derived value of exactly one row.
    async fn apply_value(&self, id: &RowId, value: f64) -> Result<()>;

    async fn count_all(&self) -> Result<u64>;

    async fn count_enriched(&self) -> Result<u64>;
}

/// Remote source of the derived statistic. Never fails: no data, bad
/// responses and transport errors all come back as `None`.
#[async_trait]
pub trait StatisticsSource: Send + Sync {
    async fn lookup(&self, area_code: &str) -> LookupResult;
}

/// Checkpoint consulted before every external request.
#[async_trait]
pub trait Pacer: Send {
    /// `index` is the number of rows processed so far in this run.
    async fn before_request(&mut self, index: usize);
}
