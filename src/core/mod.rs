pub mod etl;
pub mod pacer;

pub use crate::domain::model::{CandidateRow, LookupResult, RowId, RunStatistics};
pub use crate::domain::ports::{Pacer, RowStore, StatisticsSource, Storage};
pub use crate::utils::error::Result;
