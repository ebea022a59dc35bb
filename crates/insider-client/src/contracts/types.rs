use chrono::NaiveDate;
use serde::Serialize;

use crate::ingest::{IngestReport, RejectionCounts, StoredTransaction};
use crate::prices::{AdjustmentStatus, PricePoint};
use crate::store::StoreSummary;

#[derive(Debug, Clone, Serialize)]
pub struct IngestData {
    pub run_id: String,
    pub data_dir: String,
    pub db_path: String,
    pub batch_size: usize,
    pub skip_existing: bool,
    pub partitions: Vec<IngestReport>,
    pub rows_inserted: usize,
    pub rows_skipped_existing: usize,
    pub rows_rejected: u64,
    pub rejections: RejectionCounts,
    pub store: StoreSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionsData {
    pub ticker: String,
    pub adjusted: bool,
    /// Absent for raw reads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjustment: Option<AdjustmentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_start: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_end: Option<NaiveDate>,
    pub row_count: usize,
    pub rows: Vec<StoredTransaction>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceHistoryData {
    pub ticker: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub split_days: usize,
    pub points: Vec<PricePoint>,
}
