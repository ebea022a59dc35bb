//! Daily price history and the split-adjusted read path built on it.

pub mod adjust;
pub mod chart;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

pub use adjust::{AdjustedTransactions, AdjustmentStatus, apply_split_adjustment, read_adjusted};
pub use chart::ChartApiSource;

/// One trading day. `split_ratio` is set only on days with a split event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: f64,
    pub volume: Option<u64>,
    pub split_ratio: Option<f64>,
}

impl PricePoint {
    pub fn is_split_day(&self) -> bool {
        self.split_ratio.is_some()
    }
}

#[derive(Debug, Error)]
pub enum PriceSourceError {
    #[error("price request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("price service returned HTTP {status} for `{ticker}`")]
    Status { status: u16, ticker: String },

    #[error("price service returned unexpected data: {0}")]
    Data(String),

    #[error("price service has no daily history for `{0}`")]
    Empty(String),

    #[error("start date {start} is after end date {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
}

/// Daily OHLC history with split events, inclusive of both dates.
pub trait PriceHistorySource {
    fn fetch_daily(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, PriceSourceError>;
}
