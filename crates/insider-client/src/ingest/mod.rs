//! Batch ingestion of insider-transaction filing drops.
//!
//! One partition is a directory holding `NONDERIV_TRANS.tsv` and
//! `SUBMISSION.tsv`. Transaction legs are projected, validated and collapsed
//! to one row per accession number; submissions are projected and their
//! tickers normalized; the two sides are inner-joined and appended to the
//! store chunk by chunk.

pub mod dedupe;
pub mod join;
pub mod load;
pub mod partition;
pub mod project;
pub mod ticker;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use chrono::NaiveDate;
use rusqlite::Connection;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::Serialize;
use ulid::Ulid;

use crate::ClientResult;
use crate::config::IngestConfig;
use crate::ingest::dedupe::{DedupeStats, Deduplicator};
use crate::ingest::join::{JoinStats, TransactionIndex};
use crate::ingest::load::{LoadOptions, LoadReport, load_in_batches};
use crate::ingest::partition::{Partition, discover_partitions};
use crate::ingest::project::{
    RecordProjector, SUBMISSION_COLUMNS, TRANSACTION_COLUMNS, submission_from_row,
    transaction_from_row,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AcquiredDisposed {
    #[serde(rename = "A")]
    Acquired,
    #[serde(rename = "D")]
    Disposed,
}

impl AcquiredDisposed {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Acquired => "A",
            Self::Disposed => "D",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "A" | "a" => Some(Self::Acquired),
            "D" | "d" => Some(Self::Disposed),
            _ => None,
        }
    }
}

impl fmt::Display for AcquiredDisposed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for AcquiredDisposed {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for AcquiredDisposed {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        Self::parse(text)
            .ok_or_else(|| FromSqlError::Other(format!("unknown code `{text}`").into()))
    }
}

/// One transaction leg as read from the transaction file.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    /// 1-based data row in the source file; the lowest row of a group is its "first" leg.
    pub row: u64,
    pub accession_number: String,
    pub shares: f64,
    pub price_per_share: f64,
    pub code: AcquiredDisposed,
    pub shares_owned_following: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionRecord {
    pub row: u64,
    pub accession_number: String,
    pub filing_date: NaiveDate,
    pub ticker: String,
}

/// One row per accession number after collapsing its legs.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedTransaction {
    pub accession_number: String,
    pub shares: f64,
    pub price_per_share: f64,
    pub code: AcquiredDisposed,
    pub shares_owned_following: f64,
    pub legs: usize,
    pub first_row: u64,
}

impl From<&AggregatedTransaction> for TransactionRecord {
    fn from(value: &AggregatedTransaction) -> Self {
        Self {
            row: value.first_row,
            accession_number: value.accession_number.clone(),
            shares: value.shares,
            price_per_share: value.price_per_share,
            code: value.code,
            shares_owned_following: value.shares_owned_following,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredTransaction {
    pub accession_number: String,
    pub filing_date: NaiveDate,
    pub ticker: String,
    pub shares: f64,
    pub price_per_share: f64,
    pub code: AcquiredDisposed,
    pub shares_owned_following: f64,
}

/// Why a single source row was dropped. The run always continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RejectionReason {
    WrongShape,
    MalformedRow,
    MissingAccession,
    NonPositivePrice,
    InvalidCode,
    InvalidFilingDate,
    EmptyTicker,
    TickerTooLong,
    StopListedTicker,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WrongShape => "wrong_shape",
            Self::MalformedRow => "malformed_row",
            Self::MissingAccession => "missing_accession",
            Self::NonPositivePrice => "non_positive_price",
            Self::InvalidCode => "invalid_code",
            Self::InvalidFilingDate => "invalid_filing_date",
            Self::EmptyTicker => "empty_ticker",
            Self::TickerTooLong => "ticker_too_long",
            Self::StopListedTicker => "stop_listed_ticker",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    pub row: u64,
    pub reason: RejectionReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome<T> {
    Accepted(T),
    Rejected(Rejection),
}

impl<T> RowOutcome<T> {
    pub fn rejected(row: u64, reason: RejectionReason) -> Self {
        Self::Rejected(Rejection { row, reason })
    }

    pub fn and_then<U>(self, next: impl FnOnce(T) -> RowOutcome<U>) -> RowOutcome<U> {
        match self {
            Self::Accepted(value) => next(value),
            Self::Rejected(rejection) => RowOutcome::Rejected(rejection),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RejectionCounts(BTreeMap<&'static str, u64>);

impl RejectionCounts {
    pub fn record(&mut self, reason: RejectionReason) {
        *self.0.entry(reason.as_str()).or_default() += 1;
    }

    pub fn get(&self, reason: RejectionReason) -> u64 {
        self.0.get(reason.as_str()).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn merge(&mut self, other: &RejectionCounts) {
        for (reason, count) in &other.0 {
            *self.0.entry(*reason).or_default() += count;
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub partition: String,
    pub transaction_rows_read: u64,
    pub submission_rows_read: u64,
    pub transaction_rejections: RejectionCounts,
    pub submission_rejections: RejectionCounts,
    pub dedupe: DedupeStats,
    pub join: JoinStats,
    pub load: LoadReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestRunReport {
    pub run_id: String,
    pub partitions: Vec<IngestReport>,
    pub rows_inserted: usize,
    pub rows_skipped_existing: usize,
    pub rows_rejected: u64,
    /// Transaction and submission rejections across every partition.
    pub rejections: RejectionCounts,
}

/// Rounds to two decimals from the exact binary value, ties to even.
///
/// `2.675` is stored just below the tie and rounds down; `1.125` is an exact
/// tie and rounds to `1.12`.
pub fn round_to_cents(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }

    let bits = value.to_bits();
    let negative = bits >> 63 == 1;
    let biased_exponent = ((bits >> 52) & 0x7ff) as i64;
    let fraction = bits & ((1_u64 << 52) - 1);
    let (mantissa, exponent) = if biased_exponent == 0 {
        (fraction, -1074)
    } else {
        (fraction | (1_u64 << 52), biased_exponent - 1075)
    };
    if exponent >= 0 {
        return value;
    }

    // value * 100 == scaled / 2^shift exactly.
    let scaled = u128::from(mantissa) * 100;
    let shift = exponent.unsigned_abs();
    let cents = if shift >= 128 {
        0
    } else {
        let quotient = scaled >> shift;
        let remainder = scaled & ((1_u128 << shift) - 1);
        let half = 1_u128 << (shift - 1);
        if remainder > half || (remainder == half && quotient & 1 == 1) {
            quotient + 1
        } else {
            quotient
        }
    };

    let rounded = cents as f64 / 100.0;
    if negative { -rounded } else { rounded }
}

/// Runs every partition under `root` in order, stopping at the first fatal error.
pub fn run_directory(
    connection: &mut Connection,
    db_path: &Path,
    root: &Path,
    config: &IngestConfig,
) -> ClientResult<IngestRunReport> {
    let run_id = format!("run_{}", Ulid::new());
    let partitions = discover_partitions(root)?;
    tracing::info!(
        run_id = %run_id,
        root = %root.display(),
        partitions = partitions.len(),
        batch_size = config.batch_size,
        "starting ingest run"
    );

    let mut reports = Vec::with_capacity(partitions.len());
    for partition in &partitions {
        let report = run_partition(connection, db_path, partition, config).map_err(|error| {
            error.with_context("partition", &partition.dir.display().to_string())
        })?;
        reports.push(report);
    }

    let rows_inserted = reports.iter().map(|report| report.load.rows_inserted).sum();
    let rows_skipped_existing = reports
        .iter()
        .map(|report| report.load.rows_skipped_existing)
        .sum();
    let mut rejections = RejectionCounts::default();
    for report in &reports {
        rejections.merge(&report.transaction_rejections);
        rejections.merge(&report.submission_rejections);
    }
    let rows_rejected = rejections.total();
    tracing::info!(run_id = %run_id, rows_inserted, rows_rejected, "ingest run finished");

    Ok(IngestRunReport {
        run_id,
        partitions: reports,
        rows_inserted,
        rows_skipped_existing,
        rows_rejected,
        rejections,
    })
}

pub fn run_partition(
    connection: &mut Connection,
    db_path: &Path,
    partition: &Partition,
    config: &IngestConfig,
) -> ClientResult<IngestReport> {
    let span = tracing::info_span!("partition", name = %partition.name);
    let _entered = span.enter();

    let mut transaction_rows_read = 0_u64;
    let mut transaction_rejections = RejectionCounts::default();
    let mut deduplicator = Deduplicator::default();

    let transactions = RecordProjector::open(&partition.transaction_path(), &TRANSACTION_COLUMNS)?;
    for outcome in transactions {
        let outcome = outcome?;
        transaction_rows_read += 1;
        match outcome.and_then(transaction_from_row) {
            RowOutcome::Accepted(record) => deduplicator.push(record),
            RowOutcome::Rejected(rejection) => transaction_rejections.record(rejection.reason),
        }
    }
    let deduped = deduplicator.finish();
    let mut index = TransactionIndex::new(deduped.rows);

    let mut submission_rows_read = 0_u64;
    let mut submission_rejections = RejectionCounts::default();
    let submissions = RecordProjector::open(&partition.submission_path(), &SUBMISSION_COLUMNS)?;
    let joined = submissions.filter_map(|outcome| {
        let outcome = match outcome {
            Ok(value) => value,
            Err(error) => return Some(Err(error)),
        };
        submission_rows_read += 1;
        match outcome
            .and_then(submission_from_row)
            .and_then(ticker::normalize_submission)
        {
            RowOutcome::Accepted(submission) => index.join_submission(&submission).map(Ok),
            RowOutcome::Rejected(rejection) => {
                submission_rejections.record(rejection.reason);
                None
            }
        }
    });

    let load = load_in_batches(
        connection,
        db_path,
        joined,
        LoadOptions {
            batch_size: config.batch_size,
            skip_existing: config.skip_existing,
        },
    )?;
    let join = index.finish();

    tracing::info!(
        transaction_rows_read,
        submission_rows_read,
        rows_inserted = load.rows_inserted,
        chunks = load.chunks_committed,
        unmatched_submissions = join.unmatched_submissions,
        unmatched_transactions = join.unmatched_transactions,
        "partition loaded"
    );

    Ok(IngestReport {
        partition: partition.name.clone(),
        transaction_rows_read,
        submission_rows_read,
        transaction_rejections,
        submission_rejections,
        dedupe: deduped.stats,
        join,
        load,
    })
}
