use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::ingest::{
    AcquiredDisposed, RejectionReason, RowOutcome, SubmissionRecord, TransactionRecord,
};
use crate::{ClientError, ClientResult};

pub const FILING_DATE_FORMAT: &str = "%d-%b-%Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Date,
    Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub column_type: ColumnType,
}

const fn column(name: &'static str, column_type: ColumnType) -> ColumnSpec {
    ColumnSpec { name, column_type }
}

pub const TRANSACTION_COLUMNS: [ColumnSpec; 5] = [
    column("ACCESSION_NUMBER", ColumnType::Text),
    column("TRANS_SHARES", ColumnType::Decimal),
    column("TRANS_PRICEPERSHARE", ColumnType::Decimal),
    column("TRANS_ACQUIRED_DISP_CD", ColumnType::Text),
    column("SHRS_OWND_FOLWNG_TRANS", ColumnType::Decimal),
];

pub const SUBMISSION_COLUMNS: [ColumnSpec; 3] = [
    column("ACCESSION_NUMBER", ColumnType::Text),
    column("FILING_DATE", ColumnType::Date),
    column("ISSUERTRADINGSYMBOL", ColumnType::Text),
];

/// A typed cell. Blank or unparseable date/decimal cells become `Null`.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Date(NaiveDate),
    Decimal(f64),
    Null,
}

impl Cell {
    fn parse(raw: &str, column_type: ColumnType) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::Null;
        }

        match column_type {
            ColumnType::Text => Self::Text(trimmed.to_string()),
            ColumnType::Date => NaiveDate::parse_from_str(trimmed, FILING_DATE_FORMAT)
                .map(Self::Date)
                .unwrap_or(Self::Null),
            ColumnType::Decimal => trimmed
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .map(Self::Decimal)
                .unwrap_or(Self::Null),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<f64> {
        match self {
            Self::Decimal(value) => Some(*value),
            _ => None,
        }
    }
}

/// Cells in the order the caller asked for them, not the file's order.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedRow {
    pub row: u64,
    pub cells: Vec<Cell>,
}

static NULL_CELL: Cell = Cell::Null;

impl ProjectedRow {
    fn cell(&self, index: usize) -> &Cell {
        self.cells.get(index).unwrap_or(&NULL_CELL)
    }
}

/// Streams a tab-separated file, projecting each record onto a fixed column list.
///
/// Only one record is held in memory at a time. Header problems fail fast with
/// `schema_mismatch`; per-row problems surface as `RowOutcome::Rejected`; an I/O
/// failure mid-file is yielded as `Err` and ends the stream.
pub struct RecordProjector<R: Read> {
    path: PathBuf,
    records: csv::StringRecordsIntoIter<R>,
    columns: Vec<(usize, ColumnType)>,
    header_len: usize,
    next_row: u64,
    failed: bool,
}

impl RecordProjector<File> {
    pub fn open(path: &Path, columns: &[ColumnSpec]) -> ClientResult<Self> {
        let file = File::open(path)
            .map_err(|error| ClientError::source_unreadable(path, &error.to_string()))?;
        Self::from_reader(path, file, columns)
    }
}

impl<R: Read> RecordProjector<R> {
    pub fn from_reader(path: &Path, reader: R, columns: &[ColumnSpec]) -> ClientResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = reader
            .headers()
            .map_err(|error| ClientError::source_unreadable(path, &error.to_string()))?
            .iter()
            .map(|value| value.trim().to_string())
            .collect::<Vec<String>>();

        let (resolved, missing) = resolve_columns(&headers, columns);

        if !missing.is_empty() {
            return Err(ClientError::schema_mismatch(path, missing, headers));
        }

        let header_len = headers.len();
        Ok(Self {
            path: path.to_path_buf(),
            records: reader.into_records(),
            columns: resolved,
            header_len,
            next_row: 1,
            failed: false,
        })
    }

    fn project(&self, row: u64, record: &csv::StringRecord) -> RowOutcome<ProjectedRow> {
        if record.len() != self.header_len {
            return RowOutcome::rejected(row, RejectionReason::WrongShape);
        }

        let cells = self
            .columns
            .iter()
            .map(|(index, column_type)| {
                record
                    .get(*index)
                    .map(|raw| Cell::parse(raw, *column_type))
                    .unwrap_or(Cell::Null)
            })
            .collect();

        RowOutcome::Accepted(ProjectedRow { row, cells })
    }
}

impl<R: Read> Iterator for RecordProjector<R> {
    type Item = ClientResult<RowOutcome<ProjectedRow>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let result = self.records.next()?;
        let row = self.next_row;
        self.next_row += 1;

        match result {
            Ok(record) => Some(Ok(self.project(row, &record))),
            Err(error) => match error.kind() {
                csv::ErrorKind::Io(_) => {
                    self.failed = true;
                    Some(Err(ClientError::source_unreadable(
                        &self.path,
                        &error.to_string(),
                    )))
                }
                _ => Some(Ok(RowOutcome::rejected(row, RejectionReason::MalformedRow))),
            },
        }
    }
}

fn resolve_columns(
    headers: &[String],
    columns: &[ColumnSpec],
) -> (Vec<(usize, ColumnType)>, Vec<String>) {
    let index_by_name = headers
        .iter()
        .enumerate()
        .map(|(index, name)| (name.as_str(), index))
        .collect::<HashMap<&str, usize>>();

    let mut resolved = Vec::with_capacity(columns.len());
    let mut missing = Vec::new();
    for spec in columns {
        match index_by_name.get(spec.name) {
            Some(index) => resolved.push((*index, spec.column_type)),
            None => missing.push(spec.name.to_string()),
        }
    }
    (resolved, missing)
}

/// Types a projected [`TRANSACTION_COLUMNS`] row.
///
/// Blank or unparseable share counts read as `0.0`. A missing price reads as
/// non-positive and is rejected along with zero and negative prices.
pub fn transaction_from_row(projected: ProjectedRow) -> RowOutcome<TransactionRecord> {
    let row = projected.row;
    let Some(accession_number) = projected.cell(0).as_text() else {
        return RowOutcome::rejected(row, RejectionReason::MissingAccession);
    };

    let price_per_share = projected.cell(2).as_decimal().unwrap_or(0.0);
    if price_per_share <= 0.0 {
        return RowOutcome::rejected(row, RejectionReason::NonPositivePrice);
    }

    let Some(code) = projected.cell(3).as_text().and_then(AcquiredDisposed::parse) else {
        return RowOutcome::rejected(row, RejectionReason::InvalidCode);
    };

    RowOutcome::Accepted(TransactionRecord {
        row,
        accession_number: accession_number.to_string(),
        shares: projected.cell(1).as_decimal().unwrap_or(0.0),
        price_per_share,
        code,
        shares_owned_following: projected.cell(4).as_decimal().unwrap_or(0.0),
    })
}

/// Types a projected [`SUBMISSION_COLUMNS`] row. The ticker is left raw.
pub fn submission_from_row(projected: ProjectedRow) -> RowOutcome<SubmissionRecord> {
    let row = projected.row;
    let Some(accession_number) = projected.cell(0).as_text() else {
        return RowOutcome::rejected(row, RejectionReason::MissingAccession);
    };

    let Some(filing_date) = projected.cell(1).as_date() else {
        return RowOutcome::rejected(row, RejectionReason::InvalidFilingDate);
    };

    RowOutcome::Accepted(SubmissionRecord {
        row,
        accession_number: accession_number.to_string(),
        filing_date,
        ticker: projected.cell(2).as_text().unwrap_or_default().to_string(),
    })
}
