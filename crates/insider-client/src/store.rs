use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;

use crate::ClientResult;
use crate::ingest::StoredTransaction;
use crate::state::map_sqlite_error;

pub(crate) const INSERT_SQL: &str = "INSERT INTO insider_data (
    ACCESSION_NUMBER,
    FILING_DATE,
    ISSUERTRADINGSYMBOL,
    TRANS_SHARES,
    TRANS_PRICEPERSHARE,
    TRANS_ACQUIRED_DISP_CD,
    SHRS_OWND_FOLWNG_TRANS
 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

pub(crate) const EXISTS_SQL: &str =
    "SELECT 1 FROM insider_data WHERE ACCESSION_NUMBER = ?1 LIMIT 1";

const SELECT_BY_TICKER_SQL: &str = "SELECT
    ACCESSION_NUMBER,
    FILING_DATE,
    ISSUERTRADINGSYMBOL,
    TRANS_SHARES,
    TRANS_PRICEPERSHARE,
    TRANS_ACQUIRED_DISP_CD,
    SHRS_OWND_FOLWNG_TRANS
 FROM insider_data
 WHERE ISSUERTRADINGSYMBOL = ?1
 ORDER BY FILING_DATE ASC, ACCESSION_NUMBER ASC";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreSummary {
    pub rows: i64,
    pub tickers: i64,
    pub earliest_filing: Option<NaiveDate>,
    pub latest_filing: Option<NaiveDate>,
}

pub fn insert_transaction(
    statement: &mut rusqlite::CachedStatement<'_>,
    row: &StoredTransaction,
) -> rusqlite::Result<usize> {
    statement.execute(params![
        &row.accession_number,
        row.filing_date,
        &row.ticker,
        row.shares,
        row.price_per_share,
        row.code,
        row.shares_owned_following,
    ])
}

pub fn accession_exists(
    statement: &mut rusqlite::CachedStatement<'_>,
    accession_number: &str,
) -> rusqlite::Result<bool> {
    statement
        .query_row([accession_number], |_| Ok(()))
        .optional()
        .map(|found| found.is_some())
}

/// Every stored row for one normalized ticker, oldest filing first.
pub fn transactions_for_ticker(
    connection: &Connection,
    db_path: &Path,
    ticker: &str,
) -> ClientResult<Vec<StoredTransaction>> {
    let mut statement = connection
        .prepare_cached(SELECT_BY_TICKER_SQL)
        .map_err(|error| map_sqlite_error(db_path, &error))?;
    let rows = statement
        .query_map([ticker], stored_transaction_from_row)
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let mut transactions = Vec::new();
    for row in rows {
        transactions.push(row.map_err(|error| map_sqlite_error(db_path, &error))?);
    }
    Ok(transactions)
}

pub fn store_summary(connection: &Connection, db_path: &Path) -> ClientResult<StoreSummary> {
    connection
        .query_row(
            "SELECT
                COUNT(*),
                COUNT(DISTINCT ISSUERTRADINGSYMBOL),
                MIN(FILING_DATE),
                MAX(FILING_DATE)
             FROM insider_data",
            [],
            |row| {
                Ok(StoreSummary {
                    rows: row.get(0)?,
                    tickers: row.get(1)?,
                    earliest_filing: row.get(2)?,
                    latest_filing: row.get(3)?,
                })
            },
        )
        .map_err(|error| map_sqlite_error(db_path, &error))
}

fn stored_transaction_from_row(row: &Row<'_>) -> rusqlite::Result<StoredTransaction> {
    Ok(StoredTransaction {
        accession_number: row.get(0)?,
        filing_date: row.get(1)?,
        ticker: row.get(2)?,
        shares: row.get(3)?,
        price_per_share: row.get(4)?,
        code: row.get(5)?,
        shares_owned_following: row.get(6)?,
    })
}
