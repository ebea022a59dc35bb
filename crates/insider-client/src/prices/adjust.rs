use std::collections::HashMap;
use std::path::Path;

use chrono::{Days, NaiveDate};
use rusqlite::Connection;
use serde::Serialize;

use crate::ingest::{StoredTransaction, round_to_cents};
use crate::prices::{PriceHistorySource, PricePoint};
use crate::store::transactions_for_ticker;
use crate::{ClientError, ClientResult};

/// Lead-in before the earliest filing when requesting history.
pub const HISTORY_PAD_DAYS: u64 = 365;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AdjustmentStatus {
    Applied {
        split_days: usize,
        adjusted_rows: usize,
        unmatched_rows: usize,
    },
    NoSplits,
    Unavailable {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdjustedTransactions {
    pub ticker: String,
    pub rows: Vec<StoredTransaction>,
    pub adjustment: AdjustmentStatus,
    pub history_start: NaiveDate,
    pub history_end: NaiveDate,
}

/// Rewrites each row's price to the cents-rounded close of its filing day
/// when the history holds at least one split day.
///
/// Rows filed on a day missing from the history keep their price. Without
/// any split day the rows come back untouched.
pub fn apply_split_adjustment(
    mut rows: Vec<StoredTransaction>,
    history: &[PricePoint],
) -> (Vec<StoredTransaction>, AdjustmentStatus) {
    let split_days = history.iter().filter(|point| point.is_split_day()).count();
    if split_days == 0 {
        return (rows, AdjustmentStatus::NoSplits);
    }

    let closes = history
        .iter()
        .map(|point| (point.date, point.close))
        .collect::<HashMap<_, _>>();
    let mut adjusted_rows = 0;
    let mut unmatched_rows = 0;
    for row in &mut rows {
        match closes.get(&row.filing_date) {
            Some(close) => {
                row.price_per_share = round_to_cents(*close);
                adjusted_rows += 1;
            }
            None => unmatched_rows += 1,
        }
    }

    (
        rows,
        AdjustmentStatus::Applied {
            split_days,
            adjusted_rows,
            unmatched_rows,
        },
    )
}

/// Stored rows for `ticker` with prices corrected for splits up to `today`.
///
/// Never writes to the store. A failing or empty price source degrades to
/// the stored prices with [`AdjustmentStatus::Unavailable`].
pub fn read_adjusted(
    connection: &Connection,
    db_path: &Path,
    source: &dyn PriceHistorySource,
    ticker: &str,
    today: NaiveDate,
) -> ClientResult<AdjustedTransactions> {
    let rows = transactions_for_ticker(connection, db_path, ticker)?;
    let Some(earliest) = rows.iter().map(|row| row.filing_date).min() else {
        return Err(ClientError::ticker_not_found(ticker));
    };

    let history_start = earliest
        .checked_sub_days(Days::new(HISTORY_PAD_DAYS))
        .unwrap_or(earliest);
    let history_end = today.max(earliest);

    let (rows, adjustment) = match source.fetch_daily(ticker, history_start, history_end) {
        Ok(history) if history.is_empty() => (
            rows,
            AdjustmentStatus::Unavailable {
                reason: format!("price service has no daily history for `{ticker}`"),
            },
        ),
        Ok(history) => apply_split_adjustment(rows, &history),
        Err(error) => {
            tracing::warn!(ticker, error = %error, "split adjustment unavailable");
            (
                rows,
                AdjustmentStatus::Unavailable {
                    reason: error.to_string(),
                },
            )
        }
    };

    Ok(AdjustedTransactions {
        ticker: ticker.to_string(),
        rows,
        adjustment,
        history_start,
        history_end,
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::path::Path;

    use chrono::NaiveDate;
    use rusqlite::Connection;

    use super::{AdjustmentStatus, apply_split_adjustment, read_adjusted};
    use crate::ingest::{AcquiredDisposed, StoredTransaction};
    use crate::migrations::run_pending;
    use crate::prices::{PriceHistorySource, PricePoint, PriceSourceError};
    use crate::store::{INSERT_SQL, insert_transaction};

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
    }

    fn stored(accession: &str, filed: NaiveDate, price: f64) -> StoredTransaction {
        StoredTransaction {
            accession_number: accession.to_string(),
            filing_date: filed,
            ticker: "ABC".to_string(),
            shares: 100.0,
            price_per_share: price,
            code: AcquiredDisposed::Acquired,
            shares_owned_following: 500.0,
        }
    }

    fn point(day: NaiveDate, close: f64, split_ratio: Option<f64>) -> PricePoint {
        PricePoint {
            date: day,
            open: Some(close),
            high: Some(close),
            low: Some(close),
            close,
            volume: Some(1_000),
            split_ratio,
        }
    }

    struct FixedSource {
        result: Result<Vec<PricePoint>, String>,
        requests: RefCell<Vec<(NaiveDate, NaiveDate)>>,
    }

    impl FixedSource {
        fn new(result: Result<Vec<PricePoint>, String>) -> Self {
            Self {
                result,
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl PriceHistorySource for FixedSource {
        fn fetch_daily(
            &self,
            _ticker: &str,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<PricePoint>, PriceSourceError> {
            self.requests.borrow_mut().push((start, end));
            self.result.clone().map_err(PriceSourceError::Data)
        }
    }

    fn seeded(rows: &[StoredTransaction]) -> Option<Connection> {
        let mut connection = Connection::open_in_memory().ok()?;
        run_pending(&mut connection).ok()?;
        {
            let mut insert = connection.prepare_cached(INSERT_SQL).ok()?;
            for row in rows {
                insert_transaction(&mut insert, row).ok()?;
            }
        }
        Some(connection)
    }

    #[test]
    fn no_split_days_leave_rows_unchanged() {
        let rows = vec![stored("A1", date(2021, 3, 1), 11.0)];
        let history = vec![point(date(2021, 3, 1), 44.123, None)];
        let (adjusted, status) = apply_split_adjustment(rows.clone(), &history);
        assert_eq!(adjusted, rows);
        assert_eq!(status, AdjustmentStatus::NoSplits);
    }

    #[test]
    fn split_history_replaces_prices_with_rounded_close() {
        let rows = vec![
            stored("A1", date(2021, 3, 1), 11.0),
            stored("A2", date(2021, 3, 6), 12.0),
        ];
        let history = vec![
            point(date(2021, 3, 1), 2.754, None),
            point(date(2021, 3, 5), 2.9, Some(4.0)),
        ];
        let (adjusted, status) = apply_split_adjustment(rows, &history);

        assert_eq!(adjusted[0].price_per_share, 2.75);
        assert_eq!(adjusted[1].price_per_share, 12.0);
        assert_eq!(
            status,
            AdjustmentStatus::Applied {
                split_days: 1,
                adjusted_rows: 1,
                unmatched_rows: 1,
            }
        );
    }

    #[test]
    fn adjusted_close_rounds_ties_to_even() {
        let rows = vec![
            stored("A1", date(2021, 3, 1), 11.0),
            stored("A2", date(2021, 3, 2), 12.0),
        ];
        let history = vec![
            point(date(2021, 3, 1), 1.125, Some(2.0)),
            point(date(2021, 3, 2), 2.675, None),
        ];
        let (adjusted, _) = apply_split_adjustment(rows, &history);
        assert_eq!(adjusted[0].price_per_share, 1.12);
        assert_eq!(adjusted[1].price_per_share, 2.67);
    }

    #[test]
    fn adjusting_twice_matches_adjusting_once() {
        let rows = vec![
            stored("A1", date(2021, 3, 1), 11.0),
            stored("A2", date(2021, 3, 2), 12.0),
        ];
        let history = vec![
            point(date(2021, 3, 1), 3.333, Some(2.0)),
            point(date(2021, 3, 2), 3.5, None),
        ];
        let (once, _) = apply_split_adjustment(rows, &history);
        let (twice, _) = apply_split_adjustment(once.clone(), &history);
        assert_eq!(once, twice);
    }

    #[test]
    fn requests_history_from_a_year_before_earliest_filing() {
        let rows = [
            stored("A2", date(2021, 6, 1), 12.0),
            stored("A1", date(2021, 3, 1), 11.0),
        ];
        let connection = seeded(&rows);
        assert!(connection.is_some());
        if let Some(conn) = connection {
            let source = FixedSource::new(Ok(vec![point(date(2021, 3, 1), 5.0, Some(2.0))]));
            let today = date(2024, 1, 15);
            let result = read_adjusted(&conn, Path::new(":memory:"), &source, "ABC", today);
            assert!(result.is_ok());
            if let Ok(adjusted) = result {
                assert_eq!(adjusted.history_start, date(2020, 3, 1));
                assert_eq!(adjusted.history_end, today);
                assert_eq!(adjusted.rows[0].accession_number, "A1");
                assert_eq!(adjusted.rows[0].price_per_share, 5.0);
                assert_eq!(adjusted.rows[1].price_per_share, 12.0);
            }
            assert_eq!(
                source.requests.borrow().as_slice(),
                &[(date(2020, 3, 1), today)]
            );

            let stored_price = conn.query_row(
                "SELECT TRANS_PRICEPERSHARE FROM insider_data WHERE ACCESSION_NUMBER = 'A1'",
                [],
                |row| row.get::<_, f64>(0),
            );
            assert_eq!(stored_price.ok(), Some(11.0));
        }
    }

    #[test]
    fn failing_source_falls_back_to_stored_prices() {
        let rows = [stored("A1", date(2021, 3, 1), 11.0)];
        let connection = seeded(&rows);
        assert!(connection.is_some());
        if let Some(conn) = connection {
            let source = FixedSource::new(Err("timed out".to_string()));
            let result = read_adjusted(
                &conn,
                Path::new(":memory:"),
                &source,
                "ABC",
                date(2024, 1, 15),
            );
            assert!(result.is_ok());
            if let Ok(adjusted) = result {
                assert_eq!(adjusted.rows, rows.to_vec());
                assert!(matches!(
                    adjusted.adjustment,
                    AdjustmentStatus::Unavailable { ref reason } if reason.contains("timed out")
                ));
            }
        }
    }

    #[test]
    fn empty_history_is_unavailable() {
        let rows = [stored("A1", date(2021, 3, 1), 11.0)];
        let connection = seeded(&rows);
        assert!(connection.is_some());
        if let Some(conn) = connection {
            let source = FixedSource::new(Ok(Vec::new()));
            let result = read_adjusted(
                &conn,
                Path::new(":memory:"),
                &source,
                "ABC",
                date(2024, 1, 15),
            );
            assert!(matches!(
                result.map(|adjusted| adjusted.adjustment),
                Ok(AdjustmentStatus::Unavailable { .. })
            ));
        }
    }

    #[test]
    fn unknown_ticker_is_not_found() {
        let connection = seeded(&[]);
        assert!(connection.is_some());
        if let Some(conn) = connection {
            let source = FixedSource::new(Ok(Vec::new()));
            let result = read_adjusted(
                &conn,
                Path::new(":memory:"),
                &source,
                "ZZZZ",
                date(2024, 1, 15),
            );
            assert!(matches!(result, Err(error) if error.code == "ticker_not_found"));
            assert!(source.requests.borrow().is_empty());
        }
    }
}
