use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};

use crate::commands::common::{default_price_source, load_setup, normalize_query_ticker};
use crate::contracts::envelope::{SuccessEnvelope, success};
use crate::contracts::types::TransactionsData;
use crate::prices::{PriceHistorySource, read_adjusted};
use crate::state::open_readonly_connection;
use crate::store::transactions_for_ticker;
use crate::{ClientError, ClientResult};

#[derive(Default)]
pub struct TransactionsOptions<'a> {
    pub ticker: String,
    /// Skip split adjustment and return stored prices.
    pub raw: bool,
    pub home_override: Option<&'a Path>,
    pub price_source: Option<&'a dyn PriceHistorySource>,
    pub today: Option<NaiveDate>,
}

pub fn list(ticker: String, raw: bool) -> ClientResult<SuccessEnvelope> {
    list_with_options(TransactionsOptions {
        ticker,
        raw,
        ..TransactionsOptions::default()
    })
}

#[doc(hidden)]
pub fn list_with_options(options: TransactionsOptions<'_>) -> ClientResult<SuccessEnvelope> {
    let ticker = normalize_query_ticker(&options.ticker, "transactions")?;
    let setup = load_setup(options.home_override)?;
    let db_path = PathBuf::from(&setup.db_path);
    let connection = open_readonly_connection(&db_path)?;

    if options.raw {
        let rows = transactions_for_ticker(&connection, &db_path, &ticker)?;
        if rows.is_empty() {
            return Err(ClientError::ticker_not_found(&ticker));
        }
        return success(
            "transactions",
            TransactionsData {
                ticker,
                adjusted: false,
                adjustment: None,
                history_start: None,
                history_end: None,
                row_count: rows.len(),
                rows,
            },
        );
    }

    let chart_source;
    let source: &dyn PriceHistorySource = match options.price_source {
        Some(source) => source,
        None => {
            chart_source = default_price_source(&ticker)?;
            &chart_source
        }
    };
    let today = options.today.unwrap_or_else(|| Local::now().date_naive());

    let adjusted = read_adjusted(&connection, &db_path, source, &ticker, today)?;
    success(
        "transactions",
        TransactionsData {
            ticker: adjusted.ticker,
            adjusted: true,
            adjustment: Some(adjusted.adjustment),
            history_start: Some(adjusted.history_start),
            history_end: Some(adjusted.history_end),
            row_count: adjusted.rows.len(),
            rows: adjusted.rows,
        },
    )
}
