use chrono::{Local, NaiveDate};

use crate::commands::common::{default_price_source, normalize_query_ticker};
use crate::contracts::envelope::{SuccessEnvelope, success};
use crate::contracts::types::PriceHistoryData;
use crate::prices::PriceHistorySource;
use crate::{ClientError, ClientResult};

#[derive(Default)]
pub struct PriceHistoryOptions<'a> {
    pub ticker: String,
    pub from: NaiveDate,
    /// Defaults to today.
    pub to: Option<NaiveDate>,
    pub price_source: Option<&'a dyn PriceHistorySource>,
    pub today: Option<NaiveDate>,
}

pub fn history(
    ticker: String,
    from: NaiveDate,
    to: Option<NaiveDate>,
) -> ClientResult<SuccessEnvelope> {
    history_with_options(PriceHistoryOptions {
        ticker,
        from,
        to,
        ..PriceHistoryOptions::default()
    })
}

#[doc(hidden)]
pub fn history_with_options(options: PriceHistoryOptions<'_>) -> ClientResult<SuccessEnvelope> {
    let ticker = normalize_query_ticker(&options.ticker, "prices")?;
    let today = options.today.unwrap_or_else(|| Local::now().date_naive());
    let end = options.to.unwrap_or(today);
    if options.from > end {
        return Err(ClientError::invalid_argument_for_command(
            &format!("--from {} is after --to {end}.", options.from),
            Some("prices"),
        ));
    }

    let chart_source;
    let source: &dyn PriceHistorySource = match options.price_source {
        Some(source) => source,
        None => {
            chart_source = default_price_source(&ticker)?;
            &chart_source
        }
    };

    let points = source
        .fetch_daily(&ticker, options.from, end)
        .map_err(|error| ClientError::price_history_failed(&ticker, &error.to_string()))?;
    let split_days = points.iter().filter(|point| point.is_split_day()).count();

    success(
        "prices",
        PriceHistoryData {
            ticker,
            start: options.from,
            end,
            split_days,
            points,
        },
    )
}
