use std::path::Path;

use crate::config::PriceSourceConfig;
use crate::prices::ChartApiSource;
use crate::setup::{SetupContext, ensure_initialized, ensure_initialized_at};
use crate::{ClientError, ClientResult};

/// Longest symbol accepted on the read path.
pub const MAX_QUERY_TICKER_LEN: usize = 5;

pub(crate) fn load_setup(home_override: Option<&Path>) -> ClientResult<SetupContext> {
    match home_override {
        Some(home) => ensure_initialized_at(home),
        None => ensure_initialized(),
    }
}

/// Chart API client configured from the environment.
pub(crate) fn default_price_source(ticker: &str) -> ClientResult<ChartApiSource> {
    ChartApiSource::new(&PriceSourceConfig::from_env()?)
        .map_err(|error| ClientError::price_history_failed(ticker, &error.to_string()))
}

/// Validates a ticker argument (1-5 ASCII letters) and uppercases it.
pub fn normalize_query_ticker(raw: &str, command: &str) -> ClientResult<String> {
    let trimmed = raw.trim();
    let valid = !trimmed.is_empty()
        && trimmed.len() <= MAX_QUERY_TICKER_LEN
        && trimmed.chars().all(|ch| ch.is_ascii_alphabetic());
    if !valid {
        return Err(ClientError::invalid_argument_for_command(
            &format!("`{raw}` is not a ticker symbol: expected 1-5 ASCII letters."),
            Some(command),
        ));
    }
    Ok(trimmed.to_ascii_uppercase())
}
