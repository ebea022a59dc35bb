use std::time::Duration;

use crate::{ClientError, ClientResult};

pub const BATCH_SIZE_ENV: &str = "INSIDER_BATCH_SIZE";
pub const PRICE_API_URL_ENV: &str = "INSIDER_PRICE_API_URL";
pub const PRICE_TIMEOUT_ENV: &str = "INSIDER_PRICE_TIMEOUT_SECS";

pub const DEFAULT_BATCH_SIZE: usize = 10_000;
pub const DEFAULT_PRICE_API_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart/";
pub const DEFAULT_PRICE_TIMEOUT: Duration = Duration::from_secs(10);

/// Knobs for one ingest run. Flags win over environment values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    pub batch_size: usize,
    pub skip_existing: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            skip_existing: false,
        }
    }
}

impl IngestConfig {
    pub fn from_env() -> ClientResult<Self> {
        let mut config = Self::default();
        if let Some(raw) = read_env(BATCH_SIZE_ENV) {
            config.batch_size = parse_batch_size(BATCH_SIZE_ENV, &raw)?;
        }
        Ok(config)
    }

    pub fn with_overrides(
        mut self,
        batch_size: Option<usize>,
        skip_existing: bool,
    ) -> ClientResult<Self> {
        if let Some(size) = batch_size {
            if size == 0 {
                return Err(ClientError::invalid_argument_for_command(
                    "--batch-size must be at least 1.",
                    Some("ingest"),
                ));
            }
            self.batch_size = size;
        }
        self.skip_existing = self.skip_existing || skip_existing;
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceSourceConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for PriceSourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_PRICE_API_URL.to_string(),
            timeout: DEFAULT_PRICE_TIMEOUT,
        }
    }
}

impl PriceSourceConfig {
    pub fn from_env() -> ClientResult<Self> {
        let mut config = Self::default();
        if let Some(url) = read_env(PRICE_API_URL_ENV) {
            config.base_url = url;
        }
        if let Some(raw) = read_env(PRICE_TIMEOUT_ENV) {
            let seconds = raw
                .parse::<u64>()
                .ok()
                .filter(|value| *value > 0)
                .ok_or_else(|| {
                    ClientError::invalid_config(
                        PRICE_TIMEOUT_ENV,
                        &raw,
                        "a positive whole number of seconds",
                    )
                })?;
            config.timeout = Duration::from_secs(seconds);
        }
        Ok(config)
    }
}

fn parse_batch_size(variable: &str, raw: &str) -> ClientResult<usize> {
    raw.trim()
        .parse::<usize>()
        .ok()
        .filter(|value| *value > 0)
        .ok_or_else(|| ClientError::invalid_config(variable, raw, "a positive integer"))
}

fn read_env(variable: &str) -> Option<String> {
    let value = std::env::var(variable).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}
