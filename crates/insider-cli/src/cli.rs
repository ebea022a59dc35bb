use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

pub fn parse_iso_date(value: &str) -> Result<NaiveDate, String> {
    if value.len() != 10 {
        return Err("date must use YYYY-MM-DD format".to_string());
    }

    let bytes = value.as_bytes();
    if bytes[4] != b'-' || bytes[7] != b'-' {
        return Err("date must use YYYY-MM-DD format".to_string());
    }

    for index in [0usize, 1, 2, 3, 5, 6, 8, 9] {
        if !bytes[index].is_ascii_digit() {
            return Err("date must use YYYY-MM-DD format".to_string());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| "date must use valid calendar values".to_string())
}

pub fn parse_ticker(value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.len() > 5 || !trimmed.bytes().all(|b| b.is_ascii_alphabetic())
    {
        return Err("ticker must be 1 to 5 ASCII letters".to_string());
    }
    Ok(trimmed.to_ascii_uppercase())
}

pub fn parse_batch_size(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) | Err(_) => Err("batch size must be a positive whole number".to_string()),
        Ok(size) => Ok(size),
    }
}

/// Extended help shown after `insider ingest --help`.
pub const INGEST_AFTER_HELP: &str = "\
Expected layout:
  <DATA_DIR> holds one directory per filing drop, each with two
  tab-separated files that carry a header row:

    <DATA_DIR>/1/NONDERIV_TRANS.tsv
    <DATA_DIR>/1/SUBMISSION.tsv
    <DATA_DIR>/2/...

  Numbered drops load in numeric order. A <DATA_DIR> that itself holds
  both files is loaded as a single drop.

What gets stored:
  One row per accession number: filing date, ticker, summed shares,
  mean price per share, acquired/disposed code, and summed shares owned
  after the transaction. Rows without a matching submission are dropped.

Batching:
  Rows commit in chunks of --batch-size (default 10000, or
  INSIDER_BATCH_SIZE). A failed chunk stops the run; earlier chunks stay
  committed. Rerun with --skip-existing to resume without duplicates.
";

/// Extended help shown after `insider transactions --help`.
pub const TRANSACTIONS_AFTER_HELP: &str = "\
Prices:
  By default each price is replaced with the closing price on its filing
  date whenever the ticker's daily history contains a stock split.
  The stored rows are never modified. If the price service cannot be
  reached the stored prices are shown and the adjustment is marked
  unavailable.

  Pass --raw to skip the price service entirely.
";

#[derive(Debug, Parser)]
#[command(
    name = "insider",
    version,
    about = "Insider transaction ledger built from SEC Form 4 filing drops",
    disable_help_subcommand = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Load filing drops from a data directory into the store
    #[command(after_help = INGEST_AFTER_HELP)]
    Ingest {
        /// Directory holding the numbered filing drops
        data_dir: PathBuf,
        /// Rows per committed chunk
        #[arg(long, value_name = "N", value_parser = parse_batch_size)]
        batch_size: Option<usize>,
        /// Skip accession numbers already in the store
        #[arg(long)]
        skip_existing: bool,
        #[arg(long)]
        json: bool,
    },
    /// List stored transactions for a ticker
    #[command(after_help = TRANSACTIONS_AFTER_HELP)]
    Transactions {
        #[arg(value_parser = parse_ticker)]
        ticker: String,
        /// Show stored prices without split adjustment
        #[arg(long)]
        raw: bool,
        #[arg(long)]
        json: bool,
    },
    /// Show daily price history with split events
    Prices {
        #[arg(value_parser = parse_ticker)]
        ticker: String,
        #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_iso_date)]
        from: NaiveDate,
        /// Defaults to today
        #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_iso_date)]
        to: Option<NaiveDate>,
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
pub fn parse_from<I, T>(itr: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(itr)
}
