use crate::ingest::{RejectionReason, RowOutcome, SubmissionRecord};

/// Tickers that collide with common English words in free-text symbol fields.
pub const STOP_LIST: [&str; 7] = ["ALL", "NONE", "IN", "AS", "IF", "ELSE", "ON"];

/// Cleaned tickers must be strictly shorter than this.
pub const MAX_TICKER_LEN: usize = 5;

/// Strips non-letters, uppercases, and rejects empty, 5+ letter, or stop-listed symbols.
pub fn normalize_ticker(raw: &str) -> Result<String, RejectionReason> {
    let cleaned = raw
        .chars()
        .filter(char::is_ascii_alphabetic)
        .collect::<String>();

    if cleaned.is_empty() {
        return Err(RejectionReason::EmptyTicker);
    }
    if cleaned.len() >= MAX_TICKER_LEN {
        return Err(RejectionReason::TickerTooLong);
    }

    let upper = cleaned.to_ascii_uppercase();
    if STOP_LIST.contains(&upper.as_str()) {
        return Err(RejectionReason::StopListedTicker);
    }

    Ok(upper)
}

pub fn normalize_submission(mut submission: SubmissionRecord) -> RowOutcome<SubmissionRecord> {
    match normalize_ticker(&submission.ticker) {
        Ok(ticker) => {
            submission.ticker = ticker;
            RowOutcome::Accepted(submission)
        }
        Err(reason) => RowOutcome::rejected(submission.row, reason),
    }
}

pub fn normalize_submissions<I>(submissions: I) -> impl Iterator<Item = RowOutcome<SubmissionRecord>>
where
    I: IntoIterator<Item = SubmissionRecord>,
{
    submissions.into_iter().map(normalize_submission)
}
