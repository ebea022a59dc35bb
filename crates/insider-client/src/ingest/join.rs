use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::ingest::{AggregatedTransaction, StoredTransaction, SubmissionRecord};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JoinStats {
    pub matched: usize,
    pub unmatched_submissions: usize,
    pub unmatched_transactions: usize,
    /// Accession numbers seen on more than one submission row.
    pub duplicate_submission_keys: usize,
}

/// Deduplicated transactions keyed by accession number, probed by a
/// stream of normalized submissions.
#[derive(Debug, Default)]
pub struct TransactionIndex {
    by_accession: HashMap<String, AggregatedTransaction>,
    matched: HashSet<String>,
    seen_submissions: HashSet<String>,
    stats: JoinStats,
}

impl TransactionIndex {
    pub fn new(rows: Vec<AggregatedTransaction>) -> Self {
        let by_accession = rows
            .into_iter()
            .map(|row| (row.accession_number.clone(), row))
            .collect();
        Self {
            by_accession,
            ..Self::default()
        }
    }

    /// Inner-joins one submission. A repeated submission key joins again.
    pub fn join_submission(&mut self, submission: &SubmissionRecord) -> Option<StoredTransaction> {
        let key = submission.accession_number.as_str();
        if !self.seen_submissions.insert(key.to_string()) {
            self.stats.duplicate_submission_keys += 1;
            tracing::warn!(
                accession_number = %key,
                row = submission.row,
                "duplicate submission accession number"
            );
        }

        let Some(transaction) = self.by_accession.get(key) else {
            self.stats.unmatched_submissions += 1;
            return None;
        };
        self.matched.insert(key.to_string());
        self.stats.matched += 1;

        Some(StoredTransaction {
            accession_number: transaction.accession_number.clone(),
            filing_date: submission.filing_date,
            ticker: submission.ticker.clone(),
            shares: transaction.shares,
            price_per_share: transaction.price_per_share,
            code: transaction.code,
            shares_owned_following: transaction.shares_owned_following,
        })
    }

    pub fn finish(mut self) -> JoinStats {
        self.stats.unmatched_transactions = self.by_accession.len() - self.matched.len();
        self.stats
    }
}

pub fn join_transactions<I>(
    rows: Vec<AggregatedTransaction>,
    submissions: I,
) -> (Vec<StoredTransaction>, JoinStats)
where
    I: IntoIterator<Item = SubmissionRecord>,
{
    let mut index = TransactionIndex::new(rows);
    let joined = submissions
        .into_iter()
        .filter_map(|submission| index.join_submission(&submission))
        .collect();
    (joined, index.finish())
}
