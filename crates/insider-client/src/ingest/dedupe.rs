use std::collections::HashMap;

use serde::Serialize;

use crate::ingest::{AcquiredDisposed, AggregatedTransaction, TransactionRecord, round_to_cents};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DedupeStats {
    pub rows_in: u64,
    pub groups_out: usize,
    /// Groups that had more than one leg.
    pub collapsed_groups: usize,
    /// Legs absorbed into another row of the same group.
    pub merged_legs: u64,
    /// Collapsed groups whose legs disagreed on acquired/disposed.
    pub mixed_direction_groups: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DedupeOutput {
    pub rows: Vec<AggregatedTransaction>,
    pub stats: DedupeStats,
}

#[derive(Debug)]
struct Accumulator {
    shares: f64,
    price_sum: f64,
    legs: usize,
    first_row: u64,
    code: AcquiredDisposed,
    shares_owned_following: f64,
    mixed_direction: bool,
}

impl Accumulator {
    fn start(record: &TransactionRecord) -> Self {
        Self {
            shares: record.shares,
            price_sum: record.price_per_share,
            legs: 1,
            first_row: record.row,
            code: record.code,
            shares_owned_following: record.shares_owned_following,
            mixed_direction: false,
        }
    }

    fn absorb(&mut self, record: &TransactionRecord) {
        self.shares += record.shares;
        self.price_sum += record.price_per_share;
        self.legs += 1;
        if record.code != self.code {
            self.mixed_direction = true;
        }
        self.shares_owned_following += record.shares_owned_following;
        if record.row < self.first_row {
            self.first_row = record.row;
            self.code = record.code;
        }
    }

    fn price_per_share(&self) -> f64 {
        if self.legs == 1 {
            return self.price_sum;
        }
        round_to_cents(self.price_sum / self.legs as f64)
    }
}

/// Collapses transaction legs to one row per accession number.
///
/// Shares and holdings are summed, price is the cents-rounded mean of leg
/// prices, and the code comes from the lowest-row leg. Single-leg groups pass
/// through untouched. Rows come out in first-row order, though callers should
/// not depend on it.
#[derive(Debug, Default)]
pub struct Deduplicator {
    groups: HashMap<String, Accumulator>,
    rows_in: u64,
}

impl Deduplicator {
    pub fn push(&mut self, record: TransactionRecord) {
        self.rows_in += 1;
        match self.groups.get_mut(&record.accession_number) {
            Some(accumulator) => accumulator.absorb(&record),
            None => {
                let accumulator = Accumulator::start(&record);
                self.groups.insert(record.accession_number, accumulator);
            }
        }
    }

    pub fn finish(self) -> DedupeOutput {
        let mut stats = DedupeStats {
            rows_in: self.rows_in,
            groups_out: self.groups.len(),
            ..DedupeStats::default()
        };

        let mut rows = Vec::with_capacity(self.groups.len());
        for (accession_number, accumulator) in self.groups {
            if accumulator.legs > 1 {
                stats.collapsed_groups += 1;
                stats.merged_legs += (accumulator.legs - 1) as u64;
            }
            if accumulator.mixed_direction {
                stats.mixed_direction_groups += 1;
                tracing::warn!(
                    accession_number = %accession_number,
                    legs = accumulator.legs,
                    kept_code = %accumulator.code,
                    "accession mixes acquired and disposed legs"
                );
            }
            rows.push(AggregatedTransaction {
                price_per_share: accumulator.price_per_share(),
                accession_number,
                shares: accumulator.shares,
                code: accumulator.code,
                shares_owned_following: accumulator.shares_owned_following,
                legs: accumulator.legs,
                first_row: accumulator.first_row,
            });
        }
        rows.sort_by_key(|row| row.first_row);

        tracing::debug!(
            rows_in = stats.rows_in,
            groups_out = stats.groups_out,
            collapsed_groups = stats.collapsed_groups,
            "deduplicated transaction legs"
        );
        DedupeOutput { rows, stats }
    }
}

pub fn dedupe_transactions<I>(records: I) -> DedupeOutput
where
    I: IntoIterator<Item = TransactionRecord>,
{
    let mut deduplicator = Deduplicator::default();
    for record in records {
        deduplicator.push(record);
    }
    deduplicator.finish()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::dedupe_transactions;
    use crate::ingest::{AcquiredDisposed, AggregatedTransaction, TransactionRecord};

    fn leg(
        row: u64,
        accession: &str,
        shares: f64,
        price: f64,
        code: AcquiredDisposed,
        owned: f64,
    ) -> TransactionRecord {
        TransactionRecord {
            row,
            accession_number: accession.to_string(),
            shares,
            price_per_share: price,
            code,
            shares_owned_following: owned,
        }
    }

    fn find<'a>(rows: &'a [AggregatedTransaction], accession: &str) -> Option<&'a AggregatedTransaction> {
        rows.iter().find(|row| row.accession_number == accession)
    }

    #[test]
    fn collapses_legs_by_accession() {
        let output = dedupe_transactions(vec![
            leg(1, "A1", 100.0, 10.0, AcquiredDisposed::Acquired, 1_100.0),
            leg(2, "A1", 50.0, 12.0, AcquiredDisposed::Acquired, 1_100.0),
            leg(3, "B7", 10.0, 5.0, AcquiredDisposed::Disposed, 40.0),
        ]);

        assert_eq!(output.rows.len(), 2);
        let merged = find(&output.rows, "A1");
        assert!(merged.is_some());
        if let Some(row) = merged {
            assert_eq!(row.shares, 150.0);
            assert_eq!(row.price_per_share, 11.0);
            assert_eq!(row.shares_owned_following, 2_200.0);
            assert_eq!(row.code, AcquiredDisposed::Acquired);
            assert_eq!(row.legs, 2);
        }

        assert_eq!(output.stats.rows_in, 3);
        assert_eq!(output.stats.groups_out, 2);
        assert_eq!(output.stats.collapsed_groups, 1);
        assert_eq!(output.stats.merged_legs, 1);
    }

    #[test]
    fn multi_leg_price_is_rounded_to_cents() {
        let output = dedupe_transactions(vec![
            leg(1, "C3", 1.0, 10.0, AcquiredDisposed::Acquired, 1.0),
            leg(2, "C3", 1.0, 10.0, AcquiredDisposed::Acquired, 2.0),
            leg(3, "C3", 1.0, 10.01, AcquiredDisposed::Acquired, 3.0),
        ]);
        assert_eq!(output.rows[0].price_per_share, 10.0);
    }

    #[test]
    fn mean_price_on_a_cent_tie_rounds_to_even() {
        let output = dedupe_transactions(vec![
            leg(1, "T1", 1.0, 10.12, AcquiredDisposed::Acquired, 1.0),
            leg(2, "T1", 1.0, 10.13, AcquiredDisposed::Acquired, 1.0),
            leg(3, "T2", 1.0, 1.0, AcquiredDisposed::Acquired, 1.0),
            leg(4, "T2", 1.0, 1.25, AcquiredDisposed::Acquired, 1.0),
            leg(5, "T3", 1.0, 2.67, AcquiredDisposed::Disposed, 1.0),
            leg(6, "T3", 1.0, 2.68, AcquiredDisposed::Disposed, 1.0),
        ]);
        let prices = output
            .rows
            .iter()
            .map(|row| (row.accession_number.as_str(), row.price_per_share))
            .collect::<Vec<_>>();
        assert_eq!(prices, vec![("T1", 10.12), ("T2", 1.12), ("T3", 2.67)]);
    }

    #[test]
    fn singleton_groups_pass_through_unchanged() {
        let output = dedupe_transactions(vec![leg(
            9,
            "S1",
            33.0,
            12.3456,
            AcquiredDisposed::Disposed,
            7.0,
        )]);
        assert_eq!(output.rows.len(), 1);
        let row = &output.rows[0];
        assert_eq!(row.price_per_share, 12.3456);
        assert_eq!(row.shares, 33.0);
        assert_eq!(row.first_row, 9);
        assert_eq!(output.stats.collapsed_groups, 0);
    }

    #[test]
    fn code_comes_from_lowest_row_regardless_of_arrival_order() {
        let output = dedupe_transactions(vec![
            leg(5, "M1", 10.0, 1.0, AcquiredDisposed::Disposed, 0.0),
            leg(2, "M1", 10.0, 1.0, AcquiredDisposed::Acquired, 0.0),
        ]);
        let row = &output.rows[0];
        assert_eq!(row.code, AcquiredDisposed::Acquired);
        assert_eq!(row.first_row, 2);
        assert_eq!(output.stats.mixed_direction_groups, 1);
    }

    #[test]
    fn reapplying_to_output_is_a_no_op() {
        let first = dedupe_transactions(vec![
            leg(1, "A1", 100.0, 10.0, AcquiredDisposed::Acquired, 1_000.0),
            leg(2, "A1", 50.0, 12.0, AcquiredDisposed::Acquired, 2_200.0),
            leg(3, "B7", 10.0, 5.0, AcquiredDisposed::Disposed, 40.0),
        ]);
        let second = dedupe_transactions(first.rows.iter().map(TransactionRecord::from));

        let strip = |rows: &[AggregatedTransaction]| {
            rows.iter()
                .map(|row| {
                    (
                        row.accession_number.clone(),
                        row.shares.to_bits(),
                        row.price_per_share.to_bits(),
                        row.code,
                        row.shares_owned_following.to_bits(),
                    )
                })
                .collect::<HashSet<_>>()
        };
        assert_eq!(strip(&first.rows), strip(&second.rows));
        assert_eq!(second.stats.collapsed_groups, 0);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let output = dedupe_transactions(Vec::new());
        assert!(output.rows.is_empty());
        assert_eq!(output.stats.rows_in, 0);
        assert_eq!(output.stats.groups_out, 0);
    }

    #[test]
    fn accession_numbers_are_unique_in_output() {
        let output = dedupe_transactions(
            (0..20_u64).map(|row| {
                leg(
                    row + 1,
                    &format!("K{}", row % 4),
                    1.0,
                    2.0,
                    AcquiredDisposed::Acquired,
                    row as f64,
                )
            }),
        );
        let keys = output
            .rows
            .iter()
            .map(|row| row.accession_number.as_str())
            .collect::<HashSet<_>>();
        assert_eq!(keys.len(), output.rows.len());
        assert_eq!(output.rows.len(), 4);
        assert_eq!(output.stats.merged_legs, 16);
    }
}
