use std::path::Path;

use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;

use crate::config::DEFAULT_BATCH_SIZE;
use crate::ingest::StoredTransaction;
use crate::store::{EXISTS_SQL, INSERT_SQL, accession_exists, insert_transaction};
use crate::{ClientError, ClientResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub batch_size: usize,
    pub skip_existing: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            skip_existing: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub chunks_committed: usize,
    pub rows_inserted: usize,
    pub rows_skipped_existing: usize,
    /// Input rows per committed chunk, in commit order.
    pub chunk_sizes: Vec<usize>,
}

#[derive(Debug, Clone, Copy, Default)]
struct ChunkOutcome {
    inserted: usize,
    skipped: usize,
}

/// Appends `rows` to the store in consecutive chunks of at most
/// `options.batch_size`, one IMMEDIATE transaction per chunk.
///
/// On a failed chunk every earlier chunk stays committed and the error
/// names the chunk index and the first uncommitted row. An `Err` from the
/// source drops the pending chunk and is returned as-is.
pub fn load_in_batches<I>(
    connection: &mut Connection,
    db_path: &Path,
    rows: I,
    options: LoadOptions,
) -> ClientResult<LoadReport>
where
    I: IntoIterator<Item = ClientResult<StoredTransaction>>,
{
    if options.batch_size == 0 {
        return Err(ClientError::invalid_argument_for_command(
            "Batch size must be at least 1.",
            Some("ingest"),
        ));
    }

    let mut report = LoadReport::default();
    let mut pending = Vec::with_capacity(options.batch_size.min(DEFAULT_BATCH_SIZE));
    for row in rows {
        pending.push(row?);
        if pending.len() == options.batch_size {
            commit_chunk(connection, db_path, &pending, options, &mut report)?;
            pending.clear();
        }
    }
    if !pending.is_empty() {
        commit_chunk(connection, db_path, &pending, options, &mut report)?;
    }

    Ok(report)
}

fn commit_chunk(
    connection: &mut Connection,
    db_path: &Path,
    chunk: &[StoredTransaction],
    options: LoadOptions,
    report: &mut LoadReport,
) -> ClientResult<()> {
    let chunk_index = report.chunks_committed;
    let outcome = insert_chunk(connection, chunk, options.skip_existing).map_err(|error| {
        let committed_rows: usize = report.chunk_sizes.iter().sum();
        tracing::warn!(
            chunk_index,
            committed_rows,
            error = %error,
            "chunk insert rolled back"
        );
        ClientError::load_failed(chunk_index, chunk_index, committed_rows, &error.to_string())
            .with_context("store", &db_path.display().to_string())
    })?;

    report.chunks_committed += 1;
    report.rows_inserted += outcome.inserted;
    report.rows_skipped_existing += outcome.skipped;
    report.chunk_sizes.push(chunk.len());
    tracing::debug!(
        chunk_index,
        rows = chunk.len(),
        inserted = outcome.inserted,
        skipped = outcome.skipped,
        "chunk committed"
    );
    Ok(())
}

fn insert_chunk(
    connection: &mut Connection,
    chunk: &[StoredTransaction],
    skip_existing: bool,
) -> rusqlite::Result<ChunkOutcome> {
    let transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let mut outcome = ChunkOutcome::default();
    {
        let mut insert = transaction.prepare_cached(INSERT_SQL)?;
        let mut exists = transaction.prepare_cached(EXISTS_SQL)?;
        for row in chunk {
            if skip_existing && accession_exists(&mut exists, &row.accession_number)? {
                outcome.skipped += 1;
                continue;
            }
            insert_transaction(&mut insert, row)?;
            outcome.inserted += 1;
        }
    }
    transaction.commit()?;
    Ok(outcome)
}
