use std::path::{Path, PathBuf};

use crate::ClientResult;
use crate::commands::common::load_setup;
use crate::config::IngestConfig;
use crate::contracts::envelope::{SuccessEnvelope, success};
use crate::contracts::types::IngestData;
use crate::ingest::run_directory;
use crate::state::open_ingest_connection;
use crate::store::store_summary;

#[derive(Debug, Default)]
pub struct IngestRunOptions<'a> {
    pub data_dir: PathBuf,
    pub batch_size: Option<usize>,
    pub skip_existing: bool,
    pub home_override: Option<&'a Path>,
}

pub fn run(
    data_dir: PathBuf,
    batch_size: Option<usize>,
    skip_existing: bool,
) -> ClientResult<SuccessEnvelope> {
    run_with_options(IngestRunOptions {
        data_dir,
        batch_size,
        skip_existing,
        home_override: None,
    })
}

#[doc(hidden)]
pub fn run_with_options(options: IngestRunOptions<'_>) -> ClientResult<SuccessEnvelope> {
    let config =
        IngestConfig::from_env()?.with_overrides(options.batch_size, options.skip_existing)?;
    let setup = load_setup(options.home_override)?;
    let db_path = PathBuf::from(&setup.db_path);
    let mut connection = open_ingest_connection(&db_path)?;

    let report = run_directory(&mut connection, &db_path, &options.data_dir, &config)?;
    let store = store_summary(&connection, &db_path)?;

    let data = IngestData {
        run_id: report.run_id,
        data_dir: options.data_dir.display().to_string(),
        db_path: setup.db_path,
        batch_size: config.batch_size,
        skip_existing: config.skip_existing,
        partitions: report.partitions,
        rows_inserted: report.rows_inserted,
        rows_skipped_existing: report.rows_skipped_existing,
        rows_rejected: report.rows_rejected,
        rejections: report.rejections,
        store,
    };
    success("ingest", data)
}
