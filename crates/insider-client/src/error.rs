use std::path::Path;

use serde_json::{Value, json};
use thiserror::Error;

pub(crate) const INGEST_HELP_COMMAND: &str = "insider ingest --help";

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ClientError {
    pub code: String,
    pub message: String,
    pub recovery_steps: Vec<String>,
    pub data: Option<Value>,
}

impl ClientError {
    pub fn new(code: &str, message: &str, recovery_steps: Vec<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            recovery_steps,
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Adds one key to the error's data object, creating the object if needed.
    pub fn with_context(mut self, key: &str, value: &str) -> Self {
        let mut data = match self.data.take() {
            Some(Value::Object(object)) => object,
            _ => serde_json::Map::new(),
        };
        data.insert(key.to_string(), Value::String(value.to_string()));
        self.data = Some(Value::Object(data));
        self
    }

    pub fn invalid_argument(message: &str) -> Self {
        Self::invalid_argument_for_command(message, None)
    }

    pub fn invalid_argument_for_command(message: &str, command: Option<&str>) -> Self {
        let help_hint = match command {
            Some(cmd) => format!("Run `insider {cmd} --help` for usage."),
            None => "Run `insider --help` for usage.".to_string(),
        };
        let error = Self::new("invalid_argument", message, vec![help_hint]);
        if let Some(cmd) = command {
            return error.with_data(json!({
                "command_hint": cmd,
            }));
        }
        error
    }

    pub fn invalid_argument_with_recovery(message: &str, recovery_steps: Vec<String>) -> Self {
        Self::new("invalid_argument", message, recovery_steps)
    }

    pub fn invalid_config(variable: &str, value: &str, expected: &str) -> Self {
        Self::new(
            "invalid_argument",
            &format!("`{variable}` has invalid value `{value}`: expected {expected}."),
            vec![format!("Unset `{variable}` or set it to {expected}.")],
        )
        .with_data(json!({
            "variable": variable,
            "value": value,
        }))
    }

    pub fn data_dir_not_found(path: &Path) -> Self {
        let location = path.display().to_string();
        Self::new(
            "data_dir_not_found",
            &format!("Data directory `{location}` does not exist or is not readable."),
            vec![
                "Pass the directory that holds the numbered filing partitions.".to_string(),
                format!("Run `{INGEST_HELP_COMMAND}` to review the expected layout."),
            ],
        )
        .with_data(json!({ "path": location }))
    }

    pub fn no_partitions_found(path: &Path) -> Self {
        let location = path.display().to_string();
        Self::new(
            "no_partitions_found",
            &format!(
                "No partition under `{location}` contains both NONDERIV_TRANS.tsv and SUBMISSION.tsv."
            ),
            vec![
                "Place each filing drop in its own directory with both TSV files.".to_string(),
                format!("Run `{INGEST_HELP_COMMAND}` to review the expected layout."),
            ],
        )
        .with_data(json!({ "path": location }))
    }

    pub fn source_unreadable(path: &Path, detail: &str) -> Self {
        let location = path.display().to_string();
        Self::new(
            "source_unreadable",
            &format!("Cannot read source file `{location}`: {detail}"),
            vec![format!("Check that `{location}` exists and is readable.")],
        )
        .with_data(json!({ "file": location }))
    }

    pub fn schema_mismatch(
        path: &Path,
        missing_columns: Vec<String>,
        actual_columns: Vec<String>,
    ) -> Self {
        let location = path.display().to_string();
        Self::new(
            "schema_mismatch",
            &format!(
                "Source file `{location}` is missing required columns: {}.",
                missing_columns.join(", ")
            ),
            vec![
                "Make sure the file is a tab-separated export with a header row.".to_string(),
                "Rerun the ingest once the file carries every required column.".to_string(),
            ],
        )
        .with_data(json!({
            "file": location,
            "missing_columns": missing_columns,
            "actual_columns": actual_columns,
        }))
    }

    pub fn load_failed(
        chunk_index: usize,
        committed_chunks: usize,
        committed_rows: usize,
        detail: &str,
    ) -> Self {
        Self::new(
            "load_failed",
            &format!(
                "Chunk {chunk_index} failed to commit: {detail}. Chunks 0..{chunk_index} are committed; rows from {committed_rows} onward are not."
            ),
            vec![
                "Resolve the store error referenced in the details.".to_string(),
                format!("Resume from row {committed_rows} of this partition, or rerun with `--skip-existing`."),
            ],
        )
        .with_data(json!({
            "chunk_index": chunk_index,
            "committed_chunks": committed_chunks,
            "committed_rows": committed_rows,
            "first_uncommitted_row": committed_rows,
        }))
    }

    pub fn ticker_not_found(ticker: &str) -> Self {
        Self::new(
            "ticker_not_found",
            &format!("No insider transactions found for `{ticker}`."),
            vec![
                "Check the ticker symbol spelling.".to_string(),
                "Run `insider ingest <data-dir>` to load more filings.".to_string(),
            ],
        )
        .with_data(json!({ "ticker": ticker }))
    }

    pub fn price_history_failed(ticker: &str, detail: &str) -> Self {
        Self::new(
            "price_history_failed",
            &format!("Price history for `{ticker}` is unavailable: {detail}"),
            vec![
                "Retry once the price service is reachable.".to_string(),
                "Set `INSIDER_PRICE_TIMEOUT_SECS` higher if requests are timing out.".to_string(),
            ],
        )
        .with_data(json!({ "ticker": ticker }))
    }

    pub fn internal_serialization(message: &str) -> Self {
        Self::new("internal_serialization_error", message, Vec::new())
    }

    pub fn store_init_permission_denied(path: &Path, detail: &str) -> Self {
        let location = path.display().to_string();
        Self::new(
            "store_init_permission_denied",
            &format!("Cannot initialize store at `{location}`: {detail}"),
            vec![format!(
                "Grant write access to `{location}` or set `INSIDER_HOME` to a writable directory."
            )],
        )
    }

    pub fn store_locked(path: &Path) -> Self {
        let location = path.display().to_string();
        Self::new(
            "store_locked",
            &format!("Store database is locked at `{location}`."),
            vec![format!(
                "Close other processes using `{location}`; concurrent ingests against one store are not supported."
            )],
        )
    }

    pub fn store_corrupt(path: &Path) -> Self {
        let location = path.display().to_string();
        Self::new(
            "store_corrupt",
            &format!("Store database appears corrupt at `{location}`."),
            vec![format!(
                "Replace `{location}` with a valid SQLite file or restore from backup."
            )],
        )
    }

    pub fn migration_failed(path: &Path, detail: &str) -> Self {
        let location = path.display().to_string();
        Self::new(
            "migration_failed",
            &format!("Store migration failed at `{location}`: {detail}"),
            vec!["Resolve conflicting schema objects referenced in the error details.".to_string()],
        )
    }

    pub fn store_init_failed(path: &Path, detail: &str) -> Self {
        let location = path.display().to_string();
        Self::new(
            "store_init_failed",
            &format!("Store initialization failed at `{location}`: {detail}"),
            Vec::new(),
        )
    }

    pub fn is_internal(&self) -> bool {
        self.code.starts_with("internal_")
            || matches!(
                self.code.as_str(),
                "store_init_permission_denied"
                    | "store_locked"
                    | "store_corrupt"
                    | "migration_failed"
                    | "store_init_failed"
                    | "load_failed"
            )
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
