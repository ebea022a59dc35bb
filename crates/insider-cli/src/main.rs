mod cli;
mod dispatch;
mod output;
mod stdout_io;

use std::process::ExitCode;

use clap::{Parser, error::ErrorKind};
use insider_client::ClientError;
use stdout_io::write_stdout_text;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "INSIDER_LOG";
const DEFAULT_LOG_FILTER: &str = "warn";

const ROOT_HELP: &str = "Insider - SEC insider transaction ledger

Usage:
  insider <command>

Start here:
  insider ingest --help
  insider transactions <TICKER>
";

const TOP_LEVEL_HELP: &str = "Insider - SEC insider transaction ledger

USAGE: insider <command>

Load filings:
  insider ingest <DATA_DIR>                        Load numbered filing drops into the store
  insider ingest <DATA_DIR> --skip-existing        Resume a failed run without duplicates

Read the ledger:
  insider transactions <TICKER>                    Transactions with split-adjusted prices
  insider transactions <TICKER> --raw              Transactions with stored prices

Price history:
  insider prices <TICKER> --from <DATE> [--to <DATE>]

Every command accepts --json for machine-readable output.

Environment:
  INSIDER_HOME                 Store directory (default ~/.insider)
  INSIDER_BATCH_SIZE           Rows per committed chunk (default 10000)
  INSIDER_PRICE_API_URL        Chart endpoint for daily price history
  INSIDER_PRICE_TIMEOUT_SECS   Price request timeout (default 10)
  INSIDER_LOG                  Log filter written to stderr (default warn)
";

fn main() -> ExitCode {
    init_tracing();
    match run() {
        Ok(code) => code,
        Err(code) => code,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run() -> Result<ExitCode, ExitCode> {
    let raw_args = std::env::args().collect::<Vec<String>>();
    if raw_args.len() == 1 {
        if write_stdout_text(ROOT_HELP).is_err() {
            return Err(ExitCode::from(2));
        }
        return Ok(ExitCode::SUCCESS);
    }
    let cli = match cli::Cli::try_parse() {
        Ok(value) => value,
        Err(err) => return handle_parse_error(&err, &raw_args),
    };
    let mode = output::mode_for_command(&cli.command);
    tracing::debug!(?cli, "dispatching command");

    match dispatch::dispatch(&cli) {
        Ok(success) => {
            if output::print_success(&success, mode).is_err() {
                return Err(ExitCode::from(2));
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(error) => {
            if output::print_failure(&error, mode).is_err() {
                return Err(ExitCode::from(2));
            }
            Err(exit_code_for_error(&error))
        }
    }
}

fn handle_parse_error(err: &clap::Error, raw_args: &[String]) -> Result<ExitCode, ExitCode> {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
            let text = if is_top_level_help_request(raw_args) {
                TOP_LEVEL_HELP.to_string()
            } else {
                err.to_string()
            };
            if write_stdout_text(&text).is_err() {
                return Err(ExitCode::from(2));
            }
            Ok(ExitCode::SUCCESS)
        }
        ErrorKind::DisplayVersion => {
            if write_stdout_text(&err.to_string()).is_err() {
                return Err(ExitCode::from(2));
            }
            Ok(ExitCode::SUCCESS)
        }
        _ => {
            let clean_message = strip_clap_boilerplate(&err.to_string());
            let parse_error = ClientError::invalid_argument_for_command(
                &clean_message,
                command_path_from_args(raw_args).as_deref(),
            );
            let mode = infer_requested_output_mode(raw_args);
            if output::print_failure(&parse_error, mode).is_err() {
                return Err(ExitCode::from(2));
            }
            Err(ExitCode::from(1))
        }
    }
}

fn is_top_level_help_request(raw_args: &[String]) -> bool {
    raw_args.len() == 2 && matches!(raw_args[1].as_str(), "--help" | "-h")
}

/// Drops clap's trailing usage and "For more information" lines.
fn strip_clap_boilerplate(message: &str) -> String {
    let trimmed = if let Some(pos) = message.find("\n\nUsage:") {
        &message[..pos]
    } else if let Some(pos) = message.find("\nFor more information") {
        &message[..pos]
    } else {
        message
    };
    trimmed
        .trim_start_matches("error: ")
        .trim_end()
        .to_string()
}

/// First positional argument when it names a known subcommand.
fn command_path_from_args(raw_args: &[String]) -> Option<String> {
    raw_args
        .iter()
        .skip(1)
        .find(|value| !value.starts_with('-'))
        .filter(|value| matches!(value.as_str(), "ingest" | "transactions" | "prices"))
        .cloned()
}

fn exit_code_for_error(error: &ClientError) -> ExitCode {
    if error.is_internal() {
        ExitCode::from(2)
    } else {
        ExitCode::from(1)
    }
}

fn infer_requested_output_mode(raw_args: &[String]) -> output::OutputMode {
    if raw_args.iter().skip(1).any(|value| value == "--json") {
        return output::OutputMode::Json;
    }
    output::OutputMode::Text
}
