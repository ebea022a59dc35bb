use insider_client::commands;
use insider_client::{ClientResult, SuccessEnvelope};

use crate::cli::{Cli, Commands};

pub fn dispatch(cli: &Cli) -> ClientResult<SuccessEnvelope> {
    match &cli.command {
        Commands::Ingest {
            data_dir,
            batch_size,
            skip_existing,
            json: _,
        } => commands::ingest::run(data_dir.clone(), *batch_size, *skip_existing),
        Commands::Transactions { ticker, raw, .. } => {
            commands::transactions::list(ticker.clone(), *raw)
        }
        Commands::Prices { ticker, from, to, .. } => {
            commands::prices::history(ticker.clone(), *from, *to)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::cli::parse_from;

    use super::dispatch;

    #[test]
    fn inverted_price_range_fails_before_any_request() {
        let parsed = parse_from([
            "insider",
            "prices",
            "AAPL",
            "--from",
            "2021-01-10",
            "--to",
            "2021-01-01",
        ]);
        assert!(parsed.is_ok());
        if let Ok(cli) = parsed {
            let result = dispatch(&cli);
            assert!(matches!(result, Err(error) if error.code == "invalid_argument"));
        }
    }
}
