use crate::cli::Commands;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum OutputMode {
    Text,
    Json,
}

pub fn mode_for_command(command: &Commands) -> OutputMode {
    let json = match command {
        Commands::Ingest { json, .. }
        | Commands::Transactions { json, .. }
        | Commands::Prices { json, .. } => *json,
    };
    if json {
        OutputMode::Json
    } else {
        OutputMode::Text
    }
}
