use std::path::PathBuf;

use chrono::Utc;
use clap::{Subcommand, ValueEnum};
use flowstate_core::export;
use flowstate_core::storage::HistoryStore;

#[derive(Subcommand)]
pub enum SessionsAction {
    /// Print recorded sessions as JSON
    List {
        /// Only sessions started today (UTC)
        #[arg(long)]
        today: bool,
    },
    /// Export the full session history
    Export {
        #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,
        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ExportFormat {
    Csv,
    Json,
}

pub fn run(action: SessionsAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = HistoryStore::open_default()?;

    match action {
        SessionsAction::List { today } => {
            let sessions = if today {
                store.sessions_today(Utc::now())?
            } else {
                store.all_sessions()?
            };
            println!("{}", serde_json::to_string_pretty(&sessions)?);
        }
        SessionsAction::Export { format, out } => {
            let sessions = store.all_sessions()?;
            let rendered = match format {
                ExportFormat::Csv => export::sessions_to_csv(&sessions),
                ExportFormat::Json => export::sessions_to_json(&sessions)?,
            };
            match out {
                Some(path) => std::fs::write(path, rendered)?,
                None => print!("{rendered}"),
            }
        }
    }
    Ok(())
}
