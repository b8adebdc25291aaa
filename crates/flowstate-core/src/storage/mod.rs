mod config;
pub mod history;

pub use config::{Config, DetectionConfig, PredictionConfig};
pub use history::{
    DailyFocus, HistoryStore, SessionRecord, StoreHandle, StoredActivitySample, TotalStats,
};

use std::path::PathBuf;

use crate::error::CoreError;

/// Returns `~/.config/flowstate[-dev]/` based on FLOWSTATE_ENV.
///
/// Set FLOWSTATE_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, CoreError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("FLOWSTATE_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("flowstate-dev")
    } else {
        base_dir.join("flowstate")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
