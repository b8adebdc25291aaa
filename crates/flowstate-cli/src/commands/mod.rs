pub mod config;
pub mod monitor;
pub mod sessions;
pub mod stats;
