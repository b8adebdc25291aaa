//! # FlowState Core Library
//!
//! This library converts raw input-activity samples (keystroke counts and
//! mouse travel, one sample per second) into a bounded focus score, detects
//! sustained low-focus periods, tracks discrete focus sessions, and suggests
//! breaks based on learned session history.
//!
//! ## Architecture
//!
//! - **Score Engine**: exponential-decay smoothing over per-sample instant
//!   scores; the score jumps up on activity and drains slowly without it
//! - **Idle Detector**: hysteresis state machine over the score stream
//! - **Session Tracker**: detects sustained focus, records completed
//!   sessions to the history store
//! - **Break Predictor**: heuristic break suggestions, with an optimal
//!   session length learned from recorded history
//! - **History Store**: SQLite-backed sample and session persistence
//!
//! The components carry no internal threads or timers. The caller feeds one
//! [`ActivitySample`] per tick into [`Monitor::process_sample`]; all time is
//! taken from sample timestamps, so replays and tests are deterministic.
//!
//! ## Key Components
//!
//! - [`Monitor`]: the per-tick pipeline wiring all four components
//! - [`ScoreEngine`]: sample-to-score smoothing model
//! - [`HistoryStore`]: sample and session persistence
//! - [`Config`]: application configuration management

pub mod activity;
pub mod error;
pub mod events;
pub mod export;
pub mod idle;
pub mod monitor;
pub mod predictor;
pub mod score;
pub mod session;
pub mod storage;

pub use activity::ActivitySample;
pub use error::{ConfigError, CoreError, StoreError};
pub use events::Event;
pub use idle::{IdleDetector, IdleTransition};
pub use monitor::Monitor;
pub use predictor::BreakPredictor;
pub use score::ScoreEngine;
pub use session::SessionTracker;
pub use storage::{
    Config, DailyFocus, HistoryStore, SessionRecord, StoreHandle, StoredActivitySample, TotalStats,
};
