//! Events emitted by the monitoring pipeline.
//!
//! Transitions are edge-triggered: an event fires once on the state
//! change, never on every tick the state holds. Consumers (menu bar,
//! overlay, CLI) poll or subscribe; the core never renders anything.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// Sustained low focus; consumers show the ambient cue.
    IdleStarted { at: DateTime<Utc> },
    /// Focus recovered; consumers hide the ambient cue.
    IdleEnded { at: DateTime<Utc> },
    /// A focus session was recognized. `started_at` is the original
    /// threshold-crossing time and precedes the detection tick.
    SessionStarted {
        started_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    SessionEnded {
        id: Uuid,
        duration_secs: f64,
        average_focus_score: f64,
        peak_focus_score: u8,
        at: DateTime<Utc>,
    },
    BreakSuggested {
        probability: f64,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        score: u8,
        is_idle: bool,
        is_in_session: bool,
        session_duration_secs: f64,
        session_average_score: f64,
        should_suggest_break: bool,
        predicted_optimal_secs: f64,
        at: DateTime<Utc>,
    },
}
