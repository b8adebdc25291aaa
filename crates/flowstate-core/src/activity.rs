//! Raw activity samples delivered by an input-capture collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One second of raw input activity.
///
/// Produced outside the core, once per tick. Immutable; the timestamp is
/// the tick's wall-clock time and drives all temporal logic downstream.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ActivitySample {
    /// Keys pressed during the tick.
    pub keystrokes: u32,
    /// Mouse travel during the tick, in pixels.
    pub mouse_distance: f64,
    pub timestamp: DateTime<Utc>,
}

impl ActivitySample {
    pub fn new(keystrokes: u32, mouse_distance: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            keystrokes,
            mouse_distance,
            timestamp,
        }
    }
}
