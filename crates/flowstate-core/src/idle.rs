//! Idle detection over the score stream.
//!
//! A hysteresis state machine: it takes `idle_trigger_secs` below the
//! threshold to declare idle but only `recovery_secs` above it to declare
//! recovered. The asymmetric band prevents flapping when the score
//! oscillates near the boundary.
//!
//! ## State Transitions
//!
//! ```text
//! Active -> PendingIdle(since) -> Idle -> PendingActive(since) -> Active
//! ```

use chrono::{DateTime, Duration, Utc};

use crate::storage::DetectionConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DetectorState {
    Active,
    /// Below threshold, idle not yet declared.
    PendingIdle(DateTime<Utc>),
    Idle,
    /// Above threshold while idle, recovery not yet declared.
    PendingActive(DateTime<Utc>),
}

/// Edge emitted by [`IdleDetector::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleTransition {
    Started,
    Ended,
}

#[derive(Debug, Clone)]
pub struct IdleDetector {
    state: DetectorState,
    low_threshold: u8,
    trigger_duration: Duration,
    recovery_duration: Duration,
}

impl IdleDetector {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            state: DetectorState::Active,
            low_threshold: config.idle_threshold,
            trigger_duration: secs_f64(config.idle_trigger_secs),
            recovery_duration: secs_f64(config.recovery_secs),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(
            self.state,
            DetectorState::Idle | DetectorState::PendingActive(_)
        )
    }

    /// Evaluate one tick. Returns the transition exactly on the edge.
    pub fn update(&mut self, score: u8, now: DateTime<Utc>) -> Option<IdleTransition> {
        if score < self.low_threshold {
            match self.state {
                DetectorState::Active => {
                    self.state = DetectorState::PendingIdle(now);
                    None
                }
                DetectorState::PendingIdle(since) => {
                    if now - since >= self.trigger_duration {
                        self.state = DetectorState::Idle;
                        Some(IdleTransition::Started)
                    } else {
                        None
                    }
                }
                DetectorState::Idle => None,
                // A spike above threshold shorter than the recovery window
                // does not clear an established idle state.
                DetectorState::PendingActive(_) => {
                    self.state = DetectorState::Idle;
                    None
                }
            }
        } else {
            match self.state {
                DetectorState::Active => None,
                DetectorState::PendingIdle(_) => {
                    self.state = DetectorState::Active;
                    None
                }
                DetectorState::Idle => {
                    self.state = DetectorState::PendingActive(now);
                    None
                }
                DetectorState::PendingActive(since) => {
                    if now - since >= self.recovery_duration {
                        self.state = DetectorState::Active;
                        Some(IdleTransition::Ended)
                    } else {
                        None
                    }
                }
            }
        }
    }

    /// Force the detector back to `Active` without emitting an end
    /// transition. Used when an idle cue is externally dismissed, so
    /// stale timers cannot re-trigger immediately.
    pub fn reset(&mut self) {
        self.state = DetectorState::Active;
    }
}

fn secs_f64(secs: f64) -> Duration {
    Duration::milliseconds((secs * 1000.0) as i64)
}
