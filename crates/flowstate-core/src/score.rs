//! Focus score computation.
//!
//! Each sample yields an *instant* score from keystroke and mouse buckets.
//! The exposed score is smoothed with an exponential decay ratchet: it can
//! jump up instantly on renewed activity but only drains at ~2.3% per tick
//! without it, which damps noise from momentary pauses.

use crate::activity::ActivitySample;

const DECAY_FACTOR: f64 = 0.977;

/// Sample-to-score smoothing engine.
///
/// `previous` keeps sub-integer decay precision across ticks; `current`
/// is its rounded projection for display and downstream thresholds.
#[derive(Debug, Clone, Default)]
pub struct ScoreEngine {
    current: u8,
    previous: f64,
}

impl ScoreEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current smoothed score in 0..=100.
    pub fn current_score(&self) -> u8 {
        self.current
    }

    /// Process one sample and return the updated score.
    pub fn process_sample(&mut self, sample: &ActivitySample) -> u8 {
        let instant = f64::from(Self::instant_score(sample));
        let decayed = self.previous * DECAY_FACTOR;
        let new_score = instant.max(decayed);

        self.previous = new_score;
        self.current = new_score.round() as u8;
        self.current
    }

    /// Score derivable from a single sample alone, before smoothing.
    fn instant_score(sample: &ActivitySample) -> u8 {
        let keyboard: i32 = match sample.keystrokes {
            0 => 0,
            1..=3 => 30,
            4..=8 => 50,
            _ => 70,
        };

        let mouse_penalty: i32 = if sample.mouse_distance < 100.0 {
            0
        } else if sample.mouse_distance < 500.0 {
            -10
        } else {
            -20
        };

        // Typing without mouse movement reads as focused work.
        let idle_bonus: i32 = if sample.keystrokes > 0 && sample.mouse_distance < 100.0 {
            10
        } else {
            0
        };

        (keyboard + mouse_penalty + idle_bonus).clamp(0, 100) as u8
    }

    pub fn reset(&mut self) {
        self.current = 0;
        self.previous = 0.0;
    }
}
