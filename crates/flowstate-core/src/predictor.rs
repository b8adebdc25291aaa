//! Break prediction.
//!
//! A deterministic heuristic, not a statistical model: each evaluation
//! sums a duration factor, a declining-trend factor, and a low-score
//! factor into a probability, and suggests a break above 0.7. The
//! optimal session length it measures against is learned from recorded
//! history with a recency-weighted average.

use chrono::{DateTime, Duration, Utc};

use crate::storage::{PredictionConfig, SessionRecord, StoreHandle};

/// Minimum spacing between evaluations.
const PREDICTION_INTERVAL_SECS: i64 = 60;
/// Suggestion threshold on the summed probability.
const SUGGESTION_THRESHOLD: f64 = 0.7;
/// Natural-session duration bounds, exclusive.
const MIN_NATURAL_SECS: f64 = 10.0 * 60.0;
const MAX_NATURAL_SECS: f64 = 180.0 * 60.0;
/// Qualifying sessions required before the estimate moves.
const MIN_QUALIFYING_SESSIONS: usize = 3;
/// Most-recent sessions entering the weighted average.
const RECENCY_WINDOW: usize = 10;

pub struct BreakPredictor {
    store: StoreHandle,
    enabled: bool,
    predicted_optimal_secs: f64,
    last_prediction: Option<DateTime<Utc>>,
    should_suggest: bool,
}

impl BreakPredictor {
    pub fn new(store: StoreHandle, config: &PredictionConfig) -> Self {
        let mut predictor = Self {
            store,
            enabled: config.enabled,
            predicted_optimal_secs: config.default_session_length_min * 60.0,
            last_prediction: None,
            should_suggest: false,
        };
        predictor.relearn();
        predictor
    }

    pub fn should_suggest_break(&self) -> bool {
        self.should_suggest
    }

    /// Learned optimal session length, in seconds.
    pub fn predicted_optimal_secs(&self) -> f64 {
        self.predicted_optimal_secs
    }

    /// Re-evaluate against live session statistics. Throttled to one
    /// evaluation per minute; returns the probability only on the
    /// false-to-true edge of the suggestion state.
    pub fn update(
        &mut self,
        session_duration: Duration,
        average_score: f64,
        trend: f64,
        now: DateTime<Utc>,
    ) -> Option<f64> {
        if !self.enabled {
            self.should_suggest = false;
            return None;
        }

        if let Some(last) = self.last_prediction {
            if now - last < Duration::seconds(PREDICTION_INTERVAL_SECS) {
                return None;
            }
        }
        self.last_prediction = Some(now);

        let duration_secs = session_duration.num_milliseconds() as f64 / 1000.0;
        let probability = self.break_probability(duration_secs, average_score, trend);

        let previous = self.should_suggest;
        self.should_suggest = probability > SUGGESTION_THRESHOLD;

        (self.should_suggest && !previous).then_some(probability)
    }

    /// Clear the suggestion without touching the learned duration.
    pub fn dismiss_suggestion(&mut self) {
        self.should_suggest = false;
    }

    /// Record the outcome of a suggestion. The flag is not part of the
    /// weighting yet; any recorded outcome refreshes the estimate.
    pub fn record_outcome(&mut self, _followed: bool) {
        self.relearn();
    }

    fn break_probability(&self, duration_secs: f64, average_score: f64, trend: f64) -> f64 {
        let mut probability = 0.0;

        let ratio = duration_secs / self.predicted_optimal_secs;
        if ratio > 1.0 {
            probability += f64::min(0.5, (ratio - 1.0) * 0.5);
        } else if ratio > 0.8 {
            probability += (ratio - 0.8) * 0.25;
        }

        if trend < -10.0 {
            probability += 0.3;
        } else if trend < -5.0 {
            probability += 0.15;
        }

        if average_score < 40.0 {
            probability += 0.2;
        }

        probability.clamp(0.0, 1.0)
    }

    /// Re-derive the optimal session length from history.
    ///
    /// Only "natural" sessions count: organic length, and not powered
    /// through against a suggestion. Fewer than three qualifying
    /// sessions keeps the prior estimate.
    fn relearn(&mut self) {
        let sessions = self.store.all_sessions();
        let mut natural: Vec<&SessionRecord> = sessions
            .iter()
            .filter(|s| {
                s.duration_secs > MIN_NATURAL_SECS
                    && s.duration_secs < MAX_NATURAL_SECS
                    && s.suggestion_was_followed.unwrap_or(true)
            })
            .collect();

        if natural.len() < MIN_QUALIFYING_SESSIONS {
            return;
        }

        natural.sort_by(|a, b| b.started_at.cmp(&a.started_at));

        let mut weighted_sum = 0.0;
        let mut weight_sum = 0.0;
        for (index, session) in natural.iter().take(RECENCY_WINDOW).enumerate() {
            let weight = 1.0 / (index as f64 + 1.0);
            weighted_sum += session.duration_secs * weight;
            weight_sum += weight;
        }

        if weight_sum > 0.0 {
            self.predicted_optimal_secs = weighted_sum / weight_sum;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{HistoryStore, PredictionConfig};
    use uuid::Uuid;

    fn ts(offset_secs: i64) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-02T09:00:00Z").unwrap().with_timezone(&Utc)
            + Duration::seconds(offset_secs)
    }

    fn record(
        started_at: DateTime<Utc>,
        duration_secs: f64,
        suggestion_was_followed: Option<bool>,
    ) -> SessionRecord {
        SessionRecord {
            id: Uuid::new_v4(),
            started_at,
            ended_at: started_at + Duration::seconds(duration_secs as i64),
            duration_secs,
            average_focus_score: 60.0,
            peak_focus_score: 90,
            activity_trend: 0.0,
            hour_of_day: 9,
            day_of_week: 2,
            break_was_suggested: suggestion_was_followed.is_some(),
            suggestion_was_followed,
        }
    }

    fn empty_store() -> StoreHandle {
        StoreHandle::new(HistoryStore::open_memory().unwrap())
    }

    fn predictor_with(store: StoreHandle) -> BreakPredictor {
        BreakPredictor::new(store, &PredictionConfig::default())
    }

    #[test]
    fn defaults_to_configured_session_length() {
        let predictor = predictor_with(empty_store());
        assert_eq!(predictor.predicted_optimal_secs(), 50.0 * 60.0);
    }

    #[test]
    fn slightly_overlong_session_stays_below_threshold() {
        let mut predictor = predictor_with(empty_store());
        // 3100s vs 3000s optimal: duration factor ~0.017, trend 0.3,
        // low score 0.2 -- totals ~0.52, no suggestion.
        predictor.predicted_optimal_secs = 3000.0;
        let fired = predictor.update(Duration::seconds(3100), 35.0, -12.0, ts(0));
        assert_eq!(fired, None);
        assert!(!predictor.should_suggest_break());
    }

    #[test]
    fn overlong_flagging_session_triggers_suggestion_once() {
        let mut predictor = predictor_with(empty_store());
        predictor.predicted_optimal_secs = 3000.0;
        // r > 2 caps the duration factor at 0.5; with trend and score
        // factors the sum clamps to 1.0.
        let fired = predictor.update(Duration::seconds(6100), 35.0, -12.0, ts(0));
        assert_eq!(fired, Some(1.0));
        assert!(predictor.should_suggest_break());

        // Level-holding, not edge: next evaluation stays quiet.
        let again = predictor.update(Duration::seconds(6200), 35.0, -12.0, ts(70));
        assert_eq!(again, None);
        assert!(predictor.should_suggest_break());
    }

    #[test]
    fn evaluations_are_throttled_to_one_per_minute() {
        let mut predictor = predictor_with(empty_store());
        predictor.predicted_optimal_secs = 3000.0;
        assert!(predictor.update(Duration::seconds(6100), 35.0, -12.0, ts(0)).is_some());
        predictor.dismiss_suggestion();
        // 30s later: inside the throttle window, state untouched.
        assert!(predictor.update(Duration::seconds(6200), 35.0, -12.0, ts(30)).is_none());
        assert!(!predictor.should_suggest_break());
        // 60s later: evaluated again, fires on the fresh edge.
        assert!(predictor.update(Duration::seconds(6200), 35.0, -12.0, ts(60)).is_some());
    }

    #[test]
    fn disabled_predictor_never_suggests() {
        let mut predictor = BreakPredictor::new(
            empty_store(),
            &PredictionConfig {
                enabled: false,
                default_session_length_min: 50.0,
            },
        );
        let fired = predictor.update(Duration::seconds(20_000), 10.0, -20.0, ts(0));
        assert_eq!(fired, None);
        assert!(!predictor.should_suggest_break());
    }

    #[test]
    fn learning_matches_harmonic_weighted_average() {
        let store = empty_store();
        // Most recent first: 3000, 3200, 2800, 3100, 2900.
        let durations = [3000.0, 3200.0, 2800.0, 3100.0, 2900.0];
        for (i, d) in durations.iter().enumerate() {
            let rec = record(ts(-(i as i64) * 3600), *d, None);
            let handle = store.clone();
            handle.add_session(&rec);
        }

        let predictor = predictor_with(store);
        let expected: f64 = durations
            .iter()
            .enumerate()
            .map(|(k, d)| d / (k as f64 + 1.0))
            .sum::<f64>()
            / (0..durations.len()).map(|k| 1.0 / (k as f64 + 1.0)).sum::<f64>();
        assert_eq!(predictor.predicted_optimal_secs(), expected);
    }

    #[test]
    fn too_little_history_keeps_prior_estimate() {
        let store = empty_store();
        store.add_session(&record(ts(0), 3000.0, None));
        store.add_session(&record(ts(3600), 3200.0, None));

        let predictor = predictor_with(store);
        assert_eq!(predictor.predicted_optimal_secs(), 50.0 * 60.0);
    }

    #[test]
    fn unnatural_sessions_are_excluded_from_learning() {
        let store = empty_store();
        // Too short, too long, and powered-through-despite-suggestion.
        store.add_session(&record(ts(0), 300.0, None));
        store.add_session(&record(ts(100), 11_000.0, None));
        store.add_session(&record(ts(200), 3000.0, Some(false)));
        // Three qualifying naturals, including a followed suggestion.
        store.add_session(&record(ts(300), 2400.0, None));
        store.add_session(&record(ts(400), 2400.0, Some(true)));
        store.add_session(&record(ts(500), 2400.0, None));

        let predictor = predictor_with(store);
        assert!((predictor.predicted_optimal_secs() - 2400.0).abs() < 1e-9);
    }

    #[test]
    fn record_outcome_triggers_relearn_regardless_of_flag() {
        let store = empty_store();
        let mut predictor = predictor_with(store.clone());
        assert_eq!(predictor.predicted_optimal_secs(), 3000.0);

        for i in 0..3 {
            store.add_session(&record(ts(i * 3600), 1200.0, None));
        }
        predictor.record_outcome(false);
        assert!((predictor.predicted_optimal_secs() - 1200.0).abs() < 1e-9);
    }
}
