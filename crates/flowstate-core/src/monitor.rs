//! The per-tick monitoring pipeline.
//!
//! `Monitor` wires the score engine, idle detector, session tracker, and
//! break predictor together and runs them in a fixed order within each
//! tick, so every component sees a consistent snapshot of the sample and
//! the score derived from it. It carries no threads or timers: the caller
//! feeds one sample per second and the sample's timestamp is the tick's
//! wall-clock time.
//!
//! ## Wiring
//!
//! - An idle-start transition closes any open session. A suggestion that
//!   was still standing when the user went idle is recorded as followed;
//!   one that had been dismissed is recorded as not followed.
//! - A fresh break-suggestion edge marks the live session so its record
//!   carries the outcome at session end.

use chrono::{DateTime, Utc};

use crate::activity::ActivitySample;
use crate::events::Event;
use crate::idle::{IdleDetector, IdleTransition};
use crate::predictor::BreakPredictor;
use crate::score::ScoreEngine;
use crate::session::SessionTracker;
use crate::storage::{Config, SessionRecord, StoreHandle};

pub struct Monitor {
    score_engine: ScoreEngine,
    idle_detector: IdleDetector,
    session_tracker: SessionTracker,
    break_predictor: BreakPredictor,
    store: StoreHandle,
}

impl Monitor {
    pub fn new(store: StoreHandle, config: &Config) -> Self {
        Self {
            score_engine: ScoreEngine::new(),
            idle_detector: IdleDetector::new(&config.detection),
            session_tracker: SessionTracker::new(store.clone()),
            break_predictor: BreakPredictor::new(store.clone(), &config.prediction),
            store,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn current_score(&self) -> u8 {
        self.score_engine.current_score()
    }

    pub fn is_idle(&self) -> bool {
        self.idle_detector.is_idle()
    }

    pub fn is_in_session(&self) -> bool {
        self.session_tracker.is_in_session()
    }

    pub fn should_suggest_break(&self) -> bool {
        self.break_predictor.should_suggest_break()
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self, at: DateTime<Utc>) -> Event {
        Event::StateSnapshot {
            score: self.score_engine.current_score(),
            is_idle: self.idle_detector.is_idle(),
            is_in_session: self.session_tracker.is_in_session(),
            session_duration_secs: self.session_tracker.current_session_duration().num_milliseconds()
                as f64
                / 1000.0,
            session_average_score: self.session_tracker.current_session_average_score(),
            should_suggest_break: self.break_predictor.should_suggest_break(),
            predicted_optimal_secs: self.break_predictor.predicted_optimal_secs(),
            at,
        }
    }

    // ── Tick processing ──────────────────────────────────────────────

    /// Process one tick. Returns the events that fired, in order.
    pub fn process_sample(&mut self, sample: &ActivitySample) -> Vec<Event> {
        let now = sample.timestamp;
        let mut events = Vec::new();

        let score = self.score_engine.process_sample(sample);

        match self.idle_detector.update(score, now) {
            Some(IdleTransition::Started) => {
                events.push(Event::IdleStarted { at: now });
                if let Some(record) = self.close_session_on_idle(now) {
                    events.push(session_ended(&record, now));
                }
            }
            Some(IdleTransition::Ended) => events.push(Event::IdleEnded { at: now }),
            None => {}
        }

        if let Some(started) = self.session_tracker.update(score, sample, now) {
            events.push(started);
        }

        if self.session_tracker.is_in_session() {
            let trend = self.session_tracker.activity_trend();
            if let Some(probability) = self.break_predictor.update(
                self.session_tracker.current_session_duration(),
                self.session_tracker.current_session_average_score(),
                trend,
                now,
            ) {
                self.session_tracker.mark_break_suggested();
                events.push(Event::BreakSuggested {
                    probability,
                    at: now,
                });
            }
        }

        events
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Explicitly end the open session (e.g. on monitor shutdown).
    /// No-op when no session is active.
    pub fn end_session(
        &mut self,
        suggestion_followed: Option<bool>,
        now: DateTime<Utc>,
    ) -> Option<Event> {
        let record = self.session_tracker.end_session(suggestion_followed, now)?;
        self.finish_suggestion(&record);
        Some(session_ended(&record, now))
    }

    /// Clear the ambient idle cue after an external dismissal, without
    /// emitting an idle-end event or leaving stale timers behind.
    pub fn dismiss_idle_cue(&mut self) {
        self.idle_detector.reset();
    }

    pub fn dismiss_break_suggestion(&mut self) {
        self.break_predictor.dismiss_suggestion();
    }

    pub fn record_suggestion_outcome(&mut self, followed: bool) {
        self.break_predictor.record_outcome(followed);
    }

    /// Force buffered telemetry to disk.
    pub fn flush(&self) {
        self.store.flush();
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn close_session_on_idle(&mut self, now: DateTime<Utc>) -> Option<SessionRecord> {
        if !self.session_tracker.is_in_session() {
            return None;
        }
        // Going idle with a standing suggestion means the user took the
        // break; a dismissed suggestion means they worked past it.
        let followed = self
            .session_tracker
            .break_was_suggested()
            .then(|| self.break_predictor.should_suggest_break());
        let record = self.session_tracker.end_session(followed, now)?;
        self.finish_suggestion(&record);
        Some(record)
    }

    fn finish_suggestion(&mut self, record: &SessionRecord) {
        if record.break_was_suggested {
            self.break_predictor
                .record_outcome(record.suggestion_was_followed.unwrap_or(false));
        }
        self.break_predictor.dismiss_suggestion();
    }
}

fn session_ended(record: &SessionRecord, at: DateTime<Utc>) -> Event {
    Event::SessionEnded {
        id: record.id,
        duration_secs: record.duration_secs,
        average_focus_score: record.average_focus_score,
        peak_focus_score: record.peak_focus_score,
        at,
    }
}
