//! Focus session lifecycle tracking.
//!
//! A session starts after the score holds at or above the focus threshold
//! for 30 contiguous seconds, anchored at the original crossing time so
//! the recorded start captures the true onset of focused work. Every tick
//! is also forwarded to the history store as raw telemetry, in or out of
//! session.

use chrono::{DateTime, Datelike, Duration, Local, Timelike, Utc};
use tracing::warn;
use uuid::Uuid;

use crate::activity::ActivitySample;
use crate::events::Event;
use crate::storage::{SessionRecord, StoreHandle, StoredActivitySample};

/// Score required to count a tick toward session start.
const FOCUS_THRESHOLD: u8 = 50;
/// Contiguous above-threshold seconds required before a session starts.
const SESSION_START_SECS: i64 = 30;
/// Below this many in-session samples a trend is meaningless.
const TREND_MIN_SAMPLES: usize = 4;

#[derive(Debug)]
struct LiveSession {
    started_at: DateTime<Utc>,
    samples: Vec<(u8, DateTime<Utc>)>,
    break_suggested: bool,
}

pub struct SessionTracker {
    store: StoreHandle,
    live: Option<LiveSession>,
    above_since: Option<DateTime<Utc>>,
    current_duration: Duration,
    current_average_score: f64,
}

impl SessionTracker {
    pub fn new(store: StoreHandle) -> Self {
        Self {
            store,
            live: None,
            above_since: None,
            current_duration: Duration::zero(),
            current_average_score: 0.0,
        }
    }

    pub fn is_in_session(&self) -> bool {
        self.live.is_some()
    }

    pub fn current_session_duration(&self) -> Duration {
        self.current_duration
    }

    pub fn current_session_average_score(&self) -> f64 {
        self.current_average_score
    }

    /// Whether a break was suggested during the live session.
    pub fn break_was_suggested(&self) -> bool {
        self.live.as_ref().is_some_and(|l| l.break_suggested)
    }

    /// Process one tick. Returns `SessionStarted` on the tick a session
    /// is recognized.
    pub fn update(
        &mut self,
        score: u8,
        sample: &ActivitySample,
        now: DateTime<Utc>,
    ) -> Option<Event> {
        // Raw telemetry feed, independent of session state.
        self.store.add_sample(StoredActivitySample {
            timestamp: sample.timestamp,
            keystrokes: sample.keystrokes,
            mouse_distance: sample.mouse_distance,
            focus_score: score,
        });

        if let Some(live) = &mut self.live {
            live.samples.push((score, now));
            self.current_duration = now - live.started_at;
            self.current_average_score = mean_score(&live.samples);
            None
        } else if score >= FOCUS_THRESHOLD {
            let since = *self.above_since.get_or_insert(now);
            if now - since >= Duration::seconds(SESSION_START_SECS) {
                self.start_session(since);
                Some(Event::SessionStarted {
                    started_at: since,
                    at: now,
                })
            } else {
                None
            }
        } else {
            // Strict contiguity: any dip below threshold resets the timer.
            self.above_since = None;
            None
        }
    }

    pub fn mark_break_suggested(&mut self) {
        if let Some(live) = &mut self.live {
            live.break_suggested = true;
        }
    }

    /// Mean of the last quarter of in-session scores minus the mean of
    /// the first quarter. Zero below [`TREND_MIN_SAMPLES`] samples.
    pub fn activity_trend(&self) -> f64 {
        self.live
            .as_ref()
            .map_or(0.0, |live| trend_of(&live.samples))
    }

    /// End the live session, persist its record, and reset all session
    /// state including the start timer. No-op when no session is active.
    /// A record must have a positive duration; an end time at or before
    /// the session start discards the session instead of persisting it.
    pub fn end_session(
        &mut self,
        suggestion_followed: Option<bool>,
        now: DateTime<Utc>,
    ) -> Option<SessionRecord> {
        let live = self.live.take()?;

        let duration = now - live.started_at;
        if duration <= Duration::zero() {
            warn!(started_at = %live.started_at, ended_at = %now, "discarding session with non-positive duration");
            self.above_since = None;
            self.current_duration = Duration::zero();
            self.current_average_score = 0.0;
            return None;
        }
        let peak = live.samples.iter().map(|&(s, _)| s).max().unwrap_or(0);
        let local_start = live.started_at.with_timezone(&Local);

        let record = SessionRecord {
            id: Uuid::new_v4(),
            started_at: live.started_at,
            ended_at: now,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            average_focus_score: mean_score(&live.samples),
            peak_focus_score: peak,
            activity_trend: trend_of(&live.samples),
            hour_of_day: local_start.hour(),
            day_of_week: local_start.weekday().num_days_from_sunday() + 1,
            break_was_suggested: live.break_suggested,
            suggestion_was_followed: suggestion_followed,
        };
        self.store.add_session(&record);

        self.above_since = None;
        self.current_duration = Duration::zero();
        self.current_average_score = 0.0;
        Some(record)
    }

    fn start_session(&mut self, at: DateTime<Utc>) {
        self.live = Some(LiveSession {
            started_at: at,
            samples: Vec::new(),
            break_suggested: false,
        });
        self.above_since = None;
        self.current_duration = Duration::zero();
        self.current_average_score = 0.0;
    }
}

fn mean_score(samples: &[(u8, DateTime<Utc>)]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: u32 = samples.iter().map(|&(s, _)| u32::from(s)).sum();
    f64::from(sum) / samples.len() as f64
}

fn trend_of(samples: &[(u8, DateTime<Utc>)]) -> f64 {
    if samples.len() < TREND_MIN_SAMPLES {
        return 0.0;
    }
    let quarter = samples.len() / 4;
    let first = &samples[..quarter];
    let last = &samples[samples.len() - quarter..];
    mean_score(last) - mean_score(first)
}
