use chrono::Utc;
use clap::Subcommand;
use flowstate_core::storage::{HistoryStore, SessionRecord};
use serde::Serialize;

#[derive(Subcommand)]
pub enum StatsAction {
    /// Focus summary for the current calendar day (UTC)
    Today,
    /// Focus summary for the current week, Monday onward (UTC)
    Week,
    /// All-time totals
    All,
    /// Per-day focus minutes over a trailing window
    Daily {
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
}

#[derive(Serialize)]
struct PeriodSummary {
    sessions: usize,
    focus_minutes: f64,
    average_score: f64,
    peak_score: u8,
}

impl PeriodSummary {
    fn of(sessions: &[SessionRecord]) -> Self {
        let focus_minutes = sessions.iter().map(|s| s.duration_secs).sum::<f64>() / 60.0;
        let average_score = if sessions.is_empty() {
            0.0
        } else {
            sessions.iter().map(|s| s.average_focus_score).sum::<f64>() / sessions.len() as f64
        };
        let peak_score = sessions.iter().map(|s| s.peak_focus_score).max().unwrap_or(0);
        Self {
            sessions: sessions.len(),
            focus_minutes,
            average_score,
            peak_score,
        }
    }
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = HistoryStore::open_default()?;
    let now = Utc::now();

    let rendered = match action {
        StatsAction::Today => {
            serde_json::to_string_pretty(&PeriodSummary::of(&store.sessions_today(now)?))?
        }
        StatsAction::Week => {
            serde_json::to_string_pretty(&PeriodSummary::of(&store.sessions_this_week(now)?))?
        }
        StatsAction::All => serde_json::to_string_pretty(&store.total_stats()?)?,
        StatsAction::Daily { days } => {
            serde_json::to_string_pretty(&store.daily_focus_time(days, now)?)?
        }
    };
    println!("{rendered}");
    Ok(())
}
