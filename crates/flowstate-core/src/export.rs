//! Session export surfaces.
//!
//! Consumer-facing serialization of recorded sessions: a delimited
//! tabular form (CSV) and a structured document form (JSON), both
//! carrying exactly the `SessionRecord` fields.

use crate::storage::SessionRecord;

const CSV_HEADER: &str = "id,start_time,end_time,duration_minutes,avg_focus_score,\
peak_focus_score,activity_trend,hour_of_day,day_of_week,break_suggested,suggestion_followed";

/// Render sessions as CSV, header first. A null suggestion outcome is an
/// empty cell.
pub fn sessions_to_csv(sessions: &[SessionRecord]) -> String {
    let mut csv = String::from(CSV_HEADER);
    csv.push('\n');

    for session in sessions {
        let followed = session
            .suggestion_was_followed
            .map(|b| b.to_string())
            .unwrap_or_default();
        let line = format!(
            "{},{},{},{:.1},{:.1},{},{:.2},{},{},{},{}",
            session.id,
            session.started_at.to_rfc3339(),
            session.ended_at.to_rfc3339(),
            session.duration_secs / 60.0,
            session.average_focus_score,
            session.peak_focus_score,
            session.activity_trend,
            session.hour_of_day,
            session.day_of_week,
            session.break_was_suggested,
            followed,
        );
        csv.push_str(&line);
        csv.push('\n');
    }
    csv
}

/// Render sessions as pretty-printed JSON.
///
/// # Errors
/// Returns an error if serialization fails.
pub fn sessions_to_json(sessions: &[SessionRecord]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(sessions)
}
