use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use clap::Subcommand;
use flowstate_core::storage::{Config, HistoryStore, StoreHandle};
use flowstate_core::{ActivitySample, Monitor};
use tracing::warn;

#[derive(Subcommand)]
pub enum MonitorAction {
    /// Replay an activity script deterministically and print the events.
    ///
    /// The script holds one tick per line: `<keystrokes> <mouse_distance>`.
    /// Blank lines and lines starting with '#' are skipped.
    Replay {
        file: PathBuf,
        /// Timestamp of the first tick (RFC 3339). Defaults to now.
        #[arg(long)]
        start: Option<DateTime<Utc>>,
    },
    /// Run live: read one `<keystrokes> <mouse_distance>` line per tick
    /// from stdin, stamped with wall-clock time. Ctrl-C ends an open
    /// session and flushes the store.
    Run,
}

pub fn run(action: MonitorAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        MonitorAction::Replay { file, start } => replay(&file, start),
        MonitorAction::Run => run_live(),
    }
}

fn open_monitor() -> Result<Monitor, Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let store = StoreHandle::new(HistoryStore::open_default()?);
    Ok(Monitor::new(store, &config))
}

fn replay(
    file: &std::path::Path,
    start: Option<DateTime<Utc>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut monitor = open_monitor()?;
    let script = std::fs::read_to_string(file)?;
    let start = start.unwrap_or_else(Utc::now);

    let mut tick: i64 = 0;
    for (line_no, line) in script.lines().enumerate() {
        let Some((keystrokes, mouse_distance)) = parse_tick(line) else {
            if !skippable(line) {
                return Err(format!("{}:{}: malformed tick line", file.display(), line_no + 1).into());
            }
            continue;
        };
        let at = start + Duration::seconds(tick);
        let sample = ActivitySample::new(keystrokes, mouse_distance, at);
        for event in monitor.process_sample(&sample) {
            println!("{}", serde_json::to_string(&event)?);
        }
        tick += 1;
    }

    let last = start + Duration::seconds(tick.saturating_sub(1).max(0));
    if let Some(event) = monitor.end_session(None, last) {
        println!("{}", serde_json::to_string(&event)?);
    }
    monitor.flush();
    println!("{}", serde_json::to_string_pretty(&monitor.snapshot(last))?);
    Ok(())
}

fn run_live() -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(live_loop())
}

async fn live_loop() -> Result<(), Box<dyn std::error::Error>> {
    use tokio::io::AsyncBufReadExt;

    let mut monitor = open_monitor()?;
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let Some((keystrokes, mouse_distance)) = parse_tick(&line) else {
                    if !skippable(&line) {
                        warn!(%line, "skipping malformed tick line");
                    }
                    continue;
                };
                let sample = ActivitySample::new(keystrokes, mouse_distance, Utc::now());
                for event in monitor.process_sample(&sample) {
                    println!("{}", serde_json::to_string(&event)?);
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    // An open session survives monitor stop only if left unended; close
    // it explicitly so the record lands in history.
    if let Some(event) = monitor.end_session(None, Utc::now()) {
        println!("{}", serde_json::to_string(&event)?);
    }
    monitor.flush();
    Ok(())
}

fn parse_tick(line: &str) -> Option<(u32, f64)> {
    let mut parts = line.split_whitespace();
    let keystrokes = parts.next()?.parse().ok()?;
    let mouse_distance: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || mouse_distance < 0.0 {
        return None;
    }
    Some((keystrokes, mouse_distance))
}

fn skippable(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}
