//! Model run identifiers and forecast hour lists.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Timelike, Utc};

/// Publication cycles of the model, newest hour first.
pub const CYCLES: [u32; 8] = [21, 18, 15, 12, 9, 6, 3, 0];

/// Format used for run identifiers.
pub const RUN_FORMAT: &str = "%Y-%m-%dT%H:00:00Z";

/// Format a run instant as `YYYY-MM-DDTHH:00:00Z`.
pub fn format_run(instant: DateTime<Utc>) -> String {
    instant.format(RUN_FORMAT).to_string()
}

/// Parse a run identifier back into its instant.
pub fn parse_run(run: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(run, "%Y-%m-%dT%H:%M:%SZ")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Candidate runs, newest first.
///
/// Today's cycles at or before the current hour, followed by every
/// cycle of the previous day.
pub fn candidate_runs(now: DateTime<Utc>) -> Vec<String> {
    let today = now.date_naive();
    let yesterday = today - Duration::days(1);

    let mut runs = Vec::with_capacity(CYCLES.len() * 2);
    for cycle in CYCLES.iter().filter(|c| **c <= now.hour()) {
        if let Some(instant) = today.and_hms_opt(*cycle, 0, 0) {
            runs.push(format_run(Utc.from_utc_datetime(&instant)));
        }
    }
    for cycle in CYCLES {
        if let Some(instant) = yesterday.and_hms_opt(cycle, 0, 0) {
            runs.push(format_run(Utc.from_utc_datetime(&instant)));
        }
    }
    runs
}

/// Forecast hours `start..=end` formatted as two-digit strings.
pub fn forecast_hours(start: u32, end: u32) -> Vec<String> {
    (start..=end).map(|h| format!("{:02}", h)).collect()
}

/// Resolve the forecast window from optional overrides.
///
/// The start override applies only when >= 1, the end override only when
/// it is not before the resolved start.
pub fn resolve_hour_window(start: Option<u32>, end: Option<u32>) -> (u32, u32) {
    const DEFAULT_START: u32 = 0;
    const DEFAULT_END: u32 = 51;

    let start = match start {
        Some(s) if s >= 1 => s,
        _ => DEFAULT_START,
    };
    let end = match end {
        Some(e) if e >= start => e,
        _ => DEFAULT_END.max(start),
    };
    (start, end)
}
