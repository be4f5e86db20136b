//! Human readable renderings of tracked durations.

/// Formats seconds as GitLab duration text: `1h 0m 1s`, `1m 30s`, `45s`.
///
/// Leading zero units are dropped; once a larger unit is shown every smaller
/// unit follows it. Zero renders as `0s`.
pub fn format_duration(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Compact badge label: `1h10`, `45m` or `30s` depending on magnitude.
pub fn format_badge(elapsed: u64) -> String {
    let hours = elapsed / 3600;
    let minutes = (elapsed % 3600) / 60;
    if hours > 0 {
        format!("{}h{:02}", hours, minutes)
    } else if minutes > 0 {
        format!("{}m", minutes)
    } else {
        format!("{}s", elapsed)
    }
}

/// Running clock for the popup, `MM:SS` or `HH:MM:SS` past the first hour.
pub fn format_clock(elapsed: u64) -> String {
    let hours = elapsed / 3600;
    let minutes = (elapsed % 3600) / 60;
    let seconds = elapsed % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// Converts a millisecond span to whole seconds, rounding half up and clamping negatives to zero.
pub fn rounded_seconds(millis: i64) -> u64 {
    if millis <= 0 {
        return 0;
    }
    ((millis as u64) + 500) / 1000
}
