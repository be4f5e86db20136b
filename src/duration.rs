//! Validation of free-text durations typed into the manual time entry.

use once_cell::sync::Lazy;
use regex::Regex;

static DURATION_TOKEN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*(mo|w|d|h|m|s)").expect("invalid duration regex"));

/// Checks that `input` is made only of GitLab duration tokens (`1mo 2w 3d 4h 5m 6s`)
/// and returns it trimmed with whitespace collapsed. A leading `-` subtracts time.
pub fn normalize_duration_text(input: &str) -> Result<String, String> {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    let lowered = collapsed.to_lowercase();
    let body = lowered.strip_prefix('-').map(str::trim_start).unwrap_or(&lowered);
    if body.is_empty() {
        return Err("Duration cannot be empty".to_string());
    }

    let mut total = 0u64;
    let mut leftover = String::new();
    let mut cursor = 0;
    for capture in DURATION_TOKEN_REGEX.captures_iter(body) {
        let Some(whole) = capture.get(0) else {
            continue;
        };
        leftover.push_str(&body[cursor..whole.start()]);
        cursor = whole.end();
        let value = capture[1]
            .parse::<u64>()
            .map_err(|_| "Duration is too large".to_string())?;
        total = total
            .checked_add(value)
            .ok_or_else(|| "Duration is too large".to_string())?;
    }
    leftover.push_str(&body[cursor..]);

    if !leftover.trim().is_empty() {
        return Err(format!(
            "Unrecognized duration \"{}\". Use units like 1h 30m, 2d or 45m",
            collapsed
        ));
    }
    if total == 0 {
        return Err("Duration resolves to zero".to_string());
    }

    Ok(lowered)
}
