//! Human-readable time labels

use std::time::Duration;

/// Format a duration as `m:ss`, or `h:mm:ss` past the hour
///
/// Rounds to the nearest second.
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = (duration.as_millis() + 500) / 1000;
    let hours = total_seconds / 3600;
    let minutes = total_seconds / 60 % 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
