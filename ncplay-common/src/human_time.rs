//! Human-readable playback clock formatting
//!
//! Positions and durations reported by the backend are fractional seconds;
//! status output shows them as a wall clock.

/// Seconds at which the clock grows an hour field
const HOUR_FORMAT_MIN: u64 = 3600;

/// Format seconds as `M:SS`, or `H:MM:SS` from one hour up.
///
/// Fractions are truncated. Negative and non-finite inputs (an idle backend
/// can report either) format as `0:00`.
///
/// # Examples
///
/// ```
/// use ncplay_common::human_time::format_clock;
///
/// assert_eq!(format_clock(0.0), "0:00");
/// assert_eq!(format_clock(65.9), "1:05");
/// assert_eq!(format_clock(3725.0), "1:02:05");
/// ```
pub fn format_clock(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };

    if total >= HOUR_FORMAT_MIN {
        let hours = total / 3600;
        let mins = (total % 3600) / 60;
        let secs = total % 60;
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{}:{:02}", total / 60, total % 60)
    }
}

/// Format a millisecond duration (track metadata) as a clock
pub fn format_millis(millis: u64) -> String {
    format_clock(millis as f64 / 1000.0)
}
