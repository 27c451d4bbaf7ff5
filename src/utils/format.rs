//! Human readable formatting.

/// Formats a duration as `Xh Ym Zs`, dropping leading zero units.
///
/// # Examples
///
/// ```
/// use dungeon_forge::format_duration_ms;
///
/// assert_eq!(format_duration_ms(4_500), "4s");
/// assert_eq!(format_duration_ms(125_000), "2m 5s");
/// assert_eq!(format_duration_ms(3_660_000), "1h 1m 0s");
/// ```
pub fn format_duration_ms(ms: u64) -> String {
    let total_seconds = ms / 1000;
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

/// Formats a ratio as a percentage with one decimal.
pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_second_durations() {
        assert_eq!(format_duration_ms(0), "0s");
        assert_eq!(format_duration_ms(999), "0s");
    }

    #[test]
    fn test_percent() {
        assert_eq!(format_percent(66.666), "66.7%");
    }
}
