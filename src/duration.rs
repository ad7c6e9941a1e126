//! Human readable video durations

/// Render a second count as `M:SS`.
///
/// Minutes are not rolled over into hours, so an hour-long video reads
/// `60:00`.
pub fn format_duration(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero() {
        assert_eq!(format_duration(0), "0:00");
    }

    #[test]
    fn test_pads_seconds() {
        assert_eq!(format_duration(65), "1:05");
        assert_eq!(format_duration(9), "0:09");
        assert_eq!(format_duration(59), "0:59");
    }

    #[test]
    fn test_no_hour_rollover() {
        assert_eq!(format_duration(3600), "60:00");
        assert_eq!(format_duration(7325), "122:05");
    }
}
