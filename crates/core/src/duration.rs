//! Human-readable duration parsing and formatting.

use std::time::Duration;

use crate::error::{CadenceError, Result};

/// Parse a human-readable duration string into a [`Duration`].
///
/// Supports components: `Xd` (days), `Xh` (hours), `Xm` (minutes), `Xs` (seconds).
/// Components can be combined: "2h30m", "1d12h", "90s". A bare number is
/// read as seconds, so `"0"` is a valid zero duration.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(CadenceError::InvalidDuration("empty duration".to_string()));
    }

    let invalid = || CadenceError::InvalidDuration(s.to_string());

    let mut total_secs: u64 = 0;
    let mut num_buf = String::new();
    let mut found_unit = false;

    for ch in s.chars() {
        if ch.is_ascii_digit() {
            num_buf.push(ch);
            continue;
        }
        let n: u64 = num_buf.parse().map_err(|_| invalid())?;
        num_buf.clear();
        let unit = match ch {
            'd' => 86_400,
            'h' => 3_600,
            'm' => 60,
            's' => 1,
            _ => return Err(invalid()),
        };
        total_secs = n
            .checked_mul(unit)
            .and_then(|v| total_secs.checked_add(v))
            .ok_or_else(invalid)?;
        found_unit = true;
    }

    if !num_buf.is_empty() {
        // "30m15" is ambiguous.
        if found_unit {
            return Err(invalid());
        }
        total_secs = num_buf.parse().map_err(|_| invalid())?;
    }

    Ok(Duration::from_secs(total_secs))
}

/// Parse a duration and narrow it to whole seconds that fit a `u32`.
pub fn parse_duration_secs(s: &str) -> Result<u32> {
    let secs = parse_duration(s)?.as_secs();
    u32::try_from(secs).map_err(|_| CadenceError::DurationOutOfRange(secs))
}

/// Format seconds as a compact countdown, e.g. `1d2h`, `5m30s`, `0s`.
///
/// Only the two most significant non-zero components are shown.
pub fn format_duration(secs: u64) -> String {
    if secs == 0 {
        return "0s".to_string();
    }
    let parts = [
        (secs / 86_400, 'd'),
        ((secs % 86_400) / 3_600, 'h'),
        ((secs % 3_600) / 60, 'm'),
        (secs % 60, 's'),
    ];
    parts
        .iter()
        .skip_while(|(n, _)| *n == 0)
        .take(2)
        .filter(|(n, _)| *n > 0)
        .map(|(n, unit)| format!("{}{}", n, unit))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minutes() {
        assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(30 * 60));
    }

    #[test]
    fn parse_combined() {
        assert_eq!(
            parse_duration("1d2h30m15s").unwrap(),
            Duration::from_secs(86_400 + 7_200 + 1_800 + 15)
        );
    }

    #[test]
    fn parse_bare_number_as_seconds() {
        assert_eq!(parse_duration("120").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("30m15").is_err());
        assert!(parse_duration("5w").is_err());
    }

    #[test]
    fn parse_secs_rejects_overflow() {
        assert!(matches!(
            parse_duration_secs("100000d"),
            Err(CadenceError::DurationOutOfRange(_))
        ));
        assert_eq!(parse_duration_secs("1h").unwrap(), 3_600);
    }

    #[test]
    fn format_two_components() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(59), "59s");
        assert_eq!(format_duration(330), "5m30s");
        assert_eq!(format_duration(86_400 + 7_200 + 61), "1d2h");
        assert_eq!(format_duration(86_400 + 61), "1d");
    }
}
