//! Duration parsing for `--timeout`.

use std::time::Duration;

/// Parse a duration string into a Duration.
///
/// Supported formats:
/// - `500ms` - milliseconds
/// - `30s` - seconds
/// - `10m` - minutes
/// - `2h` - hours
/// - `45` - seconds when no unit is given
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim().to_lowercase();
    if s.is_empty() {
        return Err("Empty duration".to_string());
    }

    let (num_str, unit) = if let Some(num) = s.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = s.strip_suffix('s') {
        (num, "s")
    } else if let Some(num) = s.strip_suffix('m') {
        (num, "m")
    } else if let Some(num) = s.strip_suffix('h') {
        (num, "h")
    } else {
        (s.as_str(), "s")
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .map_err(|_| format!("Invalid duration: {}", s))?;

    let duration = match unit {
        "ms" => Duration::from_millis(num),
        "s" => Duration::from_secs(num),
        "m" => Duration::from_secs(num.saturating_mul(60)),
        "h" => Duration::from_secs(num.saturating_mul(60 * 60)),
        _ => return Err(format!("Unknown duration unit: {}", unit)),
    };

    Ok(duration)
}
