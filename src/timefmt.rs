use std::time::Duration;

/// `HH:MM:SS`, truncating sub-second precision. Hours are not wrapped.
pub fn clock(timestamp: Duration) -> String {
    let total_secs = timestamp.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// The `position / length` label shown next to the slider.
pub fn position_label(position: Duration, length: Option<Duration>) -> String {
    match length {
        Some(length) if !length.is_zero() => format!("{} / {}", clock(position), clock(length)),
        _ => "00:00:00 / 00:00:00".to_string(),
    }
}

/// Parses a user-supplied instant: plain seconds (`12.5`) or a clock value
/// (`HH:MM:SS`, optionally followed by `,mmm` or `.mmm`).
pub fn parse_instant(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    let invalid = || format!("invalid time '{}': expected seconds or HH:MM:SS[,mmm]", value);

    if !value.contains(':') {
        let secs: f64 = value.parse().map_err(|_| invalid())?;
        return Duration::try_from_secs_f64(secs).map_err(|_| invalid());
    }

    let mut parts = value.splitn(3, ':');
    let (h, m, s) = match (parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(m), Some(s)) => (h, m, s),
        _ => return Err(invalid()),
    };
    let hours: u64 = h.parse().map_err(|_| invalid())?;
    let minutes: u64 = m.parse().map_err(|_| invalid())?;
    let seconds: f64 = s.replace(',', ".").parse().map_err(|_| invalid())?;
    if minutes >= 60 || !(0.0..60.0).contains(&seconds) {
        return Err(invalid());
    }

    let whole = Duration::from_secs(hours * 3600 + minutes * 60);
    Ok(whole + Duration::from_secs_f64(seconds))
}
