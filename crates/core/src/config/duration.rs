//! Compact duration strings such as `5d` or `1w2d8h5m20s`.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use super::ConfigError;

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?P<weeks>[.\d]+)w)?(?:(?P<days>[.\d]+)d)?(?:(?P<hours>[.\d]+)h)?(?:(?P<minutes>[.\d]+)m)?(?:(?P<seconds>[.\d]+)s)?$",
    )
    .expect("invalid duration regex")
});

const UNITS: [(&str, f64); 5] = [
    ("weeks", 7.0 * 24.0 * 3600.0),
    ("days", 24.0 * 3600.0),
    ("hours", 3600.0),
    ("minutes", 60.0),
    ("seconds", 1.0),
];

/// Parse a duration in GNU `sleep` style: weeks, days, hours, minutes,
/// seconds, each optional but in that order. Components may be fractional.
pub fn parse_duration(input: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidDuration(input.to_string());

    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(invalid());
    }
    let caps = DURATION_RE.captures(trimmed).ok_or_else(invalid)?;

    let mut seconds = 0.0;
    for (name, scale) in UNITS {
        if let Some(m) = caps.name(name) {
            let value: f64 = m.as_str().parse().map_err(|_| invalid())?;
            seconds += value * scale;
        }
    }

    Duration::try_from_secs_f64(seconds).map_err(|_| invalid())
}
