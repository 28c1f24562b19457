//! Apply-lag normalization.
//!
//! The lag query reports a bare number of minutes on current tool versions,
//! but older ones append a unit word ("90 seconds", "2 hours"). Everything
//! is normalized to fractional minutes here. The format is heuristic text
//! against human-oriented tool output; treat it as versioned and validate
//! against real samples when the tool changes.
//!
//! Supported inputs:
//! - bare number: `3`, `3.5` (already minutes)
//! - number + unit: `90 seconds`, `3 minutes`, `2 hours`
//! - abbreviated unit: `90s`, `3m`, `2h`, `90 sec`, `3 min`, `2 hr`

use regex::Regex;
use std::sync::LazyLock;

/// Error type for lag parsing failures.
#[derive(Debug, Clone)]
pub struct LagParseError {
    pub input: String,
}

impl std::fmt::Display for LagParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to parse apply lag '{}'", self.input)
    }
}

impl std::error::Error for LagParseError {}

static LAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*([+-]?\d+(?:\.\d+)?)\s*([a-z]*)\s*$").unwrap()
});

/// Parses a lag expression into minutes.
///
/// # Examples
///
/// ```
/// use orastat::util::parse_lag_minutes;
///
/// assert_eq!(parse_lag_minutes("3 minutes").unwrap(), 3.0);
/// assert_eq!(parse_lag_minutes("90 seconds").unwrap(), 1.5);
/// ```
pub fn parse_lag_minutes(input: &str) -> Result<f64, LagParseError> {
    let err = || LagParseError {
        input: input.to_string(),
    };

    let caps = LAG_RE.captures(input).ok_or_else(err)?;
    let number: f64 = caps[1].parse().map_err(|_| err())?;
    let unit = caps[2].to_ascii_lowercase();

    let minutes = match unit.as_str() {
        // Bare numbers are already minutes.
        "" | "m" | "min" | "mins" | "minute" | "minutes" => number,
        "s" | "sec" | "secs" | "second" | "seconds" => number / 60.0,
        "h" | "hr" | "hrs" | "hour" | "hours" => number * 60.0,
        "d" | "day" | "days" => number * 1440.0,
        _ => return Err(err()),
    };

    Ok(minutes)
}
