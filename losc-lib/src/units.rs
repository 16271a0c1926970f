//! Physical units as carried by archive metadata.
use std::fmt::Display;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Physical unit of series samples.
///
/// Units are kept as their normalized string form; an empty string is dimensionless.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Unit(String);

impl Unit {
    #[must_use]
    pub fn new(s: &str) -> Self {
        let s = s.trim();
        if s.eq_ignore_ascii_case("dimensionless") {
            return Unit::dimensionless();
        }
        Unit(s.to_string())
    }

    #[must_use]
    pub fn dimensionless() -> Self {
        Unit(String::new())
    }

    #[must_use]
    pub fn is_dimensionless(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Unit {
    fn from(value: &str) -> Self {
        Unit::new(value)
    }
}

impl Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Number of seconds in one of the time unit `s`, e.g., `Xunits`.
///
/// # Errors
/// [Error::InvalidUnit] if `s` is not a known time unit.
pub fn seconds_per(s: &str) -> Result<f64> {
    let factor = match s.trim() {
        "s" | "sec" | "second" | "seconds" => 1.0,
        "ms" | "millisecond" | "milliseconds" => 1e-3,
        "us" | "microsecond" | "microseconds" => 1e-6,
        "ns" | "nanosecond" | "nanoseconds" => 1e-9,
        "min" | "minute" | "minutes" => 60.0,
        "h" | "hour" | "hours" => 3600.0,
        "d" | "day" | "days" => 86400.0,
        other => return Err(Error::InvalidUnit(other.to_string())),
    };
    Ok(factor)
}

/// Parse a frequency into Hertz.
///
/// Accepts a bare number, taken as Hertz, or a number followed by `Hz`, `kHz` or `MHz`,
/// e.g., `4096`, `4096 Hz`, `16kHz`.
///
/// # Errors
/// [Error::InvalidUnit] if `s` cannot be parsed or is not positive.
pub fn parse_frequency(s: &str) -> Result<f64> {
    let s = s.trim();
    let split = s
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(s.len());
    let (value, unit) = s.split_at(split);
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| Error::InvalidUnit(s.to_string()))?;
    let factor = match unit.trim() {
        "" | "Hz" | "hz" => 1.0,
        "kHz" | "khz" | "KHz" => 1e3,
        "MHz" | "mhz" => 1e6,
        _ => return Err(Error::InvalidUnit(s.to_string())),
    };
    let hertz = value * factor;
    if !(hertz.is_finite() && hertz > 0.0) {
        return Err(Error::InvalidUnit(s.to_string()));
    }
    Ok(hertz)
}
