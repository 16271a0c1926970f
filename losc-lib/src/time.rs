//! GPS time normalization.
use std::{fmt::Display, str::FromStr};

use hifitime::Epoch;

use crate::{Error, Result};

/// Real-valued seconds since the GPS epoch.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct GpsTime(f64);

impl GpsTime {
    #[must_use]
    pub fn new(seconds: f64) -> Self {
        GpsTime(seconds)
    }

    #[must_use]
    pub fn seconds(&self) -> f64 {
        self.0
    }

    /// Largest whole second not after this time.
    #[must_use]
    pub fn floor(&self) -> i64 {
        self.0.floor() as i64
    }

    /// Smallest whole second not before this time.
    #[must_use]
    pub fn ceil(&self) -> i64 {
        self.0.ceil() as i64
    }

    #[must_use]
    pub fn epoch(&self) -> Epoch {
        Epoch::from_gpst_seconds(self.0)
    }
}

impl From<f64> for GpsTime {
    fn from(value: f64) -> Self {
        GpsTime(value)
    }
}

impl From<i64> for GpsTime {
    fn from(value: i64) -> Self {
        GpsTime(value as f64)
    }
}

impl From<u32> for GpsTime {
    fn from(value: u32) -> Self {
        GpsTime(f64::from(value))
    }
}

impl From<Epoch> for GpsTime {
    fn from(value: Epoch) -> Self {
        GpsTime(value.to_gpst_seconds())
    }
}

impl FromStr for GpsTime {
    type Err = Error;

    /// Parse either a number of GPS seconds or a timestamp, e.g., RFC3339.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(seconds) = s.parse::<f64>() {
            if !seconds.is_finite() {
                return Err(Error::InvalidTime(s.to_string()));
            }
            return Ok(GpsTime(seconds));
        }
        Epoch::from_str(s)
            .map(GpsTime::from)
            .map_err(|e| Error::InvalidTime(format!("{s}: {e}")))
    }
}

impl Display for GpsTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_seconds() {
        let t: GpsTime = "1126259462.4".parse().unwrap();
        assert_eq!(t.seconds(), 1_126_259_462.4);
        assert_eq!(t.floor(), 1_126_259_462);
        assert_eq!(t.ceil(), 1_126_259_463);
    }

    #[test]
    fn epoch_round_trips_through_gps_seconds() {
        let t = GpsTime::new(1_000_000_000.0);
        let back = GpsTime::from(t.epoch());
        assert!((back.seconds() - t.seconds()).abs() < 1e-6);
    }

    #[test]
    fn parse_timestamp() {
        // GW150914, 2015-09-14T09:50:45 UTC is GPS 1126259462
        let t: GpsTime = "2015-09-14T09:50:45 UTC".parse().unwrap();
        assert!((t.seconds() - 1_126_259_462.0).abs() < 1e-3, "got {t}");
    }

    #[test]
    fn parse_garbage() {
        assert!("yesterday-ish".parse::<GpsTime>().is_err());
        assert!("NaN".parse::<GpsTime>().is_err());
    }
}
