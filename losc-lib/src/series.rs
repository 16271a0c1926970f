//! Uniformly sampled series.
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Error, Result, Segment, Unit};

/// Maximum distance in seconds between the end of one series and the start of the next
/// for them to be considered contiguous.
pub const CONTIGUITY_TOLERANCE: f64 = 1.0 / 262_144.0;

/// Fraction of a sample interval within which a time is considered to fall on a sample.
const SAMPLE_EPSILON: f64 = 1e-6;

/// A uniformly sampled series of `T` starting at GPS time `t0`.
///
/// The series covers `[t0, t0 + len * dt)`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Series<T> {
    pub name: String,
    pub unit: Unit,
    /// GPS time of the first sample.
    pub t0: f64,
    /// Seconds between samples.
    pub dt: f64,
    pub data: Vec<T>,
}

/// Strain, or any other real valued, series.
pub type TimeSeries = Series<f64>;

impl<T: Clone> Series<T> {
    /// Create a new series.
    ///
    /// # Errors
    /// [Error::InvalidData] if `dt` is not a positive finite number or `t0` is not finite.
    pub fn new(name: &str, unit: Unit, t0: f64, dt: f64, data: Vec<T>) -> Result<Self> {
        if !(dt.is_finite() && dt > 0.0) || !t0.is_finite() {
            return Err(Error::InvalidData {
                dataset: name.to_string(),
                message: format!("invalid sampling t0={t0} dt={dt}"),
            });
        }
        Ok(Series {
            name: name.to_string(),
            unit,
            t0,
            dt,
            data,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Sampling rate in Hertz.
    #[must_use]
    pub fn sample_rate(&self) -> f64 {
        1.0 / self.dt
    }

    /// Time covered by this series.
    #[must_use]
    pub fn span(&self) -> Segment {
        Segment {
            start: self.t0,
            end: self.t0 + self.data.len() as f64 * self.dt,
        }
    }

    /// GPS time of each sample.
    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.data.len()).map(|i| self.t0 + i as f64 * self.dt)
    }

    /// Index of the first sample at or after `t`, clamped to `0..=len`.
    #[must_use]
    pub fn index_at(&self, t: f64) -> usize {
        let x = (t - self.t0) / self.dt;
        let idx = if (x - x.round()).abs() < SAMPLE_EPSILON {
            x.round()
        } else {
            x.ceil()
        };
        if idx <= 0.0 {
            0
        } else {
            (idx as usize).min(self.data.len())
        }
    }

    fn crop_indexes(&self, start: Option<f64>, end: Option<f64>) -> (usize, usize) {
        let span = self.span();
        let start = start.map_or(span.start, |s| s.max(span.start));
        let end = end.map_or(span.end, |e| e.min(span.end));
        let first = self.index_at(start);
        let last = self.index_at(end).max(first);
        (first, last)
    }

    /// Copy of the samples of this series falling in `[start, end)`. `None` leaves that
    /// side unbounded.
    #[must_use]
    pub fn crop(&self, start: Option<f64>, end: Option<f64>) -> Self {
        let (first, last) = self.crop_indexes(start, end);
        Series {
            name: self.name.clone(),
            unit: self.unit.clone(),
            t0: self.t0 + first as f64 * self.dt,
            dt: self.dt,
            data: self.data[first..last].to_vec(),
        }
    }

    /// Like [Series::crop] without copying sample data.
    #[must_use]
    pub fn cropped(mut self, start: Option<f64>, end: Option<f64>) -> Self {
        let (first, last) = self.crop_indexes(start, end);
        self.data.truncate(last);
        self.data.drain(..first);
        self.t0 += first as f64 * self.dt;
        self
    }

    /// True if `other` starts where this series ends.
    #[must_use]
    pub fn is_contiguous(&self, other: &Series<T>) -> bool {
        (other.t0 - self.span().end).abs() <= CONTIGUITY_TOLERANCE
    }

    /// Append `other` to the end of this series, growing storage as needed.
    ///
    /// # Errors
    /// [Error::Incompatible] if sample intervals or units differ, [Error::Discontiguous] if
    /// `other` does not start where this series ends.
    pub fn append(&mut self, other: Series<T>) -> Result<()> {
        if other.is_empty() {
            return Ok(());
        }
        if !same_spacing(self.dt, other.dt) {
            return Err(Error::Incompatible(format!(
                "sample interval {} does not match {}",
                other.dt, self.dt
            )));
        }
        if self.unit != other.unit {
            return Err(Error::Incompatible(format!(
                "unit '{}' does not match '{}'",
                other.unit, self.unit
            )));
        }
        if !self.is_contiguous(&other) {
            return Err(Error::Discontiguous {
                end: self.span().end,
                start: other.t0,
            });
        }
        self.data.extend(other.data);
        Ok(())
    }
}

fn same_spacing(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs())
}

/// Mapping of bit position to flag name.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bits(BTreeMap<u32, String>);

impl Bits {
    /// Bits named by position, i.e., `names[0]` is bit 0.
    #[must_use]
    pub fn from_names<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Bits(
            names
                .into_iter()
                .enumerate()
                .map(|(i, n)| (i as u32, n.into()))
                .collect(),
        )
    }

    #[must_use]
    pub fn get(&self, bit: u32) -> Option<&str> {
        self.0.get(&bit).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.0.iter().map(|(b, n)| (*b, n.as_str()))
    }

    /// Mask with every named bit below 32 set.
    #[must_use]
    pub fn mask(&self) -> u32 {
        self.0
            .keys()
            .filter(|b| **b < 32)
            .fold(0, |acc, b| acc | (1 << b))
    }
}

impl FromIterator<(u32, String)> for Bits {
    fn from_iter<I: IntoIterator<Item = (u32, String)>>(iter: I) -> Self {
        Bits(iter.into_iter().collect())
    }
}

/// Series of bit-masks with named bits, e.g., data-quality flags.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct StateVector {
    pub series: Series<u32>,
    pub bits: Bits,
}

impl StateVector {
    #[must_use]
    pub fn new(series: Series<u32>, bits: Bits) -> Self {
        StateVector { series, bits }
    }

    #[must_use]
    pub fn span(&self) -> Segment {
        self.series.span()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.series.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    #[must_use]
    pub fn crop(&self, start: Option<f64>, end: Option<f64>) -> Self {
        StateVector {
            series: self.series.crop(start, end),
            bits: self.bits.clone(),
        }
    }

    #[must_use]
    pub fn cropped(self, start: Option<f64>, end: Option<f64>) -> Self {
        StateVector {
            series: self.series.cropped(start, end),
            bits: self.bits,
        }
    }

    /// Append `other`, keeping this vector's bit names.
    ///
    /// # Errors
    /// See [Series::append].
    pub fn append(&mut self, other: StateVector) -> Result<()> {
        self.series.append(other.series)
    }

    /// Names of the bits set in the sample at `idx`, or `None` if out of range.
    #[must_use]
    pub fn active(&self, idx: usize) -> Option<Vec<&str>> {
        let value = *self.series.data.get(idx)?;
        Some(
            self.bits
                .iter()
                .filter(|(bit, _)| *bit < 32 && value & (1 << bit) != 0)
                .map(|(_, name)| name)
                .collect(),
        )
    }

    /// Bits set anywhere in the data that have no name.
    #[must_use]
    pub fn unnamed_bits(&self) -> u32 {
        let named = self.bits.mask();
        self.series
            .data
            .iter()
            .fold(0, |acc, v| acc | (v & !named))
    }
}
