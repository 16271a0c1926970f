use std::fmt::Display;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Half-open GPS time interval `[start, end)`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
}

impl Segment {
    /// Create a new segment.
    ///
    /// # Errors
    /// [Error::InvalidInterval] if `start > end`.
    pub fn new(start: f64, end: f64) -> Result<Self> {
        if start > end || start.is_nan() || end.is_nan() {
            return Err(Error::InvalidInterval { start, end });
        }
        Ok(Segment { start, end })
    }

    #[must_use]
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Intersection of two segments. Disjoint segments produce an empty segment
    /// positioned at the later start.
    #[must_use]
    pub fn intersection(&self, other: &Segment) -> Segment {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end).max(start);
        Segment { start, end }
    }

    /// True if `other` lies entirely within this segment.
    #[must_use]
    pub fn contains(&self, other: &Segment) -> bool {
        self.start <= other.start && self.end >= other.end
    }

    #[must_use]
    pub fn intersects(&self, other: &Segment) -> bool {
        !self.intersection(other).is_empty()
    }
}

impl std::ops::BitAnd for Segment {
    type Output = Segment;

    fn bitand(self, rhs: Self) -> Self::Output {
        self.intersection(&rhs)
    }
}

impl Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} .. {})", self.start, self.end)
    }
}
