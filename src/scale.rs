//! Time-axis and bubble-size scales

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{LayoutError, LayoutResult};

/// Linear mapping from calendar dates onto a pixel range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeScale {
    domain_start: f64,
    domain_end: f64,
    range_start: f64,
    range_end: f64,
}

impl TimeScale {
    pub fn new(min_date: NaiveDate, max_date: NaiveDate, range_start: f64, range_end: f64) -> Self {
        Self {
            domain_start: day_number(min_date),
            domain_end: day_number(max_date),
            range_start,
            range_end,
        }
    }

    /// Map a date to a pixel coordinate. Dates outside the domain extrapolate.
    pub fn apply(&self, date: NaiveDate) -> f64 {
        let span = self.domain_end - self.domain_start;
        let t = if span == 0.0 {
            0.5
        } else {
            (day_number(date) - self.domain_start) / span
        };
        self.range_start + t * (self.range_end - self.range_start)
    }
}

fn day_number(date: NaiveDate) -> f64 {
    f64::from(date.num_days_from_ce())
}

/// Maps a magnitude attribute to a bounded bubble radius
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadiusScale {
    /// Multiplier applied to `sqrt(magnitude)`
    pub scale: f64,
    /// Smallest radius ever produced
    pub min: f64,
    /// Largest radius ever produced
    pub max: f64,
    /// Magnitude used when the attribute is absent, zero, negative or NaN
    pub fallback_magnitude: f64,
}

impl Default for RadiusScale {
    fn default() -> Self {
        Self {
            scale: 0.12,
            min: 2.5,
            max: 15.0,
            fallback_magnitude: 50.0,
        }
    }
}

impl RadiusScale {
    pub fn validate(&self) -> LayoutResult<()> {
        if !(self.min.is_finite() && self.max.is_finite() && self.min > 0.0 && self.max >= self.min)
        {
            return Err(LayoutError::InvalidRadiusBounds {
                min: self.min,
                max: self.max,
            });
        }
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(LayoutError::InvalidRadiusScale(format!(
                "scale must be positive, got {}",
                self.scale
            )));
        }
        if !(self.fallback_magnitude.is_finite() && self.fallback_magnitude > 0.0) {
            return Err(LayoutError::InvalidRadiusScale(format!(
                "fallback magnitude must be positive, got {}",
                self.fallback_magnitude
            )));
        }
        Ok(())
    }

    /// Radius for a magnitude, always within `[min, max]`.
    ///
    /// Missing, NaN and non-positive magnitudes use the fallback; `+inf` maps to `max`.
    pub fn radius(&self, magnitude: Option<f64>) -> f64 {
        let magnitude = match magnitude {
            Some(m) if m > 0.0 => m,
            _ => self.fallback_magnitude,
        };
        (magnitude.sqrt() * self.scale).clamp(self.min, self.max)
    }
}

/// Inclusive range of calendar years shown on the time axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl Default for YearRange {
    fn default() -> Self {
        Self {
            start: 2012,
            end: 2024,
        }
    }
}

impl YearRange {
    pub fn validate(&self) -> LayoutResult<()> {
        if self.start > self.end || self.first_day().is_none() || self.last_day().is_none() {
            return Err(LayoutError::InvalidYearRange {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    /// January 1st of the first year
    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.start, 1, 1)
    }

    /// December 31st of the last year
    pub fn last_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.end, 12, 31)
    }

    /// Range covering the years of the given dates
    pub fn spanning(dates: impl IntoIterator<Item = NaiveDate>) -> Option<Self> {
        dates.into_iter().fold(None, |acc, date| {
            let year = date.year();
            Some(match acc {
                None => Self {
                    start: year,
                    end: year,
                },
                Some(range) => Self {
                    start: range.start.min(year),
                    end: range.end.max(year),
                },
            })
        })
    }
}
