//! Single-pass pixel statistics that skip blank pixels.
//!
//! Survey cutouts and radio maps mark missing data with NaN (FITS BLANK or
//! IEEE NaN). Those pixels are counted but excluded from min, max, sum and
//! mean so a few blanked edge pixels do not poison normalization or contour
//! levels.

use num_traits::float::Float;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatsError {
    #[error("No valid pixels ({blank} blank)")]
    NoData { blank: usize },
}

/// Min, max, sum and count over the non-NaN values of a pixel stream.
#[derive(Debug, Clone)]
pub struct PixelStats<T: Float> {
    min_value: Option<T>,
    max_value: Option<T>,
    sum: T,
    count: usize,
    blank: usize,
}

impl<T: Float + fmt::Debug> PixelStats<T> {
    /// Scan `values` once.
    pub fn new<I>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let mut min_value: Option<T> = None;
        let mut max_value: Option<T> = None;
        let mut sum = T::zero();
        let mut count = 0usize;
        let mut blank = 0usize;

        for value in values {
            if value.is_nan() {
                blank += 1;
                continue;
            }

            sum = sum + value;
            count += 1;
            min_value = Some(min_value.map_or(value, |m| m.min(value)));
            max_value = Some(max_value.map_or(value, |m| m.max(value)));
        }

        Self {
            min_value,
            max_value,
            sum,
            count,
            blank,
        }
    }

    pub fn min(&self) -> Result<T, StatsError> {
        self.min_value.ok_or(StatsError::NoData { blank: self.blank })
    }

    pub fn max(&self) -> Result<T, StatsError> {
        self.max_value.ok_or(StatsError::NoData { blank: self.blank })
    }

    /// Both extremes at once.
    pub fn min_max(&self) -> Result<(T, T), StatsError> {
        Ok((self.min()?, self.max()?))
    }

    pub fn sum(&self) -> Result<T, StatsError> {
        if self.count == 0 {
            Err(StatsError::NoData { blank: self.blank })
        } else {
            Ok(self.sum)
        }
    }

    pub fn mean(&self) -> Result<T, StatsError> {
        let n = T::from(self.count).ok_or(StatsError::NoData { blank: self.blank })?;
        Ok(self.sum()? / n)
    }

    /// Number of valid (non-NaN) values
    pub fn count(&self) -> usize {
        self.count
    }

    /// Number of NaN values skipped
    pub fn blank_count(&self) -> usize {
        self.blank
    }

    pub fn has_blanks(&self) -> bool {
        self.blank > 0
    }
}
