//! Cutout dimensions

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Width and height of a survey cutout in pixels.
///
/// Arrays built from an `ImageSize` use ndarray's row-major convention:
/// shape is `(height, width)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    /// Image width in pixels
    pub width: usize,
    /// Image height in pixels
    pub height: usize,
}

impl ImageSize {
    pub fn from_width_height(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Square cutout, as requested from the survey service
    pub fn square(pixels: usize) -> Self {
        Self::from_width_height(pixels, pixels)
    }

    /// Size of an existing image
    pub fn of<T>(array: &Array2<T>) -> Self {
        let (height, width) = array.dim();
        Self { width, height }
    }

    /// All-zero image of this size, used as the placeholder for a band that
    /// could not be fetched.
    pub fn zeros(&self) -> Array2<f64> {
        Array2::zeros(self.shape())
    }

    /// ndarray shape `(height, width)`
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }
}

impl From<(usize, usize)> for ImageSize {
    /// From a `(width, height)` tuple
    fn from(dimensions: (usize, usize)) -> Self {
        Self::from_width_height(dimensions.0, dimensions.1)
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros_is_row_major() {
        let size = ImageSize::from_width_height(4, 3);
        let zeros = size.zeros();
        assert_eq!(zeros.dim(), (3, 4));
        assert!(zeros.iter().all(|&v| v == 0.0));
        assert_eq!(ImageSize::of(&zeros), size);
        assert_eq!(size.pixel_count(), 12);
    }

    #[test]
    fn test_display() {
        assert_eq!(ImageSize::square(600).to_string(), "600x600");
    }
}
