//! Min-max normalization of survey bands.

use crate::stats::PixelStats;
use ndarray::Array2;

/// Rescale `image` to `[0, 1]` via `(v - min) / (max - min)`.
///
/// Blank (NaN) pixels are excluded from the extremes and map to 0. A constant
/// or entirely blank image has no range and normalizes to all zeros.
pub fn normalize(image: &Array2<f64>) -> Array2<f64> {
    let stats = PixelStats::new(image.iter().copied());
    let (min, max) = match stats.min_max() {
        Ok(extremes) => extremes,
        Err(_) => return Array2::zeros(image.dim()),
    };

    let range = max - min;
    if range <= 0.0 || !range.is_finite() {
        return Array2::zeros(image.dim());
    }

    image.mapv(|v| if v.is_nan() { 0.0 } else { (v - min) / range })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr2;

    #[test]
    fn test_extremes_map_to_unit_interval() {
        let image = arr2(&[[-2.0, 0.0], [3.0, 8.0]]);
        let norm = normalize(&image);

        assert_relative_eq!(norm[[0, 0]], 0.0);
        assert_relative_eq!(norm[[1, 1]], 1.0);
        assert_relative_eq!(norm[[0, 1]], 0.2);
        assert_relative_eq!(norm[[1, 0]], 0.5);
    }

    #[test]
    fn test_blank_pixels_become_zero() {
        let image = arr2(&[[f64::NAN, 1.0], [2.0, 3.0]]);
        let norm = normalize(&image);

        assert_eq!(norm[[0, 0]], 0.0);
        assert_relative_eq!(norm[[0, 1]], 0.0);
        assert_relative_eq!(norm[[1, 1]], 1.0);
    }

    #[test]
    fn test_flat_and_empty_images() {
        let flat = Array2::from_elem((3, 4), 7.5);
        assert!(normalize(&flat).iter().all(|&v| v == 0.0));

        let blank = Array2::from_elem((2, 2), f64::NAN);
        let norm = normalize(&blank);
        assert_eq!(norm.dim(), (2, 2));
        assert!(norm.iter().all(|&v| v == 0.0));
    }
}
