//! Morphological and photometric properties of segmented sources.
//!
//! Positions are zero-based pixel coordinates with `x` the column and `y` the
//! row. Moments are intensity weighted over the source's pixels of the
//! unsmoothed image.

use ndarray::ArrayView2;
use std::f64::consts::PI;

use crate::image_proc::{BoundingBox, SegmentationImage};
use crate::wcs::Wcs;

/// Properties of one labelled source.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceProperties {
    /// Segmentation label
    pub id: u32,
    pub xcentroid: f64,
    pub ycentroid: f64,
    /// `(ra, dec)` of the centroid in degrees, when the image has a WCS
    pub sky_centroid: Option<(f64, f64)>,
    pub bbox: BoundingBox,
    /// Number of pixels
    pub area: usize,
    /// Radius of a circle with the same area
    pub equivalent_radius: f64,
    pub source_sum: f64,
    pub min_value: f64,
    pub max_value: f64,
    /// `(x, y)` of the minimum pixel
    pub minval_pos: (usize, usize),
    /// `(x, y)` of the maximum pixel
    pub maxval_pos: (usize, usize),
    /// Intensity-weighted covariance `[[xx, xy], [xy, yy]]` in pixels²
    pub covariance: [[f64; 2]; 2],
    /// 1-sigma extent along the major axis
    pub semimajor_sigma: f64,
    /// 1-sigma extent along the minor axis
    pub semiminor_sigma: f64,
    /// Angle of the major axis from +x, counter-clockwise, degrees
    pub orientation: f64,
    pub eccentricity: f64,
    /// `1 - b / a`
    pub ellipticity: f64,
    /// `a / b`
    pub elongation: f64,
    pub cxx: f64,
    pub cxy: f64,
    pub cyy: f64,
    /// Gini coefficient of the pixel values
    pub gini: f64,
}

/// Measure every source of `segm` on `data`.
///
/// Sources are returned in label order. Labels without flux (a zero or
/// negative intensity sum) keep the unweighted pixel mean as centroid.
pub fn source_properties(
    data: ArrayView2<f64>,
    segm: &SegmentationImage,
    wcs: Option<&Wcs>,
) -> Vec<SourceProperties> {
    let bboxes = segm.bboxes();
    segm.pixels_by_label()
        .into_iter()
        .zip(bboxes)
        .enumerate()
        .filter_map(|(i, (pixels, bbox))| {
            let bbox = bbox?;
            let values: Vec<f64> = pixels.iter().map(|&(y, x)| data[[y, x]]).collect();
            Some(measure(i as u32 + 1, &pixels, &values, bbox, wcs))
        })
        .collect()
}

fn measure(
    id: u32,
    pixels: &[(usize, usize)],
    values: &[f64],
    bbox: BoundingBox,
    wcs: Option<&Wcs>,
) -> SourceProperties {
    let area = pixels.len();
    let source_sum: f64 = values.iter().sum();

    let (min_index, max_index) = extremes(values);
    let (min_y, min_x) = pixels[min_index];
    let (max_y, max_x) = pixels[max_index];

    // flux weights, or uniform weights for sources without positive flux
    let weight = |v: f64| if source_sum > 0.0 { v } else { 1.0 };
    let total: f64 = values.iter().map(|&v| weight(v)).sum();

    let (mut sx, mut sy) = (0.0, 0.0);
    for (&(y, x), &v) in pixels.iter().zip(values) {
        sx += weight(v) * x as f64;
        sy += weight(v) * y as f64;
    }
    let (xcentroid, ycentroid) = (sx / total, sy / total);

    let (mut mxx, mut mxy, mut myy) = (0.0, 0.0, 0.0);
    for (&(y, x), &v) in pixels.iter().zip(values) {
        let dx = x as f64 - xcentroid;
        let dy = y as f64 - ycentroid;
        mxx += weight(v) * dx * dx;
        mxy += weight(v) * dx * dy;
        myy += weight(v) * dy * dy;
    }
    let covariance = covariance_matrix(mxx / total, mxy / total, myy / total);
    let shape = EllipseShape::from_covariance(covariance);

    let sky_centroid = wcs.and_then(|wcs| wcs.pixel_to_world(xcentroid, ycentroid).ok());

    SourceProperties {
        id,
        xcentroid,
        ycentroid,
        sky_centroid,
        bbox,
        area,
        equivalent_radius: (area as f64 / PI).sqrt(),
        source_sum,
        min_value: values[min_index],
        max_value: values[max_index],
        minval_pos: (min_x, min_y),
        maxval_pos: (max_x, max_y),
        covariance,
        semimajor_sigma: shape.semimajor,
        semiminor_sigma: shape.semiminor,
        orientation: shape.orientation.to_degrees(),
        eccentricity: shape.eccentricity(),
        ellipticity: 1.0 - shape.semiminor / shape.semimajor,
        elongation: shape.semimajor / shape.semiminor,
        cxx: shape.cxx(),
        cxy: shape.cxy(),
        cyy: shape.cyy(),
        gini: gini(values),
    }
}

/// Indices of the first minimum and first maximum.
fn extremes(values: &[f64]) -> (usize, usize) {
    let mut min_index = 0;
    let mut max_index = 0;
    for (i, &v) in values.iter().enumerate() {
        if v < values[min_index] {
            min_index = i;
        }
        if v > values[max_index] {
            max_index = i;
        }
    }
    (min_index, max_index)
}

/// Covariance matrix, widened by a pixel's own variance (1/12) on the
/// diagonal when singular, as for single-row or single-pixel sources.
fn covariance_matrix(xx: f64, xy: f64, yy: f64) -> [[f64; 2]; 2] {
    let det = xx * yy - xy * xy;
    if det.abs() < f64::EPSILON {
        let delta = 1.0 / 12.0;
        [[xx + delta, xy], [xy, yy + delta]]
    } else {
        [[xx, xy], [xy, yy]]
    }
}

/// Ellipse described by a covariance matrix.
struct EllipseShape {
    semimajor: f64,
    semiminor: f64,
    /// Radians, counter-clockwise from +x
    orientation: f64,
}

impl EllipseShape {
    fn from_covariance([[xx, xy], [_, yy]]: [[f64; 2]; 2]) -> Self {
        let mean = (xx + yy) / 2.0;
        let spread = (((xx - yy) / 2.0).powi(2) + xy * xy).sqrt();
        let major = mean + spread;
        let minor = (mean - spread).max(0.0);
        Self {
            semimajor: major.sqrt(),
            semiminor: minor.sqrt(),
            orientation: 0.5 * (2.0 * xy).atan2(xx - yy),
        }
    }

    fn eccentricity(&self) -> f64 {
        if self.semimajor == 0.0 {
            return 0.0;
        }
        (1.0 - (self.semiminor / self.semimajor).powi(2)).sqrt()
    }

    fn cxx(&self) -> f64 {
        let (sin, cos) = self.orientation.sin_cos();
        cos * cos / self.semimajor.powi(2) + sin * sin / self.semiminor.powi(2)
    }

    fn cxy(&self) -> f64 {
        let (sin, cos) = self.orientation.sin_cos();
        2.0 * cos * sin * (1.0 / self.semimajor.powi(2) - 1.0 / self.semiminor.powi(2))
    }

    fn cyy(&self) -> f64 {
        let (sin, cos) = self.orientation.sin_cos();
        sin * sin / self.semimajor.powi(2) + cos * cos / self.semiminor.powi(2)
    }
}

/// Gini coefficient of absolute pixel values: 0 for uniform flux, towards 1
/// when the flux sits in a single pixel.
fn gini(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mut sorted: Vec<f64> = values.iter().map(|v| v.abs()).collect();
    sorted.sort_by(f64::total_cmp);

    let total: f64 = sorted.iter().sum();
    if total == 0.0 {
        return 0.0;
    }
    let weighted: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, &v)| (2.0 * (i + 1) as f64 - n as f64 - 1.0) * v)
        .sum();
    weighted / (total * (n as f64 - 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array2;

    fn gaussian(rows: usize, cols: usize, cx: f64, cy: f64, sx: f64, sy: f64) -> Array2<f64> {
        Array2::from_shape_fn((rows, cols), |(y, x)| {
            let dx = (x as f64 - cx) / sx;
            let dy = (y as f64 - cy) / sy;
            (-(dx * dx + dy * dy) / 2.0).exp()
        })
    }

    fn whole_image(data: &Array2<f64>) -> SegmentationImage {
        SegmentationImage::from_labels(Array2::from_elem(data.dim(), 1))
    }

    #[test]
    fn test_symmetric_source() {
        let data = gaussian(31, 31, 15.0, 15.0, 2.0, 2.0);
        let props = source_properties(data.view(), &whole_image(&data), None);

        assert_eq!(props.len(), 1);
        let p = &props[0];
        assert_eq!(p.id, 1);
        assert_relative_eq!(p.xcentroid, 15.0, epsilon = 1e-9);
        assert_relative_eq!(p.ycentroid, 15.0, epsilon = 1e-9);
        assert_relative_eq!(p.semimajor_sigma, 2.0, epsilon = 1e-3);
        assert_relative_eq!(p.semiminor_sigma, 2.0, epsilon = 1e-3);
        assert_relative_eq!(p.max_value, 1.0);
        assert_eq!(p.maxval_pos, (15, 15));
        assert_eq!(p.area, 31 * 31);
        assert!(p.sky_centroid.is_none());
        assert!(p.eccentricity < 0.05);
    }

    #[test]
    fn test_elongated_source_along_x() {
        let data = gaussian(41, 61, 30.0, 20.0, 6.0, 2.0);
        let p = &source_properties(data.view(), &whole_image(&data), None)[0];

        assert_relative_eq!(p.semimajor_sigma, 6.0, epsilon = 0.05);
        assert_relative_eq!(p.semiminor_sigma, 2.0, epsilon = 1e-3);
        assert_relative_eq!(p.orientation, 0.0, epsilon = 1e-6);
        assert_relative_eq!(p.elongation, 3.0, epsilon = 0.03);
        assert_relative_eq!(p.ellipticity, 1.0 - 1.0 / 3.0, epsilon = 0.01);
        assert_relative_eq!(p.cxx, 1.0 / 36.0, epsilon = 1e-3);
        assert_relative_eq!(p.cyy, 0.25, epsilon = 1e-3);
        assert_relative_eq!(p.cxy, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_single_row_source_is_regularized() {
        let mut labels = Array2::zeros((3, 5));
        labels.row_mut(1).fill(1);
        let data = Array2::from_elem((3, 5), 2.0);
        let p = &source_properties(data.view(), &SegmentationImage::from_labels(labels), None)[0];

        assert_relative_eq!(p.covariance[1][1], 1.0 / 12.0);
        assert_relative_eq!(p.covariance[0][0], 2.0 + 1.0 / 12.0);
        assert!(p.semiminor_sigma > 0.0);
        assert!(p.elongation.is_finite());
        assert_relative_eq!(p.source_sum, 10.0);
        assert_relative_eq!(p.gini, 0.0);
    }

    #[test]
    fn test_sky_centroid_uses_wcs() {
        let data = gaussian(21, 21, 10.0, 10.0, 2.0, 2.0);
        let wcs = Wcs::tan((150.0, 2.0), (11.0, 11.0), (-0.001, 0.001)).unwrap();
        let p = &source_properties(data.view(), &whole_image(&data), Some(&wcs))[0];

        let (ra, dec) = p.sky_centroid.unwrap();
        assert_relative_eq!(ra, 150.0, epsilon = 1e-9);
        assert_relative_eq!(dec, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_gini_extremes() {
        assert_relative_eq!(gini(&[1.0, 1.0, 1.0, 1.0]), 0.0);
        assert_relative_eq!(gini(&[0.0, 0.0, 0.0, 4.0]), 1.0);
        assert_relative_eq!(gini(&[5.0]), 0.0);
    }
}
