//! Threshold segmentation
//!
//! A [`SegmentationImage`] assigns every pixel either to the background (0) or
//! to a source label 1..=n. It is produced by [`detect_sources`] and refined by
//! [`deblend_sources`](super::deblend::deblend_sources).

use ndarray::{Array2, ArrayView2};

use super::thresholding::{
    apply_threshold, component_areas, components_to_bboxes, connected_components,
    remove_small_components, BoundingBox,
};

/// Label image of detected sources.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationImage {
    labels: Array2<u32>,
    n_labels: u32,
}

impl SegmentationImage {
    /// Wrap a label image whose labels run consecutively from 1.
    pub fn from_labels(labels: Array2<u32>) -> Self {
        let n_labels = labels.iter().copied().max().unwrap_or(0);
        Self { labels, n_labels }
    }

    pub fn labels(&self) -> &Array2<u32> {
        &self.labels
    }

    pub fn n_labels(&self) -> u32 {
        self.n_labels
    }

    pub fn is_empty(&self) -> bool {
        self.n_labels == 0
    }

    /// `(rows, cols)`
    pub fn dim(&self) -> (usize, usize) {
        self.labels.dim()
    }

    /// Pixel count of each label, label 1 first
    pub fn areas(&self) -> Vec<usize> {
        component_areas(self.labels.view(), self.n_labels)
            .into_iter()
            .skip(1)
            .collect()
    }

    /// Bounding box of each label, label 1 first
    pub fn bboxes(&self) -> Vec<Option<BoundingBox>> {
        components_to_bboxes(self.labels.view(), self.n_labels)
    }

    /// `(row, col)` pixel lists per label, label 1 first, in raster order
    pub fn pixels_by_label(&self) -> Vec<Vec<(usize, usize)>> {
        let mut pixels = vec![Vec::new(); self.n_labels as usize];
        for ((y, x), &label) in self.labels.indexed_iter() {
            if label > 0 {
                pixels[label as usize - 1].push((y, x));
            }
        }
        pixels
    }
}

/// Segment `image` into 8-connected regions of pixels strictly above
/// `threshold`, discarding regions with fewer than `npixels` pixels.
pub fn detect_sources(image: ArrayView2<f64>, threshold: f64, npixels: usize) -> SegmentationImage {
    let mask = apply_threshold(image, threshold);
    let (mut labels, found) = connected_components(mask.view());
    let kept = remove_small_components(&mut labels, found, npixels);

    log::debug!(
        "Segmentation at threshold {threshold:.6}: {found} regions, {kept} with >= {npixels} pixels"
    );

    SegmentationImage {
        labels,
        n_labels: kept,
    }
}
