//! Image thresholding and connected-component labelling
//!
//! Turns a smoothed image into a binary mask and the mask into labelled
//! regions, the first half of threshold segmentation.

use ndarray::{Array2, ArrayView2};

/// 8-connectivity neighbour offsets as (dy, dx)
pub(crate) const NEIGHBORS_8: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Bounding box of a labelled region, in pixel indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    /// Leftmost column
    pub x_min: usize,

    /// Lowest row
    pub y_min: usize,

    /// Width of the bounding box
    pub width: usize,

    /// Height of the bounding box
    pub height: usize,
}

impl BoundingBox {
    pub fn new(x_min: usize, y_min: usize, width: usize, height: usize) -> Self {
        Self {
            x_min,
            y_min,
            width,
            height,
        }
    }

    /// Box covering a single pixel
    pub fn from_pixel(x: usize, y: usize) -> Self {
        Self::new(x, y, 1, 1)
    }

    /// Last column inside the box
    pub fn x_max(&self) -> usize {
        self.x_min + self.width - 1
    }

    /// Last row inside the box
    pub fn y_max(&self) -> usize {
        self.y_min + self.height - 1
    }

    /// Grow to include pixel `(x, y)`
    pub fn include(&mut self, x: usize, y: usize) {
        let x_max = self.x_max().max(x);
        let y_max = self.y_max().max(y);
        self.x_min = self.x_min.min(x);
        self.y_min = self.y_min.min(y);
        self.width = x_max - self.x_min + 1;
        self.height = y_max - self.y_min + 1;
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        (self.x_min..=self.x_max()).contains(&x) && (self.y_min..=self.y_max()).contains(&y)
    }
}

/// Binary mask of pixels strictly above `threshold`.
///
/// NaN pixels are never above threshold.
pub fn apply_threshold(image: ArrayView2<f64>, threshold: f64) -> Array2<bool> {
    image.mapv(|v| v > threshold)
}

/// Label 8-connected regions of `mask` with 1, 2, ... in raster order.
///
/// Returns the label image (0 = background) and the number of labels.
pub fn connected_components(mask: ArrayView2<bool>) -> (Array2<u32>, u32) {
    let (rows, cols) = mask.dim();
    let mut labels = Array2::zeros((rows, cols));
    let mut label_counter = 0;

    for i in 0..rows {
        for j in 0..cols {
            if mask[[i, j]] && labels[[i, j]] == 0 {
                label_counter += 1;
                let mut stack = vec![(i, j)];

                while let Some((y, x)) = stack.pop() {
                    if !mask[[y, x]] || labels[[y, x]] != 0 {
                        continue;
                    }
                    labels[[y, x]] = label_counter;

                    for (ny, nx) in neighbors(y, x, rows, cols) {
                        if mask[[ny, nx]] && labels[[ny, nx]] == 0 {
                            stack.push((ny, nx));
                        }
                    }
                }
            }
        }
    }

    (labels, label_counter)
}

/// In-bounds 8-connected neighbours of `(y, x)`
pub(crate) fn neighbors(
    y: usize,
    x: usize,
    rows: usize,
    cols: usize,
) -> impl Iterator<Item = (usize, usize)> {
    NEIGHBORS_8.into_iter().filter_map(move |(dy, dx)| {
        let ny = y as isize + dy;
        let nx = x as isize + dx;
        (ny >= 0 && ny < rows as isize && nx >= 0 && nx < cols as isize)
            .then_some((ny as usize, nx as usize))
    })
}

/// Pixel count per label; index 0 counts background.
pub fn component_areas(labels: ArrayView2<u32>, num_labels: u32) -> Vec<usize> {
    let mut areas = vec![0usize; num_labels as usize + 1];
    for &label in labels.iter() {
        areas[label as usize] += 1;
    }
    areas
}

/// Bounding box per label, in label order (label 1 first).
///
/// Labels with no pixels get `None`.
pub fn components_to_bboxes(labels: ArrayView2<u32>, num_labels: u32) -> Vec<Option<BoundingBox>> {
    let mut bboxes: Vec<Option<BoundingBox>> = vec![None; num_labels as usize];

    for ((y, x), &label) in labels.indexed_iter() {
        if label == 0 {
            continue;
        }
        bboxes[label as usize - 1]
            .get_or_insert(BoundingBox::from_pixel(x, y))
            .include(x, y);
    }

    bboxes
}

/// Zero out regions smaller than `min_pixels` and renumber the survivors
/// consecutively from 1, preserving their relative order.
pub fn remove_small_components(labels: &mut Array2<u32>, num_labels: u32, min_pixels: usize) -> u32 {
    let areas = component_areas(labels.view(), num_labels);

    let mut remap = vec![0u32; num_labels as usize + 1];
    let mut next = 0;
    for label in 1..=num_labels as usize {
        if areas[label] >= min_pixels {
            next += 1;
            remap[label] = next;
        }
    }

    labels.mapv_inplace(|label| remap[label as usize]);
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_apply_threshold() {
        let image = arr2(&[[0.1, 0.9], [0.5, f64::NAN]]);

        let mask = apply_threshold(image.view(), 0.5);

        assert!(!mask[[0, 0]]);
        assert!(mask[[0, 1]]);
        // strictly greater than
        assert!(!mask[[1, 0]]);
        assert!(!mask[[1, 1]]);
    }

    #[test]
    fn test_connected_components() {
        let mask = arr2(&[
            [false, true, true, false],
            [false, true, false, false],
            [false, false, false, true],
            [false, false, true, true],
        ]);

        let (labels, num_labels) = connected_components(mask.view());

        // Diagonal contact at (1,1)-(2,2) is absent, so two components
        assert_eq!(num_labels, 2);

        let label1 = labels[[0, 1]];
        let label2 = labels[[2, 3]];
        assert_eq!(label1, 1);
        assert_eq!(label2, 2);

        assert_eq!(labels[[0, 1]], labels[[0, 2]]);
        assert_eq!(labels[[0, 1]], labels[[1, 1]]);
        assert_eq!(labels[[2, 3]], labels[[3, 3]]);
        assert_eq!(labels[[2, 3]], labels[[3, 2]]);
    }

    #[test]
    fn test_diagonal_pixels_connect() {
        let mask = arr2(&[[true, false], [false, true]]);
        let (_, num_labels) = connected_components(mask.view());
        assert_eq!(num_labels, 1);
    }

    #[test]
    fn test_components_to_bboxes() {
        let labels = arr2(&[[1, 1, 0, 0], [1, 1, 0, 0], [0, 0, 0, 2], [0, 0, 2, 2]]);

        let bboxes = components_to_bboxes(labels.view(), 2);

        assert_eq!(bboxes.len(), 2);
        assert_eq!(bboxes[0], Some(BoundingBox::new(0, 0, 2, 2)));
        assert_eq!(bboxes[1], Some(BoundingBox::new(2, 2, 2, 2)));
        assert_eq!(bboxes[1].unwrap().x_max(), 3);
    }

    #[test]
    fn test_remove_small_components() {
        let mut labels = arr2(&[[1, 0, 2, 2], [0, 0, 2, 2], [3, 3, 0, 0], [3, 0, 0, 0]]);

        let remaining = remove_small_components(&mut labels, 3, 3);

        assert_eq!(remaining, 2);
        assert_eq!(labels[[0, 0]], 0);
        assert_eq!(labels[[0, 2]], 1);
        assert_eq!(labels[[2, 0]], 2);
        assert_eq!(component_areas(labels.view(), remaining), vec![9, 4, 3]);
    }

    #[test]
    fn test_bbox_include() {
        let mut bbox = BoundingBox::from_pixel(5, 5);
        bbox.include(2, 7);
        assert_eq!(bbox, BoundingBox::new(2, 5, 4, 3));
        assert!(bbox.contains(3, 6));
        assert!(!bbox.contains(6, 6));
    }
}
