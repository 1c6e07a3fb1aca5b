//! Multi-threshold deblending of overlapping sources.
//!
//! Each segment is re-thresholded at `nlevels` levels spaced exponentially
//! between its faintest and brightest pixel (linearly when the faintest pixel
//! is not positive). Walking up the levels builds a tree of branches; a branch
//! counts as a separate object when it keeps at least `npixels` pixels and at
//! least `contrast` of the segment's total flux. When a segment ends with two
//! or more such leaves, its pixels are split among them by a watershed that
//! floods outward from the leaves in order of decreasing brightness.
//!
//! After Bertin & Arnouts (1996), A&AS 117, 393.

use ndarray::{Array2, ArrayView2};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use super::segment::SegmentationImage;
use super::thresholding::NEIGHBORS_8;
use crate::config::DetectionConfig;

type Pixel = (usize, usize);

/// Split blended segments of `segm` using the pixel values of `data`.
///
/// Labels of the result run consecutively from 1; children of one segment
/// get consecutive labels in the order of the original segments.
pub fn deblend_sources(
    data: ArrayView2<f64>,
    segm: &SegmentationImage,
    config: &DetectionConfig,
) -> SegmentationImage {
    let mut labels = Array2::<u32>::zeros(segm.dim());
    let mut next_label = 0u32;

    for (index, pixels) in segm.pixels_by_label().into_iter().enumerate() {
        let children = deblend_segment(data, &pixels, config);
        if children.len() > 1 {
            log::debug!("Segment {} split into {} sources", index + 1, children.len());
        }
        for child in children {
            next_label += 1;
            for (y, x) in child {
                labels[[y, x]] = next_label;
            }
        }
    }

    log::debug!(
        "Deblending: {} segments -> {} sources",
        segm.n_labels(),
        next_label
    );
    SegmentationImage::from_labels(labels)
}

/// Pixel lists of the objects found in one segment (one list when the
/// segment is not blended).
fn deblend_segment(
    data: ArrayView2<f64>,
    pixels: &[Pixel],
    config: &DetectionConfig,
) -> Vec<Vec<Pixel>> {
    if pixels.len() < 2 * config.npixels.max(1) {
        return vec![pixels.to_vec()];
    }

    let values: HashMap<Pixel, f64> = pixels.iter().map(|&p| (p, data[[p.0, p.1]])).collect();
    let (low, high) = values
        .values()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if high <= low {
        return vec![pixels.to_vec()];
    }

    let levels = threshold_levels(low, high, config.nlevels);
    let total_flux: f64 = values.values().sum();
    let tree = LevelTree {
        values: &values,
        levels: &levels,
        min_flux: config.contrast * total_flux,
        npixels: config.npixels,
    };

    let leaves = tree.leaves(pixels.to_vec(), 0);
    if leaves.len() < 2 {
        return vec![pixels.to_vec()];
    }

    watershed(&values, &leaves)
}

/// `nlevels` thresholds strictly between `low` and `high`.
fn threshold_levels(low: f64, high: f64, nlevels: usize) -> Vec<f64> {
    let steps = (nlevels + 1) as f64;
    (1..=nlevels)
        .map(|k| {
            let t = k as f64 / steps;
            if low > 0.0 {
                low * (high / low).powf(t)
            } else {
                low + (high - low) * t
            }
        })
        .collect()
}

struct LevelTree<'a> {
    values: &'a HashMap<Pixel, f64>,
    levels: &'a [f64],
    min_flux: f64,
    npixels: usize,
}

impl LevelTree<'_> {
    /// Leaves of the branch `region`, examining levels from `start` upward.
    fn leaves(&self, mut region: Vec<Pixel>, start: usize) -> Vec<Vec<Pixel>> {
        for (offset, &threshold) in self.levels[start..].iter().enumerate() {
            let mut branches = self.branches(&region, threshold);
            match branches.len() {
                0 => break,
                1 => region = branches.remove(0),
                _ => {
                    let next = start + offset + 1;
                    return branches
                        .into_iter()
                        .flat_map(|branch| self.leaves(branch, next))
                        .collect();
                }
            }
        }
        vec![region]
    }

    /// Significant connected parts of `region` above `threshold`.
    fn branches(&self, region: &[Pixel], threshold: f64) -> Vec<Vec<Pixel>> {
        let above: HashSet<Pixel> = region
            .iter()
            .copied()
            .filter(|p| self.values[p] > threshold)
            .collect();

        let mut visited: HashSet<Pixel> = HashSet::with_capacity(above.len());
        let mut branches = Vec::new();

        for &seed in region {
            if !above.contains(&seed) || visited.contains(&seed) {
                continue;
            }
            visited.insert(seed);
            let mut component = Vec::new();
            let mut stack = vec![seed];
            while let Some((y, x)) = stack.pop() {
                component.push((y, x));
                for n in adjacent((y, x)) {
                    if above.contains(&n) && visited.insert(n) {
                        stack.push(n);
                    }
                }
            }

            let flux: f64 = component.iter().map(|p| self.values[p]).sum();
            if component.len() >= self.npixels && flux >= self.min_flux {
                branches.push(component);
            }
        }
        branches
    }
}

/// 8-connected neighbours of a pixel, bounded only below; callers look
/// neighbours up in the segment's own pixel set.
fn adjacent((y, x): Pixel) -> impl Iterator<Item = Pixel> {
    NEIGHBORS_8.into_iter().filter_map(move |(dy, dx)| {
        Some((y.checked_add_signed(dy)?, x.checked_add_signed(dx)?))
    })
}

#[derive(Debug, PartialEq)]
struct FloodFront {
    value: f64,
    pixel: Pixel,
    owner: usize,
}

impl Eq for FloodFront {}

impl Ord for FloodFront {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value
            .total_cmp(&other.value)
            .then_with(|| other.pixel.cmp(&self.pixel))
    }
}

impl PartialOrd for FloodFront {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Assign every pixel of the segment to one of `seeds`, flooding from the
/// brightest unassigned neighbour first.
fn watershed(values: &HashMap<Pixel, f64>, seeds: &[Vec<Pixel>]) -> Vec<Vec<Pixel>> {
    let mut owner: HashMap<Pixel, usize> = HashMap::with_capacity(values.len());
    let mut queue = BinaryHeap::new();

    for (index, seed) in seeds.iter().enumerate() {
        for &p in seed {
            owner.insert(p, index);
        }
    }
    for (index, seed) in seeds.iter().enumerate() {
        for &(y, x) in seed {
            push_neighbors(values, &owner, &mut queue, (y, x), index);
        }
    }

    while let Some(front) = queue.pop() {
        if owner.contains_key(&front.pixel) {
            continue;
        }
        owner.insert(front.pixel, front.owner);
        push_neighbors(values, &owner, &mut queue, front.pixel, front.owner);
    }

    let mut objects = vec![Vec::new(); seeds.len()];
    let mut pixels: Vec<Pixel> = values.keys().copied().collect();
    pixels.sort_unstable();
    for p in pixels {
        if let Some(&index) = owner.get(&p) {
            objects[index].push(p);
        }
    }
    objects
}

fn push_neighbors(
    values: &HashMap<Pixel, f64>,
    owner: &HashMap<Pixel, usize>,
    queue: &mut BinaryHeap<FloodFront>,
    (y, x): Pixel,
    index: usize,
) {
    for n in adjacent((y, x)) {
        if owner.contains_key(&n) {
            continue;
        }
        if let Some(&value) = values.get(&n) {
            queue.push(FloodFront {
                value,
                pixel: n,
                owner: index,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_proc::segment::detect_sources;

    fn gaussian(image: &mut Array2<f64>, cx: f64, cy: f64, amplitude: f64, sigma: f64) {
        for ((y, x), v) in image.indexed_iter_mut() {
            let dx = x as f64 - cx;
            let dy = y as f64 - cy;
            *v += amplitude * (-(dx * dx + dy * dy) / (2.0 * sigma * sigma)).exp();
        }
    }

    fn config() -> DetectionConfig {
        DetectionConfig {
            threshold: 0.05,
            npixels: 5,
            ..DetectionConfig::default()
        }
    }

    #[test]
    fn test_blended_pair_is_split() {
        let mut image = Array2::zeros((30, 40));
        gaussian(&mut image, 14.0, 15.0, 1.0, 2.5);
        gaussian(&mut image, 24.0, 15.0, 0.8, 2.5);

        let segm = detect_sources(image.view(), 0.05, 5);
        assert_eq!(segm.n_labels(), 1, "pair should be blended at this threshold");

        let deblended = deblend_sources(image.view(), &segm, &config());
        assert_eq!(deblended.n_labels(), 2);

        let labels = deblended.labels();
        assert_ne!(labels[[15, 14]], labels[[15, 24]]);
        assert!(labels[[15, 14]] > 0 && labels[[15, 24]] > 0);
        // every segment pixel is kept
        assert_eq!(
            deblended.areas().iter().sum::<usize>(),
            segm.areas().iter().sum::<usize>()
        );
    }

    #[test]
    fn test_single_peak_is_kept_whole() {
        let mut image = Array2::zeros((30, 30));
        gaussian(&mut image, 15.0, 15.0, 1.0, 3.0);

        let segm = detect_sources(image.view(), 0.05, 5);
        let deblended = deblend_sources(image.view(), &segm, &config());
        assert_eq!(deblended, segm);
    }

    #[test]
    fn test_contrast_suppresses_faint_companion() {
        let mut image = Array2::zeros((30, 40));
        gaussian(&mut image, 14.0, 15.0, 1.0, 2.5);
        gaussian(&mut image, 22.0, 15.0, 0.2, 1.5);

        let segm = detect_sources(image.view(), 0.05, 5);
        let strict = DetectionConfig {
            contrast: 0.5,
            ..config()
        };
        assert_eq!(deblend_sources(image.view(), &segm, &strict).n_labels(), 1);
    }

    #[test]
    fn test_threshold_levels() {
        let levels = threshold_levels(1.0, 100.0, 3);
        assert_eq!(levels.len(), 3);
        assert!((levels[1] - 10.0).abs() < 1e-9);
        assert!(levels.windows(2).all(|w| w[0] < w[1]));

        let linear = threshold_levels(-1.0, 1.0, 1);
        assert_eq!(linear, vec![0.0]);
    }
}
