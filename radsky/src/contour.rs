//! Contour levels and contour lines for radio overlays.
//!
//! Lines are traced with marching squares on the raw (un-normalized) radio
//! map and then carried into the pixel grid of the image they are drawn on,
//! through world coordinates, so a contour map need not share the composite's
//! projection.

use ndarray::ArrayView2;
use std::collections::HashMap;

use crate::composite::CompositeError;
use crate::config::ContourConfig;
use crate::retrieval::BandSet;
use crate::stats::PixelStats;
use crate::survey::ContourKey;
use crate::wcs::Wcs;

/// Levels `min + k * (max - min) / n` for `k = 0, 1, ...` while below `max`.
///
/// Strictly increasing, starting at `min`, never reaching `max`. Empty when
/// `max <= min`, when `n == 0` or when either bound is not finite.
pub fn contour_levels(min: f64, max: f64, n: usize) -> Vec<f64> {
    if n == 0 || !min.is_finite() || !max.is_finite() || max <= min {
        return Vec::new();
    }
    let step = (max - min) / n as f64;
    (0..n)
        .map(|k| min + k as f64 * step)
        .filter(|&level| level < max)
        .collect()
}

/// One connected iso-line, in `(x, y)` pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct ContourLine {
    pub level: f64,
    pub points: Vec<(f64, f64)>,
    /// First and last point coincide
    pub closed: bool,
}

/// Crossing points on cell edges, identified by the edge's lower-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Edge {
    /// From `(x, y)` to `(x + 1, y)`
    Horizontal(usize, usize),
    /// From `(x, y)` to `(x, y + 1)`
    Vertical(usize, usize),
}

/// Trace the iso-lines of `data` at `level` with marching squares.
///
/// Cells touching a NaN pixel are skipped. Saddle cells are resolved with the
/// mean of their four corners.
pub fn trace_contours(data: ArrayView2<f64>, level: f64) -> Vec<ContourLine> {
    let (rows, cols) = data.dim();
    if rows < 2 || cols < 2 {
        return Vec::new();
    }

    let mut crossings: HashMap<Edge, (f64, f64)> = HashMap::new();
    let mut segments: Vec<(Edge, Edge)> = Vec::new();

    let mut crossing = |edge: Edge| -> Edge {
        crossings.entry(edge).or_insert_with(|| {
            let ((x0, y0), (x1, y1)) = match edge {
                Edge::Horizontal(x, y) => ((x, y), (x + 1, y)),
                Edge::Vertical(x, y) => ((x, y), (x, y + 1)),
            };
            let v0 = data[[y0, x0]];
            let v1 = data[[y1, x1]];
            let t = if v1 == v0 { 0.5 } else { (level - v0) / (v1 - v0) };
            (
                x0 as f64 + t * (x1 as f64 - x0 as f64),
                y0 as f64 + t * (y1 as f64 - y0 as f64),
            )
        });
        edge
    };

    for y in 0..rows - 1 {
        for x in 0..cols - 1 {
            // corners counter-clockwise from the lower left
            let v = [
                data[[y, x]],
                data[[y, x + 1]],
                data[[y + 1, x + 1]],
                data[[y + 1, x]],
            ];
            if v.iter().any(|c| c.is_nan()) {
                continue;
            }
            let case = v
                .iter()
                .enumerate()
                .fold(0u8, |acc, (i, &c)| acc | (u8::from(c >= level) << i));
            if case == 0 || case == 15 {
                continue;
            }

            let bottom = Edge::Horizontal(x, y);
            let right = Edge::Vertical(x + 1, y);
            let top = Edge::Horizontal(x, y + 1);
            let left = Edge::Vertical(x, y);
            let center_above = v.iter().sum::<f64>() / 4.0 >= level;

            let pairs: &[(Edge, Edge)] = match case {
                1 | 14 => &[(left, bottom)],
                2 | 13 => &[(bottom, right)],
                3 | 12 => &[(left, right)],
                4 | 11 => &[(right, top)],
                6 | 9 => &[(bottom, top)],
                7 | 8 => &[(left, top)],
                5 if center_above => &[(bottom, right), (top, left)],
                5 => &[(left, bottom), (right, top)],
                10 if center_above => &[(left, bottom), (right, top)],
                _ => &[(bottom, right), (top, left)],
            };
            for &(a, b) in pairs {
                segments.push((crossing(a), crossing(b)));
            }
        }
    }

    join_segments(&segments, &crossings, level)
}

/// Chain segments sharing an edge crossing into polylines.
fn join_segments(
    segments: &[(Edge, Edge)],
    crossings: &HashMap<Edge, (f64, f64)>,
    level: f64,
) -> Vec<ContourLine> {
    let mut by_edge: HashMap<Edge, Vec<usize>> = HashMap::new();
    for (i, &(a, b)) in segments.iter().enumerate() {
        by_edge.entry(a).or_default().push(i);
        by_edge.entry(b).or_default().push(i);
    }

    let mut used = vec![false; segments.len()];
    let mut lines = Vec::new();

    let next_segment = |edge: Edge, used: &mut [bool]| -> Option<Edge> {
        let &i = by_edge.get(&edge)?.iter().find(|&&i| !used[i])?;
        used[i] = true;
        let (a, b) = segments[i];
        Some(if a == edge { b } else { a })
    };

    for start in 0..segments.len() {
        if used[start] {
            continue;
        }
        used[start] = true;
        let (a, b) = segments[start];

        let mut forward = vec![a, b];
        let mut end = b;
        while let Some(edge) = next_segment(end, &mut used) {
            forward.push(edge);
            end = edge;
        }
        let mut backward = Vec::new();
        let mut end = a;
        while let Some(edge) = next_segment(end, &mut used) {
            backward.push(edge);
            end = edge;
        }
        backward.reverse();
        backward.extend(forward);

        let closed = backward.len() > 2 && backward.first() == backward.last();
        let points = backward
            .iter()
            .filter_map(|edge| crossings.get(edge).copied())
            .collect();
        lines.push(ContourLine {
            level,
            points,
            closed,
        });
    }
    lines
}

/// Contours of one radio survey, ready to draw over a composite.
#[derive(Debug, Clone, PartialEq)]
pub struct ContourLayer {
    pub key: ContourKey,
    pub levels: Vec<f64>,
    /// Lines in the target image's pixel coordinates
    pub lines: Vec<ContourLine>,
}

impl ContourLayer {
    /// Contours of `key`'s raw band at `config.levels` levels between the
    /// survey's minimum and the band maximum, expressed in the pixel grid of
    /// `target`.
    ///
    /// When either side lacks a WCS the contour band is assumed to share the
    /// target's pixel grid, which holds for cutouts requested with the same
    /// position, size and pixel count.
    pub fn build(
        bands: &BandSet,
        key: ContourKey,
        config: &ContourConfig,
        target: Option<&Wcs>,
    ) -> Result<Self, CompositeError> {
        let survey = key.survey();
        let raw = bands
            .contour(survey)
            .ok_or(CompositeError::MissingContour(survey))?;

        let minimum = config.minimum(key);
        let levels = match PixelStats::new(raw.iter().copied()).max() {
            Ok(max) => contour_levels(minimum, max, config.levels),
            Err(_) => Vec::new(),
        };
        if levels.is_empty() {
            log::warn!("{key}: map never exceeds the contour minimum {minimum}, no contours drawn");
        }

        let source_wcs = bands.image(survey).and_then(|image| image.wcs.as_ref());
        let lines = levels
            .iter()
            .flat_map(|&level| trace_contours(raw, level))
            .flat_map(|line| match (source_wcs, target) {
                (Some(from), Some(to)) if from != to => reproject(line, from, to),
                _ => vec![line],
            })
            .filter(|line| line.points.len() >= 2)
            .collect::<Vec<_>>();

        log::debug!("{key}: {} levels, {} lines", levels.len(), lines.len());
        Ok(Self { key, levels, lines })
    }
}

/// Map a line from `from`'s pixel grid into `to`'s, splitting it wherever a
/// point cannot be carried across.
fn reproject(line: ContourLine, from: &Wcs, to: &Wcs) -> Vec<ContourLine> {
    let mut pieces = Vec::new();
    let mut current = Vec::new();
    let total = line.points.len();

    for (x, y) in line.points {
        let mapped = from
            .pixel_to_world(x, y)
            .and_then(|(lon, lat)| to.world_to_pixel(lon, lat));
        match mapped {
            Ok(point) => current.push(point),
            Err(_) if !current.is_empty() => pieces.push(std::mem::take(&mut current)),
            Err(_) => {}
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }

    let closed = line.closed && pieces.len() == 1 && pieces[0].len() == total;
    pieces
        .into_iter()
        .map(|points| ContourLine {
            level: line.level,
            points,
            closed,
        })
        .collect()
}
