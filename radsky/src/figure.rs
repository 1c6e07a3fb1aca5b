//! Figures: an RGB composite with contour overlays.
//!
//! Construction does no I/O; see [`crate::render`] for drawing to disk.

use crate::composite::{compose, CompositeError, RgbComposite};
use crate::config::ContourConfig;
use crate::contour::ContourLayer;
use crate::retrieval::BandSet;
use crate::survey::{CompositeKey, ContourKey};

/// 8-bit line colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb(255, 255, 255);
    pub const RED: Rgb = Rgb(255, 0, 0);
    pub const BLUE: Rgb = Rgb(0, 0, 255);
}

/// Contour layer with the colour it is drawn in.
#[derive(Debug, Clone)]
pub struct Overlay {
    pub layer: ContourLayer,
    pub color: Rgb,
}

#[derive(Debug, Clone)]
pub struct Figure {
    pub title: String,
    pub composite: RgbComposite,
    pub overlays: Vec<Overlay>,
}

impl Figure {
    /// One composite with one contour survey drawn in white.
    pub fn rgb_with_contours(
        bands: &BandSet,
        composite: CompositeKey,
        contour: ContourKey,
        config: &ContourConfig,
    ) -> Result<Self, CompositeError> {
        let rgb = compose(bands, composite)?;
        let layer = ContourLayer::build(bands, contour, config, rgb.wcs.as_ref())?;
        Ok(Self {
            title: format!("{composite} RGB with {contour} contours"),
            composite: rgb,
            overlays: vec![Overlay {
                layer,
                color: Rgb::WHITE,
            }],
        })
    }

    /// One composite with two contour surveys, the first in red and the
    /// second in blue.
    pub fn dual_contours(
        bands: &BandSet,
        composite: CompositeKey,
        contours: [ContourKey; 2],
        config: &ContourConfig,
    ) -> Result<Self, CompositeError> {
        let rgb = compose(bands, composite)?;
        let [first, second] = contours;
        let overlays = [(first, Rgb::RED), (second, Rgb::BLUE)]
            .into_iter()
            .map(|(key, color)| {
                ContourLayer::build(bands, key, config, rgb.wcs.as_ref())
                    .map(|layer| Overlay { layer, color })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            title: format!("{composite} RGB with contours | {first} : Red, {second} : Blue"),
            composite: rgb,
            overlays,
        })
    }

    /// The default figure: IOU with TGSS and NVSS contours.
    pub fn dataset(bands: &BandSet, config: &ContourConfig) -> Result<Self, CompositeError> {
        Self::dual_contours(
            bands,
            CompositeKey::Iou,
            [ContourKey::Tgss, ContourKey::Nvss],
            config,
        )
    }
}
