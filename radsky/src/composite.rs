//! RGB composites of normalized survey bands.

use ndarray::{Array3, ArrayView2, Axis};
use thiserror::Error;

use crate::image_size::ImageSize;
use crate::retrieval::BandSet;
use crate::survey::{BandRole, CompositeKey, SurveyId};
use crate::wcs::Wcs;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompositeError {
    #[error("{composite} composite needs {survey}, which is not in the survey list")]
    MissingSurvey {
        composite: CompositeKey,
        survey: SurveyId,
    },
    #[error("{0} was not retrieved as a contour band")]
    MissingContour(SurveyId),
}

/// Three normalized bands stacked as red, green, blue.
#[derive(Debug, Clone)]
pub struct RgbComposite {
    pub key: CompositeKey,
    /// Shape `(H, W, 3)`, channel order red, green, blue, values in `[0, 1]`
    pub image: Array3<f64>,
    /// Projection of the composite's pixel grid
    pub wcs: Option<Wcs>,
}

impl RgbComposite {
    pub fn size(&self) -> ImageSize {
        let (height, width, _) = self.image.dim();
        ImageSize::from_width_height(width, height)
    }

    pub fn channel(&self, role: BandRole) -> ArrayView2<'_, f64> {
        self.image.index_axis(Axis(2), role.channel())
    }

    /// 8-bit colour of pixel `(row, col)`
    pub fn rgb8(&self, row: usize, col: usize) -> [u8; 3] {
        BandRole::ALL.map(|role| {
            let v = self.image[[row, col, role.channel()]];
            (v.clamp(0.0, 1.0) * 255.0).round() as u8
        })
    }
}

/// Stack the three bands named by `key` along a trailing channel axis.
///
/// The composite takes the red band's WCS; when the red band carries none
/// (failed fetch or a header without WCS), the first green or blue band that
/// does is used instead.
pub fn compose(bands: &BandSet, key: CompositeKey) -> Result<RgbComposite, CompositeError> {
    let channels = key
        .bands()
        .map(|survey| bands.normalized(survey).ok_or(CompositeError::MissingSurvey {
            composite: key,
            survey,
        }));

    let size = bands.size();
    let mut image = Array3::zeros((size.height, size.width, 3));
    for (role, channel) in BandRole::ALL.into_iter().zip(channels) {
        image.index_axis_mut(Axis(2), role.channel()).assign(&channel?);
    }

    let band_wcs = |survey: SurveyId| bands.image(survey).and_then(|image| image.wcs.clone());
    let wcs = band_wcs(key.band(BandRole::Red)).or_else(|| {
        let fallback = [BandRole::Green, BandRole::Blue]
            .into_iter()
            .find_map(|role| band_wcs(key.band(role)));
        if fallback.is_some() {
            log::debug!("{key}: red band has no WCS, projecting on another band's");
        }
        fallback
    });
    if wcs.is_none() {
        log::warn!("{key}: no band carries a WCS, axes will be in pixels");
    }

    Ok(RgbComposite { key, image, wcs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fits::FitsHeader;
    use crate::retrieval::{FetchOutcome, SurveyImage};
    use ndarray::Array2;

    fn band(survey: SurveyId, scale: f64, wcs: Option<Wcs>) -> FetchOutcome {
        FetchOutcome::Fetched(SurveyImage {
            survey,
            header: FitsHeader::new(),
            data: Array2::from_shape_fn((4, 5), |(y, x)| scale * (y * 5 + x) as f64),
            wcs,
        })
    }

    fn optical_bands(red_wcs: Option<Wcs>) -> BandSet {
        let green_wcs = Wcs::tan((10.0, 20.0), (3.0, 2.5), (-0.01, 0.01)).ok();
        BandSet::from_outcomes(
            vec![SurveyId::Dss2Ir, SurveyId::Dss2Red, SurveyId::Dss2Blue],
            vec![],
            vec![
                band(SurveyId::Dss2Ir, 1.0, red_wcs),
                band(SurveyId::Dss2Red, 2.0, green_wcs),
                FetchOutcome::NotFound {
                    reason: "no coverage".into(),
                },
            ],
            ImageSize::from_width_height(5, 4),
        )
    }

    #[test]
    fn test_compose_stacks_three_channels() {
        let red_wcs = Wcs::tan((10.0, 20.0), (3.0, 2.5), (-0.02, 0.02)).ok();
        let composite = compose(&optical_bands(red_wcs.clone()), CompositeKey::Optical).unwrap();

        assert_eq!(composite.image.dim(), (4, 5, 3));
        assert_eq!(composite.size(), ImageSize::from_width_height(5, 4));
        assert_eq!(composite.channel(BandRole::Red)[[3, 4]], 1.0);
        assert_eq!(composite.channel(BandRole::Green)[[0, 0]], 0.0);
        assert!(composite.channel(BandRole::Blue).iter().all(|&v| v == 0.0));
        assert_eq!(composite.rgb8(3, 4), [255, 255, 0]);
        assert_eq!(composite.wcs, red_wcs);
    }

    #[test]
    fn test_wcs_falls_back_to_green_band() {
        let composite = compose(&optical_bands(None), CompositeKey::Optical).unwrap();
        let (ra, _) = composite.wcs.expect("green WCS").reference();
        assert_eq!(ra, 10.0);
    }

    #[test]
    fn test_missing_survey_is_an_error() {
        let err = compose(&optical_bands(None), CompositeKey::Iou).unwrap_err();
        assert_eq!(
            err,
            CompositeError::MissingSurvey {
                composite: CompositeKey::Iou,
                survey: SurveyId::Wise22
            }
        );
    }
}
