//! Multi-band retrieval with bulk and per-survey fallback.
//!
//! Each survey group (composite bands, contour bands) is first fetched as a
//! bulk attempt: every survey in order, abandoned at the first failure. If the
//! bulk attempt fails, the remaining surveys of that group are fetched one by
//! one, each with its own bounded retry of transient failures, and each
//! failure is recorded as that survey's [`FetchOutcome`] instead of aborting.
//! Surveys that arrived before the bulk attempt failed are kept.

use ndarray::{Array2, Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::service::{CutoutParams, CutoutService, FetchError, SurveyImage};
use crate::config::RetrievalConfig;
use crate::image_proc::normalize;
use crate::image_size::ImageSize;
use crate::sky_position::SkyPosition;
use crate::survey::SurveyId;

/// Result of fetching one survey.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Fetched(SurveyImage),
    /// Permanent: no coverage, unresolvable target, malformed response
    NotFound { reason: String },
    /// Retries exhausted on network errors, timeouts or server errors
    TransientFailure { reason: String },
}

impl FetchOutcome {
    pub fn is_fetched(&self) -> bool {
        matches!(self, FetchOutcome::Fetched(_))
    }

    pub fn image(&self) -> Option<&SurveyImage> {
        match self {
            FetchOutcome::Fetched(image) => Some(image),
            _ => None,
        }
    }

    /// Failure reason, `None` when fetched
    pub fn reason(&self) -> Option<&str> {
        match self {
            FetchOutcome::Fetched(_) => None,
            FetchOutcome::NotFound { reason } | FetchOutcome::TransientFailure { reason } => {
                Some(reason)
            }
        }
    }
}

impl From<Result<SurveyImage, FetchError>> for FetchOutcome {
    fn from(result: Result<SurveyImage, FetchError>) -> Self {
        match result {
            Ok(image) => FetchOutcome::Fetched(image),
            Err(FetchError::NotFound { reason, .. }) => FetchOutcome::NotFound { reason },
            Err(FetchError::Transient { reason, .. }) => FetchOutcome::TransientFailure { reason },
        }
    }
}

/// Which failures may be replaced by an all-zero band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ZeroFillPolicy {
    /// Any failure becomes a zero band
    #[default]
    Always,
    /// Only permanent failures become zero bands; a transient failure that
    /// survives its retries fails the whole retrieval
    NotFoundOnly,
}

/// Every band of one retrieval, in survey-list order.
#[derive(Debug, Clone)]
pub struct BandSet {
    surveys: Vec<SurveyId>,
    contour_surveys: Vec<SurveyId>,
    outcomes: Vec<FetchOutcome>,
    size: ImageSize,
    normalized: Array3<f64>,
    contours: Array3<f64>,
}

impl BandSet {
    /// Assemble a band set from per-survey outcomes.
    ///
    /// `surveys` is the full survey list and `outcomes` matches it one to one;
    /// `contour_surveys` picks which of them are kept raw for contours. Failed
    /// bands, and fetched bands whose size differs from `size`, are
    /// represented by zeros. Only [`fetch_bands`] builds band sets, so a
    /// length mismatch is a bug and panics.
    pub(crate) fn from_outcomes(
        surveys: Vec<SurveyId>,
        contour_surveys: Vec<SurveyId>,
        outcomes: Vec<FetchOutcome>,
        size: ImageSize,
    ) -> Self {
        assert_eq!(
            surveys.len(),
            outcomes.len(),
            "one outcome per survey is required"
        );

        let mut normalized = Array3::zeros((surveys.len(), size.height, size.width));
        for (i, outcome) in outcomes.iter().enumerate() {
            if let Some(data) = sized_band(outcome, size) {
                normalized.index_axis_mut(Axis(0), i).assign(&normalize(data));
            }
        }

        let mut contours = Array3::zeros((contour_surveys.len(), size.height, size.width));
        for (j, survey) in contour_surveys.iter().enumerate() {
            let raw = surveys
                .iter()
                .position(|s| s == survey)
                .and_then(|i| sized_band(&outcomes[i], size));
            if let Some(data) = raw {
                contours.index_axis_mut(Axis(0), j).assign(data);
            }
        }

        Self {
            surveys,
            contour_surveys,
            outcomes,
            size,
            normalized,
            contours,
        }
    }

    pub fn surveys(&self) -> &[SurveyId] {
        &self.surveys
    }

    pub fn contour_surveys(&self) -> &[SurveyId] {
        &self.contour_surveys
    }

    pub fn outcomes(&self) -> &[FetchOutcome] {
        &self.outcomes
    }

    pub fn size(&self) -> ImageSize {
        self.size
    }

    fn index_of(&self, survey: SurveyId) -> Option<usize> {
        self.surveys.iter().position(|&s| s == survey)
    }

    pub fn contains(&self, survey: SurveyId) -> bool {
        self.index_of(survey).is_some()
    }

    pub fn outcome(&self, survey: SurveyId) -> Option<&FetchOutcome> {
        self.index_of(survey).map(|i| &self.outcomes[i])
    }

    /// Raw image and header of a fetched survey
    pub fn image(&self, survey: SurveyId) -> Option<&SurveyImage> {
        self.outcome(survey).and_then(FetchOutcome::image)
    }

    /// Normalized band in `[0, 1]`; zeros when the fetch failed
    pub fn normalized(&self, survey: SurveyId) -> Option<ArrayView2<'_, f64>> {
        self.index_of(survey)
            .map(|i| self.normalized.index_axis(Axis(0), i))
    }

    /// Raw contour band; zeros when the fetch failed
    pub fn contour(&self, survey: SurveyId) -> Option<ArrayView2<'_, f64>> {
        self.contour_surveys
            .iter()
            .position(|&s| s == survey)
            .map(|j| self.contours.index_axis(Axis(0), j))
    }

    /// All normalized bands stacked `(N, H, W)`
    pub fn normalized_stack(&self) -> &Array3<f64> {
        &self.normalized
    }

    /// All raw contour bands stacked `(M, H, W)`
    pub fn contour_stack(&self) -> &Array3<f64> {
        &self.contours
    }

    /// Surveys represented by zeros
    pub fn failed(&self) -> Vec<SurveyId> {
        self.surveys
            .iter()
            .zip(&self.outcomes)
            .filter(|(_, outcome)| !outcome.is_fetched())
            .map(|(&survey, _)| survey)
            .collect()
    }
}

fn sized_band(outcome: &FetchOutcome, size: ImageSize) -> Option<&Array2<f64>> {
    outcome
        .image()
        .map(|image| &image.data)
        .filter(|data| ImageSize::of(*data) == size)
}

/// Fetch every configured survey around `position`.
///
/// Never fails for [`ZeroFillPolicy::Always`]. With
/// [`ZeroFillPolicy::NotFoundOnly`] the first survey whose transient failure
/// outlived its retries is returned as the error.
pub fn fetch_bands<S: CutoutService + ?Sized>(
    service: &S,
    position: &SkyPosition,
    config: &RetrievalConfig,
) -> Result<BandSet, FetchError> {
    let retry = RetryPolicy {
        max_retries: config.max_retries,
        delay: Duration::from_millis(config.retry_delay_ms),
    };

    let mut outcomes = fetch_group(
        service,
        position,
        &config.composite_surveys,
        &config.composite_params,
        &retry,
    );
    outcomes.extend(fetch_group(
        service,
        position,
        &config.contour_surveys,
        &config.contour_params,
        &retry,
    ));

    let surveys = config.surveys();
    for (&survey, outcome) in surveys.iter().zip(&outcomes) {
        match outcome {
            FetchOutcome::Fetched(_) => {}
            FetchOutcome::NotFound { reason } => {
                log::warn!("{survey} not available, using a zero band: {reason}");
            }
            FetchOutcome::TransientFailure { reason } => {
                if config.zero_fill == ZeroFillPolicy::NotFoundOnly {
                    return Err(FetchError::Transient {
                        survey,
                        reason: reason.clone(),
                    });
                }
                log::warn!("{survey} failed after retries, using a zero band: {reason}");
            }
        }
    }

    let fetched = outcomes.iter().filter(|o| o.is_fetched()).count();
    log::info!("Fetched {fetched} of {} surveys for {position}", surveys.len());

    Ok(BandSet::from_outcomes(
        surveys,
        config.contour_surveys.clone(),
        outcomes,
        config.composite_params.image_size(),
    ))
}

struct RetryPolicy {
    max_retries: u32,
    delay: Duration,
}

fn fetch_group<S: CutoutService + ?Sized>(
    service: &S,
    position: &SkyPosition,
    surveys: &[SurveyId],
    params: &CutoutParams,
    retry: &RetryPolicy,
) -> Vec<FetchOutcome> {
    let mut outcomes = Vec::with_capacity(surveys.len());

    for &survey in surveys {
        match fetch_sized(service, position, survey, params) {
            Ok(image) => outcomes.push(FetchOutcome::Fetched(image)),
            Err(e) => {
                log::warn!(
                    "Bulk fetch of {} surveys stopped at {e}; fetching the rest individually",
                    surveys.len()
                );
                break;
            }
        }
    }

    for &survey in &surveys[outcomes.len()..] {
        outcomes.push(fetch_with_retries(service, position, survey, params, retry));
    }
    outcomes
}

fn fetch_with_retries<S: CutoutService + ?Sized>(
    service: &S,
    position: &SkyPosition,
    survey: SurveyId,
    params: &CutoutParams,
    retry: &RetryPolicy,
) -> FetchOutcome {
    let mut attempt = 0;
    loop {
        match fetch_sized(service, position, survey, params) {
            Err(e) if e.is_transient() && attempt < retry.max_retries => {
                attempt += 1;
                log::debug!("{e}; retry {attempt} of {}", retry.max_retries);
                if !retry.delay.is_zero() {
                    std::thread::sleep(retry.delay);
                }
            }
            result => return result.into(),
        }
    }
}

/// Fetch and reject cutouts whose size differs from the request.
fn fetch_sized<S: CutoutService + ?Sized>(
    service: &S,
    position: &SkyPosition,
    survey: SurveyId,
    params: &CutoutParams,
) -> Result<SurveyImage, FetchError> {
    let image = service.fetch(position, survey, params)?;
    let expected = params.image_size();
    if image.size() != expected {
        return Err(FetchError::NotFound {
            survey,
            reason: format!("returned {} pixels, requested {expected}", image.size()),
        });
    }
    Ok(image)
}
