//! Cutout services: where survey images come from.
//!
//! [`CutoutService`] is the seam between the retrieval logic and the network.
//! [`SkyViewClient`] talks to NASA SkyView's batch interface over HTTP and
//! classifies every failure as either permanent (`NotFound`) or worth retrying
//! (`Transient`).

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::RetrievalConfig;
use crate::fits::{FitsError, FitsHeader, FitsImage};
use crate::image_size::ImageSize;
use crate::sky_position::SkyPosition;
use crate::survey::{Sampler, Scaling, SurveyId};
use crate::wcs::Wcs;

/// Upper bound on a cutout download
/// Path of SkyView's batch query script relative to the service base URL
pub const RUNQUERY_PATH: &str = "/current/cgi/runquery.pl";

const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("{survey}: not available ({reason})")]
    NotFound { survey: SurveyId, reason: String },
    #[error("{survey}: transient failure ({reason})")]
    Transient { survey: SurveyId, reason: String },
}

impl FetchError {
    pub fn survey(&self) -> SurveyId {
        match self {
            FetchError::NotFound { survey, .. } | FetchError::Transient { survey, .. } => *survey,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            FetchError::NotFound { reason, .. } | FetchError::Transient { reason, .. } => reason,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }
}

/// Per-group request parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CutoutParams {
    /// Cutout side length in pixels
    pub pixels: usize,
    pub scaling: Scaling,
    pub sampler: Sampler,
}

impl CutoutParams {
    pub fn image_size(&self) -> ImageSize {
        ImageSize::square(self.pixels)
    }
}

/// One fetched survey cutout.
#[derive(Debug, Clone)]
pub struct SurveyImage {
    pub survey: SurveyId,
    pub header: FitsHeader,
    /// Pixel values shaped `(rows, cols)`, row 0 at the bottom of the sky
    pub data: Array2<f64>,
    /// Celestial WCS, when the header carries a usable one
    pub wcs: Option<Wcs>,
}

impl SurveyImage {
    /// Take the image plane of a decoded FITS file and read its WCS.
    pub fn from_fits(survey: SurveyId, fits: FitsImage) -> Result<Self, FitsError> {
        let data = fits.plane()?;
        let wcs = match Wcs::from_header(&fits.header) {
            Ok(wcs) => Some(wcs),
            Err(e) => {
                log::debug!("{survey}: no usable WCS ({e})");
                None
            }
        };
        Ok(Self {
            survey,
            header: fits.header,
            data,
            wcs,
        })
    }

    pub fn size(&self) -> ImageSize {
        ImageSize::of(&self.data)
    }

    pub fn to_fits(&self) -> FitsImage {
        FitsImage::from_array(&self.data, self.header.clone())
    }
}

/// Source of survey cutouts.
pub trait CutoutService {
    /// Fetch one survey's cutout centred on `position`.
    fn fetch(
        &self,
        position: &SkyPosition,
        survey: SurveyId,
        params: &CutoutParams,
    ) -> Result<SurveyImage, FetchError>;
}

impl<S: CutoutService + ?Sized> CutoutService for &S {
    fn fetch(
        &self,
        position: &SkyPosition,
        survey: SurveyId,
        params: &CutoutParams,
    ) -> Result<SurveyImage, FetchError> {
        (**self).fetch(position, survey, params)
    }
}

impl<S: CutoutService + ?Sized> CutoutService for Box<S> {
    fn fetch(
        &self,
        position: &SkyPosition,
        survey: SurveyId,
        params: &CutoutParams,
    ) -> Result<SurveyImage, FetchError> {
        (**self).fetch(position, survey, params)
    }
}

/// HTTP client for SkyView's `runquery.pl` batch interface.
pub struct SkyViewClient {
    agent: ureq::Agent,
    base_url: String,
}

impl SkyViewClient {
    pub fn new(config: &RetrievalConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    fn query_url(&self) -> String {
        format!("{}{RUNQUERY_PATH}", self.base_url)
    }
}

impl CutoutService for SkyViewClient {
    fn fetch(
        &self,
        position: &SkyPosition,
        survey: SurveyId,
        params: &CutoutParams,
    ) -> Result<SurveyImage, FetchError> {
        let url = self.query_url();
        log::debug!("Requesting {survey} at {position} from {url}");

        let mut request = self
            .agent
            .get(&url)
            .query("Position", position.target.query_value())
            .query("Survey", survey.name())
            .query("Pixels", params.pixels.to_string())
            .query("Size", position.size_deg().to_string())
            .query("Scaling", params.scaling.name())
            .query("Return", "FITS");
        if let Some(sampler) = params.sampler.param() {
            request = request.query("Sampler", sampler);
        }

        let transient = |reason: String| FetchError::Transient { survey, reason };

        let mut response = request.call().map_err(|e| transient(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_BYTES)
            .read_to_vec()
            .map_err(|e| transient(format!("reading response body: {e}")))?;

        interpret_response(survey, status, &body)
    }
}

/// Turn an HTTP status and body into a cutout or a classified failure.
///
/// 5xx, 408 and 429 are transient. Any other non-success status is permanent,
/// as is a successful response whose body is not FITS (SkyView answers an
/// unresolvable name or a survey without coverage with an HTML page). A FITS
/// body cut short is treated as a dropped connection.
pub fn interpret_response(
    survey: SurveyId,
    status: u16,
    body: &[u8],
) -> Result<SurveyImage, FetchError> {
    let not_found = |reason: String| FetchError::NotFound { survey, reason };
    let transient = |reason: String| FetchError::Transient { survey, reason };

    match status {
        200..=299 => {}
        408 | 429 | 500..=599 => return Err(transient(format!("HTTP {status}"))),
        _ => return Err(not_found(format!("HTTP {status}"))),
    }

    if !body.starts_with(b"SIMPLE") {
        return Err(not_found(summarize_text(body)));
    }

    let fits = FitsImage::from_bytes(body).map_err(|e| match e {
        FitsError::Truncated { .. } => transient(e.to_string()),
        other => not_found(other.to_string()),
    })?;
    SurveyImage::from_fits(survey, fits).map_err(|e| not_found(e.to_string()))
}

/// First non-blank line of a text body, tags stripped, for log messages.
fn summarize_text(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let mut plain = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                plain.push(' ');
            }
            _ if !in_tag => plain.push(c),
            _ => {}
        }
    }

    let line = plain
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("empty response");
    let summary: String = line.chars().take(160).collect();
    format!("non-FITS response: {summary}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fits::HeaderValue;

    fn fits_body(rows: usize, cols: usize) -> Vec<u8> {
        let data = Array2::from_shape_fn((rows, cols), |(y, x)| (y * cols + x) as f64);
        let mut header = FitsHeader::new();
        Wcs::tan((150.0, 2.0), (cols as f64 / 2.0, rows as f64 / 2.0), (-0.001, 0.001))
            .unwrap()
            .write_to_header(&mut header);
        header.set("OBJECT", HeaderValue::Text("test".into()));
        FitsImage::from_array(&data, header).to_bytes().unwrap()
    }

    #[test]
    fn test_fits_body_becomes_image() {
        let image = interpret_response(SurveyId::Nvss, 200, &fits_body(4, 6)).unwrap();
        assert_eq!(image.survey, SurveyId::Nvss);
        assert_eq!(image.size(), ImageSize::from_width_height(6, 4));
        assert_eq!(image.data[[1, 2]], 8.0);
        assert!(image.wcs.is_some());
    }

    #[test]
    fn test_html_error_page_is_not_found() {
        let body = b"<html><body>\n<h2>Error: Unable to resolve 'NOT AN OBJECT'</h2></body></html>";
        let err = interpret_response(SurveyId::Dss2Red, 200, body).unwrap_err();
        assert!(!err.is_transient());
        assert!(err.reason().contains("Unable to resolve"), "{}", err.reason());
    }

    #[test]
    fn test_status_classification() {
        assert!(interpret_response(SurveyId::Wise22, 503, b"").unwrap_err().is_transient());
        assert!(interpret_response(SurveyId::Wise22, 429, b"").unwrap_err().is_transient());
        let err = interpret_response(SurveyId::Wise22, 404, b"").unwrap_err();
        assert_eq!(
            err,
            FetchError::NotFound {
                survey: SurveyId::Wise22,
                reason: "HTTP 404".into()
            }
        );
    }

    #[test]
    fn test_truncated_fits_is_transient() {
        let body = fits_body(10, 10);
        let err = interpret_response(SurveyId::TgssAdr1, 200, &body[..body.len() - 2880]).unwrap_err();
        assert!(err.is_transient());
        assert_eq!(err.survey(), SurveyId::TgssAdr1);
    }

    #[test]
    fn test_malformed_fits_headers_are_classified() {
        let card = |text: &str| format!("{text:<80}");

        let header_only: String = [
            "SIMPLE  =                    T",
            "BITPIX  =                  -32",
            "NAXIS   =                    0",
            "END",
        ]
        .iter()
        .map(|c| card(c))
        .collect();
        let err = interpret_response(SurveyId::Nvss, 200, header_only.as_bytes()).unwrap_err();
        assert!(err.is_transient());

        let mut oversized: String = [
            "SIMPLE  =                    T".to_string(),
            "BITPIX  =                  -32".to_string(),
            "NAXIS   =                    2".to_string(),
            format!("NAXIS1  = {:>20}", 1u64 << 62),
            "NAXIS2  =                    8".to_string(),
            "END".to_string(),
        ]
        .iter()
        .map(|c| card(c))
        .collect();
        oversized.push_str(&" ".repeat(2880 - oversized.len()));
        let err = interpret_response(SurveyId::Nvss, 200, oversized.as_bytes()).unwrap_err();
        assert!(!err.is_transient());
        assert!(err.reason().contains("NAXIS1"), "{}", err.reason());
    }
}
