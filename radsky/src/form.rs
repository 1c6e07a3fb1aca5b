//! SkyView query form.
//!
//! Holds the settings a user would pick by hand on the query page (object,
//! size, scaling, sampler, RGB overlays and contours) and submits them to
//! SkyView's batch query script under its parameter names, the same script
//! [`SkyViewClient`](crate::retrieval::SkyViewClient) fetches cutouts from.
//! The returned page is handed back as-is.

use std::time::Duration;
use thiserror::Error;

use crate::config::RetrievalConfig;
use crate::retrieval::RUNQUERY_PATH;
use crate::survey::{Sampler, Scaling, SurveyId};

const MAX_PAGE_BYTES: u64 = 16 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum FormError {
    #[error("Form submission failed: {0}")]
    Http(#[from] ureq::Error),
}

/// Every setting of the query form.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryForm {
    /// Coordinates or object name
    pub object: String,
    pub size_pix: u32,
    pub size_deg: f64,
    pub scaling: Scaling,
    pub sampler: Sampler,
    pub overlay_red: SurveyId,
    pub overlay_green: SurveyId,
    pub overlay_blue: SurveyId,
    pub contours: SurveyId,
    pub cont_scaling: Scaling,
    pub cont_min: f64,
    /// Upper contour limit; the contour range is only sent when this is set
    pub cont_max: Option<f64>,
    /// Number of contour levels, service default when unset
    pub cont_num: Option<u32>,
}

impl QueryForm {
    /// Radio-optical-radio overlay with TGSS contours at 600 px over 0.1°.
    pub fn for_object(object: &str) -> Self {
        Self {
            object: object.trim().to_string(),
            size_pix: 600,
            size_deg: 0.1,
            scaling: Scaling::Sqrt,
            sampler: Sampler::Lanczos3,
            overlay_red: SurveyId::TgssAdr1,
            overlay_green: SurveyId::Dss2Red,
            overlay_blue: SurveyId::Nvss,
            contours: SurveyId::TgssAdr1,
            cont_scaling: Scaling::Sqrt,
            cont_min: 0.015,
            cont_max: None,
            cont_num: None,
        }
    }

    /// Contour setting as `survey:scaling[:levels[:min:max]]`.
    ///
    /// A range needs a level count; [`DEFAULT_CONTOUR_LEVELS`] fills in when
    /// none is set.
    pub fn contour_spec(&self) -> String {
        let mut spec = format!("{}:{}", self.contours.name(), self.cont_scaling.name());
        match (self.cont_num, self.cont_max) {
            (n, Some(max)) => {
                let n = n.unwrap_or(DEFAULT_CONTOUR_LEVELS);
                spec.push_str(&format!(":{n}:{}:{max}", self.cont_min));
            }
            (Some(n), None) => spec.push_str(&format!(":{n}")),
            (None, None) => {}
        }
        spec
    }

    /// `(name, value)` pairs in the order the form lays them out. The three
    /// overlay surveys are sent as repeated `Survey` values in red, green,
    /// blue order with `RGB` set.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("Position", self.object.clone()),
            ("Pixels", self.size_pix.to_string()),
            ("Size", self.size_deg.to_string()),
            ("Scaling", self.scaling.name().to_string()),
        ];
        if let Some(sampler) = self.sampler.param() {
            fields.push(("Sampler", sampler.to_string()));
        }
        for survey in [self.overlay_red, self.overlay_green, self.overlay_blue] {
            fields.push(("Survey", survey.name().to_string()));
        }
        fields.push(("RGB", "1".to_string()));
        fields.push(("contour", self.contour_spec()));
        fields
    }
}

/// Level count sent with a contour range when none is given
pub const DEFAULT_CONTOUR_LEVELS: u32 = 5;

/// Raw reply to a form submission.
#[derive(Debug, Clone, PartialEq)]
pub struct FormResponse {
    pub status: u16,
    pub body: String,
}

impl FormResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Posts [`QueryForm`]s to the service's batch query script.
pub struct FormSubmitter {
    agent: ureq::Agent,
    url: String,
}

impl FormSubmitter {
    pub fn new(config: &RetrievalConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent,
            url: format!("{}{RUNQUERY_PATH}", config.base_url.trim_end_matches('/')),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn submit(&self, form: &QueryForm) -> Result<FormResponse, FormError> {
        log::info!("Submitting query form for '{}' to {}", form.object, self.url);
        let mut response = self.agent.post(&self.url).send_form(form.fields())?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .with_config()
            .limit(MAX_PAGE_BYTES)
            .read_to_string()?;
        log::debug!("Form response: HTTP {status}, {} bytes", body.len());
        Ok(FormResponse { status, body })
    }
}
