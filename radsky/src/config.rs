//! Pipeline configuration.
//!
//! Every tunable of the retrieval, contour and detection stages lives here and
//! is passed explicitly to the operation that needs it. Defaults reproduce the
//! values the pipeline was tuned with; a JSON file can override any subset.

use crate::retrieval::{CutoutParams, ZeroFillPolicy};
use crate::survey::{ContourKey, Sampler, Scaling, SurveyId};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Public SkyView endpoint
pub const SKYVIEW_BASE_URL: &str = "https://skyview.gsfc.nasa.gov";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub retrieval: RetrievalConfig,
    pub contour: ContourConfig,
    pub detection: DetectionConfig,
}

impl PipelineConfig {
    /// Save as pretty-printed JSON
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load from JSON; missing fields take their defaults. The result is
    /// validated before it is returned.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retrieval.validate()?;
        self.contour.validate()?;
        self.detection.validate()
    }
}

/// Where and how survey cutouts are fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Surveys stacked into colour composites, in band order
    pub composite_surveys: Vec<SurveyId>,
    /// Radio surveys kept raw for contours, in band order
    pub contour_surveys: Vec<SurveyId>,
    pub composite_params: CutoutParams,
    pub contour_params: CutoutParams,
    pub zero_fill: ZeroFillPolicy,
    /// Extra per-survey attempts after a transient failure
    pub max_retries: u32,
    /// Pause between attempts
    pub retry_delay_ms: u64,
    /// Global timeout for a single HTTP request
    pub timeout_secs: u64,
    pub base_url: String,
    /// Fetched cutouts are written here as FITS and reused when present
    pub cache_dir: Option<PathBuf>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            composite_surveys: vec![
                SurveyId::Dss2Ir,
                SurveyId::Dss2Red,
                SurveyId::Dss2Blue,
                SurveyId::Wise22,
                SurveyId::GalexNearUv,
            ],
            contour_surveys: vec![SurveyId::TgssAdr1, SurveyId::Nvss],
            composite_params: CutoutParams {
                pixels: 600,
                scaling: Scaling::Log,
                sampler: Sampler::Default,
            },
            contour_params: CutoutParams {
                pixels: 600,
                scaling: Scaling::Sqrt,
                sampler: Sampler::Lanczos3,
            },
            zero_fill: ZeroFillPolicy::Always,
            max_retries: 2,
            retry_delay_ms: 1000,
            timeout_secs: 120,
            base_url: SKYVIEW_BASE_URL.to_string(),
            cache_dir: None,
        }
    }
}

impl RetrievalConfig {
    /// Full survey list: composite surveys then contour surveys.
    pub fn surveys(&self) -> Vec<SurveyId> {
        self.composite_surveys
            .iter()
            .chain(&self.contour_surveys)
            .copied()
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.composite_surveys.is_empty() && self.contour_surveys.is_empty() {
            return Err(ConfigError::Invalid("no surveys configured".into()));
        }
        let surveys = self.surveys();
        for (i, survey) in surveys.iter().enumerate() {
            if surveys[..i].contains(survey) {
                return Err(ConfigError::Invalid(format!(
                    "survey {survey} listed more than once"
                )));
            }
        }
        if self.composite_params.pixels == 0 {
            return Err(ConfigError::Invalid("cutout pixels must be positive".into()));
        }
        if self.composite_params.pixels != self.contour_params.pixels {
            return Err(ConfigError::Invalid(format!(
                "composite and contour cutouts must share a size ({} vs {} pixels)",
                self.composite_params.pixels, self.contour_params.pixels
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout must be positive".into()));
        }
        Ok(())
    }
}

/// Contour overlay settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContourConfig {
    /// Number of evenly spaced levels between the minimum and the map maximum
    pub levels: usize,
    pub tgss_minimum: f64,
    pub nvss_minimum: f64,
}

impl Default for ContourConfig {
    fn default() -> Self {
        Self {
            levels: 4,
            tgss_minimum: ContourKey::Tgss.default_minimum(),
            nvss_minimum: ContourKey::Nvss.default_minimum(),
        }
    }
}

impl ContourConfig {
    /// Lowest contour level for a contour survey
    pub fn minimum(&self, key: ContourKey) -> f64 {
        match key {
            ContourKey::Tgss => self.tgss_minimum,
            ContourKey::Nvss => self.nvss_minimum,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.levels == 0 {
            return Err(ConfigError::Invalid("contour levels must be positive".into()));
        }
        if !(self.tgss_minimum.is_finite() && self.nvss_minimum.is_finite()) {
            return Err(ConfigError::Invalid("contour minimum must be finite".into()));
        }
        Ok(())
    }
}

/// Source detection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Detection threshold in image units; pixels strictly above it are kept
    pub threshold: f64,
    /// Smoothing kernel standard deviation in pixels
    pub kernel_sigma: f64,
    /// Smoothing kernel side length in pixels (odd)
    pub kernel_size: usize,
    /// Minimum connected pixels for a source
    pub npixels: usize,
    /// Number of deblending threshold levels
    pub nlevels: usize,
    /// Minimum flux fraction for a deblended component
    pub contrast: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: 0.015,
            kernel_sigma: 0.015,
            kernel_size: 3,
            npixels: 5,
            nlevels: 32,
            contrast: 0.001,
        }
    }
}

impl DetectionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.threshold.is_finite() {
            return Err(ConfigError::Invalid("threshold must be finite".into()));
        }
        if !(self.kernel_sigma > 0.0 && self.kernel_sigma.is_finite()) {
            return Err(ConfigError::Invalid("kernel sigma must be positive".into()));
        }
        if self.kernel_size % 2 == 0 {
            return Err(ConfigError::Invalid(format!(
                "kernel size must be odd, got {}",
                self.kernel_size
            )));
        }
        if self.npixels == 0 || self.nlevels == 0 {
            return Err(ConfigError::Invalid(
                "npixels and nlevels must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.contrast) {
            return Err(ConfigError::Invalid(format!(
                "contrast must lie in [0, 1], got {}",
                self.contrast
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.retrieval.surveys().len(), 7);
        assert_eq!(config.retrieval.surveys()[5], SurveyId::TgssAdr1);
        assert_eq!(config.contour.minimum(ContourKey::Nvss), 0.0015);
        assert_eq!(config.detection.nlevels, 32);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("pipeline.json");

        let mut config = PipelineConfig::default();
        config.detection.threshold = 0.5;
        config.retrieval.cache_dir = Some(temp_dir.path().join("cache"));
        config.save_to_file(&path).unwrap();

        let loaded = PipelineConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("partial.json");
        std::fs::write(&path, r#"{"detection": {"npixels": 9}}"#).unwrap();

        let loaded = PipelineConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.detection.npixels, 9);
        assert_eq!(loaded.detection.threshold, 0.015);
        assert_eq!(loaded.retrieval, RetrievalConfig::default());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = PipelineConfig::default();
        config.detection.kernel_size = 4;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = PipelineConfig::default();
        config.retrieval.contour_surveys.push(SurveyId::Dss2Red);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = PipelineConfig::load_from_file(Path::new("/nonexistent/pipeline.json"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
