//! Survey identifiers and the named mappings built on them.
//!
//! Composite and contour selections refer to surveys by [`SurveyId`], never by
//! position in a survey list, so reordering the configured list cannot make a
//! mapping pick the wrong band.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SurveyError {
    #[error("Unknown survey '{0}'")]
    UnknownSurvey(String),
    #[error("Unknown composite '{0}' (expected Optical, IOU or ROR)")]
    UnknownComposite(String),
    #[error("Unknown contour survey '{0}' (expected TGSS or NVSS)")]
    UnknownContour(String),
    #[error("Unknown {kind} '{value}'")]
    UnknownOption { kind: &'static str, value: String },
}

/// Surveys served by the cutout service, named as the service names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SurveyId {
    #[serde(rename = "DSS2 IR")]
    Dss2Ir,
    #[serde(rename = "DSS2 Red")]
    Dss2Red,
    #[serde(rename = "DSS2 Blue")]
    Dss2Blue,
    #[serde(rename = "WISE 22")]
    Wise22,
    #[serde(rename = "GALEX Near UV")]
    GalexNearUv,
    #[serde(rename = "TGSS ADR1")]
    TgssAdr1,
    #[serde(rename = "NVSS")]
    Nvss,
}

impl SurveyId {
    pub const ALL: [SurveyId; 7] = [
        SurveyId::Dss2Ir,
        SurveyId::Dss2Red,
        SurveyId::Dss2Blue,
        SurveyId::Wise22,
        SurveyId::GalexNearUv,
        SurveyId::TgssAdr1,
        SurveyId::Nvss,
    ];

    /// Name understood by the cutout service
    pub fn name(&self) -> &'static str {
        match self {
            SurveyId::Dss2Ir => "DSS2 IR",
            SurveyId::Dss2Red => "DSS2 Red",
            SurveyId::Dss2Blue => "DSS2 Blue",
            SurveyId::Wise22 => "WISE 22",
            SurveyId::GalexNearUv => "GALEX Near UV",
            SurveyId::TgssAdr1 => "TGSS ADR1",
            SurveyId::Nvss => "NVSS",
        }
    }

    /// Radio continuum surveys, fetched for contours rather than colour
    pub fn is_radio(&self) -> bool {
        matches!(self, SurveyId::TgssAdr1 | SurveyId::Nvss)
    }

    /// File-name friendly slug, e.g. "dss2_red"
    pub fn slug(&self) -> String {
        self.name().to_ascii_lowercase().replace(' ', "_")
    }
}

impl fmt::Display for SurveyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SurveyId {
    type Err = SurveyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize_name(s);
        SurveyId::ALL
            .into_iter()
            .find(|id| normalize_name(id.name()) == wanted)
            .ok_or_else(|| SurveyError::UnknownSurvey(s.to_string()))
    }
}

fn normalize_name(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Colour channel of an RGB composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BandRole {
    Red,
    Green,
    Blue,
}

impl BandRole {
    /// Channel order of the stacked composite
    pub const ALL: [BandRole; 3] = [BandRole::Red, BandRole::Green, BandRole::Blue];

    pub fn channel(&self) -> usize {
        match self {
            BandRole::Red => 0,
            BandRole::Green => 1,
            BandRole::Blue => 2,
        }
    }
}

/// Named RGB composites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompositeKey {
    /// Three DSS2 plates
    Optical,
    /// Infrared, optical, ultraviolet
    #[serde(rename = "IOU")]
    Iou,
    /// Radio, optical, radio
    #[serde(rename = "ROR")]
    Ror,
}

impl CompositeKey {
    pub const ALL: [CompositeKey; 3] = [CompositeKey::Optical, CompositeKey::Iou, CompositeKey::Ror];

    /// Survey shown in a colour channel
    pub fn band(&self, role: BandRole) -> SurveyId {
        use BandRole::*;
        use SurveyId::*;
        match (self, role) {
            (CompositeKey::Optical, Red) => Dss2Ir,
            (CompositeKey::Optical, Green) => Dss2Red,
            (CompositeKey::Optical, Blue) => Dss2Blue,
            (CompositeKey::Iou, Red) => Wise22,
            (CompositeKey::Iou, Green) => Dss2Red,
            (CompositeKey::Iou, Blue) => GalexNearUv,
            (CompositeKey::Ror, Red) => TgssAdr1,
            (CompositeKey::Ror, Green) => Dss2Red,
            (CompositeKey::Ror, Blue) => Nvss,
        }
    }

    /// Surveys in red, green, blue order
    pub fn bands(&self) -> [SurveyId; 3] {
        BandRole::ALL.map(|role| self.band(role))
    }

    pub fn name(&self) -> &'static str {
        match self {
            CompositeKey::Optical => "Optical",
            CompositeKey::Iou => "IOU",
            CompositeKey::Ror => "ROR",
        }
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CompositeKey {
    type Err = SurveyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CompositeKey::ALL
            .into_iter()
            .find(|key| key.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SurveyError::UnknownComposite(s.to_string()))
    }
}

/// Radio surveys whose raw maps are drawn as contours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContourKey {
    #[serde(rename = "TGSS")]
    Tgss,
    #[serde(rename = "NVSS")]
    Nvss,
}

impl ContourKey {
    pub const ALL: [ContourKey; 2] = [ContourKey::Tgss, ContourKey::Nvss];

    pub fn survey(&self) -> SurveyId {
        match self {
            ContourKey::Tgss => SurveyId::TgssAdr1,
            ContourKey::Nvss => SurveyId::Nvss,
        }
    }

    /// Lowest contour level in map units (Jy/beam)
    pub fn default_minimum(&self) -> f64 {
        match self {
            ContourKey::Tgss => 0.015,
            ContourKey::Nvss => 0.0015,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ContourKey::Tgss => "TGSS",
            ContourKey::Nvss => "NVSS",
        }
    }
}

impl fmt::Display for ContourKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ContourKey {
    type Err = SurveyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        ContourKey::ALL
            .into_iter()
            .find(|key| {
                key.name().eq_ignore_ascii_case(trimmed)
                    || normalize_name(key.survey().name()) == normalize_name(trimmed)
            })
            .ok_or_else(|| SurveyError::UnknownContour(s.to_string()))
    }
}

/// Intensity scaling applied by the cutout service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Scaling {
    #[default]
    Linear,
    Log,
    Sqrt,
    HistEq,
    LogLog,
}

impl Scaling {
    pub fn name(&self) -> &'static str {
        match self {
            Scaling::Linear => "Linear",
            Scaling::Log => "Log",
            Scaling::Sqrt => "Sqrt",
            Scaling::HistEq => "HistEq",
            Scaling::LogLog => "LogLog",
        }
    }
}

impl fmt::Display for Scaling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scaling {
    type Err = SurveyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Scaling::Linear,
            Scaling::Log,
            Scaling::Sqrt,
            Scaling::HistEq,
            Scaling::LogLog,
        ]
        .into_iter()
        .find(|v| v.name().eq_ignore_ascii_case(s.trim()))
        .ok_or_else(|| SurveyError::UnknownOption {
            kind: "scaling",
            value: s.to_string(),
        })
    }
}

/// Resampling kernel used by the cutout service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Sampler {
    /// Let the service pick its own default
    #[default]
    Default,
    NearestNeighbor,
    Linear,
    Lanczos3,
    Clip,
}

impl Sampler {
    /// Value sent to the service, `None` for the service default
    pub fn param(&self) -> Option<&'static str> {
        match self {
            Sampler::Default => None,
            Sampler::NearestNeighbor => Some("NN"),
            Sampler::Linear => Some("LI"),
            Sampler::Lanczos3 => Some("Lanczos3"),
            Sampler::Clip => Some("Clip"),
        }
    }
}

impl FromStr for Sampler {
    type Err = SurveyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "default" => Ok(Sampler::Default),
            "nn" | "nearest" => Ok(Sampler::NearestNeighbor),
            "li" | "linear" => Ok(Sampler::Linear),
            "lanczos3" => Ok(Sampler::Lanczos3),
            "clip" => Ok(Sampler::Clip),
            _ => Err(SurveyError::UnknownOption {
                kind: "sampler",
                value: s.to_string(),
            }),
        }
    }
}
