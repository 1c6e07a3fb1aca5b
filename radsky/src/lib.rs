//! Sky-survey imagery for a celestial position
//!
//! Fetches survey cutouts around a target, normalizes them into bands,
//! stacks three bands into an RGB composite with radio contour overlays, and
//! detects and measures sources in FITS images.
//!
//! # Pipeline
//! 1. [`retrieval::fetch_bands`] fetches every configured survey through a
//!    [`retrieval::CutoutService`], falling back from a bulk attempt to
//!    per-survey requests and zero-filling the bands that fail.
//! 2. [`composite::compose`] stacks the bands named by a
//!    [`survey::CompositeKey`] and [`contour::ContourLayer`] traces a radio
//!    survey's contours; [`figure::Figure`] combines them and
//!    [`render`] draws the result.
//! 3. [`photometry::SourceExtractor`] segments, deblends and measures the
//!    sources of a FITS image into a [`photometry::SourceCatalog`].
//!
//! [`form`] submits SkyView's interactive query form directly.

pub mod composite;
pub mod config;
pub mod contour;
pub mod figure;
pub mod fits;
pub mod form;
pub mod image_proc;
pub mod image_size;
pub mod photometry;
pub mod render;
pub mod retrieval;
pub mod sky_position;
pub mod stats;
pub mod survey;
pub mod wcs;

pub use composite::{compose, CompositeError, RgbComposite};
pub use config::{ContourConfig, DetectionConfig, PipelineConfig, RetrievalConfig};
pub use contour::{contour_levels, ContourLayer, ContourLine};
pub use figure::{Figure, Overlay, Rgb};
pub use fits::{FitsError, FitsHeader, FitsImage};
pub use image_size::ImageSize;
pub use photometry::{SourceCatalog, SourceExtractor, SourceProperties};
pub use retrieval::{fetch_bands, BandSet, CutoutService, FetchOutcome, SkyViewClient};
pub use sky_position::{SkyPosition, Target};
pub use survey::{BandRole, CompositeKey, ContourKey, SurveyId};
pub use wcs::Wcs;
