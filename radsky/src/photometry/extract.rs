//! Source extraction from a FITS image.

use ndarray::{Array2, ArrayView2};
use std::path::Path;
use thiserror::Error;

use super::catalog::SourceCatalog;
use super::properties::source_properties;
use crate::config::{ConfigError, DetectionConfig};
use crate::fits::{FitsError, FitsImage};
use crate::image_proc::{convolve2d, deblend_sources, detect_sources, gaussian_kernel, EdgeMode};
use crate::wcs::Wcs;

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("FITS error: {0}")]
    Fits(#[from] FitsError),
    #[error("Invalid detection settings: {0}")]
    Config(#[from] ConfigError),
}

/// Detect sources in `data` and measure them.
///
/// Detection and deblending run on the image smoothed with a unit-sum
/// Gaussian kernel; properties are measured on `data` itself. No detections
/// gives an empty catalog.
pub fn extract_sources(
    data: ArrayView2<f64>,
    wcs: Option<&Wcs>,
    config: &DetectionConfig,
) -> SourceCatalog {
    let kernel = gaussian_kernel(config.kernel_size, config.kernel_sigma);
    let smoothed = convolve2d(&data, &kernel.view(), EdgeMode::default());

    let segm = detect_sources(smoothed.view(), config.threshold, config.npixels);
    if segm.is_empty() {
        log::warn!(
            "No sources above threshold {} with at least {} pixels",
            config.threshold,
            config.npixels
        );
        return SourceCatalog::default();
    }

    let deblended = deblend_sources(smoothed.view(), &segm, config);
    let catalog = SourceCatalog::new(source_properties(data, &deblended, wcs));
    log::info!(
        "Detected {} sources ({} segments before deblending)",
        catalog.len(),
        segm.n_labels()
    );
    catalog
}

/// An image with its detected sources.
#[derive(Debug, Clone)]
pub struct SourceExtractor {
    data: Array2<f64>,
    wcs: Option<Wcs>,
    catalog: SourceCatalog,
}

impl SourceExtractor {
    /// Read the primary image of a FITS file and extract its sources.
    ///
    /// Degenerate axes are squeezed away and exactly two must remain. An
    /// image without a usable celestial WCS is still processed; its sources
    /// then have no sky positions.
    pub fn open(path: &Path, config: &DetectionConfig) -> Result<Self, DetectionError> {
        let fits = FitsImage::open(path)?;
        let data = fits.plane()?;
        let wcs = match Wcs::from_header(&fits.header) {
            Ok(wcs) => Some(wcs),
            Err(e) => {
                log::warn!("{}: no celestial WCS ({e}), sky positions unavailable", path.display());
                None
            }
        };
        log::debug!("Loaded {} image {}x{}", path.display(), data.ncols(), data.nrows());
        Self::from_image(data, wcs, config)
    }

    pub fn from_image(
        data: Array2<f64>,
        wcs: Option<Wcs>,
        config: &DetectionConfig,
    ) -> Result<Self, DetectionError> {
        config.validate()?;
        let catalog = extract_sources(data.view(), wcs.as_ref(), config);
        Ok(Self { data, wcs, catalog })
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn wcs(&self) -> Option<&Wcs> {
        self.wcs.as_ref()
    }

    pub fn catalog(&self) -> &SourceCatalog {
        &self.catalog
    }

    pub fn into_catalog(self) -> SourceCatalog {
        self.catalog
    }
}
