//! Source catalog ordered by peak value, with CSV export.

use std::path::Path;
use thiserror::Error;

use super::properties::SourceProperties;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Source {0} has no sky position (image has no WCS)")]
    NoSkyPosition(u32),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

const COLUMNS: [&str; 28] = [
    "id",
    "xcentroid",
    "ycentroid",
    "sky_centroid_ra",
    "sky_centroid_dec",
    "bbox_xmin",
    "bbox_xmax",
    "bbox_ymin",
    "bbox_ymax",
    "area",
    "equivalent_radius",
    "source_sum",
    "min_value",
    "max_value",
    "minval_xpos",
    "minval_ypos",
    "maxval_xpos",
    "maxval_ypos",
    "semimajor_sigma",
    "semiminor_sigma",
    "orientation",
    "eccentricity",
    "ellipticity",
    "elongation",
    "cxx",
    "cxy",
    "cyy",
    "gini",
];

/// Detected sources, sorted by ascending `max_value`.
#[derive(Debug, Clone, Default)]
pub struct SourceCatalog {
    sources: Vec<SourceProperties>,
}

impl SourceCatalog {
    pub fn new(mut sources: Vec<SourceProperties>) -> Self {
        sources.sort_by(|a, b| a.max_value.total_cmp(&b.max_value));
        Self { sources }
    }

    pub fn sources(&self) -> &[SourceProperties] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceProperties> {
        self.sources.iter()
    }

    /// Sky centroids as `"ra, dec"` strings in degrees, in catalog order.
    pub fn positions(&self) -> Result<Vec<String>, CatalogError> {
        self.sources
            .iter()
            .map(|source| {
                source
                    .sky_centroid
                    .map(|(ra, dec)| format!("{ra}, {dec}"))
                    .ok_or(CatalogError::NoSkyPosition(source.id))
            })
            .collect()
    }

    /// Write a header row and one row per source. Sky columns are empty when
    /// the image had no WCS.
    pub fn write_csv(&self, path: &Path) -> Result<(), CatalogError> {
        let mut wtr = csv::Writer::from_path(path)?;
        wtr.write_record(COLUMNS)?;

        for s in &self.sources {
            let (ra, dec) = s
                .sky_centroid
                .map(|(ra, dec)| (format!("{ra:.8}"), format!("{dec:.8}")))
                .unwrap_or_default();
            wtr.write_record(&[
                s.id.to_string(),
                format!("{:.2}", s.xcentroid),
                format!("{:.2}", s.ycentroid),
                ra,
                dec,
                s.bbox.x_min.to_string(),
                s.bbox.x_max().to_string(),
                s.bbox.y_min.to_string(),
                s.bbox.y_max().to_string(),
                s.area.to_string(),
                format!("{:.6}", s.equivalent_radius),
                format!("{:.6e}", s.source_sum),
                format!("{:.6e}", s.min_value),
                format!("{:.6e}", s.max_value),
                s.minval_pos.0.to_string(),
                s.minval_pos.1.to_string(),
                s.maxval_pos.0.to_string(),
                s.maxval_pos.1.to_string(),
                format!("{:.6}", s.semimajor_sigma),
                format!("{:.6}", s.semiminor_sigma),
                format!("{:.6}", s.orientation),
                format!("{:.6}", s.eccentricity),
                format!("{:.6}", s.ellipticity),
                format!("{:.6}", s.elongation),
                format!("{:.6}", s.cxx),
                format!("{:.6}", s.cxy),
                format!("{:.6}", s.cyy),
                format!("{:.6}", s.gini),
            ])?;
        }

        wtr.flush()?;
        log::info!("Wrote {} sources to {}", self.sources.len(), path.display());
        Ok(())
    }
}

impl<'a> IntoIterator for &'a SourceCatalog {
    type Item = &'a SourceProperties;
    type IntoIter = std::slice::Iter<'a, SourceProperties>;

    fn into_iter(self) -> Self::IntoIter {
        self.sources.iter()
    }
}
