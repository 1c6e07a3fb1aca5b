//! Source detection and photometry on FITS images
//!
//! * [`extract`] - smoothing, segmentation and deblending of an image
//! * [`properties`] - centroids, moments and shape of each source
//! * [`catalog`] - the sorted source list and its CSV export

pub mod catalog;
pub mod extract;
pub mod properties;

pub use catalog::{CatalogError, SourceCatalog};
pub use extract::{extract_sources, DetectionError, SourceExtractor};
pub use properties::{source_properties, SourceProperties};
