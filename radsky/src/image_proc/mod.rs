//! Image processing for survey bands and detection images
//!
//! Normalization of survey cutouts, Gaussian smoothing, threshold
//! segmentation and multi-threshold deblending.

pub mod convolve;
pub mod deblend;
pub mod normalize;
pub mod segment;
pub mod thresholding;

pub use convolve::{convolve2d, gaussian_kernel, EdgeMode};
pub use deblend::deblend_sources;
pub use normalize::normalize;
pub use segment::{detect_sources, SegmentationImage};
pub use thresholding::{apply_threshold, connected_components, BoundingBox};
