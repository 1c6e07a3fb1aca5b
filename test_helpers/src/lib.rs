//! Shared test infrastructure for the radsky workspace.
//!
//! * Workspace discovery and a persistent `test_output/` directory for
//!   artifacts worth inspecting by hand (rendered figures, CSV tables)
//! * Synthetic sky fields: Gaussian sources on a flat background with
//!   reproducible, seeded noise

use ndarray::Array2;
use once_cell::sync::Lazy;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use std::env;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum TestHelperError {
    #[error("Failed to find project root: {0}")]
    ProjectRootNotFound(String),
    #[error("Invalid noise level {0}")]
    InvalidNoise(f64),
}

/// Walk up from the current directory to the Cargo.toml with a `[workspace]`
/// section.
pub fn find_project_root() -> Result<PathBuf, TestHelperError> {
    let mut current_dir = env::current_dir().map_err(|e| {
        TestHelperError::ProjectRootNotFound(format!("Failed to get current directory: {e}"))
    })?;

    loop {
        let cargo_toml = current_dir.join("Cargo.toml");
        if cargo_toml.exists() {
            let content = std::fs::read_to_string(&cargo_toml).map_err(|e| {
                TestHelperError::ProjectRootNotFound(format!("Failed to read Cargo.toml: {e}"))
            })?;
            if content.contains("[workspace]") {
                return Ok(current_dir);
            }
        }
        if !current_dir.pop() {
            break;
        }
    }

    Err(TestHelperError::ProjectRootNotFound(
        "No Cargo.toml with [workspace] found in any parent directory".to_string(),
    ))
}

static PROJECT_ROOT: Lazy<PathBuf> =
    Lazy::new(|| find_project_root().expect("Failed to find project root directory"));

/// `<project_root>/test_output/`, created on first use.
pub fn get_output_dir() -> PathBuf {
    let output_dir = PROJECT_ROOT.join("test_output");
    if !output_dir.exists() {
        std::fs::create_dir_all(&output_dir).expect("Failed to create output directory");
    }
    output_dir
}

/// Path of an artifact inside [`get_output_dir`].
pub fn output_path<P: AsRef<Path>>(path: P) -> PathBuf {
    get_output_dir().join(path)
}

/// Circular Gaussian source in zero-based pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianSource {
    /// Column of the peak
    pub x: f64,
    /// Row of the peak
    pub y: f64,
    pub amplitude: f64,
    pub sigma: f64,
}

impl GaussianSource {
    pub fn new(x: f64, y: f64, amplitude: f64, sigma: f64) -> Self {
        Self {
            x,
            y,
            amplitude,
            sigma,
        }
    }

    pub fn value_at(&self, x: f64, y: f64) -> f64 {
        let r2 = (x - self.x).powi(2) + (y - self.y).powi(2);
        self.amplitude * (-r2 / (2.0 * self.sigma * self.sigma)).exp()
    }
}

/// Image shaped `(height, width)` holding `background` plus every source.
pub fn gaussian_field(
    width: usize,
    height: usize,
    background: f64,
    sources: &[GaussianSource],
) -> Array2<f64> {
    Array2::from_shape_fn((height, width), |(y, x)| {
        background
            + sources
                .iter()
                .map(|s| s.value_at(x as f64, y as f64))
                .sum::<f64>()
    })
}

/// Add zero-mean Gaussian noise of standard deviation `sigma`, drawn from a
/// ChaCha8 stream seeded with `seed`.
pub fn add_noise(image: &mut Array2<f64>, sigma: f64, seed: u64) -> Result<(), TestHelperError> {
    let normal = Normal::new(0.0, sigma).map_err(|_| TestHelperError::InvalidNoise(sigma))?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    image.mapv_inplace(|v| v + normal.sample(&mut rng));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_root_exists() {
        let root = find_project_root().expect("Failed to find project root");
        assert!(root.join("Cargo.toml").exists());
        assert!(root.join("test_helpers").exists());
    }

    #[test]
    fn test_output_path() {
        let path = output_path("test.png");
        assert_eq!(path, get_output_dir().join("test.png"));
        assert!(get_output_dir().is_dir());
    }

    #[test]
    fn test_gaussian_field_peaks() {
        let field = gaussian_field(
            30,
            20,
            0.1,
            &[GaussianSource::new(5.0, 4.0, 1.0, 1.5)],
        );
        assert_eq!(field.dim(), (20, 30));
        assert!((field[[4, 5]] - 1.1).abs() < 1e-12);
        assert!((field[[19, 29]] - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_noise_is_reproducible() {
        let mut a = Array2::zeros((8, 8));
        let mut b = Array2::zeros((8, 8));
        add_noise(&mut a, 0.01, 42).unwrap();
        add_noise(&mut b, 0.01, 42).unwrap();
        assert_eq!(a, b);
        assert!(a.iter().any(|&v| v != 0.0));
        assert!(add_noise(&mut a, -1.0, 1).is_err());
    }
}
