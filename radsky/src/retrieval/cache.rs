//! On-disk FITS cache in front of a cutout service.

use std::path::{Path, PathBuf};

use super::service::{CutoutParams, CutoutService, FetchError, SurveyImage};
use crate::fits::FitsImage;
use crate::sky_position::SkyPosition;
use crate::survey::SurveyId;

/// Serves cutouts from `dir` when present, otherwise fetches through `inner`
/// and stores the result. Cache read and write problems are logged and never
/// fail a fetch.
pub struct CachedService<S> {
    inner: S,
    dir: PathBuf,
}

impl<S: CutoutService> CachedService<S> {
    pub fn new(inner: S, dir: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cache file for one request
    pub fn path_for(&self, position: &SkyPosition, survey: SurveyId, params: &CutoutParams) -> PathBuf {
        let target: String = position
            .target
            .query_value()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        let sampler = params.sampler.param().unwrap_or("default");
        self.dir.join(format!(
            "{}_{}_{}deg_{}px_{}_{}.fits",
            survey.slug(),
            target,
            position.size_deg(),
            params.pixels,
            params.scaling.name().to_ascii_lowercase(),
            sampler.to_ascii_lowercase(),
        ))
    }

    fn store(&self, path: &Path, image: &SurveyImage) {
        let result = std::fs::create_dir_all(&self.dir)
            .map_err(Into::into)
            .and_then(|_| image.to_fits().write(path));
        if let Err(e) = result {
            log::warn!("Could not cache {} at {}: {e}", image.survey, path.display());
        }
    }
}

impl<S: CutoutService> CutoutService for CachedService<S> {
    fn fetch(
        &self,
        position: &SkyPosition,
        survey: SurveyId,
        params: &CutoutParams,
    ) -> Result<SurveyImage, FetchError> {
        let path = self.path_for(position, survey, params);
        if path.exists() {
            match FitsImage::open(&path).and_then(|fits| SurveyImage::from_fits(survey, fits)) {
                Ok(image) => {
                    log::debug!("{survey}: using cached {}", path.display());
                    return Ok(image);
                }
                Err(e) => log::warn!("Ignoring unreadable cache file {}: {e}", path.display()),
            }
        }

        let image = self.inner.fetch(position, survey, params)?;
        self.store(&path, &image);
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fits::FitsHeader;
    use crate::survey::{Sampler, Scaling};
    use ndarray::Array2;
    use std::cell::Cell;
    use tempfile::TempDir;

    struct CountingService {
        calls: Cell<usize>,
    }

    impl CutoutService for CountingService {
        fn fetch(
            &self,
            _position: &SkyPosition,
            survey: SurveyId,
            params: &CutoutParams,
        ) -> Result<SurveyImage, FetchError> {
            self.calls.set(self.calls.get() + 1);
            Ok(SurveyImage {
                survey,
                header: FitsHeader::new(),
                data: Array2::from_elem(params.image_size().shape(), 3.5),
                wcs: None,
            })
        }
    }

    fn params() -> CutoutParams {
        CutoutParams {
            pixels: 8,
            scaling: Scaling::Log,
            sampler: Sampler::Default,
        }
    }

    #[test]
    fn test_second_fetch_is_served_from_disk() {
        let temp_dir = TempDir::new().unwrap();
        let cached = CachedService::new(
            CountingService {
                calls: Cell::new(0),
            },
            temp_dir.path().join("cutouts"),
        );
        let position = SkyPosition::parse("M51", 0.05).unwrap();

        let first = cached.fetch(&position, SurveyId::Dss2Red, &params()).unwrap();
        let second = cached.fetch(&position, SurveyId::Dss2Red, &params()).unwrap();

        assert_eq!(cached.inner.calls.get(), 1);
        assert_eq!(first.data, second.data);
        assert!(cached.path_for(&position, SurveyId::Dss2Red, &params()).exists());

        cached.fetch(&position, SurveyId::Nvss, &params()).unwrap();
        assert_eq!(cached.inner.calls.get(), 2);
    }

    #[test]
    fn test_cache_names_are_distinct_per_request() {
        let cached = CachedService::new(
            CountingService {
                calls: Cell::new(0),
            },
            "/tmp/cache",
        );
        let a = SkyPosition::parse("150.0, 2.0", 0.05).unwrap();
        let b = SkyPosition::parse("150.0, 2.0", 0.1).unwrap();

        let path_a = cached.path_for(&a, SurveyId::Nvss, &params());
        assert_ne!(path_a, cached.path_for(&b, SurveyId::Nvss, &params()));
        assert_ne!(path_a, cached.path_for(&a, SurveyId::TgssAdr1, &params()));
        let name = path_a.file_name().unwrap().to_string_lossy().into_owned();
        assert!(!name.contains(','), "{name}");
        assert!(name.starts_with("nvss_"));
    }
}
