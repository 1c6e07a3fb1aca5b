//! Survey cutout retrieval
//!
//! * [`service`] - the [`CutoutService`] trait and its SkyView HTTP client
//! * [`cache`] - FITS cache wrapping any service
//! * [`fetch`] - bulk and per-survey retrieval into a [`BandSet`]

pub mod cache;
pub mod fetch;
pub mod service;

pub use cache::CachedService;
pub use fetch::{fetch_bands, BandSet, FetchOutcome, ZeroFillPolicy};
pub use service::{
    interpret_response, CutoutParams, CutoutService, FetchError, SkyViewClient, SurveyImage,
    RUNQUERY_PATH,
};
