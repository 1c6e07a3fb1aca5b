//! Celestial world coordinate systems for survey cutouts.
//!
//! Implements the subset of the FITS WCS standard (Calabretta & Greisen 2002)
//! that sky-survey cutouts and radio maps actually use: the two celestial axes
//! (always NAXIS1/NAXIS2 here, any spectral or Stokes axes are ignored), a
//! linear CD/PC/CDELT/CROTA2 transform and the zenithal TAN and SIN
//! projections.
//!
//! Pixel coordinates are zero-based `(x, y)` = `(column, row)`; the FITS
//! one-based convention is handled internally.

use crate::fits::{FitsHeader, HeaderValue};
use std::f64::consts::PI;
use thiserror::Error;

const R2D: f64 = 180.0 / PI;
const D2R: f64 = PI / 180.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WcsError {
    #[error("Missing WCS keyword {0}")]
    MissingKeyword(String),
    #[error("Unsupported projection code '{0}'")]
    UnsupportedProjection(String),
    #[error("Axes {0} and {1} are not a longitude/latitude pair")]
    NotCelestial(String, String),
    #[error("Pixel transform matrix is singular")]
    SingularMatrix,
    #[error("Coordinate ({0:.6}, {1:.6}) lies outside the projection domain")]
    OutsideDomain(f64, f64),
}

/// Zenithal projections supported by [`Wcs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// Gnomonic, used by optical and infrared surveys
    Tan,
    /// Orthographic, common in radio interferometry maps
    Sin,
}

impl Projection {
    fn from_ctype(ctype: &str) -> Result<Self, WcsError> {
        let code = ctype.get(5..8).unwrap_or("").trim_end_matches('-');
        match code {
            "TAN" => Ok(Projection::Tan),
            "SIN" => Ok(Projection::Sin),
            _ => Err(WcsError::UnsupportedProjection(ctype.to_string())),
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Projection::Tan => "TAN",
            Projection::Sin => "SIN",
        }
    }

    /// Native latitude (radians) at intermediate radius `r` (degrees).
    fn theta(&self, r: f64) -> Option<f64> {
        match self {
            Projection::Tan => Some((R2D / r).atan()),
            Projection::Sin => {
                let c = r * D2R;
                (c <= 1.0).then(|| c.acos())
            }
        }
    }

    /// Intermediate radius (degrees) at native latitude `theta` (radians).
    fn radius(&self, theta: f64) -> Option<f64> {
        match self {
            Projection::Tan => (theta > 0.0).then(|| R2D / theta.tan()),
            Projection::Sin => (theta >= 0.0).then(|| R2D * theta.cos()),
        }
    }
}

/// Two-axis celestial WCS.
#[derive(Debug, Clone, PartialEq)]
pub struct Wcs {
    projection: Projection,
    /// CTYPE prefixes such as "RA" / "DEC" or "GLON" / "GLAT"
    axis_names: (String, String),
    /// Reference pixel, one-based FITS convention
    crpix: [f64; 2],
    /// Reference world coordinate (longitude, latitude) in degrees
    crval: [f64; 2],
    /// Pixel to intermediate world transform in degrees per pixel
    cd: [[f64; 2]; 2],
    cd_inv: [[f64; 2]; 2],
}

impl Wcs {
    /// Build a TAN projection centred on `(ra, dec)`.
    ///
    /// `crpix` is one-based; `cdelt` is (degrees per pixel along x, along y).
    pub fn tan(
        crval: (f64, f64),
        crpix: (f64, f64),
        cdelt: (f64, f64),
    ) -> Result<Self, WcsError> {
        Self::new(
            Projection::Tan,
            ("RA".to_string(), "DEC".to_string()),
            [crpix.0, crpix.1],
            [crval.0, crval.1],
            [[cdelt.0, 0.0], [0.0, cdelt.1]],
        )
    }

    fn new(
        projection: Projection,
        axis_names: (String, String),
        crpix: [f64; 2],
        crval: [f64; 2],
        cd: [[f64; 2]; 2],
    ) -> Result<Self, WcsError> {
        let det = cd[0][0] * cd[1][1] - cd[0][1] * cd[1][0];
        if det == 0.0 || !det.is_finite() {
            return Err(WcsError::SingularMatrix);
        }
        let cd_inv = [
            [cd[1][1] / det, -cd[0][1] / det],
            [-cd[1][0] / det, cd[0][0] / det],
        ];
        Ok(Self {
            projection,
            axis_names,
            crpix,
            crval,
            cd,
            cd_inv,
        })
    }

    /// Read the celestial WCS of axes 1 and 2 from a FITS header.
    pub fn from_header(header: &FitsHeader) -> Result<Self, WcsError> {
        let text = |key: &str| {
            header
                .get_str(key)
                .map(str::to_string)
                .ok_or_else(|| WcsError::MissingKeyword(key.to_string()))
        };
        let number = |key: &str| {
            header
                .get_f64(key)
                .ok_or_else(|| WcsError::MissingKeyword(key.to_string()))
        };

        let ctype1 = text("CTYPE1")?;
        let ctype2 = text("CTYPE2")?;
        let lon = axis_prefix(&ctype1);
        let lat = axis_prefix(&ctype2);
        if !is_celestial_pair(&lon, &lat) {
            return Err(WcsError::NotCelestial(ctype1, ctype2));
        }
        let projection = Projection::from_ctype(&ctype1)?;

        let crpix = [number("CRPIX1")?, number("CRPIX2")?];
        let crval = [number("CRVAL1")?, number("CRVAL2")?];

        let cd = if header.contains("CD1_1") || header.contains("CD2_2") {
            let cd = |key: &str| header.get_f64(key).unwrap_or(0.0);
            [[cd("CD1_1"), cd("CD1_2")], [cd("CD2_1"), cd("CD2_2")]]
        } else {
            let cdelt = [number("CDELT1")?, number("CDELT2")?];
            let pc = if header.contains("PC1_1") || header.contains("PC2_2") {
                let pc = |key: &str, default: f64| header.get_f64(key).unwrap_or(default);
                [
                    [pc("PC1_1", 1.0), pc("PC1_2", 0.0)],
                    [pc("PC2_1", 0.0), pc("PC2_2", 1.0)],
                ]
            } else {
                let rho = header.get_f64("CROTA2").unwrap_or(0.0) * D2R;
                [
                    [rho.cos(), -rho.sin() * cdelt[1] / cdelt[0]],
                    [rho.sin() * cdelt[0] / cdelt[1], rho.cos()],
                ]
            };
            [
                [cdelt[0] * pc[0][0], cdelt[0] * pc[0][1]],
                [cdelt[1] * pc[1][0], cdelt[1] * pc[1][1]],
            ]
        };

        Self::new(projection, (lon, lat), crpix, crval, cd)
    }

    /// Write the keywords describing this WCS into `header`.
    pub fn write_to_header(&self, header: &mut FitsHeader) {
        let ctype = |name: &str| {
            let dashes = "-".repeat(5usize.saturating_sub(name.len()).max(1));
            HeaderValue::Text(format!("{name}{dashes}{}", self.projection.code()))
        };
        header.set("CTYPE1", ctype(&self.axis_names.0));
        header.set("CTYPE2", ctype(&self.axis_names.1));
        header.set("CRPIX1", HeaderValue::Float(self.crpix[0]));
        header.set("CRPIX2", HeaderValue::Float(self.crpix[1]));
        header.set("CRVAL1", HeaderValue::Float(self.crval[0]));
        header.set("CRVAL2", HeaderValue::Float(self.crval[1]));
        header.set("CD1_1", HeaderValue::Float(self.cd[0][0]));
        header.set("CD1_2", HeaderValue::Float(self.cd[0][1]));
        header.set("CD2_1", HeaderValue::Float(self.cd[1][0]));
        header.set("CD2_2", HeaderValue::Float(self.cd[1][1]));
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    /// Reference world coordinate (longitude, latitude) in degrees.
    pub fn reference(&self) -> (f64, f64) {
        (self.crval[0], self.crval[1])
    }

    /// Convert a zero-based pixel position to (longitude, latitude) in degrees.
    pub fn pixel_to_world(&self, x: f64, y: f64) -> Result<(f64, f64), WcsError> {
        let dx = x + 1.0 - self.crpix[0];
        let dy = y + 1.0 - self.crpix[1];
        let ix = self.cd[0][0] * dx + self.cd[0][1] * dy;
        let iy = self.cd[1][0] * dx + self.cd[1][1] * dy;

        let r = ix.hypot(iy);
        let phi = if r == 0.0 { 0.0 } else { ix.atan2(-iy) };
        let theta = self
            .projection
            .theta(r)
            .ok_or(WcsError::OutsideDomain(x, y))?;

        let (alpha_p, delta_p) = (self.crval[0] * D2R, self.crval[1] * D2R);
        let dphi = phi - PI;
        let alpha = alpha_p
            + (-theta.cos() * dphi.sin()).atan2(
                theta.sin() * delta_p.cos() - theta.cos() * delta_p.sin() * dphi.cos(),
            );
        let delta = (theta.sin() * delta_p.sin() + theta.cos() * delta_p.cos() * dphi.cos())
            .clamp(-1.0, 1.0)
            .asin();

        Ok(((alpha * R2D).rem_euclid(360.0), delta * R2D))
    }

    /// Convert (longitude, latitude) in degrees to a zero-based pixel position.
    pub fn world_to_pixel(&self, lon: f64, lat: f64) -> Result<(f64, f64), WcsError> {
        let (alpha, delta) = (lon * D2R, lat * D2R);
        let (alpha_p, delta_p) = (self.crval[0] * D2R, self.crval[1] * D2R);
        let da = alpha - alpha_p;

        let phi = PI
            + (-delta.cos() * da.sin())
                .atan2(delta.sin() * delta_p.cos() - delta.cos() * delta_p.sin() * da.cos());
        let theta = (delta.sin() * delta_p.sin() + delta.cos() * delta_p.cos() * da.cos())
            .clamp(-1.0, 1.0)
            .asin();

        let r = self
            .projection
            .radius(theta)
            .ok_or(WcsError::OutsideDomain(lon, lat))?;
        let ix = r * phi.sin();
        let iy = -r * phi.cos();

        let dx = self.cd_inv[0][0] * ix + self.cd_inv[0][1] * iy;
        let dy = self.cd_inv[1][0] * ix + self.cd_inv[1][1] * iy;
        Ok((dx + self.crpix[0] - 1.0, dy + self.crpix[1] - 1.0))
    }
}

fn axis_prefix(ctype: &str) -> String {
    ctype
        .get(..4)
        .unwrap_or(ctype)
        .trim_end_matches('-')
        .to_ascii_uppercase()
}

fn is_celestial_pair(lon: &str, lat: &str) -> bool {
    matches!(
        (lon, lat),
        ("RA", "DEC") | ("GLON", "GLAT") | ("ELON", "ELAT")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn radio_header() -> FitsHeader {
        let mut header = FitsHeader::new();
        header.set("CTYPE1", HeaderValue::Text("RA---SIN".to_string()));
        header.set("CTYPE2", HeaderValue::Text("DEC--SIN".to_string()));
        header.set("CTYPE3", HeaderValue::Text("FREQ".to_string()));
        header.set("CRPIX1", HeaderValue::Float(301.0));
        header.set("CRPIX2", HeaderValue::Float(301.0));
        header.set("CRVAL1", HeaderValue::Float(150.0));
        header.set("CRVAL2", HeaderValue::Float(2.2));
        header.set("CDELT1", HeaderValue::Float(-1.0 / 3600.0));
        header.set("CDELT2", HeaderValue::Float(1.0 / 3600.0));
        header
    }

    #[test]
    fn test_reference_pixel_maps_to_reference_value() {
        let wcs = Wcs::from_header(&radio_header()).unwrap();
        assert_eq!(wcs.projection(), Projection::Sin);

        let (ra, dec) = wcs.pixel_to_world(300.0, 300.0).unwrap();
        assert_relative_eq!(ra, 150.0, epsilon = 1e-9);
        assert_relative_eq!(dec, 2.2, epsilon = 1e-9);
    }

    #[test]
    fn test_tan_round_trip_across_image() {
        let wcs = Wcs::tan((83.82, -5.39), (300.5, 300.5), (-1.0 / 6000.0, 1.0 / 6000.0))
            .unwrap();
        for &(x, y) in &[(0.0, 0.0), (599.0, 0.0), (123.4, 456.7), (599.0, 599.0)] {
            let (ra, dec) = wcs.pixel_to_world(x, y).unwrap();
            let (px, py) = wcs.world_to_pixel(ra, dec).unwrap();
            assert_relative_eq!(px, x, epsilon = 1e-6);
            assert_relative_eq!(py, y, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_sin_round_trip_across_image() {
        let wcs = Wcs::from_header(&radio_header()).unwrap();
        for &(x, y) in &[(0.0, 0.0), (599.0, 0.0), (87.25, 512.5), (599.0, 599.0)] {
            let (ra, dec) = wcs.pixel_to_world(x, y).unwrap();
            let (px, py) = wcs.world_to_pixel(ra, dec).unwrap();
            assert_relative_eq!(px, x, epsilon = 1e-6);
            assert_relative_eq!(py, y, epsilon = 1e-6);
        }

        // one arcsecond per pixel near the reference point
        let (_, dec) = wcs.pixel_to_world(300.0, 336.0).unwrap();
        assert_relative_eq!(dec, 2.21, epsilon = 1e-6);
    }

    #[test]
    fn test_sin_domain_limits() {
        let wcs = Wcs::from_header(&radio_header()).unwrap();

        // 3e5 arcsec from the reference is beyond the 90 degree horizon
        assert!(matches!(
            wcs.pixel_to_world(300_300.0, 300.0),
            Err(WcsError::OutsideDomain(..))
        ));
        // the antipode sits on the hidden hemisphere
        assert!(matches!(
            wcs.world_to_pixel(330.0, -2.2),
            Err(WcsError::OutsideDomain(..))
        ));
    }

    #[test]
    fn test_east_is_left() {
        // Negative CDELT1: RA increases towards smaller x
        let wcs = Wcs::tan((10.0, 20.0), (51.0, 51.0), (-0.001, 0.001)).unwrap();
        let (ra_left, _) = wcs.pixel_to_world(10.0, 50.0).unwrap();
        let (ra_right, _) = wcs.pixel_to_world(90.0, 50.0).unwrap();
        assert!(ra_left > ra_right);

        let (_, dec_low) = wcs.pixel_to_world(50.0, 10.0).unwrap();
        let (_, dec_high) = wcs.pixel_to_world(50.0, 90.0).unwrap();
        assert!(dec_high > dec_low);
    }

    #[test]
    fn test_crota2_matches_equivalent_cd_matrix() {
        let mut rotated = radio_header();
        rotated.set("CTYPE1", HeaderValue::Text("RA---TAN".to_string()));
        rotated.set("CTYPE2", HeaderValue::Text("DEC--TAN".to_string()));
        rotated.set("CROTA2", HeaderValue::Float(30.0));
        let from_crota = Wcs::from_header(&rotated).unwrap();

        let mut header = FitsHeader::new();
        from_crota.write_to_header(&mut header);
        let from_cd = Wcs::from_header(&header).unwrap();

        let a = from_crota.pixel_to_world(10.0, 500.0).unwrap();
        let b = from_cd.pixel_to_world(10.0, 500.0).unwrap();
        assert_relative_eq!(a.0, b.0, epsilon = 1e-9);
        assert_relative_eq!(a.1, b.1, epsilon = 1e-9);
    }

    #[test]
    fn test_far_side_is_outside_tan_domain() {
        let wcs = Wcs::tan((0.0, 0.0), (1.0, 1.0), (0.01, 0.01)).unwrap();
        assert!(matches!(
            wcs.world_to_pixel(180.0, 0.0),
            Err(WcsError::OutsideDomain(..))
        ));
    }

    #[test]
    fn test_rejects_unknown_projection_and_missing_keys() {
        let mut header = radio_header();
        header.set("CTYPE1", HeaderValue::Text("RA---AIT".to_string()));
        assert!(matches!(
            Wcs::from_header(&header),
            Err(WcsError::UnsupportedProjection(_))
        ));

        assert!(matches!(
            Wcs::from_header(&FitsHeader::new()),
            Err(WcsError::MissingKeyword(_))
        ));
    }
}
