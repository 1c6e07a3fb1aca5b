//! Sky positions: a target plus a search radius.
//!
//! A target is either an object name that the survey service resolves
//! (e.g. "M51", "NGC 5194") or explicit J2000 equatorial coordinates given in
//! decimal degrees or sexagesimal notation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PositionError {
    #[error("Empty target")]
    Empty,
    #[error("Radius must be positive and finite, got {0}")]
    InvalidRadius(f64),
    #[error("Right ascension {0} outside [0, 360) degrees")]
    RaOutOfRange(f64),
    #[error("Declination {0} outside [-90, 90] degrees")]
    DecOutOfRange(f64),
}

/// What to point at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Target {
    /// Object name resolved by the remote service
    Name(String),
    /// J2000 right ascension and declination in degrees
    Equatorial { ra_deg: f64, dec_deg: f64 },
}

impl Target {
    pub fn equatorial(ra_deg: f64, dec_deg: f64) -> Result<Self, PositionError> {
        if !(0.0..360.0).contains(&ra_deg) {
            return Err(PositionError::RaOutOfRange(ra_deg));
        }
        if !(-90.0..=90.0).contains(&dec_deg) {
            return Err(PositionError::DecOutOfRange(dec_deg));
        }
        Ok(Target::Equatorial { ra_deg, dec_deg })
    }

    /// Value for a survey service's position parameter.
    pub fn query_value(&self) -> String {
        match self {
            Target::Name(name) => name.clone(),
            Target::Equatorial { ra_deg, dec_deg } => format!("{ra_deg:.6},{dec_deg:.6}"),
        }
    }
}

impl FromStr for Target {
    type Err = PositionError;

    /// Coordinates when the text parses as a RA/Dec pair, a name otherwise.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        if text.is_empty() {
            return Err(PositionError::Empty);
        }
        match parse_coordinates(text) {
            Some((ra, dec)) => Target::equatorial(ra, dec),
            None => Ok(Target::Name(text.to_string())),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Name(name) => write!(f, "{name}"),
            Target::Equatorial { ra_deg, dec_deg } => {
                write!(f, "{} {}", format_hms(*ra_deg), format_dms(*dec_deg))
            }
        }
    }
}

/// Target plus angular search radius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkyPosition {
    pub target: Target,
    /// Cutout radius in degrees; the cutout spans twice this on a side
    pub radius_deg: f64,
}

impl SkyPosition {
    pub fn new(target: Target, radius_deg: f64) -> Result<Self, PositionError> {
        if !(radius_deg.is_finite() && radius_deg > 0.0) {
            return Err(PositionError::InvalidRadius(radius_deg));
        }
        Ok(Self { target, radius_deg })
    }

    /// Parse the target text and attach a radius.
    pub fn parse(target: &str, radius_deg: f64) -> Result<Self, PositionError> {
        Self::new(target.parse()?, radius_deg)
    }

    /// Full angular width of the cutout in degrees
    pub fn size_deg(&self) -> f64 {
        2.0 * self.radius_deg
    }
}

impl fmt::Display for SkyPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (r = {}°)", self.target, self.radius_deg)
    }
}

/// Try to read `text` as an RA/Dec pair in degrees.
fn parse_coordinates(text: &str) -> Option<(f64, f64)> {
    let (ra_text, dec_text) = split_pair(text)?;
    let ra = parse_ra(&ra_text)?;
    let dec = parse_sexagesimal(&dec_text)?;
    Some((ra, dec))
}

/// Split into RA and Dec parts: on a comma if present, otherwise on
/// whitespace into two halves ("ra dec" or "h m s d m s").
fn split_pair(text: &str) -> Option<(String, String)> {
    if let Some((ra, dec)) = text.split_once(',') {
        return Some((ra.trim().to_string(), dec.trim().to_string()));
    }
    let tokens: Vec<&str> = text.split_whitespace().collect();
    match tokens.len() {
        2 | 4 | 6 => {
            let half = tokens.len() / 2;
            Some((tokens[..half].join(" "), tokens[half..].join(" ")))
        }
        _ => None,
    }
}

/// RA in degrees; multi-field or 'h'-suffixed values are hours.
fn parse_ra(text: &str) -> Option<f64> {
    let is_hours = text.contains(['h', 'H', ':']) || text.split_whitespace().count() > 1;
    let value = parse_sexagesimal(text)?;
    Some(if is_hours { value * 15.0 } else { value })
}

/// Parse "12.5", "12:30:00", "12 30 00", "12h30m00s" or "-05d23m28s".
fn parse_sexagesimal(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    let negative = trimmed.starts_with('-');
    let fields: Vec<f64> = trimmed
        .trim_start_matches(['+', '-'])
        .split(|c: char| c == ':' || c.is_whitespace() || "hHdDmMs°'\"".contains(c))
        .filter(|f| !f.is_empty())
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;

    if fields.is_empty() || fields.len() > 3 {
        return None;
    }
    if fields.iter().skip(1).any(|&f| !(0.0..60.0).contains(&f)) {
        return None;
    }

    let magnitude = fields
        .iter()
        .zip([1.0, 60.0, 3600.0])
        .map(|(v, div)| v / div)
        .sum::<f64>();
    Some(if negative { -magnitude } else { magnitude })
}

/// Right ascension as "HHhMMmSS.SSs".
pub fn format_hms(ra_deg: f64) -> String {
    let total = ra_deg.rem_euclid(360.0) / 15.0 * 3600.0;
    let h = (total / 3600.0).floor();
    let m = ((total - h * 3600.0) / 60.0).floor();
    let s = total - h * 3600.0 - m * 60.0;
    format!("{:02}h{:02}m{:05.2}s", h as u32, m as u32, s)
}

/// Declination as "+DDdMMmSS.Ss".
pub fn format_dms(dec_deg: f64) -> String {
    let sign = if dec_deg < 0.0 { '-' } else { '+' };
    let total = dec_deg.abs() * 3600.0;
    let d = (total / 3600.0).floor();
    let m = ((total - d * 3600.0) / 60.0).floor();
    let s = total - d * 3600.0 - m * 60.0;
    format!("{sign}{:02}d{:02}m{:04.1}s", d as u32, m as u32, s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn coords(target: &Target) -> (f64, f64) {
        match target {
            Target::Equatorial { ra_deg, dec_deg } => (*ra_deg, *dec_deg),
            other => panic!("expected coordinates, got {other:?}"),
        }
    }

    #[test]
    fn test_decimal_degrees() {
        let (ra, dec) = coords(&"150.1192, 2.2058".parse().unwrap());
        assert_relative_eq!(ra, 150.1192);
        assert_relative_eq!(dec, 2.2058);

        let (ra, dec) = coords(&"202.4696 47.1952".parse().unwrap());
        assert_relative_eq!(ra, 202.4696);
        assert_relative_eq!(dec, 47.1952);
    }

    #[test]
    fn test_sexagesimal_forms() {
        for text in [
            "13 29 52.7 +47 11 43",
            "13:29:52.7, +47:11:43",
            "13h29m52.7s +47d11m43s",
        ] {
            let (ra, dec) = coords(&text.parse().unwrap());
            assert_relative_eq!(ra, 202.469_583, epsilon = 1e-5);
            assert_relative_eq!(dec, 47.195_278, epsilon = 1e-5);
        }

        let (_, dec) = coords(&"05 35 17.3 -05 23 28".parse().unwrap());
        assert_relative_eq!(dec, -5.391_111, epsilon = 1e-5);
    }

    #[test]
    fn test_names_pass_through() {
        assert_eq!("M51".parse::<Target>().unwrap(), Target::Name("M51".into()));
        assert_eq!(
            "NGC 5194".parse::<Target>().unwrap(),
            Target::Name("NGC 5194".into())
        );
        assert_eq!("".parse::<Target>(), Err(PositionError::Empty));
    }

    #[test]
    fn test_out_of_range_coordinates_are_rejected() {
        assert_eq!(
            "10.0, 95.0".parse::<Target>(),
            Err(PositionError::DecOutOfRange(95.0))
        );
    }

    #[test]
    fn test_radius_validation() {
        assert!(SkyPosition::parse("M51", 0.1).is_ok());
        assert_eq!(
            SkyPosition::parse("M51", 0.0),
            Err(PositionError::InvalidRadius(0.0))
        );
        assert_eq!(SkyPosition::parse("M51", 0.05).unwrap().size_deg(), 0.1);
    }

    #[test]
    fn test_formatting() {
        assert_eq!(format_hms(202.469_583), "13h29m52.70s");
        assert_eq!(format_dms(-5.391_111), "-05d23m28.0s");
        assert_eq!(Target::equatorial(10.0, -1.0).unwrap().query_value(), "10.000000,-1.000000");
    }
}
