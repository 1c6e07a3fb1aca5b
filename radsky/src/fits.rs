//! Primary-HDU FITS reading and writing.
//!
//! Survey cutouts arrive over HTTP as in-memory FITS streams and source
//! extraction reads FITS files from disk, so both paths go through
//! [`FitsImage::from_bytes`]. Card parsing, pixel decoding and serialization
//! are done by `fitsio-pure`, which works directly on byte slices. Only the
//! primary HDU is decoded; extensions are ignored.
//!
//! # Supported data
//! - BITPIX 8, 16, 32, 64, -32 and -64
//! - BSCALE/BZERO scaling and BLANK values (mapped to NaN)
//! - Any number of axes; [`FitsImage::plane`] squeezes length-1 axes so that
//!   radio cubes shaped (1, 1, H, W) come back as a plain 2D image

use fitsio::hdu::parse_fits;
use fitsio::header::{serialize_header, Card as RawCard};
use fitsio::image::{image_dimensions, read_image_physical, serialize_image_f64};
use fitsio::primary::build_primary_header;
use fitsio::value::Value;
use ndarray::Array2;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Size of a FITS logical record in bytes
pub const BLOCK_SIZE: usize = 2880;

/// Size of a single header card in bytes
pub const CARD_SIZE: usize = 80;

/// Keywords written by [`FitsImage::to_bytes`] itself; copies in a caller's
/// header are dropped so they cannot contradict the data unit.
const STRUCTURAL_KEYWORDS: &[&str] = &[
    "SIMPLE", "BITPIX", "NAXIS", "EXTEND", "BSCALE", "BZERO", "BLANK", "END",
];

#[derive(Error, Debug)]
pub enum FitsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("FITS codec error: {0}")]
    Codec(String),
    #[error("Stream does not start with a SIMPLE card")]
    NotFits,
    #[error("Header ended before the END card")]
    UnterminatedHeader,
    #[error("Missing required keyword {0}")]
    MissingKeyword(String),
    #[error("Invalid value for keyword {keyword}: {value}")]
    InvalidValue { keyword: String, value: String },
    #[error("Unsupported BITPIX {0}")]
    UnsupportedBitpix(i64),
    #[error("Data unit truncated: expected {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },
    #[error("Image has {0} non-degenerate axes, expected 2")]
    NotTwoDimensional(usize),
}

impl From<fitsio::error::Error> for FitsError {
    fn from(e: fitsio::error::Error) -> Self {
        FitsError::Codec(format!("{e:?}"))
    }
}

/// A typed header value.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Logical(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl HeaderValue {
    /// Numeric view of the value; integers widen to f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HeaderValue::Integer(v) => Some(*v as f64),
            HeaderValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HeaderValue::Integer(v) => Some(*v),
            HeaderValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    fn from_raw(value: &Value) -> Option<Self> {
        match value {
            Value::Logical(b) => Some(HeaderValue::Logical(*b)),
            Value::Integer(v) => Some(HeaderValue::Integer(*v)),
            Value::Float(v) => Some(HeaderValue::Float(*v)),
            Value::String(s) => Some(HeaderValue::Text(s.to_string())),
            _ => None,
        }
    }

    fn to_raw(&self) -> Value {
        match self {
            HeaderValue::Logical(b) => Value::Logical(*b),
            HeaderValue::Integer(v) => Value::Integer(*v),
            HeaderValue::Float(v) => Value::Float(*v),
            HeaderValue::Text(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderValue::Logical(b) => write!(f, "{}", if *b { "T" } else { "F" }),
            HeaderValue::Integer(v) => write!(f, "{v}"),
            HeaderValue::Float(v) => write!(f, "{v:?}"),
            HeaderValue::Text(s) => write!(f, "{s}"),
        }
    }
}

/// One valued header card.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub keyword: String,
    pub value: HeaderValue,
}

impl Card {
    pub fn new(keyword: &str, value: HeaderValue) -> Self {
        Self {
            keyword: keyword.to_ascii_uppercase(),
            value,
        }
    }

    /// Commentary cards (COMMENT, HISTORY, blank) carry no value and are skipped.
    fn from_raw(card: &RawCard) -> Option<Self> {
        let value = card.value.as_ref().and_then(HeaderValue::from_raw)?;
        Some(Self::new(card.keyword_str().trim_end(), value))
    }

    fn to_raw(&self) -> RawCard {
        let mut keyword = [b' '; 8];
        for (dst, src) in keyword.iter_mut().zip(self.keyword.bytes()) {
            *dst = src;
        }
        RawCard {
            keyword,
            value: Some(self.value.to_raw()),
            comment: None,
        }
    }
}

/// Ordered collection of header cards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FitsHeader {
    cards: Vec<Card>,
}

impl FitsHeader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn get(&self, keyword: &str) -> Option<&HeaderValue> {
        self.cards
            .iter()
            .find(|card| card.keyword.eq_ignore_ascii_case(keyword))
            .map(|card| &card.value)
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.get(keyword).is_some()
    }

    pub fn get_f64(&self, keyword: &str) -> Option<f64> {
        self.get(keyword).and_then(HeaderValue::as_f64)
    }

    pub fn get_i64(&self, keyword: &str) -> Option<i64> {
        self.get(keyword).and_then(HeaderValue::as_i64)
    }

    pub fn get_str(&self, keyword: &str) -> Option<&str> {
        self.get(keyword).and_then(HeaderValue::as_str)
    }

    /// Set a keyword, replacing the first existing card with the same name.
    pub fn set(&mut self, keyword: &str, value: HeaderValue) {
        match self
            .cards
            .iter_mut()
            .find(|card| card.keyword.eq_ignore_ascii_case(keyword))
        {
            Some(card) => card.value = value,
            None => self.cards.push(Card::new(keyword, value)),
        }
    }
}

fn padded_len(len: usize) -> usize {
    len.div_ceil(BLOCK_SIZE) * BLOCK_SIZE
}

/// Integer value of a raw card image, if it has one.
fn card_integer(card: &[u8]) -> Option<i64> {
    if card.get(8..10) != Some(b"= ".as_slice()) {
        return None;
    }
    let field = String::from_utf8_lossy(card.get(10..)?);
    field.split('/').next()?.trim().parse().ok()
}

/// Check the primary data unit declared by the header against the stream.
///
/// Sizes are computed with checked arithmetic, so a header claiming an
/// absurd NAXISn or a body cut off inside the header is an error rather
/// than an out-of-range read. Returns the data unit length in bytes.
fn declared_data_len(bytes: &[u8]) -> Result<usize, FitsError> {
    if !bytes.starts_with(b"SIMPLE") {
        return Err(FitsError::NotFits);
    }

    let mut integers = HashMap::new();
    let mut header_len = None;
    for (index, card) in bytes.chunks_exact(CARD_SIZE).enumerate() {
        let keyword = String::from_utf8_lossy(&card[..8]).trim_end().to_string();
        if keyword == "END" {
            header_len = Some((index + 1) * CARD_SIZE);
            break;
        }
        if keyword == "BITPIX" || keyword.starts_with("NAXIS") {
            if let Some(value) = card_integer(card) {
                integers.insert(keyword, value);
            }
        }
    }
    let header_len = header_len.ok_or(FitsError::UnterminatedHeader)?;

    let integer = |key: &str| {
        integers
            .get(key)
            .copied()
            .ok_or_else(|| FitsError::MissingKeyword(key.to_string()))
    };
    let invalid = |keyword: String, value: i64| FitsError::InvalidValue {
        keyword,
        value: value.to_string(),
    };

    let bytes_per_pixel: usize = match integer("BITPIX")? {
        8 => 1,
        16 => 2,
        32 | -32 => 4,
        64 | -64 => 8,
        other => return Err(FitsError::UnsupportedBitpix(other)),
    };
    let naxis = integer("NAXIS")?;
    let naxis = usize::try_from(naxis).map_err(|_| invalid("NAXIS".to_string(), naxis))?;

    let expected = if naxis == 0 {
        0
    } else {
        (1..=naxis).try_fold(bytes_per_pixel, |acc, n| {
            let key = format!("NAXIS{n}");
            let len = integer(&key)?;
            usize::try_from(len)
                .ok()
                .and_then(|len| acc.checked_mul(len))
                .ok_or_else(|| invalid(key, len))
        })?
    };

    let data_start = padded_len(header_len);
    bytes
        .get(data_start..)
        .and_then(|data| data.get(..expected))
        .map(<[u8]>::len)
        .ok_or(FitsError::Truncated {
            expected,
            found: bytes.len().saturating_sub(data_start),
        })
}

/// Decoded primary HDU: header, axis lengths and physical pixel values.
#[derive(Debug, Clone)]
pub struct FitsImage {
    pub header: FitsHeader,
    /// Axis lengths in FITS order (NAXIS1, NAXIS2, ...)
    pub axes: Vec<usize>,
    /// Pixel values with NAXIS1 varying fastest
    pub data: Vec<f64>,
}

impl FitsImage {
    /// Open a FITS file and decode its primary HDU.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FitsError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Decode the primary HDU of an in-memory FITS stream.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FitsError> {
        let expected = declared_data_len(bytes)?;

        let parsed = parse_fits(bytes)?;
        let hdu = parsed.primary();
        let axes = image_dimensions(hdu)?;
        let data = if expected == 0 {
            Vec::new()
        } else {
            read_image_physical(bytes, hdu)?
        };
        let header = FitsHeader {
            cards: hdu.cards.iter().filter_map(Card::from_raw).collect(),
        };

        Ok(Self { header, axes, data })
    }

    /// Build a 64-bit float image from a 2D array shaped (rows, cols).
    ///
    /// Non-structural cards from `header` (WCS keywords, OBJECT, ...) are kept.
    pub fn from_array(array: &Array2<f64>, header: FitsHeader) -> Self {
        let (rows, cols) = array.dim();
        Self {
            header,
            axes: vec![cols, rows],
            data: array.iter().copied().collect(),
        }
    }

    /// Return the image plane with all length-1 axes removed.
    ///
    /// Errors unless exactly two axes remain.
    pub fn plane(&self) -> Result<Array2<f64>, FitsError> {
        let kept: Vec<usize> = self.axes.iter().copied().filter(|&n| n > 1).collect();
        if kept.len() != 2 {
            return Err(FitsError::NotTwoDimensional(kept.len()));
        }
        let (width, height) = (kept[0], kept[1]);
        Array2::from_shape_vec((height, width), self.data.clone()).map_err(|_| {
            FitsError::Truncated {
                expected: width * height,
                found: self.data.len(),
            }
        })
    }

    /// Encode as a single-HDU FITS stream with BITPIX -64.
    pub fn to_bytes(&self) -> Result<Vec<u8>, FitsError> {
        let mut cards = build_primary_header(-64, &self.axes)?;
        cards.extend(
            self.header
                .cards()
                .iter()
                .filter(|card| !is_structural(&card.keyword))
                .map(Card::to_raw),
        );

        let mut bytes = serialize_header(&cards);
        bytes.extend_from_slice(&serialize_image_f64(&self.data));
        Ok(bytes)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), FitsError> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }
}

fn is_structural(keyword: &str) -> bool {
    STRUCTURAL_KEYWORDS.contains(&keyword)
        || keyword
            .strip_prefix("NAXIS")
            .is_some_and(|n| n.chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    fn header_cards(cards: &[&str]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for card in cards {
            bytes.extend_from_slice(format!("{card:<80}").as_bytes());
        }
        bytes.extend_from_slice(format!("{:<80}", "END").as_bytes());
        bytes
    }

    fn header_block(cards: &[&str]) -> Vec<u8> {
        let mut bytes = header_cards(cards);
        bytes.resize(padded_len(bytes.len()), b' ');
        bytes
    }

    fn pad_data(bytes: &mut Vec<u8>) {
        bytes.resize(padded_len(bytes.len()), 0);
    }

    #[test]
    fn test_header_values_are_typed() {
        let mut bytes = header_block(&[
            "SIMPLE  =                    T",
            "BITPIX  =                   16",
            "NAXIS   =                    0",
            "CRVAL1  =          201.3650632 / RA at reference pixel",
            "CTYPE1  = 'RA---TAN'           / projection",
            "COMMENT SkyView cutout",
        ]);
        pad_data(&mut bytes);

        let image = FitsImage::from_bytes(&bytes).unwrap();
        let header = &image.header;
        assert_eq!(header.get("SIMPLE"), Some(&HeaderValue::Logical(true)));
        assert_eq!(header.get_f64("CRVAL1"), Some(201.3650632));
        assert_eq!(header.get_str("CTYPE1"), Some("RA---TAN"));
        assert_eq!(header.get_i64("BITPIX"), Some(16));
        assert!(!header.contains("COMMENT"));
        assert!(image.data.is_empty());
    }

    #[test]
    fn test_reads_scaled_int16_with_blank() {
        let mut bytes = header_block(&[
            "SIMPLE  =                    T",
            "BITPIX  =                   16",
            "NAXIS   =                    2",
            "NAXIS1  =                    2",
            "NAXIS2  =                    2",
            "BSCALE  =                  2.0",
            "BZERO   =                 10.0",
            "BLANK   =                   -1",
        ]);
        for v in [0i16, 1, -1, 5] {
            bytes.extend_from_slice(&v.to_be_bytes());
        }
        pad_data(&mut bytes);

        let image = FitsImage::from_bytes(&bytes).unwrap();
        assert_eq!(image.axes, vec![2, 2]);
        assert_eq!(image.data[0], 10.0);
        assert_eq!(image.data[1], 12.0);
        assert!(image.data[2].is_nan());
        assert_eq!(image.data[3], 20.0);
    }

    #[test]
    fn test_plane_squeezes_degenerate_axes() {
        let mut bytes = header_block(&[
            "SIMPLE  =                    T",
            "BITPIX  =                  -32",
            "NAXIS   =                    4",
            "NAXIS1  =                    3",
            "NAXIS2  =                    2",
            "NAXIS3  =                    1",
            "NAXIS4  =                    1",
        ]);
        for v in [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0] {
            bytes.extend_from_slice(&v.to_be_bytes());
        }
        pad_data(&mut bytes);

        let image = FitsImage::from_bytes(&bytes).unwrap();
        let plane = image.plane().unwrap();
        assert_eq!(plane.dim(), (2, 3));
        assert_eq!(plane[[0, 2]], 3.0);
        assert_eq!(plane[[1, 0]], 4.0);
    }

    #[test]
    fn test_write_then_read_preserves_pixels_and_cards() {
        let array = arr2(&[[0.5, 1.5, -2.0], [3.25, 4.0, 1e-9]]);
        let mut header = FitsHeader::new();
        header.set("CTYPE1", HeaderValue::Text("RA---TAN".to_string()));
        header.set("CRPIX1", HeaderValue::Float(2.0));
        header.set("NAXIS", HeaderValue::Integer(7));

        let bytes = FitsImage::from_array(&array, header).to_bytes().unwrap();
        assert_eq!(bytes.len() % BLOCK_SIZE, 0);

        let image = FitsImage::from_bytes(&bytes).unwrap();
        assert_eq!(image.plane().unwrap(), array);
        assert_eq!(image.header.get_str("CTYPE1"), Some("RA---TAN"));
        assert_eq!(image.header.get_f64("CRPIX1"), Some(2.0));
        assert_eq!(image.header.get_i64("NAXIS"), Some(2));
    }

    #[test]
    fn test_rejects_non_fits_payload() {
        let err = FitsImage::from_bytes(b"<html>No data found</html>").unwrap_err();
        assert!(matches!(err, FitsError::NotFits));
    }

    #[test]
    fn test_rejects_truncated_data() {
        let bytes = header_block(&[
            "SIMPLE  =                    T",
            "BITPIX  =                  -64",
            "NAXIS   =                    2",
            "NAXIS1  =                   10",
            "NAXIS2  =                   10",
        ]);
        let err = FitsImage::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, FitsError::Truncated { expected: 800, .. }));
    }

    #[test]
    fn test_header_without_padding_is_truncated() {
        let bytes = header_cards(&[
            "SIMPLE  =                    T",
            "BITPIX  =                  -32",
            "NAXIS   =                    0",
        ]);
        assert_eq!(bytes.len(), 320);

        let err = FitsImage::from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err,
            FitsError::Truncated {
                expected: 0,
                found: 0
            }
        ));
    }

    #[test]
    fn test_oversized_axes_are_rejected() {
        let naxis1 = format!("NAXIS1  = {:>20}", 1u64 << 62);
        let bytes = header_block(&[
            "SIMPLE  =                    T",
            "BITPIX  =                  -32",
            "NAXIS   =                    2",
            &naxis1,
            "NAXIS2  =                    8",
        ]);

        let err = FitsImage::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, FitsError::InvalidValue { ref keyword, .. } if keyword == "NAXIS1"));
    }

    #[test]
    fn test_unterminated_header() {
        let mut bytes = header_cards(&["SIMPLE  =                    T"]);
        bytes.truncate(CARD_SIZE);
        assert!(matches!(
            FitsImage::from_bytes(&bytes),
            Err(FitsError::UnterminatedHeader)
        ));
    }

    #[test]
    fn test_cube_is_not_a_plane() {
        let image = FitsImage {
            header: FitsHeader::new(),
            axes: vec![2, 2, 2],
            data: vec![0.0; 8],
        };
        assert!(matches!(image.plane(), Err(FitsError::NotTwoDimensional(3))));
    }
}
