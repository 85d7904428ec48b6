use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::consts::PLATE_SCALE_FACTOR;
use crate::error::{Result, SkylogError};
use crate::frame::Frame;
use crate::record::{ImageRecord, ImageType, OffsetOrigin};
use crate::session::timezone::TimezoneLookup;

use super::fits::FitsReader;
use super::xisf::XisfReader;

/// A typed header keyword value.
#[derive(Clone, Debug, PartialEq)]
pub enum HeaderValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Logical(bool),
}

impl HeaderValue {
    /// Parse a raw value the way FITS cards encode them: quoted strings,
    /// `T`/`F` logicals, integers, then floats (with `D` exponents).
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some(rest) = raw.strip_prefix('\'') {
            // '' is an escaped quote inside a FITS string.
            let mut text = String::new();
            let mut chars = rest.chars().peekable();
            while let Some(c) = chars.next() {
                if c == '\'' {
                    if chars.peek() == Some(&'\'') {
                        text.push('\'');
                        chars.next();
                    } else {
                        break;
                    }
                } else {
                    text.push(c);
                }
            }
            return Self::Text(text.trim_end().to_string());
        }

        let value = raw.split('/').next().unwrap_or("").trim();
        match value {
            "T" => return Self::Logical(true),
            "F" => return Self::Logical(false),
            _ => {}
        }
        if let Ok(i) = value.parse::<i64>() {
            return Self::Integer(i);
        }
        if let Ok(f) = value.replace(['D', 'd'], "E").parse::<f64>() {
            return Self::Float(f);
        }
        Self::Text(value.to_string())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            // Some writers quote numbers.
            Self::Text(s) => s.trim().parse().ok(),
            Self::Logical(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    None
                } else {
                    Some(s.to_string())
                }
            }
            Self::Integer(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Logical(b) => Some(if *b { "T" } else { "F" }.to_string()),
        }
    }
}

/// Keyword -> value map of one image header. Keys are uppercase.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HeaderMap {
    values: HashMap<String, HeaderValue>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// First occurrence wins, matching how capture software reads headers.
    pub fn insert(&mut self, keyword: &str, value: HeaderValue) {
        self.values
            .entry(keyword.trim().to_ascii_uppercase())
            .or_insert(value);
    }

    pub fn get(&self, keyword: &str) -> Option<&HeaderValue> {
        self.values.get(&keyword.to_ascii_uppercase())
    }

    pub fn float(&self, keyword: &str) -> Option<f64> {
        self.get(keyword).and_then(HeaderValue::as_f64)
    }

    pub fn text(&self, keyword: &str) -> Option<String> {
        self.get(keyword).and_then(HeaderValue::as_text)
    }

    /// First keyword of `keywords` that is present as a number.
    pub fn float_any(&self, keywords: &[&str]) -> Option<f64> {
        keywords.iter().find_map(|k| self.float(k))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &HeaderValue)> {
        self.values.iter()
    }
}

/// One header dialect: how to read acquisition metadata and pixels from a
/// file of that format.
pub trait HeaderReader: Send + Sync {
    fn read_header(&self, path: &Path) -> Result<HeaderMap>;

    fn read_pixels(&self, path: &Path) -> Result<Frame>;
}

static FITS: FitsReader = FitsReader;
static XISF: XisfReader = XisfReader;

/// Pick the dialect for a file by its extension.
pub fn reader_for_path(path: &Path) -> Result<&'static dyn HeaderReader> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("fit" | "fits" | "fts") => Ok(&FITS),
        Some("xisf") => Ok(&XISF),
        _ => Err(SkylogError::UnsupportedFormat(path.to_path_buf())),
    }
}

pub fn read_header(path: &Path) -> Result<HeaderMap> {
    reader_for_path(path)?.read_header(path)
}

pub fn read_pixels(path: &Path) -> Result<Frame> {
    reader_for_path(path)?.read_pixels(path)
}

/// Parse DATE-OBS. Fractional seconds and a trailing `Z` are optional.
pub fn parse_date_obs(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim().trim_end_matches('Z');
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Normalize a header map into the canonical record.
///
/// The timezone offset is resolved here, once, for records that carry site
/// coordinates; everything else starts without one.
pub fn record_from_header(
    path: &Path,
    header: &HeaderMap,
    timezone: &dyn TimezoneLookup,
) -> Result<ImageRecord> {
    let date_obs = header.text("DATE-OBS").ok_or(SkylogError::MissingKeyword {
        path: path.to_path_buf(),
        keyword: "DATE-OBS",
    })?;
    let capture_time = parse_date_obs(&date_obs).ok_or_else(|| SkylogError::InvalidHeader {
        path: path.to_path_buf(),
        reason: format!("unparseable DATE-OBS {date_obs:?}"),
    })?;

    let mut record = ImageRecord::new(path.to_string_lossy(), capture_time);
    record.latitude = header.float("SITELAT");
    record.longitude = header.float("SITELONG");
    record.width = header.float("NAXIS1").map(|v| v as u32);
    record.height = header.float("NAXIS2").map(|v| v as u32);
    record.pixel_size = header.float_any(&["XPIXSZ", "PIXSIZE"]);
    record.focal_length = header.float_any(&["FOCALLEN", "FOCAL"]);
    record.plate_scale = header
        .float_any(&["SCALE", "PIXSCALE"])
        .or_else(|| match (record.pixel_size, record.focal_length) {
            (Some(px), Some(fl)) if fl > 0.0 => Some(PLATE_SCALE_FACTOR * px / fl),
            _ => None,
        });
    record.target = header.text("OBJECT");
    record.ra = header.float_any(&["RA", "OBJCTRA"]);
    record.dec = header.float_any(&["DEC", "OBJCTDEC"]);
    record.instrument = header.text("INSTRUME");
    record.telescope = header.text("TELESCOP");
    record.filter = header.text("FILTER");
    record.image_type = header
        .text("IMAGETYP")
        .and_then(|t| ImageType::from_header(&t));
    record.exposure_time = header.float_any(&["EXPTIME", "EXPOSURE"]);
    record.ambient_temperature = header.float_any(&["FOCUSTEM", "AMB-TEMP", "AOCAMBT"]);
    record.sensor_temperature = header.float_any(&["CCD-TEMP", "SET-TEMP"]);
    record.gain = header.float("GAIN");
    record.offset = header.float("OFFSET");
    record.sky_brightness = header.float("MPSAS");
    record.airmass = header.float("AIRMASS");

    if let (Some(lat), Some(lon)) = (record.latitude, record.longitude) {
        if let Some(offset) = timezone.offset_hours(lat, lon, capture_time) {
            record.timezone_offset = Some(offset);
            record.offset_origin = Some(OffsetOrigin::Location);
        }
    }

    Ok(record)
}

/// Read a file's header and normalize it in one step.
pub fn read_record(path: &Path, timezone: &dyn TimezoneLookup) -> Result<ImageRecord> {
    let header = read_header(path)?;
    record_from_header(path, &header, timezone)
}
