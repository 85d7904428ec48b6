#![allow(dead_code)]

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use ndarray::Array2;

use skylog_core::record::{ImageRecord, ImageType, OffsetOrigin};

pub const FITS_BLOCK: usize = 2880;

/// A FITS header value as it appears after `= `.
pub enum Card<'a> {
    Text(&'a str, &'a str),
    Number(&'a str, f64),
}

fn card(keyword: &str, value: &str) -> String {
    let mut card = format!("{keyword:<8}= {value}");
    card.truncate(80);
    format!("{card:<80}")
}

fn pad_block(buf: &mut Vec<u8>, fill: u8) {
    let rem = buf.len() % FITS_BLOCK;
    if rem != 0 {
        buf.resize(buf.len() + FITS_BLOCK - rem, fill);
    }
}

/// Build a single-HDU FITS file with 32-bit float pixels.
pub fn build_fits(pixels: &Array2<f32>, cards: &[Card<'_>]) -> Vec<u8> {
    let (h, w) = pixels.dim();
    let mut header = String::new();
    header.push_str(&card("SIMPLE", &format!("{:>20}", "T")));
    header.push_str(&card("BITPIX", &format!("{:>20}", -32)));
    header.push_str(&card("NAXIS", &format!("{:>20}", 2)));
    header.push_str(&card("NAXIS1", &format!("{w:>20}")));
    header.push_str(&card("NAXIS2", &format!("{h:>20}")));
    for c in cards {
        match c {
            Card::Text(k, v) => header.push_str(&card(k, &format!("'{v}'"))),
            Card::Number(k, v) => header.push_str(&card(k, &format!("{v:>20}"))),
        }
    }
    header.push_str(&format!("{:<80}", "END"));

    let mut buf = header.into_bytes();
    pad_block(&mut buf, b' ');
    for v in pixels.iter() {
        buf.extend_from_slice(&v.to_be_bytes());
    }
    pad_block(&mut buf, 0);
    buf
}

/// Overwrite the value of an existing card in a built FITS file.
pub fn patch_card(bytes: &mut [u8], keyword: &str, value: &str) {
    let replacement = card(keyword, &format!("{value:>20}"));
    let prefix = format!("{keyword:<8}= ");
    let start = bytes
        .chunks_exact(80)
        .position(|c| c.starts_with(prefix.as_bytes()))
        .expect("card present")
        * 80;
    bytes[start..start + 80].copy_from_slice(replacement.as_bytes());
}

pub fn write_fits(dir: &Path, name: &str, pixels: &Array2<f32>, cards: &[Card<'_>]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, build_fits(pixels, cards)).unwrap();
    path
}

/// Build a monolithic XISF file with one planar Float32 mono image.
pub fn build_xisf(pixels: &Array2<f32>, keywords: &[(&str, &str)]) -> Vec<u8> {
    build_xisf_with_location(pixels, keywords, None)
}

/// As `build_xisf`, with the `location` attribute replaced when given.
pub fn build_xisf_with_location(
    pixels: &Array2<f32>,
    keywords: &[(&str, &str)],
    location: Option<&str>,
) -> Vec<u8> {
    let (h, w) = pixels.dim();
    let size = h * w * 4;
    let keyword_xml: String = keywords
        .iter()
        .map(|(name, value)| format!("<FITSKeyword name=\"{name}\" value=\"{value}\" comment=\"\"/>"))
        .collect();

    // The attachment offset appears inside the header it locates, so size
    // the header with a fixed-width placeholder first.
    let render = |position: usize| {
        let location = location
            .map(str::to_string)
            .unwrap_or_else(|| format!("attachment:{position:010}:{size}"));
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><xisf version=\"1.0\">\
             <Image geometry=\"{w}:{h}:1\" sampleFormat=\"Float32\" colorSpace=\"Gray\" \
             location=\"{location}\">{keyword_xml}</Image></xisf>"
        )
    };
    let xml_len = render(0).len();
    let position = 16 + xml_len;
    let xml = render(position);

    let mut buf = Vec::new();
    buf.extend_from_slice(b"XISF0100");
    buf.extend_from_slice(&(xml.len() as u32).to_le_bytes());
    buf.extend_from_slice(&[0u8; 4]);
    buf.extend_from_slice(xml.as_bytes());
    for v in pixels.iter() {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    buf
}

pub fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

/// Record with a location-derived offset, ready for insertion.
pub fn record(name: &str, image_type: ImageType, time: DateTime<Utc>, offset: f64) -> ImageRecord {
    let mut r = ImageRecord::new(name, time);
    r.image_type = Some(image_type);
    r.timezone_offset = Some(offset);
    r.offset_origin = Some(OffsetOrigin::Location);
    r.instrument = Some("ZWO ASI2600MM".into());
    r.telescope = Some("RedCat 51".into());
    r.gain = Some(100.0);
    r.offset = Some(50.0);
    r.sensor_temperature = Some(-10.0);
    r.exposure_time = Some(300.0);
    r
}

/// Uniform background with a little deterministic texture.
pub fn background(h: usize, w: usize, level: f32) -> Array2<f32> {
    Array2::from_shape_fn((h, w), |(r, c)| level + ((r * 31 + c * 17) % 7) as f32)
}

/// Add a circular Gaussian star.
pub fn add_star(img: &mut Array2<f32>, cy: f64, cx: f64, sigma: f64, amplitude: f32) {
    let (h, w) = img.dim();
    for r in 0..h {
        for c in 0..w {
            let d2 = (r as f64 - cy).powi(2) + (c as f64 - cx).powi(2);
            img[[r, c]] += amplitude * (-d2 / (2.0 * sigma * sigma)).exp() as f32;
        }
    }
}
