use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use memmap2::Mmap;
use ndarray::{ArrayD, IxDyn};

use crate::consts::{XISF_PREFACE_SIZE, XISF_SIGNATURE};
use crate::error::{Result, SkylogError};
use crate::frame::Frame;

use super::header::{HeaderMap, HeaderReader, HeaderValue};

/// Monolithic XISF reader. Metadata comes from the `FITSKeyword` elements
/// of the first `Image`; pixels from its attachment block.
pub struct XisfReader;

impl HeaderReader for XisfReader {
    fn read_header(&self, path: &Path) -> Result<HeaderMap> {
        let mmap = map_file(path)?;
        let xml = xml_header(path, &mmap)?;
        let image = first_image(path, xml)?;

        // Geometry is authoritative for dimensions; inserted first so it wins.
        let mut header = HeaderMap::new();
        header.insert("NAXIS1", HeaderValue::Integer(image.width as i64));
        header.insert("NAXIS2", HeaderValue::Integer(image.height as i64));
        for (keyword, value) in keywords(xml).iter() {
            header.insert(keyword, value.clone());
        }
        Ok(header)
    }

    fn read_pixels(&self, path: &Path) -> Result<Frame> {
        let mmap = map_file(path)?;
        let xml = xml_header(path, &mmap)?;
        let image = first_image(path, xml)?;
        let header = keywords(xml);

        let end = image
            .position
            .checked_add(image.size)
            .filter(|&end| end <= mmap.len())
            .ok_or_else(|| {
                invalid(
                    path,
                    format!(
                        "attachment {}+{} exceeds file of {} bytes",
                        image.position,
                        image.size,
                        mmap.len()
                    ),
                )
            })?;
        let data = decode_attachment(path, &mmap[image.position..end], &image)?;

        let mut frame = Frame::new(data);
        frame.exposure_time = header.float_any(&["EXPTIME", "EXPOSURE"]);
        Ok(frame)
    }
}

fn invalid(path: &Path, reason: impl Into<String>) -> SkylogError {
    SkylogError::InvalidHeader {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn map_file(path: &Path) -> Result<Mmap> {
    let file = File::open(path)?;
    let mmap = unsafe { Mmap::map(&file)? };
    if mmap.len() < XISF_PREFACE_SIZE || &mmap[..8] != XISF_SIGNATURE {
        return Err(invalid(path, "missing XISF0100 signature"));
    }
    Ok(mmap)
}

fn xml_header<'a>(path: &Path, bytes: &'a [u8]) -> Result<&'a str> {
    let len = Cursor::new(&bytes[8..12]).read_u32::<LittleEndian>()? as usize;
    let end = XISF_PREFACE_SIZE + len;
    if bytes.len() < end {
        return Err(invalid(path, "XML header truncated"));
    }
    std::str::from_utf8(&bytes[XISF_PREFACE_SIZE..end])
        .map(|s| s.trim_end_matches('\0'))
        .map_err(|e| invalid(path, e.to_string()))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SampleFormat {
    UInt8,
    UInt16,
    UInt32,
    Float32,
    Float64,
}

impl SampleFormat {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "UInt8" => Some(Self::UInt8),
            "UInt16" => Some(Self::UInt16),
            "UInt32" => Some(Self::UInt32),
            "Float32" => Some(Self::Float32),
            "Float64" => Some(Self::Float64),
            _ => None,
        }
    }

    fn bytes(self) -> usize {
        match self {
            Self::UInt8 => 1,
            Self::UInt16 => 2,
            Self::UInt32 | Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }
}

#[derive(Debug)]
struct ImageElement {
    width: usize,
    height: usize,
    channels: usize,
    format: SampleFormat,
    normal: bool,
    position: usize,
    size: usize,
}

fn first_image(path: &Path, xml: &str) -> Result<ImageElement> {
    let attrs = elements(xml, "Image")
        .next()
        .ok_or_else(|| invalid(path, "no Image element"))?;

    let geometry = attribute(attrs, "geometry").ok_or_else(|| invalid(path, "Image without geometry"))?;
    let dims = geometry
        .split(':')
        .map(|d| d.trim().parse::<usize>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| invalid(path, format!("bad geometry {geometry:?}")))?;
    let (width, height, channels) = match dims.as_slice() {
        [w, h] => (*w, *h, 1),
        [w, h, c] => (*w, *h, *c),
        _ => return Err(invalid(path, format!("unsupported geometry {geometry:?}"))),
    };

    let format = attribute(attrs, "sampleFormat")
        .and_then(|f| SampleFormat::parse(&f))
        .ok_or_else(|| invalid(path, "missing or unsupported sampleFormat"))?;

    if attribute(attrs, "compression").is_some() {
        return Err(invalid(path, "compressed XISF blocks are not supported"));
    }
    if attribute(attrs, "byteOrder").as_deref() == Some("big") {
        return Err(invalid(path, "big-endian XISF blocks are not supported"));
    }
    let normal = attribute(attrs, "pixelStorage").as_deref() == Some("Normal");

    let location = attribute(attrs, "location").ok_or_else(|| invalid(path, "Image without location"))?;
    let mut parts = location.split(':');
    let (position, size) = match (parts.next(), parts.next(), parts.next()) {
        (Some("attachment"), Some(pos), Some(size)) => (
            pos.parse().map_err(|_| invalid(path, "bad attachment position"))?,
            size.parse().map_err(|_| invalid(path, "bad attachment size"))?,
        ),
        _ => return Err(invalid(path, format!("unsupported location {location:?}"))),
    };

    Ok(ImageElement {
        width,
        height,
        channels,
        format,
        normal,
        position,
        size,
    })
}

fn keywords(xml: &str) -> HeaderMap {
    let mut header = HeaderMap::new();
    for attrs in elements(xml, "FITSKeyword") {
        if let (Some(name), Some(value)) = (attribute(attrs, "name"), attribute(attrs, "value")) {
            header.insert(&name, HeaderValue::parse(&value));
        }
    }
    header
}

/// Decode an uncompressed little-endian block into `(height, width, channels)`.
fn decode_attachment(path: &Path, bytes: &[u8], image: &ImageElement) -> Result<ArrayD<f32>> {
    let (count, needed) = image
        .width
        .checked_mul(image.height)
        .and_then(|n| n.checked_mul(image.channels))
        .and_then(|n| Some((n, n.checked_mul(image.format.bytes())?)))
        .ok_or_else(|| invalid(path, "image geometry overflows"))?;
    if bytes.len() < needed {
        return Err(invalid(path, format!("pixel block truncated: need {needed} bytes, have {}", bytes.len())));
    }

    let mut cursor = Cursor::new(&bytes[..needed]);
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        let v = match image.format {
            SampleFormat::UInt8 => cursor.read_u8()? as f32,
            SampleFormat::UInt16 => cursor.read_u16::<LittleEndian>()? as f32,
            SampleFormat::UInt32 => cursor.read_u32::<LittleEndian>()? as f32,
            SampleFormat::Float32 => cursor.read_f32::<LittleEndian>()?,
            SampleFormat::Float64 => cursor.read_f64::<LittleEndian>()? as f32,
        };
        values.push(v);
    }

    let (w, h, c) = (image.width, image.height, image.channels);
    let shape_err = |e: ndarray::ShapeError| invalid(path, e.to_string());
    if image.normal {
        return ArrayD::from_shape_vec(IxDyn(&[h, w, c]), values).map_err(shape_err);
    }
    // Planar is the default storage.
    let planar = ArrayD::from_shape_vec(IxDyn(&[c, h, w]), values).map_err(shape_err)?;
    Ok(planar
        .permuted_axes(IxDyn(&[1, 2, 0]))
        .as_standard_layout()
        .into_owned())
}

/// Attribute text of every `<tag ...>` opening element.
fn elements<'a>(xml: &'a str, tag: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    let open = format!("<{tag}");
    let mut rest = xml;
    std::iter::from_fn(move || loop {
        let start = rest.find(&open)?;
        let after = &rest[start + open.len()..];
        let end = after.find('>')?;
        rest = &after[end..];
        match after.chars().next() {
            Some(c) if c.is_whitespace() || c == '/' || c == '>' => {
                return Some(after[..end].trim_end_matches('/'));
            }
            _ => continue,
        }
    })
}

fn attribute(attrs: &str, name: &str) -> Option<String> {
    let mut rest = attrs;
    loop {
        let eq = rest.find('=')?;
        let key = rest[..eq].trim();
        let after = rest[eq + 1..].trim_start();
        let quote = after.chars().next()?;
        if quote != '"' && quote != '\'' {
            return None;
        }
        let close = after[1..].find(quote)?;
        let value = &after[1..1 + close];
        if key == name {
            return Some(unescape(value));
        }
        rest = &after[close + 2..];
    }
}

fn unescape(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
