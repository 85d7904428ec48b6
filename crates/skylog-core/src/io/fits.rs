use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt};
use memmap2::Mmap;
use ndarray::{ArrayD, IxDyn};

use crate::consts::{FITS_BLOCK_SIZE, FITS_CARD_SIZE};
use crate::error::{Result, SkylogError};
use crate::frame::Frame;

use super::header::{HeaderMap, HeaderReader, HeaderValue};

/// FITS primary HDU reader.
pub struct FitsReader;

impl HeaderReader for FitsReader {
    fn read_header(&self, path: &Path) -> Result<HeaderMap> {
        let mmap = map_file(path)?;
        let (header, _) = parse_header(path, &mmap)?;
        Ok(header)
    }

    fn read_pixels(&self, path: &Path) -> Result<Frame> {
        let mmap = map_file(path)?;
        let (header, data_start) = parse_header(path, &mmap)?;
        let layout = DataLayout::from_header(path, &header)?;
        let data = decode_data(path, mmap.get(data_start..).unwrap_or_default(), &layout)?;

        let mut frame = Frame::new(data);
        frame.exposure_time = header.float_any(&["EXPTIME", "EXPOSURE"]);
        Ok(frame)
    }
}

fn map_file(path: &Path) -> Result<Mmap> {
    let file = File::open(path)?;
    let mmap = unsafe { Mmap::map(&file)? };
    if mmap.len() < FITS_BLOCK_SIZE || &mmap[..6] != b"SIMPLE" {
        return Err(SkylogError::InvalidHeader {
            path: path.to_path_buf(),
            reason: "missing SIMPLE card".into(),
        });
    }
    Ok(mmap)
}

/// Parse 80-byte cards up to END. Returns the header and the byte offset
/// of the data unit (the next block boundary).
fn parse_header(path: &Path, bytes: &[u8]) -> Result<(HeaderMap, usize)> {
    let mut header = HeaderMap::new();

    for (index, card) in bytes.chunks_exact(FITS_CARD_SIZE).enumerate() {
        let card = String::from_utf8_lossy(card);
        let keyword = card.get(..8).unwrap_or("").trim();

        if keyword == "END" {
            let header_len = (index + 1) * FITS_CARD_SIZE;
            let data_start = header_len.div_ceil(FITS_BLOCK_SIZE) * FITS_BLOCK_SIZE;
            return Ok((header, data_start));
        }
        if keyword.is_empty() || matches!(keyword, "COMMENT" | "HISTORY") {
            continue;
        }
        // Value indicator "= " in columns 9-10.
        if card.get(8..10) == Some("= ") {
            header.insert(keyword, HeaderValue::parse(card.get(10..).unwrap_or("")));
        }
    }

    Err(SkylogError::InvalidHeader {
        path: path.to_path_buf(),
        reason: "no END card".into(),
    })
}

struct DataLayout {
    bitpix: i64,
    /// NAXISn in file order, fastest axis first.
    axes: Vec<usize>,
    bzero: f64,
    bscale: f64,
}

impl DataLayout {
    fn from_header(path: &Path, header: &HeaderMap) -> Result<Self> {
        let missing = |keyword: &'static str| SkylogError::MissingKeyword {
            path: path.to_path_buf(),
            keyword,
        };
        let bitpix = header.float("BITPIX").ok_or_else(|| missing("BITPIX"))? as i64;
        let naxis = header.float("NAXIS").ok_or_else(|| missing("NAXIS"))? as usize;
        if !(2..=3).contains(&naxis) {
            return Err(SkylogError::InvalidHeader {
                path: path.to_path_buf(),
                reason: format!("unsupported NAXIS {naxis}"),
            });
        }
        let axes = (1..=naxis)
            .map(|n| {
                header
                    .float(&format!("NAXIS{n}"))
                    .map(|v| v as usize)
                    .ok_or_else(|| SkylogError::InvalidHeader {
                        path: path.to_path_buf(),
                        reason: format!("missing NAXIS{n}"),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            bitpix,
            axes,
            bzero: header.float("BZERO").unwrap_or(0.0),
            bscale: header.float("BSCALE").unwrap_or(1.0),
        })
    }

    fn bytes_per_value(&self) -> usize {
        (self.bitpix.unsigned_abs() / 8) as usize
    }

    /// Sample count and data unit length in bytes; `None` on overflow.
    fn data_size(&self) -> Option<(usize, usize)> {
        let count = self
            .axes
            .iter()
            .try_fold(1usize, |acc, &n| acc.checked_mul(n))?;
        Some((count, count.checked_mul(self.bytes_per_value())?))
    }
}

/// Decode big-endian samples into `(height, width)` or
/// `(height, width, channels)`, applying BZERO/BSCALE.
fn decode_data(path: &Path, bytes: &[u8], layout: &DataLayout) -> Result<ArrayD<f32>> {
    let (count, needed) = layout.data_size().ok_or_else(|| SkylogError::InvalidHeader {
        path: path.to_path_buf(),
        reason: "data unit size overflows".into(),
    })?;
    if bytes.len() < needed {
        return Err(SkylogError::InvalidHeader {
            path: path.to_path_buf(),
            reason: format!("data unit truncated: need {needed} bytes, have {}", bytes.len()),
        });
    }

    let mut cursor = Cursor::new(&bytes[..needed]);
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        let raw = match layout.bitpix {
            8 => cursor.read_u8()? as f64,
            16 => cursor.read_i16::<BigEndian>()? as f64,
            32 => cursor.read_i32::<BigEndian>()? as f64,
            64 => cursor.read_i64::<BigEndian>()? as f64,
            -32 => cursor.read_f32::<BigEndian>()? as f64,
            -64 => cursor.read_f64::<BigEndian>()?,
            other => {
                return Err(SkylogError::InvalidHeader {
                    path: path.to_path_buf(),
                    reason: format!("unsupported BITPIX {other}"),
                })
            }
        };
        values.push((layout.bzero + layout.bscale * raw) as f32);
    }

    let (w, h) = (layout.axes[0], layout.axes[1]);
    let shape_err = |e: ndarray::ShapeError| SkylogError::InvalidHeader {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    if layout.axes.len() == 2 {
        return ArrayD::from_shape_vec(IxDyn(&[h, w]), values).map_err(shape_err);
    }

    // Planes are stored one after another; move channels last.
    let c = layout.axes[2];
    let planar = ArrayD::from_shape_vec(IxDyn(&[c, h, w]), values).map_err(shape_err)?;
    let interleaved = planar.permuted_axes(IxDyn(&[1, 2, 0]));
    Ok(interleaved.as_standard_layout().into_owned())
}
