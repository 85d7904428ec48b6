pub mod fits;
pub mod header;
pub mod xisf;

pub use header::{
    read_header, read_pixels, read_record, reader_for_path, record_from_header, HeaderMap,
    HeaderReader, HeaderValue,
};
