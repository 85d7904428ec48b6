/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Small epsilon to avoid division by zero in floating-point comparisons.
pub const EPSILON: f32 = 1e-10;

/// File extensions picked up by the directory scanner (lowercase, no dot).
pub const DEFAULT_EXTENSIONS: [&str; 4] = ["fit", "fits", "fts", "xisf"];

/// Records per ingestion transaction. 1 flushes every parsed file immediately.
pub const DEFAULT_BATCH_SIZE: usize = 1;

/// Interval between folder polls in watch mode.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;

/// Half-width of the window searched when backfilling a missing timezone offset.
pub const BACKFILL_WINDOW_HOURS: i64 = 12;

/// Local hour at which one observing night ends and the next begins.
pub const NIGHT_BOUNDARY_HOUR: i64 = 12;

/// Maximum number of detected stars handed to FWHM fitting, in detection order.
pub const DEFAULT_MAX_FWHM_STARS: usize = 30;

/// Detection threshold in background standard deviations.
pub const DEFAULT_DETECTION_SIGMA: f32 = 5.0;

/// Side length of the square window used for per-star moment fitting.
pub const DEFAULT_FIT_BOX: usize = 7;

/// Smallest connected component accepted as a star, in pixels.
pub const DEFAULT_MIN_STAR_AREA: usize = 3;

/// Sigma-to-FWHM factor for a Gaussian profile: 2 * sqrt(2 * ln 2).
pub const GAUSSIAN_FWHM_FACTOR: f64 = 2.354_820_045;

/// Arcseconds per radian divided by 1000, for plate scale from
/// pixel size (microns) and focal length (mm).
pub const PLATE_SCALE_FACTOR: f64 = 206.265;

/// Default dark/bias validity window stored in user settings.
pub const DEFAULT_DARK_VALIDITY: &str = "3 months";

/// FITS logical record size.
pub const FITS_BLOCK_SIZE: usize = 2880;

/// FITS header card length.
pub const FITS_CARD_SIZE: usize = 80;

/// XISF monolithic file signature.
pub const XISF_SIGNATURE: &[u8; 8] = b"XISF0100";

/// Signature + header length + reserved field.
pub const XISF_PREFACE_SIZE: usize = 16;
