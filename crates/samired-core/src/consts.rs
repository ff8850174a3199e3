/// Small epsilon to avoid division by zero in floating-point comparisons.
pub const EPSILON: f32 = 1e-10;

/// Detector gain in electrons per ADU, identical for the four amplifiers.
pub const DEFAULT_GAIN: f32 = 2.6;

/// Detector read noise in electrons.
pub const DEFAULT_READ_NOISE: f32 = 10.0;

/// L.A.Cosmic detection limit for cosmic rays, in sigma.
pub const DEFAULT_SIGCLIP: f32 = 2.5;

/// Fractional detection limit for pixels neighbouring a cosmic ray.
pub const DEFAULT_SIGFRAC: f32 = 0.3;

/// Minimum contrast between the Laplacian image and the fine-structure image.
pub const DEFAULT_OBJLIM: f32 = 5.0;

/// Maximum number of L.A.Cosmic iterations.
pub const DEFAULT_COSMIC_ITERATIONS: usize = 4;

/// Number of neighbour columns (or rows) on each side used to repair a bad
/// column (or line).
pub const NEIGHBOUR_WINDOW: usize = 5;

/// Background rectangles sampled for lateral glow removal, as
/// `(row_start, row_end)` half-open row ranges: upper band, lower band.
pub const GLOW_ROW_BANDS: [(usize, usize); 2] = [(539, 589), (449, 506)];

/// Column ranges of the glow rectangles: left edge, right edge.
pub const GLOW_COL_BANDS: [(usize, usize); 2] = [(6, 56), (975, 1019)];

/// Physical separation between the two SOI detectors, in arcseconds.
pub const SOI_GAP_ARCSEC: f64 = 7.8;

/// Unbinned SOI plate scale in arcseconds per pixel.
pub const SOI_PIXEL_SCALE: f64 = 0.0767;

/// Equinox written when the header lacks one (or carries `unavail`).
pub const DEFAULT_EQUINOX: f64 = 2000.0;

/// Half-size of the central flat-normalisation window, as a fraction of the
/// image size (the window spans `size/2 +/- size/10`).
pub const FLAT_SCALE_WINDOW_DIVISOR: usize = 10;

/// Name of the directory that receives every reduced product.
pub const DEFAULT_REDUCED_DIR: &str = "RED";
