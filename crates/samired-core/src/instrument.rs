use std::fmt;

use serde::{Deserialize, Serialize};

use crate::consts::{SOI_GAP_ARCSEC, SOI_PIXEL_SCALE};
use crate::frame::Binning;

/// A defective detector column, cleaned over rows `y0..yf`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BadColumn {
    pub x: usize,
    pub y0: usize,
    pub yf: usize,
}

/// A defective detector row, cleaned over columns `x0..xf`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BadLine {
    pub x0: usize,
    pub xf: usize,
    pub y: usize,
}

/// How amplifier sections tile the detector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MosaicLayout {
    /// Amplifiers abut edge to edge.
    Symmetric,
    /// Two detectors separated by a physical gap, restored in OBJECT frames.
    Gapped { gap_arcsec: f64, pixel_scale: f64 },
}

impl MosaicLayout {
    /// Gap width in binned pixels, zero for abutting layouts.
    pub fn gap_pixels(&self, binning: Binning) -> usize {
        match *self {
            Self::Symmetric => 0,
            Self::Gapped {
                gap_arcsec,
                pixel_scale,
            } => (gap_arcsec / pixel_scale / binning.x as f64).round() as usize,
        }
    }
}

/// Instrument-specific detector knowledge used by the reduction chain.
pub trait InstrumentProfile: Send + Sync {
    /// Value of the `INSTRUME` keyword identifying this instrument's files.
    fn header_name(&self) -> &'static str;

    /// Known bad columns for the given binning.
    fn bad_columns(&self, binning: Binning) -> Vec<BadColumn>;

    /// Known bad lines for the given binning.
    fn bad_lines(&self, binning: Binning) -> Vec<BadLine>;

    /// Whether merged frames show defective columns at the amplifier seam.
    fn has_seam_defects(&self) -> bool {
        false
    }

    /// Columns at the amplifier seam of a merged frame of `width` columns.
    fn seam_columns(&self, _width: usize) -> Vec<usize> {
        Vec::new()
    }

    fn mosaic_layout(&self) -> MosaicLayout {
        MosaicLayout::Symmetric
    }

    /// Whether final bad-pixel cleanup runs when the configuration is silent.
    fn clean_by_default(&self) -> bool {
        false
    }
}

/// Instrument selector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Instrument {
    #[default]
    Sami,
    Soi,
    Sifs,
}

impl Instrument {
    pub fn profile(&self) -> &'static dyn InstrumentProfile {
        match self {
            Self::Sami => &SAMI,
            Self::Soi => &SOI,
            Self::Sifs => &SIFS,
        }
    }

    /// Lower-case name used in report file names.
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Sami => "sami",
            Self::Soi => "soi",
            Self::Sifs => "sifs",
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sami => write!(f, "SAMI"),
            Self::Soi => write!(f, "SOI"),
            Self::Sifs => write!(f, "SIFS"),
        }
    }
}

// ---------------------------------------------------------------------------
// SAMI
// ---------------------------------------------------------------------------

/// `[x, y0, yf]` bad columns of SAMI at 4x4 binning.
const SAMI_BAD_COLUMNS_4X4: [[usize; 3]; 19] = [
    [167, 0, 513],
    [213, 513, 1023],
    [304, 0, 513],
    [309, 1, 512],
    [386, 0, 513],
    [476, 0, 513],
    [602, 0, 513],
    [671, 0, 513],
    [673, 475, 513],
    [678, 0, 513],
    [741, 0, 513],
    [810, 0, 513],
    [919, 0, 513],
    [212, 513, 1023],
    [680, 513, 1023],
    [725, 513, 1023],
    [848, 513, 1023],
    [948, 0, 512],
    [949, 0, 512],
];

/// `[x0, xf, y]` bad lines of SAMI at 4x4 binning.
const SAMI_BAD_LINES_4X4: [[usize; 3]; 17] = [
    [166, 206, 282],
    [212, 258, 689],
    [214, 239, 688],
    [304, 345, 291],
    [386, 422, 454],
    [398, 422, 38],
    [477, 516, 490],
    [387, 429, 455],
    [574, 603, 494],
    [574, 603, 493],
    [640, 672, 388],
    [604, 671, 388],
    [698, 746, 198],
    [706, 634, 634],
    [772, 812, 354],
    [900, 938, 426],
    [904, 920, 396],
];

pub struct Sami;

static SAMI: Sami = Sami;

impl InstrumentProfile for Sami {
    fn header_name(&self) -> &'static str {
        "SAM"
    }

    fn bad_columns(&self, binning: Binning) -> Vec<BadColumn> {
        match binning.x {
            4 => columns(&SAMI_BAD_COLUMNS_4X4),
            _ => Vec::new(),
        }
    }

    fn bad_lines(&self, binning: Binning) -> Vec<BadLine> {
        match binning.x {
            4 => lines(&SAMI_BAD_LINES_4X4),
            _ => Vec::new(),
        }
    }

    fn has_seam_defects(&self) -> bool {
        true
    }

    /// The two columns either side of the vertical amplifier boundary.
    fn seam_columns(&self, width: usize) -> Vec<usize> {
        if width < 2 {
            return Vec::new();
        }
        vec![width / 2 - 1, width / 2]
    }
}

/// SIFS shares the SAMI detector.
pub struct Sifs;

static SIFS: Sifs = Sifs;

impl InstrumentProfile for Sifs {
    fn header_name(&self) -> &'static str {
        "SIFS"
    }

    fn bad_columns(&self, binning: Binning) -> Vec<BadColumn> {
        SAMI.bad_columns(binning)
    }

    fn bad_lines(&self, binning: Binning) -> Vec<BadLine> {
        SAMI.bad_lines(binning)
    }

    fn has_seam_defects(&self) -> bool {
        SAMI.has_seam_defects()
    }

    fn seam_columns(&self, width: usize) -> Vec<usize> {
        SAMI.seam_columns(width)
    }
}

// ---------------------------------------------------------------------------
// SOI
// ---------------------------------------------------------------------------

pub struct Soi;

static SOI: Soi = Soi;

impl InstrumentProfile for Soi {
    fn header_name(&self) -> &'static str {
        "SOI"
    }

    fn bad_columns(&self, binning: Binning) -> Vec<BadColumn> {
        match binning.x {
            2 => columns(&[[855, 0, 2047]]),
            4 => columns(&[[427, 0, 1023]]),
            _ => Vec::new(),
        }
    }

    fn bad_lines(&self, _binning: Binning) -> Vec<BadLine> {
        Vec::new()
    }

    fn mosaic_layout(&self) -> MosaicLayout {
        MosaicLayout::Gapped {
            gap_arcsec: SOI_GAP_ARCSEC,
            pixel_scale: SOI_PIXEL_SCALE,
        }
    }

    fn clean_by_default(&self) -> bool {
        true
    }
}

fn columns(table: &[[usize; 3]]) -> Vec<BadColumn> {
    table
        .iter()
        .map(|&[x, y0, yf]| BadColumn { x, y0, yf })
        .collect()
}

fn lines(table: &[[usize; 3]]) -> Vec<BadLine> {
    table
        .iter()
        .map(|&[x0, xf, y]| BadLine { x0, xf, y })
        .collect()
}
