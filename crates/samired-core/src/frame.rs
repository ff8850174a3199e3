use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ReductionError, Result};
use crate::io::fits::FitsReader;
use crate::io::header::Header;
use crate::stats::mean_std;

/// Frame classification from the `OBSTYPE` keyword.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ObsType {
    Zero,
    Dark,
    SkyFlat,
    DomeFlat,
    Object,
    Other(String),
}

impl ObsType {
    pub fn parse(text: &str) -> Self {
        match text.trim().to_ascii_uppercase().as_str() {
            "ZERO" => Self::Zero,
            "DARK" => Self::Dark,
            "SFLAT" => Self::SkyFlat,
            "DFLAT" => Self::DomeFlat,
            "OBJECT" => Self::Object,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_flat(&self) -> bool {
        matches!(self, Self::SkyFlat | Self::DomeFlat)
    }

    /// Position in the calibration dependency order ZERO, DARK, FLAT, OBJECT.
    /// Unknown types take no part in the reduction.
    pub fn stage_rank(&self) -> Option<u8> {
        match self {
            Self::Zero => Some(0),
            Self::Dark => Some(1),
            Self::SkyFlat | Self::DomeFlat => Some(2),
            Self::Object => Some(3),
            Self::Other(_) => None,
        }
    }
}

impl fmt::Display for ObsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zero => write!(f, "ZERO"),
            Self::Dark => write!(f, "DARK"),
            Self::SkyFlat => write!(f, "SFLAT"),
            Self::DomeFlat => write!(f, "DFLAT"),
            Self::Object => write!(f, "OBJECT"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

/// On-chip binning from the `CCDSUM` keyword (`"2 2"`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Binning {
    pub x: usize,
    pub y: usize,
}

impl Binning {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    pub fn parse(ccdsum: &str) -> Result<Self> {
        let malformed = || ReductionError::Format(format!("invalid CCDSUM {ccdsum:?}"));
        let mut parts = ccdsum.split_whitespace().map(str::parse::<usize>);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(Ok(x)), Some(Ok(y)), None) if x > 0 && y > 0 => Ok(Self { x, y }),
            _ => Err(malformed()),
        }
    }

    pub fn from_header(header: &Header) -> Result<Self> {
        Self::parse(header.get_str("CCDSUM")?)
    }

    /// `"{x}x{y}"`, the form used in list and master file names.
    pub fn label(&self) -> String {
        format!("{}x{}", self.x, self.y)
    }
}

impl fmt::Display for Binning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.x, self.y)
    }
}

/// Classification fields of one raw input file.
///
/// Built once by [`RawFrame::inspect`]; the pixel data is read again when the
/// frame is reduced.
#[derive(Clone, Debug)]
pub struct RawFrame {
    pub path: PathBuf,
    pub instrument: String,
    pub obstype: ObsType,
    pub filters: String,
    pub filter1: String,
    pub filter2: String,
    pub binning: Binning,
    pub n_extensions: usize,
}

impl RawFrame {
    /// Read the headers of `path` and reject files that cannot be reduced.
    ///
    /// Classification comes from the primary header, binning from the first
    /// amplifier extension. A science array with zero variance is the
    /// signature of an empty or corrupt read-out and yields `DegenerateData`.
    pub fn inspect(path: &Path) -> Result<Self> {
        let mut reader = FitsReader::open(path)?;
        let science_index = if reader.hdu_count() > 1 { 1 } else { 0 };
        let data = reader
            .read_data(science_index)?
            .ok_or_else(|| ReductionError::DegenerateData(path.to_path_buf()))?;
        let (_, std) = mean_std(data.iter());
        if std == 0.0 {
            return Err(ReductionError::DegenerateData(path.to_path_buf()));
        }

        let primary = reader.header(0)?;
        let science_header = reader.header(science_index)?;

        let text = |key: &str| -> Result<String> {
            Ok(primary.opt_str(key)?.unwrap_or_default().trim().to_string())
        };
        let ccdsum = match science_header.opt_str("CCDSUM")? {
            Some(s) => s,
            None => primary.get_str("CCDSUM")?,
        };

        Ok(Self {
            path: path.to_path_buf(),
            instrument: text("INSTRUME")?.to_ascii_uppercase(),
            obstype: ObsType::parse(&text("OBSTYPE")?),
            filters: text("FILTERS")?,
            filter1: text("FILTER1")?,
            filter2: text("FILTER2")?,
            binning: Binning::parse(ccdsum)?,
            n_extensions: reader.hdu_count(),
        })
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}
