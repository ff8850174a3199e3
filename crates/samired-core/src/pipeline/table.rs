use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::Result;
use crate::frame::{Binning, ObsType, RawFrame};
use crate::instrument::Instrument;

/// One raw frame and the masters assigned to it so far.
#[derive(Clone, Debug)]
pub struct FrameRow {
    pub frame: RawFrame,
    pub zero_file: Option<PathBuf>,
    pub dark_file: Option<PathBuf>,
    pub flat_file: Option<PathBuf>,
}

impl FrameRow {
    pub fn new(frame: RawFrame) -> Self {
        Self {
            frame,
            zero_file: None,
            dark_file: None,
            flat_file: None,
        }
    }
}

/// Classification of every usable raw frame in a directory, in file-name
/// order.
#[derive(Clone, Debug, Default)]
pub struct FrameTable {
    pub rows: Vec<FrameRow>,
}

impl FrameTable {
    /// Inspect every `*.fits` file directly inside `dir`.
    ///
    /// Unreadable and degenerate files are logged and left out; returns the
    /// table and the number of files dropped.
    pub fn build(dir: &Path) -> Result<(Self, usize)> {
        info!(dir = %dir.display(), "Reading raw files");
        let mut rows = Vec::new();
        let mut dropped = 0;
        for path in fits_files(dir)? {
            match RawFrame::inspect(&path) {
                Ok(frame) => rows.push(FrameRow::new(frame)),
                Err(e) if e.is_frame_level() => {
                    warn!(file = %path.display(), error = %e, "Could not read file");
                    dropped += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok((Self { rows }, dropped))
    }

    pub fn from_frames(frames: impl IntoIterator<Item = RawFrame>) -> Self {
        let mut rows: Vec<FrameRow> = frames.into_iter().map(FrameRow::new).collect();
        rows.sort_by(|a, b| a.frame.path.cmp(&b.frame.path));
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Keep only frames taken with `instrument`. Returns `(kept, rejected)`.
    pub fn filter_instrument(&mut self, instrument: Instrument) -> (usize, usize) {
        info!(instrument = %instrument, "Checking how many files were obtained with the instrument");
        let name = instrument.profile().header_name();
        let total = self.rows.len();
        self.rows.retain(|row| row.frame.instrument == name);
        let kept = self.rows.len();
        info!(kept, rejected = total - kept, "Files selected");
        (kept, total - kept)
    }

    /// Distinct binning modes in order of first appearance.
    pub fn binnings(&self) -> Vec<Binning> {
        let mut found = Vec::new();
        for row in &self.rows {
            if !found.contains(&row.frame.binning) {
                info!(binning = %row.frame.binning.label(), "Found new binning mode");
                found.push(row.frame.binning);
            }
        }
        found
    }

    /// Indices of rows matching `binning` whose type satisfies `pred`.
    pub fn select(&self, binning: Binning, pred: impl Fn(&ObsType) -> bool) -> Vec<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, r)| r.frame.binning == binning && pred(&r.frame.obstype))
            .map(|(i, _)| i)
            .collect()
    }

    /// Distinct `FILTERS` values among `indices`, in order of appearance.
    pub fn filters(&self, indices: &[usize]) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        for &i in indices {
            let f = &self.rows[i].frame.filters;
            if !found.contains(f) {
                found.push(f.clone());
            }
        }
        found
    }
}

/// Sorted `*.fits` files in `dir`, not descending into subdirectories.
pub fn fits_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_fits = path.extension().is_some_and(|ext| ext == "fits");
        if is_fits && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
