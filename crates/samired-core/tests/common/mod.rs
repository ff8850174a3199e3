use std::path::{Path, PathBuf};

use ndarray::Array2;

use samired_core::io::fits::Hdu;
use samired_core::io::fits_writer::FitsWriter;
use samired_core::io::header::Header;
use samired_core::region::format_region;

/// Unbinned detector size of the synthetic 4-amplifier camera.
pub const DETECTOR: usize = 64;
/// Overscan columns appended to each amplifier read-out.
pub const OVERSCAN: usize = 4;

/// Description of a synthetic raw frame.
#[derive(Clone, Debug)]
pub struct RawSpec {
    pub instrument: &'static str,
    pub obstype: &'static str,
    pub filters: &'static str,
    pub binning: usize,
    pub exptime: f64,
    /// Science level after overscan removal.
    pub level: f32,
    /// Constant overscan pedestal.
    pub bias: f32,
}

impl Default for RawSpec {
    fn default() -> Self {
        Self {
            instrument: "SAM",
            obstype: "OBJECT",
            filters: "F1",
            binning: 2,
            exptime: 10.0,
            level: 100.0,
            bias: 1000.0,
        }
    }
}

impl RawSpec {
    pub fn obstype(mut self, obstype: &'static str) -> Self {
        self.obstype = obstype;
        self
    }

    pub fn filters(mut self, filters: &'static str) -> Self {
        self.filters = filters;
        self
    }

    pub fn level(mut self, level: f32) -> Self {
        self.level = level;
        self
    }

    pub fn binning(mut self, binning: usize) -> Self {
        self.binning = binning;
        self
    }

    pub fn instrument(mut self, instrument: &'static str) -> Self {
        self.instrument = instrument;
        self
    }

    /// Merged frame shape `(rows, cols)`.
    pub fn merged_shape(&self) -> (usize, usize) {
        (DETECTOR / self.binning, DETECTOR / self.binning)
    }
}

pub fn primary_header(spec: &RawSpec) -> Header {
    let mut h = Header::new();
    h.set("INSTRUME", spec.instrument);
    h.set("OBSTYPE", spec.obstype);
    h.set("FILTERS", spec.filters);
    h.set("FILTER1", spec.filters);
    h.set("FILTER2", "CLEAR");
    h.set("EXPTIME", spec.exptime);
    h.set("RA", "12:00:00.0");
    h.set("DEC", "-30:00:00.0");
    h.set("PIXSCAL1", 0.0455);
    h.set("PIXSCAL2", 0.0455);
    h.set("DECPANGL", 0.0);
    h
}

/// Primary HDU plus four amplifier extensions.
///
/// Each amplifier covers one quadrant; its science section reads
/// `level + bias` plus a small ripple that keeps the variance non-zero and
/// its overscan reads `bias`.
pub fn raw_hdus(spec: &RawSpec) -> Vec<Hdu> {
    let b = spec.binning;
    let half = DETECTOR / 2;
    let amp = half / b;
    let ccdsum = format!("{b} {b}");
    let detsize = format_region(0, DETECTOR, 0, DETECTOR);

    let mut hdus = vec![Hdu::header_only(primary_header(spec))];
    for (i, (qx, qy)) in [(0, 0), (1, 0), (0, 1), (1, 1)].into_iter().enumerate() {
        let mut h = Header::new();
        h.set("EXTNAME", format!("AMP{}", i + 1));
        h.set("CCDSUM", ccdsum.as_str());
        h.set("DETSIZE", detsize.as_str());
        h.set(
            "DETSEC",
            format_region(qx * half, (qx + 1) * half, qy * half, (qy + 1) * half),
        );
        h.set("TRIMSEC", format_region(0, amp, 0, amp));
        h.set("BIASSEC", format_region(amp, amp + OVERSCAN, 0, amp));

        let data = Array2::from_shape_fn((amp, amp + OVERSCAN), |(r, c)| {
            if c < amp {
                spec.bias + spec.level + ripple(r, c)
            } else {
                spec.bias
            }
        });
        hdus.push(Hdu::new(h, data));
    }
    hdus
}

/// Zero-mean pattern small enough to leave medians untouched.
pub fn ripple(r: usize, c: usize) -> f32 {
    if (r + c) % 2 == 0 {
        0.5
    } else {
        -0.5
    }
}

pub fn write_hdus(path: &Path, hdus: &[Hdu]) {
    let mut writer = FitsWriter::create(path, true).unwrap();
    for hdu in hdus {
        writer.write_hdu(&hdu.header, hdu.data.as_ref()).unwrap();
    }
    writer.finalize().unwrap();
}

/// Write a raw multi-extension frame into `dir`.
pub fn write_raw(dir: &Path, name: &str, spec: &RawSpec) -> PathBuf {
    let path = dir.join(name);
    write_hdus(&path, &raw_hdus(spec));
    path
}

/// Names of all entries in `dir`, sorted.
pub fn dir_listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
