#[allow(dead_code)]
mod common;

use std::path::{Path, PathBuf};

use approx::assert_abs_diff_eq;
use ndarray::Array2;
use tempfile::TempDir;

use samired_core::error::ReductionError;
use samired_core::instrument::Instrument;
use samired_core::io::fits_writer::write_image;
use samired_core::io::header::Header;
use samired_core::reduce::correct::{
    correct_dark, correct_flat, correct_lateral_glow, correct_zero, divide_by_exposure_time,
};
use samired_core::reduce::{reduce_frame, CalibrationState, LaCosmic, Reduced, ReductionContext};

use common::RawSpec;

fn write_master(dir: &Path, name: &str, data: Array2<f32>, exptime: Option<f64>) -> PathBuf {
    let mut header = Header::new();
    if let Some(t) = exptime {
        header.set("EXPTIME", t);
    }
    let path = dir.join(name);
    write_image(&path, &header, &data, false).unwrap();
    path
}

fn frame(value: f32, exptime: Option<f64>) -> Reduced {
    let mut header = Header::new();
    if let Some(t) = exptime {
        header.set("EXPTIME", t);
    }
    Reduced::new(Array2::from_elem((8, 8), value), header, "m_")
}

// ---------------------------------------------------------------------------
// Individual corrections
// ---------------------------------------------------------------------------

#[test]
fn test_zero_is_subtracted() {
    let dir = TempDir::new().unwrap();
    let zero = write_master(dir.path(), "zero.fits", Array2::from_elem((8, 8), 10.0), None);
    let out = correct_zero(frame(100.0, None), Some(&zero)).unwrap();
    assert!(out.data.iter().all(|&v| v == 90.0));
    assert_eq!(out.prefix, "zm_");
    assert!(out.header.contains("BIASFILE"));
}

#[test]
fn test_missing_master_is_noop() {
    let out = correct_zero(frame(100.0, None), None).unwrap();
    assert_eq!(out.prefix, "m_");
    let out = correct_flat(out, None).unwrap();
    assert_eq!(out.prefix, "m_");
    assert!(out.data.iter().all(|&v| v == 100.0));
}

#[test]
fn test_dark_is_scaled_by_exposure_time() {
    let dir = TempDir::new().unwrap();
    let dark = write_master(dir.path(), "dark.fits", Array2::from_elem((8, 8), 2.0), Some(10.0));
    let out = correct_dark(frame(100.0, Some(20.0)), Some(&dark)).unwrap();
    for &v in out.data.iter() {
        assert_abs_diff_eq!(v, 96.0, epsilon = 1e-5);
    }
    assert_eq!(out.prefix, "dm_");
    assert!(out.header.contains("DARKFILE"));
}

#[test]
fn test_dark_without_exptime_passes_through() {
    let dir = TempDir::new().unwrap();
    let dark = write_master(dir.path(), "dark.fits", Array2::from_elem((8, 8), 2.0), None);
    let out = correct_dark(frame(100.0, Some(20.0)), Some(&dark)).unwrap();
    assert!(out.data.iter().all(|&v| v == 100.0));
    assert_eq!(out.prefix, "dm_");
}

#[test]
fn test_flat_division_skips_zero_pixels() {
    let dir = TempDir::new().unwrap();
    let mut flat_data = Array2::from_elem((8, 8), 2.0f32);
    flat_data[[3, 3]] = 0.0;
    let flat = write_master(dir.path(), "flat.fits", flat_data, None);
    let out = correct_flat(frame(100.0, None), Some(&flat)).unwrap();
    assert_eq!(out.data[[0, 0]], 50.0);
    assert_eq!(out.data[[3, 3]], 100.0);
    assert_eq!(out.prefix, "fm_");
}

#[test]
fn test_exposure_time_normalisation() {
    let out = divide_by_exposure_time(frame(100.0, Some(4.0)), true).unwrap();
    assert!(out.data.iter().all(|&v| v == 25.0));
    assert_eq!(out.prefix, "tm_");
    assert_eq!(out.header.get_str("UNITS").unwrap(), "adu / s");

    let out = divide_by_exposure_time(frame(100.0, None), true).unwrap();
    assert!(out.data.iter().all(|&v| v == 100.0));
    assert_eq!(out.prefix, "tm_");

    let out = divide_by_exposure_time(frame(100.0, Some(4.0)), false).unwrap();
    assert_eq!(out.prefix, "m_");
}

#[test]
fn test_master_shape_mismatch() {
    let dir = TempDir::new().unwrap();
    let zero = write_master(dir.path(), "zero.fits", Array2::zeros((4, 8)), None);
    let err = correct_zero(frame(1.0, None), Some(&zero)).unwrap_err();
    assert!(matches!(
        err,
        ReductionError::ShapeMismatch {
            expected: (8, 8),
            actual: (4, 8)
        }
    ));
    assert!(err.is_frame_level());
}

// ---------------------------------------------------------------------------
// Lateral glow
// ---------------------------------------------------------------------------

#[test]
fn test_lateral_glow_scaled_template_is_removed() {
    let dir = TempDir::new().unwrap();
    let shape = (600, 1024);
    let template = Array2::from_shape_fn(shape, |(r, _)| r as f32 * 0.1);
    let glow = write_master(dir.path(), "glow.fits", template.clone(), None);

    let data = template.mapv(|g| 5.0 + 2.0 * g);
    let input = Reduced::new(data, Header::new(), "m_");
    let out = correct_lateral_glow(input, Some(&glow), Instrument::Sami.profile()).unwrap();

    assert_eq!(out.prefix, "gm_");
    for &v in out.data.iter() {
        assert_abs_diff_eq!(v, 0.0, epsilon = 1e-3);
    }
    assert!(out.header.history().any(|h| h.starts_with("Lateral glow removed")));
}

#[test]
fn test_lateral_glow_small_frame_is_left_alone() {
    let dir = TempDir::new().unwrap();
    let glow = write_master(dir.path(), "glow.fits", Array2::zeros((8, 8)), None);
    let out = correct_lateral_glow(frame(7.0, None), Some(&glow), Instrument::Sami.profile()).unwrap();
    assert!(out.data.iter().all(|&v| v == 7.0));
    assert_eq!(out.prefix, "gm_");
}

// ---------------------------------------------------------------------------
// Full chain
// ---------------------------------------------------------------------------

#[test]
fn test_reduce_frame_zero_flat_time() {
    let dir = TempDir::new().unwrap();
    let spec = RawSpec::default();
    let shape = spec.merged_shape();
    let zero = write_master(dir.path(), "0Zero2x2.fits", Array2::from_elem(shape, 10.0), None);
    let flat = write_master(dir.path(), "1FLAT.fits", Array2::from_elem(shape, 2.0), None);

    let state = CalibrationState {
        zero_file: Some(zero),
        flat_file: Some(flat),
        exposure_time: true,
        ..CalibrationState::default()
    };
    let rejector = LaCosmic::default();
    let ctx = ReductionContext {
        profile: Instrument::Sami.profile(),
        rejector: &rejector,
    };
    let out = reduce_frame(&common::raw_hdus(&spec), &state, &ctx).unwrap();

    assert_eq!(out.prefix, "tfzm_");
    assert_eq!(out.prefix, state.prefix(true));
    // (100 +- 0.5 - 10) / 2 / 10
    assert_abs_diff_eq!(out.data.mean().unwrap(), 4.5, epsilon = 1e-3);
    assert_abs_diff_eq!(out.data[[0, 0]], 4.525, epsilon = 1e-3);
    assert!(out.header.contains("CD1_1"));
    assert!(out.header.contains("BIASFILE"));
    assert!(out.header.contains("FLATFILE"));
}

#[test]
fn test_reduce_frame_single_hdu_passthrough() {
    let spec = RawSpec::default();
    let hdus = common::raw_hdus(&spec);
    let single = vec![samired_core::io::fits::Hdu::new(
        hdus[0].header.clone(),
        Array2::from_elem((4, 4), 3.0),
    )];
    let state = CalibrationState {
        exposure_time: true,
        ..CalibrationState::default()
    };
    let rejector = LaCosmic::default();
    let ctx = ReductionContext {
        profile: Instrument::Sami.profile(),
        rejector: &rejector,
    };
    let out = reduce_frame(&single, &state, &ctx).unwrap();
    assert_eq!(out.prefix, "");
    assert_eq!(state.prefix(false), "");
    assert!(out.data.iter().all(|&v| v == 3.0));
}
