#[allow(dead_code)]
mod common;

use approx::assert_abs_diff_eq;
use ndarray::{s, Array1, Array2};

use samired_core::error::ReductionError;
use samired_core::instrument::Instrument;
use samired_core::io::fits::Hdu;
use samired_core::io::header::Header;
use samired_core::reduce::merge::{insert_detector_gap, insert_gap, merge, subtract_overscan};

use common::RawSpec;

// ---------------------------------------------------------------------------
// Mosaic assembly
// ---------------------------------------------------------------------------

#[test]
fn test_merge_shape_and_prefix() {
    let spec = RawSpec::default();
    let merged = merge(&common::raw_hdus(&spec)).unwrap();
    assert_eq!(merged.data.dim(), spec.merged_shape());
    assert_eq!(merged.prefix, "m_");
}

#[test]
fn test_merge_removes_overscan() {
    let spec = RawSpec::default().level(250.0);
    let merged = merge(&common::raw_hdus(&spec)).unwrap();
    let mean = merged.data.mean().unwrap();
    assert_abs_diff_eq!(mean, 250.0, epsilon = 1e-2);
    assert_abs_diff_eq!(merged.data[[0, 0]], 250.5, epsilon = 1e-2);
}

#[test]
fn test_merge_places_each_amplifier() {
    let spec = RawSpec::default();
    let mut hdus = common::raw_hdus(&spec);
    // Offset each amplifier's science section so its quadrant is identifiable.
    for (i, hdu) in hdus.iter_mut().enumerate().skip(1) {
        let data = hdu.data.as_mut().unwrap();
        data.slice_mut(s![.., ..16]).mapv_inplace(|v| v + 1000.0 * i as f32);
    }
    let merged = merge(&hdus).unwrap();
    let base = spec.level;
    assert_abs_diff_eq!(merged.data[[4, 4]], base + 1000.0 + 0.5, epsilon = 1e-2);
    assert_abs_diff_eq!(merged.data[[4, 20]], base + 2000.0 + 0.5, epsilon = 1e-2);
    assert_abs_diff_eq!(merged.data[[20, 4]], base + 3000.0 + 0.5, epsilon = 1e-2);
    assert_abs_diff_eq!(merged.data[[20, 20]], base + 4000.0 + 0.5, epsilon = 1e-2);
}

#[test]
fn test_merged_header_bookkeeping() {
    let mut spec = RawSpec::default();
    spec.binning = 4;
    let mut hdus = common::raw_hdus(&spec);
    hdus[0].header.set("RADECSYS", "FK5");
    hdus[0].header.set("EQUINOX", "unavail");

    let merged = merge(&hdus).unwrap();
    let h = &merged.header;
    assert_eq!(merged.data.dim(), (16, 16));
    assert_eq!(h.get_str("UNITS").unwrap(), "ADU");
    assert_eq!(h.get_str("CCDSUM").unwrap(), "4 4");
    assert_eq!(h.get_str("DETSEC").unwrap(), "[1:32,1:32]");
    assert_eq!(h.get_str("AMP_SEC1").unwrap(), "[1:8,1:8]");
    assert_eq!(h.get_str("AMP_SEC2").unwrap(), "[9:16,1:8]");
    assert_eq!(h.get_str("AMP_SEC3").unwrap(), "[1:8,9:16]");
    assert_eq!(h.get_str("AMP_SEC4").unwrap(), "[9:16,9:16]");
    assert_eq!(h.get_str("RADESYSA").unwrap(), "FK5");
    assert!(!h.contains("RADECSYS"));
    assert_eq!(h.get_f64("EQUINOX").unwrap(), 2000.0);
    assert_eq!(h.get_f64("EPOCH").unwrap(), 2000.0);
}

#[test]
fn test_single_extension_passes_through() {
    let data = Array2::from_shape_fn((5, 6), |(r, c)| (r * 6 + c) as f32);
    let mut header = Header::new();
    header.set("OBSTYPE", "OBJECT");
    let hdus = vec![Hdu::new(header.clone(), data.clone())];

    let out = merge(&hdus).unwrap();
    assert_eq!(out.data, data);
    assert_eq!(out.header, header);
    assert_eq!(out.prefix, "");
}

#[test]
fn test_merge_empty_input() {
    assert!(matches!(merge(&[]), Err(ReductionError::EmptySequence)));
}

#[test]
fn test_merge_missing_detsize() {
    let mut hdus = common::raw_hdus(&RawSpec::default());
    hdus[1].header.remove("DETSIZE");
    let err = merge(&hdus).unwrap_err();
    assert!(matches!(err, ReductionError::MissingKeyword(ref k) if k == "DETSIZE"));
    assert!(err.is_frame_level());
}

#[test]
fn test_merge_malformed_trimsec() {
    let mut hdus = common::raw_hdus(&RawSpec::default());
    hdus[2].header.set("TRIMSEC", "[1:16;1:16]");
    assert!(matches!(merge(&hdus), Err(ReductionError::Format(_))));
}

#[test]
fn test_merge_trimsec_outside_extension() {
    let mut hdus = common::raw_hdus(&RawSpec::default());
    hdus[2].header.set("TRIMSEC", "[1:40,1:16]");
    assert!(merge(&hdus).is_err());
}

// ---------------------------------------------------------------------------
// SOI detector gap
// ---------------------------------------------------------------------------

#[test]
fn test_merge_never_opens_the_gap() {
    // Masters are merged without the gap, so merged OBJECT frames must match.
    let spec = RawSpec::default().instrument("SOI");
    let merged = merge(&common::raw_hdus(&spec)).unwrap();
    assert_eq!(merged.data.dim(), (32, 32));
}

#[test]
fn test_soi_object_gets_gap() {
    let spec = RawSpec::default().instrument("SOI");
    let merged = merge(&common::raw_hdus(&spec)).unwrap();
    let out = insert_detector_gap(merged, Instrument::Soi.profile()).unwrap();

    let gap = (7.8f64 / 0.0767 / 2.0).round() as usize;
    assert_eq!(out.data.dim(), (32, 32 + gap));
    assert!(out.data.slice(s![.., 16..16 + gap]).iter().all(|&v| v == 0.0));
    assert_eq!(out.prefix, "m_");
    assert!(out.header.history().any(|h| h.contains("detector gap")));
}

#[test]
fn test_soi_calibration_has_no_gap() {
    let spec = RawSpec::default().instrument("SOI").obstype("ZERO");
    let merged = merge(&common::raw_hdus(&spec)).unwrap();
    let out = insert_detector_gap(merged, Instrument::Soi.profile()).unwrap();
    assert_eq!(out.data.dim(), (32, 32));
}

#[test]
fn test_sami_object_has_no_gap() {
    let merged = merge(&common::raw_hdus(&RawSpec::default())).unwrap();
    let out = insert_detector_gap(merged, Instrument::Sami.profile()).unwrap();
    assert_eq!(out.data.dim(), (32, 32));
}

#[test]
fn test_insert_gap_keeps_halves() {
    let data = Array2::from_shape_fn((2, 4), |(_, c)| c as f32 + 1.0);
    let out = insert_gap(&data, 3);
    assert_eq!(out.row(0).to_vec(), vec![1.0, 2.0, 0.0, 0.0, 0.0, 3.0, 4.0]);
}

// ---------------------------------------------------------------------------
// Overscan model
// ---------------------------------------------------------------------------

#[test]
fn test_overscan_follows_row_gradient() {
    // Overscan rises quadratically with row; the model must follow it.
    let rows = 20;
    let level = |r: usize| 500.0 + 2.0 * r as f32 + 0.05 * (r * r) as f32;
    let bias = Array2::from_shape_fn((rows, 6), |(r, _)| level(r));
    let trim = Array2::from_shape_fn((rows, 8), |(r, _)| level(r) + 42.0);

    let out = subtract_overscan(trim.view(), bias.view()).unwrap();
    let expected = Array1::from_elem(8, 42.0f32);
    for row in out.rows() {
        for (v, e) in row.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*v, *e, epsilon = 1e-2);
        }
    }
}
