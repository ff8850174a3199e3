#[allow(dead_code)]
mod common;

use ndarray::Array2;
use tempfile::TempDir;

use samired_core::error::ReductionError;
use samired_core::io::fits::{read_fits, read_image, FitsReader};
use samired_core::io::fits_writer::write_image;
use samired_core::io::header::{Header, Value};

// ---------------------------------------------------------------------------
// Single image
// ---------------------------------------------------------------------------

#[test]
fn test_write_read_image() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("img.fits");

    let data = Array2::from_shape_fn((7, 11), |(r, c)| r as f32 * 100.0 + c as f32 - 0.25);
    let mut header = Header::new();
    header.set("OBSTYPE", "OBJECT");
    header.set("EXPTIME", 30.5);
    header.set("NCOMBINE", 3i64);
    header.set("CLEAN", true);
    header.add_history("Merged amplifiers");

    write_image(&path, &header, &data, false).unwrap();
    let (h, d) = read_image(&path).unwrap();

    assert_eq!(d, data);
    assert_eq!(h.get_str("OBSTYPE").unwrap(), "OBJECT");
    assert_eq!(h.get_f64("EXPTIME").unwrap(), 30.5);
    assert_eq!(h.get_i64("NCOMBINE").unwrap(), 3);
    assert_eq!(h.get("CLEAN"), Some(&Value::Bool(true)));
    assert_eq!(h.history().collect::<Vec<_>>(), vec!["Merged amplifiers"]);
    // Layout keywords are owned by the codec.
    assert!(!h.contains("NAXIS1"));
    assert!(!h.contains("BITPIX"));
}

#[test]
fn test_write_refuses_existing_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("img.fits");
    let data = Array2::<f32>::zeros((2, 2));
    write_image(&path, &Header::new(), &data, false).unwrap();

    let err = write_image(&path, &Header::new(), &data, false).unwrap_err();
    assert!(matches!(err, ReductionError::OutputExists(_)));
    write_image(&path, &Header::new(), &data, true).unwrap();
}

#[test]
fn test_file_length_is_block_aligned() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("img.fits");
    write_image(&path, &Header::new(), &Array2::<f32>::zeros((3, 5)), false).unwrap();
    let len = std::fs::metadata(&path).unwrap().len();
    assert_eq!(len % 2880, 0);
}

#[test]
fn test_string_with_quote_round_trips() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("img.fits");
    let mut header = Header::new();
    header.set("OBSERVER", "O'Neil");
    write_image(&path, &header, &Array2::<f32>::zeros((1, 1)), false).unwrap();
    let (h, _) = read_image(&path).unwrap();
    assert_eq!(h.get_str("OBSERVER").unwrap(), "O'Neil");
}

#[test]
fn test_comments_survive_and_do_not_pile_up() {
    let tmp = TempDir::new().unwrap();
    let first = tmp.path().join("first.fits");
    let second = tmp.path().join("second.fits");

    let mut header = Header::new();
    header.set_with_comment("GAIN", 2.6, "e-/ADU");
    header.add_comment("written by the pipeline");
    write_image(&first, &header, &Array2::<f32>::zeros((2, 2)), false).unwrap();

    let (h, d) = read_image(&first).unwrap();
    write_image(&second, &h, &d, false).unwrap();
    let (h, _) = read_image(&second).unwrap();

    let gain = h.cards().iter().find(|c| c.keyword == "GAIN").unwrap();
    assert_eq!(gain.comment.as_deref(), Some("e-/ADU"));
    let comments: Vec<_> = h.cards().iter().filter(|c| c.keyword == "COMMENT").collect();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].comment.as_deref(), Some("written by the pipeline"));
}

// ---------------------------------------------------------------------------
// Multi-extension
// ---------------------------------------------------------------------------

#[test]
fn test_multi_extension_raw_frame() {
    let tmp = TempDir::new().unwrap();
    let spec = common::RawSpec::default();
    let path = common::write_raw(tmp.path(), "raw.fits", &spec);

    let reader = FitsReader::open(&path).unwrap();
    assert_eq!(reader.hdu_count(), 5);
    assert_eq!(reader.shape(0).unwrap(), None);
    assert_eq!(reader.shape(1).unwrap(), Some((16, 16 + common::OVERSCAN)));

    let hdus = read_fits(&path).unwrap();
    assert!(hdus[0].data.is_none());
    assert_eq!(hdus[3].header.get_str("DETSEC").unwrap(), "[1:32,33:64]");
    assert_eq!(hdus[1].header.get_str("CCDSUM").unwrap(), "2 2");
    assert_eq!(hdus[2].header.get_str("EXTNAME").unwrap(), "AMP2");
    assert_eq!(hdus[4].data.as_ref().unwrap().dim(), (16, 16 + common::OVERSCAN));
}

// ---------------------------------------------------------------------------
// Read errors
// ---------------------------------------------------------------------------

#[test]
fn test_missing_file_is_read_error() {
    let tmp = TempDir::new().unwrap();
    let err = FitsReader::open(&tmp.path().join("absent.fits")).unwrap_err();
    assert!(matches!(err, ReductionError::Read { .. }));
    assert!(err.is_frame_level());
}

#[test]
fn test_not_fits_is_read_error() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("junk.fits");
    std::fs::write(&path, vec![b'x'; 3000]).unwrap();
    assert!(matches!(
        FitsReader::open(&path),
        Err(ReductionError::Read { .. })
    ));
}

#[test]
fn test_truncated_data_is_read_error() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("img.fits");
    write_image(&path, &Header::new(), &Array2::<f32>::zeros((40, 40)), false).unwrap();
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..2880 + 100]).unwrap();
    let err = read_image(&path).unwrap_err();
    assert!(matches!(err, ReductionError::Read { .. }));
    assert!(err.is_frame_level());
}
