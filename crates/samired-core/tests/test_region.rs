use samired_core::error::ReductionError;
use samired_core::region::{format_region, parse_region, Region};

// ---------------------------------------------------------------------------
// parse_region
// ---------------------------------------------------------------------------

#[test]
fn test_parse_one_based_inclusive() {
    let r = parse_region("[1:1024,1:2048]").unwrap();
    assert_eq!((r.x0, r.x1, r.y0, r.y1), (0, 1024, 0, 2048));
    assert_eq!(r.shape(), (2048, 1024));
}

#[test]
fn test_parse_tolerates_whitespace() {
    let r = parse_region("  [ 33 : 64 , 1 : 32 ] ").unwrap();
    assert_eq!((r.x0, r.x1, r.y0, r.y1), (32, 64, 0, 32));
}

#[test]
fn test_parse_single_pixel_column() {
    let r = parse_region("[7:7,1:10]").unwrap();
    assert_eq!(r.width(), 1);
    assert_eq!(r.height(), 10);
}

#[test]
fn test_parse_rejects_malformed() {
    for text in [
        "",
        "1:10,1:10",
        "[1:10]",
        "[1:10,1:10,1:10]",
        "[a:10,1:10]",
        "[0:10,1:10]",
        "[10:5,1:10]",
        "[1-10,1:10]",
    ] {
        assert!(
            matches!(parse_region(text), Err(ReductionError::Format(_))),
            "{text:?} should be rejected"
        );
    }
}

// ---------------------------------------------------------------------------
// Round trips
// ---------------------------------------------------------------------------

#[test]
fn test_format_then_parse() {
    let text = format_region(16, 32, 0, 16);
    assert_eq!(text, "[17:32,1:16]");
    let r = parse_region(&text).unwrap();
    assert_eq!((r.x0, r.x1, r.y0, r.y1), (16, 32, 0, 16));
}

#[test]
fn test_parse_then_format() {
    for text in ["[1:1024,1:2048]", "[513:1024,1:512]", "[3:3,9:10]"] {
        let r = parse_region(text).unwrap();
        assert_eq!(format_region(r.x0, r.x1, r.y0, r.y1), text);
        assert_eq!(r.to_string(), text);
    }
}

#[test]
fn test_from_str() {
    let r: Region = "[1:8,1:4]".parse().unwrap();
    assert_eq!(r, Region::new(0, 8, 0, 4).unwrap());
}

// ---------------------------------------------------------------------------
// Geometry helpers
// ---------------------------------------------------------------------------

#[test]
fn test_binned_divides_bounds() {
    let r = parse_region("[513:1024,1:512]").unwrap().binned(2, 4);
    assert_eq!((r.x0, r.x1, r.y0, r.y1), (256, 512, 0, 128));
}

#[test]
fn test_fits_within() {
    let r = parse_region("[1:10,1:5]").unwrap();
    assert!(r.fits_within((5, 10)));
    assert!(!r.fits_within((4, 10)));
    assert!(!r.fits_within((5, 9)));
}

#[test]
fn test_new_rejects_empty() {
    assert!(Region::new(4, 4, 0, 1).is_err());
    assert!(Region::new(0, 1, 3, 2).is_err());
}
