use tempfile::TempDir;

use samired_core::combine::{Clipping, CombineMethod, CombineParams};
use samired_core::error::ReductionError;
use samired_core::instrument::Instrument;
use samired_core::pipeline::ReductionConfig;

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

#[test]
fn test_default_config_round_trips_through_toml() {
    let config = ReductionConfig::default();
    let text = toml::to_string(&config).unwrap();
    assert_eq!(ReductionConfig::from_toml(&text).unwrap(), config);
}

#[test]
fn test_empty_file_is_default() {
    assert_eq!(ReductionConfig::from_toml("").unwrap(), ReductionConfig::default());
}

#[test]
fn test_partial_config_keeps_other_defaults() {
    let config = ReductionConfig::from_toml(
        r#"
        instrument = "SOI"
        reduced_dir = "REDUCED"

        [stages]
        exposure_time = true

        [combine.zero]
        method = "median"
        clipping = "none"
        "#,
    )
    .unwrap();

    assert_eq!(config.instrument, Instrument::Soi);
    assert_eq!(config.reduced_dir, "REDUCED");
    assert!(config.stages.exposure_time);
    assert!(config.stages.cosmic_rays);
    assert!(config.write_report);
    assert_eq!(config.combine.zero.method, CombineMethod::Median);
    assert_eq!(config.combine.zero.clipping, Clipping::None);
    assert_eq!(config.combine.dark, CombineParams::bias());
}

#[test]
fn test_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("reduce.toml");
    std::fs::write(&path, "instrument = \"SIFS\"\n[cosmic_rays]\nread_noise = 4.5\n").unwrap();
    let config = ReductionConfig::from_file(&path).unwrap();
    assert_eq!(config.instrument, Instrument::Sifs);
    assert_eq!(config.cosmic_rays.read_noise, 4.5);
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[test]
fn test_non_positive_gain_is_rejected() {
    let err = ReductionConfig::from_toml("[cosmic_rays]\ngain = 0.0\n").unwrap_err();
    assert!(matches!(err, ReductionError::Config(_)));
}

#[test]
fn test_empty_reduced_dir_is_rejected() {
    let err = ReductionConfig::from_toml("reduced_dir = \"  \"\n").unwrap_err();
    assert!(matches!(err, ReductionError::Config(_)));
}

#[test]
fn test_unknown_instrument_is_rejected() {
    let err = ReductionConfig::from_toml("instrument = \"GOODMAN\"\n").unwrap_err();
    assert!(matches!(err, ReductionError::Config(_)));
    assert!(!err.is_frame_level());
}

// ---------------------------------------------------------------------------
// Derived switches
// ---------------------------------------------------------------------------

#[test]
fn test_clean_objects_follows_instrument_default() {
    let mut config = ReductionConfig::default();
    assert!(!config.clean_objects());

    config.instrument = Instrument::Soi;
    assert!(config.clean_objects());

    config.stages.clean = Some(false);
    assert!(!config.clean_objects());

    config.instrument = Instrument::Sami;
    config.stages.clean = Some(true);
    assert!(config.clean_objects());
}
