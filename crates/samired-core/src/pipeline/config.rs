use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::combine::CombineConfig;
use crate::consts::DEFAULT_REDUCED_DIR;
use crate::error::{ReductionError, Result};
use crate::instrument::Instrument;
use crate::reduce::LaCosmicParams;

/// Settings for one reduction run. Every field has a default, so a partial
/// TOML file is enough.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReductionConfig {
    pub instrument: Instrument,
    /// Name of the output directory created inside the raw data directory.
    pub reduced_dir: String,
    /// Write `{instrument}_reduce.html` next to the reduced frames.
    pub write_report: bool,
    pub stages: StageConfig,
    pub cosmic_rays: LaCosmicParams,
    pub combine: CombineConfig,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            instrument: Instrument::default(),
            reduced_dir: DEFAULT_REDUCED_DIR.to_string(),
            write_report: true,
            stages: StageConfig::default(),
            cosmic_rays: LaCosmicParams::default(),
            combine: CombineConfig::default(),
        }
    }
}

impl ReductionConfig {
    /// Load a configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| ReductionError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.reduced_dir.trim().is_empty() {
            return Err(ReductionError::Config("reduced_dir must not be empty".into()));
        }
        if self.cosmic_rays.gain <= 0.0 {
            return Err(ReductionError::Config(format!(
                "gain must be positive, got {}",
                self.cosmic_rays.gain
            )));
        }
        Ok(())
    }

    /// Whether final bad-pixel cleanup runs on OBJECT frames.
    pub fn clean_objects(&self) -> bool {
        self.stages
            .clean
            .unwrap_or_else(|| self.instrument.profile().clean_by_default())
    }
}

/// Per-stage switches of the correction chain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    /// Repair amplifier seam columns on instruments that have them.
    pub repair_seams: bool,
    /// Remove cosmic rays from OBJECT frames.
    pub cosmic_rays: bool,
    /// Normalise OBJECT frames to counts per second.
    pub exposure_time: bool,
    /// Final bad column and line cleanup. Unset uses the instrument default.
    pub clean: Option<bool>,
    /// Lateral glow template subtracted from OBJECT frames.
    pub glow_file: Option<PathBuf>,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            repair_seams: true,
            cosmic_rays: true,
            exposure_time: false,
            clean: None,
            glow_file: None,
        }
    }
}
