use std::path::PathBuf;

/// Prefix written by the mosaic merger.
pub const MERGED_PREFIX: &str = "m_";

/// Correction steps that mark the output file name, in the order they run.
///
/// Each character is prepended when its step runs, so a prefix read right to
/// left replays the chain: `tfzm_` is merge, zero, flat, exposure time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrefixStep {
    SeamRepair,
    Zero,
    Dark,
    LateralGlow,
    Flat,
    ExposureTime,
    Cleanup,
}

impl PrefixStep {
    /// Canonical chain order.
    pub const ORDER: [PrefixStep; 7] = [
        Self::SeamRepair,
        Self::Zero,
        Self::Dark,
        Self::LateralGlow,
        Self::Flat,
        Self::ExposureTime,
        Self::Cleanup,
    ];

    pub fn symbol(&self) -> char {
        match self {
            Self::SeamRepair => 'c',
            Self::Zero => 'z',
            Self::Dark => 'd',
            Self::LateralGlow => 'g',
            Self::Flat => 'f',
            Self::ExposureTime => 't',
            Self::Cleanup => 'b',
        }
    }
}

/// What to apply to one frame.
///
/// Built by the scheduler for every frame from the configuration and the
/// masters stamped on the frame's table row; never mutated afterwards.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CalibrationState {
    pub zero_file: Option<PathBuf>,
    pub dark_file: Option<PathBuf>,
    pub flat_file: Option<PathBuf>,
    pub glow_file: Option<PathBuf>,
    pub repair_seams: bool,
    pub cosmic_rays: bool,
    pub exposure_time: bool,
    pub clean: bool,
}

impl CalibrationState {
    pub fn is_enabled(&self, step: PrefixStep) -> bool {
        match step {
            PrefixStep::SeamRepair => self.repair_seams,
            PrefixStep::Zero => self.zero_file.is_some(),
            PrefixStep::Dark => self.dark_file.is_some(),
            PrefixStep::LateralGlow => self.glow_file.is_some(),
            PrefixStep::Flat => self.flat_file.is_some(),
            PrefixStep::ExposureTime => self.exposure_time,
            PrefixStep::Cleanup => self.clean,
        }
    }

    /// File-name prefix the chain will produce.
    ///
    /// Frames that were already merged pass through untouched, so their
    /// prefix is empty.
    pub fn prefix(&self, merged: bool) -> String {
        if !merged {
            return String::new();
        }
        PrefixStep::ORDER
            .iter()
            .filter(|step| self.is_enabled(**step))
            .fold(MERGED_PREFIX.to_string(), |prefix, step| {
                format!("{}{prefix}", step.symbol())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_state_only_marks_merge() {
        assert_eq!(CalibrationState::default().prefix(true), "m_");
        assert_eq!(CalibrationState::default().prefix(false), "");
    }

    #[test]
    fn full_chain_prefix() {
        let state = CalibrationState {
            zero_file: Some("z.fits".into()),
            dark_file: Some("d.fits".into()),
            flat_file: Some("f.fits".into()),
            glow_file: Some("g.fits".into()),
            repair_seams: true,
            cosmic_rays: true,
            exposure_time: true,
            clean: true,
        };
        assert_eq!(state.prefix(true), "btfgdzcm_");
    }
}
