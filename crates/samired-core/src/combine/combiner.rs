use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{ReductionError, Result};
use crate::io::fits::read_image;
use crate::io::fits_writer::write_image;

use super::scale::inverse_central_median;
use super::{combine_arrays, CombineConfig, MasterKind, Scaling};

/// File-based combiner reading every input into memory.
///
/// The master takes the header of the first input.
#[derive(Clone, Debug, Default)]
pub struct StackCombiner {
    pub config: CombineConfig,
}

impl StackCombiner {
    pub fn new(config: CombineConfig) -> Self {
        Self { config }
    }
}

impl super::CombineService for StackCombiner {
    fn combine(&self, kind: MasterKind, inputs: &[PathBuf], output: &Path) -> Result<()> {
        if inputs.is_empty() {
            return Err(ReductionError::EmptySequence);
        }
        let params = self.config.for_kind(kind);
        info!(
            kind = %kind,
            frames = inputs.len(),
            output = %output.display(),
            method = ?params.method,
            "Combining master"
        );

        let mut header = None;
        let mut frames = Vec::with_capacity(inputs.len());
        for path in inputs {
            let (h, mut data) = read_image(path)?;
            if params.scaling == Scaling::InverseCentralMedian {
                match inverse_central_median(&data) {
                    Some(scale) => data.mapv_inplace(|v| v * scale),
                    None => warn!(file = %path.display(), "Central median is zero, frame not scaled"),
                }
            }
            header.get_or_insert(h);
            frames.push(data);
        }

        let master = combine_arrays(&frames, params)?;
        let mut header = header.unwrap_or_default();
        header.set("NCOMBINE", inputs.len() as i64);
        header.add_history(&format!(
            "Master {kind} combined from {} frames ({:?})",
            inputs.len(),
            params.method
        ));
        write_image(output, &header, &master, false)
    }
}
