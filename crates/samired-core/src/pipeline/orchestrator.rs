use std::path::{Path, PathBuf};

use tracing::{info, info_span, warn};

use crate::combine::{CombineService, StackCombiner};
use crate::error::{ReductionError, Result};
use crate::reduce::{CosmicRayRejector, LaCosmic};

use super::config::ReductionConfig;
use super::report::write_html;
use super::scheduler::Scheduler;
use super::table::FrameTable;
use super::types::{NoOpReporter, ProgressReporter, ReductionStage, RunSummary};

/// Create the reduced-data directory, warning when it already exists.
pub fn create_reduced_dir(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        warn!(dir = %path.display(), "Reduced directory already exists, existing files are kept");
    } else {
        info!(dir = %path.display(), "Creating directory for reduced data");
    }
    std::fs::create_dir_all(path)?;
    Ok(path.to_path_buf())
}

/// Reduce every raw frame in `input_dir` with explicit collaborators.
pub fn run_reduction_with(
    input_dir: &Path,
    config: &ReductionConfig,
    combiner: &dyn CombineService,
    rejector: &dyn CosmicRayRejector,
    reporter: &dyn ProgressReporter,
) -> Result<RunSummary> {
    config.validate()?;
    if !input_dir.is_dir() {
        return Err(ReductionError::Config(format!(
            "input {} is not a directory",
            input_dir.display()
        )));
    }

    let span = info_span!("reduction", instrument = %config.instrument);
    let _guard = span.enter();
    info!(dir = %input_dir.display(), version = env!("CARGO_PKG_VERSION"), "Data reduction started");

    let reduced_dir = create_reduced_dir(&input_dir.join(&config.reduced_dir))?;

    reporter.begin_stage(ReductionStage::Scanning, None);
    let (mut table, unreadable) = FrameTable::build(input_dir)?;
    let (kept, foreign) = table.filter_instrument(config.instrument);
    reporter.finish_stage();

    let scheduler = Scheduler::new(config, &reduced_dir, combiner, rejector, reporter);
    let mut summary = scheduler.run(&mut table)?;
    summary.frames_found = kept;
    summary.frames_rejected = unreadable + foreign;

    if config.write_report {
        reporter.begin_stage(ReductionStage::Report, None);
        write_html(&table, config.instrument, &reduced_dir)?;
        reporter.finish_stage();
    }

    info!(
        reduced = summary.frames_reduced,
        skipped = summary.frames_skipped,
        failed = summary.frames_failed,
        masters = summary.masters_combined,
        "All done"
    );
    Ok(summary)
}

/// Reduce with the default combiner and rejector, reporting progress.
pub fn run_reduction_reported(
    input_dir: &Path,
    config: &ReductionConfig,
    reporter: &dyn ProgressReporter,
) -> Result<RunSummary> {
    let combiner = StackCombiner::new(config.combine.clone());
    let rejector = LaCosmic::new(config.cosmic_rays.clone());
    run_reduction_with(input_dir, config, &combiner, &rejector, reporter)
}

/// Reduce every raw frame in `input_dir`.
pub fn run_reduction(input_dir: &Path, config: &ReductionConfig) -> Result<RunSummary> {
    run_reduction_reported(input_dir, config, &NoOpReporter)
}
