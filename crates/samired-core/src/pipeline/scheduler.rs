use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::combine::{CombineService, MasterKind};
use crate::error::Result;
use crate::frame::{Binning, ObsType};
use crate::io::fits::read_fits;
use crate::io::fits_writer::write_image;
use crate::reduce::{reduce_frame, CalibrationState, CosmicRayRejector, ReductionContext};

use super::config::ReductionConfig;
use super::table::{FrameRow, FrameTable};
use super::types::{ProgressReporter, ReductionStage, RunSummary};

/// Drives the calibration stages over a classified frame table.
///
/// Stages run in dependency order: zeros, darks, flats, then objects. Every
/// reduced frame and master is written only if its output is missing, so a
/// rerun resumes where the previous one stopped.
pub struct Scheduler<'a> {
    config: &'a ReductionConfig,
    reduced_dir: &'a Path,
    combiner: &'a dyn CombineService,
    rejector: &'a dyn CosmicRayRejector,
    reporter: &'a dyn ProgressReporter,
    summary: RunSummary,
}

impl<'a> Scheduler<'a> {
    pub fn new(
        config: &'a ReductionConfig,
        reduced_dir: &'a Path,
        combiner: &'a dyn CombineService,
        rejector: &'a dyn CosmicRayRejector,
        reporter: &'a dyn ProgressReporter,
    ) -> Self {
        Self {
            config,
            reduced_dir,
            combiner,
            rejector,
            reporter,
            summary: RunSummary::default(),
        }
    }

    /// Run all stages, stamping masters onto the table as they appear.
    pub fn run(mut self, table: &mut FrameTable) -> Result<RunSummary> {
        let binnings = table.binnings();
        self.process_zero_files(table, &binnings)?;
        self.process_dark_files(table, &binnings)?;
        self.process_flat_files(table, &binnings)?;
        self.process_object_files(table)?;
        Ok(self.summary)
    }

    fn base_state(&self) -> CalibrationState {
        let profile = self.config.instrument.profile();
        CalibrationState {
            repair_seams: self.config.stages.repair_seams && profile.has_seam_defects(),
            ..CalibrationState::default()
        }
    }

    fn process_zero_files(&mut self, table: &mut FrameTable, binnings: &[Binning]) -> Result<()> {
        let total = count(table, |t| *t == ObsType::Zero);
        self.reporter.begin_stage(ReductionStage::Zero, Some(total));
        let base = self.base_state();

        for &binning in binnings {
            let indices = table.select(binning, |t| *t == ObsType::Zero);
            if indices.is_empty() {
                continue;
            }
            info!(binning = %binning.label(), "Processing ZERO files");
            let outputs = self.reduce_rows(table, &indices, |_| base.clone())?;

            let name = format!("0Zero{}", binning.label());
            if let Some(master) = self.combine_master(MasterKind::Zero, &name, &outputs)? {
                stamp(table, binning, |t| t.stage_rank().is_some_and(|r| r > 0), |row| {
                    row.zero_file = Some(master.clone())
                });
            }
        }
        self.reporter.finish_stage();
        Ok(())
    }

    fn process_dark_files(&mut self, table: &mut FrameTable, binnings: &[Binning]) -> Result<()> {
        let total = count(table, |t| *t == ObsType::Dark);
        self.reporter.begin_stage(ReductionStage::Dark, Some(total));
        let base = self.base_state();

        for &binning in binnings {
            let indices = table.select(binning, |t| *t == ObsType::Dark);
            if indices.is_empty() {
                continue;
            }
            info!(binning = %binning.label(), "Processing DARK files");
            let outputs = self.reduce_rows(table, &indices, |row| CalibrationState {
                zero_file: row.zero_file.clone(),
                ..base.clone()
            })?;

            let name = format!("1Dark{}", binning.label());
            if let Some(master) = self.combine_master(MasterKind::Dark, &name, &outputs)? {
                stamp(table, binning, |t| t.stage_rank().is_some_and(|r| r > 1), |row| {
                    row.dark_file = Some(master.clone())
                });
            }
        }
        self.reporter.finish_stage();
        Ok(())
    }

    fn process_flat_files(&mut self, table: &mut FrameTable, binnings: &[Binning]) -> Result<()> {
        let total = count(table, ObsType::is_flat);
        self.reporter.begin_stage(ReductionStage::Flat, Some(total));
        let base = self.base_state();

        for &binning in binnings {
            let flats = table.select(binning, ObsType::is_flat);
            let mut taken = HashSet::new();
            for filter in table.filters(&flats) {
                let indices: Vec<usize> = flats
                    .iter()
                    .copied()
                    .filter(|&i| table.rows[i].frame.filters == filter)
                    .collect();
                let first = &table.rows[indices[0]].frame;
                info!(
                    binning = %binning.label(),
                    filter = %filter,
                    filter1 = %first.filter1,
                    filter2 = %first.filter2,
                    "Processing FLAT files"
                );
                let outputs = self.reduce_rows(table, &indices, |row| CalibrationState {
                    zero_file: row.zero_file.clone(),
                    dark_file: row.dark_file.clone(),
                    ..base.clone()
                })?;

                let base_name = format!("1FLAT_{}_{}", binning.label(), file_safe(&filter));
                let name = claim_name(&mut taken, &base_name);
                if name != base_name {
                    warn!(
                        filter = %filter,
                        master = %name,
                        "Filter name collides with another once made file safe"
                    );
                }
                if let Some(master) = self.combine_master(MasterKind::Flat, &name, &outputs)? {
                    for row in &mut table.rows {
                        let f = &row.frame;
                        if f.obstype == ObsType::Object
                            && f.binning == binning
                            && f.filters == filter
                        {
                            row.flat_file = Some(master.clone());
                        }
                    }
                }
            }
        }
        self.reporter.finish_stage();
        Ok(())
    }

    fn process_object_files(&mut self, table: &FrameTable) -> Result<()> {
        let indices: Vec<usize> = table
            .rows
            .iter()
            .enumerate()
            .filter(|(_, r)| r.frame.obstype == ObsType::Object)
            .map(|(i, _)| i)
            .collect();
        self.reporter
            .begin_stage(ReductionStage::Object, Some(indices.len()));
        info!(count = indices.len(), "Processing OBJECT files");

        let stages = &self.config.stages;
        let base = CalibrationState {
            cosmic_rays: stages.cosmic_rays,
            exposure_time: stages.exposure_time,
            clean: self.config.clean_objects(),
            glow_file: stages.glow_file.clone(),
            ..self.base_state()
        };
        self.reduce_rows(table, &indices, |row| CalibrationState {
            zero_file: row.zero_file.clone(),
            dark_file: row.dark_file.clone(),
            flat_file: row.flat_file.clone(),
            ..base.clone()
        })?;
        self.reporter.finish_stage();
        Ok(())
    }

    /// Reduce the rows at `indices`, returning the outputs that now exist.
    fn reduce_rows(
        &mut self,
        table: &FrameTable,
        indices: &[usize],
        state_for: impl Fn(&FrameRow) -> CalibrationState,
    ) -> Result<Vec<PathBuf>> {
        let mut outputs = Vec::with_capacity(indices.len());
        for (done, &i) in indices.iter().enumerate() {
            let row = &table.rows[i];
            let state = state_for(row);
            let prefix = state.prefix(row.frame.n_extensions > 1);
            let output = self
                .reduced_dir
                .join(format!("{prefix}{}", row.frame.file_name()));

            if output.exists() {
                warn!(file = %output.display(), "Skipping existing file");
                self.summary.frames_skipped += 1;
                outputs.push(output);
            } else {
                info!(file = %row.frame.path.display(), obstype = %row.frame.obstype, "Processing file");
                match self.reduce_one(&row.frame.path, &state, &output) {
                    Ok(()) => {
                        self.summary.frames_reduced += 1;
                        outputs.push(output);
                    }
                    Err(e) if e.is_frame_level() => {
                        error!(file = %row.frame.path.display(), error = %e, "Frame reduction failed");
                        self.summary.frames_failed += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
            self.reporter.advance(done + 1);
        }
        Ok(outputs)
    }

    fn reduce_one(&self, input: &Path, state: &CalibrationState, output: &Path) -> Result<()> {
        let hdus = read_fits(input)?;
        let ctx = ReductionContext {
            profile: self.config.instrument.profile(),
            rejector: self.rejector,
        };
        let reduced = reduce_frame(&hdus, state, &ctx)?;
        debug!(prefix = %reduced.prefix, output = %output.display(), "Writing reduced frame");
        write_image(output, &reduced.header, &reduced.data, false)
    }

    /// Write the list file `name` and combine it into `name.fits`.
    ///
    /// An existing master is reused as is. Returns the master path once it
    /// exists.
    fn combine_master(
        &mut self,
        kind: MasterKind,
        name: &str,
        outputs: &[PathBuf],
    ) -> Result<Option<PathBuf>> {
        if outputs.is_empty() {
            return Ok(None);
        }
        write_list(&self.reduced_dir.join(name), outputs)?;

        let master = self.reduced_dir.join(format!("{name}.fits"));
        if master.exists() {
            warn!(file = %master.display(), kind = %kind, "Skipping existing master");
            self.summary.masters_reused += 1;
            return Ok(Some(master));
        }

        info!(file = %master.display(), kind = %kind, "Writing master");
        match self.combiner.combine(kind, outputs, &master) {
            Ok(()) => {
                self.summary.masters_combined += 1;
                Ok(Some(master))
            }
            Err(e) if e.is_frame_level() => {
                error!(file = %master.display(), error = %e, "Combining master failed");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

fn count(table: &FrameTable, pred: impl Fn(&ObsType) -> bool) -> usize {
    table.rows.iter().filter(|r| pred(&r.frame.obstype)).count()
}

fn stamp(
    table: &mut FrameTable,
    binning: Binning,
    pred: impl Fn(&ObsType) -> bool,
    mut assign: impl FnMut(&mut FrameRow),
) {
    for row in &mut table.rows {
        if row.frame.binning == binning && pred(&row.frame.obstype) {
            assign(row);
        }
    }
}

/// One file name per line. An unchanged list is not rewritten.
fn write_list(path: &Path, outputs: &[PathBuf]) -> Result<()> {
    let mut text = String::new();
    for output in outputs {
        if let Some(name) = output.file_name() {
            text.push_str(&name.to_string_lossy());
            text.push('\n');
        }
    }
    if fs::read_to_string(path).is_ok_and(|existing| existing == text) {
        return Ok(());
    }
    fs::write(path, text)?;
    Ok(())
}

/// Filter name usable inside a file name.
pub fn file_safe(filter: &str) -> String {
    filter
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() || c == '/' { '_' } else { c })
        .collect()
}

/// First of `base`, `base_2`, `base_3`, ... not yet in `taken`.
fn claim_name(taken: &mut HashSet<String>, base: &str) -> String {
    let mut name = base.to_string();
    let mut n = 1;
    while taken.contains(&name) {
        n += 1;
        name = format!("{base}_{n}");
    }
    taken.insert(name.clone());
    name
}
