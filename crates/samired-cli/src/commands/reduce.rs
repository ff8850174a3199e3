use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use samired_core::instrument::Instrument;
use samired_core::pipeline::{
    run_reduction_reported, ProgressReporter, ReductionConfig, ReductionStage,
};

use crate::summary::{print_reduction_summary, print_run_summary};

#[derive(Clone, Copy, ValueEnum)]
pub enum InstrumentArg {
    Sami,
    Soi,
    Sifs,
}

impl From<InstrumentArg> for Instrument {
    fn from(arg: InstrumentArg) -> Self {
        match arg {
            InstrumentArg::Sami => Instrument::Sami,
            InstrumentArg::Soi => Instrument::Soi,
            InstrumentArg::Sifs => Instrument::Sifs,
        }
    }
}

#[derive(Args)]
pub struct ReduceArgs {
    /// Directory holding the raw *.fits frames
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Reduction config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Instrument whose frames are reduced
    #[arg(long, value_enum)]
    pub instrument: Option<InstrumentArg>,

    /// Name of the output directory inside PATH
    #[arg(long)]
    pub reduced_dir: Option<String>,

    /// Divide OBJECT frames by their exposure time
    #[arg(long)]
    pub exposure_time: bool,

    /// Skip cosmic-ray removal on OBJECT frames
    #[arg(long)]
    pub no_cosmic_rays: bool,

    /// Force final bad column and line cleanup on OBJECT frames
    #[arg(long, conflicts_with = "no_clean")]
    pub clean: bool,

    /// Disable final bad column and line cleanup
    #[arg(long)]
    pub no_clean: bool,

    /// Lateral glow template to subtract from OBJECT frames
    #[arg(long)]
    pub glow_file: Option<PathBuf>,

    /// Do not write the HTML frame table
    #[arg(long)]
    pub no_report: bool,
}

pub fn run(args: &ReduceArgs) -> Result<()> {
    let mut config = if let Some(ref config_path) = args.config {
        ReductionConfig::from_file(config_path)
            .with_context(|| format!("Invalid reduction config {}", config_path.display()))?
    } else {
        ReductionConfig::default()
    };
    apply_overrides(&mut config, args);

    print_reduction_summary(&config, &args.path);

    let reporter = BarReporter::new();
    let summary = run_reduction_reported(&args.path, &config, &reporter)
        .with_context(|| format!("Reduction of {} failed", args.path.display()))?;
    reporter.bar.finish_with_message("Done");

    print_run_summary(&summary, &args.path.join(&config.reduced_dir));
    Ok(())
}

fn apply_overrides(config: &mut ReductionConfig, args: &ReduceArgs) {
    if let Some(instrument) = args.instrument {
        config.instrument = instrument.into();
    }
    if let Some(ref dir) = args.reduced_dir {
        config.reduced_dir = dir.clone();
    }
    if args.exposure_time {
        config.stages.exposure_time = true;
    }
    if args.no_cosmic_rays {
        config.stages.cosmic_rays = false;
    }
    if args.clean {
        config.stages.clean = Some(true);
    } else if args.no_clean {
        config.stages.clean = Some(false);
    }
    if let Some(ref glow) = args.glow_file {
        config.stages.glow_file = Some(glow.clone());
    }
    if args.no_report {
        config.write_report = false;
    }
}

/// Drives an indicatif bar from the reduction stages.
struct BarReporter {
    bar: ProgressBar,
}

impl BarReporter {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar().template("{msg:20} [{bar:40}] {pos}/{len}") {
            bar.set_style(style.progress_chars("=> "));
        }
        Self { bar }
    }
}

impl ProgressReporter for BarReporter {
    fn begin_stage(&self, stage: ReductionStage, total_items: Option<usize>) {
        self.bar.set_message(stage.to_string());
        self.bar.set_length(total_items.unwrap_or(0) as u64);
        self.bar.set_position(0);
    }

    fn advance(&self, items_done: usize) {
        self.bar.set_position(items_done as u64);
    }

    fn finish_stage(&self) {
        if let Some(len) = self.bar.length() {
            self.bar.set_position(len);
        }
    }
}
