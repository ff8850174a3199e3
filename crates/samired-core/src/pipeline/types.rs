/// Reduction stage, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReductionStage {
    Scanning,
    Zero,
    Dark,
    Flat,
    Object,
    Report,
}

impl std::fmt::Display for ReductionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scanning => write!(f, "Reading raw files"),
            Self::Zero => write!(f, "Zero frames"),
            Self::Dark => write!(f, "Dark frames"),
            Self::Flat => write!(f, "Flat frames"),
            Self::Object => write!(f, "Object frames"),
            Self::Report => write!(f, "Writing report"),
        }
    }
}

/// Counters collected over one run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Raw files accepted for this instrument.
    pub frames_found: usize,
    /// Raw files dropped as unreadable, degenerate or from another instrument.
    pub frames_rejected: usize,
    pub frames_reduced: usize,
    /// Frames whose output already existed.
    pub frames_skipped: usize,
    pub frames_failed: usize,
    pub masters_combined: usize,
    pub masters_reused: usize,
}

/// Thread-safe progress reporting for the reduction.
///
/// All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A new stage has started. `total_items` is the number of frames in
    /// the stage, if known.
    fn begin_stage(&self, _stage: ReductionStage, _total_items: Option<usize>) {}

    /// One frame within the current stage has been handled.
    fn advance(&self, _items_done: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}
}

/// No-op progress reporter, used when `run_reduction` delegates.
pub(super) struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}
