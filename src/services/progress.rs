//! Progress reporting service
//!
//! Pipelines narrate their stages through a [`ProgressReporter`] handed in by
//! the caller, so the library never decides where progress output goes.

use std::time::Instant;
use tracing::{error, info};

/// Stages of the two pipelines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Validating configuration and output format
    Initialization,

    // Background removal
    /// Loading and decoding input image
    ImageLoading,
    /// Estimating the foreground mask
    Segmentation,
    /// Encoding and writing the output image
    FileSaving,

    // Mesh normalization
    /// Reading the mesh or scene
    MeshLoading,
    /// Merging scene geometries into one mesh
    GeometryMerge,
    /// Centering and scaling
    Normalization,
    /// Watertight check and hole filling
    TopologyRepair,
    /// Writing STL output
    StlExport,

    /// Processing completed
    Completed,
}

impl ProcessingStage {
    /// Get a human-readable description of the processing stage
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            ProcessingStage::Initialization => "Validating configuration",
            ProcessingStage::ImageLoading => "Loading input image",
            ProcessingStage::Segmentation => "Estimating foreground mask",
            ProcessingStage::FileSaving => "Saving result",
            ProcessingStage::MeshLoading => "Loading mesh",
            ProcessingStage::GeometryMerge => "Merging scene geometry",
            ProcessingStage::Normalization => "Centering and scaling mesh",
            ProcessingStage::TopologyRepair => "Checking mesh topology",
            ProcessingStage::StlExport => "Exporting STL",
            ProcessingStage::Completed => "Processing completed",
        }
    }

    /// Get the typical progress percentage for this stage
    #[must_use]
    pub fn progress_percentage(&self) -> u8 {
        match self {
            ProcessingStage::Initialization => 5,
            ProcessingStage::ImageLoading | ProcessingStage::MeshLoading => 10,
            ProcessingStage::GeometryMerge => 30,
            ProcessingStage::Segmentation => 20,
            ProcessingStage::Normalization => 50,
            ProcessingStage::TopologyRepair => 70,
            ProcessingStage::FileSaving | ProcessingStage::StlExport => 95,
            ProcessingStage::Completed => 100,
        }
    }
}

/// Progress update containing stage and timing information
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Current processing stage
    pub stage: ProcessingStage,
    /// Progress percentage (0-100)
    pub progress: u8,
    /// Human-readable stage description
    pub description: String,
    /// Elapsed time since processing started (milliseconds)
    pub elapsed_ms: u64,
}

impl ProgressUpdate {
    #[must_use]
    pub fn new(stage: ProcessingStage, start_time: Instant) -> Self {
        Self::with_description(stage, stage.description().to_string(), start_time)
    }

    #[must_use]
    pub fn with_description(
        stage: ProcessingStage,
        description: String,
        start_time: Instant,
    ) -> Self {
        Self {
            progress: stage.progress_percentage(),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
            stage,
            description,
        }
    }
}

/// Trait for reporting progress during processing
pub trait ProgressReporter: Send + Sync {
    /// Report a progress update
    fn report_progress(&self, update: ProgressUpdate);

    /// Report successful completion
    ///
    /// # Arguments
    /// * `total_ms` - Wall time of the whole call
    fn report_completion(&self, total_ms: u64);

    /// Report an error during processing
    ///
    /// # Arguments
    /// * `stage` - Stage where error occurred
    /// * `error` - Error description
    fn report_error(&self, stage: ProcessingStage, error: &str);
}

/// No-op progress reporter that discards all progress updates
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_progress(&self, _update: ProgressUpdate) {}

    fn report_completion(&self, _total_ms: u64) {}

    fn report_error(&self, _stage: ProcessingStage, _error: &str) {}
}

/// Forwards progress to `tracing` events
pub struct TracingProgressReporter {
    verbose: bool,
}

impl TracingProgressReporter {
    /// # Arguments
    /// * `verbose` - Include elapsed time in every update
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for TracingProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        if self.verbose {
            info!(
                progress = update.progress,
                elapsed_ms = update.elapsed_ms,
                "[{}%] {}",
                update.progress,
                update.description
            );
        } else {
            info!("[{}%] {}", update.progress, update.description);
        }
    }

    fn report_completion(&self, total_ms: u64) {
        info!(total_ms, "Completed in {}ms", total_ms);
    }

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        error!(stage = ?stage, error = %error, "Error during {}", stage.description());
    }
}

/// Progress tracker that manages timing and progress reporting
pub struct ProgressTracker {
    reporter: Box<dyn ProgressReporter>,
    start_time: Instant,
    current_stage: Option<ProcessingStage>,
}

impl ProgressTracker {
    /// Create a new progress tracker with the specified reporter
    #[must_use]
    pub fn new(reporter: Box<dyn ProgressReporter>) -> Self {
        Self {
            reporter,
            start_time: Instant::now(),
            current_stage: None,
        }
    }

    /// Create a progress tracker that discards everything
    #[must_use]
    pub fn no_op() -> Self {
        Self::new(Box::new(NoOpProgressReporter))
    }

    /// Create a progress tracker logging through `tracing`
    #[must_use]
    pub fn tracing(verbose: bool) -> Self {
        Self::new(Box::new(TracingProgressReporter::new(verbose)))
    }

    /// Report progress for a specific stage
    pub fn report_stage(&mut self, stage: ProcessingStage) {
        self.current_stage = Some(stage);
        self.reporter
            .report_progress(ProgressUpdate::new(stage, self.start_time));
    }

    /// Report progress with custom description
    pub fn report_stage_with_description(&mut self, stage: ProcessingStage, description: String) {
        self.current_stage = Some(stage);
        let update = ProgressUpdate::with_description(stage, description, self.start_time);
        self.reporter.report_progress(update);
    }

    /// Report completion, timed from tracker creation
    pub fn report_completion(&mut self) {
        self.current_stage = Some(ProcessingStage::Completed);
        self.reporter.report_completion(self.elapsed_ms());
    }

    /// Report an error against the current stage
    pub fn report_error(&self, error: &str) {
        let stage = self.current_stage.unwrap_or(ProcessingStage::Initialization);
        self.reporter.report_error(stage, error);
    }

    /// Get the elapsed time since tracking started
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    #[must_use]
    pub fn current_stage(&self) -> Option<ProcessingStage> {
        self.current_stage
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::no_op()
    }
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("current_stage", &self.current_stage)
            .field("elapsed_ms", &self.elapsed_ms())
            .finish_non_exhaustive()
    }
}
