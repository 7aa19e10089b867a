//! Service layer separating I/O, format selection and progress reporting
//! from the processing pipelines

pub mod format;
pub mod io;
pub mod progress;

pub use format::OutputFormatHandler;
pub use io::{write_atomic, ImageIOService};
pub use progress::{
    NoOpProgressReporter, ProcessingStage, ProgressReporter, ProgressTracker, ProgressUpdate,
    TracingProgressReporter,
};
