//! Background removal processor
//!
//! `BackgroundRemovalProcessor` ties the service layer to the segmentation
//! engine: resolve the output format, decode the input, segment, write the
//! RGBA result. Used by the library entry points and the CLI alike.

use crate::{
    config::SegmentationConfig,
    error::Result,
    segmentation::{SegmentationEngine, SegmentedImage},
    services::{ImageIOService, OutputFormatHandler, ProcessingStage, ProgressTracker},
    tracing_config::{events, spans},
    types::{ProcessingTimings, SegmentationReport},
};
use image::DynamicImage;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Removes backgrounds from product photos
#[derive(Debug)]
pub struct BackgroundRemovalProcessor {
    config: SegmentationConfig,
    engine: SegmentationEngine,
    progress_tracker: Option<ProgressTracker>,
}

impl BackgroundRemovalProcessor {
    /// Create a processor with the default estimators
    ///
    /// # Errors
    /// Returns [`crate::PrepError::InvalidConfig`] when `config` fails validation.
    pub fn new(config: SegmentationConfig) -> Result<Self> {
        let engine = SegmentationEngine::new(&config)?;
        Ok(Self::with_engine(config, engine))
    }

    /// Create a processor around an existing engine
    #[must_use]
    pub fn with_engine(config: SegmentationConfig, engine: SegmentationEngine) -> Self {
        Self {
            config,
            engine,
            progress_tracker: None,
        }
    }

    /// Attach a progress tracker
    pub fn set_progress_tracker(&mut self, tracker: ProgressTracker) {
        self.progress_tracker = Some(tracker);
    }

    #[must_use]
    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    fn report_stage(&mut self, stage: ProcessingStage) {
        if let Some(ref mut tracker) = self.progress_tracker {
            tracker.report_stage(stage);
        }
    }

    fn report_error(&self, error: &crate::PrepError) {
        if let Some(ref tracker) = self.progress_tracker {
            tracker.report_error(&error.to_string());
        }
    }

    /// Segment an in-memory image
    ///
    /// Any colour type is accepted; the image is converted to 8-bit RGB first.
    pub fn process_image(&mut self, image: &DynamicImage) -> Result<SegmentedImage> {
        self.report_stage(ProcessingStage::Segmentation);
        let rgb = image.to_rgb8();
        self.engine.segment(&rgb, self.config.policy)
    }

    /// Remove the background of `input_path` and write the result to `output_path`
    ///
    /// Nothing is written unless every step succeeds.
    ///
    /// # Errors
    /// - [`crate::PrepError::UnsupportedFormat`] if the output format has no alpha channel
    /// - [`crate::PrepError::InputLoad`] if the input cannot be read or decoded
    /// - [`crate::PrepError::Export`] if the output cannot be written
    #[instrument(skip(self, input_path, output_path), fields(input = %input_path.as_ref().display()))]
    pub fn process_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &mut self,
        input_path: P,
        output_path: Q,
    ) -> Result<SegmentationReport> {
        let result = self.run(input_path.as_ref(), output_path.as_ref());
        if let Err(ref e) = result {
            self.report_error(e);
        }
        result
    }

    fn run(&mut self, input: &Path, output: &Path) -> Result<SegmentationReport> {
        let total_start = Instant::now();
        let mut timings = ProcessingTimings::default();

        self.report_stage(ProcessingStage::Initialization);
        let format = OutputFormatHandler::resolve(output, self.config.output_format)?;
        let _span = spans::file_processing(input, OutputFormatHandler::get_extension(format)).entered();

        self.report_stage(ProcessingStage::ImageLoading);
        let decode_start = Instant::now();
        let image = ImageIOService::load_image(input)?;
        timings.image_decode_ms = decode_start.elapsed().as_millis() as u64;
        debug!(
            width = image.width(),
            height = image.height(),
            color = ?image.color(),
            "Input decoded"
        );

        let segment_start = Instant::now();
        let segmented = self.process_image(&image)?;
        timings.segmentation_ms = segment_start.elapsed().as_millis() as u64;
        events::performance_metric("segmentation", timings.segmentation_ms);

        self.report_stage(ProcessingStage::FileSaving);
        let encode_start = Instant::now();
        let output_file_size = ImageIOService::save_rgba(&segmented.image, output, format)?;
        timings.image_encode_ms = encode_start.elapsed().as_millis() as u64;
        timings.total_ms = total_start.elapsed().as_millis() as u64;

        if let Some(ref mut tracker) = self.progress_tracker {
            tracker.report_completion();
        }
        info!(
            output = %output.display(),
            bytes = output_file_size,
            total_ms = timings.total_ms,
            "Background removed"
        );

        Ok(SegmentationReport {
            policy: self.config.policy,
            methods: segmented.methods,
            dimensions: segmented.image.dimensions(),
            foreground_ratio: segmented.mask.statistics().foreground_ratio,
            output_file_size,
            timings,
        })
    }
}
