//! Output format handling service
//!
//! Chooses the image encoder for a background-removal result. Every
//! supported format carries an alpha channel; anything else is rejected
//! before processing starts.

use crate::{
    config::OutputFormat,
    error::{PrepError, Result},
};
use image::ImageFormat;
use std::path::Path;

/// Service for output format selection
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Infer the output format from a file extension
    ///
    /// # Examples
    /// ```rust
    /// use asset_prep::{config::OutputFormat, services::OutputFormatHandler};
    ///
    /// let format = OutputFormatHandler::from_path("cutout.PNG")?;
    /// assert_eq!(format, OutputFormat::Png);
    /// assert!(OutputFormatHandler::from_path("cutout.jpg").is_err());
    /// # Ok::<(), asset_prep::PrepError>(())
    /// ```
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<OutputFormat> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "png" => Ok(OutputFormat::Png),
            "tif" | "tiff" => Ok(OutputFormat::Tiff),
            "webp" => Ok(OutputFormat::WebP),
            "jpg" | "jpeg" => Err(PrepError::unsupported_format(format!(
                "JPEG output cannot store transparency: {}",
                path.display()
            ))),
            "" => Err(PrepError::unsupported_format(format!(
                "Output path has no extension: {}",
                path.display()
            ))),
            other => Err(PrepError::unsupported_format(format!(
                "Unknown output extension '{}': {}",
                other,
                path.display()
            ))),
        }
    }

    /// Resolve the output format: explicit override first, then the extension
    pub fn resolve<P: AsRef<Path>>(path: P, explicit: Option<OutputFormat>) -> Result<OutputFormat> {
        let format = match explicit {
            Some(format) => format,
            None => Self::from_path(path)?,
        };
        Self::ensure_available(format)?;
        Ok(format)
    }

    /// Reject formats whose encoder was compiled out
    pub fn ensure_available(format: OutputFormat) -> Result<()> {
        if format == OutputFormat::WebP && !cfg!(feature = "webp-support") {
            return Err(PrepError::unsupported_format(
                "WebP output requires the 'webp-support' feature",
            ));
        }
        Ok(())
    }

    /// Encoder used for a format
    #[must_use]
    pub fn image_format(format: OutputFormat) -> ImageFormat {
        match format {
            OutputFormat::Png => ImageFormat::Png,
            OutputFormat::Tiff => ImageFormat::Tiff,
            OutputFormat::WebP => ImageFormat::WebP,
        }
    }

    /// Canonical file extension (without the dot)
    #[must_use]
    pub fn get_extension(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "png",
            OutputFormat::Tiff => "tiff",
            OutputFormat::WebP => "webp",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path() {
        assert_eq!(OutputFormatHandler::from_path("a/b.png").unwrap(), OutputFormat::Png);
        assert_eq!(OutputFormatHandler::from_path("b.TIF").unwrap(), OutputFormat::Tiff);
        assert_eq!(OutputFormatHandler::from_path("b.webp").unwrap(), OutputFormat::WebP);
    }

    #[test]
    fn test_formats_without_alpha_are_rejected() {
        for path in ["out.jpg", "out.JPEG", "out.bmp", "out"] {
            let err = OutputFormatHandler::from_path(path).unwrap_err();
            assert!(matches!(err, PrepError::UnsupportedFormat(_)), "{}", path);
        }
    }

    #[test]
    fn test_explicit_format_wins() {
        let format = OutputFormatHandler::resolve("out.png", Some(OutputFormat::Tiff)).unwrap();
        assert_eq!(format, OutputFormat::Tiff);
    }

    #[test]
    fn test_get_extension() {
        assert_eq!(OutputFormatHandler::get_extension(OutputFormat::Png), "png");
        assert_eq!(OutputFormatHandler::get_extension(OutputFormat::Tiff), "tiff");
        assert_eq!(OutputFormatHandler::get_extension(OutputFormat::WebP), "webp");
    }
}
