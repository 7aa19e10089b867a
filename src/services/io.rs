//! File input/output service
//!
//! Keeps file handling out of the pipelines: decoding inputs, and writing
//! outputs atomically so a failed run never leaves a partial file behind.

use crate::{
    config::OutputFormat,
    error::{PrepError, Result},
    services::format::OutputFormatHandler,
};
use image::{DynamicImage, RgbaImage};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Write `path` through a temporary file in the same directory
///
/// Missing parent directories are created. The temporary file only replaces
/// the destination once `write` has succeeded and the data is flushed.
///
/// # Arguments
/// * `path` - Final destination
/// * `write` - Callback producing the file contents
///
/// # Returns
/// * `Ok(u64)` - Size of the written file in bytes
/// * `Err(PrepError::Export)` - Any step failed; the destination is untouched
pub fn write_atomic<P, F>(path: P, write: F) -> Result<u64>
where
    P: AsRef<Path>,
    F: FnOnce(&mut BufWriter<&mut File>) -> Result<()>,
{
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    std::fs::create_dir_all(parent)
        .map_err(|e| PrepError::export_error("create output directory", parent, &e))?;
    let mut temp = NamedTempFile::new_in(parent)
        .map_err(|e| PrepError::export_error("create temporary file in", parent, &e))?;

    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        write(&mut writer).map_err(|e| match e {
            PrepError::Export(_) => e,
            other => PrepError::export_error("write", path, &other),
        })?;
        writer
            .flush()
            .map_err(|e| PrepError::export_error("flush", path, &e))?;
    }
    temp.as_file()
        .sync_all()
        .map_err(|e| PrepError::export_error("sync", path, &e))?;

    let file = temp
        .persist(path)
        .map_err(|e| PrepError::export_error("persist", path, &e.error))?;
    let size = file
        .metadata()
        .map_err(|e| PrepError::export_error("stat", path, &e))?
        .len();

    debug!(path = %path.display(), bytes = size, "Output written");
    Ok(size)
}

/// Service for image file input/output
pub struct ImageIOService;

impl ImageIOService {
    /// Load an image from a file path
    ///
    /// The format is taken from the extension first and from the file
    /// contents when that fails.
    ///
    /// # Errors
    /// [`PrepError::InputLoad`] when the file is missing or cannot be decoded.
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();

        if !path_ref.is_file() {
            return Err(PrepError::input_load_error(
                "image",
                path_ref,
                &"file does not exist",
            ));
        }

        match image::open(path_ref) {
            Ok(img) => Ok(img),
            Err(e) => {
                debug!(
                    path = %path_ref.display(),
                    error = %e,
                    "Extension-based decoding failed, trying content detection"
                );
                let data = std::fs::read(path_ref)
                    .map_err(|io_err| PrepError::input_load_error("image", path_ref, &io_err))?;
                image::load_from_memory(&data).map_err(|content_err| {
                    PrepError::input_load_error(
                        "image",
                        path_ref,
                        &format!("{} (content detection: {})", e, content_err),
                    )
                })
            },
        }
    }

    /// Save an RGBA image atomically
    ///
    /// # Returns
    /// * `Ok(u64)` - Size of the written file
    /// * `Err(PrepError)` - The format cannot carry alpha, or writing failed
    pub fn save_rgba<P: AsRef<Path>>(
        image: &RgbaImage,
        path: P,
        format: OutputFormat,
    ) -> Result<u64> {
        OutputFormatHandler::ensure_available(format)?;
        let image_format = OutputFormatHandler::image_format(format);
        let dynamic = DynamicImage::ImageRgba8(image.clone());

        write_atomic(path, |writer| {
            dynamic.write_to(writer, image_format)?;
            Ok(())
        })
    }
}
