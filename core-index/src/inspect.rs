//! Image validation seam.
//!
//! The file index only needs to know whether a path is a well-formed image of
//! a supported format and what its dimensions are. [`ImageInspector`] answers
//! that; [`ImageCrateInspector`] is the default backed by the `image` crate.

use image::ImageReader;
use std::path::Path;
use tracing::trace;

use crate::error::{IndexError, Result};
use crate::shorthash::ImageFormat;

/// Format and dimensions of a validated image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

/// Validates local image files
pub trait ImageInspector: Send + Sync {
    /// Inspect `path`, failing with [`IndexError::InvalidFile`] when it cannot
    /// be opened, is not decodable, or is not a supported format.
    fn inspect(&self, path: &Path) -> Result<ImageInfo>;
}

/// Inspector that sniffs the format from content and fully decodes the image
/// to catch truncated or corrupt files.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCrateInspector;

impl ImageCrateInspector {
    pub fn new() -> Self {
        Self
    }
}

impl ImageInspector for ImageCrateInspector {
    fn inspect(&self, path: &Path) -> Result<ImageInfo> {
        let reader = ImageReader::open(path)
            .map_err(|e| IndexError::invalid_file(path, e))?
            .with_guessed_format()
            .map_err(|e| IndexError::invalid_file(path, e))?;

        let format = match reader.format() {
            Some(image::ImageFormat::Gif) => ImageFormat::Gif,
            Some(image::ImageFormat::Jpeg) => ImageFormat::Jpg,
            Some(image::ImageFormat::Png) => ImageFormat::Png,
            Some(other) => {
                return Err(IndexError::invalid_file(
                    path,
                    format!("unsupported image format {:?}", other),
                ))
            }
            None => return Err(IndexError::invalid_file(path, "unrecognized image data")),
        };

        let decoded = reader
            .decode()
            .map_err(|e| IndexError::invalid_file(path, e))?;

        trace!(path = %path.display(), %format, "Validated image");

        Ok(ImageInfo {
            format,
            width: decoded.width(),
            height: decoded.height(),
        })
    }
}
