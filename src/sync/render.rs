use image::{imageops::FilterType, ImageFormat};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Default size of generated thumbnails
pub const THUMBNAIL_SIZE: (u32, u32) = (128, 128);

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("not a decodable image: {0}")]
    Decode(String),

    #[error("cannot write artifact: {0}")]
    Encode(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Produces one derived artifact from one source file.
///
/// Implementations write exactly `dest`; the synchronizer decides
/// where that is and moves it into place.
pub trait ArtifactRenderer {
    fn render(&self, source: &Path, dest: &Path) -> Result<(), RenderError>;
}

/// Square-ish JPEG thumbnails, center-cropped to fill the target size
#[derive(Debug, Clone, Copy)]
pub struct ThumbnailRenderer {
    pub width: u32,
    pub height: u32,
}

impl Default for ThumbnailRenderer {
    fn default() -> Self {
        Self {
            width: THUMBNAIL_SIZE.0,
            height: THUMBNAIL_SIZE.1,
        }
    }
}

impl ArtifactRenderer for ThumbnailRenderer {
    fn render(&self, source: &Path, dest: &Path) -> Result<(), RenderError> {
        // Decode the source
        let img = image::open(source).map_err(|e| RenderError::Decode(e.to_string()))?;

        // Resize and crop to thumbnail size
        let thumbnail = img.resize_to_fill(self.width, self.height, FilterType::Lanczos3);

        // JPEG has no alpha channel
        thumbnail
            .to_rgb8()
            .save_with_format(dest, ImageFormat::Jpeg)
            .map_err(|e| RenderError::Encode(e.to_string()))?;

        debug!(source = %source.display(), dest = %dest.display(), "thumbnail rendered");
        Ok(())
    }
}

/// Album members are plain copies of the source file
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyRenderer;

impl ArtifactRenderer for CopyRenderer {
    fn render(&self, source: &Path, dest: &Path) -> Result<(), RenderError> {
        fs::copy(source, dest)?;
        Ok(())
    }
}
