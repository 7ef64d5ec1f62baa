use std::path::Path;

use image::{DynamicImage, ImageFormat, RgbaImage};
use snafu::{OptionExt as _, ResultExt as _};

use crate::prelude::*;

use super::buffer::PixelBuffer;

/// Formats a frame may be written as, picked by file extension.
pub const SUPPORTED_FORMATS: [ImageFormat; 4] = [
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::Bmp,
    ImageFormat::Gif,
];

fn format_of(path: &Path) -> Result<ImageFormat> {
    ImageFormat::from_path(path)
        .ok()
        .filter(|format| SUPPORTED_FORMATS.contains(format))
        .context(UnsupportedImageFormatSnafu { path })
}

/// Writes `buffer` as an opaque RGB image; alpha is dropped.
pub fn save(buffer: &PixelBuffer, path: &Path) -> Result<()> {
    let format = format_of(path)?;
    let image = RgbaImage::from_raw(buffer.width(), buffer.height(), buffer.as_rgba().to_vec())
        .context(InvalidGeometrySnafu {
            reason: "frame bytes do not match its size",
        })?;
    DynamicImage::ImageRgba8(image)
        .to_rgb8()
        .save_with_format(path, format)
        .context(ImageSnafu)?;
    log::debug!("Saved {}x{} frame to {}", buffer.width(), buffer.height(), path.display());
    Ok(())
}

/// Reads any image the codec understands into an RGBA buffer.
pub fn load(path: &Path) -> Result<PixelBuffer> {
    let image = image::open(path).context(ImageSnafu)?.to_rgba8();
    let size = Size::new(image.width(), image.height());
    PixelBuffer::from_rgba(size, image.into_raw())
}

impl PixelBuffer {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        save(self, path.as_ref())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        load(path.as_ref())
    }
}
