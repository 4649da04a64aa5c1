// Raster image value shared between the round driver, the worker lane and the scorer.

use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{ExtendedColorType, ImageEncoder, ImageFormat, Rgba, RgbaImage};
use std::sync::Arc;

/// Immutable RGBA8 raster. Clones share the pixel buffer.
#[derive(Clone)]
pub struct RasterImage {
    pixels: Arc<RgbaImage>,
}

impl std::fmt::Debug for RasterImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterImage")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

impl RasterImage {
    pub fn new(pixels: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
        }
    }

    /// Opaque white canvas, the state of an untouched drawing surface.
    pub fn blank(width: u32, height: u32) -> Self {
        Self::new(RgbaImage::from_pixel(
            width,
            height,
            Rgba([255, 255, 255, 255]),
        ))
    }

    /// Builds an image from raw RGBA bytes; `None` when the buffer size does not match.
    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Option<Self> {
        RgbaImage::from_raw(width, height, rgba).map(Self::new)
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Returns true when both values share the same pixel buffer.
    pub fn same_buffer(&self, other: &RasterImage) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }

    /// Resamples to an exact pixel size, ignoring aspect ratio.
    pub fn resized(&self, width: u32, height: u32) -> RasterImage {
        if self.width() == width && self.height() == height {
            return self.clone();
        }
        if self.is_empty() {
            return RasterImage::blank(width, height);
        }
        RasterImage::new(image::imageops::resize(
            self.pixels.as_ref(),
            width,
            height,
            FilterType::Triangle,
        ))
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, image::ImageError> {
        let mut out = Vec::new();
        PngEncoder::new(&mut out).write_image(
            self.pixels.as_raw(),
            self.width(),
            self.height(),
            ExtendedColorType::Rgba8,
        )?;
        Ok(out)
    }

    pub fn decode_png(bytes: &[u8]) -> Result<RasterImage, image::ImageError> {
        let decoded = image::load_from_memory_with_format(bytes, ImageFormat::Png)?;
        Ok(RasterImage::new(decoded.into_rgba8()))
    }
}
