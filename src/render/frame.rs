//! Owned raster frame with the pipeline's geometric and color operations.
//!
//! A [`Frame`] is created by decoding screenshot bytes, transformed step by
//! step, and serialized exactly once at the end of a render. Every operation
//! consumes the frame and returns a new one, so there is never more than one
//! handle to a pixel buffer.

use super::dither::{Ditherer, Palette, dither_image};
use super::encode::{EncodeError, ImageEncoding};
use super::{ProcessingError, Size};
use image::imageops::{self, FilterType};
use image::{ImageReader, RgbImage};
use std::io::Cursor;
use thiserror::Error;

/// Screenshot bytes that could not be decoded
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("screenshot was empty")]
    Empty,

    #[error("failed to decode screenshot: {0}")]
    Malformed(#[from] image::ImageError),
}

/// Rotation applied to match the panel's physical mounting orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    None,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl From<u16> for Rotation {
    fn from(degrees: u16) -> Self {
        match degrees {
            90 => Rotation::Rotate90,
            180 => Rotation::Rotate180,
            270 => Rotation::Rotate270,
            _ => Rotation::None,
        }
    }
}

/// An owned RGB raster with explicit dimensions.
///
/// The buffer invariant (length == width * height * 3) is maintained by
/// `RgbImage`; both dimensions are positive for any decodable input.
#[derive(Debug)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    /// Decode encoded raster bytes (PNG, JPEG, ...) into a frame.
    ///
    /// Dimensions are exactly what the content specifies; no resizing
    /// happens at decode time. Empty input is rejected before any codec
    /// work, never substituted with a blank image.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }

        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(image::ImageError::IoError)?;
        let image = reader.decode()?.into_rgb8();

        tracing::debug!("Decoded screenshot: {}x{}", image.width(), image.height());
        Ok(Self { image })
    }

    pub fn from_image(image: RgbImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn size(&self) -> Size {
        Size::new(self.width(), self.height())
    }

    /// Scale to exactly `target` with bilinear resampling.
    ///
    /// Aspect ratio is not preserved; the caller supplies the physical
    /// device resolution.
    pub fn resize(self, target: Size) -> Result<Self, ProcessingError> {
        if target.is_empty() {
            return Err(ProcessingError::EmptyResizeTarget(target));
        }
        if self.size() == target {
            return Ok(self);
        }

        tracing::debug!("Resizing {} -> {}", self.size(), target);
        let image = imageops::resize(&self.image, target.width, target.height, FilterType::Triangle);
        Ok(Self { image })
    }

    /// Apply `rotation`, then mirroring. The order is fixed: rotation first,
    /// mirrors second.
    pub fn orient(self, rotation: Rotation, mirror_h: bool, mirror_v: bool) -> Self {
        let mut image = match rotation {
            Rotation::None => self.image,
            Rotation::Rotate90 => imageops::rotate90(&self.image),
            Rotation::Rotate180 => imageops::rotate180(&self.image),
            Rotation::Rotate270 => imageops::rotate270(&self.image),
        };
        if mirror_h {
            image = imageops::flip_horizontal(&image);
        }
        if mirror_v {
            image = imageops::flip_vertical(&image);
        }
        Self { image }
    }

    /// Quantize every pixel onto `palette` with error-diffusion dithering.
    pub fn quantize(mut self, palette: &Palette, ditherer: Ditherer) -> Self {
        dither_image(&mut self.image, palette, ditherer);
        self
    }

    /// Serialize the buffer with the selected output encoding.
    pub fn encode(&self, encoding: ImageEncoding) -> Result<Vec<u8>, EncodeError> {
        encoding.encode(&self.image)
    }

    pub fn as_rgb8(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_rgb8(self) -> RgbImage {
        self.image
    }
}
