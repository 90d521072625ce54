//! Output encoders for rendered frames.
//!
//! Standard raster formats go through the `image` codecs. The `Binary`
//! encoding is the packed two-plane format black/white/red panels consume
//! directly: a black-plane byte followed by a red-plane byte for every 8
//! pixels, column-major, with bits cleared where the plane's color appears
//! and 0xFF elsewhere.

use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use thiserror::Error;

const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const RED: Rgb<u8> = Rgb([255, 0, 0]);

/// Output serialization rejected
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("failed to encode image: {0}")]
    Codec(#[from] image::ImageError),

    #[error("pixel count {0} is not divisible by 8")]
    UnalignedPixelCount(u32),
}

/// Caller-selected output encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageEncoding {
    /// Lossless, for archival and round-trip exactness.
    Png,
    /// Lossy, for lightweight previews.
    Jpeg,
    /// Uncompressed bitmap.
    Bmp,
    /// Packed two-plane e-paper device format.
    Binary,
}

impl ImageEncoding {
    /// Parse the `format` query value used by the render endpoints.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "png" => Some(ImageEncoding::Png),
            "jpeg" => Some(ImageEncoding::Jpeg),
            "bmp" => Some(ImageEncoding::Bmp),
            "binary" => Some(ImageEncoding::Binary),
            _ => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ImageEncoding::Png => "image/png",
            ImageEncoding::Jpeg => "image/jpeg",
            ImageEncoding::Bmp => "image/bmp",
            ImageEncoding::Binary => "application/octet-stream",
        }
    }

    /// Serialize `img` with this encoding.
    pub fn encode(&self, img: &RgbImage) -> Result<Vec<u8>, EncodeError> {
        let format = match self {
            ImageEncoding::Png => ImageFormat::Png,
            ImageEncoding::Jpeg => ImageFormat::Jpeg,
            ImageEncoding::Bmp => ImageFormat::Bmp,
            ImageEncoding::Binary => return encode_binary(img),
        };

        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, format)?;
        Ok(out.into_inner())
    }
}

/// Pack a quantized frame into the black-plane/red-plane wire format.
///
/// Scan order is column-major (pixel p maps to x = p / height,
/// y = p % height). Each group of 8 pixels emits the black byte, then the
/// red byte; a cleared bit marks the plane's color at that pixel. Pixels
/// that are neither black nor red leave both planes idle (white).
fn encode_binary(img: &RgbImage) -> Result<Vec<u8>, EncodeError> {
    let (width, height) = img.dimensions();
    let pixel_count = width * height;
    if pixel_count % 8 != 0 {
        return Err(EncodeError::UnalignedPixelCount(pixel_count));
    }

    let mut out = Vec::with_capacity(pixel_count as usize / 4);
    let mut black_byte = 0xFFu8;
    let mut red_byte = 0xFFu8;

    for pixel in 0..pixel_count {
        let x = pixel / height;
        let y = pixel % height;
        let reset = !(0x01 << (7 - (pixel % 8)));

        let p = img.get_pixel(x, y);
        if *p == BLACK {
            black_byte &= reset;
        }
        if *p == RED {
            red_byte &= reset;
        }

        if pixel % 8 == 7 {
            out.push(black_byte);
            out.push(red_byte);
            black_byte = 0xFF;
            red_byte = 0xFF;
        }
    }

    tracing::debug!("Packed {} pixels into {} bytes", pixel_count, out.len());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

    #[test]
    fn from_name_parses_supported_formats() {
        assert_eq!(ImageEncoding::from_name("png"), Some(ImageEncoding::Png));
        assert_eq!(ImageEncoding::from_name("jpeg"), Some(ImageEncoding::Jpeg));
        assert_eq!(ImageEncoding::from_name("bmp"), Some(ImageEncoding::Bmp));
        assert_eq!(
            ImageEncoding::from_name("binary"),
            Some(ImageEncoding::Binary)
        );
        assert_eq!(ImageEncoding::from_name("gif"), None);
    }

    #[test]
    fn content_types_match_encodings() {
        assert_eq!(ImageEncoding::Png.content_type(), "image/png");
        assert_eq!(
            ImageEncoding::Binary.content_type(),
            "application/octet-stream"
        );
    }

    #[test]
    fn binary_packs_planes_column_major() {
        // 4x2 frame, 8 pixels, one black byte + one red byte. Column-major
        // bit order: (0,0) (0,1) (1,0) (1,1) (2,0) (2,1) (3,0) (3,1).
        let mut img = RgbImage::from_pixel(4, 2, WHITE);
        img.put_pixel(0, 0, BLACK); // bit 0 of the black plane
        img.put_pixel(1, 1, RED); // bit 3 of the red plane

        let bytes = encode_binary(&img).unwrap();
        assert_eq!(bytes, vec![0x7F, 0xEF]);
    }

    #[test]
    fn binary_all_white_is_all_idle() {
        let img = RgbImage::from_pixel(8, 2, WHITE);
        let bytes = encode_binary(&img).unwrap();
        assert_eq!(bytes, vec![0xFF; 4]);
    }

    #[test]
    fn binary_rejects_unaligned_pixel_count() {
        let img = RgbImage::from_pixel(3, 3, WHITE);
        assert!(matches!(
            encode_binary(&img),
            Err(EncodeError::UnalignedPixelCount(9))
        ));
    }

    #[test]
    fn jpeg_and_bmp_produce_nonempty_output() {
        let img = RgbImage::from_pixel(16, 8, Rgb([120, 90, 200]));
        assert!(!ImageEncoding::Jpeg.encode(&img).unwrap().is_empty());
        assert!(!ImageEncoding::Bmp.encode(&img).unwrap().is_empty());
    }
}
