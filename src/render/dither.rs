//! Palette definitions and error-diffusion dithering.
//!
//! E-paper panels render a handful of fixed colors, so arbitrary RGB input
//! has to be quantized. Plain nearest-color mapping bands badly on gradients;
//! error diffusion trades spatial resolution for perceived color depth and
//! keeps the output usable on 2- and 3-color hardware.
//!
//! Diffusion runs in a single left-to-right, top-to-bottom pass over a small
//! ring of error rows (i16 per channel, the error range is -255..=255), so
//! memory stays bounded by the image width rather than its area.

use super::ProcessingError;
use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};

/// Fixed set of colors a target panel can physically display.
///
/// Ordered, immutable once constructed, never empty, never duplicated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<Rgb<u8>>,
}

impl Palette {
    /// Build a palette from explicit colors.
    pub fn new(colors: Vec<Rgb<u8>>) -> Result<Self, ProcessingError> {
        if colors.is_empty() {
            return Err(ProcessingError::EmptyPalette);
        }
        for (i, color) in colors.iter().enumerate() {
            if colors[..i].contains(color) {
                return Err(ProcessingError::DuplicatePaletteColor(color.0));
            }
        }
        Ok(Self { colors })
    }

    /// Two-color black/white palette.
    pub fn black_white() -> Self {
        Self {
            colors: vec![Rgb([0, 0, 0]), Rgb([255, 255, 255])],
        }
    }

    /// Three-color palette for black/white/red panels.
    pub fn black_white_red() -> Self {
        Self {
            colors: vec![Rgb([0, 0, 0]), Rgb([255, 255, 255]), Rgb([255, 0, 0])],
        }
    }

    pub fn colors(&self) -> &[Rgb<u8>] {
        &self.colors
    }

    pub fn contains(&self, color: &Rgb<u8>) -> bool {
        self.colors.contains(color)
    }

    /// Index of the nearest palette color by sum of squared channel
    /// differences. i32 arithmetic, the per-channel delta fits easily.
    fn nearest(&self, r: i16, g: i16, b: i16) -> usize {
        self.colors
            .iter()
            .enumerate()
            .min_by_key(|(_, c)| {
                let dr = r as i32 - c[0] as i32;
                let dg = g as i32 - c[1] as i32;
                let db = b as i32 - c[2] as i32;
                dr * dr + dg * dg + db * db
            })
            .map(|(i, _)| i)
            .unwrap_or(0)
    }
}

/// Configured palette presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaletteKind {
    BlackWhite,
    BlackWhiteRed,
}

impl PaletteKind {
    pub fn palette(&self) -> Palette {
        match self {
            PaletteKind::BlackWhite => Palette::black_white(),
            PaletteKind::BlackWhiteRed => Palette::black_white_red(),
        }
    }
}

/// One diffusion target: offset from the current pixel plus the error share.
struct Weight {
    dx: i32,
    dy: u32,
    num: i16,
    den: i16,
}

/// Error-diffusion kernel selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ditherer {
    /// 1/8 of the error to six forward/below neighbors, remainder dropped.
    /// The underestimation is intentional: full diffusion overshoots on
    /// very small palettes.
    Atkinson,
    /// Classic 7/16, 3/16, 5/16, 1/16 split; conserves the full error.
    FloydSteinberg,
}

impl Ditherer {
    fn kernel(&self) -> &'static [Weight] {
        const ATKINSON: &[Weight] = &[
            Weight { dx: 1, dy: 0, num: 1, den: 8 },
            Weight { dx: 2, dy: 0, num: 1, den: 8 },
            Weight { dx: -1, dy: 1, num: 1, den: 8 },
            Weight { dx: 0, dy: 1, num: 1, den: 8 },
            Weight { dx: 1, dy: 1, num: 1, den: 8 },
            Weight { dx: 0, dy: 2, num: 1, den: 8 },
        ];
        const FLOYD_STEINBERG: &[Weight] = &[
            Weight { dx: 1, dy: 0, num: 7, den: 16 },
            Weight { dx: -1, dy: 1, num: 3, den: 16 },
            Weight { dx: 0, dy: 1, num: 5, den: 16 },
            Weight { dx: 1, dy: 1, num: 1, den: 16 },
        ];
        match self {
            Ditherer::Atkinson => ATKINSON,
            Ditherer::FloydSteinberg => FLOYD_STEINBERG,
        }
    }

    /// Rows of error state the kernel needs (current row included).
    fn row_depth(&self) -> usize {
        self.kernel().iter().map(|w| w.dy as usize).max().unwrap_or(0) + 1
    }
}

/// Quantize `img` in place to `palette`, diffusing the per-pixel error.
///
/// Deterministic: identical input, palette, and kernel always produce an
/// identical buffer. Every output pixel is a member of `palette`.
pub fn dither_image(img: &mut RgbImage, palette: &Palette, ditherer: Ditherer) {
    let (width, height) = img.dimensions();
    let width_usize = width as usize;

    tracing::debug!(
        "Dithering {}x{} to {} colors with {:?}",
        width,
        height,
        palette.colors().len(),
        ditherer
    );

    let kernel = ditherer.kernel();
    let depth = ditherer.row_depth();

    // Ring of error rows indexed by y % depth. Row y is cleared after it is
    // consumed so the slot can accumulate errors for row y + depth.
    let mut rows: Vec<Vec<(i16, i16, i16)>> = vec![vec![(0, 0, 0); width_usize]; depth];

    for y in 0..height {
        let slot = y as usize % depth;

        for x in 0..width {
            let p = *img.get_pixel(x, y);
            let (er, eg, eb) = rows[slot][x as usize];

            let r = (p[0] as i16 + er).clamp(0, 255);
            let g = (p[1] as i16 + eg).clamp(0, 255);
            let b = (p[2] as i16 + eb).clamp(0, 255);

            let chosen = palette.colors()[palette.nearest(r, g, b)];
            img.put_pixel(x, y, chosen);

            let err_r = r - chosen[0] as i16;
            let err_g = g - chosen[1] as i16;
            let err_b = b - chosen[2] as i16;

            for w in kernel {
                let nx = x as i64 + w.dx as i64;
                let ny = y + w.dy;
                if nx < 0 || nx >= width as i64 || ny >= height {
                    continue;
                }
                let cell = &mut rows[ny as usize % depth][nx as usize];
                cell.0 += err_r * w.num / w.den;
                cell.1 += err_g * w.num / w.den;
                cell.2 += err_b * w.num / w.den;
            }
        }

        rows[slot].iter_mut().for_each(|c| *c = (0, 0, 0));
    }
}
