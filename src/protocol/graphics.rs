//! # Raster Graphics
//!
//! Converts images to 1-bit rasters and wraps them in raster commands.
//!
//! ## Conversion Pipeline
//!
//! ```text
//! encoded bytes ─► decode ─► rotate ─► scale ─► clamp to head ─► threshold ─► pack
//! ```
//!
//! - Decoding uses the `image` crate, so PNG, JPEG, GIF and BMP all work.
//! - A zero target width or height keeps the aspect ratio; both zero keeps
//!   the native size.
//! - Images wider than the printhead (minus the x offset) are scaled down.
//! - Pixels with luma below 128 print black; transparent pixels are white.
//!
//! ## Bit Packing
//!
//! Each bit is one dot, MSB leftmost, 1 = black. The x offset is realized as
//! leading zero bits in every row:
//!
//! ```text
//! x_offset = 3, row = ██░█
//! byte 0 = 000 1101 0 = 0x1A
//! ```

use image::imageops::FilterType;
use image::DynamicImage;

use super::commands::{ESC, GS, u16_le};
use crate::error::{EtiquetaError, Result};

/// Rows per raster command
pub const MAX_RASTER_ROWS: u16 = 256;

/// Luma threshold; darker pixels print
const BLACK_THRESHOLD: u8 = 128;

/// Alpha threshold; more transparent pixels stay white
const OPAQUE_THRESHOLD: u8 = 128;

/// Clockwise rotation applied before scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Map degrees (any multiple of 90, negative allowed) to a rotation.
    ///
    /// ```
    /// use etiqueta::protocol::graphics::Rotation;
    ///
    /// assert_eq!(Rotation::from_degrees(450), Some(Rotation::Deg90));
    /// assert_eq!(Rotation::from_degrees(-90), Some(Rotation::Deg270));
    /// assert_eq!(Rotation::from_degrees(45), None);
    /// ```
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        match degrees.rem_euclid(360) {
            0 => Some(Self::Deg0),
            90 => Some(Self::Deg90),
            180 => Some(Self::Deg180),
            270 => Some(Self::Deg270),
            _ => None,
        }
    }

    pub fn degrees(self) -> u16 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    fn apply(self, img: DynamicImage) -> DynamicImage {
        match self {
            Self::Deg0 => img,
            Self::Deg90 => img.rotate90(),
            Self::Deg180 => img.rotate180(),
            Self::Deg270 => img.rotate270(),
        }
    }
}

/// A packed 1-bit image, ready for [`raster`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    /// Row width in dots, including the x offset
    pub width_dots: u16,
    pub height: u16,
    /// `width_dots.div_ceil(8) * height` bytes
    pub data: Vec<u8>,
}

impl Bitmap {
    #[inline]
    pub fn width_bytes(&self) -> usize {
        self.width_dots.div_ceil(8) as usize
    }

    /// Raster commands for the whole bitmap, split every [`MAX_RASTER_ROWS`].
    pub fn to_raster_commands(&self) -> Vec<u8> {
        let row_bytes = self.width_bytes();
        if row_bytes == 0 || self.height == 0 {
            return Vec::new();
        }

        let mut out = Vec::with_capacity(self.data.len() + 16);
        for (i, chunk) in self
            .data
            .chunks(row_bytes * MAX_RASTER_ROWS as usize)
            .enumerate()
        {
            let rows = (chunk.len() / row_bytes) as u16;
            tracing::trace!(chunk = i, rows, "raster chunk");
            out.extend(raster(self.width_dots, rows, chunk));
        }
        out
    }
}

/// Placement of a graphic on the label, in dots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Placement {
    pub rotation: Rotation,
    pub x_offset: u16,
    /// Target width; 0 keeps the aspect ratio
    pub width: u16,
    /// Target height; 0 keeps the aspect ratio
    pub height: u16,
}

/// Decode, transform and pack an encoded image.
///
/// ## Errors
///
/// [`EtiquetaError::Graphic`] if the bytes are not a decodable image or the
/// offset leaves no room on the printhead.
pub fn rasterize(encoded: &[u8], placement: Placement, printhead_width: u16) -> Result<Bitmap> {
    let img = image::load_from_memory(encoded)
        .map_err(|e| EtiquetaError::Graphic(format!("cannot decode image: {}", e)))?;
    rasterize_image(img, placement, printhead_width)
}

/// Same as [`rasterize`] for an already-decoded image.
pub fn rasterize_image(
    img: DynamicImage,
    placement: Placement,
    printhead_width: u16,
) -> Result<Bitmap> {
    if placement.x_offset >= printhead_width {
        return Err(EtiquetaError::Graphic(format!(
            "x offset {} outside printhead width {}",
            placement.x_offset, printhead_width
        )));
    }

    let img = placement.rotation.apply(img);
    let (src_w, src_h) = (img.width(), img.height());
    if src_w == 0 || src_h == 0 {
        return Err(EtiquetaError::Graphic("image has no pixels".to_string()));
    }

    let (mut w, mut h) = target_size(src_w, src_h, placement.width, placement.height);

    let available = u32::from(printhead_width - placement.x_offset);
    if w > available {
        h = ((u64::from(h) * u64::from(available)) / u64::from(w)).max(1) as u32;
        w = available;
        tracing::debug!(width = w, height = h, "graphic scaled down to fit printhead");
    }
    let h = h.min(u32::from(u16::MAX));

    let img = if (w, h) == (src_w, src_h) {
        img
    } else {
        img.resize_exact(w, h, FilterType::Triangle)
    };

    Ok(pack(&img, placement.x_offset))
}

/// Target dimensions honoring "0 keeps aspect ratio".
fn target_size(src_w: u32, src_h: u32, width: u16, height: u16) -> (u32, u32) {
    let (width, height) = (u32::from(width), u32::from(height));
    let scaled = |num: u32, mul: u32, den: u32| {
        ((u64::from(num) * u64::from(mul) + u64::from(den) / 2) / u64::from(den)).max(1) as u32
    };

    match (width, height) {
        (0, 0) => (src_w, src_h),
        (w, 0) => (w, scaled(src_h, w, src_w)),
        (0, h) => (scaled(src_w, h, src_h), h),
        (w, h) => (w, h),
    }
}

fn pack(img: &DynamicImage, x_offset: u16) -> Bitmap {
    let gray = img.to_luma_alpha8();
    let (w, h) = gray.dimensions();
    let width_dots = x_offset + w as u16;
    let row_bytes = width_dots.div_ceil(8) as usize;

    let mut data = vec![0u8; row_bytes * h as usize];
    for (x, y, pixel) in gray.enumerate_pixels() {
        let [luma, alpha] = pixel.0;
        if alpha >= OPAQUE_THRESHOLD && luma < BLACK_THRESHOLD {
            let dot = x_offset as usize + x as usize;
            data[y as usize * row_bytes + dot / 8] |= 0x80 >> (dot % 8);
        }
    }

    Bitmap {
        width_dots,
        height: h as u16,
        data,
    }
}

// ============================================================================
// RASTER COMMAND
// ============================================================================

/// # Raster Graphics (ESC GS S m xL xH yL yH n d1...dk)
///
/// Prints an arbitrary-height monochrome raster.
///
/// ## Protocol Details
///
/// | Format  | Bytes |
/// |---------|-------|
/// | ASCII   | ESC GS S m xL xH yL yH n d1...dk |
/// | Hex     | 1B 1D 53 m xL xH yL yH n d1...dk |
///
/// ## Parameters
///
/// | Param | Meaning |
/// |-------|---------|
/// | m | 1 = monochrome |
/// | xL xH | Row width in **bytes** |
/// | yL yH | Rows |
/// | n | 0 = black |
pub fn raster(width_dots: u16, height: u16, data: &[u8]) -> Vec<u8> {
    let width_bytes = width_dots.div_ceil(8);
    debug_assert_eq!(
        data.len(),
        width_bytes as usize * height as usize,
        "raster data length mismatch"
    );

    let [xl, xh] = u16_le(width_bytes);
    let [yl, yh] = u16_le(height);

    let mut cmd = Vec::with_capacity(9 + data.len());
    cmd.extend([ESC, GS, b'S', 1, xl, xh, yl, yh, 0]);
    cmd.extend_from_slice(data);
    cmd
}

// ============================================================================
// TESTS
// ============================================================================
