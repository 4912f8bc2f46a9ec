//! Pixel formats and source bitmap conversion.
//!
//! Remote surfaces are always held in one of a few canonical word formats
//! ([`PixelFormat`]). Images arriving from the wire come in a wider set of
//! encodings ([`BitmapFormat`]): palette indexed at 1, 4 and 8 bits, packed
//! 5-5-5, packed 24-bit BGR, 32-bit with or without alpha, and 8-bit alpha.
//! [`convert`] and [`convert_into`] turn such a [`Bitmap`] into canonical
//! pixels; [`try_as_view`] skips the copy entirely when the bytes are
//! already in a canonical layout.
//!
//! Bottom-up bitmaps are not handled by a separate loop. The destination
//! view is flipped (row 0 moved to the last memory row, stride negated) and
//! the source is then read strictly in memory order.

use bitflags::bitflags;

use crate::error::{RasterError, Result};
use crate::rendering_buffer::{read_word, write_word, PixelBuf, PixelBufMut, PixelImage};

// ============================================================================
// Canonical formats
// ============================================================================

/// Canonical destination word formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 1-bit alpha, MSB first.
    A1,
    A8,
    X1R5G5B5,
    R5G6B5,
    /// Packed 3-byte pixels, `b, g, r` in memory.
    R8G8B8,
    X8R8G8B8,
    A8R8G8B8,
}

impl PixelFormat {
    pub fn bits_per_pixel(self) -> u32 {
        match self {
            PixelFormat::A1 => 1,
            PixelFormat::A8 => 8,
            PixelFormat::X1R5G5B5 | PixelFormat::R5G6B5 => 16,
            PixelFormat::R8G8B8 => 24,
            PixelFormat::X8R8G8B8 | PixelFormat::A8R8G8B8 => 32,
        }
    }

    /// Bytes touched by `width` pixels.
    #[inline]
    pub fn row_bytes(self, width: u32) -> usize {
        (width as usize * self.bits_per_pixel() as usize + 7) / 8
    }

    /// Row size rounded up to a multiple of 4 bytes.
    #[inline]
    pub fn aligned_stride(self, width: u32) -> usize {
        (self.row_bytes(width) + 3) & !3
    }

    pub fn has_alpha(self) -> bool {
        matches!(
            self,
            PixelFormat::A1 | PixelFormat::A8 | PixelFormat::A8R8G8B8
        )
    }

    /// Expand a word of this format to `0xAARRGGBB`. Formats without alpha
    /// report an opaque alpha of `0xff`.
    pub fn to_argb32(self, word: u32) -> u32 {
        match self {
            PixelFormat::A1 => {
                if word & 1 != 0 {
                    0xff00_0000
                } else {
                    0
                }
            }
            PixelFormat::A8 => (word & 0xff) << 24,
            PixelFormat::X1R5G5B5 => 0xff00_0000 | rgb_16_555_to_32(word as u16),
            PixelFormat::R5G6B5 => 0xff00_0000 | rgb_16_565_to_32(word as u16),
            PixelFormat::R8G8B8 | PixelFormat::X8R8G8B8 => 0xff00_0000 | (word & 0x00ff_ffff),
            PixelFormat::A8R8G8B8 => word,
        }
    }

    /// Pack `0xAARRGGBB` into a word of this format.
    pub fn from_argb32(self, argb: u32) -> u32 {
        match self {
            PixelFormat::A1 => argb >> 31,
            PixelFormat::A8 => argb >> 24,
            PixelFormat::X1R5G5B5 => u32::from(rgb_32_to_16_555(argb)),
            PixelFormat::R5G6B5 => u32::from(rgb_32_to_16_565(argb)),
            PixelFormat::R8G8B8 | PixelFormat::X8R8G8B8 => argb & 0x00ff_ffff,
            PixelFormat::A8R8G8B8 => argb,
        }
    }
}

/// Surface formats as numbered by the remote protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceFormat {
    Bit1A,
    Bit8A,
    Bit16_555,
    Bit16_565,
    Bit32xRGB,
    Bit32ARGB,
}

impl TryFrom<u32> for SurfaceFormat {
    type Error = RasterError;

    fn try_from(raw: u32) -> Result<Self> {
        match raw {
            1 => Ok(SurfaceFormat::Bit1A),
            8 => Ok(SurfaceFormat::Bit8A),
            16 => Ok(SurfaceFormat::Bit16_555),
            80 => Ok(SurfaceFormat::Bit16_565),
            32 => Ok(SurfaceFormat::Bit32xRGB),
            96 => Ok(SurfaceFormat::Bit32ARGB),
            other => Err(RasterError::UnsupportedFormat(format!(
                "surface format {}",
                other
            ))),
        }
    }
}

/// Canonical pixel format holding a surface of the given wire format.
pub fn surface_format_to_pixel_format(format: SurfaceFormat) -> PixelFormat {
    match format {
        SurfaceFormat::Bit1A => PixelFormat::A1,
        SurfaceFormat::Bit8A => PixelFormat::A8,
        SurfaceFormat::Bit16_555 => PixelFormat::X1R5G5B5,
        SurfaceFormat::Bit16_565 => PixelFormat::R5G6B5,
        SurfaceFormat::Bit32xRGB => PixelFormat::X8R8G8B8,
        SurfaceFormat::Bit32ARGB => PixelFormat::A8R8G8B8,
    }
}

// ============================================================================
// Source bitmaps
// ============================================================================

/// Encodings of incoming images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitmapFormat {
    /// 1-bit palette index, most significant bit first.
    Bit1Be,
    /// 4-bit palette index, high nibble first.
    Bit4Be,
    /// 8-bit palette index.
    Bit8,
    /// 5-5-5 truecolor.
    Bit16,
    /// Packed `b, g, r` bytes.
    Bit24,
    Bit32,
    /// 32-bit truecolor with alpha.
    Rgba,
    /// 8-bit alpha only.
    Bit8A,
}

impl BitmapFormat {
    pub fn bits_per_pixel(self) -> u32 {
        match self {
            BitmapFormat::Bit1Be => 1,
            BitmapFormat::Bit4Be => 4,
            BitmapFormat::Bit8 | BitmapFormat::Bit8A => 8,
            BitmapFormat::Bit16 => 16,
            BitmapFormat::Bit24 => 24,
            BitmapFormat::Bit32 | BitmapFormat::Rgba => 32,
        }
    }

    pub fn is_indexed(self) -> bool {
        matches!(
            self,
            BitmapFormat::Bit1Be | BitmapFormat::Bit4Be | BitmapFormat::Bit8
        )
    }

    #[inline]
    fn row_bytes(self, width: u32) -> usize {
        (width as usize * self.bits_per_pixel() as usize + 7) / 8
    }
}

bitflags! {
    /// Per-bitmap flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BitmapFlags: u32 {
        /// Rows are stored top row first. Without it the first memory row
        /// is the bottom of the image.
        const TOP_DOWN = 1 << 2;
    }
}

/// Color table for indexed bitmaps. Entries are `0x00RRGGBB` words.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Palette {
    entries: Vec<u32>,
}

impl Palette {
    pub const MAX_ENTRIES: usize = 256;

    pub fn new(entries: Vec<u32>) -> Result<Self> {
        if entries.len() > Self::MAX_ENTRIES {
            return Err(RasterError::InvalidArgument(format!(
                "palette has {} entries, at most {} allowed",
                entries.len(),
                Self::MAX_ENTRIES
            )));
        }
        Ok(Self { entries })
    }

    /// Parse little-endian 32-bit entries.
    pub fn from_le_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() % 4 != 0 {
            return Err(RasterError::InvalidArgument(format!(
                "palette byte length {} is not a multiple of 4",
                bytes.len()
            )));
        }
        Self::new(
            bytes
                .chunks_exact(4)
                .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        )
    }

    pub fn entries(&self) -> &[u32] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lookup table of `limit` destination words, zero padded past the last
    /// entry.
    fn lookup(&self, limit: usize, dest: PixelFormat) -> [u32; 256] {
        let mut table = [0u32; 256];
        for (slot, &ent) in table.iter_mut().zip(self.entries.iter().take(limit)) {
            *slot = if dest == PixelFormat::X1R5G5B5 {
                u32::from(rgb_32_to_16_555(ent))
            } else {
                ent
            };
        }
        table
    }
}

/// An incoming image: caller-owned bytes plus their encoding.
#[derive(Debug, Clone, Copy)]
pub struct Bitmap<'a> {
    pub format: BitmapFormat,
    pub flags: BitmapFlags,
    pub width: u32,
    pub height: u32,
    /// Distance in bytes between consecutive memory rows.
    pub stride: u32,
    pub data: &'a [u8],
    pub palette: Option<&'a Palette>,
}

impl<'a> Bitmap<'a> {
    pub fn is_top_down(&self) -> bool {
        self.flags.contains(BitmapFlags::TOP_DOWN)
    }

    fn check_layout(&self) -> Result<()> {
        let row_bytes = self.format.row_bytes(self.width);
        if self.height > 1 && (self.stride as usize) < row_bytes {
            return Err(RasterError::InvalidArgument(format!(
                "bitmap stride {} is shorter than a {} byte row",
                self.stride, row_bytes
            )));
        }
        if self.height == 0 {
            return Ok(());
        }
        let needed = (self.height as usize - 1) * self.stride as usize + row_bytes;
        if self.data.len() < needed {
            return Err(RasterError::BufferTooSmall {
                needed,
                actual: self.data.len(),
            });
        }
        Ok(())
    }

    /// Memory row `i`, counting from the start of `data`.
    #[inline]
    fn memory_row(&self, i: u32) -> &'a [u8] {
        let start = i as usize * self.stride as usize;
        &self.data[start..start + self.format.row_bytes(self.width)]
    }
}

/// Canonical format a bitmap converts into. Indexed bitmaps follow the
/// palette's surface format: 5-5-5 stays 16-bit, everything else becomes
/// 32-bit xRGB.
pub fn bitmap_format_to_pixel_format(
    format: BitmapFormat,
    palette_format: SurfaceFormat,
) -> PixelFormat {
    match format {
        BitmapFormat::Bit1Be | BitmapFormat::Bit4Be | BitmapFormat::Bit8 => {
            if palette_format == SurfaceFormat::Bit16_555 {
                PixelFormat::X1R5G5B5
            } else {
                PixelFormat::X8R8G8B8
            }
        }
        BitmapFormat::Bit16 => PixelFormat::X1R5G5B5,
        BitmapFormat::Bit24 | BitmapFormat::Bit32 => PixelFormat::X8R8G8B8,
        BitmapFormat::Rgba => PixelFormat::A8R8G8B8,
        BitmapFormat::Bit8A => PixelFormat::A8,
    }
}

// ============================================================================
// Channel expansion
// ============================================================================

/// Expand 5-5-5 to `0x00RRGGBB`, replicating the top bits into the low bits.
#[inline]
pub fn rgb_16_555_to_32(color: u16) -> u32 {
    let c = u32::from(color);
    let b = ((c & 0x001f) << 3) | ((c & 0x001c) >> 2);
    let g = ((c & 0x03e0) << 6) | ((c & 0x0380) << 1);
    let r = ((c & 0x7c00) << 9) | ((c & 0x7000) << 4);
    r | g | b
}

#[inline]
pub fn rgb_32_to_16_555(color: u32) -> u16 {
    (((color >> 3) & 0x001f) | ((color >> 6) & 0x03e0) | ((color >> 9) & 0x7c00)) as u16
}

#[inline]
fn rgb_16_565_to_32(color: u16) -> u32 {
    let c = u32::from(color);
    let b = ((c & 0x001f) << 3) | ((c & 0x001c) >> 2);
    let g = ((c & 0x07e0) << 5) | ((c & 0x0600) >> 1);
    let r = ((c & 0xf800) << 8) | ((c & 0xe000) << 3);
    r | g | b
}

#[inline]
fn rgb_32_to_16_565(color: u32) -> u16 {
    (((color >> 3) & 0x001f) | ((color >> 5) & 0x07e0) | ((color >> 8) & 0xf800)) as u16
}

// ============================================================================
// Zero-copy view
// ============================================================================

/// Borrow the bitmap as a canonical view without copying.
///
/// Only truecolor encodings whose stride is a multiple of 4 qualify;
/// everything else returns `None` and must go through [`convert`].
pub fn try_as_view<'a>(bitmap: &Bitmap<'a>) -> Option<PixelBuf<'a>> {
    if bitmap.stride % 4 != 0 {
        return None;
    }
    let format = match bitmap.format {
        BitmapFormat::Bit32 => PixelFormat::X8R8G8B8,
        BitmapFormat::Rgba => PixelFormat::A8R8G8B8,
        BitmapFormat::Bit24 => PixelFormat::R8G8B8,
        BitmapFormat::Bit16 => PixelFormat::X1R5G5B5,
        _ => return None,
    };
    let stride = i32::try_from(bitmap.stride).ok()?;
    let stride = if bitmap.is_top_down() { stride } else { -stride };
    PixelBuf::new(bitmap.data, format, bitmap.width, bitmap.height, stride).ok()
}

/// A canonical image that is either borrowed from the source bitmap or
/// freshly converted.
pub enum ImageRef<'a> {
    Borrowed(PixelBuf<'a>),
    Owned(PixelImage),
}

impl ImageRef<'_> {
    pub fn view(&self) -> PixelBuf<'_> {
        match self {
            ImageRef::Borrowed(buf) => *buf,
            ImageRef::Owned(img) => img.view(),
        }
    }

    pub fn is_borrowed(&self) -> bool {
        matches!(self, ImageRef::Borrowed(_))
    }
}

/// Zero-copy view when possible, full conversion otherwise.
pub fn as_view_or_convert<'a>(
    bitmap: &Bitmap<'a>,
    palette_format: SurfaceFormat,
) -> Result<ImageRef<'a>> {
    match try_as_view(bitmap) {
        Some(view) => Ok(ImageRef::Borrowed(view)),
        None => convert(bitmap, palette_format).map(ImageRef::Owned),
    }
}

// ============================================================================
// Conversion
// ============================================================================

/// Convert into a freshly allocated image of
/// `height * aligned_stride` bytes.
pub fn convert(bitmap: &Bitmap<'_>, palette_format: SurfaceFormat) -> Result<PixelImage> {
    let format = bitmap_format_to_pixel_format(bitmap.format, palette_format);
    let mut image = PixelImage::new(format, bitmap.width, bitmap.height);
    convert_into(bitmap, palette_format, &mut image.view_mut())?;
    Ok(image)
}

/// Convert into a caller-provided view. The view must already have the
/// bitmap's canonical format and at least its size.
pub fn convert_into(
    bitmap: &Bitmap<'_>,
    palette_format: SurfaceFormat,
    dest: &mut PixelBufMut<'_>,
) -> Result<()> {
    let format = bitmap_format_to_pixel_format(bitmap.format, palette_format);
    if dest.format() != format {
        return Err(RasterError::UnsupportedFormat(format!(
            "{:?} bitmap into {:?} buffer",
            bitmap.format,
            dest.format()
        )));
    }
    if dest.width() < bitmap.width || dest.height() < bitmap.height {
        return Err(RasterError::InvalidArgument(format!(
            "{}x{} destination for a {}x{} bitmap",
            dest.width(),
            dest.height(),
            bitmap.width,
            bitmap.height
        )));
    }
    bitmap.check_layout()?;

    let area = crate::basics::Rect::new(0, 0, bitmap.width as i32, bitmap.height as i32);
    let dest = dest.sub_view_mut(area)?;
    let mut dest = if bitmap.is_top_down() {
        dest
    } else {
        dest.flipped()
    };

    let table = if bitmap.format.is_indexed() {
        let palette = bitmap.palette.ok_or(RasterError::MissingPalette)?;
        let limit = if bitmap.format == BitmapFormat::Bit4Be {
            16
        } else {
            Palette::MAX_ENTRIES
        };
        Some(palette.lookup(limit, format))
    } else {
        None
    };
    let dest_bpp = format.bits_per_pixel();

    log::trace!(
        "converting {:?} {}x{} to {:?}",
        bitmap.format,
        bitmap.width,
        bitmap.height,
        format
    );

    for y in 0..bitmap.height {
        let src = bitmap.memory_row(y);
        let out = dest.row_mut(y);
        match (bitmap.format, &table) {
            (BitmapFormat::Bit32, _)
            | (BitmapFormat::Rgba, _)
            | (BitmapFormat::Bit16, _)
            | (BitmapFormat::Bit8A, _) => out.copy_from_slice(src),
            (BitmapFormat::Bit24, _) => {
                for x in 0..bitmap.width as usize {
                    write_word(out, x, 32, read_word(src, x, 24));
                }
            }
            (BitmapFormat::Bit8, Some(table)) => {
                for (x, &index) in src.iter().enumerate() {
                    write_word(out, x, dest_bpp, table[index as usize]);
                }
            }
            (BitmapFormat::Bit4Be, Some(table)) => {
                for x in 0..bitmap.width as usize {
                    let byte = src[x / 2];
                    let index = if x % 2 == 0 { byte >> 4 } else { byte & 0x0f };
                    write_word(out, x, dest_bpp, table[index as usize]);
                }
            }
            (BitmapFormat::Bit1Be, Some(table)) => {
                let (back, fore) = (table[0], table[1]);
                for x in 0..bitmap.width as usize {
                    let on = src[x >> 3] & (0x80 >> (x & 7)) != 0;
                    write_word(out, x, dest_bpp, if on { fore } else { back });
                }
            }
            (_, None) => return Err(RasterError::MissingPalette),
        }
    }
    Ok(())
}

/// Convert a bitmap into an explicitly requested canonical format.
///
/// When the requested format is the bitmap's own (or drops nothing but the
/// alpha channel) the bitmap converts directly; otherwise it is first
/// brought into its own canonical form, borrowed when possible, and then
/// recoded word by word.
pub fn convert_to(
    bitmap: &Bitmap<'_>,
    dest_format: PixelFormat,
    palette_format: SurfaceFormat,
) -> Result<PixelImage> {
    let native = bitmap_format_to_pixel_format(bitmap.format, palette_format);
    if native == dest_format
        || (native == PixelFormat::A8R8G8B8 && dest_format == PixelFormat::X8R8G8B8)
    {
        let image = convert(bitmap, palette_format)?;
        let (w, h, stride) = (image.width(), image.height(), image.stride() as u32);
        return PixelImage::from_vec(image.into_data(), dest_format, w, h, stride);
    }

    let source = as_view_or_convert(bitmap, palette_format)?;
    recode(&source.view(), dest_format)
}

/// Recode every word of `src` into `dest_format`.
pub fn recode(src: &PixelBuf<'_>, dest_format: PixelFormat) -> Result<PixelImage> {
    if src.format() == PixelFormat::A1 || dest_format == PixelFormat::A1 {
        return Err(RasterError::UnsupportedFormat(format!(
            "recoding {:?} to {:?}",
            src.format(),
            dest_format
        )));
    }
    let mut image = PixelImage::new(dest_format, src.width(), src.height());
    let (src_bpp, dest_bpp) = (src.bits_per_pixel(), dest_format.bits_per_pixel());
    let mut view = image.view_mut();
    for y in 0..src.height() {
        let row = src.row(y);
        let out = view.row_mut(y);
        for x in 0..src.width() as usize {
            let argb = src.format().to_argb32(read_word(row, x, src_bpp));
            write_word(out, x, dest_bpp, dest_format.from_argb32(argb));
        }
    }
    Ok(image)
}

// ============================================================================
// Tests
// ============================================================================
