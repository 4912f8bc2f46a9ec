//! Pixel buffer views with signed-stride row addressing.
//!
//! A view describes caller-owned memory as `{data, format, width, height,
//! stride, origin}`. `origin` is the byte offset of image row 0 and row `y`
//! starts at `origin + y * stride`. A negative stride therefore addresses a
//! bottom-up image: `origin` sits on the last memory row and each following
//! image row lies `|stride|` bytes before the previous one. Every module
//! relies on this convention instead of adjusting raw pointers.
//!
//! - [`PixelBuf`]: shared view.
//! - [`PixelBufMut`]: exclusive view.
//! - [`PixelImage`]: an owned buffer with an aligned positive stride.
//!
//! Multi-byte pixel words are stored little-endian.

use crate::basics::Rect;
use crate::error::{RasterError, Result};
use crate::pixel_format::PixelFormat;

// ============================================================================
// Word access
// ============================================================================

/// Read pixel `x` of a row as a word of `bpp` bits. 24-bit pixels are packed
/// `b, g, r` in memory and read back as `0x00RRGGBB`.
#[inline]
pub fn read_word(row: &[u8], x: usize, bpp: u32) -> u32 {
    match bpp {
        8 => u32::from(row[x]),
        16 => u32::from(u16::from_le_bytes([row[2 * x], row[2 * x + 1]])),
        24 => {
            let i = 3 * x;
            u32::from(row[i]) | u32::from(row[i + 1]) << 8 | u32::from(row[i + 2]) << 16
        }
        _ => {
            let i = 4 * x;
            u32::from_le_bytes([row[i], row[i + 1], row[i + 2], row[i + 3]])
        }
    }
}

/// Write pixel `x` of a row, truncating `value` to `bpp` bits.
#[inline]
pub fn write_word(row: &mut [u8], x: usize, bpp: u32, value: u32) {
    match bpp {
        8 => row[x] = value as u8,
        16 => row[2 * x..2 * x + 2].copy_from_slice(&(value as u16).to_le_bytes()),
        24 => {
            let i = 3 * x;
            row[i] = value as u8;
            row[i + 1] = (value >> 8) as u8;
            row[i + 2] = (value >> 16) as u8;
        }
        _ => row[4 * x..4 * x + 4].copy_from_slice(&value.to_le_bytes()),
    }
}

/// Check that every row of a `height`-row image fits in `len` bytes.
fn check_layout(
    len: usize,
    row_bytes: usize,
    height: u32,
    stride: i32,
    origin: usize,
) -> Result<()> {
    if (stride.unsigned_abs() as usize) < row_bytes && height > 1 {
        return Err(RasterError::InvalidArgument(format!(
            "stride {} is shorter than a {} byte row",
            stride, row_bytes
        )));
    }
    if height == 0 {
        return Ok(());
    }
    let last = origin as i64 + i64::from(height - 1) * i64::from(stride);
    let lowest = last.min(origin as i64);
    let highest = last.max(origin as i64) + row_bytes as i64;
    if lowest < 0 || highest > len as i64 {
        return Err(RasterError::BufferTooSmall {
            needed: highest.max(0) as usize,
            actual: len,
        });
    }
    Ok(())
}

/// Natural origin for a stride: the first memory row for top-down images,
/// the last for bottom-up ones.
#[inline]
fn natural_origin(height: u32, stride: i32) -> usize {
    if stride < 0 && height > 0 {
        (height as usize - 1) * stride.unsigned_abs() as usize
    } else {
        0
    }
}

macro_rules! view_accessors {
    () => {
        #[inline]
        pub fn format(&self) -> PixelFormat {
            self.format
        }

        #[inline]
        pub fn width(&self) -> u32 {
            self.width
        }

        #[inline]
        pub fn height(&self) -> u32 {
            self.height
        }

        /// Signed byte distance between consecutive image rows.
        #[inline]
        pub fn stride(&self) -> i32 {
            self.stride
        }

        /// Byte offset of image row 0 inside the underlying slice.
        #[inline]
        pub fn origin(&self) -> usize {
            self.origin
        }

        #[inline]
        pub fn bits_per_pixel(&self) -> u32 {
            self.format.bits_per_pixel()
        }

        /// Bytes covered by the pixels of one row.
        #[inline]
        pub fn row_bytes(&self) -> usize {
            self.format.row_bytes(self.width)
        }

        /// The whole image as a rectangle anchored at the origin.
        #[inline]
        pub fn bounds(&self) -> Rect {
            Rect::new(0, 0, self.width as i32, self.height as i32)
        }

        #[inline]
        fn row_offset(&self, y: u32) -> usize {
            (self.origin as isize + y as isize * self.stride as isize) as usize
        }

        /// Fails with `OutOfBounds` unless `r` lies inside the image.
        pub fn check_rect(&self, r: Rect) -> Result<()> {
            if r.is_valid() && self.bounds().contains(&r) {
                Ok(())
            } else {
                Err(RasterError::out_of_bounds(r, self.width, self.height))
            }
        }

        /// Pixel word at `(x, y)`. Panics when out of range.
        #[inline]
        pub fn pixel(&self, x: u32, y: u32) -> u32 {
            assert!(x < self.width, "x {} out of range", x);
            read_word(self.row(y), x as usize, self.bits_per_pixel())
        }

        fn sub_layout(&self, r: Rect) -> Result<(usize, u32, u32)> {
            self.check_rect(r)?;
            let bpp = self.bits_per_pixel();
            if bpp < 8 && r.left != 0 {
                return Err(RasterError::UnsupportedFormat(format!(
                    "{:?} sub-view at x {}",
                    self.format, r.left
                )));
            }
            let x_bytes = r.left as usize * bpp as usize / 8;
            let origin = if r.height() > 0 {
                self.row_offset(r.top as u32) + x_bytes
            } else {
                self.origin + x_bytes
            };
            Ok((origin, r.width() as u32, r.height() as u32))
        }
    };
}

// ============================================================================
// PixelBuf
// ============================================================================

/// Shared view over caller-owned pixel memory.
#[derive(Clone, Copy)]
pub struct PixelBuf<'a> {
    data: &'a [u8],
    format: PixelFormat,
    width: u32,
    height: u32,
    stride: i32,
    origin: usize,
}

impl<'a> PixelBuf<'a> {
    /// View `data` as an image. A negative `stride` starts row 0 at the last
    /// memory row.
    pub fn new(
        data: &'a [u8],
        format: PixelFormat,
        width: u32,
        height: u32,
        stride: i32,
    ) -> Result<Self> {
        let origin = natural_origin(height, stride);
        Self::with_origin(data, format, width, height, stride, origin)
    }

    /// View with an explicit row 0 offset.
    pub fn with_origin(
        data: &'a [u8],
        format: PixelFormat,
        width: u32,
        height: u32,
        stride: i32,
        origin: usize,
    ) -> Result<Self> {
        check_layout(data.len(), format.row_bytes(width), height, stride, origin)?;
        Ok(Self {
            data,
            format,
            width,
            height,
            stride,
            origin,
        })
    }

    view_accessors!();

    /// Pixels of image row `y`. Panics when `y >= height`.
    #[inline]
    pub fn row(&self, y: u32) -> &'a [u8] {
        assert!(y < self.height, "row {} out of range", y);
        let start = self.row_offset(y);
        &self.data[start..start + self.row_bytes()]
    }

    /// Same pixels with the row order reversed.
    pub fn flipped(self) -> Self {
        let origin = if self.height > 0 {
            self.row_offset(self.height - 1)
        } else {
            self.origin
        };
        Self {
            origin,
            stride: -self.stride,
            ..self
        }
    }

    /// View of the pixels inside `r`.
    pub fn sub_view(&self, r: Rect) -> Result<PixelBuf<'a>> {
        let (origin, width, height) = self.sub_layout(r)?;
        Ok(PixelBuf {
            data: self.data,
            format: self.format,
            width,
            height,
            stride: self.stride,
            origin,
        })
    }
}

// ============================================================================
// PixelBufMut
// ============================================================================

/// Exclusive view over caller-owned pixel memory.
pub struct PixelBufMut<'a> {
    data: &'a mut [u8],
    format: PixelFormat,
    width: u32,
    height: u32,
    stride: i32,
    origin: usize,
}

impl<'a> PixelBufMut<'a> {
    pub fn new(
        data: &'a mut [u8],
        format: PixelFormat,
        width: u32,
        height: u32,
        stride: i32,
    ) -> Result<Self> {
        let origin = natural_origin(height, stride);
        Self::with_origin(data, format, width, height, stride, origin)
    }

    pub fn with_origin(
        data: &'a mut [u8],
        format: PixelFormat,
        width: u32,
        height: u32,
        stride: i32,
        origin: usize,
    ) -> Result<Self> {
        check_layout(data.len(), format.row_bytes(width), height, stride, origin)?;
        Ok(Self {
            data,
            format,
            width,
            height,
            stride,
            origin,
        })
    }

    view_accessors!();

    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        assert!(y < self.height, "row {} out of range", y);
        let start = self.row_offset(y);
        &self.data[start..start + self.row_bytes()]
    }

    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        assert!(y < self.height, "row {} out of range", y);
        let start = self.row_offset(y);
        let len = self.row_bytes();
        &mut self.data[start..start + len]
    }

    /// Write a pixel word at `(x, y)`. Panics when out of range.
    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, value: u32) {
        assert!(x < self.width, "x {} out of range", x);
        let bpp = self.bits_per_pixel();
        write_word(self.row_mut(y), x as usize, bpp, value);
    }

    /// Shared reborrow of the same pixels.
    pub fn as_buf(&self) -> PixelBuf<'_> {
        PixelBuf {
            data: &*self.data,
            format: self.format,
            width: self.width,
            height: self.height,
            stride: self.stride,
            origin: self.origin,
        }
    }

    /// Same pixels with the row order reversed.
    pub fn flipped(self) -> Self {
        let origin = if self.height > 0 {
            self.row_offset(self.height - 1)
        } else {
            self.origin
        };
        Self {
            origin,
            stride: -self.stride,
            ..self
        }
    }

    /// Exclusive view of the pixels inside `r`.
    pub fn sub_view_mut(&mut self, r: Rect) -> Result<PixelBufMut<'_>> {
        let (origin, width, height) = self.sub_layout(r)?;
        Ok(PixelBufMut {
            data: &mut *self.data,
            format: self.format,
            width,
            height,
            stride: self.stride,
            origin,
        })
    }

    /// Move `len` bytes inside the buffer, handling overlap.
    pub(crate) fn move_bytes(&mut self, from: (u32, usize), to: (u32, usize), len: usize) {
        let src = self.row_offset(from.0) + from.1;
        let dst = self.row_offset(to.0) + to.1;
        self.data.copy_within(src..src + len, dst);
    }

    /// Set every byte of every row to `value`.
    pub fn clear(&mut self, value: u8) {
        for y in 0..self.height {
            self.row_mut(y).fill(value);
        }
    }
}

// ============================================================================
// PixelImage
// ============================================================================

/// Owned, top-down pixel buffer with a 4-byte aligned stride.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelImage {
    data: Vec<u8>,
    format: PixelFormat,
    width: u32,
    height: u32,
    stride: i32,
}

impl PixelImage {
    /// Zero-filled image of `height * aligned_stride` bytes.
    pub fn new(format: PixelFormat, width: u32, height: u32) -> Self {
        let stride = format.aligned_stride(width);
        Self {
            data: vec![0; stride * height as usize],
            format,
            width,
            height,
            stride: stride as i32,
        }
    }

    /// Take ownership of existing bytes laid out top-down with `stride`.
    pub fn from_vec(
        data: Vec<u8>,
        format: PixelFormat,
        width: u32,
        height: u32,
        stride: u32,
    ) -> Result<Self> {
        let stride = i32::try_from(stride)
            .map_err(|_| RasterError::InvalidArgument(format!("stride {} too large", stride)))?;
        check_layout(data.len(), format.row_bytes(width), height, stride, 0)?;
        Ok(Self {
            data,
            format,
            width,
            height,
            stride,
        })
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn stride(&self) -> i32 {
        self.stride
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn view(&self) -> PixelBuf<'_> {
        PixelBuf {
            data: &self.data,
            format: self.format,
            width: self.width,
            height: self.height,
            stride: self.stride,
            origin: 0,
        }
    }

    pub fn view_mut(&mut self) -> PixelBufMut<'_> {
        PixelBufMut {
            data: &mut self.data,
            format: self.format,
            width: self.width,
            height: self.height,
            stride: self.stride,
            origin: 0,
        }
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> u32 {
        self.view().pixel(x, y)
    }
}

// ============================================================================
// Tests
// ============================================================================
