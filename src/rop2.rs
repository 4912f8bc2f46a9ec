//! Binary raster operations and the solid, tiled and copy loops built on
//! them.
//!
//! `Rop2` is the 16-entry logic-op table: each entry combines a source word
//! with the destination word. The loops below apply it at 8, 16 and 32 bits
//! per pixel to rectangles of a [`PixelBufMut`].

use crate::basics::{Point, Rect};
use crate::error::{RasterError, Result};
use crate::rendering_buffer::{read_word, write_word, PixelBuf, PixelBufMut};

/// First value of the fixed-function logic-op enumeration; `Rop2` index `i`
/// corresponds to `LOGIC_OP_BASE + i`.
pub const LOGIC_OP_BASE: u32 = 0x1500;

// ============================================================================
// Rop2
// ============================================================================

/// Binary logic operation, in the historical logic-op order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Rop2 {
    Clear = 0,
    And = 1,
    AndReverse = 2,
    #[default]
    Copy = 3,
    AndInverted = 4,
    Noop = 5,
    Xor = 6,
    Or = 7,
    Nor = 8,
    Equiv = 9,
    Invert = 10,
    OrReverse = 11,
    CopyInverted = 12,
    OrInverted = 13,
    Nand = 14,
    Set = 15,
}

impl Rop2 {
    pub const ALL: [Rop2; 16] = [
        Rop2::Clear,
        Rop2::And,
        Rop2::AndReverse,
        Rop2::Copy,
        Rop2::AndInverted,
        Rop2::Noop,
        Rop2::Xor,
        Rop2::Or,
        Rop2::Nor,
        Rop2::Equiv,
        Rop2::Invert,
        Rop2::OrReverse,
        Rop2::CopyInverted,
        Rop2::OrInverted,
        Rop2::Nand,
        Rop2::Set,
    ];

    /// Combine `src` with `dst`. The result is a full word; callers
    /// truncate it to their pixel depth.
    #[inline]
    pub fn apply(self, src: u32, dst: u32) -> u32 {
        match self {
            Rop2::Clear => 0,
            Rop2::And => src & dst,
            Rop2::AndReverse => src & !dst,
            Rop2::Copy => src,
            Rop2::AndInverted => !src & dst,
            Rop2::Noop => dst,
            Rop2::Xor => src ^ dst,
            Rop2::Or => src | dst,
            Rop2::Nor => !(src | dst),
            Rop2::Equiv => !src ^ dst,
            Rop2::Invert => !dst,
            Rop2::OrReverse => src | !dst,
            Rop2::CopyInverted => !src,
            Rop2::OrInverted => !src | dst,
            Rop2::Nand => !(src & dst),
            Rop2::Set => !0,
        }
    }

    #[inline]
    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Option<Rop2> {
        Self::ALL.get(index as usize).copied()
    }

    /// Logic-op enumerant of this operation.
    pub fn logic_op(self) -> u32 {
        LOGIC_OP_BASE + u32::from(self.index())
    }

    /// Inverse of [`Rop2::logic_op`].
    pub fn from_logic_op(op: u32) -> Result<Rop2> {
        op.checked_sub(LOGIC_OP_BASE)
            .and_then(|i| u8::try_from(i).ok())
            .and_then(Rop2::from_index)
            .ok_or_else(|| RasterError::InvalidArgument(format!("logic op {:#x}", op)))
    }

    /// True when the result ignores the destination.
    pub fn is_dest_independent(self) -> bool {
        matches!(
            self,
            Rop2::Clear | Rop2::Copy | Rop2::CopyInverted | Rop2::Set
        )
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn check_depth(bpp: u32) -> Result<u32> {
    match bpp {
        8 | 16 | 32 => Ok(bpp),
        _ => Err(RasterError::UnsupportedFormat(format!(
            "{} bpp raster op",
            bpp
        ))),
    }
}

fn check_same_depth(dest: &PixelBufMut<'_>, other: &PixelBuf<'_>) -> Result<u32> {
    let bpp = check_depth(dest.bits_per_pixel())?;
    if other.bits_per_pixel() != bpp {
        return Err(RasterError::FormatMismatch {
            expected: bpp,
            actual: other.bits_per_pixel(),
        });
    }
    Ok(bpp)
}

/// Clip a blit against its source. A negative source origin shifts the
/// destination; the size is clamped to the source. `None` when nothing is
/// left to copy.
fn clip_to_source(
    src: &PixelBuf<'_>,
    mut src_pos: Point,
    mut dest_pos: Point,
    mut width: i32,
    mut height: i32,
) -> Option<(Point, Point, i32, i32)> {
    if src_pos.x < 0 {
        width = width.saturating_add(src_pos.x);
        dest_pos.x = dest_pos.x.saturating_sub(src_pos.x);
        src_pos.x = 0;
    }
    if src_pos.y < 0 {
        height = height.saturating_add(src_pos.y);
        dest_pos.y = dest_pos.y.saturating_sub(src_pos.y);
        src_pos.y = 0;
    }
    width = width.min((src.width() as i32).saturating_sub(src_pos.x));
    height = height.min((src.height() as i32).saturating_sub(src_pos.y));
    if width <= 0 || height <= 0 {
        None
    } else {
        Some((src_pos, dest_pos, width, height))
    }
}

// ============================================================================
// Solid fill
// ============================================================================

/// Fill `r` with `value`, truncated to the pixel depth.
pub fn fill_rect(dest: &mut PixelBufMut<'_>, r: Rect, value: u32) -> Result<()> {
    fill_rect_rop(dest, r, value, Rop2::Copy)
}

/// Combine `value` into every pixel of `r` with `rop`.
pub fn fill_rect_rop(dest: &mut PixelBufMut<'_>, r: Rect, value: u32, rop: Rop2) -> Result<()> {
    let bpp = check_depth(dest.bits_per_pixel())?;
    dest.check_rect(r)?;
    let (x0, x1) = (r.left as usize, r.right as usize);
    for y in r.top..r.bottom {
        let row = dest.row_mut(y as u32);
        if rop == Rop2::Copy && bpp == 8 {
            row[x0..x1].fill(value as u8);
            continue;
        }
        for x in x0..x1 {
            let d = read_word(row, x, bpp);
            write_word(row, x, bpp, rop.apply(value, d));
        }
    }
    Ok(())
}

// ============================================================================
// Tiled fill
// ============================================================================

/// Fill `r` by repeating `tile`, whose top-left corner is anchored at
/// `offset` in destination coordinates.
pub fn tile_rect(
    dest: &mut PixelBufMut<'_>,
    r: Rect,
    tile: &PixelBuf<'_>,
    offset: Point,
) -> Result<()> {
    tile_rect_rop(dest, r, tile, offset, Rop2::Copy)
}

pub fn tile_rect_rop(
    dest: &mut PixelBufMut<'_>,
    r: Rect,
    tile: &PixelBuf<'_>,
    offset: Point,
    rop: Rop2,
) -> Result<()> {
    let bpp = check_same_depth(dest, tile)?;
    dest.check_rect(r)?;
    if tile.width() == 0 || tile.height() == 0 {
        return Err(RasterError::InvalidArgument("empty tile".into()));
    }
    let (tw, th) = (tile.width() as i32, tile.height() as i32);
    let start_x = (r.left - offset.x).rem_euclid(tw) as usize;
    let mut ty = (r.top - offset.y).rem_euclid(th) as u32;

    for y in r.top..r.bottom {
        let tile_row = tile.row(ty);
        let row = dest.row_mut(y as u32);
        let mut tx = start_x;
        for x in r.left as usize..r.right as usize {
            let s = read_word(tile_row, tx, bpp);
            let d = read_word(row, x, bpp);
            write_word(row, x, bpp, rop.apply(s, d));
            tx += 1;
            if tx == tw as usize {
                tx = 0;
            }
        }
        ty += 1;
        if ty == th as u32 {
            ty = 0;
        }
    }
    Ok(())
}

// ============================================================================
// Blits
// ============================================================================

/// Copy a `width x height` block from `src` at `src_pos` to `dest` at
/// `dest_pos`. The block is clipped to the source first.
pub fn blit(
    dest: &mut PixelBufMut<'_>,
    src: &PixelBuf<'_>,
    src_pos: Point,
    dest_pos: Point,
    width: i32,
    height: i32,
) -> Result<()> {
    let bpp = check_same_depth(dest, src)?;
    let Some((sp, dp, w, h)) = clip_to_source(src, src_pos, dest_pos, width, height) else {
        return Ok(());
    };
    dest.check_rect(Rect::from_xywh(dp.x, dp.y, w, h))?;
    let bytes = w as usize * bpp as usize / 8;
    let (sx, dx) = (
        sp.x as usize * bpp as usize / 8,
        dp.x as usize * bpp as usize / 8,
    );
    for i in 0..h {
        let s = &src.row((sp.y + i) as u32)[sx..sx + bytes];
        dest.row_mut((dp.y + i) as u32)[dx..dx + bytes].copy_from_slice(s);
    }
    Ok(())
}

pub fn blit_rop(
    dest: &mut PixelBufMut<'_>,
    src: &PixelBuf<'_>,
    src_pos: Point,
    dest_pos: Point,
    width: i32,
    height: i32,
    rop: Rop2,
) -> Result<()> {
    let bpp = check_same_depth(dest, src)?;
    let Some((sp, dp, w, h)) = clip_to_source(src, src_pos, dest_pos, width, height) else {
        return Ok(());
    };
    dest.check_rect(Rect::from_xywh(dp.x, dp.y, w, h))?;
    for i in 0..h {
        let src_row = src.row((sp.y + i) as u32);
        let row = dest.row_mut((dp.y + i) as u32);
        for j in 0..w as usize {
            let s = read_word(src_row, sp.x as usize + j, bpp);
            let x = dp.x as usize + j;
            let d = read_word(row, x, bpp);
            write_word(row, x, bpp, rop.apply(s, d));
        }
    }
    Ok(())
}

/// Blit that skips source pixels equal to `key`. At 32 bits only the RGB
/// channels take part in the comparison.
pub fn blit_colorkey(
    dest: &mut PixelBufMut<'_>,
    src: &PixelBuf<'_>,
    src_pos: Point,
    dest_pos: Point,
    width: i32,
    height: i32,
    key: u32,
) -> Result<()> {
    let bpp = check_same_depth(dest, src)?;
    let Some((sp, dp, w, h)) = clip_to_source(src, src_pos, dest_pos, width, height) else {
        return Ok(());
    };
    dest.check_rect(Rect::from_xywh(dp.x, dp.y, w, h))?;
    let compare_mask: u32 = match bpp {
        8 => 0xff,
        16 => 0xffff,
        _ => 0x00ff_ffff,
    };
    let key = key & compare_mask;
    for i in 0..h {
        let src_row = src.row((sp.y + i) as u32);
        let row = dest.row_mut((dp.y + i) as u32);
        for j in 0..w as usize {
            let s = read_word(src_row, sp.x as usize + j, bpp);
            if s & compare_mask != key {
                write_word(row, dp.x as usize + j, bpp, s);
            }
        }
    }
    Ok(())
}

// ============================================================================
// Self copy
// ============================================================================

/// Move a block inside one image. Rows are visited in the order that never
/// reads an already overwritten row.
pub fn copy_rect(
    image: &mut PixelBufMut<'_>,
    src_pos: Point,
    width: i32,
    height: i32,
    dest_pos: Point,
) -> Result<()> {
    let bpp = check_depth(image.bits_per_pixel())?;
    image.check_rect(Rect::from_xywh(src_pos.x, src_pos.y, width, height))?;
    image.check_rect(Rect::from_xywh(dest_pos.x, dest_pos.y, width, height))?;
    if width == 0 || height == 0 {
        return Ok(());
    }
    let px = bpp as usize / 8;
    let len = width as usize * px;
    let (sx, dx) = (src_pos.x as usize * px, dest_pos.x as usize * px);
    let mut move_row = |i: i32| {
        image.move_bytes(
            ((src_pos.y + i) as u32, sx),
            ((dest_pos.y + i) as u32, dx),
            len,
        )
    };
    if dest_pos.y > src_pos.y {
        (0..height).rev().for_each(&mut move_row);
    } else {
        (0..height).for_each(&mut move_row);
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel_format::PixelFormat;
    use crate::rendering_buffer::PixelImage;

    fn image_from(format: PixelFormat, width: u32, height: u32, pixels: &[u32]) -> PixelImage {
        let mut img = PixelImage::new(format, width, height);
        {
            let mut v = img.view_mut();
            for (i, &p) in pixels.iter().enumerate() {
                v.set_pixel(i as u32 % width, i as u32 / width, p);
            }
        }
        img
    }

    fn pixels(img: &PixelImage) -> Vec<u32> {
        let mut out = Vec::new();
        for y in 0..img.height() {
            for x in 0..img.width() {
                out.push(img.pixel(x, y));
            }
        }
        out
    }

    #[test]
    fn test_truth_table() {
        let (s, d) = (0b1100u32, 0b1010u32);
        let expected = [
            0b0000, 0b1000, 0b0100, 0b1100, 0b0010, 0b1010, 0b0110, 0b1110, 0b0001, 0b1001,
            0b0101, 0b1101, 0b0011, 0b1011, 0b0111, 0b1111,
        ];
        for (op, want) in Rop2::ALL.iter().zip(expected) {
            assert_eq!(op.apply(s, d) & 0xf, want, "{:?}", op);
        }
    }

    #[test]
    fn test_logic_op_mapping() {
        assert_eq!(Rop2::Copy.logic_op(), 0x1503);
        assert_eq!(Rop2::from_logic_op(0x150f).unwrap(), Rop2::Set);
        assert!(Rop2::from_logic_op(0x1510).is_err());
        assert!(Rop2::from_logic_op(0x14ff).is_err());
        assert_eq!(Rop2::default(), Rop2::Copy);
        assert!(Rop2::CopyInverted.is_dest_independent());
        assert!(!Rop2::Xor.is_dest_independent());
    }

    #[test]
    fn test_fill_rect_each_depth() {
        for (format, value, want) in [
            (PixelFormat::A8, 0x1234_56ab, 0xab),
            (PixelFormat::X1R5G5B5, 0x1234_5678, 0x5678),
            (PixelFormat::X8R8G8B8, 0x1234_5678, 0x1234_5678),
        ] {
            let mut img = PixelImage::new(format, 3, 3);
            fill_rect(&mut img.view_mut(), Rect::new(1, 0, 3, 2), value).unwrap();
            assert_eq!(img.pixel(0, 0), 0);
            assert_eq!(img.pixel(1, 0), want);
            assert_eq!(img.pixel(2, 1), want);
            assert_eq!(img.pixel(2, 2), 0);
        }
    }

    #[test]
    fn test_fill_rect_rop_xor() {
        let mut img = image_from(PixelFormat::X8R8G8B8, 2, 1, &[0x0f0f, 0xff00]);
        fill_rect_rop(&mut img.view_mut(), Rect::new(0, 0, 2, 1), 0xffff, Rop2::Xor).unwrap();
        assert_eq!(pixels(&img), vec![0xf0f0, 0x00ff]);
    }

    #[test]
    fn test_fill_rect_out_of_bounds() {
        let mut img = PixelImage::new(PixelFormat::A8, 2, 2);
        assert!(matches!(
            fill_rect(&mut img.view_mut(), Rect::new(0, 0, 3, 1), 1),
            Err(RasterError::OutOfBounds { .. })
        ));
        let mut img = PixelImage::new(PixelFormat::R8G8B8, 2, 2);
        assert!(matches!(
            fill_rect(&mut img.view_mut(), Rect::new(0, 0, 1, 1), 1),
            Err(RasterError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_tile_rect_negative_offset_wraps() {
        let tile = image_from(PixelFormat::A8, 2, 2, &[1, 2, 3, 4]);
        let mut img = PixelImage::new(PixelFormat::A8, 4, 3);
        tile_rect(
            &mut img.view_mut(),
            Rect::new(0, 0, 4, 3),
            &tile.view(),
            Point::new(-1, 1),
        )
        .unwrap();
        // (x - offset) mod 2: column 0 reads tile column 1, row 0 reads tile row 1.
        assert_eq!(
            pixels(&img),
            vec![4, 3, 4, 3, 2, 1, 2, 1, 4, 3, 4, 3]
        );
    }

    #[test]
    fn test_tile_rect_rop_16() {
        let tile = image_from(PixelFormat::R5G6B5, 1, 1, &[0x00ff]);
        let mut img = image_from(PixelFormat::R5G6B5, 2, 1, &[0xff00, 0x0f0f]);
        tile_rect_rop(
            &mut img.view_mut(),
            Rect::new(0, 0, 2, 1),
            &tile.view(),
            Point::new(0, 0),
            Rop2::Or,
        )
        .unwrap();
        assert_eq!(pixels(&img), vec![0xffff, 0x0fff]);
    }

    #[test]
    fn test_blit_clips_negative_source() {
        let src = image_from(PixelFormat::X8R8G8B8, 2, 2, &[1, 2, 3, 4]);
        let mut img = PixelImage::new(PixelFormat::X8R8G8B8, 4, 4);
        blit(
            &mut img.view_mut(),
            &src.view(),
            Point::new(-1, -1),
            Point::new(0, 0),
            4,
            4,
        )
        .unwrap();
        // The destination shifts by the clipped amount; size clamps to 2x2.
        assert_eq!(img.pixel(0, 0), 0);
        assert_eq!(img.pixel(1, 1), 1);
        assert_eq!(img.pixel(2, 1), 2);
        assert_eq!(img.pixel(1, 2), 3);
        assert_eq!(img.pixel(2, 2), 4);
        assert_eq!(img.pixel(3, 3), 0);
    }

    #[test]
    fn test_blit_fully_clipped_is_noop() {
        let src = PixelImage::new(PixelFormat::A8, 2, 2);
        let mut img = image_from(PixelFormat::A8, 1, 1, &[9]);
        blit(
            &mut img.view_mut(),
            &src.view(),
            Point::new(5, 0),
            Point::new(0, 0),
            1,
            1,
        )
        .unwrap();
        assert_eq!(img.pixel(0, 0), 9);
    }

    #[test]
    fn test_blit_extreme_positions_fail_cleanly() {
        let src = image_from(PixelFormat::X8R8G8B8, 2, 2, &[1, 2, 3, 4]);
        let mut img = PixelImage::new(PixelFormat::X8R8G8B8, 4, 4);
        let res = blit(
            &mut img.view_mut(),
            &src.view(),
            Point::new(-10, 0),
            Point::new(i32::MAX - 2, 0),
            i32::MAX,
            1,
        );
        assert!(matches!(res, Err(RasterError::OutOfBounds { .. })));
        let res = blit_rop(
            &mut img.view_mut(),
            &src.view(),
            Point::new(0, i32::MIN),
            Point::new(0, 0),
            2,
            i32::MIN,
            Rop2::Xor,
        );
        assert!(res.is_ok());
        assert_eq!(pixels(&img), vec![0; 16]);
    }

    #[test]
    fn test_blit_depth_mismatch() {
        let src = PixelImage::new(PixelFormat::A8, 2, 2);
        let mut img = PixelImage::new(PixelFormat::X8R8G8B8, 2, 2);
        assert_eq!(
            blit(
                &mut img.view_mut(),
                &src.view(),
                Point::new(0, 0),
                Point::new(0, 0),
                1,
                1
            ),
            Err(RasterError::FormatMismatch {
                expected: 32,
                actual: 8
            })
        );
    }

    #[test]
    fn test_blit_rop_and() {
        let src = image_from(PixelFormat::A8, 2, 1, &[0x0f, 0xf0]);
        let mut img = image_from(PixelFormat::A8, 2, 1, &[0xff, 0x3c]);
        blit_rop(
            &mut img.view_mut(),
            &src.view(),
            Point::new(0, 0),
            Point::new(0, 0),
            2,
            1,
            Rop2::And,
        )
        .unwrap();
        assert_eq!(pixels(&img), vec![0x0f, 0x30]);
    }

    #[test]
    fn test_colorkey_ignores_alpha_at_32() {
        let src = image_from(
            PixelFormat::A8R8G8B8,
            3,
            1,
            &[0xff00_ff00, 0x0000_ff00, 0x1234_5678],
        );
        let mut img = image_from(PixelFormat::A8R8G8B8, 3, 1, &[7, 7, 7]);
        blit_colorkey(
            &mut img.view_mut(),
            &src.view(),
            Point::new(0, 0),
            Point::new(0, 0),
            3,
            1,
            0x8800_ff00,
        )
        .unwrap();
        assert_eq!(pixels(&img), vec![7, 7, 0x1234_5678]);
    }

    #[test]
    fn test_colorkey_truncates_at_16() {
        let src = image_from(PixelFormat::X1R5G5B5, 2, 1, &[0x7c00, 0x001f]);
        let mut img = PixelImage::new(PixelFormat::X1R5G5B5, 2, 1);
        blit_colorkey(
            &mut img.view_mut(),
            &src.view(),
            Point::new(0, 0),
            Point::new(0, 0),
            2,
            1,
            0xabcd_7c00,
        )
        .unwrap();
        assert_eq!(pixels(&img), vec![0, 0x001f]);
    }

    #[test]
    fn test_copy_rect_overlapping_down() {
        let mut img = image_from(PixelFormat::A8, 1, 4, &[1, 2, 3, 4]);
        copy_rect(&mut img.view_mut(), Point::new(0, 0), 1, 3, Point::new(0, 1)).unwrap();
        assert_eq!(pixels(&img), vec![1, 1, 2, 3]);
    }

    #[test]
    fn test_copy_rect_overlapping_up() {
        let mut img = image_from(PixelFormat::A8, 1, 4, &[1, 2, 3, 4]);
        copy_rect(&mut img.view_mut(), Point::new(0, 1), 1, 3, Point::new(0, 0)).unwrap();
        assert_eq!(pixels(&img), vec![2, 3, 4, 4]);
    }

    #[test]
    fn test_copy_rect_same_line() {
        let mut img = image_from(PixelFormat::X1R5G5B5, 4, 1, &[1, 2, 3, 4]);
        copy_rect(&mut img.view_mut(), Point::new(0, 0), 3, 1, Point::new(1, 0)).unwrap();
        assert_eq!(pixels(&img), vec![1, 1, 2, 3]);
    }

    #[test]
    fn test_copy_rect_bounds() {
        let mut img = PixelImage::new(PixelFormat::A8, 2, 2);
        assert!(copy_rect(&mut img.view_mut(), Point::new(0, 0), 2, 2, Point::new(1, 0)).is_err());
    }
}
