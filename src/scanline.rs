//! Binary span lists: the rasterized form of every clip shape and drawing
//! primitive.
//!
//! A primitive is turned into a complete [`SpanList`] before any pixel or
//! stencil byte is touched. Spans carry no coverage, only on/off runs
//! `[x0, x1)` on row `y`, already clipped to the target.
//!
//! Sources:
//!
//! - rectangles and regions, copied exactly;
//! - trapezoids, sampled at pixel centres (`(x + 0.5, y + 0.5)` inside the
//!   half-open trapezoid);
//! - 1, 4 and 8 bit coverage bitmaps, where any non-zero value covers;
//! - thin lines, walked one pixel per major-axis step with the final pixel
//!   left out so joined segments do not hit their shared point twice.

use crate::basics::{iceil, ifloor, Point, PointD, Rect};
use crate::error::{RasterError, Result};
use crate::region::Region;
use crate::tesselator::Trapezoid;

// ============================================================================
// Span
// ============================================================================

/// A run of covered pixels `[x0, x1)` on row `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub y: i32,
    pub x0: i32,
    pub x1: i32,
}

impl Span {
    #[inline]
    pub fn len(&self) -> usize {
        (self.x1 - self.x0) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x1 <= self.x0
    }
}

// ============================================================================
// Coverage bitmaps
// ============================================================================

/// Bits per coverage sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageDepth {
    /// 1 bit, most significant bit first.
    A1,
    /// 4 bits, high nibble first.
    A4,
    /// 8 bits.
    A8,
}

impl CoverageDepth {
    #[inline]
    pub fn bits(self) -> u32 {
        match self {
            CoverageDepth::A1 => 1,
            CoverageDepth::A4 => 4,
            CoverageDepth::A8 => 8,
        }
    }
}

/// Borrowed coverage bitmap with a byte stride.
#[derive(Debug, Clone, Copy)]
pub struct Coverage<'a> {
    data: &'a [u8],
    depth: CoverageDepth,
    width: u32,
    height: u32,
    stride: usize,
}

impl<'a> Coverage<'a> {
    pub fn new(
        data: &'a [u8],
        depth: CoverageDepth,
        width: u32,
        height: u32,
        stride: usize,
    ) -> Result<Self> {
        let row_bytes = (width as usize * depth.bits() as usize + 7) / 8;
        if stride < row_bytes {
            return Err(RasterError::InvalidArgument(format!(
                "coverage stride {} is shorter than a {} byte row",
                stride, row_bytes
            )));
        }
        let needed = if height == 0 {
            0
        } else {
            (height as usize - 1) * stride + row_bytes
        };
        if data.len() < needed {
            return Err(RasterError::BufferTooSmall {
                needed,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            depth,
            width,
            height,
            stride,
        })
    }

    #[inline]
    pub fn depth(&self) -> CoverageDepth {
        self.depth
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Coverage sample at `(x, y)` scaled to `0..=255`.
    #[inline]
    pub fn value(&self, x: u32, y: u32) -> u8 {
        let row = &self.data[y as usize * self.stride..];
        let x = x as usize;
        match self.depth {
            CoverageDepth::A1 => {
                if row[x / 8] & (0x80 >> (x % 8)) != 0 {
                    0xff
                } else {
                    0
                }
            }
            CoverageDepth::A4 => {
                let byte = row[x / 2];
                let nibble = if x % 2 == 0 { byte >> 4 } else { byte & 0x0f };
                nibble * 0x11
            }
            CoverageDepth::A8 => row[x],
        }
    }
}

// ============================================================================
// SpanList
// ============================================================================

/// Spans of one primitive, clipped to the target bounds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpanList {
    spans: Vec<Span>,
}

impl SpanList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.spans.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Span> {
        self.spans.iter()
    }

    /// Total number of covered pixels.
    pub fn pixel_count(&self) -> usize {
        self.spans.iter().map(Span::len).sum()
    }

    /// True if some span covers `(x, y)`.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.spans
            .iter()
            .any(|s| s.y == y && x >= s.x0 && x < s.x1)
    }

    /// Add `[x0, x1)` on row `y`, clipped to `clip`.
    #[inline]
    pub fn push(&mut self, y: i32, x0: i32, x1: i32, clip: Rect) {
        if y < clip.top || y >= clip.bottom {
            return;
        }
        let x0 = x0.max(clip.left);
        let x1 = x1.min(clip.right);
        if x1 > x0 {
            self.spans.push(Span { y, x0, x1 });
        }
    }

    pub fn add_rect(&mut self, r: Rect, clip: Rect) {
        let Some(r) = r.intersect(&clip) else {
            return;
        };
        for y in r.top..r.bottom {
            self.spans.push(Span {
                y,
                x0: r.left,
                x1: r.right,
            });
        }
    }

    /// Rectangles may overlap; pixels inside several are listed once per
    /// rectangle.
    pub fn add_rects(&mut self, rects: &[Rect], clip: Rect) {
        for r in rects {
            self.add_rect(*r, clip);
        }
    }

    /// Region rectangles are disjoint, so every pixel is listed once.
    pub fn add_region(&mut self, region: &Region, clip: Rect) {
        self.add_rects(region.rects(), clip);
    }

    /// Sample trapezoids at pixel centres.
    pub fn add_trapezoids(&mut self, traps: &[Trapezoid], clip: Rect) {
        for t in traps {
            let y_start = iceil(t.top - 0.5).max(clip.top);
            let y_end = iceil(t.bottom - 0.5).min(clip.bottom);
            for y in y_start..y_end {
                let cy = f64::from(y) + 0.5;
                let x0 = iceil(t.left_at(cy) - 0.5);
                let x1 = iceil(t.right_at(cy) - 0.5);
                self.push(y, x0, x1, clip);
            }
        }
    }

    /// Non-zero samples of `coverage` placed with its origin at `dest`.
    pub fn add_coverage(&mut self, coverage: &Coverage<'_>, dest: Point, clip: Rect) {
        for row in 0..coverage.height() {
            let y = dest.y + row as i32;
            if y < clip.top || y >= clip.bottom {
                continue;
            }
            let mut run_start: Option<u32> = None;
            for col in 0..=coverage.width() {
                let on = col < coverage.width() && coverage.value(col, row) != 0;
                match (on, run_start) {
                    (true, None) => run_start = Some(col),
                    (false, Some(start)) => {
                        self.push(y, dest.x + start as i32, dest.x + col as i32, clip);
                        run_start = None;
                    }
                    _ => {}
                }
            }
        }
    }

    /// One-pixel line from `a` towards `b`, excluding the pixel at `b`.
    ///
    /// Only the steps that can land inside `clip` are walked.
    pub fn add_thin_line(&mut self, a: PointD, b: PointD, clip: Rect) {
        if clip.is_empty() {
            return;
        }
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        let steps = dx.abs().max(dy.abs()).ceil();
        if !steps.is_finite() || steps < 1.0 {
            return;
        }
        let Some((t0, t1)) = visible_range(a, dx, dy, clip) else {
            return;
        };
        let n = steps as i64;
        let first = ((t0 * steps).floor() as i64).max(0);
        let end = ((t1 * steps).ceil() as i64).saturating_add(1).min(n);
        let mut last: Option<(i32, i32)> = None;
        for i in first..end {
            let t = i as f64 / steps;
            let px = ifloor(a.x + dx * t);
            let py = ifloor(a.y + dy * t);
            if last == Some((px, py)) {
                continue;
            }
            last = Some((px, py));
            self.push(py, px, px + 1, clip);
        }
    }

    /// Clip every span to `r`.
    pub fn clip_to(&mut self, r: Rect) {
        self.spans.retain_mut(|s| {
            if s.y < r.top || s.y >= r.bottom {
                return false;
            }
            s.x0 = s.x0.max(r.left);
            s.x1 = s.x1.min(r.right);
            s.x1 > s.x0
        });
    }

    /// Move every span by `(dx, dy)`.
    pub fn translate(&mut self, dx: i32, dy: i32) {
        for s in &mut self.spans {
            s.y += dy;
            s.x0 += dx;
            s.x1 += dx;
        }
    }

    /// Bounding box of every span, `None` when empty.
    pub fn bounds(&self) -> Option<Rect> {
        let first = self.spans.first()?;
        let init = Rect::new(first.x0, first.y, first.x1, first.y + 1);
        Some(self.spans.iter().fold(init, |acc, s| {
            acc.unite(&Rect::new(s.x0, s.y, s.x1, s.y + 1))
        }))
    }
}

impl<'a> IntoIterator for &'a SpanList {
    type Item = &'a Span;
    type IntoIter = std::slice::Iter<'a, Span>;

    fn into_iter(self) -> Self::IntoIter {
        self.spans.iter()
    }
}

/// Parameter range `[t0, t1]` of `a + t * (dx, dy)`, `t` in `0..=1`, that
/// lies within `clip` grown by one pixel on every side.
fn visible_range(a: PointD, dx: f64, dy: f64, clip: Rect) -> Option<(f64, f64)> {
    let mut t0 = 0.0f64;
    let mut t1 = 1.0f64;
    let edges = [
        (-dx, a.x - (f64::from(clip.left) - 1.0)),
        (dx, f64::from(clip.right) + 1.0 - a.x),
        (-dy, a.y - (f64::from(clip.top) - 1.0)),
        (dy, f64::from(clip.bottom) + 1.0 - a.y),
    ];
    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }
    Some((t0, t1))
}

// ============================================================================
// Tests
// ============================================================================
