//! Region set algebra over band-normalized rectangle lists.
//!
//! A [`Region`] stores its area as y-x banded rectangles: the list is
//! grouped into bands of rectangles that share the same `[top, bottom)`,
//! bands are sorted top to bottom and never overlap, and inside a band the
//! rectangles are sorted left to right with a gap between neighbours.
//! Vertically adjacent bands with identical x-spans are always merged, so
//! two regions covering the same pixels have identical rectangle lists and
//! equality is plain list comparison.
//!
//! All set operations run a y-synchronized sweep over both operands (the
//! same two-pointer walk used by scanline boolean algebra) and rebuild the
//! band list in a single pass.

use core::fmt;

use bitflags::bitflags;

use crate::basics::Rect;

bitflags! {
    /// Relationship flags returned by [`Region::classify`].
    ///
    /// `LEFT_EXCLUSIVE` means the left operand has area the right one lacks,
    /// `RIGHT_EXCLUSIVE` the converse, and `SHARED` that they overlap.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RegionTest: u32 {
        const LEFT_EXCLUSIVE = 1 << 0;
        const RIGHT_EXCLUSIVE = 1 << 1;
        const SHARED = 1 << 2;
        const ALL = Self::LEFT_EXCLUSIVE.bits()
            | Self::RIGHT_EXCLUSIVE.bits()
            | Self::SHARED.bits();
    }
}

// ============================================================================
// Region
// ============================================================================

/// A set of pixels stored as canonical banded rectangles plus cached extents.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Region {
    rects: Vec<Rect>,
    extents: Rect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SetOp {
    Union,
    Intersect,
    Subtract,
    Xor,
}

impl SetOp {
    #[inline]
    fn keep(self, in_a: bool, in_b: bool) -> bool {
        match self {
            SetOp::Union => in_a || in_b,
            SetOp::Intersect => in_a && in_b,
            SetOp::Subtract => in_a && !in_b,
            SetOp::Xor => in_a != in_b,
        }
    }
}

impl Region {
    /// Create an empty region.
    pub fn new() -> Self {
        Self::default()
    }

    /// Region covering a single rectangle. Empty rectangles give an empty
    /// region.
    pub fn from_rect(r: Rect) -> Self {
        if r.is_empty() {
            return Self::new();
        }
        Self {
            rects: vec![r],
            extents: r,
        }
    }

    /// Union of an arbitrary, possibly overlapping, rectangle list.
    pub fn from_rects(rects: &[Rect]) -> Self {
        let mut region = Self::new();
        for r in rects {
            region.union_rect(*r);
        }
        region
    }

    /// Make the region empty, keeping its allocation.
    pub fn clear(&mut self) {
        self.rects.clear();
        self.extents = Rect::default();
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Bounding box of the region; all zero when empty.
    #[inline]
    pub fn extents(&self) -> Rect {
        self.extents
    }

    #[inline]
    pub fn rect_count(&self) -> usize {
        self.rects.len()
    }

    /// The canonical rectangle list.
    #[inline]
    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    /// Owned copy of the rectangle list.
    pub fn to_rects(&self) -> Vec<Rect> {
        self.rects.clone()
    }

    /// Copy up to `out.len()` rectangles into `out`, returning how many
    /// slots were written.
    ///
    /// When the region holds more rectangles than fit, every rectangle past
    /// the last slot is folded into that slot's bounding box instead of
    /// being dropped, so the output may cover pixels the region does not.
    pub fn ret_rects(&self, out: &mut [Rect]) -> usize {
        let n = self.rects.len();
        let count = n.min(out.len());
        out[..count].copy_from_slice(&self.rects[..count]);

        if count != 0 && count != n {
            let last = &mut out[count - 1];
            for r in &self.rects[count..] {
                *last = last.unite(r);
            }
        }
        count
    }

    // ------------------------------------------------------------------------
    // Set operations
    // ------------------------------------------------------------------------

    pub fn union(&mut self, other: &Region) {
        *self = combine(&self.rects, &other.rects, SetOp::Union);
    }

    pub fn intersect(&mut self, other: &Region) {
        *self = combine(&self.rects, &other.rects, SetOp::Intersect);
    }

    pub fn subtract(&mut self, other: &Region) {
        *self = combine(&self.rects, &other.rects, SetOp::Subtract);
    }

    /// Symmetric difference, `(self ∪ other) − (self ∩ other)`.
    pub fn xor(&mut self, other: &Region) {
        *self = combine(&self.rects, &other.rects, SetOp::Xor);
    }

    pub fn union_rect(&mut self, r: Rect) {
        if r.is_empty() {
            return;
        }
        *self = combine(&self.rects, &[r], SetOp::Union);
    }

    pub fn intersect_rect(&mut self, r: Rect) {
        if r.is_empty() {
            self.clear();
            return;
        }
        *self = combine(&self.rects, &[r], SetOp::Intersect);
    }

    pub fn subtract_rect(&mut self, r: Rect) {
        if r.is_empty() {
            return;
        }
        *self = combine(&self.rects, &[r], SetOp::Subtract);
    }

    /// Translate every rectangle by `(dx, dy)`.
    pub fn offset(&mut self, dx: i32, dy: i32) {
        if self.is_empty() {
            return;
        }
        for r in &mut self.rects {
            *r = r.translate(dx, dy);
        }
        self.extents = self.extents.translate(dx, dy);
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        if !self.extents.contains_point(x, y) {
            return false;
        }
        for r in &self.rects {
            if r.top > y {
                break;
            }
            if r.contains_point(x, y) {
                return true;
            }
        }
        false
    }

    /// True if the two extents overlap. Cheaper than, and implied by,
    /// [`Region::intersects`].
    pub fn bounds_intersects(&self, other: &Region) -> bool {
        !self.is_empty() && !other.is_empty() && self.extents.overlaps(&other.extents)
    }

    /// True if the regions share at least one pixel.
    pub fn intersects(&self, other: &Region) -> bool {
        if !self.bounds_intersects(other) {
            return false;
        }
        !self.classify(other, RegionTest::SHARED).is_empty()
    }

    /// True if every pixel of `other` is also in `self`.
    pub fn contains(&self, other: &Region) -> bool {
        self.classify(other, RegionTest::RIGHT_EXCLUSIVE).is_empty()
    }

    /// Classify how `self` (left) and `other` (right) relate.
    ///
    /// Only the flags present in `query` are computed and returned; an empty
    /// query means [`RegionTest::ALL`]. The general case stops scanning as
    /// soon as every requested flag is known.
    pub fn classify(&self, other: &Region, query: RegionTest) -> RegionTest {
        let query = if query.is_empty() {
            RegionTest::ALL
        } else {
            query & RegionTest::ALL
        };
        let mut res = RegionTest::empty();

        if self.is_empty() || other.is_empty() || !self.extents.overlaps(&other.extents) {
            if !self.is_empty() {
                res |= RegionTest::LEFT_EXCLUSIVE;
            }
            if !other.is_empty() {
                res |= RegionTest::RIGHT_EXCLUSIVE;
            }
            return res & query;
        }

        let left_single = self.rects.len() == 1;
        let right_single = other.rects.len() == 1;

        if left_single && right_single {
            res |= RegionTest::SHARED;
            if !self.extents.contains(&other.extents) {
                res |= RegionTest::RIGHT_EXCLUSIVE;
            }
            if !other.extents.contains(&self.extents) {
                res |= RegionTest::LEFT_EXCLUSIVE;
            }
            res & query
        } else if right_single && other.extents.contains(&self.extents) {
            // A multi-rect region never fills its own extents, so the
            // covering rectangle always has area of its own.
            (RegionTest::SHARED | RegionTest::RIGHT_EXCLUSIVE) & query
        } else if left_single && self.extents.contains(&other.extents) {
            (RegionTest::SHARED | RegionTest::LEFT_EXCLUSIVE) & query
        } else if core::ptr::eq(self, other) {
            RegionTest::SHARED & query
        } else {
            classify_bands(&self.rects, &other.rects, query)
        }
    }

    /// Check every band invariant and the cached extents.
    pub fn is_valid(&self) -> bool {
        if self.rects.is_empty() {
            return self.extents == Rect::default();
        }
        if self.rects.iter().any(|r| r.is_empty()) {
            return false;
        }
        if compute_extents(&self.rects) != self.extents {
            return false;
        }

        let mut prev_band: Option<(usize, usize)> = None;
        let mut start = 0;
        while start < self.rects.len() {
            let end = band_end(&self.rects, start);
            let band = &self.rects[start..end];
            let (top, bottom) = (band[0].top, band[0].bottom);
            if band.iter().any(|r| r.bottom != bottom) {
                return false;
            }
            if band.windows(2).any(|w| w[0].right >= w[1].left) {
                return false;
            }
            if let Some((ps, pe)) = prev_band {
                let prev = &self.rects[ps..pe];
                if prev[0].bottom > top {
                    return false;
                }
                if prev[0].bottom == top && same_spans(prev, band) {
                    return false;
                }
            }
            prev_band = Some((start, end));
            start = end;
        }
        true
    }

    /// Log the rectangle list at debug level, one line per rectangle.
    pub fn dump(&self, prefix: &str) {
        for line in self.to_string().lines() {
            log::debug!("{}{}", prefix, line);
        }
    }
}

impl From<Rect> for Region {
    fn from(r: Rect) -> Self {
        Region::from_rect(r)
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("extents", &self.extents)
            .field("rects", &self.rects)
            .finish()
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "REGION: EMPTY");
        }
        let e = self.extents;
        writeln!(
            f,
            "REGION: num {} bounds ({}, {}, {}, {})",
            self.rects.len(),
            e.left,
            e.top,
            e.right,
            e.bottom
        )?;
        for r in &self.rects {
            writeln!(
                f,
                "  {:12} {:12} {:12} {:12}",
                r.left, r.top, r.right, r.bottom
            )?;
        }
        Ok(())
    }
}

// ============================================================================
// Band helpers
// ============================================================================

/// Index one past the last rectangle of the band starting at `start`.
#[inline]
fn band_end(rects: &[Rect], start: usize) -> usize {
    let top = rects[start].top;
    let mut end = start + 1;
    while end < rects.len() && rects[end].top == top {
        end += 1;
    }
    end
}

fn same_spans(a: &[Rect], b: &[Rect]) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b)
            .all(|(p, q)| p.left == q.left && p.right == q.right)
}

fn compute_extents(rects: &[Rect]) -> Rect {
    match (rects.first(), rects.last()) {
        (Some(first), Some(last)) => {
            let mut e = Rect::new(first.left, first.top, first.right, last.bottom);
            for r in rects {
                e.left = e.left.min(r.left);
                e.right = e.right.max(r.right);
            }
            e
        }
        _ => Rect::default(),
    }
}

/// The band of `rects` covering scanline `y`, advancing `cursor` past bands
/// that end at or above it. Empty when no band covers `y`.
fn band_at<'r>(rects: &'r [Rect], cursor: &mut usize, y: i32) -> &'r [Rect] {
    while *cursor < rects.len() && rects[*cursor].bottom <= y {
        *cursor = band_end(rects, *cursor);
    }
    if *cursor < rects.len() && rects[*cursor].top <= y {
        &rects[*cursor..band_end(rects, *cursor)]
    } else {
        &[]
    }
}

// ============================================================================
// Set operation sweep
// ============================================================================

/// Accumulates output bands and merges a new band into the previous one
/// when they touch vertically and carry the same spans.
struct BandWriter {
    rects: Vec<Rect>,
    last_band: Option<usize>,
}

impl BandWriter {
    fn new(capacity: usize) -> Self {
        Self {
            rects: Vec::with_capacity(capacity),
            last_band: None,
        }
    }

    fn push_band(&mut self, top: i32, bottom: i32, spans: &[(i32, i32)]) {
        if spans.is_empty() {
            return;
        }
        if let Some(start) = self.last_band {
            let prev = &mut self.rects[start..];
            let mergeable = prev[0].bottom == top
                && prev.len() == spans.len()
                && prev
                    .iter()
                    .zip(spans)
                    .all(|(r, &(l, rt))| r.left == l && r.right == rt);
            if mergeable {
                for r in prev {
                    r.bottom = bottom;
                }
                return;
            }
        }
        self.last_band = Some(self.rects.len());
        self.rects
            .extend(spans.iter().map(|&(l, r)| Rect::new(l, top, r, bottom)));
    }

    fn finish(self) -> Region {
        let extents = compute_extents(&self.rects);
        Region {
            rects: self.rects,
            extents,
        }
    }
}

/// Combine the x-spans of one slab. Both inputs are sorted and gap
/// separated; touching output spans are joined.
fn merge_spans(
    a: &[Rect],
    b: &[Rect],
    op: SetOp,
    xs: &mut Vec<i32>,
    out: &mut Vec<(i32, i32)>,
) {
    xs.clear();
    for r in a.iter().chain(b) {
        xs.push(r.left);
        xs.push(r.right);
    }
    xs.sort_unstable();
    xs.dedup();

    let (mut i, mut j) = (0, 0);
    for w in xs.windows(2) {
        let (x0, x1) = (w[0], w[1]);
        while i < a.len() && a[i].right <= x0 {
            i += 1;
        }
        while j < b.len() && b[j].right <= x0 {
            j += 1;
        }
        let in_a = i < a.len() && a[i].left <= x0;
        let in_b = j < b.len() && b[j].left <= x0;
        if op.keep(in_a, in_b) {
            match out.last_mut() {
                Some(last) if last.1 == x0 => last.1 = x1,
                _ => out.push((x0, x1)),
            }
        }
    }
}

fn combine(a: &[Rect], b: &[Rect], op: SetOp) -> Region {
    let mut ys: Vec<i32> = Vec::with_capacity((a.len() + b.len()) * 2);
    for r in a.iter().chain(b) {
        ys.push(r.top);
        ys.push(r.bottom);
    }
    ys.sort_unstable();
    ys.dedup();

    let mut writer = BandWriter::new(a.len() + b.len());
    let mut xs = Vec::new();
    let mut spans = Vec::new();
    let (mut ca, mut cb) = (0, 0);

    for w in ys.windows(2) {
        let (y0, y1) = (w[0], w[1]);
        let band_a = band_at(a, &mut ca, y0);
        let band_b = band_at(b, &mut cb, y0);
        if band_a.is_empty() && band_b.is_empty() {
            continue;
        }
        spans.clear();
        merge_spans(band_a, band_b, op, &mut xs, &mut spans);
        writer.push_band(y0, y1, &spans);
    }
    writer.finish()
}

// ============================================================================
// Classification sweep
// ============================================================================

/// Compare one pair of y-overlapping bands.
fn classify_band(query: RegionTest, mut res: RegionTest, b1: &[Rect], b2: &[Rect]) -> RegionTest {
    let (mut i, mut j) = (0, 0);
    loop {
        let (r1, r2) = (b1[i], b2[j]);
        let x1 = r1.left.max(r2.left);
        let x2 = r1.right.min(r2.right);

        if x1 < x2 {
            res |= RegionTest::SHARED;
            if r1.left < r2.left || r1.right > r2.right {
                res |= RegionTest::LEFT_EXCLUSIVE;
            }
            if r2.left < r1.left || r2.right > r1.right {
                res |= RegionTest::RIGHT_EXCLUSIVE;
            }
        } else if r1.left < r2.left {
            res |= RegionTest::LEFT_EXCLUSIVE;
        } else {
            res |= RegionTest::RIGHT_EXCLUSIVE;
        }

        if res.contains(query) {
            return res;
        }

        // The rectangle with the leftmost right edge is done; the other may
        // still overlap the next one on the opposite side.
        if r1.right == x2 {
            i += 1;
        }
        if r2.right == x2 {
            j += 1;
        }
        if i == b1.len() || j == b2.len() {
            break;
        }
    }

    if i != b1.len() {
        res |= RegionTest::LEFT_EXCLUSIVE;
    } else if j != b2.len() {
        res |= RegionTest::RIGHT_EXCLUSIVE;
    }
    res
}

/// Band sweep for two non-empty regions with overlapping extents.
fn classify_bands(r1: &[Rect], r2: &[Rect], query: RegionTest) -> RegionTest {
    let mut res = RegionTest::empty();
    let (mut i1, mut i2) = (0, 0);

    // In a non-overlapping band `ybot` is the bottom of the last shared
    // band and clips the top of the lone band; in an overlapping band it is
    // the bottom of the shared y-range.
    let mut ybot = r1[0].top.min(r2[0].top);

    loop {
        let e1 = band_end(r1, i1);
        let e2 = band_end(r2, i2);
        let r1y1 = r1[i1].top;
        let r2y1 = r2[i2].top;

        let ytop = if r1y1 < r2y1 {
            let top = r1y1.max(ybot);
            let bot = r1[i1].bottom.min(r2y1);
            if top < bot {
                res |= RegionTest::LEFT_EXCLUSIVE;
                if res.contains(query) {
                    return res & query;
                }
            }
            r2y1
        } else if r2y1 < r1y1 {
            let top = r2y1.max(ybot);
            let bot = r2[i2].bottom.min(r1y1);
            if top < bot {
                res |= RegionTest::RIGHT_EXCLUSIVE;
                if res.contains(query) {
                    return res & query;
                }
            }
            r1y1
        } else {
            r1y1
        };

        ybot = r1[i1].bottom.min(r2[i2].bottom);
        if ybot > ytop {
            res = classify_band(query, res, &r1[i1..e1], &r2[i2..e2]);
            if res.contains(query) {
                return res & query;
            }
        }

        if r1[i1].bottom == ybot {
            i1 = e1;
        }
        if r2[i2].bottom == ybot {
            i2 = e2;
        }
        if i1 == r1.len() || i2 == r2.len() {
            break;
        }
    }

    if i1 != r1.len() {
        res |= RegionTest::LEFT_EXCLUSIVE;
    } else if i2 != r2.len() {
        res |= RegionTest::RIGHT_EXCLUSIVE;
    }
    res & query
}

// ============================================================================
// Tests
// ============================================================================
