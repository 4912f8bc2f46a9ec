//! Foundation types shared by every module: half-open integer rectangles,
//! points, and the polygon fill rule.

// ============================================================================
// Rounding
// ============================================================================

/// Floor a double toward negative infinity.
#[inline]
pub fn ifloor(v: f64) -> i32 {
    v.floor() as i32
}

/// Ceil a double toward positive infinity.
#[inline]
pub fn iceil(v: f64) -> i32 {
    v.ceil() as i32
}

// ============================================================================
// Rect
// ============================================================================

/// A half-open integer rectangle `[left, right) x [top, bottom)`.
///
/// Field order matches the rectangle ABI used by the wire protocol, so a
/// `&[Rect]` can be handed across as four packed `i32`s per entry. A
/// rectangle whose opposite edges are equal is empty.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Build from an origin and a size.
    pub const fn from_xywh(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(x, y, x.saturating_add(width), y.saturating_add(height))
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// True if the rectangle covers no pixel. Inverted rectangles count as
    /// empty too.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    /// True if `right >= left` and `bottom >= top`.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.right >= self.left && self.bottom >= self.top
    }

    /// Half-open point test.
    #[inline]
    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    /// True if `other` lies entirely inside `self`.
    #[inline]
    pub fn contains(&self, other: &Rect) -> bool {
        self.left <= other.left
            && self.top <= other.top
            && self.right >= other.right
            && self.bottom >= other.bottom
    }

    /// True if the two rectangles share at least one pixel.
    #[inline]
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.right > other.left
            && self.left < other.right
            && self.bottom > other.top
            && self.top < other.bottom
    }

    /// Intersection; `None` when it would be empty.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let r = Rect::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        if r.is_empty() {
            None
        } else {
            Some(r)
        }
    }

    /// Bounding box of both rectangles.
    pub fn unite(&self, other: &Rect) -> Rect {
        Rect::new(
            self.left.min(other.left),
            self.top.min(other.top),
            self.right.max(other.right),
            self.bottom.max(other.bottom),
        )
    }

    pub fn translate(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(
            self.left.saturating_add(dx),
            self.top.saturating_add(dy),
            self.right.saturating_add(dx),
            self.bottom.saturating_add(dy),
        )
    }
}

// ============================================================================
// Points
// ============================================================================

/// Integer pixel position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Sub-pixel position used by paths and the tesselator.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointD {
    pub x: f64,
    pub y: f64,
}

impl PointD {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

// ============================================================================
// Fill rule
// ============================================================================

/// Winding rule used when filling a multi-contour polygon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillRule {
    /// Inside when the winding number is odd.
    #[default]
    EvenOdd,
    /// Inside when the winding number is non-zero.
    NonZero,
}

impl FillRule {
    #[inline]
    pub fn is_inside(self, winding: i32) -> bool {
        match self {
            FillRule::EvenOdd => winding & 1 != 0,
            FillRule::NonZero => winding != 0,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_new_and_size() {
        let r = Rect::new(10, 20, 30, 45);
        assert_eq!(r.width(), 20);
        assert_eq!(r.height(), 25);
        assert!(!r.is_empty());
        assert_eq!(Rect::from_xywh(10, 20, 20, 25), r);
    }

    #[test]
    fn test_rect_arithmetic_saturates() {
        let r = Rect::from_xywh(i32::MAX - 1, 0, 10, 2);
        assert_eq!(r.right, i32::MAX);
        assert_eq!(r.width(), 1);
        let moved = Rect::new(-4, -4, 4, 4).translate(i32::MIN, i32::MAX);
        assert_eq!(moved, Rect::new(i32::MIN, i32::MAX - 4, i32::MIN + 4, i32::MAX));
    }

    #[test]
    fn test_rect_empty_edges() {
        assert!(Rect::new(5, 5, 5, 10).is_empty());
        assert!(Rect::new(5, 5, 10, 5).is_empty());
        assert!(Rect::new(10, 5, 5, 10).is_empty());
        assert!(!Rect::new(10, 5, 5, 10).is_valid());
    }

    #[test]
    fn test_rect_half_open_point() {
        let r = Rect::new(0, 0, 10, 10);
        assert!(r.contains_point(0, 0));
        assert!(r.contains_point(9, 9));
        assert!(!r.contains_point(10, 5));
        assert!(!r.contains_point(5, 10));
    }

    #[test]
    fn test_rect_intersect() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(5, 5, 15, 15);
        assert_eq!(a.intersect(&b), Some(Rect::new(5, 5, 10, 10)));
        // Touching edges share no pixel.
        let c = Rect::new(10, 0, 20, 10);
        assert_eq!(a.intersect(&c), None);
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_rect_unite_and_contains() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(5, 5, 15, 15);
        let u = a.unite(&b);
        assert_eq!(u, Rect::new(0, 0, 15, 15));
        assert!(u.contains(&a));
        assert!(u.contains(&b));
        assert!(!a.contains(&b));
    }

    #[test]
    fn test_rect_translate() {
        assert_eq!(
            Rect::new(1, 2, 3, 4).translate(-1, 10),
            Rect::new(0, 12, 2, 14)
        );
    }

    #[test]
    fn test_fill_rule_inside() {
        assert!(FillRule::EvenOdd.is_inside(1));
        assert!(!FillRule::EvenOdd.is_inside(2));
        assert!(FillRule::NonZero.is_inside(2));
        assert!(FillRule::NonZero.is_inside(-1));
        assert!(!FillRule::NonZero.is_inside(0));
        assert_eq!(FillRule::default(), FillRule::EvenOdd);
    }
}
