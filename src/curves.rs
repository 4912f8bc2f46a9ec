//! Cubic Bezier flattening.
//!
//! Curves are flattened into a fixed number of points by evaluating the
//! cubic polynomial directly, with no adaptive subdivision. For control
//! points `p0..p3` the polynomial is
//!
//! ```text
//! c = 3 (p1 - p0)
//! b = 3 (p2 - p1) - c
//! a = p3 - p0 - c - b
//! B(t) = a t^3 + b t^2 + c t + p0
//! ```
//!
//! A run of `n` points consists of the `n - 2` interior samples at
//! `t = i / (n - 1)` followed by the exact endpoint `p3`; the start point
//! belongs to the preceding segment.

use std::ops::Range;

use crate::basics::PointD;
use crate::error::Result;
use crate::vertex_pool::VertexPool;

// ============================================================================
// CubicBezier
// ============================================================================

/// Cubic Bezier curve in polynomial form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicBezier {
    start: PointD,
    end: PointD,
    a: PointD,
    b: PointD,
    c: PointD,
}

impl CubicBezier {
    pub fn new(p0: PointD, p1: PointD, p2: PointD, p3: PointD) -> Self {
        let cx = 3.0 * (p1.x - p0.x);
        let bx = 3.0 * (p2.x - p1.x) - cx;
        let ax = p3.x - p0.x - cx - bx;

        let cy = 3.0 * (p1.y - p0.y);
        let by = 3.0 * (p2.y - p1.y) - cy;
        let ay = p3.y - p0.y - cy - by;

        Self {
            start: p0,
            end: p3,
            a: PointD::new(ax, ay),
            b: PointD::new(bx, by),
            c: PointD::new(cx, cy),
        }
    }

    #[inline]
    pub fn start(&self) -> PointD {
        self.start
    }

    #[inline]
    pub fn end(&self) -> PointD {
        self.end
    }

    /// Point at parameter `t` in `[0, 1]`.
    #[inline]
    pub fn point_at(&self, t: f64) -> PointD {
        let t2 = t * t;
        let t3 = t2 * t;
        PointD::new(
            self.a.x * t3 + self.b.x * t2 + self.c.x * t + self.start.x,
            self.a.y * t3 + self.b.y * t2 + self.c.y * t + self.start.y,
        )
    }

    /// Write the `num_points - 2` interior samples into `out`.
    pub fn interior_points(&self, num_points: usize, out: &mut [PointD]) {
        debug_assert_eq!(out.len(), num_points.saturating_sub(2));
        let dt = 1.0 / (num_points as f64 - 1.0);
        for (i, p) in out.iter_mut().enumerate() {
            *p = self.point_at((i + 1) as f64 * dt);
        }
    }

    /// Flatten into the pool: interior samples followed by the endpoint.
    /// Returns the slots holding the run.
    pub fn flatten_into(&self, num_points: usize, pool: &mut VertexPool) -> Result<Range<usize>> {
        let num_points = num_points.max(2);
        let range = pool.alloc_n(num_points - 1)?;
        let points = pool.slice_mut(range.clone());
        let (interior, last) = points.split_at_mut(num_points - 2);
        self.interior_points(num_points, interior);
        last[0] = self.end;
        Ok(range)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn curve() -> CubicBezier {
        CubicBezier::new(
            PointD::new(0.0, 0.0),
            PointD::new(0.0, 10.0),
            PointD::new(10.0, 10.0),
            PointD::new(10.0, 0.0),
        )
    }

    #[test]
    fn test_polynomial_endpoints() {
        let c = curve();
        assert_eq!(c.point_at(0.0), PointD::new(0.0, 0.0));
        let p = c.point_at(1.0);
        assert!((p.x - 10.0).abs() < 1e-12);
        assert!(p.y.abs() < 1e-12);
        // Symmetric control polygon peaks at 3/4 of the control height.
        let mid = c.point_at(0.5);
        assert!((mid.x - 5.0).abs() < 1e-12);
        assert!((mid.y - 7.5).abs() < 1e-12);
    }

    #[test]
    fn test_flatten_thirty_points() {
        let mut pool = VertexPool::default();
        let range = curve().flatten_into(30, &mut pool).unwrap();
        assert_eq!(range.len(), 29);
        let pts = pool.slice(range);
        let first = curve().point_at(1.0 / 29.0);
        assert_eq!(pts[0], first);
        assert_eq!(pts[28], PointD::new(10.0, 0.0));
        assert_eq!(pool.capacity(), 40);
    }

    #[test]
    fn test_flatten_straight_curve_is_collinear() {
        let c = CubicBezier::new(
            PointD::new(0.0, 0.0),
            PointD::new(1.0, 1.0),
            PointD::new(2.0, 2.0),
            PointD::new(3.0, 3.0),
        );
        let mut pool = VertexPool::default();
        let range = c.flatten_into(10, &mut pool).unwrap();
        for p in pool.slice(range) {
            assert!((p.x - p.y).abs() < 1e-12);
        }
    }

    #[test]
    fn test_flatten_respects_pool_limit() {
        let mut pool = VertexPool::new(20, Some(10));
        assert!(curve().flatten_into(30, &mut pool).is_err());
        assert_eq!(pool.used(), 0);
    }
}
