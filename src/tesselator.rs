//! Polygon tesselation into trapezoids.
//!
//! The tesselator accepts any number of closed contours, which may overlap
//! or self-intersect, and decomposes the area selected by the winding rule
//! into horizontal trapezoids:
//!
//! 1. Every contour edge is collected with its direction (`+1` downward,
//!    `-1` upward). Horizontal edges carry no winding and are dropped.
//! 2. Each pair of edges that crosses strictly inside both of their vertical
//!    extents yields an intersection vertex. The vertex is produced through
//!    the [`Combine`] callback, which allocates it from the caller's pool.
//! 3. The y coordinates of all edge endpoints and intersections split the
//!    plane into slabs. No two edges cross inside a slab, so the edges
//!    crossing it keep one left-to-right order.
//! 4. Within each slab the edges are sorted by their mid-slab x and walked
//!    left to right, accumulating winding; every interval whose winding
//!    satisfies the rule becomes a trapezoid.

use crate::basics::{FillRule, PointD};
use crate::error::Result;
use crate::vertex_pool::VertexPool;

// ============================================================================
// Trapezoid
// ============================================================================

/// Area between two sloped edges and two horizontal lines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trapezoid {
    pub top: f64,
    pub bottom: f64,
    pub top_left: f64,
    pub top_right: f64,
    pub bottom_left: f64,
    pub bottom_right: f64,
}

impl Trapezoid {
    /// x of the left edge at height `y`.
    #[inline]
    pub fn left_at(&self, y: f64) -> f64 {
        lerp_edge(self.top, self.bottom, self.top_left, self.bottom_left, y)
    }

    /// x of the right edge at height `y`.
    #[inline]
    pub fn right_at(&self, y: f64) -> f64 {
        lerp_edge(self.top, self.bottom, self.top_right, self.bottom_right, y)
    }

    pub fn area(&self) -> f64 {
        let top_w = self.top_right - self.top_left;
        let bottom_w = self.bottom_right - self.bottom_left;
        (top_w + bottom_w) * 0.5 * (self.bottom - self.top)
    }
}

#[inline]
fn lerp_edge(y0: f64, y1: f64, x0: f64, x1: f64, y: f64) -> f64 {
    if y1 == y0 {
        x0
    } else {
        x0 + (x1 - x0) * (y - y0) / (y1 - y0)
    }
}

// ============================================================================
// Combine callback
// ============================================================================

/// Source of synthesized intersection vertices.
pub trait Combine {
    /// Materialize a vertex at `at` and return its stored position.
    fn combine(&mut self, at: PointD) -> Result<PointD>;
}

impl Combine for VertexPool {
    fn combine(&mut self, at: PointD) -> Result<PointD> {
        let idx = self.push(at)?;
        Ok(self.get(idx))
    }
}

// ============================================================================
// Tesselator
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct Edge {
    top: PointD,
    bottom: PointD,
    winding: i32,
}

impl Edge {
    fn new(a: PointD, b: PointD) -> Option<Edge> {
        if !(a.x.is_finite() && a.y.is_finite() && b.x.is_finite() && b.y.is_finite()) {
            return None;
        }
        if a.y < b.y {
            Some(Edge {
                top: a,
                bottom: b,
                winding: 1,
            })
        } else if a.y > b.y {
            Some(Edge {
                top: b,
                bottom: a,
                winding: -1,
            })
        } else {
            None
        }
    }

    #[inline]
    fn x_at(&self, y: f64) -> f64 {
        lerp_edge(self.top.y, self.bottom.y, self.top.x, self.bottom.x, y)
    }
}

#[derive(Debug, Clone, Copy)]
struct Crossing {
    mid: f64,
    x_top: f64,
    x_bottom: f64,
    winding: i32,
}

/// Reusable tesselator. Buffers are kept between polygons.
#[derive(Debug, Clone, Default)]
pub struct Tesselator {
    rule: FillRule,
    edges: Vec<Edge>,
    breaks: Vec<f64>,
    crossings: Vec<Crossing>,
    trapezoids: Vec<Trapezoid>,
}

impl Tesselator {
    pub fn new(rule: FillRule) -> Self {
        Self {
            rule,
            ..Self::default()
        }
    }

    #[inline]
    pub fn fill_rule(&self) -> FillRule {
        self.rule
    }

    pub fn set_fill_rule(&mut self, rule: FillRule) {
        self.rule = rule;
    }

    /// Discard edges and output of the previous polygon.
    pub fn begin_polygon(&mut self) {
        self.edges.clear();
        self.breaks.clear();
        self.trapezoids.clear();
    }

    /// Add a closed contour. The last point is joined back to the first.
    pub fn add_contour(&mut self, points: &[PointD]) {
        if points.len() < 2 {
            return;
        }
        let closing = (points[points.len() - 1], points[0]);
        let pairs = points.windows(2).map(|w| (w[0], w[1]));
        for (a, b) in pairs.chain(std::iter::once(closing)) {
            if let Some(edge) = Edge::new(a, b) {
                self.edges.push(edge);
            }
        }
    }

    /// Number of non-horizontal edges collected so far.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Split the collected contours into trapezoids.
    pub fn end_polygon<C: Combine + ?Sized>(&mut self, combine: &mut C) -> Result<&[Trapezoid]> {
        self.trapezoids.clear();
        self.breaks.clear();
        for e in &self.edges {
            self.breaks.push(e.top.y);
            self.breaks.push(e.bottom.y);
        }
        self.add_intersections(combine)?;
        self.breaks.sort_by(f64::total_cmp);
        self.breaks.dedup();

        for i in 1..self.breaks.len() {
            let (y0, y1) = (self.breaks[i - 1], self.breaks[i]);
            self.sweep_slab(y0, y1);
        }
        log::trace!(
            "tesselated {} edges into {} trapezoids",
            self.edges.len(),
            self.trapezoids.len()
        );
        Ok(&self.trapezoids)
    }

    /// Output of the last `end_polygon`.
    pub fn trapezoids(&self) -> &[Trapezoid] {
        &self.trapezoids
    }

    fn add_intersections<C: Combine + ?Sized>(&mut self, combine: &mut C) -> Result<()> {
        for i in 0..self.edges.len() {
            for j in i + 1..self.edges.len() {
                let (a, b) = (self.edges[i], self.edges[j]);
                let ylo = a.top.y.max(b.top.y);
                let yhi = a.bottom.y.min(b.bottom.y);
                if ylo >= yhi {
                    continue;
                }
                let d_lo = a.x_at(ylo) - b.x_at(ylo);
                let d_hi = a.x_at(yhi) - b.x_at(yhi);
                if d_lo * d_hi >= 0.0 {
                    continue;
                }
                let y = ylo + (yhi - ylo) * d_lo / (d_lo - d_hi);
                if y <= ylo || y >= yhi {
                    continue;
                }
                let vertex = combine.combine(PointD::new(a.x_at(y), y))?;
                self.breaks.push(vertex.y);
            }
        }
        Ok(())
    }

    fn sweep_slab(&mut self, y0: f64, y1: f64) {
        if y1 <= y0 {
            return;
        }
        self.crossings.clear();
        for e in &self.edges {
            if e.top.y <= y0 && e.bottom.y >= y1 {
                let x_top = e.x_at(y0);
                let x_bottom = e.x_at(y1);
                self.crossings.push(Crossing {
                    mid: (x_top + x_bottom) * 0.5,
                    x_top,
                    x_bottom,
                    winding: e.winding,
                });
            }
        }
        self.crossings.sort_by(|a, b| a.mid.total_cmp(&b.mid));

        let mut winding = 0;
        let mut left: Option<(f64, f64)> = None;
        for c in &self.crossings {
            let was_inside = self.rule.is_inside(winding);
            winding += c.winding;
            let inside = self.rule.is_inside(winding);
            if !was_inside && inside {
                left = Some((c.x_top, c.x_bottom));
            } else if was_inside && !inside {
                if let Some((top_left, bottom_left)) = left.take() {
                    if c.x_top > top_left || c.x_bottom > bottom_left {
                        self.trapezoids.push(Trapezoid {
                            top: y0,
                            bottom: y1,
                            top_left,
                            top_right: c.x_top,
                            bottom_left,
                            bottom_right: c.x_bottom,
                        });
                    }
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(coords: &[(f64, f64)]) -> Vec<PointD> {
        coords.iter().map(|&(x, y)| PointD::new(x, y)).collect()
    }

    fn square(l: f64, t: f64, r: f64, b: f64) -> Vec<PointD> {
        pts(&[(l, t), (r, t), (r, b), (l, b)])
    }

    fn total_area(traps: &[Trapezoid]) -> f64 {
        traps.iter().map(Trapezoid::area).sum()
    }

    /// Five-pointed star drawn as one self-intersecting contour.
    fn star() -> Vec<PointD> {
        let mut out = Vec::new();
        for i in 0..5 {
            let a = std::f64::consts::PI * (-0.5 + 0.8 * i as f64);
            out.push(PointD::new(50.0 + 40.0 * a.cos(), 50.0 + 40.0 * a.sin()));
        }
        out
    }

    fn tesselate(rule: FillRule, contours: &[Vec<PointD>]) -> (Vec<Trapezoid>, usize) {
        let mut tess = Tesselator::new(rule);
        let mut pool = VertexPool::default();
        tess.begin_polygon();
        for c in contours {
            tess.add_contour(c);
        }
        let traps = tess.end_polygon(&mut pool).unwrap().to_vec();
        (traps, pool.used())
    }

    #[test]
    fn test_single_square() {
        let (traps, combined) = tesselate(FillRule::EvenOdd, &[square(0.0, 0.0, 10.0, 5.0)]);
        assert_eq!(combined, 0);
        assert_eq!(traps.len(), 1);
        let t = traps[0];
        assert_eq!((t.top, t.bottom), (0.0, 5.0));
        assert_eq!((t.top_left, t.top_right), (0.0, 10.0));
        assert_eq!(total_area(&traps), 50.0);
    }

    #[test]
    fn test_nested_squares_even_odd_makes_hole() {
        let outer = square(0.0, 0.0, 10.0, 10.0);
        let inner = square(3.0, 3.0, 7.0, 7.0);
        let (traps, _) = tesselate(FillRule::EvenOdd, &[outer, inner]);
        assert!((total_area(&traps) - 84.0).abs() < 1e-9);
    }

    #[test]
    fn test_nested_squares_nonzero_same_direction_fills() {
        let outer = square(0.0, 0.0, 10.0, 10.0);
        let inner = square(3.0, 3.0, 7.0, 7.0);
        let (traps, _) = tesselate(FillRule::NonZero, &[outer.clone(), inner.clone()]);
        assert!((total_area(&traps) - 100.0).abs() < 1e-9);

        // Reversing the inner contour cancels its winding.
        let mut reversed = inner;
        reversed.reverse();
        let (traps, _) = tesselate(FillRule::NonZero, &[outer, reversed]);
        assert!((total_area(&traps) - 84.0).abs() < 1e-9);
    }

    #[test]
    fn test_star_rules_differ_by_pentagon() {
        let (odd, combined) = tesselate(FillRule::EvenOdd, &[star()]);
        let (nonzero, _) = tesselate(FillRule::NonZero, &[star()]);
        // Every pair of non-adjacent edges crosses once.
        assert_eq!(combined, 5);
        assert!(total_area(&nonzero) > total_area(&odd));

        // The centre is covered twice: filled only under the nonzero rule.
        let covers = |traps: &[Trapezoid], x: f64, y: f64| {
            traps
                .iter()
                .any(|t| y >= t.top && y < t.bottom && x >= t.left_at(y) && x < t.right_at(y))
        };
        assert!(covers(&nonzero, 50.0, 50.0));
        assert!(!covers(&odd, 50.0, 50.0));
        // A tip is covered once: filled under both.
        assert!(covers(&odd, 50.0, 15.0));
        assert!(covers(&nonzero, 50.0, 15.0));
    }

    #[test]
    fn test_degenerate_contours() {
        let (traps, _) = tesselate(
            FillRule::EvenOdd,
            &[pts(&[(0.0, 0.0)]), pts(&[(0.0, 0.0), (5.0, 0.0)])],
        );
        assert!(traps.is_empty());
    }

    #[test]
    fn test_combine_errors_propagate() {
        let mut tess = Tesselator::new(FillRule::EvenOdd);
        let mut pool = VertexPool::new(20, Some(2));
        tess.begin_polygon();
        tess.add_contour(&star());
        assert!(tess.end_polygon(&mut pool).is_err());
    }
}
