//! Multi-contour paths made of polyline and cubic Bezier runs.
//!
//! Storage is flat: one point array, one run array and one contour array.
//! A contour owns a start point and a consecutive block of runs; each run
//! is either `count` line endpoints or `count` Bezier triples (two control
//! points and an endpoint). Consecutive segments of the same kind extend the
//! current run instead of opening a new one.

use std::ops::Range;

use crate::basics::{PointD, Rect};
use crate::curves::CubicBezier;
use crate::error::Result;
use crate::vertex_pool::VertexPool;

// ============================================================================
// Segment runs
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Lines,
    Bezier,
}

impl SegmentKind {
    #[inline]
    fn points_per_segment(self) -> usize {
        match self {
            SegmentKind::Lines => 1,
            SegmentKind::Bezier => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SegmentRun {
    kind: SegmentKind,
    count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Contour {
    start_point: usize,
    runs: Range<usize>,
}

/// Borrowed view of one run of a contour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment<'a> {
    /// Line endpoints, each joined to the previous point.
    Lines(&'a [PointD]),
    /// Bezier triples `(ctrl1, ctrl2, end)`; the length is a multiple of 3.
    Beziers(&'a [PointD]),
}

/// Borrowed view of one contour.
#[derive(Debug, Clone, Copy)]
pub struct ContourView<'a> {
    path: &'a Path,
    contour: &'a Contour,
}

impl<'a> ContourView<'a> {
    pub fn start(&self) -> PointD {
        self.path.points[self.contour.start_point]
    }

    pub fn segments(&self) -> impl Iterator<Item = Segment<'a>> + 'a {
        let path = self.path;
        let mut point = self.contour.start_point + 1;
        path.runs[self.contour.runs.clone()].iter().map(move |run| {
            let len = run.count * run.kind.points_per_segment();
            let pts = &path.points[point..point + len];
            point += len;
            match run.kind {
                SegmentKind::Lines => Segment::Lines(pts),
                SegmentKind::Bezier => Segment::Beziers(pts),
            }
        })
    }
}

// ============================================================================
// Path
// ============================================================================

/// Path builder and container.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    points: Vec<PointD>,
    runs: Vec<SegmentRun>,
    contours: Vec<Contour>,
    /// Contour currently accepting segments.
    open: bool,
}

impl Default for Path {
    fn default() -> Self {
        Self::new()
    }
}

impl Path {
    /// Empty path whose pen starts at the origin.
    pub fn new() -> Self {
        Self {
            points: vec![PointD::default()],
            runs: Vec::new(),
            contours: Vec::new(),
            open: false,
        }
    }

    /// Closed rectangle contour.
    pub fn from_rect(r: Rect) -> Self {
        let mut path = Self::new();
        path.add_rect(r);
        path
    }

    /// Drop every contour. Allocations are kept.
    pub fn clear(&mut self) {
        self.points.clear();
        self.points.push(PointD::default());
        self.runs.clear();
        self.contours.clear();
        self.open = false;
    }

    pub fn is_empty(&self) -> bool {
        self.contours.is_empty()
    }

    pub fn contour_count(&self) -> usize {
        self.contours.len()
    }

    pub fn contours(&self) -> impl Iterator<Item = ContourView<'_>> {
        self.contours
            .iter()
            .map(move |contour| ContourView { path: self, contour })
    }

    /// Current pen position.
    pub fn current_point(&self) -> PointD {
        self.points.last().copied().unwrap_or_default()
    }

    /// Start a new contour at `(x, y)`.
    pub fn move_to(&mut self, x: f64, y: f64) {
        if self.open {
            self.open = false;
            self.points.push(PointD::new(x, y));
        } else if let Some(last) = self.points.last_mut() {
            *last = PointD::new(x, y);
        }
    }

    pub fn line_to(&mut self, x: f64, y: f64) {
        self.add_segment(SegmentKind::Lines);
        self.points.push(PointD::new(x, y));
    }

    /// Cubic Bezier from the pen through two control points to `(x, y)`.
    pub fn curve_to(&mut self, c1: PointD, c2: PointD, x: f64, y: f64) {
        self.add_segment(SegmentKind::Bezier);
        self.points.push(c1);
        self.points.push(c2);
        self.points.push(PointD::new(x, y));
    }

    /// Line back to the contour start, then move there.
    pub fn close(&mut self) {
        if !self.open {
            return;
        }
        let Some(contour) = self.contours.last() else {
            return;
        };
        let start = self.points[contour.start_point];
        self.line_to(start.x, start.y);
        self.move_to(start.x, start.y);
    }

    pub fn add_rect(&mut self, r: Rect) {
        let (l, t, rr, b) = (
            f64::from(r.left),
            f64::from(r.top),
            f64::from(r.right),
            f64::from(r.bottom),
        );
        self.move_to(l, t);
        self.line_to(rr, t);
        self.line_to(rr, b);
        self.line_to(l, b);
        self.close();
    }

    fn add_segment(&mut self, kind: SegmentKind) {
        if self.open {
            if let Some(run) = self.runs.last_mut() {
                if run.kind == kind {
                    run.count += 1;
                    return;
                }
            }
            self.runs.push(SegmentRun { kind, count: 1 });
            if let Some(contour) = self.contours.last_mut() {
                contour.runs.end = self.runs.len();
            }
            return;
        }
        self.open = true;
        let start = self.runs.len();
        self.runs.push(SegmentRun { kind, count: 1 });
        self.contours.push(Contour {
            start_point: self.points.len() - 1,
            runs: start..start + 1,
        });
    }

    /// Flatten every contour into `pool`, Beziers sampled at
    /// `bezier_points` points. Returns one slot range per contour.
    pub fn flatten(&self, pool: &mut VertexPool, bezier_points: usize) -> Result<Vec<Range<usize>>> {
        let mut out = Vec::with_capacity(self.contours.len());
        for contour in self.contours() {
            let first = pool.push(contour.start())?;
            let mut pen = contour.start();
            for segment in contour.segments() {
                match segment {
                    Segment::Lines(points) => {
                        let range = pool.alloc_n(points.len())?;
                        pool.slice_mut(range).copy_from_slice(points);
                        if let Some(&last) = points.last() {
                            pen = last;
                        }
                    }
                    Segment::Beziers(points) => {
                        for triple in points.chunks_exact(3) {
                            CubicBezier::new(pen, triple[0], triple[1], triple[2])
                                .flatten_into(bezier_points, pool)?;
                            pen = triple[2];
                        }
                    }
                }
            }
            out.push(first..pool.used());
        }
        Ok(out)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runs_merge_by_kind() {
        let mut p = Path::new();
        p.move_to(1.0, 1.0);
        p.line_to(2.0, 1.0);
        p.line_to(2.0, 2.0);
        p.curve_to(PointD::new(3.0, 3.0), PointD::new(4.0, 3.0), 5.0, 2.0);
        p.line_to(1.0, 2.0);
        assert_eq!(p.contour_count(), 1);
        let c = p.contours().next().unwrap();
        assert_eq!(c.start(), PointD::new(1.0, 1.0));
        let segs: Vec<Segment<'_>> = c.segments().collect();
        assert_eq!(segs.len(), 3);
        assert!(matches!(segs[0], Segment::Lines(pts) if pts.len() == 2));
        assert!(matches!(segs[1], Segment::Beziers(pts) if pts.len() == 3));
        assert!(matches!(segs[2], Segment::Lines(pts) if pts.len() == 1 && pts[0] == PointD::new(1.0, 2.0)));
    }

    #[test]
    fn test_move_to_starts_new_contour() {
        let mut p = Path::new();
        p.move_to(0.0, 0.0);
        p.line_to(1.0, 0.0);
        p.move_to(5.0, 5.0);
        p.move_to(6.0, 6.0);
        p.line_to(7.0, 6.0);
        assert_eq!(p.contour_count(), 2);
        let starts: Vec<PointD> = p.contours().map(|c| c.start()).collect();
        assert_eq!(starts, vec![PointD::new(0.0, 0.0), PointD::new(6.0, 6.0)]);
    }

    #[test]
    fn test_line_to_without_move_starts_at_origin() {
        let mut p = Path::new();
        p.line_to(3.0, 4.0);
        assert_eq!(p.contours().next().unwrap().start(), PointD::default());
    }

    #[test]
    fn test_close_returns_to_start() {
        let mut p = Path::new();
        p.move_to(1.0, 1.0);
        p.line_to(4.0, 1.0);
        p.line_to(4.0, 4.0);
        p.close();
        assert_eq!(p.current_point(), PointD::new(1.0, 1.0));
        p.line_to(0.0, 0.0);
        assert_eq!(p.contour_count(), 2);
        // Closing twice is harmless.
        let mut q = Path::from_rect(Rect::new(0, 0, 2, 2));
        q.close();
        assert_eq!(q.contour_count(), 1);
    }

    #[test]
    fn test_flatten_counts() {
        let mut p = Path::new();
        p.move_to(0.0, 0.0);
        p.line_to(10.0, 0.0);
        p.curve_to(PointD::new(10.0, 5.0), PointD::new(5.0, 10.0), 0.0, 10.0);
        p.close();
        p.add_rect(Rect::new(20, 20, 30, 30));

        let mut pool = VertexPool::default();
        let contours = p.flatten(&mut pool, 30).unwrap();
        assert_eq!(contours.len(), 2);
        // start + 1 line + 29 curve points + closing line.
        assert_eq!(contours[0].len(), 32);
        assert_eq!(contours[1].len(), 5);
        assert_eq!(contours[1].start, 32);
        assert_eq!(pool.get(30), PointD::new(0.0, 10.0));
    }

    #[test]
    fn test_clear() {
        let mut p = Path::from_rect(Rect::new(0, 0, 1, 1));
        p.clear();
        assert!(p.is_empty());
        assert_eq!(p.current_point(), PointD::default());
    }
}
