//! Scratch vertex arena for path flattening and tesselation.
//!
//! The pool grows in fixed bunches and never shrinks. `reset` hands every
//! slot back at the start of a top-level draw; nothing is freed while a
//! primitive is being built, so indices handed out stay valid until the
//! next reset.

use std::ops::Range;

use crate::basics::PointD;
use crate::config::DEFAULT_VERTEX_BUNCH;
use crate::error::{RasterError, Result};

// ============================================================================
// VertexPool
// ============================================================================

/// Grow-only arena of `PointD` slots addressed by index.
#[derive(Debug, Clone)]
pub struct VertexPool {
    vertices: Vec<PointD>,
    used: usize,
    bunch: usize,
    limit: Option<usize>,
}

impl VertexPool {
    /// Pool growing by `bunch` slots, refusing to hold more than `limit`.
    pub fn new(bunch: usize, limit: Option<usize>) -> Self {
        Self {
            vertices: Vec::new(),
            used: 0,
            bunch: bunch.max(1),
            limit,
        }
    }

    /// Release every slot. Capacity is kept.
    pub fn reset(&mut self) {
        self.used = 0;
    }

    /// Slots handed out since the last reset.
    #[inline]
    pub fn used(&self) -> usize {
        self.used
    }

    /// Slots allocated so far.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Hand out `n` consecutive slots.
    pub fn alloc_n(&mut self, n: usize) -> Result<Range<usize>> {
        let needed = self.used + n;
        if let Some(limit) = self.limit {
            if needed > limit {
                return Err(RasterError::OutOfMemory {
                    requested: needed,
                    limit,
                });
            }
        }
        if needed > self.vertices.len() {
            let missing = needed - self.vertices.len();
            let bunches = (missing + self.bunch - 1) / self.bunch;
            let mut new_len = self.vertices.len() + bunches * self.bunch;
            if let Some(limit) = self.limit {
                new_len = new_len.min(limit);
            }
            self.vertices.resize(new_len, PointD::default());
        }
        let start = self.used;
        self.used = needed;
        Ok(start..needed)
    }

    /// Hand out one slot holding `p`.
    pub fn push(&mut self, p: PointD) -> Result<usize> {
        let idx = self.alloc_n(1)?.start;
        self.vertices[idx] = p;
        Ok(idx)
    }

    /// Vertex at `idx`. Panics when `idx` was not handed out.
    #[inline]
    pub fn get(&self, idx: usize) -> PointD {
        assert!(idx < self.used, "vertex {} not allocated", idx);
        self.vertices[idx]
    }

    #[inline]
    pub fn set(&mut self, idx: usize, p: PointD) {
        assert!(idx < self.used, "vertex {} not allocated", idx);
        self.vertices[idx] = p;
    }

    /// Handed-out slots in `range`.
    pub fn slice(&self, range: Range<usize>) -> &[PointD] {
        assert!(range.end <= self.used, "range {:?} not allocated", range);
        &self.vertices[range]
    }

    pub fn slice_mut(&mut self, range: Range<usize>) -> &mut [PointD] {
        assert!(range.end <= self.used, "range {:?} not allocated", range);
        &mut self.vertices[range]
    }
}

impl Default for VertexPool {
    fn default() -> Self {
        Self::new(DEFAULT_VERTEX_BUNCH, None)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_empty() {
        let pool = VertexPool::default();
        assert_eq!(pool.used(), 0);
        assert_eq!(pool.capacity(), 0);
    }

    #[test]
    fn test_grows_in_bunches() {
        let mut pool = VertexPool::new(20, None);
        pool.push(PointD::new(1.0, 2.0)).unwrap();
        assert_eq!(pool.capacity(), 20);
        pool.alloc_n(19).unwrap();
        assert_eq!(pool.capacity(), 20);
        pool.alloc_n(1).unwrap();
        assert_eq!(pool.capacity(), 40);
        pool.alloc_n(45).unwrap();
        assert_eq!(pool.capacity(), 80);
    }

    #[test]
    fn test_reset_reuses() {
        let mut pool = VertexPool::new(4, None);
        let r = pool.alloc_n(10).unwrap();
        assert_eq!(r, 0..10);
        let cap = pool.capacity();
        pool.reset();
        assert_eq!(pool.used(), 0);
        let i = pool.push(PointD::new(3.0, 4.0)).unwrap();
        assert_eq!(i, 0);
        assert_eq!(pool.get(0), PointD::new(3.0, 4.0));
        assert_eq!(pool.capacity(), cap);
    }

    #[test]
    fn test_limit() {
        let mut pool = VertexPool::new(20, Some(25));
        pool.alloc_n(20).unwrap();
        pool.alloc_n(5).unwrap();
        assert_eq!(pool.capacity(), 25);
        assert_eq!(
            pool.alloc_n(1),
            Err(RasterError::OutOfMemory {
                requested: 26,
                limit: 25
            })
        );
        assert_eq!(pool.used(), 25);
    }

    #[test]
    fn test_slice_access() {
        let mut pool = VertexPool::default();
        let r = pool.alloc_n(3).unwrap();
        for (i, p) in pool.slice_mut(r.clone()).iter_mut().enumerate() {
            *p = PointD::new(i as f64, 0.0);
        }
        assert_eq!(pool.slice(r)[2], PointD::new(2.0, 0.0));
    }
}
