//! Tunables of the clip/stencil compositor.

use crate::basics::FillRule;

/// Number of points a cubic Bezier run is flattened into.
pub const DEFAULT_BEZIER_POINTS: usize = 30;
/// Vertices added to the pool each time it grows.
pub const DEFAULT_VERTEX_BUNCH: usize = 20;
/// Stencil bits the compositor needs from a surface: two clip bits and two
/// mask bits.
pub const DEFAULT_STENCIL_BITS: u32 = 4;

/// Construction-time settings of a [`ClipStencilCompositor`].
///
/// ```
/// use raster_compositor::{CompositorConfig, FillRule};
///
/// let config = CompositorConfig::default()
///     .with_fill_rule(FillRule::NonZero)
///     .with_max_pool_vertices(Some(4096));
/// assert_eq!(config.bezier_points, 30);
/// ```
///
/// [`ClipStencilCompositor`]: crate::compositor::ClipStencilCompositor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositorConfig {
    /// Points per flattened Bezier run, endpoint included. At least 2.
    pub bezier_points: usize,
    /// Growth step of the vertex pool.
    pub vertex_bunch: usize,
    /// Upper bound on pooled vertices per draw. `None` means unbounded.
    pub max_pool_vertices: Option<usize>,
    /// Initial winding rule for paths.
    pub fill_rule: FillRule,
    /// Minimum stencil depth accepted by `bind`.
    pub stencil_bits_required: u32,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            bezier_points: DEFAULT_BEZIER_POINTS,
            vertex_bunch: DEFAULT_VERTEX_BUNCH,
            max_pool_vertices: None,
            fill_rule: FillRule::EvenOdd,
            stencil_bits_required: DEFAULT_STENCIL_BITS,
        }
    }
}

impl CompositorConfig {
    pub fn with_bezier_points(mut self, points: usize) -> Self {
        self.bezier_points = points.max(2);
        self
    }

    pub fn with_vertex_bunch(mut self, bunch: usize) -> Self {
        self.vertex_bunch = bunch.max(1);
        self
    }

    pub fn with_max_pool_vertices(mut self, max: Option<usize>) -> Self {
        self.max_pool_vertices = max;
        self
    }

    pub fn with_fill_rule(mut self, rule: FillRule) -> Self {
        self.fill_rule = rule;
        self
    }

    pub fn with_stencil_bits_required(mut self, bits: u32) -> Self {
        self.stencil_bits_required = bits;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = CompositorConfig::default();
        assert_eq!(c.bezier_points, 30);
        assert_eq!(c.vertex_bunch, 20);
        assert_eq!(c.max_pool_vertices, None);
        assert_eq!(c.fill_rule, FillRule::EvenOdd);
        assert_eq!(c.stencil_bits_required, 4);
    }

    #[test]
    fn test_setters_clamp() {
        let c = CompositorConfig::default()
            .with_bezier_points(0)
            .with_vertex_bunch(0)
            .with_max_pool_vertices(Some(64));
        assert_eq!(c.bezier_points, 2);
        assert_eq!(c.vertex_bunch, 1);
        assert_eq!(c.max_pool_vertices, Some(64));
    }
}
