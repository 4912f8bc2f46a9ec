//! Stencil-gated drawing onto one target surface.
//!
//! A compositor is bound to a single surface of a [`SurfaceProvider`] and
//! keeps a [`StencilPlane`] next to it. Clip shapes are composed into the
//! two alternating clip bits (`0x01`, `0x02`) and two independent mask
//! planes live in `0x04` and `0x08`. Every color-writing primitive first
//! runs [`ClipStencilCompositor::begin_draw`], which makes the stencil test
//! pass only where every active bit is set.
//!
//! Shapes are rasterized completely into a [`SpanList`] before any stencil
//! or color byte changes, so a primitive that fails (for example because the
//! vertex pool hit its limit) leaves the surface untouched.

use crate::basics::{FillRule, Point, PointD, Rect};
use crate::config::CompositorConfig;
use crate::error::{RasterError, Result};
use crate::path::Path;
use crate::pixel_format::PixelFormat;
use crate::region::Region;
use crate::rendering_buffer::{read_word, write_word, PixelBuf, PixelBufMut, PixelImage};
use crate::rop2::Rop2;
use crate::scanline::{Coverage, SpanList};
use crate::stencil::{StencilFunc, StencilOp, StencilPlane};
use crate::surface::{SurfaceCaps, SurfaceId, SurfaceProvider};
use crate::tesselator::Tesselator;
use crate::vertex_pool::VertexPool;

/// Both alternating clip bits.
const CLIP_BITS: u8 = 0x03;

// ============================================================================
// Shapes and operations
// ============================================================================

/// How a new clip shape combines with the current clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipOp {
    /// Replace the clip.
    Set,
    /// Union. A no-op while no clip is active.
    Or,
    /// Intersection.
    And,
    /// Difference.
    Exclude,
}

/// One of the two mask planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskId {
    A,
    B,
}

impl MaskId {
    /// Stencil bit owned by the mask.
    #[inline]
    pub fn bit(self) -> u8 {
        match self {
            MaskId::A => 0x04,
            MaskId::B => 0x08,
        }
    }
}

/// Area accepted by clip, mask and fill operations.
#[derive(Debug, Clone, Copy)]
pub enum Shape<'a> {
    Rect(Rect),
    /// Possibly overlapping rectangles; each pixel counts once.
    Rects(&'a [Rect]),
    Region(&'a Region),
    /// Non-zero samples of a coverage bitmap placed at a point.
    Coverage(Coverage<'a>, Point),
    /// Filled with the current fill rule.
    Path(&'a Path),
}

// ============================================================================
// Line dashes
// ============================================================================

/// On/off dash pattern for stroking.
#[derive(Debug, Clone, PartialEq)]
pub struct LineDash {
    dashes: Vec<f64>,
    offset: f64,
}

/// Position inside a dash pattern. Phase `-1` is the initial offset, which
/// is never drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
struct DashCursor {
    phase: i32,
    pos: f64,
}

impl LineDash {
    /// Dash lengths alternate on and off, starting with on. Lengths and
    /// offset must be finite and non-negative and the pattern must have a
    /// positive total length.
    pub fn new(dashes: &[f64], offset: f64) -> Result<Self> {
        let valid = |v: f64| v.is_finite() && v >= 0.0;
        if dashes.is_empty()
            || !valid(offset)
            || !dashes.iter().all(|&d| valid(d))
            || dashes.iter().sum::<f64>() <= 0.0
        {
            return Err(RasterError::InvalidArgument(format!(
                "line dash {:?} with offset {}",
                dashes, offset
            )));
        }
        Ok(Self {
            dashes: dashes.to_vec(),
            offset,
        })
    }

    pub fn dashes(&self) -> &[f64] {
        &self.dashes
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    fn start(&self) -> DashCursor {
        DashCursor {
            phase: if self.offset != 0.0 { -1 } else { 0 },
            pos: 0.0,
        }
    }

    fn phase_len(&self, phase: i32) -> f64 {
        if phase < 0 {
            self.offset
        } else {
            self.dashes[phase as usize % self.dashes.len()]
        }
    }

    /// Cut `a -> b` into pieces and pass every "on" piece to `emit`. The
    /// cursor carries the pattern over to the next segment of the contour.
    fn split<F>(&self, a: PointD, b: PointD, cursor: &mut DashCursor, mut emit: F) -> Result<()>
    where
        F: FnMut(PointD, PointD) -> Result<()>,
    {
        let len = (b.x - a.x).hypot(b.y - a.y);
        if len == 0.0 {
            return Ok(());
        }
        let (mx, my) = ((b.x - a.x) / len, (b.y - a.y) / len);
        let phases = 2 * self.dashes.len() as i32;
        let mut from = a;
        let mut total = 0.0;
        while total < len {
            let phase_len = self.phase_len(cursor.phase);
            total += phase_len - cursor.pos;
            let to = if total < len {
                cursor.pos = 0.0;
                PointD::new(a.x + mx * total, a.y + my * total)
            } else {
                cursor.pos = phase_len - (total - len);
                b
            };
            if cursor.phase >= 0 && cursor.phase % 2 == 0 {
                emit(from, to)?;
            }
            if cursor.pos == 0.0 {
                cursor.phase = (cursor.phase + 1) % phases;
            }
            from = to;
        }
        Ok(())
    }
}

// ============================================================================
// Rasterizer
// ============================================================================

/// Scratch state turning shapes into spans.
#[derive(Debug)]
struct Rasterizer {
    pool: VertexPool,
    tess: Tesselator,
    bezier_points: usize,
}

impl Rasterizer {
    fn new(config: &CompositorConfig) -> Self {
        Self {
            pool: VertexPool::new(config.vertex_bunch, config.max_pool_vertices),
            tess: Tesselator::new(config.fill_rule),
            bezier_points: config.bezier_points,
        }
    }

    fn shape(&mut self, shape: Shape<'_>, clip: Rect) -> Result<SpanList> {
        self.pool.reset();
        let mut spans = SpanList::new();
        match shape {
            Shape::Rect(r) => spans.add_rect(r, clip),
            Shape::Rects(rects) => spans.add_region(&Region::from_rects(rects), clip),
            Shape::Region(region) => spans.add_region(region, clip),
            Shape::Coverage(coverage, dest) => spans.add_coverage(&coverage, dest, clip),
            Shape::Path(path) => self.fill_path(path, clip, &mut spans)?,
        }
        Ok(spans)
    }

    fn fill_path(&mut self, path: &Path, clip: Rect, spans: &mut SpanList) -> Result<()> {
        let contours = path.flatten(&mut self.pool, self.bezier_points)?;
        self.tess.begin_polygon();
        for range in contours {
            self.tess.add_contour(self.pool.slice(range));
        }
        let traps = self.tess.end_polygon(&mut self.pool)?;
        spans.add_trapezoids(traps, clip);
        Ok(())
    }

    fn stroke_path(
        &mut self,
        path: &Path,
        width: f64,
        dash: Option<&LineDash>,
        clip: Rect,
    ) -> Result<SpanList> {
        self.pool.reset();
        let mut spans = SpanList::new();
        let contours = path.flatten(&mut self.pool, self.bezier_points)?;
        for range in contours {
            let points = self.pool.slice(range).to_vec();
            let mut cursor = dash.map(LineDash::start);
            for pair in points.windows(2) {
                match (dash, cursor.as_mut()) {
                    (Some(dash), Some(cursor)) => dash.split(pair[0], pair[1], cursor, |a, b| {
                        self.stroke_line(a, b, width, clip, &mut spans)
                    })?,
                    _ => self.stroke_line(pair[0], pair[1], width, clip, &mut spans)?,
                }
            }
        }
        Ok(spans)
    }

    /// Lines of width one or less are walked pixel by pixel. Wider lines
    /// become a quad offset by half the width on each side.
    fn stroke_line(
        &mut self,
        a: PointD,
        b: PointD,
        width: f64,
        clip: Rect,
        spans: &mut SpanList,
    ) -> Result<()> {
        if width <= 1.0 {
            spans.add_thin_line(a, b, clip);
            return Ok(());
        }
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        let len = dx.hypot(dy);
        if len == 0.0 {
            return Ok(());
        }
        let (ox, oy) = (-dy / len * width / 2.0, dx / len * width / 2.0);
        let quad = [
            PointD::new(a.x + ox, a.y + oy),
            PointD::new(b.x + ox, b.y + oy),
            PointD::new(b.x - ox, b.y - oy),
            PointD::new(a.x - ox, a.y - oy),
        ];
        self.tess.begin_polygon();
        self.tess.add_contour(&quad);
        let traps = self.tess.end_polygon(&mut self.pool)?;
        spans.add_trapezoids(traps, clip);
        Ok(())
    }
}

// ============================================================================
// Pixel helpers
// ============================================================================

#[derive(Debug, Clone)]
struct Pattern {
    image: PixelImage,
    origin: Point,
}

impl Pattern {
    #[inline]
    fn word_at(&self, x: i32, y: i32) -> u32 {
        let px = (x - self.origin.x).rem_euclid(self.image.width() as i32);
        let py = (y - self.origin.y).rem_euclid(self.image.height() as i32);
        self.image.pixel(px as u32, py as u32)
    }
}

#[inline]
fn map_channels(src: u32, dst: u32, f: impl Fn(u32, u32) -> u32) -> u32 {
    (0..4).fold(0, |acc, i| {
        let shift = i * 8;
        let c = f((src >> shift) & 0xff, (dst >> shift) & 0xff).min(0xff);
        acc | (c << shift)
    })
}

/// `src * a + dst * (1 - a)` on every ARGB channel, `a` in `0..=255`.
#[inline]
fn lerp_argb(src: u32, dst: u32, a: u32) -> u32 {
    map_channels(src, dst, |s, d| (s * a + d * (255 - a)) / 255)
}

/// Premultiplied source-over with an extra multiplier `mul` in `0..=255`.
#[inline]
fn over_argb(src: u32, dst: u32, mul: u32) -> u32 {
    let sa = (src >> 24) * mul / 255;
    map_channels(src, dst, |s, d| s * mul / 255 + d * (255 - sa) / 255)
}

/// Run the stencil test over `spans` and rewrite the passing pixels with
/// `shade(x, y, old_word)`.
fn paint_spans<P, F>(
    provider: &mut P,
    surface: SurfaceId,
    stencil: &mut StencilPlane,
    spans: &SpanList,
    mut shade: F,
) -> Result<()>
where
    P: SurfaceProvider + ?Sized,
    F: FnMut(i32, i32, u32) -> u32,
{
    let mut target = target_view(provider, surface, stencil)?;
    let bpp = target.bits_per_pixel();
    for span in spans {
        let row = target.row_mut(span.y as u32);
        for x in span.x0..span.x1 {
            if stencil.process(x as u32, span.y as u32) {
                let old = read_word(row, x as usize, bpp);
                write_word(row, x as usize, bpp, shade(x, span.y, old));
            }
        }
    }
    Ok(())
}

fn target_view<'p, P: SurfaceProvider + ?Sized>(
    provider: &'p mut P,
    surface: SurfaceId,
    stencil: &StencilPlane,
) -> Result<PixelBufMut<'p>> {
    let target = provider.surface_mut(surface)?;
    if target.width() != stencil.width() || target.height() != stencil.height() {
        return Err(RasterError::InvalidArgument(format!(
            "surface {} is {}x{}, bound as {}x{}",
            surface,
            target.width(),
            target.height(),
            stencil.width(),
            stencil.height()
        )));
    }
    Ok(target)
}

// ============================================================================
// ClipStencilCompositor
// ============================================================================

/// Clip, mask and drawing state of one bound surface.
pub struct ClipStencilCompositor<P: SurfaceProvider> {
    provider: P,
    surface: SurfaceId,
    caps: SurfaceCaps,
    config: CompositorConfig,
    stencil: StencilPlane,
    /// Number of active stencil users; the test is enabled while non-zero.
    stencil_refs: u32,
    /// Bits that currently gate drawing.
    stencil_mask: u8,
    /// Clip bit written by the most recent SET or AND.
    clip_bit: u8,
    raster: Rasterizer,
    color: u32,
    pattern: Option<Pattern>,
    op: Rop2,
    line_width: f64,
    dash: Option<LineDash>,
}

impl<P: SurfaceProvider> ClipStencilCompositor<P> {
    /// Bind to `surface`. Fails with `Capability` when the surface has
    /// fewer stencil bits than the configuration requires.
    pub fn bind(provider: P, surface: SurfaceId, config: CompositorConfig) -> Result<Self> {
        let caps = provider.caps(surface)?;
        if caps.stencil_bits < config.stencil_bits_required {
            log::error!(
                "surface {} offers {} stencil bits, {} required",
                surface,
                caps.stencil_bits,
                config.stencil_bits_required
            );
            return Err(RasterError::Capability(format!(
                "{} stencil bits available, {} required",
                caps.stencil_bits, config.stencil_bits_required
            )));
        }
        if caps.format.bits_per_pixel() < 8 {
            return Err(RasterError::UnsupportedFormat(format!(
                "{:?} render target",
                caps.format
            )));
        }
        log::debug!(
            "compositor bound to surface {} ({}x{} {:?})",
            surface,
            caps.width,
            caps.height,
            caps.format
        );
        Ok(Self {
            provider,
            surface,
            caps,
            stencil: StencilPlane::new(caps.width, caps.height),
            stencil_refs: 0,
            stencil_mask: 0,
            clip_bit: 0x02,
            raster: Rasterizer::new(&config),
            config,
            color: 0,
            pattern: None,
            op: Rop2::Copy,
            line_width: 1.0,
            dash: None,
        })
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    pub fn into_provider(self) -> P {
        self.provider
    }

    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    pub fn caps(&self) -> SurfaceCaps {
        self.caps
    }

    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    pub fn stencil(&self) -> &StencilPlane {
        &self.stencil
    }

    /// Stencil bits currently gating drawing.
    pub fn stencil_mask(&self) -> u8 {
        self.stencil_mask
    }

    pub fn stencil_clients(&self) -> u32 {
        self.stencil_refs
    }

    /// Whether drawing would currently reach `(x, y)`.
    pub fn is_visible(&self, x: u32, y: u32) -> bool {
        let mask = self.stencil_mask;
        mask == 0 || self.stencil.value(x, y) & mask == mask
    }

    fn bounds(&self) -> Rect {
        self.stencil.bounds()
    }

    fn add_stencil_client(&mut self) {
        self.stencil_refs += 1;
        if self.stencil_refs == 1 {
            self.stencil.set_enabled(true);
        }
    }

    fn remove_stencil_client(&mut self) {
        if self.stencil_refs == 0 {
            return;
        }
        self.stencil_refs -= 1;
        if self.stencil_refs == 0 {
            self.stencil.set_enabled(false);
        }
    }

    fn rasterize(&mut self, shape: Shape<'_>) -> Result<SpanList> {
        let bounds = self.bounds();
        self.raster.shape(shape, bounds).map_err(skipped)
    }

    // ------------------------------------------------------------------------
    // Clip
    // ------------------------------------------------------------------------

    /// Drop the clip. Masks are unaffected.
    pub fn reset_clip(&mut self) {
        if self.stencil_mask & CLIP_BITS == 0 {
            return;
        }
        self.remove_stencil_client();
        self.stencil_mask &= !CLIP_BITS;
        self.stencil.set_write_mask(CLIP_BITS);
        self.stencil.clear(0);
    }

    /// Combine `shape` into the clip with `op`.
    ///
    /// SET writes the clip bit that was not used last and makes it active.
    pub fn clip(&mut self, shape: Shape<'_>, op: ClipOp) -> Result<()> {
        let spans = self.rasterize(shape)?;
        log::trace!("clip {:?} over {} spans", op, spans.spans().len());
        self.clip_spans(&spans, op);
        Ok(())
    }

    fn clip_spans(&mut self, spans: &SpanList, op: ClipOp) {
        match op {
            ClipOp::Set => {
                let bit = self.clip_bit ^ CLIP_BITS;
                self.reset_clip();
                self.add_stencil_client();
                self.stencil_mask |= bit;
                self.clip_bit = bit;
            }
            _ if self.stencil_mask & CLIP_BITS == 0 => {
                if op == ClipOp::Or {
                    return;
                }
                let mut full = SpanList::new();
                full.add_rect(self.bounds(), self.bounds());
                self.clip_spans(&full, ClipOp::Set);
            }
            _ => {}
        }

        let val = self.stencil_mask & CLIP_BITS;
        self.stencil.set_write_mask(CLIP_BITS);
        match op {
            ClipOp::Set | ClipOp::Or => {
                self.stencil.set_func(StencilFunc::Always, val, val);
                self.stencil.set_ops(StencilOp::Replace, StencilOp::Replace);
                self.stencil.process_spans(spans);
            }
            ClipOp::And => {
                self.stencil.set_func(StencilFunc::Equal, val, val);
                let (pass, new_bit) = if val == 0x01 {
                    (StencilOp::Incr, 0x02)
                } else {
                    (StencilOp::Decr, 0x01)
                };
                self.stencil.set_ops(StencilOp::Zero, pass);
                self.stencil.process_spans(spans);
                // Pixels outside the shape still carry the old bit.
                self.stencil.set_write_mask(val);
                self.stencil.clear(0);
                self.stencil_mask = (self.stencil_mask & !val) | new_bit;
                self.clip_bit = new_bit;
            }
            ClipOp::Exclude => {
                self.stencil.set_func(StencilFunc::Equal, val, val);
                self.stencil.set_ops(StencilOp::Keep, StencilOp::Zero);
                self.stencil.process_spans(spans);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Masks
    // ------------------------------------------------------------------------

    /// Replace mask `id` with `shape`.
    pub fn set_mask(&mut self, id: MaskId, shape: Shape<'_>) -> Result<()> {
        let spans = self.rasterize(shape)?;
        let bit = id.bit();
        if self.stencil_mask & bit == 0 {
            self.add_stencil_client();
            self.stencil_mask |= bit;
        }
        self.stencil.set_write_mask(bit);
        self.stencil.clear(0);
        self.stencil.set_func(StencilFunc::Always, bit, bit);
        self.stencil.set_ops(StencilOp::Replace, StencilOp::Replace);
        self.stencil.process_spans(&spans);
        Ok(())
    }

    pub fn clear_mask(&mut self, id: MaskId) {
        let bit = id.bit();
        if self.stencil_mask & bit != 0 {
            self.stencil_mask &= !bit;
            self.remove_stencil_client();
        }
    }

    /// Set the stencil test so that only pixels inside every active plane
    /// pass. Every drawing primitive calls this first.
    pub fn begin_draw(&mut self) {
        if self.stencil_mask != 0 {
            let mask = self.stencil_mask;
            self.stencil.set_func(StencilFunc::Equal, mask, mask);
            self.stencil.set_ops(StencilOp::Keep, StencilOp::Keep);
        }
    }

    // ------------------------------------------------------------------------
    // Paint state
    // ------------------------------------------------------------------------

    /// Solid color as `0xAARRGGBB`. Drops the pattern.
    pub fn set_color(&mut self, argb: u32) {
        self.color = argb;
        self.pattern = None;
    }

    pub fn color(&self) -> u32 {
        self.color
    }

    /// Tile `pattern` over the surface with its top-left corner at
    /// `origin`. The pattern is recoded to the surface format.
    pub fn set_pattern(&mut self, origin: Point, pattern: &PixelBuf<'_>) -> Result<()> {
        if pattern.width() == 0 || pattern.height() == 0 {
            return Err(RasterError::InvalidArgument("empty pattern".into()));
        }
        let image = crate::pixel_format::recode(pattern, self.caps.format)?;
        self.pattern = Some(Pattern { image, origin });
        Ok(())
    }

    pub fn clear_pattern(&mut self) {
        self.pattern = None;
    }

    pub fn has_pattern(&self) -> bool {
        self.pattern.is_some()
    }

    /// Logic op used by fills, strokes and copies.
    pub fn set_op(&mut self, op: Rop2) {
        self.op = op;
    }

    pub fn op(&self) -> Rop2 {
        self.op
    }

    pub fn set_fill_rule(&mut self, rule: FillRule) {
        self.raster.tess.set_fill_rule(rule);
    }

    pub fn fill_rule(&self) -> FillRule {
        self.raster.tess.fill_rule()
    }

    /// Stroke width in pixels. Zero disables stroking.
    pub fn set_line_width(&mut self, width: f64) {
        self.line_width = width.max(0.0);
    }

    pub fn line_width(&self) -> f64 {
        self.line_width
    }

    /// Dash pattern for strokes. An empty `dashes` restores solid lines;
    /// an invalid pattern also does and is reported.
    pub fn set_line_dash(&mut self, dashes: &[f64], offset: f64) -> Result<()> {
        self.dash = None;
        if dashes.is_empty() {
            return Ok(());
        }
        self.dash = Some(LineDash::new(dashes, offset)?);
        Ok(())
    }

    pub fn line_dash(&self) -> Option<&LineDash> {
        self.dash.as_ref()
    }

    // ------------------------------------------------------------------------
    // Drawing
    // ------------------------------------------------------------------------

    /// Paint `spans` with the current color or pattern through the logic op.
    fn fill_spans(&mut self, spans: &SpanList) -> Result<()> {
        self.begin_draw();
        let color = self.caps.format.from_argb32(self.color);
        let pattern = self.pattern.as_ref();
        let op = self.op;
        paint_spans(
            &mut self.provider,
            self.surface,
            &mut self.stencil,
            spans,
            |x, y, old| op.apply(pattern.map_or(color, |p| p.word_at(x, y)), old),
        )
    }

    pub fn fill_shape(&mut self, shape: Shape<'_>) -> Result<()> {
        let spans = self.rasterize(shape)?;
        log::trace!("fill {} spans", spans.spans().len());
        self.fill_spans(&spans)
    }

    pub fn fill_rect(&mut self, r: Rect) -> Result<()> {
        self.fill_shape(Shape::Rect(r))
    }

    pub fn fill_rects(&mut self, rects: &[Rect]) -> Result<()> {
        self.fill_shape(Shape::Rects(rects))
    }

    pub fn fill_path(&mut self, path: &Path) -> Result<()> {
        self.fill_shape(Shape::Path(path))
    }

    /// Paint the set samples of a glyph bitmap placed at `dest`.
    pub fn fill_mask(&mut self, dest: Point, mask: &Coverage<'_>) -> Result<()> {
        self.fill_shape(Shape::Coverage(*mask, dest))
    }

    /// Blend the current color into the surface by `coverage`. The logic op
    /// and the pattern do not apply.
    pub fn fill_alpha(&mut self, dest: Point, coverage: &Coverage<'_>) -> Result<()> {
        let spans = self.rasterize(Shape::Coverage(*coverage, dest))?;
        self.begin_draw();
        let format = self.caps.format;
        let color = self.color;
        paint_spans(
            &mut self.provider,
            self.surface,
            &mut self.stencil,
            &spans,
            |x, y, old| {
                let a = u32::from(coverage.value((x - dest.x) as u32, (y - dest.y) as u32));
                format.from_argb32(lerp_argb(color, format.to_argb32(old), a))
            },
        )
    }

    /// One pixel wide outline just inside `r`.
    pub fn stroke_rect(&mut self, r: Rect) -> Result<()> {
        if r.is_empty() {
            return Ok(());
        }
        let outline = Region::from_rects(&[
            Rect::new(r.left, r.top, r.right, r.top + 1),
            Rect::new(r.left, r.bottom - 1, r.right, r.bottom),
            Rect::new(r.left, r.top, r.left + 1, r.bottom),
            Rect::new(r.right - 1, r.top, r.right, r.bottom),
        ]);
        self.fill_shape(Shape::Region(&outline))
    }

    /// Stroke every contour of `path` with the current width and dash. The
    /// dash pattern restarts at each contour.
    pub fn stroke_path(&mut self, path: &Path) -> Result<()> {
        if self.line_width == 0.0 {
            return Ok(());
        }
        let bounds = self.bounds();
        let spans = self
            .raster
            .stroke_path(path, self.line_width, self.dash.as_ref(), bounds)
            .map_err(skipped)?;
        log::trace!("stroke {} spans", spans.spans().len());
        self.fill_spans(&spans)
    }

    /// Scale the `src` area of `image` onto `dest` with nearest sampling.
    ///
    /// `alpha` in `0.0..=1.0` multiplies the source. Sources with an alpha
    /// channel are taken as premultiplied and blended source-over, as is any
    /// source drawn with `alpha < 1`. Opaque copies go through the logic op.
    pub fn draw_image(
        &mut self,
        image: &PixelBuf<'_>,
        src: Rect,
        dest: Rect,
        alpha: f64,
    ) -> Result<()> {
        if image.format() == PixelFormat::A1 {
            return Err(RasterError::UnsupportedFormat("A1 image source".into()));
        }
        image.check_rect(src)?;
        if src.is_empty() || dest.is_empty() {
            return Ok(());
        }
        let spans = self.rasterize(Shape::Rect(dest))?;
        self.begin_draw();

        let mul = (alpha.clamp(0.0, 1.0) * 255.0).round() as u32;
        let blend = image.format().has_alpha() || mul != 255;
        let (sw, sh) = (i64::from(src.width()), i64::from(src.height()));
        let (dw, dh) = (i64::from(dest.width()), i64::from(dest.height()));
        let format = self.caps.format;
        let op = self.op;
        paint_spans(
            &mut self.provider,
            self.surface,
            &mut self.stencil,
            &spans,
            |x, y, old| {
                let sx = src.left + (i64::from(x - dest.left) * sw / dw) as i32;
                let sy = src.top + (i64::from(y - dest.top) * sh / dh) as i32;
                let argb = image.format().to_argb32(image.pixel(sx as u32, sy as u32));
                if blend {
                    format.from_argb32(over_argb(argb, format.to_argb32(old), mul))
                } else {
                    op.apply(format.from_argb32(argb), old)
                }
            },
        )
    }

    /// Copy the `src` area of the surface to `dest`. The source is read in
    /// full before anything is written, so the areas may overlap.
    pub fn copy_pixels(&mut self, src: Rect, dest: Point) -> Result<()> {
        self.begin_draw();
        let snapshot = {
            let target = target_view(&mut self.provider, self.surface, &self.stencil)?;
            copy_area(&target, src)?
        };
        let mut spans = SpanList::new();
        spans.add_rect(
            Rect::from_xywh(dest.x, dest.y, src.width(), src.height()),
            self.bounds(),
        );
        let op = self.op;
        paint_spans(
            &mut self.provider,
            self.surface,
            &mut self.stencil,
            &spans,
            |x, y, old| op.apply(snapshot.pixel((x - dest.x) as u32, (y - dest.y) as u32), old),
        )
    }

    /// Read the area at `src` of the size of `out` into `out`, recoding to
    /// its format.
    pub fn read_pixels(&mut self, src: Point, out: &mut PixelBufMut<'_>) -> Result<()> {
        if out.format() == PixelFormat::A1 {
            return Err(RasterError::UnsupportedFormat("A1 read target".into()));
        }
        let target = target_view(&mut self.provider, self.surface, &self.stencil)?;
        let area = Rect::from_xywh(src.x, src.y, out.width() as i32, out.height() as i32);
        target.check_rect(area)?;
        let (from, to) = (target.format(), out.format());
        let (from_bpp, to_bpp) = (from.bits_per_pixel(), to.bits_per_pixel());
        let out_width = out.width() as usize;
        for y in 0..out.height() {
            let row = target.row(src.y as u32 + y);
            let out_row = out.row_mut(y);
            for x in 0..out_width {
                let word = read_word(row, src.x as usize + x, from_bpp);
                write_word(out_row, x, to_bpp, to.from_argb32(from.to_argb32(word)));
            }
        }
        Ok(())
    }

    /// Zero every color byte. Clip and masks are kept.
    pub fn clear(&mut self) -> Result<()> {
        target_view(&mut self.provider, self.surface, &self.stencil)?.clear(0);
        Ok(())
    }
}

fn skipped(e: RasterError) -> RasterError {
    if let RasterError::OutOfMemory { .. } = e {
        log::warn!("primitive skipped: {}", e);
    }
    e
}

fn copy_area(target: &PixelBufMut<'_>, src: Rect) -> Result<PixelImage> {
    target.check_rect(src)?;
    let mut image = PixelImage::new(target.format(), src.width() as u32, src.height() as u32);
    let px = target.bits_per_pixel() as usize / 8;
    let (start, len) = (src.left as usize * px, src.width() as usize * px);
    let mut view = image.view_mut();
    for y in 0..src.height() as u32 {
        view.row_mut(y)
            .copy_from_slice(&target.row(src.top as u32 + y)[start..start + len]);
    }
    Ok(image)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanline::CoverageDepth;
    use crate::surface::MemorySurfaces;

    const SURFACE: SurfaceId = 1;

    fn compositor(w: u32, h: u32) -> ClipStencilCompositor<MemorySurfaces> {
        compositor_with(w, h, CompositorConfig::default())
    }

    fn compositor_with(
        w: u32,
        h: u32,
        config: CompositorConfig,
    ) -> ClipStencilCompositor<MemorySurfaces> {
        let mut surfaces = MemorySurfaces::new();
        surfaces.create(SURFACE, PixelFormat::X8R8G8B8, w, h, 8);
        ClipStencilCompositor::bind(surfaces, SURFACE, config).unwrap()
    }

    fn pixel(c: &ClipStencilCompositor<MemorySurfaces>, x: u32, y: u32) -> u32 {
        c.provider().get(SURFACE).unwrap().pixel(x, y)
    }

    fn visible(c: &ClipStencilCompositor<MemorySurfaces>) -> Vec<(u32, u32)> {
        let (w, h) = (c.caps().width, c.caps().height);
        (0..h)
            .flat_map(|y| (0..w).map(move |x| (x, y)))
            .filter(|&(x, y)| c.is_visible(x, y))
            .collect()
    }

    fn painted(c: &ClipStencilCompositor<MemorySurfaces>) -> usize {
        let (w, h) = (c.caps().width, c.caps().height);
        (0..h)
            .flat_map(|y| (0..w).map(move |x| (x, y)))
            .filter(|&(x, y)| pixel(c, x, y) != 0)
            .count()
    }

    fn triangle() -> Path {
        let mut p = Path::new();
        p.move_to(1.0, 1.0);
        p.line_to(9.0, 1.0);
        p.line_to(1.0, 9.0);
        p.close();
        p
    }

    #[test]
    fn test_bind_requires_stencil_bits() {
        let mut surfaces = MemorySurfaces::new();
        surfaces.create(3, PixelFormat::X8R8G8B8, 4, 4, 2);
        let err = ClipStencilCompositor::bind(&mut surfaces, 3, CompositorConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, RasterError::Capability(_)));

        let relaxed = CompositorConfig::default().with_stencil_bits_required(2);
        assert!(ClipStencilCompositor::bind(&mut surfaces, 3, relaxed).is_ok());
        assert!(ClipStencilCompositor::bind(&mut surfaces, 9, CompositorConfig::default()).is_err());
    }

    #[test]
    fn test_bind_rejects_bitmap_target() {
        let mut surfaces = MemorySurfaces::new();
        surfaces.create(0, PixelFormat::A1, 8, 8, 8);
        assert!(matches!(
            ClipStencilCompositor::bind(surfaces, 0, CompositorConfig::default()),
            Err(RasterError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_set_clip_gates_fill() {
        let mut c = compositor(8, 8);
        c.clip(Shape::Rect(Rect::new(2, 2, 6, 6)), ClipOp::Set).unwrap();
        assert_eq!(c.stencil_clients(), 1);
        assert!(c.stencil().is_enabled());
        c.set_color(0xffff_0000);
        c.fill_rect(Rect::new(0, 0, 8, 8)).unwrap();
        assert_eq!(painted(&c), 16);
        assert_eq!(pixel(&c, 2, 2), 0x00ff_0000);
        assert_eq!(pixel(&c, 1, 2), 0);
    }

    #[test]
    fn test_or_is_idempotent() {
        let mut c = compositor(10, 10);
        c.clip(Shape::Rect(Rect::new(0, 0, 4, 4)), ClipOp::Set).unwrap();
        c.clip(Shape::Rect(Rect::new(3, 3, 8, 8)), ClipOp::Or).unwrap();
        let once = visible(&c);
        assert_eq!(once.len(), 16 + 25 - 1);
        c.clip(Shape::Rect(Rect::new(3, 3, 8, 8)), ClipOp::Or).unwrap();
        assert_eq!(visible(&c), once);
    }

    #[test]
    fn test_or_without_clip_is_noop() {
        let mut c = compositor(4, 4);
        c.clip(Shape::Rect(Rect::new(0, 0, 2, 2)), ClipOp::Or).unwrap();
        assert_eq!(c.stencil_mask(), 0);
        assert_eq!(c.stencil_clients(), 0);
        assert_eq!(visible(&c).len(), 16);
    }

    #[test]
    fn test_and_with_full_surface_keeps_clip() {
        let mut c = compositor(10, 10);
        let tri = triangle();
        c.clip(Shape::Path(&tri), ClipOp::Set).unwrap();
        let before = visible(&c);
        assert!(!before.is_empty() && before.len() < 100);

        c.clip(Shape::Rect(Rect::new(0, 0, 10, 10)), ClipOp::And).unwrap();
        assert_eq!(c.stencil_mask() & CLIP_BITS, 0x02);
        assert_eq!(visible(&c), before);

        c.clip(Shape::Rect(Rect::new(0, 0, 10, 10)), ClipOp::And).unwrap();
        assert_eq!(c.stencil_mask() & CLIP_BITS, 0x01);
        assert_eq!(visible(&c), before);
        assert_eq!(c.stencil().count_bits(0x02), 0);
    }

    #[test]
    fn test_and_intersects() {
        let mut c = compositor(10, 10);
        c.clip(Shape::Rect(Rect::new(0, 0, 6, 6)), ClipOp::Set).unwrap();
        c.clip(Shape::Rect(Rect::new(4, 4, 10, 10)), ClipOp::And).unwrap();
        assert_eq!(visible(&c), vec![(4, 4), (5, 4), (4, 5), (5, 5)]);
    }

    #[test]
    fn test_and_without_clip_clips_to_shape() {
        let mut c = compositor(6, 6);
        c.clip(Shape::Rect(Rect::new(1, 1, 3, 2)), ClipOp::And).unwrap();
        assert_eq!(visible(&c), vec![(1, 1), (2, 1)]);
        assert_eq!(c.stencil_clients(), 1);
    }

    #[test]
    fn test_exclude_self_is_empty() {
        let mut c = compositor(10, 10);
        let tri = triangle();
        c.clip(Shape::Path(&tri), ClipOp::Set).unwrap();
        c.clip(Shape::Path(&tri), ClipOp::Exclude).unwrap();
        assert!(visible(&c).is_empty());
        c.set_color(0xffff_ffff);
        c.fill_rect(Rect::new(0, 0, 10, 10)).unwrap();
        assert_eq!(painted(&c), 0);
    }

    #[test]
    fn test_exclude_empty_is_noop() {
        let mut c = compositor(8, 8);
        c.clip(Shape::Rect(Rect::new(1, 1, 5, 5)), ClipOp::Set).unwrap();
        let before = visible(&c);
        c.clip(Shape::Rect(Rect::default()), ClipOp::Exclude).unwrap();
        c.clip(Shape::Rects(&[]), ClipOp::Exclude).unwrap();
        assert_eq!(visible(&c), before);
    }

    #[test]
    fn test_exclude_without_clip_punches_hole() {
        let mut c = compositor(4, 4);
        c.clip(Shape::Rect(Rect::new(1, 1, 3, 3)), ClipOp::Exclude).unwrap();
        let v = visible(&c);
        assert_eq!(v.len(), 12);
        assert!(!v.contains(&(1, 1)));
    }

    #[test]
    fn test_overlapping_rects_clip_once() {
        let mut c = compositor(8, 8);
        c.clip(Shape::Rect(Rect::new(0, 0, 8, 8)), ClipOp::Set).unwrap();
        let rects = [Rect::new(0, 0, 4, 4), Rect::new(2, 2, 6, 6)];
        c.clip(Shape::Rects(&rects), ClipOp::And).unwrap();
        assert_eq!(visible(&c).len(), 16 + 16 - 4);
    }

    #[test]
    fn test_reset_clip() {
        let mut c = compositor(4, 4);
        c.clip(Shape::Rect(Rect::new(0, 0, 1, 1)), ClipOp::Set).unwrap();
        c.reset_clip();
        assert_eq!(c.stencil_mask(), 0);
        assert_eq!(c.stencil_clients(), 0);
        assert!(!c.stencil().is_enabled());
        assert_eq!(c.stencil().count_bits(0x01), 0);
        // Second reset does nothing.
        c.reset_clip();
        assert_eq!(c.stencil_clients(), 0);
    }

    #[test]
    fn test_set_alternates_clip_bit() {
        let mut c = compositor(6, 6);
        c.clip(Shape::Rect(Rect::new(0, 0, 4, 4)), ClipOp::Set).unwrap();
        assert_eq!(c.stencil_mask() & CLIP_BITS, 0x01);
        c.clip(Shape::Rect(Rect::new(1, 1, 5, 5)), ClipOp::Set).unwrap();
        assert_eq!(c.stencil_mask() & CLIP_BITS, 0x02);
        assert_eq!(c.stencil().count_bits(0x01), 0);
        assert_eq!(visible(&c).len(), 16);
        assert_eq!(c.stencil_clients(), 1);

        // AND from the second bit lands back on the first.
        c.clip(Shape::Rect(Rect::new(0, 0, 3, 3)), ClipOp::And).unwrap();
        assert_eq!(c.stencil_mask() & CLIP_BITS, 0x01);
        assert_eq!(visible(&c).len(), 4);

        // The bit survives a reset.
        c.reset_clip();
        c.clip(Shape::Rect(Rect::new(0, 0, 2, 2)), ClipOp::Set).unwrap();
        assert_eq!(c.stencil_mask() & CLIP_BITS, 0x02);
        assert_eq!(visible(&c).len(), 4);
    }

    #[test]
    fn test_coverage_clip() {
        let mut c = compositor(8, 2);
        let bits = [0b1100_0011u8];
        let cov = Coverage::new(&bits, CoverageDepth::A1, 8, 1, 1).unwrap();
        c.clip(Shape::Coverage(cov, Point::new(0, 1)), ClipOp::Set).unwrap();
        assert_eq!(visible(&c), vec![(0, 1), (1, 1), (6, 1), (7, 1)]);
    }

    #[test]
    fn test_clip_path_uses_fill_rule() {
        let mut nested = Path::new();
        nested.add_rect(Rect::new(0, 0, 10, 10));
        nested.add_rect(Rect::new(3, 3, 7, 7));

        let mut c = compositor(10, 10);
        c.clip(Shape::Path(&nested), ClipOp::Set).unwrap();
        assert_eq!(visible(&c).len(), 84);

        c.set_fill_rule(FillRule::NonZero);
        c.clip(Shape::Path(&nested), ClipOp::Set).unwrap();
        assert_eq!(visible(&c).len(), 100);
    }

    #[test]
    fn test_masks_combine_with_clip() {
        let mut c = compositor(8, 8);
        c.clip(Shape::Rect(Rect::new(0, 0, 4, 8)), ClipOp::Set).unwrap();
        c.set_mask(MaskId::A, Shape::Rect(Rect::new(0, 0, 8, 4))).unwrap();
        assert_eq!(c.stencil_clients(), 2);
        assert_eq!(c.stencil_mask(), 0x05);
        c.set_color(0xffff_ffff);
        c.fill_rect(Rect::new(0, 0, 8, 8)).unwrap();
        assert_eq!(painted(&c), 16);
        assert_eq!(pixel(&c, 3, 3), 0x00ff_ffff);
        assert_eq!(pixel(&c, 4, 3), 0);

        // Replacing the mask does not add a client.
        c.set_mask(MaskId::A, Shape::Rect(Rect::new(0, 0, 1, 1))).unwrap();
        assert_eq!(c.stencil_clients(), 2);
        assert_eq!(c.stencil().count_bits(0x04), 1);

        c.clear_mask(MaskId::A);
        c.clear_mask(MaskId::A);
        assert_eq!(c.stencil_mask(), 0x01);
        assert_eq!(c.stencil_clients(), 1);
    }

    #[test]
    fn test_clip_ops_leave_masks() {
        let mut c = compositor(6, 6);
        c.set_mask(MaskId::B, Shape::Rect(Rect::new(0, 0, 3, 3))).unwrap();
        c.clip(Shape::Rect(Rect::new(0, 0, 6, 6)), ClipOp::Set).unwrap();
        c.clip(Shape::Rect(Rect::new(1, 1, 6, 6)), ClipOp::And).unwrap();
        c.clip(Shape::Rect(Rect::new(2, 2, 3, 3)), ClipOp::Exclude).unwrap();
        c.reset_clip();
        assert_eq!(c.stencil().count_bits(0x08), 9);
        assert_eq!(c.stencil_mask(), 0x08);
        assert_eq!(c.stencil_clients(), 1);
    }

    #[test]
    fn test_pool_exhaustion_leaves_surface_untouched() {
        let config = CompositorConfig::default()
            .with_vertex_bunch(2)
            .with_max_pool_vertices(Some(8));
        let mut c = compositor_with(16, 16, config);
        let mut curve = Path::new();
        curve.move_to(0.0, 0.0);
        curve.curve_to(PointD::new(16.0, 0.0), PointD::new(16.0, 16.0), 0.0, 16.0);
        curve.close();

        c.set_color(0xffff_ffff);
        assert!(matches!(
            c.fill_path(&curve),
            Err(RasterError::OutOfMemory { .. })
        ));
        assert_eq!(painted(&c), 0);

        assert!(c.clip(Shape::Path(&curve), ClipOp::Set).is_err());
        assert_eq!(c.stencil_mask(), 0);
        assert_eq!(c.stencil().count_bits(0x01), 0);

        // Small primitives still fit.
        c.fill_path(&Path::from_rect(Rect::new(0, 0, 2, 2))).unwrap();
        assert_eq!(painted(&c), 4);
    }

    #[test]
    fn test_xor_fill_twice_restores() {
        let mut c = compositor(4, 4);
        c.set_color(0x0012_3456);
        c.fill_rect(Rect::new(0, 0, 4, 4)).unwrap();
        c.set_op(Rop2::Xor);
        c.set_color(0x00ff_00ff);
        c.fill_rects(&[Rect::new(0, 0, 2, 2), Rect::new(1, 1, 3, 3)]).unwrap();
        assert_eq!(pixel(&c, 1, 1), 0x0012_3456 ^ 0x00ff_00ff);
        c.fill_rects(&[Rect::new(0, 0, 2, 2), Rect::new(1, 1, 3, 3)]).unwrap();
        assert_eq!(pixel(&c, 1, 1), 0x0012_3456);
        assert_eq!(pixel(&c, 3, 3), 0x0012_3456);
    }

    #[test]
    fn test_pattern_fill_wraps_from_origin() {
        let mut c = compositor(4, 4);
        let mut tile = PixelImage::new(PixelFormat::X8R8G8B8, 2, 1);
        tile.view_mut().set_pixel(0, 0, 0x0000_00aa);
        tile.view_mut().set_pixel(1, 0, 0x0000_00bb);
        c.set_pattern(Point::new(1, 0), &tile.view()).unwrap();
        assert!(c.has_pattern());
        c.fill_rect(Rect::new(0, 0, 4, 1)).unwrap();
        let row: Vec<u32> = (0..4).map(|x| pixel(&c, x, 0)).collect();
        assert_eq!(row, vec![0xbb, 0xaa, 0xbb, 0xaa]);

        c.set_color(0x0000_0011);
        assert!(!c.has_pattern());
        let empty = PixelImage::new(PixelFormat::X8R8G8B8, 0, 0);
        assert!(c.set_pattern(Point::new(0, 0), &empty.view()).is_err());
    }

    #[test]
    fn test_stroke_rect_outline() {
        let mut c = compositor(8, 8);
        c.set_op(Rop2::Xor);
        c.set_color(0x0000_00ff);
        c.stroke_rect(Rect::new(1, 1, 5, 4)).unwrap();
        assert_eq!(painted(&c), 10);
        assert_eq!(pixel(&c, 1, 1), 0xff);
        assert_eq!(pixel(&c, 2, 2), 0);
    }

    #[test]
    fn test_stroke_thin_and_dashed() {
        let mut line = Path::new();
        line.move_to(0.0, 1.0);
        line.line_to(4.0, 1.0);

        let mut c = compositor(6, 3);
        c.set_color(0x00ff_ffff);
        c.stroke_path(&line).unwrap();
        let row: Vec<bool> = (0..6).map(|x| pixel(&c, x, 1) != 0).collect();
        assert_eq!(row, vec![true, true, true, true, false, false]);

        let mut c = compositor(6, 3);
        c.set_color(0x00ff_ffff);
        c.set_line_dash(&[1.0, 1.0], 0.0).unwrap();
        c.stroke_path(&line).unwrap();
        let row: Vec<bool> = (0..4).map(|x| pixel(&c, x, 1) != 0).collect();
        assert_eq!(row, vec![true, false, true, false]);

        let mut c = compositor(6, 3);
        c.set_color(0x00ff_ffff);
        c.set_line_dash(&[2.0, 2.0], 1.0).unwrap();
        c.stroke_path(&line).unwrap();
        let row: Vec<bool> = (0..4).map(|x| pixel(&c, x, 1) != 0).collect();
        assert_eq!(row, vec![false, true, true, false]);
    }

    #[test]
    fn test_zero_width_stroke_draws_nothing() {
        let mut c = compositor(4, 4);
        c.set_color(0x00ff_ffff);
        c.set_line_width(0.0);
        c.stroke_path(&Path::from_rect(Rect::new(0, 0, 3, 3))).unwrap();
        assert_eq!(painted(&c), 0);
    }

    #[test]
    fn test_wide_stroke() {
        let mut line = Path::new();
        line.move_to(2.0, 5.0);
        line.line_to(12.0, 5.0);

        let mut c = compositor(16, 10);
        c.set_color(0x00ff_ffff);
        c.set_line_width(4.0);
        c.stroke_path(&line).unwrap();
        assert_eq!(painted(&c), 40);
        assert_ne!(pixel(&c, 2, 3), 0);
        assert_eq!(pixel(&c, 2, 7), 0);

        let mut diagonal = Path::new();
        diagonal.move_to(1.0, 1.0);
        diagonal.line_to(9.0, 9.0);
        let mut c = compositor(10, 10);
        c.set_color(0x00ff_ffff);
        c.set_line_width(3.0);
        c.stroke_path(&diagonal).unwrap();
        assert_ne!(pixel(&c, 5, 5), 0);
        assert_eq!(pixel(&c, 9, 0), 0);
    }

    #[test]
    fn test_line_dash_validation() {
        let mut c = compositor(2, 2);
        assert!(c.set_line_dash(&[1.0, -1.0], 0.0).is_err());
        assert!(c.line_dash().is_none());
        assert!(c.set_line_dash(&[0.0, 0.0], 0.0).is_err());
        assert!(c.set_line_dash(&[3.0], -1.0).is_err());
        c.set_line_dash(&[3.0], 1.5).unwrap();
        assert_eq!(c.line_dash().unwrap().dashes(), &[3.0]);
        c.set_line_dash(&[], 0.0).unwrap();
        assert!(c.line_dash().is_none());
    }

    #[test]
    fn test_fill_mask_glyph() {
        let mut c = compositor(6, 3);
        c.set_color(0x0000_ff00);
        let glyph = [0b1010_0000u8];
        let cov = Coverage::new(&glyph, CoverageDepth::A1, 3, 1, 1).unwrap();
        c.fill_mask(Point::new(1, 1), &cov).unwrap();
        assert_eq!(pixel(&c, 1, 1), 0xff00);
        assert_eq!(pixel(&c, 2, 1), 0);
        assert_eq!(pixel(&c, 3, 1), 0xff00);
        assert_eq!(painted(&c), 2);
    }

    #[test]
    fn test_fill_alpha_blends() {
        let mut c = compositor(4, 1);
        c.set_color(0xffff_ffff);
        let alpha = [0x80u8, 0xff, 0x00];
        let cov = Coverage::new(&alpha, CoverageDepth::A8, 3, 1, 3).unwrap();
        c.fill_alpha(Point::new(1, 0), &cov).unwrap();
        assert_eq!(pixel(&c, 0, 0), 0);
        assert_eq!(pixel(&c, 1, 0), 0x0080_8080);
        assert_eq!(pixel(&c, 2, 0), 0x00ff_ffff);
        assert_eq!(pixel(&c, 3, 0), 0);
    }

    #[test]
    fn test_draw_image_scales_nearest() {
        let mut src = PixelImage::new(PixelFormat::X8R8G8B8, 2, 2);
        {
            let mut v = src.view_mut();
            v.set_pixel(0, 0, 1);
            v.set_pixel(1, 0, 2);
            v.set_pixel(0, 1, 3);
            v.set_pixel(1, 1, 4);
        }
        let mut c = compositor(4, 4);
        c.draw_image(&src.view(), Rect::new(0, 0, 2, 2), Rect::new(0, 0, 4, 4), 1.0)
            .unwrap();
        assert_eq!(pixel(&c, 1, 1), 1);
        assert_eq!(pixel(&c, 2, 1), 2);
        assert_eq!(pixel(&c, 1, 2), 3);
        assert_eq!(pixel(&c, 3, 3), 4);

        assert!(matches!(
            c.draw_image(&src.view(), Rect::new(1, 1, 3, 3), Rect::new(0, 0, 1, 1), 1.0),
            Err(RasterError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_draw_image_blends_argb() {
        let mut c = compositor(2, 1);
        c.set_color(0xffff_ffff);
        c.fill_rect(Rect::new(0, 0, 2, 1)).unwrap();
        let mut src = PixelImage::new(PixelFormat::A8R8G8B8, 1, 1);
        src.view_mut().set_pixel(0, 0, 0x8080_0000);
        c.draw_image(&src.view(), Rect::new(0, 0, 1, 1), Rect::new(0, 0, 1, 1), 1.0)
            .unwrap();
        assert_eq!(pixel(&c, 0, 0), 0x00ff_7f7f);
        assert_eq!(pixel(&c, 1, 0), 0x00ff_ffff);
    }

    #[test]
    fn test_copy_pixels_overlapping() {
        let mut c = compositor(4, 1);
        for (x, v) in [1u32, 2, 3].iter().enumerate() {
            c.set_color(*v);
            c.fill_rect(Rect::new(x as i32, 0, x as i32 + 1, 1)).unwrap();
        }
        c.copy_pixels(Rect::new(0, 0, 2, 1), Point::new(1, 0)).unwrap();
        let row: Vec<u32> = (0..4).map(|x| pixel(&c, x, 0)).collect();
        assert_eq!(row, vec![1, 1, 2, 0]);
        assert!(c.copy_pixels(Rect::new(3, 0, 5, 1), Point::new(0, 0)).is_err());
    }

    #[test]
    fn test_read_pixels_recodes() {
        let mut c = compositor(4, 4);
        c.set_color(0x0012_3456);
        c.fill_rect(Rect::new(1, 1, 3, 3)).unwrap();
        let mut out = PixelImage::new(PixelFormat::A8R8G8B8, 2, 2);
        c.read_pixels(Point::new(1, 1), &mut out.view_mut()).unwrap();
        assert_eq!(out.pixel(0, 0), 0xff12_3456);
        assert_eq!(out.pixel(1, 1), 0xff12_3456);
        assert!(c
            .read_pixels(Point::new(3, 3), &mut out.view_mut())
            .is_err());
    }

    #[test]
    fn test_read_pixels_wide_row() {
        let mut c = compositor(6, 2);
        c.set_color(0x00aa_bbcc);
        c.fill_rect(Rect::new(2, 1, 5, 2)).unwrap();
        let mut out = PixelImage::new(PixelFormat::X8R8G8B8, 5, 1);
        c.read_pixels(Point::new(1, 1), &mut out.view_mut()).unwrap();
        let row: Vec<u32> = (0..5).map(|x| out.pixel(x, 0) & 0x00ff_ffff).collect();
        assert_eq!(row, vec![0, 0xaabbcc, 0xaabbcc, 0xaabbcc, 0]);
    }

    #[test]
    fn test_clear_keeps_clip() {
        let mut c = compositor(4, 4);
        c.set_color(0x00ff_ffff);
        c.fill_rect(Rect::new(0, 0, 4, 4)).unwrap();
        c.clip(Shape::Rect(Rect::new(0, 0, 2, 2)), ClipOp::Set).unwrap();
        c.clear().unwrap();
        assert_eq!(painted(&c), 0);
        assert_eq!(visible(&c).len(), 4);
    }

    #[test]
    fn test_draw_on_16_bit_surface() {
        let mut surfaces = MemorySurfaces::new();
        surfaces.create(0, PixelFormat::R5G6B5, 4, 4, 4);
        let mut c = ClipStencilCompositor::bind(&mut surfaces, 0, CompositorConfig::default())
            .unwrap();
        c.set_color(0xffff_ffff);
        c.fill_rect(Rect::new(0, 0, 2, 2)).unwrap();
        drop(c);
        let image = surfaces.get(0).unwrap();
        assert_eq!(image.pixel(1, 1), 0xffff);
        assert_eq!(image.pixel(2, 2), 0);
    }

    #[test]
    fn test_channel_math() {
        assert_eq!(lerp_argb(0xff00_ff00, 0x0000_0000, 255), 0xff00_ff00);
        assert_eq!(lerp_argb(0xff00_ff00, 0x1122_3344, 0), 0x1122_3344);
        assert_eq!(over_argb(0xff12_3456, 0x0000_0000, 255), 0xff12_3456);
        assert_eq!(over_argb(0x0000_0000, 0xffab_cdef, 255), 0xffab_cdef);
    }
}
