//! # raster-compositor
//!
//! Pixel-exact compositing of remote framebuffer drawing primitives onto a
//! local surface.
//!
//! The crate bundles three engines that a viewer needs to replay
//! server-issued drawing commands:
//!
//! - Region algebra over canonical banded rectangle lists, with fast
//!   relationship classification
//! - The legacy 256-code ternary raster operations, plus the 16 binary
//!   logic ops used for fills, tiles and blits
//! - A stencil-based compositor that builds clip shapes (rectangles, regions,
//!   coverage bitmaps and curved multi-contour paths) into auxiliary bit
//!   planes and gates every drawing primitive through them
//!
//! ## Architecture
//!
//! Drawing a path through a clip runs through these stages:
//!
//! 1. **Path** collects polyline and cubic Bezier runs per contour
//! 2. **Flattening** samples curves into a per-draw vertex pool
//! 3. **Tesselation** splits the polygon into trapezoids under a fill rule
//! 4. **Spans** sample trapezoids, rectangles or bitmaps at pixel centres
//! 5. **Stencil** composes clip and mask planes, or gates color writes
//!
//! Pixel memory is never owned by the crate. Targets are reached through
//! [`SurfaceProvider`] and every buffer is a borrowed [`PixelBuf`] or
//! [`PixelBufMut`] view.

// Foundation
pub mod basics;
pub mod config;
pub mod error;

// Regions
pub mod region;

// Pixel memory and formats
pub mod pixel_format;
pub mod rendering_buffer;

// Raster operations
pub mod rop2;
pub mod rop3;

// Geometry
pub mod curves;
pub mod path;
pub mod tesselator;
pub mod vertex_pool;

// Composition
pub mod compositor;
pub mod scanline;
pub mod stencil;
pub mod surface;

pub use basics::{FillRule, Point, PointD, Rect};
pub use compositor::{ClipOp, ClipStencilCompositor, LineDash, MaskId, Shape};
pub use config::CompositorConfig;
pub use error::{RasterError, Result};
pub use path::Path;
pub use pixel_format::{Bitmap, BitmapFlags, BitmapFormat, Palette, PixelFormat, SurfaceFormat};
pub use region::{Region, RegionTest};
pub use rendering_buffer::{PixelBuf, PixelBufMut, PixelImage};
pub use rop2::Rop2;
pub use rop3::{Rop3Engine, RopCode};
pub use scanline::{Coverage, CoverageDepth, SpanList};
pub use surface::{MemorySurfaces, SurfaceCaps, SurfaceId, SurfaceProvider};
