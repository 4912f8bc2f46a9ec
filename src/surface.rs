//! Access to the pixel memory of drawing targets.
//!
//! The compositor never owns or allocates target surfaces. It reaches them
//! through a [`SurfaceProvider`], which maps a surface id to a mutable view
//! and reports what the backing store can do.

use std::collections::BTreeMap;

use crate::error::{RasterError, Result};
use crate::pixel_format::PixelFormat;
use crate::rendering_buffer::{PixelBufMut, PixelImage};

/// Identifier of a target surface.
pub type SurfaceId = u32;

/// Geometry and capabilities of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceCaps {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    /// Bits of stencil storage available per pixel.
    pub stencil_bits: u32,
}

/// Source of drawable surfaces.
pub trait SurfaceProvider {
    fn caps(&self, id: SurfaceId) -> Result<SurfaceCaps>;

    fn surface_mut(&mut self, id: SurfaceId) -> Result<PixelBufMut<'_>>;
}

impl<T: SurfaceProvider + ?Sized> SurfaceProvider for &mut T {
    fn caps(&self, id: SurfaceId) -> Result<SurfaceCaps> {
        (**self).caps(id)
    }

    fn surface_mut(&mut self, id: SurfaceId) -> Result<PixelBufMut<'_>> {
        (**self).surface_mut(id)
    }
}

// ============================================================================
// MemorySurfaces
// ============================================================================

/// In-memory surfaces keyed by id.
#[derive(Debug, Clone, Default)]
pub struct MemorySurfaces {
    surfaces: BTreeMap<SurfaceId, (PixelImage, u32)>,
}

impl MemorySurfaces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or replace) a zeroed surface.
    pub fn create(
        &mut self,
        id: SurfaceId,
        format: PixelFormat,
        width: u32,
        height: u32,
        stencil_bits: u32,
    ) {
        log::debug!(
            "surface {}: {}x{} {:?}, {} stencil bits",
            id,
            width,
            height,
            format,
            stencil_bits
        );
        self.surfaces
            .insert(id, (PixelImage::new(format, width, height), stencil_bits));
    }

    pub fn get(&self, id: SurfaceId) -> Option<&PixelImage> {
        self.surfaces.get(&id).map(|(image, _)| image)
    }

    pub fn remove(&mut self, id: SurfaceId) -> Option<PixelImage> {
        self.surfaces.remove(&id).map(|(image, _)| image)
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }
}

fn unknown_surface(id: SurfaceId) -> RasterError {
    RasterError::InvalidArgument(format!("unknown surface {}", id))
}

impl SurfaceProvider for MemorySurfaces {
    fn caps(&self, id: SurfaceId) -> Result<SurfaceCaps> {
        let (image, stencil_bits) = self.surfaces.get(&id).ok_or_else(|| unknown_surface(id))?;
        Ok(SurfaceCaps {
            format: image.format(),
            width: image.width(),
            height: image.height(),
            stencil_bits: *stencil_bits,
        })
    }

    fn surface_mut(&mut self, id: SurfaceId) -> Result<PixelBufMut<'_>> {
        self.surfaces
            .get_mut(&id)
            .map(|(image, _)| image.view_mut())
            .ok_or_else(|| unknown_surface(id))
    }
}
