//! Crate-wide error type.

use thiserror::Error;

/// Errors reported by the compositor, the rop engine and the converters.
///
/// Region operations never fail and therefore never produce one of these.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RasterError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("rectangle ({left}, {top}, {right}, {bottom}) is outside a {width}x{height} buffer")]
    OutOfBounds {
        left: i32,
        top: i32,
        right: i32,
        bottom: i32,
        width: u32,
        height: u32,
    },

    #[error("unsupported pixel format {0}")]
    UnsupportedFormat(String),

    #[error("pixel depth mismatch: expected {expected} bpp, got {actual} bpp")]
    FormatMismatch { expected: u32, actual: u32 },

    #[error("buffer too small: need {needed} bytes, have {actual}")]
    BufferTooSmall { needed: usize, actual: usize },

    #[error("indexed bitmap has no palette")]
    MissingPalette,

    #[error("rop self-test failed for code {code:#04x} at {bits} bits: got {actual:#x}")]
    SelfTest { code: u8, bits: u32, actual: u32 },

    #[error("vertex pool exhausted: {requested} vertices requested, limit is {limit}")]
    OutOfMemory { requested: usize, limit: usize },

    #[error("surface capability missing: {0}")]
    Capability(String),
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, RasterError>;

impl RasterError {
    pub(crate) fn out_of_bounds(r: crate::basics::Rect, width: u32, height: u32) -> Self {
        RasterError::OutOfBounds {
            left: r.left,
            top: r.top,
            right: r.right,
            bottom: r.bottom,
            width,
            height,
        }
    }
}
