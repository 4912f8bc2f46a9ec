//! Per-pixel stencil plane with a fixed-function test.
//!
//! Each pixel of the target has one auxiliary byte. When the test is
//! enabled, every pixel a primitive touches is compared against a reference
//! value through a comparison function, and the byte is then updated by
//! the `fail` or the `pass` operation. Only the bits selected by the write
//! mask change. A disabled test passes every pixel and leaves the plane
//! alone.

use crate::basics::Rect;
use crate::scanline::SpanList;

// ============================================================================
// Function and operations
// ============================================================================

/// Comparison applied as `(ref & mask) <func> (stencil & mask)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StencilFunc {
    Never,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
    #[default]
    Always,
}

impl StencilFunc {
    #[inline]
    pub fn compare(self, reference: u8, value: u8) -> bool {
        match self {
            StencilFunc::Never => false,
            StencilFunc::Less => reference < value,
            StencilFunc::LessEqual => reference <= value,
            StencilFunc::Greater => reference > value,
            StencilFunc::GreaterEqual => reference >= value,
            StencilFunc::Equal => reference == value,
            StencilFunc::NotEqual => reference != value,
            StencilFunc::Always => true,
        }
    }
}

/// Update applied to a stencil byte after the test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StencilOp {
    #[default]
    Keep,
    Zero,
    Replace,
    /// Saturating increment.
    Incr,
    /// Saturating decrement.
    Decr,
    Invert,
}

impl StencilOp {
    #[inline]
    fn apply(self, value: u8, reference: u8) -> u8 {
        match self {
            StencilOp::Keep => value,
            StencilOp::Zero => 0,
            StencilOp::Replace => reference,
            StencilOp::Incr => value.saturating_add(1),
            StencilOp::Decr => value.saturating_sub(1),
            StencilOp::Invert => !value,
        }
    }
}

// ============================================================================
// StencilPlane
// ============================================================================

/// Stencil bytes of one surface plus the fixed-function state.
#[derive(Debug, Clone)]
pub struct StencilPlane {
    data: Vec<u8>,
    width: u32,
    height: u32,
    enabled: bool,
    func: StencilFunc,
    reference: u8,
    func_mask: u8,
    fail: StencilOp,
    pass: StencilOp,
    write_mask: u8,
}

impl StencilPlane {
    /// Zeroed plane with the test disabled.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: vec![0; width as usize * height as usize],
            width,
            height,
            enabled: false,
            func: StencilFunc::Always,
            reference: 0,
            func_mask: 0xff,
            fail: StencilOp::Keep,
            pass: StencilOp::Keep,
            write_mask: 0xff,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width as i32, self.height as i32)
    }

    /// Stencil byte at `(x, y)`. Panics when out of range.
    #[inline]
    pub fn value(&self, x: u32, y: u32) -> u8 {
        assert!(x < self.width && y < self.height, "({}, {}) out of range", x, y);
        self.data[(y * self.width + x) as usize]
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn set_func(&mut self, func: StencilFunc, reference: u8, mask: u8) {
        self.func = func;
        self.reference = reference;
        self.func_mask = mask;
    }

    pub fn func(&self) -> (StencilFunc, u8, u8) {
        (self.func, self.reference, self.func_mask)
    }

    pub fn set_ops(&mut self, fail: StencilOp, pass: StencilOp) {
        self.fail = fail;
        self.pass = pass;
    }

    pub fn ops(&self) -> (StencilOp, StencilOp) {
        (self.fail, self.pass)
    }

    pub fn set_write_mask(&mut self, mask: u8) {
        self.write_mask = mask;
    }

    #[inline]
    pub fn write_mask(&self) -> u8 {
        self.write_mask
    }

    /// Set the write-masked bits of every byte to `value`. The test state
    /// does not matter.
    pub fn clear(&mut self, value: u8) {
        let wm = self.write_mask;
        for b in &mut self.data {
            *b = (*b & !wm) | (value & wm);
        }
    }

    /// Run the test at one pixel and apply the resulting operation.
    /// Returns whether the pixel passed.
    #[inline]
    pub fn process(&mut self, x: u32, y: u32) -> bool {
        if !self.enabled {
            return true;
        }
        let idx = (y * self.width + x) as usize;
        let value = self.data[idx];
        let passed = self
            .func
            .compare(self.reference & self.func_mask, value & self.func_mask);
        let op = if passed { self.pass } else { self.fail };
        let updated = op.apply(value, self.reference);
        self.data[idx] = (value & !self.write_mask) | (updated & self.write_mask);
        passed
    }

    /// Test without updating.
    #[inline]
    pub fn test(&self, x: u32, y: u32) -> bool {
        if !self.enabled {
            return true;
        }
        let value = self.data[(y * self.width + x) as usize];
        self.func
            .compare(self.reference & self.func_mask, value & self.func_mask)
    }

    /// Process every pixel of `spans`. Spans must lie inside the plane.
    pub fn process_spans(&mut self, spans: &SpanList) {
        for s in spans {
            for x in s.x0..s.x1 {
                self.process(x as u32, s.y as u32);
            }
        }
    }

    /// Number of pixels whose byte has every bit of `bits` set.
    pub fn count_bits(&self, bits: u8) -> usize {
        self.data.iter().filter(|&&b| b & bits == bits).count()
    }
}

// ============================================================================
// Tests
// ============================================================================
