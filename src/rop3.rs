//! Ternary raster operations.
//!
//! A ternary rop combines a pattern (brush), a source image and the existing
//! destination bit by bit. Its code is an 8-bit truth table: bit
//! `(p << 2) | (s << 1) | d` of the code is the result for pattern bit `p`,
//! source bit `s` and destination bit `d`. All 256 codes therefore exist,
//! and the classic names (`DPSoon`, `PSDPSanaxx`, ...) are reverse-polish
//! formulas over `D`, `S`, `P` with the operators `a` (and), `o` (or),
//! `x` (xor) and `n` (not).
//!
//! [`Rop3Engine`] compiles every named formula once, checks it against the
//! reference vector `D = 0xAA, S = 0xCC, P = 0xF0` (for which every formula
//! must produce its own code) at 16 and 32 bits, and then applies codes to
//! 16- and 32-bit surfaces through a single truth-table evaluator.

use core::fmt;

use crate::basics::Point;
use crate::error::{RasterError, Result};
use crate::rendering_buffer::{read_word, write_word, PixelBuf, PixelBufMut};

// ============================================================================
// Codes
// ============================================================================

/// A validated ternary rop code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RopCode(u8);

impl RopCode {
    pub const BLACKNESS: RopCode = RopCode(0x00);
    pub const NOTSRCERASE: RopCode = RopCode(0x11);
    pub const NOTSRCCOPY: RopCode = RopCode(0x33);
    pub const SRCERASE: RopCode = RopCode(0x44);
    pub const DSTINVERT: RopCode = RopCode(0x55);
    pub const PATINVERT: RopCode = RopCode(0x5a);
    pub const SRCINVERT: RopCode = RopCode(0x66);
    pub const SRCAND: RopCode = RopCode(0x88);
    pub const MERGEPAINT: RopCode = RopCode(0xbb);
    pub const MERGECOPY: RopCode = RopCode(0xc0);
    pub const SRCCOPY: RopCode = RopCode(0xcc);
    pub const SRCPAINT: RopCode = RopCode(0xee);
    pub const PATCOPY: RopCode = RopCode(0xf0);
    pub const PATPAINT: RopCode = RopCode(0xfb);
    pub const WHITENESS: RopCode = RopCode(0xff);

    pub const fn new(code: u8) -> Self {
        RopCode(code)
    }

    #[inline]
    pub fn code(self) -> u8 {
        self.0
    }

    /// Reverse-polish formula name of this code.
    pub fn name(self) -> &'static str {
        ROP3_NAMES[self.0 as usize]
    }
}

impl From<u8> for RopCode {
    fn from(code: u8) -> Self {
        RopCode(code)
    }
}

impl TryFrom<u32> for RopCode {
    type Error = RasterError;

    fn try_from(code: u32) -> Result<Self> {
        u8::try_from(code)
            .map(RopCode)
            .map_err(|_| RasterError::InvalidArgument(format!("rop code {} exceeds 255", code)))
    }
}

impl fmt::Display for RopCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x} ({})", self.0, self.name())
    }
}

/// Formula names indexed by code.
#[rustfmt::skip]
pub const ROP3_NAMES: [&str; 256] = [
    "0", "DPSoon", "DPSona", "PSon", "SDPona", "DPon", "PDSxnon", "PDSaon",
    "SDPnaa", "PDSxon", "DPna", "PSDnaon", "SPna", "PDSnaon", "PDSonon", "Pn",
    "PDSona", "DSon", "SDPxnon", "SDPaon", "DPSxnon", "DPSaon", "PSDPSanaxx", "SSPxDSxaxn",
    "SPxPDxa", "SDPSanaxn", "PDSPaox", "SDPSxaxn", "PSDPaox", "DSPDxaxn", "PDSox", "PDSoan",
    "DPSnaa", "SDPxon", "DSna", "SPDnaon", "SPxDSxa", "PDSPanaxn", "SDPSaox", "SDPSxnox",
    "DPSxa", "PSDPSaoxxn", "DPSana", "SSPxPDxaxn", "SPDSoax", "PSDnox", "PSDPxox", "PSDnoan",
    "PSna", "SDPnaon", "SDPSoox", "Sn", "SPDSaox", "SPDSxnox", "SDPox", "SDPoan",
    "PSDPoax", "SPDnox", "SPDSxox", "SPDnoan", "PSx", "SPDSonox", "SPDSnaox", "PSan",
    "PSDnaa", "DPSxon", "SDxPDxa", "SPDSanaxn", "SDna", "DPSnaon", "DSPDaox", "PSDPxaxn",
    "SDPxa", "PDSPDaoxxn", "DPSDoax", "PDSnox", "SDPana", "SSPxDSxoxn", "PDSPxox", "PDSnoan",
    "PDna", "DSPnaon", "DPSDaox", "SPDSxaxn", "DPSonon", "Dn", "DPSox", "DPSoan",
    "PDSPoax", "DPSnox", "DPx", "DPSDonox", "DPSDxox", "DPSnoan", "DPSDnaox", "DPan",
    "PDSxa", "DSPDSaoxxn", "DSPDoax", "SDPnox", "SDPSoax", "DSPnox", "DSx", "SDPSonox",
    "DSPDSonoxxn", "PDSxxn", "DPSax", "PSDPSoaxxn", "SDPax", "PDSPDoaxxn", "SDPSnoax", "PDSxnan",
    "PDSana", "SSDxPDxaxn", "SDPSxox", "SDPnoan", "DSPDxox", "DSPnoan", "SDPSnaox", "DSan",
    "PDSax", "DSPDSoaxxn", "DPSDnoax", "SDPxnan", "SPDSnoax", "DPSxnan", "SPxDSxo", "DPSaan",
    "DPSaa", "SPxDSxon", "DPSxna", "SPDSnoaxn", "SDPxna", "PDSPnoaxn", "DSPDSoaxx", "PDSaxn",
    "DSa", "SDPSnaoxn", "DSPnoa", "DSPDxoxn", "SDPnoa", "SDPSxoxn", "SSDxPDxax", "PDSanan",
    "PDSxna", "SDPSnoaxn", "DPSDPoaxx", "SPDaxn", "PSDPSoaxx", "DPSaxn", "DPSxx", "PSDPSonoxx",
    "SDPSonoxn", "DSxn", "DPSnax", "SDPSoaxn", "SPDnax", "DSPDoaxn", "DSPDSaoxx", "PDSxan",
    "DPa", "PDSPnaoxn", "DPSnoa", "DPSDxoxn", "PDSPonoxn", "PDxn", "DSPnax", "PDSPoaxn",
    "DPSoa", "DPSoxn", "D", "DPSono", "SPDSxax", "DPSDaoxn", "DSPnao", "DPno",
    "PDSnoa", "PDSPxoxn", "SSPxDSxox", "SDPanan", "PSDnax", "DPSDoaxn", "DPSDPaoxx", "SDPxan",
    "PSDPxax", "DSPDaoxn", "DPSnao", "DSno", "SPDSanax", "SDxPDxan", "DPSxo", "DPSano",
    "PSa", "SPDSnaoxn", "SPDSonoxn", "PSxn", "SPDnoa", "SPDSxoxn", "SDPnax", "PSDPoaxn",
    "SDPoa", "SPDoxn", "DPSDxax", "SPDSaoxn", "S", "SDPono", "SDPnao", "SPno",
    "PSDnoa", "PSDPxoxn", "PDSnax", "SPDSoaxn", "SSPxPDxax", "DPSanan", "PSDPSaoxx", "DPSxan",
    "PDSPxax", "SDPSaoxn", "DPSDanax", "SPxDSxan", "SPDnao", "SDno", "SDPxo", "SDPano",
    "PDSoa", "PDSoxn", "DSPDxax", "PSDPaoxn", "SDPSxax", "PDSPaoxn", "SDPSanax", "SPxPDxan",
    "SSPxDSxax", "DSPDSanaxxn", "DPSao", "DPSxno", "SDPao", "SDPxno", "DSo", "SDPnoo",
    "P", "PDSono", "PDSnao", "PSno", "PSDnao", "PDno", "PDSxo", "PDSano",
    "PDSao", "PDSxno", "DPo", "DPSnoo", "PSo", "PSDnoo", "DPSoo", "1",
];

// ============================================================================
// Formula evaluation
// ============================================================================

/// Reference operand values. Bit `i` of `P`, `S`, `D` spells the minterm
/// index `i`, so evaluating a formula on them yields its truth table.
pub const SELF_TEST_DEST: u8 = 0xaa;
pub const SELF_TEST_SRC: u8 = 0xcc;
pub const SELF_TEST_PAT: u8 = 0xf0;

/// Evaluate a reverse-polish formula on full words.
pub fn eval_formula(formula: &str, pat: u32, src: u32, dest: u32) -> Result<u32> {
    let malformed =
        || RasterError::InvalidArgument(format!("malformed rop formula {:?}", formula));
    let mut stack: Vec<u32> = Vec::with_capacity(8);
    for ch in formula.chars() {
        match ch {
            'D' => stack.push(dest),
            'S' => stack.push(src),
            'P' => stack.push(pat),
            '0' => stack.push(0),
            '1' => stack.push(!0),
            'n' => {
                let v = stack.pop().ok_or_else(malformed)?;
                stack.push(!v);
            }
            'a' | 'o' | 'x' => {
                let b = stack.pop().ok_or_else(malformed)?;
                let a = stack.pop().ok_or_else(malformed)?;
                stack.push(match ch {
                    'a' => a & b,
                    'o' => a | b,
                    _ => a ^ b,
                });
            }
            _ => return Err(malformed()),
        }
    }
    match stack.as_slice() {
        [v] => Ok(*v),
        _ => Err(malformed()),
    }
}

/// Truth table of a formula, obtained by evaluating it on the reference
/// operands.
pub fn compile_formula(formula: &str) -> Result<u8> {
    eval_formula(
        formula,
        u32::from(SELF_TEST_PAT),
        u32::from(SELF_TEST_SRC),
        u32::from(SELF_TEST_DEST),
    )
    .map(|v| v as u8)
}

/// Apply an 8-bit truth table to every bit lane of three words.
#[inline]
pub fn eval_truth_table(table: u8, pat: u32, src: u32, dest: u32) -> u32 {
    let mut out = 0;
    for minterm in 0..8 {
        if table & (1 << minterm) == 0 {
            continue;
        }
        let p = if minterm & 4 != 0 { pat } else { !pat };
        let s = if minterm & 2 != 0 { src } else { !src };
        let d = if minterm & 1 != 0 { dest } else { !dest };
        out |= p & s & d;
    }
    out
}

/// Replicate a byte across the low `bits` bits of a word.
#[inline]
fn replicate(byte: u8, bits: u32) -> u32 {
    let word = u32::from(byte) * 0x0101_0101;
    if bits >= 32 {
        word
    } else {
        word & ((1 << bits) - 1)
    }
}

// ============================================================================
// Rop3Engine
// ============================================================================

/// Compiled and self-tested set of the 256 ternary rops.
///
/// Construction is the only fallible step. Afterwards the engine is
/// immutable and can be shared by reference between threads.
#[derive(Debug, Clone)]
pub struct Rop3Engine {
    tables: [u8; 256],
}

impl Rop3Engine {
    /// Compile every formula and run the self-test at 16 and 32 bits.
    pub fn new() -> Result<Self> {
        let mut tables = [0u8; 256];
        for (slot, name) in tables.iter_mut().zip(ROP3_NAMES.iter()) {
            *slot = compile_formula(name)?;
        }
        let engine = Self { tables };
        engine.self_test()?;
        log::debug!("rop3 engine ready, 256 formulas verified");
        Ok(engine)
    }

    /// Evaluate every compiled formula on the replicated reference vector
    /// and compare against its code.
    pub fn self_test(&self) -> Result<()> {
        for bits in [16u32, 32] {
            let mask = replicate(0xff, bits);
            let d = replicate(SELF_TEST_DEST, bits);
            let s = replicate(SELF_TEST_SRC, bits);
            let p = replicate(SELF_TEST_PAT, bits);
            for code in 0..=255u8 {
                let actual = eval_truth_table(self.tables[code as usize], p, s, d) & mask;
                if actual != replicate(code, bits) {
                    log::error!("rop3 self-test mismatch for {:#04x} at {} bits", code, bits);
                    return Err(RasterError::SelfTest { code, bits, actual });
                }
            }
        }
        Ok(())
    }

    /// Result of `code` for one pixel word.
    #[inline]
    pub fn eval(&self, code: RopCode, pat: u32, src: u32, dest: u32) -> u32 {
        eval_truth_table(self.tables[code.0 as usize], pat, src, dest)
    }

    /// Apply `code` to every pixel of `dest`, reading the source from
    /// `src` at `src_pos` and the pattern from `pattern` at `pat_pos`.
    ///
    /// The pattern tiles: its coordinates wrap modulo its size in both
    /// directions. All three images must share one depth, 16 or 32 bits.
    pub fn apply_with_pattern(
        &self,
        code: RopCode,
        dest: &mut PixelBufMut<'_>,
        src: &PixelBuf<'_>,
        src_pos: Point,
        pattern: &PixelBuf<'_>,
        pat_pos: Point,
    ) -> Result<()> {
        let bpp = check_operands(dest, src, src_pos)?;
        if pattern.bits_per_pixel() != bpp {
            return Err(RasterError::FormatMismatch {
                expected: bpp,
                actual: pattern.bits_per_pixel(),
            });
        }
        if pattern.width() == 0 || pattern.height() == 0 {
            return Err(RasterError::InvalidArgument("empty rop pattern".into()));
        }

        let table = self.tables[code.0 as usize];
        let (pw, ph) = (pattern.width() as i64, pattern.height() as i64);
        let pat_x0 = i64::from(pat_pos.x).rem_euclid(pw) as u32;
        let mut pat_y = i64::from(pat_pos.y).rem_euclid(ph) as u32;

        log::trace!(
            "rop3 {} {}x{} with pattern at {} bits",
            code,
            dest.width(),
            dest.height(),
            bpp
        );

        for y in 0..dest.height() {
            let src_row = src.row(src_pos.y as u32 + y);
            let pat_row = pattern.row(pat_y);
            let dest_row = dest.row_mut(y);
            let mut pat_x = pat_x0;
            for x in 0..dest_row.len() * 8 / bpp as usize {
                let s = read_word(src_row, src_pos.x as usize + x, bpp);
                let p = read_word(pat_row, pat_x as usize, bpp);
                let d = read_word(dest_row, x, bpp);
                write_word(dest_row, x, bpp, eval_truth_table(table, p, s, d));
                pat_x += 1;
                if pat_x == pw as u32 {
                    pat_x = 0;
                }
            }
            pat_y += 1;
            if pat_y == ph as u32 {
                pat_y = 0;
            }
        }
        Ok(())
    }

    /// Same as [`Rop3Engine::apply_with_pattern`] with a constant pattern
    /// word.
    pub fn apply_with_color(
        &self,
        code: RopCode,
        dest: &mut PixelBufMut<'_>,
        src: &PixelBuf<'_>,
        src_pos: Point,
        color: u32,
    ) -> Result<()> {
        let bpp = check_operands(dest, src, src_pos)?;
        let table = self.tables[code.0 as usize];

        log::trace!(
            "rop3 {} {}x{} with color {:#x} at {} bits",
            code,
            dest.width(),
            dest.height(),
            color,
            bpp
        );

        for y in 0..dest.height() {
            let src_row = src.row(src_pos.y as u32 + y);
            let dest_row = dest.row_mut(y);
            for x in 0..dest_row.len() * 8 / bpp as usize {
                let s = read_word(src_row, src_pos.x as usize + x, bpp);
                let d = read_word(dest_row, x, bpp);
                write_word(dest_row, x, bpp, eval_truth_table(table, color, s, d));
            }
        }
        Ok(())
    }
}

/// Validate depths and the source window; returns the shared depth.
fn check_operands(dest: &PixelBufMut<'_>, src: &PixelBuf<'_>, src_pos: Point) -> Result<u32> {
    let bpp = dest.bits_per_pixel();
    if bpp != 16 && bpp != 32 {
        return Err(RasterError::UnsupportedFormat(format!(
            "rop3 on {:?}",
            dest.format()
        )));
    }
    if src.bits_per_pixel() != bpp {
        return Err(RasterError::FormatMismatch {
            expected: bpp,
            actual: src.bits_per_pixel(),
        });
    }
    let window = crate::basics::Rect::from_xywh(
        src_pos.x,
        src_pos.y,
        dest.width() as i32,
        dest.height() as i32,
    );
    src.check_rect(window)?;
    Ok(bpp)
}

// ============================================================================
// Tests
// ============================================================================
