// Library half of the raster-check CLI.
//
// Provides BMP output, the demo scene and the randomized region
// classification check.

use std::fs::File;
use std::io::{self, BufWriter, Write};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use raster_compositor::pixel_format::recode;
use raster_compositor::{
    ClipOp, ClipStencilCompositor, CompositorConfig, Coverage, CoverageDepth, MaskId,
    MemorySurfaces, Path, PixelBuf, PixelFormat, PixelImage, Point, PointD, RasterError, Rect,
    Region, RegionTest, Rop2, Rop3Engine, RopCode, Shape,
};

// ============================================================================
// BMP output (32-bit BGRA, top-down)
// ============================================================================

/// Save an image as a 32-bit BMP file. Images of other depths are recoded
/// to `X8R8G8B8` first.
pub fn save_bmp(path: &std::path::Path, image: &PixelBuf<'_>) -> io::Result<()> {
    let converted;
    let view = if image.bits_per_pixel() == 32 {
        *image
    } else {
        converted = recode(image, PixelFormat::X8R8G8B8)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        converted.view()
    };

    let w = view.width();
    let h = view.height();
    let row_size = w * 4;
    let image_size = row_size * h;
    let file_size = 14 + 40 + image_size;

    let mut f = BufWriter::new(File::create(path)?);

    // BMP file header (14 bytes)
    f.write_all(b"BM")?;
    f.write_all(&file_size.to_le_bytes())?;
    f.write_all(&[0u8; 4])?; // reserved
    f.write_all(&(14u32 + 40).to_le_bytes())?; // pixel data offset

    // BITMAPINFOHEADER (40 bytes)
    f.write_all(&40u32.to_le_bytes())?;
    f.write_all(&w.to_le_bytes())?;
    f.write_all(&(-(h as i32)).to_le_bytes())?; // negative height = top-down
    f.write_all(&1u16.to_le_bytes())?; // planes
    f.write_all(&32u16.to_le_bytes())?;
    f.write_all(&0u32.to_le_bytes())?; // BI_RGB
    f.write_all(&image_size.to_le_bytes())?;
    f.write_all(&[0u8; 8])?; // pixels per meter
    f.write_all(&0u32.to_le_bytes())?; // colors used
    f.write_all(&0u32.to_le_bytes())?; // important colors

    // Little-endian 0xAARRGGBB words are already B, G, R, A in memory.
    for y in 0..h {
        f.write_all(view.row(y))?;
    }
    f.flush()
}

// ============================================================================
// Demo scene
// ============================================================================

const SCENE_SURFACE: u32 = 0;

/// Five-pointed star drawn as one self-intersecting contour.
pub fn star_path(cx: f64, cy: f64, radius: f64) -> Path {
    let mut path = Path::new();
    for i in 0..5 {
        let angle = -std::f64::consts::FRAC_PI_2 + f64::from(i * 2) * std::f64::consts::PI * 2.0 / 5.0;
        let (x, y) = (cx + radius * angle.cos(), cy + radius * angle.sin());
        if i == 0 {
            path.move_to(x, y);
        } else {
            path.line_to(x, y);
        }
    }
    path.close();
    path
}

/// Circle made of four cubic arcs.
pub fn circle_path(cx: f64, cy: f64, r: f64) -> Path {
    let k = 0.552_284_75 * r;
    let mut path = Path::new();
    path.move_to(cx + r, cy);
    path.curve_to(PointD::new(cx + r, cy + k), PointD::new(cx + k, cy + r), cx, cy + r);
    path.curve_to(PointD::new(cx - k, cy + r), PointD::new(cx - r, cy + k), cx - r, cy);
    path.curve_to(PointD::new(cx - r, cy - k), PointD::new(cx - k, cy - r), cx, cy - r);
    path.curve_to(PointD::new(cx + k, cy - r), PointD::new(cx + r, cy - k), cx + r, cy);
    path.close();
    path
}

fn checker_tile() -> PixelImage {
    let mut tile = PixelImage::new(PixelFormat::X8R8G8B8, 8, 8);
    let mut view = tile.view_mut();
    for y in 0..8 {
        for x in 0..8 {
            let on = (x / 4 + y / 4) % 2 == 0;
            view.set_pixel(x, y, if on { 0x0030_3a48 } else { 0x00e0_b040 });
        }
    }
    tile
}

/// Render the demo scene: a checkered star clip with a round hole, an XOR
/// half, an alpha ramp behind a mask, dashed strokes and a rop3 block.
pub fn render_scene(
    width: u32,
    height: u32,
    config: CompositorConfig,
) -> raster_compositor::Result<PixelImage> {
    let mut surfaces = MemorySurfaces::new();
    surfaces.create(SCENE_SURFACE, PixelFormat::X8R8G8B8, width, height, 8);
    let bounds = Rect::new(0, 0, width as i32, height as i32);
    let (w, h) = (f64::from(width), f64::from(height));
    let star = star_path(w * 0.5, h * 0.5, w.min(h) * 0.45);

    {
        let mut c = ClipStencilCompositor::bind(&mut surfaces, SCENE_SURFACE, config)?;
        c.set_color(0xfff4_f1e8);
        c.fill_rect(bounds)?;

        c.clip(Shape::Path(&star), ClipOp::Set)?;
        let hole = circle_path(w * 0.5, h * 0.5, w.min(h) * 0.12);
        c.clip(Shape::Path(&hole), ClipOp::Exclude)?;
        let tile = checker_tile();
        c.set_pattern(Point::new(0, 0), &tile.view())?;
        c.fill_rect(bounds)?;

        c.set_op(Rop2::Xor);
        c.set_color(0x00ff_ffff);
        c.fill_rect(Rect::new(0, 0, width as i32 / 2, height as i32))?;
        c.set_op(Rop2::Copy);
        c.reset_clip();

        let band = Rect::new(0, height as i32 * 3 / 4, width as i32, height as i32);
        c.set_mask(MaskId::A, Shape::Rect(band))?;
        let ramp: Vec<u8> = (0..width)
            .map(|x| (x * 255 / width.max(1)) as u8)
            .collect();
        let coverage = Coverage::new(&ramp, CoverageDepth::A8, width, 1, ramp.len())?;
        c.set_color(0xff20_60c0);
        for y in band.top..band.bottom {
            c.fill_alpha(Point::new(0, y), &coverage)?;
        }
        c.clear_mask(MaskId::A);

        c.set_color(0xffc0_2020);
        c.set_line_width(3.0);
        c.set_line_dash(&[12.0, 6.0], 0.0)?;
        c.stroke_path(&star)?;
        c.set_line_dash(&[], 0.0)?;
        c.set_line_width(1.0);
        c.stroke_rect(bounds)?;
    }

    let mut image = surfaces
        .remove(SCENE_SURFACE)
        .ok_or_else(|| RasterError::InvalidArgument("scene surface missing".into()))?;
    if width >= 40 && height >= 40 {
        let block = Rect::new(4, 4, 36, 36);
        let mut source = PixelImage::new(PixelFormat::X8R8G8B8, 32, 32);
        {
            let mut v = source.view_mut();
            for y in 0..32 {
                for x in 0..32 {
                    v.set_pixel(x, y, (x * 8) << 16 | (y * 8) << 8);
                }
            }
        }
        let engine = Rop3Engine::new()?;
        let mut target = image.view_mut();
        let mut dest = target.sub_view_mut(block)?;
        engine.apply_with_color(
            RopCode::SRCINVERT,
            &mut dest,
            &source.view(),
            Point::new(0, 0),
            0,
        )?;
    }
    Ok(image)
}

// ============================================================================
// Randomized classification
// ============================================================================

/// Classification derived from the set operations.
pub fn reference_classify(left: &Region, right: &Region) -> RegionTest {
    let mut res = RegionTest::empty();
    let mut shared = left.clone();
    shared.intersect(right);
    if !shared.is_empty() {
        res |= RegionTest::SHARED;
    }
    let mut only_left = left.clone();
    only_left.subtract(right);
    if !only_left.is_empty() {
        res |= RegionTest::LEFT_EXCLUSIVE;
    }
    let mut only_right = right.clone();
    only_right.subtract(left);
    if !only_right.is_empty() {
        res |= RegionTest::RIGHT_EXCLUSIVE;
    }
    res
}

/// Union of up to `max_rects` random rectangles inside `0..span`.
pub fn random_region<R: Rng>(rng: &mut R, max_rects: usize, span: i32) -> Region {
    let n = rng.gen_range(0..=max_rects);
    let rects: Vec<Rect> = (0..n)
        .map(|_| {
            let x = rng.gen_range(0..span);
            let y = rng.gen_range(0..span);
            let w = rng.gen_range(0..=span / 2);
            let h = rng.gen_range(0..=span / 2);
            Rect::from_xywh(x, y, w, h)
        })
        .collect();
    Region::from_rects(&rects)
}

#[derive(Debug, Clone)]
pub struct Mismatch {
    pub left: Region,
    pub right: Region,
    pub query: RegionTest,
    pub fast: RegionTest,
    pub reference: RegionTest,
}

#[derive(Debug, Clone, Default)]
pub struct FuzzReport {
    pub checked: usize,
    pub mismatches: Vec<Mismatch>,
}

const QUERIES: [RegionTest; 4] = [
    RegionTest::ALL,
    RegionTest::SHARED,
    RegionTest::LEFT_EXCLUSIVE,
    RegionTest::RIGHT_EXCLUSIVE,
];

/// Compare `Region::classify` with [`reference_classify`] on `iterations`
/// random pairs. Some pairs are derived from each other so that the
/// containment shortcuts get exercised.
pub fn classify_fuzz(iterations: usize, seed: u64, max_rects: usize, span: i32) -> FuzzReport {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut report = FuzzReport::default();
    for _ in 0..iterations {
        let left = random_region(&mut rng, max_rects, span);
        let right = match rng.gen_range(0..4) {
            0 => left.clone(),
            1 => {
                let mut r = left.clone();
                r.intersect(&random_region(&mut rng, max_rects, span));
                r
            }
            _ => random_region(&mut rng, max_rects, span),
        };
        let reference = reference_classify(&left, &right);
        for query in QUERIES {
            let fast = left.classify(&right, query);
            report.checked += 1;
            if fast != reference & query {
                log::warn!("classify mismatch for {:?}: {:?} vs {:?}", query, fast, reference);
                report.mismatches.push(Mismatch {
                    left: left.clone(),
                    right: right.clone(),
                    query,
                    fast,
                    reference: reference & query,
                });
            }
        }
    }
    report
}
