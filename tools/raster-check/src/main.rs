// Command line front end for raster-compositor.
//
// Usage:
//   raster-check selftest
//   raster-check classify-fuzz [--iterations N] [--seed S]
//   raster-check render [--width W] [--height H] [-o scene.bmp]

use std::error::Error;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use raster_check::{classify_fuzz, render_scene, save_bmp};
use raster_compositor::{CompositorConfig, FillRule, Rop3Engine};

#[derive(Debug, Parser)]
#[command(bin_name = "raster-check")]
#[command(about = "Self-test, region fuzzing and demo rendering for raster-compositor")]
#[command(version)]
#[command(arg_required_else_help(true))]
struct CliArg {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Verify all 256 rop3 codes at 16 and 32 bits.
    Selftest,

    /// Compare fast region classification against the set-algebra reference.
    ClassifyFuzz {
        #[arg(long, default_value_t = 10_000)]
        iterations: usize,

        #[arg(long, default_value_t = 1)]
        seed: u64,

        /// Upper bound on rectangles per random region.
        #[arg(long, default_value_t = 8)]
        max_rects: usize,

        /// Coordinates are drawn from `0..span`.
        #[arg(long, default_value_t = 64)]
        span: i32,
    },

    /// Render the demo scene to a BMP file.
    Render {
        #[arg(long, default_value_t = 256)]
        width: u32,

        #[arg(long, default_value_t = 256)]
        height: u32,

        #[arg(short, long, default_value = "scene.bmp")]
        output: PathBuf,

        #[arg(long, value_enum, default_value_t = RuleArg::EvenOdd)]
        fill_rule: RuleArg,

        /// Points per flattened Bezier run.
        #[arg(long, default_value_t = raster_compositor::config::DEFAULT_BEZIER_POINTS)]
        bezier_points: usize,

        /// Cap on pooled vertices per primitive.
        #[arg(long)]
        max_vertices: Option<usize>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RuleArg {
    EvenOdd,
    NonZero,
}

impl From<RuleArg> for FillRule {
    fn from(rule: RuleArg) -> Self {
        match rule {
            RuleArg::EvenOdd => FillRule::EvenOdd,
            RuleArg::NonZero => FillRule::NonZero,
        }
    }
}

fn main() {
    env_logger::init();
    let cli = CliArg::parse();
    if let Err(e) = run(cli.command) {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn run(command: CliCommand) -> Result<(), Box<dyn Error>> {
    match command {
        CliCommand::Selftest => {
            let engine = Rop3Engine::new()?;
            engine.self_test()?;
            println!("rop3: 256 codes verified at 16 and 32 bits");
        }
        CliCommand::ClassifyFuzz {
            iterations,
            seed,
            max_rects,
            span,
        } => {
            if span < 2 {
                return Err("span must be at least 2".into());
            }
            let report = classify_fuzz(iterations, seed, max_rects, span);
            println!(
                "classify: {} queries, {} mismatches",
                report.checked,
                report.mismatches.len()
            );
            if let Some(m) = report.mismatches.first() {
                println!("first mismatch for {:?}:", m.query);
                println!("  left:  {}", m.left);
                println!("  right: {}", m.right);
                println!("  fast {:?}, reference {:?}", m.fast, m.reference);
                return Err("region classification disagrees with the reference".into());
            }
        }
        CliCommand::Render {
            width,
            height,
            output,
            fill_rule,
            bezier_points,
            max_vertices,
        } => {
            let config = CompositorConfig::default()
                .with_fill_rule(fill_rule.into())
                .with_bezier_points(bezier_points)
                .with_max_pool_vertices(max_vertices);
            println!("Rendering {}x{} scene...", width, height);
            let image = render_scene(width, height, config)?;
            save_bmp(&output, &image.view())?;
            println!("Saved: {}", output.display());
        }
    }
    Ok(())
}
