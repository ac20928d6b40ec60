//! Terrain generation command

use anyhow::{bail, Context, Result};
use relief_runtime::{FrameClock, TimerManager};
use relief_terrain::{
    GenerationEvent, GenerationStatus, HeightImage, PublishedMesh, SurfaceAppearance,
    TerrainConfig, TerrainGenerator, TerrainMesh,
};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Sleep between frames of the simulated frame loop
const FRAME_TIME: Duration = Duration::from_millis(16);

pub struct GenerateArgs {
    pub image: String,
    pub mode: String,
    pub height_scale: Option<f32>,
    pub spacing: Option<f32>,
    pub rows_per_step: Option<u32>,
    pub config: Option<String>,
    pub output: Option<String>,
    pub format: String,
}

/// JSON summary of a published mesh
#[derive(Serialize)]
struct MeshSummary<'a> {
    image: &'a str,
    mode: &'a str,
    vertices: usize,
    triangles: usize,
    bounds_min: [f32; 3],
    bounds_max: [f32; 3],
    appearance: &'a SurfaceAppearance,
}

pub fn run(args: GenerateArgs) -> Result<()> {
    if args.format != "obj" && args.format != "json" {
        bail!("Unknown format: {}", args.format);
    }

    let mut config = TerrainConfig::load(args.config.as_deref().map(Path::new))
        .context("Failed to load terrain config")?;
    if let Some(spacing) = args.spacing {
        config.mesh.grid_spacing = spacing;
    }
    if let Some(rows) = args.rows_per_step {
        config.chunked.rows_per_step = rows;
    }
    config.validate()?;
    let height_scale = args.height_scale.unwrap_or(config.mesh.height_scale);

    let image = HeightImage::open(Path::new(&args.image))
        .with_context(|| format!("Failed to load heightmap '{}'", args.image))?;
    let mut generator = TerrainGenerator::new(config).with_height_image(Arc::new(image));

    match args.mode.as_str() {
        "sync" => generator.start_synchronous(height_scale)?,
        "async" => run_async(&mut generator, height_scale)?,
        "chunked" => run_chunked(&mut generator, height_scale)?,
        other => bail!("Unknown mode: {} (expected sync, async, or chunked)", other),
    }

    for event in generator.drain_events() {
        if let GenerationEvent::Failed(reason) = event {
            bail!("Generation failed: {}", reason);
        }
    }

    if generator.status() != GenerationStatus::Completed {
        bail!("Generation ended with status {}", generator.status());
    }
    let published = generator
        .take_mesh()
        .context("Generation completed without a mesh")?;

    match args.output.as_deref() {
        Some(path) => {
            let file =
                File::create(path).with_context(|| format!("Failed to create '{}'", path))?;
            write_output(&args, &published, &mut BufWriter::new(file))?;
            eprintln!(
                "Wrote {} vertices, {} triangles to {}",
                published.mesh.vertex_count(),
                published.mesh.triangle_count(),
                path
            );
        }
        None => write_output(&args, &published, &mut io::stdout().lock())?,
    }

    Ok(())
}

fn run_async(generator: &mut TerrainGenerator, height_scale: f32) -> Result<()> {
    generator.start_async(height_scale)?;
    while generator.is_generating() {
        std::thread::sleep(FRAME_TIME);
        generator.poll();
        report_progress(generator.progress());
    }
    eprintln!();
    Ok(())
}

/// Drive chunked generation from a simulated frame loop
fn run_chunked(generator: &mut TerrainGenerator, height_scale: f32) -> Result<()> {
    let mut timers = TimerManager::new();
    let mut clock = FrameClock::new();

    generator.start_chunked(&mut timers, height_scale)?;
    while generator.is_generating() {
        std::thread::sleep(FRAME_TIME);
        timers.advance(clock.tick());
        report_progress(generator.progress());
    }
    eprintln!();
    log::info!(
        "Chunked generation took {} frames ({:.2}s)",
        clock.frame_count,
        clock.total_time
    );
    Ok(())
}

fn report_progress(progress: f32) {
    eprint!("\rGenerating... {:>3.0}%", progress * 100.0);
}

fn write_output(
    args: &GenerateArgs,
    published: &PublishedMesh,
    out: &mut impl Write,
) -> Result<()> {
    match args.format.as_str() {
        "json" => {
            let (lo, hi) = published.mesh.bounds().unwrap_or_default();
            let summary = MeshSummary {
                image: &args.image,
                mode: &args.mode,
                vertices: published.mesh.vertex_count(),
                triangles: published.mesh.triangle_count(),
                bounds_min: lo.to_array(),
                bounds_max: hi.to_array(),
                appearance: &published.appearance,
            };
            serde_json::to_writer_pretty(&mut *out, &summary)?;
            writeln!(out)?;
        }
        _ => write_obj(&published.mesh, published.appearance.material.as_deref(), out)?,
    }
    out.flush()?;
    Ok(())
}

/// Write a Wavefront OBJ with positions, texture coordinates, and 1-based faces
fn write_obj(mesh: &TerrainMesh, material: Option<&str>, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "# Relief terrain")?;
    writeln!(
        out,
        "# {} vertices, {} triangles",
        mesh.vertex_count(),
        mesh.triangle_count()
    )?;

    for p in &mesh.positions {
        writeln!(out, "v {} {} {}", p.x, p.y, p.z)?;
    }
    for uv in &mesh.uvs {
        writeln!(out, "vt {} {}", uv.x, uv.y)?;
    }
    if let Some(material) = material {
        writeln!(out, "usemtl {}", material)?;
    }
    for [a, b, c] in mesh.triangles() {
        let (a, b, c) = (a + 1, b + 1, c + 1);
        writeln!(out, "f {a}/{a} {b}/{b} {c}/{c}")?;
    }
    Ok(())
}
