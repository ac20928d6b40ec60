//! Heightmap inspection command

use anyhow::{Context, Result};
use relief_terrain::field::validate_dimensions;
use relief_terrain::HeightImage;
use std::path::Path;
use std::sync::Arc;

pub fn run(image_path: &str) -> Result<()> {
    let image = HeightImage::open(Path::new(image_path))
        .with_context(|| format!("Failed to load heightmap '{}'", image_path))?;

    println!("Heightmap: {}", image_path);
    println!("  Size: {}x{}", image.width(), image.height());

    if let Err(e) = validate_dimensions(image.width(), image.height()) {
        println!("  Invalid: {}", e);
        return Ok(());
    }

    let image = Arc::new(image);
    let lease = image.lock().context("Failed to read heightmap samples")?;
    let (low, high) = lease.field().height_range();
    let (w, h) = (image.width() as usize, image.height() as usize);

    println!("  Luminance: {:.3} .. {:.3}", low, high);
    println!(
        "  Grid: {} vertices, {} triangles",
        w * h,
        2 * (w - 1) * (h - 1)
    );

    Ok(())
}
