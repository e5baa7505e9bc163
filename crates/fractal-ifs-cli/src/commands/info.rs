//! Transform stream inspection command.

use std::path::Path;

use anyhow::{Context, Result};
use fractal_ifs::{CompressedImage, Isometry};

pub fn run(input: &Path) -> Result<()> {
    let compressed = CompressedImage::read(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let params = &compressed.params;
    let grid = &compressed.grid;
    let (width, height) = grid.image_size(params.dst_size());

    println!("Transform stream: {}", input.display());
    println!("  Image: {}x{}", width, height);
    println!("  Grid: {}x{} blocks", grid.rows(), grid.cols());
    println!(
        "  Blocks: src {}, dst {}, stride {}",
        params.src_size(),
        params.dst_size(),
        params.stride()
    );
    println!(
        "  Size: {} bytes ({:.2}x vs 8-bit grey)",
        compressed.compressed_size(),
        compressed.compression_ratio(width * height)
    );

    let contrasts: Vec<f64> = grid.records().iter().map(|r| r.photometric.contrast).collect();
    if !contrasts.is_empty() {
        let max_abs = contrasts.iter().fold(0.0_f64, |m, c| m.max(c.abs()));
        let expanding = contrasts.iter().filter(|c| c.abs() >= 1.0).count();
        println!("  Max |contrast|: {:.3} ({} blocks with |contrast| >= 1)", max_abs, expanding);
    }

    println!();
    println!("{:<20} {:>8}", "Isometry", "Blocks");
    println!("{:-<29}", "");
    for (iso, count) in Isometry::ALL.iter().zip(grid.isometry_histogram()) {
        println!("{:<20} {:>8}", iso.to_string(), count);
    }

    Ok(())
}
