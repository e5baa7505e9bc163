//! Encode command.

use std::ops::ControlFlow;
use std::path::Path;

use anyhow::{Context, Result};
use fractal_ifs::{CompressedImage, EncodeStats, Encoder, FractalParams, TransformGrid};
use imgref::ImgRef;
use indicatif::{ProgressBar, ProgressStyle};

use crate::GeometryArgs;
use crate::image_io::load_gray;

pub fn run(
    input: &Path,
    output: &Path,
    geometry: &GeometryArgs,
    json: Option<&Path>,
    verbose: bool,
) -> Result<()> {
    let params = params_from(geometry)?;
    let image = load_gray(input, geometry.downscale, params.dst_size())?;
    if verbose {
        eprintln!("Loaded {} ({}x{})", input.display(), image.width(), image.height());
    }

    let (grid, stats) = encode_with_bar(image.as_ref(), params)?;
    let compressed = CompressedImage::new(params, grid);
    compressed
        .write(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    let uncompressed = image.width() * image.height();
    println!(
        "Encoded {} blocks in {:.2}s ({} candidates per block)",
        stats.blocks,
        stats.elapsed.as_secs_f64(),
        stats.candidates
    );
    println!(
        "  Size: {} -> {} bytes ({:.2}x)",
        uncompressed,
        compressed.compressed_size(),
        compressed.compression_ratio(uncompressed)
    );
    println!("  Collage RMSE: {:.3}", stats.collage_mse(params.dst_size()).sqrt());
    println!("Saved to: {}", output.display());

    if let Some(json_path) = json {
        std::fs::write(json_path, compressed.to_json()?)
            .with_context(|| format!("Failed to write to {}", json_path.display()))?;
        println!("Saved JSON to: {}", json_path.display());
    }

    Ok(())
}

pub fn params_from(geometry: &GeometryArgs) -> Result<FractalParams> {
    FractalParams::builder()
        .src_size(geometry.src_size)
        .dst_size(geometry.dst_size)
        .stride(geometry.stride)
        .build()
        .context("Invalid block geometry")
}

/// Encode while driving a progress bar from the encoder's progress hook.
pub fn encode_with_bar(image: ImgRef<'_, f64>, params: FractalParams) -> Result<(TransformGrid, EncodeStats)> {
    let (rows, cols) = params.grid_shape(image.width(), image.height());
    let bar = ProgressBar::new((rows * cols) as u64);
    bar.set_style(ProgressStyle::with_template("[{bar:40}] {percent}% {pos}/{len} blocks ({eta})")?);

    let hook = bar.clone();
    let result = Encoder::new(params)
        .with_progress(move |_| {
            hook.inc(1);
            ControlFlow::Continue(())
        })
        .encode_with_stats(image);
    bar.finish_and_clear();

    result.context("Encoding failed")
}
