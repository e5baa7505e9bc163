//! Decode command.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use fractal_ifs::{CompressedImage, DecodeOptions, Decoder, Reconstruction, Seed, StopReason};

use crate::image_io::save_gray;
use crate::{DecodeArgs, SeedKind};

pub fn run(input: &Path, output: &Path, args: &DecodeArgs, verbose: bool) -> Result<()> {
    let compressed = CompressedImage::read(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    if verbose {
        eprintln!(
            "Loaded {}x{} transform grid from {}",
            compressed.grid.rows(),
            compressed.grid.cols(),
            input.display()
        );
    }

    let start = Instant::now();
    let reconstruction = reconstruct(&compressed, args, args.frames.is_some())?;
    let elapsed = start.elapsed();

    save_gray(output, reconstruction.image.as_ref())?;
    print_summary(&reconstruction, elapsed.as_secs_f64());
    println!("Saved to: {}", output.display());

    if let Some(dir) = &args.frames {
        write_frames(dir, &reconstruction)?;
    }

    Ok(())
}

/// Seed and iterate according to the command-line options.
pub fn reconstruct(
    compressed: &CompressedImage,
    args: &DecodeArgs,
    keep_sequence: bool,
) -> Result<Reconstruction> {
    let decoder = Decoder::new(&compressed.grid, compressed.params).context("Invalid transform grid")?;
    let (width, height) = decoder.image_size();
    let seed = seed_from(args).image(width, height);

    let mut options = DecodeOptions::new(args.iterations).keep_sequence(keep_sequence);
    if let Some(tolerance) = args.tolerance {
        options = options.with_tolerance(tolerance);
    }

    decoder.run(seed.as_ref(), &options).context("Decoding failed")
}

pub fn seed_from(args: &DecodeArgs) -> Seed {
    match args.seed {
        SeedKind::Zero => Seed::Zeros,
        SeedKind::Random => Seed::Random { seed: args.rng_seed },
        SeedKind::Gray => Seed::Constant(128.0),
    }
}

pub fn print_summary(reconstruction: &Reconstruction, seconds: f64) {
    let stop = match reconstruction.stop {
        StopReason::Converged => "converged",
        StopReason::Exhausted => "budget reached",
    };
    println!(
        "Decoded {}x{} in {} passes, {:.3}s ({})",
        reconstruction.image.width(),
        reconstruction.image.height(),
        reconstruction.iterations(),
        seconds,
        stop
    );
    if let Some(delta) = reconstruction.deltas.last() {
        println!("  Last pass change (MSE): {:.6}", delta);
    }
}

/// Write the seed and every pass as `iter_NNN.png`.
pub fn write_frames(dir: &Path, reconstruction: &Reconstruction) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    for (index, frame) in reconstruction.sequence.iter().enumerate() {
        save_gray(&dir.join(format!("iter_{index:03}.png")), frame.as_ref())?;
    }
    println!("Wrote {} frames to: {}", reconstruction.sequence.len(), dir.display());
    Ok(())
}
