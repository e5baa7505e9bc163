//! Round-trip evaluation command.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use fractal_ifs::{CompressedImage, ConvergenceReport, MetricConfig};

use crate::commands::decode::{print_summary, reconstruct, write_frames};
use crate::commands::encode::{encode_with_bar, params_from};
use crate::image_io::{load_gray, save_gray};
use crate::{DecodeArgs, GeometryArgs};

pub fn run(
    input: &Path,
    report_dir: &Path,
    geometry: &GeometryArgs,
    decode: &DecodeArgs,
    dssim: bool,
    verbose: bool,
) -> Result<()> {
    let params = params_from(geometry)?;
    let image = load_gray(input, geometry.downscale, params.dst_size())?;
    if verbose {
        eprintln!("Loaded {} ({}x{})", input.display(), image.width(), image.height());
    }

    let (grid, stats) = encode_with_bar(image.as_ref(), params)?;
    let compressed = CompressedImage::new(params, grid);

    // The report needs every pass, not just the final image.
    let start = Instant::now();
    let reconstruction = reconstruct(&compressed, decode, true)?;
    let decode_time = start.elapsed();
    print_summary(&reconstruction, decode_time.as_secs_f64());

    let config = MetricConfig {
        dssim,
        psnr: true,
    };
    let name = input
        .file_stem()
        .map_or_else(|| "image".to_string(), |s| s.to_string_lossy().into_owned());
    let report = ConvergenceReport::evaluate(
        &name,
        image.as_ref(),
        &compressed,
        &reconstruction,
        stats.elapsed,
        decode_time,
        &config,
    )?;

    println!();
    println!("{:>5} {:>12} {:>10} {:>8}", "Iter", "Delta", "RMSE", "PSNR");
    println!("{:-<38}", "");
    for it in &report.iterations {
        println!(
            "{:>5} {:>12} {:>10.3} {:>8}",
            it.iteration,
            it.delta.map_or("-".to_string(), |d| format!("{:.4}", d)),
            it.metrics.rmse(),
            it.metrics.psnr.map_or("-".to_string(), |p| format!("{:.2}", p))
        );
    }
    println!();
    println!(
        "Compression: {} -> {} bytes ({:.2}x)",
        report.uncompressed_size,
        report.compressed_size,
        report.compression_ratio()
    );

    report
        .write(report_dir)
        .with_context(|| format!("Failed to write report to {}", report_dir.display()))?;
    println!("Saved report to: {}", report_dir.display());

    let output = report_dir.join(format!("{name}_decoded.png"));
    save_gray(&output, reconstruction.image.as_ref())?;
    println!("Saved reconstruction to: {}", output.display());

    if let Some(dir) = &decode.frames {
        write_frames(dir, &reconstruction)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SeedKind;
    use crate::commands::{decode as decode_cmd, encode as encode_cmd, info};
    use imgref::ImgVec;

    fn geometry() -> GeometryArgs {
        GeometryArgs {
            src_size: 8,
            dst_size: 4,
            stride: 4,
            downscale: 1,
        }
    }

    fn decode_args(frames: Option<std::path::PathBuf>) -> DecodeArgs {
        DecodeArgs {
            iterations: 6,
            seed: SeedKind::Zero,
            rng_seed: 0,
            tolerance: None,
            frames,
        }
    }

    fn write_ramp(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("ramp.png");
        let ramp = ImgVec::new((0..16).flat_map(|_| (0..16).map(|x| f64::from(x) * 16.0)).collect(), 16, 16);
        save_gray(&path, ramp.as_ref()).unwrap();
        path
    }

    #[test]
    fn test_encode_decode_info_commands() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_ramp(dir.path());
        let stream = dir.path().join("ramp.fic");
        let json = dir.path().join("ramp.json");
        let output = dir.path().join("out.png");
        let frames = dir.path().join("frames");

        encode_cmd::run(&input, &stream, &geometry(), Some(json.as_path()), false).unwrap();
        assert!(stream.exists());
        assert!(json.exists());

        decode_cmd::run(&stream, &output, &decode_args(Some(frames.clone())), false).unwrap();
        let decoded = load_gray(&output, 1, 4).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 16));
        assert!(frames.join("iter_000.png").exists());
        assert!(frames.join("iter_006.png").exists());

        info::run(&stream).unwrap();
    }

    #[test]
    fn test_eval_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_ramp(dir.path());
        let reports = dir.path().join("reports");

        run(&input, &reports, &geometry(), &decode_args(None), false, false).unwrap();
        assert!(reports.join("ramp.json").exists());
        assert!(reports.join("ramp.csv").exists());
        assert!(reports.join("ramp_decoded.png").exists());
    }
}
