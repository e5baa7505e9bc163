//! Loading and saving grey images with the `image` crate.

use std::path::Path;

use anyhow::{Context, Result, bail};
use fractal_ifs::reduce;
use image::GrayImage;
use imgref::{ImgRef, ImgVec};
use log::warn;

/// Load `path` as 8-bit luma samples in `[0, 255]`.
///
/// The image is cropped to a multiple of `downscale * block` and then
/// shrunk by `downscale`, so the result tiles exactly into `block`-sized
/// destination blocks.
pub fn load_gray(path: &Path, downscale: usize, block: usize) -> Result<ImgVec<f64>> {
    if downscale == 0 {
        bail!("downscale factor must be positive");
    }
    let luma = image::open(path)
        .with_context(|| format!("Failed to open image {}", path.display()))?
        .to_luma8();
    let (width, height) = (luma.width() as usize, luma.height() as usize);
    let samples: Vec<f64> = luma.into_raw().into_iter().map(f64::from).collect();
    let image = ImgVec::new(samples, width, height);

    let unit = downscale * block.max(1);
    let (crop_w, crop_h) = (width - width % unit, height - height % unit);
    if crop_w == 0 || crop_h == 0 {
        bail!("{}x{} image is smaller than one {unit}x{unit} block", width, height);
    }
    if (crop_w, crop_h) != (width, height) {
        warn!("cropping {}x{} to {}x{}", width, height, crop_w, crop_h);
    }

    let cropped = image.as_ref().sub_image(0, 0, crop_w, crop_h);
    Ok(reduce(cropped, downscale)?)
}

/// Round and clamp samples to 8-bit grey.
pub fn to_gray8(image: ImgRef<'_, f64>) -> Result<GrayImage> {
    let samples: Vec<u8> = image
        .pixels()
        .map(|v| v.round().clamp(0.0, 255.0) as u8)
        .collect();
    GrayImage::from_raw(image.width() as u32, image.height() as u32, samples)
        .context("Image buffer does not match its dimensions")
}

/// Save samples as an 8-bit grey image; the format follows the extension.
pub fn save_gray(path: &Path, image: ImgRef<'_, f64>) -> Result<()> {
    to_gray8(image)?
        .save(path)
        .with_context(|| format!("Failed to write image {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_gray8_rounds_and_clamps() {
        let img = ImgVec::new(vec![-3.0, 12.4, 12.6, 300.0], 2, 2);
        let gray = to_gray8(img.as_ref()).unwrap();
        assert_eq!(gray.into_raw(), vec![0, 12, 13, 255]);
    }

    #[test]
    fn test_load_crops_and_downscales() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.png");
        let source = ImgVec::new((0..18 * 10).map(|i| f64::from(i % 200)).collect(), 18, 10);
        save_gray(&path, source.as_ref()).unwrap();

        let loaded = load_gray(&path, 1, 4).unwrap();
        assert_eq!((loaded.width(), loaded.height()), (16, 8));
        assert_eq!(loaded.buf()[..16], source.buf()[..16]);

        let halved = load_gray(&path, 2, 4).unwrap();
        assert_eq!((halved.width(), halved.height()), (8, 4));
    }

    #[test]
    fn test_load_rejects_tiny_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.png");
        save_gray(&path, ImgVec::new(vec![0.0; 4], 2, 2).as_ref()).unwrap();
        assert!(load_gray(&path, 1, 4).is_err());
    }
}
