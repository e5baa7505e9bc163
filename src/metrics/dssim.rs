//! DSSIM (Structural Dissimilarity) metric calculation.
//!
//! Wraps the `dssim-core` crate. Grey samples are clamped to `[0, 255]` and
//! spread over the three colour channels.

use dssim_core::Dssim;
use imgref::{ImgRef, ImgVec};
use rgb::RGBA;

use crate::error::{Error, Result};

/// Calculate DSSIM between two grey images with samples on a 0-255 scale.
///
/// # Returns
///
/// DSSIM value where 0 = identical, higher = more different.
///
/// # Errors
///
/// Returns an error if the images have different dimensions or if DSSIM
/// calculation fails.
pub fn calculate_dssim(reference: ImgRef<'_, f64>, test: ImgRef<'_, f64>) -> Result<f64> {
    if reference.width() != test.width() || reference.height() != test.height() {
        return Err(Error::DimensionMismatch {
            expected: (reference.width(), reference.height()),
            actual: (test.width(), test.height()),
        });
    }

    let dssim = Dssim::new();

    let ref_image = dssim
        .create_image(&gray_to_dssim_image(reference))
        .ok_or_else(|| Error::MetricCalculation {
            metric: "DSSIM".to_string(),
            reason: "Failed to create reference image".to_string(),
        })?;

    let test_image = dssim
        .create_image(&gray_to_dssim_image(test))
        .ok_or_else(|| Error::MetricCalculation {
            metric: "DSSIM".to_string(),
            reason: "Failed to create test image".to_string(),
        })?;

    let (dssim_val, _ssim_maps) = dssim.compare(&ref_image, test_image);

    Ok(f64::from(dssim_val))
}

/// Convert grey samples to the RGBA `[0, 1]` format DSSIM works on.
#[must_use]
pub fn gray_to_dssim_image(image: ImgRef<'_, f64>) -> ImgVec<RGBA<f32>> {
    let pixels: Vec<RGBA<f32>> = image
        .pixels()
        .map(|v| {
            let g = (v.clamp(0.0, 255.0) / 255.0) as f32;
            RGBA { r: g, g, b: g, a: 1.0 }
        })
        .collect();

    ImgVec::new(pixels, image.width(), image.height())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(width: usize, height: usize, low: f64, high: f64) -> ImgVec<f64> {
        ImgVec::new(
            (0..height)
                .flat_map(|y| (0..width).map(move |x| if (x / 4 + y / 4) % 2 == 0 { low } else { high }))
                .collect(),
            width,
            height,
        )
    }

    #[test]
    fn test_identical_images() {
        let img = checker(64, 64, 40.0, 200.0);
        let dssim = calculate_dssim(img.as_ref(), img.as_ref()).unwrap();
        assert!(dssim < 0.0001, "Identical images should have near-zero DSSIM");
    }

    #[test]
    fn test_different_images() {
        let a = checker(64, 64, 40.0, 200.0);
        let b = checker(64, 64, 200.0, 40.0);
        let dssim = calculate_dssim(a.as_ref(), b.as_ref()).unwrap();
        assert!(dssim > 0.0, "Different images should have non-zero DSSIM");
    }

    #[test]
    fn test_dimension_mismatch() {
        let small = checker(32, 32, 0.0, 255.0);
        let large = checker(64, 64, 0.0, 255.0);
        let result = calculate_dssim(small.as_ref(), large.as_ref());
        assert!(matches!(result, Err(Error::DimensionMismatch { .. })));
    }

    #[test]
    fn test_conversion_clamps() {
        let img = ImgVec::new(vec![-20.0, 127.5, 300.0], 3, 1);
        let converted = gray_to_dssim_image(img.as_ref());
        let pixels: Vec<_> = converted.pixels().collect();
        assert_eq!(pixels[0].r, 0.0);
        assert!((pixels[1].g - 0.5).abs() < 0.001);
        assert_eq!(pixels[2].b, 1.0);
    }
}
