//! Quality metrics for comparing a reconstruction with its original.
//!
//! Supported metrics:
//!
//! - **MSE / RMSE**: mean squared error and its root (lower is better)
//! - **PSNR**: Peak Signal-to-Noise Ratio for a 255 peak (higher is better)
//! - **DSSIM**: Structural dissimilarity via `dssim-core` (lower is better,
//!   requires the `dssim` feature)
//!
//! Samples are compared as they are; nothing is clamped except for DSSIM,
//! which needs values in the displayable `[0, 255]` range.

#[cfg(feature = "dssim")]
pub mod dssim;

use imgref::ImgRef;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration for which optional metrics to calculate.
///
/// MSE is always computed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricConfig {
    /// Calculate DSSIM (structural dissimilarity).
    pub dssim: bool,
    /// Calculate PSNR (peak signal-to-noise ratio).
    pub psnr: bool,
}

impl MetricConfig {
    /// Calculate all available metrics.
    #[must_use]
    pub fn all() -> Self {
        Self {
            dssim: cfg!(feature = "dssim"),
            psnr: true,
        }
    }

    /// Fast metric set (PSNR only).
    #[must_use]
    pub fn fast() -> Self {
        Self {
            dssim: false,
            psnr: true,
        }
    }
}

/// Results from metric calculations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricResult {
    /// Mean squared error per sample.
    pub mse: f64,
    /// PSNR value in dB (higher is better).
    pub psnr: Option<f64>,
    /// DSSIM value (lower is better, 0 = identical).
    pub dssim: Option<f64>,
}

impl MetricResult {
    /// Root mean squared error.
    #[must_use]
    pub fn rmse(&self) -> f64 {
        self.mse.sqrt()
    }
}

fn check_dimensions(reference: ImgRef<'_, f64>, test: ImgRef<'_, f64>) -> Result<()> {
    if reference.width() != test.width() || reference.height() != test.height() {
        return Err(Error::DimensionMismatch {
            expected: (reference.width(), reference.height()),
            actual: (test.width(), test.height()),
        });
    }
    Ok(())
}

/// Mean squared difference between two equally sized images.
///
/// Returns 0 for empty images.
pub fn mse(reference: ImgRef<'_, f64>, test: ImgRef<'_, f64>) -> Result<f64> {
    check_dimensions(reference, test)?;
    let count = reference.width() * reference.height();
    if count == 0 {
        return Ok(0.0);
    }
    let sum: f64 = reference
        .pixels()
        .zip(test.pixels())
        .map(|(r, t)| (r - t) * (r - t))
        .sum();
    Ok(sum / count as f64)
}

/// Root mean squared difference between two equally sized images.
pub fn rmse(reference: ImgRef<'_, f64>, test: ImgRef<'_, f64>) -> Result<f64> {
    mse(reference, test).map(f64::sqrt)
}

/// Calculate PSNR between two images with samples on a 0-255 scale.
///
/// Returns `f64::INFINITY` if the images are identical.
pub fn calculate_psnr(reference: ImgRef<'_, f64>, test: ImgRef<'_, f64>) -> Result<f64> {
    let mse = mse(reference, test)?;
    Ok(psnr_from_mse(mse))
}

/// PSNR in decibels for a given MSE and a 255 peak.
#[must_use]
pub fn psnr_from_mse(mse: f64) -> f64 {
    if mse == 0.0 {
        f64::INFINITY
    } else {
        10.0 * (255.0_f64 * 255.0 / mse).log10()
    }
}

/// Calculate the configured metrics between `reference` and `test`.
pub fn calculate_metrics(
    reference: ImgRef<'_, f64>,
    test: ImgRef<'_, f64>,
    config: &MetricConfig,
) -> Result<MetricResult> {
    let mse = mse(reference, test)?;
    let mut result = MetricResult {
        mse,
        ..MetricResult::default()
    };

    if config.psnr {
        result.psnr = Some(psnr_from_mse(mse));
    }

    #[cfg(feature = "dssim")]
    if config.dssim {
        result.dssim = Some(dssim::calculate_dssim(reference, test)?);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgref::ImgVec;

    #[test]
    fn test_psnr_identical() {
        let data = ImgVec::new(vec![128.0; 100 * 100], 100, 100);
        let psnr = calculate_psnr(data.as_ref(), data.as_ref()).unwrap();
        assert!(psnr.is_infinite());
    }

    #[test]
    fn test_psnr_different() {
        let reference = ImgVec::new(vec![100.0; 100 * 100], 100, 100);
        let test = ImgVec::new(vec![110.0; 100 * 100], 100, 100);
        let psnr = calculate_psnr(reference.as_ref(), test.as_ref()).unwrap();
        // PSNR for constant difference of 10: 10 * log10(255^2 / 100) ≈ 28.13
        assert!(psnr > 28.0);
        assert!(psnr < 29.0);
    }

    #[test]
    fn test_mse_and_rmse() {
        let a = ImgVec::new(vec![0.0, 0.0, 0.0, 0.0], 2, 2);
        let b = ImgVec::new(vec![2.0, 2.0, 0.0, 0.0], 2, 2);
        assert_eq!(mse(a.as_ref(), b.as_ref()).unwrap(), 2.0);
        assert!((rmse(a.as_ref(), b.as_ref()).unwrap() - 2.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = ImgVec::new(vec![0.0; 4], 2, 2);
        let b = ImgVec::new(vec![0.0; 6], 3, 2);
        assert!(matches!(mse(a.as_ref(), b.as_ref()), Err(Error::DimensionMismatch { .. })));
    }

    #[test]
    fn test_calculate_metrics_fast() {
        let a = ImgVec::new(vec![10.0; 64], 8, 8);
        let b = ImgVec::new(vec![12.0; 64], 8, 8);
        let result = calculate_metrics(a.as_ref(), b.as_ref(), &MetricConfig::fast()).unwrap();
        assert_eq!(result.mse, 4.0);
        assert_eq!(result.rmse(), 2.0);
        assert!(result.psnr.is_some());
        assert!(result.dssim.is_none());
    }
}
