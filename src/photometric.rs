//! Least-squares contrast/brightness fitting between two blocks.
//!
//! For a destination block `D` and candidate `S`, [`fit`] finds scalars
//! `contrast` and `brightness` minimising `Σ (D - (contrast·S + brightness))²`.
//! The normal equations of the design matrix `[1, S]` are solved in centred
//! form, which is the same solution with less cancellation.

use imgref::ImgRef;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Affine sample correction `contrast · x + brightness`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Photometric {
    /// Multiplicative term.
    pub contrast: f64,
    /// Additive term.
    pub brightness: f64,
}

impl Photometric {
    /// Create a correction.
    #[must_use]
    pub fn new(contrast: f64, brightness: f64) -> Self {
        Self {
            contrast,
            brightness,
        }
    }

    /// Apply the correction to one sample.
    #[inline]
    pub fn apply(&self, x: f64) -> f64 {
        self.contrast * x + self.brightness
    }
}

/// Mean and centred sum of squares of a sample set.
///
/// Candidates are fitted against many destination blocks, so their
/// statistics are computed once and reused.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SampleStats {
    pub mean: f64,
    pub centered_sq: f64,
    pub sum_sq: f64,
}

impl SampleStats {
    pub fn of(samples: &[f64]) -> Self {
        let n = samples.len().max(1) as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let mut centered_sq = 0.0;
        let mut sum_sq = 0.0;
        for &s in samples {
            centered_sq += (s - mean) * (s - mean);
            sum_sq += s * s;
        }
        Self {
            mean,
            centered_sq,
            sum_sq,
        }
    }

    /// Zero variance, up to rounding relative to the sample magnitude.
    pub fn is_flat(&self) -> bool {
        self.centered_sq <= f64::EPSILON * self.sum_sq
    }
}

/// Fit `destination ≈ contrast · source + brightness`.
///
/// A constant `source` makes the system rank-deficient; the fit then falls
/// back to `contrast = 0, brightness = mean(destination)`.
///
/// # Errors
///
/// Returns [`Error::DimensionMismatch`] if the blocks differ in shape.
pub fn fit(destination: ImgRef<'_, f64>, source: ImgRef<'_, f64>) -> Result<Photometric> {
    check_same_shape(destination, source)?;
    let d: Vec<f64> = destination.pixels().collect();
    let s: Vec<f64> = source.pixels().collect();
    Ok(fit_samples(&d, SampleStats::of(&d).mean, &s, &SampleStats::of(&s)))
}

/// Squared error `Σ (destination - (contrast · source + brightness))²`.
pub fn squared_error(
    destination: ImgRef<'_, f64>,
    source: ImgRef<'_, f64>,
    correction: Photometric,
) -> Result<f64> {
    check_same_shape(destination, source)?;
    Ok(destination
        .pixels()
        .zip(source.pixels())
        .map(|(d, s)| {
            let r = d - correction.apply(s);
            r * r
        })
        .sum())
}

fn check_same_shape(a: ImgRef<'_, f64>, b: ImgRef<'_, f64>) -> Result<()> {
    if a.width() != b.width() || a.height() != b.height() {
        return Err(Error::DimensionMismatch {
            expected: (a.width(), a.height()),
            actual: (b.width(), b.height()),
        });
    }
    Ok(())
}

/// Fit over flat sample slices with precomputed statistics.
pub(crate) fn fit_samples(d: &[f64], d_mean: f64, s: &[f64], s_stats: &SampleStats) -> Photometric {
    if s_stats.is_flat() {
        return Photometric::new(0.0, d_mean);
    }
    let covariance: f64 = d
        .iter()
        .zip(s)
        .map(|(&d, &s)| (s - s_stats.mean) * (d - d_mean))
        .sum();
    let contrast = covariance / s_stats.centered_sq;
    Photometric::new(contrast, d_mean - contrast * s_stats.mean)
}

/// Squared residual over flat sample slices.
#[inline]
pub(crate) fn residual(d: &[f64], s: &[f64], correction: Photometric) -> f64 {
    d.iter()
        .zip(s)
        .map(|(&d, &s)| {
            let r = d - correction.apply(s);
            r * r
        })
        .sum()
}
