//! Brute-force transform search.
//!
//! Every destination block is compared with every candidate in the
//! [`CandidatePool`]; the candidate and correction with the smallest squared
//! error wins. Blocks are searched in parallel with rayon, each one as a
//! pure reduction over the shared, read-only pool.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use imgref::ImgRef;
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::block::square;
use crate::error::{Error, Result};
use crate::grid::{TransformGrid, TransformRecord};
use crate::params::FractalParams;
use crate::photometric::{Photometric, fit_samples, residual};
use crate::pool::{Candidate, CandidatePool};

/// Encoder progress, reported after each destination block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeProgress {
    /// Blocks searched so far.
    pub completed: usize,
    /// Blocks in the grid.
    pub total: usize,
}

/// Progress callback type.
///
/// Returning [`ControlFlow::Break`] cancels the encode. Blocks finish in
/// parallel, so calls may arrive from several threads and out of order.
pub type ProgressFn = Box<dyn Fn(EncodeProgress) -> ControlFlow<()> + Send + Sync>;

/// Summary of one encoding run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeStats {
    /// Destination blocks encoded.
    pub blocks: usize,
    /// Candidates searched per block.
    pub candidates: usize,
    /// Sum of the per-block squared errors of the chosen transforms.
    pub total_error: f64,
    /// Wall time of the search, pool construction included.
    pub elapsed: Duration,
}

impl EncodeStats {
    /// Mean squared error per sample of the collage (one pass from the original).
    pub fn collage_mse(&self, dst_size: usize) -> f64 {
        let samples = self.blocks * dst_size * dst_size;
        if samples == 0 {
            0.0
        } else {
            self.total_error / samples as f64
        }
    }
}

/// Fractal encoder for a fixed block geometry.
pub struct Encoder {
    params: FractalParams,
    progress: Option<ProgressFn>,
}

impl Encoder {
    /// Create an encoder.
    #[must_use]
    pub fn new(params: FractalParams) -> Self {
        Self {
            params,
            progress: None,
        }
    }

    /// Install a progress/cancellation hook.
    #[must_use]
    pub fn with_progress<F>(mut self, progress: F) -> Self
    where
        F: Fn(EncodeProgress) -> ControlFlow<()> + Send + Sync + 'static,
    {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Block geometry used by this encoder.
    pub fn params(&self) -> &FractalParams {
        &self.params
    }

    /// Encode `image` into a transform grid.
    pub fn encode(&self, image: ImgRef<'_, f64>) -> Result<TransformGrid> {
        self.encode_with_stats(image).map(|(grid, _)| grid)
    }

    /// Encode `image` and report search statistics.
    pub fn encode_with_stats(&self, image: ImgRef<'_, f64>) -> Result<(TransformGrid, EncodeStats)> {
        let start = Instant::now();
        let params = &self.params;
        let dst = params.dst_size();

        let no_candidates = || Error::NoCandidates {
            src_size: params.src_size(),
            width: image.width(),
            height: image.height(),
        };

        // Rows and columns past the last whole block are not encoded, so
        // source blocks must not reach into them either.
        let (rows, cols) = params.grid_shape(image.width(), image.height());
        if rows == 0 || cols == 0 {
            return Err(no_candidates());
        }
        let image = image.sub_image(0, 0, cols * dst, rows * dst);

        let pool = CandidatePool::build(image, params);
        if pool.is_empty() {
            return Err(no_candidates());
        }

        let total = rows * cols;
        debug!(
            "encoding {}x{} image: {}x{} blocks against {} candidates",
            image.width(),
            image.height(),
            rows,
            cols,
            pool.len()
        );

        let completed = AtomicUsize::new(0);
        let cancelled = AtomicBool::new(false);

        let results: Vec<(TransformRecord, f64)> = (0..total)
            .into_par_iter()
            .map(|index| {
                if cancelled.load(Ordering::Relaxed) {
                    return Err(Error::Cancelled {
                        completed: completed.load(Ordering::Relaxed),
                        total,
                    });
                }

                let (row, col) = (index / cols, index % cols);
                let block = square(image, row * dst, col * dst, dst);
                let found = best_transform(block, &pool).ok_or_else(no_candidates)?;

                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(progress) = &self.progress {
                    let flow = progress(EncodeProgress {
                        completed: done,
                        total,
                    });
                    if flow.is_break() {
                        cancelled.store(true, Ordering::Relaxed);
                        return Err(Error::Cancelled {
                            completed: done,
                            total,
                        });
                    }
                }
                Ok(found)
            })
            .collect::<Result<_>>()?;

        let total_error = results.iter().map(|(_, error)| error).sum();
        let records = results.into_iter().map(|(record, _)| record).collect();
        let grid = TransformGrid::new(rows, cols, records)?;

        let stats = EncodeStats {
            blocks: total,
            candidates: pool.len(),
            total_error,
            elapsed: start.elapsed(),
        };
        debug!(
            "encoded {} blocks in {:?}, collage mse {:.3}",
            stats.blocks,
            stats.elapsed,
            stats.collage_mse(dst)
        );
        Ok((grid, stats))
    }
}

/// Find the candidate that best approximates one destination block.
///
/// Ties keep the first candidate in pool order.
fn best_transform(block: ImgRef<'_, f64>, pool: &CandidatePool) -> Option<(TransformRecord, f64)> {
    let d: Vec<f64> = block.pixels().collect();
    let d_mean = d.iter().sum::<f64>() / d.len() as f64;

    let best = pool.iter().fold(
        None::<(&Candidate, Photometric, f64)>,
        |best, candidate| {
            let correction = fit_samples(&d, d_mean, candidate.patch.buf(), &candidate.stats);
            let error = residual(&d, candidate.patch.buf(), correction);
            match best {
                Some((_, _, best_error)) if error >= best_error || error.is_nan() => best,
                _ => Some((candidate, correction, error)),
            }
        },
    );

    best.map(|(candidate, photometric, error)| {
        (
            TransformRecord {
                source_row: candidate.row,
                source_col: candidate.col,
                isometry: candidate.isometry,
                photometric,
            },
            error,
        )
    })
}

/// Encode `image` with the given block geometry.
///
/// # Errors
///
/// - [`Error::InvalidConfiguration`] for zero sizes or stride, or when
///   `src_size` is not a multiple of `dst_size`.
/// - [`Error::NoCandidates`] when no source block fits in the image.
pub fn encode(
    image: ImgRef<'_, f64>,
    src_size: usize,
    dst_size: usize,
    stride: usize,
) -> Result<TransformGrid> {
    Encoder::new(FractalParams::new(src_size, dst_size, stride)?).encode(image)
}
