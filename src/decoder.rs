//! Fixed-point reconstruction from a transform grid.
//!
//! Each pass rebuilds every destination block from the previous pass's
//! image: read the source block, reduce it, apply the isometry and the
//! photometric correction, write into a fresh buffer. Passes are strictly
//! sequential; blocks inside a pass are independent and run in parallel,
//! one stripe of destination rows per task.

use imgref::{ImgRef, ImgVec};
use log::{debug, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::block::{downsample, square};
use crate::error::{Error, Result};
use crate::grid::TransformGrid;
use crate::metrics::mse;
use crate::params::FractalParams;

/// Number of passes used when none is given.
pub const DEFAULT_ITERATIONS: usize = 8;

/// Starting image for decoding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Seed {
    /// Every sample zero.
    Zeros,
    /// Every sample set to the given value.
    Constant(f64),
    /// Uniform integer samples in `[0, 256)` from a seeded generator.
    Random {
        /// Generator seed.
        seed: u64,
    },
}

impl Seed {
    /// Materialise the seed as a `width × height` image.
    pub fn image(&self, width: usize, height: usize) -> ImgVec<f64> {
        let buf = match *self {
            Self::Zeros => vec![0.0; width * height],
            Self::Constant(value) => vec![value; width * height],
            Self::Random { seed } => {
                let mut rng = StdRng::seed_from_u64(seed);
                (0..width * height)
                    .map(|_| f64::from(rng.random_range(0u16..256)))
                    .collect()
            }
        };
        ImgVec::new(buf, width, height)
    }
}

impl Default for Seed {
    fn default() -> Self {
        Self::Random { seed: 0 }
    }
}

/// How long to iterate and what to keep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecodeOptions {
    /// Maximum number of passes.
    pub iterations: usize,
    /// Stop once the mean squared change of a pass is at or below this.
    pub tolerance: Option<f64>,
    /// Keep every intermediate image, starting with the seed.
    pub keep_sequence: bool,
}

impl DecodeOptions {
    /// Fixed pass budget, no early stop, final image only.
    #[must_use]
    pub fn new(iterations: usize) -> Self {
        Self {
            iterations,
            tolerance: None,
            keep_sequence: false,
        }
    }

    /// Stop early when a pass changes the image by at most `tolerance` (MSE).
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    /// Keep the seed and every intermediate image.
    #[must_use]
    pub fn keep_sequence(mut self, keep: bool) -> Self {
        self.keep_sequence = keep;
        self
    }
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self::new(DEFAULT_ITERATIONS)
    }
}

/// Why decoding stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// A pass changed the image by no more than the tolerance.
    Converged,
    /// The pass budget ran out.
    Exhausted,
}

/// Decoding output.
#[derive(Debug, Clone)]
pub struct Reconstruction {
    /// Image after the last pass.
    pub image: ImgVec<f64>,
    /// Seed followed by each pass's image; empty unless requested.
    pub sequence: Vec<ImgVec<f64>>,
    /// Mean squared change of each pass relative to its input.
    pub deltas: Vec<f64>,
    /// Why decoding stopped.
    pub stop: StopReason,
}

impl Reconstruction {
    /// Number of passes performed.
    pub fn iterations(&self) -> usize {
        self.deltas.len()
    }
}

/// Applies a transform grid to reconstruct an image.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    grid: &'a TransformGrid,
    params: FractalParams,
}

impl<'a> Decoder<'a> {
    /// Check `grid` against `params` and prepare to decode.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if a record reads outside the
    /// reconstructed image.
    pub fn new(grid: &'a TransformGrid, params: FractalParams) -> Result<Self> {
        grid.validate(&params)?;
        Ok(Self { grid, params })
    }

    /// Size `(width, height)` of the reconstructed image.
    pub fn image_size(&self) -> (usize, usize) {
        self.grid.image_size(self.params.dst_size())
    }

    /// Iterate from `seed` according to `options`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if the seed is not
    /// [`image_size`](Self::image_size).
    pub fn run(&self, seed: ImgRef<'_, f64>, options: &DecodeOptions) -> Result<Reconstruction> {
        let (width, height) = self.check_size(seed)?;
        let mut current = ImgVec::new(seed.pixels().collect::<Vec<_>>(), width, height);
        let mut sequence = Vec::new();
        if options.keep_sequence {
            sequence.push(current.clone());
        }
        let mut deltas = Vec::with_capacity(options.iterations);
        let mut stop = StopReason::Exhausted;

        for iteration in 0..options.iterations {
            let next = self.step(current.as_ref())?;
            let delta = mse(current.as_ref(), next.as_ref())?;
            trace!("pass {}: delta {:.6}", iteration + 1, delta);
            deltas.push(delta);
            current = next;
            if options.keep_sequence {
                sequence.push(current.clone());
            }
            if options.tolerance.is_some_and(|tolerance| delta <= tolerance) {
                stop = StopReason::Converged;
                break;
            }
        }

        debug!("decoded {}x{} in {} passes ({:?})", width, height, deltas.len(), stop);
        Ok(Reconstruction {
            image: current,
            sequence,
            deltas,
            stop,
        })
    }

    fn check_size(&self, image: ImgRef<'_, f64>) -> Result<(usize, usize)> {
        let (width, height) = self.image_size();
        if image.width() != width || image.height() != height {
            return Err(Error::InvalidConfiguration(format!(
                "image is {}x{}, grid reconstructs {width}x{height}",
                image.width(),
                image.height()
            )));
        }
        Ok((width, height))
    }

    /// One pass: every block of the result is computed from `previous` only.
    pub fn step(&self, previous: ImgRef<'_, f64>) -> Result<ImgVec<f64>> {
        let (width, height) = self.check_size(previous)?;
        let dst = self.params.dst_size();
        let (src, stride, factor) = (self.params.src_size(), self.params.stride(), self.params.factor());
        let mut next = ImgVec::new(vec![0.0; width * height], width, height);
        if self.grid.is_empty() {
            return Ok(next);
        }

        next.buf_mut()
            .par_chunks_mut(dst * width)
            .zip(self.grid.records().par_chunks(self.grid.cols()))
            .for_each(|(stripe, records)| {
                for (block_col, record) in records.iter().enumerate() {
                    // Bounds were checked by `validate` in `Decoder::new`
                    let Some((row, col)) = record.source_origin(stride) else {
                        continue;
                    };
                    let reduced = downsample(square(previous, row, col, src), factor);
                    let patch = record.isometry.apply_square(reduced.as_ref());
                    for (y, patch_row) in patch.rows().enumerate() {
                        let start = y * width + block_col * dst;
                        for (out, &v) in stripe[start..start + dst].iter_mut().zip(patch_row) {
                            *out = record.photometric.apply(v);
                        }
                    }
                }
            });
        Ok(next)
    }
}

/// Reconstruct the final image after `iterations` passes from `seed`.
///
/// # Errors
///
/// Returns [`Error::InvalidConfiguration`] for invalid block geometry,
/// records outside the image, or a seed whose size differs from the grid's
/// image size.
pub fn decode(
    grid: &TransformGrid,
    src_size: usize,
    dst_size: usize,
    stride: usize,
    seed: ImgRef<'_, f64>,
    iterations: usize,
) -> Result<ImgVec<f64>> {
    let params = FractalParams::new(src_size, dst_size, stride)?;
    Decoder::new(grid, params)?
        .run(seed, &DecodeOptions::new(iterations))
        .map(|reconstruction| reconstruction.image)
}

/// Like [`decode`] but returns the seed followed by the image after each pass.
pub fn decode_sequence(
    grid: &TransformGrid,
    src_size: usize,
    dst_size: usize,
    stride: usize,
    seed: ImgRef<'_, f64>,
    iterations: usize,
) -> Result<Vec<ImgVec<f64>>> {
    let params = FractalParams::new(src_size, dst_size, stride)?;
    Decoder::new(grid, params)?
        .run(seed, &DecodeOptions::new(iterations).keep_sequence(true))
        .map(|reconstruction| reconstruction.sequence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{Encoder, encode};
    use crate::grid::TransformRecord;
    use crate::isometry::Isometry;
    use crate::photometric::Photometric;

    fn ramp() -> ImgVec<f64> {
        ImgVec::new((0..16).flat_map(|_| (0..16).map(|x| f64::from(x) * 16.0)).collect(), 16, 16)
    }

    fn edge() -> ImgVec<f64> {
        ImgVec::new(
            (0..16).flat_map(|_| (0..16).map(|x| if x < 8 { 0.0 } else { 255.0 })).collect(),
            16,
            16,
        )
    }

    #[test]
    fn test_constant_image_round_trip() {
        let img = ImgVec::new(vec![128.0; 64], 8, 8);
        let grid = encode(img.as_ref(), 8, 4, 8).unwrap();
        let seed = Seed::Zeros.image(8, 8);
        let out = decode(&grid, 8, 4, 8, seed.as_ref(), 1).unwrap();
        for v in out.pixels() {
            assert!((v - 128.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_more_passes_improve_ramp() {
        let img = ramp();
        let grid = encode(img.as_ref(), 8, 4, 4).unwrap();
        let seed = Seed::Zeros.image(16, 16);
        let frames = decode_sequence(&grid, 8, 4, 4, seed.as_ref(), 8).unwrap();
        assert_eq!(frames.len(), 9);

        let after_one = mse(img.as_ref(), frames[1].as_ref()).unwrap();
        let after_eight = mse(img.as_ref(), frames[8].as_ref()).unwrap();
        assert!(after_one > 1.0);
        assert!(after_eight < after_one);
        assert!(after_eight < after_one / 100.0);
    }

    #[test]
    fn test_edge_image_exact_after_first_pass() {
        let img = edge();
        let grid = encode(img.as_ref(), 8, 4, 4).unwrap();
        let seed = Seed::Random { seed: 3 }.image(16, 16);
        let one = decode(&grid, 8, 4, 4, seed.as_ref(), 1).unwrap();
        let eight = decode(&grid, 8, 4, 4, seed.as_ref(), 8).unwrap();
        let err_one = mse(img.as_ref(), one.as_ref()).unwrap();
        let err_eight = mse(img.as_ref(), eight.as_ref()).unwrap();
        // Every 4x4 block of this image is flat, so the first pass is already
        // exact and later passes can only match it; the ramp test covers strict gains.
        assert!(err_eight <= err_one + 1e-9);
        assert!(err_eight < 1e-9);
    }

    #[test]
    fn test_decode_is_deterministic() {
        let img = ramp();
        let grid = encode(img.as_ref(), 8, 4, 4).unwrap();
        let seed = Seed::Random { seed: 11 }.image(16, 16);
        let a = decode(&grid, 8, 4, 4, seed.as_ref(), 5).unwrap();
        let b = decode(&grid, 8, 4, 4, seed.as_ref(), 5).unwrap();
        assert_eq!(a.buf(), b.buf());
    }

    #[test]
    fn test_seed_invariance() {
        let img = ramp();
        let grid = encode(img.as_ref(), 8, 4, 4).unwrap();
        let zeros = Seed::Zeros.image(16, 16);
        let noise = Seed::Random { seed: 99 }.image(16, 16);
        let a = decode(&grid, 8, 4, 4, zeros.as_ref(), 30).unwrap();
        let b = decode(&grid, 8, 4, 4, noise.as_ref(), 30).unwrap();
        assert!(mse(a.as_ref(), b.as_ref()).unwrap() < 1e-6);
    }

    #[test]
    fn test_step_reads_only_previous_buffer() {
        // Block (0,0) copies block (0,1) and vice versa: an in-place update would
        // propagate the first write into the second block.
        let params = FractalParams::new(2, 2, 2).unwrap();
        let record = |source_col| TransformRecord {
            source_row: 0,
            source_col,
            isometry: Isometry::IDENTITY,
            photometric: Photometric::new(1.0, 0.0),
        };
        let grid = TransformGrid::new(1, 2, vec![record(1), record(0)]).unwrap();
        let seed = ImgVec::new(vec![1.0, 1.0, 2.0, 2.0, 1.0, 1.0, 2.0, 2.0], 4, 2);
        let out = Decoder::new(&grid, params).unwrap().step(seed.as_ref()).unwrap();
        assert_eq!(out.buf(), &[2.0, 2.0, 1.0, 1.0, 2.0, 2.0, 1.0, 1.0]);
    }

    #[test]
    fn test_early_stop() {
        let img = ramp();
        let params = FractalParams::new(8, 4, 4).unwrap();
        let grid = Encoder::new(params).encode(img.as_ref()).unwrap();
        let seed = Seed::Constant(128.0).image(16, 16);
        let decoder = Decoder::new(&grid, params).unwrap();

        let result = decoder
            .run(seed.as_ref(), &DecodeOptions::new(100).with_tolerance(1e-6))
            .unwrap();
        assert_eq!(result.stop, StopReason::Converged);
        assert!(result.iterations() < 100);
        assert!(result.sequence.is_empty());

        let exhausted = decoder.run(seed.as_ref(), &DecodeOptions::new(3).keep_sequence(true)).unwrap();
        assert_eq!(exhausted.stop, StopReason::Exhausted);
        assert_eq!(exhausted.iterations(), 3);
        assert_eq!(exhausted.sequence.len(), 4);
        assert_eq!(exhausted.sequence[0].buf(), seed.buf());
    }

    #[test]
    fn test_rejects_mismatched_seed() {
        let img = ramp();
        let grid = encode(img.as_ref(), 8, 4, 4).unwrap();
        let seed = Seed::Zeros.image(12, 16);
        assert!(matches!(
            decode(&grid, 8, 4, 4, seed.as_ref(), 1),
            Err(Error::InvalidConfiguration(_))
        ));
        let seed = Seed::Zeros.image(16, 16);
        assert!(matches!(
            decode(&grid, 8, 3, 4, seed.as_ref(), 1),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_zero_iterations_returns_seed() {
        let img = ramp();
        let grid = encode(img.as_ref(), 8, 4, 4).unwrap();
        let seed = Seed::Constant(7.0).image(16, 16);
        let out = decode(&grid, 8, 4, 4, seed.as_ref(), 0).unwrap();
        assert_eq!(out.buf(), seed.buf());
    }
}
