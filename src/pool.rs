//! Reduced, transformed source blocks shared by every destination search.

use imgref::{ImgRef, ImgVec};
use log::debug;
use rayon::prelude::*;

use crate::block::{downsample, square};
use crate::isometry::Isometry;
use crate::params::FractalParams;
use crate::photometric::SampleStats;

/// One reduced source block under one isometry.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Source row index on the stride lattice (pixel row = `row * stride`).
    pub row: usize,
    /// Source column index on the stride lattice.
    pub col: usize,
    /// Symmetry applied after reduction.
    pub isometry: Isometry,
    /// `dst_size × dst_size` samples.
    pub patch: ImgVec<f64>,
    pub(crate) stats: SampleStats,
}

/// Every candidate for one image, in enumeration order.
///
/// Order is positions row-major, then [`Isometry::ALL`] for each position.
#[derive(Debug, Clone)]
pub struct CandidatePool {
    candidates: Vec<Candidate>,
    rows: usize,
    cols: usize,
}

impl CandidatePool {
    /// Build the pool for `image`.
    ///
    /// The result is empty when no source block fits inside the image.
    pub fn build(image: ImgRef<'_, f64>, params: &FractalParams) -> Self {
        let rows = params.positions_along(image.height());
        let cols = params.positions_along(image.width());
        let (src, stride, factor) = (params.src_size(), params.stride(), params.factor());

        let candidates: Vec<Candidate> = (0..rows * cols)
            .into_par_iter()
            .flat_map_iter(|index| {
                let (row, col) = (index / cols, index % cols);
                let reduced = downsample(square(image, row * stride, col * stride, src), factor);
                Isometry::ALL.into_iter().map(move |isometry| {
                    let patch = isometry.apply_square(reduced.as_ref());
                    let stats = SampleStats::of(patch.buf());
                    Candidate {
                        row,
                        col,
                        isometry,
                        patch,
                        stats,
                    }
                })
            })
            .collect();

        debug!(
            "candidate pool: {}x{} positions, {} candidates",
            rows,
            cols,
            candidates.len()
        );
        Self {
            candidates,
            rows,
            cols,
        }
    }

    /// Source positions `(rows, cols)` on the stride lattice.
    pub fn positions(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Number of candidates.
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Whether no source block fits.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Iterate candidates in enumeration order.
    pub fn iter(&self) -> std::slice::Iter<'_, Candidate> {
        self.candidates.iter()
    }
}

impl<'a> IntoIterator for &'a CandidatePool {
    type Item = &'a Candidate;
    type IntoIter = std::slice::Iter<'a, Candidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
