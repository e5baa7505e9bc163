//! Transform records and the grid that forms the compressed representation.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::isometry::Isometry;
use crate::params::FractalParams;
use crate::photometric::Photometric;

/// Best-fit transform for one destination block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformRecord {
    /// Source row index on the stride lattice.
    pub source_row: usize,
    /// Source column index on the stride lattice.
    pub source_col: usize,
    /// Symmetry applied to the reduced source block.
    pub isometry: Isometry,
    /// Contrast/brightness correction.
    pub photometric: Photometric,
}

impl TransformRecord {
    /// Pixel coordinates `(row, col)` of the source block's top-left corner,
    /// or `None` if they overflow.
    pub fn source_origin(&self, stride: usize) -> Option<(usize, usize)> {
        Some((self.source_row.checked_mul(stride)?, self.source_col.checked_mul(stride)?))
    }
}

/// One transform per destination block, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGrid")]
pub struct TransformGrid {
    rows: usize,
    cols: usize,
    records: Vec<TransformRecord>,
}

#[derive(Deserialize)]
struct RawGrid {
    rows: usize,
    cols: usize,
    records: Vec<TransformRecord>,
}

impl TryFrom<RawGrid> for TransformGrid {
    type Error = Error;

    fn try_from(raw: RawGrid) -> Result<Self> {
        Self::new(raw.rows, raw.cols, raw.records)
    }
}

impl TransformGrid {
    /// Assemble a grid from row-major records.
    pub fn new(rows: usize, cols: usize, records: Vec<TransformRecord>) -> Result<Self> {
        if rows.checked_mul(cols) != Some(records.len()) {
            return Err(Error::InvalidConfiguration(format!(
                "{} records for a {rows}x{cols} grid",
                records.len()
            )));
        }
        Ok(Self {
            rows,
            cols,
            records,
        })
    }

    /// Number of destination block rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of destination block columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the grid covers no blocks.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record for destination block `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> Option<&TransformRecord> {
        if row < self.rows && col < self.cols {
            self.records.get(row * self.cols + col)
        } else {
            None
        }
    }

    /// All records, row-major.
    pub fn records(&self) -> &[TransformRecord] {
        &self.records
    }

    /// Image size `(width, height)` this grid reconstructs with `dst_size` blocks.
    ///
    /// Saturates on overflow; [`validate`](Self::validate) rejects such grids.
    pub fn image_size(&self, dst_size: usize) -> (usize, usize) {
        (self.cols.saturating_mul(dst_size), self.rows.saturating_mul(dst_size))
    }

    /// Check every record reads a source block inside the reconstructed image.
    pub fn validate(&self, params: &FractalParams) -> Result<()> {
        let dst = params.dst_size();
        let (Some(width), Some(height)) = (self.cols.checked_mul(dst), self.rows.checked_mul(dst)) else {
            return Err(Error::InvalidConfiguration(format!(
                "{}x{} grid of {dst}px blocks is too large",
                self.rows, self.cols
            )));
        };

        let src = params.src_size();
        for (index, record) in self.records.iter().enumerate() {
            let inside = record.source_origin(params.stride()).is_some_and(|(row, col)| {
                row.checked_add(src).is_some_and(|bottom| bottom <= height)
                    && col.checked_add(src).is_some_and(|right| right <= width)
            });
            if !inside {
                return Err(Error::InvalidConfiguration(format!(
                    "record {index} reads source block at lattice ({}, {}) outside {width}x{height}",
                    record.source_row, record.source_col
                )));
            }
        }
        Ok(())
    }

    /// How many records use each isometry, indexed by [`Isometry::code`].
    pub fn isometry_histogram(&self) -> [usize; 8] {
        let mut counts = [0; 8];
        for record in &self.records {
            counts[usize::from(record.isometry.code())] += 1;
        }
        counts
    }
}
