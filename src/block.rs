//! Block extraction and reduction by averaging.

use imgref::{ImgRef, ImgVec};

use crate::error::{Error, Result};

/// Downsample `block` by `factor` in both directions.
///
/// Each output sample is the mean of the corresponding non-overlapping
/// `factor × factor` window. A factor of 1 returns a copy.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `factor` is zero or does not
/// divide both dimensions.
pub fn reduce(block: ImgRef<'_, f64>, factor: usize) -> Result<ImgVec<f64>> {
    if factor == 0 {
        return Err(Error::InvalidArgument("reduction factor must be positive".to_string()));
    }
    if block.width() % factor != 0 || block.height() % factor != 0 {
        return Err(Error::InvalidArgument(format!(
            "factor {factor} does not divide {}x{}",
            block.width(),
            block.height()
        )));
    }
    Ok(downsample(block, factor))
}

/// Unchecked core of [`reduce`]; callers guarantee divisibility.
pub(crate) fn downsample(block: ImgRef<'_, f64>, factor: usize) -> ImgVec<f64> {
    let out_w = block.width() / factor;
    let out_h = block.height() / factor;
    if factor == 1 {
        return ImgVec::new(block.pixels().collect(), out_w, out_h);
    }

    let mut out = vec![0.0; out_w * out_h];
    for (y, row) in block.rows().enumerate() {
        let dst = &mut out[(y / factor) * out_w..(y / factor + 1) * out_w];
        for (x, &v) in row.iter().enumerate() {
            dst[x / factor] += v;
        }
    }
    let area = (factor * factor) as f64;
    for v in &mut out {
        *v /= area;
    }
    ImgVec::new(out, out_w, out_h)
}

/// Borrow the square block of side `size` whose top-left corner is `(row, col)`.
pub(crate) fn square(image: ImgRef<'_, f64>, row: usize, col: usize, size: usize) -> ImgRef<'_, f64> {
    image.sub_image(col, row, size, size)
}
