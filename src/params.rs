//! Block geometry shared by the encoder and the decoder.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Source block side used when none is given.
pub const DEFAULT_SRC_SIZE: usize = 8;
/// Destination block side used when none is given.
pub const DEFAULT_DST_SIZE: usize = 4;
/// Source lattice stride used when none is given.
pub const DEFAULT_STRIDE: usize = 8;

/// Source/destination block sizes and the source lattice stride.
///
/// A value of this type is always valid: both sizes and the stride are
/// positive and `src_size` is a multiple of `dst_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawParams")]
pub struct FractalParams {
    src_size: usize,
    dst_size: usize,
    stride: usize,
}

#[derive(Deserialize)]
struct RawParams {
    src_size: usize,
    dst_size: usize,
    stride: usize,
}

impl TryFrom<RawParams> for FractalParams {
    type Error = Error;

    fn try_from(raw: RawParams) -> Result<Self> {
        Self::new(raw.src_size, raw.dst_size, raw.stride)
    }
}

impl FractalParams {
    /// Validate and build a parameter set.
    pub fn new(src_size: usize, dst_size: usize, stride: usize) -> Result<Self> {
        if src_size == 0 || dst_size == 0 {
            return Err(Error::InvalidConfiguration(format!(
                "block sizes must be positive (src {src_size}, dst {dst_size})"
            )));
        }
        if stride == 0 {
            return Err(Error::InvalidConfiguration("stride must be positive".to_string()));
        }
        if src_size % dst_size != 0 {
            return Err(Error::InvalidConfiguration(format!(
                "source size {src_size} is not a multiple of destination size {dst_size}"
            )));
        }
        Ok(Self {
            src_size,
            dst_size,
            stride,
        })
    }

    /// Create a new parameter builder.
    #[must_use]
    pub fn builder() -> FractalParamsBuilder {
        FractalParamsBuilder::default()
    }

    /// Side length of a source block.
    pub fn src_size(&self) -> usize {
        self.src_size
    }

    /// Side length of a destination block.
    pub fn dst_size(&self) -> usize {
        self.dst_size
    }

    /// Distance between neighbouring source block origins.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Reduction factor applied to source blocks.
    pub fn factor(&self) -> usize {
        self.src_size / self.dst_size
    }

    /// Number of source block positions along an axis of length `extent`.
    pub fn positions_along(&self, extent: usize) -> usize {
        if extent < self.src_size {
            0
        } else {
            (extent - self.src_size) / self.stride + 1
        }
    }

    /// Destination grid shape `(rows, cols)` for an image of the given size.
    pub fn grid_shape(&self, width: usize, height: usize) -> (usize, usize) {
        (height / self.dst_size, width / self.dst_size)
    }
}

impl Default for FractalParams {
    fn default() -> Self {
        Self {
            src_size: DEFAULT_SRC_SIZE,
            dst_size: DEFAULT_DST_SIZE,
            stride: DEFAULT_STRIDE,
        }
    }
}

/// Builder for [`FractalParams`].
#[derive(Debug, Default)]
pub struct FractalParamsBuilder {
    src_size: Option<usize>,
    dst_size: Option<usize>,
    stride: Option<usize>,
}

impl FractalParamsBuilder {
    /// Set the source block side length.
    #[must_use]
    pub fn src_size(mut self, size: usize) -> Self {
        self.src_size = Some(size);
        self
    }

    /// Set the destination block side length.
    #[must_use]
    pub fn dst_size(mut self, size: usize) -> Self {
        self.dst_size = Some(size);
        self
    }

    /// Set the source lattice stride.
    #[must_use]
    pub fn stride(mut self, stride: usize) -> Self {
        self.stride = Some(stride);
        self
    }

    /// Build and validate the parameters. Unset fields take the defaults.
    pub fn build(self) -> Result<FractalParams> {
        FractalParams::new(
            self.src_size.unwrap_or(DEFAULT_SRC_SIZE),
            self.dst_size.unwrap_or(DEFAULT_DST_SIZE),
            self.stride.unwrap_or(DEFAULT_STRIDE),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_configuration() {
        assert!(matches!(FractalParams::new(8, 3, 4), Err(Error::InvalidConfiguration(_))));
        assert!(matches!(FractalParams::new(8, 4, 0), Err(Error::InvalidConfiguration(_))));
        assert!(matches!(FractalParams::new(0, 4, 4), Err(Error::InvalidConfiguration(_))));
        assert!(matches!(FractalParams::new(8, 0, 4), Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn test_builder_defaults() {
        let params = FractalParams::builder().stride(4).build().unwrap();
        assert_eq!(params.src_size(), 8);
        assert_eq!(params.dst_size(), 4);
        assert_eq!(params.stride(), 4);
        assert_eq!(params.factor(), 2);
    }

    #[test]
    fn test_positions_along() {
        let params = FractalParams::new(8, 4, 4).unwrap();
        assert_eq!(params.positions_along(16), 3);
        assert_eq!(params.positions_along(8), 1);
        assert_eq!(params.positions_along(7), 0);
        assert_eq!(params.grid_shape(18, 16), (4, 4));
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: FractalParams =
            serde_json::from_str(r#"{"src_size":8,"dst_size":4,"stride":8}"#).unwrap();
        assert_eq!(ok, FractalParams::default());

        let bad = serde_json::from_str::<FractalParams>(r#"{"src_size":6,"dst_size":4,"stride":8}"#);
        assert!(bad.is_err());
    }
}
