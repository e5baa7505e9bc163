//! # fractal-ifs
//!
//! Fractal (iterated function system) compression of grayscale images.
//!
//! The encoder tiles the image into destination blocks and, for each one,
//! searches a pool of larger source blocks (reduced by averaging, under the
//! eight square symmetries, with a least-squares contrast/brightness fit) for
//! the best approximation. The resulting [`TransformGrid`] is the compressed
//! image. The decoder applies the grid repeatedly to any seed image; the
//! iteration converges to the grid's attractor, which approximates the
//! original.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fractal_ifs::{decode, encode, Seed};
//!
//! let grid = encode(image.as_ref(), 8, 4, 8)?;
//! let seed = Seed::Zeros.image(image.width(), image.height());
//! let reconstructed = decode(&grid, 8, 4, 8, seed.as_ref(), 8)?;
//! ```
//!
//! Images are `imgref` buffers of `f64` samples, nominally in `[0, 255]`.
//! Nothing is clamped; callers producing 8-bit output round and clamp
//! themselves.
//!
//! ## Modules
//!
//! - [`error`]: Error types for the library
//! - [`params`]: Block geometry shared by encoder and decoder
//! - [`block`]: Block reduction by averaging
//! - [`isometry`]: The eight square symmetries
//! - [`photometric`]: Contrast/brightness least-squares fit
//! - [`pool`]: Candidate source blocks
//! - [`encoder`]: Transform search
//! - [`decoder`]: Fixed-point reconstruction
//! - [`grid`]: Transform records and grids
//! - [`format`]: Binary and JSON persistence
//! - [`metrics`]: MSE, PSNR and DSSIM
//! - [`report`]: Convergence reports

pub mod block;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod format;
pub mod grid;
pub mod isometry;
pub mod metrics;
pub mod params;
pub mod photometric;
pub mod pool;
pub mod report;

// Re-export commonly used types
pub use block::reduce;
pub use decoder::{
    DecodeOptions, Decoder, Reconstruction, Seed, StopReason, decode, decode_sequence,
};
pub use encoder::{EncodeProgress, EncodeStats, Encoder, encode};
pub use error::{Error, Result};
pub use format::CompressedImage;
pub use grid::{TransformGrid, TransformRecord};
pub use isometry::{Isometry, Rotation};
pub use metrics::{MetricConfig, MetricResult};
pub use params::FractalParams;
pub use photometric::{Photometric, fit};
pub use pool::{Candidate, CandidatePool};
pub use report::{ConvergenceReport, IterationStats};
