//! Error types for fractal encoding and decoding.

use thiserror::Error;

/// Result type alias for fractal-ifs operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while encoding, decoding, or persisting transforms.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A primitive was called with an argument it cannot work with.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Block sizes, stride, or seed shape are inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The stride/size combination leaves no source block inside the image.
    #[error("No source candidates: {src_size}x{src_size} blocks do not fit in {width}x{height}")]
    NoCandidates {
        /// Source block side length.
        src_size: usize,
        /// Image width.
        width: usize,
        /// Image height.
        height: usize,
    },

    /// Two images or blocks that must match in shape don't.
    #[error("Dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        /// Expected dimensions (width, height).
        expected: (usize, usize),
        /// Actual dimensions (width, height).
        actual: (usize, usize),
    },

    /// The progress hook asked the encoder to stop.
    #[error("Encoding cancelled after {completed} of {total} blocks")]
    Cancelled {
        /// Blocks finished before cancellation was observed.
        completed: usize,
        /// Total number of destination blocks.
        total: usize,
    },

    /// A compressed stream could not be parsed.
    #[error("Malformed compressed data: {0}")]
    Format(String),

    /// The stored checksum does not match the stream contents.
    #[error("Checksum mismatch: stored {stored:016x}, computed {computed:016x}")]
    ChecksumMismatch {
        /// Checksum found in the trailer.
        stored: u64,
        /// Checksum computed over the payload.
        computed: u64,
    },

    /// Failed to calculate a quality metric.
    #[error("Metric calculation failed: {metric}: {reason}")]
    MetricCalculation {
        /// Name of the metric that failed.
        metric: String,
        /// Reason for the failure.
        reason: String,
    },

    /// I/O error wrapper.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
