//! Error types.

use thiserror::Error;

/// Errors that can occur while setting up the SSRT pipeline.
///
/// Per-frame failures never surface here: a frame with missing resources is
/// skipped and the destination image is left untouched.
#[derive(Error, Debug)]
pub enum SsrtError {
    /// The requested output resolution has a zero-sized dimension.
    #[error("invalid output resolution {width}x{height}")]
    InvalidResolution {
        /// Requested width in pixels.
        width: u32,
        /// Requested height in pixels.
        height: u32,
    },
}
