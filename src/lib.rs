//! # SSRT - Screen-Space Ray-Traced Global Illumination
//!
//! SSRT computes real-time indirect diffuse lighting (GI) and ambient
//! occlusion (AO) for a rasterized wgpu renderer. Rays are marched through
//! screen-space pyramids instead of an acceleration structure, the noisy
//! estimate is accumulated across frames by temporal reprojection, and a
//! bilateral filter removes the residual noise before the result is
//! composited onto the lit scene image.
//!
//! ## Pipeline stages
//!
//! 1. **Pyramids**: light-mask, linear-depth and normal mip chains derived
//!    from the frame's G-buffer.
//! 2. **Hemisphere sampling**: horizon-based slice integration over the
//!    pyramids (compute, 8x8 tiles).
//! 3. **Temporal reprojection**: previous-frame history blended into the new
//!    estimate using the camera motion between frames.
//! 4. **Diffuse denoising**: depth-aware bilateral filter driven by a
//!    precomputed low-discrepancy point set.
//! 5. **Composite**: filtered GI/AO applied to the scene, or a debug view
//!    routed straight to the output.
//!
//! ## Example
//!
//! ```ignore
//! use ssrt::prelude::*;
//!
//! let mut pipeline = SsrtPipeline::new();
//! pipeline.init(&device, &queue, width, height, surface_format)?;
//! pipeline.settings_mut().set_enabled(true);
//!
//! // Every frame:
//! let inputs = FrameInputs {
//!     scene: &scene_view,
//!     gbuffer_depth: &depth_view,
//!     gbuffer_normals: &normal_view,
//!     fallback_cube: None,
//! };
//! pipeline.render(&device, &queue, &mut encoder, &camera, &inputs, &destination);
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod math;
pub mod pipeline;

// Re-export commonly used types
pub mod prelude {
    //! Convenient re-exports of commonly used types.

    pub use crate::error::SsrtError;
    pub use crate::pipeline::*;
}

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = "SSRT";
