//! Per-frame camera context.
//!
//! Everything derived here is a pure function of the camera description,
//! the output resolution and the frame index, so the temporal pattern is
//! reproducible and testable without a GPU.

use glam::Mat4;

use crate::math::{half_proj_scale, pixel_spread_tangent};

/// Per-frame sample-pattern rotations in degrees, cycled by `frame % 6`.
/// From the Activision GTAO talk's temporal rotation schedule.
pub const TEMPORAL_ROTATIONS: [f32; 6] = [60.0, 300.0, 180.0, 240.0, 120.0, 0.0];

/// Per-frame ray-start offsets, cycled by `(frame / 6) % 4`.
pub const SPATIAL_OFFSETS: [f32; 4] = [0.0, 0.5, 0.25, 0.75];

/// Sample-pattern rotation for a frame, as a fraction of a full turn.
pub fn temporal_rotation(frame_index: u32) -> f32 {
    TEMPORAL_ROTATIONS[(frame_index % 6) as usize] / 360.0
}

/// Ray-start offset for a frame.
pub fn spatial_offset(frame_index: u32) -> f32 {
    SPATIAL_OFFSETS[((frame_index / 6) % 4) as usize]
}

/// Camera state supplied by the host renderer for one frame.
#[derive(Debug, Clone, Copy)]
pub struct CameraDesc {
    /// World-to-view matrix.
    pub view: Mat4,
    /// View-to-clip projection matrix.
    pub projection: Mat4,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    /// Near clip plane distance.
    pub near: f32,
    /// Far clip plane distance.
    pub far: f32,
}

/// Immutable per-frame inputs with their derived camera-space quantities.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Frame index driving the temporal pattern.
    pub frame_index: u32,
    /// World-to-view matrix.
    pub view: Mat4,
    /// View-to-world matrix.
    pub camera_to_world: Mat4,
    /// Clip-to-view matrix.
    pub inverse_projection: Mat4,
    /// Combined world-to-clip matrix.
    pub view_projection: Mat4,
    /// Combined clip-to-world matrix.
    pub inverse_view_projection: Mat4,
    /// Near clip plane distance.
    pub near: f32,
    /// Far clip plane distance.
    pub far: f32,
    /// View-space-to-pixels scale at unit depth.
    pub half_proj_scale: f32,
    /// Tangent of the angle one pixel subtends.
    pub pixel_spread_tangent: f32,
    /// Sample-pattern rotation, fraction of a full turn.
    pub temporal_rotation: f32,
    /// Ray-start offset for this frame.
    pub spatial_offset: f32,
}

impl FrameContext {
    /// Derive the frame context for one pipeline execution.
    pub fn new(camera: &CameraDesc, width: u32, height: u32, frame_index: u32) -> Self {
        let view_projection = camera.projection * camera.view;
        Self {
            width,
            height,
            frame_index,
            view: camera.view,
            camera_to_world: camera.view.inverse(),
            inverse_projection: camera.projection.inverse(),
            view_projection,
            inverse_view_projection: view_projection.inverse(),
            near: camera.near,
            far: camera.far,
            half_proj_scale: half_proj_scale(camera.fov_y, height),
            pixel_spread_tangent: pixel_spread_tangent(camera.fov_y, width, height),
            temporal_rotation: temporal_rotation(frame_index),
            spatial_offset: spatial_offset(frame_index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn test_camera() -> CameraDesc {
        let fov_y = std::f32::consts::FRAC_PI_2;
        CameraDesc {
            view: Mat4::look_at_rh(Vec3::new(0.0, 2.0, 5.0), Vec3::ZERO, Vec3::Y),
            projection: Mat4::perspective_rh(fov_y, 16.0 / 9.0, 0.1, 100.0),
            fov_y,
            near: 0.1,
            far: 100.0,
        }
    }

    #[test]
    fn test_temporal_rotation_table() {
        // Pure function of the frame index, cycling the 6-entry table.
        for f in 0..64u32 {
            let expected = TEMPORAL_ROTATIONS[(f % 6) as usize] / 360.0;
            assert_eq!(temporal_rotation(f), expected);
        }
        assert_eq!(temporal_rotation(0), 60.0 / 360.0);
        assert_eq!(temporal_rotation(5), 0.0);
        assert_eq!(temporal_rotation(6), 60.0 / 360.0);
    }

    #[test]
    fn test_spatial_offset_table() {
        for f in 0..96u32 {
            let expected = SPATIAL_OFFSETS[((f / 6) % 4) as usize];
            assert_eq!(spatial_offset(f), expected);
        }
        assert_eq!(spatial_offset(0), 0.0);
        assert_eq!(spatial_offset(6), 0.5);
        assert_eq!(spatial_offset(12), 0.25);
        assert_eq!(spatial_offset(18), 0.75);
        assert_eq!(spatial_offset(24), 0.0);
    }

    #[test]
    fn test_matrix_inverses_roundtrip() {
        let ctx = FrameContext::new(&test_camera(), 1920, 1080, 0);
        let identity = ctx.view_projection * ctx.inverse_view_projection;
        for i in 0..4 {
            for j in 0..4 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((identity.col(i)[j] - expected).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn test_camera_to_world_inverts_view() {
        let ctx = FrameContext::new(&test_camera(), 1920, 1080, 0);
        let eye = ctx.camera_to_world.transform_point3(Vec3::ZERO);
        assert!((eye - Vec3::new(0.0, 2.0, 5.0)).length() < 1e-4);
    }

    #[test]
    fn test_derived_scales() {
        let ctx = FrameContext::new(&test_camera(), 1920, 1080, 0);
        // 90 degree fov: half proj scale is height / 4.
        assert!((ctx.half_proj_scale - 270.0).abs() < 1e-3);
        assert!((ctx.pixel_spread_tangent - 2.0 / 1080.0).abs() < 1e-6);
    }

    #[test]
    fn test_same_frame_index_same_pattern() {
        let a = FrameContext::new(&test_camera(), 1280, 720, 42);
        let b = FrameContext::new(&test_camera(), 1280, 720, 42);
        assert_eq!(a.temporal_rotation, b.temporal_rotation);
        assert_eq!(a.spatial_offset, b.spatial_offset);
    }
}
