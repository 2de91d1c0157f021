//! Camera-space math helpers shared by the pipeline stages.

/// Compute tile group size used by every compute dispatch.
pub const TILE_SIZE: u32 = 8;

/// Number of 8x8 tile groups needed to cover `pixels`, rounding up.
pub fn tile_count(pixels: u32) -> u32 {
    (pixels + TILE_SIZE - 1) / TILE_SIZE
}

/// Number of mip levels in a full chain for a `width` x `height` texture.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Half projection scale: converts a view-space distance at unit depth into
/// pixels. Used by the sampler to size its screen-space marching radius.
pub fn half_proj_scale(fov_y: f32, height: u32) -> f32 {
    height as f32 / ((fov_y * 0.5).tan() * 2.0) * 0.5
}

/// Tangent of the angle subtended by one pixel, used by the denoiser to
/// relate depth differences to expected surface slope.
pub fn pixel_spread_tangent(fov_y: f32, width: u32, height: u32) -> f32 {
    (fov_y * 0.5).tan() * 2.0 / width.min(height) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_count_rounds_up() {
        assert_eq!(tile_count(1), 1);
        assert_eq!(tile_count(8), 1);
        assert_eq!(tile_count(9), 2);
        assert_eq!(tile_count(1920), 240);
        assert_eq!(tile_count(1921), 241);
    }

    #[test]
    fn test_mip_level_count() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(2, 2), 2);
        assert_eq!(mip_level_count(256, 256), 9);
        assert_eq!(mip_level_count(1920, 1080), 11);
    }

    #[test]
    fn test_half_proj_scale() {
        // 90 degree fov: tan(45) = 1, so scale = h / 2 * 0.5
        let scale = half_proj_scale(std::f32::consts::FRAC_PI_2, 1080);
        assert!((scale - 270.0).abs() < 1e-3);
    }

    #[test]
    fn test_pixel_spread_tangent() {
        let t = pixel_spread_tangent(std::f32::consts::FRAC_PI_2, 1920, 1080);
        assert!((t - 2.0 / 1080.0).abs() < 1e-6);
    }
}
