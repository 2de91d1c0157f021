//! Dispatch-index tables for the two GPU programs.
//!
//! The semantic selectors (like [`DebugMode`]) never double as raw kernel
//! slot numbers; the mapping lives here so a kernel reorder only touches
//! this table.

use super::settings::DebugMode;

/// Passes of the SSRT program, identified by their fixed dispatch indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SsrtKernel {
    /// Main hemisphere-sampling compute pass.
    Main,
    /// Half-resolution upsample (not used by the default path).
    Upsample,
    /// Neighborhood sample reuse (not used by the default path).
    SampleReuse,
    /// Temporal reprojection blend.
    TemporalReproj,
    /// AO debug view.
    DebugAo,
    /// Bent-normal debug view.
    DebugBentNormal,
    /// GI debug view.
    DebugGi,
    /// Combined composite (the normal, non-debug output pass).
    Composite,
    /// Linear-depth extraction / depth debug view.
    ExtractDepth,
    /// Light-mask extraction / light-mask debug view.
    ExtractLightMask,
    /// Normal extraction / normal debug view.
    ExtractNormals,
}

impl SsrtKernel {
    /// Fixed dispatch index of this pass in the SSRT program.
    pub fn index(self) -> u32 {
        match self {
            Self::Main => 0,
            Self::Upsample => 1,
            Self::SampleReuse => 2,
            Self::TemporalReproj => 3,
            Self::DebugAo => 4,
            Self::DebugBentNormal => 5,
            Self::DebugGi => 6,
            Self::Composite => 7,
            Self::ExtractDepth => 8,
            Self::ExtractLightMask => 9,
            Self::ExtractNormals => 10,
        }
    }

    /// WGSL entry point implementing this pass.
    pub fn entry_point(self) -> &'static str {
        match self {
            Self::Main => "cs_main",
            Self::Upsample => "fs_upsample",
            Self::SampleReuse => "fs_sample_reuse",
            Self::TemporalReproj => "fs_reproject",
            Self::DebugAo => "fs_debug_ao",
            Self::DebugBentNormal => "fs_debug_bent_normal",
            Self::DebugGi => "fs_debug_gi",
            Self::Composite => "fs_composite",
            Self::ExtractDepth => "fs_extract_depth",
            Self::ExtractLightMask => "fs_extract_lightmask",
            Self::ExtractNormals => "fs_extract_normals",
        }
    }
}

impl DebugMode {
    /// Output pass selected by this debug mode. `DebugMode::None` selects
    /// the regular composite; the pyramid views reuse the extraction passes.
    pub fn kernel(self) -> SsrtKernel {
        match self {
            DebugMode::None => SsrtKernel::Composite,
            DebugMode::Ao => SsrtKernel::DebugAo,
            DebugMode::BentNormal => SsrtKernel::DebugBentNormal,
            DebugMode::Gi => SsrtKernel::DebugGi,
            DebugMode::Depth => SsrtKernel::ExtractDepth,
            DebugMode::Normals => SsrtKernel::ExtractNormals,
            DebugMode::LightMask => SsrtKernel::ExtractLightMask,
        }
    }
}

/// Kernels of the denoiser program, identified by their fixed indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenoiserKernel {
    /// One-time point-distribution generation.
    PointDistribution,
    /// Per-frame bilateral filter.
    BilateralFilter,
}

impl DenoiserKernel {
    /// Fixed kernel index of this pass in the denoiser program.
    pub fn index(self) -> u32 {
        match self {
            Self::PointDistribution => 0,
            Self::BilateralFilter => 2,
        }
    }

    /// WGSL entry point implementing this kernel.
    pub fn entry_point(self) -> &'static str {
        match self {
            Self::PointDistribution => "cs_point_distribution",
            Self::BilateralFilter => "cs_bilateral_filter",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssrt_kernel_indices() {
        assert_eq!(SsrtKernel::Main.index(), 0);
        assert_eq!(SsrtKernel::Upsample.index(), 1);
        assert_eq!(SsrtKernel::SampleReuse.index(), 2);
        assert_eq!(SsrtKernel::TemporalReproj.index(), 3);
        assert_eq!(SsrtKernel::DebugAo.index(), 4);
        assert_eq!(SsrtKernel::DebugBentNormal.index(), 5);
        assert_eq!(SsrtKernel::DebugGi.index(), 6);
        assert_eq!(SsrtKernel::Composite.index(), 7);
        assert_eq!(SsrtKernel::ExtractDepth.index(), 8);
        assert_eq!(SsrtKernel::ExtractLightMask.index(), 9);
        assert_eq!(SsrtKernel::ExtractNormals.index(), 10);
    }

    #[test]
    fn test_denoiser_kernel_indices() {
        assert_eq!(DenoiserKernel::PointDistribution.index(), 0);
        assert_eq!(DenoiserKernel::BilateralFilter.index(), 2);
    }

    #[test]
    fn test_debug_mode_mapping() {
        assert_eq!(DebugMode::None.kernel().index(), 7);
        assert_eq!(DebugMode::Ao.kernel().index(), 4);
        assert_eq!(DebugMode::BentNormal.kernel().index(), 5);
        assert_eq!(DebugMode::Gi.kernel().index(), 6);
        assert_eq!(DebugMode::Depth.kernel().index(), 8);
        assert_eq!(DebugMode::Normals.kernel().index(), 10);
        assert_eq!(DebugMode::LightMask.kernel().index(), 9);
    }

    #[test]
    fn test_debug_mode_routing_ignores_gi_settings() {
        // The AO view routes by mode alone; no parameter influences it.
        let mut settings = crate::pipeline::SsrtSettings::default();
        settings.set_debug_mode(DebugMode::Ao);
        settings.set_gi_intensity(100.0);
        assert_eq!(settings.debug_mode().kernel(), SsrtKernel::DebugAo);
        settings.set_gi_intensity(0.0);
        assert_eq!(settings.debug_mode().kernel(), SsrtKernel::DebugAo);
    }
}
