//! Tunable parameters for the SSRT pipeline.
//!
//! Every numeric field has a fixed valid range enforced by clamping at the
//! point of assignment: an out-of-range value degrades the image, it never
//! breaks the frame. Fields are private so the clamp cannot be bypassed.

use serde::{Deserialize, Serialize};

/// Which intermediate buffer (if any) is routed straight to the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DebugMode {
    /// Normal rendering: GI/AO composited onto the scene image.
    #[default]
    None,
    /// Ambient occlusion term only.
    Ao,
    /// Approximate bent normal of the visibility cone.
    BentNormal,
    /// Indirect diffuse radiance only.
    Gi,
    /// Linear-depth pyramid.
    Depth,
    /// Decoded normal pyramid.
    Normals,
    /// Light-mask pyramid.
    LightMask,
}

impl DebugMode {
    /// All debug modes, in kernel-table order.
    pub const ALL: [DebugMode; 7] = [
        DebugMode::None,
        DebugMode::Ao,
        DebugMode::BentNormal,
        DebugMode::Gi,
        DebugMode::Depth,
        DebugMode::Normals,
        DebugMode::LightMask,
    ];
}

/// Source of lighting energy for rays that leave the screen or the
/// effective sampling radius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Fallback {
    /// No off-screen energy: escaped rays contribute black.
    #[default]
    None,
    /// Sample a prefiltered irradiance volume.
    IrradianceVolume,
    /// Sample a reflection probe cube map.
    ReflectionProbe,
}

/// Number of fallback-source samples taken per hemisphere rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FallbackSampleCount {
    /// 2 samples.
    Two,
    /// 4 samples.
    #[default]
    Four,
    /// 8 samples.
    Eight,
    /// 16 samples.
    Sixteen,
    /// 32 samples.
    ThirtyTwo,
}

impl FallbackSampleCount {
    /// Sample count as an integer.
    pub fn samples(self) -> u32 {
        match self {
            Self::Two => 2,
            Self::Four => 4,
            Self::Eight => 8,
            Self::Sixteen => 16,
            Self::ThirtyTwo => 32,
        }
    }
}

/// SSRT parameter set.
///
/// Grouped by concern: sampling, GI, occlusion, off-screen fallback,
/// filters, debug. Deserializing routes every value through the clamped
/// setters, so a config file cannot smuggle an out-of-range value in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "SsrtSettingsConfig")]
pub struct SsrtSettings {
    enabled: bool,
    // Sampling
    rotation_count: i32,
    step_count: i32,
    radius: f32,
    exp_factor: f32,
    jitter_samples: bool,
    screen_space_sampling: bool,
    mip_optimization: bool,
    // GI
    gi_intensity: f32,
    multi_bounce_gi: f32,
    normal_approximation: bool,
    backface_lighting: f32,
    // Occlusion
    ao_intensity: f32,
    thickness: f32,
    linear_thickness: bool,
    multi_bounce_ao: bool,
    // Off-screen fallback
    fallback: Fallback,
    fallback_power: f32,
    fallback_intensity: f32,
    fallback_sample_count: FallbackSampleCount,
    reflect_sky: bool,
    // Filters
    temporal_accumulation: bool,
    temporal_response: f32,
    denoising: bool,
    denoising_radius: f32,
    // Debug
    debug_mode: DebugMode,
    light_only: bool,
}

impl Default for SsrtSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            rotation_count: 1,
            step_count: 12,
            radius: 5.0,
            exp_factor: 1.0,
            jitter_samples: true,
            screen_space_sampling: false,
            mip_optimization: true,
            gi_intensity: 10.0,
            multi_bounce_gi: 0.0,
            normal_approximation: false,
            backface_lighting: 0.0,
            ao_intensity: 1.0,
            thickness: 1.0,
            linear_thickness: false,
            multi_bounce_ao: false,
            fallback: Fallback::None,
            fallback_power: 1.0,
            fallback_intensity: 1.0,
            fallback_sample_count: FallbackSampleCount::Four,
            reflect_sky: false,
            temporal_accumulation: true,
            temporal_response: 0.35,
            denoising: true,
            denoising_radius: 0.5,
            debug_mode: DebugMode::None,
            light_only: false,
        }
    }
}

impl SsrtSettings {
    /// Whether the pipeline runs at all.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable the whole pipeline.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Number of per-pixel hemisphere slices, in [1, 4].
    pub fn rotation_count(&self) -> i32 {
        self.rotation_count
    }

    /// Set the hemisphere slice count (clamped to [1, 4]).
    pub fn set_rotation_count(&mut self, count: i32) {
        self.rotation_count = count.clamp(1, 4);
    }

    /// Samples taken along one side of a slice, in [1, 32]. Total samples
    /// per pixel is `rotation_count * step_count * 2`.
    pub fn step_count(&self) -> i32 {
        self.step_count
    }

    /// Set the per-side step count (clamped to [1, 32]).
    pub fn set_step_count(&mut self, count: i32) {
        self.step_count = count.clamp(1, 32);
    }

    /// Effective sampling radius in world space, in [1, 25].
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Set the sampling radius (clamped to [1, 25]).
    pub fn set_radius(&mut self, radius: f32) {
        self.radius = radius.clamp(1.0, 25.0);
    }

    /// Exponent applied to the step size at each step, in [1, 3].
    pub fn exp_factor(&self) -> f32 {
        self.exp_factor
    }

    /// Set the step growth exponent (clamped to [1, 3]).
    pub fn set_exp_factor(&mut self, factor: f32) {
        self.exp_factor = factor.clamp(1.0, 3.0);
    }

    /// Whether per-pixel noise is applied to sample positions.
    pub fn jitter_samples(&self) -> bool {
        self.jitter_samples
    }

    /// Trade banding for noise by jittering sample placement.
    pub fn set_jitter_samples(&mut self, jitter: bool) {
        self.jitter_samples = jitter;
    }

    /// Whether step distances are measured in view space instead of world
    /// space (denser sampling near the camera).
    pub fn screen_space_sampling(&self) -> bool {
        self.screen_space_sampling
    }

    /// Switch the step distance metric.
    pub fn set_screen_space_sampling(&mut self, screen_space: bool) {
        self.screen_space_sampling = screen_space;
    }

    /// Whether distant samples read lower pyramid mips to save bandwidth.
    pub fn mip_optimization(&self) -> bool {
        self.mip_optimization
    }

    /// Enable or disable mip selection by sample distance.
    pub fn set_mip_optimization(&mut self, optimize: bool) {
        self.mip_optimization = optimize;
    }

    /// Indirect diffuse intensity, in [0, 100].
    pub fn gi_intensity(&self) -> f32 {
        self.gi_intensity
    }

    /// Set the indirect diffuse intensity (clamped to [0, 100]).
    pub fn set_gi_intensity(&mut self, intensity: f32) {
        self.gi_intensity = intensity.clamp(0.0, 100.0);
    }

    /// Intensity of the second and subsequent bounces, in [0, 1].
    pub fn multi_bounce_gi(&self) -> f32 {
        self.multi_bounce_gi
    }

    /// Set the extra-bounce intensity (clamped to [0, 1]).
    pub fn set_multi_bounce_gi(&mut self, intensity: f32) {
        self.multi_bounce_gi = intensity.clamp(0.0, 1.0);
    }

    /// Whether sample normals are inferred from sample geometry instead of
    /// read from the normal pyramid.
    pub fn normal_approximation(&self) -> bool {
        self.normal_approximation
    }

    /// Enable the cheaper approximate sample normals.
    pub fn set_normal_approximation(&mut self, approximate: bool) {
        self.normal_approximation = approximate;
    }

    /// How much light back-facing surfaces emit, in [0, 1].
    pub fn backface_lighting(&self) -> f32 {
        self.backface_lighting
    }

    /// Set back-face emission (clamped to [0, 1]).
    pub fn set_backface_lighting(&mut self, lighting: f32) {
        self.backface_lighting = lighting.clamp(0.0, 1.0);
    }

    /// Power curve applied to raw occlusion, in [0, 4].
    pub fn ao_intensity(&self) -> f32 {
        self.ao_intensity
    }

    /// Set the AO power exponent (clamped to [0, 4]).
    pub fn set_ao_intensity(&mut self, intensity: f32) {
        self.ao_intensity = intensity.clamp(0.0, 4.0);
    }

    /// Assumed occluder thickness in world space, in [0.01, 10].
    pub fn thickness(&self) -> f32 {
        self.thickness
    }

    /// Set the occluder thickness (clamped to [0.01, 10]).
    pub fn set_thickness(&mut self, thickness: f32) {
        self.thickness = thickness.clamp(0.01, 10.0);
    }

    /// Whether thickness grows linearly with distance.
    pub fn linear_thickness(&self) -> bool {
        self.linear_thickness
    }

    /// Scale thickness with distance to keep detail far away.
    pub fn set_linear_thickness(&mut self, linear: bool) {
        self.linear_thickness = linear;
    }

    /// Whether the GTAO analytic multi-bounce fit is applied at composite.
    pub fn multi_bounce_ao(&self) -> bool {
        self.multi_bounce_ao
    }

    /// Enable the analytic AO multi-bounce approximation.
    pub fn set_multi_bounce_ao(&mut self, multi_bounce: bool) {
        self.multi_bounce_ao = multi_bounce;
    }

    /// Off-screen lighting source.
    pub fn fallback(&self) -> Fallback {
        self.fallback
    }

    /// Select the off-screen lighting source.
    pub fn set_fallback(&mut self, fallback: Fallback) {
        self.fallback = fallback;
    }

    /// Power curve applied to the fallback source, in [1, 4].
    pub fn fallback_power(&self) -> f32 {
        self.fallback_power
    }

    /// Set the fallback power curve (clamped to [1, 4]).
    pub fn set_fallback_power(&mut self, power: f32) {
        self.fallback_power = power.clamp(1.0, 4.0);
    }

    /// Intensity of the fallback lighting, in [0, 10].
    pub fn fallback_intensity(&self) -> f32 {
        self.fallback_intensity
    }

    /// Set the fallback intensity (clamped to [0, 10]).
    pub fn set_fallback_intensity(&mut self, intensity: f32) {
        self.fallback_intensity = intensity.clamp(0.0, 10.0);
    }

    /// Fallback samples taken per hemisphere rotation.
    pub fn fallback_sample_count(&self) -> FallbackSampleCount {
        self.fallback_sample_count
    }

    /// Set the fallback sample count.
    pub fn set_fallback_sample_count(&mut self, count: FallbackSampleCount) {
        self.fallback_sample_count = count;
    }

    /// Whether sky lighting substitutes for samples outside a reflection
    /// probe's influence volume.
    pub fn reflect_sky(&self) -> bool {
        self.reflect_sky
    }

    /// Enable sky substitution outside the reflection probe.
    pub fn set_reflect_sky(&mut self, reflect: bool) {
        self.reflect_sky = reflect;
    }

    /// Whether temporal reprojection is enabled.
    pub fn temporal_accumulation(&self) -> bool {
        self.temporal_accumulation
    }

    /// Enable or disable temporal reprojection.
    pub fn set_temporal_accumulation(&mut self, accumulate: bool) {
        self.temporal_accumulation = accumulate;
    }

    /// Accumulation speed, in [0, 1]. Higher converges faster but keeps
    /// more noise; lower is smoother but risks ghosting.
    pub fn temporal_response(&self) -> f32 {
        self.temporal_response
    }

    /// Set the accumulation speed (clamped to [0, 1]).
    pub fn set_temporal_response(&mut self, response: f32) {
        self.temporal_response = response.clamp(0.0, 1.0);
    }

    /// Whether the diffuse denoiser runs.
    pub fn denoising(&self) -> bool {
        self.denoising
    }

    /// Enable or disable the diffuse denoiser.
    pub fn set_denoising(&mut self, denoise: bool) {
        self.denoising = denoise;
    }

    /// Denoiser gather radius, in [0, 1].
    pub fn denoising_radius(&self) -> f32 {
        self.denoising_radius
    }

    /// Set the denoiser radius (clamped to [0, 1]).
    pub fn set_denoising_radius(&mut self, radius: f32) {
        self.denoising_radius = radius.clamp(0.0, 1.0);
    }

    /// Selected debug view.
    pub fn debug_mode(&self) -> DebugMode {
        self.debug_mode
    }

    /// Select a debug view (`DebugMode::None` restores compositing).
    pub fn set_debug_mode(&mut self, mode: DebugMode) {
        self.debug_mode = mode;
    }

    /// Whether debug views show radiance without the albedo multiply.
    /// Only meaningful while a debug mode is active.
    pub fn light_only(&self) -> bool {
        self.light_only
    }

    /// Isolate indirect radiance from surface albedo in debug views.
    pub fn set_light_only(&mut self, light_only: bool) {
        self.light_only = light_only;
    }
}

/// Plain-field mirror of [`SsrtSettings`] used during deserialization.
/// Conversion goes through the clamped setters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct SsrtSettingsConfig {
    enabled: bool,
    rotation_count: i32,
    step_count: i32,
    radius: f32,
    exp_factor: f32,
    jitter_samples: bool,
    screen_space_sampling: bool,
    mip_optimization: bool,
    gi_intensity: f32,
    multi_bounce_gi: f32,
    normal_approximation: bool,
    backface_lighting: f32,
    ao_intensity: f32,
    thickness: f32,
    linear_thickness: bool,
    multi_bounce_ao: bool,
    fallback: Fallback,
    fallback_power: f32,
    fallback_intensity: f32,
    fallback_sample_count: FallbackSampleCount,
    reflect_sky: bool,
    temporal_accumulation: bool,
    temporal_response: f32,
    denoising: bool,
    denoising_radius: f32,
    debug_mode: DebugMode,
    light_only: bool,
}

impl Default for SsrtSettingsConfig {
    fn default() -> Self {
        let s = SsrtSettings::default();
        Self {
            enabled: s.enabled,
            rotation_count: s.rotation_count,
            step_count: s.step_count,
            radius: s.radius,
            exp_factor: s.exp_factor,
            jitter_samples: s.jitter_samples,
            screen_space_sampling: s.screen_space_sampling,
            mip_optimization: s.mip_optimization,
            gi_intensity: s.gi_intensity,
            multi_bounce_gi: s.multi_bounce_gi,
            normal_approximation: s.normal_approximation,
            backface_lighting: s.backface_lighting,
            ao_intensity: s.ao_intensity,
            thickness: s.thickness,
            linear_thickness: s.linear_thickness,
            multi_bounce_ao: s.multi_bounce_ao,
            fallback: s.fallback,
            fallback_power: s.fallback_power,
            fallback_intensity: s.fallback_intensity,
            fallback_sample_count: s.fallback_sample_count,
            reflect_sky: s.reflect_sky,
            temporal_accumulation: s.temporal_accumulation,
            temporal_response: s.temporal_response,
            denoising: s.denoising,
            denoising_radius: s.denoising_radius,
            debug_mode: s.debug_mode,
            light_only: s.light_only,
        }
    }
}

impl From<SsrtSettingsConfig> for SsrtSettings {
    fn from(config: SsrtSettingsConfig) -> Self {
        let mut s = SsrtSettings::default();
        s.set_enabled(config.enabled);
        s.set_rotation_count(config.rotation_count);
        s.set_step_count(config.step_count);
        s.set_radius(config.radius);
        s.set_exp_factor(config.exp_factor);
        s.set_jitter_samples(config.jitter_samples);
        s.set_screen_space_sampling(config.screen_space_sampling);
        s.set_mip_optimization(config.mip_optimization);
        s.set_gi_intensity(config.gi_intensity);
        s.set_multi_bounce_gi(config.multi_bounce_gi);
        s.set_normal_approximation(config.normal_approximation);
        s.set_backface_lighting(config.backface_lighting);
        s.set_ao_intensity(config.ao_intensity);
        s.set_thickness(config.thickness);
        s.set_linear_thickness(config.linear_thickness);
        s.set_multi_bounce_ao(config.multi_bounce_ao);
        s.set_fallback(config.fallback);
        s.set_fallback_power(config.fallback_power);
        s.set_fallback_intensity(config.fallback_intensity);
        s.set_fallback_sample_count(config.fallback_sample_count);
        s.set_reflect_sky(config.reflect_sky);
        s.set_temporal_accumulation(config.temporal_accumulation);
        s.set_temporal_response(config.temporal_response);
        s.set_denoising(config.denoising);
        s.set_denoising_radius(config.denoising_radius);
        s.set_debug_mode(config.debug_mode);
        s.set_light_only(config.light_only);
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = SsrtSettings::default();
        assert!(!s.enabled());
        assert_eq!(s.rotation_count(), 1);
        assert_eq!(s.step_count(), 12);
        assert_eq!(s.radius(), 5.0);
        assert_eq!(s.exp_factor(), 1.0);
        assert_eq!(s.gi_intensity(), 10.0);
        assert_eq!(s.temporal_response(), 0.35);
        assert_eq!(s.fallback(), Fallback::None);
        assert_eq!(s.fallback_sample_count().samples(), 4);
        assert_eq!(s.debug_mode(), DebugMode::None);
    }

    #[test]
    fn test_clamping_below_range() {
        let mut s = SsrtSettings::default();
        s.set_rotation_count(0);
        s.set_step_count(-5);
        s.set_radius(0.0);
        s.set_exp_factor(0.5);
        s.set_thickness(0.0);
        s.set_fallback_power(0.0);
        s.set_temporal_response(-1.0);
        assert_eq!(s.rotation_count(), 1);
        assert_eq!(s.step_count(), 1);
        assert_eq!(s.radius(), 1.0);
        assert_eq!(s.exp_factor(), 1.0);
        assert_eq!(s.thickness(), 0.01);
        assert_eq!(s.fallback_power(), 1.0);
        assert_eq!(s.temporal_response(), 0.0);
    }

    #[test]
    fn test_clamping_above_range() {
        let mut s = SsrtSettings::default();
        s.set_rotation_count(100);
        s.set_step_count(64);
        s.set_radius(1000.0);
        s.set_gi_intensity(500.0);
        s.set_ao_intensity(8.0);
        s.set_fallback_intensity(25.0);
        s.set_denoising_radius(2.0);
        assert_eq!(s.rotation_count(), 4);
        assert_eq!(s.step_count(), 32);
        assert_eq!(s.radius(), 25.0);
        assert_eq!(s.gi_intensity(), 100.0);
        assert_eq!(s.ao_intensity(), 4.0);
        assert_eq!(s.fallback_intensity(), 10.0);
        assert_eq!(s.denoising_radius(), 1.0);
    }

    #[test]
    fn test_boundary_values_kept() {
        let mut s = SsrtSettings::default();
        s.set_radius(25.0);
        assert_eq!(s.radius(), 25.0);
        s.set_radius(1.0);
        assert_eq!(s.radius(), 1.0);
        s.set_temporal_response(1.0);
        assert_eq!(s.temporal_response(), 1.0);
        s.set_step_count(32);
        assert_eq!(s.step_count(), 32);
    }

    #[test]
    fn test_deserialization_clamps() {
        let json = r#"{
            "enabled": true,
            "radius": 400.0,
            "step_count": -3,
            "gi_intensity": 12.5
        }"#;
        let s: SsrtSettings = serde_json::from_str(json).unwrap();
        assert!(s.enabled());
        assert_eq!(s.radius(), 25.0);
        assert_eq!(s.step_count(), 1);
        assert_eq!(s.gi_intensity(), 12.5);
        // Unmentioned fields keep their defaults.
        assert_eq!(s.rotation_count(), 1);
    }

    #[test]
    fn test_roundtrip() {
        let mut s = SsrtSettings::default();
        s.set_enabled(true);
        s.set_fallback(Fallback::ReflectionProbe);
        s.set_fallback_sample_count(FallbackSampleCount::Sixteen);
        let json = serde_json::to_string(&s).unwrap();
        let back: SsrtSettings = serde_json::from_str(&json).unwrap();
        assert!(back.enabled());
        assert_eq!(back.fallback(), Fallback::ReflectionProbe);
        assert_eq!(back.fallback_sample_count().samples(), 16);
    }

    #[test]
    fn test_fallback_sample_counts() {
        assert_eq!(FallbackSampleCount::Two.samples(), 2);
        assert_eq!(FallbackSampleCount::ThirtyTwo.samples(), 32);
    }
}
