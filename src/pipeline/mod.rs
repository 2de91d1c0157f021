//! Screen-space ray-traced GI/AO pipeline.
//!
//! [`SsrtPipeline`] owns every GPU resource and records the whole effect
//! into a host-provided command encoder each frame: pyramid generation,
//! hemisphere sampling, temporal accumulation, denoising and the final
//! composite. The host keeps ownership of the G-buffer and the output
//! target; the pipeline only reads the former and writes the latter.

pub mod composite;
pub mod denoiser;
pub mod frame;
pub mod kernel;
pub mod pyramid;
pub mod quad;
pub mod sampler;
pub mod settings;
pub mod temporal;
pub mod toggle;

pub use composite::Compositor;
pub use denoiser::DiffuseDenoiser;
pub use frame::{CameraDesc, FrameContext};
pub use kernel::{DenoiserKernel, SsrtKernel};
pub use pyramid::PyramidBuilder;
pub use sampler::HemisphereSampler;
pub use settings::{DebugMode, Fallback, FallbackSampleCount, SsrtSettings};
pub use temporal::TemporalReprojector;
pub use toggle::ToggleAction;

use glam::Mat4;
use wgpu::util::DeviceExt;

use crate::error::SsrtError;

/// Format of the intermediate filter buffers and the history color.
pub const FILTER_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Uniform block shared by every SSRT shader. Matrices first, then nine
/// vec4 slots; the layout must match the WGSL `Params` struct.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct SsrtUniform {
    view: [[f32; 4]; 4],
    camera_to_world: [[f32; 4]; 4],
    inverse_projection: [[f32; 4]; 4],
    view_projection: [[f32; 4]; 4],
    inverse_view_projection: [[f32; 4]; 4],
    prev_view_projection: [[f32; 4]; 4],
    // 1/w, 1/h, w, h
    resolution: [f32; 4],
    // radius, exp_factor, rotation_count, step_count
    sampling: [f32; 4],
    // jitter, screen_space, mip_optimization, half_proj_scale
    sampling2: [f32; 4],
    // rotation, offset, response, history_valid
    temporal: [f32; 4],
    // gi_intensity, multi_bounce_gi, backface_lighting, normal_approximation
    gi: [f32; 4],
    // ao_intensity, thickness, linear_thickness, multi_bounce_ao
    ao: [f32; 4],
    // mode, power, intensity, sample_count
    fallback: [f32; 4],
    // light_only, reflect_sky, frame, mip_count
    debug: [f32; 4],
    // near, far, pixel_spread_tangent, pad
    camera: [f32; 4],
}

fn flag(value: bool) -> f32 {
    if value {
        1.0
    } else {
        0.0
    }
}

fn build_uniform(
    ctx: &FrameContext,
    settings: &SsrtSettings,
    prev_view_projection: Mat4,
    history_valid: bool,
    mip_count: u32,
) -> SsrtUniform {
    let fallback_mode = match settings.fallback() {
        Fallback::None => 0.0,
        Fallback::IrradianceVolume => 1.0,
        Fallback::ReflectionProbe => 2.0,
    };
    SsrtUniform {
        view: ctx.view.to_cols_array_2d(),
        camera_to_world: ctx.camera_to_world.to_cols_array_2d(),
        inverse_projection: ctx.inverse_projection.to_cols_array_2d(),
        view_projection: ctx.view_projection.to_cols_array_2d(),
        inverse_view_projection: ctx.inverse_view_projection.to_cols_array_2d(),
        prev_view_projection: prev_view_projection.to_cols_array_2d(),
        resolution: [
            1.0 / ctx.width as f32,
            1.0 / ctx.height as f32,
            ctx.width as f32,
            ctx.height as f32,
        ],
        sampling: [
            settings.radius(),
            settings.exp_factor(),
            settings.rotation_count() as f32,
            settings.step_count() as f32,
        ],
        sampling2: [
            flag(settings.jitter_samples()),
            flag(settings.screen_space_sampling()),
            flag(settings.mip_optimization()),
            ctx.half_proj_scale,
        ],
        temporal: [
            ctx.temporal_rotation,
            ctx.spatial_offset,
            settings.temporal_response(),
            flag(history_valid),
        ],
        gi: [
            settings.gi_intensity(),
            settings.multi_bounce_gi(),
            settings.backface_lighting(),
            flag(settings.normal_approximation()),
        ],
        ao: [
            settings.ao_intensity(),
            settings.thickness(),
            flag(settings.linear_thickness()),
            flag(settings.multi_bounce_ao()),
        ],
        fallback: [
            fallback_mode,
            settings.fallback_power(),
            settings.fallback_intensity(),
            settings.fallback_sample_count().samples() as f32,
        ],
        debug: [
            // Only the debug views honor light-only; the combined
            // composite always keeps the scene's direct lighting.
            flag(settings.light_only() && settings.debug_mode() != DebugMode::None),
            flag(settings.reflect_sky()),
            ctx.frame_index as f32,
            mip_count as f32,
        ],
        camera: [ctx.near, ctx.far, ctx.pixel_spread_tangent, 0.0],
    }
}

/// External textures the host supplies for one frame.
#[derive(Clone, Copy)]
pub struct FrameInputs<'a> {
    /// Lit scene color the effect composites over.
    pub scene: &'a wgpu::TextureView,
    /// Hardware depth buffer of the scene.
    pub gbuffer_depth: &'a wgpu::TextureView,
    /// World-space normals of the scene.
    pub gbuffer_normals: &'a wgpu::TextureView,
    /// Cube map sampled for rays that escape the screen. When `None`, a
    /// black placeholder keeps escaped rays unlit.
    pub fallback_cube: Option<&'a wgpu::TextureView>,
}

/// One step of a frame's execution, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStage {
    /// Regenerate the light, depth and normal pyramids.
    Pyramids,
    /// Run the hemisphere-sampling compute kernel.
    HemisphereSample,
    /// Blend against reprojected history.
    TemporalReproject,
    /// Pass the raw estimate through unblended.
    RawCopy,
    /// One-shot generation of the denoiser's disk points.
    GeneratePointDistribution,
    /// Bilateral filtering of the accumulated signal.
    Denoise,
    /// Save this frame's color and depth for the next frame.
    HistoryCopy,
    /// Write the composite (or debug view) to the output target.
    Composite,
}

/// Plan the stages one frame will execute given the current settings.
/// A disabled effect plans nothing.
pub fn frame_plan(settings: &SsrtSettings, points_generated: bool) -> Vec<FrameStage> {
    if !settings.enabled() {
        return Vec::new();
    }
    let mut plan = vec![FrameStage::Pyramids, FrameStage::HemisphereSample];
    if settings.temporal_accumulation() {
        plan.push(FrameStage::TemporalReproject);
    } else {
        plan.push(FrameStage::RawCopy);
    }
    if settings.denoising() {
        if !points_generated {
            plan.push(FrameStage::GeneratePointDistribution);
        }
        plan.push(FrameStage::Denoise);
    }
    if settings.temporal_accumulation() {
        plan.push(FrameStage::HistoryCopy);
    }
    plan.push(FrameStage::Composite);
    plan
}

struct FilterTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl FilterTexture {
    fn new(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

/// The full SSRT effect.
pub struct SsrtPipeline {
    settings: SsrtSettings,
    width: u32,
    height: u32,
    frame_index: u32,
    history_valid: bool,
    prev_view_projection: Mat4,
    uniform_buffer: Option<wgpu::Buffer>,
    quad_buffer: Option<wgpu::Buffer>,
    linear_sampler: Option<wgpu::Sampler>,
    point_sampler: Option<wgpu::Sampler>,
    // Raw estimate and storage target of the denoiser.
    filter1: Option<FilterTexture>,
    // Accumulated signal the composite reads.
    filter2: Option<FilterTexture>,
    previous_color: Option<FilterTexture>,
    previous_depth: Option<FilterTexture>,
    placeholder_cube_view: Option<wgpu::TextureView>,
    pyramids: PyramidBuilder,
    sampler: HemisphereSampler,
    temporal: TemporalReprojector,
    denoiser: DiffuseDenoiser,
    compositor: Compositor,
}

impl SsrtPipeline {
    /// Create a pipeline with default settings and no GPU resources.
    pub fn new() -> Self {
        Self {
            settings: SsrtSettings::default(),
            width: 0,
            height: 0,
            frame_index: 0,
            history_valid: false,
            prev_view_projection: Mat4::IDENTITY,
            uniform_buffer: None,
            quad_buffer: None,
            linear_sampler: None,
            point_sampler: None,
            filter1: None,
            filter2: None,
            previous_color: None,
            previous_depth: None,
            placeholder_cube_view: None,
            pyramids: PyramidBuilder::new(),
            sampler: HemisphereSampler::new(),
            temporal: TemporalReprojector::new(),
            denoiser: DiffuseDenoiser::new(),
            compositor: Compositor::new(),
        }
    }

    /// Current settings.
    pub fn settings(&self) -> &SsrtSettings {
        &self.settings
    }

    /// Mutable settings. Changes apply on the next recorded frame.
    pub fn settings_mut(&mut self) -> &mut SsrtSettings {
        &mut self.settings
    }

    /// Frames recorded since init.
    pub fn frame_index(&self) -> u32 {
        self.frame_index
    }

    /// Create every pipeline and allocate every texture.
    pub fn init(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        width: u32,
        height: u32,
        target_format: wgpu::TextureFormat,
    ) -> Result<(), SsrtError> {
        if width == 0 || height == 0 {
            return Err(SsrtError::InvalidResolution { width, height });
        }
        log::info!("initializing SSRT pipeline at {}x{}", width, height);

        self.uniform_buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("SSRT Uniforms"),
            size: std::mem::size_of::<SsrtUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));
        self.quad_buffer = Some(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("SSRT Fullscreen Quad"),
            contents: bytemuck::cast_slice(&quad::FULLSCREEN_QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        }));

        self.linear_sampler = Some(device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("SSRT Linear Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        }));
        self.point_sampler = Some(device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("SSRT Point Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        }));

        self.create_placeholder_cube(device, queue);

        self.pyramids.init(device, width, height);
        self.sampler.init(device);
        self.temporal.init(device);
        self.denoiser.init(device, queue);
        self.compositor.init(device, target_format);

        self.allocate_filters(device, width, height);
        self.frame_index = 0;
        self.history_valid = false;
        self.prev_view_projection = Mat4::IDENTITY;
        Ok(())
    }

    fn create_placeholder_cube(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        let cube = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("SSRT Placeholder Cube"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 6,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FILTER_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        // Six black texels, 8 bytes each.
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &cube,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &[0u8; 48],
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(8),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 6,
            },
        );
        // The view holds the texture alive.
        self.placeholder_cube_view = Some(cube.create_view(&wgpu::TextureViewDescriptor {
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        }));
    }

    fn allocate_filters(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.filter1 = Some(FilterTexture::new(
            device,
            "SSRT Filter Buffer 1",
            width,
            height,
            FILTER_FORMAT,
            wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
        ));
        self.filter2 = Some(FilterTexture::new(
            device,
            "SSRT Filter Buffer 2",
            width,
            height,
            FILTER_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
        ));
        self.previous_color = Some(FilterTexture::new(
            device,
            "SSRT Previous Color",
            width,
            height,
            FILTER_FORMAT,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        ));
        self.previous_depth = Some(FilterTexture::new(
            device,
            "SSRT Previous Depth",
            width,
            height,
            pyramid::DEPTH_PYRAMID_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        ));
    }

    /// Reallocate size-dependent resources and invalidate history.
    pub fn resize(
        &mut self,
        device: &wgpu::Device,
        width: u32,
        height: u32,
    ) -> Result<(), SsrtError> {
        if width == 0 || height == 0 {
            return Err(SsrtError::InvalidResolution { width, height });
        }
        // Nothing to reallocate before init (or after teardown).
        if self.uniform_buffer.is_none() {
            return Ok(());
        }
        if width == self.width && height == self.height {
            return Ok(());
        }
        log::info!("resizing SSRT pipeline to {}x{}", width, height);
        self.pyramids.allocate(device, width, height);
        self.allocate_filters(device, width, height);
        self.history_valid = false;
        Ok(())
    }

    /// True when every stage is ready to record.
    pub fn is_ready(&self) -> bool {
        self.uniform_buffer.is_some()
            && self.pyramids.is_ready()
            && self.sampler.is_ready()
            && self.temporal.is_ready()
            && self.denoiser.is_ready()
            && self.compositor.is_ready()
    }

    /// Record one frame of the effect into `encoder`.
    ///
    /// No-op when the effect is disabled or resources are missing; the
    /// host's scene image stays untouched in that case.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        camera: &CameraDesc,
        inputs: &FrameInputs,
        target: &wgpu::TextureView,
    ) {
        if !self.settings.enabled() {
            return;
        }
        if !self.is_ready() {
            log::warn!("SSRT frame skipped: pipeline resources not initialized");
            return;
        }
        let (Some(uniform_buffer), Some(quad_buffer)) =
            (self.uniform_buffer.as_ref(), self.quad_buffer.as_ref())
        else {
            return;
        };
        let (Some(linear_sampler), Some(point_sampler)) =
            (self.linear_sampler.as_ref(), self.point_sampler.as_ref())
        else {
            return;
        };
        let (Some(filter1), Some(filter2)) = (self.filter1.as_ref(), self.filter2.as_ref())
        else {
            return;
        };
        let (Some(previous_color), Some(previous_depth)) =
            (self.previous_color.as_ref(), self.previous_depth.as_ref())
        else {
            return;
        };
        let (Some(light_pyramid), Some(depth_pyramid), Some(normal_pyramid)) = (
            self.pyramids.light_view(),
            self.pyramids.depth_view(),
            self.pyramids.normal_view(),
        ) else {
            return;
        };
        let Some(placeholder_cube) = self.placeholder_cube_view.as_ref() else {
            return;
        };
        let fallback_cube = inputs.fallback_cube.unwrap_or(placeholder_cube);

        let ctx = FrameContext::new(camera, self.width, self.height, self.frame_index);
        let uniform = build_uniform(
            &ctx,
            &self.settings,
            self.prev_view_projection,
            self.history_valid,
            self.pyramids.mip_count(),
        );
        queue.write_buffer(uniform_buffer, 0, bytemuck::bytes_of(&uniform));

        let plan = frame_plan(&self.settings, self.denoiser.points_generated());
        log::trace!("SSRT frame {} plan: {:?}", self.frame_index, plan);

        for stage in plan {
            match stage {
                FrameStage::Pyramids => {
                    self.pyramids.record(
                        encoder,
                        device,
                        uniform_buffer,
                        inputs.scene,
                        inputs.gbuffer_depth,
                        inputs.gbuffer_normals,
                        point_sampler,
                        quad_buffer,
                    );
                }
                FrameStage::HemisphereSample => {
                    self.sampler.record(
                        encoder,
                        device,
                        uniform_buffer,
                        light_pyramid,
                        depth_pyramid,
                        normal_pyramid,
                        fallback_cube,
                        &filter1.view,
                        linear_sampler,
                        point_sampler,
                        self.width,
                        self.height,
                    );
                }
                FrameStage::TemporalReproject => {
                    self.temporal.record(
                        encoder,
                        device,
                        uniform_buffer,
                        &filter1.view,
                        &previous_color.view,
                        &previous_depth.view,
                        depth_pyramid,
                        linear_sampler,
                        point_sampler,
                        quad_buffer,
                        &filter2.view,
                    );
                }
                FrameStage::RawCopy => {
                    copy_full(encoder, &filter1.texture, &filter2.texture, self.width, self.height);
                }
                FrameStage::GeneratePointDistribution => {
                    self.denoiser.record_point_distribution(encoder, device);
                }
                FrameStage::Denoise => {
                    self.denoiser.record_filter(
                        encoder,
                        device,
                        queue,
                        &filter2.view,
                        depth_pyramid,
                        &filter1.view,
                        self.width,
                        self.height,
                        self.settings.denoising_radius(),
                        ctx.pixel_spread_tangent,
                    );
                    copy_full(encoder, &filter1.texture, &filter2.texture, self.width, self.height);
                }
                FrameStage::HistoryCopy => {
                    copy_full(
                        encoder,
                        &filter2.texture,
                        &previous_color.texture,
                        self.width,
                        self.height,
                    );
                    self.pyramids.record_depth_extract(
                        encoder,
                        device,
                        uniform_buffer,
                        inputs.scene,
                        inputs.gbuffer_depth,
                        inputs.gbuffer_normals,
                        point_sampler,
                        quad_buffer,
                        &previous_depth.view,
                    );
                }
                FrameStage::Composite => {
                    self.compositor.record(
                        encoder,
                        device,
                        self.settings.debug_mode(),
                        uniform_buffer,
                        inputs.scene,
                        &filter2.view,
                        light_pyramid,
                        depth_pyramid,
                        normal_pyramid,
                        linear_sampler,
                        point_sampler,
                        quad_buffer,
                        target,
                    );
                }
            }
        }

        self.end_frame(ctx.view_projection);
    }

    fn end_frame(&mut self, view_projection: Mat4) {
        self.history_valid = self.settings.temporal_accumulation();
        self.prev_view_projection = view_projection;
        // The rotation/offset tables only advance while the reprojector is
        // there to average them; without it a static scene must produce a
        // static sampling pattern.
        if self.settings.temporal_accumulation() {
            self.frame_index = self.frame_index.wrapping_add(1);
        }
    }

    /// Release every GPU resource.
    pub fn teardown(&mut self) {
        log::info!("tearing down SSRT pipeline");
        self.uniform_buffer = None;
        self.quad_buffer = None;
        self.linear_sampler = None;
        self.point_sampler = None;
        self.filter1 = None;
        self.filter2 = None;
        self.previous_color = None;
        self.previous_depth = None;
        self.placeholder_cube_view = None;
        self.pyramids.teardown();
        self.sampler.teardown();
        self.temporal.teardown();
        self.denoiser.teardown();
        self.compositor.teardown();
        self.history_valid = false;
        self.frame_index = 0;
    }
}

impl Default for SsrtPipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn copy_full(
    encoder: &mut wgpu::CommandEncoder,
    source: &wgpu::Texture,
    destination: &wgpu::Texture,
    width: u32,
    height: u32,
) {
    encoder.copy_texture_to_texture(
        wgpu::ImageCopyTexture {
            texture: source,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyTexture {
            texture: destination,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn camera() -> CameraDesc {
        let fov_y = std::f32::consts::FRAC_PI_3;
        CameraDesc {
            view: Mat4::look_at_rh(Vec3::new(1.0, 1.0, 1.0), Vec3::ZERO, Vec3::Y),
            projection: Mat4::perspective_rh(fov_y, 16.0 / 9.0, 0.1, 500.0),
            fov_y,
            near: 0.1,
            far: 500.0,
        }
    }

    fn enabled_settings() -> SsrtSettings {
        let mut settings = SsrtSettings::default();
        settings.set_enabled(true);
        settings
    }

    #[test]
    fn test_plan_disabled_is_empty() {
        let settings = SsrtSettings::default();
        assert!(frame_plan(&settings, false).is_empty());
        assert!(frame_plan(&settings, true).is_empty());
    }

    #[test]
    fn test_plan_default_filters_on() {
        let mut settings = enabled_settings();
        settings.set_temporal_accumulation(true);
        settings.set_denoising(true);
        let plan = frame_plan(&settings, false);
        assert_eq!(
            plan,
            vec![
                FrameStage::Pyramids,
                FrameStage::HemisphereSample,
                FrameStage::TemporalReproject,
                FrameStage::GeneratePointDistribution,
                FrameStage::Denoise,
                FrameStage::HistoryCopy,
                FrameStage::Composite,
            ]
        );
    }

    #[test]
    fn test_plan_points_generated_once() {
        let mut settings = enabled_settings();
        settings.set_denoising(true);
        let plan = frame_plan(&settings, true);
        assert!(!plan.contains(&FrameStage::GeneratePointDistribution));
        assert!(plan.contains(&FrameStage::Denoise));
    }

    #[test]
    fn test_plan_temporal_off_uses_raw_copy() {
        let mut settings = enabled_settings();
        settings.set_temporal_accumulation(false);
        let plan = frame_plan(&settings, true);
        assert!(plan.contains(&FrameStage::RawCopy));
        assert!(!plan.contains(&FrameStage::TemporalReproject));
        assert!(!plan.contains(&FrameStage::HistoryCopy));
    }

    #[test]
    fn test_plan_denoising_off_skips_denoise() {
        let mut settings = enabled_settings();
        settings.set_denoising(false);
        let plan = frame_plan(&settings, false);
        assert!(!plan.contains(&FrameStage::Denoise));
        assert!(!plan.contains(&FrameStage::GeneratePointDistribution));
    }

    #[test]
    fn test_plan_order_invariants() {
        for temporal in [false, true] {
            for denoising in [false, true] {
                for generated in [false, true] {
                    let mut settings = enabled_settings();
                    settings.set_temporal_accumulation(temporal);
                    settings.set_denoising(denoising);
                    let plan = frame_plan(&settings, generated);
                    assert_eq!(plan.first(), Some(&FrameStage::Pyramids));
                    assert_eq!(plan[1], FrameStage::HemisphereSample);
                    assert_eq!(plan.last(), Some(&FrameStage::Composite));
                }
            }
        }
    }

    #[test]
    fn test_uniform_packs_resolution_and_frame() {
        let ctx = FrameContext::new(&camera(), 1920, 1080, 7);
        let settings = SsrtSettings::default();
        let uniform = build_uniform(&ctx, &settings, Mat4::IDENTITY, false, 11);
        assert_eq!(uniform.resolution[2], 1920.0);
        assert_eq!(uniform.resolution[3], 1080.0);
        assert!((uniform.resolution[0] - 1.0 / 1920.0).abs() < 1e-9);
        assert_eq!(uniform.debug[2], 7.0);
        assert_eq!(uniform.debug[3], 11.0);
        assert_eq!(uniform.temporal[3], 0.0);
    }

    #[test]
    fn test_uniform_history_flag_and_fallback_mode() {
        let ctx = FrameContext::new(&camera(), 1280, 720, 0);
        let mut settings = SsrtSettings::default();
        settings.set_fallback(Fallback::ReflectionProbe);
        let uniform = build_uniform(&ctx, &settings, Mat4::IDENTITY, true, 10);
        assert_eq!(uniform.temporal[3], 1.0);
        assert_eq!(uniform.fallback[0], 2.0);
        assert_eq!(
            uniform.fallback[3],
            settings.fallback_sample_count().samples() as f32
        );
    }

    #[test]
    fn test_uniform_size_matches_wgsl_params() {
        // 6 mat4 + 9 vec4.
        assert_eq!(std::mem::size_of::<SsrtUniform>(), 6 * 64 + 9 * 16);
    }

    #[test]
    fn test_pipeline_starts_disabled_and_unready() {
        let pipeline = SsrtPipeline::new();
        assert!(!pipeline.settings().enabled());
        assert!(!pipeline.is_ready());
        assert_eq!(pipeline.frame_index(), 0);
    }

    #[test]
    fn test_uniform_gates_light_only_on_debug_mode() {
        let ctx = FrameContext::new(&camera(), 1280, 720, 0);
        let mut settings = SsrtSettings::default();
        settings.set_light_only(true);
        let uniform = build_uniform(&ctx, &settings, Mat4::IDENTITY, false, 10);
        assert_eq!(uniform.debug[0], 0.0);

        settings.set_debug_mode(DebugMode::Gi);
        let uniform = build_uniform(&ctx, &settings, Mat4::IDENTITY, false, 10);
        assert_eq!(uniform.debug[0], 1.0);
    }

    #[test]
    fn test_static_frames_share_jitter_with_temporal_off() {
        let mut pipeline = SsrtPipeline::new();
        pipeline.settings_mut().set_enabled(true);
        pipeline.settings_mut().set_temporal_accumulation(false);
        pipeline.settings_mut().set_denoising(false);

        let first = FrameContext::new(&camera(), 1280, 720, pipeline.frame_index());
        pipeline.end_frame(first.view_projection);
        let second = FrameContext::new(&camera(), 1280, 720, pipeline.frame_index());
        assert_eq!(pipeline.frame_index(), 0);
        assert_eq!(first.temporal_rotation, second.temporal_rotation);
        assert_eq!(first.spatial_offset, second.spatial_offset);

        pipeline.settings_mut().set_temporal_accumulation(true);
        pipeline.end_frame(first.view_projection);
        assert_eq!(pipeline.frame_index(), 1);
    }
}
