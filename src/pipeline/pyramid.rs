//! Pyramid generation: light-mask, linear-depth and normal mip chains.
//!
//! All three pyramids are fully regenerated every frame from the G-buffer:
//! an extraction draw fills mip 0, then one downsample draw per level walks
//! the chain. The hemisphere sampler reads coarser mips for distant samples
//! when mip optimization is enabled.

use crate::math::mip_level_count;

use super::kernel::SsrtKernel;
use super::quad::{FullscreenVertex, FULLSCREEN_VS};

/// Formats of the three pyramid textures.
pub const LIGHT_PYRAMID_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
/// Linear depth is stored as a single 32-bit float channel.
pub const DEPTH_PYRAMID_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;
/// Normals are octahedral-encoded into two 16-bit float channels.
pub const NORMAL_PYRAMID_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rg16Float;

struct PyramidTexture {
    texture: wgpu::Texture,
    /// View over the whole mip chain, for sampling.
    full_view: wgpu::TextureView,
    /// One render-target view per mip level.
    mip_views: Vec<wgpu::TextureView>,
}

impl PyramidTexture {
    fn new(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        mip_count: u32,
        format: wgpu::TextureFormat,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: mip_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });

        let full_view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mip_views = (0..mip_count)
            .map(|level| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    base_mip_level: level,
                    mip_level_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();

        Self {
            texture,
            full_view,
            mip_views,
        }
    }
}

/// Builds the three mip-chained source pyramids each frame.
pub struct PyramidBuilder {
    width: u32,
    height: u32,
    mip_count: u32,
    extract_bind_group_layout: Option<wgpu::BindGroupLayout>,
    downsample_bind_group_layout: Option<wgpu::BindGroupLayout>,
    extract_depth_pipeline: Option<wgpu::RenderPipeline>,
    extract_lightmask_pipeline: Option<wgpu::RenderPipeline>,
    extract_normals_pipeline: Option<wgpu::RenderPipeline>,
    downsample_light_pipeline: Option<wgpu::RenderPipeline>,
    downsample_depth_pipeline: Option<wgpu::RenderPipeline>,
    downsample_normal_pipeline: Option<wgpu::RenderPipeline>,
    light: Option<PyramidTexture>,
    depth: Option<PyramidTexture>,
    normal: Option<PyramidTexture>,
}

impl PyramidBuilder {
    /// Create a new pyramid builder with no GPU resources yet.
    pub fn new() -> Self {
        Self {
            width: 1,
            height: 1,
            mip_count: 1,
            extract_bind_group_layout: None,
            downsample_bind_group_layout: None,
            extract_depth_pipeline: None,
            extract_lightmask_pipeline: None,
            extract_normals_pipeline: None,
            downsample_light_pipeline: None,
            downsample_depth_pipeline: None,
            downsample_normal_pipeline: None,
            light: None,
            depth: None,
            normal: None,
        }
    }

    /// Create pipelines and allocate the pyramid textures.
    pub fn init(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.extract_bind_group_layout = Some(device.create_bind_group_layout(
            &wgpu::BindGroupLayoutDescriptor {
                label: Some("SSRT Extract Bind Group Layout"),
                entries: &[
                    // Uniforms
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    // Scene color / light accumulation
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    // G-buffer depth
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Depth,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    // G-buffer world-space normals
                    wgpu::BindGroupLayoutEntry {
                        binding: 3,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    // Point sampler
                    wgpu::BindGroupLayoutEntry {
                        binding: 4,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                        count: None,
                    },
                ],
            },
        ));

        self.downsample_bind_group_layout = Some(device.create_bind_group_layout(
            &wgpu::BindGroupLayoutDescriptor {
                label: Some("SSRT Downsample Bind Group Layout"),
                entries: &[
                    // Previous mip level
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: false },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                ],
            },
        ));

        self.create_pipelines(device);
        self.allocate(device, width, height);
    }

    fn create_pipelines(&mut self, device: &wgpu::Device) {
        let extract_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("SSRT Extract Shader"),
            source: wgpu::ShaderSource::Wgsl(
                format!("{}{}", FULLSCREEN_VS, EXTRACT_SHADER).into(),
            ),
        });

        let extract_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("SSRT Extract Pipeline Layout"),
            bind_group_layouts: &[self.extract_bind_group_layout.as_ref().unwrap()],
            push_constant_ranges: &[],
        });

        let extract_pipeline = |kernel: SsrtKernel, format: wgpu::TextureFormat| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("SSRT Extract Pipeline"),
                layout: Some(&extract_layout),
                vertex: wgpu::VertexState {
                    module: &extract_shader,
                    entry_point: Some("vs_main"),
                    buffers: &[FullscreenVertex::layout()],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &extract_shader,
                    entry_point: Some(kernel.entry_point()),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };

        self.extract_depth_pipeline =
            Some(extract_pipeline(SsrtKernel::ExtractDepth, DEPTH_PYRAMID_FORMAT));
        self.extract_lightmask_pipeline = Some(extract_pipeline(
            SsrtKernel::ExtractLightMask,
            LIGHT_PYRAMID_FORMAT,
        ));
        self.extract_normals_pipeline = Some(extract_pipeline(
            SsrtKernel::ExtractNormals,
            NORMAL_PYRAMID_FORMAT,
        ));

        let downsample_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("SSRT Downsample Shader"),
            source: wgpu::ShaderSource::Wgsl(
                format!("{}{}", FULLSCREEN_VS, DOWNSAMPLE_SHADER).into(),
            ),
        });

        let downsample_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("SSRT Downsample Pipeline Layout"),
            bind_group_layouts: &[self.downsample_bind_group_layout.as_ref().unwrap()],
            push_constant_ranges: &[],
        });

        let downsample_pipeline = |format: wgpu::TextureFormat| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("SSRT Downsample Pipeline"),
                layout: Some(&downsample_layout),
                vertex: wgpu::VertexState {
                    module: &downsample_shader,
                    entry_point: Some("vs_main"),
                    buffers: &[FullscreenVertex::layout()],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &downsample_shader,
                    entry_point: Some("fs_downsample"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };

        self.downsample_light_pipeline = Some(downsample_pipeline(LIGHT_PYRAMID_FORMAT));
        self.downsample_depth_pipeline = Some(downsample_pipeline(DEPTH_PYRAMID_FORMAT));
        self.downsample_normal_pipeline = Some(downsample_pipeline(NORMAL_PYRAMID_FORMAT));
    }

    /// Allocate (or reallocate) the pyramid textures for a resolution.
    pub fn allocate(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.mip_count = mip_level_count(width, height);

        self.light = Some(PyramidTexture::new(
            device,
            "SSRT Light Pyramid",
            width,
            height,
            self.mip_count,
            LIGHT_PYRAMID_FORMAT,
        ));
        self.depth = Some(PyramidTexture::new(
            device,
            "SSRT Depth Pyramid",
            width,
            height,
            self.mip_count,
            DEPTH_PYRAMID_FORMAT,
        ));
        self.normal = Some(PyramidTexture::new(
            device,
            "SSRT Normal Pyramid",
            width,
            height,
            self.mip_count,
            NORMAL_PYRAMID_FORMAT,
        ));
    }

    /// Number of mip levels in each pyramid.
    pub fn mip_count(&self) -> u32 {
        self.mip_count
    }

    /// Full-chain view of the light-mask pyramid.
    pub fn light_view(&self) -> Option<&wgpu::TextureView> {
        self.light.as_ref().map(|p| &p.full_view)
    }

    /// Full-chain view of the linear-depth pyramid.
    pub fn depth_view(&self) -> Option<&wgpu::TextureView> {
        self.depth.as_ref().map(|p| &p.full_view)
    }

    /// Full-chain view of the normal pyramid.
    pub fn normal_view(&self) -> Option<&wgpu::TextureView> {
        self.normal.as_ref().map(|p| &p.full_view)
    }

    /// True when every pipeline and texture is ready.
    pub fn is_ready(&self) -> bool {
        self.extract_depth_pipeline.is_some()
            && self.extract_lightmask_pipeline.is_some()
            && self.extract_normals_pipeline.is_some()
            && self.light.is_some()
            && self.depth.is_some()
            && self.normal.is_some()
    }

    fn extract_bind_group(
        &self,
        device: &wgpu::Device,
        uniform_buffer: &wgpu::Buffer,
        scene: &wgpu::TextureView,
        gbuffer_depth: &wgpu::TextureView,
        gbuffer_normals: &wgpu::TextureView,
        point_sampler: &wgpu::Sampler,
    ) -> Option<wgpu::BindGroup> {
        let layout = self.extract_bind_group_layout.as_ref()?;
        Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("SSRT Extract Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(scene),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(gbuffer_depth),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(gbuffer_normals),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(point_sampler),
                },
            ],
        }))
    }

    fn draw_fullscreen(
        encoder: &mut wgpu::CommandEncoder,
        pipeline: &wgpu::RenderPipeline,
        bind_group: &wgpu::BindGroup,
        quad_buffer: &wgpu::Buffer,
        target: &wgpu::TextureView,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("SSRT Pyramid Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.set_vertex_buffer(0, quad_buffer.slice(..));
        pass.draw(0..6, 0..1);
    }

    fn generate_mips(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        device: &wgpu::Device,
        pyramid: &PyramidTexture,
        pipeline: &wgpu::RenderPipeline,
        quad_buffer: &wgpu::Buffer,
    ) {
        let Some(layout) = self.downsample_bind_group_layout.as_ref() else {
            return;
        };

        for level in 1..pyramid.mip_views.len() {
            let source = pyramid.texture.create_view(&wgpu::TextureViewDescriptor {
                base_mip_level: (level - 1) as u32,
                mip_level_count: Some(1),
                ..Default::default()
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("SSRT Downsample Bind Group"),
                layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&source),
                }],
            });
            Self::draw_fullscreen(
                encoder,
                pipeline,
                &bind_group,
                quad_buffer,
                &pyramid.mip_views[level],
            );
        }
    }

    /// Record extraction of all three pyramids plus their mip chains.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        device: &wgpu::Device,
        uniform_buffer: &wgpu::Buffer,
        scene: &wgpu::TextureView,
        gbuffer_depth: &wgpu::TextureView,
        gbuffer_normals: &wgpu::TextureView,
        point_sampler: &wgpu::Sampler,
        quad_buffer: &wgpu::Buffer,
    ) {
        let Some(bind_group) = self.extract_bind_group(
            device,
            uniform_buffer,
            scene,
            gbuffer_depth,
            gbuffer_normals,
            point_sampler,
        ) else {
            return;
        };
        let (Some(light), Some(depth), Some(normal)) =
            (self.light.as_ref(), self.depth.as_ref(), self.normal.as_ref())
        else {
            return;
        };
        let (Some(ex_light), Some(ex_depth), Some(ex_normal)) = (
            self.extract_lightmask_pipeline.as_ref(),
            self.extract_depth_pipeline.as_ref(),
            self.extract_normals_pipeline.as_ref(),
        ) else {
            return;
        };
        let (Some(ds_light), Some(ds_depth), Some(ds_normal)) = (
            self.downsample_light_pipeline.as_ref(),
            self.downsample_depth_pipeline.as_ref(),
            self.downsample_normal_pipeline.as_ref(),
        ) else {
            return;
        };

        Self::draw_fullscreen(encoder, ex_light, &bind_group, quad_buffer, &light.mip_views[0]);
        self.generate_mips(encoder, device, light, ds_light, quad_buffer);

        Self::draw_fullscreen(encoder, ex_depth, &bind_group, quad_buffer, &depth.mip_views[0]);
        self.generate_mips(encoder, device, depth, ds_depth, quad_buffer);

        Self::draw_fullscreen(encoder, ex_normal, &bind_group, quad_buffer, &normal.mip_views[0]);
        self.generate_mips(encoder, device, normal, ds_normal, quad_buffer);
    }

    /// Record a single linear-depth extraction into an arbitrary target.
    /// Used by the temporal stage to refresh the history depth texture.
    #[allow(clippy::too_many_arguments)]
    pub fn record_depth_extract(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        device: &wgpu::Device,
        uniform_buffer: &wgpu::Buffer,
        scene: &wgpu::TextureView,
        gbuffer_depth: &wgpu::TextureView,
        gbuffer_normals: &wgpu::TextureView,
        point_sampler: &wgpu::Sampler,
        quad_buffer: &wgpu::Buffer,
        target: &wgpu::TextureView,
    ) {
        let Some(bind_group) = self.extract_bind_group(
            device,
            uniform_buffer,
            scene,
            gbuffer_depth,
            gbuffer_normals,
            point_sampler,
        ) else {
            return;
        };
        let Some(pipeline) = self.extract_depth_pipeline.as_ref() else {
            return;
        };
        Self::draw_fullscreen(encoder, pipeline, &bind_group, quad_buffer, target);
    }

    /// Release the pyramid textures.
    pub fn teardown(&mut self) {
        self.light = None;
        self.depth = None;
        self.normal = None;
    }
}

impl Default for PyramidBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// Pyramid extraction passes. Linear depth comes from the hardware depth
// buffer, normals are rotated into view space and octahedral-encoded, and
// the light mask is the lit scene radiance.
const EXTRACT_SHADER: &str = r#"
struct Params {
    view: mat4x4<f32>,
    camera_to_world: mat4x4<f32>,
    inverse_projection: mat4x4<f32>,
    view_projection: mat4x4<f32>,
    inverse_view_projection: mat4x4<f32>,
    prev_view_projection: mat4x4<f32>,
    resolution: vec4<f32>,
    sampling: vec4<f32>,
    sampling2: vec4<f32>,
    temporal: vec4<f32>,
    gi: vec4<f32>,
    ao: vec4<f32>,
    fallback: vec4<f32>,
    debug: vec4<f32>,
    camera: vec4<f32>,
}

@group(0) @binding(0) var<uniform> params: Params;
@group(0) @binding(1) var scene_texture: texture_2d<f32>;
@group(0) @binding(2) var gbuffer_depth: texture_depth_2d;
@group(0) @binding(3) var gbuffer_normals: texture_2d<f32>;
@group(0) @binding(4) var point_sampler: sampler;

fn linearize_depth(d: f32) -> f32 {
    let near = params.camera.x;
    let far = params.camera.y;
    return near * far / (far - d * (far - near));
}

fn oct_wrap(v: vec2<f32>) -> vec2<f32> {
    let sign_v = select(vec2<f32>(-1.0), vec2<f32>(1.0), v >= vec2<f32>(0.0));
    return (1.0 - abs(v.yx)) * sign_v;
}

fn encode_normal(n: vec3<f32>) -> vec2<f32> {
    var p = n.xy / (abs(n.x) + abs(n.y) + abs(n.z));
    if (n.z < 0.0) {
        p = oct_wrap(p);
    }
    return p * 0.5 + 0.5;
}

@fragment
fn fs_extract_depth(in: VertexOutput) -> @location(0) f32 {
    let d = textureSampleLevel(gbuffer_depth, point_sampler, in.uv, 0);
    return linearize_depth(d);
}

@fragment
fn fs_extract_lightmask(in: VertexOutput) -> @location(0) vec4<f32> {
    let radiance = textureSampleLevel(scene_texture, point_sampler, in.uv, 0.0).rgb;
    return vec4<f32>(radiance, 1.0);
}

@fragment
fn fs_extract_normals(in: VertexOutput) -> @location(0) vec2<f32> {
    let world_normal = textureSampleLevel(gbuffer_normals, point_sampler, in.uv, 0.0).xyz;
    let view_normal = normalize((params.view * vec4<f32>(world_normal, 0.0)).xyz);
    return encode_normal(view_normal);
}
"#;

const DOWNSAMPLE_SHADER: &str = r#"
@group(0) @binding(0) var source: texture_2d<f32>;

@fragment
fn fs_downsample(in: VertexOutput) -> @location(0) vec4<f32> {
    let dst_dims = vec2<f32>(textureDimensions(source).xy) * 0.5;
    let base = vec2<i32>(in.uv * dst_dims) * 2;
    let a = textureLoad(source, base, 0);
    let b = textureLoad(source, base + vec2<i32>(1, 0), 0);
    let c = textureLoad(source, base + vec2<i32>(0, 1), 0);
    let d = textureLoad(source, base + vec2<i32>(1, 1), 0);
    return (a + b + c + d) * 0.25;
}
"#;
