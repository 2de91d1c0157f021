//! Temporal reprojection and accumulation.
//!
//! Maps the previous frame's accumulated radiance into the current frame
//! with the combined camera transforms and blends it with the new raw
//! estimate. History is rejected at screen edges, on the first frame after
//! init/resize, and wherever the stored previous depth disagrees with the
//! reprojected expectation by more than 10% (disocclusion).

use super::kernel::SsrtKernel;
use super::quad::{FullscreenVertex, FULLSCREEN_VS};

/// Temporal reprojection pass.
pub struct TemporalReprojector {
    bind_group_layout: Option<wgpu::BindGroupLayout>,
    pipeline: Option<wgpu::RenderPipeline>,
}

impl TemporalReprojector {
    /// Create a new reprojector with no GPU resources yet.
    pub fn new() -> Self {
        Self {
            bind_group_layout: None,
            pipeline: None,
        }
    }

    /// Create the reprojection pipeline. The blended output is always
    /// written to an `Rgba16Float` filter target.
    pub fn init(&mut self, device: &wgpu::Device) {
        self.bind_group_layout = Some(device.create_bind_group_layout(
            &wgpu::BindGroupLayoutDescriptor {
                label: Some("SSRT Temporal Bind Group Layout"),
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
                    // Raw radiance from the sampler
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
                    // Previous accumulated color
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    // Previous linear depth
                    wgpu::BindGroupLayoutEntry {
                        binding: 3,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: false },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    // Current linear depth (pyramid)
                    wgpu::BindGroupLayoutEntry {
                        binding: 4,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: false },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    // Linear sampler
                    wgpu::BindGroupLayoutEntry {
                        binding: 5,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                    // Point sampler
                    wgpu::BindGroupLayoutEntry {
                        binding: 6,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                        count: None,
                    },
                ],
            },
        ));

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("SSRT Temporal Shader"),
            source: wgpu::ShaderSource::Wgsl(
                format!("{}{}", FULLSCREEN_VS, TEMPORAL_SHADER).into(),
            ),
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("SSRT Temporal Pipeline Layout"),
            bind_group_layouts: &[self.bind_group_layout.as_ref().unwrap()],
            push_constant_ranges: &[],
        });

        self.pipeline = Some(device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("SSRT Temporal Pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[FullscreenVertex::layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some(SsrtKernel::TemporalReproj.entry_point()),
                targets: &[Some(wgpu::ColorTargetState {
                    format: wgpu::TextureFormat::Rgba16Float,
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
        }));
    }

    /// True when the reprojection pipeline is ready.
    pub fn is_ready(&self) -> bool {
        self.pipeline.is_some()
    }

    /// Release GPU resources.
    pub fn teardown(&mut self) {
        self.bind_group_layout = None;
        self.pipeline = None;
    }

    /// Record the reprojection blend into `target`.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        device: &wgpu::Device,
        uniform_buffer: &wgpu::Buffer,
        raw_radiance: &wgpu::TextureView,
        previous_color: &wgpu::TextureView,
        previous_depth: &wgpu::TextureView,
        depth_pyramid: &wgpu::TextureView,
        linear_sampler: &wgpu::Sampler,
        point_sampler: &wgpu::Sampler,
        quad_buffer: &wgpu::Buffer,
        target: &wgpu::TextureView,
    ) {
        let Some(pipeline) = self.pipeline.as_ref() else {
            return;
        };
        let Some(layout) = self.bind_group_layout.as_ref() else {
            return;
        };

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("SSRT Temporal Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(raw_radiance),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(previous_color),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(previous_depth),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(depth_pyramid),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::Sampler(linear_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: wgpu::BindingResource::Sampler(point_sampler),
                },
            ],
        });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("SSRT Temporal Pass"),
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
        pass.set_bind_group(0, &bind_group, &[]);
        pass.set_vertex_buffer(0, quad_buffer.slice(..));
        pass.draw(0..6, 0..1);
    }
}

impl Default for TemporalReprojector {
    fn default() -> Self {
        Self::new()
    }
}

// History rejection: off-screen reprojection, invalid history, or relative
// depth disagreement above 10% all fall back to the raw sample.
const TEMPORAL_SHADER: &str = r#"
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
    temporal: vec4<f32>,     // rotation, offset, response, history_valid
    gi: vec4<f32>,
    ao: vec4<f32>,
    fallback: vec4<f32>,
    debug: vec4<f32>,
    camera: vec4<f32>,       // near, far, pixel_spread_tangent, pad
}

@group(0) @binding(0) var<uniform> params: Params;
@group(0) @binding(1) var raw_radiance: texture_2d<f32>;
@group(0) @binding(2) var previous_color: texture_2d<f32>;
@group(0) @binding(3) var previous_depth: texture_2d<f32>;
@group(0) @binding(4) var depth_pyramid: texture_2d<f32>;
@group(0) @binding(5) var linear_sampler: sampler;
@group(0) @binding(6) var point_sampler: sampler;

const DEPTH_REJECT_THRESHOLD: f32 = 0.1;

@fragment
fn fs_reproject(in: VertexOutput) -> @location(0) vec4<f32> {
    let current = textureSampleLevel(raw_radiance, point_sampler, in.uv, 0.0);

    if (params.temporal.w < 0.5) {
        return current;
    }

    // Reconstruct the world position of this pixel, then find where the
    // previous camera saw it.
    let linear_depth = textureSampleLevel(depth_pyramid, point_sampler, in.uv, 0.0).x;
    let near = params.camera.x;
    let far = params.camera.y;
    let device_depth = (far - near * far / linear_depth) / (far - near);
    let ndc = vec4<f32>(
        in.uv.x * 2.0 - 1.0,
        (1.0 - in.uv.y) * 2.0 - 1.0,
        device_depth,
        1.0);
    var world = params.inverse_view_projection * ndc;
    world = world / world.w;

    let prev_clip = params.prev_view_projection * world;
    if (prev_clip.w <= 0.0) {
        return current;
    }
    let prev_ndc = prev_clip.xyz / prev_clip.w;
    let prev_uv = vec2<f32>(prev_ndc.x * 0.5 + 0.5, 0.5 - prev_ndc.y * 0.5);

    if (prev_uv.x < 0.0 || prev_uv.x > 1.0 || prev_uv.y < 0.0 || prev_uv.y > 1.0) {
        return current;
    }

    // Depth consistency against the stored history depth.
    let prev_linear = textureSampleLevel(previous_depth, point_sampler, prev_uv, 0.0).x;
    let reproj_depth = abs((params.view * world).z);
    if (abs(prev_linear - reproj_depth) / max(reproj_depth, 1e-4) > DEPTH_REJECT_THRESHOLD) {
        return current;
    }

    let history = textureSampleLevel(previous_color, linear_sampler, prev_uv, 0.0);
    return mix(history, current, params.temporal.z);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_entry_point_matches_kernel_table() {
        assert!(TEMPORAL_SHADER.contains("fn fs_reproject"));
        assert_eq!(SsrtKernel::TemporalReproj.entry_point(), "fs_reproject");
    }

    #[test]
    fn test_teardown_leaves_unready() {
        let mut reprojector = TemporalReprojector::new();
        assert!(!reprojector.is_ready());
        reprojector.teardown();
        assert!(!reprojector.is_ready());
    }
}
