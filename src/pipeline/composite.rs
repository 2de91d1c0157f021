//! Final composite and debug visualization.
//!
//! One render pipeline per output view: the combined composite plus the
//! isolated AO, bent-normal, GI, depth, light-mask and normal views. All
//! of them share a single shader module and bind group layout, differing
//! only in fragment entry point.

use super::kernel::SsrtKernel;
use super::quad::{FullscreenVertex, FULLSCREEN_VS};
use super::settings::DebugMode;

/// Composite pass rendering into the host's destination target.
pub struct Compositor {
    bind_group_layout: Option<wgpu::BindGroupLayout>,
    pipelines: Vec<(SsrtKernel, wgpu::RenderPipeline)>,
}

impl Compositor {
    /// Create a new compositor with no GPU resources yet.
    pub fn new() -> Self {
        Self {
            bind_group_layout: None,
            pipelines: Vec::new(),
        }
    }

    /// Create one pipeline per output view, all targeting `target_format`.
    pub fn init(&mut self, device: &wgpu::Device, target_format: wgpu::TextureFormat) {
        self.bind_group_layout = Some(device.create_bind_group_layout(
            &wgpu::BindGroupLayoutDescriptor {
                label: Some("SSRT Composite Bind Group Layout"),
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
                    // Scene color
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
                    // Filtered radiance (rgb = gi, a = visibility)
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
                    // Light pyramid
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
                    // Depth pyramid
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
                    // Normal pyramid
                    wgpu::BindGroupLayoutEntry {
                        binding: 5,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    // Linear sampler
                    wgpu::BindGroupLayoutEntry {
                        binding: 6,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                    // Point sampler
                    wgpu::BindGroupLayoutEntry {
                        binding: 7,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                        count: None,
                    },
                ],
            },
        ));

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("SSRT Composite Shader"),
            source: wgpu::ShaderSource::Wgsl(
                format!("{}{}", FULLSCREEN_VS, COMPOSITE_SHADER).into(),
            ),
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("SSRT Composite Pipeline Layout"),
            bind_group_layouts: &[self.bind_group_layout.as_ref().unwrap()],
            push_constant_ranges: &[],
        });

        self.pipelines = DebugMode::ALL
            .iter()
            .map(|mode| {
                let kernel = mode.kernel();
                let pipeline =
                    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                        label: Some("SSRT Composite Pipeline"),
                        layout: Some(&layout),
                        vertex: wgpu::VertexState {
                            module: &shader,
                            entry_point: Some("vs_main"),
                            buffers: &[FullscreenVertex::layout()],
                            compilation_options: Default::default(),
                        },
                        fragment: Some(wgpu::FragmentState {
                            module: &shader,
                            entry_point: Some(kernel.entry_point()),
                            targets: &[Some(wgpu::ColorTargetState {
                                format: target_format,
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
                    });
                (kernel, pipeline)
            })
            .collect();
    }

    /// True when the pipelines are ready.
    pub fn is_ready(&self) -> bool {
        !self.pipelines.is_empty()
    }

    fn pipeline_for(&self, mode: DebugMode) -> Option<&wgpu::RenderPipeline> {
        let kernel = mode.kernel();
        self.pipelines
            .iter()
            .find(|(k, _)| *k == kernel)
            .map(|(_, p)| p)
    }

    /// Record the composite (or the selected debug view) into `target`.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        device: &wgpu::Device,
        mode: DebugMode,
        uniform_buffer: &wgpu::Buffer,
        scene: &wgpu::TextureView,
        filtered: &wgpu::TextureView,
        light_pyramid: &wgpu::TextureView,
        depth_pyramid: &wgpu::TextureView,
        normal_pyramid: &wgpu::TextureView,
        linear_sampler: &wgpu::Sampler,
        point_sampler: &wgpu::Sampler,
        quad_buffer: &wgpu::Buffer,
        target: &wgpu::TextureView,
    ) {
        let Some(pipeline) = self.pipeline_for(mode) else {
            return;
        };
        let Some(layout) = self.bind_group_layout.as_ref() else {
            return;
        };

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("SSRT Composite Bind Group"),
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
                    resource: wgpu::BindingResource::TextureView(filtered),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(light_pyramid),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(depth_pyramid),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::TextureView(normal_pyramid),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: wgpu::BindingResource::Sampler(linear_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 7,
                    resource: wgpu::BindingResource::Sampler(point_sampler),
                },
            ],
        });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("SSRT Composite Pass"),
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

    /// Release GPU resources.
    pub fn teardown(&mut self) {
        self.bind_group_layout = None;
        self.pipelines.clear();
    }
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new()
    }
}

const COMPOSITE_SHADER: &str = r#"
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
    gi: vec4<f32>,           // gi_intensity, multi_bounce_gi, backface_lighting, normal_approximation
    ao: vec4<f32>,           // ao_intensity, thickness, linear_thickness, multi_bounce_ao
    fallback: vec4<f32>,
    debug: vec4<f32>,        // light_only, reflect_sky, frame, mip_count
    camera: vec4<f32>,       // near, far, pixel_spread_tangent, pad
}

@group(0) @binding(0) var<uniform> params: Params;
@group(0) @binding(1) var scene_color: texture_2d<f32>;
@group(0) @binding(2) var filtered_radiance: texture_2d<f32>;
@group(0) @binding(3) var light_pyramid: texture_2d<f32>;
@group(0) @binding(4) var depth_pyramid: texture_2d<f32>;
@group(0) @binding(5) var normal_pyramid: texture_2d<f32>;
@group(0) @binding(6) var linear_sampler: sampler;
@group(0) @binding(7) var point_sampler: sampler;

fn decode_normal(encoded: vec2<f32>) -> vec3<f32> {
    let f = encoded * 2.0 - 1.0;
    var n = vec3<f32>(f.x, f.y, 1.0 - abs(f.x) - abs(f.y));
    let t = clamp(-n.z, 0.0, 1.0);
    n.x = n.x + select(t, -t, n.x >= 0.0);
    n.y = n.y + select(t, -t, n.y >= 0.0);
    return normalize(n);
}

// Visibility to multi-bounce occlusion, fit from the GTAO paper.
fn multi_bounce_ao(visibility: f32, albedo: vec3<f32>) -> vec3<f32> {
    let a = 2.0404 * albedo - 0.3324;
    let b = -4.7951 * albedo + 0.6417;
    let c = 2.7552 * albedo + 0.6903;
    let v = vec3<f32>(visibility);
    return max(v, ((v * a + b) * v + c) * v);
}

@fragment
fn fs_composite(in: VertexOutput) -> @location(0) vec4<f32> {
    let scene = textureSampleLevel(scene_color, point_sampler, in.uv, 0.0);
    let filtered = textureSampleLevel(filtered_radiance, linear_sampler, in.uv, 0.0);
    let visibility = clamp(filtered.a, 0.0, 1.0);

    var occlusion = vec3<f32>(visibility);
    if (params.ao.w > 0.5) {
        occlusion = multi_bounce_ao(visibility, clamp(scene.rgb, vec3<f32>(0.0), vec3<f32>(1.0)));
    }

    let indirect = filtered.rgb * occlusion;
    return vec4<f32>(scene.rgb * occlusion + indirect, scene.a);
}

@fragment
fn fs_debug_ao(in: VertexOutput) -> @location(0) vec4<f32> {
    let scene = textureSampleLevel(scene_color, point_sampler, in.uv, 0.0);
    let filtered = textureSampleLevel(filtered_radiance, linear_sampler, in.uv, 0.0);
    let visibility = clamp(filtered.a, 0.0, 1.0);
    var occlusion = vec3<f32>(visibility);
    if (params.ao.w > 0.5) {
        occlusion = multi_bounce_ao(visibility, clamp(scene.rgb, vec3<f32>(0.0), vec3<f32>(1.0)));
    }
    // debug.x isolates the signal from the scene color.
    if (params.debug.x > 0.5) {
        return vec4<f32>(occlusion, 1.0);
    }
    return vec4<f32>(scene.rgb * occlusion, 1.0);
}

@fragment
fn fs_debug_bent_normal(in: VertexOutput) -> @location(0) vec4<f32> {
    let normal = decode_normal(
        textureSampleLevel(normal_pyramid, point_sampler, in.uv, 0.0).xy);
    let visibility = clamp(
        textureSampleLevel(filtered_radiance, linear_sampler, in.uv, 0.0).a, 0.0, 1.0);
    return vec4<f32>((normal * visibility) * 0.5 + 0.5, 1.0);
}

@fragment
fn fs_debug_gi(in: VertexOutput) -> @location(0) vec4<f32> {
    let filtered = textureSampleLevel(filtered_radiance, linear_sampler, in.uv, 0.0);
    if (params.debug.x > 0.5) {
        return vec4<f32>(filtered.rgb, 1.0);
    }
    let scene = textureSampleLevel(scene_color, point_sampler, in.uv, 0.0);
    return vec4<f32>(filtered.rgb * scene.rgb, 1.0);
}

@fragment
fn fs_extract_depth(in: VertexOutput) -> @location(0) vec4<f32> {
    let depth = textureSampleLevel(depth_pyramid, point_sampler, in.uv, 0.0).x;
    let shade = clamp(depth / params.camera.y, 0.0, 1.0);
    return vec4<f32>(vec3<f32>(shade), 1.0);
}

@fragment
fn fs_extract_lightmask(in: VertexOutput) -> @location(0) vec4<f32> {
    let light = textureSampleLevel(light_pyramid, linear_sampler, in.uv, 0.0);
    return vec4<f32>(light.rgb, 1.0);
}

@fragment
fn fs_extract_normals(in: VertexOutput) -> @location(0) vec4<f32> {
    let normal = decode_normal(
        textureSampleLevel(normal_pyramid, point_sampler, in.uv, 0.0).xy);
    return vec4<f32>(normal * 0.5 + 0.5, 1.0);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_body(name: &str) -> &'static str {
        let start = COMPOSITE_SHADER.find(&format!("fn {name}")).unwrap();
        let rest = &COMPOSITE_SHADER[start..];
        let end = rest[3..].find("\nfn ").map(|i| i + 3).unwrap_or(rest.len());
        &rest[..end]
    }

    #[test]
    fn test_light_only_reaches_debug_views_not_the_composite() {
        assert!(!entry_body("fs_composite").contains("params.debug.x"));
        assert!(entry_body("fs_debug_ao").contains("params.debug.x"));
        assert!(entry_body("fs_debug_gi").contains("params.debug.x"));
    }

    #[test]
    fn test_shader_defines_every_view_entry_point() {
        for mode in DebugMode::ALL {
            let entry = format!("fn {}", mode.kernel().entry_point());
            assert!(
                COMPOSITE_SHADER.contains(&entry),
                "missing entry point {entry}"
            );
        }
    }
}
