//! Horizon-based hemisphere sampling: the GI/AO estimator.
//!
//! One compute dispatch per frame walks `rotation_count` hemisphere slices
//! per pixel, `step_count` steps on each side, stepping through the light,
//! depth and normal pyramids with exponentially growing stride. The result
//! (GI radiance in rgb, occlusion in alpha) lands in the first filter
//! buffer, still noisy; the temporal and denoising stages clean it up.

use crate::math::tile_count;

use super::kernel::SsrtKernel;

/// Hemisphere-slice GI/AO compute pass.
pub struct HemisphereSampler {
    bind_group_layout: Option<wgpu::BindGroupLayout>,
    pipeline: Option<wgpu::ComputePipeline>,
}

impl HemisphereSampler {
    /// Create a new sampler with no GPU resources yet.
    pub fn new() -> Self {
        Self {
            bind_group_layout: None,
            pipeline: None,
        }
    }

    /// Create the compute pipeline.
    pub fn init(&mut self, device: &wgpu::Device) {
        self.bind_group_layout = Some(device.create_bind_group_layout(
            &wgpu::BindGroupLayoutDescriptor {
                label: Some("SSRT Sample Bind Group Layout"),
                entries: &[
                    // Uniforms
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    // Light pyramid
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    // Depth pyramid
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: false },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    // Normal pyramid
                    wgpu::BindGroupLayoutEntry {
                        binding: 3,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    // Off-screen fallback cube map
                    wgpu::BindGroupLayoutEntry {
                        binding: 4,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::Cube,
                            multisampled: false,
                        },
                        count: None,
                    },
                    // Linear sampler
                    wgpu::BindGroupLayoutEntry {
                        binding: 5,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                    // Point sampler
                    wgpu::BindGroupLayoutEntry {
                        binding: 6,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                        count: None,
                    },
                    // GI + occlusion output
                    wgpu::BindGroupLayoutEntry {
                        binding: 7,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::StorageTexture {
                            access: wgpu::StorageTextureAccess::WriteOnly,
                            format: wgpu::TextureFormat::Rgba16Float,
                            view_dimension: wgpu::TextureViewDimension::D2,
                        },
                        count: None,
                    },
                ],
            },
        ));

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("SSRT Sample Shader"),
            source: wgpu::ShaderSource::Wgsl(SAMPLE_SHADER.into()),
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("SSRT Sample Pipeline Layout"),
            bind_group_layouts: &[self.bind_group_layout.as_ref().unwrap()],
            push_constant_ranges: &[],
        });

        self.pipeline = Some(device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("SSRT Sample Pipeline"),
            layout: Some(&layout),
            module: &shader,
            entry_point: Some(SsrtKernel::Main.entry_point()),
            compilation_options: Default::default(),
            cache: None,
        }));
    }

    /// True when the compute pipeline is ready.
    pub fn is_ready(&self) -> bool {
        self.pipeline.is_some()
    }

    /// Release GPU resources.
    pub fn teardown(&mut self) {
        self.bind_group_layout = None;
        self.pipeline = None;
    }

    /// Record the sampling dispatch over the full output resolution.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        device: &wgpu::Device,
        uniform_buffer: &wgpu::Buffer,
        light_pyramid: &wgpu::TextureView,
        depth_pyramid: &wgpu::TextureView,
        normal_pyramid: &wgpu::TextureView,
        fallback_cube: &wgpu::TextureView,
        output: &wgpu::TextureView,
        linear_sampler: &wgpu::Sampler,
        point_sampler: &wgpu::Sampler,
        width: u32,
        height: u32,
    ) {
        let Some(pipeline) = self.pipeline.as_ref() else {
            return;
        };
        let Some(layout) = self.bind_group_layout.as_ref() else {
            return;
        };

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("SSRT Sample Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(light_pyramid),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(depth_pyramid),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(normal_pyramid),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(fallback_cube),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::Sampler(linear_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: wgpu::BindingResource::Sampler(point_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 7,
                    resource: wgpu::BindingResource::TextureView(output),
                },
            ],
        });

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("SSRT Sample Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(tile_count(width), tile_count(height), 1);
    }
}

impl Default for HemisphereSampler {
    fn default() -> Self {
        Self::new()
    }
}

// Horizon-based slice integration over the screen-space pyramids.
// GI radiance accumulates in rgb, the cosine-weighted visibility integral
// in alpha.
const SAMPLE_SHADER: &str = r#"
struct Params {
    view: mat4x4<f32>,
    camera_to_world: mat4x4<f32>,
    inverse_projection: mat4x4<f32>,
    view_projection: mat4x4<f32>,
    inverse_view_projection: mat4x4<f32>,
    prev_view_projection: mat4x4<f32>,
    resolution: vec4<f32>,   // 1/w, 1/h, w, h
    sampling: vec4<f32>,     // radius, exp_factor, rotation_count, step_count
    sampling2: vec4<f32>,    // jitter, screen_space, mip_optimization, half_proj_scale
    temporal: vec4<f32>,     // rotation, offset, response, history_valid
    gi: vec4<f32>,           // gi_intensity, multi_bounce_gi, backface_lighting, normal_approximation
    ao: vec4<f32>,           // ao_intensity, thickness, linear_thickness, multi_bounce_ao
    fallback: vec4<f32>,     // mode, power, intensity, sample_count
    debug: vec4<f32>,        // light_only, reflect_sky, frame, mip_count
    camera: vec4<f32>,       // near, far, pixel_spread_tangent, pad
}

const PI: f32 = 3.14159265359;

@group(0) @binding(0) var<uniform> params: Params;
@group(0) @binding(1) var light_pyramid: texture_2d<f32>;
@group(0) @binding(2) var depth_pyramid: texture_2d<f32>;
@group(0) @binding(3) var normal_pyramid: texture_2d<f32>;
@group(0) @binding(4) var fallback_cube: texture_cube<f32>;
@group(0) @binding(5) var linear_sampler: sampler;
@group(0) @binding(6) var point_sampler: sampler;
@group(0) @binding(7) var output: texture_storage_2d<rgba16float, write>;

fn view_position(uv: vec2<f32>, linear_depth: f32) -> vec3<f32> {
    let ndc = vec2<f32>(uv.x * 2.0 - 1.0, (1.0 - uv.y) * 2.0 - 1.0);
    // half_proj_scale is h / (4 * tan(fov/2)), so this recovers the tangent.
    let tan_half = params.resolution.w / (4.0 * params.sampling2.w);
    let aspect = params.resolution.z / params.resolution.w;
    return vec3<f32>(ndc.x * tan_half * aspect, ndc.y * tan_half, -1.0) * linear_depth;
}

fn decode_normal(f: vec2<f32>) -> vec3<f32> {
    let e = f * 2.0 - 1.0;
    var n = vec3<f32>(e, 1.0 - abs(e.x) - abs(e.y));
    let t = saturate(-n.z);
    n.x += select(t, -t, n.x >= 0.0);
    n.y += select(t, -t, n.y >= 0.0);
    return normalize(n);
}

fn sample_depth(uv: vec2<f32>, mip: f32) -> f32 {
    return textureSampleLevel(depth_pyramid, point_sampler, uv, mip).x;
}

fn interleaved_gradient_noise(pos: vec2<f32>) -> f32 {
    let magic = vec3<f32>(0.06711056, 0.00583715, 52.9829189);
    return fract(magic.z * fract(dot(pos, magic.xy)));
}

fn fast_acos(x: f32) -> f32 {
    let abs_x = abs(x);
    var res = -0.156583 * abs_x + PI * 0.5;
    res = res * sqrt(1.0 - abs_x);
    return select(PI - res, res, x >= 0.0);
}

// Energy for a ray that leaves the effective radius or the screen.
fn fallback_radiance(dir_view: vec3<f32>) -> vec3<f32> {
    let mode = i32(params.fallback.x);
    if (mode == 0) {
        return vec3<f32>(0.0);
    }
    let dir_world = (params.camera_to_world * vec4<f32>(dir_view, 0.0)).xyz;
    // Irradiance volumes prefilter aggressively; reflection probes keep the
    // sharper mips and optionally fall back to the sky at the chain's tail.
    var lod = 2.0;
    if (mode == 1) {
        lod = 6.0;
    } else if (params.debug.y > 0.5) {
        lod = 0.0;
    }
    let ambient = textureSampleLevel(fallback_cube, linear_sampler, dir_world, lod).rgb;
    return pow(max(ambient, vec3<f32>(0.0)), vec3<f32>(params.fallback.y)) * params.fallback.z;
}

@compute @workgroup_size(8, 8, 1)
fn cs_main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let dims = vec2<u32>(u32(params.resolution.z), u32(params.resolution.w));
    if (gid.x >= dims.x || gid.y >= dims.y) {
        return;
    }

    let pixel = vec2<i32>(gid.xy);
    let uv = (vec2<f32>(gid.xy) + 0.5) * params.resolution.xy;

    let center_depth = sample_depth(uv, 0.0);
    let far = params.camera.y;
    if (center_depth >= far * 0.999) {
        textureStore(output, pixel, vec4<f32>(0.0, 0.0, 0.0, 1.0));
        return;
    }

    let center_pos = view_position(uv, center_depth);
    let view_dir = normalize(-center_pos);
    let normal = decode_normal(
        textureSampleLevel(normal_pyramid, point_sampler, uv, 0.0).xy);

    let radius = params.sampling.x;
    let exp_factor = params.sampling.y;
    let rotation_count = i32(params.sampling.z);
    let step_count = i32(params.sampling.w);
    let jitter_enabled = params.sampling2.x > 0.5;
    let screen_space_sampling = params.sampling2.y > 0.5;
    let mip_optimization = params.sampling2.z > 0.5;
    let half_proj_scale = params.sampling2.w;
    let mip_count = params.debug.w;

    // Screen-space marching radius: world radius projected at the pixel's
    // depth, optionally kept constant in view space.
    var pixel_radius = half_proj_scale * radius / center_depth;
    if (screen_space_sampling) {
        pixel_radius = half_proj_scale * radius * 0.1;
    }
    pixel_radius = min(pixel_radius, params.resolution.w * 0.5);

    let noise = interleaved_gradient_noise(vec2<f32>(gid.xy));
    var jitter = params.temporal.y;
    if (jitter_enabled) {
        jitter = fract(jitter + noise);
    }
    var angle_jitter = params.temporal.x * 2.0 * PI;
    if (jitter_enabled) {
        angle_jitter += noise * PI;
    }

    var gi = vec3<f32>(0.0);
    var visibility = 0.0;

    for (var slice = 0; slice < rotation_count; slice++) {
        let angle = angle_jitter + f32(slice) * PI / f32(rotation_count);
        let slice_dir = vec2<f32>(cos(angle), sin(angle));

        // Project the normal into the slice plane for the reference angle.
        let slice_dir_view = vec3<f32>(slice_dir.x, -slice_dir.y, 0.0);
        let axis = normalize(cross(slice_dir_view, view_dir));
        let proj_normal = normal - axis * dot(normal, axis);
        let proj_len = max(length(proj_normal), 1e-4);
        var n_angle = fast_acos(clamp(dot(proj_normal, view_dir) / proj_len, -1.0, 1.0));
        if (dot(proj_normal, slice_dir_view) < 0.0) {
            n_angle = -n_angle;
        }

        for (var side = 0; side < 2; side++) {
            let side_sign = select(-1.0, 1.0, side == 0);
            var horizon_cos = cos(n_angle + side_sign * PI * 0.5);
            var escaped = true;

            for (var step = 0; step < step_count; step++) {
                let t = (f32(step) + jitter + 1.0) / f32(step_count);
                let dist = pow(t, exp_factor) * pixel_radius;
                let offset = slice_dir * side_sign * dist * params.resolution.xy;
                let sample_uv = uv + offset;

                if (sample_uv.x < 0.0 || sample_uv.x > 1.0 ||
                    sample_uv.y < 0.0 || sample_uv.y > 1.0) {
                    break;
                }

                var mip = 0.0;
                if (mip_optimization) {
                    mip = clamp(log2(dist * 0.5 + 1.0), 0.0, mip_count - 1.0);
                }

                let sample_depth_v = sample_depth(sample_uv, mip);
                let sample_pos = view_position(sample_uv, sample_depth_v);
                let delta = sample_pos - center_pos;
                let delta_len = length(delta);
                if (delta_len < 1e-4) {
                    continue;
                }

                // Thickness heuristic: occluders further behind the sampled
                // surface than `thickness` stop blocking.
                var thickness = params.ao.y;
                if (params.ao.z > 0.5) {
                    thickness *= center_depth * 0.25;
                }

                let world_dist = delta_len;
                if (world_dist > radius) {
                    continue;
                }
                escaped = false;

                let sample_dir = delta / delta_len;
                let sample_cos = dot(sample_dir, view_dir);
                let behind = -delta.z > thickness + world_dist;

                if (sample_cos > horizon_cos && !behind) {
                    // Newly revealed arc contributes radiance.
                    let arc = sample_cos - horizon_cos;
                    horizon_cos = sample_cos;

                    var sample_normal = -sample_dir;
                    if (params.gi.w < 0.5) {
                        sample_normal = decode_normal(
                            textureSampleLevel(normal_pyramid, point_sampler, sample_uv, mip).xy);
                    }
                    var facing = dot(sample_normal, -sample_dir);
                    facing = max(facing, params.gi.z * (1.0 - max(facing, 0.0)));

                    let radiance = textureSampleLevel(
                        light_pyramid, linear_sampler, sample_uv, mip).rgb;
                    let transfer = saturate(dot(normal, sample_dir));
                    gi += radiance * max(facing, 0.0) * transfer * arc;
                }
            }

            // Occlusion from the final horizon of this side.
            let h = fast_acos(clamp(horizon_cos, -1.0, 1.0));
            visibility += saturate(
                0.25 * (-cos(2.0 * h - n_angle) + cos(n_angle) + 2.0 * h * sin(n_angle)));

            if (escaped) {
                // The whole march left the radius or the screen: pull
                // ambient energy from the fallback source instead.
                let open_dir = normalize(
                    view_dir + slice_dir_view * side_sign * 0.5);
                let samples = max(params.fallback.w, 1.0);
                gi += fallback_radiance(open_dir) / samples;
            }
        }
    }

    let inv_slices = 1.0 / f32(rotation_count);
    visibility = saturate(visibility * inv_slices);
    let occlusion = pow(visibility, params.ao.x);
    gi *= params.gi.x * inv_slices;
    gi *= 1.0 + params.gi.y;

    textureStore(output, pixel, vec4<f32>(gi, occlusion));
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_entry_point_matches_kernel_table() {
        assert!(SAMPLE_SHADER.contains("fn cs_main"));
        assert_eq!(SsrtKernel::Main.entry_point(), "cs_main");
    }

    #[test]
    fn test_shader_uses_tile_size_groups() {
        assert!(SAMPLE_SHADER.contains("@workgroup_size(8, 8, 1)"));
    }

    #[test]
    fn test_teardown_leaves_unready() {
        let mut sampler = HemisphereSampler::new();
        assert!(!sampler.is_ready());
        sampler.teardown();
        assert!(!sampler.is_ready());
    }
}
