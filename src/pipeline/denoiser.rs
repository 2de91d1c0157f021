//! Depth-aware denoising of the accumulated radiance.
//!
//! Two compute kernels: a one-shot point-distribution kernel that shapes
//! 64 disk sample points from a scrambled noise texture, and a bilateral
//! gather that filters the accumulated signal with those points, weighting
//! taps by linear-depth agreement so the blur never crosses geometry edges.

use rand::{Rng, SeedableRng};

use super::kernel::DenoiserKernel;
use crate::math::tile_count;

/// Side length of the scrambled noise texture feeding point generation.
const NOISE_SIZE: u32 = 256;

/// Number of disk sample points, one per thread of a single 8x8 workgroup.
pub const POINT_COUNT: u32 = 64;

/// Seed for the scrambled noise so the disk pattern is reproducible.
const NOISE_SEED: u64 = 0x5353_5254;

/// Uniform block for the bilateral filter.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct DenoiseUniform {
    // radius, pixel_spread_tangent, half_resolution, jitter_frame_period
    params: [f32; 4],
    // 1/w, 1/h, w, h
    resolution: [f32; 4],
}

/// Bilateral denoiser with lazily generated sample points.
pub struct DiffuseDenoiser {
    noise_view: Option<wgpu::TextureView>,
    point_buffer: Option<wgpu::Buffer>,
    uniform_buffer: Option<wgpu::Buffer>,
    point_layout: Option<wgpu::BindGroupLayout>,
    point_pipeline: Option<wgpu::ComputePipeline>,
    filter_layout: Option<wgpu::BindGroupLayout>,
    filter_pipeline: Option<wgpu::ComputePipeline>,
    points_generated: bool,
}

impl DiffuseDenoiser {
    /// Create a new denoiser with no GPU resources yet.
    pub fn new() -> Self {
        Self {
            noise_view: None,
            point_buffer: None,
            uniform_buffer: None,
            point_layout: None,
            point_pipeline: None,
            filter_layout: None,
            filter_pipeline: None,
            points_generated: false,
        }
    }

    /// Create pipelines, upload the scrambled noise and allocate the
    /// point buffer. Points themselves are generated on first use.
    pub fn init(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        let noise_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("SSRT Denoiser Noise"),
            size: wgpu::Extent3d {
                width: NOISE_SIZE,
                height: NOISE_SIZE,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::R8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &noise_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &scrambled_noise(NOISE_SEED),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(NOISE_SIZE),
                rows_per_image: Some(NOISE_SIZE),
            },
            wgpu::Extent3d {
                width: NOISE_SIZE,
                height: NOISE_SIZE,
                depth_or_array_layers: 1,
            },
        );
        // The view holds the texture alive.
        self.noise_view = Some(noise_texture.create_view(&wgpu::TextureViewDescriptor::default()));

        self.point_buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("SSRT Denoiser Points"),
            size: (POINT_COUNT as u64) * 8,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        }));

        self.uniform_buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("SSRT Denoiser Uniforms"),
            size: std::mem::size_of::<DenoiseUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));

        self.point_layout = Some(device.create_bind_group_layout(
            &wgpu::BindGroupLayoutDescriptor {
                label: Some("SSRT Point Distribution Bind Group Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: false },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ],
            },
        ));

        self.filter_layout = Some(device.create_bind_group_layout(
            &wgpu::BindGroupLayoutDescriptor {
                label: Some("SSRT Bilateral Bind Group Layout"),
                entries: &[
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
                    wgpu::BindGroupLayoutEntry {
                        binding: 3,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: true },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 4,
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

        let point_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("SSRT Point Distribution Shader"),
            source: wgpu::ShaderSource::Wgsl(POINT_SHADER.into()),
        });
        let point_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("SSRT Point Distribution Pipeline Layout"),
                bind_group_layouts: &[self.point_layout.as_ref().unwrap()],
                push_constant_ranges: &[],
            });
        self.point_pipeline = Some(device.create_compute_pipeline(
            &wgpu::ComputePipelineDescriptor {
                label: Some("SSRT Point Distribution Pipeline"),
                layout: Some(&point_pipeline_layout),
                module: &point_shader,
                entry_point: Some(DenoiserKernel::PointDistribution.entry_point()),
                compilation_options: Default::default(),
                cache: None,
            },
        ));

        let filter_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("SSRT Bilateral Shader"),
            source: wgpu::ShaderSource::Wgsl(BILATERAL_SHADER.into()),
        });
        let filter_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("SSRT Bilateral Pipeline Layout"),
                bind_group_layouts: &[self.filter_layout.as_ref().unwrap()],
                push_constant_ranges: &[],
            });
        self.filter_pipeline = Some(device.create_compute_pipeline(
            &wgpu::ComputePipelineDescriptor {
                label: Some("SSRT Bilateral Pipeline"),
                layout: Some(&filter_pipeline_layout),
                module: &filter_shader,
                entry_point: Some(DenoiserKernel::BilateralFilter.entry_point()),
                compilation_options: Default::default(),
                cache: None,
            },
        ));

        self.points_generated = false;
    }

    /// True when both kernels are ready.
    pub fn is_ready(&self) -> bool {
        self.filter_pipeline.is_some()
    }

    /// True once the point distribution has been generated.
    pub fn points_generated(&self) -> bool {
        self.points_generated
    }

    /// Forget the generated points so the next frame regenerates them.
    pub fn reset(&mut self) {
        self.points_generated = false;
    }

    /// Record the one-shot point distribution if it has not run yet.
    pub fn record_point_distribution(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        device: &wgpu::Device,
    ) {
        if self.points_generated {
            return;
        }
        let Some(pipeline) = self.point_pipeline.as_ref() else {
            return;
        };
        let Some(layout) = self.point_layout.as_ref() else {
            return;
        };
        let (Some(noise_view), Some(point_buffer)) =
            (self.noise_view.as_ref(), self.point_buffer.as_ref())
        else {
            return;
        };

        log::debug!("generating SSRT denoiser point distribution");
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("SSRT Point Distribution Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(noise_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: point_buffer.as_entire_binding(),
                },
            ],
        });

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("SSRT Point Distribution Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        // One workgroup of 8x8 threads, one point per thread.
        pass.dispatch_workgroups(1, 1, 1);
        drop(pass);

        self.points_generated = true;
    }

    /// Record the bilateral filter reading `input` and writing `output`.
    #[allow(clippy::too_many_arguments)]
    pub fn record_filter(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        input: &wgpu::TextureView,
        depth_pyramid: &wgpu::TextureView,
        output: &wgpu::TextureView,
        width: u32,
        height: u32,
        radius: f32,
        pixel_spread_tangent: f32,
    ) {
        let Some(pipeline) = self.filter_pipeline.as_ref() else {
            return;
        };
        let Some(layout) = self.filter_layout.as_ref() else {
            return;
        };
        let (Some(uniform_buffer), Some(point_buffer)) =
            (self.uniform_buffer.as_ref(), self.point_buffer.as_ref())
        else {
            return;
        };

        let uniform = DenoiseUniform {
            // The effective radius is half the configured value.
            params: [radius * 0.5, pixel_spread_tangent, 0.0, -1.0],
            resolution: [
                1.0 / width as f32,
                1.0 / height as f32,
                width as f32,
                height as f32,
            ],
        };
        queue.write_buffer(uniform_buffer, 0, bytemuck::bytes_of(&uniform));

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("SSRT Bilateral Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(input),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(depth_pyramid),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: point_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(output),
                },
            ],
        });

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("SSRT Bilateral Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(tile_count(width), tile_count(height), 1);
    }

    /// Release GPU resources.
    pub fn teardown(&mut self) {
        self.noise_view = None;
        self.point_buffer = None;
        self.uniform_buffer = None;
        self.point_layout = None;
        self.point_pipeline = None;
        self.filter_layout = None;
        self.filter_pipeline = None;
        self.points_generated = false;
    }
}

impl Default for DiffuseDenoiser {
    fn default() -> Self {
        Self::new()
    }
}

/// Scrambled uniform noise, one byte per texel, seeded for reproducibility.
fn scrambled_noise(seed: u64) -> Vec<u8> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    (0..NOISE_SIZE * NOISE_SIZE).map(|_| rng.gen::<u8>()).collect()
}

const POINT_SHADER: &str = r#"
@group(0) @binding(0) var noise_texture: texture_2d<f32>;
@group(0) @binding(1) var<storage, read_write> points_out: array<vec2<f32>, 64>;

const PI: f32 = 3.14159265359;

// Shape 64 noise samples into a disk distribution. Runs once.
@compute @workgroup_size(8, 8, 1)
fn cs_point_distribution(@builtin(local_invocation_index) index: u32) {
    let coord = vec2<i32>(i32(index % 8u) * 16 + 3, i32(index / 8u) * 16 + 7);
    let r = textureLoad(noise_texture, coord, 0).x;
    let a = textureLoad(noise_texture, coord + vec2<i32>(5, 11), 0).x;
    let radius = sqrt(max(r, 1e-3));
    let angle = a * 2.0 * PI;
    points_out[index] = vec2<f32>(radius * cos(angle), radius * sin(angle));
}
"#;

const BILATERAL_SHADER: &str = r#"
struct DenoiseParams {
    // radius, pixel_spread_tangent, half_resolution, jitter_frame_period
    params: vec4<f32>,
    // 1/w, 1/h, w, h
    resolution: vec4<f32>,
}

@group(0) @binding(0) var<uniform> denoise: DenoiseParams;
@group(0) @binding(1) var input_radiance: texture_2d<f32>;
@group(0) @binding(2) var depth_pyramid: texture_2d<f32>;
@group(0) @binding(3) var<storage, read> points: array<vec2<f32>, 64>;
@group(0) @binding(4) var output_radiance: texture_storage_2d<rgba16float, write>;

// Depth-weighted gather over the precomputed disk. Taps whose linear depth
// disagrees with the center beyond the pixel footprint at that distance
// get vanishing weight, so the blur stays on-surface.
@compute @workgroup_size(8, 8, 1)
fn cs_bilateral_filter(@builtin(global_invocation_id) id: vec3<u32>) {
    let size = vec2<i32>(i32(denoise.resolution.z), i32(denoise.resolution.w));
    let pixel = vec2<i32>(id.xy);
    if (pixel.x >= size.x || pixel.y >= size.y) {
        return;
    }

    let center_depth = textureLoad(depth_pyramid, pixel, 0).x;
    let center = textureLoad(input_radiance, pixel, 0);
    if (denoise.params.x <= 0.0) {
        textureStore(output_radiance, pixel, center);
        return;
    }

    // Screen-space radius in pixels proportional to the world radius at
    // this depth.
    let radius_pixels = denoise.params.x
        / max(center_depth * denoise.params.y, 1e-6);
    let radius = clamp(radius_pixels, 1.0, 32.0);

    var total = center;
    var weight = 1.0;
    for (var i = 0u; i < 64u; i = i + 1u) {
        let offset = points[i] * radius;
        let tap = clamp(pixel + vec2<i32>(offset), vec2<i32>(0), size - vec2<i32>(1));
        if (tap.x == pixel.x && tap.y == pixel.y) {
            continue;
        }
        let tap_depth = textureLoad(depth_pyramid, tap, 0).x;
        // Tolerance grows with the pixel footprint at the tap distance.
        let tolerance = center_depth * denoise.params.y * (length(offset) + 1.0) * 2.0;
        let w = exp(-abs(tap_depth - center_depth) / max(tolerance, 1e-6));
        total = total + textureLoad(input_radiance, tap, 0) * w;
        weight = weight + w;
    }
    textureStore(output_radiance, pixel, total / weight);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noise_is_deterministic() {
        let a = scrambled_noise(NOISE_SEED);
        let b = scrambled_noise(NOISE_SEED);
        assert_eq!(a, b);
        assert_eq!(a.len(), (NOISE_SIZE * NOISE_SIZE) as usize);
    }

    #[test]
    fn test_noise_varies_with_seed() {
        let a = scrambled_noise(1);
        let b = scrambled_noise(2);
        assert_ne!(a, b);
    }

    #[test]
    fn test_points_flag_starts_clear() {
        let denoiser = DiffuseDenoiser::new();
        assert!(!denoiser.points_generated());
        assert!(!denoiser.is_ready());
    }

    #[test]
    fn test_shader_entry_points_match_kernel_table() {
        assert!(POINT_SHADER.contains("fn cs_point_distribution"));
        assert!(BILATERAL_SHADER.contains("fn cs_bilateral_filter"));
        assert_eq!(
            DenoiserKernel::PointDistribution.entry_point(),
            "cs_point_distribution"
        );
        assert_eq!(DenoiserKernel::BilateralFilter.entry_point(), "cs_bilateral_filter");
    }

    #[test]
    fn test_tile_dispatch_rounds_up() {
        assert_eq!(tile_count(1920), 240);
        assert_eq!(tile_count(1921), 241);
        assert_eq!(crate::math::TILE_SIZE, 8);
    }
}
