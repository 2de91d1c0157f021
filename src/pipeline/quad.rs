//! Fullscreen-quad geometry shared by every draw pass.

/// Vertex for fullscreen quad (position + uv).
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FullscreenVertex {
    /// Position (x, y) in clip space.
    pub position: [f32; 2],
    /// UV coordinates.
    pub uv: [f32; 2],
}

impl FullscreenVertex {
    /// Vertex buffer layout.
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    format: wgpu::VertexFormat::Float32x2,
                    offset: 0,
                    shader_location: 0,
                },
                wgpu::VertexAttribute {
                    format: wgpu::VertexFormat::Float32x2,
                    offset: 8,
                    shader_location: 1,
                },
            ],
        }
    }
}

/// Fullscreen quad vertices (two triangles).
pub const FULLSCREEN_QUAD_VERTICES: [FullscreenVertex; 6] = [
    FullscreenVertex { position: [-1.0, -1.0], uv: [0.0, 1.0] },
    FullscreenVertex { position: [1.0, -1.0], uv: [1.0, 1.0] },
    FullscreenVertex { position: [1.0, 1.0], uv: [1.0, 0.0] },
    FullscreenVertex { position: [-1.0, -1.0], uv: [0.0, 1.0] },
    FullscreenVertex { position: [1.0, 1.0], uv: [1.0, 0.0] },
    FullscreenVertex { position: [-1.0, 1.0], uv: [0.0, 0.0] },
];

/// Shared WGSL vertex stage for fullscreen passes.
pub const FULLSCREEN_VS: &str = r#"
struct VertexInput {
    @location(0) position: vec2<f32>,
    @location(1) uv: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.position = vec4<f32>(in.position, 0.0, 1.0);
    out.uv = in.uv;
    return out;
}
"#;
