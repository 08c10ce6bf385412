//! Trail line rendering.
//!
//! The vertex buffer holds [`TrailVertex`]es from
//! [`build_trail_geometry`](crate::trail::build_trail_geometry): a particle UV
//! and a history slice per vertex, two vertices per segment. Positions come
//! from the history atlas in the vertex stage. Each vertex also resolves the
//! length of the segment it belongs to, so both ends agree on the
//! teleport-seam discard.

use wgpu::util::DeviceExt;

use super::data_texture::{sampled_entry, uniform_entry};
use super::{ADDITIVE_BLEND, DEPTH_FORMAT, RENDER_UNIFORMS_WGSL};
use crate::shader_utils::SANITIZE_WGSL;
use crate::trail::{TrailGeometry, TrailVertex, MAX_TRAIL_ALPHA, TRAIL_FADE_EXPONENT};

pub struct TrailsPipeline {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl TrailsPipeline {
    pub fn new(device: &wgpu::Device, target_format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Trail Render Shader"),
            source: wgpu::ShaderSource::Wgsl(generate_trails_shader().into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Trail Render Bind Group Layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::VERTEX_FRAGMENT),
                sampled_entry(1, wgpu::ShaderStages::VERTEX),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Trail Render Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Trail Render Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[TrailVertex::layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: Some(ADDITIVE_BLEND),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::LineList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            bind_group_layout,
        }
    }

    /// Bind group sampling one history atlas.
    pub fn bind_group(
        &self,
        device: &wgpu::Device,
        uniform_buffer: &wgpu::Buffer,
        history: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Trail Render Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(history),
                },
            ],
        })
    }

    pub fn draw(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        bind_group: &wgpu::BindGroup,
        vertices: &TrailVertexBuffer,
    ) {
        if vertices.vertex_count == 0 {
            return;
        }
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.set_vertex_buffer(0, vertices.buffer.slice(..));
        pass.draw(0..vertices.vertex_count, 0..1);
    }
}

/// Uploaded trail geometry.
pub struct TrailVertexBuffer {
    pub buffer: wgpu::Buffer,
    pub vertex_count: u32,
}

impl TrailVertexBuffer {
    pub fn new(device: &wgpu::Device, geometry: &TrailGeometry) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Trail Vertex Buffer"),
            contents: bytemuck::cast_slice(&geometry.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        Self {
            buffer,
            vertex_count: geometry.vertex_count(),
        }
    }
}

pub fn generate_trails_shader() -> String {
    format!(
        r#"{RENDER_UNIFORMS_WGSL}

@group(0) @binding(0)
var<uniform> uniforms: RenderUniforms;

@group(0) @binding(1)
var history: texture_2d<f32>;

{SANITIZE_WGSL}

struct VertexInput {{
    @location(0) uv: vec2<f32>,
    @location(1) slice: f32,
}};

struct VertexOutput {{
    @builtin(position) clip_position: vec4<f32>,
    @location(0) @interpolate(flat) segment_length: f32,
    @location(1) age: f32,
}};

fn history_position(uv: vec2<f32>, slice: u32) -> vec3<f32> {{
    let tex = uniforms.tex_size;
    let scaled = max(sanitize3(vec3<f32>(uv, 0.0)).xy * f32(tex), vec2<f32>(0.0));
    let particle = min(vec2<u32>(scaled), vec2<u32>(tex - 1u));
    let texel = vec2<i32>(i32(particle.x), i32(slice * tex + particle.y));
    return sanitize3(textureLoad(history, texel, 0).xyz);
}}

@vertex
fn vs_main(in: VertexInput, @builtin(vertex_index) vertex_index: u32) -> VertexOutput {{
    let last = max(uniforms.history_length, 1u) - 1u;
    let slice = min(u32(max(in.slice, 0.0)), last);

    // Line list: even vertices start a segment, odd vertices end one.
    let start = slice - min(vertex_index & 1u, slice);
    let end = min(start + 1u, last);
    let segment_length = distance(history_position(in.uv, start), history_position(in.uv, end));

    var out: VertexOutput;
    out.clip_position = uniforms.view_proj * vec4<f32>(history_position(in.uv, slice), 1.0);
    out.segment_length = segment_length;
    out.age = f32(slice) / max(f32(last), 1.0);
    return out;
}}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {{
    var length_factor = 0.0;
    if uniforms.max_jump > 0.0 {{
        length_factor = clamp(1.0 - in.segment_length / uniforms.max_jump, 0.0, 1.0);
    }}
    let fade = pow(1.0 - clamp(in.age, 0.0, 1.0), {fade:?});
    let alpha = clamp(fade * uniforms.color.a * length_factor, 0.0, {max_alpha:?});
    if !(alpha > 0.0) {{
        discard;
    }}
    return vec4<f32>(uniforms.color.rgb, alpha);
}}
"#,
        fade = TRAIL_FADE_EXPONENT,
        max_alpha = MAX_TRAIL_ALPHA,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader_utils::validate_wgsl;

    #[test]
    fn test_trails_shader_validates() {
        let shader = generate_trails_shader();
        if let Err(e) = validate_wgsl(&shader) {
            panic!("trail shader failed validation:\n{}\n\nShader:\n{}", e, shader);
        }
    }

    #[test]
    fn test_trails_shader_embeds_opacity_constants() {
        let shader = generate_trails_shader();
        assert!(shader.contains("1.6)"));
        assert!(shader.contains("0.0, 0.9)"));
        assert!(shader.contains("@interpolate(flat) segment_length"));
    }
}
