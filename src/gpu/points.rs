//! Particle head point cloud.
//!
//! Draws one camera-facing quad per particle as an instance. The vertex stage
//! looks up the particle's position in the current state texture by instance
//! index, so there is no per-particle vertex buffer.

use super::data_texture::{sampled_entry, uniform_entry};
use super::{ADDITIVE_BLEND, DEPTH_FORMAT, RENDER_UNIFORMS_WGSL};
use crate::shader_utils::SANITIZE_WGSL;

/// Vertices per point sprite (two triangles).
pub const QUAD_VERTICES: u32 = 6;

pub struct PointsPipeline {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl PointsPipeline {
    pub fn new(device: &wgpu::Device, target_format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Points Shader"),
            source: wgpu::ShaderSource::Wgsl(generate_points_shader().into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Points Bind Group Layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::VERTEX_FRAGMENT),
                sampled_entry(1, wgpu::ShaderStages::VERTEX),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Points Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Points Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
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
                topology: wgpu::PrimitiveTopology::TriangleList,
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

    /// Bind group sampling one state texture.
    pub fn bind_group(
        &self,
        device: &wgpu::Device,
        uniform_buffer: &wgpu::Buffer,
        state: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Points Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(state),
                },
            ],
        })
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, bind_group: &wgpu::BindGroup, particle_count: u32) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.draw(0..QUAD_VERTICES, 0..particle_count);
    }
}

pub fn generate_points_shader() -> String {
    format!(
        r#"{RENDER_UNIFORMS_WGSL}

@group(0) @binding(0)
var<uniform> uniforms: RenderUniforms;

@group(0) @binding(1)
var state: texture_2d<f32>;

{SANITIZE_WGSL}

struct VertexOutput {{
    @builtin(position) clip_position: vec4<f32>,
    @location(0) offset: vec2<f32>,
}};

@vertex
fn vs_main(
    @builtin(vertex_index) vertex_index: u32,
    @builtin(instance_index) instance_index: u32,
) -> VertexOutput {{
    let tex = uniforms.tex_size;
    let texel = vec2<i32>(i32(instance_index % tex), i32(instance_index / tex));
    let position = sanitize3(textureLoad(state, texel, 0).xyz);

    var quad_vertices = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>( 1.0, -1.0),
        vec2<f32>(-1.0,  1.0),
        vec2<f32>(-1.0,  1.0),
        vec2<f32>( 1.0, -1.0),
        vec2<f32>( 1.0,  1.0),
    );
    let corner = quad_vertices[vertex_index];

    // point_size is a diameter in pixels; NDC spans two units per viewport.
    let half_extent = uniforms.point_size / max(uniforms.viewport, vec2<f32>(1.0));
    var clip_pos = uniforms.view_proj * vec4<f32>(position, 1.0);
    clip_pos.x += corner.x * half_extent.x * clip_pos.w;
    clip_pos.y += corner.y * half_extent.y * clip_pos.w;

    var out: VertexOutput;
    out.clip_position = clip_pos;
    out.offset = corner * 0.5;
    return out;
}}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {{
    let d = length(in.offset);
    let alpha = 1.0 - smoothstep(0.0, 0.5, d);
    if alpha <= 0.0 {{
        discard;
    }}
    return vec4<f32>(uniforms.color.rgb, alpha);
}}
"#
    )
}
