//! History accumulation pass.
//!
//! One invocation per atlas texel. Mirrors [`crate::history::accumulate_texel`].

use bytemuck::{Pod, Zeroable};

use super::data_texture::{sampled_entry, storage_entry, uniform_entry};
use super::flow_gpu::WORKGROUP_SIZE;
use crate::history::LIFE_RESET_EPSILON;

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct HistoryUniforms {
    pub tex_size: u32,
    pub history_length: u32,
    pub max_jump: f32,
    pub _pad: u32,
}

impl HistoryUniforms {
    pub fn new(tex_size: u32, history_length: u32, max_jump: f32) -> Self {
        Self {
            tex_size,
            history_length,
            max_jump,
            _pad: 0,
        }
    }
}

pub struct HistoryPipeline {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
}

impl HistoryPipeline {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("History Compute Shader"),
            source: wgpu::ShaderSource::Wgsl(generate_history_shader().into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("History Bind Group Layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::COMPUTE),
                sampled_entry(1, wgpu::ShaderStages::COMPUTE),
                sampled_entry(2, wgpu::ShaderStages::COMPUTE),
                storage_entry(3),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("History Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("History Compute Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("History Uniform Buffer"),
            size: std::mem::size_of::<HistoryUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            pipeline,
            bind_group_layout,
            uniform_buffer,
        }
    }

    /// Bind group reading the current state and atlas, writing `history_next`.
    pub fn bind_group(
        &self,
        device: &wgpu::Device,
        state_current: &wgpu::TextureView,
        history_prev: &wgpu::TextureView,
        history_next: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("History Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(state_current),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(history_prev),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(history_next),
                },
            ],
        })
    }

    pub fn write_uniforms(&self, queue: &wgpu::Queue, uniforms: &HistoryUniforms) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
    }

    pub fn dispatch(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        bind_group: &wgpu::BindGroup,
        tex_size: u32,
        history_length: u32,
    ) {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("History Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.dispatch_workgroups(
            tex_size.div_ceil(WORKGROUP_SIZE),
            (tex_size * history_length).div_ceil(WORKGROUP_SIZE),
            1,
        );
    }
}

pub fn generate_history_shader() -> String {
    format!(
        r#"struct HistoryUniforms {{
    tex_size: u32,
    history_length: u32,
    max_jump: f32,
    _pad: u32,
}};

@group(0) @binding(0)
var<uniform> params: HistoryUniforms;

@group(0) @binding(1)
var state_current: texture_2d<f32>;

@group(0) @binding(2)
var history_prev: texture_2d<f32>;

@group(0) @binding(3)
var history_next: texture_storage_2d<rgba32float, write>;

@compute @workgroup_size({wg}, {wg})
fn main(@builtin(global_invocation_id) global_id: vec3<u32>) {{
    let tex = params.tex_size;
    if global_id.x >= tex || global_id.y >= tex * params.history_length {{
        return;
    }}

    let slice = global_id.y / tex;
    let particle = vec2<i32>(i32(global_id.x), i32(global_id.y % tex));
    let current = textureLoad(state_current, particle, 0);

    var out = current;
    if slice > 0u {{
        // Slice 0 of the previous atlas lives at the particle's own texel.
        let head = textureLoad(history_prev, particle, 0);
        let life_reset = current.w > head.w + {epsilon};
        let jump = distance(current.xyz, head.xyz) > params.max_jump;
        if !(life_reset || jump) {{
            let above = vec2<i32>(i32(global_id.x), i32(global_id.y - tex));
            out = textureLoad(history_prev, above, 0);
        }}
    }}

    textureStore(history_next, vec2<i32>(global_id.xy), out);
}}
"#,
        wg = WORKGROUP_SIZE,
        epsilon = LIFE_RESET_EPSILON,
    )
}
