//! Flow-field simulation pass.
//!
//! One invocation per state texel: read the current state, write the next
//! state into the other ping-pong slot. The per-texel logic is the same as
//! [`crate::flow::step_texel`].

use bytemuck::{Pod, Zeroable};

use super::data_texture::{sampled_entry, storage_entry, uniform_entry};
use crate::flow::{FlowParams, StepInput, NOISE_TIME_DRIFT, RESPAWN_MIN_FRACTION};
use crate::shader_utils::flow_utils_wgsl;

/// Workgroup edge length; workgroups are `WORKGROUP_SIZE × WORKGROUP_SIZE`.
pub const WORKGROUP_SIZE: u32 = 8;

/// Uniforms of the flow pass.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct FlowUniforms {
    pub time: f32,
    pub delta: f32,
    pub seed: u32,
    /// Respawn frame, `floor(time * 60)`.
    pub frame: u32,
    pub bounds_radius: f32,
    pub respawn_radius: f32,
    pub life_decay: f32,
    pub noise_scale: f32,
    pub noise_strength: f32,
    pub flow_speed: f32,
    pub tex_size: u32,
    pub _pad: u32,
}

impl FlowUniforms {
    pub fn new(step: &StepInput, flow: &FlowParams, tex_size: u32) -> Self {
        Self {
            time: step.time,
            delta: step.delta,
            seed: flow.seed,
            frame: step.frame(),
            bounds_radius: flow.bounds_radius,
            respawn_radius: flow.respawn_radius,
            life_decay: flow.life_decay,
            noise_scale: flow.noise_scale,
            noise_strength: flow.noise_strength,
            flow_speed: flow.flow_speed,
            tex_size,
            _pad: 0,
        }
    }
}

/// Compute pipeline and uniform buffer of the flow pass.
pub struct FlowPipeline {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
}

impl FlowPipeline {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Flow Compute Shader"),
            source: wgpu::ShaderSource::Wgsl(generate_flow_shader().into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Flow Bind Group Layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::COMPUTE),
                sampled_entry(1, wgpu::ShaderStages::COMPUTE),
                storage_entry(2),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Flow Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Flow Compute Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Flow Uniform Buffer"),
            size: std::mem::size_of::<FlowUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            pipeline,
            bind_group_layout,
            uniform_buffer,
        }
    }

    /// Bind group reading `state_in` and writing `state_out`.
    pub fn bind_group(
        &self,
        device: &wgpu::Device,
        state_in: &wgpu::TextureView,
        state_out: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Flow Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(state_in),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(state_out),
                },
            ],
        })
    }

    pub fn write_uniforms(&self, queue: &wgpu::Queue, uniforms: &FlowUniforms) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
    }

    pub fn dispatch(&self, encoder: &mut wgpu::CommandEncoder, bind_group: &wgpu::BindGroup, tex_size: u32) {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Flow Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        let groups = tex_size.div_ceil(WORKGROUP_SIZE);
        pass.dispatch_workgroups(groups, groups, 1);
    }
}

/// WGSL of the flow pass.
pub fn generate_flow_shader() -> String {
    let utils = flow_utils_wgsl();
    format!(
        r#"struct FlowUniforms {{
    time: f32,
    delta: f32,
    seed: u32,
    frame: u32,
    bounds_radius: f32,
    respawn_radius: f32,
    life_decay: f32,
    noise_scale: f32,
    noise_strength: f32,
    flow_speed: f32,
    tex_size: u32,
    _pad: u32,
}};

@group(0) @binding(0)
var<uniform> params: FlowUniforms;

@group(0) @binding(1)
var state_in: texture_2d<f32>;

@group(0) @binding(2)
var state_out: texture_storage_2d<rgba32float, write>;

{utils}

fn respawn(texel: vec2<u32>) -> vec4<f32> {{
    let h = hash3(texel.x, texel.y, params.seed + hash(params.frame));
    let a = rand_unit(h);
    let b = rand_unit(h + 1u);
    let c = rand_unit(h + 2u);

    let theta = a * 6.283185307179586;
    let z = b * 2.0 - 1.0;
    let s = sqrt(max(1.0 - z * z, 0.0));
    let direction = vec3<f32>(s * cos(theta), z, s * sin(theta));
    let fraction = min({min_fraction:?} + (1.0 - {min_fraction:?}) * c, 1.0);

    return vec4<f32>(direction * params.respawn_radius * fraction, 1.0);
}}

@compute @workgroup_size({wg}, {wg})
fn main(@builtin(global_invocation_id) global_id: vec3<u32>) {{
    if global_id.x >= params.tex_size || global_id.y >= params.tex_size {{
        return;
    }}
    let texel = global_id.xy;
    let state = textureLoad(state_in, vec2<i32>(texel), 0);

    let life = min(state.w - params.delta * params.life_decay, 1.0);
    let domain = state.xyz * params.noise_scale + vec3<f32>(0.0, params.time * {drift:?}, 0.0);
    let flow = curl_noise(domain) * params.noise_strength;
    let position = state.xyz + flow * params.flow_speed * params.delta;

    var next = vec4<f32>(position, life);
    // Negated so NaN life or position also respawns.
    if !(life > 0.0 && length(position) <= params.bounds_radius) {{
        next = respawn(texel);
    }}

    textureStore(state_out, vec2<i32>(texel), next);
}}
"#,
        min_fraction = RESPAWN_MIN_FRACTION,
        drift = NOISE_TIME_DRIFT,
        wg = WORKGROUP_SIZE,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader_utils::validate_wgsl;

    #[test]
    fn test_flow_shader_validates() {
        let shader = generate_flow_shader();
        if let Err(e) = validate_wgsl(&shader) {
            panic!("flow shader failed validation:\n{}\n\nShader:\n{}", e, shader);
        }
    }

    #[test]
    fn test_flow_shader_embeds_constants() {
        let shader = generate_flow_shader();
        assert!(shader.contains("@workgroup_size(8, 8)"));
        assert!(shader.contains("params.time * 0.15"));
        assert!(shader.contains("min(0.75 + (1.0 - 0.75) * c, 1.0)"));
    }

    #[test]
    fn test_uniforms_layout() {
        assert_eq!(std::mem::size_of::<FlowUniforms>(), 48);

        let flow = FlowParams {
            seed: 7,
            ..FlowParams::for_radius(4.0)
        };
        let uniforms = FlowUniforms::new(&StepInput::new(0.016, 1.5), &flow, 32);
        assert_eq!(uniforms.frame, 90);
        assert_eq!(uniforms.seed, 7);
        assert_eq!(uniforms.bounds_radius, 5.0);
        assert_eq!(uniforms.tex_size, 32);
    }
}
