//! GPU resources of one particle system.
//!
//! [`ParticleSystemGpu`] owns both ping-pong pairs, every precreated bind
//! group and the trail vertex buffer. It exposes the frame stages as methods
//! that record into a caller's encoder; [`GpuFrame`] adapts those to the
//! [`FrameBackend`] seam so the [`FrameDriver`](crate::FrameDriver) can run
//! them in order.

use glam::Vec4;
use log::info;

use super::data_texture::DataTexture;
use super::flow_gpu::{FlowPipeline, FlowUniforms};
use super::history_gpu::{HistoryPipeline, HistoryUniforms};
use super::ping_pong::PingPong;
use super::points::PointsPipeline;
use super::trails::{TrailVertexBuffer, TrailsPipeline};
use super::RenderUniforms;
use crate::config::{ParticleConfig, ResolvedConfig};
use crate::driver::{DrawList, FrameBackend, RenderParams};
use crate::flow::{FlowParams, StepInput};
use crate::seed;
use crate::trail::build_trail_geometry;

/// Compiled pipelines. These depend only on the target format and survive
/// reconfiguration.
struct Pipelines {
    flow: FlowPipeline,
    history: HistoryPipeline,
    points: PointsPipeline,
    trails: TrailsPipeline,
}

/// Sized resources, rebuilt whenever the grid or history shape changes.
struct Resources {
    state: PingPong<DataTexture>,
    /// Indexed by the current state slot.
    flow_bind_groups: [wgpu::BindGroup; 2],
    /// Indexed by the current state slot.
    points_bind_groups: [wgpu::BindGroup; 2],
    trails: Option<TrailResources>,
}

struct TrailResources {
    atlas: PingPong<DataTexture>,
    /// Indexed by `[current state slot][current atlas slot]`.
    history_bind_groups: [[wgpu::BindGroup; 2]; 2],
    /// Indexed by the current atlas slot.
    render_bind_groups: [wgpu::BindGroup; 2],
    vertices: TrailVertexBuffer,
}

pub struct ParticleSystemGpu {
    config: ParticleConfig,
    resolved: ResolvedConfig,
    max_texture_dimension: u32,
    pipelines: Pipelines,
    render_uniform_buffer: wgpu::Buffer,
    resources: Resources,
}

impl ParticleSystemGpu {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        target_format: wgpu::TextureFormat,
        config: &ParticleConfig,
    ) -> Self {
        let max_texture_dimension = device.limits().max_texture_dimension_2d;
        let resolved = config.resolve(max_texture_dimension);

        let pipelines = Pipelines {
            flow: FlowPipeline::new(device),
            history: HistoryPipeline::new(device),
            points: PointsPipeline::new(device, target_format),
            trails: TrailsPipeline::new(device, target_format),
        };

        let render_uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Render Uniform Buffer"),
            size: std::mem::size_of::<RenderUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let resources = create_resources(
            device,
            queue,
            &pipelines,
            &render_uniform_buffer,
            config,
            &resolved,
        );

        Self {
            config: config.clone(),
            resolved,
            max_texture_dimension,
            pipelines,
            render_uniform_buffer,
            resources,
        }
    }

    /// Apply a new configuration.
    ///
    /// Shape changes (particle count, history length, strides or trails on
    /// and off) recreate every texture, bind group and the trail geometry,
    /// restarting from a fresh seed. A new radius or seed only reseeds the
    /// existing textures. Anything else only changes uniforms.
    /// Returns whether resources were recreated.
    pub fn reconfigure(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, config: &ParticleConfig) -> bool {
        let resolved = config.resolve(self.max_texture_dimension);
        let rebuild = self.resolved.requires_rebuild(&resolved);

        if rebuild {
            self.resources = create_resources(
                device,
                queue,
                &self.pipelines,
                &self.render_uniform_buffer,
                config,
                &resolved,
            );
        } else if config.radius != self.config.radius || config.seed != self.config.seed {
            self.reseed(queue, config, &resolved);
        }
        self.config = config.clone();
        self.resolved = resolved;
        rebuild
    }

    /// Restart from a fresh seed in place. The current history atlas is
    /// zeroed so the next accumulation collapses every column.
    fn reseed(&self, queue: &wgpu::Queue, config: &ParticleConfig, resolved: &ResolvedConfig) {
        let seeded = seed::initialize(resolved.tex_size(), config.radius, config.seed as u64);
        self.resources.state.current().write(queue, &seeded);

        if let Some(trails) = &self.resources.trails {
            let atlas = trails.atlas.current();
            atlas.write(queue, &vec![Vec4::ZERO; (atlas.width * atlas.height) as usize]);
        }
        info!("Reseeded {} particles (seed {})", seeded.len(), config.seed);
    }

    pub fn config(&self) -> &ParticleConfig {
        &self.config
    }

    pub fn resolved(&self) -> &ResolvedConfig {
        &self.resolved
    }

    /// The state texture readers should use this frame.
    pub fn state_view(&self) -> &wgpu::TextureView {
        &self.resources.state.current().view
    }

    /// The history atlas readers should use this frame, if trails are enabled.
    pub fn history_view(&self) -> Option<&wgpu::TextureView> {
        self.resources.trails.as_ref().map(|t| &t.atlas.current().view)
    }

    /// The strided trail line list, if trails are enabled.
    pub fn trail_vertices(&self) -> Option<&TrailVertexBuffer> {
        self.resources.trails.as_ref().map(|t| &t.vertices)
    }

    /// Record the flow pass: current state in, other slot out.
    pub fn simulate(
        &self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        step: &StepInput,
        flow: &FlowParams,
    ) {
        let tex_size = self.resolved.tex_size();
        let flow_pipeline = &self.pipelines.flow;
        flow_pipeline.write_uniforms(queue, &FlowUniforms::new(step, flow, tex_size));

        let bind_group = &self.resources.flow_bind_groups[self.resources.state.current_index()];
        flow_pipeline.dispatch(encoder, bind_group, tex_size);
    }

    pub fn swap_state(&mut self) {
        self.resources.state.swap();
    }

    /// Record the history pass. Does nothing when trails are disabled.
    pub fn accumulate_history(&self, queue: &wgpu::Queue, encoder: &mut wgpu::CommandEncoder, max_jump: f32) {
        let Some(trails) = &self.resources.trails else {
            return;
        };
        let tex_size = self.resolved.tex_size();
        let history_length = self.resolved.history_length;
        let history = &self.pipelines.history;
        history.write_uniforms(queue, &HistoryUniforms::new(tex_size, history_length, max_jump));

        let bind_group = &trails.history_bind_groups[self.resources.state.current_index()]
            [trails.atlas.current_index()];
        history.dispatch(encoder, bind_group, tex_size, history_length);
    }

    pub fn swap_history(&mut self) {
        if let Some(trails) = &mut self.resources.trails {
            trails.atlas.swap();
        }
    }

    pub fn update_render(&self, queue: &wgpu::Queue, params: &RenderParams) {
        let uniforms = RenderUniforms::new(params, self.resolved.tex_size(), self.resolved.history_length);
        queue.write_buffer(&self.render_uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
    }

    /// Record draws into an open render pass.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, list: DrawList) {
        if list.trails {
            if let Some(trails) = &self.resources.trails {
                let bind_group = &trails.render_bind_groups[trails.atlas.current_index()];
                self.pipelines.trails.draw(pass, bind_group, &trails.vertices);
            }
        }
        if list.points {
            let bind_group = &self.resources.points_bind_groups[self.resources.state.current_index()];
            self.pipelines
                .points
                .draw(pass, bind_group, self.resolved.grid.effective_count());
        }
    }
}

fn create_resources(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    pipelines: &Pipelines,
    render_uniform_buffer: &wgpu::Buffer,
    config: &ParticleConfig,
    resolved: &ResolvedConfig,
) -> Resources {
    let tex_size = resolved.tex_size();
    let seeded = seed::initialize(tex_size, config.radius, config.seed as u64);

    // Slot 0 holds the seed and is current; slot 1 is the first write target.
    let state = PingPong::new(
        DataTexture::with_data(device, queue, "State Texture A", tex_size, tex_size, &seeded),
        DataTexture::new(device, "State Texture B", tex_size, tex_size),
    );

    let flow_bind_groups = [0, 1].map(|current| {
        let [read, write] = ordered(state.slots(), current);
        pipelines.flow.bind_group(device, &read.view, &write.view)
    });
    let points_bind_groups = [0, 1].map(|current| {
        pipelines
            .points
            .bind_group(device, render_uniform_buffer, &state.slots()[current].view)
    });

    let trails = resolved.trails_enabled().then(|| {
        let (width, height) = resolved.grid.atlas_extent(resolved.history_length);
        let atlas = PingPong::from_fn(|i| {
            let label = if i == 0 { "History Atlas A" } else { "History Atlas B" };
            DataTexture::new(device, label, width, height)
        });

        let history_bind_groups = [0, 1].map(|state_current| {
            [0, 1].map(|atlas_current| {
                let [prev, next] = ordered(atlas.slots(), atlas_current);
                pipelines.history.bind_group(
                    device,
                    &state.slots()[state_current].view,
                    &prev.view,
                    &next.view,
                )
            })
        });
        let render_bind_groups = [0, 1].map(|current| {
            pipelines
                .trails
                .bind_group(device, render_uniform_buffer, &atlas.slots()[current].view)
        });

        let geometry = build_trail_geometry(
            tex_size,
            resolved.history_length,
            resolved.preset.particle_step,
            resolved.preset.segment_step,
        );
        info!(
            "Trail resources: atlas {}x{}, {} segments",
            width,
            height,
            geometry.segment_count()
        );

        TrailResources {
            atlas,
            history_bind_groups,
            render_bind_groups,
            vertices: TrailVertexBuffer::new(device, &geometry),
        }
    });

    let texture_bytes: u64 = state.slots().iter().map(DataTexture::size_bytes).sum::<u64>()
        + trails
            .as_ref()
            .map_or(0, |t| t.atlas.slots().iter().map(DataTexture::size_bytes).sum::<u64>());
    info!(
        "Particle system: {} particles ({}x{} state), history {}, trails {}, {:.1} MiB of textures",
        resolved.grid.effective_count(),
        tex_size,
        tex_size,
        resolved.history_length,
        if trails.is_some() { "on" } else { "off" },
        texture_bytes as f64 / (1024.0 * 1024.0)
    );

    Resources {
        state,
        flow_bind_groups,
        points_bind_groups,
        trails,
    }
}

/// `[read, write]` for the pair when `current` is the readable slot.
fn ordered<T>(slots: &[T; 2], current: usize) -> [&T; 2] {
    [&slots[current], &slots[1 - current]]
}

/// One frame's recording context for a [`ParticleSystemGpu`].
pub struct GpuFrame<'a> {
    pub system: &'a mut ParticleSystemGpu,
    pub queue: &'a wgpu::Queue,
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub color_target: &'a wgpu::TextureView,
    pub depth_target: &'a wgpu::TextureView,
    pub clear_color: wgpu::Color,
}

impl FrameBackend for GpuFrame<'_> {
    fn simulate(&mut self, step: &StepInput, flow: &FlowParams) {
        self.system.simulate(self.queue, self.encoder, step, flow);
    }

    fn swap_state(&mut self) {
        self.system.swap_state();
    }

    fn accumulate_history(&mut self, max_jump: f32) {
        self.system.accumulate_history(self.queue, self.encoder, max_jump);
    }

    fn swap_history(&mut self) {
        self.system.swap_history();
    }

    fn update_render(&mut self, params: &RenderParams) {
        self.system.update_render(self.queue, params);
    }

    fn draw(&mut self, list: DrawList) {
        let mut pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Particle Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: self.color_target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.clear_color),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: self.depth_target,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        self.system.draw(&mut pass, list);
    }
}
