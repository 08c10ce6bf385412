//! GPU side of the particle system and the viewer's device plumbing.

mod camera;
pub mod data_texture;
pub mod flow_gpu;
pub mod history_gpu;
pub mod ping_pong;
pub mod points;
pub mod system;
pub mod trails;

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use log::info;
use winit::window::Window;

pub use camera::Camera;
pub use ping_pong::PingPong;
pub use system::{GpuFrame, ParticleSystemGpu};

use crate::config::ParticleConfig;
use crate::driver::{FrameDriver, RenderParams, ViewParams};
use crate::error::GpuError;

pub(crate) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Additive blending for points and trails.
pub(crate) const ADDITIVE_BLEND: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.02,
    g: 0.02,
    b: 0.05,
    a: 1.0,
};

/// Uniforms shared by the point and trail pipelines.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct RenderUniforms {
    pub view_proj: [[f32; 4]; 4],
    /// rgb, and line intensity in w.
    pub color: [f32; 4],
    pub viewport: [f32; 2],
    pub point_size: f32,
    pub max_jump: f32,
    pub tex_size: u32,
    pub history_length: u32,
    pub _pad: [u32; 2],
}

impl RenderUniforms {
    pub fn new(params: &RenderParams, tex_size: u32, history_length: u32) -> Self {
        let [r, g, b] = params.color;
        Self {
            view_proj: params.view_proj.to_cols_array_2d(),
            color: [r, g, b, params.line_intensity],
            viewport: params.viewport,
            point_size: params.point_size,
            max_jump: params.max_jump,
            tex_size,
            history_length,
            _pad: [0; 2],
        }
    }
}

pub(crate) const RENDER_UNIFORMS_WGSL: &str = r#"struct RenderUniforms {
    view_proj: mat4x4<f32>,
    color: vec4<f32>,
    viewport: vec2<f32>,
    point_size: f32,
    max_jump: f32,
    tex_size: u32,
    history_length: u32,
    _pad: vec2<u32>,
};"#;

/// Window surface, device and the particle system it renders.
pub struct GpuState {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    depth_texture: wgpu::TextureView,
    pub camera: Camera,
    system: ParticleSystemGpu,
    driver: FrameDriver,
}

impl GpuState {
    pub async fn new(window: Arc<Window>, particle_config: &ParticleConfig) -> Result<Self, GpuError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        info!(
            "Surface {}x{} {:?}, max texture dimension {}",
            config.width,
            config.height,
            surface_format,
            device.limits().max_texture_dimension_2d
        );

        let depth_texture = create_depth_texture(&device, &config);

        let system = ParticleSystemGpu::new(&device, &queue, surface_format, particle_config);
        let driver = FrameDriver::new(*system.resolved());

        let mut camera = Camera::new();
        camera.frame_radius(particle_config.bounds_radius());

        Ok(Self {
            surface,
            device,
            queue,
            config,
            depth_texture,
            camera,
            system,
            driver,
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
            self.depth_texture = create_depth_texture(&self.device, &self.config);
        }
    }

    /// Apply a new particle configuration, recreating resources if its shape changed.
    pub fn reconfigure(&mut self, particle_config: &ParticleConfig) {
        refit_camera(&mut self.camera, self.system.config(), particle_config);
        self.system.reconfigure(&self.device, &self.queue, particle_config);
        self.driver.set_config(*self.system.resolved());
    }

    pub fn system(&self) -> &ParticleSystemGpu {
        &self.system
    }

    pub fn driver(&self) -> &FrameDriver {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut FrameDriver {
        &mut self.driver
    }

    fn view_params(&self) -> ViewParams {
        let aspect = self.config.width as f32 / self.config.height as f32;
        let proj = Mat4::perspective_rh(45.0_f32.to_radians(), aspect, 0.1, self.camera.far_plane());
        ViewParams {
            view_proj: proj * self.camera.view_matrix(),
            viewport: [self.config.width as f32, self.config.height as f32],
        }
    }

    /// Run one frame and present it.
    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let view_params = self.view_params();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        {
            let mut frame = GpuFrame {
                system: &mut self.system,
                queue: &self.queue,
                encoder: &mut encoder,
                color_target: &view,
                depth_target: &self.depth_texture,
                clear_color: CLEAR_COLOR,
            };
            self.driver.run_frame(&mut frame, &view_params);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

/// Re-frame the orbit when the cloud's extent changes. Other changes keep the
/// user's zoom.
fn refit_camera(camera: &mut Camera, previous: &ParticleConfig, next: &ParticleConfig) {
    if previous.bounds_radius() != next.bounds_radius() {
        camera.frame_radius(next.bounds_radius());
    }
}

fn create_depth_texture(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_uniforms_layout() {
        // Must match the WGSL struct: mat4 + vec4 + vec2 + 2 f32 + 2 u32 + vec2<u32>.
        assert_eq!(std::mem::size_of::<RenderUniforms>(), 112);
        assert_eq!(std::mem::size_of::<RenderUniforms>() % 16, 0);
    }

    #[test]
    fn test_render_uniforms_from_params() {
        let params = RenderParams {
            view_proj: Mat4::IDENTITY,
            viewport: [640.0, 480.0],
            color: [0.1, 0.2, 0.3],
            line_intensity: 0.5,
            point_size: 2.6,
            max_jump: 0.35,
        };
        let uniforms = RenderUniforms::new(&params, 16, 32);
        assert_eq!(uniforms.color, [0.1, 0.2, 0.3, 0.5]);
        assert_eq!(uniforms.viewport, [640.0, 480.0]);
        assert_eq!(uniforms.tex_size, 16);
        assert_eq!(uniforms.history_length, 32);
        assert_eq!(uniforms.view_proj[0], [1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_camera_refits_when_cloud_extent_changes() {
        let small = ParticleConfig {
            radius: 2.0,
            ..Default::default()
        };
        let mut camera = Camera::new();
        camera.frame_radius(small.bounds_radius());
        camera.zoom(3.0);
        let zoomed = camera.distance;

        let recolored = ParticleConfig {
            color: [1.0, 0.0, 0.0],
            ..small.clone()
        };
        refit_camera(&mut camera, &small, &recolored);
        assert_eq!(camera.distance, zoomed);

        let larger = ParticleConfig {
            radius: 8.0,
            ..small.clone()
        };
        refit_camera(&mut camera, &small, &larger);
        assert_eq!(camera.distance, larger.bounds_radius() * 2.5);

        let wider = ParticleConfig {
            bounds_radius: Some(30.0),
            ..larger.clone()
        };
        refit_camera(&mut camera, &larger, &wider);
        assert_eq!(camera.distance, 75.0);
    }

    #[test]
    fn test_render_uniforms_wgsl_parses() {
        let shader = format!(
            "{RENDER_UNIFORMS_WGSL}\n@group(0) @binding(0) var<uniform> u: RenderUniforms;\n\
             @compute @workgroup_size(1) fn main() {{ let s = u.point_size; }}\n"
        );
        crate::shader_utils::validate_wgsl(&shader).expect("render uniforms should be valid WGSL");
    }
}
