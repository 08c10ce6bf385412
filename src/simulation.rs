//! Viewer builder and runner.

use std::sync::Arc;

use log::{error, info, warn};
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::config::ParticleConfig;
use crate::error::SimulationError;
use crate::gpu::GpuState;
use crate::lod::{DeviceProfile, Quality};

/// Frames between window title FPS refreshes.
const TITLE_REFRESH_FRAMES: u64 = 30;

/// A flow-field particle viewer.
///
/// Use method chaining to configure, then call `.run()` to open a window.
///
/// Controls: drag to orbit, scroll to zoom, `Space` to pause, `R` to reseed,
/// `1`/`2`/`3` to switch between low, mid and high quality.
pub struct FlowSimulation {
    config: ParticleConfig,
    device: Option<DeviceProfile>,
    title: String,
}

impl FlowSimulation {
    pub fn new() -> Self {
        Self::from_config(ParticleConfig::default())
    }

    /// Start from an existing configuration, e.g. one loaded from JSON.
    pub fn from_config(config: ParticleConfig) -> Self {
        Self {
            config,
            device: None,
            title: "flowtrail".to_string(),
        }
    }

    /// Requested particle count; the effective count is the next square.
    pub fn with_particle_count(mut self, count: u32) -> Self {
        self.config.count = count;
        self
    }

    /// Radius of the seeded shell. Bounds and respawn radii derive from it
    /// unless set explicitly.
    pub fn with_radius(mut self, radius: f32) -> Self {
        self.config.radius = radius;
        self
    }

    pub fn with_color(mut self, color: [f32; 3]) -> Self {
        self.config.color = color;
        self
    }

    pub fn with_seed(mut self, seed: u32) -> Self {
        self.config.seed = seed;
        self
    }

    /// Spatial frequency and strength of the curl noise.
    pub fn with_noise(mut self, scale: f32, strength: f32) -> Self {
        self.config.noise_scale = scale;
        self.config.noise_strength = strength;
        self
    }

    pub fn with_flow_speed(mut self, speed: f32) -> Self {
        self.config.flow_speed = speed;
        self
    }

    /// Life lost per second.
    pub fn with_life_decay(mut self, decay: f32) -> Self {
        self.config.life_decay = decay;
        self
    }

    pub fn with_bounds_radius(mut self, radius: f32) -> Self {
        self.config.bounds_radius = Some(radius);
        self
    }

    pub fn with_respawn_radius(mut self, radius: f32) -> Self {
        self.config.respawn_radius = Some(radius);
        self
    }

    pub fn with_line_intensity(mut self, intensity: f32) -> Self {
        self.config.line_intensity = intensity;
        self
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.config.quality = quality;
        self
    }

    /// Fix the device profile instead of deriving it from the window's scale factor.
    pub fn with_device_profile(mut self, device: DeviceProfile) -> Self {
        self.device = Some(device);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn config(&self) -> &ParticleConfig {
        &self.config
    }

    /// Open the window and run until it is closed.
    pub fn run(self) -> Result<(), SimulationError> {
        self.config.validate()?;

        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut app = App::new(self);
        event_loop.run_app(&mut app)?;

        match app.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Default for FlowSimulation {
    fn default() -> Self {
        Self::new()
    }
}

struct App {
    settings: FlowSimulation,
    window: Option<Arc<Window>>,
    gpu_state: Option<GpuState>,
    mouse_pressed: bool,
    last_mouse_pos: Option<(f64, f64)>,
    error: Option<SimulationError>,
}

impl App {
    fn new(settings: FlowSimulation) -> Self {
        Self {
            settings,
            window: None,
            gpu_state: None,
            mouse_pressed: false,
            last_mouse_pos: None,
            error: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<(), SimulationError> {
        let window_attrs = Window::default_attributes()
            .with_title(self.settings.title.clone())
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));

        let window = Arc::new(event_loop.create_window(window_attrs)?);
        self.window = Some(window.clone());

        let device = self
            .settings
            .device
            .unwrap_or_else(|| DeviceProfile::new(window.scale_factor() as f32, false));
        self.settings.config.device = device;

        let gpu_state = pollster::block_on(GpuState::new(window, &self.settings.config))?;
        self.gpu_state = Some(gpu_state);
        Ok(())
    }

    fn set_quality(&mut self, quality: Quality) {
        if self.settings.config.quality == quality {
            return;
        }
        info!("Switching to {:?} quality", quality);
        self.settings.config.quality = quality;
        if let Some(gpu_state) = &mut self.gpu_state {
            gpu_state.reconfigure(&self.settings.config);
        }
    }

    fn handle_key(&mut self, event: &KeyEvent) {
        if event.state != ElementState::Pressed || event.repeat {
            return;
        }
        match event.physical_key {
            PhysicalKey::Code(KeyCode::Space) => {
                if let Some(gpu_state) = &mut self.gpu_state {
                    gpu_state.driver_mut().clock_mut().toggle_pause();
                }
            }
            PhysicalKey::Code(KeyCode::KeyR) => {
                self.settings.config.seed = self.settings.config.seed.wrapping_add(1);
                info!("Reseeding with seed {}", self.settings.config.seed);
                if let Some(gpu_state) = &mut self.gpu_state {
                    gpu_state.reconfigure(&self.settings.config);
                }
            }
            PhysicalKey::Code(KeyCode::Digit1) => self.set_quality(Quality::Low),
            PhysicalKey::Code(KeyCode::Digit2) => self.set_quality(Quality::Mid),
            PhysicalKey::Code(KeyCode::Digit3) => self.set_quality(Quality::High),
            _ => {}
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.init(event_loop) {
                error!("Failed to start viewer: {}", e);
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                if let Some(gpu_state) = &mut self.gpu_state {
                    gpu_state.resize(physical_size);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(&event),
            WindowEvent::MouseInput { state, button, .. } => {
                if button == MouseButton::Left {
                    self.mouse_pressed = state == ElementState::Pressed;
                    if !self.mouse_pressed {
                        self.last_mouse_pos = None;
                    }
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                if self.mouse_pressed {
                    if let Some((last_x, last_y)) = self.last_mouse_pos {
                        if let Some(gpu_state) = &mut self.gpu_state {
                            gpu_state
                                .camera
                                .orbit((position.x - last_x) as f32, (position.y - last_y) as f32);
                        }
                    }
                    self.last_mouse_pos = Some((position.x, position.y));
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 * 0.1,
                };
                if let Some(gpu_state) = &mut self.gpu_state {
                    gpu_state.camera.zoom(scroll);
                }
            }
            WindowEvent::RedrawRequested => {
                if let Some(gpu_state) = &mut self.gpu_state {
                    match gpu_state.render() {
                        Ok(_) => {}
                        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                            warn!("Surface lost, reconfiguring");
                            gpu_state.resize(winit::dpi::PhysicalSize {
                                width: gpu_state.config.width,
                                height: gpu_state.config.height,
                            })
                        }
                        Err(wgpu::SurfaceError::OutOfMemory) => {
                            error!("Out of GPU memory");
                            event_loop.exit();
                        }
                        Err(e) => warn!("Render error: {:?}", e),
                    }
                }
                if let Some(window) = &self.window {
                    if let Some(gpu_state) = &self.gpu_state {
                        let clock = gpu_state.driver().clock();
                        if clock.frame() % TITLE_REFRESH_FRAMES == 0 {
                            window.set_title(&format!("{} | {:.0} fps", self.settings.title, clock.fps()));
                        }
                    }
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_config() {
        let sim = FlowSimulation::new()
            .with_particle_count(256)
            .with_radius(2.0)
            .with_seed(9)
            .with_noise(1.2, 0.5)
            .with_flow_speed(0.3)
            .with_life_decay(0.1)
            .with_respawn_radius(1.5)
            .with_line_intensity(0.8)
            .with_quality(Quality::Mid);

        let config = sim.config();
        assert_eq!(config.count, 256);
        assert_eq!(config.radius, 2.0);
        assert_eq!(config.seed, 9);
        assert_eq!((config.noise_scale, config.noise_strength), (1.2, 0.5));
        assert_eq!(config.flow_speed, 0.3);
        assert_eq!(config.life_decay, 0.1);
        assert_eq!(config.respawn_radius(), 1.5);
        assert_eq!(config.bounds_radius(), 2.5);
        assert_eq!(config.line_intensity, 0.8);
        assert_eq!(config.quality, Quality::Mid);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config_is_rejected_before_window() {
        let result = FlowSimulation::new().with_particle_count(0).run();
        assert!(matches!(result, Err(SimulationError::Config(_))));
    }
}
