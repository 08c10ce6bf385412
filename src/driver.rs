//! Per-frame orchestration.
//!
//! A frame runs a fixed sequence of [`FrameStage`]s against a
//! [`FrameBackend`]. The backend owns the double-buffered resources; the
//! driver only decides the order and derives the parameters each stage
//! needs from the resolved configuration and the [`FrameClock`].
//!
//! ```text
//! Simulate → SwapState → AccumulateHistory → SwapHistory → UpdateRenderUniforms → Draw
//! ```
//!
//! When trails are disabled the two history stages are skipped and only the
//! point cloud is drawn.

use glam::Mat4;

use crate::config::ResolvedConfig;
use crate::flow::{FlowParams, StepInput};
use crate::time::{FrameClock, FrameTick};

/// One step of a frame, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameStage {
    Simulate,
    SwapState,
    AccumulateHistory,
    SwapHistory,
    UpdateRenderUniforms,
    Draw,
}

const FULL_SCHEDULE: [FrameStage; 6] = [
    FrameStage::Simulate,
    FrameStage::SwapState,
    FrameStage::AccumulateHistory,
    FrameStage::SwapHistory,
    FrameStage::UpdateRenderUniforms,
    FrameStage::Draw,
];

const POINTS_ONLY_SCHEDULE: [FrameStage; 4] = [
    FrameStage::Simulate,
    FrameStage::SwapState,
    FrameStage::UpdateRenderUniforms,
    FrameStage::Draw,
];

impl FrameStage {
    /// Stages run each frame, in order.
    pub fn schedule(trails_enabled: bool) -> &'static [FrameStage] {
        if trails_enabled {
            &FULL_SCHEDULE
        } else {
            &POINTS_ONLY_SCHEDULE
        }
    }
}

/// Camera-dependent inputs of the render stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewParams {
    pub view_proj: Mat4,
    /// Render target size in pixels.
    pub viewport: [f32; 2],
}

impl Default for ViewParams {
    fn default() -> Self {
        Self {
            view_proj: Mat4::IDENTITY,
            viewport: [1.0, 1.0],
        }
    }
}

/// Everything the draw calls read from uniforms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderParams {
    pub view_proj: Mat4,
    pub viewport: [f32; 2],
    pub color: [f32; 3],
    pub line_intensity: f32,
    /// Point sprite diameter in pixels.
    pub point_size: f32,
    pub max_jump: f32,
}

/// What the draw stage should submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawList {
    pub points: bool,
    pub trails: bool,
}

/// The resources a frame runs against.
///
/// Implementations own both ping-pong pairs. `simulate` reads the current
/// state and writes the other slot; `accumulate_history` reads the current
/// state and current atlas and writes the other atlas slot. Neither may
/// alias its write target as a read source.
pub trait FrameBackend {
    fn simulate(&mut self, step: &StepInput, flow: &FlowParams);
    fn swap_state(&mut self);
    fn accumulate_history(&mut self, max_jump: f32);
    fn swap_history(&mut self);
    fn update_render(&mut self, params: &RenderParams);
    fn draw(&mut self, list: DrawList);
}

/// Runs frames in order against a [`FrameBackend`].
#[derive(Debug)]
pub struct FrameDriver {
    config: ResolvedConfig,
    clock: FrameClock,
}

impl FrameDriver {
    pub fn new(config: ResolvedConfig) -> Self {
        Self {
            config,
            clock: FrameClock::new(),
        }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Replace the configuration used for subsequent frames.
    pub fn set_config(&mut self, config: ResolvedConfig) {
        self.config = config;
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut FrameClock {
        &mut self.clock
    }

    pub fn schedule(&self) -> &'static [FrameStage] {
        FrameStage::schedule(self.config.trails_enabled())
    }

    /// Uniform values for the render stage.
    pub fn render_params(&self, view: &ViewParams) -> RenderParams {
        RenderParams {
            view_proj: view.view_proj,
            viewport: view.viewport,
            color: self.config.color,
            line_intensity: self.config.line_intensity,
            point_size: self.config.preset.point_size,
            max_jump: self.config.max_jump(),
        }
    }

    /// Tick the clock and run one frame.
    pub fn run_frame<B: FrameBackend>(&mut self, backend: &mut B, view: &ViewParams) -> FrameTick {
        let tick = self.clock.tick();
        self.run_tick(backend, tick, view);
        tick
    }

    /// Run one frame with explicit timing.
    pub fn run_tick<B: FrameBackend>(&self, backend: &mut B, tick: FrameTick, view: &ViewParams) {
        let step = StepInput::new(tick.delta, tick.time);
        let trails = self.config.trails_enabled();

        for stage in self.schedule() {
            match stage {
                FrameStage::Simulate => backend.simulate(&step, &self.config.flow),
                FrameStage::SwapState => backend.swap_state(),
                FrameStage::AccumulateHistory => backend.accumulate_history(self.config.max_jump()),
                FrameStage::SwapHistory => backend.swap_history(),
                FrameStage::UpdateRenderUniforms => backend.update_render(&self.render_params(view)),
                FrameStage::Draw => backend.draw(DrawList {
                    points: true,
                    trails,
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParticleConfig;
    use crate::lod::Quality;

    #[derive(Default)]
    struct Recorder {
        stages: Vec<FrameStage>,
        steps: Vec<StepInput>,
        max_jumps: Vec<f32>,
        render: Option<RenderParams>,
        draws: Vec<DrawList>,
    }

    impl FrameBackend for Recorder {
        fn simulate(&mut self, step: &StepInput, _flow: &FlowParams) {
            self.stages.push(FrameStage::Simulate);
            self.steps.push(*step);
        }

        fn swap_state(&mut self) {
            self.stages.push(FrameStage::SwapState);
        }

        fn accumulate_history(&mut self, max_jump: f32) {
            self.stages.push(FrameStage::AccumulateHistory);
            self.max_jumps.push(max_jump);
        }

        fn swap_history(&mut self) {
            self.stages.push(FrameStage::SwapHistory);
        }

        fn update_render(&mut self, params: &RenderParams) {
            self.stages.push(FrameStage::UpdateRenderUniforms);
            self.render = Some(*params);
        }

        fn draw(&mut self, list: DrawList) {
            self.stages.push(FrameStage::Draw);
            self.draws.push(list);
        }
    }

    fn driver(quality: Quality) -> FrameDriver {
        let config = ParticleConfig {
            count: 64,
            radius: 2.0,
            quality,
            ..Default::default()
        };
        FrameDriver::new(config.resolve(8192))
    }

    #[test]
    fn test_stage_order_with_trails() {
        let driver = driver(Quality::High);
        let mut backend = Recorder::default();
        let tick = FrameTick {
            time: 0.5,
            delta: 0.016,
            frame: 1,
        };
        driver.run_tick(&mut backend, tick, &ViewParams::default());

        assert_eq!(backend.stages, FULL_SCHEDULE.to_vec());
        assert_eq!(backend.steps, vec![StepInput::new(0.016, 0.5)]);
        assert_eq!(backend.max_jumps, vec![0.8]);
        assert_eq!(backend.render.map(|r| r.max_jump), Some(0.8));
        assert_eq!(
            backend.draws,
            vec![DrawList {
                points: true,
                trails: true
            }]
        );
    }

    #[test]
    fn test_trails_disabled_skips_history() {
        let driver = driver(Quality::Low);
        let mut backend = Recorder::default();
        driver.run_tick(
            &mut backend,
            FrameTick {
                time: 0.0,
                delta: 0.0,
                frame: 1,
            },
            &ViewParams::default(),
        );

        assert_eq!(backend.stages, POINTS_ONLY_SCHEDULE.to_vec());
        assert!(backend.max_jumps.is_empty());
        assert!(!backend.draws[0].trails);
        assert!(backend.draws[0].points);
    }

    #[test]
    fn test_render_params_follow_config() {
        let driver = driver(Quality::Mid);
        let view = ViewParams {
            view_proj: Mat4::from_scale(glam::Vec3::splat(2.0)),
            viewport: [800.0, 600.0],
        };
        let params = driver.render_params(&view);
        assert_eq!(params.view_proj, view.view_proj);
        assert_eq!(params.viewport, [800.0, 600.0]);
        assert_eq!(params.point_size, driver.config().preset.point_size);
        assert_eq!(params.max_jump, driver.config().max_jump());
        assert_eq!(params.color, driver.config().color);
    }

    #[test]
    fn test_run_frame_ticks_clock() {
        let mut driver = driver(Quality::High);
        driver.clock_mut().set_fixed_delta(Some(0.02));
        let mut backend = Recorder::default();

        driver.run_frame(&mut backend, &ViewParams::default());
        let tick = driver.run_frame(&mut backend, &ViewParams::default());

        assert_eq!(tick.frame, 2);
        assert!((tick.time - 0.04).abs() < 1e-6);
        assert_eq!(backend.steps.len(), 2);
        assert!((backend.steps[1].time - 0.04).abs() < 1e-6);
    }

    #[test]
    fn test_set_config_changes_schedule() {
        let mut driver = driver(Quality::High);
        assert_eq!(driver.schedule().len(), 6);
        driver.set_config(
            ParticleConfig {
                quality: Quality::Low,
                ..Default::default()
            }
            .resolve(8192),
        );
        assert_eq!(driver.schedule().len(), 4);
    }
}
