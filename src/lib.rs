//! # flowtrail
//!
//! GPU-resident particle simulation with motion trails.
//!
//! Particle state lives entirely in texture memory: one `Rgba32Float` texel
//! per particle (xyz position, w life). Every frame a compute pass advects
//! each particle through divergence-free curl noise, decays its life and
//! respawns it when it dies or leaves the bounds. A second pass stacks the
//! last few snapshots into a history atlas, from which trails are drawn as
//! line segments whose positions are looked up in the vertex stage. Nothing
//! is ever read back to the host.
//!
//! ## Quick Start
//!
//! ```ignore
//! use flowtrail::prelude::*;
//!
//! fn main() -> Result<(), SimulationError> {
//!     FlowSimulation::new()
//!         .with_particle_count(40_000)
//!         .with_radius(10.0)
//!         .with_quality(Quality::High)
//!         .run()
//! }
//! ```
//!
//! ## Layout
//!
//! Every component shares one indexing scheme, defined in [`layout`]:
//! particle `(x, y)` has linear id `y * tex_size + x`, and slice `k` of its
//! history sits at atlas texel `(x, k * tex_size + y)`, slice 0 newest.
//!
//! ## Frame
//!
//! [`FrameDriver`] runs, in order: simulate, swap state, accumulate history,
//! swap history, update render uniforms, draw. The history stages are skipped
//! when the LOD preset disables trails.
//!
//! ## Host kernels
//!
//! [`flow::step_texel`], [`history::accumulate_texel`] and the geometry
//! builders in [`trail`] are the per-texel contracts the generated WGSL
//! implements. They are plain functions over explicit parameter structs,
//! used by tests and benches.
//!
//! ## Levels of detail
//!
//! | Tier | Count | History | Trails |
//! |------|-------|---------|--------|
//! | [`Quality::Low`] | 35% | 24 | off |
//! | [`Quality::Mid`] | 60% | 32 | on |
//! | [`Quality::High`] | 100% | 48 | on |
//!
//! Mobile devices get smaller budgets at every tier; see [`lod::select_preset`].

pub mod config;
pub mod driver;
pub mod error;
pub mod flow;
pub mod gpu;
pub mod history;
pub mod layout;
pub mod lod;
pub mod noise;
pub mod seed;
pub mod shader_utils;
mod simulation;
pub mod time;
pub mod trail;

pub use config::{ParticleConfig, ResolvedConfig};
pub use driver::{FrameBackend, FrameDriver, FrameStage};
pub use error::{ConfigError, GpuError, SimulationError};
pub use flow::{FlowParams, StepInput};
pub use glam::{Vec3, Vec4};
pub use gpu::{ParticleSystemGpu, PingPong};
pub use layout::{ParticleGrid, TexelCoord};
pub use lod::{DeviceProfile, LodPreset, Quality};
pub use simulation::FlowSimulation;
pub use trail::{TrailGeometry, TrailVertex};

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use flowtrail::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::ParticleConfig;
    pub use crate::error::SimulationError;
    pub use crate::lod::{DeviceProfile, Quality};
    pub use crate::simulation::FlowSimulation;
    pub use crate::time::FrameClock;
    pub use crate::{Vec3, Vec4};
}
