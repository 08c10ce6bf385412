//! Flow-field simulation step.
//!
//! [`step_texel`] is the typed contract of the per-texel program generated in
//! [`crate::gpu::flow_gpu`]: decay life, advect through curl noise, and
//! respawn in the same step when the particle dies or leaves the bounds.
//! There is no cross-texel dependency.
//!
//! Respawn randomness comes from an integer hash of `(texel, seed, frame)`,
//! identical on host and device, so respawn outcomes are reproducible.

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::layout::{ParticleGrid, TexelCoord};
use crate::noise::curl_noise;

/// Vertical drift of the noise domain per second of simulation time.
pub const NOISE_TIME_DRIFT: f32 = 0.15;

/// Rate at which time is quantized into respawn frames.
pub const RESPAWN_FRAME_RATE: f32 = 60.0;

/// Smallest respawn distance as a fraction of the respawn radius.
pub const RESPAWN_MIN_FRACTION: f32 = 0.75;

/// Floor of the teleport-detection distance.
pub const MIN_MAX_JUMP: f32 = 0.35;

/// Teleport-detection distance as a fraction of the respawn radius.
pub const MAX_JUMP_FRACTION: f32 = 0.4;

/// Parameters of the flow field and particle life cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlowParams {
    pub seed: u32,
    /// Particles farther than this from the origin respawn.
    pub bounds_radius: f32,
    /// Respawned particles land at `[0.75, 1.0]` of this distance.
    pub respawn_radius: f32,
    /// Life lost per second.
    pub life_decay: f32,
    pub noise_scale: f32,
    pub noise_strength: f32,
    pub flow_speed: f32,
}

impl Default for FlowParams {
    fn default() -> Self {
        Self::for_radius(16.0)
    }
}

impl FlowParams {
    /// Defaults for a particle cloud seeded at `radius`.
    pub fn for_radius(radius: f32) -> Self {
        Self {
            seed: 0,
            bounds_radius: radius * 1.25,
            respawn_radius: radius,
            life_decay: 0.25,
            noise_scale: 0.65,
            noise_strength: 0.9,
            flow_speed: 0.45,
        }
    }

    /// Distance between consecutive snapshots treated as a teleport.
    pub fn max_jump(&self) -> f32 {
        max_jump_for(self.respawn_radius)
    }
}

/// Teleport-detection distance for a given respawn radius.
pub fn max_jump_for(respawn_radius: f32) -> f32 {
    (respawn_radius * MAX_JUMP_FRACTION).max(MIN_MAX_JUMP)
}

/// Per-frame inputs of one simulation step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepInput {
    /// Seconds since the previous step.
    pub delta: f32,
    /// Seconds since the system started.
    pub time: f32,
}

impl StepInput {
    pub fn new(delta: f32, time: f32) -> Self {
        Self { delta, time }
    }

    /// Time quantized into respawn frames.
    pub fn frame(&self) -> u32 {
        respawn_frame(self.time)
    }
}

/// `floor(time * 60)`, saturating at zero for negative or NaN time.
pub fn respawn_frame(time: f32) -> u32 {
    (time * RESPAWN_FRAME_RATE).floor() as u32
}

/// Integer avalanche hash. Must match `hash` in the generated WGSL.
pub fn hash(n: u32) -> u32 {
    let mut x = n;
    x ^= x >> 17;
    x = x.wrapping_mul(0xed5a_d4bb);
    x ^= x >> 11;
    x = x.wrapping_mul(0xac4c_1b51);
    x ^= x >> 15;
    x = x.wrapping_mul(0x3184_8bab);
    x ^= x >> 14;
    x
}

pub fn hash3(x: u32, y: u32, z: u32) -> u32 {
    hash(x.wrapping_add(hash(y.wrapping_add(hash(z)))))
}

/// Hash to a float in `[0, 1]`.
pub fn rand_unit(seed: u32) -> f32 {
    hash(seed) as f32 / 4_294_967_295.0
}

/// Where a respawning particle lands, before scaling by the respawn radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RespawnSample {
    /// Unit direction.
    pub direction: Vec3,
    /// In `[0.75, 1.0]`.
    pub radius_fraction: f32,
}

/// Deterministic respawn draw for one texel in one frame.
pub fn respawn_sample(texel: TexelCoord, seed: u32, frame: u32) -> RespawnSample {
    let h = hash3(texel.x, texel.y, seed.wrapping_add(hash(frame)));
    let a = rand_unit(h);
    let b = rand_unit(h.wrapping_add(1));
    let c = rand_unit(h.wrapping_add(2));

    let theta = a * std::f32::consts::TAU;
    let z = b * 2.0 - 1.0;
    let s = (1.0 - z * z).max(0.0).sqrt();

    RespawnSample {
        direction: Vec3::new(s * theta.cos(), z, s * theta.sin()),
        radius_fraction: (RESPAWN_MIN_FRACTION + (1.0 - RESPAWN_MIN_FRACTION) * c).min(1.0),
    }
}

/// Fresh state for a respawned particle: new position, full life.
pub fn respawn_state(texel: TexelCoord, seed: u32, frame: u32, respawn_radius: f32) -> Vec4 {
    let sample = respawn_sample(texel, seed, frame);
    (sample.direction * respawn_radius * sample.radius_fraction).extend(1.0)
}

/// Advance one particle. `state.xyz` is position, `state.w` is life.
pub fn step_texel(state: Vec4, texel: TexelCoord, input: &StepInput, params: &FlowParams) -> Vec4 {
    let life = (state.w - input.delta * params.life_decay).min(1.0);

    let position = state.truncate();
    let domain = position * params.noise_scale + Vec3::new(0.0, input.time * NOISE_TIME_DRIFT, 0.0);
    let flow = curl_noise(domain) * params.noise_strength;
    let position = position + flow * params.flow_speed * input.delta;

    // Written so NaN life or position also respawns.
    let alive = life > 0.0 && position.length() <= params.bounds_radius;
    if alive {
        position.extend(life)
    } else {
        respawn_state(texel, params.seed, input.frame(), params.respawn_radius)
    }
}

/// Advance every particle of a state texture laid out by `grid`.
pub fn step_state(
    state_in: &[Vec4],
    grid: ParticleGrid,
    input: &StepInput,
    params: &FlowParams,
) -> Vec<Vec4> {
    debug_assert_eq!(state_in.len(), grid.effective_count() as usize);
    grid.texels()
        .zip(state_in)
        .map(|(texel, state)| step_texel(*state, texel, input, params))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn params() -> FlowParams {
        FlowParams {
            seed: 42,
            bounds_radius: 10.0,
            respawn_radius: 8.0,
            ..FlowParams::for_radius(8.0)
        }
    }

    #[test]
    fn test_out_of_bounds_particle_respawns() {
        let state = Vec4::new(0.0, 0.0, 11.0, 0.5);
        let out = step_texel(state, TexelCoord::new(3, 4), &StepInput::new(0.016, 1.0), &params());

        assert_eq!(out.w, 1.0);
        let r = out.truncate().length();
        assert!(r <= 8.0 + 1e-4, "respawn distance {r}");
        assert!(r >= 0.75 * 8.0 - 1e-4, "respawn distance {r}");
    }

    #[test]
    fn test_dead_particle_respawns() {
        let state = Vec4::new(1.0, 2.0, 3.0, 0.001);
        let out = step_texel(state, TexelCoord::new(0, 0), &StepInput::new(0.1, 0.5), &params());
        assert_eq!(out.w, 1.0);
        let r = out.truncate().length();
        assert!((6.0 - 1e-4..=8.0 + 1e-4).contains(&r));
    }

    #[test]
    fn test_zero_delta_is_identity() {
        let p = params();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..500 {
            let dir = Vec3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            )
            .normalize_or_zero();
            let state = (dir * rng.gen_range(0.0..p.bounds_radius)).extend(rng.gen_range(0.01..=1.0));
            let out = step_texel(state, TexelCoord::new(1, 1), &StepInput::new(0.0, 3.7), &p);
            assert_eq!(out, state);
        }
    }

    #[test]
    fn test_life_decays_without_respawn() {
        let state = Vec4::new(1.0, 0.0, 0.0, 0.8);
        let p = params();
        let out = step_texel(state, TexelCoord::new(0, 0), &StepInput::new(0.2, 0.0), &p);
        assert!((out.w - (0.8 - 0.2 * p.life_decay)).abs() < 1e-6);
        let moved = (out.truncate() - state.truncate()).length();
        let expected = p.noise_strength * p.flow_speed * 0.2;
        assert!(moved <= expected + 1e-5);
    }

    #[test]
    fn test_nan_state_respawns() {
        let state = Vec4::new(f32::NAN, 0.0, 0.0, 0.5);
        let out = step_texel(state, TexelCoord::new(2, 2), &StepInput::new(0.016, 0.0), &params());
        assert!(out.is_finite());
        assert_eq!(out.w, 1.0);
    }

    #[test]
    fn test_life_stays_in_unit_interval() {
        let p = params();
        let grid = ParticleGrid::with_tex_size(16);
        let mut rng = StdRng::seed_from_u64(3);
        let mut state: Vec<Vec4> = grid
            .texels()
            .map(|_| {
                Vec3::new(
                    rng.gen_range(-12.0..12.0),
                    rng.gen_range(-12.0..12.0),
                    rng.gen_range(-12.0..12.0),
                )
                .extend(rng.gen_range(0.0..=1.0))
            })
            .collect();

        let mut time = 0.0;
        for _ in 0..120 {
            let dt = rng.gen_range(0.0..0.25);
            time += dt;
            state = step_state(&state, grid, &StepInput::new(dt, time), &p);
            for s in &state {
                assert!((0.0..=1.0).contains(&s.w), "life {}", s.w);
                assert!(s.w > 0.0);
                assert!(s.truncate().length() <= p.bounds_radius + 1e-4);
            }
        }
    }

    #[test]
    fn test_respawn_sample_is_deterministic() {
        for (x, y, seed, frame) in [(0, 0, 0, 0), (5, 9, 42, 1234), (255, 1, 7, 99_999)] {
            let texel = TexelCoord::new(x, y);
            let a = respawn_sample(texel, seed, frame);
            let b = respawn_sample(texel, seed, frame);
            assert_eq!(a, b);
            assert!((a.direction.length() - 1.0).abs() < 1e-5);
            assert!((RESPAWN_MIN_FRACTION..=1.0).contains(&a.radius_fraction));
        }
    }

    #[test]
    fn test_respawn_sample_varies_with_inputs() {
        let base = respawn_sample(TexelCoord::new(1, 1), 1, 10);
        assert_ne!(base, respawn_sample(TexelCoord::new(2, 1), 1, 10));
        assert_ne!(base, respawn_sample(TexelCoord::new(1, 1), 2, 10));
        assert_ne!(base, respawn_sample(TexelCoord::new(1, 1), 1, 11));
    }

    #[test]
    fn test_respawn_frame_quantization() {
        assert_eq!(respawn_frame(0.0), 0);
        assert_eq!(respawn_frame(1.0), 60);
        assert_eq!(respawn_frame(0.0166), 0);
        assert_eq!(respawn_frame(-3.0), 0);
        assert_eq!(StepInput::new(0.0, 2.5).frame(), 150);
    }

    #[test]
    fn test_max_jump_scales_with_respawn_radius() {
        assert_eq!(max_jump_for(0.1), MIN_MAX_JUMP);
        assert!((max_jump_for(10.0) - 4.0).abs() < 1e-6);
        assert_eq!(params().max_jump(), max_jump_for(8.0));
    }

    #[test]
    fn test_hash_known_values() {
        assert_eq!(hash(0), 0);
        assert_ne!(hash(1), hash(2));
        assert_eq!(hash3(1, 2, 3), hash(1u32.wrapping_add(hash(2u32.wrapping_add(hash(3))))));
    }
}
