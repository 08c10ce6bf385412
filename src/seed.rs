//! Initial particle state.
//!
//! The seed texture is the state "before frame 0". It is uploaded once as the
//! current state buffer and never stepped in place.

use glam::{Vec3, Vec4};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::layout::ParticleGrid;

/// Inner edge of the seeded shell as a fraction of the radius.
pub const SHELL_INNER_FRACTION: f32 = 0.7;

/// Texel data for a `tex_size × tex_size` state texture, row-major.
///
/// Positions are spread over a spherical shell between `0.7·radius` and
/// `radius`; life is uniform in `[0, 1]`. The same `seed` always gives the
/// same texture.
pub fn initialize(tex_size: u32, radius: f32, seed: u64) -> Vec<Vec4> {
    let grid = ParticleGrid::with_tex_size(tex_size);
    let mut rng = StdRng::seed_from_u64(seed);

    (0..grid.effective_count())
        .map(|_| {
            let theta = rng.gen_range(0.0..std::f32::consts::TAU);
            let phi = (2.0 * rng.gen::<f32>() - 1.0).clamp(-1.0, 1.0).acos();
            let r = radius * rng.gen_range(SHELL_INNER_FRACTION..=1.0);
            let life = rng.gen_range(0.0..=1.0);

            Vec3::new(
                r * phi.sin() * theta.cos(),
                r * phi.cos(),
                r * phi.sin() * theta.sin(),
            )
            .extend(life)
        })
        .collect()
}
