//! History accumulation.
//!
//! The history atlas stacks the last `history_length` snapshots of the state
//! texture: slice 0 is the newest. Every frame the whole column of each
//! particle shifts down by one slice and slice 0 takes the current state.
//! When a particle has respawned since the previous frame its entire column
//! collapses to the fresh state so no trail segment joins the death point
//! to the spawn point.
//!
//! [`accumulate_texel`] is the per-texel contract of the compute pass in
//! [`crate::gpu::history_gpu`].

use glam::Vec4;

use crate::layout::{ParticleGrid, TexelCoord};

/// Life increase (between frames) treated as a respawn.
pub const LIFE_RESET_EPSILON: f32 = 1e-4;

/// Whether `current` is discontinuous with the previous head snapshot.
///
/// NaN distances never count as a jump.
pub fn is_discontinuity(current: Vec4, previous_head: Vec4, max_jump: f32) -> bool {
    let life_reset = current.w > previous_head.w + LIFE_RESET_EPSILON;
    let jump = current.truncate().distance(previous_head.truncate());
    life_reset || jump > max_jump
}

/// Value of one atlas texel after accumulation.
///
/// `previous_head` is slice 0 of the previous atlas for the same particle,
/// `previous_above` is slice `slice - 1` of the previous atlas (ignored for
/// slice 0).
pub fn accumulate_texel(
    current: Vec4,
    previous_head: Vec4,
    previous_above: Vec4,
    slice: u32,
    max_jump: f32,
) -> Vec4 {
    if slice == 0 || is_discontinuity(current, previous_head, max_jump) {
        current
    } else {
        previous_above
    }
}

/// Accumulate a whole atlas.
///
/// `history_prev` is row-major with `tex_size * history_length` rows, laid
/// out per [`ParticleGrid::atlas_index`].
pub fn accumulate(
    state_current: &[Vec4],
    history_prev: &[Vec4],
    grid: ParticleGrid,
    history_length: u32,
    max_jump: f32,
) -> Vec<Vec4> {
    let (width, height) = grid.atlas_extent(history_length);
    debug_assert_eq!(state_current.len(), grid.effective_count() as usize);
    debug_assert_eq!(history_prev.len(), (width * height) as usize);

    let mut next = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            let (texel, slice) = grid.split_atlas_texel(TexelCoord::new(x, y));
            let current = state_current[grid.linear_id(texel) as usize];
            let previous_head = history_prev[grid.atlas_index(texel, 0)];
            let previous_above = if slice > 0 {
                history_prev[grid.atlas_index(texel, slice - 1)]
            } else {
                previous_head
            };
            next.push(accumulate_texel(
                current,
                previous_head,
                previous_above,
                slice,
                max_jump,
            ));
        }
    }
    next
}

/// Read a particle's column (slice 0 first) out of an atlas.
pub fn column(atlas: &[Vec4], grid: ParticleGrid, texel: TexelCoord, history_length: u32) -> Vec<Vec4> {
    (0..history_length)
        .map(|slice| atlas[grid.atlas_index(texel, slice)])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX_JUMP: f32 = 0.5;

    fn grid() -> ParticleGrid {
        ParticleGrid::with_tex_size(2)
    }

    fn atlas_from_columns(grid: ParticleGrid, columns: &[Vec<Vec4>]) -> Vec<Vec4> {
        let history = columns[0].len() as u32;
        let mut atlas = vec![Vec4::ZERO; grid.effective_count() as usize * history as usize];
        for (id, col) in columns.iter().enumerate() {
            let texel = grid.texel(id as u32);
            for (slice, value) in col.iter().enumerate() {
                atlas[grid.atlas_index(texel, slice as u32)] = *value;
            }
        }
        atlas
    }

    #[test]
    fn test_continuous_motion_shifts_history() {
        let grid = grid();
        let columns: Vec<Vec<Vec4>> = (0..4)
            .map(|i| {
                (0..4)
                    .map(|s| Vec4::new(i as f32, s as f32 * 0.1, 0.0, 0.5 + s as f32 * 0.01))
                    .collect()
            })
            .collect();
        let prev = atlas_from_columns(grid, &columns);
        let current: Vec<Vec4> = (0..4)
            .map(|i| Vec4::new(i as f32, -0.1, 0.0, 0.49))
            .collect();

        let next = accumulate(&current, &prev, grid, 4, MAX_JUMP);

        for id in 0..4u32 {
            let texel = grid.texel(id);
            let col = column(&next, grid, texel, 4);
            assert_eq!(col[0], current[id as usize]);
            for slice in 1..4 {
                assert_eq!(col[slice], columns[id as usize][slice - 1]);
            }
        }
    }

    #[test]
    fn test_life_reset_collapses_column() {
        let grid = grid();
        let columns: Vec<Vec<Vec4>> = (0..4)
            .map(|_| (0..3).map(|s| Vec4::new(s as f32 * 0.1, 0.0, 0.0, 0.2)).collect())
            .collect();
        let prev = atlas_from_columns(grid, &columns);

        // Particle 2 respawned close to where it was, but its life went up.
        let mut current = vec![Vec4::new(-0.1, 0.0, 0.0, 0.19); 4];
        current[2] = Vec4::new(0.05, 0.0, 0.0, 1.0);

        let next = accumulate(&current, &prev, grid, 3, MAX_JUMP);

        let col = column(&next, grid, grid.texel(2), 3);
        assert!(col.iter().all(|v| *v == current[2]));

        let untouched = column(&next, grid, grid.texel(0), 3);
        assert_eq!(untouched[1], columns[0][0]);
    }

    #[test]
    fn test_large_jump_collapses_column() {
        let grid = grid();
        let columns: Vec<Vec<Vec4>> = (0..4)
            .map(|_| (0..5).map(|s| Vec4::new(0.0, s as f32 * 0.05, 0.0, 0.6)).collect())
            .collect();
        let prev = atlas_from_columns(grid, &columns);

        let mut current = vec![Vec4::new(0.0, -0.05, 0.0, 0.59); 4];
        current[1] = Vec4::new(3.0, 0.0, 0.0, 0.59);

        let next = accumulate(&current, &prev, grid, 5, MAX_JUMP);
        let col = column(&next, grid, grid.texel(1), 5);
        assert!(col.iter().all(|v| *v == current[1]));
    }

    #[test]
    fn test_zeroed_history_collapses_on_first_frame() {
        let grid = grid();
        let prev = vec![Vec4::ZERO; 4 * 3];
        let current = vec![Vec4::new(1.0, 1.0, 1.0, 0.3); 4];

        let next = accumulate(&current, &prev, grid, 3, MAX_JUMP);
        assert!(next.iter().all(|v| *v == current[0]));
    }

    #[test]
    fn test_nan_distance_is_not_a_jump() {
        let current = Vec4::new(f32::NAN, 0.0, 0.0, 0.5);
        let head = Vec4::new(0.0, 0.0, 0.0, 0.5);
        assert!(!is_discontinuity(current, head, MAX_JUMP));
    }
}
