//! Trail and point-cloud geometry.
//!
//! Vertices carry only *where to look* in the history atlas: a particle UV and
//! a slice index. World positions are resolved in the vertex shader. The
//! builders below subsample particles (`particle_step`) and history segments
//! (`segment_step`) so lower LOD tiers draw fewer lines.

use bytemuck::{Pod, Zeroable};

use crate::layout::{ParticleGrid, TexelCoord};

/// Exponent of the age fade along a trail.
pub const TRAIL_FADE_EXPONENT: f32 = 1.6;

/// Upper bound on any trail fragment's opacity.
pub const MAX_TRAIL_ALPHA: f32 = 0.9;

/// One endpoint of a trail line segment.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct TrailVertex {
    /// Texel-centre UV of the particle.
    pub uv: [f32; 2],
    /// History slice; 0 is the newest snapshot.
    pub slice: f32,
}

impl TrailVertex {
    pub const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<TrailVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Line-list geometry for the trails: two vertices per segment.
#[derive(Debug, Clone, Default)]
pub struct TrailGeometry {
    pub vertices: Vec<TrailVertex>,
}

impl TrailGeometry {
    pub fn segment_count(&self) -> usize {
        self.vertices.len() / 2
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

/// Replace a non-finite coordinate with zero.
#[inline]
pub fn sanitize(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Build the strided trail line list.
///
/// Emits segments `(k, k + 1)` for `k = 0, segment_step, 2·segment_step, …`
/// below `history_length - 1`, for every `particle_step`-th row and column.
/// Steps of zero are treated as one.
pub fn build_trail_geometry(
    tex_size: u32,
    history_length: u32,
    particle_step: u32,
    segment_step: u32,
) -> TrailGeometry {
    let grid = ParticleGrid::with_tex_size(tex_size);
    let particle_step = particle_step.max(1) as usize;
    let segment_step = segment_step.max(1) as usize;
    let segments_per_trail = history_length.saturating_sub(1).max(1);

    let rows = (grid.tex_size() as usize).div_ceil(particle_step);
    let per_trail = (segments_per_trail as usize).div_ceil(segment_step);
    let mut vertices = Vec::with_capacity(rows * rows * per_trail * 2);

    for y in (0..grid.tex_size()).step_by(particle_step) {
        for x in (0..grid.tex_size()).step_by(particle_step) {
            let [u, v] = grid.uv(TexelCoord::new(x, y));
            let uv = [sanitize(u), sanitize(v)];
            for k in (0..segments_per_trail).step_by(segment_step) {
                vertices.push(TrailVertex { uv, slice: k as f32 });
                vertices.push(TrailVertex {
                    uv,
                    slice: (k + 1) as f32,
                });
            }
        }
    }

    TrailGeometry { vertices }
}

/// Opacity of a trail fragment.
///
/// `age` runs from 0 (newest) to 1 (oldest). Segments whose endpoints are at
/// least `max_jump` apart contribute nothing.
pub fn segment_alpha(age: f32, segment_length: f32, max_jump: f32, intensity: f32) -> f32 {
    let length_factor = if max_jump > 0.0 {
        (1.0 - segment_length / max_jump).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let fade = (1.0 - age.clamp(0.0, 1.0)).powf(TRAIL_FADE_EXPONENT);
    let alpha = fade * intensity * length_factor;
    if alpha.is_finite() {
        alpha.clamp(0.0, MAX_TRAIL_ALPHA)
    } else {
        0.0
    }
}

/// Age of a history slice, `slice / (history_length - 1)`.
pub fn slice_age(slice: f32, history_length: u32) -> f32 {
    slice / (history_length as f32 - 1.0).max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_density_geometry() {
        let geo = build_trail_geometry(4, 8, 1, 1);
        // 16 particles, 7 segments each
        assert_eq!(geo.segment_count(), 16 * 7);
        assert_eq!(geo.vertex_count(), 16 * 7 * 2);

        for pair in geo.vertices.chunks(2) {
            assert_eq!(pair[0].uv, pair[1].uv);
            assert_eq!(pair[1].slice, pair[0].slice + 1.0);
            assert!(pair[1].slice <= 7.0);
        }
    }

    #[test]
    fn test_strided_geometry() {
        let geo = build_trail_geometry(5, 9, 2, 3);
        // rows/cols 0, 2, 4 -> 9 particles; segments k = 0, 3, 6 -> 3 each
        assert_eq!(geo.segment_count(), 9 * 3);
        let slices: Vec<f32> = geo.vertices.iter().take(6).map(|v| v.slice).collect();
        assert_eq!(slices, vec![0.0, 1.0, 3.0, 4.0, 6.0, 7.0]);
        assert_eq!(geo.vertices[0].uv, [0.1, 0.1]);
    }

    #[test]
    fn test_zero_steps_are_treated_as_one() {
        assert_eq!(
            build_trail_geometry(3, 4, 0, 0).vertices,
            build_trail_geometry(3, 4, 1, 1).vertices
        );
    }

    #[test]
    fn test_vertices_are_finite() {
        let geo = build_trail_geometry(37, 12, 1, 1);
        assert!(geo
            .vertices
            .iter()
            .all(|v| v.uv[0].is_finite() && v.uv[1].is_finite() && v.slice.is_finite()));
        assert_eq!(sanitize(f32::NAN), 0.0);
        assert_eq!(sanitize(f32::INFINITY), 0.0);
        assert_eq!(sanitize(0.25), 0.25);
    }

    #[test]
    fn test_long_segment_is_discarded() {
        assert_eq!(segment_alpha(0.0, 0.5, 0.5, 1.0), 0.0);
        assert_eq!(segment_alpha(0.0, 3.0, 0.5, 1.0), 0.0);
        assert!(segment_alpha(0.0, 0.1, 0.5, 1.0) > 0.0);
    }

    #[test]
    fn test_alpha_fades_with_age_and_is_capped() {
        let young = segment_alpha(0.1, 0.0, 1.0, 1.0);
        let old = segment_alpha(0.9, 0.0, 1.0, 1.0);
        assert!(young > old);
        assert_eq!(segment_alpha(0.0, 0.0, 1.0, 10.0), MAX_TRAIL_ALPHA);
        assert_eq!(segment_alpha(1.0, 0.0, 1.0, 1.0), 0.0);
        assert_eq!(segment_alpha(0.0, f32::NAN, 1.0, 1.0), 0.0);
    }

    #[test]
    fn test_slice_age() {
        assert_eq!(slice_age(0.0, 32), 0.0);
        assert_eq!(slice_age(31.0, 32), 1.0);
        assert_eq!(slice_age(1.0, 1), 1.0);
    }
}
