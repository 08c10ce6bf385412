//! Texel ⇄ particle indexing.
//!
//! A particle has no host-side object. It is identified solely by the texel
//! it occupies in a square state texture of side `tex_size`. Every module
//! that needs to go between "particle" and "pixel" does it through this one
//! scheme:
//!
//! - linear particle id: row-major, `id = y * tex_size + x`
//! - texel-centre UV: `((x + 0.5) / tex_size, (y + 0.5) / tex_size)`
//! - history atlas texel for `(x, y, slice)`: `(x, slice * tex_size + y)`,
//!   slice 0 being the most recent snapshot
//!
//! The generated WGSL in [`crate::gpu`] uses the same formulas.

/// Integer coordinate of one texel (one particle) in the state texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TexelCoord {
    pub x: u32,
    pub y: u32,
}

impl TexelCoord {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Side length of the state texture needed to hold `count` particles.
///
/// `count` of zero is treated as one so the texture is never empty.
pub fn tex_size_for(count: u32) -> u32 {
    let count = count.max(1) as u64;
    let mut side = (count as f64).sqrt().ceil() as u64;
    // Guard against float rounding on both sides of a perfect square.
    while side * side < count {
        side += 1;
    }
    while side > 1 && (side - 1) * (side - 1) >= count {
        side -= 1;
    }
    side as u32
}

/// The square grid of particles backing a state texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticleGrid {
    tex_size: u32,
}

impl ParticleGrid {
    /// Grid large enough for `requested_count` particles.
    pub fn for_count(requested_count: u32) -> Self {
        Self {
            tex_size: tex_size_for(requested_count),
        }
    }

    /// Grid with an explicit side length (at least 1).
    pub fn with_tex_size(tex_size: u32) -> Self {
        Self {
            tex_size: tex_size.max(1),
        }
    }

    #[inline]
    pub fn tex_size(&self) -> u32 {
        self.tex_size
    }

    /// Number of simulated particles, `tex_size²`. Always ≥ the requested count.
    #[inline]
    pub fn effective_count(&self) -> u32 {
        self.tex_size * self.tex_size
    }

    #[inline]
    pub fn linear_id(&self, texel: TexelCoord) -> u32 {
        texel.y * self.tex_size + texel.x
    }

    #[inline]
    pub fn texel(&self, linear_id: u32) -> TexelCoord {
        TexelCoord::new(linear_id % self.tex_size, linear_id / self.tex_size)
    }

    /// Texel-centre UV of a particle.
    #[inline]
    pub fn uv(&self, texel: TexelCoord) -> [f32; 2] {
        let size = self.tex_size as f32;
        [
            (texel.x as f32 + 0.5) / size,
            (texel.y as f32 + 0.5) / size,
        ]
    }

    /// Inverse of [`uv`](Self::uv), clamped into the grid.
    pub fn texel_from_uv(&self, uv: [f32; 2]) -> TexelCoord {
        let size = self.tex_size as f32;
        let max = self.tex_size - 1;
        let to_index = |c: f32| -> u32 {
            if c.is_finite() {
                ((c * size).floor().max(0.0) as u32).min(max)
            } else {
                0
            }
        };
        TexelCoord::new(to_index(uv[0]), to_index(uv[1]))
    }

    /// Iterate every texel in row-major (linear id) order.
    pub fn texels(&self) -> impl Iterator<Item = TexelCoord> {
        let size = self.tex_size;
        (0..size).flat_map(move |y| (0..size).map(move |x| TexelCoord::new(x, y)))
    }

    /// Dimensions `(width, height)` of a history atlas with `history_length` slices.
    pub fn atlas_extent(&self, history_length: u32) -> (u32, u32) {
        (self.tex_size, self.tex_size * history_length)
    }

    /// Atlas texel holding `slice` of the particle at `texel`.
    #[inline]
    pub fn atlas_texel(&self, texel: TexelCoord, slice: u32) -> TexelCoord {
        TexelCoord::new(texel.x, slice * self.tex_size + texel.y)
    }

    /// Linear index into a row-major atlas array.
    #[inline]
    pub fn atlas_index(&self, texel: TexelCoord, slice: u32) -> usize {
        let atlas = self.atlas_texel(texel, slice);
        (atlas.y as usize) * (self.tex_size as usize) + atlas.x as usize
    }

    /// Decompose an atlas texel into `(particle texel, slice)`.
    #[inline]
    pub fn split_atlas_texel(&self, atlas: TexelCoord) -> (TexelCoord, u32) {
        (
            TexelCoord::new(atlas.x, atlas.y % self.tex_size),
            atlas.y / self.tex_size,
        )
    }
}
