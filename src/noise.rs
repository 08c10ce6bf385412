//! Simplex noise and the curl field built on it.
//!
//! Host mirror of the WGSL in [`crate::shader_utils`]. The two are the same
//! algorithm but are not expected to agree bit for bit.

use glam::{Vec3, Vec3Swizzles, Vec4, Vec4Swizzles};

/// Central-difference offset used when taking the curl.
pub const CURL_EPSILON: f32 = 0.12;

fn mod289_3(x: Vec3) -> Vec3 {
    x - (x * (1.0 / 289.0)).floor() * 289.0
}

fn mod289_4(x: Vec4) -> Vec4 {
    x - (x * (1.0 / 289.0)).floor() * 289.0
}

fn permute(x: Vec4) -> Vec4 {
    mod289_4((x * 34.0 + Vec4::ONE) * x)
}

fn taylor_inv_sqrt(r: Vec4) -> Vec4 {
    Vec4::splat(1.792_842_9) - r * 0.853_734_7
}

// GLSL `step(edge, x)`
fn step3(edge: Vec3, x: Vec3) -> Vec3 {
    Vec3::select(x.cmplt(edge), Vec3::ZERO, Vec3::ONE)
}

fn step4(edge: Vec4, x: Vec4) -> Vec4 {
    Vec4::select(x.cmplt(edge), Vec4::ZERO, Vec4::ONE)
}

/// 3D simplex noise, roughly in `[-1, 1]`.
pub fn simplex3(v: Vec3) -> f32 {
    const C: [f32; 2] = [1.0 / 6.0, 1.0 / 3.0];

    // First corner
    let mut i = (v + Vec3::splat(v.dot(Vec3::splat(C[1])))).floor();
    let x0 = v - i + Vec3::splat(i.dot(Vec3::splat(C[0])));

    // Other corners
    let g = step3(x0.yzx(), x0);
    let l = Vec3::ONE - g;
    let i1 = g.min(l.zxy());
    let i2 = g.max(l.zxy());

    let x1 = x0 - i1 + Vec3::splat(C[0]);
    let x2 = x0 - i2 + Vec3::splat(C[1]);
    let x3 = x0 - Vec3::splat(0.5);

    i = mod289_3(i);
    let p = permute(
        permute(
            permute(Vec4::splat(i.z) + Vec4::new(0.0, i1.z, i2.z, 1.0))
                + Vec4::splat(i.y)
                + Vec4::new(0.0, i1.y, i2.y, 1.0),
        ) + Vec4::splat(i.x)
            + Vec4::new(0.0, i1.x, i2.x, 1.0),
    );

    // Gradients on a 7x7 grid mapped onto an octahedron
    let n_ = 1.0 / 7.0;
    let ns = Vec3::new(2.0 * n_, 0.5 * n_ - 1.0, n_);

    let j = p - 49.0 * (p * ns.z * ns.z).floor();
    let x_ = (j * ns.z).floor();
    let y_ = (j - 7.0 * x_).floor();

    let x = x_ * ns.x + Vec4::splat(ns.y);
    let y = y_ * ns.x + Vec4::splat(ns.y);
    let h = Vec4::ONE - x.abs() - y.abs();

    let b0 = Vec4::new(x.x, x.y, y.x, y.y);
    let b1 = Vec4::new(x.z, x.w, y.z, y.w);

    let s0 = b0.floor() * 2.0 + Vec4::ONE;
    let s1 = b1.floor() * 2.0 + Vec4::ONE;
    let sh = -step4(h, Vec4::ZERO);

    let a0 = b0.xzyw() + s0.xzyw() * sh.xxyy();
    let a1 = b1.xzyw() + s1.xzyw() * sh.zzww();

    let p0 = Vec3::new(a0.x, a0.y, h.x);
    let p1 = Vec3::new(a0.z, a0.w, h.y);
    let p2 = Vec3::new(a1.x, a1.y, h.z);
    let p3 = Vec3::new(a1.z, a1.w, h.w);

    let norm = taylor_inv_sqrt(Vec4::new(p0.dot(p0), p1.dot(p1), p2.dot(p2), p3.dot(p3)));
    let p0 = p0 * norm.x;
    let p1 = p1 * norm.y;
    let p2 = p2 * norm.z;
    let p3 = p3 * norm.w;

    let m = (Vec4::splat(0.6) - Vec4::new(x0.dot(x0), x1.dot(x1), x2.dot(x2), x3.dot(x3)))
        .max(Vec4::ZERO);
    let m = m * m;

    42.0 * (m * m).dot(Vec4::new(p0.dot(x0), p1.dot(x1), p2.dot(x2), p3.dot(x3)))
}

/// Unnormalized curl of the scalar noise, using central differences.
///
/// Each component is a difference of partials of [`simplex3`], so the field
/// has zero divergence (up to rounding) by construction.
pub fn curl_field(p: Vec3) -> Vec3 {
    let e = CURL_EPSILON;
    let dx = simplex3(p + Vec3::X * e) - simplex3(p - Vec3::X * e);
    let dy = simplex3(p + Vec3::Y * e) - simplex3(p - Vec3::Y * e);
    let dz = simplex3(p + Vec3::Z * e) - simplex3(p - Vec3::Z * e);

    Vec3::new(dy - dz, dz - dx, dx - dy)
}

/// Unit-length flow direction at `p`; zero where the curl vanishes.
pub fn curl_noise(p: Vec3) -> Vec3 {
    curl_field(p).normalize_or_zero()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn random_points(n: usize) -> Vec<Vec3> {
        let mut rng = StdRng::seed_from_u64(7);
        (0..n)
            .map(|_| {
                Vec3::new(
                    rng.gen_range(-20.0..20.0),
                    rng.gen_range(-20.0..20.0),
                    rng.gen_range(-20.0..20.0),
                )
            })
            .collect()
    }

    #[test]
    fn test_simplex_range_and_determinism() {
        for p in random_points(2_000) {
            let n = simplex3(p);
            assert!(n.is_finite());
            assert!((-1.1..=1.1).contains(&n), "noise {n} at {p:?}");
            assert_eq!(n, simplex3(p));
        }
    }

    #[test]
    fn test_simplex_varies() {
        let values: Vec<f32> = random_points(64).into_iter().map(simplex3).collect();
        let min = values.iter().cloned().fold(f32::INFINITY, f32::min);
        let max = values.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        assert!(max - min > 0.5);
    }

    #[test]
    fn test_curl_is_unit_or_zero() {
        for p in random_points(500) {
            let c = curl_noise(p);
            let len = c.length();
            assert!(len == 0.0 || (len - 1.0).abs() < 1e-4, "len {len}");
        }
    }

    #[test]
    fn test_curl_field_is_divergence_free() {
        // Finite-difference divergence of the unnormalized field, with the same
        // step as the curl itself. Difference operators along different axes
        // then commute and the sum cancels up to float rounding.
        let h = CURL_EPSILON;
        for p in random_points(200) {
            let div = (curl_field(p + Vec3::X * h).x - curl_field(p - Vec3::X * h).x)
                + (curl_field(p + Vec3::Y * h).y - curl_field(p - Vec3::Y * h).y)
                + (curl_field(p + Vec3::Z * h).z - curl_field(p - Vec3::Z * h).z);
            assert!(div.abs() < 1e-4, "divergence {div} at {p:?}");
        }
    }
}
