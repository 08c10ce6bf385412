//! WGSL helper functions shared by the generated shaders.
//!
//! Each constant has a host-side twin:
//!
//! - `hash`, `hash3`, `rand_unit` ↔ [`crate::flow::hash`], [`crate::flow::hash3`], [`crate::flow::rand_unit`]
//! - `simplex3`, `curl_noise` ↔ [`crate::noise::simplex3`], [`crate::noise::curl_noise`]
//! - `sanitize3` ↔ [`crate::trail::sanitize`]

use crate::noise::CURL_EPSILON;

/// Integer hash and derived random floats.
pub const RANDOM_WGSL: &str = r#"
fn hash(n: u32) -> u32 {
    var x = n;
    x = x ^ (x >> 17u);
    x = x * 0xed5ad4bbu;
    x = x ^ (x >> 11u);
    x = x * 0xac4c1b51u;
    x = x ^ (x >> 15u);
    x = x * 0x31848babu;
    x = x ^ (x >> 14u);
    return x;
}

fn hash3(x: u32, y: u32, z: u32) -> u32 {
    return hash(x + hash(y + hash(z)));
}

// Float in [0, 1]
fn rand_unit(seed: u32) -> f32 {
    return f32(hash(seed)) / 4294967295.0;
}
"#;

/// 3D simplex noise.
pub const SIMPLEX_WGSL: &str = r#"
fn mod289_3(x: vec3<f32>) -> vec3<f32> {
    return x - floor(x * (1.0 / 289.0)) * 289.0;
}

fn mod289_4(x: vec4<f32>) -> vec4<f32> {
    return x - floor(x * (1.0 / 289.0)) * 289.0;
}

fn permute4(x: vec4<f32>) -> vec4<f32> {
    return mod289_4(((x * 34.0) + 1.0) * x);
}

fn taylor_inv_sqrt4(r: vec4<f32>) -> vec4<f32> {
    return 1.79284291400159 - 0.85373472095314 * r;
}

fn simplex3(v: vec3<f32>) -> f32 {
    let C = vec2<f32>(1.0 / 6.0, 1.0 / 3.0);
    let D = vec4<f32>(0.0, 0.5, 1.0, 2.0);

    var i = floor(v + dot(v, vec3<f32>(C.y)));
    let x0 = v - i + dot(i, vec3<f32>(C.x));

    let g = step(x0.yzx, x0.xyz);
    let l = 1.0 - g;
    let i1 = min(g.xyz, l.zxy);
    let i2 = max(g.xyz, l.zxy);

    let x1 = x0 - i1 + C.x;
    let x2 = x0 - i2 + C.y;
    let x3 = x0 - D.yyy;

    i = mod289_3(i);
    let p = permute4(permute4(permute4(
        i.z + vec4<f32>(0.0, i1.z, i2.z, 1.0))
      + i.y + vec4<f32>(0.0, i1.y, i2.y, 1.0))
      + i.x + vec4<f32>(0.0, i1.x, i2.x, 1.0));

    let n_ = 0.142857142857;
    let ns = n_ * D.wyz - D.xzx;

    let j = p - 49.0 * floor(p * ns.z * ns.z);

    let x_ = floor(j * ns.z);
    let y_ = floor(j - 7.0 * x_);

    let x = x_ * ns.x + ns.yyyy;
    let y = y_ * ns.x + ns.yyyy;
    let h = 1.0 - abs(x) - abs(y);

    let b0 = vec4<f32>(x.xy, y.xy);
    let b1 = vec4<f32>(x.zw, y.zw);

    let s0 = floor(b0) * 2.0 + 1.0;
    let s1 = floor(b1) * 2.0 + 1.0;
    let sh = -step(h, vec4<f32>(0.0));

    let a0 = b0.xzyw + s0.xzyw * sh.xxyy;
    let a1 = b1.xzyw + s1.xzyw * sh.zzww;

    var p0 = vec3<f32>(a0.xy, h.x);
    var p1 = vec3<f32>(a0.zw, h.y);
    var p2 = vec3<f32>(a1.xy, h.z);
    var p3 = vec3<f32>(a1.zw, h.w);

    let norm = taylor_inv_sqrt4(vec4<f32>(dot(p0, p0), dot(p1, p1), dot(p2, p2), dot(p3, p3)));
    p0 *= norm.x;
    p1 *= norm.y;
    p2 *= norm.z;
    p3 *= norm.w;

    var m = max(0.6 - vec4<f32>(dot(x0, x0), dot(x1, x1), dot(x2, x2), dot(x3, x3)), vec4<f32>(0.0));
    m = m * m;
    return 42.0 * dot(m * m, vec4<f32>(dot(p0, x0), dot(p1, x1), dot(p2, x2), dot(p3, x3)));
}
"#;

/// Curl of `simplex3` by central differences, normalized (zero where it vanishes).
pub fn curl_wgsl() -> String {
    format!(
        r#"
fn curl_noise(p: vec3<f32>) -> vec3<f32> {{
    let e = {CURL_EPSILON:?};
    let dx = simplex3(p + vec3<f32>(e, 0.0, 0.0)) - simplex3(p - vec3<f32>(e, 0.0, 0.0));
    let dy = simplex3(p + vec3<f32>(0.0, e, 0.0)) - simplex3(p - vec3<f32>(0.0, e, 0.0));
    let dz = simplex3(p + vec3<f32>(0.0, 0.0, e)) - simplex3(p - vec3<f32>(0.0, 0.0, e));

    let c = vec3<f32>(dy - dz, dz - dx, dx - dy);
    let len = length(c);
    if len > 1e-6 {{
        return c / len;
    }}
    return vec3<f32>(0.0);
}}
"#
    )
}

/// Replace a non-finite sample with the origin.
pub const SANITIZE_WGSL: &str = r#"
fn sanitize3(p: vec3<f32>) -> vec3<f32> {
    if all(abs(p) < vec3<f32>(1.0e30)) {
        return p;
    }
    return vec3<f32>(0.0);
}
"#;

/// Everything the flow step needs: hash, simplex and curl.
pub fn flow_utils_wgsl() -> String {
    format!(
        "// Built-in utility functions\n{}\n{}\n{}\n",
        RANDOM_WGSL,
        SIMPLEX_WGSL,
        curl_wgsl()
    )
}

/// Parse and validate a generated shader with naga.
#[cfg(test)]
pub(crate) fn validate_wgsl(code: &str) -> Result<(), String> {
    let module =
        naga::front::wgsl::parse_str(code).map_err(|e| format!("WGSL parse error: {:?}", e))?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator
        .validate(&module)
        .map_err(|e| format!("WGSL validation error: {:?}", e))?;

    Ok(())
}
