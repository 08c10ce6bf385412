//! Level-of-detail presets.
//!
//! [`select_preset`] maps a quality tier and an explicit [`DeviceProfile`] to
//! concrete simulation and rendering budgets. It reads no ambient state, so
//! the whole table can be checked as plain data.

use serde::{Deserialize, Serialize};

/// Shortest history that still forms one trail segment.
pub const MIN_HISTORY_LENGTH: u32 = 2;

/// Device pixel ratio at and above which smaller point sprites are used.
const HI_DPR_THRESHOLD: f32 = 2.0;

/// Requested quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    Mid,
    #[default]
    High,
}

impl Quality {
    pub const ALL: [Quality; 3] = [Quality::Low, Quality::Mid, Quality::High];
}

impl std::str::FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Quality::Low),
            "mid" | "medium" => Ok(Quality::Mid),
            "high" => Ok(Quality::High),
            other => Err(format!("unknown quality tier '{other}'")),
        }
    }
}

/// Capability signals of the display device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceProfile {
    pub device_pixel_ratio: f32,
    pub is_mobile: bool,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            device_pixel_ratio: 1.0,
            is_mobile: false,
        }
    }
}

impl DeviceProfile {
    pub fn new(device_pixel_ratio: f32, is_mobile: bool) -> Self {
        Self {
            device_pixel_ratio,
            is_mobile,
        }
    }

    /// Classify a user-agent string. Phones and tablets count as mobile.
    pub fn from_user_agent(user_agent: &str, device_pixel_ratio: f32) -> Self {
        const MOBILE_MARKERS: [&str; 5] = ["android", "iphone", "ipad", "ipod", "mobile"];
        let ua = user_agent.to_ascii_lowercase();
        let is_mobile = MOBILE_MARKERS.iter().any(|m| ua.contains(m));
        Self::new(device_pixel_ratio, is_mobile)
    }

    fn is_hi_dpr(&self) -> bool {
        self.device_pixel_ratio >= HI_DPR_THRESHOLD
    }
}

/// Concrete budgets for one quality tier on one device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LodPreset {
    /// Scale applied to the requested particle count.
    pub count_multiplier: f32,
    /// Requested history slices per particle (≥ 2, clamped later by the device).
    pub history_length: u32,
    /// Draw a trail for every `particle_step`-th row and column.
    pub particle_step: u32,
    /// Draw every `segment_step`-th pair of adjacent history slices.
    pub segment_step: u32,
    /// Point sprite diameter in pixels.
    pub point_size: f32,
    pub enable_trails: bool,
}

impl LodPreset {
    /// Requested particle count after applying the multiplier, at least 1.
    pub fn scaled_count(&self, requested: u32) -> u32 {
        let scaled = (requested as f64 * self.count_multiplier as f64).round();
        if scaled.is_finite() && scaled >= 1.0 {
            scaled.min(u32::MAX as f64) as u32
        } else {
            1
        }
    }
}

/// Budgets for `quality` on `device`.
pub fn select_preset(quality: Quality, device: DeviceProfile) -> LodPreset {
    let hi_dpr = device.is_hi_dpr();
    let pick = |desktop: f32, handheld: f32| if device.is_mobile { handheld } else { desktop };
    let pick_u32 = |desktop: u32, handheld: u32| if device.is_mobile { handheld } else { desktop };

    let preset = match quality {
        Quality::Low => LodPreset {
            count_multiplier: pick(0.35, 0.25),
            history_length: pick_u32(24, 16),
            particle_step: pick_u32(2, 3),
            segment_step: pick_u32(1, 2),
            point_size: if hi_dpr { 1.8 } else { 2.2 },
            enable_trails: false,
        },
        Quality::Mid => LodPreset {
            count_multiplier: pick(0.6, 0.45),
            history_length: pick_u32(32, 24),
            particle_step: pick_u32(1, 2),
            segment_step: pick_u32(1, 2),
            point_size: if hi_dpr { 2.0 } else { 2.6 },
            enable_trails: true,
        },
        Quality::High => LodPreset {
            count_multiplier: pick(1.0, 0.7),
            history_length: pick_u32(48, 32),
            particle_step: pick_u32(1, 2),
            segment_step: 1,
            point_size: if hi_dpr { 2.2 } else { 3.0 },
            enable_trails: true,
        },
    };

    log::debug!("LOD preset for {quality:?} on {device:?}: {preset:?}");
    preset
}

/// Largest usable history length for a state texture of side `tex_size`.
///
/// The atlas is `tex_size * history_length` texels tall, which must fit in
/// `max_texture_dimension`. Returns `None` when not even
/// [`MIN_HISTORY_LENGTH`] slices fit; trails cannot be drawn then.
pub fn clamp_history_length(requested: u32, tex_size: u32, max_texture_dimension: u32) -> Option<u32> {
    let feasible = max_texture_dimension / tex_size.max(1);
    if feasible < MIN_HISTORY_LENGTH {
        log::warn!(
            "texture size {tex_size} leaves room for {feasible} history slices under limit {max_texture_dimension}"
        );
        return None;
    }
    let clamped = requested.max(MIN_HISTORY_LENGTH).min(feasible);
    if clamped < requested {
        log::warn!(
            "history length {requested} exceeds device limit for texture size {tex_size}; using {clamped}"
        );
    }
    Some(clamped)
}
