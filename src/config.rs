//! Particle system configuration.
//!
//! [`ParticleConfig`] is what the surrounding scene supplies. [`ParticleConfig::resolve`]
//! turns it into a [`ResolvedConfig`]: concrete texture sizes, the clamped
//! history length, and the flow parameters with radius-derived defaults
//! filled in.

use std::path::Path;

use log::warn;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ConfigError;
use crate::flow::FlowParams;
use crate::layout::ParticleGrid;
use crate::lod::{
    clamp_history_length, select_preset, DeviceProfile, LodPreset, Quality, MIN_HISTORY_LENGTH,
};

/// Inputs of one particle system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleConfig {
    /// Requested particle count before the LOD multiplier.
    pub count: u32,
    /// Radius of the seeded particle shell.
    pub radius: f32,
    /// Linear RGB. JSON accepts `[r, g, b]` or a `"#rrggbb"` string.
    #[serde(deserialize_with = "deserialize_color")]
    pub color: [f32; 3],
    pub seed: u32,
    pub noise_scale: f32,
    pub noise_strength: f32,
    pub flow_speed: f32,
    pub life_decay: f32,
    /// Defaults to `1.25 * radius`.
    pub bounds_radius: Option<f32>,
    /// Defaults to `radius`.
    pub respawn_radius: Option<f32>,
    /// Trail brightness multiplier.
    pub line_intensity: f32,
    pub quality: Quality,
    pub device: DeviceProfile,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            count: 20_000,
            radius: 10.0,
            color: [0.22, 0.74, 0.97],
            seed: 0,
            noise_scale: 0.65,
            noise_strength: 0.9,
            flow_speed: 0.45,
            life_decay: 0.25,
            bounds_radius: None,
            respawn_radius: None,
            line_intensity: 1.0,
            quality: Quality::High,
            device: DeviceProfile::default(),
        }
    }
}

impl ParticleConfig {
    /// Parse a JSON config. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the simulation cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.count == 0 {
            return Err(ConfigError::Invalid("count must be at least 1".into()));
        }
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "radius must be positive, got {}",
                self.radius
            )));
        }
        let finite = [
            ("noise_scale", self.noise_scale),
            ("noise_strength", self.noise_strength),
            ("flow_speed", self.flow_speed),
            ("life_decay", self.life_decay),
            ("line_intensity", self.line_intensity),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                return Err(ConfigError::Invalid(format!("{name} must be finite")));
            }
        }
        if self.life_decay < 0.0 {
            return Err(ConfigError::Invalid("life_decay must not be negative".into()));
        }
        for (name, value) in [
            ("bounds_radius", self.bounds_radius),
            ("respawn_radius", self.respawn_radius),
        ] {
            if let Some(v) = value {
                if !(v.is_finite() && v > 0.0) {
                    return Err(ConfigError::Invalid(format!("{name} must be positive")));
                }
            }
        }
        Ok(())
    }

    pub fn bounds_radius(&self) -> f32 {
        self.bounds_radius.unwrap_or(self.radius * 1.25)
    }

    pub fn respawn_radius(&self) -> f32 {
        self.respawn_radius.unwrap_or(self.radius)
    }

    pub fn flow_params(&self) -> FlowParams {
        FlowParams {
            seed: self.seed,
            bounds_radius: self.bounds_radius(),
            respawn_radius: self.respawn_radius(),
            life_decay: self.life_decay,
            noise_scale: self.noise_scale,
            noise_strength: self.noise_strength,
            flow_speed: self.flow_speed,
        }
    }

    /// Resolve sizes and budgets against a device's maximum texture dimension.
    ///
    /// Neither texture may exceed the limit. The state texture is shrunk to
    /// fit, and trails are switched off when the history atlas cannot hold
    /// two slices.
    pub fn resolve(&self, max_texture_dimension: u32) -> ResolvedConfig {
        let max_texture_dimension = max_texture_dimension.max(1);
        let mut preset = select_preset(self.quality, self.device);

        let requested = preset.scaled_count(self.count);
        let mut grid = ParticleGrid::for_count(requested);
        if grid.tex_size() > max_texture_dimension {
            grid = ParticleGrid::with_tex_size(max_texture_dimension);
            warn!(
                "{requested} particles exceed texture limit {max_texture_dimension}; using {}",
                grid.effective_count()
            );
        }

        let history_length =
            match clamp_history_length(preset.history_length, grid.tex_size(), max_texture_dimension) {
                Some(length) => length,
                None => {
                    if preset.enable_trails {
                        warn!("history atlas does not fit the device; trails disabled");
                    }
                    preset.enable_trails = false;
                    MIN_HISTORY_LENGTH
                }
            };

        ResolvedConfig {
            grid,
            history_length,
            preset,
            flow: self.flow_params(),
            color: self.color,
            line_intensity: self.line_intensity,
        }
    }
}

/// Parse `#rrggbb` (leading `#` optional) into linear-ish RGB in `[0, 1]`.
pub fn parse_hex_color(hex: &str) -> Option<[f32; 3]> {
    let digits = hex.trim().trim_start_matches('#');
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    Some([
        channel(0)? as f32 / 255.0,
        channel(2)? as f32 / 255.0,
        channel(4)? as f32 / 255.0,
    ])
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ColorValue {
    Rgb([f32; 3]),
    Hex(String),
}

fn deserialize_color<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[f32; 3], D::Error> {
    match ColorValue::deserialize(deserializer)? {
        ColorValue::Rgb(rgb) => Ok(rgb),
        ColorValue::Hex(hex) => parse_hex_color(&hex)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid hex color '{hex}'"))),
    }
}

/// A [`ParticleConfig`] made concrete for one device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedConfig {
    pub grid: ParticleGrid,
    /// History slices per particle, clamped to the device. Only allocated
    /// when trails are enabled.
    pub history_length: u32,
    pub preset: LodPreset,
    pub flow: FlowParams,
    pub color: [f32; 3],
    pub line_intensity: f32,
}

impl ResolvedConfig {
    pub fn tex_size(&self) -> u32 {
        self.grid.tex_size()
    }

    pub fn max_jump(&self) -> f32 {
        self.flow.max_jump()
    }

    pub fn trails_enabled(&self) -> bool {
        self.preset.enable_trails
    }

    /// Whether moving from `self` to `other` needs new GPU resources rather
    /// than a uniform update.
    pub fn requires_rebuild(&self, other: &ResolvedConfig) -> bool {
        self.grid != other.grid
            || self.history_length != other.history_length
            || self.preset.particle_step != other.preset.particle_step
            || self.preset.segment_step != other.preset.segment_step
            || self.preset.enable_trails != other.preset.enable_trails
    }
}
