use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use super::zones::ZoneType;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse lighting config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read lighting config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LightingConfig {
    pub persistent_mode: bool,
    pub zones: ZoneLevelConfig,
    pub resolver: ResolverConfig,
    pub transition: TransitionConfig,
    pub beam: BeamConfig,
    pub point_lights: PointLightConfig,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            persistent_mode: true,
            zones: ZoneLevelConfig::default(),
            resolver: ResolverConfig::default(),
            transition: TransitionConfig::default(),
            beam: BeamConfig::default(),
            point_lights: PointLightConfig::default(),
        }
    }
}

impl LightingConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let parsed: LightingConfig = serde_json::from_str(raw)?;
        Ok(parsed.sanitized())
    }

    pub fn from_path(path: &std::path::Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Replaces out-of-range tuning values with defaults. Never fails.
    pub fn sanitized(self) -> Self {
        Self {
            persistent_mode: self.persistent_mode,
            zones: self.zones.sanitized(),
            resolver: self.resolver.sanitized(),
            transition: self.transition.sanitized(),
            beam: self.beam.sanitized(),
            point_lights: self.point_lights.sanitized(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ZoneLevelConfig {
    pub default: f32,
    pub bright: f32,
    pub dim: f32,
    pub dark: f32,
    pub black: f32,
}

impl Default for ZoneLevelConfig {
    fn default() -> Self {
        Self {
            default: 0.35,
            bright: 0.0,
            dim: 0.55,
            dark: 0.8,
            black: 0.97,
        }
    }
}

impl ZoneLevelConfig {
    pub fn level_for(&self, zone_type: ZoneType) -> f32 {
        match zone_type {
            ZoneType::Default => self.default,
            ZoneType::Bright => self.bright,
            ZoneType::Dim => self.dim,
            ZoneType::Dark => self.dark,
            ZoneType::Black => self.black,
        }
    }

    fn sanitized(self) -> Self {
        let defaults = Self::default();
        Self {
            default: unit_or(self.default, defaults.default, "zones.default"),
            bright: unit_or(self.bright, defaults.bright, "zones.bright"),
            dim: unit_or(self.dim, defaults.dim, "zones.dim"),
            dark: unit_or(self.dark, defaults.dark, "zones.dark"),
            black: unit_or(self.black, defaults.black, "zones.black"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverConfig {
    /// Per-tick displacement above which motion counts as high speed.
    pub high_speed_threshold: f32,
    /// `|dy| > vertical_ratio * |dx|` marks a move as vertical.
    pub vertical_ratio: f32,
    pub fast_spacing: f32,
    pub vertical_spacing: f32,
    pub vertical_fast_spacing: f32,
    pub max_samples: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            high_speed_threshold: 40.0,
            vertical_ratio: 1.2,
            fast_spacing: 8.0,
            vertical_spacing: 6.0,
            vertical_fast_spacing: 4.0,
            max_samples: 120,
        }
    }
}

impl ResolverConfig {
    fn sanitized(self) -> Self {
        let defaults = Self::default();
        Self {
            high_speed_threshold: non_negative_or(
                self.high_speed_threshold,
                defaults.high_speed_threshold,
                "resolver.high_speed_threshold",
            ),
            vertical_ratio: non_negative_or(
                self.vertical_ratio,
                defaults.vertical_ratio,
                "resolver.vertical_ratio",
            ),
            fast_spacing: positive_or(
                self.fast_spacing,
                defaults.fast_spacing,
                "resolver.fast_spacing",
            ),
            vertical_spacing: positive_or(
                self.vertical_spacing,
                defaults.vertical_spacing,
                "resolver.vertical_spacing",
            ),
            vertical_fast_spacing: positive_or(
                self.vertical_fast_spacing,
                defaults.vertical_fast_spacing,
                "resolver.vertical_fast_spacing",
            ),
            max_samples: if self.max_samples == 0 {
                warn!(field = "resolver.max_samples", "config_value_replaced_with_default");
                defaults.max_samples
            } else {
                self.max_samples
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransitionConfig {
    pub bright_duration_ms: f32,
    /// Duration of a full 0 -> 1 level swing before motion factors and clamping.
    pub duration_per_level_ms: f32,
    pub fast_darkening_factor: f32,
    pub slow_darkening_factor: f32,
    pub min_duration_ms: f32,
    pub max_duration_ms: f32,
    pub level_precision: u32,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            bright_duration_ms: 400.0,
            duration_per_level_ms: 1000.0,
            fast_darkening_factor: 0.5,
            slow_darkening_factor: 1.25,
            min_duration_ms: 200.0,
            max_duration_ms: 1000.0,
            level_precision: 3,
        }
    }
}

impl TransitionConfig {
    pub fn bright_duration(&self) -> Duration {
        millis_to_duration(self.bright_duration_ms)
    }

    fn sanitized(self) -> Self {
        let defaults = Self::default();
        let min_duration_ms = non_negative_or(
            self.min_duration_ms,
            defaults.min_duration_ms,
            "transition.min_duration_ms",
        );
        let mut max_duration_ms = non_negative_or(
            self.max_duration_ms,
            defaults.max_duration_ms,
            "transition.max_duration_ms",
        );
        if max_duration_ms < min_duration_ms {
            warn!(
                min_duration_ms,
                max_duration_ms, "transition_max_below_min_raised_to_min"
            );
            max_duration_ms = min_duration_ms;
        }
        Self {
            bright_duration_ms: non_negative_or(
                self.bright_duration_ms,
                defaults.bright_duration_ms,
                "transition.bright_duration_ms",
            ),
            duration_per_level_ms: non_negative_or(
                self.duration_per_level_ms,
                defaults.duration_per_level_ms,
                "transition.duration_per_level_ms",
            ),
            fast_darkening_factor: positive_or(
                self.fast_darkening_factor,
                defaults.fast_darkening_factor,
                "transition.fast_darkening_factor",
            ),
            slow_darkening_factor: positive_or(
                self.slow_darkening_factor,
                defaults.slow_darkening_factor,
                "transition.slow_darkening_factor",
            ),
            min_duration_ms,
            max_duration_ms,
            level_precision: self.level_precision.min(6),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BeamConfig {
    pub enabled_at_start: bool,
    pub half_angle_degrees: f32,
    pub length: f32,
    /// Number of concentric alpha rings between apex and cone edge.
    pub arc_count: u32,
    /// Vertices per arc edge.
    pub arc_segments: u32,
    /// Alpha lost from the innermost to the outermost ring.
    pub edge_softness: f32,
    pub apex_radius: f32,
    pub mask: Option<BeamMaskConfig>,
    pub battery: Option<BatteryConfig>,
}

impl Default for BeamConfig {
    fn default() -> Self {
        Self {
            enabled_at_start: false,
            half_angle_degrees: 36.0,
            length: 250.0,
            arc_count: 5,
            arc_segments: 24,
            edge_softness: 0.6,
            apex_radius: 16.0,
            mask: None,
            battery: None,
        }
    }
}

impl BeamConfig {
    pub fn half_angle_radians(&self) -> f32 {
        self.half_angle_degrees.to_radians()
    }

    fn sanitized(self) -> Self {
        let defaults = Self::default();
        let half_angle_degrees = if self.half_angle_degrees.is_finite()
            && self.half_angle_degrees > 0.0
            && self.half_angle_degrees < 180.0
        {
            self.half_angle_degrees
        } else {
            warn!(
                field = "beam.half_angle_degrees",
                value = self.half_angle_degrees,
                "config_value_replaced_with_default"
            );
            defaults.half_angle_degrees
        };
        Self {
            enabled_at_start: self.enabled_at_start,
            half_angle_degrees,
            length: positive_or(self.length, defaults.length, "beam.length"),
            arc_count: self.arc_count.max(1),
            arc_segments: self.arc_segments.max(2),
            edge_softness: unit_or(
                self.edge_softness,
                defaults.edge_softness,
                "beam.edge_softness",
            ),
            apex_radius: non_negative_or(
                self.apex_radius,
                defaults.apex_radius,
                "beam.apex_radius",
            ),
            mask: self.mask.map(BeamMaskConfig::sanitized),
            battery: self.battery.map(BatteryConfig::sanitized),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BeamMaskConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub invert_alpha: bool,
    /// World units covered by one mask pixel.
    #[serde(default = "default_units_per_pixel")]
    pub units_per_pixel: f32,
}

fn default_units_per_pixel() -> f32 {
    1.0
}

impl BeamMaskConfig {
    fn sanitized(self) -> Self {
        Self {
            units_per_pixel: positive_or(
                self.units_per_pixel,
                default_units_per_pixel(),
                "beam.mask.units_per_pixel",
            ),
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatteryConfig {
    pub capacity_seconds: f32,
    pub drain_per_second: f32,
    pub recharge_per_second: f32,
    /// Fraction of capacity needed before a depleted beam may turn on again.
    pub min_restart_fraction: f32,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            capacity_seconds: 60.0,
            drain_per_second: 1.0,
            recharge_per_second: 0.5,
            min_restart_fraction: 0.1,
        }
    }
}

impl BatteryConfig {
    fn sanitized(self) -> Self {
        let defaults = Self::default();
        Self {
            capacity_seconds: positive_or(
                self.capacity_seconds,
                defaults.capacity_seconds,
                "beam.battery.capacity_seconds",
            ),
            drain_per_second: non_negative_or(
                self.drain_per_second,
                defaults.drain_per_second,
                "beam.battery.drain_per_second",
            ),
            recharge_per_second: non_negative_or(
                self.recharge_per_second,
                defaults.recharge_per_second,
                "beam.battery.recharge_per_second",
            ),
            min_restart_fraction: unit_or(
                self.min_restart_fraction,
                defaults.min_restart_fraction,
                "beam.battery.min_restart_fraction",
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PointLightConfig {
    pub tint_grace_ms: f32,
    /// Multiplier from a light's radius to its influence radius.
    pub radius_scale: f32,
    /// Influence at or below this counts as no influence.
    pub min_influence: f32,
}

impl Default for PointLightConfig {
    fn default() -> Self {
        Self {
            tint_grace_ms: 100.0,
            radius_scale: 1.0,
            min_influence: 0.0,
        }
    }
}

impl PointLightConfig {
    pub fn tint_grace(&self) -> Duration {
        millis_to_duration(self.tint_grace_ms)
    }

    fn sanitized(self) -> Self {
        let defaults = Self::default();
        Self {
            tint_grace_ms: non_negative_or(
                self.tint_grace_ms,
                defaults.tint_grace_ms,
                "point_lights.tint_grace_ms",
            ),
            radius_scale: positive_or(
                self.radius_scale,
                defaults.radius_scale,
                "point_lights.radius_scale",
            ),
            min_influence: unit_or(
                self.min_influence,
                defaults.min_influence,
                "point_lights.min_influence",
            ),
        }
    }
}

/// Microsecond resolution keeps whole-millisecond settings exact.
pub(crate) fn millis_to_duration(ms: f32) -> Duration {
    if ms.is_finite() && ms > 0.0 {
        Duration::from_micros((ms * 1000.0).round() as u64)
    } else {
        Duration::ZERO
    }
}

fn positive_or(value: f32, default: f32, field: &'static str) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        warn!(field, value, "config_value_replaced_with_default");
        default
    }
}

fn non_negative_or(value: f32, default: f32, field: &'static str) -> f32 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        warn!(field, value, "config_value_replaced_with_default");
        default
    }
}

fn unit_or(value: f32, default: f32, field: &'static str) -> f32 {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        value
    } else {
        warn!(field, value, "config_value_replaced_with_default");
        default
    }
}
