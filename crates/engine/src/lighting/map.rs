use serde::Deserialize;

use super::point_lights::PointLightDescriptor;
use super::zones::ZoneDescriptor;

/// Overrides the `Default` darkness level for one map.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AmbientDescriptor {
    pub darkness: f32,
}

/// Everything lighting-related a map hands over at load time.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapLighting {
    pub zones: Vec<ZoneDescriptor>,
    pub lights: Vec<PointLightDescriptor>,
    pub ambient: Option<AmbientDescriptor>,
}

impl MapLighting {
    pub fn with_zones(zones: Vec<ZoneDescriptor>) -> Self {
        Self {
            zones,
            ..Self::default()
        }
    }
}
