use std::fmt;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use super::config::ZoneLevelConfig;
use super::geometry::{Rect, Vec2};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ZoneType {
    #[default]
    Default,
    Bright,
    Dim,
    Dark,
    Black,
}

impl ZoneType {
    pub const ALL: [ZoneType; 5] = [
        ZoneType::Default,
        ZoneType::Bright,
        ZoneType::Dim,
        ZoneType::Dark,
        ZoneType::Black,
    ];

    /// `Bright` always wins; among the darkening zones the darker one wins.
    pub const fn priority(self) -> i32 {
        match self {
            ZoneType::Bright => 4,
            ZoneType::Black => 3,
            ZoneType::Dark => 2,
            ZoneType::Dim => 1,
            ZoneType::Default => 0,
        }
    }

    pub fn as_token(self) -> &'static str {
        match self {
            ZoneType::Default => "default",
            ZoneType::Bright => "bright",
            ZoneType::Dim => "dim",
            ZoneType::Dark => "dark",
            ZoneType::Black => "black",
        }
    }

    /// Case-insensitive; `None` for anything outside the closed set.
    pub fn from_token(raw: &str) -> Option<Self> {
        let token = raw.trim();
        Self::ALL
            .into_iter()
            .find(|zone_type| zone_type.as_token().eq_ignore_ascii_case(token))
    }
}

impl fmt::Display for ZoneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

/// Zone rectangle as handed over by the map data provider.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZoneDescriptor {
    #[serde(default)]
    pub name: Option<String>,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub width: Option<f32>,
    #[serde(default)]
    pub height: Option<f32>,
    #[serde(rename = "type", alias = "zone_type")]
    pub zone_type: String,
    /// Overrides the per-type level from config.
    #[serde(default)]
    pub darkness: Option<f32>,
}

impl ZoneDescriptor {
    pub fn new(x: f32, y: f32, width: f32, height: f32, zone_type: &str) -> Self {
        Self {
            name: None,
            x,
            y,
            width: Some(width),
            height: Some(height),
            zone_type: zone_type.to_string(),
            darkness: None,
        }
    }

    pub fn with_darkness(mut self, darkness: f32) -> Self {
        self.darkness = Some(darkness);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ZoneLoadIssue {
    #[error("zone descriptor {index} skipped: missing {field}")]
    MissingDimension { index: usize, field: &'static str },
    #[error("zone descriptor {index} skipped: degenerate rect {width}x{height}")]
    DegenerateRect {
        index: usize,
        width: f32,
        height: f32,
    },
    #[error("zone descriptor {index}: unknown zone type `{raw}`, using default")]
    UnknownZoneType { index: usize, raw: String },
    #[error("zone descriptor {index}: darkness {value} outside [0,1], clamped")]
    DarknessOutOfRange { index: usize, value: f32 },
}

impl ZoneLoadIssue {
    pub fn skipped_descriptor(&self) -> bool {
        matches!(
            self,
            ZoneLoadIssue::MissingDimension { .. } | ZoneLoadIssue::DegenerateRect { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    rect: Rect,
    zone_type: ZoneType,
    darkness_level: f32,
    priority: i32,
    descriptor_index: usize,
    name: Option<String>,
}

impl Zone {
    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn zone_type(&self) -> ZoneType {
        self.zone_type
    }

    pub fn darkness_level(&self) -> f32 {
        self.darkness_level
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn descriptor_index(&self) -> usize {
        self.descriptor_index
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// True when `self` should govern over `other` at a shared point.
    pub(crate) fn outranks(&self, other: &Zone) -> bool {
        self.priority > other.priority
            || (self.priority == other.priority && self.descriptor_index < other.descriptor_index)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ZoneRegistry {
    zones: Vec<Zone>,
    issues: Vec<ZoneLoadIssue>,
    loaded: bool,
}

impl ZoneRegistry {
    /// Builds the registry, skipping malformed descriptors. Never fails as a whole.
    pub fn load(descriptors: Vec<ZoneDescriptor>, levels: &ZoneLevelConfig) -> Self {
        let mut bright = Vec::new();
        let mut others = Vec::new();
        let mut issues = Vec::new();

        for (index, descriptor) in descriptors.into_iter().enumerate() {
            match build_zone(index, descriptor, levels, &mut issues) {
                Some(zone) if zone.zone_type == ZoneType::Bright => bright.push(zone),
                Some(zone) => others.push(zone),
                None => {}
            }
        }

        for issue in &issues {
            warn!(issue = %issue, "zone_descriptor_issue");
        }

        let mut zones = bright;
        zones.extend(others);
        debug!(
            zone_count = zones.len(),
            skipped = issues.iter().filter(|issue| issue.skipped_descriptor()).count(),
            "zones_loaded"
        );

        Self {
            zones,
            issues,
            loaded: true,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn issues(&self) -> &[ZoneLoadIssue] {
        &self.issues
    }

    /// Highest-priority zone containing `point`; equal priorities resolve to the
    /// earliest descriptor.
    pub fn query(&self, point: Vec2) -> Option<&Zone> {
        let mut best: Option<&Zone> = None;
        for zone in &self.zones {
            if !zone.rect.contains(point) {
                continue;
            }
            match best {
                Some(current) if !zone.outranks(current) => {}
                _ => best = Some(zone),
            }
        }
        best
    }

    /// Highest-ranked zone the straight path from `from` to `to` touches.
    pub fn query_segment(&self, from: Vec2, to: Vec2) -> Option<&Zone> {
        let mut best: Option<&Zone> = None;
        for zone in &self.zones {
            if !zone.rect.intersects_segment(from, to) {
                continue;
            }
            match best {
                Some(current) if !zone.outranks(current) => {}
                _ => best = Some(zone),
            }
        }
        best
    }
}

fn build_zone(
    index: usize,
    descriptor: ZoneDescriptor,
    levels: &ZoneLevelConfig,
    issues: &mut Vec<ZoneLoadIssue>,
) -> Option<Zone> {
    let Some(width) = descriptor.width else {
        issues.push(ZoneLoadIssue::MissingDimension {
            index,
            field: "width",
        });
        return None;
    };
    let Some(height) = descriptor.height else {
        issues.push(ZoneLoadIssue::MissingDimension {
            index,
            field: "height",
        });
        return None;
    };
    let rect = Rect::new(descriptor.x, descriptor.y, width, height);
    if rect.is_degenerate() {
        issues.push(ZoneLoadIssue::DegenerateRect {
            index,
            width,
            height,
        });
        return None;
    }

    let zone_type = match ZoneType::from_token(&descriptor.zone_type) {
        Some(zone_type) => zone_type,
        None => {
            issues.push(ZoneLoadIssue::UnknownZoneType {
                index,
                raw: descriptor.zone_type.clone(),
            });
            ZoneType::Default
        }
    };

    let darkness_level = match descriptor.darkness {
        Some(value) if value.is_finite() && (0.0..=1.0).contains(&value) => value,
        Some(value) => {
            issues.push(ZoneLoadIssue::DarknessOutOfRange { index, value });
            if value.is_finite() {
                value.clamp(0.0, 1.0)
            } else {
                levels.level_for(zone_type)
            }
        }
        None => levels.level_for(zone_type),
    };

    Some(Zone {
        rect,
        zone_type,
        darkness_level,
        priority: zone_type.priority(),
        descriptor_index: index,
        name: descriptor.name,
    })
}
