use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use super::config::PointLightConfig;
use super::geometry::{angle_delta, normalize_angle, Color, Pose, Vec2};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LightHandle(pub u64);

#[derive(Debug, Default)]
pub struct LightHandleAllocator {
    next: u64,
}

impl LightHandleAllocator {
    pub fn allocate(&mut self) -> LightHandle {
        let handle = LightHandle(self.next);
        self.next = self.next.saturating_add(1);
        handle
    }
}

/// Opaque id of a host entity. The engine only sees entities through poses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct EntityHandle(pub u64);

impl EntityHandle {
    /// The entity whose position drives zone resolution.
    pub const OBSERVER: EntityHandle = EntityHandle(0);
}

pub trait PoseProvider {
    fn pose(&self, entity: EntityHandle) -> Option<Pose>;
}

#[derive(Debug, Clone, Default)]
pub struct PoseTable {
    poses: HashMap<EntityHandle, Pose>,
}

impl PoseTable {
    pub fn set(&mut self, entity: EntityHandle, pose: Pose) {
        self.poses.insert(entity, pose);
    }

    pub fn remove(&mut self, entity: EntityHandle) -> Option<Pose> {
        self.poses.remove(&entity)
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }
}

impl PoseProvider for PoseTable {
    fn pose(&self, entity: EntityHandle) -> Option<Pose> {
        self.poses.get(&entity).copied()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum LightKind {
    #[default]
    Point,
    /// Cone of `half_angle` radians around the light's facing.
    Directional { half_angle: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FollowBinding {
    pub target: EntityHandle,
    #[serde(default)]
    pub offset: Vec2,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PointLightDescriptor {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub color: Color,
    pub radius: f32,
    #[serde(default = "default_intensity")]
    pub intensity: f32,
    /// Facing in radians. For follow-lights it is relative to the target's facing.
    #[serde(default)]
    pub angle: f32,
    #[serde(default)]
    pub kind: LightKind,
    #[serde(default)]
    pub follow: Option<FollowBinding>,
}

fn default_intensity() -> f32 {
    1.0
}

impl PointLightDescriptor {
    pub fn point(x: f32, y: f32, radius: f32, color: Color) -> Self {
        Self {
            x,
            y,
            color,
            radius,
            intensity: 1.0,
            angle: 0.0,
            kind: LightKind::Point,
            follow: None,
        }
    }

    pub fn directional(mut self, angle: f32, half_angle: f32) -> Self {
        self.angle = angle;
        self.kind = LightKind::Directional { half_angle };
        self
    }

    pub fn following(mut self, target: EntityHandle, offset: Vec2) -> Self {
        self.follow = Some(FollowBinding { target, offset });
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointLight {
    pub handle: LightHandle,
    pub x: f32,
    pub y: f32,
    /// Current facing, already combined with the follow target's facing.
    pub angle: f32,
    pub color: Color,
    pub radius: f32,
    pub intensity: f32,
    pub kind: LightKind,
    pub follow_target: Option<EntityHandle>,
    pub follow_offset: Vec2,
    base_angle: f32,
}

impl PointLight {
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    /// Influence on a point in `[0, 1]`, before the manager's threshold.
    pub fn influence_at(&self, point: Vec2, radius_scale: f32) -> f32 {
        let effective_radius = self.radius * radius_scale;
        if !(effective_radius.is_finite() && effective_radius > 0.0) {
            return 0.0;
        }
        let distance = self.position().distance(point);
        if distance >= effective_radius {
            return 0.0;
        }
        let angle_factor = match self.kind {
            LightKind::Point => 1.0,
            LightKind::Directional { .. } if distance == 0.0 => 1.0,
            LightKind::Directional { half_angle } if half_angle <= 0.0 => 0.0,
            LightKind::Directional { half_angle } => {
                let off_axis = angle_delta(self.angle, self.position().angle_to(point)).abs();
                (1.0 - off_axis / half_angle).max(0.0)
            }
        };
        ((1.0 - distance / effective_radius) * angle_factor).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TintState {
    pub tint: Option<Color>,
    pub influence: f32,
    pub source: Option<LightHandle>,
    last_influenced: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TintChange {
    Applied {
        entity: EntityHandle,
        light: LightHandle,
        color: Color,
    },
    Cleared {
        entity: EntityHandle,
    },
}

#[derive(Debug)]
pub struct PointLightInfluenceManager {
    config: PointLightConfig,
    allocator: LightHandleAllocator,
    lights: Vec<PointLight>,
    tints: BTreeMap<EntityHandle, TintState>,
}

impl PointLightInfluenceManager {
    pub fn new(config: PointLightConfig) -> Self {
        let mut tints = BTreeMap::new();
        tints.insert(EntityHandle::OBSERVER, TintState::default());
        Self {
            config,
            allocator: LightHandleAllocator::default(),
            lights: Vec::new(),
            tints,
        }
    }

    pub fn register(&mut self, descriptor: PointLightDescriptor) -> LightHandle {
        let handle = self.allocator.allocate();
        let radius = if descriptor.radius.is_finite() && descriptor.radius > 0.0 {
            descriptor.radius
        } else {
            warn!(
                light = handle.0,
                radius = descriptor.radius,
                "point_light_radius_invalid_no_influence"
            );
            0.0
        };
        let intensity = if descriptor.intensity.is_finite() {
            descriptor.intensity.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let kind = match descriptor.kind {
            LightKind::Directional { half_angle } if !half_angle.is_finite() => {
                warn!(light = handle.0, "point_light_half_angle_invalid_using_point");
                LightKind::Point
            }
            kind => kind,
        };
        let base_angle = normalize_angle(descriptor.angle);
        self.lights.push(PointLight {
            handle,
            x: descriptor.x,
            y: descriptor.y,
            angle: base_angle,
            color: descriptor.color,
            radius,
            intensity,
            kind,
            follow_target: descriptor.follow.map(|binding| binding.target),
            follow_offset: descriptor.follow.map(|binding| binding.offset).unwrap_or_default(),
            base_angle,
        });
        debug!(
            light = handle.0,
            follow = ?descriptor.follow.map(|binding| binding.target.0),
            "point_light_registered"
        );
        handle
    }

    /// Returns false for an unknown handle.
    pub fn unregister(&mut self, handle: LightHandle) -> bool {
        let before = self.lights.len();
        self.lights.retain(|light| light.handle != handle);
        let removed = self.lights.len() != before;
        if removed {
            debug!(light = handle.0, "point_light_unregistered");
        } else {
            warn!(light = handle.0, "point_light_unregister_unknown_handle");
        }
        removed
    }

    pub fn register_tint_target(&mut self, entity: EntityHandle) {
        self.tints.entry(entity).or_default();
    }

    pub fn unregister_tint_target(&mut self, entity: EntityHandle) -> bool {
        self.tints.remove(&entity).is_some()
    }

    pub fn light(&self, handle: LightHandle) -> Option<&PointLight> {
        self.lights.iter().find(|light| light.handle == handle)
    }

    pub fn snapshot(&self) -> &[PointLight] {
        &self.lights
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    pub fn tint_state(&self, entity: EntityHandle) -> Option<&TintState> {
        self.tints.get(&entity)
    }

    pub fn entity_tint(&self, entity: EntityHandle) -> Option<Color> {
        self.tints.get(&entity).and_then(|state| state.tint)
    }

    pub fn sync_follow_targets(&mut self, poses: &impl PoseProvider) {
        for light in &mut self.lights {
            let Some(target) = light.follow_target else {
                continue;
            };
            let Some(pose) = poses.pose(target) else {
                continue;
            };
            if !pose.position.is_finite() {
                continue;
            }
            let position = pose.position.offset(light.follow_offset);
            light.x = position.x;
            light.y = position.y;
            light.angle = normalize_angle(pose.angle + light.base_angle);
        }
    }

    pub fn update_tints(&mut self, poses: &impl PoseProvider, now: Duration) -> Vec<TintChange> {
        let grace = self.config.tint_grace();
        let mut changes = Vec::new();
        for (&entity, state) in &mut self.tints {
            let strongest = poses
                .pose(entity)
                .filter(|pose| pose.position.is_finite())
                .and_then(|pose| {
                    strongest_light(&self.lights, entity, pose.position, &self.config)
                });

            match strongest {
                Some((light, influence)) => {
                    let color = Color::WHITE.lerp(light.color, influence * light.intensity);
                    if state.source != Some(light.handle) || state.tint.is_none() {
                        changes.push(TintChange::Applied {
                            entity,
                            light: light.handle,
                            color,
                        });
                    }
                    state.tint = Some(color);
                    state.influence = influence;
                    state.source = Some(light.handle);
                    state.last_influenced = Some(now);
                }
                None => {
                    state.influence = 0.0;
                    let expired = state
                        .last_influenced
                        .map_or(true, |last| now.saturating_sub(last) >= grace);
                    if state.tint.is_some() && expired {
                        state.tint = None;
                        state.source = None;
                        state.last_influenced = None;
                        changes.push(TintChange::Cleared { entity });
                    }
                }
            }
        }
        changes
    }
}

/// Strongest influence wins, ties go to the nearest light, then to the older handle.
fn strongest_light<'a>(
    lights: &'a [PointLight],
    target: EntityHandle,
    point: Vec2,
    config: &PointLightConfig,
) -> Option<(&'a PointLight, f32)> {
    let mut best: Option<(&PointLight, f32, f32)> = None;
    for light in lights {
        if light.follow_target == Some(target) {
            continue;
        }
        let influence = light.influence_at(point, config.radius_scale);
        if influence <= config.min_influence || influence <= 0.0 {
            continue;
        }
        let distance = light.position().distance(point);
        let better = match best {
            None => true,
            Some((_, best_influence, best_distance)) => {
                influence > best_influence
                    || (influence == best_influence && distance < best_distance)
            }
        };
        if better {
            best = Some((light, influence, distance));
        }
    }
    best.map(|(light, influence, _)| (light, influence))
}
