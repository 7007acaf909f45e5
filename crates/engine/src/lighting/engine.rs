use std::time::Duration;

use tracing::{info, warn};

use super::beam::{BeamGeometryEngine, BeamState, BeamStrategy, MaskDescriptor};
use super::config::{millis_to_duration, LightingConfig, ZoneLevelConfig};
use super::geometry::{Color, Pose, Vec2};
use super::map::MapLighting;
use super::mask::AlphaMask;
use super::point_lights::{
    EntityHandle, LightHandle, PointLight, PointLightDescriptor, PointLightInfluenceManager,
    PoseProvider, PoseTable, TintChange,
};
use super::resolver::{MotionSampledZoneResolver, ZoneChangeEvent};
use super::state::LightingState;
use super::transition::TransitionController;
use super::zones::{ZoneDescriptor, ZoneLoadIssue, ZoneRegistry, ZoneType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightingSystemId {
    ZoneResolution,
    AmbientTransition,
    BeamGeometry,
    FollowLightSync,
    TintUpdate,
}

impl LightingSystemId {
    pub fn name(self) -> &'static str {
        match self {
            Self::ZoneResolution => "ZoneResolution",
            Self::AmbientTransition => "AmbientTransition",
            Self::BeamGeometry => "BeamGeometry",
            Self::FollowLightSync => "FollowLightSync",
            Self::TintUpdate => "TintUpdate",
        }
    }
}

pub const LIGHTING_SYSTEM_ORDER: [LightingSystemId; 5] = [
    LightingSystemId::ZoneResolution,
    LightingSystemId::AmbientTransition,
    LightingSystemId::BeamGeometry,
    LightingSystemId::FollowLightSync,
    LightingSystemId::TintUpdate,
];

#[derive(Debug, Clone, PartialEq)]
pub enum LightingEvent {
    ZoneChanged {
        zone_type: ZoneType,
        level: f32,
        entering_darkness: bool,
        duration: Duration,
    },
    BeamBatteryDepleted,
    TintApplied {
        entity: EntityHandle,
        light: LightHandle,
        color: Color,
    },
    TintCleared {
        entity: EntityHandle,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub events: Vec<LightingEvent>,
    /// Engine clock after this tick.
    pub now: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LightingDebugSnapshot {
    pub ambient_level: f32,
    pub target_level: f32,
    pub zone_type: ZoneType,
    pub remembered_zone: Option<(ZoneType, f32)>,
    pub transition_progress: Option<f32>,
    pub persistent_mode: bool,
    pub beam_enabled: bool,
    pub beam_strategy: BeamStrategy,
    pub battery_fraction: Option<f32>,
    pub zone_count: usize,
    pub light_count: usize,
    pub system_order: String,
}

impl LightingDebugSnapshot {
    pub fn render_lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(6);
        lines.push(format!(
            "amb: {:.3} -> {:.3}",
            self.ambient_level, self.target_level
        ));
        let remembered = match self.remembered_zone {
            Some((zone_type, level)) => format!("{zone_type} {level:.2}"),
            None => "none".to_string(),
        };
        lines.push(format!(
            "zone: {} keep: {} persist: {}",
            self.zone_type, remembered, self.persistent_mode
        ));
        if let Some(progress) = self.transition_progress {
            lines.push(format!("tr: {:.0}%", progress * 100.0));
        }
        let strategy = match self.beam_strategy {
            BeamStrategy::Procedural => "cone",
            BeamStrategy::ImageMask => "image",
        };
        let mut beam = format!(
            "beam: {} {}",
            if self.beam_enabled { "on" } else { "off" },
            strategy
        );
        if let Some(fraction) = self.battery_fraction {
            beam.push_str(&format!(" bat: {:.0}%", fraction * 100.0));
        }
        lines.push(beam);
        lines.push(format!(
            "zones: {} lights: {}",
            self.zone_count, self.light_count
        ));
        lines.push(format!("sys: {}", self.system_order));
        lines
    }
}

/// Owns every lighting component for one scene and runs them once per tick.
#[derive(Debug)]
pub struct LightingEngine {
    config: LightingConfig,
    levels: ZoneLevelConfig,
    registry: ZoneRegistry,
    resolver: MotionSampledZoneResolver,
    transitions: TransitionController,
    state: LightingState,
    beam: BeamGeometryEngine,
    lights: PointLightInfluenceManager,
    map_lights: Vec<LightHandle>,
    poses: PoseTable,
    observer: Option<Vec2>,
    emitter: Pose,
    now: Duration,
    last_tick_order: Vec<LightingSystemId>,
}

impl Default for LightingEngine {
    fn default() -> Self {
        Self::new(LightingConfig::default())
    }
}

impl LightingEngine {
    pub fn new(config: LightingConfig) -> Self {
        let config = config.sanitized();
        let levels = config.zones;
        let engine = Self {
            registry: ZoneRegistry::default(),
            resolver: MotionSampledZoneResolver::new(config.resolver, levels.default),
            transitions: TransitionController::new(config.transition),
            state: LightingState::new(levels.default, config.persistent_mode),
            beam: BeamGeometryEngine::new(config.beam.clone()),
            lights: PointLightInfluenceManager::new(config.point_lights),
            map_lights: Vec::new(),
            poses: PoseTable::default(),
            observer: None,
            emitter: Pose::default(),
            now: Duration::ZERO,
            last_tick_order: Vec::with_capacity(LIGHTING_SYSTEM_ORDER.len()),
            levels,
            config,
        };
        info!(
            default_level = engine.levels.default,
            persistent_mode = engine.state.persistent_mode(),
            beam_strategy = ?engine.beam.strategy(),
            "lighting_engine_ready"
        );
        engine
    }

    pub fn config(&self) -> &LightingConfig {
        &self.config
    }

    /// Replaces the zone set. Malformed descriptors are skipped and kept as issues.
    pub fn load_zones(&mut self, descriptors: Vec<ZoneDescriptor>) {
        self.registry = ZoneRegistry::load(descriptors, &self.levels);
    }

    /// Applies a map's ambient level, swaps its static lights and loads its zones.
    pub fn load_map(&mut self, map: MapLighting) {
        let default_level = match map.ambient {
            Some(ambient) if ambient.darkness.is_finite() => {
                if !(0.0..=1.0).contains(&ambient.darkness) {
                    warn!(darkness = ambient.darkness, "ambient_darkness_clamped");
                }
                ambient.darkness.clamp(0.0, 1.0)
            }
            Some(ambient) => {
                warn!(darkness = ambient.darkness, "ambient_darkness_invalid_ignored");
                self.config.zones.default
            }
            None => self.config.zones.default,
        };
        self.levels.default = default_level;
        self.resolver.set_default_level(default_level);
        self.state.rebase_default_level(default_level);

        for handle in self.map_lights.drain(..) {
            self.lights.unregister(handle);
        }
        let light_count = map.lights.len();
        for descriptor in map.lights {
            let handle = self.lights.register(descriptor);
            self.map_lights.push(handle);
        }

        self.load_zones(map.zones);
        info!(
            zone_count = self.registry.len(),
            light_count,
            default_level,
            "map_lighting_loaded"
        );
    }

    pub fn set_observer_position(&mut self, x: f32, y: f32) {
        let position = Vec2::new(x, y);
        self.observer = Some(position);
        let angle = self
            .poses
            .pose(EntityHandle::OBSERVER)
            .map_or(0.0, |pose| pose.angle);
        self.poses.set(EntityHandle::OBSERVER, Pose { position, angle });
    }

    pub fn set_emitter_pose(&mut self, x: f32, y: f32, angle: f32) {
        self.emitter = Pose::new(x, y, angle);
    }

    /// Pose of a follow target or tint target for the coming tick.
    pub fn set_entity_pose(&mut self, entity: EntityHandle, pose: Pose) {
        if entity == EntityHandle::OBSERVER {
            self.observer = Some(pose.position);
        }
        self.poses.set(entity, pose);
    }

    pub fn clear_entity_pose(&mut self, entity: EntityHandle) {
        if entity == EntityHandle::OBSERVER {
            self.observer = None;
        }
        self.poses.remove(entity);
    }

    pub fn update(&mut self, delta_ms: f32) -> TickReport {
        let delta = if delta_ms.is_finite() && delta_ms >= 0.0 {
            millis_to_duration(delta_ms)
        } else {
            warn!(delta_ms, "tick_delta_invalid_treated_as_zero");
            Duration::ZERO
        };
        self.now += delta;

        let mut events = Vec::new();
        let mut zone_change: Option<ZoneChangeEvent> = None;
        self.last_tick_order.clear();
        for system_id in LIGHTING_SYSTEM_ORDER {
            self.last_tick_order.push(system_id);
            match system_id {
                LightingSystemId::ZoneResolution => {
                    if let (true, Some(observer)) = (self.registry.is_loaded(), self.observer) {
                        zone_change = self
                            .resolver
                            .resolve(&self.registry, &mut self.state, observer)
                            .event;
                    }
                }
                LightingSystemId::AmbientTransition => {
                    if let Some(change) = zone_change.take() {
                        let duration = self
                            .transitions
                            .duration_for(&change, self.state.current_level());
                        self.transitions.begin(&mut self.state, &change, self.now);
                        events.push(LightingEvent::ZoneChanged {
                            zone_type: change.new_type,
                            level: change.new_level,
                            entering_darkness: change.entering_darkness,
                            duration,
                        });
                    }
                    self.transitions.advance(&mut self.state, self.now);
                }
                LightingSystemId::BeamGeometry => {
                    if self.beam.update(self.emitter, delta) {
                        events.push(LightingEvent::BeamBatteryDepleted);
                    }
                }
                LightingSystemId::FollowLightSync => {
                    self.lights.sync_follow_targets(&self.poses);
                }
                LightingSystemId::TintUpdate => {
                    for change in self.lights.update_tints(&self.poses, self.now) {
                        events.push(match change {
                            TintChange::Applied {
                                entity,
                                light,
                                color,
                            } => LightingEvent::TintApplied {
                                entity,
                                light,
                                color,
                            },
                            TintChange::Cleared { entity } => LightingEvent::TintCleared { entity },
                        });
                    }
                }
            }
        }

        TickReport {
            events,
            now: self.now,
        }
    }

    pub fn register_point_light(&mut self, descriptor: PointLightDescriptor) -> LightHandle {
        self.lights.register(descriptor)
    }

    pub fn unregister_point_light(&mut self, handle: LightHandle) -> bool {
        self.map_lights.retain(|map_handle| *map_handle != handle);
        self.lights.unregister(handle)
    }

    pub fn register_tint_target(&mut self, entity: EntityHandle) {
        self.lights.register_tint_target(entity);
    }

    pub fn unregister_tint_target(&mut self, entity: EntityHandle) -> bool {
        self.lights.unregister_tint_target(entity)
    }

    pub fn set_beam_enabled(&mut self, enabled: bool) -> bool {
        self.beam.set_enabled(enabled)
    }

    pub fn toggle_beam(&mut self) -> bool {
        self.beam.toggle()
    }

    pub fn set_beam_mask(&mut self, mask: Option<AlphaMask>) {
        let units_per_pixel = self
            .config
            .beam
            .mask
            .as_ref()
            .map_or(1.0, |mask_config| mask_config.units_per_pixel);
        self.beam.set_mask(mask, units_per_pixel);
    }

    pub fn set_persistent_mode(&mut self, persistent_mode: bool) {
        self.state.set_persistent_mode(persistent_mode);
    }

    pub fn current_ambient_level(&self) -> f32 {
        self.state.current_level()
    }

    pub fn target_ambient_level(&self) -> f32 {
        self.state.target_level()
    }

    pub fn current_zone_type(&self) -> ZoneType {
        self.state.current_zone_type()
    }

    pub fn current_beam_mask(&self) -> &MaskDescriptor {
        self.beam.mask()
    }

    pub fn beam_state(&self) -> &BeamState {
        self.beam.state()
    }

    pub fn battery_fraction(&self) -> Option<f32> {
        self.beam.battery().map(|battery| battery.fraction())
    }

    pub fn point_light_snapshot(&self) -> &[PointLight] {
        self.lights.snapshot()
    }

    pub fn entity_tint(&self, entity: EntityHandle) -> Option<Color> {
        self.lights.entity_tint(entity)
    }

    pub fn state(&self) -> &LightingState {
        &self.state
    }

    pub fn zone_registry(&self) -> &ZoneRegistry {
        &self.registry
    }

    pub fn zone_issues(&self) -> &[ZoneLoadIssue] {
        self.registry.issues()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn last_tick_order(&self) -> &[LightingSystemId] {
        &self.last_tick_order
    }

    pub fn debug_snapshot(&self) -> LightingDebugSnapshot {
        LightingDebugSnapshot {
            ambient_level: self.state.current_level(),
            target_level: self.state.target_level(),
            zone_type: self.state.current_zone_type(),
            remembered_zone: self.state.last_non_default(),
            transition_progress: self
                .state
                .transition()
                .map(|transition| transition.progress(self.now)),
            persistent_mode: self.state.persistent_mode(),
            beam_enabled: self.beam.is_enabled(),
            beam_strategy: self.beam.strategy(),
            battery_fraction: self.battery_fraction(),
            zone_count: self.registry.len(),
            light_count: self.lights.len(),
            system_order: self
                .last_tick_order
                .iter()
                .map(|system_id| system_id.name())
                .collect::<Vec<_>>()
                .join(">"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use super::*;
    use crate::lighting::config::{BatteryConfig, BeamConfig, TransitionConfig};
    use crate::lighting::map::AmbientDescriptor;

    const TICK_MS: f32 = 16.0;

    fn engine_with_fixed_duration(duration_ms: f32) -> LightingEngine {
        LightingEngine::new(LightingConfig {
            transition: TransitionConfig {
                min_duration_ms: duration_ms,
                max_duration_ms: duration_ms,
                ..TransitionConfig::default()
            },
            ..LightingConfig::default()
        })
    }

    fn zone_changes(report: &TickReport) -> Vec<ZoneType> {
        report
            .events
            .iter()
            .filter_map(|event| match event {
                LightingEvent::ZoneChanged { zone_type, .. } => Some(*zone_type),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn queries_before_load_return_defaults() {
        let mut engine = LightingEngine::default();
        assert_eq!(engine.current_ambient_level(), 0.35);
        assert_eq!(engine.current_zone_type(), ZoneType::Default);
        assert!(engine.current_beam_mask().is_empty());
        assert!(engine.point_light_snapshot().is_empty());
        assert!(engine.last_tick_order().is_empty());

        engine.set_observer_position(10.0, 10.0);
        let report = engine.update(TICK_MS);
        assert!(zone_changes(&report).is_empty());
        assert_eq!(engine.current_ambient_level(), 0.35);
    }

    #[test]
    fn systems_run_in_fixed_order_every_tick() {
        let mut engine = LightingEngine::default();
        engine.update(TICK_MS);
        assert_eq!(engine.last_tick_order(), LIGHTING_SYSTEM_ORDER.as_slice());
        engine.update(TICK_MS);
        assert_eq!(engine.last_tick_order().len(), 5);
        assert_eq!(
            engine.debug_snapshot().system_order,
            "ZoneResolution>AmbientTransition>BeamGeometry>FollowLightSync>TintUpdate"
        );
    }

    #[test]
    fn entering_dark_zone_reaches_level_on_schedule() {
        let mut engine = engine_with_fixed_duration(1000.0);
        engine.load_zones(vec![ZoneDescriptor::new(0.0, 0.0, 100.0, 100.0, "dark")]);
        engine.set_observer_position(50.0, 50.0);

        let report = engine.update(0.0);
        assert_eq!(
            report.events,
            vec![LightingEvent::ZoneChanged {
                zone_type: ZoneType::Dark,
                level: 0.8,
                entering_darkness: true,
                duration: Duration::from_millis(1000),
            }]
        );

        engine.update(500.0);
        let midway = engine.current_ambient_level();
        assert!(midway > 0.35 && midway < 0.8, "midway {midway}");

        let report = engine.update(500.0);
        assert_eq!(report.now, Duration::from_millis(1000));
        assert_eq!(engine.current_ambient_level(), 0.8);
        assert!(zone_changes(&report).is_empty());
    }

    #[test]
    fn fast_jump_across_thin_black_zone_is_detected() {
        let mut engine = LightingEngine::default();
        engine.load_zones(vec![ZoneDescriptor::new(240.0, 0.0, 20.0, 300.0, "black")]);
        engine.set_observer_position(0.0, 100.0);
        engine.update(TICK_MS);
        assert_eq!(engine.current_zone_type(), ZoneType::Default);

        engine.set_observer_position(500.0, 100.0);
        let report = engine.update(TICK_MS);
        assert_eq!(zone_changes(&report), vec![ZoneType::Black]);
        assert_eq!(engine.current_zone_type(), ZoneType::Black);
        assert_eq!(engine.target_ambient_level(), 0.97);
    }

    #[test]
    fn very_long_jump_still_detects_thin_zone() {
        let mut engine = LightingEngine::default();
        engine.load_zones(vec![ZoneDescriptor::new(2480.0, 0.0, 20.0, 300.0, "black")]);
        engine.set_observer_position(0.0, 100.0);
        engine.update(TICK_MS);

        engine.set_observer_position(5000.0, 100.0);
        let report = engine.update(TICK_MS);
        assert_eq!(zone_changes(&report), vec![ZoneType::Black]);
        assert_eq!(engine.current_zone_type(), ZoneType::Black);
    }

    #[test]
    fn inverted_duration_band_is_repaired_at_construction() {
        let mut engine = LightingEngine::new(LightingConfig {
            transition: TransitionConfig {
                min_duration_ms: 500.0,
                max_duration_ms: 100.0,
                ..TransitionConfig::default()
            },
            ..LightingConfig::default()
        });
        assert_eq!(engine.config().transition.max_duration_ms, 500.0);

        engine.load_zones(vec![ZoneDescriptor::new(0.0, 0.0, 100.0, 100.0, "dark")]);
        engine.set_observer_position(50.0, 50.0);
        let report = engine.update(TICK_MS);
        assert_eq!(
            report.events,
            vec![LightingEvent::ZoneChanged {
                zone_type: ZoneType::Dark,
                level: 0.8,
                entering_darkness: true,
                duration: Duration::from_millis(500),
            }]
        );
        engine.update(500.0);
        assert_eq!(engine.current_ambient_level(), 0.8);
    }

    #[test]
    fn persistence_toggle_changes_no_zone_fallback() {
        let mut engine = LightingEngine::default();
        engine.load_zones(vec![ZoneDescriptor::new(0.0, 0.0, 100.0, 100.0, "dark")]);
        engine.set_observer_position(50.0, 50.0);
        engine.update(TICK_MS);
        engine.set_observer_position(130.0, 50.0);
        engine.update(TICK_MS);
        engine.update(TICK_MS);
        assert_eq!(engine.current_zone_type(), ZoneType::Dark);

        engine.set_persistent_mode(false);
        let report = engine.update(TICK_MS);
        assert_eq!(zone_changes(&report), vec![ZoneType::Default]);
        assert_eq!(engine.target_ambient_level(), 0.35);
    }

    #[test]
    fn beam_follows_emitter_pose() {
        let mut engine = LightingEngine::default();
        assert!(engine.set_beam_enabled(true));
        engine.set_emitter_pose(100.0, 100.0, 0.0);
        engine.update(TICK_MS);
        let MaskDescriptor::Cone(cone) = engine.current_beam_mask() else {
            panic!("expected cone mask");
        };
        assert_eq!(cone.apex, Vec2::new(100.0, 100.0));
        assert!((cone.half_angle.to_degrees() - 36.0).abs() < 1e-3);
        assert!((cone.facing().x - 1.0).abs() < 1e-6);

        engine.set_emitter_pose(100.0, 100.0, PI);
        engine.update(TICK_MS);
        let MaskDescriptor::Cone(cone) = engine.current_beam_mask() else {
            panic!("expected cone mask");
        };
        assert_eq!(cone.apex, Vec2::new(100.0, 100.0));
        assert!((cone.facing().x + 1.0).abs() < 1e-6);

        assert!(!engine.toggle_beam());
        assert!(engine.current_beam_mask().is_empty());
        assert_eq!(engine.beam_state().origin(), Vec2::new(100.0, 100.0));
    }

    #[test]
    fn drained_battery_reports_event_and_disables_beam() {
        let mut engine = LightingEngine::new(LightingConfig {
            beam: BeamConfig {
                enabled_at_start: true,
                battery: Some(BatteryConfig {
                    capacity_seconds: 0.1,
                    ..BatteryConfig::default()
                }),
                ..BeamConfig::default()
            },
            ..LightingConfig::default()
        });
        assert_eq!(engine.battery_fraction(), Some(1.0));
        let report = engine.update(150.0);
        assert!(report.events.contains(&LightingEvent::BeamBatteryDepleted));
        assert!(engine.current_beam_mask().is_empty());
        assert!(!engine.set_beam_enabled(true));
        assert_eq!(engine.battery_fraction(), Some(0.0));
    }

    #[test]
    fn nearby_light_tints_observer_and_reports_it() {
        let mut engine = LightingEngine::default();
        let handle = engine.register_point_light(PointLightDescriptor::point(
            0.0,
            0.0,
            100.0,
            Color::rgb(255, 0, 0),
        ));
        engine.set_observer_position(50.0, 0.0);
        let report = engine.update(TICK_MS);
        assert_eq!(
            report.events,
            vec![LightingEvent::TintApplied {
                entity: EntityHandle::OBSERVER,
                light: handle,
                color: Color::rgb(255, 128, 128),
            }]
        );
        assert_eq!(
            engine.entity_tint(EntityHandle::OBSERVER),
            Some(Color::rgb(255, 128, 128))
        );

        assert!(engine.unregister_point_light(handle));
        engine.update(TICK_MS);
        let report = engine.update(200.0);
        assert_eq!(
            report.events,
            vec![LightingEvent::TintCleared {
                entity: EntityHandle::OBSERVER
            }]
        );
    }

    #[test]
    fn follow_light_tints_other_targets_only() {
        let mut engine = LightingEngine::default();
        let npc = EntityHandle(42);
        engine.register_tint_target(npc);
        engine.register_point_light(
            PointLightDescriptor::point(0.0, 0.0, 80.0, Color::rgb(0, 0, 255))
                .following(EntityHandle::OBSERVER, Vec2::new(0.0, -4.0)),
        );
        engine.set_observer_position(200.0, 200.0);
        engine.set_entity_pose(npc, Pose::new(210.0, 200.0, 0.0));
        engine.update(TICK_MS);

        let light = &engine.point_light_snapshot()[0];
        assert_eq!(light.position(), Vec2::new(200.0, 196.0));
        assert_eq!(engine.entity_tint(EntityHandle::OBSERVER), None);
        assert!(engine.entity_tint(npc).is_some());
    }

    #[test]
    fn map_ambient_sets_default_level_and_lights_are_replaced() {
        let mut engine = LightingEngine::default();
        let runtime = engine.register_point_light(PointLightDescriptor::point(
            0.0,
            0.0,
            10.0,
            Color::WHITE,
        ));
        engine.load_map(MapLighting {
            zones: vec![ZoneDescriptor::new(0.0, 0.0, 10.0, 10.0, "dim")],
            lights: vec![PointLightDescriptor::point(5.0, 5.0, 20.0, Color::WHITE)],
            ambient: Some(AmbientDescriptor { darkness: 0.6 }),
        });
        assert_eq!(engine.current_ambient_level(), 0.6);
        assert_eq!(engine.point_light_snapshot().len(), 2);

        engine.load_map(MapLighting::with_zones(Vec::new()));
        assert_eq!(engine.current_ambient_level(), 0.35);
        let remaining: Vec<_> = engine
            .point_light_snapshot()
            .iter()
            .map(|light| light.handle)
            .collect();
        assert_eq!(remaining, vec![runtime]);
    }

    #[test]
    fn malformed_zones_are_reported_not_fatal() {
        let mut engine = LightingEngine::default();
        let mut missing_height = ZoneDescriptor::new(0.0, 0.0, 10.0, 10.0, "dark");
        missing_height.height = None;
        engine.load_zones(vec![
            missing_height,
            ZoneDescriptor::new(0.0, 0.0, 0.0, 10.0, "dark"),
            ZoneDescriptor::new(20.0, 0.0, 10.0, 10.0, "dark"),
        ]);
        assert_eq!(engine.zone_registry().len(), 1);
        assert_eq!(engine.zone_issues().len(), 2);
    }

    #[test]
    fn invalid_delta_does_not_advance_clock() {
        let mut engine = LightingEngine::default();
        engine.update(100.0);
        engine.update(-5.0);
        let report = engine.update(f32::NAN);
        assert_eq!(report.now, Duration::from_millis(100));
    }

    #[test]
    fn debug_snapshot_renders_hud_lines() {
        let mut engine = engine_with_fixed_duration(1000.0);
        engine.load_zones(vec![ZoneDescriptor::new(0.0, 0.0, 100.0, 100.0, "dark")]);
        engine.set_observer_position(50.0, 50.0);
        engine.update(0.0);
        engine.update(250.0);
        let snapshot = engine.debug_snapshot();
        assert_eq!(snapshot.zone_type, ZoneType::Dark);
        assert_eq!(snapshot.remembered_zone, Some((ZoneType::Dark, 0.8)));
        assert_eq!(snapshot.transition_progress, Some(0.25));

        let lines = snapshot.render_lines();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[1], "zone: dark keep: dark 0.80 persist: true");
        assert_eq!(lines[2], "tr: 25%");
        assert_eq!(lines[3], "beam: off cone");
        assert!(lines[5].starts_with("sys: ZoneResolution>"));
    }
}
