use tracing::{debug, warn};

use super::config::ResolverConfig;
use super::geometry::Vec2;
use super::state::LightingState;
use super::zones::{Zone, ZoneRegistry, ZoneType};

const LEVEL_EPSILON: f32 = 1e-4;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionSample {
    pub distance: f32,
    pub is_vertical: bool,
    pub is_high_speed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    /// A zone was found at one of this tick's sample points.
    Zone,
    /// Nothing found; the remembered non-default zone keeps governing.
    Retained,
    /// Nothing found and nothing to retain.
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneResolution {
    pub zone_type: ZoneType,
    pub level: f32,
    pub source: ResolutionSource,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneChangeEvent {
    pub new_type: ZoneType,
    pub new_level: f32,
    pub entering_darkness: bool,
    pub distance_moved: f32,
    pub is_vertical: bool,
    pub is_high_speed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolverOutcome {
    pub resolution: ZoneResolution,
    pub motion: MotionSample,
    pub sample_count: usize,
    pub event: Option<ZoneChangeEvent>,
}

#[derive(Debug, Clone)]
pub struct MotionSampledZoneResolver {
    config: ResolverConfig,
    default_level: f32,
}

impl MotionSampledZoneResolver {
    pub fn new(config: ResolverConfig, default_level: f32) -> Self {
        Self {
            config,
            default_level,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn default_level(&self) -> f32 {
        self.default_level
    }

    pub fn set_default_level(&mut self, level: f32) {
        self.default_level = level;
    }

    pub fn classify_motion(&self, prev: Option<Vec2>, current: Vec2) -> MotionSample {
        let Some(prev) = prev else {
            return MotionSample::default();
        };
        let dx = current.x - prev.x;
        let dy = current.y - prev.y;
        let distance = prev.distance(current);
        MotionSample {
            distance,
            is_vertical: dy.abs() > self.config.vertical_ratio * dx.abs(),
            is_high_speed: distance > self.config.high_speed_threshold,
        }
    }

    fn wanted_samples(&self, motion: MotionSample) -> usize {
        let spacing = match (motion.is_vertical, motion.is_high_speed) {
            (true, true) => self.config.vertical_fast_spacing,
            (true, false) => self.config.vertical_spacing,
            _ => self.config.fast_spacing,
        };
        (motion.distance / spacing).ceil() as usize
    }

    /// True when `max_samples` leaves gaps wider than the configured spacing.
    pub fn is_sampling_capped(&self, motion: MotionSample) -> bool {
        motion.distance > 0.0
            && (motion.is_high_speed || motion.is_vertical)
            && self.wanted_samples(motion) > self.config.max_samples
    }

    /// Interpolated points strictly between `prev` and `current` in travel order,
    /// followed by `current`.
    pub fn sample_points(
        &self,
        prev: Option<Vec2>,
        current: Vec2,
        motion: MotionSample,
    ) -> Vec<Vec2> {
        let Some(prev) = prev else {
            return vec![current];
        };
        if motion.distance <= 0.0 || !(motion.is_high_speed || motion.is_vertical) {
            return vec![current];
        }

        let intermediate = self
            .wanted_samples(motion)
            .min(self.config.max_samples)
            .max(1);

        let mut points = Vec::with_capacity(intermediate + 1);
        for step in 1..=intermediate {
            let t = step as f32 / (intermediate + 1) as f32;
            points.push(prev.lerp(current, t));
        }
        points.push(current);
        points
    }

    /// Decides which zone governs the observer this tick and records `current`
    /// as the previous position for the next one.
    pub fn resolve(
        &self,
        registry: &ZoneRegistry,
        state: &mut LightingState,
        current: Vec2,
    ) -> ResolverOutcome {
        if !current.is_finite() {
            warn!(
                x = current.x,
                y = current.y,
                "observer_position_not_finite_ignored"
            );
            return ResolverOutcome {
                resolution: ZoneResolution {
                    zone_type: state.current_zone_type,
                    level: state.target_level,
                    source: ResolutionSource::Retained,
                },
                motion: MotionSample::default(),
                sample_count: 0,
                event: None,
            };
        }

        let motion = self.classify_motion(state.prev_observer_pos, current);
        let samples = self.sample_points(state.prev_observer_pos, current, motion);

        let mut best: Option<&Zone> = None;
        let mut explicit_default: Option<&Zone> = None;
        for point in &samples {
            let Some(zone) = registry.query(*point) else {
                continue;
            };
            if zone.zone_type() == ZoneType::Default {
                explicit_default.get_or_insert(zone);
                continue;
            }
            match best {
                Some(current_best) if !zone.outranks(current_best) => {}
                _ => best = Some(zone),
            }
        }

        // Capped sampling can step over thin zones; clip the whole path instead.
        if let Some(prev) = state.prev_observer_pos {
            if self.is_sampling_capped(motion) {
                let crossed = registry
                    .query_segment(prev, current)
                    .filter(|zone| zone.zone_type() != ZoneType::Default);
                if let Some(zone) = crossed {
                    match best {
                        Some(current_best) if !zone.outranks(current_best) => {}
                        _ => best = Some(zone),
                    }
                }
            }
        }

        let resolution = match (best, explicit_default) {
            (Some(zone), _) | (None, Some(zone)) => ZoneResolution {
                zone_type: zone.zone_type(),
                level: zone.darkness_level(),
                source: ResolutionSource::Zone,
            },
            (None, None) => match state.last_non_default() {
                Some((zone_type, level)) if state.persistent_mode => ZoneResolution {
                    zone_type,
                    level,
                    source: ResolutionSource::Retained,
                },
                _ => ZoneResolution {
                    zone_type: ZoneType::Default,
                    level: self.default_level,
                    source: ResolutionSource::Fallback,
                },
            },
        };

        let changed = resolution.zone_type != state.current_zone_type
            || (resolution.level - state.target_level).abs() > LEVEL_EPSILON;
        let event = changed.then(|| ZoneChangeEvent {
            new_type: resolution.zone_type,
            new_level: resolution.level,
            entering_darkness: resolution.level > state.current_level,
            distance_moved: motion.distance,
            is_vertical: motion.is_vertical,
            is_high_speed: motion.is_high_speed,
        });

        if let Some(event) = &event {
            debug!(
                from = %state.current_zone_type,
                to = %event.new_type,
                level = event.new_level,
                distance = event.distance_moved,
                samples = samples.len(),
                source = ?resolution.source,
                "zone_change_resolved"
            );
        }

        state.prev_observer_pos = Some(current);

        ResolverOutcome {
            resolution,
            motion,
            sample_count: samples.len(),
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lighting::config::ZoneLevelConfig;
    use crate::lighting::zones::ZoneDescriptor;

    fn registry(descriptors: Vec<ZoneDescriptor>) -> ZoneRegistry {
        ZoneRegistry::load(descriptors, &ZoneLevelConfig::default())
    }

    fn resolver() -> MotionSampledZoneResolver {
        MotionSampledZoneResolver::new(
            ResolverConfig::default(),
            ZoneLevelConfig::default().default,
        )
    }

    fn fresh_state(persistent_mode: bool) -> LightingState {
        LightingState::new(ZoneLevelConfig::default().default, persistent_mode)
    }

    /// Applies the resolved zone the way the transition controller would, minus timing.
    fn settle(state: &mut LightingState, outcome: &ResolverOutcome) {
        if let Some(event) = outcome.event {
            state.current_zone_type = event.new_type;
            state.target_level = event.new_level;
            state.current_level = event.new_level;
            if event.new_type != ZoneType::Default {
                state.last_non_default_zone_type = Some(event.new_type);
                state.last_non_default_zone_level = event.new_level;
            }
        }
    }

    #[test]
    fn first_tick_samples_only_current_position() {
        let resolver = resolver();
        let motion = resolver.classify_motion(None, Vec2::new(50.0, 50.0));
        assert_eq!(motion, MotionSample::default());
        assert_eq!(
            resolver.sample_points(None, Vec2::new(50.0, 50.0), motion),
            vec![Vec2::new(50.0, 50.0)]
        );
    }

    #[test]
    fn slow_horizontal_motion_is_not_subsampled() {
        let resolver = resolver();
        let prev = Some(Vec2::new(0.0, 0.0));
        let current = Vec2::new(5.0, 1.0);
        let motion = resolver.classify_motion(prev, current);
        assert!(!motion.is_vertical);
        assert!(!motion.is_high_speed);
        assert_eq!(resolver.sample_points(prev, current, motion).len(), 1);
    }

    #[test]
    fn vertical_high_speed_motion_samples_densest() {
        let resolver = resolver();
        let prev = Some(Vec2::new(0.0, 0.0));
        let vertical = resolver.classify_motion(prev, Vec2::new(0.0, 200.0));
        let horizontal = resolver.classify_motion(prev, Vec2::new(200.0, 0.0));
        assert!(vertical.is_vertical && vertical.is_high_speed);
        assert!(!horizontal.is_vertical && horizontal.is_high_speed);
        let vertical_samples = resolver.sample_points(prev, Vec2::new(0.0, 200.0), vertical);
        let horizontal_samples = resolver.sample_points(prev, Vec2::new(200.0, 0.0), horizontal);
        assert_eq!(vertical_samples.len(), 50 + 1);
        assert_eq!(horizontal_samples.len(), 25 + 1);
        assert_eq!(*vertical_samples.last().expect("last"), Vec2::new(0.0, 200.0));
    }

    #[test]
    fn sample_count_is_capped() {
        let resolver = resolver();
        let prev = Some(Vec2::new(0.0, 0.0));
        let current = Vec2::new(0.0, 100_000.0);
        let motion = resolver.classify_motion(prev, current);
        assert_eq!(resolver.sample_points(prev, current, motion).len(), 121);
    }

    #[test]
    fn jump_across_thin_zone_is_detected() {
        let registry = registry(vec![ZoneDescriptor::new(240.0, 0.0, 20.0, 300.0, "black")]);
        let resolver = resolver();
        let mut state = fresh_state(true);
        resolver.resolve(&registry, &mut state, Vec2::new(0.0, 100.0));
        let outcome = resolver.resolve(&registry, &mut state, Vec2::new(500.0, 100.0));
        assert_eq!(outcome.resolution.zone_type, ZoneType::Black);
        let event = outcome.event.expect("zone change");
        assert_eq!(event.new_type, ZoneType::Black);
        assert!(event.entering_darkness);
        assert!(event.is_high_speed);
        assert_eq!(event.distance_moved, 500.0);
        assert_eq!(state.prev_observer_pos(), Some(Vec2::new(500.0, 100.0)));
    }

    #[test]
    fn thin_zone_detection_scales_with_displacement() {
        let resolver = resolver();
        for jump in [60.0f32, 150.0, 400.0, 900.0] {
            let zone_x = jump * 0.5 - 5.0;
            let registry = registry(vec![ZoneDescriptor::new(zone_x, -50.0, 10.0, 100.0, "dark")]);
            let mut state = fresh_state(true);
            resolver.resolve(&registry, &mut state, Vec2::new(0.0, 0.0));
            let outcome = resolver.resolve(&registry, &mut state, Vec2::new(jump, 0.0));
            assert_eq!(outcome.resolution.zone_type, ZoneType::Dark, "jump {jump}");
        }
    }

    #[test]
    fn long_jump_past_sample_cap_still_crosses_thin_zone() {
        let registry = registry(vec![ZoneDescriptor::new(2480.0, 0.0, 20.0, 300.0, "black")]);
        let resolver = resolver();
        let mut state = fresh_state(false);
        resolver.resolve(&registry, &mut state, Vec2::new(0.0, 100.0));

        let from = Some(Vec2::new(0.0, 100.0));
        let motion = resolver.classify_motion(from, Vec2::new(5000.0, 100.0));
        assert!(resolver.is_sampling_capped(motion));
        let samples = resolver.sample_points(from, Vec2::new(5000.0, 100.0), motion);
        assert!(samples.iter().all(|point| registry.query(*point).is_none()));

        let outcome = resolver.resolve(&registry, &mut state, Vec2::new(5000.0, 100.0));
        assert_eq!(outcome.resolution.zone_type, ZoneType::Black);
        assert_eq!(outcome.event.expect("zone change").new_type, ZoneType::Black);
    }

    #[test]
    fn uncapped_motion_does_not_clip_whole_path() {
        let resolver = resolver();
        let from = Some(Vec2::new(0.0, 0.0));
        let short = resolver.classify_motion(from, Vec2::new(500.0, 0.0));
        assert!(!resolver.is_sampling_capped(short));
        let slow = resolver.classify_motion(from, Vec2::new(5.0, 0.0));
        assert!(!resolver.is_sampling_capped(slow));
    }

    #[test]
    fn bright_anywhere_on_path_beats_dark_at_destination() {
        let registry = registry(vec![
            ZoneDescriptor::new(100.0, -10.0, 10.0, 20.0, "bright"),
            ZoneDescriptor::new(280.0, -50.0, 100.0, 100.0, "dark"),
        ]);
        let resolver = resolver();
        let mut state = fresh_state(true);
        resolver.resolve(&registry, &mut state, Vec2::new(0.0, 0.0));
        let outcome = resolver.resolve(&registry, &mut state, Vec2::new(300.0, 0.0));
        assert_eq!(outcome.resolution.zone_type, ZoneType::Bright);
    }

    #[test]
    fn persistent_mode_retains_last_zone_after_leaving() {
        let registry = registry(vec![ZoneDescriptor::new(0.0, 0.0, 100.0, 100.0, "dark")]);
        let resolver = resolver();
        let mut state = fresh_state(true);

        let inside = resolver.resolve(&registry, &mut state, Vec2::new(95.0, 50.0));
        settle(&mut state, &inside);
        assert_eq!(state.current_zone_type(), ZoneType::Dark);

        for x in [125.0, 155.0, 185.0, 215.0] {
            let outside = resolver.resolve(&registry, &mut state, Vec2::new(x, 50.0));
            assert_eq!(outside.resolution.source, ResolutionSource::Retained);
            assert_eq!(outside.resolution.zone_type, ZoneType::Dark);
            assert!(outside.event.is_none());
            settle(&mut state, &outside);
        }
        assert_eq!(state.current_zone_type(), ZoneType::Dark);
    }

    #[test]
    fn non_persistent_mode_reverts_to_default() {
        let registry = registry(vec![ZoneDescriptor::new(0.0, 0.0, 100.0, 100.0, "dark")]);
        let resolver = resolver();
        let mut state = fresh_state(false);

        let inside = resolver.resolve(&registry, &mut state, Vec2::new(95.0, 50.0));
        settle(&mut state, &inside);
        let outside = resolver.resolve(&registry, &mut state, Vec2::new(125.0, 50.0));
        assert_eq!(outside.resolution.source, ResolutionSource::Fallback);
        let event = outside.event.expect("revert");
        assert_eq!(event.new_type, ZoneType::Default);
        assert!(!event.entering_darkness);
    }

    #[test]
    fn explicit_default_zone_overrides_persistence() {
        let registry = registry(vec![
            ZoneDescriptor::new(0.0, 0.0, 100.0, 100.0, "dark"),
            ZoneDescriptor::new(200.0, 0.0, 100.0, 100.0, "default"),
        ]);
        let resolver = resolver();
        let mut state = fresh_state(true);
        let inside = resolver.resolve(&registry, &mut state, Vec2::new(95.0, 50.0));
        settle(&mut state, &inside);
        let lobby = resolver.resolve(&registry, &mut state, Vec2::new(205.0, 50.0));
        assert_eq!(lobby.resolution.source, ResolutionSource::Zone);
        assert_eq!(lobby.event.expect("change").new_type, ZoneType::Default);
    }

    #[test]
    fn unloaded_registry_resolves_default_without_event() {
        let resolver = resolver();
        let mut state = fresh_state(true);
        let outcome = resolver.resolve(&ZoneRegistry::default(), &mut state, Vec2::new(1.0, 1.0));
        assert_eq!(outcome.resolution.zone_type, ZoneType::Default);
        assert!(outcome.event.is_none());
    }

    #[test]
    fn non_finite_position_is_ignored() {
        let resolver = resolver();
        let mut state = fresh_state(true);
        resolver.resolve(&ZoneRegistry::default(), &mut state, Vec2::new(1.0, 1.0));
        let outcome =
            resolver.resolve(&ZoneRegistry::default(), &mut state, Vec2::new(f32::NAN, 0.0));
        assert!(outcome.event.is_none());
        assert_eq!(state.prev_observer_pos(), Some(Vec2::new(1.0, 1.0)));
    }
}
