use std::time::Duration;

use super::geometry::Vec2;
use super::zones::ZoneType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCurve {
    Linear,
    EaseInOutCubic,
}

impl TransitionCurve {
    pub fn apply(self, progress: f32) -> f32 {
        let t = progress.clamp(0.0, 1.0);
        match self {
            TransitionCurve::Linear => t,
            TransitionCurve::EaseInOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveTransition {
    pub start: Duration,
    pub start_value: f32,
    pub duration: Duration,
    pub curve: TransitionCurve,
}

impl ActiveTransition {
    pub fn progress(&self, now: Duration) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_sub(self.start);
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPhase {
    Idle,
    Transitioning,
}

/// Mutable per-scene lighting memory. Only the resolver and the transition
/// controller write to it.
#[derive(Debug, Clone, PartialEq)]
pub struct LightingState {
    pub(crate) current_level: f32,
    pub(crate) target_level: f32,
    pub(crate) current_zone_type: ZoneType,
    pub(crate) last_non_default_zone_type: Option<ZoneType>,
    pub(crate) last_non_default_zone_level: f32,
    pub(crate) transition: Option<ActiveTransition>,
    pub(crate) persistent_mode: bool,
    pub(crate) prev_observer_pos: Option<Vec2>,
}

impl LightingState {
    pub fn new(initial_level: f32, persistent_mode: bool) -> Self {
        Self {
            current_level: initial_level,
            target_level: initial_level,
            current_zone_type: ZoneType::Default,
            last_non_default_zone_type: None,
            last_non_default_zone_level: initial_level,
            transition: None,
            persistent_mode,
            prev_observer_pos: None,
        }
    }

    pub fn current_level(&self) -> f32 {
        self.current_level
    }

    pub fn target_level(&self) -> f32 {
        self.target_level
    }

    pub fn current_zone_type(&self) -> ZoneType {
        self.current_zone_type
    }

    pub fn last_non_default(&self) -> Option<(ZoneType, f32)> {
        self.last_non_default_zone_type
            .map(|zone_type| (zone_type, self.last_non_default_zone_level))
    }

    pub fn transition(&self) -> Option<&ActiveTransition> {
        self.transition.as_ref()
    }

    pub fn phase(&self) -> TransitionPhase {
        if self.transition.is_some() {
            TransitionPhase::Transitioning
        } else {
            TransitionPhase::Idle
        }
    }

    pub fn persistent_mode(&self) -> bool {
        self.persistent_mode
    }

    pub fn set_persistent_mode(&mut self, persistent_mode: bool) {
        self.persistent_mode = persistent_mode;
    }

    pub fn prev_observer_pos(&self) -> Option<Vec2> {
        self.prev_observer_pos
    }

    /// Moves an idle `Default` state onto a new default level, e.g. after the
    /// map's ambient descriptor is applied.
    pub(crate) fn rebase_default_level(&mut self, level: f32) {
        if self.current_zone_type == ZoneType::Default && self.transition.is_none() {
            self.current_level = level;
            self.target_level = level;
        }
    }
}
