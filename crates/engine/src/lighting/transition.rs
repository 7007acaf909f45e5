use std::time::Duration;

use tracing::{debug, warn};

use super::config::{millis_to_duration, TransitionConfig};
use super::resolver::ZoneChangeEvent;
use super::state::{ActiveTransition, LightingState, TransitionCurve, TransitionPhase};
use super::zones::ZoneType;

const MIN_POSITIVE_DURATION_MS: f32 = 1.0;

#[derive(Debug, Clone)]
pub struct TransitionController {
    config: TransitionConfig,
}

impl TransitionController {
    pub fn new(config: TransitionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TransitionConfig {
        &self.config
    }

    /// Reveals into `Bright` use the fixed bright duration; everything else scales
    /// with the level swing and the motion that caused it.
    pub fn duration_for(&self, event: &ZoneChangeEvent, current_level: f32) -> Duration {
        let duration_ms = if event.new_type == ZoneType::Bright {
            self.config.bright_duration_ms
        } else {
            let delta = (event.new_level - current_level).abs();
            let mut duration_ms = delta * self.config.duration_per_level_ms;
            if event.entering_darkness {
                if event.is_vertical || event.is_high_speed {
                    duration_ms *= self.config.fast_darkening_factor;
                } else {
                    duration_ms *= self.config.slow_darkening_factor;
                }
            }
            // Not `clamp`: an inverted band must not panic.
            duration_ms
                .max(self.config.min_duration_ms)
                .min(self.config.max_duration_ms)
        };

        if !(duration_ms.is_finite() && duration_ms > 0.0) {
            warn!(
                duration_ms,
                zone_type = %event.new_type,
                "transition_duration_degenerate_clamped"
            );
            return millis_to_duration(MIN_POSITIVE_DURATION_MS);
        }
        millis_to_duration(duration_ms)
    }

    /// Starts a transition toward the event's level, replacing any transition in
    /// flight. The current level becomes the new start value.
    pub fn begin(&self, state: &mut LightingState, event: &ZoneChangeEvent, now: Duration) {
        let duration = self.duration_for(event, state.current_level);
        let curve = if event.new_type == ZoneType::Bright {
            TransitionCurve::Linear
        } else {
            TransitionCurve::EaseInOutCubic
        };

        state.transition = Some(ActiveTransition {
            start: now,
            start_value: state.current_level,
            duration,
            curve,
        });
        state.target_level = event.new_level;
        state.current_zone_type = event.new_type;

        if event.new_type == ZoneType::Default {
            state.last_non_default_zone_type = None;
        } else {
            state.last_non_default_zone_type = Some(event.new_type);
            state.last_non_default_zone_level = event.new_level;
        }

        debug!(
            zone_type = %event.new_type,
            from = state.current_level,
            to = state.target_level,
            duration_ms = duration.as_secs_f32() * 1000.0,
            curve = ?curve,
            "transition_started"
        );
    }

    pub fn advance(&self, state: &mut LightingState, now: Duration) -> TransitionPhase {
        let Some(transition) = state.transition else {
            return TransitionPhase::Idle;
        };

        let progress = transition.progress(now);
        if progress >= 1.0 {
            state.current_level = state.target_level;
            state.transition = None;
            return TransitionPhase::Idle;
        }

        let eased = transition.curve.apply(progress);
        let raw = transition.start_value + (state.target_level - transition.start_value) * eased;
        let low = transition.start_value.min(state.target_level);
        let high = transition.start_value.max(state.target_level);
        state.current_level = round_level(raw, self.config.level_precision).clamp(low, high);
        TransitionPhase::Transitioning
    }
}

fn round_level(value: f32, precision: u32) -> f32 {
    let scale = 10f32.powi(precision as i32);
    (value * scale).round() / scale
}
