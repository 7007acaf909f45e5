use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::config::{BatteryConfig, BeamConfig};
use super::geometry::{angle_delta, normalize_angle, Pose, Vec2};
use super::mask::AlphaMask;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BeamState {
    pub origin_x: f32,
    pub origin_y: f32,
    pub angle: f32,
    pub cone_half_angle: f32,
    pub cone_length: f32,
    pub enabled: bool,
}

impl BeamState {
    pub fn origin(&self) -> Vec2 {
        Vec2::new(self.origin_x, self.origin_y)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConeArc {
    pub radius: f32,
    pub alpha: f32,
    /// Apex followed by the arc edge from `angle - half_angle` to `angle + half_angle`.
    pub outline: Vec<Vec2>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConeMask {
    pub apex: Vec2,
    pub angle: f32,
    pub half_angle: f32,
    pub length: f32,
    pub apex_radius: f32,
    /// Innermost first; alpha falls off outward.
    pub arcs: Vec<ConeArc>,
}

impl ConeMask {
    fn build(state: &BeamState, config: &BeamConfig) -> Self {
        let apex = state.origin();
        let arc_count = config.arc_count.max(1);
        let segments = config.arc_segments.max(2);
        let mut arcs = Vec::with_capacity(arc_count as usize);
        for ring in 0..arc_count {
            let radius = state.cone_length * (ring + 1) as f32 / arc_count as f32;
            let falloff = if arc_count > 1 {
                ring as f32 / (arc_count - 1) as f32
            } else {
                0.0
            };
            let mut outline = Vec::with_capacity(segments as usize + 2);
            outline.push(apex);
            for step in 0..=segments {
                let t = step as f32 / segments as f32;
                let edge_angle =
                    state.angle - state.cone_half_angle + 2.0 * state.cone_half_angle * t;
                outline.push(Vec2::from_polar(apex, edge_angle, radius));
            }
            arcs.push(ConeArc {
                radius,
                alpha: 1.0 - config.edge_softness * falloff,
                outline,
            });
        }
        Self {
            apex,
            angle: state.angle,
            half_angle: state.cone_half_angle,
            length: state.cone_length,
            apex_radius: config.apex_radius,
            arcs,
        }
    }

    pub fn facing(&self) -> Vec2 {
        Vec2::new(self.angle.cos(), self.angle.sin())
    }

    /// Outline of the full-length cone.
    pub fn polygon(&self) -> &[Vec2] {
        self.arcs
            .last()
            .map(|arc| arc.outline.as_slice())
            .unwrap_or(&[])
    }

    pub fn coverage(&self, point: Vec2) -> f32 {
        let distance = self.apex.distance(point);
        if distance <= self.apex_radius {
            return 1.0;
        }
        if distance > self.length {
            return 0.0;
        }
        if angle_delta(self.angle, self.apex.angle_to(point)).abs() > self.half_angle {
            return 0.0;
        }
        self.arcs
            .iter()
            .find(|arc| arc.radius >= distance)
            .map(|arc| arc.alpha)
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageMaskPlacement {
    pub mask: Arc<AlphaMask>,
    pub apex: Vec2,
    pub angle: f32,
    pub units_per_pixel: f32,
    pub apex_radius: f32,
}

impl ImageMaskPlacement {
    pub fn coverage(&self, point: Vec2) -> f32 {
        let dx = point.x - self.apex.x;
        let dy = point.y - self.apex.y;
        if (dx * dx + dy * dy).sqrt() <= self.apex_radius {
            return 1.0;
        }
        let (sin, cos) = (-self.angle).sin_cos();
        let local = Vec2::new(
            (dx * cos - dy * sin) / self.units_per_pixel,
            (dx * sin + dy * cos) / self.units_per_pixel,
        );
        self.mask.sample_centered(local)
    }
}

/// What the renderer punches through the darkness overlay this tick.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum MaskDescriptor {
    #[default]
    Empty,
    Cone(ConeMask),
    Image(ImageMaskPlacement),
}

impl MaskDescriptor {
    pub fn is_empty(&self) -> bool {
        matches!(self, MaskDescriptor::Empty)
    }

    /// Opacity of the cut-out at `point`, 0 outside the beam.
    pub fn coverage(&self, point: Vec2) -> f32 {
        match self {
            MaskDescriptor::Empty => 0.0,
            MaskDescriptor::Cone(cone) => cone.coverage(point),
            MaskDescriptor::Image(placement) => placement.coverage(point),
        }
    }

    pub fn apex(&self) -> Option<Vec2> {
        match self {
            MaskDescriptor::Empty => None,
            MaskDescriptor::Cone(cone) => Some(cone.apex),
            MaskDescriptor::Image(placement) => Some(placement.apex),
        }
    }

    pub fn angle(&self) -> Option<f32> {
        match self {
            MaskDescriptor::Empty => None,
            MaskDescriptor::Cone(cone) => Some(cone.angle),
            MaskDescriptor::Image(placement) => Some(placement.angle),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeamStrategy {
    Procedural,
    ImageMask,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BeamBattery {
    config: BatteryConfig,
    charge_seconds: f32,
    depleted: bool,
}

impl BeamBattery {
    pub fn new(config: BatteryConfig) -> Self {
        Self {
            charge_seconds: config.capacity_seconds,
            config,
            depleted: false,
        }
    }

    pub fn fraction(&self) -> f32 {
        (self.charge_seconds / self.config.capacity_seconds).clamp(0.0, 1.0)
    }

    pub fn is_depleted(&self) -> bool {
        self.depleted
    }

    /// Returns true on the tick the charge runs out.
    fn tick(&mut self, beam_on: bool, dt_seconds: f32) -> bool {
        if beam_on {
            self.charge_seconds -= self.config.drain_per_second * dt_seconds;
            if self.charge_seconds <= 0.0 {
                self.charge_seconds = 0.0;
                let newly_depleted = !self.depleted;
                self.depleted = true;
                return newly_depleted;
            }
        } else {
            self.charge_seconds = (self.charge_seconds
                + self.config.recharge_per_second * dt_seconds)
                .min(self.config.capacity_seconds);
            if self.depleted && self.fraction() >= self.config.min_restart_fraction {
                self.depleted = false;
            }
        }
        false
    }
}

#[derive(Debug, Clone)]
pub struct BeamGeometryEngine {
    config: BeamConfig,
    state: BeamState,
    mask_image: Option<Arc<AlphaMask>>,
    units_per_pixel: f32,
    battery: Option<BeamBattery>,
    current: MaskDescriptor,
}

impl BeamGeometryEngine {
    /// Loads the configured mask image if any; a missing or unreadable image
    /// leaves the engine on the procedural cone.
    pub fn new(config: BeamConfig) -> Self {
        let mut units_per_pixel = 1.0;
        let mask_image = match &config.mask {
            Some(mask_config) => {
                units_per_pixel = mask_config.units_per_pixel;
                match AlphaMask::from_path(&mask_config.path, mask_config.invert_alpha) {
                    Ok(mask) => {
                        info!(
                            path = %mask_config.path.display(),
                            width = mask.width(),
                            height = mask.height(),
                            "beam_mask_loaded"
                        );
                        Some(Arc::new(mask))
                    }
                    Err(error) => {
                        warn!(
                            path = %mask_config.path.display(),
                            error = %error,
                            "beam_mask_unavailable_using_procedural"
                        );
                        None
                    }
                }
            }
            None => None,
        };

        let state = BeamState {
            cone_half_angle: config.half_angle_radians(),
            cone_length: config.length,
            enabled: config.enabled_at_start,
            ..BeamState::default()
        };
        let battery = config.battery.map(BeamBattery::new);

        let mut engine = Self {
            config,
            state,
            mask_image,
            units_per_pixel,
            battery,
            current: MaskDescriptor::Empty,
        };
        engine.recompute();
        engine
    }

    pub fn strategy(&self) -> BeamStrategy {
        if self.mask_image.is_some() {
            BeamStrategy::ImageMask
        } else {
            BeamStrategy::Procedural
        }
    }

    /// Swaps the image mask at runtime; `None` returns to the procedural cone.
    pub fn set_mask(&mut self, mask: Option<AlphaMask>, units_per_pixel: f32) {
        self.mask_image = mask.map(Arc::new);
        self.units_per_pixel = if units_per_pixel.is_finite() && units_per_pixel > 0.0 {
            units_per_pixel
        } else {
            1.0
        };
        self.recompute();
    }

    pub fn state(&self) -> &BeamState {
        &self.state
    }

    pub fn mask(&self) -> &MaskDescriptor {
        &self.current
    }

    pub fn is_enabled(&self) -> bool {
        self.state.enabled
    }

    pub fn battery(&self) -> Option<&BeamBattery> {
        self.battery.as_ref()
    }

    /// Returns the resulting enabled flag; turning on is refused while the
    /// battery is depleted.
    pub fn set_enabled(&mut self, enabled: bool) -> bool {
        if enabled && self.battery.as_ref().is_some_and(BeamBattery::is_depleted) {
            debug!("beam_enable_refused_battery_depleted");
            return self.state.enabled;
        }
        if self.state.enabled != enabled {
            self.state.enabled = enabled;
            self.recompute();
        }
        self.state.enabled
    }

    pub fn toggle(&mut self) -> bool {
        self.set_enabled(!self.state.enabled)
    }

    /// Drains or recharges the battery, then rebuilds the mask from `pose`.
    /// Returns true when the battery ran out this tick.
    pub fn update(&mut self, pose: Pose, dt: Duration) -> bool {
        let mut depleted_now = false;
        if let Some(battery) = &mut self.battery {
            depleted_now = battery.tick(self.state.enabled, dt.as_secs_f32());
            if depleted_now {
                self.state.enabled = false;
                info!("beam_battery_depleted");
            }
        }

        if pose.position.is_finite() && pose.angle.is_finite() {
            self.state.origin_x = pose.position.x;
            self.state.origin_y = pose.position.y;
            self.state.angle = normalize_angle(pose.angle);
        } else {
            warn!(
                x = pose.position.x,
                y = pose.position.y,
                angle = pose.angle,
                "emitter_pose_not_finite_ignored"
            );
        }
        self.recompute();
        depleted_now
    }

    fn recompute(&mut self) {
        self.current = if !self.state.enabled {
            MaskDescriptor::Empty
        } else if let Some(mask) = &self.mask_image {
            MaskDescriptor::Image(ImageMaskPlacement {
                mask: Arc::clone(mask),
                apex: self.state.origin(),
                angle: self.state.angle,
                units_per_pixel: self.units_per_pixel,
                apex_radius: self.config.apex_radius,
            })
        } else {
            MaskDescriptor::Cone(ConeMask::build(&self.state, &self.config))
        };
    }
}
