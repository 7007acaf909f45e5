mod beam;
mod config;
mod engine;
mod geometry;
mod map;
mod mask;
mod point_lights;
mod resolver;
mod state;
mod transition;
mod zones;

pub use beam::{
    BeamBattery, BeamGeometryEngine, BeamState, BeamStrategy, ConeArc, ConeMask,
    ImageMaskPlacement, MaskDescriptor,
};
pub use config::{
    BatteryConfig, BeamConfig, BeamMaskConfig, ConfigError, LightingConfig, PointLightConfig,
    ResolverConfig, TransitionConfig, ZoneLevelConfig,
};
pub use engine::{
    LightingDebugSnapshot, LightingEngine, LightingEvent, LightingSystemId, TickReport,
    LIGHTING_SYSTEM_ORDER,
};
pub use geometry::{angle_delta, normalize_angle, Color, ColorParseError, Pose, Rect, Vec2};
pub use map::{AmbientDescriptor, MapLighting};
pub use mask::{AlphaMask, BeamMaskError};
pub use point_lights::{
    EntityHandle, FollowBinding, LightHandle, LightKind, PointLight, PointLightDescriptor,
    PointLightInfluenceManager, PoseProvider, PoseTable, TintChange, TintState,
};
pub use resolver::{
    MotionSample, MotionSampledZoneResolver, ResolutionSource, ResolverOutcome, ZoneChangeEvent,
    ZoneResolution,
};
pub use state::{ActiveTransition, LightingState, TransitionCurve, TransitionPhase};
pub use transition::TransitionController;
pub use zones::{Zone, ZoneDescriptor, ZoneLoadIssue, ZoneRegistry, ZoneType};
