pub mod lighting;

pub use lighting::{
    AlphaMask, BeamConfig, BeamMaskError, Color, ConfigError, EntityHandle, LightHandle,
    LightingConfig, LightingDebugSnapshot, LightingEngine, LightingEvent, LightingSystemId,
    MapLighting, MaskDescriptor, PointLight, PointLightDescriptor, Pose, PoseProvider, TickReport,
    Vec2, ZoneDescriptor, ZoneType, LIGHTING_SYSTEM_ORDER,
};
