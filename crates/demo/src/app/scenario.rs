use std::fs;
use std::path::{Path, PathBuf};

use gloam::lighting::{
    AlphaMask, EntityHandle, LightingConfig, LightingEngine, LightingEvent, MapLighting,
    PointLightDescriptor, Pose, Vec2, ZoneType,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use super::map_import::{load_map_file, parse_json_with_path, MapError};

const DEFAULT_STEP_DELTA_MS: f32 = 16.0;

#[derive(Debug, Error)]
pub(crate) enum ScenarioError {
    #[error("failed to read scenario {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse scenario {path} at {json_path}: {source}")]
    Parse {
        path: PathBuf,
        json_path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Map(#[from] MapError),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum MapSource {
    Inline(MapLighting),
    /// `.tmx` or `.json`, relative to the scenario file.
    File(PathBuf),
}

impl Default for MapSource {
    fn default() -> Self {
        MapSource::Inline(MapLighting::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum BeamCommand {
    On,
    Off,
    Toggle,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ScriptedPose {
    pub(crate) x: f32,
    pub(crate) y: f32,
    #[serde(default)]
    pub(crate) angle_degrees: f32,
}

impl ScriptedPose {
    fn pose(self) -> Pose {
        Pose::new(self.x, self.y, self.angle_degrees.to_radians())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ScriptedEntity {
    pub(crate) entity: EntityHandle,
    pub(crate) x: f32,
    pub(crate) y: f32,
    #[serde(default)]
    pub(crate) angle_degrees: f32,
}

impl ScriptedEntity {
    fn pose(self) -> Pose {
        Pose::new(self.x, self.y, self.angle_degrees.to_radians())
    }
}

/// One scripted input change followed by `repeat` engine ticks.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ScenarioStep {
    #[serde(default = "default_step_delta_ms")]
    pub(crate) delta_ms: f32,
    #[serde(default = "default_repeat")]
    pub(crate) repeat: u32,
    #[serde(default)]
    pub(crate) observer: Option<Vec2>,
    #[serde(default)]
    pub(crate) emitter: Option<ScriptedPose>,
    #[serde(default)]
    pub(crate) entities: Vec<ScriptedEntity>,
    #[serde(default)]
    pub(crate) beam: Option<BeamCommand>,
    #[serde(default)]
    pub(crate) beam_mask: Option<PathBuf>,
    #[serde(default)]
    pub(crate) persistent: Option<bool>,
    #[serde(default)]
    pub(crate) lights: Vec<PointLightDescriptor>,
    #[serde(default)]
    pub(crate) log_snapshot: bool,
}

fn default_step_delta_ms() -> f32 {
    DEFAULT_STEP_DELTA_MS
}

fn default_repeat() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Scenario {
    #[serde(default)]
    pub(crate) name: Option<String>,
    #[serde(default)]
    pub(crate) config: LightingConfig,
    #[serde(default)]
    pub(crate) map: MapSource,
    #[serde(default)]
    pub(crate) tint_targets: Vec<EntityHandle>,
    #[serde(default)]
    pub(crate) steps: Vec<ScenarioStep>,
    #[serde(skip)]
    base_dir: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct RunSummary {
    pub(crate) ticks: u32,
    pub(crate) zone_changes: Vec<(ZoneType, f32)>,
    pub(crate) battery_depletions: u32,
    pub(crate) tints_applied: u32,
    pub(crate) tints_cleared: u32,
    pub(crate) final_level: f32,
    pub(crate) final_zone: ZoneType,
}

impl Scenario {
    pub(crate) fn load(path: &Path) -> Result<Self, ScenarioError> {
        let raw = fs::read_to_string(path).map_err(|source| ScenarioError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::from_json_str(&raw, path, base_dir)
    }

    pub(crate) fn from_json_str(
        raw: &str,
        origin: &Path,
        base_dir: PathBuf,
    ) -> Result<Self, ScenarioError> {
        let mut scenario: Scenario =
            parse_json_with_path(raw).map_err(|(json_path, source)| ScenarioError::Parse {
                path: origin.to_path_buf(),
                json_path,
                source,
            })?;
        scenario.base_dir = base_dir;
        Ok(scenario)
    }

    pub(crate) fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed")
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub(crate) fn build_engine(&self) -> Result<LightingEngine, ScenarioError> {
        let mut config = self.config.clone().sanitized();
        if let Some(mask) = config.beam.mask.as_mut() {
            mask.path = self.resolve(&mask.path);
        }
        let mut engine = LightingEngine::new(config);

        let map = match &self.map {
            MapSource::Inline(map) => map.clone(),
            MapSource::File(path) => load_map_file(&self.resolve(path))?,
        };
        engine.load_map(map);
        for target in &self.tint_targets {
            engine.register_tint_target(*target);
        }
        Ok(engine)
    }

    pub(crate) fn run(&self, engine: &mut LightingEngine) -> RunSummary {
        let mut summary = RunSummary::default();
        for (index, step) in self.steps.iter().enumerate() {
            self.apply_step(engine, step);
            for _ in 0..step.repeat.max(1) {
                let report = engine.update(step.delta_ms);
                summary.ticks += 1;
                for event in &report.events {
                    summary.record(event, index, report.now.as_millis() as u64);
                }
            }
            if step.log_snapshot {
                for line in engine.debug_snapshot().render_lines() {
                    info!(step = index, "{line}");
                }
            }
        }
        summary.final_level = engine.current_ambient_level();
        summary.final_zone = engine.current_zone_type();
        summary
    }

    fn apply_step(&self, engine: &mut LightingEngine, step: &ScenarioStep) {
        if let Some(persistent) = step.persistent {
            engine.set_persistent_mode(persistent);
        }
        if let Some(observer) = step.observer {
            engine.set_observer_position(observer.x, observer.y);
        }
        if let Some(emitter) = step.emitter {
            let pose = emitter.pose();
            engine.set_emitter_pose(pose.position.x, pose.position.y, pose.angle);
        }
        for scripted in &step.entities {
            engine.set_entity_pose(scripted.entity, scripted.pose());
        }
        for light in &step.lights {
            engine.register_point_light(light.clone());
        }
        if let Some(path) = &step.beam_mask {
            let invert_alpha = engine
                .config()
                .beam
                .mask
                .as_ref()
                .is_some_and(|mask| mask.invert_alpha);
            match AlphaMask::from_path(&self.resolve(path), invert_alpha) {
                Ok(mask) => engine.set_beam_mask(Some(mask)),
                Err(error) => warn!(
                    path = %path.display(),
                    error = %error,
                    "scenario_beam_mask_unavailable"
                ),
            }
        }
        match step.beam {
            Some(BeamCommand::On) => {
                engine.set_beam_enabled(true);
            }
            Some(BeamCommand::Off) => {
                engine.set_beam_enabled(false);
            }
            Some(BeamCommand::Toggle) => {
                engine.toggle_beam();
            }
            None => {}
        }
    }
}

impl RunSummary {
    fn record(&mut self, event: &LightingEvent, step: usize, now_ms: u64) {
        match event {
            LightingEvent::ZoneChanged {
                zone_type,
                level,
                entering_darkness,
                duration,
            } => {
                info!(
                    step,
                    now_ms,
                    zone = %zone_type,
                    level,
                    entering_darkness,
                    duration_ms = duration.as_millis() as u64,
                    "zone_changed"
                );
                self.zone_changes.push((*zone_type, *level));
            }
            LightingEvent::BeamBatteryDepleted => {
                info!(step, now_ms, "beam_battery_depleted");
                self.battery_depletions += 1;
            }
            LightingEvent::TintApplied {
                entity,
                light,
                color,
            } => {
                info!(
                    step,
                    entity = entity.0,
                    light = light.0,
                    color = %color,
                    "tint_applied"
                );
                self.tints_applied += 1;
            }
            LightingEvent::TintCleared { entity } => {
                info!(step, entity = entity.0, "tint_cleared");
                self.tints_cleared += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn parse(raw: &str) -> Scenario {
        Scenario::from_json_str(raw, Path::new("inline.json"), PathBuf::new()).expect("scenario")
    }

    #[test]
    fn minimal_scenario_uses_defaults() {
        let scenario = parse(r#"{ "steps": [ { "observer": { "x": 1, "y": 2 } } ] }"#);
        assert_eq!(scenario.display_name(), "unnamed");
        assert_eq!(scenario.config, LightingConfig::default());
        assert_eq!(scenario.map, MapSource::default());
        assert_eq!(scenario.steps[0].delta_ms, DEFAULT_STEP_DELTA_MS);
        assert_eq!(scenario.steps[0].repeat, 1);
        assert_eq!(scenario.steps[0].observer, Some(Vec2::new(1.0, 2.0)));
    }

    #[test]
    fn parse_errors_name_the_json_path() {
        let err = Scenario::from_json_str(
            r#"{ "steps": [ { "delta_ms": 16 }, { "beam": "sideways" } ] }"#,
            Path::new("bad.json"),
            PathBuf::new(),
        )
        .expect_err("bad beam command");
        match err {
            ScenarioError::Parse { json_path, .. } => assert_eq!(json_path, "steps[1].beam"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn sprint_across_black_corridor_is_reported() {
        let scenario = parse(
            r#"{
                "name": "corridor",
                "map": { "inline": { "zones": [
                    { "x": 240, "y": 0, "width": 20, "height": 300, "type": "black" }
                ] } },
                "steps": [
                    { "observer": { "x": 0, "y": 100 } },
                    { "observer": { "x": 500, "y": 100 } },
                    { "repeat": 80 }
                ]
            }"#,
        );
        let mut engine = scenario.build_engine().expect("engine");
        let summary = scenario.run(&mut engine);
        assert_eq!(summary.ticks, 82);
        assert_eq!(summary.zone_changes, vec![(ZoneType::Black, 0.97)]);
        assert_eq!(summary.final_zone, ZoneType::Black);
        assert_eq!(summary.final_level, 0.97);
    }

    #[test]
    fn beam_battery_and_tints_are_counted() {
        let scenario = parse(
            r##"{
                "config": { "beam": { "battery": { "capacity_seconds": 0.5 } } },
                "tint_targets": [ 5 ],
                "steps": [
                    {
                        "beam": "on",
                        "emitter": { "x": 0, "y": 0, "angle_degrees": 90 },
                        "observer": { "x": 0, "y": 0 },
                        "entities": [ { "entity": 5, "x": 30, "y": 0 } ],
                        "lights": [ { "x": 0, "y": 0, "radius": 100, "color": "#ff0000",
                                      "follow": { "target": 0 } } ]
                    },
                    { "delta_ms": 100, "repeat": 6 },
                    { "entities": [ { "entity": 5, "x": 900, "y": 0 } ], "delta_ms": 100, "repeat": 3 }
                ]
            }"##,
        );
        let mut engine = scenario.build_engine().expect("engine");
        let summary = scenario.run(&mut engine);
        assert_eq!(summary.battery_depletions, 1);
        assert!(engine.current_beam_mask().is_empty());
        assert_eq!(summary.tints_applied, 1);
        assert_eq!(summary.tints_cleared, 1);
        assert_eq!(engine.entity_tint(EntityHandle::OBSERVER), None);
    }

    #[test]
    fn map_file_is_resolved_next_to_scenario() {
        let temp = TempDir::new().expect("temp");
        fs::write(
            temp.path().join("hall.json"),
            r#"{ "ambient": { "darkness": 0.5 },
                 "zones": [ { "x": 0, "y": 0, "width": 50, "height": 50, "type": "dim" } ] }"#,
        )
        .expect("write map");
        let scenario_path = temp.path().join("hall_walk.json");
        fs::write(
            &scenario_path,
            r#"{ "map": { "file": "hall.json" },
                 "steps": [ { "observer": { "x": 10, "y": 10 }, "repeat": 100 } ] }"#,
        )
        .expect("write scenario");

        let scenario = Scenario::load(&scenario_path).expect("scenario");
        let mut engine = scenario.build_engine().expect("engine");
        assert_eq!(engine.current_ambient_level(), 0.5);
        let summary = scenario.run(&mut engine);
        assert_eq!(summary.final_zone, ZoneType::Dim);
        assert_eq!(summary.final_level, 0.55);
    }

    #[test]
    fn missing_map_file_is_an_error() {
        let scenario = parse(r#"{ "map": { "file": "nowhere.tmx" } }"#);
        assert!(matches!(
            scenario.build_engine(),
            Err(ScenarioError::Map(MapError::Read { .. }))
        ));
    }

    #[test]
    fn missing_beam_mask_keeps_procedural_cone() {
        let scenario = parse(
            r#"{ "steps": [ { "beam": "on", "beam_mask": "missing.png",
                              "emitter": { "x": 0, "y": 0 } } ] }"#,
        );
        let mut engine = scenario.build_engine().expect("engine");
        scenario.run(&mut engine);
        assert!(matches!(
            engine.current_beam_mask(),
            gloam::lighting::MaskDescriptor::Cone(_)
        ));
    }
}
