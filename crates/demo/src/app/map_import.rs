use std::fs;
use std::path::{Path, PathBuf};

use gloam::lighting::{
    AmbientDescriptor, Color, EntityHandle, FollowBinding, LightKind, MapLighting,
    PointLightDescriptor, Vec2, ZoneDescriptor,
};
use roxmltree::{Document, Node};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info};

const LIGHTING_LAYER_NAME: &str = "lighting";
const LIGHT_OBJECT_CLASS: &str = "light";
const DEFAULT_LIGHT_RADIUS: f32 = 64.0;

#[derive(Debug, Error)]
pub(crate) enum MapError {
    #[error("failed to read map {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed map XML (file={path}, line={line}, column={column}): {message}")]
    Xml {
        path: PathBuf,
        line: u32,
        column: u32,
        message: String,
    },
    #[error("{message} (file={path}, line={line}, column={column})")]
    InvalidValue {
        path: PathBuf,
        line: u32,
        column: u32,
        message: String,
    },
    #[error("failed to parse map {path} at {json_path}: {source}")]
    Json {
        path: PathBuf,
        json_path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unsupported map format for {path}; expected .tmx or .json")]
    UnsupportedFormat { path: PathBuf },
}

pub(crate) fn load_map_file(path: &Path) -> Result<MapLighting, MapError> {
    let raw = fs::read_to_string(path).map_err(|source| MapError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("tmx") => parse_tmx(&raw, path),
        Some("json") => parse_json_with_path::<MapLighting>(&raw).map_err(|(json_path, source)| {
            MapError::Json {
                path: path.to_path_buf(),
                json_path,
                source,
            }
        }),
        _ => Err(MapError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

/// Deserializes JSON, reporting the path of the failing value alongside the error.
pub(crate) fn parse_json_with_path<T: DeserializeOwned>(
    raw: &str,
) -> Result<T, (String, serde_json::Error)> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, T>(&mut deserializer).map_err(|error| {
        let path = error.path().to_string();
        (path, error.into_inner())
    })
}

/// Reads zones, lights and the ambient level from a Tiled map. Only object
/// layers named (or classed) `lighting` are considered.
pub(crate) fn parse_tmx(raw: &str, file_path: &Path) -> Result<MapLighting, MapError> {
    let doc = Document::parse(raw).map_err(|error| MapError::Xml {
        path: file_path.to_path_buf(),
        line: error.pos().row,
        column: error.pos().col,
        message: error.to_string(),
    })?;
    let ctx = TmxContext {
        doc: &doc,
        path: file_path,
    };

    let root = doc.root_element();
    if !root.has_tag_name("map") {
        return Err(ctx.invalid(root, "root element must be <map>".to_string()));
    }

    let mut map = MapLighting::default();
    if let Some(darkness) = ctx.property_f32(root, "ambient_darkness")? {
        map.ambient = Some(AmbientDescriptor { darkness });
    }

    for layer in root.children().filter(|node| node.has_tag_name("objectgroup")) {
        if !is_lighting_layer(layer) {
            debug!(
                layer = layer.attribute("name").unwrap_or_default(),
                "tmx_layer_skipped"
            );
            continue;
        }
        for object in layer.children().filter(|node| node.has_tag_name("object")) {
            if is_light_object(object) {
                map.lights.push(ctx.parse_light(object)?);
            } else {
                map.zones.push(ctx.parse_zone(object)?);
            }
        }
    }

    info!(
        path = %file_path.display(),
        zones = map.zones.len(),
        lights = map.lights.len(),
        "tmx_map_imported"
    );
    Ok(map)
}

fn is_lighting_layer(layer: Node<'_, '_>) -> bool {
    [layer.attribute("name"), layer.attribute("class")]
        .into_iter()
        .flatten()
        .any(|value| value.eq_ignore_ascii_case(LIGHTING_LAYER_NAME))
}

/// Tiled 1.9 renamed the object `type` attribute to `class`.
fn object_class<'a>(object: Node<'a, '_>) -> Option<&'a str> {
    object.attribute("class").or_else(|| object.attribute("type"))
}

fn is_light_object(object: Node<'_, '_>) -> bool {
    object_class(object).is_some_and(|class| class.eq_ignore_ascii_case(LIGHT_OBJECT_CLASS))
        || object.children().any(|child| child.has_tag_name("point"))
}

fn property<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.has_tag_name("properties"))?
        .children()
        .find(|child| child.has_tag_name("property") && child.attribute("name") == Some(name))
}

struct TmxContext<'a, 'input> {
    doc: &'a Document<'input>,
    path: &'a Path,
}

impl TmxContext<'_, '_> {
    fn invalid(&self, node: Node<'_, '_>, message: String) -> MapError {
        let pos = self.doc.text_pos_at(node.range().start);
        MapError::InvalidValue {
            path: self.path.to_path_buf(),
            line: pos.row,
            column: pos.col,
            message,
        }
    }

    fn number(&self, node: Node<'_, '_>, field: &str, raw: &str) -> Result<f32, MapError> {
        raw.trim()
            .parse::<f32>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| self.invalid(node, format!("{field} '{raw}' is not a finite number")))
    }

    fn attribute_f32(&self, node: Node<'_, '_>, name: &str) -> Result<Option<f32>, MapError> {
        node.attribute(name)
            .map(|raw| self.number(node, name, raw))
            .transpose()
    }

    fn property_f32(&self, node: Node<'_, '_>, name: &str) -> Result<Option<f32>, MapError> {
        match property(node, name) {
            Some(prop) => {
                let raw = prop.attribute("value").unwrap_or_default();
                self.number(prop, name, raw).map(Some)
            }
            None => Ok(None),
        }
    }

    fn parse_zone(&self, object: Node<'_, '_>) -> Result<ZoneDescriptor, MapError> {
        Ok(ZoneDescriptor {
            name: object.attribute("name").map(ToString::to_string),
            x: self.attribute_f32(object, "x")?.unwrap_or(0.0),
            y: self.attribute_f32(object, "y")?.unwrap_or(0.0),
            width: self.attribute_f32(object, "width")?,
            height: self.attribute_f32(object, "height")?,
            zone_type: object_class(object).unwrap_or_default().to_string(),
            darkness: self.property_f32(object, "darkness")?,
        })
    }

    fn parse_light(&self, object: Node<'_, '_>) -> Result<PointLightDescriptor, MapError> {
        let color = match property(object, "color") {
            Some(prop) => Color::parse_hex(prop.attribute("value").unwrap_or_default())
                .map_err(|err| self.invalid(prop, err.to_string()))?,
            None => Color::WHITE,
        };
        let kind = match self.property_f32(object, "half_angle_degrees")? {
            Some(degrees) => LightKind::Directional {
                half_angle: degrees.to_radians(),
            },
            None => LightKind::Point,
        };
        let follow = match property(object, "follow") {
            Some(prop) => {
                let raw = prop.attribute("value").unwrap_or_default();
                let target = raw.trim().parse::<u64>().map_err(|_| {
                    self.invalid(prop, format!("follow '{raw}' is not an entity id"))
                })?;
                Some(FollowBinding {
                    target: EntityHandle(target),
                    offset: Vec2::ZERO,
                })
            }
            None => None,
        };

        Ok(PointLightDescriptor {
            x: self.attribute_f32(object, "x")?.unwrap_or(0.0),
            y: self.attribute_f32(object, "y")?.unwrap_or(0.0),
            color,
            radius: self
                .property_f32(object, "radius")?
                .unwrap_or(DEFAULT_LIGHT_RADIUS),
            intensity: self.property_f32(object, "intensity")?.unwrap_or(1.0),
            angle: self
                .attribute_f32(object, "rotation")?
                .unwrap_or(0.0)
                .to_radians(),
            kind,
            follow,
        })
    }
}
