use serde::Deserialize;

use crate::{
    index::{DependencyKey, EntityKind},
    light::{LightAsset, LightKind},
    loader::gltf::{schema::Root, session::missing, GltfLoadResult, GltfLoaderError},
};

use super::{parse_extension, LightExtension, KHR_LIGHTS_PUNCTUAL};

#[derive(Debug, Default, Deserialize)]
struct LightsDef {
    #[serde(default)]
    lights: Vec<LightDef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LightDef {
    #[serde(rename = "type")]
    kind: String,
    name: Option<String>,
    color: Option<[f32; 3]>,
    intensity: Option<f32>,
    range: Option<f32>,
    spot: Option<SpotDef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpotDef {
    inner_cone_angle: Option<f32>,
    outer_cone_angle: Option<f32>,
}

/// KHR_lights_punctual: lights declared on the document root, referenced by nodes.
pub struct LightsPunctualExtension;

impl LightsPunctualExtension {
    fn lights(root: &Root) -> GltfLoadResult<LightsDef> {
        match root
            .extensions
            .as_ref()
            .and_then(|extensions| extensions.get(KHR_LIGHTS_PUNCTUAL))
        {
            Some(value) => parse_extension(KHR_LIGHTS_PUNCTUAL, value),
            None => Ok(LightsDef::default()),
        }
    }
}

impl LightExtension for LightsPunctualExtension {
    fn light_count(&self, root: &Root) -> usize {
        Self::lights(root)
            .map(|lights| lights.lights.len())
            .unwrap_or(0)
    }

    fn load_light(&self, root: &Root, index: usize) -> GltfLoadResult<LightAsset> {
        let def = Self::lights(root)?
            .lights
            .into_iter()
            .nth(index)
            .ok_or_else(|| missing(EntityKind::Light, index))?;
        let kind = match def.kind.as_str() {
            "directional" => LightKind::Directional,
            "point" => LightKind::Point,
            "spot" => {
                let spot = def.spot.as_ref();
                LightKind::spot(
                    spot.and_then(|spot| spot.inner_cone_angle),
                    spot.and_then(|spot| spot.outer_cone_angle),
                )
            }
            other => return Err(GltfLoaderError::UnsupportedLightType(other.to_string())),
        };
        Ok(LightAsset {
            id: DependencyKey::new(EntityKind::Light, index),
            name: def.name.unwrap_or_else(|| format!("light_{}", index)),
            kind,
            color: def.color.unwrap_or([1.0, 1.0, 1.0]),
            intensity: def.intensity.unwrap_or(1.0),
            // Zero means unlimited as well
            range: def.range.filter(|range| *range > 0.0),
            decay: 2.0,
        })
    }
}

#[cfg(test)]
mod test {
    use std::f32::consts::FRAC_PI_4;

    use serde_json::json;

    use super::*;

    #[test]
    fn test_load_lights() {
        let root: Root = serde_json::from_value(json!({
            "extensions": {
                KHR_LIGHTS_PUNCTUAL: {
                    "lights": [
                        {"type": "spot", "spot": {"innerConeAngle": 0.5}},
                        {"type": "point", "name": "bulb", "range": 3.0, "intensity": 2.0},
                        {"type": "area"},
                    ]
                }
            }
        }))
        .unwrap();
        let lights = LightsPunctualExtension;
        assert_eq!(lights.light_count(&root), 3);

        let spot = lights.load_light(&root, 0).unwrap();
        assert_eq!(spot.name, "light_0");
        assert_eq!(
            spot.kind,
            LightKind::Spot {
                inner_cone_angle: 0.5,
                outer_cone_angle: FRAC_PI_4,
            }
        );
        let point = lights.load_light(&root, 1).unwrap();
        assert_eq!((point.intensity, point.range), (2.0, Some(3.0)));
        assert!(matches!(
            lights.load_light(&root, 2),
            Err(GltfLoaderError::UnsupportedLightType(_))
        ));
        assert!(matches!(
            lights.load_light(&root, 3),
            Err(GltfLoaderError::MissingEntity(_))
        ));
    }
}
