use log::warn;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    loader::gltf::GltfLoadResult,
    texture::{TextureAssetTransform, TextureInfo},
};

use super::{parse_extension, TextureInfoExtension, KHR_TEXTURE_TRANSFORM};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextureTransformDef {
    offset: Option<[f32; 2]>,
    rotation: Option<f32>,
    scale: Option<[f32; 2]>,
    tex_coord: Option<usize>,
}

/// KHR_texture_transform: UV offset, rotation and scale on a texture reference.
pub struct TextureTransformExtension;

impl TextureInfoExtension for TextureTransformExtension {
    fn extend_texture(&self, mut info: TextureInfo, extension: &Value) -> GltfLoadResult<TextureInfo> {
        let def: TextureTransformDef = parse_extension(KHR_TEXTURE_TRANSFORM, extension)?;
        if def.tex_coord.is_some() {
            warn!("Custom UV sets in {} are not supported", KHR_TEXTURE_TRANSFORM);
        }
        let defaults = TextureAssetTransform::default();
        info.transform = Some(TextureAssetTransform {
            offset: def.offset.unwrap_or(defaults.offset),
            rotation: def.rotation.unwrap_or(defaults.rotation),
            scale: def.scale.unwrap_or(defaults.scale),
        });
        Ok(info)
    }
}
