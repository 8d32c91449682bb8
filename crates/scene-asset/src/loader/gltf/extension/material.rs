use futures::{future::LocalBoxFuture, try_join, FutureExt};
use log::warn;
use serde::Deserialize;

use crate::{
    material::{
        ClearcoatParams, MaterialAssetData, MaterialFamily, SpecularGlossinessParams, UnlitParams,
    },
    loader::gltf::{schema::TextureInfoDef, GltfLoadResult, TextureRole},
};

use super::{
    parse_extension, MaterialContext, MaterialExtension, KHR_MATERIALS_CLEARCOAT,
    KHR_MATERIALS_PBR_SPECULAR_GLOSSINESS,
};

/// KHR_materials_unlit: only the base color survives.
pub struct UnlitExtension;

impl MaterialExtension for UnlitExtension {
    fn family(&self) -> Option<MaterialFamily> {
        Some(MaterialFamily::Unlit)
    }

    fn extend_params<'a>(
        &'a self,
        context: MaterialContext<'a>,
        _base: Option<MaterialAssetData>,
    ) -> LocalBoxFuture<'a, GltfLoadResult<MaterialAssetData>> {
        async move {
            let pbr = context.material.pbr_metallic_roughness.as_ref();
            let base_color_factor = pbr
                .and_then(|pbr| pbr.base_color_factor)
                .unwrap_or([1.0, 1.0, 1.0, 1.0]);
            let base_color_texture = context
                .loader
                .optional_texture_info(
                    pbr.and_then(|pbr| pbr.base_color_texture.as_ref()),
                    TextureRole::BaseColor,
                )
                .await?;
            Ok(MaterialAssetData::Unlit(UnlitParams {
                base_color_factor,
                base_color_texture,
            }))
        }
        .boxed_local()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpecularGlossinessDef {
    diffuse_factor: Option<[f32; 4]>,
    diffuse_texture: Option<TextureInfoDef>,
    specular_factor: Option<[f32; 3]>,
    glossiness_factor: Option<f32>,
    specular_glossiness_texture: Option<TextureInfoDef>,
}

/// KHR_materials_pbrSpecularGlossiness.
pub struct SpecularGlossinessExtension;

impl MaterialExtension for SpecularGlossinessExtension {
    fn family(&self) -> Option<MaterialFamily> {
        Some(MaterialFamily::SpecularGlossiness)
    }

    fn extend_params<'a>(
        &'a self,
        context: MaterialContext<'a>,
        _base: Option<MaterialAssetData>,
    ) -> LocalBoxFuture<'a, GltfLoadResult<MaterialAssetData>> {
        async move {
            let def: SpecularGlossinessDef =
                parse_extension(KHR_MATERIALS_PBR_SPECULAR_GLOSSINESS, context.extension)?;
            let defaults = SpecularGlossinessParams::default();
            let (diffuse_texture, specular_glossiness_texture) = try_join!(
                context
                    .loader
                    .optional_texture_info(def.diffuse_texture.as_ref(), TextureRole::Diffuse),
                context.loader.optional_texture_info(
                    def.specular_glossiness_texture.as_ref(),
                    TextureRole::SpecularGlossiness
                ),
            )?;
            Ok(MaterialAssetData::SpecularGlossiness(
                SpecularGlossinessParams {
                    diffuse_factor: def.diffuse_factor.unwrap_or(defaults.diffuse_factor),
                    diffuse_texture,
                    specular_factor: def.specular_factor.unwrap_or(defaults.specular_factor),
                    glossiness_factor: def.glossiness_factor.unwrap_or(defaults.glossiness_factor),
                    specular_glossiness_texture,
                },
            ))
        }
        .boxed_local()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClearcoatDef {
    clearcoat_factor: Option<f32>,
    clearcoat_texture: Option<TextureInfoDef>,
    clearcoat_roughness_factor: Option<f32>,
    clearcoat_roughness_texture: Option<TextureInfoDef>,
    clearcoat_normal_texture: Option<TextureInfoDef>,
}

/// KHR_materials_clearcoat, layered onto metallic-roughness materials.
pub struct ClearcoatExtension;

impl MaterialExtension for ClearcoatExtension {
    fn family(&self) -> Option<MaterialFamily> {
        None
    }

    fn extend_params<'a>(
        &'a self,
        context: MaterialContext<'a>,
        base: Option<MaterialAssetData>,
    ) -> LocalBoxFuture<'a, GltfLoadResult<MaterialAssetData>> {
        async move {
            let pbr = match base {
                Some(MaterialAssetData::Pbr(pbr)) => pbr,
                Some(other) => {
                    warn!(
                        "Ignoring {} on a {:?} material",
                        KHR_MATERIALS_CLEARCOAT,
                        other.family()
                    );
                    return Ok(other);
                }
                None => Default::default(),
            };
            let def: ClearcoatDef = parse_extension(KHR_MATERIALS_CLEARCOAT, context.extension)?;
            let loader = context.loader;
            let (clearcoat_texture, clearcoat_roughness_texture, clearcoat_normal_texture) = try_join!(
                loader.optional_texture_info(def.clearcoat_texture.as_ref(), TextureRole::Clearcoat),
                loader.optional_texture_info(
                    def.clearcoat_roughness_texture.as_ref(),
                    TextureRole::ClearcoatRoughness
                ),
                loader.optional_normal_texture_info(
                    def.clearcoat_normal_texture.as_ref(),
                    TextureRole::ClearcoatNormal
                ),
            )?;
            let clearcoat = ClearcoatParams {
                clearcoat_factor: def.clearcoat_factor.unwrap_or(0.0),
                clearcoat_texture,
                clearcoat_roughness_factor: def.clearcoat_roughness_factor.unwrap_or(0.0),
                clearcoat_roughness_texture,
                clearcoat_normal_texture,
            };
            Ok(MaterialAssetData::Physical(pbr, clearcoat))
        }
        .boxed_local()
    }
}
