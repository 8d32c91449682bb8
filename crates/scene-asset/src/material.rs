use serde_json::Value;

use crate::{
    index::DependencyKey,
    texture::{NormalTextureInfo, OcclusionTextureInfo, TextureInfo},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialFamily {
    /// Metallic-roughness, the core lighting model.
    Standard,
    /// Metallic-roughness with a clearcoat layer.
    Physical,
    SpecularGlossiness,
    Unlit,
}

#[derive(Debug, Clone)]
pub struct PbrParams {
    pub base_color_factor: [f32; 4],
    pub base_color_texture: Option<TextureInfo>,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub metallic_roughness_texture: Option<TextureInfo>,
}

impl Default for PbrParams {
    fn default() -> Self {
        Self {
            base_color_factor: [1.0, 1.0, 1.0, 1.0],
            base_color_texture: None,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            metallic_roughness_texture: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClearcoatParams {
    pub clearcoat_factor: f32,
    pub clearcoat_texture: Option<TextureInfo>,
    pub clearcoat_roughness_factor: f32,
    pub clearcoat_roughness_texture: Option<TextureInfo>,
    pub clearcoat_normal_texture: Option<NormalTextureInfo>,
}

#[derive(Debug, Clone)]
pub struct SpecularGlossinessParams {
    pub diffuse_factor: [f32; 4],
    pub diffuse_texture: Option<TextureInfo>,
    pub specular_factor: [f32; 3],
    pub glossiness_factor: f32,
    pub specular_glossiness_texture: Option<TextureInfo>,
}

impl Default for SpecularGlossinessParams {
    fn default() -> Self {
        Self {
            diffuse_factor: [1.0, 1.0, 1.0, 1.0],
            diffuse_texture: None,
            specular_factor: [1.0, 1.0, 1.0],
            glossiness_factor: 1.0,
            specular_glossiness_texture: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UnlitParams {
    pub base_color_factor: [f32; 4],
    pub base_color_texture: Option<TextureInfo>,
}

/// Define lighting parameters for the material.
#[derive(Debug, Clone)]
pub enum MaterialAssetData {
    /// The standard lighting model for GLTF.
    Pbr(PbrParams),
    /// KHR_materials_clearcoat on top of the standard model.
    Physical(PbrParams, ClearcoatParams),
    /// KHR_materials_pbrSpecularGlossiness.
    SpecularGlossiness(SpecularGlossinessParams),
    /// KHR_materials_unlit. The simplest lighting model.
    Unlit(UnlitParams),
}

impl MaterialAssetData {
    pub fn family(&self) -> MaterialFamily {
        match self {
            MaterialAssetData::Pbr(_) => MaterialFamily::Standard,
            MaterialAssetData::Physical(_, _) => MaterialFamily::Physical,
            MaterialAssetData::SpecularGlossiness(_) => MaterialFamily::SpecularGlossiness,
            MaterialAssetData::Unlit(_) => MaterialFamily::Unlit,
        }
    }

    /// Color multiplier of the main texture, whatever the family calls it.
    pub fn base_color_factor(&self) -> [f32; 4] {
        match self {
            MaterialAssetData::Pbr(params) | MaterialAssetData::Physical(params, _) => {
                params.base_color_factor
            }
            MaterialAssetData::SpecularGlossiness(params) => params.diffuse_factor,
            MaterialAssetData::Unlit(params) => params.base_color_factor,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum MaterialAlphaMode {
    #[default]
    Opaque,
    // Alpha cutoff
    Mask(f32),
    Blend,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum VariantTopology {
    #[default]
    Surface,
    Points,
    Lines,
}

/// Per-mesh requirements a material has to be specialized for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MaterialVariant {
    pub topology: VariantTopology,
    pub skinning: bool,
    pub vertex_tangents: bool,
    pub vertex_colors: bool,
    pub flat_shading: bool,
    pub morph_targets: bool,
    pub morph_normals: bool,
}

impl MaterialVariant {
    pub fn is_base(&self) -> bool {
        *self == MaterialVariant::default()
    }
}

#[derive(Debug, Clone)]
pub struct MaterialAsset {
    /// `None` for the built-in default material.
    pub id: Option<DependencyKey>,
    pub name: Option<String>,
    pub data: MaterialAssetData,
    pub normal_texture: Option<NormalTextureInfo>,
    pub occlusion_texture: Option<OcclusionTextureInfo>,
    pub emissive_texture: Option<TextureInfo>,
    pub emissive_factor: [f32; 3],
    pub alpha_mode: MaterialAlphaMode,
    pub depth_write: bool,
    pub double_sided: bool,
    pub variant: MaterialVariant,
    pub extras: Option<Value>,
}

impl MaterialAsset {
    /// Material used by primitives without one: white, fully metallic and rough.
    pub fn default_material() -> Self {
        Self {
            id: None,
            name: None,
            data: MaterialAssetData::Pbr(PbrParams::default()),
            normal_texture: None,
            occlusion_texture: None,
            emissive_texture: None,
            emissive_factor: [0.0, 0.0, 0.0],
            alpha_mode: MaterialAlphaMode::Opaque,
            depth_write: true,
            double_sided: false,
            variant: MaterialVariant::default(),
            extras: None,
        }
    }
}
