//! Serde model of the JSON document.
//!
//! Only the fields consumed by the loader are modelled. Extension payloads and
//! `extras` are kept as raw JSON values and interpreted by the extension
//! handlers.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

pub type Extensions = Map<String, Value>;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Root {
    pub asset: Option<AssetDef>,
    pub scene: Option<usize>,
    #[serde(default)]
    pub scenes: Vec<SceneDef>,
    #[serde(default)]
    pub nodes: Vec<NodeDef>,
    #[serde(default)]
    pub meshes: Vec<MeshDef>,
    #[serde(default)]
    pub accessors: Vec<AccessorDef>,
    #[serde(default)]
    pub buffer_views: Vec<BufferViewDef>,
    #[serde(default)]
    pub buffers: Vec<BufferDef>,
    #[serde(default)]
    pub materials: Vec<MaterialDef>,
    #[serde(default)]
    pub textures: Vec<TextureDef>,
    #[serde(default)]
    pub images: Vec<ImageDef>,
    #[serde(default)]
    pub samplers: Vec<SamplerDef>,
    #[serde(default)]
    pub skins: Vec<SkinDef>,
    #[serde(default)]
    pub cameras: Vec<CameraDef>,
    #[serde(default)]
    pub animations: Vec<AnimationDef>,
    #[serde(default)]
    pub extensions_used: Vec<String>,
    #[serde(default)]
    pub extensions_required: Vec<String>,
    pub extensions: Option<Extensions>,
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDef {
    #[serde(default)]
    pub version: String,
    pub min_version: Option<String>,
    pub generator: Option<String>,
    pub copyright: Option<String>,
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferDef {
    pub uri: Option<String>,
    #[serde(default)]
    pub byte_length: usize,
    /// Legacy field from binary glTF 1.0 documents.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferViewDef {
    pub buffer: usize,
    #[serde(default)]
    pub byte_offset: usize,
    pub byte_length: usize,
    pub byte_stride: Option<usize>,
    pub target: Option<u32>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessorDef {
    pub buffer_view: Option<usize>,
    #[serde(default)]
    pub byte_offset: usize,
    pub component_type: u32,
    #[serde(default)]
    pub normalized: bool,
    pub count: usize,
    #[serde(rename = "type")]
    pub kind: String,
    pub max: Option<Vec<f64>>,
    pub min: Option<Vec<f64>>,
    pub sparse: Option<SparseDef>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparseDef {
    pub count: usize,
    pub indices: SparseIndicesDef,
    pub values: SparseValuesDef,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparseIndicesDef {
    pub buffer_view: usize,
    #[serde(default)]
    pub byte_offset: usize,
    pub component_type: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparseValuesDef {
    pub buffer_view: usize,
    #[serde(default)]
    pub byte_offset: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDef {
    pub uri: Option<String>,
    pub mime_type: Option<String>,
    pub buffer_view: Option<usize>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureDef {
    pub sampler: Option<usize>,
    pub source: Option<usize>,
    pub name: Option<String>,
    pub extensions: Option<Extensions>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplerDef {
    pub mag_filter: Option<u32>,
    pub min_filter: Option<u32>,
    pub wrap_s: Option<u32>,
    pub wrap_t: Option<u32>,
    pub name: Option<String>,
}

/// Texture reference as it appears in materials.
///
/// `scale` is only meaningful for normal textures and `strength` for occlusion
/// textures; both are optional so one type can describe every reference.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureInfoDef {
    pub index: usize,
    #[serde(default)]
    pub tex_coord: usize,
    pub scale: Option<f32>,
    pub strength: Option<f32>,
    pub extensions: Option<Extensions>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PbrMetallicRoughnessDef {
    pub base_color_factor: Option<[f32; 4]>,
    pub base_color_texture: Option<TextureInfoDef>,
    pub metallic_factor: Option<f32>,
    pub roughness_factor: Option<f32>,
    pub metallic_roughness_texture: Option<TextureInfoDef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialDef {
    pub name: Option<String>,
    pub pbr_metallic_roughness: Option<PbrMetallicRoughnessDef>,
    pub normal_texture: Option<TextureInfoDef>,
    pub occlusion_texture: Option<TextureInfoDef>,
    pub emissive_texture: Option<TextureInfoDef>,
    pub emissive_factor: Option<[f32; 3]>,
    pub alpha_mode: Option<String>,
    pub alpha_cutoff: Option<f32>,
    #[serde(default)]
    pub double_sided: bool,
    pub extensions: Option<Extensions>,
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshDef {
    pub name: Option<String>,
    #[serde(default)]
    pub primitives: Vec<PrimitiveDef>,
    pub weights: Option<Vec<f32>>,
    pub extensions: Option<Extensions>,
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimitiveDef {
    #[serde(default)]
    pub attributes: BTreeMap<String, usize>,
    pub indices: Option<usize>,
    pub material: Option<usize>,
    pub mode: Option<u32>,
    pub targets: Option<Vec<BTreeMap<String, usize>>>,
    pub extensions: Option<Extensions>,
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDef {
    pub name: Option<String>,
    pub camera: Option<usize>,
    #[serde(default)]
    pub children: Vec<usize>,
    pub skin: Option<usize>,
    pub matrix: Option<[f32; 16]>,
    pub mesh: Option<usize>,
    pub rotation: Option<[f32; 4]>,
    pub scale: Option<[f32; 3]>,
    pub translation: Option<[f32; 3]>,
    pub weights: Option<Vec<f32>>,
    pub extensions: Option<Extensions>,
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkinDef {
    pub inverse_bind_matrices: Option<usize>,
    pub skeleton: Option<usize>,
    #[serde(default)]
    pub joints: Vec<usize>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraDef {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub perspective: Option<PerspectiveDef>,
    pub orthographic: Option<OrthographicDef>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerspectiveDef {
    pub aspect_ratio: Option<f32>,
    pub yfov: f32,
    pub zfar: Option<f32>,
    pub znear: f32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrthographicDef {
    pub xmag: f32,
    pub ymag: f32,
    pub zfar: f32,
    pub znear: f32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationDef {
    pub name: Option<String>,
    #[serde(default)]
    pub channels: Vec<ChannelDef>,
    #[serde(default)]
    pub samplers: Vec<AnimationSamplerDef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelDef {
    pub sampler: usize,
    pub target: ChannelTargetDef,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelTargetDef {
    pub node: Option<usize>,
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationSamplerDef {
    pub input: usize,
    pub interpolation: Option<String>,
    pub output: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDef {
    pub name: Option<String>,
    #[serde(default)]
    pub nodes: Vec<usize>,
    pub extensions: Option<Extensions>,
    pub extras: Option<Value>,
}
