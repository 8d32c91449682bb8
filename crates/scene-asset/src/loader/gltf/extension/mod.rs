//! Extension handlers and the per-parse registry selecting them.
//!
//! Each handler implements one narrow capability: claiming materials,
//! transforming texture references, decoding compressed primitives or
//! loading lights. Handlers are picked by name from the document's
//! `extensionsUsed` list when a parse starts.

use std::{
    collections::{BTreeMap, HashSet},
    error::Error,
    rc::Rc,
};

use bytes::Bytes;
use futures::future::LocalBoxFuture;
use log::warn;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    accessor::{ComponentType, Dimensions},
    light::LightAsset,
    loader::AssetLoadParams,
    material::{MaterialAssetData, MaterialFamily},
    primitive::{GeometryAsset, VertexAttribute},
    texture::{TextureImage, TextureInfo},
};

use super::{
    schema::{MaterialDef, PrimitiveDef, Root},
    GltfDocumentLoader, GltfLoadResult, GltfLoaderError,
};

mod draco;
mod lights;
mod material;
mod texture_transform;

pub use draco::DracoExtension;
pub(crate) use draco::DracoDef;
pub use lights::LightsPunctualExtension;
pub use material::{ClearcoatExtension, SpecularGlossinessExtension, UnlitExtension};
pub use texture_transform::TextureTransformExtension;

pub const KHR_BINARY_GLTF: &str = "KHR_binary_glTF";
pub const KHR_DRACO_MESH_COMPRESSION: &str = "KHR_draco_mesh_compression";
pub const KHR_LIGHTS_PUNCTUAL: &str = "KHR_lights_punctual";
pub const KHR_MATERIALS_CLEARCOAT: &str = "KHR_materials_clearcoat";
pub const KHR_MATERIALS_PBR_SPECULAR_GLOSSINESS: &str = "KHR_materials_pbrSpecularGlossiness";
pub const KHR_MATERIALS_UNLIT: &str = "KHR_materials_unlit";
pub const KHR_MESH_QUANTIZATION: &str = "KHR_mesh_quantization";
pub const KHR_TEXTURE_TRANSFORM: &str = "KHR_texture_transform";
pub const MSFT_TEXTURE_DDS: &str = "MSFT_texture_dds";

/// Error type returned by decoders supplied by the embedding application.
pub type DecoderError = Box<dyn Error + Send + Sync>;

/// Layout of one compressed vertex attribute as declared by its accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressedAttribute {
    /// Attribute id inside the compressed stream.
    pub id: u32,
    pub component_type: ComponentType,
    pub dimensions: Dimensions,
    pub normalized: bool,
}

/// Decodes compressed mesh data, e.g. a Draco bitstream.
pub trait MeshDecoder {
    fn decode<'a>(
        &'a self,
        data: Bytes,
        attributes: &'a BTreeMap<VertexAttribute, CompressedAttribute>,
    ) -> LocalBoxFuture<'a, Result<GeometryAsset, DecoderError>>;
}

/// Decodes image formats the `image` crate does not read, e.g. DDS.
pub trait TextureDecoder {
    fn decode(&self, data: Bytes) -> LocalBoxFuture<'_, Result<TextureImage, DecoderError>>;
}

/// What a material extension handler is called with.
pub struct MaterialContext<'a> {
    pub loader: &'a Rc<GltfDocumentLoader>,
    pub material: &'a MaterialDef,
    /// The extension's own payload on the material.
    pub extension: &'a Value,
}

/// Claims materials declaring an extension.
pub trait MaterialExtension {
    /// Family selected by the extension, or `None` for extensions layering
    /// parameters onto whatever family was selected.
    fn family(&self) -> Option<MaterialFamily>;

    /// Build the material parameters. `base` is `None` for family-selecting
    /// extensions and the parameters built so far for layering ones.
    fn extend_params<'a>(
        &'a self,
        context: MaterialContext<'a>,
        base: Option<MaterialAssetData>,
    ) -> LocalBoxFuture<'a, GltfLoadResult<MaterialAssetData>>;
}

/// Rewrites a resolved texture reference.
pub trait TextureInfoExtension {
    fn extend_texture(&self, info: TextureInfo, extension: &Value) -> GltfLoadResult<TextureInfo>;
}

/// Produces a primitive's geometry from compressed data.
pub trait PrimitiveDecoderExtension {
    fn decode_primitive<'a>(
        &'a self,
        loader: &'a Rc<GltfDocumentLoader>,
        primitive: &'a PrimitiveDef,
        extension: &'a Value,
    ) -> LocalBoxFuture<'a, GltfLoadResult<GeometryAsset>>;
}

/// Produces lights from document-level light definitions.
pub trait LightExtension {
    fn light_count(&self, root: &Root) -> usize;
    fn load_light(&self, root: &Root, index: usize) -> GltfLoadResult<LightAsset>;
}

/// Capabilities supplied by the embedding application.
#[derive(Default)]
pub(crate) struct ExtensionOptions {
    pub mesh_decoder: Option<Rc<dyn MeshDecoder>>,
    pub dds_decoder: Option<Rc<dyn TextureDecoder>>,
    pub material_extensions: Vec<(String, Rc<dyn MaterialExtension>)>,
}

pub(crate) fn parse_extension<T: DeserializeOwned>(name: &str, value: &Value) -> GltfLoadResult<T> {
    T::deserialize(value)
        .map_err(|error| GltfLoaderError::BadExtensionData(name.to_string(), error.into()))
}

#[derive(Default)]
pub(crate) struct ExtensionRegistry {
    known: HashSet<String>,
    materials: Vec<(String, Rc<dyn MaterialExtension>)>,
    texture_transform: Option<Rc<dyn TextureInfoExtension>>,
    primitive_decoders: Vec<(String, Rc<dyn PrimitiveDecoderExtension>)>,
    lights: Option<Rc<dyn LightExtension>>,
    dds: Option<Rc<dyn TextureDecoder>>,
}

impl ExtensionRegistry {
    /// Select handlers for the extensions a document uses.
    ///
    /// A required extension without handler fails the parse; an unknown
    /// optional one is only reported and its payloads end up in the side
    /// channel.
    pub(crate) fn build(
        root: &Root,
        options: &ExtensionOptions,
        params: &AssetLoadParams,
    ) -> GltfLoadResult<Self> {
        let used: HashSet<&str> = root.extensions_used.iter().map(String::as_str).collect();
        let mut registry = ExtensionRegistry::default();

        // Family selectors are tried in registration order.
        if used.contains(KHR_MATERIALS_PBR_SPECULAR_GLOSSINESS) {
            registry.add_material(
                KHR_MATERIALS_PBR_SPECULAR_GLOSSINESS,
                Rc::new(SpecularGlossinessExtension),
            );
        }
        if used.contains(KHR_MATERIALS_UNLIT) {
            if params.disable_unlit {
                registry.known.insert(KHR_MATERIALS_UNLIT.to_string());
            } else {
                registry.add_material(KHR_MATERIALS_UNLIT, Rc::new(UnlitExtension));
            }
        }
        if used.contains(KHR_MATERIALS_CLEARCOAT) {
            registry.add_material(KHR_MATERIALS_CLEARCOAT, Rc::new(ClearcoatExtension));
        }
        for (name, extension) in &options.material_extensions {
            if used.contains(name.as_str()) {
                registry.add_material(name, extension.clone());
            }
        }
        if used.contains(KHR_TEXTURE_TRANSFORM) {
            registry.known.insert(KHR_TEXTURE_TRANSFORM.to_string());
            registry.texture_transform = Some(Rc::new(TextureTransformExtension));
        }
        if used.contains(KHR_LIGHTS_PUNCTUAL) {
            registry.known.insert(KHR_LIGHTS_PUNCTUAL.to_string());
            registry.lights = Some(Rc::new(LightsPunctualExtension));
        }
        if used.contains(KHR_DRACO_MESH_COMPRESSION) {
            let decoder = options.mesh_decoder.clone().ok_or_else(|| {
                GltfLoaderError::MissingExtensionHandler(KHR_DRACO_MESH_COMPRESSION.to_string())
            })?;
            registry.known.insert(KHR_DRACO_MESH_COMPRESSION.to_string());
            registry.primitive_decoders.push((
                KHR_DRACO_MESH_COMPRESSION.to_string(),
                Rc::new(DracoExtension::new(decoder)),
            ));
        }
        if used.contains(MSFT_TEXTURE_DDS) {
            let decoder = options.dds_decoder.clone().ok_or_else(|| {
                GltfLoaderError::MissingExtensionHandler(MSFT_TEXTURE_DDS.to_string())
            })?;
            registry.known.insert(MSFT_TEXTURE_DDS.to_string());
            registry.dds = Some(decoder);
        }
        for name in [KHR_BINARY_GLTF, KHR_MESH_QUANTIZATION] {
            if used.contains(name) {
                registry.known.insert(name.to_string());
            }
        }

        for name in &root.extensions_required {
            if !registry.is_known(name) {
                return Err(GltfLoaderError::UnsupportedRequiredExtension(name.clone()));
            }
        }
        for name in &root.extensions_used {
            if !registry.is_known(name) {
                warn!("Unknown extension \"{}\".", name);
            }
        }
        Ok(registry)
    }

    fn add_material(&mut self, name: &str, extension: Rc<dyn MaterialExtension>) {
        self.known.insert(name.to_string());
        self.materials.push((name.to_string(), extension));
    }

    /// Whether some handler interprets the extension `name`.
    pub(crate) fn is_known(&self, name: &str) -> bool {
        self.known.contains(name)
    }

    /// First family-selecting extension declared on `material`.
    pub(crate) fn family_extension<'a>(
        &'a self,
        material: &'a MaterialDef,
    ) -> Option<(&'a str, &'a Rc<dyn MaterialExtension>, &'a Value)> {
        let extensions = material.extensions.as_ref()?;
        self.materials
            .iter()
            .filter(|(_, extension)| extension.family().is_some())
            .find_map(|(name, extension)| {
                extensions
                    .get(name)
                    .map(|value| (name.as_str(), extension, value))
            })
    }

    /// Layering extensions declared on `material`, in registration order.
    pub(crate) fn layer_extensions<'a>(
        &'a self,
        material: &'a MaterialDef,
    ) -> Vec<(&'a str, &'a Rc<dyn MaterialExtension>, &'a Value)> {
        let Some(extensions) = material.extensions.as_ref() else {
            return Vec::new();
        };
        self.materials
            .iter()
            .filter(|(_, extension)| extension.family().is_none())
            .filter_map(|(name, extension)| {
                extensions
                    .get(name)
                    .map(|value| (name.as_str(), extension, value))
            })
            .collect()
    }

    pub(crate) fn texture_transform(&self) -> Option<&Rc<dyn TextureInfoExtension>> {
        self.texture_transform.as_ref()
    }

    pub(crate) fn primitive_decoder<'a>(
        &'a self,
        primitive: &'a PrimitiveDef,
    ) -> Option<(&'a str, &'a Rc<dyn PrimitiveDecoderExtension>, &'a Value)> {
        let extensions = primitive.extensions.as_ref()?;
        self.primitive_decoders.iter().find_map(|(name, decoder)| {
            extensions
                .get(name)
                .map(|value| (name.as_str(), decoder, value))
        })
    }

    pub(crate) fn lights(&self) -> Option<&Rc<dyn LightExtension>> {
        self.lights.as_ref()
    }

    pub(crate) fn light_count(&self, root: &Root) -> usize {
        self.lights
            .as_ref()
            .map(|lights| lights.light_count(root))
            .unwrap_or(0)
    }

    pub(crate) fn dds(&self) -> Option<&Rc<dyn TextureDecoder>> {
        self.dds.as_ref()
    }
}
