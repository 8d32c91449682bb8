use std::{collections::BTreeMap, rc::Rc, sync::Arc};

use futures::{future::LocalBoxFuture, FutureExt};
use log::warn;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    index::EntityKind,
    loader::gltf::{
        accessor::accessor_layout, schema::PrimitiveDef, session::missing, GltfDocumentLoader,
        GltfLoadResult, GltfLoaderError,
    },
    primitive::{GeometryAsset, VertexAttribute},
};

use super::{
    parse_extension, CompressedAttribute, MeshDecoder, PrimitiveDecoderExtension,
    KHR_DRACO_MESH_COMPRESSION,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DracoDef {
    pub buffer_view: usize,
    #[serde(default)]
    pub attributes: BTreeMap<String, u32>,
}

/// KHR_draco_mesh_compression, decoding through the embedder's [`MeshDecoder`].
pub struct DracoExtension {
    decoder: Rc<dyn MeshDecoder>,
}

impl DracoExtension {
    pub fn new(decoder: Rc<dyn MeshDecoder>) -> Self {
        Self { decoder }
    }

    fn compressed_attributes(
        loader: &GltfDocumentLoader,
        primitive: &PrimitiveDef,
        def: &DracoDef,
    ) -> GltfLoadResult<BTreeMap<VertexAttribute, CompressedAttribute>> {
        let mut attributes = BTreeMap::new();
        for (semantic, id) in &def.attributes {
            let Some(accessor) = primitive.attributes.get(semantic) else {
                warn!("Compressed attribute {} has no accessor", semantic);
                continue;
            };
            let accessor_def = loader
                .json
                .accessors
                .get(*accessor)
                .ok_or_else(|| missing(EntityKind::Accessor, *accessor))?;
            let (component_type, dimensions) = accessor_layout(accessor_def)?;
            attributes.insert(
                VertexAttribute::from_semantic(semantic),
                CompressedAttribute {
                    id: *id,
                    component_type,
                    dimensions,
                    normalized: accessor_def.normalized,
                },
            );
        }
        Ok(attributes)
    }
}

impl PrimitiveDecoderExtension for DracoExtension {
    fn decode_primitive<'a>(
        &'a self,
        loader: &'a Rc<GltfDocumentLoader>,
        primitive: &'a PrimitiveDef,
        extension: &'a Value,
    ) -> LocalBoxFuture<'a, GltfLoadResult<GeometryAsset>> {
        async move {
            let def: DracoDef = parse_extension(KHR_DRACO_MESH_COMPRESSION, extension)?;
            let attributes = Self::compressed_attributes(loader, primitive, &def)?;
            let data = loader.buffer_view(def.buffer_view).await?;
            let mut geometry = self
                .decoder
                .decode(data, &attributes)
                .await
                .map_err(|error| {
                    GltfLoaderError::Decoder(KHR_DRACO_MESH_COMPRESSION.to_string(), Arc::from(error))
                })?;
            for (attribute, layout) in &attributes {
                if let Some(view) = geometry.attributes.get_mut(attribute) {
                    if view.normalized != layout.normalized {
                        Arc::make_mut(view).normalized = layout.normalized;
                    }
                }
            }
            Ok(geometry)
        }
        .boxed_local()
    }
}
