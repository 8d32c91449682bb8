use std::{collections::HashMap, rc::Rc, sync::Arc};

use futures::future::try_join_all;
use log::warn;
use serde_json::Value;

use crate::{
    index::{DependencyKey, EntityKind, ObjectId},
    material::{MaterialVariant, VariantTopology},
    mesh::MeshAsset,
    primitive::{GeometryAsset, PrimitiveAsset, PrimitiveAssetMode, VertexAttribute},
};

use super::{
    geometry::{normalize_skin_weights, TRIANGLE_FAN, TRIANGLE_STRIP},
    schema::{MeshDef, PrimitiveDef},
    session::missing,
    GltfDocumentLoader, GltfLoadResult, GltfLoaderError,
};

pub(crate) fn primitive_mode(mode: Option<u32>) -> GltfLoadResult<PrimitiveAssetMode> {
    match mode.unwrap_or(4) {
        0 => Ok(PrimitiveAssetMode::Points),
        1 => Ok(PrimitiveAssetMode::LineList),
        2 => Ok(PrimitiveAssetMode::LineLoop),
        3 => Ok(PrimitiveAssetMode::LineStrip),
        4 | TRIANGLE_STRIP | TRIANGLE_FAN => Ok(PrimitiveAssetMode::TriangleList),
        other => Err(GltfLoaderError::UnsupportedPrimitiveMode(other)),
    }
}

fn material_variant_flags(
    geometry: &GeometryAsset,
    mode: PrimitiveAssetMode,
    skinned: bool,
) -> MaterialVariant {
    let topology = match mode {
        PrimitiveAssetMode::Points => VariantTopology::Points,
        PrimitiveAssetMode::LineList | PrimitiveAssetMode::LineStrip | PrimitiveAssetMode::LineLoop => {
            VariantTopology::Lines
        }
        PrimitiveAssetMode::TriangleList => VariantTopology::Surface,
    };
    let morph_targets = !geometry.morph_attributes.position.is_empty();
    MaterialVariant {
        topology,
        skinning: skinned,
        vertex_tangents: geometry.attributes.contains_key(&VertexAttribute::Tangent),
        vertex_colors: geometry.attributes.contains_key(&VertexAttribute::Color),
        flat_shading: topology == VariantTopology::Surface
            && !geometry.attributes.contains_key(&VertexAttribute::Normal),
        morph_targets,
        morph_normals: morph_targets && !geometry.morph_attributes.normal.is_empty(),
    }
}

/// Morph target names from `extras.targetNames`, if they match the target count.
fn morph_target_dictionary(def: &MeshDef, target_count: usize) -> HashMap<String, usize> {
    let Some(names) = def
        .extras
        .as_ref()
        .and_then(|extras| extras.get("targetNames"))
        .and_then(Value::as_array)
    else {
        return HashMap::new();
    };
    if names.len() != target_count {
        warn!("Invalid extras.targetNames length. Ignoring names");
        return HashMap::new();
    }
    names
        .iter()
        .enumerate()
        .filter_map(|(index, name)| name.as_str().map(|name| (name.to_string(), index)))
        .collect()
}

impl GltfDocumentLoader {
    pub(crate) async fn load_mesh(self: Rc<Self>, index: usize) -> GltfLoadResult<Arc<MeshAsset>> {
        let def = self
            .json
            .meshes
            .get(index)
            .ok_or_else(|| missing(EntityKind::Mesh, index))?;
        let skinned = self.skinned_meshes.contains(&index);
        let name = def.name.clone().unwrap_or_else(|| format!("mesh_{}", index));

        let primitives = try_join_all(def.primitives.iter().enumerate().map(|(j, primitive)| {
            let name = if def.primitives.len() > 1 {
                format!("{}_{}", name, j)
            } else {
                name.clone()
            };
            self.load_primitive(def, primitive, name, skinned)
        }))
        .await?;

        self.record_extensions(
            ObjectId::Entity(DependencyKey::new(EntityKind::Mesh, index)),
            def.extensions.as_ref(),
        );
        Ok(Arc::new(MeshAsset {
            id: DependencyKey::new(EntityKind::Mesh, index),
            name,
            primitives,
            weights: def.weights.clone().unwrap_or_default(),
            skeleton: None,
            extras: def.extras.clone(),
        }))
    }

    async fn load_primitive(
        self: &Rc<Self>,
        mesh: &MeshDef,
        def: &PrimitiveDef,
        name: String,
        skinned: bool,
    ) -> GltfLoadResult<PrimitiveAsset> {
        let mode = primitive_mode(def.mode)?;
        let material = async {
            match def.material {
                Some(material) => self.material(material).await,
                None => Ok(self.default_material()),
            }
        };
        let (mut geometry, material) =
            futures::try_join!(self.primitive_geometry(def), material)?;

        if skinned && self.params.normalize_skin_weights {
            if let Some(normalized) = normalize_skin_weights(&geometry) {
                geometry = Arc::new(normalized);
            }
        }

        let variant = material_variant_flags(&geometry, mode, skinned);
        let material = self.material_variant(&material, variant);

        let target_count = geometry.morph_attributes.target_count();
        let mut morph_target_influences = vec![0.0; target_count];
        if let Some(weights) = &mesh.weights {
            for (influence, weight) in morph_target_influences.iter_mut().zip(weights) {
                *influence = *weight;
            }
        }
        let morph_target_dictionary = if target_count > 0 {
            morph_target_dictionary(mesh, target_count)
        } else {
            HashMap::new()
        };

        Ok(PrimitiveAsset {
            name,
            geometry,
            material,
            mode,
            skinned,
            morph_target_influences,
            morph_target_dictionary,
        })
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;
    use crate::accessor::{AccessorView, Dimensions};

    #[test]
    fn test_primitive_modes() {
        assert_eq!(primitive_mode(None).unwrap(), PrimitiveAssetMode::TriangleList);
        assert_eq!(primitive_mode(Some(2)).unwrap(), PrimitiveAssetMode::LineLoop);
        assert_eq!(primitive_mode(Some(3)).unwrap(), PrimitiveAssetMode::LineStrip);
        assert_eq!(primitive_mode(Some(6)).unwrap(), PrimitiveAssetMode::TriangleList);
        assert!(matches!(
            primitive_mode(Some(7)),
            Err(GltfLoaderError::UnsupportedPrimitiveMode(7))
        ));
    }

    #[test]
    fn test_variant_flags() {
        let mut geometry = GeometryAsset::default();
        geometry.attributes.insert(
            VertexAttribute::Color,
            Arc::new(AccessorView::from_f32(Dimensions::Vec3, &[1.0, 1.0, 1.0])),
        );
        let variant = material_variant_flags(&geometry, PrimitiveAssetMode::TriangleList, true);
        assert!(variant.skinning && variant.vertex_colors && variant.flat_shading);
        assert!(!variant.morph_targets);

        let lines = material_variant_flags(&geometry, PrimitiveAssetMode::LineStrip, false);
        assert_eq!(lines.topology, VariantTopology::Lines);
        assert!(!lines.flat_shading);
    }

    #[test]
    fn test_target_names() {
        let def: MeshDef =
            serde_json::from_value(json!({"extras": {"targetNames": ["smile", "blink"]}})).unwrap();
        let dictionary = morph_target_dictionary(&def, 2);
        assert_eq!(dictionary["blink"], 1);
        assert!(morph_target_dictionary(&def, 3).is_empty());
    }
}
