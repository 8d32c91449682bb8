use std::{collections::BTreeMap, fmt::Write, rc::Rc, sync::Arc};

use futures::{future::try_join_all, try_join, FutureExt};
use glam::Vec3;
use log::warn;

use crate::{
    accessor::{AccessorView, ComponentType, Dimensions},
    primitive::{BoundingBox, GeometryAsset, MorphAttributes, VertexAttribute},
};

use super::{
    accessor::normalized_component_scale,
    extension::{parse_extension, DracoDef, KHR_DRACO_MESH_COMPRESSION},
    schema::{AccessorDef, PrimitiveDef},
    GltfDocumentLoader, GltfLoadResult,
};

pub(crate) const TRIANGLE_STRIP: u32 = 5;
pub(crate) const TRIANGLE_FAN: u32 = 6;

/// Content key of a primitive's geometry: identical keys build identical geometry.
pub(crate) fn geometry_cache_key(primitive: &PrimitiveDef) -> GltfLoadResult<String> {
    let indices = primitive
        .indices
        .map(|indices| indices.to_string())
        .unwrap_or_default();
    let draco = primitive
        .extensions
        .as_ref()
        .and_then(|extensions| extensions.get(KHR_DRACO_MESH_COMPRESSION));
    if let Some(value) = draco {
        let def: DracoDef = parse_extension(KHR_DRACO_MESH_COMPRESSION, value)?;
        let mut key = format!("draco:{}:{}:", def.buffer_view, indices);
        for (name, id) in &def.attributes {
            let _ = write!(key, "{}:{};", name, id);
        }
        return Ok(key);
    }
    // Attribute maps are sorted by name.
    let mut key = format!("{}:", indices);
    for (name, accessor) in &primitive.attributes {
        let _ = write!(key, "{}:{};", name, accessor);
    }
    let _ = write!(key, ":{}", primitive.mode.unwrap_or(4));
    Ok(key)
}

/// Authored min/max of an accessor, rescaled if the accessor is normalized.
fn accessor_bounds(def: &AccessorDef) -> GltfLoadResult<Option<(Vec3, Vec3)>> {
    let (Some(min), Some(max)) = (&def.min, &def.max) else {
        return Ok(None);
    };
    if min.len() < 3 || max.len() < 3 {
        return Ok(None);
    }
    let mut min = Vec3::new(min[0] as f32, min[1] as f32, min[2] as f32);
    let mut max = Vec3::new(max[0] as f32, max[1] as f32, max[2] as f32);
    if def.normalized {
        let component_type = ComponentType::from_code(def.component_type)
            .ok_or(super::GltfLoaderError::BadComponentType(def.component_type))?;
        let scale = normalized_component_scale(component_type)?;
        min *= scale;
        max *= scale;
    }
    Ok(Some((min, max)))
}

impl GltfDocumentLoader {
    /// Geometry of a primitive, built once per distinct content key.
    pub(crate) async fn primitive_geometry(
        self: &Rc<Self>,
        primitive: &PrimitiveDef,
    ) -> GltfLoadResult<Arc<GeometryAsset>> {
        let key = geometry_cache_key(primitive)?;
        let this = self.clone();
        let primitive = primitive.clone();
        self.geometry_cache
            .get_or_load(key, move || {
                async move { this.build_geometry(&primitive).await.map(Arc::new) }.boxed_local()
            })
            .await
    }

    async fn build_geometry(self: &Rc<Self>, primitive: &PrimitiveDef) -> GltfLoadResult<GeometryAsset> {
        let mut geometry = match self.extensions.primitive_decoder(primitive) {
            Some((_, decoder, value)) => decoder.decode_primitive(self, primitive, value).await?,
            None => GeometryAsset::default(),
        };
        self.add_primitive_attributes(&mut geometry, primitive).await?;
        match primitive.mode {
            Some(TRIANGLE_STRIP) => to_triangles(&mut geometry, true),
            Some(TRIANGLE_FAN) => to_triangles(&mut geometry, false),
            _ => {}
        }
        Ok(geometry)
    }

    async fn attribute_set(
        self: &Rc<Self>,
        attributes: &BTreeMap<String, usize>,
    ) -> GltfLoadResult<Vec<(VertexAttribute, Option<Arc<AccessorView>>)>> {
        try_join_all(attributes.iter().map(|(semantic, accessor)| async move {
            let view = self.accessor(*accessor).await?;
            Ok((VertexAttribute::from_semantic(semantic), view))
        }))
        .await
    }

    /// Attach every attribute, the indices and morph targets that the geometry
    /// does not carry yet, and compute bounds.
    async fn add_primitive_attributes(
        self: &Rc<Self>,
        geometry: &mut GeometryAsset,
        primitive: &PrimitiveDef,
    ) -> GltfLoadResult<()> {
        let indices = async {
            match primitive.indices {
                Some(indices) if geometry.indices.is_none() => self.accessor(indices).await,
                _ => Ok(None),
            }
        };
        let (attributes, indices) = try_join!(self.attribute_set(&primitive.attributes), indices)?;
        for (attribute, view) in attributes {
            if let Some(view) = view {
                geometry.attributes.entry(attribute).or_insert(view);
            }
        }
        if geometry.indices.is_none() {
            geometry.indices = indices;
        }

        geometry.bounding_box = self.compute_bounds(primitive)?;
        geometry.bounding_sphere = geometry
            .bounding_box
            .as_ref()
            .map(BoundingBox::bounding_sphere);

        if let Some(targets) = &primitive.targets {
            self.add_morph_targets(geometry, targets).await?;
        }
        if let Some(extras) = &primitive.extras {
            if extras.is_object() {
                geometry.extras = Some(extras.clone());
            } else {
                warn!("Ignoring primitive extras of type {}", json_kind(extras));
            }
        }
        Ok(())
    }

    fn compute_bounds(&self, primitive: &PrimitiveDef) -> GltfLoadResult<Option<BoundingBox>> {
        let Some(position) = primitive.attributes.get("POSITION") else {
            return Ok(None);
        };
        let Some(def) = self.json.accessors.get(*position) else {
            return Ok(None);
        };
        let Some((min, max)) = accessor_bounds(def)? else {
            warn!("Missing min/max properties for accessor POSITION");
            return Ok(None);
        };
        let mut bounds = BoundingBox { min, max };

        if let Some(targets) = &primitive.targets {
            let mut displacement = Vec3::ZERO;
            for target in targets {
                let Some(position) = target.get("POSITION") else {
                    continue;
                };
                let Some(def) = self.json.accessors.get(*position) else {
                    continue;
                };
                match accessor_bounds(def)? {
                    Some((min, max)) => displacement = displacement.max(min.abs().max(max.abs())),
                    None => warn!("Missing min/max properties for accessor POSITION"),
                }
            }
            bounds.expand_by(displacement);
        }
        Ok(Some(bounds))
    }

    async fn add_morph_targets(
        self: &Rc<Self>,
        geometry: &mut GeometryAsset,
        targets: &[BTreeMap<String, usize>],
    ) -> GltfLoadResult<()> {
        let has_position = targets.iter().any(|target| target.contains_key("POSITION"));
        let has_normal = targets.iter().any(|target| target.contains_key("NORMAL"));
        if !has_position && !has_normal {
            return Ok(());
        }

        let base_position = geometry.attributes.get(&VertexAttribute::Position).cloned();
        let base_normal = geometry.attributes.get(&VertexAttribute::Normal).cloned();
        let target_attribute = |target: &BTreeMap<String, usize>,
                                semantic: &'static str,
                                base: Option<Arc<AccessorView>>,
                                wanted: bool| {
            let accessor = target.get(semantic).copied();
            async move {
                if !wanted {
                    return Ok(None);
                }
                match accessor {
                    // A target accessor without data holds zero displacements.
                    Some(accessor) => match self.accessor(accessor).await {
                        Ok(None) => self.zeroed_accessor(accessor).map(|view| Some(Arc::new(view))),
                        other => other,
                    },
                    None => Ok(base),
                }
            }
        };
        let (positions, normals) = try_join!(
            try_join_all(
                targets
                    .iter()
                    .map(|target| target_attribute(target, "POSITION", base_position.clone(), has_position))
            ),
            try_join_all(
                targets
                    .iter()
                    .map(|target| target_attribute(target, "NORMAL", base_normal.clone(), has_normal))
            ),
        )?;

        geometry.morph_attributes = MorphAttributes {
            position: aligned_targets(positions, "POSITION"),
            normal: aligned_targets(normals, "NORMAL"),
        };
        geometry.morph_targets_relative = true;
        Ok(())
    }
}

/// One view per morph target, or none at all when some target has no data
/// for `semantic` and no base attribute stands in for it.
fn aligned_targets(
    views: Vec<Option<Arc<AccessorView>>>,
    semantic: &str,
) -> Vec<Arc<AccessorView>> {
    let targets = views.len();
    let views: Vec<_> = views.into_iter().flatten().collect();
    if !views.is_empty() && views.len() != targets {
        warn!(
            "Dropping {} morph targets: {} of {} have no data",
            semantic,
            targets - views.len(),
            targets
        );
        return Vec::new();
    }
    views
}

/// Rewrite strip or fan indices as a triangle list, indexing sequentially when
/// the geometry has no index accessor.
pub(crate) fn to_triangles(geometry: &mut GeometryAsset, strip: bool) {
    let index: Vec<u32> = match &geometry.indices {
        Some(indices) => indices.read_u32(),
        None => (0..geometry.vertex_count() as u32).collect(),
    };
    if index.len() < 3 {
        warn!("Too few indices to build triangles, keeping the primitive as is");
        return;
    }
    let triangles: Vec<u32> = if strip {
        (0..index.len() - 2)
            .flat_map(|i| {
                if i % 2 == 0 {
                    [index[i], index[i + 1], index[i + 2]]
                } else {
                    [index[i + 2], index[i + 1], index[i]]
                }
            })
            .collect()
    } else {
        (1..index.len() - 1)
            .flat_map(|i| [index[0], index[i], index[i + 1]])
            .collect()
    };
    geometry.indices = Some(Arc::new(AccessorView::from_u32(&triangles)));
}

/// Copy of `geometry` whose float skin weights sum to one per vertex.
///
/// `None` when the geometry has no float weights to fix.
pub(crate) fn normalize_skin_weights(geometry: &GeometryAsset) -> Option<GeometryAsset> {
    let weights = geometry.attributes.get(&VertexAttribute::SkinWeight)?;
    if weights.component_type != ComponentType::F32 || weights.dimensions != Dimensions::Vec4 {
        return None;
    }
    let mut values = weights.read_f32();
    for vertex in values.chunks_exact_mut(4) {
        let scale = 1.0 / vertex.iter().sum::<f32>();
        if scale.is_finite() {
            vertex.iter_mut().for_each(|weight| *weight *= scale);
        } else {
            vertex.copy_from_slice(&[1.0, 0.0, 0.0, 0.0]);
        }
    }
    let mut geometry = geometry.clone();
    geometry.attributes.insert(
        VertexAttribute::SkinWeight,
        Arc::new(AccessorView::from_f32(Dimensions::Vec4, &values)),
    );
    Some(geometry)
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
