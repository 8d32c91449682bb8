use std::sync::Arc;

use serde_json::Value;

use crate::index::DependencyKey;

use super::{primitive::PrimitiveAsset, skin::SkeletonAsset};

#[derive(Debug, Clone)]
pub struct MeshAsset {
    pub id: DependencyKey,
    pub name: String,
    pub primitives: Vec<PrimitiveAsset>,
    pub weights: Vec<f32>,
    /// Set when the mesh is attached to a skinned node.
    pub skeleton: Option<Arc<SkeletonAsset>>,
    pub extras: Option<Value>,
}

impl MeshAsset {
    /// Copy the mesh with its own geometry and material objects.
    ///
    /// `suffix` is appended to the mesh name and every primitive name.
    pub fn deep_clone(&self, suffix: &str) -> MeshAsset {
        let primitives = self
            .primitives
            .iter()
            .map(|primitive| PrimitiveAsset {
                name: format!("{}{}", primitive.name, suffix),
                geometry: Arc::new(primitive.geometry.as_ref().clone()),
                material: Arc::new(primitive.material.as_ref().clone()),
                ..primitive.clone()
            })
            .collect();
        MeshAsset {
            id: self.id,
            name: format!("{}{}", self.name, suffix),
            primitives,
            weights: self.weights.clone(),
            skeleton: self.skeleton.clone(),
            extras: self.extras.clone(),
        }
    }

    /// Override the morph influences of every morphed primitive.
    pub fn set_morph_weights(&mut self, weights: &[f32]) {
        for primitive in self.primitives.iter_mut() {
            for (influence, weight) in primitive
                .morph_target_influences
                .iter_mut()
                .zip(weights.iter())
            {
                *influence = *weight;
            }
        }
    }
}
