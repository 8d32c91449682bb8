use std::{
    collections::{BTreeMap, HashMap},
    fmt::{self, Display, Formatter},
    sync::Arc,
};

use glam::Vec3;
use serde_json::Value;

use crate::accessor::AccessorView;

use super::material::MaterialAsset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveAssetMode {
    Points,
    LineList,
    LineStrip,
    LineLoop,
    TriangleList,
}

/// Vertex attribute under its canonical name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VertexAttribute {
    Position,
    Normal,
    Tangent,
    Uv,
    Uv2,
    Color,
    SkinWeight,
    SkinIndex,
    /// Any other semantic, lowercased.
    Other(String),
}

impl VertexAttribute {
    pub fn from_semantic(semantic: &str) -> Self {
        match semantic {
            "POSITION" => VertexAttribute::Position,
            "NORMAL" => VertexAttribute::Normal,
            "TANGENT" => VertexAttribute::Tangent,
            "TEXCOORD_0" => VertexAttribute::Uv,
            "TEXCOORD_1" => VertexAttribute::Uv2,
            "COLOR_0" => VertexAttribute::Color,
            "WEIGHTS_0" => VertexAttribute::SkinWeight,
            "JOINTS_0" => VertexAttribute::SkinIndex,
            other => VertexAttribute::Other(other.to_lowercase()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            VertexAttribute::Position => "position",
            VertexAttribute::Normal => "normal",
            VertexAttribute::Tangent => "tangent",
            VertexAttribute::Uv => "uv",
            VertexAttribute::Uv2 => "uv2",
            VertexAttribute::Color => "color",
            VertexAttribute::SkinWeight => "skinWeight",
            VertexAttribute::SkinIndex => "skinIndex",
            VertexAttribute::Other(name) => name,
        }
    }
}

impl Display for VertexAttribute {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Grow the box by `amount` on both sides of every axis.
    pub fn expand_by(&mut self, amount: Vec3) {
        self.min -= amount;
        self.max += amount;
    }

    pub fn bounding_sphere(&self) -> BoundingSphere {
        BoundingSphere {
            center: self.center(),
            radius: self.size().length() * 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

/// Morph target attribute sets, one entry per target.
#[derive(Debug, Clone, Default)]
pub struct MorphAttributes {
    pub position: Vec<Arc<AccessorView>>,
    pub normal: Vec<Arc<AccessorView>>,
}

impl MorphAttributes {
    pub fn target_count(&self) -> usize {
        self.position.len().max(self.normal.len())
    }
}

#[derive(Debug, Clone, Default)]
pub struct GeometryAsset {
    pub attributes: BTreeMap<VertexAttribute, Arc<AccessorView>>,
    pub indices: Option<Arc<AccessorView>>,
    pub morph_attributes: MorphAttributes,
    /// Morph data are displacements rather than absolute values.
    pub morph_targets_relative: bool,
    pub bounding_box: Option<BoundingBox>,
    pub bounding_sphere: Option<BoundingSphere>,
    pub extras: Option<Value>,
}

impl GeometryAsset {
    pub fn attribute(&self, attribute: &VertexAttribute) -> Option<&Arc<AccessorView>> {
        self.attributes.get(attribute)
    }

    pub fn vertex_count(&self) -> usize {
        self.attributes
            .get(&VertexAttribute::Position)
            .map(|accessor| accessor.count)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
pub struct PrimitiveAsset {
    pub name: String,
    pub geometry: Arc<GeometryAsset>,
    pub material: Arc<MaterialAsset>,
    pub mode: PrimitiveAssetMode,
    pub skinned: bool,
    pub morph_target_influences: Vec<f32>,
    pub morph_target_dictionary: HashMap<String, usize>,
}

impl PrimitiveAsset {
    pub fn has_morph_targets(&self) -> bool {
        !self.morph_target_influences.is_empty()
    }
}
