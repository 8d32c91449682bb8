use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};
use serde_json::Value;

use crate::index::DependencyKey;

use super::{camera::CameraAsset, light::LightAsset, mesh::MeshAsset, skin::SkinAsset};

#[derive(Debug, Clone, PartialEq)]
pub struct MatrixNodeTransform(pub Mat4);

#[derive(Debug, Clone, PartialEq)]
pub struct DecomposedTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for DecomposedTransform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeTransform {
    Matrix(MatrixNodeTransform),
    Decomposed(DecomposedTransform),
}

impl Default for NodeTransform {
    fn default() -> Self {
        Self::Decomposed(DecomposedTransform::default())
    }
}

impl From<MatrixNodeTransform> for Mat4 {
    fn from(value: MatrixNodeTransform) -> Self {
        value.0
    }
}

impl From<DecomposedTransform> for Mat4 {
    fn from(value: DecomposedTransform) -> Self {
        Mat4::from_translation(value.translation)
            * Mat4::from_quat(value.rotation)
            * Mat4::from_scale(value.scale)
    }
}

impl From<NodeTransform> for Mat4 {
    fn from(value: NodeTransform) -> Self {
        match value {
            NodeTransform::Matrix(matrix) => matrix.0,
            NodeTransform::Decomposed(decomposed) => decomposed.into(),
        }
    }
}

impl From<NodeTransform> for MatrixNodeTransform {
    fn from(value: NodeTransform) -> Self {
        match value {
            NodeTransform::Matrix(matrix) => matrix,
            NodeTransform::Decomposed(decomposed) => MatrixNodeTransform(decomposed.into()),
        }
    }
}

impl From<NodeTransform> for DecomposedTransform {
    fn from(value: NodeTransform) -> Self {
        match value {
            NodeTransform::Matrix(matrix) => {
                let (scale, rotation, translation) = matrix.0.to_scale_rotation_translation();
                DecomposedTransform {
                    translation,
                    rotation,
                    scale,
                }
            }
            NodeTransform::Decomposed(decomposed) => decomposed,
        }
    }
}

impl NodeTransform {
    /// Matrix wins over TRS; missing TRS parts default to identity.
    pub fn from_parts(
        matrix: Option<[f32; 16]>,
        translation: Option<[f32; 3]>,
        rotation: Option<[f32; 4]>,
        scale: Option<[f32; 3]>,
    ) -> Self {
        if let Some(matrix) = matrix {
            return NodeTransform::Matrix(MatrixNodeTransform(Mat4::from_cols_array(&matrix)));
        }
        let default = DecomposedTransform::default();
        NodeTransform::Decomposed(DecomposedTransform {
            translation: translation.map(Vec3::from_array).unwrap_or(default.translation),
            rotation: rotation.map(Quat::from_array).unwrap_or(default.rotation),
            scale: scale.map(Vec3::from_array).unwrap_or(default.scale),
        })
    }
}

/// What a node turned into once its attachments are known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Referenced by a skin as a joint.
    Joint,
    Mesh,
    Camera,
    Light,
    /// More than one attachment.
    Group,
    Empty,
}

/// Node content, without its place in a hierarchy.
#[derive(Debug, Clone)]
pub struct NodeContent {
    pub id: DependencyKey,
    pub name: Option<String>,
    pub kind: NodeKind,
    pub transform: NodeTransform,
    pub mesh: Option<Arc<MeshAsset>>,
    pub camera: Option<Arc<CameraAsset>>,
    pub light: Option<Arc<LightAsset>>,
    pub skin: Option<Arc<SkinAsset>>,
    pub weights: Vec<f32>,
    pub extras: Option<Value>,
}

impl NodeContent {
    pub(crate) fn select_kind(&mut self, is_joint: bool) {
        let attachments = [
            self.mesh.is_some(),
            self.camera.is_some(),
            self.light.is_some(),
        ];
        self.kind = if is_joint {
            NodeKind::Joint
        } else {
            match attachments.iter().filter(|attached| **attached).count() {
                0 => NodeKind::Empty,
                1 if self.mesh.is_some() => NodeKind::Mesh,
                1 if self.camera.is_some() => NodeKind::Camera,
                1 => NodeKind::Light,
                _ => NodeKind::Group,
            }
        };
    }
}

#[derive(Debug, Clone)]
pub struct NodeAsset {
    pub content: NodeContent,
    pub children: Vec<NodeAsset>,
}

impl NodeAsset {
    pub fn id(&self) -> DependencyKey {
        self.content.id
    }

    pub fn name(&self) -> Option<&str> {
        self.content.name.as_deref()
    }

    /// Depth-first walk over this node and its descendants.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a NodeAsset)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

/// Make a node name safe for use in animation track paths.
pub fn sanitize_node_name(name: &str) -> String {
    name.chars()
        .filter_map(|c| match c {
            '[' | ']' | '.' | ':' | '/' => None,
            c if c.is_whitespace() => Some('_'),
            c => Some(c),
        })
        .collect()
}
