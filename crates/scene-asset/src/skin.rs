use glam::Mat4;

use crate::index::DependencyKey;

#[derive(Debug, Clone)]
pub struct SkinAsset {
    pub id: DependencyKey,
    pub name: Option<String>,
    pub joints: Vec<DependencyKey>,
    /// One per joint; identity where the skin has no inverse-bind accessor.
    pub inverse_bind_matrices: Vec<Mat4>,
    pub skeleton: Option<DependencyKey>,
}

#[derive(Debug, Clone)]
pub struct Bone {
    pub node: DependencyKey,
    pub name: Option<String>,
    pub inverse_bind_matrix: Mat4,
}

/// Skeleton binding of a skin, bound to the meshes of a skinned node.
#[derive(Debug, Clone)]
pub struct SkeletonAsset {
    pub skin: DependencyKey,
    pub bones: Vec<Bone>,
}
