use crate::index::DependencyKey;

#[derive(Debug, Clone)]
pub struct CameraAsset {
    pub id: DependencyKey,
    pub projection: CameraProjectionAsset,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CameraProjectionAsset {
    Orthographic(OrthographicCameraAsset),
    Perspective(PerspectiveCameraAsset),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrthographicCameraAsset {
    pub xmag: f32,
    pub ymag: f32,
    pub zfar: f32,
    pub znear: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveCameraAsset {
    pub aspect_ratio: Option<f32>,
    /// Vertical field of view in radians.
    pub yfov: f32,
    /// `None` for an infinite projection.
    pub zfar: Option<f32>,
    pub znear: f32,
}
