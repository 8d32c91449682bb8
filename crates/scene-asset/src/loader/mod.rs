/// glTF 2.0 / GLB loader.
pub mod gltf;

pub(crate) mod texture;

#[derive(Debug, Clone)]
pub struct AssetLoadParams {
    /// Base location relative URIs are resolved against.
    pub resource_path: String,
    /// Load unlit materials with the metallic-roughness model instead.
    pub disable_unlit: bool,
    /// Decode images into raw pixels. When disabled textures keep the encoded bytes.
    pub decode_images: bool,
    /// Rescale float skin weights of skinned primitives to sum to one.
    pub normalize_skin_weights: bool,
}

impl Default for AssetLoadParams {
    fn default() -> Self {
        Self {
            resource_path: String::new(),
            disable_unlit: false,
            decode_images: true,
            normalize_skin_weights: true,
        }
    }
}

impl AssetLoadParams {
    pub fn with_resource_path(mut self, resource_path: impl Into<String>) -> Self {
        self.resource_path = resource_path.into();
        self
    }
}
