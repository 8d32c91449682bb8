use std::{collections::BTreeMap, sync::Arc};

use serde_json::{Map, Value};

use crate::{
    animation::AnimationAsset, camera::CameraAsset, index::DependencyKey, index::ObjectId,
};

use super::node::NodeAsset;

#[derive(Debug, Clone)]
pub struct SceneAsset {
    pub id: DependencyKey,
    pub name: Option<String>,
    pub nodes: Vec<NodeAsset>,
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct AssetInfo {
    pub version: String,
    pub min_version: Option<String>,
    pub generator: Option<String>,
    pub copyright: Option<String>,
    pub extras: Option<Value>,
}

/// Extension payloads no handler understood, per owning object.
pub type ExtensionSideChannel = BTreeMap<ObjectId, Map<String, Value>>;

/// Everything decoded from one document.
#[derive(Debug, Clone)]
pub struct GltfAsset {
    pub scene: Option<Arc<SceneAsset>>,
    pub scenes: Vec<Arc<SceneAsset>>,
    pub animations: Vec<Arc<AnimationAsset>>,
    pub cameras: Vec<Arc<CameraAsset>>,
    pub asset: AssetInfo,
    pub extensions: ExtensionSideChannel,
    pub extras: Option<Value>,
}

impl GltfAsset {
    pub fn unknown_extensions(&self, object: impl Into<ObjectId>) -> Option<&Map<String, Value>> {
        self.extensions.get(&object.into())
    }
}
