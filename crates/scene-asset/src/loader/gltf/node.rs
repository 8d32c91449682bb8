use std::{rc::Rc, sync::Arc};

use futures::{
    future::{try_join_all, LocalBoxFuture},
    try_join, FutureExt,
};
use glam::Mat4;
use log::warn;
use serde::Deserialize;

use crate::{
    camera::{
        CameraAsset, CameraProjectionAsset, OrthographicCameraAsset, PerspectiveCameraAsset,
    },
    index::{DependencyKey, EntityKind, ObjectId},
    light::LightAsset,
    node::{sanitize_node_name, NodeAsset, NodeContent, NodeKind, NodeTransform},
    scene::SceneAsset,
    skin::{Bone, SkeletonAsset, SkinAsset},
};

use super::{
    extension::{parse_extension, KHR_LIGHTS_PUNCTUAL},
    schema::CameraDef,
    session::missing,
    GltfDocumentLoader, GltfLoadResult, GltfLoaderError,
};

#[derive(Debug, Deserialize)]
struct NodeLightDef {
    light: usize,
}

fn camera_projection(def: &CameraDef) -> Option<CameraProjectionAsset> {
    match def.kind.as_str() {
        "perspective" => def.perspective.as_ref().map(|perspective| {
            CameraProjectionAsset::Perspective(PerspectiveCameraAsset {
                aspect_ratio: perspective.aspect_ratio,
                yfov: perspective.yfov,
                zfar: perspective.zfar,
                znear: perspective.znear,
            })
        }),
        "orthographic" => def.orthographic.as_ref().map(|orthographic| {
            CameraProjectionAsset::Orthographic(OrthographicCameraAsset {
                xmag: orthographic.xmag,
                ymag: orthographic.ymag,
                zfar: orthographic.zfar,
                znear: orthographic.znear,
            })
        }),
        _ => None,
    }
}

impl GltfDocumentLoader {
    pub(crate) async fn load_skin(self: Rc<Self>, index: usize) -> GltfLoadResult<Arc<SkinAsset>> {
        let def = self
            .json
            .skins
            .get(index)
            .ok_or_else(|| missing(EntityKind::Skin, index))?;
        let matrices = match def.inverse_bind_matrices {
            Some(accessor) => self
                .accessor(accessor)
                .await?
                .map(|view| view.read_mat4())
                .unwrap_or_default(),
            None => Vec::new(),
        };
        let inverse_bind_matrices = (0..def.joints.len())
            .map(|joint| matrices.get(joint).copied().unwrap_or(Mat4::IDENTITY))
            .collect();
        Ok(Arc::new(SkinAsset {
            id: DependencyKey::new(EntityKind::Skin, index),
            name: def.name.clone(),
            joints: def.joints.iter().copied().map(DependencyKey::node).collect(),
            inverse_bind_matrices,
            skeleton: def.skeleton.map(DependencyKey::node),
        }))
    }

    pub(crate) async fn load_camera(
        self: Rc<Self>,
        index: usize,
    ) -> GltfLoadResult<Option<Arc<CameraAsset>>> {
        let def = self
            .json
            .cameras
            .get(index)
            .ok_or_else(|| missing(EntityKind::Camera, index))?;
        let Some(projection) = camera_projection(def) else {
            warn!("Missing camera parameters for camera #{}", index);
            return Ok(None);
        };
        Ok(Some(Arc::new(CameraAsset {
            id: DependencyKey::new(EntityKind::Camera, index),
            projection,
            label: def.name.clone(),
        })))
    }

    pub(crate) async fn load_light(self: Rc<Self>, index: usize) -> GltfLoadResult<Arc<LightAsset>> {
        let lights = self.extensions.lights().ok_or_else(|| {
            GltfLoaderError::MissingExtensionHandler(KHR_LIGHTS_PUNCTUAL.to_string())
        })?;
        lights.load_light(&self.json, index).map(Arc::new)
    }

    /// Node content with its attachments. Children are linked by [`Self::load_scene`].
    pub(crate) async fn load_node(self: Rc<Self>, index: usize) -> GltfLoadResult<Arc<NodeContent>> {
        let def = self
            .json
            .nodes
            .get(index)
            .ok_or_else(|| missing(EntityKind::Node, index))?;

        let mesh = async {
            let Some(mesh) = def.mesh else {
                return Ok(None);
            };
            let mut mesh = self.mesh(mesh).await?;
            match self.mesh_instances.get(&index) {
                Some(instance) if *instance > 0 => {
                    mesh = Arc::new(mesh.deep_clone(&format!("_instance_{}", instance)));
                }
                _ => {}
            }
            if let Some(weights) = &def.weights {
                Arc::make_mut(&mut mesh).set_morph_weights(weights);
            }
            Ok(Some(mesh))
        };
        let camera = async {
            match def.camera {
                Some(camera) => self.camera(camera).await,
                None => Ok(None),
            }
        };
        let light = async {
            let light = def
                .extensions
                .as_ref()
                .and_then(|extensions| extensions.get(KHR_LIGHTS_PUNCTUAL));
            match light {
                Some(value) => {
                    let def: NodeLightDef = parse_extension(KHR_LIGHTS_PUNCTUAL, value)?;
                    self.light(def.light).await.map(Some)
                }
                None => Ok(None),
            }
        };
        let skin = async {
            match def.skin {
                Some(skin) => self.skin(skin).await.map(Some),
                None => Ok(None),
            }
        };
        let (mesh, camera, light, skin) = try_join!(mesh, camera, light, skin)?;

        let mut content = NodeContent {
            id: DependencyKey::node(index),
            name: def.name.as_deref().map(sanitize_node_name),
            kind: NodeKind::Empty,
            transform: NodeTransform::from_parts(
                def.matrix,
                def.translation,
                def.rotation,
                def.scale,
            ),
            mesh,
            camera,
            light,
            skin,
            weights: def.weights.clone().unwrap_or_default(),
            extras: def.extras.clone(),
        };
        content.select_kind(self.joints.contains(&index));

        self.record_extensions(ObjectId::Entity(DependencyKey::node(index)), def.extensions.as_ref());
        Ok(Arc::new(content))
    }

    pub(crate) async fn load_scene(self: Rc<Self>, index: usize) -> GltfLoadResult<Arc<SceneAsset>> {
        let def = self
            .json
            .scenes
            .get(index)
            .ok_or_else(|| missing(EntityKind::Scene, index))?;
        let nodes = try_join_all(def.nodes.iter().map(|node| self.build_node(*node, Vec::new()))).await?;
        self.record_extensions(
            ObjectId::Entity(DependencyKey::new(EntityKind::Scene, index)),
            def.extensions.as_ref(),
        );
        Ok(Arc::new(SceneAsset {
            id: DependencyKey::new(EntityKind::Scene, index),
            name: def.name.clone(),
            nodes,
            extras: def.extras.clone(),
        }))
    }

    /// Node hierarchy below `index`. `ancestors` is the path from the scene root.
    fn build_node(
        self: &Rc<Self>,
        index: usize,
        mut ancestors: Vec<usize>,
    ) -> LocalBoxFuture<'_, GltfLoadResult<NodeAsset>> {
        async move {
            if ancestors.contains(&index) {
                return Err(GltfLoaderError::NodeCycle(index));
            }
            let def = self
                .json
                .nodes
                .get(index)
                .ok_or_else(|| missing(EntityKind::Node, index))?;
            ancestors.push(index);

            let content = self.node(index);
            let children = try_join_all(
                def.children
                    .iter()
                    .map(|child| self.build_node(*child, ancestors.clone())),
            );
            let (content, children) = try_join!(content, children)?;

            let mut content = content.as_ref().clone();
            if let (Some(skin), Some(mesh)) = (&content.skin, &mut content.mesh) {
                let skeleton = self.skeleton(skin);
                Arc::make_mut(mesh).skeleton = Some(Arc::new(skeleton));
            }
            Ok(NodeAsset { content, children })
        }
        .boxed_local()
    }

    fn skeleton(&self, skin: &SkinAsset) -> SkeletonAsset {
        let bones = skin
            .joints
            .iter()
            .zip(&skin.inverse_bind_matrices)
            .filter_map(|(joint, inverse_bind_matrix)| {
                let Some(node) = self.json.nodes.get(joint.index) else {
                    warn!("Joint {} could not be found", joint.index);
                    return None;
                };
                Some(Bone {
                    node: *joint,
                    name: node.name.as_deref().map(sanitize_node_name),
                    inverse_bind_matrix: *inverse_bind_matrix,
                })
            })
            .collect();
        SkeletonAsset {
            skin: skin.id,
            bones,
        }
    }
}
