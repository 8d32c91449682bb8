use std::{
    cell::{OnceCell, RefCell},
    collections::{HashMap, HashSet},
    rc::Rc,
    sync::Arc,
};

use bytes::Bytes;
use futures::{
    future::try_join_all,
    try_join, FutureExt, TryFutureExt,
};
use log::{debug, warn};
use serde_json::Value;

use crate::{
    accessor::{AccessorView, ComponentType, InterleavedBuffer},
    animation::AnimationAsset,
    camera::CameraAsset,
    fetch::ResourceFetcher,
    index::{DependencyKey, EntityKind, ObjectId},
    light::LightAsset,
    loader::AssetLoadParams,
    material::{MaterialAsset, MaterialVariant},
    mesh::MeshAsset,
    node::NodeContent,
    primitive::GeometryAsset,
    scene::{AssetInfo, ExtensionSideChannel, GltfAsset, SceneAsset},
    skin::SkinAsset,
    texture::{TextureAsset, TextureImage},
};

use super::{
    cache::{SharedLoad, SingleFlight},
    extension::ExtensionRegistry,
    schema::{Extensions, Root},
    scheme::Scheme,
    GltfLoadResult, GltfLoaderError,
};

/// A resolved entity of any kind.
#[derive(Debug, Clone)]
pub(crate) enum Dependency {
    Buffer(Bytes),
    BufferView(Bytes),
    /// `None` for accessors without any data source.
    Accessor(Option<Arc<AccessorView>>),
    Texture(Arc<TextureAsset>),
    Material(Arc<MaterialAsset>),
    Mesh(Arc<MeshAsset>),
    Skin(Arc<SkinAsset>),
    Animation(Arc<AnimationAsset>),
    /// `None` for cameras without projection parameters.
    Camera(Option<Arc<CameraAsset>>),
    Light(Arc<LightAsset>),
    Node(Arc<NodeContent>),
    Scene(Arc<SceneAsset>),
    Collection(Vec<Dependency>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum CacheKey {
    Entity(DependencyKey),
    Collection(EntityKind),
}

/// Key of an interleaved allocation: bufferView, component type, stride slice and count.
pub(crate) type InterleavedKey = (usize, ComponentType, usize, usize);

/// One parse of one document.
///
/// Every entity is resolved at most once through [`GltfDocumentLoader::resolve`];
/// all requesters of a key share the same result, success or failure.
pub struct GltfDocumentLoader {
    pub(crate) json: Root,
    pub(crate) binary: Option<Bytes>,
    pub(crate) params: AssetLoadParams,
    fetcher: Rc<dyn ResourceFetcher>,
    pub(crate) extensions: ExtensionRegistry,

    pub(crate) joints: HashSet<usize>,
    pub(crate) skinned_meshes: HashSet<usize>,
    /// Instance number of the mesh use at each node, counted in node order.
    pub(crate) mesh_instances: HashMap<usize, usize>,

    cache: SingleFlight<CacheKey, Dependency>,
    pub(crate) geometry_cache: SingleFlight<String, Arc<GeometryAsset>>,
    /// Keyed by image index and whether the DDS decoder reads it.
    pub(crate) image_cache: SingleFlight<(usize, bool), Arc<TextureImage>>,
    pub(crate) interleaved_cache: RefCell<HashMap<InterleavedKey, Arc<InterleavedBuffer>>>,
    pub(crate) variant_cache: RefCell<HashMap<(Option<usize>, MaterialVariant), Arc<MaterialAsset>>>,
    pub(crate) default_material: OnceCell<Arc<MaterialAsset>>,
    side_channel: RefCell<ExtensionSideChannel>,
}

macro_rules! typed_resolver {
    ($name:ident, $kind:expr, $variant:ident, $ty:ty) => {
        pub async fn $name(self: &Rc<Self>, index: usize) -> GltfLoadResult<$ty> {
            let key = DependencyKey::new($kind, index);
            match self.resolve(key).await? {
                Dependency::$variant(value) => Ok(value),
                _ => Err(GltfLoaderError::UnexpectedDependency(key)),
            }
        }
    };
}

impl GltfDocumentLoader {
    pub(crate) fn new(
        json: Root,
        binary: Option<Bytes>,
        params: AssetLoadParams,
        fetcher: Rc<dyn ResourceFetcher>,
        extensions: ExtensionRegistry,
    ) -> Rc<Self> {
        let mut loader = Self {
            json,
            binary,
            params,
            fetcher,
            extensions,
            joints: HashSet::new(),
            skinned_meshes: HashSet::new(),
            mesh_instances: HashMap::new(),
            cache: SingleFlight::default(),
            geometry_cache: SingleFlight::default(),
            image_cache: SingleFlight::default(),
            interleaved_cache: RefCell::new(HashMap::new()),
            variant_cache: RefCell::new(HashMap::new()),
            default_material: OnceCell::new(),
            side_channel: RefCell::new(ExtensionSideChannel::new()),
        };
        loader.mark_defs();
        Rc::new(loader)
    }

    /// Pre-scan of the node list: joints, skinned meshes and mesh instance numbers.
    fn mark_defs(&mut self) {
        for skin in &self.json.skins {
            self.joints.extend(skin.joints.iter().copied());
        }
        let mut uses: HashMap<usize, usize> = HashMap::new();
        for (index, node) in self.json.nodes.iter().enumerate() {
            let Some(mesh) = node.mesh else {
                continue;
            };
            let count = uses.entry(mesh).or_insert(0);
            self.mesh_instances.insert(index, *count);
            *count += 1;
            if node.skin.is_some() {
                self.skinned_meshes.insert(mesh);
            }
        }
    }

    pub fn document(&self) -> &Root {
        &self.json
    }

    pub fn params(&self) -> &AssetLoadParams {
        &self.params
    }

    /// Resolve one entity, starting its load if nobody requested it yet.
    pub(crate) fn resolve(self: &Rc<Self>, key: DependencyKey) -> SharedLoad<Dependency> {
        let this = self.clone();
        self.cache.get_or_load(CacheKey::Entity(key), move || {
            let index = key.index;
            match key.kind {
                EntityKind::Buffer => this.load_buffer(index).map_ok(Dependency::Buffer).boxed_local(),
                EntityKind::BufferView => this
                    .load_buffer_view(index)
                    .map_ok(Dependency::BufferView)
                    .boxed_local(),
                EntityKind::Accessor => this
                    .load_accessor(index)
                    .map_ok(Dependency::Accessor)
                    .boxed_local(),
                EntityKind::Texture => this
                    .load_texture(index)
                    .map_ok(Dependency::Texture)
                    .boxed_local(),
                EntityKind::Material => this
                    .load_material(index)
                    .map_ok(Dependency::Material)
                    .boxed_local(),
                EntityKind::Mesh => this.load_mesh(index).map_ok(Dependency::Mesh).boxed_local(),
                EntityKind::Skin => this.load_skin(index).map_ok(Dependency::Skin).boxed_local(),
                EntityKind::Animation => this
                    .load_animation(index)
                    .map_ok(Dependency::Animation)
                    .boxed_local(),
                EntityKind::Camera => this
                    .load_camera(index)
                    .map_ok(Dependency::Camera)
                    .boxed_local(),
                EntityKind::Light => this.load_light(index).map_ok(Dependency::Light).boxed_local(),
                EntityKind::Node => this.load_node(index).map_ok(Dependency::Node).boxed_local(),
                EntityKind::Scene => this.load_scene(index).map_ok(Dependency::Scene).boxed_local(),
            }
        })
    }

    /// Resolve every entity of `kind`, in document order.
    pub(crate) fn resolve_all(self: &Rc<Self>, kind: EntityKind) -> SharedLoad<Dependency> {
        let this = self.clone();
        self.cache.get_or_load(CacheKey::Collection(kind), move || {
            async move {
                let count = this.entity_count(kind);
                let entries =
                    try_join_all((0..count).map(|index| this.resolve(DependencyKey::new(kind, index))))
                        .await?;
                Ok(Dependency::Collection(entries))
            }
            .boxed_local()
        })
    }

    /// Number of times a load was started for `key`.
    pub fn load_count(&self, key: DependencyKey) -> usize {
        self.cache.invocations(&CacheKey::Entity(key))
    }

    fn entity_count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Buffer => self.json.buffers.len(),
            EntityKind::BufferView => self.json.buffer_views.len(),
            EntityKind::Accessor => self.json.accessors.len(),
            EntityKind::Texture => self.json.textures.len(),
            EntityKind::Material => self.json.materials.len(),
            EntityKind::Mesh => self.json.meshes.len(),
            EntityKind::Skin => self.json.skins.len(),
            EntityKind::Animation => self.json.animations.len(),
            EntityKind::Camera => self.json.cameras.len(),
            EntityKind::Light => self.extensions.light_count(&self.json),
            EntityKind::Node => self.json.nodes.len(),
            EntityKind::Scene => self.json.scenes.len(),
        }
    }

    typed_resolver!(buffer, EntityKind::Buffer, Buffer, Bytes);
    typed_resolver!(buffer_view, EntityKind::BufferView, BufferView, Bytes);
    typed_resolver!(accessor, EntityKind::Accessor, Accessor, Option<Arc<AccessorView>>);
    typed_resolver!(texture, EntityKind::Texture, Texture, Arc<TextureAsset>);
    typed_resolver!(material, EntityKind::Material, Material, Arc<MaterialAsset>);
    typed_resolver!(mesh, EntityKind::Mesh, Mesh, Arc<MeshAsset>);
    typed_resolver!(skin, EntityKind::Skin, Skin, Arc<SkinAsset>);
    typed_resolver!(camera, EntityKind::Camera, Camera, Option<Arc<CameraAsset>>);
    typed_resolver!(light, EntityKind::Light, Light, Arc<LightAsset>);
    typed_resolver!(node, EntityKind::Node, Node, Arc<NodeContent>);

    async fn collection(self: &Rc<Self>, kind: EntityKind) -> GltfLoadResult<Vec<Dependency>> {
        match self.resolve_all(kind).await? {
            Dependency::Collection(entries) => Ok(entries),
            _ => Err(GltfLoaderError::UnexpectedDependency(DependencyKey::new(kind, 0))),
        }
    }

    /// Scenes, animations and cameras, each in document order.
    pub(crate) async fn load(self: Rc<Self>) -> GltfLoadResult<GltfAsset> {
        let (scenes, animations, cameras) = try_join!(
            self.collection(EntityKind::Scene),
            self.collection(EntityKind::Animation),
            self.collection(EntityKind::Camera),
        )?;
        let scenes: Vec<Arc<SceneAsset>> = scenes
            .into_iter()
            .filter_map(|entry| match entry {
                Dependency::Scene(scene) => Some(scene),
                _ => None,
            })
            .collect();
        let animations = animations
            .into_iter()
            .filter_map(|entry| match entry {
                Dependency::Animation(animation) => Some(animation),
                _ => None,
            })
            .collect();
        let cameras = cameras
            .into_iter()
            .filter_map(|entry| match entry {
                Dependency::Camera(camera) => camera,
                _ => None,
            })
            .collect();

        let scene = match self.json.scene {
            Some(index) => {
                let scene = scenes.get(index).cloned();
                if scene.is_none() {
                    warn!("Default scene #{} does not exist", index);
                }
                scene
            }
            None => scenes.first().cloned(),
        };

        self.record_extensions(ObjectId::Document, self.json.extensions.as_ref());
        let asset = self
            .json
            .asset
            .as_ref()
            .map(|asset| AssetInfo {
                version: asset.version.clone(),
                min_version: asset.min_version.clone(),
                generator: asset.generator.clone(),
                copyright: asset.copyright.clone(),
                extras: asset.extras.clone(),
            })
            .unwrap_or_default();
        debug!(
            "Parsed {} scenes, {} entities resolved, {} geometries built",
            scenes.len(),
            self.cache.len(),
            self.geometry_cache.len()
        );

        Ok(GltfAsset {
            scene,
            scenes,
            animations,
            cameras,
            asset,
            extensions: self.side_channel.borrow().clone(),
            extras: self.json.extras.clone(),
        })
    }

    /// Keep extension payloads no handler claims, keyed by their owner.
    pub(crate) fn record_extensions(&self, object: ObjectId, extensions: Option<&Extensions>) {
        let Some(extensions) = extensions else {
            return;
        };
        let unknown: Vec<(&String, &Value)> = extensions
            .iter()
            .filter(|(name, _)| !self.extensions.is_known(name))
            .collect();
        if unknown.is_empty() {
            return;
        }
        let mut side_channel = self.side_channel.borrow_mut();
        let entry = side_channel.entry(object).or_default();
        for (name, value) in unknown {
            entry.insert(name.clone(), value.clone());
        }
    }

    /// Bytes behind a buffer or image URI: inline data or a fetch.
    pub(crate) async fn load_uri(&self, uri: &str) -> GltfLoadResult<Bytes> {
        let scheme = Scheme::try_from(uri)?;
        match scheme.location(&self.params.resource_path) {
            Some(location) => {
                debug!("Fetching {}", location);
                Ok(self.fetcher.fetch(&location).await?)
            }
            None => match scheme {
                Scheme::Data(_, data) => Ok(Bytes::from(data)),
                _ => Ok(Bytes::new()),
            },
        }
    }

    async fn load_buffer(self: Rc<Self>, index: usize) -> GltfLoadResult<Bytes> {
        let def = self
            .json
            .buffers
            .get(index)
            .ok_or_else(|| missing(EntityKind::Buffer, index))?;
        if let Some(kind) = def.kind.as_ref().filter(|kind| *kind != "arraybuffer") {
            return Err(GltfLoaderError::BadBufferType(index, kind.clone()));
        }
        match &def.uri {
            Some(uri) => self.load_uri(uri).await,
            None if index == 0 => self
                .binary
                .clone()
                .ok_or(GltfLoaderError::MissingBufferData(index)),
            None => Err(GltfLoaderError::MissingBufferData(index)),
        }
    }

    async fn load_buffer_view(self: Rc<Self>, index: usize) -> GltfLoadResult<Bytes> {
        let def = self
            .json
            .buffer_views
            .get(index)
            .ok_or_else(|| missing(EntityKind::BufferView, index))?;
        let buffer = self.buffer(def.buffer).await?;
        let end = def
            .byte_offset
            .checked_add(def.byte_length)
            .unwrap_or(usize::MAX);
        if end > buffer.len() {
            return Err(GltfLoaderError::BufferViewOutOfBounds {
                view: index,
                end,
                buffer_length: buffer.len(),
            });
        }
        Ok(buffer.slice(def.byte_offset..end))
    }
}

pub(crate) fn missing(kind: EntityKind, index: usize) -> GltfLoaderError {
    GltfLoaderError::MissingEntity(DependencyKey::new(kind, index))
}
