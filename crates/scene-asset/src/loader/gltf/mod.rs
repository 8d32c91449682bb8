use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    rc::Rc,
    sync::Arc,
};

use bytes::Bytes;
use image::ImageError;
use log::debug;

use crate::{
    accessor::ComponentType,
    fetch::{FetchError, ResourceFetcher},
    index::DependencyKey,
    scene::GltfAsset,
};

use super::AssetLoadParams;

mod accessor;
mod animation;
mod cache;
pub mod container;
pub mod extension;
mod geometry;
mod material;
mod mesh;
mod node;
pub mod schema;
pub mod scheme;
mod session;
mod texture;

#[cfg(test)]
mod tests;

use container::ContainerError;
use extension::{ExtensionOptions, MaterialExtension, MeshDecoder, TextureDecoder};
use scheme::SchemeError;

pub use session::GltfDocumentLoader;
pub use texture::TextureRole;

#[derive(Debug, Clone)]
pub enum GltfImageSource {
    BufferView(usize),
    Uri(String),
}

impl Display for GltfImageSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            GltfImageSource::BufferView(index) => write!(f, "bufferView #{}", index),
            GltfImageSource::Uri(uri) => Display::fmt(uri, f),
        }
    }
}

/// Failure of a whole parse.
///
/// Resolved dependencies are shared between all requesters, and so are their
/// errors, so this type is cheap to clone.
#[derive(Debug, Clone)]
pub enum GltfLoaderError {
    Container(ContainerError),
    Json(Arc<serde_json::Error>),
    MissingAsset,
    UnsupportedVersion(String),
    UnsupportedRequiredExtension(String),
    MissingExtensionHandler(String),
    BadExtensionData(String, Arc<serde_json::Error>),
    Decoder(String, Arc<dyn Error + Send + Sync>),
    InvalidScheme(SchemeError),
    Fetch(FetchError),
    MissingEntity(DependencyKey),
    UnexpectedDependency(DependencyKey),
    MissingBufferData(usize),
    BadBufferType(usize, String),
    BufferViewOutOfBounds {
        view: usize,
        end: usize,
        buffer_length: usize,
    },
    BadComponentType(u32),
    BadAccessorType(String),
    AccessorOutOfBounds(usize),
    MisalignedAccessor(usize),
    UnsupportedSparseItemSize(usize),
    SparseIndexOutOfBounds {
        accessor: usize,
        index: u32,
    },
    MissingImageSource(usize),
    MissingImage(usize),
    BadImage(GltfImageSource, Arc<ImageError>),
    UnsupportedPrimitiveMode(u32),
    UnsupportedNormalizedComponent(ComponentType),
    UnsupportedAnimationPath(String),
    UnsupportedInterpolation(String),
    MissingAnimationSampler {
        animation: usize,
        sampler: usize,
    },
    UnsupportedLightType(String),
    NodeCycle(usize),
}

impl Display for GltfLoaderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            GltfLoaderError::Container(error) => Display::fmt(error, f),
            GltfLoaderError::Json(error) => write!(f, "Bad document: {}", error),
            GltfLoaderError::MissingAsset => write!(f, "Document has no asset description"),
            GltfLoaderError::UnsupportedVersion(version) => {
                write!(f, "Unsupported asset version: {}", version)
            }
            GltfLoaderError::UnsupportedRequiredExtension(name) => {
                write!(f, "Unsupported required extension {}", name)
            }
            GltfLoaderError::MissingExtensionHandler(name) => {
                write!(f, "No handler supplied for extension {}", name)
            }
            GltfLoaderError::BadExtensionData(name, error) => {
                write!(f, "Bad data for extension {}: {}", name, error)
            }
            GltfLoaderError::Decoder(name, error) => {
                write!(f, "Decoder for {} failed: {}", name, error)
            }
            GltfLoaderError::InvalidScheme(error) => Display::fmt(error, f),
            GltfLoaderError::Fetch(error) => Display::fmt(error, f),
            GltfLoaderError::MissingEntity(key) => write!(f, "Reference to missing {}", key),
            GltfLoaderError::UnexpectedDependency(key) => {
                write!(f, "Resolved {} to an unexpected entity", key)
            }
            GltfLoaderError::MissingBufferData(index) => {
                write!(f, "No data for buffer #{}", index)
            }
            GltfLoaderError::BadBufferType(index, kind) => {
                write!(f, "Unsupported type {} for buffer #{}", kind, index)
            }
            GltfLoaderError::BufferViewOutOfBounds {
                view,
                end,
                buffer_length,
            } => write!(
                f,
                "bufferView #{} ends at {}, but its buffer has {} bytes",
                view, end, buffer_length
            ),
            GltfLoaderError::BadComponentType(code) => {
                write!(f, "Unknown component type {}", code)
            }
            GltfLoaderError::BadAccessorType(kind) => write!(f, "Unknown accessor type {}", kind),
            GltfLoaderError::AccessorOutOfBounds(index) => {
                write!(f, "Accessor #{} exceeds its bufferView", index)
            }
            GltfLoaderError::MisalignedAccessor(index) => {
                write!(f, "Accessor #{} is not aligned to its component size", index)
            }
            GltfLoaderError::UnsupportedSparseItemSize(size) => {
                write!(f, "Unsupported sparse item size {}", size)
            }
            GltfLoaderError::SparseIndexOutOfBounds { accessor, index } => write!(
                f,
                "Sparse index {} out of bounds of accessor #{}",
                index, accessor
            ),
            GltfLoaderError::MissingImageSource(texture) => {
                write!(f, "Texture #{} has no image source", texture)
            }
            GltfLoaderError::MissingImage(index) => {
                write!(f, "Image #{} is missing or has no data", index)
            }
            GltfLoaderError::BadImage(source, error) => {
                write!(f, "Bad image {}: {}", source, error)
            }
            GltfLoaderError::UnsupportedPrimitiveMode(mode) => {
                write!(f, "Unsupported primitive mode: {}", mode)
            }
            GltfLoaderError::UnsupportedNormalizedComponent(component_type) => write!(
                f,
                "Unsupported normalized component type {}",
                component_type
            ),
            GltfLoaderError::UnsupportedAnimationPath(path) => {
                write!(f, "Unsupported animation path {}", path)
            }
            GltfLoaderError::UnsupportedInterpolation(interpolation) => {
                write!(f, "Unsupported interpolation {}", interpolation)
            }
            GltfLoaderError::MissingAnimationSampler { animation, sampler } => write!(
                f,
                "Animation #{} has no sampler #{}",
                animation, sampler
            ),
            GltfLoaderError::UnsupportedLightType(kind) => {
                write!(f, "Unsupported light type {}", kind)
            }
            GltfLoaderError::NodeCycle(index) => {
                write!(f, "Node #{} is its own ancestor", index)
            }
        }
    }
}

impl Error for GltfLoaderError {}

impl From<ContainerError> for GltfLoaderError {
    fn from(value: ContainerError) -> Self {
        Self::Container(value)
    }
}

impl From<serde_json::Error> for GltfLoaderError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(Arc::new(value))
    }
}

impl From<SchemeError> for GltfLoaderError {
    fn from(value: SchemeError) -> Self {
        Self::InvalidScheme(value)
    }
}

impl From<FetchError> for GltfLoaderError {
    fn from(value: FetchError) -> Self {
        Self::Fetch(value)
    }
}

pub type GltfLoadResult<T> = Result<T, GltfLoaderError>;

/// Entry point for decoding documents.
///
/// Holds everything that outlives a single parse: parameters, the resource
/// fetcher and the decoders supplied by the embedding application. Each call
/// to [`GltfLoader::parse`] starts a fresh [`GltfDocumentLoader`] session.
pub struct GltfLoader {
    params: AssetLoadParams,
    fetcher: Rc<dyn ResourceFetcher>,
    options: ExtensionOptions,
}

impl GltfLoader {
    pub fn new(fetcher: impl ResourceFetcher + 'static) -> Self {
        Self {
            params: AssetLoadParams::default(),
            fetcher: Rc::new(fetcher),
            options: ExtensionOptions::default(),
        }
    }

    pub fn with_params(mut self, params: AssetLoadParams) -> Self {
        self.params = params;
        self
    }

    /// Decoder for KHR_draco_mesh_compression primitives.
    pub fn with_mesh_decoder(mut self, decoder: impl MeshDecoder + 'static) -> Self {
        self.options.mesh_decoder = Some(Rc::new(decoder));
        self
    }

    /// Decoder for MSFT_texture_dds images.
    pub fn with_dds_decoder(mut self, decoder: impl TextureDecoder + 'static) -> Self {
        self.options.dds_decoder = Some(Rc::new(decoder));
        self
    }

    /// Handle a material extension the loader has no built-in support for.
    pub fn with_material_extension(
        mut self,
        name: impl Into<String>,
        extension: impl MaterialExtension + 'static,
    ) -> Self {
        self.options
            .material_extensions
            .push((name.into(), Rc::new(extension)));
        self
    }

    pub fn params(&self) -> &AssetLoadParams {
        &self.params
    }

    /// Decode a document, either GLB or JSON text.
    pub async fn parse(&self, data: impl Into<Bytes>) -> GltfLoadResult<GltfAsset> {
        self.parse_with_params(data.into(), self.params.clone())
            .await
    }

    /// Fetch a document through the fetcher and decode it.
    ///
    /// Relative resources resolve against the document's directory unless
    /// [`AssetLoadParams::resource_path`] is set.
    pub async fn load(&self, uri: &str) -> GltfLoadResult<GltfAsset> {
        let data = self.fetcher.fetch(uri).await?;
        let mut params = self.params.clone();
        if params.resource_path.is_empty() {
            if let Some((directory, _)) = uri.rsplit_once('/') {
                params.resource_path = directory.to_string();
            }
        }
        self.parse_with_params(data, params).await
    }

    async fn parse_with_params(
        &self,
        data: Bytes,
        params: AssetLoadParams,
    ) -> GltfLoadResult<GltfAsset> {
        let demuxed = container::demux(data)?;
        let root: schema::Root = serde_json::from_slice(&demuxed.json)?;
        check_version(&root)?;
        debug!(
            "Parsing document: {} nodes, {} meshes, {} extensions used",
            root.nodes.len(),
            root.meshes.len(),
            root.extensions_used.len()
        );
        let registry = extension::ExtensionRegistry::build(&root, &self.options, &params)?;
        let session = GltfDocumentLoader::new(
            root,
            demuxed.binary,
            params,
            self.fetcher.clone(),
            registry,
        );
        session.load().await
    }
}

fn check_version(root: &schema::Root) -> GltfLoadResult<()> {
    let asset = root.asset.as_ref().ok_or(GltfLoaderError::MissingAsset)?;
    let major = asset
        .version
        .split('.')
        .next()
        .and_then(|major| major.trim().parse::<u32>().ok());
    match major {
        Some(major) if major >= 2 => Ok(()),
        _ => Err(GltfLoaderError::UnsupportedVersion(asset.version.clone())),
    }
}
