use std::{rc::Rc, sync::Arc};

use futures::FutureExt;
use log::warn;
use serde::Deserialize;

use crate::{
    index::{DependencyKey, EntityKind, ObjectId},
    loader::texture::decode_image,
    texture::{
        min_filter_from_code, ColorSpace, NormalTextureInfo, SamplerAsset, TextureAsset,
        TextureImage, TextureInfo, TextureMagFilter, TextureWrappingMode,
    },
};

use super::{
    extension::{parse_extension, KHR_TEXTURE_TRANSFORM, MSFT_TEXTURE_DDS},
    schema::{SamplerDef, TextureInfoDef},
    scheme::Scheme,
    session::missing,
    GltfDocumentLoader, GltfImageSource, GltfLoadResult, GltfLoaderError,
};

/// What a texture reference is used for, deciding its color space and UV set rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureRole {
    BaseColor,
    MetallicRoughness,
    Normal,
    Occlusion,
    Emissive,
    Diffuse,
    SpecularGlossiness,
    Clearcoat,
    ClearcoatRoughness,
    ClearcoatNormal,
}

impl TextureRole {
    pub fn color_space(&self) -> ColorSpace {
        match self {
            TextureRole::BaseColor
            | TextureRole::Emissive
            | TextureRole::Diffuse
            | TextureRole::SpecularGlossiness => ColorSpace::Srgb,
            _ => ColorSpace::Linear,
        }
    }

    fn supports_tex_coord(&self, tex_coord: usize) -> bool {
        tex_coord == 0 || (*self == TextureRole::Occlusion && tex_coord == 1)
    }
}

#[derive(Debug, Deserialize)]
struct DdsDef {
    source: usize,
}

fn sampler_asset(def: Option<&SamplerDef>) -> SamplerAsset {
    let mut sampler = SamplerAsset::default();
    let Some(def) = def else {
        return sampler;
    };
    if let Some(mag_filter) = def.mag_filter.and_then(TextureMagFilter::from_code) {
        sampler.mag_filter = mag_filter;
    }
    if let Some((min_filter, mipmap_filter)) = def.min_filter.and_then(min_filter_from_code) {
        sampler.min_filter = min_filter;
        sampler.mipmap_filter = mipmap_filter;
    }
    if let Some(wrap) = def.wrap_s.and_then(TextureWrappingMode::from_code) {
        sampler.wrap_x = wrap;
    }
    if let Some(wrap) = def.wrap_t.and_then(TextureWrappingMode::from_code) {
        sampler.wrap_y = wrap;
    }
    sampler
}

impl GltfDocumentLoader {
    pub(crate) async fn load_texture(self: Rc<Self>, index: usize) -> GltfLoadResult<Arc<TextureAsset>> {
        let def = self
            .json
            .textures
            .get(index)
            .ok_or_else(|| missing(EntityKind::Texture, index))?;
        let dds = match (
            self.extensions.dds(),
            def.extensions
                .as_ref()
                .and_then(|extensions| extensions.get(MSFT_TEXTURE_DDS)),
        ) {
            (Some(_), Some(value)) => Some(parse_extension::<DdsDef>(MSFT_TEXTURE_DDS, value)?.source),
            _ => None,
        };
        let source = dds
            .or(def.source)
            .ok_or(GltfLoaderError::MissingImageSource(index))?;
        let image = self.image(source, dds.is_some()).await?;
        let sampler = def.sampler.and_then(|sampler| {
            let found = self.json.samplers.get(sampler);
            if found.is_none() {
                warn!("Texture #{} references missing sampler #{}", index, sampler);
            }
            found
        });
        self.record_extensions(
            ObjectId::Entity(DependencyKey::new(EntityKind::Texture, index)),
            def.extensions.as_ref(),
        );
        Ok(Arc::new(TextureAsset {
            id: DependencyKey::new(EntityKind::Texture, index),
            name: def.name.clone(),
            image,
            sampler: sampler_asset(sampler),
        }))
    }

    /// Decoded image, shared by every texture reading it the same way.
    async fn image(self: &Rc<Self>, index: usize, dds: bool) -> GltfLoadResult<Arc<TextureImage>> {
        let this = self.clone();
        self.image_cache
            .get_or_load((index, dds), move || {
                async move { this.load_image(index, dds).await.map(Arc::new) }.boxed_local()
            })
            .await
    }

    async fn load_image(self: Rc<Self>, index: usize, dds: bool) -> GltfLoadResult<TextureImage> {
        let def = self
            .json
            .images
            .get(index)
            .ok_or(GltfLoaderError::MissingImage(index))?;
        let (source, data, mime_type) = match (&def.uri, def.buffer_view) {
            (_, Some(view)) => (
                GltfImageSource::BufferView(view),
                self.buffer_view(view).await?,
                def.mime_type.clone(),
            ),
            (Some(uri), None) => {
                let mime_type = match Scheme::try_from(uri.as_str())? {
                    Scheme::Data(Some(mime), _) => Some(mime.to_string()),
                    _ => def.mime_type.clone(),
                };
                (
                    GltfImageSource::Uri(uri.clone()),
                    self.load_uri(uri).await?,
                    mime_type,
                )
            }
            (None, None) => return Err(GltfLoaderError::MissingImage(index)),
        };

        if dds {
            let decoder = self.extensions.dds().ok_or_else(|| {
                GltfLoaderError::MissingExtensionHandler(MSFT_TEXTURE_DDS.to_string())
            })?;
            return decoder.decode(data).await.map_err(|error| {
                GltfLoaderError::Decoder(MSFT_TEXTURE_DDS.to_string(), Arc::from(error))
            });
        }
        if !self.params.decode_images {
            return Ok(TextureImage::Encoded { mime_type, data });
        }
        decode_image(&data, mime_type.as_deref())
            .map_err(|error| GltfLoaderError::BadImage(source, Arc::new(error)))
    }

    /// Resolve a material's texture reference.
    ///
    /// Unsupported UV sets are reported and replaced by set 0.
    pub async fn texture_info(
        self: &Rc<Self>,
        def: &TextureInfoDef,
        role: TextureRole,
    ) -> GltfLoadResult<TextureInfo> {
        let texture = self.texture(def.index).await?;
        let mut info = TextureInfo::from_texture(texture);
        info.color_space = role.color_space();
        if role.supports_tex_coord(def.tex_coord) {
            info.tex_coord = def.tex_coord;
        } else {
            warn!(
                "Custom UV set {} for {:?} texture not yet supported",
                def.tex_coord, role
            );
        }
        let transform = def
            .extensions
            .as_ref()
            .and_then(|extensions| extensions.get(KHR_TEXTURE_TRANSFORM));
        if let (Some(extension), Some(value)) = (self.extensions.texture_transform(), transform) {
            info = extension.extend_texture(info, value)?;
        }
        Ok(info)
    }

    pub async fn optional_texture_info(
        self: &Rc<Self>,
        def: Option<&TextureInfoDef>,
        role: TextureRole,
    ) -> GltfLoadResult<Option<TextureInfo>> {
        match def {
            Some(def) => self.texture_info(def, role).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn optional_normal_texture_info(
        self: &Rc<Self>,
        def: Option<&TextureInfoDef>,
        role: TextureRole,
    ) -> GltfLoadResult<Option<NormalTextureInfo>> {
        match def {
            Some(def) => Ok(Some(NormalTextureInfo {
                info: self.texture_info(def, role).await?,
                scale: def.scale.unwrap_or(1.0),
            })),
            None => Ok(None),
        }
    }
}
