use std::sync::Arc;

use bytes::Bytes;

use crate::index::DependencyKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureAssetFormat {
    Ru8,
    Rgu8,
    Rgbu8,
    Rgbau8,
    Ru16,
    Rgu16,
    Rgbu16,
    Rgbau16,
}

#[derive(Debug, Clone)]
pub enum TextureImage {
    /// Raw pixels, rows tightly packed, 16-bit channels little-endian.
    Decoded {
        size: (u32, u32),
        format: TextureAssetFormat,
        data: Vec<u8>,
    },
    /// Image bytes left in their container format.
    Encoded {
        mime_type: Option<String>,
        data: Bytes,
    },
}

#[derive(Debug, Clone)]
pub struct TextureAsset {
    pub id: DependencyKey,
    pub name: Option<String>,
    pub image: Arc<TextureImage>,
    pub sampler: SamplerAsset,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextureMagFilter {
    Nearest,
    #[default]
    Linear,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextureMinFilter {
    Nearest,
    #[default]
    Linear,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextureMipmapFilter {
    Nearest,
    #[default]
    Linear,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextureWrappingMode {
    ClampToEdge,
    MirroredRepeat,
    #[default]
    Repeat,
}

impl TextureWrappingMode {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            33071 => Some(TextureWrappingMode::ClampToEdge),
            33648 => Some(TextureWrappingMode::MirroredRepeat),
            10497 => Some(TextureWrappingMode::Repeat),
            _ => None,
        }
    }
}

impl TextureMagFilter {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            9728 => Some(TextureMagFilter::Nearest),
            9729 => Some(TextureMagFilter::Linear),
            _ => None,
        }
    }
}

/// Split a minification filter code into its filter and mipmap parts.
pub fn min_filter_from_code(code: u32) -> Option<(TextureMinFilter, Option<TextureMipmapFilter>)> {
    match code {
        9728 => Some((TextureMinFilter::Nearest, None)),
        9729 => Some((TextureMinFilter::Linear, None)),
        9984 => Some((TextureMinFilter::Nearest, Some(TextureMipmapFilter::Nearest))),
        9985 => Some((TextureMinFilter::Linear, Some(TextureMipmapFilter::Nearest))),
        9986 => Some((TextureMinFilter::Nearest, Some(TextureMipmapFilter::Linear))),
        9987 => Some((TextureMinFilter::Linear, Some(TextureMipmapFilter::Linear))),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerAsset {
    pub mag_filter: TextureMagFilter,
    pub min_filter: TextureMinFilter,
    /// `None` disables mipmapping.
    pub mipmap_filter: Option<TextureMipmapFilter>,
    pub wrap_x: TextureWrappingMode,
    pub wrap_y: TextureWrappingMode,
}

impl Default for SamplerAsset {
    fn default() -> Self {
        Self {
            mag_filter: TextureMagFilter::Linear,
            min_filter: TextureMinFilter::Linear,
            mipmap_filter: Some(TextureMipmapFilter::Linear),
            wrap_x: TextureWrappingMode::Repeat,
            wrap_y: TextureWrappingMode::Repeat,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColorSpace {
    #[default]
    Linear,
    Srgb,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureAssetTransform {
    pub offset: [f32; 2],
    pub rotation: f32,
    pub scale: [f32; 2],
}

impl Default for TextureAssetTransform {
    fn default() -> Self {
        Self {
            offset: [0.0, 0.0],
            rotation: 0.0,
            scale: [1.0, 1.0],
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextureInfo {
    pub texture: Arc<TextureAsset>,
    pub tex_coord: usize,
    pub color_space: ColorSpace,
    pub transform: Option<TextureAssetTransform>,
}

impl TextureInfo {
    pub(crate) fn from_texture(texture: Arc<TextureAsset>) -> Self {
        Self {
            texture,
            tex_coord: 0,
            color_space: ColorSpace::Linear,
            transform: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NormalTextureInfo {
    pub info: TextureInfo,
    pub scale: f32,
}

#[derive(Debug, Clone)]
pub struct OcclusionTextureInfo {
    pub info: TextureInfo,
    pub strength: f32,
}
