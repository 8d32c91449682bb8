use std::io::Cursor;

use image::{DynamicImage, GenericImageView, ImageError, ImageFormat, ImageReader};

use crate::texture::{TextureAssetFormat, TextureImage};

fn into_le_bytes(data: Vec<u16>) -> Vec<u8> {
    data.into_iter().flat_map(|item| item.to_le_bytes()).collect()
}

pub(crate) fn image_to_texture(image: DynamicImage) -> TextureImage {
    let (size, data, format) = match image {
        DynamicImage::ImageLuma8(image) => (
            image.dimensions(),
            image.into_vec(),
            TextureAssetFormat::Ru8,
        ),
        DynamicImage::ImageLumaA8(image) => (
            image.dimensions(),
            image.into_vec(),
            TextureAssetFormat::Rgu8,
        ),
        DynamicImage::ImageRgb8(image) => (
            image.dimensions(),
            image.into_vec(),
            TextureAssetFormat::Rgbu8,
        ),
        DynamicImage::ImageRgba8(image) => (
            image.dimensions(),
            image.into_vec(),
            TextureAssetFormat::Rgbau8,
        ),
        DynamicImage::ImageLuma16(image) => (
            image.dimensions(),
            into_le_bytes(image.into_vec()),
            TextureAssetFormat::Ru16,
        ),
        DynamicImage::ImageLumaA16(image) => (
            image.dimensions(),
            into_le_bytes(image.into_vec()),
            TextureAssetFormat::Rgu16,
        ),
        DynamicImage::ImageRgb16(image) => (
            image.dimensions(),
            into_le_bytes(image.into_vec()),
            TextureAssetFormat::Rgbu16,
        ),
        DynamicImage::ImageRgba16(image) => (
            image.dimensions(),
            into_le_bytes(image.into_vec()),
            TextureAssetFormat::Rgbau16,
        ),
        DynamicImage::ImageRgb32F(image) => {
            let converted: DynamicImage = image.into();
            (
                converted.dimensions(),
                into_le_bytes(converted.into_rgb16().into_vec()),
                TextureAssetFormat::Rgbu16,
            )
        }
        DynamicImage::ImageRgba32F(image) => {
            let converted: DynamicImage = image.into();
            (
                converted.dimensions(),
                into_le_bytes(converted.into_rgba16().into_vec()),
                TextureAssetFormat::Rgbau16,
            )
        }
        _ => (
            image.dimensions(),
            image.into_rgba8().into_vec(),
            TextureAssetFormat::Rgbau8,
        ),
    };
    TextureImage::Decoded { size, format, data }
}

/// Decode image bytes, trusting `mime` when it names a known format.
pub(crate) fn decode_image(data: &[u8], mime: Option<&str>) -> Result<TextureImage, ImageError> {
    let mut reader = ImageReader::new(Cursor::new(data));
    match mime.and_then(ImageFormat::from_mime_type) {
        Some(format) => reader.set_format(format),
        None => reader = reader.with_guessed_format()?,
    }
    let image = reader.decode()?;
    Ok(image_to_texture(image))
}
