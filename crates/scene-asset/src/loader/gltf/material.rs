use std::{rc::Rc, sync::Arc};

use futures::try_join;
use log::{debug, warn};

use crate::{
    index::{DependencyKey, EntityKind, ObjectId},
    material::{
        MaterialAlphaMode, MaterialAsset, MaterialAssetData, MaterialFamily, MaterialVariant,
        PbrParams,
    },
    texture::OcclusionTextureInfo,
};

use super::{
    extension::MaterialContext,
    schema::MaterialDef,
    session::missing,
    GltfDocumentLoader, GltfLoadResult, TextureRole,
};

fn alpha_mode(def: &MaterialDef) -> MaterialAlphaMode {
    match def.alpha_mode.as_deref() {
        Some("MASK") => MaterialAlphaMode::Mask(def.alpha_cutoff.unwrap_or(0.5)),
        Some("BLEND") => MaterialAlphaMode::Blend,
        Some("OPAQUE") | None => MaterialAlphaMode::Opaque,
        Some(other) => {
            warn!("Unknown alpha mode {}, using OPAQUE", other);
            MaterialAlphaMode::Opaque
        }
    }
}

impl GltfDocumentLoader {
    pub(crate) async fn load_material(
        self: Rc<Self>,
        index: usize,
    ) -> GltfLoadResult<Arc<MaterialAsset>> {
        let def = self
            .json
            .materials
            .get(index)
            .ok_or_else(|| missing(EntityKind::Material, index))?;

        let mut data = match self.extensions.family_extension(def) {
            Some((name, extension, value)) => {
                debug!("Material #{} claimed by {}", index, name);
                let context = MaterialContext {
                    loader: &self,
                    material: def,
                    extension: value,
                };
                extension.extend_params(context, None).await?
            }
            None => MaterialAssetData::Pbr(self.metallic_roughness(def).await?),
        };
        for (_, extension, value) in self.extensions.layer_extensions(def) {
            let context = MaterialContext {
                loader: &self,
                material: def,
                extension: value,
            };
            data = extension.extend_params(context, Some(data)).await?;
        }

        let alpha_mode = alpha_mode(def);
        let mut material = MaterialAsset {
            id: Some(DependencyKey::new(EntityKind::Material, index)),
            name: def.name.clone(),
            data,
            normal_texture: None,
            occlusion_texture: None,
            emissive_texture: None,
            emissive_factor: [0.0, 0.0, 0.0],
            alpha_mode,
            depth_write: alpha_mode != MaterialAlphaMode::Blend,
            double_sided: def.double_sided,
            variant: MaterialVariant::default(),
            extras: def.extras.clone(),
        };

        // Unlit materials ignore lighting-related maps.
        if material.data.family() != MaterialFamily::Unlit {
            let (normal_texture, occlusion_texture, emissive_texture) = try_join!(
                self.optional_normal_texture_info(def.normal_texture.as_ref(), TextureRole::Normal),
                self.optional_texture_info(def.occlusion_texture.as_ref(), TextureRole::Occlusion),
                self.optional_texture_info(def.emissive_texture.as_ref(), TextureRole::Emissive),
            )?;
            material.normal_texture = normal_texture;
            material.occlusion_texture = occlusion_texture.map(|info| OcclusionTextureInfo {
                info,
                strength: def
                    .occlusion_texture
                    .as_ref()
                    .and_then(|texture| texture.strength)
                    .unwrap_or(1.0),
            });
            material.emissive_texture = emissive_texture;
            material.emissive_factor = def.emissive_factor.unwrap_or([0.0, 0.0, 0.0]);
        }

        self.record_extensions(
            ObjectId::Entity(DependencyKey::new(EntityKind::Material, index)),
            def.extensions.as_ref(),
        );
        Ok(Arc::new(material))
    }

    async fn metallic_roughness(self: &Rc<Self>, def: &MaterialDef) -> GltfLoadResult<PbrParams> {
        let defaults = PbrParams::default();
        let Some(pbr) = def.pbr_metallic_roughness.as_ref() else {
            return Ok(defaults);
        };
        let (base_color_texture, metallic_roughness_texture) = try_join!(
            self.optional_texture_info(pbr.base_color_texture.as_ref(), TextureRole::BaseColor),
            self.optional_texture_info(
                pbr.metallic_roughness_texture.as_ref(),
                TextureRole::MetallicRoughness
            ),
        )?;
        Ok(PbrParams {
            base_color_factor: pbr.base_color_factor.unwrap_or(defaults.base_color_factor),
            base_color_texture,
            metallic_factor: pbr.metallic_factor.unwrap_or(defaults.metallic_factor),
            roughness_factor: pbr.roughness_factor.unwrap_or(defaults.roughness_factor),
            metallic_roughness_texture,
        })
    }

    /// The one material shared by all primitives without a material.
    pub(crate) fn default_material(&self) -> Arc<MaterialAsset> {
        self.default_material
            .get_or_init(|| Arc::new(MaterialAsset::default_material()))
            .clone()
    }

    /// Specialization of `base` for a mesh, created once per (material, flags).
    pub(crate) fn material_variant(
        &self,
        base: &Arc<MaterialAsset>,
        variant: MaterialVariant,
    ) -> Arc<MaterialAsset> {
        if variant.is_base() {
            return base.clone();
        }
        let key = (base.id.map(|id| id.index), variant);
        if let Some(material) = self.variant_cache.borrow().get(&key) {
            return material.clone();
        }
        let mut material = base.as_ref().clone();
        material.variant = variant;
        let material = Arc::new(material);
        self.variant_cache
            .borrow_mut()
            .insert(key, material.clone());
        material
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_alpha_mode() {
        let mut def = MaterialDef {
            alpha_mode: Some("MASK".to_string()),
            ..Default::default()
        };
        assert_eq!(alpha_mode(&def), MaterialAlphaMode::Mask(0.5));
        def.alpha_cutoff = Some(0.25);
        assert_eq!(alpha_mode(&def), MaterialAlphaMode::Mask(0.25));
        def.alpha_mode = Some("BLEND".to_string());
        assert_eq!(alpha_mode(&def), MaterialAlphaMode::Blend);
        def.alpha_mode = None;
        assert_eq!(alpha_mode(&def), MaterialAlphaMode::Opaque);
    }
}
