use std::{rc::Rc, sync::Arc};

use bytes::Bytes;
use futures::try_join;
use log::trace;

use crate::{
    accessor::{AccessorStorage, AccessorView, ComponentType, Dimensions, InterleavedBuffer},
    index::EntityKind,
};

use super::{
    schema::{AccessorDef, SparseDef},
    session::{missing, GltfDocumentLoader, InterleavedKey},
    GltfLoadResult, GltfLoaderError,
};

/// Scale mapping a normalized integer component to `[-1, 1]` or `[0, 1]`.
pub(crate) fn normalized_component_scale(component_type: ComponentType) -> GltfLoadResult<f32> {
    match component_type {
        ComponentType::I8 => Ok(1.0 / 127.0),
        ComponentType::U8 => Ok(1.0 / 255.0),
        ComponentType::I16 => Ok(1.0 / 32767.0),
        ComponentType::U16 => Ok(1.0 / 65535.0),
        other => Err(GltfLoaderError::UnsupportedNormalizedComponent(other)),
    }
}

/// End of `count` items of `size` bytes starting at `offset`, `None` on overflow.
fn byte_span(offset: usize, count: usize, size: usize) -> Option<usize> {
    count.checked_mul(size)?.checked_add(offset)
}

pub(crate) fn accessor_layout(def: &AccessorDef) -> GltfLoadResult<(ComponentType, Dimensions)> {
    let component_type = ComponentType::from_code(def.component_type)
        .ok_or(GltfLoaderError::BadComponentType(def.component_type))?;
    let dimensions =
        Dimensions::from_name(&def.kind).ok_or_else(|| GltfLoaderError::BadAccessorType(def.kind.clone()))?;
    Ok((component_type, dimensions))
}

impl GltfDocumentLoader {
    pub(crate) async fn load_accessor(
        self: Rc<Self>,
        index: usize,
    ) -> GltfLoadResult<Option<Arc<AccessorView>>> {
        let def = self
            .json
            .accessors
            .get(index)
            .ok_or_else(|| missing(EntityKind::Accessor, index))?;
        if def.buffer_view.is_none() && def.sparse.is_none() {
            // Nothing to decode; extensions may supply the data instead.
            return Ok(None);
        }
        let (component_type, dimensions) = accessor_layout(def)?;

        let base = async {
            match def.buffer_view {
                Some(view) => self.buffer_view(view).await.map(Some),
                None => Ok(None),
            }
        };
        let sparse = async {
            match &def.sparse {
                Some(sparse) => try_join!(
                    self.buffer_view(sparse.indices.buffer_view),
                    self.buffer_view(sparse.values.buffer_view)
                )
                .map(Some),
                None => Ok(None),
            }
        };
        let (base, sparse_views) = try_join!(base, sparse)?;

        let item_bytes = component_type.size() * dimensions.item_size();
        let view = match (def.buffer_view, base) {
            (Some(view_index), Some(data)) => {
                let stride = self
                    .json
                    .buffer_views
                    .get(view_index)
                    .and_then(|view| view.byte_stride)
                    .filter(|stride| *stride != 0 && *stride != item_bytes);
                match stride {
                    Some(stride) => self.interleaved_view(
                        index,
                        def,
                        (view_index, component_type, def.byte_offset / stride, def.count),
                        &data,
                        stride,
                        dimensions,
                    )?,
                    None => packed_view(index, def, &data, component_type, dimensions)?,
                }
            }
            // Sparse-only accessors start out zero-filled.
            _ => zeroed_view(index, def, component_type, dimensions)?,
        };

        let view = match (&def.sparse, sparse_views) {
            (Some(sparse), Some((indices, values))) => {
                apply_sparse(index, &view, sparse, &indices, &values)?
            }
            _ => view,
        };
        Ok(Some(Arc::new(view)))
    }

    /// The all-zero contents of an accessor declared without a bufferView.
    pub(crate) fn zeroed_accessor(&self, index: usize) -> GltfLoadResult<AccessorView> {
        let def = self
            .json
            .accessors
            .get(index)
            .ok_or_else(|| missing(EntityKind::Accessor, index))?;
        let (component_type, dimensions) = accessor_layout(def)?;
        zeroed_view(index, def, component_type, dimensions)
    }

    fn interleaved_view(
        &self,
        index: usize,
        def: &AccessorDef,
        key: InterleavedKey,
        data: &Bytes,
        stride: usize,
        dimensions: Dimensions,
    ) -> GltfLoadResult<AccessorView> {
        let (_, component_type, slice, count) = key;
        let item_bytes = component_type.size() * dimensions.item_size();
        let offset = def.byte_offset % stride;

        let existing = self.interleaved_cache.borrow().get(&key).cloned();
        let buffer = match existing {
            Some(buffer) => buffer,
            None => {
                let start = slice * stride;
                if start > data.len() {
                    return Err(GltfLoaderError::AccessorOutOfBounds(index));
                }
                let end = byte_span(start, count, stride)
                    .unwrap_or(usize::MAX)
                    .min(data.len());
                trace!("New interleaved buffer for accessor #{}, stride {}", index, stride);
                let buffer = Arc::new(InterleavedBuffer {
                    data: data.slice(start..end),
                    stride,
                });
                self.interleaved_cache
                    .borrow_mut()
                    .insert(key, buffer.clone());
                buffer
            }
        };
        if count > 0 {
            let end = byte_span(offset, count - 1, stride)
                .and_then(|last| last.checked_add(item_bytes))
                .ok_or(GltfLoaderError::AccessorOutOfBounds(index))?;
            if end > buffer.data.len() {
                return Err(GltfLoaderError::AccessorOutOfBounds(index));
            }
        }
        Ok(AccessorView::new(
            component_type,
            dimensions,
            count,
            def.normalized,
            AccessorStorage::Interleaved { buffer, offset },
        ))
    }
}

fn zeroed_view(
    index: usize,
    def: &AccessorDef,
    component_type: ComponentType,
    dimensions: Dimensions,
) -> GltfLoadResult<AccessorView> {
    let length = byte_span(0, def.count, component_type.size() * dimensions.item_size())
        .filter(|length| *length <= isize::MAX as usize)
        .ok_or(GltfLoaderError::AccessorOutOfBounds(index))?;
    Ok(AccessorView::new(
        component_type,
        dimensions,
        def.count,
        def.normalized,
        AccessorStorage::Packed(Bytes::from(vec![0u8; length])),
    ))
}

fn packed_view(
    index: usize,
    def: &AccessorDef,
    data: &Bytes,
    component_type: ComponentType,
    dimensions: Dimensions,
) -> GltfLoadResult<AccessorView> {
    let element_size = component_type.size();
    if def.byte_offset % element_size != 0 || data.len() % element_size != 0 {
        return Err(GltfLoaderError::MisalignedAccessor(index));
    }
    let end = byte_span(
        def.byte_offset,
        def.count,
        element_size * dimensions.item_size(),
    )
    .filter(|end| *end <= data.len())
    .ok_or(GltfLoaderError::AccessorOutOfBounds(index))?;
    Ok(AccessorView::new(
        component_type,
        dimensions,
        def.count,
        def.normalized,
        AccessorStorage::Packed(data.slice(def.byte_offset..end)),
    ))
}

/// Copy `base` into a private buffer and overwrite the items listed by `sparse`.
///
/// The base view and its buffer are left untouched.
fn apply_sparse(
    index: usize,
    base: &AccessorView,
    sparse: &SparseDef,
    indices: &Bytes,
    values: &Bytes,
) -> GltfLoadResult<AccessorView> {
    let item_size = base.item_size();
    if item_size > 4 {
        return Err(GltfLoaderError::UnsupportedSparseItemSize(item_size));
    }
    let index_type = ComponentType::from_code(sparse.indices.component_type)
        .filter(|component_type| {
            matches!(
                component_type,
                ComponentType::U8 | ComponentType::U16 | ComponentType::U32
            )
        })
        .ok_or(GltfLoaderError::BadComponentType(sparse.indices.component_type))?;

    let item_bytes = base.item_bytes();
    let indices_end = byte_span(sparse.indices.byte_offset, sparse.count, index_type.size())
        .filter(|end| *end <= indices.len())
        .ok_or(GltfLoaderError::AccessorOutOfBounds(index))?;
    let values_end = byte_span(sparse.values.byte_offset, sparse.count, item_bytes)
        .filter(|end| *end <= values.len())
        .ok_or(GltfLoaderError::AccessorOutOfBounds(index))?;
    let targets = AccessorView::packed(
        index_type,
        Dimensions::Scalar,
        false,
        indices.slice(sparse.indices.byte_offset..indices_end),
    )
    .read_u32();
    let values = &values[sparse.values.byte_offset..values_end];

    let mut data = base.to_packed_bytes();
    for (i, target) in targets.into_iter().enumerate() {
        let position = target as usize;
        if position >= base.count {
            return Err(GltfLoaderError::SparseIndexOutOfBounds {
                accessor: index,
                index: target,
            });
        }
        data[position * item_bytes..(position + 1) * item_bytes]
            .copy_from_slice(&values[i * item_bytes..(i + 1) * item_bytes]);
    }
    Ok(AccessorView::new(
        base.component_type,
        base.dimensions,
        base.count,
        base.normalized,
        AccessorStorage::Packed(Bytes::from(data)),
    ))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::loader::gltf::schema::{SparseIndicesDef, SparseValuesDef};

    fn f32_bytes(values: &[f32]) -> Bytes {
        Bytes::from(
            values
                .iter()
                .flat_map(|value| value.to_le_bytes())
                .collect::<Vec<u8>>(),
        )
    }

    fn sparse_def(count: usize) -> SparseDef {
        SparseDef {
            count,
            indices: SparseIndicesDef {
                buffer_view: 0,
                byte_offset: 0,
                component_type: 5121,
            },
            values: SparseValuesDef {
                buffer_view: 1,
                byte_offset: 0,
            },
        }
    }

    #[test]
    fn test_sparse_patch_leaves_base_untouched() {
        let base_data = f32_bytes(&[0.0, 1.0, 2.0, 3.0]);
        let base = AccessorView::packed(
            ComponentType::F32,
            Dimensions::Scalar,
            false,
            base_data.clone(),
        );
        let patched = apply_sparse(
            0,
            &base,
            &sparse_def(2),
            &Bytes::from(vec![1u8, 3]),
            &f32_bytes(&[10.0, 30.0]),
        )
        .unwrap();
        assert_eq!(patched.read_f32(), vec![0.0, 10.0, 2.0, 30.0]);
        assert_eq!(base.read_f32(), vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(&base_data[..], &f32_bytes(&[0.0, 1.0, 2.0, 3.0])[..]);
    }

    #[test]
    fn test_sparse_item_size_limit() {
        let base = AccessorView::packed(
            ComponentType::F32,
            Dimensions::Mat2,
            false,
            f32_bytes(&[0.0; 4]),
        );
        let result = apply_sparse(
            0,
            &base,
            &sparse_def(1),
            &Bytes::from(vec![0u8]),
            &f32_bytes(&[1.0; 4]),
        );
        assert!(result.is_ok());

        let base = AccessorView::packed(
            ComponentType::F32,
            Dimensions::Mat3,
            false,
            f32_bytes(&[0.0; 9]),
        );
        let result = apply_sparse(
            0,
            &base,
            &sparse_def(1),
            &Bytes::from(vec![0u8]),
            &f32_bytes(&[1.0; 9]),
        );
        assert!(matches!(
            result,
            Err(GltfLoaderError::UnsupportedSparseItemSize(9))
        ));
    }

    #[test]
    fn test_packed_view_bounds() {
        let def = AccessorDef {
            buffer_view: Some(0),
            byte_offset: 2,
            component_type: 5123,
            count: 3,
            kind: "SCALAR".to_string(),
            ..Default::default()
        };
        let data = Bytes::from(vec![0u8; 8]);
        let view = packed_view(0, &def, &data, ComponentType::U16, Dimensions::Scalar).unwrap();
        assert_eq!(view.count, 3);

        let def = AccessorDef { count: 4, ..def };
        assert!(matches!(
            packed_view(0, &def, &data, ComponentType::U16, Dimensions::Scalar),
            Err(GltfLoaderError::AccessorOutOfBounds(0))
        ));
        let def = AccessorDef {
            byte_offset: 1,
            count: 1,
            ..def
        };
        assert!(matches!(
            packed_view(0, &def, &data, ComponentType::U16, Dimensions::Scalar),
            Err(GltfLoaderError::MisalignedAccessor(0))
        ));
    }

    #[test]
    fn test_normalized_scales() {
        assert_eq!(normalized_component_scale(ComponentType::U8).unwrap(), 1.0 / 255.0);
        assert!(normalized_component_scale(ComponentType::F32).is_err());
    }
}
