//! Typed views over accessor bytes.
//!
//! An [`AccessorView`] never converts its data up-front. It keeps the raw
//! little-endian bytes, either tightly packed or as a strided window into an
//! [`InterleavedBuffer`] shared with sibling accessors, and decodes on read.

use std::{
    fmt::{self, Display, Formatter},
    sync::Arc,
};

use bytes::Bytes;
use glam::Mat4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    I8,
    U8,
    I16,
    U16,
    U32,
    F32,
}

impl ComponentType {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            5120 => Some(ComponentType::I8),
            5121 => Some(ComponentType::U8),
            5122 => Some(ComponentType::I16),
            5123 => Some(ComponentType::U16),
            5125 => Some(ComponentType::U32),
            5126 => Some(ComponentType::F32),
            _ => None,
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            ComponentType::I8 => 5120,
            ComponentType::U8 => 5121,
            ComponentType::I16 => 5122,
            ComponentType::U16 => 5123,
            ComponentType::U32 => 5125,
            ComponentType::F32 => 5126,
        }
    }

    /// Width of one component in bytes.
    pub fn size(&self) -> usize {
        match self {
            ComponentType::I8 | ComponentType::U8 => 1,
            ComponentType::I16 | ComponentType::U16 => 2,
            ComponentType::U32 | ComponentType::F32 => 4,
        }
    }

    #[inline]
    fn decode_f32(&self, bytes: &[u8]) -> f32 {
        match self {
            ComponentType::I8 => bytes[0] as i8 as f32,
            ComponentType::U8 => bytes[0] as f32,
            ComponentType::I16 => i16::from_le_bytes([bytes[0], bytes[1]]) as f32,
            ComponentType::U16 => u16::from_le_bytes([bytes[0], bytes[1]]) as f32,
            ComponentType::U32 => {
                u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32
            }
            ComponentType::F32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        }
    }

    #[inline]
    fn decode_u32(&self, bytes: &[u8]) -> u32 {
        match self {
            ComponentType::I8 => bytes[0] as i8 as u32,
            ComponentType::U8 => bytes[0] as u32,
            ComponentType::I16 => i16::from_le_bytes([bytes[0], bytes[1]]) as u32,
            ComponentType::U16 => u16::from_le_bytes([bytes[0], bytes[1]]) as u32,
            ComponentType::U32 => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            ComponentType::F32 => {
                f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as u32
            }
        }
    }

    /// Map an integer component to float the way normalized attributes are defined.
    #[inline]
    fn normalize(&self, value: f32) -> f32 {
        match self {
            ComponentType::I8 => (value / i8::MAX as f32).max(-1.0),
            ComponentType::U8 => value / u8::MAX as f32,
            ComponentType::I16 => (value / i16::MAX as f32).max(-1.0),
            ComponentType::U16 => value / u16::MAX as f32,
            ComponentType::U32 => value / u32::MAX as f32,
            ComponentType::F32 => value,
        }
    }
}

impl Display for ComponentType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimensions {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl Dimensions {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "SCALAR" => Some(Dimensions::Scalar),
            "VEC2" => Some(Dimensions::Vec2),
            "VEC3" => Some(Dimensions::Vec3),
            "VEC4" => Some(Dimensions::Vec4),
            "MAT2" => Some(Dimensions::Mat2),
            "MAT3" => Some(Dimensions::Mat3),
            "MAT4" => Some(Dimensions::Mat4),
            _ => None,
        }
    }

    /// Number of components in one item.
    pub fn item_size(&self) -> usize {
        match self {
            Dimensions::Scalar => 1,
            Dimensions::Vec2 => 2,
            Dimensions::Vec3 => 3,
            Dimensions::Vec4 => 4,
            Dimensions::Mat2 => 4,
            Dimensions::Mat3 => 9,
            Dimensions::Mat4 => 16,
        }
    }
}

/// One physical strided allocation shared by every accessor interleaved into it.
#[derive(Debug)]
pub struct InterleavedBuffer {
    pub data: Bytes,
    pub stride: usize,
}

#[derive(Debug, Clone)]
pub enum AccessorStorage {
    Packed(Bytes),
    Interleaved {
        buffer: Arc<InterleavedBuffer>,
        /// Byte offset of the first item inside each stride.
        offset: usize,
    },
}

#[derive(Debug, Clone)]
pub struct AccessorView {
    pub component_type: ComponentType,
    pub dimensions: Dimensions,
    pub count: usize,
    pub normalized: bool,
    storage: AccessorStorage,
}

impl AccessorView {
    pub fn new(
        component_type: ComponentType,
        dimensions: Dimensions,
        count: usize,
        normalized: bool,
        storage: AccessorStorage,
    ) -> Self {
        Self {
            component_type,
            dimensions,
            count,
            normalized,
            storage,
        }
    }

    pub fn packed(
        component_type: ComponentType,
        dimensions: Dimensions,
        normalized: bool,
        data: Bytes,
    ) -> Self {
        let item_bytes = component_type.size() * dimensions.item_size();
        let count = data.len() / item_bytes;
        Self::new(
            component_type,
            dimensions,
            count,
            normalized,
            AccessorStorage::Packed(data),
        )
    }

    /// Build a packed float view from values, mostly used for derived data.
    pub fn from_f32(dimensions: Dimensions, values: &[f32]) -> Self {
        let data: Vec<u8> = values.iter().flat_map(|value| value.to_le_bytes()).collect();
        Self::packed(ComponentType::F32, dimensions, false, Bytes::from(data))
    }

    pub fn from_u32(values: &[u32]) -> Self {
        let data: Vec<u8> = values.iter().flat_map(|value| value.to_le_bytes()).collect();
        Self::packed(ComponentType::U32, Dimensions::Scalar, false, Bytes::from(data))
    }

    pub fn storage(&self) -> &AccessorStorage {
        &self.storage
    }

    pub fn item_size(&self) -> usize {
        self.dimensions.item_size()
    }

    /// Byte length of one item without stride padding.
    pub fn item_bytes(&self) -> usize {
        self.component_type.size() * self.item_size()
    }

    pub fn is_interleaved(&self) -> bool {
        matches!(self.storage, AccessorStorage::Interleaved { .. })
    }

    /// Whether both views read from the same interleaved allocation.
    pub fn shares_buffer_with(&self, other: &AccessorView) -> bool {
        match (&self.storage, &other.storage) {
            (
                AccessorStorage::Interleaved { buffer: a, .. },
                AccessorStorage::Interleaved { buffer: b, .. },
            ) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Raw bytes of item `index`.
    pub fn item(&self, index: usize) -> &[u8] {
        let item_bytes = self.item_bytes();
        match &self.storage {
            AccessorStorage::Packed(data) => {
                let start = index * item_bytes;
                &data[start..start + item_bytes]
            }
            AccessorStorage::Interleaved { buffer, offset } => {
                let start = offset + index * buffer.stride;
                &buffer.data[start..start + item_bytes]
            }
        }
    }

    pub fn items(&self) -> impl Iterator<Item = &[u8]> + '_ {
        (0..self.count).map(|index| self.item(index))
    }

    /// Tightly packed copy of the item bytes.
    pub fn to_packed_bytes(&self) -> Vec<u8> {
        match &self.storage {
            AccessorStorage::Packed(data) => data[..self.count * self.item_bytes()].to_vec(),
            AccessorStorage::Interleaved { .. } => self.items().flatten().copied().collect(),
        }
    }

    fn components(&self) -> impl Iterator<Item = &[u8]> + '_ {
        let size = self.component_type.size();
        self.items().flat_map(move |item| item.chunks_exact(size))
    }

    /// Component values cast to float, without normalization.
    pub fn read_f32(&self) -> Vec<f32> {
        let component_type = self.component_type;
        self.components()
            .map(|bytes| component_type.decode_f32(bytes))
            .collect()
    }

    /// Component values as float, normalized if the accessor is.
    pub fn read_normalized_f32(&self) -> Vec<f32> {
        let component_type = self.component_type;
        let normalized = self.normalized;
        self.components()
            .map(|bytes| {
                let value = component_type.decode_f32(bytes);
                if normalized {
                    component_type.normalize(value)
                } else {
                    value
                }
            })
            .collect()
    }

    pub fn read_u32(&self) -> Vec<u32> {
        let component_type = self.component_type;
        self.components()
            .map(|bytes| component_type.decode_u32(bytes))
            .collect()
    }

    pub fn read_vec3(&self) -> Vec<[f32; 3]> {
        chunk_vec3(&self.read_normalized_f32())
    }

    pub fn read_vec4(&self) -> Vec<[f32; 4]> {
        chunk_vec4(&self.read_normalized_f32())
    }

    pub fn read_mat4(&self) -> Vec<Mat4> {
        chunk_mat4(&self.read_f32())
    }
}

#[inline]
pub(crate) fn chunk_vec3<T: Copy>(data: &[T]) -> Vec<[T; 3]> {
    data.chunks_exact(3)
        .map(|item| [item[0], item[1], item[2]])
        .collect()
}

#[inline]
pub(crate) fn chunk_vec4<T: Copy>(data: &[T]) -> Vec<[T; 4]> {
    data.chunks_exact(4)
        .map(|item| [item[0], item[1], item[2], item[3]])
        .collect()
}

#[inline]
pub(crate) fn chunk_mat4(data: &[f32]) -> Vec<Mat4> {
    data.chunks_exact(16).map(Mat4::from_cols_slice).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn u16_bytes(values: &[u16]) -> Bytes {
        Bytes::from(
            values
                .iter()
                .flat_map(|value| value.to_le_bytes())
                .collect::<Vec<u8>>(),
        )
    }

    #[test]
    fn test_packed_u16_vec3() {
        let view = AccessorView::packed(
            ComponentType::U16,
            Dimensions::Vec3,
            false,
            u16_bytes(&[0, 1, 2, 3, 4, 5]),
        );
        assert_eq!(view.count, 2);
        assert_eq!(view.read_vec3(), vec![[0.0, 1.0, 2.0], [3.0, 4.0, 5.0]]);
    }

    #[test]
    fn test_normalized_signed_clamps() {
        let view = AccessorView::packed(
            ComponentType::I8,
            Dimensions::Scalar,
            true,
            Bytes::from(vec![0x80u8, 0x7f]),
        );
        assert_eq!(view.read_normalized_f32(), vec![-1.0, 1.0]);
        assert_eq!(view.read_f32(), vec![-128.0, 127.0]);
    }

    #[test]
    fn test_interleaved_items() {
        // Two vertices, each: u16 a, u16 b
        let buffer = Arc::new(InterleavedBuffer {
            data: u16_bytes(&[1, 10, 2, 20]),
            stride: 4,
        });
        let a = AccessorView::new(
            ComponentType::U16,
            Dimensions::Scalar,
            2,
            false,
            AccessorStorage::Interleaved {
                buffer: buffer.clone(),
                offset: 0,
            },
        );
        let b = AccessorView::new(
            ComponentType::U16,
            Dimensions::Scalar,
            2,
            false,
            AccessorStorage::Interleaved { buffer, offset: 2 },
        );
        assert_eq!(a.read_u32(), vec![1, 2]);
        assert_eq!(b.read_u32(), vec![10, 20]);
        assert!(a.shares_buffer_with(&b));
        assert_eq!(b.to_packed_bytes(), vec![10, 0, 20, 0]);
    }
}
