//! Binary container (GLB) demuxer.

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

use bytes::Bytes;
use log::debug;

pub const MAGIC: &[u8; 4] = b"glTF";
pub const HEADER_LENGTH: usize = 12;
pub const CHUNK_HEADER_LENGTH: usize = 8;
pub const CHUNK_TYPE_JSON: u32 = 0x4E4F_534A;
pub const CHUNK_TYPE_BIN: u32 = 0x004E_4942;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerError {
    BadMagic,
    UnsupportedVersion(u32),
    Truncated { declared: usize, actual: usize },
    MissingJsonChunk,
}

impl Display for ContainerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ContainerError::BadMagic => write!(f, "Bad binary container magic"),
            ContainerError::UnsupportedVersion(version) => {
                write!(f, "Unsupported binary container version: {}", version)
            }
            ContainerError::Truncated { declared, actual } => write!(
                f,
                "Binary container truncated: declared {} bytes, got {}",
                declared, actual
            ),
            ContainerError::MissingJsonChunk => write!(f, "No JSON chunk in binary container"),
        }
    }
}

impl Error for ContainerError {}

/// Document text plus the optional binary blob of a container.
#[derive(Debug, Clone)]
pub struct Demuxed {
    pub json: Bytes,
    pub binary: Option<Bytes>,
}

#[inline]
fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

pub fn is_container(data: &[u8]) -> bool {
    data.len() >= MAGIC.len() && &data[..MAGIC.len()] == MAGIC
}

/// Split the input into document text and binary blob.
///
/// Input not starting with [`MAGIC`] is passed through as document text.
/// The blob is a view into `data` and is not copied.
pub fn demux(data: Bytes) -> Result<Demuxed, ContainerError> {
    if !is_container(&data) {
        return Ok(Demuxed {
            json: data,
            binary: None,
        });
    }
    read_container(data)
}

fn read_container(data: Bytes) -> Result<Demuxed, ContainerError> {
    if data.len() < HEADER_LENGTH {
        return Err(ContainerError::Truncated {
            declared: HEADER_LENGTH,
            actual: data.len(),
        });
    }
    if &data[0..4] != MAGIC {
        return Err(ContainerError::BadMagic);
    }
    let version = read_u32(&data, 4);
    if version < 2 {
        return Err(ContainerError::UnsupportedVersion(version));
    }
    let length = read_u32(&data, 8) as usize;
    if length > data.len() {
        return Err(ContainerError::Truncated {
            declared: length,
            actual: data.len(),
        });
    }

    let mut json = None;
    let mut binary = None;
    let mut offset = HEADER_LENGTH;
    while offset + CHUNK_HEADER_LENGTH <= length {
        let chunk_length = read_u32(&data, offset) as usize;
        let chunk_type = read_u32(&data, offset + 4);
        let start = offset + CHUNK_HEADER_LENGTH;
        let end = start + chunk_length;
        if end > length {
            return Err(ContainerError::Truncated {
                declared: end,
                actual: length,
            });
        }
        match chunk_type {
            CHUNK_TYPE_JSON => json = Some(data.slice(start..end)),
            CHUNK_TYPE_BIN => binary = Some(data.slice(start..end)),
            unknown => debug!("Skipping unknown chunk type {:#010x}", unknown),
        }
        offset = end;
    }

    let json = json.ok_or(ContainerError::MissingJsonChunk)?;
    Ok(Demuxed { json, binary })
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    /// Pack a container from (type, payload) chunks.
    pub(crate) fn pack(version: u32, chunks: &[(u32, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (chunk_type, payload) in chunks {
            body.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            body.extend_from_slice(&chunk_type.to_le_bytes());
            body.extend_from_slice(payload);
        }
        let mut data = Vec::new();
        data.extend_from_slice(MAGIC);
        data.extend_from_slice(&version.to_le_bytes());
        data.extend_from_slice(&((HEADER_LENGTH + body.len()) as u32).to_le_bytes());
        data.extend_from_slice(&body);
        data
    }

    #[test]
    fn test_plain_json_passes_through() {
        let text = br#"{"asset":{"version":"2.0"}}"#;
        let demuxed = demux(Bytes::from_static(text)).unwrap();
        assert_eq!(&demuxed.json[..], &text[..]);
        assert!(demuxed.binary.is_none());
    }

    #[test]
    fn test_split_chunks() {
        let data = pack(
            2,
            &[
                (CHUNK_TYPE_JSON, b"{}  "),
                (0x1234_5678, b"skip"),
                (CHUNK_TYPE_BIN, &[1, 2, 3, 4]),
            ],
        );
        let demuxed = demux(Bytes::from(data)).unwrap();
        assert_eq!(&demuxed.json[..], b"{}  ");
        assert_eq!(demuxed.binary.as_deref(), Some(&[1u8, 2, 3, 4][..]));
    }

    #[test]
    fn test_reject_old_version() {
        let data = pack(1, &[(CHUNK_TYPE_JSON, b"{}")]);
        assert_eq!(
            demux(Bytes::from(data)).unwrap_err(),
            ContainerError::UnsupportedVersion(1)
        );
    }

    #[test]
    fn test_missing_json_chunk() {
        let data = pack(2, &[(CHUNK_TYPE_BIN, &[0, 0, 0, 0])]);
        assert_eq!(
            demux(Bytes::from(data)).unwrap_err(),
            ContainerError::MissingJsonChunk
        );
    }

    #[test]
    fn test_truncated_chunk() {
        let mut data = pack(2, &[(CHUNK_TYPE_JSON, b"{}")]);
        // Declare a longer chunk than is present
        data[12] = 64;
        assert!(matches!(
            demux(Bytes::from(data)).unwrap_err(),
            ContainerError::Truncated { .. }
        ));
    }
}
