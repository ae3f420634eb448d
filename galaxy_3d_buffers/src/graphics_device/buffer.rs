/// GPU buffer trait and buffer creation descriptor
///
/// This is the contract the buffer stores consume from the graphics backend:
/// a buffer is created once from a full data blob during the build pass,
/// and dynamic buffers may then receive partial updates.

use crate::error::Result;

/// Buffer usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Vertex buffer (per-vertex or per-instance input)
    Vertex,
    /// Index buffer
    Index,
}

/// Descriptor for creating a buffer
///
/// The backend copies `data` into the new resource; the slice only needs
/// to live for the duration of the `create_buffer` call.
#[derive(Debug, Clone)]
pub struct BufferDesc<'a> {
    /// Debug name of the buffer (e.g. "galaxy3d/vertex#0")
    pub name: String,
    /// Buffer usage
    pub usage: BufferUsage,
    /// Dynamic buffers favor frequent small writes, static ones are built once
    pub dynamic: bool,
    /// Initial contents, the buffer size is `data.len()`
    pub data: &'a [u8],
}

impl BufferDesc<'_> {
    /// Size in bytes of the buffer to create
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Buffer data format for vertex attributes
///
/// Defines the data type and component count of one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum BufferFormat {
    // Float formats
    R32_SFLOAT,          // float (4 bytes)
    R32G32_SFLOAT,       // vec2 (8 bytes)
    R32G32B32_SFLOAT,    // vec3 (12 bytes)
    R32G32B32A32_SFLOAT, // vec4 (16 bytes)

    // Integer formats (unsigned)
    R32_UINT,
    R32G32_UINT,
    R32G32B32A32_UINT,

    // Byte formats (normalized)
    R8G8B8A8_UNORM,
}

impl BufferFormat {
    /// Returns size in bytes for this format
    pub fn size_bytes(&self) -> u32 {
        match self {
            BufferFormat::R32_SFLOAT | BufferFormat::R32_UINT => 4,
            BufferFormat::R32G32_SFLOAT | BufferFormat::R32G32_UINT => 8,
            BufferFormat::R32G32B32_SFLOAT => 12,
            BufferFormat::R32G32B32A32_SFLOAT | BufferFormat::R32G32B32A32_UINT => 16,
            BufferFormat::R8G8B8A8_UNORM => 4,
        }
    }
}

/// Buffer resource trait
///
/// Implemented by backend-specific buffer types. The buffer is
/// automatically destroyed when the last handle is dropped.
pub trait Buffer: Send + Sync {
    /// Size of the buffer in bytes
    fn size(&self) -> u64;

    /// Update buffer data
    ///
    /// # Arguments
    ///
    /// * `offset` - Offset into the buffer in bytes
    /// * `data` - Data to write
    fn update(&self, offset: u64, data: &[u8]) -> Result<()>;
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
