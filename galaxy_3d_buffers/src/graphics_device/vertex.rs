/// Vertex input layout types and the vertex data contract
///
/// Buffer stores are generic over plain-old-data element types. Vertex and
/// instance element types additionally describe how the pipeline reads them
/// through the `VertexData` trait.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3};
use crate::graphics_device::BufferFormat;

/// Index buffer element type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    /// 16-bit indices (max 65535 vertices)
    U16,
    /// 32-bit indices (max ~4 billion vertices)
    U32,
}

impl IndexType {
    /// Size in bytes of one index element
    pub fn size_bytes(&self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

/// Vertex input rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexInputRate {
    /// Data is per-vertex
    Vertex,
    /// Data is per-instance
    Instance,
}

/// Vertex attribute description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Attribute location in shader
    pub location: u32,
    /// Binding index
    pub binding: u32,
    /// Format of the attribute (data type and component count)
    pub format: BufferFormat,
    /// Offset in bytes from the start of the element
    pub offset: u32,
}

/// Vertex binding description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexBinding {
    /// Binding index
    pub binding: u32,
    /// Stride in bytes between consecutive elements
    pub stride: u32,
    /// Input rate (per-vertex or per-instance)
    pub input_rate: VertexInputRate,
}

/// Vertex input layout
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexLayout {
    /// Vertex bindings
    pub bindings: Vec<VertexBinding>,
    /// Vertex attributes
    pub attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    /// Stride of the first binding, 0 if the layout has none
    pub fn stride(&self) -> u32 {
        self.bindings.first().map(|b| b.stride).unwrap_or(0)
    }
}

// ===== VERTEX DATA CONTRACT =====

/// Element type that can live in a vertex or instance store
///
/// `stride()` and `input()` are what the pipeline side needs to bind a
/// shared buffer. Attribute locations returned by `attributes()` are
/// relative; `input()` patches in the binding slot.
pub trait VertexData: Pod + Send + Sync + 'static {
    /// Per-vertex or per-instance
    fn input_rate() -> VertexInputRate {
        VertexInputRate::Vertex
    }

    /// Attributes of one element, `binding` is ignored
    fn attributes() -> Vec<VertexAttribute>;

    /// Size in bytes of one element
    fn stride() -> u32 {
        std::mem::size_of::<Self>() as u32
    }

    /// Input layout of this element type bound at `binding`
    fn input(binding: u32) -> VertexLayout {
        VertexLayout {
            bindings: vec![VertexBinding {
                binding,
                stride: Self::stride(),
                input_rate: Self::input_rate(),
            }],
            attributes: Self::attributes()
                .into_iter()
                .map(|attribute| VertexAttribute { binding, ..attribute })
                .collect(),
        }
    }
}

// ===== STOCK ELEMENT TYPES =====

/// Position-only vertex (depth passes, debug lines)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PositionVertex {
    pub position: Vec3,
}

impl VertexData for PositionVertex {
    fn attributes() -> Vec<VertexAttribute> {
        vec![VertexAttribute {
            location: 0,
            binding: 0,
            format: BufferFormat::R32G32B32_SFLOAT,
            offset: 0,
        }]
    }
}

/// Standard lit mesh vertex
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

impl VertexData for MeshVertex {
    fn attributes() -> Vec<VertexAttribute> {
        vec![
            VertexAttribute { location: 0, binding: 0, format: BufferFormat::R32G32B32_SFLOAT, offset: 0 },
            VertexAttribute { location: 1, binding: 0, format: BufferFormat::R32G32B32_SFLOAT, offset: 12 },
            VertexAttribute { location: 2, binding: 0, format: BufferFormat::R32G32_SFLOAT, offset: 24 },
        ]
    }
}

/// Per-instance world transform, read as four vec4 columns
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceTransform {
    pub world: Mat4,
}

impl InstanceTransform {
    pub fn new(world: Mat4) -> Self {
        Self { world }
    }
}

impl VertexData for InstanceTransform {
    fn input_rate() -> VertexInputRate {
        VertexInputRate::Instance
    }

    fn attributes() -> Vec<VertexAttribute> {
        (0..4)
            .map(|column| VertexAttribute {
                location: column,
                binding: 0,
                format: BufferFormat::R32G32B32A32_SFLOAT,
                offset: column * 16,
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "vertex_tests.rs"]
mod tests;
