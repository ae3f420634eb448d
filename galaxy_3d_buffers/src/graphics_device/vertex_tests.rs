//! Unit tests for vertex layouts and the VertexData contract

use crate::graphics_device::{
    BufferFormat, IndexType, InstanceTransform, MeshVertex, PositionVertex, VertexData,
    VertexInputRate, VertexLayout,
};

// ============================================================================
// STRIDES
// ============================================================================

#[test]
fn test_stock_vertex_strides() {
    assert_eq!(PositionVertex::stride(), 12);
    assert_eq!(MeshVertex::stride(), 32);
    assert_eq!(InstanceTransform::stride(), 64);
}

#[test]
fn test_index_type_size_bytes() {
    assert_eq!(IndexType::U16.size_bytes(), 2);
    assert_eq!(IndexType::U32.size_bytes(), 4);
}

// ============================================================================
// INPUT LAYOUTS
// ============================================================================

#[test]
fn test_mesh_vertex_input_patches_binding() {
    let layout = MeshVertex::input(2);

    assert_eq!(layout.bindings.len(), 1);
    assert_eq!(layout.bindings[0].binding, 2);
    assert_eq!(layout.bindings[0].stride, 32);
    assert_eq!(layout.bindings[0].input_rate, VertexInputRate::Vertex);

    assert_eq!(layout.attributes.len(), 3);
    assert!(layout.attributes.iter().all(|a| a.binding == 2));
    assert_eq!(layout.attributes[2].format, BufferFormat::R32G32_SFLOAT);
    assert_eq!(layout.attributes[2].offset, 24);
}

#[test]
fn test_mesh_vertex_attributes_fit_in_stride() {
    for attribute in MeshVertex::attributes() {
        assert!(attribute.offset + attribute.format.size_bytes() <= MeshVertex::stride());
    }
}

#[test]
fn test_instance_transform_is_per_instance() {
    let layout = InstanceTransform::input(1);

    assert_eq!(layout.bindings[0].input_rate, VertexInputRate::Instance);
    assert_eq!(layout.attributes.len(), 4);
    let offsets: Vec<u32> = layout.attributes.iter().map(|a| a.offset).collect();
    assert_eq!(offsets, vec![0, 16, 32, 48]);
}

#[test]
fn test_vertex_layout_stride() {
    assert_eq!(VertexLayout::default().stride(), 0);
    assert_eq!(PositionVertex::input(0).stride(), 12);
}
