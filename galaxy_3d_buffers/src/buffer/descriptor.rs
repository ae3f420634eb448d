/// Buffer descriptor - one logical sub-allocation inside a shared store.
///
/// A descriptor is handed out by a request as soon as the request is built
/// (`Arc<BufferDescriptor>`), and is filled in exactly once when the request
/// is processed. After that, only the owning store touches it, to shift its
/// offset when an earlier allocation is removed.
///
/// Equality is identity: two descriptors with the same offset and count are
/// still different allocations.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use crate::graphics_device::IndexType;

// ===== BUFFER KIND =====

/// Which kind of shared buffer a store (and its descriptors) belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Per-vertex data
    Vertex,
    /// 32-bit index lists
    Index,
    /// Per-instance data blocks
    Instance,
}

impl BufferKind {
    /// Short lowercase name, used in GPU buffer names
    pub fn as_str(&self) -> &'static str {
        match self {
            BufferKind::Vertex => "vertex",
            BufferKind::Index => "index",
            BufferKind::Instance => "instance",
        }
    }

    /// Index type to bind index stores with, `None` for vertex data
    pub fn index_type(&self) -> Option<IndexType> {
        match self {
            BufferKind::Index => Some(IndexType::U32),
            BufferKind::Vertex | BufferKind::Instance => None,
        }
    }
}

impl fmt::Display for BufferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ===== DESCRIPTOR STATE =====

/// Snapshot of a descriptor's fields
#[derive(Debug, Clone, Default)]
pub struct DescriptorState {
    /// Caller-supplied logical name
    pub id: String,
    /// Index of the owning store in the buffer manager
    pub store_index: usize,
    /// First element of the allocation in the store's data
    pub offset: usize,
    /// Number of elements
    pub count: usize,
    /// True once the allocation is backed by store data
    pub ready: bool,
}

impl DescriptorState {
    /// One past the last element
    pub fn end(&self) -> usize {
        self.offset + self.count
    }
}

// ===== BUFFER DESCRIPTOR =====

/// Handle describing one allocation (offset/count/identity) inside a store
pub struct BufferDescriptor {
    kind: BufferKind,
    state: RwLock<DescriptorState>,
    /// Instancing block drawn together with this vertex range, if any
    instancing: RwLock<Option<Arc<BufferDescriptor>>>,
}

impl BufferDescriptor {
    /// Create an empty (not ready) descriptor
    pub fn new(kind: BufferKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            state: RwLock::new(DescriptorState::default()),
            instancing: RwLock::new(None),
        })
    }

    // ===== ACCESSORS =====

    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    pub fn id(&self) -> String {
        self.read().id.clone()
    }

    pub fn store_index(&self) -> usize {
        self.read().store_index
    }

    pub fn offset(&self) -> usize {
        self.read().offset
    }

    pub fn count(&self) -> usize {
        self.read().count
    }

    pub fn is_ready(&self) -> bool {
        self.read().ready
    }

    /// Consistent copy of every field
    pub fn snapshot(&self) -> DescriptorState {
        self.read().clone()
    }

    /// Linked instancing descriptor (vertex descriptors of instanced meshes)
    pub fn instancing(&self) -> Option<Arc<BufferDescriptor>> {
        self.instancing
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Identity comparison
    pub fn same(a: &BufferDescriptor, b: &BufferDescriptor) -> bool {
        std::ptr::eq(a, b)
    }

    // ===== STORE-SIDE MUTATION =====

    /// Fill in the descriptor when its data lands in a store
    pub(crate) fn populate(&self, id: &str, store_index: usize, offset: usize, count: usize) {
        let mut state = self.write();
        debug_assert!(!state.ready, "descriptor '{}' populated twice", id);
        state.id = id.to_string();
        state.store_index = store_index;
        state.offset = offset;
        state.count = count;
        state.ready = true;
    }

    /// Move the allocation after an earlier one was removed
    pub(crate) fn set_offset(&self, offset: usize) {
        self.write().offset = offset;
    }

    /// Mark the allocation as gone from its store
    pub(crate) fn retire(&self) {
        self.write().ready = false;
    }

    pub(crate) fn link_instancing(&self, instancing: Arc<BufferDescriptor>) {
        *self.instancing.write().unwrap_or_else(PoisonError::into_inner) = Some(instancing);
    }

    fn read(&self) -> RwLockReadGuard<'_, DescriptorState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, DescriptorState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PartialEq for BufferDescriptor {
    fn eq(&self, other: &Self) -> bool {
        Self::same(self, other)
    }
}

impl Eq for BufferDescriptor {}

impl fmt::Debug for BufferDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read();
        f.debug_struct("BufferDescriptor")
            .field("kind", &self.kind)
            .field("id", &state.id)
            .field("store_index", &state.store_index)
            .field("offset", &state.offset)
            .field("count", &state.count)
            .field("ready", &state.ready)
            .finish()
    }
}

#[cfg(test)]
#[path = "descriptor_tests.rs"]
mod tests;
