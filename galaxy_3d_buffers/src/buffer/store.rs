/// Typed buffer store - one growable logical data collection shared by many allocations.
///
/// A store owns the CPU-side copy of one shared GPU buffer and the ordered
/// list of descriptors carved out of it. Allocations are appended on `add`
/// and compacted away on `remove`; the GPU buffer itself is only rebuilt by
/// the build pass (`build` / `allocate`).
///
/// # Locking
///
/// Two independent mutexes guard the element data and the descriptor list.
/// When both are needed they are always taken in the order
/// data → descriptors (→ pending writes → GPU buffer handle).
///
/// `add` appends the data and registers the descriptor while still holding
/// the data lock, so a descriptor never becomes visible before its range is
/// populated, and the descriptor list stays in ascending offset order.
///
/// The build pass must run on a single thread and must not overlap `add`,
/// `remove` or `write` on the same store. The store does not enforce this.

use std::any::{type_name, Any, TypeId};
use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use bytemuck::Pod;
use crate::error::{Error, Result};
use crate::graphics_device::{Buffer, BufferDesc, BufferUsage, GraphicsDevice, VertexLayout};
use crate::log::Logger;
use crate::{engine_bail, engine_trace};
use super::descriptor::{BufferDescriptor, BufferKind};

const SOURCE: &str = "galaxy3d::BufferStore";

// ===== ELEMENT TYPES =====

/// Anything that can be stored in a shared GPU buffer
pub trait StoreElement: Pod + Send + Sync + 'static {}

impl<T: Pod + Send + Sync + 'static> StoreElement for T {}

/// Store of per-vertex data
pub type VertexStore<V> = BufferStore<V>;
/// Store of 32-bit indices
pub type IndexStore = BufferStore<u32>;
/// Store of per-instance data blocks
pub type InstanceStore<I> = BufferStore<I>;

// ===== STORE KEY =====

/// Compatibility key: two allocations may share a store iff their keys match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreKey {
    pub kind: BufferKind,
    pub element: TypeId,
    pub dynamic: bool,
}

impl StoreKey {
    pub fn of<T: 'static>(kind: BufferKind, dynamic: bool) -> Self {
        Self {
            kind,
            element: TypeId::of::<T>(),
            dynamic,
        }
    }
}

// ===== BUILD OUTCOME =====

/// What the build pass did with one store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Nothing to do
    Clean,
    /// GPU buffer recreated from the full logical data
    Rebuilt { bytes: u64 },
    /// Pending writes uploaded into the existing GPU buffer
    Updated { bytes: u64 },
}

// ===== BUFFER STORE =====

/// Shared store of `T` elements plus the descriptors allocated in it
pub struct BufferStore<T: StoreElement> {
    kind: BufferKind,
    dynamic: bool,
    store_index: usize,
    layout: Option<VertexLayout>,
    logger: Arc<dyn Logger>,

    data: Mutex<Vec<T>>,
    descriptors: Mutex<Vec<Arc<BufferDescriptor>>>,

    allocated_size: AtomicU64,
    allocated: AtomicBool,
    reallocation_needed: AtomicBool,
    allocation_count: AtomicU32,

    /// Element ranges written since the last build (dynamic stores only)
    pending_writes: Mutex<Vec<Range<usize>>>,
    gpu_buffer: Mutex<Option<Arc<dyn Buffer>>>,
}

impl<T: StoreElement> BufferStore<T> {
    /// Create an empty, never-allocated store
    ///
    /// # Arguments
    ///
    /// * `kind` - Vertex, index or instance store
    /// * `dynamic` - Mutability class of the GPU buffer
    /// * `store_index` - Position of the store in its manager
    /// * `layout` - Input layout for vertex/instance stores
    /// * `capacity` - Elements to reserve up front
    /// * `logger` - Sink for trace output
    pub fn new(
        kind: BufferKind,
        dynamic: bool,
        store_index: usize,
        layout: Option<VertexLayout>,
        capacity: usize,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            kind,
            dynamic,
            store_index,
            layout,
            logger,
            data: Mutex::new(Vec::with_capacity(capacity)),
            descriptors: Mutex::new(Vec::new()),
            allocated_size: AtomicU64::new(0),
            allocated: AtomicBool::new(false),
            reallocation_needed: AtomicBool::new(false),
            allocation_count: AtomicU32::new(0),
            pending_writes: Mutex::new(Vec::new()),
            gpu_buffer: Mutex::new(None),
        }
    }

    // ===== ACCESSORS =====

    pub fn kind(&self) -> BufferKind { self.kind }

    pub fn is_dynamic(&self) -> bool { self.dynamic }

    pub fn store_index(&self) -> usize { self.store_index }

    pub fn key(&self) -> StoreKey {
        StoreKey::of::<T>(self.kind, self.dynamic)
    }

    /// Input layout of the elements (None for index stores)
    pub fn layout(&self) -> Option<&VertexLayout> { self.layout.as_ref() }

    /// Size in bytes of one element
    pub fn stride(&self) -> u64 {
        std::mem::size_of::<T>() as u64
    }

    /// Number of elements in the logical data
    pub fn len(&self) -> usize {
        self.lock_data().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current logical size in bytes
    pub fn to_allocate_size(&self) -> u64 {
        self.len() as u64 * self.stride()
    }

    /// Size in bytes committed by the last `allocate`
    pub fn allocated_size(&self) -> u64 {
        self.allocated_size.load(Ordering::Acquire)
    }

    pub fn is_allocated(&self) -> bool {
        self.allocated.load(Ordering::Acquire)
    }

    pub fn needs_reallocation(&self) -> bool {
        self.reallocation_needed.load(Ordering::Acquire)
    }

    /// Number of times `allocate` ran
    pub fn allocation_count(&self) -> u32 {
        self.allocation_count.load(Ordering::Acquire)
    }

    /// Whether the GPU buffer must be rebuilt before next use
    pub fn is_dirty(&self) -> bool {
        !self.is_allocated() || self.needs_reallocation()
    }

    pub fn mark_reallocation_needed(&self) {
        self.reallocation_needed.store(true, Ordering::Release);
    }

    /// GPU buffer built by the last rebuild (None before the first one, or if empty)
    pub fn gpu_buffer(&self) -> Option<Arc<dyn Buffer>> {
        self.gpu_buffer.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Descriptors in ascending offset order
    pub fn descriptors(&self) -> Vec<Arc<BufferDescriptor>> {
        self.lock_descriptors().clone()
    }

    pub fn descriptor_count(&self) -> usize {
        self.lock_descriptors().len()
    }

    pub fn contains(&self, descriptor: &BufferDescriptor) -> bool {
        self.lock_descriptors()
            .iter()
            .any(|d| BufferDescriptor::same(d, descriptor))
    }

    /// Copy of the whole logical data
    pub fn data(&self) -> Vec<T> {
        self.lock_data().clone()
    }

    /// Copy of the elements of one allocation, None if it is not in this store
    pub fn elements(&self, descriptor: &BufferDescriptor) -> Option<Vec<T>> {
        let data = self.lock_data();
        if !self.contains(descriptor) {
            return None;
        }
        let state = descriptor.snapshot();
        data.get(state.offset..state.end()).map(|slice| slice.to_vec())
    }

    /// Whether the descriptors tile `[0, len)` exactly, in order
    pub fn is_partitioned(&self) -> bool {
        let data = self.lock_data();
        let descriptors = self.lock_descriptors();
        Self::partition_end(&descriptors) == Some(data.len())
    }

    // ===== MUTATION =====

    /// Append `data` as a new allocation described by `descriptor`
    ///
    /// Empty data is a no-op and leaves the descriptor not ready.
    pub fn add(&self, descriptor: &Arc<BufferDescriptor>, id: &str, data: Vec<T>) {
        if data.is_empty() {
            engine_trace!(self.logger, SOURCE,
                "Store {} ({}): empty add for '{}' ignored", self.store_index, self.kind, id);
            return;
        }
        debug_assert_eq!(descriptor.kind(), self.kind, "descriptor kind does not match store");

        let count = data.len();
        let offset = {
            let mut elements = self.lock_data();
            let offset = elements.len();
            elements.extend(data);

            let mut descriptors = self.lock_descriptors();
            descriptor.populate(id, self.store_index, offset, count);
            descriptors.push(descriptor.clone());
            debug_assert_eq!(Self::partition_end(&descriptors), Some(elements.len()));
            offset
        };
        self.mark_reallocation_needed();

        engine_trace!(self.logger, SOURCE,
            "Store {} ({}): added '{}' at [{}, {})", self.store_index, self.kind, id, offset, offset + count);
    }

    /// Remove an allocation and compact the ones after it
    ///
    /// Returns false (and changes nothing) if the descriptor is not in this store.
    pub fn remove(&self, descriptor: &Arc<BufferDescriptor>) -> bool {
        let mut elements = self.lock_data();
        let mut descriptors = self.lock_descriptors();

        let Some(position) = descriptors.iter().position(|d| BufferDescriptor::same(d, descriptor)) else {
            engine_trace!(self.logger, SOURCE,
                "Store {} ({}): remove of unknown descriptor '{}' ignored",
                self.store_index, self.kind, descriptor.id());
            return false;
        };

        let state = descriptor.snapshot();
        debug_assert!(state.end() <= elements.len(), "descriptor '{}' exceeds store data", state.id);
        if state.count > 0 {
            elements.drain(state.offset..state.end());
        }
        descriptors.remove(position);

        // First remaining descriptor is pinned to 0, each next one follows its predecessor
        let mut next = match position {
            0 => 0,
            _ => {
                let previous = descriptors[position - 1].snapshot();
                previous.end()
            }
        };
        for follower in &descriptors[position..] {
            follower.set_offset(next);
            next += follower.count();
        }
        debug_assert_eq!(Self::partition_end(&descriptors), Some(elements.len()));

        drop(descriptors);
        drop(elements);

        descriptor.retire();
        self.mark_reallocation_needed();

        engine_trace!(self.logger, SOURCE,
            "Store {} ({}): removed '{}' ({} elements)", self.store_index, self.kind, state.id, state.count);
        true
    }

    /// Overwrite elements `[first, first + values.len())` of one allocation
    ///
    /// Dynamic stores queue the range for a partial upload in the next build
    /// pass; static stores are flagged for a full rebuild instead.
    pub fn write(&self, descriptor: &BufferDescriptor, first: usize, values: &[T]) -> Result<()> {
        let mut elements = self.lock_data();
        if !self.contains(descriptor) {
            engine_bail!(self.logger, SOURCE, Error::InvalidResource(format!(
                "descriptor '{}' is not allocated in store {}", descriptor.id(), self.store_index)));
        }

        let state = descriptor.snapshot();
        let Some(last) = first.checked_add(values.len()).filter(|&last| last <= state.count) else {
            engine_bail!(self.logger, SOURCE, Error::InvalidResource(format!(
                "write of {} elements at {} outside of '{}' ({} elements)",
                values.len(), first, state.id, state.count)));
        };
        if values.is_empty() {
            return Ok(());
        }

        let start = state.offset + first;
        let end = state.offset + last;
        elements[start..end].copy_from_slice(values);

        if self.dynamic {
            self.pending_writes
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(start..end);
        } else {
            self.mark_reallocation_needed();
        }
        Ok(())
    }

    // ===== ALLOCATION =====

    /// Bookkeeping half of a rebuild: commit the current size and clear dirtiness
    pub fn allocate(&self) {
        let size = self.to_allocate_size();
        self.allocated_size.store(size, Ordering::Release);
        self.allocated.store(true, Ordering::Release);
        self.allocation_count.fetch_add(1, Ordering::AcqRel);
        self.reallocation_needed.store(false, Ordering::Release);
    }

    /// Bring the GPU buffer up to date with the logical data
    ///
    /// Dirty stores get a brand new GPU buffer (none if the store is empty)
    /// followed by `allocate`. Clean dynamic stores only upload pending writes.
    pub fn build(&self, device: &mut dyn GraphicsDevice, name: &str) -> Result<BuildOutcome> {
        if self.is_dirty() {
            let bytes = {
                let elements = self.lock_data();
                let bytes: &[u8] = bytemuck::cast_slice(elements.as_slice());
                let buffer = if bytes.is_empty() {
                    None
                } else {
                    Some(device.create_buffer(BufferDesc {
                        name: name.to_string(),
                        usage: self.usage(),
                        dynamic: self.dynamic,
                        data: bytes,
                    })?)
                };
                self.pending_writes.lock().unwrap_or_else(PoisonError::into_inner).clear();
                *self.gpu_buffer.lock().unwrap_or_else(PoisonError::into_inner) = buffer;
                bytes.len() as u64
            };
            self.allocate();
            return Ok(BuildOutcome::Rebuilt { bytes });
        }

        let ranges = std::mem::take(
            &mut *self.pending_writes.lock().unwrap_or_else(PoisonError::into_inner),
        );
        let Some(buffer) = self.gpu_buffer() else {
            return Ok(BuildOutcome::Clean);
        };
        if ranges.is_empty() {
            return Ok(BuildOutcome::Clean);
        }

        let elements = self.lock_data();
        let mut uploaded = 0u64;
        for range in ranges {
            let bytes: &[u8] = bytemuck::cast_slice(&elements[range.clone()]);
            buffer.update(range.start as u64 * self.stride(), bytes)?;
            uploaded += bytes.len() as u64;
        }
        Ok(BuildOutcome::Updated { bytes: uploaded })
    }

    /// Deep copy: data, descriptor list (same descriptors) and allocation state
    ///
    /// Descriptors are shared with the source store. Once one of the two
    /// stores adds or removes allocations, offsets read through the other one
    /// no longer match its data.
    pub fn copy(&self) -> Self {
        let data = self.lock_data();
        let descriptors = self.lock_descriptors();
        let pending = self.pending_writes.lock().unwrap_or_else(PoisonError::into_inner);
        Self {
            kind: self.kind,
            dynamic: self.dynamic,
            store_index: self.store_index,
            layout: self.layout.clone(),
            logger: self.logger.clone(),
            data: Mutex::new(data.clone()),
            descriptors: Mutex::new(descriptors.clone()),
            allocated_size: AtomicU64::new(self.allocated_size()),
            allocated: AtomicBool::new(self.is_allocated()),
            reallocation_needed: AtomicBool::new(self.needs_reallocation()),
            allocation_count: AtomicU32::new(self.allocation_count()),
            pending_writes: Mutex::new(pending.clone()),
            gpu_buffer: Mutex::new(self.gpu_buffer()),
        }
    }

    // ===== INTERNAL HELPERS =====

    fn usage(&self) -> BufferUsage {
        match self.kind {
            BufferKind::Index => BufferUsage::Index,
            BufferKind::Vertex | BufferKind::Instance => BufferUsage::Vertex,
        }
    }

    fn lock_data(&self) -> MutexGuard<'_, Vec<T>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_descriptors(&self) -> MutexGuard<'_, Vec<Arc<BufferDescriptor>>> {
        self.descriptors.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// End of the contiguous run formed by `descriptors`, None on a gap or overlap
    fn partition_end(descriptors: &[Arc<BufferDescriptor>]) -> Option<usize> {
        descriptors.iter().try_fold(0usize, |expected, descriptor| {
            let state = descriptor.snapshot();
            (state.offset == expected).then(|| state.end())
        })
    }
}

// ============================================================================
// TYPE-ERASED STORE
// ============================================================================

/// Element-type-independent view of a store, as held by the buffer manager
pub trait AnyStore: Send + Sync {
    fn key(&self) -> StoreKey;
    fn kind(&self) -> BufferKind;
    fn element_type_name(&self) -> &'static str;
    fn is_dynamic(&self) -> bool;
    fn store_index(&self) -> usize;
    fn layout(&self) -> Option<VertexLayout>;
    fn len(&self) -> usize;
    fn descriptor_count(&self) -> usize;
    fn to_allocate_size(&self) -> u64;
    fn allocated_size(&self) -> u64;
    fn allocation_count(&self) -> u32;
    fn is_allocated(&self) -> bool;
    fn needs_reallocation(&self) -> bool;
    fn is_dirty(&self) -> bool;
    fn mark_reallocation_needed(&self);
    fn contains(&self, descriptor: &BufferDescriptor) -> bool;
    fn remove(&self, descriptor: &Arc<BufferDescriptor>) -> bool;
    fn allocate(&self);
    fn build(&self, device: &mut dyn GraphicsDevice, name: &str) -> Result<BuildOutcome>;
    fn gpu_buffer(&self) -> Option<Arc<dyn Buffer>>;
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: StoreElement> AnyStore for BufferStore<T> {
    fn key(&self) -> StoreKey { BufferStore::key(self) }
    fn kind(&self) -> BufferKind { self.kind }
    fn element_type_name(&self) -> &'static str { type_name::<T>() }
    fn is_dynamic(&self) -> bool { self.dynamic }
    fn store_index(&self) -> usize { self.store_index }
    fn layout(&self) -> Option<VertexLayout> { self.layout.clone() }
    fn len(&self) -> usize { BufferStore::len(self) }
    fn descriptor_count(&self) -> usize { BufferStore::descriptor_count(self) }
    fn to_allocate_size(&self) -> u64 { BufferStore::to_allocate_size(self) }
    fn allocated_size(&self) -> u64 { BufferStore::allocated_size(self) }
    fn allocation_count(&self) -> u32 { BufferStore::allocation_count(self) }
    fn is_allocated(&self) -> bool { BufferStore::is_allocated(self) }
    fn needs_reallocation(&self) -> bool { BufferStore::needs_reallocation(self) }
    fn is_dirty(&self) -> bool { BufferStore::is_dirty(self) }
    fn mark_reallocation_needed(&self) { BufferStore::mark_reallocation_needed(self) }
    fn contains(&self, descriptor: &BufferDescriptor) -> bool { BufferStore::contains(self, descriptor) }
    fn remove(&self, descriptor: &Arc<BufferDescriptor>) -> bool { BufferStore::remove(self, descriptor) }
    fn allocate(&self) { BufferStore::allocate(self) }

    fn build(&self, device: &mut dyn GraphicsDevice, name: &str) -> Result<BuildOutcome> {
        BufferStore::build(self, device, name)
    }

    fn gpu_buffer(&self) -> Option<Arc<dyn Buffer>> { BufferStore::gpu_buffer(self) }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl dyn AnyStore {
    /// Whether this store holds elements of type `T`
    pub fn matches_element_type<T: 'static>(&self) -> bool {
        self.key().element == TypeId::of::<T>()
    }

    /// Recover the typed store, failing with `TypeMismatch` on the wrong `T`
    pub fn downcast<T: StoreElement>(self: Arc<Self>) -> Result<Arc<BufferStore<T>>> {
        let store_index = self.store_index();
        let found = self.element_type_name();
        if !self.matches_element_type::<T>() {
            return Err(Error::TypeMismatch { store_index, expected: type_name::<T>(), found });
        }
        self.as_any()
            .downcast::<BufferStore<T>>()
            .map_err(|_| Error::TypeMismatch { store_index, expected: type_name::<T>(), found })
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
