/// Mutation requests - deferred add/remove commands against shared stores.
///
/// A request is built on any thread and hands out its descriptor right away.
/// `process` performs the mutation: an add finds (or creates) a compatible
/// store through a `StoreLocator` and appends its data, a remove deletes the
/// descriptor's range from the store it lives in.

use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{VertexData, VertexLayout};
use crate::log::Logger;
use crate::{engine_err, engine_trace};
use super::descriptor::{BufferDescriptor, BufferKind};
use super::store::{AnyStore, BufferStore, StoreElement, StoreKey};

const SOURCE: &str = "galaxy3d::BufferRequest";

// ===== REQUEST STATE =====

/// Lifecycle of a request (strictly forward)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Requested,
    InProcess,
    Processed,
}

/// What a request does to its store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAction {
    Add,
    Remove,
}

// ===== STORE LOCATOR =====

/// Store lookup and creation, as seen by requests
///
/// Implemented by `BufferManager`.
pub trait StoreLocator: Send + Sync {
    /// Logger requests report through
    fn logger(&self) -> Arc<dyn Logger>;

    /// Elements to reserve in newly created stores
    fn initial_store_capacity(&self) -> usize {
        0
    }

    /// First store accepting allocations for `key`
    fn find_compatible_store(&self, key: &StoreKey) -> Option<usize>;

    /// Register the store built by `make` (called with the new index)
    fn add_store(&self, make: &mut dyn FnMut(usize) -> Arc<dyn AnyStore>) -> usize;

    /// Find a compatible store or create one; true when it was created
    ///
    /// The default is not atomic. Locators shared between threads override it.
    fn find_or_add_store(
        &self,
        key: &StoreKey,
        make: &mut dyn FnMut(usize) -> Arc<dyn AnyStore>,
    ) -> (usize, bool) {
        match self.find_compatible_store(key) {
            Some(index) => (index, false),
            None => (self.add_store(make), true),
        }
    }

    /// Store at `index`, or `StoreNotFound`
    fn store(&self, index: usize) -> Result<Arc<dyn AnyStore>>;

    /// Called once per successfully processed request
    fn request_processed(&self, _action: RequestAction) {}
}

// ===== REQUEST TRAIT =====

/// A pending mutation of the shared buffers
pub trait Request: Send {
    /// Logical name of the allocation
    fn id(&self) -> String;

    fn action(&self) -> RequestAction;

    fn status(&self) -> RequestStatus;

    /// Descriptor of the allocation, available before processing
    fn descriptor(&self) -> Arc<BufferDescriptor>;

    /// Apply the mutation. Must be called once.
    fn process(&mut self, locator: &dyn StoreLocator) -> Result<()>;
}

// ============================================================================
// ADD REQUEST
// ============================================================================

/// Append a block of elements to a compatible store
pub struct AddRequest<T: StoreElement> {
    id: String,
    kind: BufferKind,
    dynamic: bool,
    data: Vec<T>,
    layout: Option<VertexLayout>,
    descriptor: Arc<BufferDescriptor>,
    status: RequestStatus,
}

/// Request adding per-vertex data
pub type AddVerticesRequest<V> = AddRequest<V>;
/// Request adding 32-bit indices
pub type AddIndicesRequest = AddRequest<u32>;
/// Request adding per-instance data
pub type AddInstancingRequest<I> = AddRequest<I>;

impl<T: StoreElement> AddRequest<T> {
    /// Generic constructor, prefer `vertices` / `indices` / `instancing`
    pub fn new(
        kind: BufferKind,
        id: impl Into<String>,
        dynamic: bool,
        data: Vec<T>,
        layout: Option<VertexLayout>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            dynamic,
            data,
            layout,
            descriptor: BufferDescriptor::new(kind),
            status: RequestStatus::Requested,
        }
    }

    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// Number of elements still waiting to be added
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<V: VertexData> AddRequest<V> {
    /// Vertices bound at binding 0
    pub fn vertices(id: impl Into<String>, dynamic: bool, data: Vec<V>) -> Self {
        Self::new(BufferKind::Vertex, id, dynamic, data, Some(V::input(0)))
    }

    /// Link the instance block these vertices are drawn with
    pub fn with_instancing(self, instancing: &Arc<BufferDescriptor>) -> Self {
        debug_assert_eq!(instancing.kind(), BufferKind::Instance);
        self.descriptor.link_instancing(instancing.clone());
        self
    }

    /// Per-instance data bound at binding 1
    pub fn instancing(id: impl Into<String>, dynamic: bool, data: Vec<V>) -> Self {
        Self::new(BufferKind::Instance, id, dynamic, data, Some(V::input(1)))
    }

    /// `count` zeroed instance blocks, to be filled later with `write`
    pub fn instancing_zeroed(id: impl Into<String>, dynamic: bool, count: usize) -> Self {
        Self::instancing(id, dynamic, vec![bytemuck::Zeroable::zeroed(); count])
    }
}

impl AddRequest<u32> {
    pub fn indices(id: impl Into<String>, dynamic: bool, data: Vec<u32>) -> Self {
        Self::new(BufferKind::Index, id, dynamic, data, None)
    }
}

impl<T: StoreElement> Request for AddRequest<T> {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn action(&self) -> RequestAction {
        RequestAction::Add
    }

    fn status(&self) -> RequestStatus {
        self.status
    }

    fn descriptor(&self) -> Arc<BufferDescriptor> {
        self.descriptor.clone()
    }

    fn process(&mut self, locator: &dyn StoreLocator) -> Result<()> {
        debug_assert_eq!(self.status, RequestStatus::Requested, "request '{}' processed twice", self.id);
        self.status = RequestStatus::InProcess;
        let logger = locator.logger();

        if self.data.is_empty() {
            engine_trace!(logger, SOURCE, "Add '{}': no {} data, nothing to do", self.id, self.kind);
            self.status = RequestStatus::Processed;
            locator.request_processed(RequestAction::Add);
            return Ok(());
        }

        let key = StoreKey::of::<T>(self.kind, self.dynamic);
        let capacity = locator.initial_store_capacity();
        let (kind, dynamic, layout) = (self.kind, self.dynamic, &self.layout);
        let mut make = |index: usize| -> Arc<dyn AnyStore> {
            Arc::new(BufferStore::<T>::new(kind, dynamic, index, layout.clone(), capacity, logger.clone()))
        };
        let (index, created) = locator.find_or_add_store(&key, &mut make);

        let store = locator
            .store(index)?
            .downcast::<T>()
            .map_err(|error| engine_err!(logger, SOURCE, error))?;
        if !created {
            store.mark_reallocation_needed();
        }
        store.add(&self.descriptor, &self.id, std::mem::take(&mut self.data));

        self.status = RequestStatus::Processed;
        locator.request_processed(RequestAction::Add);
        Ok(())
    }
}

// ============================================================================
// REMOVE REQUEST
// ============================================================================

/// Remove an allocation from the store it lives in
pub struct RemoveRequest {
    descriptor: Arc<BufferDescriptor>,
    status: RequestStatus,
}

impl RemoveRequest {
    pub fn new(descriptor: Arc<BufferDescriptor>) -> Self {
        Self {
            descriptor,
            status: RequestStatus::Requested,
        }
    }
}

impl Request for RemoveRequest {
    fn id(&self) -> String {
        self.descriptor.id()
    }

    fn action(&self) -> RequestAction {
        RequestAction::Remove
    }

    fn status(&self) -> RequestStatus {
        self.status
    }

    fn descriptor(&self) -> Arc<BufferDescriptor> {
        self.descriptor.clone()
    }

    fn process(&mut self, locator: &dyn StoreLocator) -> Result<()> {
        debug_assert_eq!(self.status, RequestStatus::Requested, "remove request processed twice");
        self.status = RequestStatus::InProcess;
        let logger = locator.logger();

        let state = self.descriptor.snapshot();
        if !state.ready {
            engine_trace!(logger, SOURCE, "Remove '{}': descriptor not allocated, nothing to do", state.id);
            self.status = RequestStatus::Processed;
            locator.request_processed(RequestAction::Remove);
            return Ok(());
        }

        let store = locator.store(state.store_index)?;
        if !store.remove(&self.descriptor) {
            engine_trace!(logger, SOURCE,
                "Remove '{}': already gone from store {}", state.id, state.store_index);
        }

        self.status = RequestStatus::Processed;
        locator.request_processed(RequestAction::Remove);
        Ok(())
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
