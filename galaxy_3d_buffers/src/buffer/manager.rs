/// Buffer manager - registry of shared stores, request queue and build pass.
///
/// The manager owns every store of one device. Requests reach it through the
/// `StoreLocator` trait; the render loop drives `process_pending` and
/// `allocate_dirty` once per frame.
///
/// # Threading
///
/// Store lookup and creation are safe from any number of threads: the
/// registry is an `RwLock` and find-or-create runs under its write lock, so
/// concurrent first adds of the same kind converge on one store.
///
/// `allocate_dirty` must be called from a single thread, while no request is
/// being processed against the stores it rebuilds. This is the caller's
/// responsibility.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use rustc_hash::FxHashMap;
use crate::error::{Error, Result};
use crate::graphics_device::GraphicsDevice;
use crate::log::{DefaultLogger, LogSeverity, Logger, SeverityFilter};
use crate::{engine_bail, engine_debug, engine_err, engine_info, engine_warn};
use super::descriptor::BufferDescriptor;
use super::request::{Request, RequestAction, StoreLocator};
use super::store::{AnyStore, BufferStore, BuildOutcome, StoreElement, StoreKey};

const SOURCE: &str = "galaxy3d::BufferManager";

// ============================================================================
// Configuration and statistics
// ============================================================================

/// Buffer manager configuration
#[derive(Debug, Clone)]
pub struct BufferManagerConfig {
    /// Prefix of GPU buffer names
    pub label: String,
    /// Messages below this severity are dropped
    pub min_log_severity: LogSeverity,
    /// Elements reserved in each new store
    pub initial_store_capacity: usize,
    /// Once a store holds this many bytes, new allocations go to a fresh store
    pub max_store_bytes: Option<u64>,
    /// Threads started by `RequestWorker::for_manager`
    pub worker_threads: usize,
}

impl Default for BufferManagerConfig {
    fn default() -> Self {
        Self {
            label: "galaxy3d".to_string(),
            min_log_severity: if cfg!(debug_assertions) { LogSeverity::Debug } else { LogSeverity::Info },
            initial_store_capacity: 0,
            max_store_bytes: None,
            worker_threads: 2,
        }
    }
}

/// Buffer manager statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    /// Stores created since startup
    pub stores_created: u64,
    /// Requests processed (add and remove)
    pub requests_processed: u64,
    /// Store rebuilds performed by the build pass
    pub allocations: u64,
    /// Bytes sent to the GPU (rebuilds and partial updates)
    pub bytes_uploaded: u64,
}

/// Result of one build pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationReport {
    /// Stores whose GPU buffer was recreated
    pub rebuilt: Vec<usize>,
    /// Dynamic stores that only received partial updates
    pub updated: Vec<usize>,
    /// Total bytes uploaded
    pub bytes_uploaded: u64,
}

impl AllocationReport {
    /// True when the pass had nothing to do
    pub fn is_empty(&self) -> bool {
        self.rebuilt.is_empty() && self.updated.is_empty()
    }
}

#[derive(Default)]
struct StatCounters {
    stores_created: AtomicU64,
    requests_processed: AtomicU64,
    allocations: AtomicU64,
    bytes_uploaded: AtomicU64,
}

#[derive(Default)]
struct StoreRegistry {
    stores: Vec<Arc<dyn AnyStore>>,
    /// Store indices per compatibility key, in creation order
    lookup: FxHashMap<StoreKey, Vec<usize>>,
}

// ============================================================================
// BufferManager
// ============================================================================

/// Owner of all shared buffer stores
pub struct BufferManager {
    config: BufferManagerConfig,
    logger: Arc<dyn Logger>,
    registry: RwLock<StoreRegistry>,
    pending: Mutex<Vec<Box<dyn Request>>>,
    stats: StatCounters,
}

impl BufferManager {
    /// Create an empty manager
    ///
    /// # Arguments
    ///
    /// * `config` - Manager configuration
    /// * `logger` - Destination of all store/request/manager messages
    pub fn new(config: BufferManagerConfig, logger: Arc<dyn Logger>) -> Self {
        let logger: Arc<dyn Logger> = Arc::new(SeverityFilter::new(logger, config.min_log_severity));
        engine_debug!(logger, SOURCE, "Buffer manager '{}' created", config.label);
        Self {
            config,
            logger,
            registry: RwLock::new(StoreRegistry::default()),
            pending: Mutex::new(Vec::new()),
            stats: StatCounters::default(),
        }
    }

    pub fn config(&self) -> &BufferManagerConfig {
        &self.config
    }

    // ===== STORES =====

    pub fn store_count(&self) -> usize {
        self.read_registry().stores.len()
    }

    /// Snapshot of every store, in index order
    pub fn stores(&self) -> Vec<Arc<dyn AnyStore>> {
        self.read_registry().stores.clone()
    }

    /// Store at `index` with its element type, or `TypeMismatch`
    pub fn typed_store<T: StoreElement>(&self, index: usize) -> Result<Arc<BufferStore<T>>> {
        self.store(index)?
            .downcast::<T>()
            .map_err(|error| engine_err!(self.logger, SOURCE, error))
    }

    /// Store that holds `descriptor`, if it is allocated
    pub fn store_of(&self, descriptor: &BufferDescriptor) -> Option<Arc<dyn AnyStore>> {
        if !descriptor.is_ready() {
            return None;
        }
        let registry = self.read_registry();
        registry
            .stores
            .get(descriptor.store_index())
            .filter(|store| store.contains(descriptor))
            .cloned()
    }

    /// Indices of stores that need a GPU rebuild
    pub fn dirty_stores(&self) -> Vec<usize> {
        self.read_registry()
            .stores
            .iter()
            .filter(|store| store.is_dirty())
            .map(|store| store.store_index())
            .collect()
    }

    /// Replace the store at `index`, typically with a `copy()` of it
    ///
    /// New lookups see the replacement. Holders of the old `Arc` keep its data
    /// and GPU buffer, but descriptor offsets follow the replacement: once it
    /// is mutated, `elements`/`is_partitioned` on the old store are stale.
    /// Returns the old store.
    pub fn swap_store(&self, index: usize, store: Arc<dyn AnyStore>) -> Result<Arc<dyn AnyStore>> {
        let mut registry = self.write_registry();
        let Some(current) = registry.stores.get(index) else {
            engine_bail!(self.logger, SOURCE, Error::StoreNotFound(index));
        };
        if current.key() != store.key() || store.store_index() != index {
            engine_bail!(self.logger, SOURCE, Error::InvalidResource(format!(
                "store {} ({}, '{}') cannot replace store {} ({}, '{}')",
                store.store_index(), store.kind(), store.element_type_name(),
                index, current.kind(), current.element_type_name())));
        }
        let old = std::mem::replace(&mut registry.stores[index], store);
        engine_debug!(self.logger, SOURCE, "Store {} swapped", index);
        Ok(old)
    }

    // ===== REQUEST QUEUE =====

    /// Queue a request for the next `process_pending`, returning its descriptor
    pub fn enqueue(&self, request: Box<dyn Request>) -> Arc<BufferDescriptor> {
        let descriptor = request.descriptor();
        self.lock_pending().push(request);
        descriptor
    }

    pub fn pending_count(&self) -> usize {
        self.lock_pending().len()
    }

    /// Process queued requests in submission order
    ///
    /// Stops at the first failure; that request is dropped and the ones after
    /// it go back to the front of the queue.
    pub fn process_pending(&self) -> Result<usize> {
        let mut requests = std::mem::take(&mut *self.lock_pending()).into_iter();
        let mut processed = 0;
        while let Some(mut request) = requests.next() {
            if let Err(error) = request.process(self) {
                let mut rest: Vec<_> = requests.collect();
                let mut pending = self.lock_pending();
                rest.append(&mut pending);
                *pending = rest;
                return Err(error);
            }
            processed += 1;
        }
        Ok(processed)
    }

    // ===== BUILD PASS =====

    /// Rebuild every dirty store and flush pending partial writes
    ///
    /// Single-threaded, see the module documentation.
    pub fn allocate_dirty(&self, device: &mut dyn GraphicsDevice) -> Result<AllocationReport> {
        let mut report = AllocationReport::default();

        for store in self.stores() {
            let index = store.store_index();
            let name = format!("{}/{}#{}", self.config.label, store.kind(), index);
            let outcome = store
                .build(device, &name)
                .map_err(|error| engine_err!(self.logger, SOURCE, error))?;

            match outcome {
                BuildOutcome::Clean => {}
                BuildOutcome::Rebuilt { bytes } => {
                    report.rebuilt.push(index);
                    report.bytes_uploaded += bytes;
                    self.stats.allocations.fetch_add(1, Ordering::Relaxed);
                    self.stats.bytes_uploaded.fetch_add(bytes, Ordering::Relaxed);
                    engine_debug!(self.logger, SOURCE, "Rebuilt '{}' ({} bytes)", name, bytes);
                }
                BuildOutcome::Updated { bytes } => {
                    report.updated.push(index);
                    report.bytes_uploaded += bytes;
                    self.stats.bytes_uploaded.fetch_add(bytes, Ordering::Relaxed);
                }
            }
        }

        if !report.is_empty() {
            engine_info!(self.logger, SOURCE,
                "Build pass: {} rebuilt, {} updated, {} bytes uploaded",
                report.rebuilt.len(), report.updated.len(), report.bytes_uploaded);
        }
        Ok(report)
    }

    /// Counters since the manager was created
    pub fn stats(&self) -> BufferStats {
        BufferStats {
            stores_created: self.stats.stores_created.load(Ordering::Relaxed),
            requests_processed: self.stats.requests_processed.load(Ordering::Relaxed),
            allocations: self.stats.allocations.load(Ordering::Relaxed),
            bytes_uploaded: self.stats.bytes_uploaded.load(Ordering::Relaxed),
        }
    }

    // ===== INTERNAL HELPERS =====

    fn compatible_in(&self, registry: &StoreRegistry, key: &StoreKey) -> Option<usize> {
        let candidates = registry.lookup.get(key)?;
        candidates.iter().copied().find(|&index| match self.config.max_store_bytes {
            Some(cap) => registry.stores[index].to_allocate_size() < cap,
            None => true,
        })
    }

    fn insert_store(
        &self,
        registry: &mut StoreRegistry,
        make: &mut dyn FnMut(usize) -> Arc<dyn AnyStore>,
    ) -> usize {
        let index = registry.stores.len();
        let store = make(index);
        debug_assert_eq!(store.store_index(), index, "store built with the wrong index");

        let key = store.key();
        let siblings = registry.lookup.entry(key).or_default();
        siblings.push(index);
        if siblings.len() > 1 {
            engine_warn!(self.logger, SOURCE,
                "Store {} opened for {} '{}': {} stores of this kind are full",
                index, store.kind(), store.element_type_name(), siblings.len() - 1);
        }
        engine_debug!(self.logger, SOURCE,
            "Created {} store {} for '{}' (dynamic: {})",
            store.kind(), index, store.element_type_name(), store.is_dynamic());

        registry.stores.push(store);
        self.stats.stores_created.fetch_add(1, Ordering::Relaxed);
        index
    }

    fn read_registry(&self) -> RwLockReadGuard<'_, StoreRegistry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_registry(&self) -> RwLockWriteGuard<'_, StoreRegistry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_pending(&self) -> MutexGuard<'_, Vec<Box<dyn Request>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for BufferManager {
    /// Default configuration, console logger
    fn default() -> Self {
        Self::new(BufferManagerConfig::default(), Arc::new(DefaultLogger))
    }
}

impl StoreLocator for BufferManager {
    fn logger(&self) -> Arc<dyn Logger> {
        self.logger.clone()
    }

    fn initial_store_capacity(&self) -> usize {
        self.config.initial_store_capacity
    }

    fn find_compatible_store(&self, key: &StoreKey) -> Option<usize> {
        self.compatible_in(&self.read_registry(), key)
    }

    fn add_store(&self, make: &mut dyn FnMut(usize) -> Arc<dyn AnyStore>) -> usize {
        let mut registry = self.write_registry();
        self.insert_store(&mut registry, make)
    }

    fn find_or_add_store(
        &self,
        key: &StoreKey,
        make: &mut dyn FnMut(usize) -> Arc<dyn AnyStore>,
    ) -> (usize, bool) {
        if let Some(index) = self.compatible_in(&self.read_registry(), key) {
            return (index, false);
        }
        // Another producer may have created the store since the read lock was released
        let mut registry = self.write_registry();
        match self.compatible_in(&registry, key) {
            Some(index) => (index, false),
            None => (self.insert_store(&mut registry, make), true),
        }
    }

    fn store(&self, index: usize) -> Result<Arc<dyn AnyStore>> {
        let store = self.read_registry().stores.get(index).cloned();
        match store {
            Some(store) => Ok(store),
            None => Err(engine_err!(self.logger, SOURCE, Error::StoreNotFound(index))),
        }
    }

    fn request_processed(&self, _action: RequestAction) {
        self.stats.requests_processed.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
