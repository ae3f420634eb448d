use super::*;
use std::sync::RwLock;
use crate::error::Error;
use crate::graphics_device::{InstanceTransform, MeshVertex, PositionVertex};
use crate::log::{LogSeverity, MemoryLogger};
use bytemuck::Zeroable;
use glam::{Mat4, Vec3};

// ============================================================================
// Test locator (plain list of stores, no compatibility cap)
// ============================================================================

#[derive(Default)]
struct ListLocator {
    stores: RwLock<Vec<Arc<dyn AnyStore>>>,
    logger: Arc<MemoryLogger>,
    processed: RwLock<Vec<RequestAction>>,
}

impl StoreLocator for ListLocator {
    fn logger(&self) -> Arc<dyn Logger> {
        self.logger.clone()
    }

    fn find_compatible_store(&self, key: &StoreKey) -> Option<usize> {
        self.stores.read().unwrap().iter().position(|s| s.key() == *key)
    }

    fn add_store(&self, make: &mut dyn FnMut(usize) -> Arc<dyn AnyStore>) -> usize {
        let mut stores = self.stores.write().unwrap();
        let index = stores.len();
        stores.push(make(index));
        index
    }

    fn store(&self, index: usize) -> Result<Arc<dyn AnyStore>> {
        self.stores
            .read()
            .unwrap()
            .get(index)
            .cloned()
            .ok_or(Error::StoreNotFound(index))
    }

    fn request_processed(&self, action: RequestAction) {
        self.processed.write().unwrap().push(action);
    }
}

impl ListLocator {
    fn store_count(&self) -> usize {
        self.stores.read().unwrap().len()
    }
}

fn vertex(x: f32) -> PositionVertex {
    PositionVertex { position: Vec3::new(x, 0.0, 0.0) }
}

// ============================================================================
// Add request tests
// ============================================================================

#[test]
fn test_add_request_starts_requested_with_empty_descriptor() {
    let request = AddRequest::vertices("tri", false, vec![vertex(0.0); 3]);

    assert_eq!(request.status(), RequestStatus::Requested);
    assert_eq!(request.action(), RequestAction::Add);
    assert_eq!(request.id(), "tri");
    assert_eq!(request.len(), 3);
    assert!(!request.descriptor().is_ready());
    assert_eq!(request.descriptor().kind(), BufferKind::Vertex);
}

#[test]
fn test_add_request_creates_store_then_reuses_it() {
    let locator = ListLocator::default();
    let mut first = AddRequest::indices("a", false, vec![0, 1, 2]);
    let mut second = AddRequest::indices("b", false, vec![2, 3, 0]);

    first.process(&locator).unwrap();
    let store = locator.store(0).unwrap();
    store.allocate();
    second.process(&locator).unwrap();

    assert_eq!(locator.store_count(), 1);
    assert_eq!(first.status(), RequestStatus::Processed);
    assert_eq!(second.descriptor().offset(), 3);
    assert!(store.needs_reallocation());
    assert_eq!(*locator.processed.read().unwrap(), vec![RequestAction::Add, RequestAction::Add]);
}

#[test]
fn test_add_request_separates_incompatible_stores() {
    let locator = ListLocator::default();
    AddRequest::vertices("p", false, vec![vertex(1.0)]).process(&locator).unwrap();
    AddRequest::vertices("p-dyn", true, vec![vertex(1.0)]).process(&locator).unwrap();
    AddRequest::vertices("m", false, vec![MeshVertex::zeroed(); 2])
        .process(&locator)
        .unwrap();
    let mut mesh: AddVerticesRequest<MeshVertex> = AddRequest::vertices("m2", false, Vec::new());
    mesh.process(&locator).unwrap();
    AddRequest::indices("i", false, vec![0]).process(&locator).unwrap();

    assert_eq!(locator.store_count(), 4);
    let keys: Vec<_> = (0..4).map(|i| locator.store(i).unwrap().key()).collect();
    assert_eq!(keys[0], StoreKey::of::<PositionVertex>(BufferKind::Vertex, false));
    assert_eq!(keys[1], StoreKey::of::<PositionVertex>(BufferKind::Vertex, true));
    assert_eq!(keys[3], StoreKey::of::<u32>(BufferKind::Index, false));
}

#[test]
fn test_add_request_empty_payload_is_noop() {
    let locator = ListLocator::default();
    let mut request = AddRequest::indices("nothing", false, Vec::new());
    request.process(&locator).unwrap();

    assert_eq!(request.status(), RequestStatus::Processed);
    assert_eq!(locator.store_count(), 0);
    assert!(!request.descriptor().is_ready());
    assert!(locator.logger.contains("nothing"));
    assert_eq!(locator.logger.count(LogSeverity::Trace), 1);
}

#[test]
fn test_add_request_sets_layout_per_kind() {
    let locator = ListLocator::default();
    AddRequest::vertices("v", false, vec![vertex(0.0)]).process(&locator).unwrap();
    AddRequest::instancing("i", true, vec![InstanceTransform::new(Mat4::IDENTITY)])
        .process(&locator)
        .unwrap();

    let vertex_layout = locator.store(0).unwrap().layout().unwrap();
    let instance_layout = locator.store(1).unwrap().layout().unwrap();
    assert_eq!(vertex_layout.bindings[0].binding, 0);
    assert_eq!(instance_layout.bindings[0].binding, 1);
    assert!(locator.store(1).unwrap().is_dynamic());
}

#[test]
fn test_instancing_zeroed_and_link() {
    let locator = ListLocator::default();
    let mut instances = AddRequest::<InstanceTransform>::instancing_zeroed("crowd", true, 16);
    let mut mesh = AddRequest::vertices("soldier", false, vec![vertex(0.0); 3])
        .with_instancing(&instances.descriptor());

    instances.process(&locator).unwrap();
    mesh.process(&locator).unwrap();

    let linked = mesh.descriptor().instancing().unwrap();
    assert!(BufferDescriptor::same(&linked, &instances.descriptor()));
    assert_eq!(linked.count(), 16);

    let store = locator.store(0).unwrap().downcast::<InstanceTransform>().unwrap();
    assert!(store.data().iter().all(|t| t.world == Mat4::ZERO));
}

#[test]
fn test_add_request_type_mismatch_is_reported() {
    // Locator that always hands back the index store
    struct WrongLocator(ListLocator);
    impl StoreLocator for WrongLocator {
        fn logger(&self) -> Arc<dyn Logger> { self.0.logger() }
        fn find_compatible_store(&self, _key: &StoreKey) -> Option<usize> { Some(0) }
        fn add_store(&self, make: &mut dyn FnMut(usize) -> Arc<dyn AnyStore>) -> usize { self.0.add_store(make) }
        fn store(&self, index: usize) -> Result<Arc<dyn AnyStore>> { self.0.store(index) }
    }

    let locator = WrongLocator(ListLocator::default());
    AddRequest::indices("i", false, vec![1]).process(&locator.0).unwrap();

    let mut request = AddRequest::vertices("v", false, vec![vertex(0.0)]);
    let result = request.process(&locator);

    assert!(matches!(result, Err(Error::TypeMismatch { store_index: 0, .. })));
    assert_eq!(locator.0.logger.count(LogSeverity::Error), 1);
    assert!(!request.descriptor().is_ready());
}

// ============================================================================
// Remove request tests
// ============================================================================

#[test]
fn test_remove_request_removes_and_recompacts() {
    let locator = ListLocator::default();
    let mut a = AddRequest::indices("A", false, vec![0; 10]);
    let mut b = AddRequest::indices("B", false, vec![1; 5]);
    a.process(&locator).unwrap();
    b.process(&locator).unwrap();

    let mut remove = RemoveRequest::new(a.descriptor());
    assert_eq!(remove.action(), RequestAction::Remove);
    assert_eq!(remove.id(), "A");
    remove.process(&locator).unwrap();

    assert_eq!(remove.status(), RequestStatus::Processed);
    assert_eq!(b.descriptor().offset(), 0);
    assert_eq!(b.descriptor().count(), 5);
    assert_eq!(locator.store(0).unwrap().len(), 5);
    assert!(!a.descriptor().is_ready());
}

#[test]
fn test_remove_request_on_unallocated_descriptor_is_noop() {
    let locator = ListLocator::default();
    let pending = AddRequest::indices("later", false, vec![1, 2]);

    let mut remove = RemoveRequest::new(pending.descriptor());
    remove.process(&locator).unwrap();

    assert_eq!(remove.status(), RequestStatus::Processed);
    assert_eq!(locator.store_count(), 0);
}

#[test]
fn test_remove_request_twice_is_idempotent() {
    let locator = ListLocator::default();
    let mut a = AddRequest::indices("A", false, vec![0; 3]);
    a.process(&locator).unwrap();

    RemoveRequest::new(a.descriptor()).process(&locator).unwrap();
    RemoveRequest::new(a.descriptor()).process(&locator).unwrap();

    assert_eq!(locator.store(0).unwrap().len(), 0);
}

#[test]
fn test_requests_as_trait_objects() {
    let locator = ListLocator::default();
    let add: Box<dyn Request> = Box::new(AddRequest::indices("boxed", false, vec![4, 5]));
    let descriptor = add.descriptor();
    let mut queue: Vec<Box<dyn Request>> = vec![add, Box::new(RemoveRequest::new(descriptor.clone()))];

    for request in queue.iter_mut() {
        request.process(&locator).unwrap();
    }

    assert!(queue.iter().all(|r| r.status() == RequestStatus::Processed));
    assert!(!descriptor.is_ready());
    assert_eq!(locator.store(0).unwrap().descriptor_count(), 0);
}
