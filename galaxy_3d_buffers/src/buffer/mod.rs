//! Shared buffer module
//!
//! Sub-allocates many small vertex, index and instance blocks inside a few
//! large GPU buffers, one per compatible element type.

pub mod descriptor;
pub mod store;
pub mod request;
pub mod manager;
pub mod worker;

pub use descriptor::{BufferDescriptor, BufferKind, DescriptorState};
pub use store::{
    AnyStore, BufferStore, BuildOutcome, StoreElement, StoreKey,
    VertexStore, IndexStore, InstanceStore,
};
pub use request::{
    Request, RequestAction, RequestStatus, StoreLocator,
    AddRequest, AddVerticesRequest, AddIndicesRequest, AddInstancingRequest,
    RemoveRequest,
};
pub use manager::{AllocationReport, BufferManager, BufferManagerConfig, BufferStats};
pub use worker::{process_async, RequestTicket, RequestWorker};
