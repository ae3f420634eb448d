/*!
# Galaxy 3D Buffers

Shared GPU buffer sub-allocation for the Galaxy 3D engine.

Meshes, index lists and instance blocks are packed into a handful of large
GPU buffers instead of one buffer each. Every allocation is described by a
`BufferDescriptor` (store index, element offset, element count) that stays
valid while other allocations come and go around it.

## Architecture

- **BufferStore**: One shared, growable element collection per compatible type
- **BufferDescriptor**: Handle on one allocation inside a store
- **AddRequest / RemoveRequest**: Deferred mutations, processed on any thread
- **BufferManager**: Store registry, request queue and GPU build pass
- **RequestWorker**: Thread pool processing requests off the render thread
- **GraphicsDevice**: Backend trait the build pass creates GPU buffers with

Backend implementations provide concrete types that implement `GraphicsDevice`
and `Buffer`.
*/

// Internal modules
mod error;
pub mod log;
pub mod graphics_device;
pub mod buffer;

// Main galaxy3d namespace module
pub mod galaxy3d {
    // Error types
    pub use crate::error::{Error, Result};

    // Buffer manager and requests
    pub use crate::buffer::{BufferManager, BufferManagerConfig};

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{
            Logger, LogEntry, LogSeverity, DefaultLogger,
            NullLogger, MemoryLogger, SeverityFilter,
        };
    }

    // Shared buffer sub-module
    pub mod buffer {
        pub use crate::buffer::*;
    }

    // Graphics device sub-module
    pub mod device {
        pub use crate::graphics_device::*;
    }
}

// Re-export math library at crate root
pub use glam;
