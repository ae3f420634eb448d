/// Graphics device module - the GPU collaborator consumed by the buffer system

// Module declarations
pub mod graphics_device;
pub mod buffer;
pub mod vertex;

// Re-export everything from graphics_device.rs
pub use graphics_device::*;

// Re-export from other modules
pub use buffer::*;
pub use vertex::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
