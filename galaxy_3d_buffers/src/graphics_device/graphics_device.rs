/// GraphicsDevice trait - buffer factory consumed by the build pass

use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{Buffer, BufferDesc};

/// Graphics device trait
///
/// The only GPU entry point the buffer system needs. Implemented by
/// backend-specific devices (Vulkan, wgpu, ...).
///
/// `create_buffer` is called exclusively from
/// `BufferManager::allocate_dirty`, never while requests add or remove data.
pub trait GraphicsDevice: Send + Sync {
    /// Create a buffer initialized with `desc.data`
    ///
    /// # Arguments
    ///
    /// * `desc` - Buffer descriptor (name, usage, dynamic flag, contents)
    ///
    /// # Returns
    ///
    /// A shared pointer to the created buffer
    fn create_buffer(&mut self, desc: BufferDesc<'_>) -> Result<Arc<dyn Buffer>>;
}
