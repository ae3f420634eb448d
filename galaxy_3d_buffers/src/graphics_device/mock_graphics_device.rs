/// Mock GraphicsDevice for unit tests (no GPU required)
///
/// Records every buffer it creates and every partial update it receives so
/// tests can check what the build pass sent to the GPU.

use std::sync::{Arc, Mutex};
use crate::error::{Error, Result};
use crate::graphics_device::{Buffer, BufferDesc, BufferUsage, GraphicsDevice};

// ============================================================================
// Mock Buffer
// ============================================================================

#[derive(Debug)]
pub struct MockBuffer {
    pub name: String,
    pub usage: BufferUsage,
    pub dynamic: bool,
    pub contents: Mutex<Vec<u8>>,
    pub updates: Mutex<Vec<(u64, usize)>>,
}

impl MockBuffer {
    pub fn new(desc: &BufferDesc<'_>) -> Self {
        Self {
            name: desc.name.clone(),
            usage: desc.usage,
            dynamic: desc.dynamic,
            contents: Mutex::new(desc.data.to_vec()),
            updates: Mutex::new(Vec::new()),
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        self.contents.lock().unwrap().clone()
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }
}

impl Buffer for MockBuffer {
    fn size(&self) -> u64 {
        self.contents.lock().unwrap().len() as u64
    }

    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        let mut contents = self.contents.lock().unwrap();
        let start = offset as usize;
        let end = start + data.len();
        if end > contents.len() {
            return Err(Error::InvalidResource(format!(
                "update [{}, {}) exceeds buffer '{}' of {} bytes",
                start, end, self.name, contents.len()
            )));
        }
        contents[start..end].copy_from_slice(data);
        self.updates.lock().unwrap().push((offset, data.len()));
        Ok(())
    }
}

// ============================================================================
// Mock GraphicsDevice
// ============================================================================

/// Mock graphics device
#[derive(Default)]
pub struct MockGraphicsDevice {
    /// Every buffer created, in creation order
    pub created_buffers: Vec<Arc<MockBuffer>>,
    /// When set, the next create_buffer call fails with OutOfMemory
    pub fail_next: bool,
}

impl MockGraphicsDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of created buffers
    pub fn created_buffer_names(&self) -> Vec<String> {
        self.created_buffers.iter().map(|b| b.name.clone()).collect()
    }

    /// Most recently created buffer with the given name
    pub fn buffer(&self, name: &str) -> Option<Arc<MockBuffer>> {
        self.created_buffers.iter().rev().find(|b| b.name == name).cloned()
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn create_buffer(&mut self, desc: BufferDesc<'_>) -> Result<Arc<dyn Buffer>> {
        if self.fail_next {
            self.fail_next = false;
            return Err(Error::OutOfMemory);
        }
        let buffer = Arc::new(MockBuffer::new(&desc));
        self.created_buffers.push(buffer.clone());
        Ok(buffer)
    }
}
