//! Buffers, their backing memory, and the staging upload path.
//!
//! [`BufferUsage`] names the buffer roles the engine uses and maps them to
//! Vulkan usage and memory-property flags. [`Buffer`] owns a `VkBuffer` and
//! its `VkDeviceMemory`; memory types are chosen through the device's
//! memory-property search.
//!
//! [`Buffer::device_local_with_data`] is the canonical upload path: a
//! host-visible staging buffer is filled, copied into a device-local
//! destination with a one-shot command buffer, and destroyed. Vertex
//! buffers, index buffers, and texture pixels all go through it.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::command::{CommandPool, submit_one_shot};
use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Buffer usage categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Vertex buffer (device-local)
    Vertex,
    /// Index buffer (device-local)
    Index,
    /// Uniform buffer (host-visible, persistently rewritten)
    Uniform,
    /// Staging buffer (host-visible transfer source)
    Staging,
}

impl BufferUsage {
    /// Converts to Vulkan buffer usage flags.
    pub fn to_vk_usage(self) -> vk::BufferUsageFlags {
        match self {
            BufferUsage::Vertex => {
                vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Index => {
                vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
            BufferUsage::Staging => vk::BufferUsageFlags::TRANSFER_SRC,
        }
    }

    /// Memory properties required for this usage.
    pub fn memory_properties(self) -> vk::MemoryPropertyFlags {
        match self {
            BufferUsage::Vertex | BufferUsage::Index => vk::MemoryPropertyFlags::DEVICE_LOCAL,
            BufferUsage::Uniform | BufferUsage::Staging => {
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT
            }
        }
    }

    /// Human-readable usage name.
    pub fn name(self) -> &'static str {
        match self {
            BufferUsage::Vertex => "vertex",
            BufferUsage::Index => "index",
            BufferUsage::Uniform => "uniform",
            BufferUsage::Staging => "staging",
        }
    }
}

/// A VkBuffer with exclusively owned backing memory.
pub struct Buffer {
    device: Arc<Device>,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
    usage: BufferUsage,
}

impl Buffer {
    /// Creates an empty buffer with the usage's default flags and memory
    /// properties.
    pub fn new(device: Arc<Device>, size: vk::DeviceSize, usage: BufferUsage) -> RhiResult<Self> {
        Self::with_flags(
            device,
            size,
            usage,
            usage.to_vk_usage(),
            usage.memory_properties(),
        )
    }

    /// Creates a buffer with explicit usage and memory-property flags.
    ///
    /// The memory type is resolved through the device's memory-property
    /// search; allocation fails with
    /// [`RhiError::NoSuitableMemoryType`] when nothing matches.
    pub fn with_flags(
        device: Arc<Device>,
        size: vk::DeviceSize,
        usage: BufferUsage,
        usage_flags: vk::BufferUsageFlags,
        memory_flags: vk::MemoryPropertyFlags,
    ) -> RhiResult<Self> {
        if size == 0 {
            return Err(RhiError::InvalidHandle(
                "Buffer size must be greater than 0".to_string(),
            ));
        }

        let create_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage_flags)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.handle().create_buffer(&create_info, None)? };

        let requirements = unsafe { device.handle().get_buffer_memory_requirements(buffer) };
        let memory_type = match device.find_memory_type(requirements.memory_type_bits, memory_flags)
        {
            Ok(index) => index,
            Err(e) => {
                // Release the buffer before propagating so the error path
                // leaks nothing
                unsafe { device.handle().destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        let alloc_info = vk::MemoryAllocateInfo::default()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type);

        let memory = match unsafe { device.handle().allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.handle().destroy_buffer(buffer, None) };
                return Err(e.into());
            }
        };

        unsafe {
            if let Err(e) = device.handle().bind_buffer_memory(buffer, memory, 0) {
                device.handle().destroy_buffer(buffer, None);
                device.handle().free_memory(memory, None);
                return Err(e.into());
            }
        }

        debug!("Created {} buffer ({} bytes)", usage.name(), size);

        Ok(Self {
            device,
            buffer,
            memory,
            size,
            usage,
        })
    }

    /// Creates a device-local buffer initialized from `data` via the staging
    /// path.
    ///
    /// # Arguments
    ///
    /// * `device` - Logical device the buffer lives on
    /// * `pool` - Command pool for the one-shot transfer
    /// * `data` - Bytes to upload
    /// * `usage` - Target usage; must be a device-local category
    pub fn device_local_with_data(
        device: Arc<Device>,
        pool: &CommandPool,
        data: &[u8],
        usage: BufferUsage,
    ) -> RhiResult<Self> {
        let size = data.len() as vk::DeviceSize;

        let staging = Buffer::new(device.clone(), size, BufferUsage::Staging)?;
        staging.write_data(data)?;

        let buffer = Buffer::new(device.clone(), size, usage)?;
        staging.copy_to(pool, &buffer)?;

        // `staging` drops here, freeing the transfer source
        Ok(buffer)
    }

    /// Writes `data` into a host-visible buffer via map/copy/unmap.
    ///
    /// # Errors
    ///
    /// Fails when the data does not fit or the memory cannot be mapped
    /// (non-host-visible buffers).
    pub fn write_data(&self, data: &[u8]) -> RhiResult<()> {
        if data.len() as vk::DeviceSize > self.size {
            return Err(RhiError::InvalidHandle(format!(
                "Write of {} bytes exceeds {} buffer of {} bytes",
                data.len(),
                self.usage.name(),
                self.size
            )));
        }

        unsafe {
            let ptr = self.device.handle().map_memory(
                self.memory,
                0,
                data.len() as vk::DeviceSize,
                vk::MemoryMapFlags::empty(),
            )?;
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.cast::<u8>(), data.len());
            self.device.handle().unmap_memory(self.memory);
        }

        Ok(())
    }

    /// Copies this buffer's full contents into `dst` with a one-shot command.
    pub fn copy_to(&self, pool: &CommandPool, dst: &Buffer) -> RhiResult<()> {
        let device = &self.device;
        submit_one_shot(device, pool, device.graphics_queue(), |cmd| {
            let region = vk::BufferCopy::default().size(self.size);
            unsafe {
                device
                    .handle()
                    .cmd_copy_buffer(cmd, self.buffer, dst.buffer, &[region]);
            }
            Ok(())
        })
    }

    /// Returns the raw buffer handle.
    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Returns the buffer size in bytes.
    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Returns the buffer's usage category.
    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_buffer(self.buffer, None);
            self.device.handle().free_memory(self.memory, None);
        }
        debug!("Destroyed {} buffer ({} bytes)", self.usage.name(), self.size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_to_vk_flags() {
        assert!(
            BufferUsage::Vertex
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST)
        );
        assert!(
            BufferUsage::Index
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST)
        );
        assert_eq!(
            BufferUsage::Uniform.to_vk_usage(),
            vk::BufferUsageFlags::UNIFORM_BUFFER
        );
        assert_eq!(
            BufferUsage::Staging.to_vk_usage(),
            vk::BufferUsageFlags::TRANSFER_SRC
        );
    }

    #[test]
    fn test_device_local_usages() {
        assert_eq!(
            BufferUsage::Vertex.memory_properties(),
            vk::MemoryPropertyFlags::DEVICE_LOCAL
        );
        assert_eq!(
            BufferUsage::Index.memory_properties(),
            vk::MemoryPropertyFlags::DEVICE_LOCAL
        );
    }

    #[test]
    fn test_host_visible_usages_are_coherent() {
        for usage in [BufferUsage::Uniform, BufferUsage::Staging] {
            assert!(
                usage
                    .memory_properties()
                    .contains(vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT)
            );
        }
    }
}
