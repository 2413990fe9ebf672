//! Command pool management and one-shot command submission.
//!
//! # Overview
//!
//! - [`CommandPool`] wraps a VkCommandPool for a queue family and hands out
//!   primary command buffers
//! - [`submit_one_shot`] runs the canonical transient command sequence used
//!   by every upload and layout transition: allocate, begin ONE_TIME_SUBMIT,
//!   record, end, submit, wait for the queue to idle, free
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ember_rhi::command::{CommandPool, submit_one_shot};
//! use ember_rhi::device::Device;
//!
//! # fn example(device: Arc<Device>) -> Result<(), ember_rhi::RhiError> {
//! let pool = CommandPool::new(device.clone(), device.queue_families().graphics_family.unwrap())?;
//! submit_one_shot(&device, &pool, device.graphics_queue(), |_cmd| {
//!     // record transfer commands
//!     Ok(())
//! })?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Command pool for allocating command buffers.
pub struct CommandPool {
    device: Arc<Device>,
    pool: vk::CommandPool,
}

impl CommandPool {
    /// Creates a command pool for the given queue family.
    ///
    /// Buffers allocated from it can be reset individually.
    pub fn new(device: Arc<Device>, queue_family_index: u32) -> RhiResult<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);

        let pool = unsafe { device.handle().create_command_pool(&create_info, None)? };

        debug!("Command pool created for queue family {}", queue_family_index);

        Ok(Self { device, pool })
    }

    /// Returns the raw pool handle.
    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    /// Allocates `count` primary command buffers.
    pub fn allocate(&self, count: u32) -> RhiResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        let buffers = unsafe { self.device.handle().allocate_command_buffers(&alloc_info)? };
        Ok(buffers)
    }

    /// Returns command buffers to the pool.
    pub fn free(&self, buffers: &[vk::CommandBuffer]) {
        if buffers.is_empty() {
            return;
        }
        unsafe {
            self.device.handle().free_command_buffers(self.pool, buffers);
        }
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_command_pool(self.pool, None);
        }
        debug!("Command pool destroyed");
    }
}

/// Records and submits a transient command buffer, blocking until the queue
/// is idle.
///
/// This is the single path for staging copies, image transitions, and mipmap
/// blits. The buffer is freed on every exit path, including when recording
/// fails.
pub fn submit_one_shot<F>(
    device: &Device,
    pool: &CommandPool,
    queue: vk::Queue,
    record: F,
) -> RhiResult<()>
where
    F: FnOnce(vk::CommandBuffer) -> RhiResult<()>,
{
    let command_buffer = pool.allocate(1)?[0];

    let result = (|| {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe {
            device
                .handle()
                .begin_command_buffer(command_buffer, &begin_info)?;
        }

        record(command_buffer)?;

        unsafe {
            device.handle().end_command_buffer(command_buffer)?;

            let command_buffers = [command_buffer];
            let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
            device
                .handle()
                .queue_submit(queue, &[submit_info], vk::Fence::null())?;
            device.handle().queue_wait_idle(queue)?;
        }

        Ok(())
    })();

    pool.free(&[command_buffer]);
    result
}
