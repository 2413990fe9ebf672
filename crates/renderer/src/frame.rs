//! Frame-slot scheduling and per-image fence tracking.
//!
//! The scheduler owns a fixed set of frame slots (fence plus two
//! semaphores each) that survive every swapchain rebuild, and a per-image
//! fence table that prevents two in-flight frames from writing the same
//! swapchain image. Only the table is resized when the image count changes.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use ember_rhi::RhiResult;
use ember_rhi::device::Device;
use ember_rhi::sync::{FrameSync, MAX_FRAMES_IN_FLIGHT};

/// Tracks which frame slot's fence last submitted work against each
/// swapchain image.
///
/// A null entry means the image has never been used since the last rebuild.
/// Before a new submission targets image `i`, the caller must wait on
/// `fence_to_wait(i)`; this guarantees that for any two submissions S1
/// before S2 on the same image, S2 observed S1's fence signaled.
#[derive(Debug, Default)]
pub struct ImageFenceTable {
    fences: Vec<vk::Fence>,
}

impl ImageFenceTable {
    /// Creates a table for `image_count` swapchain images, all unused.
    pub fn new(image_count: usize) -> Self {
        Self {
            fences: vec![vk::Fence::null(); image_count],
        }
    }

    /// Resets the table for a new image count (after a swapchain rebuild).
    pub fn resize(&mut self, image_count: usize) {
        self.fences.clear();
        self.fences.resize(image_count, vk::Fence::null());
    }

    /// Returns the fence guarding `image_index`, if any submission has used
    /// the image since the last rebuild.
    pub fn fence_to_wait(&self, image_index: u32) -> Option<vk::Fence> {
        let fence = self.fences[image_index as usize];
        (fence != vk::Fence::null()).then_some(fence)
    }

    /// Records `fence` as the guard for `image_index`.
    pub fn assign(&mut self, image_index: u32, fence: vk::Fence) {
        self.fences[image_index as usize] = fence;
    }

    /// Number of tracked images.
    pub fn len(&self) -> usize {
        self.fences.len()
    }

    /// True when the table tracks no images.
    pub fn is_empty(&self) -> bool {
        self.fences.is_empty()
    }
}

/// Cycles through the frame slots and enforces the per-image fence rule.
pub struct FrameScheduler {
    device: Arc<Device>,
    frames: Vec<FrameSync>,
    images_in_flight: ImageFenceTable,
    current_frame: usize,
}

impl FrameScheduler {
    /// Creates the frame slots and an image table of `image_count` entries.
    pub fn new(device: Arc<Device>, image_count: usize) -> RhiResult<Self> {
        let frames = (0..MAX_FRAMES_IN_FLIGHT)
            .map(|_| FrameSync::new(device.clone()))
            .collect::<RhiResult<Vec<_>>>()?;

        debug!(
            "Frame scheduler created: {} slots, {} images",
            frames.len(),
            image_count
        );

        Ok(Self {
            device,
            frames,
            images_in_flight: ImageFenceTable::new(image_count),
            current_frame: 0,
        })
    }

    /// Index of the current frame slot.
    #[inline]
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// The current slot's image-available semaphore.
    #[inline]
    pub fn image_available_handle(&self) -> vk::Semaphore {
        self.frames[self.current_frame].image_available_handle()
    }

    /// The current slot's render-finished semaphore.
    #[inline]
    pub fn render_finished_handle(&self) -> vk::Semaphore {
        self.frames[self.current_frame].render_finished_handle()
    }

    /// The current slot's in-flight fence handle.
    #[inline]
    pub fn in_flight_fence_handle(&self) -> vk::Fence {
        self.frames[self.current_frame].in_flight_fence().handle()
    }

    /// Blocks until the current slot's previous submission has retired.
    pub fn wait_for_current(&self) -> RhiResult<()> {
        self.frames[self.current_frame].in_flight_fence().wait()
    }

    /// Resets the current slot's fence ahead of a new submission.
    pub fn reset_current(&self) -> RhiResult<()> {
        self.frames[self.current_frame].in_flight_fence().reset()
    }

    /// Waits for any in-flight use of `image_index` and claims the image for
    /// the current slot.
    pub fn claim_image(&mut self, image_index: u32) -> RhiResult<()> {
        if let Some(fence) = self.images_in_flight.fence_to_wait(image_index) {
            unsafe {
                self.device
                    .handle()
                    .wait_for_fences(&[fence], true, u64::MAX)?;
            }
        }
        self.images_in_flight
            .assign(image_index, self.in_flight_fence_handle());
        Ok(())
    }

    /// Resets the per-image table after a swapchain rebuild. Frame slots are
    /// untouched.
    pub fn reset_image_table(&mut self, image_count: usize) {
        self.images_in_flight.resize(image_count);
    }

    /// Advances to the next frame slot.
    pub fn advance(&mut self) {
        self.current_frame = (self.current_frame + 1) % MAX_FRAMES_IN_FLIGHT;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    fn fence(raw: u64) -> vk::Fence {
        vk::Fence::from_raw(raw)
    }

    #[test]
    fn test_fresh_table_has_no_waits() {
        let table = ImageFenceTable::new(3);
        assert_eq!(table.len(), 3);
        for i in 0..3 {
            assert_eq!(table.fence_to_wait(i), None);
        }
    }

    #[test]
    fn test_assigned_fence_must_be_waited_on() {
        let mut table = ImageFenceTable::new(2);
        table.assign(1, fence(0xA));

        assert_eq!(table.fence_to_wait(0), None);
        assert_eq!(table.fence_to_wait(1), Some(fence(0xA)));
    }

    #[test]
    fn test_reassignment_replaces_guard() {
        // S1 submits on image 0, then S2 claims it: the next user must wait
        // on S2's fence, not S1's
        let mut table = ImageFenceTable::new(1);
        table.assign(0, fence(0x1));
        assert_eq!(table.fence_to_wait(0), Some(fence(0x1)));

        table.assign(0, fence(0x2));
        assert_eq!(table.fence_to_wait(0), Some(fence(0x2)));
    }

    #[test]
    fn test_resize_clears_guards() {
        let mut table = ImageFenceTable::new(2);
        table.assign(0, fence(0x1));
        table.assign(1, fence(0x2));

        table.resize(4);
        assert_eq!(table.len(), 4);
        for i in 0..4 {
            assert_eq!(table.fence_to_wait(i), None);
        }
    }
}
