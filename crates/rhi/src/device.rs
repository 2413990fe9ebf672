//! Logical device management.
//!
//! This module creates the logical device and exposes the queues and
//! device-level queries the rest of the engine needs.
//!
//! # Overview
//!
//! - [`Device`] wraps the VkDevice along with its graphics/present queues
//! - [`find_memory_type`] performs the memory-property search used by every
//!   buffer and image allocation
//! - [`find_supported_format`] picks the first format with the requested
//!   tiling features (used for the depth attachment)
//! - [`max_usable_sample_count`] returns the highest MSAA sample count the
//!   device supports for both color and depth attachments
//!
//! # Example
//!
//! ```no_run
//! use ember_rhi::device::Device;
//! use ember_rhi::instance::Instance;
//! use ember_rhi::physical_device::PhysicalDeviceInfo;
//!
//! # fn example(instance: &Instance, info: &PhysicalDeviceInfo) -> Result<(), ember_rhi::RhiError> {
//! let device = Device::new(instance, info)?;
//! let graphics_queue = device.graphics_queue();
//! device.wait_idle()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;
use crate::physical_device::{PhysicalDeviceInfo, QueueFamilyIndices, REQUIRED_DEVICE_EXTENSIONS};

/// Logical device wrapper.
///
/// Owns the VkDevice and its queues. Shared across the engine behind an
/// [`Arc`]; every GPU object holds a clone so the device outlives them all.
pub struct Device {
    device: ash::Device,
    physical_device: vk::PhysicalDevice,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    properties: vk::PhysicalDeviceProperties,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    queue_families: QueueFamilyIndices,
}

impl Device {
    /// Creates the logical device with one queue per distinct queue family.
    ///
    /// Graphics and present families are deduplicated when they coincide.
    /// The `sampler_anisotropy` feature is enabled for texture filtering.
    ///
    /// # Errors
    ///
    /// Returns an error if logical device creation is rejected by the driver.
    pub fn new(instance: &Instance, info: &PhysicalDeviceInfo) -> RhiResult<Arc<Self>> {
        let queue_priorities = [1.0f32];

        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = info
            .queue_families
            .unique_families()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
            })
            .collect();

        let extension_names: Vec<*const i8> = REQUIRED_DEVICE_EXTENSIONS
            .iter()
            .map(|ext| ext.as_ptr())
            .collect();

        let features = vk::PhysicalDeviceFeatures::default().sampler_anisotropy(true);

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features);

        let device = unsafe {
            instance
                .handle()
                .create_device(info.device, &create_info, None)?
        };

        let graphics_family = info
            .queue_families
            .graphics_family
            .ok_or(RhiError::NoSuitableGpu)?;
        let present_family = info
            .queue_families
            .present_family
            .ok_or(RhiError::NoSuitableGpu)?;

        let graphics_queue = unsafe { device.get_device_queue(graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(present_family, 0) };

        info!(
            "Logical device created (graphics family {}, present family {})",
            graphics_family, present_family
        );

        Ok(Arc::new(Self {
            device,
            physical_device: info.device,
            memory_properties: info.memory_properties,
            properties: info.properties,
            graphics_queue,
            present_queue,
            queue_families: info.queue_families,
        }))
    }

    /// Returns the raw device handle.
    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    /// Returns the physical device handle.
    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Returns the physical device's memory properties.
    #[inline]
    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    /// Returns the physical device properties.
    #[inline]
    pub fn properties(&self) -> &vk::PhysicalDeviceProperties {
        &self.properties
    }

    /// Returns the graphics queue.
    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Returns the present queue.
    #[inline]
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Returns the queue family indices.
    #[inline]
    pub fn queue_families(&self) -> QueueFamilyIndices {
        self.queue_families
    }

    /// Blocks until the device is idle.
    pub fn wait_idle(&self) -> RhiResult<()> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }

    /// Finds a memory type index satisfying the filter and properties.
    ///
    /// Convenience wrapper over [`find_memory_type`] using this device's
    /// memory properties.
    pub fn find_memory_type(
        &self,
        type_filter: u32,
        properties: vk::MemoryPropertyFlags,
    ) -> RhiResult<u32> {
        find_memory_type(&self.memory_properties, type_filter, properties)
    }

    /// Finds the first candidate format supporting `features` with `tiling`.
    pub fn find_supported_format(
        &self,
        instance: &ash::Instance,
        candidates: &[vk::Format],
        tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    ) -> RhiResult<vk::Format> {
        for &format in candidates {
            let props = unsafe {
                instance.get_physical_device_format_properties(self.physical_device, format)
            };
            let supported = match tiling {
                vk::ImageTiling::LINEAR => props.linear_tiling_features.contains(features),
                _ => props.optimal_tiling_features.contains(features),
            };
            if supported {
                return Ok(format);
            }
        }
        Err(RhiError::UnsupportedFormat(format!("{:?}", candidates)))
    }

    /// Returns the highest sample count usable for color and depth attachments.
    pub fn max_usable_sample_count(&self) -> vk::SampleCountFlags {
        max_usable_sample_count(&self.properties)
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            // All submitted work must retire before the device goes away
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}

// SAFETY: The device handle and queues are externally synchronized by the
// engine; all mutation goes through &self methods that wrap thread-safe
// Vulkan entry points.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}

/// Finds the first memory type index whose filter bit is set and whose
/// property flags are a superset of `properties`.
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableMemoryType`] when no type among the filter
/// bits satisfies the requested properties. Callers must treat this as fatal
/// for the allocation; there is no fallback type.
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> RhiResult<u32> {
    for i in 0..memory_properties.memory_type_count {
        let type_matches = (type_filter & (1 << i)) != 0;
        let props_match = memory_properties.memory_types[i as usize]
            .property_flags
            .contains(properties);
        if type_matches && props_match {
            return Ok(i);
        }
    }
    Err(RhiError::NoSuitableMemoryType {
        type_filter,
        properties,
    })
}

/// Returns the highest sample count supported by both the color and depth
/// framebuffer limits.
pub fn max_usable_sample_count(
    properties: &vk::PhysicalDeviceProperties,
) -> vk::SampleCountFlags {
    let counts = properties.limits.framebuffer_color_sample_counts
        & properties.limits.framebuffer_depth_sample_counts;

    for candidate in [
        vk::SampleCountFlags::TYPE_64,
        vk::SampleCountFlags::TYPE_32,
        vk::SampleCountFlags::TYPE_16,
        vk::SampleCountFlags::TYPE_8,
        vk::SampleCountFlags::TYPE_4,
        vk::SampleCountFlags::TYPE_2,
    ] {
        if counts.contains(candidate) {
            return candidate;
        }
    }

    vk::SampleCountFlags::TYPE_1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_properties(
        types: &[(vk::MemoryPropertyFlags, u32)],
    ) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties::default();
        props.memory_type_count = types.len() as u32;
        for (i, &(flags, heap)) in types.iter().enumerate() {
            props.memory_types[i] = vk::MemoryType {
                property_flags: flags,
                heap_index: heap,
            };
        }
        props
    }

    #[test]
    fn test_find_memory_type_picks_first_match() {
        let props = memory_properties(&[
            (vk::MemoryPropertyFlags::DEVICE_LOCAL, 0),
            (
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
                1,
            ),
        ]);

        let index = find_memory_type(
            &props,
            0b11,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )
        .unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn test_find_memory_type_respects_filter_bits() {
        let props = memory_properties(&[
            (vk::MemoryPropertyFlags::DEVICE_LOCAL, 0),
            (vk::MemoryPropertyFlags::DEVICE_LOCAL, 0),
        ]);

        // Type 0 matches the properties but is excluded by the filter
        let index =
            find_memory_type(&props, 0b10, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn test_find_memory_type_result_is_superset() {
        let props = memory_properties(&[
            (vk::MemoryPropertyFlags::HOST_VISIBLE, 0),
            (
                vk::MemoryPropertyFlags::HOST_VISIBLE
                    | vk::MemoryPropertyFlags::HOST_COHERENT
                    | vk::MemoryPropertyFlags::HOST_CACHED,
                0,
            ),
        ]);

        let requested =
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        let index = find_memory_type(&props, 0b11, requested).unwrap();
        assert!(
            props.memory_types[index as usize]
                .property_flags
                .contains(requested)
        );
    }

    #[test]
    fn test_find_memory_type_fails_closed() {
        let props = memory_properties(&[(vk::MemoryPropertyFlags::DEVICE_LOCAL, 0)]);

        let result = find_memory_type(&props, 0b1, vk::MemoryPropertyFlags::HOST_VISIBLE);
        assert!(matches!(
            result,
            Err(RhiError::NoSuitableMemoryType { .. })
        ));
    }

    fn properties_with_sample_counts(
        color: vk::SampleCountFlags,
        depth: vk::SampleCountFlags,
    ) -> vk::PhysicalDeviceProperties {
        let mut props = vk::PhysicalDeviceProperties::default();
        props.limits.framebuffer_color_sample_counts = color;
        props.limits.framebuffer_depth_sample_counts = depth;
        props
    }

    #[test]
    fn test_max_sample_count_limited_by_depth() {
        let all = vk::SampleCountFlags::TYPE_1
            | vk::SampleCountFlags::TYPE_2
            | vk::SampleCountFlags::TYPE_4
            | vk::SampleCountFlags::TYPE_8;
        let props = properties_with_sample_counts(
            all,
            vk::SampleCountFlags::TYPE_1 | vk::SampleCountFlags::TYPE_4,
        );
        assert_eq!(max_usable_sample_count(&props), vk::SampleCountFlags::TYPE_4);
    }

    #[test]
    fn test_max_sample_count_falls_back_to_one() {
        let props = properties_with_sample_counts(
            vk::SampleCountFlags::TYPE_1,
            vk::SampleCountFlags::TYPE_1,
        );
        assert_eq!(max_usable_sample_count(&props), vk::SampleCountFlags::TYPE_1);
    }

    #[test]
    fn test_device_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Device>();
        assert_sync::<Device>();
    }
}
