//! Physical device selection.
//!
//! This module enumerates the physical devices exposed by the instance and
//! picks the first one that can drive the engine: it must support the
//! swapchain extension, present to the bound surface, and expose both a
//! graphics-capable and a present-capable queue family.
//!
//! Selection is deterministic: devices are considered in enumeration order
//! and the first qualifying device wins. If none qualify, selection fails
//! closed with [`RhiError::NoSuitableGpu`].

use std::ffi::CStr;

use ash::vk;
use tracing::{debug, info};

use crate::error::{RhiError, RhiResult};

/// Device extensions every selected GPU must support.
pub const REQUIRED_DEVICE_EXTENSIONS: &[&CStr] = &[ash::khr::swapchain::NAME];

/// Queue family indices for the queues the engine uses.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueFamilyIndices {
    /// Graphics queue family index
    pub graphics_family: Option<u32>,
    /// Present queue family index (may coincide with graphics)
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    /// Returns true when both required families were found.
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// Returns the deduplicated set of family indices.
    ///
    /// When graphics and present share a family, one queue is created and
    /// shared; when they differ, the swapchain uses concurrent sharing.
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families = Vec::new();
        if let Some(graphics) = self.graphics_family {
            families.push(graphics);
        }
        if let Some(present) = self.present_family
            && !families.contains(&present)
        {
            families.push(present);
        }
        families
    }
}

/// Information about a selected physical device.
pub struct PhysicalDeviceInfo {
    /// The physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties (name, limits, etc.)
    pub properties: vk::PhysicalDeviceProperties,
    /// Supported device features
    pub features: vk::PhysicalDeviceFeatures,
    /// Memory heap and type layout
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Queue families found on this device
    pub queue_families: QueueFamilyIndices,
}

impl PhysicalDeviceInfo {
    /// The driver-reported device name, for logs.
    pub fn device_name(&self) -> String {
        let name = unsafe { CStr::from_ptr(self.properties.device_name.as_ptr()) };
        name.to_string_lossy().into_owned()
    }
}

/// Selects the first enumerated physical device that satisfies the
/// engine's requirements: graphics and present queue families, the
/// swapchain extension, an adequate surface, and sampler anisotropy.
///
/// Taking the first qualifying device in enumeration order keeps selection
/// deterministic across runs.
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableGpu`] when no device qualifies.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> RhiResult<PhysicalDeviceInfo> {
    let devices = unsafe { instance.enumerate_physical_devices()? };

    if devices.is_empty() {
        return Err(RhiError::NoSuitableGpu);
    }

    debug!("Found {} physical device(s)", devices.len());

    // First qualifying device in enumeration order wins
    for device in devices {
        if let Some(info) = check_device_suitability(instance, device, surface, surface_loader)? {
            info!("Selected GPU: {}", info.device_name());
            return Ok(info);
        }
    }

    Err(RhiError::NoSuitableGpu)
}

/// Checks whether a device qualifies, returning its info when it does.
///
/// A device qualifies when it supports all required extensions, reports at
/// least one surface format and one present mode for the surface, and has a
/// complete queue family set.
fn check_device_suitability(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> RhiResult<Option<PhysicalDeviceInfo>> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) };

    if !check_extension_support(instance, device)? {
        debug!("Device rejected (missing extensions): {:?}", name);
        return Ok(None);
    }

    // The surface must report at least one format and one present mode,
    // otherwise no swapchain can be built against it
    let formats = unsafe { surface_loader.get_physical_device_surface_formats(device, surface)? };
    let present_modes =
        unsafe { surface_loader.get_physical_device_surface_present_modes(device, surface)? };
    if formats.is_empty() || present_modes.is_empty() {
        debug!("Device rejected (inadequate surface support): {:?}", name);
        return Ok(None);
    }

    let queue_families = find_queue_families(instance, device, surface, surface_loader)?;
    if !queue_families.is_complete() {
        debug!("Device rejected (incomplete queue families): {:?}", name);
        return Ok(None);
    }

    let features = unsafe { instance.get_physical_device_features(device) };
    let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };

    Ok(Some(PhysicalDeviceInfo {
        device,
        properties,
        features,
        memory_properties,
        queue_families,
    }))
}

/// Checks whether the device supports all required extensions.
fn check_extension_support(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
) -> RhiResult<bool> {
    let available = unsafe { instance.enumerate_device_extension_properties(device)? };

    let supported = REQUIRED_DEVICE_EXTENSIONS.iter().all(|required| {
        available.iter().any(|ext| {
            let name = unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) };
            name == *required
        })
    });

    Ok(supported)
}

/// Finds the graphics and present queue families for a device.
fn find_queue_families(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> RhiResult<QueueFamilyIndices> {
    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };

    let mut indices = QueueFamilyIndices::default();

    for (i, family) in families.iter().enumerate() {
        let index = i as u32;

        if indices.graphics_family.is_none()
            && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
        {
            indices.graphics_family = Some(index);
        }

        if indices.present_family.is_none() {
            let present_support = unsafe {
                surface_loader.get_physical_device_surface_support(device, index, surface)?
            };
            if present_support {
                indices.present_family = Some(index);
            }
        }

        if indices.is_complete() {
            break;
        }
    }

    Ok(indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incomplete_indices() {
        let indices = QueueFamilyIndices::default();
        assert!(!indices.is_complete());

        let graphics_only = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: None,
        };
        assert!(!graphics_only.is_complete());
    }

    #[test]
    fn test_complete_indices() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(1),
        };
        assert!(indices.is_complete());
    }

    #[test]
    fn test_unique_families_deduplicates_shared_family() {
        let shared = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(0),
        };
        assert_eq!(shared.unique_families(), vec![0]);
    }

    #[test]
    fn test_unique_families_keeps_distinct_families() {
        let distinct = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(2),
        };
        assert_eq!(distinct.unique_families(), vec![0, 2]);
    }

    #[test]
    fn test_required_extensions_include_swapchain() {
        assert!(REQUIRED_DEVICE_EXTENSIONS.contains(&ash::khr::swapchain::NAME));
    }
}
