//! Image management.
//!
//! This module wraps VkImage creation with explicit mip level and sample
//! counts, layout transitions, buffer-to-image copies, and mipmap generation
//! via repeated half-resolution blits.
//!
//! # Overview
//!
//! - [`Image`] owns a VkImage, its memory, and a single view
//! - [`Image::transition_layout`] covers the transitions the engine needs;
//!   anything else is rejected as a programmer error
//! - [`Image::generate_mipmaps`] fills the mip chain on the GPU, failing
//!   fast when the format cannot be blitted with linear filtering
//! - [`mip_level_count`] computes the full-chain level count from the base
//!   dimensions
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ember_rhi::device::Device;
//! use ember_rhi::image::{Image, ImageDesc, mip_level_count};
//! use ash::vk;
//!
//! # fn example(device: Arc<Device>) -> Result<(), ember_rhi::RhiError> {
//! let desc = ImageDesc {
//!     width: 512,
//!     height: 512,
//!     mip_levels: mip_level_count(512, 512),
//!     samples: vk::SampleCountFlags::TYPE_1,
//!     format: vk::Format::R8G8B8A8_SRGB,
//!     tiling: vk::ImageTiling::OPTIMAL,
//!     usage: vk::ImageUsageFlags::TRANSFER_SRC
//!         | vk::ImageUsageFlags::TRANSFER_DST
//!         | vk::ImageUsageFlags::SAMPLED,
//!     aspect: vk::ImageAspectFlags::COLOR,
//! };
//! let texture = Image::new(device, &desc)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::command::{CommandPool, submit_one_shot};
use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Returns the number of mip levels for a full chain over the given base
/// dimensions: `floor(log2(max(width, height))) + 1`.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    let largest = width.max(height).max(1);
    u32::BITS - largest.leading_zeros()
}

/// Creation parameters for a 2-D image.
#[derive(Debug, Clone, Copy)]
pub struct ImageDesc {
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub samples: vk::SampleCountFlags,
    pub format: vk::Format,
    pub tiling: vk::ImageTiling,
    pub usage: vk::ImageUsageFlags,
    pub aspect: vk::ImageAspectFlags,
}

/// A 2-D VkImage with exclusively owned memory and one view.
pub struct Image {
    device: Arc<Device>,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
    format: vk::Format,
    extent: vk::Extent2D,
    mip_levels: u32,
    aspect: vk::ImageAspectFlags,
}

impl Image {
    /// Creates a device-local image and its view.
    ///
    /// # Errors
    ///
    /// Fails on zero dimensions, when no device-local memory type matches,
    /// or on any Vulkan creation failure. Error paths release everything
    /// created so far.
    pub fn new(device: Arc<Device>, desc: &ImageDesc) -> RhiResult<Self> {
        if desc.width == 0 || desc.height == 0 {
            return Err(RhiError::InvalidHandle(
                "Image dimensions must be greater than 0".to_string(),
            ));
        }

        let create_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(desc.format)
            .extent(vk::Extent3D {
                width: desc.width,
                height: desc.height,
                depth: 1,
            })
            .mip_levels(desc.mip_levels)
            .array_layers(1)
            .samples(desc.samples)
            .tiling(desc.tiling)
            .usage(desc.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { device.handle().create_image(&create_info, None)? };

        let requirements = unsafe { device.handle().get_image_memory_requirements(image) };
        let memory_type = match device.find_memory_type(
            requirements.memory_type_bits,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ) {
            Ok(index) => index,
            Err(e) => {
                unsafe { device.handle().destroy_image(image, None) };
                return Err(e);
            }
        };

        let alloc_info = vk::MemoryAllocateInfo::default()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type);

        let memory = match unsafe { device.handle().allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.handle().destroy_image(image, None) };
                return Err(e.into());
            }
        };

        unsafe {
            if let Err(e) = device.handle().bind_image_memory(image, memory, 0) {
                device.handle().destroy_image(image, None);
                device.handle().free_memory(memory, None);
                return Err(e.into());
            }
        }

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(desc.format)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(desc.aspect)
                    .base_mip_level(0)
                    .level_count(desc.mip_levels)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        let view = match unsafe { device.handle().create_image_view(&view_info, None) } {
            Ok(view) => view,
            Err(e) => {
                unsafe {
                    device.handle().destroy_image(image, None);
                    device.handle().free_memory(memory, None);
                }
                return Err(e.into());
            }
        };

        debug!(
            "Created image {}x{} ({:?}, {} mips, {:?})",
            desc.width, desc.height, desc.format, desc.mip_levels, desc.samples
        );

        Ok(Self {
            device,
            image,
            memory,
            view,
            format: desc.format,
            extent: vk::Extent2D {
                width: desc.width,
                height: desc.height,
            },
            mip_levels: desc.mip_levels,
            aspect: desc.aspect,
        })
    }

    /// Returns the raw image handle.
    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    /// Returns the image view handle.
    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Returns the image format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Returns the image extent.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Returns the mip level count.
    #[inline]
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    /// Transitions all mip levels between two layouts with a one-shot
    /// barrier.
    ///
    /// Supported transitions: UNDEFINED to TRANSFER_DST, TRANSFER_DST to
    /// SHADER_READ_ONLY, UNDEFINED to DEPTH_STENCIL_ATTACHMENT. Any other
    /// request fails with [`RhiError::UnsupportedLayoutTransition`].
    pub fn transition_layout(
        &self,
        pool: &CommandPool,
        from: vk::ImageLayout,
        to: vk::ImageLayout,
    ) -> RhiResult<()> {
        let (src_access, dst_access, src_stage, dst_stage) = match (from, to) {
            (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => (
                vk::AccessFlags::empty(),
                vk::AccessFlags::TRANSFER_WRITE,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::TRANSFER,
            ),
            (
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            ) => (
                vk::AccessFlags::TRANSFER_WRITE,
                vk::AccessFlags::SHADER_READ,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
            ),
            (
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            ) => (
                vk::AccessFlags::empty(),
                vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                    | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            ),
            _ => return Err(RhiError::UnsupportedLayoutTransition { from, to }),
        };

        let device = &self.device;
        submit_one_shot(device, pool, device.graphics_queue(), |cmd| {
            let barrier = vk::ImageMemoryBarrier::default()
                .old_layout(from)
                .new_layout(to)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(self.image)
                .subresource_range(
                    vk::ImageSubresourceRange::default()
                        .aspect_mask(self.aspect)
                        .base_mip_level(0)
                        .level_count(self.mip_levels)
                        .base_array_layer(0)
                        .layer_count(1),
                )
                .src_access_mask(src_access)
                .dst_access_mask(dst_access);

            unsafe {
                device.handle().cmd_pipeline_barrier(
                    cmd,
                    src_stage,
                    dst_stage,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[barrier],
                );
            }
            Ok(())
        })
    }

    /// Copies tightly packed pixel data from a buffer into mip level 0.
    ///
    /// The image must be in TRANSFER_DST layout.
    pub fn copy_from_buffer(&self, pool: &CommandPool, buffer: vk::Buffer) -> RhiResult<()> {
        let device = &self.device;
        submit_one_shot(device, pool, device.graphics_queue(), |cmd| {
            let region = vk::BufferImageCopy::default()
                .buffer_offset(0)
                .buffer_row_length(0)
                .buffer_image_height(0)
                .image_subresource(
                    vk::ImageSubresourceLayers::default()
                        .aspect_mask(vk::ImageAspectFlags::COLOR)
                        .mip_level(0)
                        .base_array_layer(0)
                        .layer_count(1),
                )
                .image_offset(vk::Offset3D::default())
                .image_extent(vk::Extent3D {
                    width: self.extent.width,
                    height: self.extent.height,
                    depth: 1,
                });

            unsafe {
                device.handle().cmd_copy_buffer_to_image(
                    cmd,
                    buffer,
                    self.image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[region],
                );
            }
            Ok(())
        })
    }

    /// Generates the full mip chain by blitting each level into the next at
    /// half resolution.
    ///
    /// The image must be in TRANSFER_DST layout across all levels; on return
    /// every level is in SHADER_READ_ONLY layout.
    ///
    /// # Errors
    ///
    /// Fails with [`RhiError::UnsupportedBlit`] when the format does not
    /// support linear blit filtering on this device.
    pub fn generate_mipmaps(&self, instance: &ash::Instance, pool: &CommandPool) -> RhiResult<()> {
        let format_properties = unsafe {
            instance.get_physical_device_format_properties(
                self.device.physical_device(),
                self.format,
            )
        };
        if !format_properties
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR)
        {
            return Err(RhiError::UnsupportedBlit(self.format));
        }

        let device = &self.device;
        submit_one_shot(device, pool, device.graphics_queue(), |cmd| {
            let mut barrier = vk::ImageMemoryBarrier::default()
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(self.image)
                .subresource_range(
                    vk::ImageSubresourceRange::default()
                        .aspect_mask(vk::ImageAspectFlags::COLOR)
                        .base_array_layer(0)
                        .layer_count(1)
                        .level_count(1),
                );

            let mut mip_width = self.extent.width;
            let mut mip_height = self.extent.height;

            for level in 1..self.mip_levels {
                // The previous level becomes the blit source
                barrier.subresource_range.base_mip_level = level - 1;
                barrier.old_layout = vk::ImageLayout::TRANSFER_DST_OPTIMAL;
                barrier.new_layout = vk::ImageLayout::TRANSFER_SRC_OPTIMAL;
                barrier.src_access_mask = vk::AccessFlags::TRANSFER_WRITE;
                barrier.dst_access_mask = vk::AccessFlags::TRANSFER_READ;

                unsafe {
                    device.handle().cmd_pipeline_barrier(
                        cmd,
                        vk::PipelineStageFlags::TRANSFER,
                        vk::PipelineStageFlags::TRANSFER,
                        vk::DependencyFlags::empty(),
                        &[],
                        &[],
                        &[barrier],
                    );
                }

                let next_width = (mip_width / 2).max(1);
                let next_height = (mip_height / 2).max(1);

                let blit = vk::ImageBlit::default()
                    .src_offsets([
                        vk::Offset3D::default(),
                        vk::Offset3D {
                            x: mip_width as i32,
                            y: mip_height as i32,
                            z: 1,
                        },
                    ])
                    .src_subresource(
                        vk::ImageSubresourceLayers::default()
                            .aspect_mask(vk::ImageAspectFlags::COLOR)
                            .mip_level(level - 1)
                            .base_array_layer(0)
                            .layer_count(1),
                    )
                    .dst_offsets([
                        vk::Offset3D::default(),
                        vk::Offset3D {
                            x: next_width as i32,
                            y: next_height as i32,
                            z: 1,
                        },
                    ])
                    .dst_subresource(
                        vk::ImageSubresourceLayers::default()
                            .aspect_mask(vk::ImageAspectFlags::COLOR)
                            .mip_level(level)
                            .base_array_layer(0)
                            .layer_count(1),
                    );

                unsafe {
                    device.handle().cmd_blit_image(
                        cmd,
                        self.image,
                        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                        self.image,
                        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                        &[blit],
                        vk::Filter::LINEAR,
                    );
                }

                // Source level is finished; hand it to the shader
                barrier.old_layout = vk::ImageLayout::TRANSFER_SRC_OPTIMAL;
                barrier.new_layout = vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL;
                barrier.src_access_mask = vk::AccessFlags::TRANSFER_READ;
                barrier.dst_access_mask = vk::AccessFlags::SHADER_READ;

                unsafe {
                    device.handle().cmd_pipeline_barrier(
                        cmd,
                        vk::PipelineStageFlags::TRANSFER,
                        vk::PipelineStageFlags::FRAGMENT_SHADER,
                        vk::DependencyFlags::empty(),
                        &[],
                        &[],
                        &[barrier],
                    );
                }

                mip_width = next_width;
                mip_height = next_height;
            }

            // The last level was only ever a blit destination
            barrier.subresource_range.base_mip_level = self.mip_levels - 1;
            barrier.old_layout = vk::ImageLayout::TRANSFER_DST_OPTIMAL;
            barrier.new_layout = vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL;
            barrier.src_access_mask = vk::AccessFlags::TRANSFER_WRITE;
            barrier.dst_access_mask = vk::AccessFlags::SHADER_READ;

            unsafe {
                device.handle().cmd_pipeline_barrier(
                    cmd,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::FRAGMENT_SHADER,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[barrier],
                );
            }
            Ok(())
        })?;

        debug!(
            "Generated {} mip levels for {}x{} image",
            self.mip_levels, self.extent.width, self.extent.height
        );
        Ok(())
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        // View first, then image, then its memory
        unsafe {
            self.device.handle().destroy_image_view(self.view, None);
            self.device.handle().destroy_image(self.image, None);
            self.device.handle().free_memory(self.memory, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mip_level_count_power_of_two() {
        assert_eq!(mip_level_count(512, 512), 10);
        assert_eq!(mip_level_count(1024, 1024), 11);
        assert_eq!(mip_level_count(1, 1), 1);
    }

    #[test]
    fn test_mip_level_count_uses_largest_dimension() {
        assert_eq!(mip_level_count(512, 64), 10);
        assert_eq!(mip_level_count(64, 512), 10);
    }

    #[test]
    fn test_mip_level_count_non_power_of_two() {
        // floor(log2(500)) + 1 = 9
        assert_eq!(mip_level_count(500, 300), 9);
        // floor(log2(513)) + 1 = 10
        assert_eq!(mip_level_count(513, 1), 10);
    }

    #[test]
    fn test_mip_chain_dimensions_halve() {
        let mut width = 512u32;
        let mut height = 301u32;
        let levels = mip_level_count(width, height);
        for _ in 1..levels {
            width = (width / 2).max(1);
            height = (height / 2).max(1);
        }
        assert_eq!((width, height), (1, 1));
    }
}
