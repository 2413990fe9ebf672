//! Render targets: depth buffer and optional MSAA color buffer.
//!
//! Both targets are sized to the swapchain extent and sampled at the render
//! pass's sample count, so they are destroyed and rebuilt on every swapchain
//! rebuild. The depth format is negotiated once per build from a fixed
//! candidate list.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use ember_rhi::RhiResult;
use ember_rhi::device::Device;
use ember_rhi::image::{Image, ImageDesc};

/// Depth format candidates, most preferred first.
const DEPTH_FORMAT_CANDIDATES: &[vk::Format] = &[
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Offscreen attachments backing the render pass.
pub struct RenderTargets {
    depth: Image,
    msaa_color: Option<Image>,
    depth_format: vk::Format,
}

impl RenderTargets {
    /// Creates the depth target and, when `samples` exceeds one, the MSAA
    /// color target.
    ///
    /// # Arguments
    ///
    /// * `device` - Logical device the targets live on
    /// * `instance` - Instance handle for format support queries
    /// * `extent` - Swapchain extent
    /// * `color_format` - Swapchain color format (used for the MSAA target)
    /// * `samples` - Rasterization sample count
    pub fn new(
        device: Arc<Device>,
        instance: &ash::Instance,
        extent: vk::Extent2D,
        color_format: vk::Format,
        samples: vk::SampleCountFlags,
    ) -> RhiResult<Self> {
        let depth_format = device.find_supported_format(
            instance,
            DEPTH_FORMAT_CANDIDATES,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        )?;

        let depth = Image::new(
            device.clone(),
            &ImageDesc {
                width: extent.width,
                height: extent.height,
                mip_levels: 1,
                samples,
                format: depth_format,
                tiling: vk::ImageTiling::OPTIMAL,
                usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
                aspect: vk::ImageAspectFlags::DEPTH,
            },
        )?;

        let msaa_color = if samples != vk::SampleCountFlags::TYPE_1 {
            // Never stored to memory outside the pass, so transient lazily
            // allocated memory would also do; plain device-local keeps the
            // allocation path uniform
            Some(Image::new(
                device,
                &ImageDesc {
                    width: extent.width,
                    height: extent.height,
                    mip_levels: 1,
                    samples,
                    format: color_format,
                    tiling: vk::ImageTiling::OPTIMAL,
                    usage: vk::ImageUsageFlags::TRANSIENT_ATTACHMENT
                        | vk::ImageUsageFlags::COLOR_ATTACHMENT,
                    aspect: vk::ImageAspectFlags::COLOR,
                },
            )?)
        } else {
            None
        };

        debug!(
            "Render targets created: depth {:?}, msaa {}",
            depth_format,
            msaa_color.is_some()
        );

        Ok(Self {
            depth,
            msaa_color,
            depth_format,
        })
    }

    /// Returns the negotiated depth format.
    #[inline]
    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    /// Returns the framebuffer attachment views for one swapchain image, in
    /// render pass order.
    pub fn framebuffer_attachments(&self, swapchain_view: vk::ImageView) -> Vec<vk::ImageView> {
        match &self.msaa_color {
            Some(msaa) => vec![msaa.view(), self.depth.view(), swapchain_view],
            None => vec![swapchain_view, self.depth.view()],
        }
    }
}
