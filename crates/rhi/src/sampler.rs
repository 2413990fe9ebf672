//! Texture sampler management.
//!
//! Samplers are linear-filtered with repeat addressing and anisotropy
//! clamped to the device limit. `max_lod` covers the texture's full mip
//! chain; `min_lod` doubles as a debug mip-bias knob so individual mip
//! levels can be inspected at runtime.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Highest anisotropy the engine requests before the device limit clamp.
const MAX_ANISOTROPY: f32 = 16.0;

/// Texture sampler with linear filtering and a full-mip-chain LOD range.
pub struct Sampler {
    device: Arc<Device>,
    sampler: vk::Sampler,
    mip_levels: u32,
    mip_bias: f32,
}

impl Sampler {
    /// Creates a sampler covering `mip_levels` levels with no mip bias.
    pub fn new(device: Arc<Device>, mip_levels: u32) -> RhiResult<Self> {
        Self::with_mip_bias(device, mip_levels, 0.0)
    }

    /// Creates a sampler whose minimum LOD is forced to `mip_bias`.
    ///
    /// Raising the minimum LOD makes the sampler skip the sharpest levels,
    /// which visualizes the mip chain for debugging.
    pub fn with_mip_bias(device: Arc<Device>, mip_levels: u32, mip_bias: f32) -> RhiResult<Self> {
        let max_anisotropy = MAX_ANISOTROPY.min(device.properties().limits.max_sampler_anisotropy);

        let create_info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(true)
            .max_anisotropy(max_anisotropy)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .mip_lod_bias(0.0)
            .min_lod(mip_bias)
            .max_lod(mip_levels as f32);

        let sampler = unsafe { device.handle().create_sampler(&create_info, None)? };

        debug!(
            "Created sampler ({} mips, bias {}, anisotropy {})",
            mip_levels, mip_bias, max_anisotropy
        );

        Ok(Self {
            device,
            sampler,
            mip_levels,
            mip_bias,
        })
    }

    /// Returns the raw sampler handle.
    #[inline]
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }

    /// Returns the current debug mip bias.
    #[inline]
    pub fn mip_bias(&self) -> f32 {
        self.mip_bias
    }

    /// Returns the mip level count this sampler covers.
    #[inline]
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_sampler(self.sampler, None);
        }
    }
}
