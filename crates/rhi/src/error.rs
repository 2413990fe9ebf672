//! Error taxonomy for the Vulkan layer.
//!
//! Driver failures arrive as [`ash::vk::Result`] and convert via `#[from]`;
//! the remaining variants are conditions this crate detects itself, most of
//! them guarded capability checks that fail before any driver call is made.

use thiserror::Error;

/// Result alias over [`RhiError`].
pub type RhiResult<T> = std::result::Result<T, RhiError>;

#[derive(Error, Debug)]
pub enum RhiError {
    /// A Vulkan call returned an error code.
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] ash::vk::Result),

    /// The Vulkan loader itself could not be found or initialized.
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// No enumerated physical device meets the engine's requirements.
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// The device exposes no memory type matching both the resource's type
    /// bits and the requested properties.
    #[error("No memory type matches filter {type_filter:#b} with properties {properties:?}")]
    NoSuitableMemoryType {
        type_filter: u32,
        properties: ash::vk::MemoryPropertyFlags,
    },

    /// The texture format cannot be blitted with linear filtering, so
    /// mipmaps cannot be generated on the GPU.
    #[error("Format {0:?} does not support linear blit filtering")]
    UnsupportedBlit(ash::vk::Format),

    /// None of the candidate formats supports the requested tiling features.
    #[error("No supported format: {0}")]
    UnsupportedFormat(String),

    /// A layout transition outside the small set this engine performs.
    #[error("Unsupported image layout transition: {from:?} -> {to:?}")]
    UnsupportedLayoutTransition {
        from: ash::vk::ImageLayout,
        to: ash::vk::ImageLayout,
    },

    /// Malformed SPIR-V bytecode.
    #[error("Shader error: {0}")]
    ShaderError(String),

    /// Surface creation or surface support queries failed.
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// The surface offers no usable format or present mode.
    #[error("Swapchain error: {0}")]
    SwapchainError(String),

    /// An operation was attempted on a resource in the wrong state, such as
    /// writing through an unmapped buffer.
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),
}
