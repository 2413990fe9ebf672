//! Render hardware interface: RAII wrappers over `ash`.
//!
//! Every module pairs a Vulkan object with an owner type whose `Drop`
//! destroys it, so resource lifetime follows ordinary Rust ownership.
//! Covered here: instance/device bring-up, the swapchain, render passes and
//! graphics pipelines, buffers and images (staging uploads, mipmap
//! generation), descriptors and samplers, command recording, and the
//! fence/semaphore primitives the frame loop is built from.

mod error;

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod image;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod render_pass;
pub mod sampler;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod vertex;

pub use error::{RhiError, RhiResult};

// Callers build create-info structs and clear values against this
pub use ash::vk;
