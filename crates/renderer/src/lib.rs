//! Rendering orchestration for the Ember engine.
//!
//! This crate wires the RHI layer into a running renderer:
//! - GPU resource setup and upload (model, texture, uniforms, descriptors)
//! - Render targets (depth, optional MSAA color)
//! - The per-frame acquire/submit/present cycle with bounded frames in
//!   flight and swapchain rebuild on invalidation

mod frame;
mod renderer;
mod targets;
mod ubo;

pub use frame::{FrameScheduler, ImageFenceTable};
pub use renderer::{Renderer, RendererDesc};
pub use targets::RenderTargets;
pub use ubo::UniformData;
