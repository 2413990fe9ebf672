//! Asset loading for the Ember engine.
//!
//! This crate turns external files into the plain data the renderer uploads:
//! - Wavefront OBJ models into deduplicated vertex/index arrays
//! - Images into tightly packed RGBA8 pixel buffers
//! - Compiled SPIR-V shaders into opaque byte buffers

mod error;
mod model;
mod shader;
mod texture;

pub use error::{AssetError, AssetResult};
pub use model::{Model, load_model};
pub use shader::load_shader_bytecode;
pub use texture::{TextureData, load_texture};
