//! Platform abstraction layer for the Ember engine.
//!
//! This crate provides platform-specific functionality:
//! - Window management via winit
//! - Vulkan surface creation (RAII wrapped)
//! - Input handling with edge-triggered keys and throttled key repeat

mod input;
mod window;

pub use input::{InputState, KeyCode, MouseButton};
pub use window::{Surface, Window};

// The app drives the event loop directly
pub use winit::event::WindowEvent;
pub use winit::event_loop::EventLoop;
