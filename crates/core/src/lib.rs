//! Core utilities for the Ember engine.
//!
//! This crate provides foundational types used across the engine:
//! - Error types and result aliases
//! - Logging initialization
//! - Timer and rate-gating utilities
//! - Configuration loading

mod config;
mod error;
mod logging;
mod timer;

pub use config::{AssetPaths, Config, WindowConfig};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use timer::{RateGate, Timer};
