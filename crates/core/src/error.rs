//! Error type shared by the platform and configuration layers.
//!
//! The rhi and asset crates carry their own error enums; this one covers
//! everything that happens before the GPU is involved.

use thiserror::Error;

/// Result alias over [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Window creation or event-loop failures.
    #[error("Window error: {0}")]
    Window(String),

    /// Vulkan calls made outside the rhi layer (surface creation).
    #[error("Vulkan error: {0}")]
    Vulkan(String),

    /// A config file that exists but does not parse.
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
