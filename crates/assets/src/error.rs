//! Asset-loading error types.

use thiserror::Error;

/// Errors that can occur while loading assets.
#[derive(Error, Debug)]
pub enum AssetError {
    /// IO failure reading an asset file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Model parsing failure
    #[error("Model error: {0}")]
    Model(#[from] tobj::LoadError),

    /// Image decoding failure
    #[error("Texture error: {0}")]
    Texture(#[from] image::ImageError),

    /// Structurally invalid asset contents
    #[error("Invalid asset: {0}")]
    Invalid(String),
}

/// Result type alias for asset operations.
pub type AssetResult<T> = std::result::Result<T, AssetError>;
