//! Shader bytecode loading.
//!
//! The renderer consumes SPIR-V as opaque byte buffers; this is the only
//! place shader files are read from disk.

use std::path::Path;

use crate::error::{AssetError, AssetResult};

/// Reads compiled SPIR-V bytecode from disk.
///
/// Performs a basic sanity check on the length; full validation happens when
/// the shader module is created.
pub fn load_shader_bytecode(path: impl AsRef<Path>) -> AssetResult<Vec<u8>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;

    if bytes.is_empty() || bytes.len() % 4 != 0 {
        return Err(AssetError::Invalid(format!(
            "{}: not SPIR-V ({} bytes)",
            path.display(),
            bytes.len()
        )));
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_aligned_bytes_load() {
        let path = std::env::temp_dir().join("ember_test_shader.spv");
        std::fs::write(&path, [0x03, 0x02, 0x23, 0x07, 0, 0, 1, 0]).unwrap();

        let bytes = load_shader_bytecode(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(bytes.len(), 8);
    }

    #[test]
    fn test_unaligned_length_is_rejected() {
        let path = std::env::temp_dir().join("ember_test_shader_bad.spv");
        std::fs::write(&path, [1, 2, 3]).unwrap();

        let result = load_shader_bytecode(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(AssetError::Invalid(_))));
    }
}
