//! SPIR-V shader modules.
//!
//! Shader modules are build-time-only artifacts: the pipeline builder
//! consumes them and they are dropped immediately after pipeline creation.
//! The engine only ever sees precompiled SPIR-V as opaque byte buffers;
//! compiling from source and locating files are external concerns.

use std::ffi::CString;
use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Shader stage identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    /// The corresponding Vulkan stage flag.
    pub fn to_vk_stage(self) -> vk::ShaderStageFlags {
        match self {
            Self::Vertex => vk::ShaderStageFlags::VERTEX,
            Self::Fragment => vk::ShaderStageFlags::FRAGMENT,
        }
    }

    /// Lowercase stage name for log messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
        }
    }
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A compiled shader module.
pub struct Shader {
    device: Arc<Device>,
    module: vk::ShaderModule,
    stage: ShaderStage,
    entry_point: CString,
}

impl Shader {
    /// Creates a shader module from raw SPIR-V bytes.
    ///
    /// # Errors
    ///
    /// Bytecode whose length is zero or not a multiple of 4 is rejected as
    /// [`RhiError::ShaderError`] before touching the driver; module creation
    /// itself can fail with a Vulkan error.
    pub fn from_spirv_bytes(
        device: Arc<Device>,
        bytes: &[u8],
        stage: ShaderStage,
    ) -> RhiResult<Self> {
        if bytes.is_empty() || bytes.len() % 4 != 0 {
            return Err(RhiError::ShaderError(format!(
                "Invalid SPIR-V length for {} shader: {} bytes",
                stage,
                bytes.len()
            )));
        }

        // SPIR-V words are little-endian
        let code: Vec<u32> = bytes
            .chunks_exact(4)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        let create_info = vk::ShaderModuleCreateInfo::default().code(&code);
        let module = unsafe { device.handle().create_shader_module(&create_info, None)? };

        debug!("Created {} shader module ({} bytes)", stage, bytes.len());

        Ok(Self {
            device,
            module,
            stage,
            entry_point: CString::new("main").map_err(|e| RhiError::ShaderError(e.to_string()))?,
        })
    }

    /// Returns the stage create info for pipeline construction.
    pub fn stage_create_info(&self) -> vk::PipelineShaderStageCreateInfo<'_> {
        vk::PipelineShaderStageCreateInfo::default()
            .stage(self.stage.to_vk_stage())
            .module(self.module)
            .name(&self.entry_point)
    }

    /// The stage this module was created for.
    #[inline]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_shader_module(self.module, None);
        }
        debug!("Destroyed {} shader module", self.stage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_to_vk() {
        let vert = ShaderStage::Vertex.to_vk_stage();
        let frag = ShaderStage::Fragment.to_vk_stage();
        assert_eq!(vert, vk::ShaderStageFlags::VERTEX);
        assert_eq!(frag, vk::ShaderStageFlags::FRAGMENT);
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(ShaderStage::Vertex.to_string(), "vertex");
        assert_eq!(ShaderStage::Fragment.to_string(), "fragment");
    }
}
