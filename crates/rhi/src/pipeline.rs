//! Graphics pipeline creation.
//!
//! This module builds the engine's single graphics pipeline: fixed
//! viewport/scissor equal to the swapchain extent, back-face culling with a
//! counter-clockwise front face, fill polygon mode, depth test and write
//! with less-than comparison, no stencil, and optional alpha blending.
//!
//! # Overview
//!
//! - [`PipelineLayout`] owns the VkPipelineLayout built from descriptor set
//!   layouts; it survives swapchain rebuilds
//! - [`GraphicsPipelineBuilder`] assembles the fixed-function state and
//!   shader stages and produces a [`Pipeline`] against a render pass
//!
//! The viewport is baked into the pipeline, so the pipeline is destroyed
//! and rebuilt whenever the swapchain extent changes.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ember_rhi::device::Device;
//! use ember_rhi::pipeline::{GraphicsPipelineBuilder, PipelineLayout};
//! use ember_rhi::render_pass::RenderPass;
//! use ember_rhi::shader::{Shader, ShaderStage};
//! use ash::vk;
//!
//! # fn example(
//! #     device: Arc<Device>,
//! #     render_pass: &RenderPass,
//! #     vert_spv: &[u8],
//! #     frag_spv: &[u8],
//! # ) -> Result<(), ember_rhi::RhiError> {
//! let layout = PipelineLayout::new(device.clone(), &[])?;
//! let vert = Shader::from_spirv_bytes(device.clone(), vert_spv, ShaderStage::Vertex)?;
//! let frag = Shader::from_spirv_bytes(device.clone(), frag_spv, ShaderStage::Fragment)?;
//!
//! let pipeline = GraphicsPipelineBuilder::new(device, &vert, &frag)
//!     .extent(vk::Extent2D { width: 1280, height: 720 })
//!     .samples(render_pass.samples())
//!     .build(&layout, render_pass)?;
//! // `vert` and `frag` drop here; shader modules are build-time-only
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::RhiResult;
use crate::render_pass::RenderPass;
use crate::shader::Shader;
use crate::vertex::Vertex;

/// Pipeline layout wrapper.
pub struct PipelineLayout {
    device: Arc<Device>,
    layout: vk::PipelineLayout,
}

impl PipelineLayout {
    /// Creates a pipeline layout from descriptor set layouts.
    pub fn new(
        device: Arc<Device>,
        set_layouts: &[vk::DescriptorSetLayout],
    ) -> RhiResult<Self> {
        let create_info = vk::PipelineLayoutCreateInfo::default().set_layouts(set_layouts);
        let layout = unsafe { device.handle().create_pipeline_layout(&create_info, None)? };
        Ok(Self { device, layout })
    }

    /// Returns the raw layout handle.
    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_pipeline_layout(self.layout, None);
        }
    }
}

/// Graphics pipeline wrapper.
pub struct Pipeline {
    device: Arc<Device>,
    pipeline: vk::Pipeline,
}

impl Pipeline {
    /// Returns the raw pipeline handle.
    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_pipeline(self.pipeline, None);
        }
        debug!("Graphics pipeline destroyed");
    }
}

/// Builder for the engine's graphics pipeline.
pub struct GraphicsPipelineBuilder<'a> {
    device: Arc<Device>,
    vertex_shader: &'a Shader,
    fragment_shader: &'a Shader,
    extent: vk::Extent2D,
    samples: vk::SampleCountFlags,
    alpha_blend: bool,
}

impl<'a> GraphicsPipelineBuilder<'a> {
    /// Starts a builder with single-sampled, non-blended defaults.
    pub fn new(
        device: Arc<Device>,
        vertex_shader: &'a Shader,
        fragment_shader: &'a Shader,
    ) -> Self {
        Self {
            device,
            vertex_shader,
            fragment_shader,
            extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            samples: vk::SampleCountFlags::TYPE_1,
            alpha_blend: false,
        }
    }

    /// Sets the fixed viewport/scissor extent (the swapchain extent).
    pub fn extent(mut self, extent: vk::Extent2D) -> Self {
        self.extent = extent;
        self
    }

    /// Sets the rasterization sample count; must match the render pass.
    pub fn samples(mut self, samples: vk::SampleCountFlags) -> Self {
        self.samples = samples;
        self
    }

    /// Enables src-alpha/one-minus-src-alpha blending. Off by default.
    pub fn alpha_blend(mut self, enabled: bool) -> Self {
        self.alpha_blend = enabled;
        self
    }

    /// Builds the pipeline against `render_pass` subpass 0.
    ///
    /// # Errors
    ///
    /// Any creation failure propagates as a typed error; no partial pipeline
    /// is ever returned.
    pub fn build(self, layout: &PipelineLayout, render_pass: &RenderPass) -> RhiResult<Pipeline> {
        let stages = [
            self.vertex_shader.stage_create_info(),
            self.fragment_shader.stage_create_info(),
        ];

        let binding_descriptions = [Vertex::binding_description()];
        let attribute_descriptions = Vertex::attribute_descriptions();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&binding_descriptions)
            .vertex_attribute_descriptions(&attribute_descriptions);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        let viewports = [vk::Viewport::default()
            .x(0.0)
            .y(0.0)
            .width(self.extent.width as f32)
            .height(self.extent.height as f32)
            .min_depth(0.0)
            .max_depth(1.0)];
        let scissors = [vk::Rect2D::default().extent(self.extent)];
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::BACK)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .depth_bias_enable(false);

        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(self.samples);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(true)
            .depth_write_enable(true)
            .depth_compare_op(vk::CompareOp::LESS)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let blend_attachment = if self.alpha_blend {
            vk::PipelineColorBlendAttachmentState::default()
                .color_write_mask(vk::ColorComponentFlags::RGBA)
                .blend_enable(true)
                .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
                .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                .color_blend_op(vk::BlendOp::ADD)
                .src_alpha_blend_factor(vk::BlendFactor::ONE)
                .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
                .alpha_blend_op(vk::BlendOp::ADD)
        } else {
            vk::PipelineColorBlendAttachmentState::default()
                .color_write_mask(vk::ColorComponentFlags::RGBA)
                .blend_enable(false)
        };
        let blend_attachments = [blend_attachment];
        let color_blend = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&blend_attachments);

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .layout(layout.handle())
            .render_pass(render_pass.handle())
            .subpass(0);

        let pipeline = unsafe {
            self.device
                .handle()
                .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
                .map_err(|(_, result)| result)?[0]
        };

        info!(
            "Graphics pipeline created ({}x{}, {:?})",
            self.extent.width, self.extent.height, self.samples
        );

        Ok(Pipeline {
            device: self.device,
            pipeline,
        })
    }
}
