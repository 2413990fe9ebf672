//! The renderer: GPU setup, per-frame drawing, and swapchain rebuilds.
//!
//! # Overview
//!
//! [`Renderer::new`] performs the entire cold path once: instance, surface,
//! device, queues, swapchain, render pass, pipeline, mesh and texture
//! uploads, uniform buffers, descriptors, and pre-recorded command buffers
//! (one per swapchain image, re-submitted every frame). [`Renderer::draw_frame`]
//! is the hot path: wait on the frame slot's fence, acquire, update the
//! uniform buffer for the acquired image, submit, present, advance.
//!
//! Resources split into two lifetimes. Created once and never rebuilt:
//! instance, surface, device, command pool, descriptor set layout, pipeline
//! layout, frame slots, and the uploaded mesh/texture. Rebuilt on every
//! swapchain invalidation (resize, out-of-date, suboptimal): the swapchain
//! itself, render targets, render pass, pipeline, framebuffers, uniform
//! buffers, descriptor pool and sets, and the recorded command buffers.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use ember_assets::{Model, TextureData};
use ember_core::{RateGate, Timer};
use ember_platform::{Surface, Window};
use ember_rhi::buffer::{Buffer, BufferUsage};
use ember_rhi::command::CommandPool;
use ember_rhi::descriptor::{DescriptorPool, DescriptorSetLayout};
use ember_rhi::device::Device;
use ember_rhi::image::{self, Image, ImageDesc};
use ember_rhi::instance::Instance;
use ember_rhi::physical_device::select_physical_device;
use ember_rhi::pipeline::{GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use ember_rhi::render_pass::{Framebuffer, RenderPass};
use ember_rhi::sampler::Sampler;
use ember_rhi::shader::{Shader, ShaderStage};
use ember_rhi::swapchain::Swapchain;
use ember_rhi::{RhiError, RhiResult};

use crate::frame::FrameScheduler;
use crate::targets::RenderTargets;
use crate::ubo::UniformData;

/// Everything the renderer needs up front: the scene's assets and the
/// feature toggles resolved from configuration.
pub struct RendererDesc<'a> {
    /// Mesh to upload and draw.
    pub model: &'a Model,
    /// Texture pixels to upload (RGBA8).
    pub texture: &'a TextureData,
    /// Compiled SPIR-V for the vertex stage.
    pub vertex_shader: &'a [u8],
    /// Compiled SPIR-V for the fragment stage.
    pub fragment_shader: &'a [u8],
    /// Render at the device's maximum usable sample count.
    pub msaa: bool,
    /// Enable validation layers when available.
    pub validation: bool,
    /// Maximum frames rendered per second; 0 disables the cap.
    pub frame_cap: u32,
}

/// Owns the full GPU state and drives the frame loop.
///
/// Field order is drop order: per-swapchain resources first, then the
/// uploaded assets and pools, then the swapchain, device, surface, and
/// instance last.
pub struct Renderer {
    scheduler: FrameScheduler,
    command_buffers: Vec<vk::CommandBuffer>,
    framebuffers: Vec<Framebuffer>,
    pipeline: Pipeline,
    pipeline_layout: PipelineLayout,
    render_pass: RenderPass,
    targets: RenderTargets,
    uniform_buffers: Vec<Buffer>,
    descriptor_sets: Vec<vk::DescriptorSet>,
    descriptor_pool: DescriptorPool,
    descriptor_layout: DescriptorSetLayout,
    sampler: Sampler,
    texture: Image,
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    index_count: u32,
    vertex_spirv: Vec<u8>,
    fragment_spirv: Vec<u8>,
    samples: vk::SampleCountFlags,
    timer: Timer,
    frame_gate: Option<RateGate>,
    resize_pending: Option<(u32, u32)>,
    swapchain: Swapchain,
    command_pool: CommandPool,
    device: Arc<Device>,
    surface: Surface,
    instance: Instance,
}

impl Renderer {
    /// Builds the complete rendering state for a window.
    ///
    /// # Errors
    ///
    /// Any Vulkan or upload failure aborts construction; partially created
    /// resources are released by their own RAII wrappers.
    pub fn new(window: &Window, desc: &RendererDesc<'_>) -> RhiResult<Self> {
        let display_handle = window
            .display_handle()
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;
        let instance = Instance::new(display_handle.as_raw(), desc.validation)?;

        let surface = window
            .create_surface(instance.entry(), instance.handle())
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;

        let gpu_info =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        let device = Device::new(&instance, &gpu_info)?;

        let samples = if desc.msaa {
            device.max_usable_sample_count()
        } else {
            vk::SampleCountFlags::TYPE_1
        };
        info!("Rendering at {:?} samples", samples);

        let graphics_family = device
            .queue_families()
            .graphics_family
            .ok_or(RhiError::NoSuitableGpu)?;
        let command_pool = CommandPool::new(device.clone(), graphics_family)?;

        let swapchain = Swapchain::new(
            instance.handle(),
            device.clone(),
            surface.handle(),
            surface.loader(),
            window.width(),
            window.height(),
        )?;

        let descriptor_layout = DescriptorSetLayout::new(device.clone())?;
        let pipeline_layout =
            PipelineLayout::new(device.clone(), &[descriptor_layout.handle()])?;

        let texture = upload_texture(&device, instance.handle(), &command_pool, desc.texture)?;
        let sampler = Sampler::new(device.clone(), texture.mip_levels())?;

        let vertex_buffer = Buffer::device_local_with_data(
            device.clone(),
            &command_pool,
            bytemuck::cast_slice(&desc.model.vertices),
            BufferUsage::Vertex,
        )?;
        let index_buffer = Buffer::device_local_with_data(
            device.clone(),
            &command_pool,
            bytemuck::cast_slice(&desc.model.indices),
            BufferUsage::Index,
        )?;
        let index_count = desc.model.indices.len() as u32;

        let targets = RenderTargets::new(
            device.clone(),
            instance.handle(),
            swapchain.extent(),
            swapchain.format(),
            samples,
        )?;
        let render_pass = RenderPass::new(
            device.clone(),
            swapchain.format(),
            targets.depth_format(),
            samples,
        )?;
        let pipeline = build_pipeline(
            &device,
            desc.vertex_shader,
            desc.fragment_shader,
            swapchain.extent(),
            samples,
            &pipeline_layout,
            &render_pass,
        )?;
        let framebuffers = create_framebuffers(&device, &render_pass, &targets, &swapchain)?;
        let uniform_buffers = create_uniform_buffers(&device, swapchain.image_count())?;
        let descriptor_pool = DescriptorPool::new(device.clone(), swapchain.image_count() as u32)?;
        let descriptor_sets =
            descriptor_pool.allocate(&descriptor_layout, swapchain.image_count())?;
        write_descriptor_sets(
            &descriptor_pool,
            &descriptor_sets,
            &uniform_buffers,
            &texture,
            &sampler,
        );
        let command_buffers = record_command_buffers(
            &device,
            &command_pool,
            &render_pass,
            &pipeline,
            &pipeline_layout,
            &framebuffers,
            &descriptor_sets,
            &vertex_buffer,
            &index_buffer,
            index_count,
        )?;

        let scheduler = FrameScheduler::new(device.clone(), swapchain.image_count())?;

        info!(
            "Renderer ready: {} swapchain images, {} indices, {} mip levels",
            swapchain.image_count(),
            index_count,
            texture.mip_levels()
        );

        Ok(Self {
            scheduler,
            command_buffers,
            framebuffers,
            pipeline,
            pipeline_layout,
            render_pass,
            targets,
            uniform_buffers,
            descriptor_sets,
            descriptor_pool,
            descriptor_layout,
            sampler,
            texture,
            vertex_buffer,
            index_buffer,
            index_count,
            vertex_spirv: desc.vertex_shader.to_vec(),
            fragment_spirv: desc.fragment_shader.to_vec(),
            samples,
            timer: Timer::new(),
            frame_gate: (desc.frame_cap > 0)
                .then(|| RateGate::from_millis(1000 / u64::from(desc.frame_cap))),
            resize_pending: None,
            swapchain,
            command_pool,
            device,
            surface,
            instance,
        })
    }

    /// Renders one frame, returning whether anything was actually drawn.
    ///
    /// Returns `Ok(false)` on skipped ticks: the frame cap has not elapsed,
    /// a zero-area resize is pending, or the swapchain was out of date on
    /// acquire (nothing acquired; the chain is rebuilt for the next tick).
    /// An out-of-date or suboptimal result at present rebuilds after the
    /// frame was drawn.
    pub fn draw_frame(&mut self) -> RhiResult<bool> {
        // Frame cap: the render-this-tick decision happens here, before any
        // GPU work
        if let Some(ref mut gate) = self.frame_gate
            && !gate.try_fire()
        {
            return Ok(false);
        }

        if let Some((w, h)) = self.resize_pending
            && (w == 0 || h == 0)
        {
            return Ok(false);
        }

        self.scheduler.wait_for_current()?;

        let (image_index, suboptimal_acquire) = match self
            .swapchain
            .acquire_next_image(self.scheduler.image_available_handle())
        {
            Ok(result) => result,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("Swapchain out of date on acquire, rebuilding");
                self.recreate_swapchain()?;
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        // Waits out any other frame slot still rendering to this image, then
        // claims it for the current slot
        self.scheduler.claim_image(image_index)?;

        let extent = self.swapchain.extent();
        let aspect = extent.width as f32 / extent.height as f32;
        let ubo = UniformData::at_time(self.timer.elapsed_secs(), aspect);
        self.uniform_buffers[image_index as usize].write_data(bytemuck::bytes_of(&ubo))?;

        self.scheduler.reset_current()?;

        let wait_semaphores = [self.scheduler.image_available_handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [self.command_buffers[image_index as usize]];
        let signal_semaphores = [self.scheduler.render_finished_handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device.handle().queue_submit(
                self.device.graphics_queue(),
                &[submit_info],
                self.scheduler.in_flight_fence_handle(),
            )?;
        }

        let present_result = self.swapchain.present(
            self.device.present_queue(),
            image_index,
            self.scheduler.render_finished_handle(),
        );

        self.scheduler.advance();

        let needs_rebuild = match present_result {
            Ok(suboptimal_present) => {
                suboptimal_acquire || suboptimal_present || self.resize_pending.is_some()
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => true,
            Err(e) => return Err(e.into()),
        };

        if needs_rebuild {
            self.recreate_swapchain()?;
        }

        Ok(true)
    }

    /// Notes a framebuffer size change; the rebuild happens at the end of
    /// the next drawn frame.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.resize_pending = Some((width, height));
    }

    /// Replaces the texture sampler with one clamped to `bias` minimum LOD
    /// and rewrites the descriptor sets.
    ///
    /// Debug aid for inspecting individual mip levels. The descriptor set
    /// handles are unchanged, so the pre-recorded command buffers remain
    /// valid.
    pub fn set_mip_bias(&mut self, bias: f32) -> RhiResult<()> {
        self.device.wait_idle()?;

        self.sampler =
            Sampler::with_mip_bias(self.device.clone(), self.texture.mip_levels(), bias)?;
        write_descriptor_sets(
            &self.descriptor_pool,
            &self.descriptor_sets,
            &self.uniform_buffers,
            &self.texture,
            &self.sampler,
        );

        info!("Sampler min LOD set to {}", bias);
        Ok(())
    }

    /// Mip level count of the loaded texture.
    #[inline]
    pub fn mip_levels(&self) -> u32 {
        self.texture.mip_levels()
    }

    /// Current sampler minimum LOD.
    #[inline]
    pub fn mip_bias(&self) -> f32 {
        self.sampler.mip_bias()
    }

    /// Tears down and rebuilds everything tied to the swapchain.
    ///
    /// Zero-area pending sizes defer the rebuild; the deferral is cleared by
    /// the next nonzero [`resize`](Self::resize).
    fn recreate_swapchain(&mut self) -> RhiResult<()> {
        let (width, height) = match self.resize_pending {
            Some((w, h)) => (w, h),
            None => {
                let extent = self.swapchain.extent();
                (extent.width, extent.height)
            }
        };
        if width == 0 || height == 0 {
            warn!("Deferring swapchain rebuild: zero-area framebuffer");
            return Ok(());
        }

        self.device.wait_idle()?;

        self.command_pool.free(&self.command_buffers);
        self.command_buffers.clear();
        self.framebuffers.clear();

        self.swapchain
            .recreate(self.surface.handle(), self.surface.loader(), width, height)?;

        self.targets = RenderTargets::new(
            self.device.clone(),
            self.instance.handle(),
            self.swapchain.extent(),
            self.swapchain.format(),
            self.samples,
        )?;
        self.render_pass = RenderPass::new(
            self.device.clone(),
            self.swapchain.format(),
            self.targets.depth_format(),
            self.samples,
        )?;
        self.pipeline = build_pipeline(
            &self.device,
            &self.vertex_spirv,
            &self.fragment_spirv,
            self.swapchain.extent(),
            self.samples,
            &self.pipeline_layout,
            &self.render_pass,
        )?;
        self.framebuffers =
            create_framebuffers(&self.device, &self.render_pass, &self.targets, &self.swapchain)?;
        self.uniform_buffers = create_uniform_buffers(&self.device, self.swapchain.image_count())?;
        self.descriptor_pool =
            DescriptorPool::new(self.device.clone(), self.swapchain.image_count() as u32)?;
        self.descriptor_sets = self
            .descriptor_pool
            .allocate(&self.descriptor_layout, self.swapchain.image_count())?;
        write_descriptor_sets(
            &self.descriptor_pool,
            &self.descriptor_sets,
            &self.uniform_buffers,
            &self.texture,
            &self.sampler,
        );
        self.command_buffers = record_command_buffers(
            &self.device,
            &self.command_pool,
            &self.render_pass,
            &self.pipeline,
            &self.pipeline_layout,
            &self.framebuffers,
            &self.descriptor_sets,
            &self.vertex_buffer,
            &self.index_buffer,
            self.index_count,
        )?;

        self.scheduler.reset_image_table(self.swapchain.image_count());
        self.resize_pending = None;

        info!(
            "Swapchain rebuilt at {}x{} ({} images)",
            width,
            height,
            self.swapchain.image_count()
        );
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        // All queues must be drained before any resource teardown begins
        if let Err(e) = self.device.wait_idle() {
            warn!("Device wait failed during renderer teardown: {}", e);
        }
        debug!("Renderer dropped");
    }
}

/// Uploads RGBA8 pixels into a sampled, mipmapped device-local image.
fn upload_texture(
    device: &Arc<Device>,
    instance: &ash::Instance,
    pool: &CommandPool,
    texture: &TextureData,
) -> RhiResult<Image> {
    let mip_levels = image::mip_level_count(texture.width, texture.height);

    let gpu_image = Image::new(
        device.clone(),
        &ImageDesc {
            width: texture.width,
            height: texture.height,
            mip_levels,
            samples: vk::SampleCountFlags::TYPE_1,
            format: vk::Format::R8G8B8A8_SRGB,
            tiling: vk::ImageTiling::OPTIMAL,
            usage: vk::ImageUsageFlags::SAMPLED
                | vk::ImageUsageFlags::TRANSFER_SRC
                | vk::ImageUsageFlags::TRANSFER_DST,
            aspect: vk::ImageAspectFlags::COLOR,
        },
    )?;

    let staging = Buffer::new(
        device.clone(),
        texture.byte_size() as vk::DeviceSize,
        BufferUsage::Staging,
    )?;
    staging.write_data(&texture.pixels)?;

    gpu_image.transition_layout(
        pool,
        vk::ImageLayout::UNDEFINED,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
    )?;
    gpu_image.copy_from_buffer(pool, staging.handle())?;
    // The blit chain leaves every level in SHADER_READ_ONLY
    gpu_image.generate_mipmaps(instance, pool)?;

    debug!(
        "Texture uploaded: {}x{}, {} mip levels",
        texture.width, texture.height, mip_levels
    );
    Ok(gpu_image)
}

/// Compiles both shader stages and builds the graphics pipeline. The shader
/// modules are destroyed on return; the pipeline keeps its own copy.
fn build_pipeline(
    device: &Arc<Device>,
    vertex_spirv: &[u8],
    fragment_spirv: &[u8],
    extent: vk::Extent2D,
    samples: vk::SampleCountFlags,
    layout: &PipelineLayout,
    render_pass: &RenderPass,
) -> RhiResult<Pipeline> {
    let vertex = Shader::from_spirv_bytes(device.clone(), vertex_spirv, ShaderStage::Vertex)?;
    let fragment = Shader::from_spirv_bytes(device.clone(), fragment_spirv, ShaderStage::Fragment)?;

    GraphicsPipelineBuilder::new(device.clone(), &vertex, &fragment)
        .extent(extent)
        .samples(samples)
        .build(layout, render_pass)
}

fn create_framebuffers(
    device: &Arc<Device>,
    render_pass: &RenderPass,
    targets: &RenderTargets,
    swapchain: &Swapchain,
) -> RhiResult<Vec<Framebuffer>> {
    swapchain
        .image_views()
        .iter()
        .map(|&view| {
            Framebuffer::new(
                device.clone(),
                render_pass,
                &targets.framebuffer_attachments(view),
                swapchain.extent(),
            )
        })
        .collect()
}

fn create_uniform_buffers(device: &Arc<Device>, count: usize) -> RhiResult<Vec<Buffer>> {
    (0..count)
        .map(|_| {
            Buffer::new(
                device.clone(),
                UniformData::SIZE as vk::DeviceSize,
                BufferUsage::Uniform,
            )
        })
        .collect()
}

fn write_descriptor_sets(
    pool: &DescriptorPool,
    sets: &[vk::DescriptorSet],
    uniform_buffers: &[Buffer],
    texture: &Image,
    sampler: &Sampler,
) {
    for (set, uniform) in sets.iter().zip(uniform_buffers) {
        pool.write_set(
            *set,
            uniform.handle(),
            UniformData::SIZE as vk::DeviceSize,
            texture.view(),
            sampler.handle(),
        );
    }
}

/// Records one reusable command buffer per framebuffer.
///
/// The buffers are re-submitted every frame, so they are recorded without
/// ONE_TIME_SUBMIT and only re-recorded on swapchain rebuilds.
#[allow(clippy::too_many_arguments)]
fn record_command_buffers(
    device: &Arc<Device>,
    pool: &CommandPool,
    render_pass: &RenderPass,
    pipeline: &Pipeline,
    pipeline_layout: &PipelineLayout,
    framebuffers: &[Framebuffer],
    descriptor_sets: &[vk::DescriptorSet],
    vertex_buffer: &Buffer,
    index_buffer: &Buffer,
    index_count: u32,
) -> RhiResult<Vec<vk::CommandBuffer>> {
    let command_buffers = pool.allocate(framebuffers.len() as u32)?;

    // Resolve attachments use DONT_CARE loads, so two clear values cover
    // both the single-sampled and multisampled attachment layouts
    let clear_values = [
        vk::ClearValue {
            color: vk::ClearColorValue {
                float32: [0.0, 0.0, 0.0, 1.0],
            },
        },
        vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: 1.0,
                stencil: 0,
            },
        },
    ];

    for (i, (&cmd, framebuffer)) in command_buffers.iter().zip(framebuffers).enumerate() {
        let extent = framebuffer.extent();
        let begin_info = vk::CommandBufferBeginInfo::default();
        let pass_info = vk::RenderPassBeginInfo::default()
            .render_pass(render_pass.handle())
            .framebuffer(framebuffer.handle())
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(&clear_values);

        unsafe {
            device.handle().begin_command_buffer(cmd, &begin_info)?;
            device
                .handle()
                .cmd_begin_render_pass(cmd, &pass_info, vk::SubpassContents::INLINE);
            device
                .handle()
                .cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline.handle());
            device
                .handle()
                .cmd_bind_vertex_buffers(cmd, 0, &[vertex_buffer.handle()], &[0]);
            device.handle().cmd_bind_index_buffer(
                cmd,
                index_buffer.handle(),
                0,
                vk::IndexType::UINT32,
            );
            device.handle().cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline_layout.handle(),
                0,
                &[descriptor_sets[i]],
                &[],
            );
            device.handle().cmd_draw_indexed(cmd, index_count, 1, 0, 0, 0);
            device.handle().cmd_end_render_pass(cmd);
            device.handle().end_command_buffer(cmd)?;
        }
    }

    debug!("Recorded {} command buffers", command_buffers.len());
    Ok(command_buffers)
}
