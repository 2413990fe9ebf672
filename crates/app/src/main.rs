//! Ember entry point.
//!
//! Owns the winit event loop and wires configuration, asset loading, input,
//! and the renderer together. Rendering is driven by redraw requests issued
//! every loop iteration and throttled by the configured frame cap.

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use ember_core::{Config, RateGate, Timer};
use ember_platform::{InputState, KeyCode, Window};
use ember_renderer::{Renderer, RendererDesc};

/// Key that cycles the sampler's minimum mip level for texture debugging.
const MIP_BIAS_KEY: KeyCode = KeyCode::Digit1;

struct App {
    config: Config,
    window: Option<Window>,
    renderer: Option<Renderer>,
    input: InputState,
    title_gate: RateGate,
    fps_timer: Timer,
    frames_since_title: u32,
    mip_step: u32,
}

impl App {
    fn new(config: Config) -> Self {
        Self {
            config,
            window: None,
            renderer: None,
            input: InputState::new(),
            title_gate: RateGate::from_millis(1000),
            fps_timer: Timer::new(),
            frames_since_title: 0,
            mip_step: 0,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = Window::new(
            event_loop,
            self.config.window.width,
            self.config.window.height,
            &self.config.window.title,
        )?;

        let paths = &self.config.assets;
        let model = ember_assets::load_model(&paths.model)
            .with_context(|| format!("loading model {}", paths.model))?;
        let texture = ember_assets::load_texture(&paths.texture)
            .with_context(|| format!("loading texture {}", paths.texture))?;
        let vertex_shader = ember_assets::load_shader_bytecode(&paths.vertex_shader)
            .with_context(|| format!("loading vertex shader {}", paths.vertex_shader))?;
        let fragment_shader = ember_assets::load_shader_bytecode(&paths.fragment_shader)
            .with_context(|| format!("loading fragment shader {}", paths.fragment_shader))?;

        info!(
            "Assets loaded: {} triangles, {}x{} texture",
            model.triangle_count(),
            texture.width,
            texture.height
        );

        let renderer = Renderer::new(
            &window,
            &RendererDesc {
                model: &model,
                texture: &texture,
                vertex_shader: &vertex_shader,
                fragment_shader: &fragment_shader,
                msaa: self.config.msaa,
                validation: self.config.validation,
                frame_cap: self.config.frame_cap,
            },
        )?;

        self.renderer = Some(renderer);
        self.window = Some(window);
        info!("Initialization complete, entering main loop");
        Ok(())
    }

    fn redraw(&mut self) {
        // Minimized: no area to draw into, and no swapchain may be built
        if self.window.as_ref().is_some_and(|w| w.is_zero_sized()) {
            return;
        }

        if self.input.key_edge_triggered(MIP_BIAS_KEY)
            && let Some(ref mut renderer) = self.renderer
        {
            self.mip_step = (self.mip_step + 1) % (renderer.mip_levels() + 1);
            if let Err(e) = renderer.set_mip_bias(self.mip_step as f32) {
                warn!("Failed to update mip bias: {}", e);
            }
        }

        // The renderer owns the frame cap; Ok(false) is a skipped tick
        if let Some(ref mut renderer) = self.renderer {
            match renderer.draw_frame() {
                Ok(true) => self.frames_since_title += 1,
                Ok(false) => {}
                Err(e) => error!("Render error: {}", e),
            }
        }

        if self.title_gate.try_fire() {
            let elapsed = self.fps_timer.elapsed_secs().max(f32::EPSILON);
            let fps = self.frames_since_title as f32 / elapsed;
            if let Some(ref window) = self.window {
                window.set_title(&format!("{} - {:.0} fps", self.config.window.title, fps));
            }
            self.frames_since_title = 0;
            self.fps_timer.reset();
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            error!("Startup failed: {:#}", e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Window close requested, exiting");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(ref mut window) = self.window {
                    window.resize(size.width, size.height);
                }
                if let Some(ref mut renderer) = self.renderer {
                    renderer.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                self.redraw();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::PhysicalKey;
                if let PhysicalKey::Code(key) = event.physical_key {
                    if event.state.is_pressed() {
                        self.input.on_key_pressed(key);
                    } else {
                        self.input.on_key_released(key);
                    }
                }
                if self.input.is_key_pressed(KeyCode::Escape) {
                    info!("Escape pressed, shutting down");
                    event_loop.exit();
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.input
                    .on_mouse_moved(position.x as f32, position.y as f32);
            }
            WindowEvent::MouseInput { state, button, .. } => {
                if state.is_pressed() {
                    self.input.on_mouse_pressed(button.into());
                } else {
                    self.input.on_mouse_released(button.into());
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                use winit::event::MouseScrollDelta;
                let (x, y) = match delta {
                    MouseScrollDelta::LineDelta(x, y) => (x, y),
                    MouseScrollDelta::PixelDelta(pos) => (pos.x as f32, pos.y as f32),
                };
                self.input.on_scroll(x, y);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        self.input.begin_frame();
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    ember_core::init_logging();

    let config = Config::load("ember.toml")?;
    info!(
        "Starting {} ({}x{}, frame cap {}, msaa {})",
        config.window.title,
        config.window.width,
        config.window.height,
        config.frame_cap,
        config.msaa
    );

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    Ok(())
}
