mod keymap;
mod spectrum;
mod ui;
mod viewport;

use anyhow::{Context as _, Result};
use clap::Parser;
use egui::Context as EguiContext;
use glam::Vec2;
use oceanview_gpu::{GpuContext, GpuHandle};
use oceanview_input::{Action, InputState};
use oceanview_render::{CameraMode, Renderer, RendererConfig};
use oceanview_render_wgpu::WgpuBackend;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use ui::UiState;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::{CursorGrabMode, Window, WindowId};

#[derive(Parser)]
#[command(name = "oceanview-desktop", about = "Interactive ocean grid viewer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Initial window width in pixels
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Initial window height in pixels
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Directory holding `<program>.wgsl` files
    #[arg(long, default_value = "assets/shaders")]
    shader_dir: PathBuf,

    /// Initial camera mode (free or orbit)
    #[arg(long, default_value = "orbit")]
    camera: CameraMode,
}

impl Cli {
    fn renderer_config(&self) -> RendererConfig {
        RendererConfig {
            width: self.width.max(1),
            height: self.height.max(1),
            shader_dir: self.shader_dir.clone(),
            camera_mode: self.camera,
            ..RendererConfig::default()
        }
    }
}

/// Everything that exists only while the window does.
struct Running {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    gpu: GpuContext<WgpuBackend>,
    renderer: Renderer<WgpuBackend>,
    egui_winit: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
    /// Colour attachment currently registered with egui.
    viewport_texture: Option<(GpuHandle, egui::TextureId)>,
}

impl Running {
    fn new(
        event_loop: &ActiveEventLoop,
        egui_ctx: &EguiContext,
        renderer_config: RendererConfig,
    ) -> Result<Self> {
        let attrs = Window::default_attributes()
            .with_title("Oceanview")
            .with_inner_size(PhysicalSize::new(
                renderer_config.width,
                renderer_config.height,
            ));
        let window = Arc::new(event_loop.create_window(attrs).context("create window")?);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window.clone())
            .context("create surface")?;
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("no suitable adapter")?;
        let (device, queue) = pollster::block_on(oceanview_render_wgpu::request_device(&adapter))
            .context("create device")?;

        let size = window.inner_size();
        let caps = surface.get_capabilities(&adapter);
        let surface_format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first())
            .copied()
            .context("surface reports no formats")?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let egui_renderer = egui_wgpu::Renderer::new(&device, surface_format, None, 1, false);
        let gpu = GpuContext::new(WgpuBackend::new(device, queue));
        let renderer = Renderer::new(&gpu, renderer_config).context("create renderer")?;

        let egui_winit = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        tracing::info!(
            backend = adapter.get_info().backend.to_str(),
            format = ?surface_format,
            "gpu initialised"
        );
        Ok(Self {
            window,
            surface,
            config,
            gpu,
            renderer,
            egui_winit,
            egui_renderer,
            viewport_texture: None,
        })
    }

    fn resize_surface(&mut self, size: PhysicalSize<u32>) {
        self.config.width = size.width.max(1);
        self.config.height = size.height.max(1);
        let backend = self.gpu.backend();
        self.surface.configure(backend.device(), &self.config);
    }

    /// Keeps the egui texture pointing at the current colour attachment,
    /// whose handle changes on every resize.
    fn sync_viewport_texture(&mut self, color: GpuHandle) -> Option<egui::TextureId> {
        if let Some((handle, id)) = self.viewport_texture {
            if handle == color {
                return Some(id);
            }
            self.egui_renderer.free_texture(&id);
            self.viewport_texture = None;
        }
        let backend = self.gpu.backend();
        let view = backend.texture_view(color)?;
        let sampler = backend.sampler_descriptor(color)?;
        let id = self.egui_renderer.register_native_texture_with_sampler_options(
            backend.device(),
            view,
            sampler,
        );
        tracing::debug!(%color, ?id, "registered viewport texture");
        self.viewport_texture = Some((color, id));
        Some(id)
    }

    fn set_cursor_captured(&self, input: &mut InputState, captured: bool) {
        input.set_cursor_captured(captured);
        if captured {
            let grabbed = self
                .window
                .set_cursor_grab(CursorGrabMode::Confined)
                .or_else(|_| self.window.set_cursor_grab(CursorGrabMode::Locked));
            if let Err(err) = grabbed {
                tracing::debug!(error = %err, "cursor grab unsupported");
            }
        } else if let Err(err) = self.window.set_cursor_grab(CursorGrabMode::None) {
            tracing::debug!(error = %err, "cursor release failed");
        }
        self.window.set_cursor_visible(!captured);
    }

    fn present(&mut self, full_output: egui::FullOutput, egui_ctx: &EguiContext) {
        self.egui_winit
            .handle_platform_output(&self.window, full_output.platform_output);
        let paint_jobs = egui_ctx.tessellate(full_output.shapes, full_output.pixels_per_point);
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: full_output.pixels_per_point,
        };

        let backend = self.gpu.backend();
        let (device, queue) = (backend.device(), backend.queue());
        // Texture deltas are applied even when the surface is unavailable;
        // egui never resends them.
        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer
                .update_texture(device, queue, *id, image_delta);
        }

        let output = match self.surface.get_current_texture() {
            Ok(t) => Some(t),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(device, &self.config);
                None
            }
            Err(e) => {
                tracing::error!("surface error: {e}");
                None
            }
        };

        if let Some(output) = output {
            let view = output
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default());
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("egui_encoder"),
            });
            self.egui_renderer.update_buffers(
                device,
                queue,
                &mut encoder,
                &paint_jobs,
                &screen_descriptor,
            );
            {
                let mut pass = encoder
                    .begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some("egui_pass"),
                        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                            view: &view,
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                                store: wgpu::StoreOp::Store,
                            },
                        })],
                        depth_stencil_attachment: None,
                        ..Default::default()
                    })
                    .forget_lifetime();
                self.egui_renderer
                    .render(&mut pass, &paint_jobs, &screen_descriptor);
            }
            queue.submit(std::iter::once(encoder.finish()));
            output.present();
        }

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
    }
}

struct OceanApp {
    renderer_config: RendererConfig,
    running: Option<Running>,
    egui_ctx: EguiContext,
    input: InputState,
    ui: UiState,
    last_frame: Instant,
}

impl OceanApp {
    fn new(renderer_config: RendererConfig) -> Self {
        Self {
            renderer_config,
            running: None,
            egui_ctx: EguiContext::default(),
            input: InputState::new(),
            ui: UiState::default(),
            last_frame: Instant::now(),
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(running) = self.running.as_mut() else {
            return;
        };
        let now = Instant::now();
        let dt = (now - self.last_frame).as_secs_f32().min(0.1);
        self.last_frame = now;

        for action in running.renderer.bindings().actions(&self.input) {
            match action {
                Action::Exit => {
                    tracing::info!("exit requested");
                    event_loop.exit();
                    return;
                }
                Action::CaptureCursor => running.set_cursor_captured(&mut self.input, true),
                Action::ReleaseCursor => running.set_cursor_captured(&mut self.input, false),
                Action::ToggleWireframe | Action::ReloadShaders => {}
            }
        }

        running.renderer.update(&self.input, dt);
        self.ui.tick(dt);
        let frame = running.renderer.render();
        let texture = running.sync_viewport_texture(frame.color);

        let raw_input = running.egui_winit.take_egui_input(&running.window);
        let mut pending_resize = None;
        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            ui::side_panel(ctx, &mut self.ui, &mut running.renderer);
            pending_resize = ui::viewport_panel(ctx, &mut self.ui.tracker, texture);
        });
        running.present(full_output, &self.egui_ctx);

        if let Some((width, height)) = pending_resize {
            if let Err(err) = running.renderer.resize(width, height) {
                tracing::warn!(error = %err, width, height, "viewport resize failed");
            }
        }
        self.input.end_frame();
        running.window.request_redraw();
    }
}

impl ApplicationHandler for OceanApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.running.is_some() {
            return;
        }
        match Running::new(event_loop, &self.egui_ctx, self.renderer_config.clone()) {
            Ok(running) => self.running = Some(running),
            Err(err) => {
                tracing::error!("startup failed: {err:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(running) = self.running.as_mut() else {
            return;
        };
        let response = running.egui_winit.on_window_event(&running.window, &event);
        if response.consumed && !self.input.cursor_captured() {
            return;
        }

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => running.resize_surface(size),
            WindowEvent::Focused(false) => {
                self.input.release_all();
                running.set_cursor_captured(&mut self.input, false);
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        ..
                    },
                ..
            } => {
                if let Some(key) = keymap::key(code) {
                    match state {
                        ElementState::Pressed => self.input.key_down(key),
                        ElementState::Released => self.input.key_up(key),
                    }
                }
            }
            WindowEvent::MouseInput { button, state, .. } => {
                if let Some(button) = keymap::button(button) {
                    match state {
                        ElementState::Pressed => self.input.button_down(button),
                        ElementState::Released => self.input.button_up(button),
                    }
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: winit::event::DeviceId,
        event: DeviceEvent,
    ) {
        if let DeviceEvent::MouseMotion { delta } = event {
            if self.input.cursor_captured() {
                self.input
                    .mouse_moved(Vec2::new(delta.0 as f32, delta.1 as f32));
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(running) = &self.running {
            running.window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    tracing::info!("oceanview-desktop starting");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = OceanApp::new(cli.renderer_config());
    event_loop.run_app(&mut app)?;

    Ok(())
}
