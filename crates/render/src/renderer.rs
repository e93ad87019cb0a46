use crate::camera::{Camera, CameraMode};
use crate::mesh::{GpuMesh, Mesh, MeshStats};
use glam::{Mat4, Vec3, Vec4};
use oceanview_common::{ClearColor, Extent2d};
use oceanview_gpu::{
    AttachmentPoint, Backend, Completeness, GpuContext, GpuError, GpuHandle, PolygonMode,
    Program, RenderTarget, ResizeOutcome, ShaderTable, TextureDescriptor, TextureFormat,
    TextureId, TextureStore,
};
use oceanview_input::{Action, Bindings, InputState};
use serde::Serialize;
use std::path::PathBuf;

const COLOR0: AttachmentPoint = AttachmentPoint::Color(0);

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Gpu(#[from] GpuError),
    #[error("no shader program named `{0}`")]
    UnknownProgram(String),
    #[error("invalid output size {width}x{height}")]
    InvalidExtent { width: u32, height: u32 },
    #[error("grid of {size} units at {resolution} quads per unit exceeds u32 indexing")]
    GridTooLarge { size: u32, resolution: u32 },
}

#[derive(Debug, Clone)]
pub struct RendererConfig {
    pub grid_size: u32,
    pub grid_resolution: u32,
    pub width: u32,
    pub height: u32,
    pub clear_color: ClearColor,
    /// Each program `name` is loaded from `<shader_dir>/<name>.wgsl`.
    pub shader_dir: PathBuf,
    pub programs: Vec<String>,
    pub active_program: String,
    pub color_format: TextureFormat,
    pub depth_format: TextureFormat,
    pub camera_mode: CameraMode,
    pub fov_degrees: f32,
    pub tint: Vec4,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            grid_size: 20,
            grid_resolution: 4,
            width: 1280,
            height: 720,
            clear_color: ClearColor::default(),
            shader_dir: PathBuf::from("assets/shaders"),
            programs: vec!["default".to_owned(), "ocean".to_owned()],
            active_program: "ocean".to_owned(),
            color_format: TextureFormat::Rgba8,
            depth_format: TextureFormat::Depth24,
            camera_mode: CameraMode::Orbit,
            fov_degrees: 70.0,
            tint: Vec4::ONE,
        }
    }
}

/// What the UI layer needs to present one rendered frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RenderedFrame {
    /// Backend handle of the colour attachment. Changes after every resize.
    pub color: GpuHandle,
    pub extent: Extent2d,
    pub eye: Vec3,
    pub frame_index: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RendererStats {
    pub frames: u64,
    pub extent: Extent2d,
    pub completeness: Completeness,
    pub active_program: String,
    pub camera_mode: CameraMode,
    pub wireframe: bool,
    pub elapsed: f32,
    pub mesh: MeshStats,
}

/// Draws the ocean grid into an offscreen target.
///
/// Owns the camera, the shader table, the mesh buffers, the render target and
/// the store its attachment textures live in.
#[derive(Debug)]
pub struct Renderer<B: Backend> {
    ctx: GpuContext<B>,
    config: RendererConfig,
    textures: TextureStore<B>,
    target: RenderTarget<B>,
    color: TextureId,
    color_handle: GpuHandle,
    mesh: Mesh,
    gpu_mesh: GpuMesh<B>,
    shaders: ShaderTable<B>,
    active_program: String,
    camera: Camera,
    bindings: Bindings,
    extent: Extent2d,
    wireframe: bool,
    elapsed: f32,
    frame_index: u64,
    reload_failures: Vec<(String, GpuError)>,
}

impl<B: Backend> Renderer<B> {
    pub fn new(ctx: &GpuContext<B>, config: RendererConfig) -> Result<Self, RenderError> {
        let _span = tracing::info_span!("renderer_init").entered();
        let extent =
            Extent2d::new(config.width, config.height).ok_or(RenderError::InvalidExtent {
                width: config.width,
                height: config.height,
            })?;

        let mut shaders = ShaderTable::new();
        for name in &config.programs {
            let path = config.shader_dir.join(format!("{name}.wgsl"));
            shaders.load(ctx, name, path)?;
        }
        if !shaders.contains(&config.active_program) {
            return Err(RenderError::UnknownProgram(config.active_program.clone()));
        }

        let mut textures = TextureStore::new();
        let color = textures.create(
            ctx,
            TextureDescriptor::empty("scene-color", extent, config.color_format),
        )?;
        let depth = textures.create(
            ctx,
            TextureDescriptor::empty("scene-depth", extent, config.depth_format),
        )?;
        let color_handle = textures
            .get(color)
            .map(|t| t.handle())
            .ok_or(GpuError::UnknownTexture(color))?;
        let mut target = RenderTarget::new(ctx)?;
        target.attach(COLOR0, color, &textures)?;
        target.attach(depth_point(config.depth_format), depth, &textures)?;
        target.set_draw_targets(&[COLOR0]);
        let status = target.check_complete();
        if !status.is_complete() {
            tracing::warn!(%status, "scene render target is incomplete");
        }

        let mesh = Mesh::grid(config.grid_size, config.grid_resolution)?;
        let gpu_mesh = GpuMesh::upload(ctx, &mesh)?;

        ctx.backend_mut().set_viewport(extent);
        let camera = Camera::new(extent, config.camera_mode, config.fov_degrees);

        tracing::info!(
            %extent,
            programs = config.programs.len(),
            active = %config.active_program,
            "renderer ready"
        );
        Ok(Self {
            ctx: ctx.clone(),
            active_program: config.active_program.clone(),
            config,
            textures,
            target,
            color,
            color_handle,
            mesh,
            gpu_mesh,
            shaders,
            camera,
            bindings: Bindings::default(),
            extent,
            wireframe: false,
            elapsed: 0.0,
            frame_index: 0,
            reload_failures: Vec::new(),
        })
    }

    /// Advances the camera and reacts to the wireframe and reload bindings.
    pub fn update(&mut self, input: &InputState, dt: f32) {
        self.elapsed += dt;
        self.camera.update(input, dt);

        if self.bindings.triggered(input, Action::ToggleWireframe) {
            self.set_wireframe(!self.wireframe);
        }
        if self.bindings.triggered(input, Action::ReloadShaders) {
            self.reload_shaders();
        }
    }

    /// Failures keep the previously compiled program. They are kept until the
    /// next reload, whether it came from a key binding or from this call.
    pub fn reload_shaders(&mut self) -> &[(String, GpuError)] {
        self.reload_failures = self.shaders.reload_all();
        &self.reload_failures
    }

    /// Per-program failures of the most recent reload.
    pub fn reload_failures(&self) -> &[(String, GpuError)] {
        &self.reload_failures
    }

    /// Draws one frame into the offscreen target and returns to the default
    /// surface.
    pub fn render(&mut self) -> RenderedFrame {
        let _span = tracing::trace_span!("render_frame", frame = self.frame_index).entered();
        self.target.bind();
        self.ctx.backend_mut().clear(self.config.clear_color, 1.0);

        match self.shaders.get(&self.active_program) {
            Some(program) => {
                program
                    .set_mat4("model", Mat4::IDENTITY)
                    .set_mat4("view", self.camera.view_matrix())
                    .set_mat4("projection", self.camera.projection_matrix())
                    .set_float("time", self.elapsed)
                    .set_vec4("tint", self.config.tint)
                    .use_program();
                let mode = if self.wireframe {
                    PolygonMode::Line
                } else {
                    PolygonMode::Fill
                };
                self.ctx.backend_mut().set_polygon_mode(mode);
                self.gpu_mesh.draw();
                self.ctx.backend_mut().set_polygon_mode(PolygonMode::Fill);
                Program::unuse(&self.ctx);
            }
            None => tracing::warn!(program = %self.active_program, "active program missing"),
        }

        RenderTarget::unbind(&self.ctx);
        self.ctx.backend_mut().flush();

        self.frame_index += 1;
        RenderedFrame {
            color: self.color_handle(),
            extent: self.extent,
            eye: self.camera.eye(),
            frame_index: self.frame_index,
        }
    }

    /// The single entry point for output size changes.
    ///
    /// Non-positive sizes are ignored. Otherwise the viewport is updated
    /// first, then the render target, then the camera, so the projection
    /// always matches the target that was just reallocated. If reallocation
    /// fails the viewport goes back to the previous size, which the extent
    /// and camera keep.
    pub fn resize(&mut self, width: i32, height: i32) -> Result<ResizeOutcome, RenderError> {
        let _span = tracing::info_span!("renderer_resize", width, height).entered();
        let Some(extent) = Extent2d::from_signed(width, height) else {
            tracing::debug!(width, height, "ignoring non-positive resize");
            return Ok(ResizeOutcome::Ignored);
        };

        self.ctx.backend_mut().set_viewport(extent);
        let outcome = self.target.resize(width, height, &mut self.textures);
        // Earlier attachments may have been reallocated even if a later one failed.
        if let Some(texture) = self.textures.get(self.color) {
            self.color_handle = texture.handle();
        }
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!(error = %err, extent = %self.extent, "resize failed, keeping previous size");
                self.ctx.backend_mut().set_viewport(self.extent);
                return Err(err.into());
            }
        };
        self.camera.refactor(extent);
        self.extent = extent;
        tracing::info!(%extent, "renderer resized");
        Ok(outcome)
    }

    pub fn set_active_program(&mut self, name: &str) -> Result<(), RenderError> {
        if !self.shaders.contains(name) {
            return Err(RenderError::UnknownProgram(name.to_owned()));
        }
        self.active_program = name.to_owned();
        Ok(())
    }

    pub fn active_program(&self) -> &str {
        &self.active_program
    }

    pub fn program_names(&self) -> Vec<String> {
        self.shaders.names().map(str::to_owned).collect()
    }

    pub fn set_wireframe(&mut self, wireframe: bool) {
        if self.wireframe != wireframe {
            tracing::debug!(wireframe, "polygon mode toggled");
        }
        self.wireframe = wireframe;
    }

    pub fn wireframe(&self) -> bool {
        self.wireframe
    }

    pub fn set_tint(&mut self, tint: Vec4) {
        self.config.tint = tint;
    }

    pub fn tint(&self) -> Vec4 {
        self.config.tint
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn shaders(&self) -> &ShaderTable<B> {
        &self.shaders
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub fn set_bindings(&mut self, bindings: Bindings) {
        self.bindings = bindings;
    }

    /// Current backend handle of the colour attachment.
    pub fn color_handle(&self) -> GpuHandle {
        self.color_handle
    }

    pub fn textures(&self) -> &TextureStore<B> {
        &self.textures
    }

    pub fn target(&self) -> &RenderTarget<B> {
        &self.target
    }

    pub fn completeness(&self) -> Completeness {
        self.target.check_complete()
    }

    pub fn extent(&self) -> Extent2d {
        self.extent
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn context(&self) -> &GpuContext<B> {
        &self.ctx
    }

    pub fn stats(&self) -> RendererStats {
        RendererStats {
            frames: self.frame_index,
            extent: self.extent,
            completeness: self.completeness(),
            active_program: self.active_program.clone(),
            camera_mode: self.camera.mode(),
            wireframe: self.wireframe,
            elapsed: self.elapsed,
            mesh: self.mesh.stats(),
        }
    }
}

fn depth_point(format: TextureFormat) -> AttachmentPoint {
    if format.has_stencil() {
        AttachmentPoint::DepthStencil
    } else {
        AttachmentPoint::Depth
    }
}
