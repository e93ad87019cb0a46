use crate::backend::{Backend, PolygonMode, VertexAttribute};
use crate::error::GpuError;
use crate::handle::{GpuHandle, HandleAllocator, ResourceKind};
use crate::program::{UniformValue, validate_stages};
use crate::target::{AttachmentInfo, AttachmentPoint, Completeness, evaluate_completeness};
use crate::texture::TextureStorage;
use oceanview_common::{ClearColor, Extent2d};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Largest texture edge the headless device accepts.
pub const MAX_TEXTURE_DIMENSION: u32 = 16384;

/// One recorded `draw_indexed` call with the state it was issued under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DrawCall {
    pub framebuffer: Option<GpuHandle>,
    pub vertex_array: Option<GpuHandle>,
    pub program: Option<GpuHandle>,
    pub index_count: u32,
    pub polygon_mode: PolygonMode,
    pub viewport: Option<Extent2d>,
}

#[derive(Debug, Default)]
struct VertexArrayState {
    buffers: Option<(GpuHandle, GpuHandle, u32)>,
    attributes: BTreeMap<u32, VertexAttribute>,
}

#[derive(Debug, Default)]
struct TextureState {
    storage: Option<TextureStorage>,
    pixels: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
struct FramebufferState {
    attachments: BTreeMap<AttachmentPoint, GpuHandle>,
    draw_targets: Vec<AttachmentPoint>,
}

#[derive(Debug, Default)]
struct ProgramState {
    label: String,
    source: Option<String>,
    uniforms: HashMap<String, UniformValue>,
}

/// A device that keeps all state in memory.
///
/// Used by the CLI and by tests. It validates only what a real driver would
/// reject outright (oversized storage, shaders without both entry points) and
/// records everything else for inspection.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    handles: HandleAllocator,
    buffers: HashMap<GpuHandle, Vec<u8>>,
    storage_buffers: HashMap<GpuHandle, Vec<u8>>,
    storage_bindings: BTreeMap<u32, GpuHandle>,
    vertex_arrays: HashMap<GpuHandle, VertexArrayState>,
    textures: HashMap<GpuHandle, TextureState>,
    texture_units: BTreeMap<u32, GpuHandle>,
    framebuffers: HashMap<GpuHandle, FramebufferState>,
    programs: HashMap<GpuHandle, ProgramState>,
    bound_framebuffer: Option<GpuHandle>,
    bound_vertex_array: Option<GpuHandle>,
    current_program: Option<GpuHandle>,
    viewport: Option<Extent2d>,
    polygon_mode: PolygonMode,
    clears: Vec<(Option<GpuHandle>, ClearColor)>,
    draw_calls: Vec<DrawCall>,
    flushes: u64,
    /// Successful allocations of a kind still allowed before one fails.
    fail_after: HashMap<ResourceKind, usize>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next allocation of `kind` fail, once.
    pub fn fail_next_allocation(&mut self, kind: ResourceKind) {
        self.fail_allocation_after(kind, 0);
    }

    /// Lets `successes` allocations of `kind` through, then fails one.
    pub fn fail_allocation_after(&mut self, kind: ResourceKind, successes: usize) {
        self.fail_after.insert(kind, successes);
    }

    pub fn is_live(&self, kind: ResourceKind, handle: GpuHandle) -> bool {
        self.handles.is_live(kind, handle)
    }

    pub fn live_count(&self, kind: ResourceKind) -> usize {
        self.handles.live_count(kind)
    }

    pub fn buffer_contents(&self, buffer: GpuHandle) -> Option<Vec<u8>> {
        self.buffers.get(&buffer).cloned()
    }

    pub fn storage_contents(&self, buffer: GpuHandle) -> Option<Vec<u8>> {
        self.storage_buffers.get(&buffer).cloned()
    }

    pub fn storage_binding(&self, binding: u32) -> Option<GpuHandle> {
        self.storage_bindings.get(&binding).copied()
    }

    /// Attributes sorted by index.
    pub fn vertex_attributes(&self, vertex_array: GpuHandle) -> Vec<VertexAttribute> {
        self.vertex_arrays
            .get(&vertex_array)
            .map(|vao| vao.attributes.values().copied().collect())
            .unwrap_or_default()
    }

    pub fn vertex_array_buffers_of(
        &self,
        vertex_array: GpuHandle,
    ) -> Option<(GpuHandle, GpuHandle, u32)> {
        self.vertex_arrays.get(&vertex_array)?.buffers
    }

    pub fn bound_vertex_array(&self) -> Option<GpuHandle> {
        self.bound_vertex_array
    }

    pub fn texture_storage_of(&self, texture: GpuHandle) -> Option<TextureStorage> {
        self.textures.get(&texture)?.storage
    }

    pub fn texture_pixels(&self, texture: GpuHandle) -> Option<Vec<u8>> {
        self.textures.get(&texture)?.pixels.clone()
    }

    pub fn texture_unit(&self, unit: u32) -> Option<GpuHandle> {
        self.texture_units.get(&unit).copied()
    }

    /// Attachments in point order.
    pub fn framebuffer_attachments(
        &self,
        framebuffer: GpuHandle,
    ) -> Vec<(AttachmentPoint, GpuHandle)> {
        self.framebuffers
            .get(&framebuffer)
            .map(|fb| fb.attachments.iter().map(|(p, h)| (*p, *h)).collect())
            .unwrap_or_default()
    }

    pub fn draw_targets_of(&self, framebuffer: GpuHandle) -> Vec<AttachmentPoint> {
        self.framebuffers
            .get(&framebuffer)
            .map(|fb| fb.draw_targets.clone())
            .unwrap_or_default()
    }

    pub fn bound_framebuffer(&self) -> Option<GpuHandle> {
        self.bound_framebuffer
    }

    pub fn current_program(&self) -> Option<GpuHandle> {
        self.current_program
    }

    pub fn program_label(&self, program: GpuHandle) -> Option<String> {
        Some(self.programs.get(&program)?.label.clone())
    }

    pub fn program_source(&self, program: GpuHandle) -> Option<String> {
        self.programs.get(&program)?.source.clone()
    }

    pub fn uniform(&self, program: GpuHandle, name: &str) -> Option<UniformValue> {
        self.programs.get(&program)?.uniforms.get(name).copied()
    }

    pub fn viewport(&self) -> Option<Extent2d> {
        self.viewport
    }

    pub fn polygon_mode(&self) -> PolygonMode {
        self.polygon_mode
    }

    /// Framebuffer and colour of every clear, oldest first.
    pub fn clears(&self) -> &[(Option<GpuHandle>, ClearColor)] {
        &self.clears
    }

    pub fn clear_count(&self) -> usize {
        self.clears.len()
    }

    pub fn draw_calls(&self) -> &[DrawCall] {
        &self.draw_calls
    }

    pub fn flush_count(&self) -> u64 {
        self.flushes
    }
}

impl Backend for HeadlessBackend {
    fn create(&mut self, kind: ResourceKind) -> Result<GpuHandle, GpuError> {
        if let Some(remaining) = self.fail_after.get_mut(&kind) {
            if *remaining == 0 {
                self.fail_after.remove(&kind);
                return Err(GpuError::AllocationFailed { kind });
            }
            *remaining -= 1;
        }
        let handle = self.handles.allocate(kind);
        match kind {
            ResourceKind::Buffer => {
                self.buffers.insert(handle, Vec::new());
            }
            ResourceKind::StorageBuffer => {
                self.storage_buffers.insert(handle, Vec::new());
            }
            ResourceKind::VertexArray => {
                self.vertex_arrays.insert(handle, VertexArrayState::default());
            }
            ResourceKind::Texture => {
                self.textures.insert(handle, TextureState::default());
            }
            ResourceKind::RenderTarget => {
                self.framebuffers.insert(handle, FramebufferState::default());
            }
            ResourceKind::Program => {
                self.programs.insert(handle, ProgramState::default());
            }
        }
        Ok(handle)
    }

    fn destroy(&mut self, kind: ResourceKind, handle: GpuHandle) {
        if !self.handles.release(kind, handle) {
            tracing::warn!(%kind, %handle, "double release of gpu handle");
            return;
        }
        match kind {
            ResourceKind::Buffer => {
                self.buffers.remove(&handle);
            }
            ResourceKind::StorageBuffer => {
                self.storage_buffers.remove(&handle);
                self.storage_bindings.retain(|_, bound| *bound != handle);
            }
            ResourceKind::VertexArray => {
                self.vertex_arrays.remove(&handle);
                if self.bound_vertex_array == Some(handle) {
                    self.bound_vertex_array = None;
                }
            }
            ResourceKind::Texture => {
                self.textures.remove(&handle);
                self.texture_units.retain(|_, bound| *bound != handle);
            }
            ResourceKind::RenderTarget => {
                self.framebuffers.remove(&handle);
                if self.bound_framebuffer == Some(handle) {
                    self.bound_framebuffer = None;
                }
            }
            ResourceKind::Program => {
                self.programs.remove(&handle);
                if self.current_program == Some(handle) {
                    self.current_program = None;
                }
            }
        }
    }

    fn buffer_data(&mut self, buffer: GpuHandle, bytes: &[u8]) {
        if let Some(data) = self.buffers.get_mut(&buffer) {
            data.clear();
            data.extend_from_slice(bytes);
        }
    }

    fn storage_buffer_data(&mut self, buffer: GpuHandle, binding: u32, bytes: &[u8]) {
        if let Some(data) = self.storage_buffers.get_mut(&buffer) {
            data.clear();
            data.extend_from_slice(bytes);
            self.storage_bindings.insert(binding, buffer);
        }
    }

    fn vertex_array_buffers(
        &mut self,
        vertex_array: GpuHandle,
        vertices: GpuHandle,
        indices: GpuHandle,
        stride: u32,
    ) {
        if let Some(vao) = self.vertex_arrays.get_mut(&vertex_array) {
            vao.buffers = Some((vertices, indices, stride));
        }
    }

    fn vertex_array_attribute(&mut self, vertex_array: GpuHandle, attribute: VertexAttribute) {
        if let Some(vao) = self.vertex_arrays.get_mut(&vertex_array) {
            vao.attributes.insert(attribute.index, attribute);
        }
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<GpuHandle>) {
        self.bound_vertex_array = vertex_array;
    }

    fn texture_storage(
        &mut self,
        texture: GpuHandle,
        storage: &TextureStorage,
    ) -> Result<(), GpuError> {
        if storage.extent.width() > MAX_TEXTURE_DIMENSION
            || storage.extent.height() > MAX_TEXTURE_DIMENSION
        {
            return Err(GpuError::AllocationFailed {
                kind: ResourceKind::Texture,
            });
        }
        if let Some(state) = self.textures.get_mut(&texture) {
            state.storage = Some(*storage);
            state.pixels = None;
        }
        Ok(())
    }

    fn texture_upload(&mut self, texture: GpuHandle, pixels: &[u8]) {
        if let Some(state) = self.textures.get_mut(&texture) {
            state.pixels = Some(pixels.to_vec());
        }
    }

    fn bind_texture_unit(&mut self, unit: u32, texture: GpuHandle) {
        self.texture_units.insert(unit, texture);
    }

    fn framebuffer_attach(
        &mut self,
        framebuffer: GpuHandle,
        point: AttachmentPoint,
        texture: Option<GpuHandle>,
    ) {
        let Some(fb) = self.framebuffers.get_mut(&framebuffer) else {
            return;
        };
        match texture {
            Some(texture) => {
                fb.attachments.insert(point, texture);
            }
            None => {
                fb.attachments.remove(&point);
            }
        }
    }

    fn framebuffer_draw_targets(&mut self, framebuffer: GpuHandle, points: &[AttachmentPoint]) {
        if let Some(fb) = self.framebuffers.get_mut(&framebuffer) {
            fb.draw_targets = points.to_vec();
        }
    }

    fn framebuffer_status(&self, framebuffer: GpuHandle) -> Completeness {
        let Some(fb) = self.framebuffers.get(&framebuffer) else {
            return Completeness::MissingAttachment;
        };
        let infos: Vec<AttachmentInfo> = fb
            .attachments
            .iter()
            .map(|(point, texture)| AttachmentInfo {
                point: *point,
                storage: self.textures.get(texture).and_then(|t| t.storage),
            })
            .collect();
        evaluate_completeness(&infos, &fb.draw_targets)
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<GpuHandle>) {
        self.bound_framebuffer = framebuffer;
    }

    fn set_viewport(&mut self, extent: Extent2d) {
        self.viewport = Some(extent);
    }

    fn clear(&mut self, color: ClearColor, _depth: f32) {
        self.clears.push((self.bound_framebuffer, color));
    }

    fn set_polygon_mode(&mut self, mode: PolygonMode) {
        self.polygon_mode = mode;
    }

    fn compile_program(
        &mut self,
        program: GpuHandle,
        label: &str,
        source: &str,
    ) -> Result<(), GpuError> {
        validate_stages(label, source)?;
        if let Some(state) = self.programs.get_mut(&program) {
            state.label = label.to_owned();
            state.source = Some(source.to_owned());
            state.uniforms.clear();
        }
        Ok(())
    }

    fn use_program(&mut self, program: Option<GpuHandle>) {
        self.current_program = program;
    }

    fn set_uniform(&mut self, program: GpuHandle, name: &str, value: UniformValue) {
        if let Some(state) = self.programs.get_mut(&program) {
            state.uniforms.insert(name.to_owned(), value);
        }
    }

    fn draw_indexed(&mut self, index_count: u32) {
        self.draw_calls.push(DrawCall {
            framebuffer: self.bound_framebuffer,
            vertex_array: self.bound_vertex_array,
            program: self.current_program,
            index_count,
            polygon_mode: self.polygon_mode,
            viewport: self.viewport,
        });
    }

    fn flush(&mut self) {
        self.flushes += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::{FilterMode, TextureFormat, WrapMode};

    fn storage(w: u32, h: u32) -> TextureStorage {
        TextureStorage {
            extent: Extent2d::new(w, h).unwrap(),
            format: TextureFormat::Rgba8,
            samples: 1,
            filter: FilterMode::Linear,
            wrap: WrapMode::ClampToEdge,
        }
    }

    #[test]
    fn injected_failure_applies_once() {
        let mut backend = HeadlessBackend::new();
        backend.fail_next_allocation(ResourceKind::Buffer);
        assert!(backend.create(ResourceKind::Buffer).is_err());
        assert!(backend.create(ResourceKind::Buffer).is_ok());
    }

    #[test]
    fn delayed_failure_skips_earlier_allocations() {
        let mut backend = HeadlessBackend::new();
        backend.fail_allocation_after(ResourceKind::Texture, 2);
        assert!(backend.create(ResourceKind::Buffer).is_ok());
        assert!(backend.create(ResourceKind::Texture).is_ok());
        assert!(backend.create(ResourceKind::Texture).is_ok());
        assert!(matches!(
            backend.create(ResourceKind::Texture),
            Err(GpuError::AllocationFailed {
                kind: ResourceKind::Texture
            })
        ));
        assert!(backend.create(ResourceKind::Texture).is_ok());
    }

    #[test]
    fn double_destroy_is_tolerated() {
        let mut backend = HeadlessBackend::new();
        let h = backend.create(ResourceKind::Texture).unwrap();
        backend.destroy(ResourceKind::Texture, h);
        backend.destroy(ResourceKind::Texture, h);
        assert_eq!(backend.live_count(ResourceKind::Texture), 0);
    }

    #[test]
    fn destroying_bound_objects_unbinds_them() {
        let mut backend = HeadlessBackend::new();
        let fb = backend.create(ResourceKind::RenderTarget).unwrap();
        let tex = backend.create(ResourceKind::Texture).unwrap();
        backend.bind_framebuffer(Some(fb));
        backend.bind_texture_unit(0, tex);
        backend.destroy(ResourceKind::RenderTarget, fb);
        backend.destroy(ResourceKind::Texture, tex);
        assert_eq!(backend.bound_framebuffer(), None);
        assert_eq!(backend.texture_unit(0), None);
    }

    #[test]
    fn status_sees_destroyed_textures() {
        let mut backend = HeadlessBackend::new();
        let fb = backend.create(ResourceKind::RenderTarget).unwrap();
        let tex = backend.create(ResourceKind::Texture).unwrap();
        backend.texture_storage(tex, &storage(4, 4)).unwrap();
        backend.framebuffer_attach(fb, AttachmentPoint::Color(0), Some(tex));
        assert_eq!(backend.framebuffer_status(fb), Completeness::Complete);
        backend.destroy(ResourceKind::Texture, tex);
        assert_eq!(backend.framebuffer_status(fb), Completeness::MissingAttachment);
    }

    #[test]
    fn storage_limit_is_enforced() {
        let mut backend = HeadlessBackend::new();
        let tex = backend.create(ResourceKind::Texture).unwrap();
        assert!(backend.texture_storage(tex, &storage(MAX_TEXTURE_DIMENSION, 1)).is_ok());
        assert!(
            backend
                .texture_storage(tex, &storage(MAX_TEXTURE_DIMENSION + 1, 1))
                .is_err()
        );
    }

    #[test]
    fn draws_record_bound_state() {
        let mut backend = HeadlessBackend::new();
        let fb = backend.create(ResourceKind::RenderTarget).unwrap();
        let vao = backend.create(ResourceKind::VertexArray).unwrap();
        let program = backend.create(ResourceKind::Program).unwrap();
        backend
            .compile_program(program, "p", "@vertex fn a() {} @fragment fn b() {}")
            .unwrap();
        backend.bind_framebuffer(Some(fb));
        backend.bind_vertex_array(Some(vao));
        backend.use_program(Some(program));
        backend.set_polygon_mode(PolygonMode::Line);
        backend.set_viewport(Extent2d::new(32, 16).unwrap());
        backend.clear(ClearColor::default(), 1.0);
        backend.draw_indexed(6);

        assert_eq!(backend.clears(), &[(Some(fb), ClearColor::default())]);
        assert_eq!(
            backend.draw_calls(),
            &[DrawCall {
                framebuffer: Some(fb),
                vertex_array: Some(vao),
                program: Some(program),
                index_count: 6,
                polygon_mode: PolygonMode::Line,
                viewport: Extent2d::new(32, 16),
            }]
        );
    }

    #[test]
    fn compile_requires_both_stages() {
        let mut backend = HeadlessBackend::new();
        let program = backend.create(ResourceKind::Program).unwrap();
        let err = backend
            .compile_program(program, "half", "@vertex fn a() {}")
            .unwrap_err();
        assert!(err.to_string().contains("@fragment"));
        assert_eq!(backend.program_source(program), None);
    }
}
