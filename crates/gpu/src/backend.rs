use crate::error::GpuError;
use crate::handle::{GpuHandle, ResourceKind};
use crate::program::UniformValue;
use crate::target::{AttachmentPoint, Completeness};
use crate::texture::TextureStorage;
use oceanview_common::{ClearColor, Extent2d};
use serde::Serialize;
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

/// Scalar type of one vertex attribute component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ComponentType {
    Float32,
    Uint32,
    Sint32,
}

/// Binary layout of one shader input attribute inside the bound vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct VertexAttribute {
    pub index: u32,
    pub components: u8,
    pub ty: ComponentType,
    pub normalized: bool,
    pub offset: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum PolygonMode {
    #[default]
    Fill,
    Line,
}

/// The device-facing seam of the GPU layer.
///
/// Object wrappers call these operations and nothing else, so the same
/// lifecycle code runs against wgpu and against [`crate::HeadlessBackend`].
/// The layer is a thin ownership layer: preconditions such as "a vertex array
/// is bound before drawing" are not validated here.
pub trait Backend {
    fn create(&mut self, kind: ResourceKind) -> Result<GpuHandle, GpuError>;
    fn destroy(&mut self, kind: ResourceKind, handle: GpuHandle);

    /// Replaces the whole backing store; static usage.
    fn buffer_data(&mut self, buffer: GpuHandle, bytes: &[u8]);
    /// Replaces the backing store and binds the buffer at an indexed slot.
    fn storage_buffer_data(&mut self, buffer: GpuHandle, binding: u32, bytes: &[u8]);

    fn vertex_array_buffers(
        &mut self,
        vertex_array: GpuHandle,
        vertices: GpuHandle,
        indices: GpuHandle,
        stride: u32,
    );
    fn vertex_array_attribute(&mut self, vertex_array: GpuHandle, attribute: VertexAttribute);
    fn bind_vertex_array(&mut self, vertex_array: Option<GpuHandle>);

    fn texture_storage(
        &mut self,
        texture: GpuHandle,
        storage: &TextureStorage,
    ) -> Result<(), GpuError>;
    fn texture_upload(&mut self, texture: GpuHandle, pixels: &[u8]);
    fn bind_texture_unit(&mut self, unit: u32, texture: GpuHandle);

    /// `None` detaches whatever is bound at `point`.
    fn framebuffer_attach(
        &mut self,
        framebuffer: GpuHandle,
        point: AttachmentPoint,
        texture: Option<GpuHandle>,
    );
    fn framebuffer_draw_targets(&mut self, framebuffer: GpuHandle, points: &[AttachmentPoint]);
    fn framebuffer_status(&self, framebuffer: GpuHandle) -> Completeness;
    /// `None` selects the default surface.
    fn bind_framebuffer(&mut self, framebuffer: Option<GpuHandle>);

    fn set_viewport(&mut self, extent: Extent2d);
    fn clear(&mut self, color: ClearColor, depth: f32);
    fn set_polygon_mode(&mut self, mode: PolygonMode);

    fn compile_program(
        &mut self,
        program: GpuHandle,
        label: &str,
        source: &str,
    ) -> Result<(), GpuError>;
    fn use_program(&mut self, program: Option<GpuHandle>);
    fn set_uniform(&mut self, program: GpuHandle, name: &str, value: UniformValue);

    fn draw_indexed(&mut self, index_count: u32);

    /// Submits everything recorded since the previous flush.
    fn flush(&mut self);
}

/// Shared handle to the single backend of the render thread.
///
/// Cloning is cheap and every clone refers to the same backend. The context is
/// `!Send`: all GPU work happens on one thread between frames.
pub struct GpuContext<B: Backend> {
    inner: Rc<RefCell<B>>,
}

impl<B: Backend> GpuContext<B> {
    pub fn new(backend: B) -> Self {
        Self {
            inner: Rc::new(RefCell::new(backend)),
        }
    }

    pub fn backend(&self) -> Ref<'_, B> {
        self.inner.borrow()
    }

    pub fn backend_mut(&self) -> RefMut<'_, B> {
        self.inner.borrow_mut()
    }
}

impl<B: Backend> std::fmt::Debug for GpuContext<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuContext")
            .field("clones", &Rc::strong_count(&self.inner))
            .finish()
    }
}

impl<B: Backend> Clone for GpuContext<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}
