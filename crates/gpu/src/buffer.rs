use crate::backend::{Backend, GpuContext, VertexAttribute};
use crate::error::GpuError;
use crate::handle::{GpuHandle, ResourceKind};
use crate::object::GpuObject;
use bytemuck::Pod;
use std::collections::BTreeMap;

/// Vertex or index memory, uploaded once per content change.
#[derive(Debug)]
pub struct Buffer<B: Backend> {
    object: GpuObject<B>,
    byte_len: usize,
}

impl<B: Backend> Buffer<B> {
    pub fn new(ctx: &GpuContext<B>) -> Result<Self, GpuError> {
        Ok(Self {
            object: GpuObject::new(ctx, ResourceKind::Buffer)?,
            byte_len: 0,
        })
    }

    /// Replaces the entire backing store. There is no partial update.
    pub fn upload<T: Pod>(&mut self, data: &[T]) {
        self.upload_bytes(bytemuck::cast_slice(data));
    }

    pub fn upload_bytes(&mut self, bytes: &[u8]) {
        self.object
            .context()
            .backend_mut()
            .buffer_data(self.object.handle(), bytes);
        self.byte_len = bytes.len();
    }

    pub fn handle(&self) -> GpuHandle {
        self.object.handle()
    }

    pub fn byte_len(&self) -> usize {
        self.byte_len
    }
}

/// Memory bound to an indexed shader-storage slot.
#[derive(Debug)]
pub struct StorageBuffer<B: Backend> {
    object: GpuObject<B>,
    binding: Option<u32>,
}

impl<B: Backend> StorageBuffer<B> {
    pub fn new(ctx: &GpuContext<B>) -> Result<Self, GpuError> {
        Ok(Self {
            object: GpuObject::new(ctx, ResourceKind::StorageBuffer)?,
            binding: None,
        })
    }

    /// Uploads and binds at `binding` in one step. Shader stages read the most
    /// recent upload at that slot.
    pub fn upload<T: Pod>(&mut self, binding: u32, data: &[T]) {
        self.object.context().backend_mut().storage_buffer_data(
            self.object.handle(),
            binding,
            bytemuck::cast_slice(data),
        );
        self.binding = Some(binding);
    }

    pub fn handle(&self) -> GpuHandle {
        self.object.handle()
    }

    pub fn binding(&self) -> Option<u32> {
        self.binding
    }
}

/// Describes how vertex buffer bytes map onto shader inputs.
#[derive(Debug)]
pub struct VertexArray<B: Backend> {
    object: GpuObject<B>,
    attributes: BTreeMap<u32, VertexAttribute>,
}

impl<B: Backend> VertexArray<B> {
    pub fn new(ctx: &GpuContext<B>) -> Result<Self, GpuError> {
        Ok(Self {
            object: GpuObject::new(ctx, ResourceKind::VertexArray)?,
            attributes: BTreeMap::new(),
        })
    }

    /// Associates one vertex buffer (fixed stride) and one index buffer.
    pub fn bind_buffers(&mut self, vertices: &Buffer<B>, indices: &Buffer<B>, stride: u32) {
        self.object.context().backend_mut().vertex_array_buffers(
            self.object.handle(),
            vertices.handle(),
            indices.handle(),
            stride,
        );
    }

    /// Declares one attribute. Redeclaring an index replaces it.
    pub fn attribute(&mut self, attribute: VertexAttribute) {
        self.object
            .context()
            .backend_mut()
            .vertex_array_attribute(self.object.handle(), attribute);
        self.attributes.insert(attribute.index, attribute);
    }

    pub fn bind(&self) {
        self.object
            .context()
            .backend_mut()
            .bind_vertex_array(Some(self.object.handle()));
    }

    /// Binds this vertex array and issues one indexed triangle draw.
    pub fn draw_indexed(&self, index_count: u32) {
        let mut backend = self.object.context().backend_mut();
        backend.bind_vertex_array(Some(self.object.handle()));
        backend.draw_indexed(index_count);
    }

    pub fn attributes(&self) -> impl Iterator<Item = &VertexAttribute> {
        self.attributes.values()
    }

    pub fn handle(&self) -> GpuHandle {
        self.object.handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ComponentType;
    use crate::headless::HeadlessBackend;

    fn ctx() -> GpuContext<HeadlessBackend> {
        GpuContext::new(HeadlessBackend::new())
    }

    #[test]
    fn upload_replaces_whole_store() {
        let ctx = ctx();
        let mut buffer = Buffer::new(&ctx).unwrap();
        buffer.upload(&[1.0f32, 2.0, 3.0]);
        assert_eq!(buffer.byte_len(), 12);
        buffer.upload(&[7u32]);
        assert_eq!(buffer.byte_len(), 4);
        let contents = ctx.backend().buffer_contents(buffer.handle()).unwrap();
        assert_eq!(contents, 7u32.to_ne_bytes().to_vec());
    }

    #[test]
    fn drop_releases_handle() {
        let ctx = ctx();
        let buffer = Buffer::new(&ctx).unwrap();
        let handle = buffer.handle();
        assert!(ctx.backend().is_live(ResourceKind::Buffer, handle));
        drop(buffer);
        assert!(!ctx.backend().is_live(ResourceKind::Buffer, handle));
        assert_eq!(ctx.backend().live_count(ResourceKind::Buffer), 0);
    }

    #[test]
    fn live_buffers_have_distinct_handles() {
        let ctx = ctx();
        let buffers: Vec<_> = (0..8).map(|_| Buffer::new(&ctx).unwrap()).collect();
        let mut handles: Vec<_> = buffers.iter().map(Buffer::handle).collect();
        handles.sort();
        handles.dedup();
        assert_eq!(handles.len(), 8);
    }

    #[test]
    fn storage_buffer_binds_slot() {
        let ctx = ctx();
        let mut ssbo = StorageBuffer::new(&ctx).unwrap();
        ssbo.upload(3, &[1u32, 2, 3, 4]);
        assert_eq!(ssbo.binding(), Some(3));
        assert_eq!(ctx.backend().storage_binding(3), Some(ssbo.handle()));
        assert_eq!(ctx.backend().storage_contents(ssbo.handle()).unwrap().len(), 16);
    }

    #[test]
    fn latest_storage_upload_wins_the_slot() {
        let ctx = ctx();
        let mut a = StorageBuffer::new(&ctx).unwrap();
        let mut b = StorageBuffer::new(&ctx).unwrap();
        a.upload(0, &[1u32]);
        b.upload(0, &[2u32]);
        assert_eq!(ctx.backend().storage_binding(0), Some(b.handle()));
    }

    #[test]
    fn attribute_redefinition_is_last_write_wins() {
        let ctx = ctx();
        let mut vao = VertexArray::new(&ctx).unwrap();
        let first = VertexAttribute {
            index: 0,
            components: 3,
            ty: ComponentType::Float32,
            normalized: false,
            offset: 0,
        };
        vao.attribute(first);
        vao.attribute(VertexAttribute {
            components: 2,
            ..first
        });
        assert_eq!(vao.attributes().count(), 1);
        let backend = ctx.backend();
        let attrs = backend.vertex_attributes(vao.handle());
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].components, 2);
    }

    #[test]
    fn vertex_array_records_buffers() {
        let ctx = ctx();
        let vbo = Buffer::new(&ctx).unwrap();
        let ebo = Buffer::new(&ctx).unwrap();
        let mut vao = VertexArray::new(&ctx).unwrap();
        vao.bind_buffers(&vbo, &ebo, 12);
        vao.bind();
        let backend = ctx.backend();
        assert_eq!(
            backend.vertex_array_buffers_of(vao.handle()),
            Some((vbo.handle(), ebo.handle(), 12))
        );
        assert_eq!(backend.bound_vertex_array(), Some(vao.handle()));
    }
}
