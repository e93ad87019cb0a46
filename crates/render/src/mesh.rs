use bytemuck::{Pod, Zeroable};
use oceanview_gpu::{
    Backend, Buffer, ComponentType, GpuContext, GpuError, GpuHandle, VertexArray, VertexAttribute,
};
use serde::Serialize;

use crate::renderer::RenderError;

/// One grid vertex. Only the position is stored; the ocean shader derives
/// everything else from it.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
}

impl Vertex {
    pub const STRIDE: u32 = std::mem::size_of::<Vertex>() as u32;

    pub const ATTRIBUTES: [VertexAttribute; 1] = [VertexAttribute {
        index: 0,
        components: 3,
        ty: ComponentType::Float32,
        normalized: false,
        offset: 0,
    }];
}

/// CPU-side triangle list, immutable once generated.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    index_count: u32,
}

impl Mesh {
    /// A flat XZ plane of `size` world units per side, centred on the origin,
    /// with `resolution` quads per unit.
    ///
    /// Produces `(size * resolution + 1)^2` vertices and two counter-clockwise
    /// (seen from +Y) triangles per quad. Grids whose vertex or index count
    /// does not fit a `u32` are rejected.
    pub fn grid(size: u32, resolution: u32) -> Result<Self, RenderError> {
        let too_large = || RenderError::GridTooLarge { size, resolution };
        let cells64 = u64::from(size) * u64::from(resolution);
        let vertex_count = (cells64 + 1)
            .checked_mul(cells64 + 1)
            .filter(|&n| n <= u64::from(u32::MAX))
            .ok_or_else(too_large)?;
        let index_count = cells64
            .checked_mul(cells64)
            .and_then(|n| n.checked_mul(6))
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(too_large)?;

        // Both counts fit a u32, so the cell and row arithmetic below does too.
        let cells = cells64 as u32;
        let row = cells + 1;
        let half = (size / 2) as f32;
        let step = 1.0 / resolution.max(1) as f32;

        let mut vertices = Vec::with_capacity(vertex_count as usize);
        for z in 0..=cells {
            for x in 0..=cells {
                vertices.push(Vertex {
                    position: [x as f32 * step - half, 0.0, z as f32 * step - half],
                });
            }
        }

        let mut indices = Vec::with_capacity(index_count as usize);
        for z in 0..cells {
            for x in 0..cells {
                let top_left = z * row + x;
                let top_right = top_left + 1;
                let bottom_left = top_left + row;
                let bottom_right = bottom_left + 1;
                indices.extend_from_slice(&[
                    top_left,
                    bottom_left,
                    top_right,
                    top_right,
                    bottom_left,
                    bottom_right,
                ]);
            }
        }

        Ok(Self {
            vertices,
            indices,
            index_count,
        })
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Length of [`Mesh::indices`] as a draw count.
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn stats(&self) -> MeshStats {
        MeshStats {
            vertex_count: self.vertices.len(),
            index_count: self.indices.len(),
            triangle_count: self.indices.len() / 3,
            vertex_bytes: std::mem::size_of_val(self.vertices.as_slice()),
            index_bytes: std::mem::size_of_val(self.indices.as_slice()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MeshStats {
    pub vertex_count: usize,
    pub index_count: usize,
    pub triangle_count: usize,
    pub vertex_bytes: usize,
    pub index_bytes: usize,
}

/// A mesh uploaded once into a vertex buffer, an index buffer and a vertex
/// array that ties them together.
#[derive(Debug)]
pub struct GpuMesh<B: Backend> {
    vertices: Buffer<B>,
    indices: Buffer<B>,
    vertex_array: VertexArray<B>,
    index_count: u32,
}

impl<B: Backend> GpuMesh<B> {
    pub fn upload(ctx: &GpuContext<B>, mesh: &Mesh) -> Result<Self, GpuError> {
        let mut vertices = Buffer::new(ctx)?;
        let mut indices = Buffer::new(ctx)?;
        let mut vertex_array = VertexArray::new(ctx)?;

        vertices.upload(mesh.vertices());
        indices.upload(mesh.indices());
        for attribute in Vertex::ATTRIBUTES {
            vertex_array.attribute(attribute);
        }
        vertex_array.bind_buffers(&vertices, &indices, Vertex::STRIDE);

        let index_count = mesh.index_count();
        tracing::debug!(
            vertices = mesh.vertices().len(),
            indices = index_count,
            "uploaded mesh"
        );
        Ok(Self {
            vertices,
            indices,
            vertex_array,
            index_count,
        })
    }

    /// One indexed triangle draw with whatever program and target are bound.
    pub fn draw(&self) {
        self.vertex_array.draw_indexed(self.index_count);
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn vertex_array(&self) -> GpuHandle {
        self.vertex_array.handle()
    }

    pub fn vertex_buffer(&self) -> GpuHandle {
        self.vertices.handle()
    }

    pub fn index_buffer(&self) -> GpuHandle {
        self.indices.handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oceanview_gpu::{HeadlessBackend, ResourceKind};

    #[test]
    fn grid_counts_follow_size_and_resolution() {
        let mesh = Mesh::grid(20, 4).unwrap();
        assert_eq!(mesh.vertices().len(), 81 * 81);
        assert_eq!(mesh.indices().len(), 6 * 80 * 80);
        assert_eq!(mesh.stats().triangle_count, 2 * 80 * 80);
    }

    #[test]
    fn grid_is_deterministic() {
        assert_eq!(Mesh::grid(20, 4).unwrap(), Mesh::grid(20, 4).unwrap());
    }

    #[test]
    fn grid_is_centred_on_origin() {
        let mesh = Mesh::grid(20, 4).unwrap();
        let first = mesh.vertices()[0].position;
        let last = mesh.vertices()[mesh.vertices().len() - 1].position;
        assert_eq!(first, [-10.0, 0.0, -10.0]);
        assert_eq!(last, [10.0, 0.0, 10.0]);
        assert!(mesh.vertices().iter().all(|v| v.position[1] == 0.0));
    }

    #[test]
    fn first_quad_winding() {
        let mesh = Mesh::grid(1, 1).unwrap();
        assert_eq!(mesh.indices(), &[0, 2, 1, 1, 2, 3]);
    }

    #[test]
    fn indices_stay_in_range() {
        let mesh = Mesh::grid(6, 3).unwrap();
        let count = mesh.vertices().len() as u32;
        assert!(mesh.indices().iter().all(|&i| i < count));
    }

    #[test]
    fn oversized_grids_are_rejected() {
        // 65537^2 vertices overflow a u32 index.
        assert!(matches!(
            Mesh::grid(65536, 1),
            Err(RenderError::GridTooLarge {
                size: 65536,
                resolution: 1
            })
        ));
        // Vertices fit, but 6 * cells^2 indices do not.
        assert!(Mesh::grid(30000, 1).is_err());
        // 26754 cells per side is the last grid whose indices fit.
        assert!(Mesh::grid(26755, 1).is_err());
        assert!(Mesh::grid(u32::MAX, u32::MAX).is_err());
    }

    #[test]
    fn empty_resolution_yields_a_single_vertex() {
        let mesh = Mesh::grid(20, 0).unwrap();
        assert_eq!(mesh.vertices().len(), 1);
        assert_eq!(mesh.index_count(), 0);
    }

    #[test]
    fn index_count_matches_indices() {
        let mesh = Mesh::grid(3, 2).unwrap();
        assert_eq!(mesh.index_count() as usize, mesh.indices().len());
    }

    #[test]
    fn upload_fills_buffers_and_layout() {
        let ctx = GpuContext::new(HeadlessBackend::new());
        let mesh = Mesh::grid(2, 2).unwrap();
        let gpu = GpuMesh::upload(&ctx, &mesh).unwrap();

        let backend = ctx.backend();
        assert_eq!(
            backend.buffer_contents(gpu.vertex_buffer()).unwrap().len(),
            mesh.stats().vertex_bytes
        );
        assert_eq!(
            backend.buffer_contents(gpu.index_buffer()).unwrap().len(),
            mesh.stats().index_bytes
        );
        assert_eq!(
            backend.vertex_array_buffers_of(gpu.vertex_array()),
            Some((gpu.vertex_buffer(), gpu.index_buffer(), 12))
        );
        assert_eq!(backend.vertex_attributes(gpu.vertex_array()), Vertex::ATTRIBUTES);
        assert_eq!(backend.live_count(ResourceKind::Buffer), 2);
    }

    #[test]
    fn draw_issues_one_indexed_call() {
        let ctx = GpuContext::new(HeadlessBackend::new());
        let gpu = GpuMesh::upload(&ctx, &Mesh::grid(1, 1).unwrap()).unwrap();
        gpu.draw();
        let backend = ctx.backend();
        assert_eq!(backend.draw_calls().len(), 1);
        assert_eq!(backend.draw_calls()[0].index_count, 6);
        assert_eq!(backend.draw_calls()[0].vertex_array, Some(gpu.vertex_array()));
    }
}
