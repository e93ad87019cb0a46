use crate::convert;
use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use oceanview_gpu::{GpuHandle, PolygonMode, UniformValue, VertexAttribute};

/// Uniform block shared by every ocean program, bound at group 0 binding 0.
///
/// Field order and padding match the WGSL `Uniforms` struct in
/// `assets/shaders`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct UniformBlock {
    pub model: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub tint: [f32; 4],
    pub time: f32,
    pub _pad: [f32; 3],
}

impl Default for UniformBlock {
    fn default() -> Self {
        Self {
            model: Mat4::IDENTITY.to_cols_array_2d(),
            view: Mat4::IDENTITY.to_cols_array_2d(),
            projection: Mat4::IDENTITY.to_cols_array_2d(),
            tint: [1.0; 4],
            time: 0.0,
            _pad: [0.0; 3],
        }
    }
}

impl UniformBlock {
    pub const SIZE: u64 = std::mem::size_of::<UniformBlock>() as u64;

    /// Returns `false` when the block has no member with that name and type.
    pub fn set(&mut self, name: &str, value: UniformValue) -> bool {
        match (name, value) {
            ("model", UniformValue::Mat4(m)) => self.model = m.to_cols_array_2d(),
            ("view", UniformValue::Mat4(m)) => self.view = m.to_cols_array_2d(),
            ("projection", UniformValue::Mat4(m)) => self.projection = m.to_cols_array_2d(),
            ("tint", UniformValue::Vec4(v)) => self.tint = v.to_array(),
            ("tint", UniformValue::Vec3(v)) => self.tint = v.extend(1.0).to_array(),
            ("time", UniformValue::Float(t)) => self.time = t,
            _ => return false,
        }
        true
    }
}

/// Everything a render pipeline depends on. Pipelines are built lazily on the
/// first draw that needs a key and cached until their program goes away.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub program: GpuHandle,
    pub stride: u32,
    pub attributes: Vec<VertexAttribute>,
    pub color_formats: Vec<wgpu::TextureFormat>,
    pub depth_format: Option<wgpu::TextureFormat>,
    pub samples: u32,
    pub polygon_mode: PolygonMode,
}

pub fn uniform_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("uniform_bind_group_layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: wgpu::BufferSize::new(UniformBlock::SIZE),
            },
            count: None,
        }],
    })
}

/// Alpha-blended triangle list, back faces culled, depth tested when the
/// target carries a depth attachment.
pub fn build(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    key: &PipelineKey,
    polygon_mode: wgpu::PolygonMode,
) -> Option<wgpu::RenderPipeline> {
    let mut attributes = Vec::with_capacity(key.attributes.len());
    for attribute in &key.attributes {
        let Some(format) = convert::vertex_format(attribute) else {
            tracing::warn!(?attribute, "vertex attribute has no wgpu format");
            return None;
        };
        attributes.push(wgpu::VertexAttribute {
            format,
            offset: u64::from(attribute.offset),
            shader_location: attribute.index,
        });
    }
    let targets: Vec<Option<wgpu::ColorTargetState>> = key
        .color_formats
        .iter()
        .map(|&format| {
            Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })
        })
        .collect();

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("ocean_pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: u64::from(key.stride),
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &attributes,
            }],
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &targets,
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: Some(wgpu::Face::Back),
            polygon_mode,
            ..Default::default()
        },
        depth_stencil: key.depth_format.map(|format| wgpu::DepthStencilState {
            format,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: Default::default(),
            bias: Default::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: key.samples,
            ..Default::default()
        },
        multiview: None,
        cache: None,
    });
    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        tracing::warn!(program = %key.program, error = %err, "pipeline creation failed");
        return None;
    }
    Some(pipeline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec3, Vec4};

    #[test]
    fn block_matches_wgsl_layout() {
        // 3 mat4 + vec4 + f32 rounded up to 16-byte alignment.
        assert_eq!(UniformBlock::SIZE, 224);
    }

    #[test]
    fn known_members_are_written() {
        let mut block = UniformBlock::default();
        assert!(block.set("time", UniformValue::Float(2.5)));
        assert!(block.set("tint", UniformValue::Vec4(Vec4::new(0.1, 0.2, 0.3, 0.4))));
        let m = Mat4::from_translation(Vec3::X);
        assert!(block.set("model", UniformValue::Mat4(m)));
        assert_eq!(block.time, 2.5);
        assert_eq!(block.tint, [0.1, 0.2, 0.3, 0.4]);
        assert_eq!(block.model, m.to_cols_array_2d());
    }

    #[test]
    fn unknown_or_mistyped_members_are_rejected() {
        let mut block = UniformBlock::default();
        assert!(!block.set("colour", UniformValue::Float(1.0)));
        assert!(!block.set("time", UniformValue::Vec3(Vec3::ONE)));
        assert_eq!(block, UniformBlock::default());
    }

    #[test]
    fn vec3_tint_gets_opaque_alpha() {
        let mut block = UniformBlock::default();
        assert!(block.set("tint", UniformValue::Vec3(Vec3::new(0.5, 0.5, 0.5))));
        assert_eq!(block.tint, [0.5, 0.5, 0.5, 1.0]);
    }
}
