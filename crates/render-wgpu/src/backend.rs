use crate::convert;
use crate::pipeline::{self, PipelineKey, UniformBlock};
use oceanview_common::{ClearColor, Extent2d};
use oceanview_gpu::{
    AttachmentInfo, AttachmentPoint, Backend, Completeness, GpuError, GpuHandle, HandleAllocator,
    PolygonMode, ResourceKind, TextureFormat, TextureStorage, UniformValue, VertexAttribute,
    evaluate_completeness, validate_stages,
};
use std::collections::{BTreeMap, HashMap};
use wgpu::util::DeviceExt;

#[derive(Debug, Default)]
struct BufferRecord {
    /// `None` until the first non-empty upload.
    buffer: Option<wgpu::Buffer>,
}

#[derive(Debug, Default)]
struct VertexArrayRecord {
    vertices: Option<GpuHandle>,
    indices: Option<GpuHandle>,
    stride: u32,
    attributes: Vec<VertexAttribute>,
}

#[derive(Debug)]
struct TextureRecord {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    storage: TextureStorage,
}

#[derive(Debug, Default)]
struct FramebufferRecord {
    attachments: BTreeMap<AttachmentPoint, GpuHandle>,
    draw_targets: Vec<AttachmentPoint>,
}

#[derive(Debug)]
struct ProgramRecord {
    label: String,
    module: Option<wgpu::ShaderModule>,
    uniforms: UniformBlock,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

#[derive(Debug, Clone, Copy)]
struct PendingClear {
    color: ClearColor,
    depth: f32,
}

/// Views resolved from a framebuffer for one pass.
struct PassTargets {
    colors: Vec<(wgpu::TextureView, wgpu::TextureFormat)>,
    depth: Option<(wgpu::TextureView, wgpu::TextureFormat)>,
    extent: Extent2d,
    samples: u32,
}

/// [`Backend`] over a wgpu device.
///
/// Work is recorded into one command encoder per frame and submitted by
/// [`Backend::flush`]. Clears are deferred and folded into the load operation
/// of the next pass on the same framebuffer. Only offscreen framebuffers are
/// drawn to; the window surface belongs to the presentation layer.
#[derive(Debug)]
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    handles: HandleAllocator,
    uniform_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    buffers: HashMap<GpuHandle, BufferRecord>,
    storage_buffers: HashMap<GpuHandle, BufferRecord>,
    vertex_arrays: HashMap<GpuHandle, VertexArrayRecord>,
    textures: HashMap<GpuHandle, Option<TextureRecord>>,
    framebuffers: HashMap<GpuHandle, FramebufferRecord>,
    programs: HashMap<GpuHandle, ProgramRecord>,
    bound_vertex_array: Option<GpuHandle>,
    bound_framebuffer: Option<GpuHandle>,
    current_program: Option<GpuHandle>,
    viewport: Option<Extent2d>,
    polygon_mode: PolygonMode,
    pending_clears: BTreeMap<GpuHandle, PendingClear>,
    encoder: Option<wgpu::CommandEncoder>,
}

impl WgpuBackend {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let uniform_layout = pipeline::uniform_layout(&device);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("ocean_pipeline_layout"),
            bind_group_layouts: &[&uniform_layout],
            push_constant_ranges: &[],
        });
        Self {
            device,
            queue,
            handles: HandleAllocator::new(),
            uniform_layout,
            pipeline_layout,
            pipelines: HashMap::new(),
            buffers: HashMap::new(),
            storage_buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            programs: HashMap::new(),
            bound_vertex_array: None,
            bound_framebuffer: None,
            current_program: None,
            viewport: None,
            polygon_mode: PolygonMode::Fill,
            pending_clears: BTreeMap::new(),
            encoder: None,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// View of a texture with allocated storage, for sampling it elsewhere
    /// (the desktop app hands it to egui).
    pub fn texture_view(&self, texture: GpuHandle) -> Option<&wgpu::TextureView> {
        self.textures
            .get(&texture)?
            .as_ref()
            .map(|record| &record.view)
    }

    /// Sampling settings of a texture, from the filter and wrap modes it was
    /// allocated with.
    pub fn sampler_descriptor(
        &self,
        texture: GpuHandle,
    ) -> Option<wgpu::SamplerDescriptor<'static>> {
        self.texture_storage_of(texture)
            .map(|storage| convert::sampler_descriptor(&storage))
    }

    fn upload_buffer(
        &self,
        label: &str,
        usage: wgpu::BufferUsages,
        bytes: &[u8],
    ) -> Option<wgpu::Buffer> {
        if bytes.is_empty() {
            return None;
        }
        Some(
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(label),
                    contents: bytes,
                    usage,
                }),
        )
    }

    fn create_program_record(&self, handle: GpuHandle) -> ProgramRecord {
        let uniforms = UniformBlock::default();
        let uniform_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("uniform_buffer"),
                contents: bytemuck::bytes_of(&uniforms),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("uniform_bind_group"),
            layout: &self.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });
        ProgramRecord {
            label: format!("program {handle}"),
            module: None,
            uniforms,
            uniform_buffer,
            bind_group,
        }
    }

    fn texture_storage_of(&self, texture: GpuHandle) -> Option<TextureStorage> {
        self.textures
            .get(&texture)?
            .as_ref()
            .map(|record| record.storage)
    }

    /// Colour views in draw-target order plus the depth view, if any.
    fn pass_targets(&self, framebuffer: GpuHandle) -> Option<PassTargets> {
        let fb = self.framebuffers.get(&framebuffer)?;
        let mut colors = Vec::new();
        let mut extent = None;
        let mut samples = 1;
        let mut resolve = |texture: &GpuHandle| {
            let record = self.textures.get(texture)?.as_ref()?;
            extent = Some(record.storage.extent);
            samples = record.storage.samples;
            Some((
                record.view.clone(),
                convert::texture_format(record.storage.format),
            ))
        };
        for point in &fb.draw_targets {
            let texture = fb.attachments.get(point)?;
            colors.push(resolve(texture)?);
        }
        let depth = fb
            .attachments
            .iter()
            .find(|(point, _)| !point.is_color())
            .and_then(|(_, texture)| resolve(texture));
        Some(PassTargets {
            colors,
            depth,
            extent: extent?,
            samples,
        })
    }

    fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        let device = &self.device;
        self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            })
        })
    }

    /// Line rasterisation needs a device feature; without it wireframe falls
    /// back to filled triangles.
    fn wgpu_polygon_mode(&self, mode: PolygonMode) -> wgpu::PolygonMode {
        match mode {
            PolygonMode::Fill => wgpu::PolygonMode::Fill,
            PolygonMode::Line
                if self
                    .device
                    .features()
                    .contains(wgpu::Features::POLYGON_MODE_LINE) =>
            {
                wgpu::PolygonMode::Line
            }
            PolygonMode::Line => {
                tracing::debug!("POLYGON_MODE_LINE unavailable, drawing filled");
                wgpu::PolygonMode::Fill
            }
        }
    }

    fn ensure_pipeline(&mut self, key: &PipelineKey) -> bool {
        if self.pipelines.contains_key(key) {
            return true;
        }
        let Some(module) = self
            .programs
            .get(&key.program)
            .and_then(|p| p.module.as_ref())
        else {
            tracing::warn!(program = %key.program, "draw with an uncompiled program");
            return false;
        };
        let mode = self.wgpu_polygon_mode(key.polygon_mode);
        let Some(built) = pipeline::build(&self.device, &self.pipeline_layout, module, key, mode)
        else {
            return false;
        };
        tracing::debug!(program = %key.program, cached = self.pipelines.len() + 1, "built pipeline");
        self.pipelines.insert(key.clone(), built);
        true
    }
}

fn begin_pass<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    targets: &PassTargets,
    clear: Option<PendingClear>,
) -> wgpu::RenderPass<'e> {
    let color_load = match clear {
        Some(c) => wgpu::LoadOp::Clear(convert::color(c.color)),
        None => wgpu::LoadOp::Load,
    };
    let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment<'_>>> = targets
        .colors
        .iter()
        .map(|(view, _)| {
            Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: color_load,
                    store: wgpu::StoreOp::Store,
                },
            })
        })
        .collect();
    let depth_stencil_attachment =
        targets
            .depth
            .as_ref()
            .map(|(view, format)| wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: format.has_depth_aspect().then_some(wgpu::Operations {
                    load: match clear {
                        Some(c) => wgpu::LoadOp::Clear(c.depth),
                        None => wgpu::LoadOp::Load,
                    },
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: format.has_stencil_aspect().then_some(wgpu::Operations {
                    load: match clear {
                        Some(_) => wgpu::LoadOp::Clear(0),
                        None => wgpu::LoadOp::Load,
                    },
                    store: wgpu::StoreOp::Store,
                }),
            });
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("ocean_pass"),
        color_attachments: &color_attachments,
        depth_stencil_attachment,
        timestamp_writes: None,
        occlusion_query_set: None,
    })
}

impl Backend for WgpuBackend {
    fn create(&mut self, kind: ResourceKind) -> Result<GpuHandle, GpuError> {
        let handle = self.handles.allocate(kind);
        match kind {
            ResourceKind::Buffer => {
                self.buffers.insert(handle, BufferRecord::default());
            }
            ResourceKind::StorageBuffer => {
                self.storage_buffers.insert(handle, BufferRecord::default());
            }
            ResourceKind::VertexArray => {
                self.vertex_arrays
                    .insert(handle, VertexArrayRecord::default());
            }
            ResourceKind::Texture => {
                self.textures.insert(handle, None);
            }
            ResourceKind::RenderTarget => {
                self.framebuffers
                    .insert(handle, FramebufferRecord::default());
            }
            ResourceKind::Program => {
                let record = self.create_program_record(handle);
                self.programs.insert(handle, record);
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
            }
            ResourceKind::VertexArray => {
                self.vertex_arrays.remove(&handle);
                if self.bound_vertex_array == Some(handle) {
                    self.bound_vertex_array = None;
                }
            }
            ResourceKind::Texture => {
                if let Some(Some(record)) = self.textures.remove(&handle) {
                    record.texture.destroy();
                }
            }
            ResourceKind::RenderTarget => {
                self.framebuffers.remove(&handle);
                self.pending_clears.remove(&handle);
                if self.bound_framebuffer == Some(handle) {
                    self.bound_framebuffer = None;
                }
            }
            ResourceKind::Program => {
                self.programs.remove(&handle);
                self.pipelines.retain(|key, _| key.program != handle);
                if self.current_program == Some(handle) {
                    self.current_program = None;
                }
            }
        }
    }

    fn buffer_data(&mut self, buffer: GpuHandle, bytes: &[u8]) {
        let usage = wgpu::BufferUsages::VERTEX
            | wgpu::BufferUsages::INDEX
            | wgpu::BufferUsages::COPY_DST;
        let uploaded = self.upload_buffer("mesh_buffer", usage, bytes);
        if let Some(record) = self.buffers.get_mut(&buffer) {
            record.buffer = uploaded;
        }
    }

    fn storage_buffer_data(&mut self, buffer: GpuHandle, binding: u32, bytes: &[u8]) {
        let usage = wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST;
        let uploaded = self.upload_buffer("storage_buffer", usage, bytes);
        if let Some(record) = self.storage_buffers.get_mut(&buffer) {
            record.buffer = uploaded;
            tracing::trace!(%buffer, binding, "storage buffer uploaded; ocean programs bind only uniforms");
        }
    }

    fn vertex_array_buffers(
        &mut self,
        vertex_array: GpuHandle,
        vertices: GpuHandle,
        indices: GpuHandle,
        stride: u32,
    ) {
        if let Some(record) = self.vertex_arrays.get_mut(&vertex_array) {
            record.vertices = Some(vertices);
            record.indices = Some(indices);
            record.stride = stride;
        }
    }

    fn vertex_array_attribute(&mut self, vertex_array: GpuHandle, attribute: VertexAttribute) {
        if let Some(record) = self.vertex_arrays.get_mut(&vertex_array) {
            record.attributes.retain(|a| a.index != attribute.index);
            record.attributes.push(attribute);
            record.attributes.sort_by_key(|a| a.index);
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
        let max = self.device.limits().max_texture_dimension_2d;
        if storage.extent.width() > max
            || storage.extent.height() > max
            || !matches!(storage.samples, 1 | 4)
        {
            return Err(GpuError::AllocationFailed {
                kind: ResourceKind::Texture,
            });
        }
        let mut usage =
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
        if storage.samples == 1 {
            usage |= wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::COPY_SRC;
        }
        let new_texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("ocean_texture"),
            size: wgpu::Extent3d {
                width: storage.extent.width(),
                height: storage.extent.height(),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: storage.samples,
            dimension: wgpu::TextureDimension::D2,
            format: convert::texture_format(storage.format),
            usage,
            view_formats: &[],
        });
        let view = new_texture.create_view(&wgpu::TextureViewDescriptor::default());
        if let Some(slot) = self.textures.get_mut(&texture) {
            if let Some(old) = slot.replace(TextureRecord {
                texture: new_texture,
                view,
                storage: *storage,
            }) {
                old.texture.destroy();
            }
        }
        Ok(())
    }

    fn texture_upload(&mut self, texture: GpuHandle, pixels: &[u8]) {
        let Some(Some(record)) = self.textures.get(&texture) else {
            tracing::warn!(%texture, "upload to a texture without storage");
            return;
        };
        let storage = record.storage;
        let data = match storage.format {
            TextureFormat::Rgba8 => std::borrow::Cow::Borrowed(pixels),
            TextureFormat::Rgb8 => std::borrow::Cow::Owned(convert::expand_rgb(pixels)),
            TextureFormat::Depth24 | TextureFormat::Depth32Float | TextureFormat::Depth24Stencil8 => {
                tracing::warn!(%texture, "depth textures cannot be uploaded; skipped");
                return;
            }
        };
        if storage.samples != 1 {
            tracing::warn!(%texture, "multisampled textures cannot be uploaded; skipped");
            return;
        }
        let (width, height) = (storage.extent.width(), storage.extent.height());
        if data.len() != (width as usize) * (height as usize) * 4 {
            tracing::warn!(%texture, bytes = data.len(), "pixel data does not match storage");
            return;
        }
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &record.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    fn bind_texture_unit(&mut self, unit: u32, texture: GpuHandle) {
        tracing::trace!(unit, %texture, "texture unit ignored; ocean programs bind only uniforms");
    }

    fn framebuffer_attach(
        &mut self,
        framebuffer: GpuHandle,
        point: AttachmentPoint,
        texture: Option<GpuHandle>,
    ) {
        if let Some(fb) = self.framebuffers.get_mut(&framebuffer) {
            match texture {
                Some(texture) => {
                    fb.attachments.insert(point, texture);
                }
                None => {
                    fb.attachments.remove(&point);
                }
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
                storage: self.texture_storage_of(*texture),
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

    fn clear(&mut self, color: ClearColor, depth: f32) {
        match self.bound_framebuffer {
            Some(fb) => {
                self.pending_clears.insert(fb, PendingClear { color, depth });
            }
            None => tracing::debug!("clear of the window surface ignored"),
        }
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
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(GpuError::ShaderCompile {
                label: label.to_owned(),
                message: err.to_string(),
            });
        }
        if let Some(record) = self.programs.get_mut(&program) {
            record.label = label.to_owned();
            record.module = Some(module);
            record.uniforms = UniformBlock::default();
        }
        self.pipelines.retain(|key, _| key.program != program);
        Ok(())
    }

    fn use_program(&mut self, program: Option<GpuHandle>) {
        self.current_program = program;
    }

    fn set_uniform(&mut self, program: GpuHandle, name: &str, value: UniformValue) {
        if let Some(record) = self.programs.get_mut(&program) {
            if !record.uniforms.set(name, value) {
                tracing::debug!(program = %record.label, name, "no such uniform; ignored");
            }
        }
    }

    fn draw_indexed(&mut self, index_count: u32) {
        let (Some(framebuffer), Some(program), Some(vertex_array)) = (
            self.bound_framebuffer,
            self.current_program,
            self.bound_vertex_array,
        ) else {
            tracing::warn!("draw needs a bound framebuffer, program and vertex array; skipped");
            return;
        };
        let Some(targets) = self.pass_targets(framebuffer) else {
            tracing::warn!(%framebuffer, "framebuffer has unresolved attachments; draw skipped");
            return;
        };
        let Some(va) = self.vertex_arrays.get(&vertex_array) else {
            return;
        };
        let (vertex_buffer, index_buffer) = (va.vertices, va.indices);
        let key = PipelineKey {
            program,
            stride: va.stride,
            attributes: va.attributes.clone(),
            color_formats: targets.colors.iter().map(|(_, format)| *format).collect(),
            depth_format: targets.depth.as_ref().map(|(_, format)| *format),
            samples: targets.samples,
            polygon_mode: self.polygon_mode,
        };
        if !self.ensure_pipeline(&key) {
            return;
        }

        let buffer_of = |handle: Option<GpuHandle>| {
            handle
                .and_then(|h| self.buffers.get(&h))
                .and_then(|record| record.buffer.clone())
        };
        let (Some(vertices), Some(indices)) = (buffer_of(vertex_buffer), buffer_of(index_buffer))
        else {
            tracing::warn!(%vertex_array, "vertex array has no uploaded buffers; draw skipped");
            return;
        };
        let (Some(record), Some(pipeline)) =
            (self.programs.get(&program), self.pipelines.get(&key))
        else {
            return;
        };
        self.queue.write_buffer(
            &record.uniform_buffer,
            0,
            bytemuck::bytes_of(&record.uniforms),
        );
        let pipeline = pipeline.clone();
        let bind_group = record.bind_group.clone();
        let viewport = self.viewport.unwrap_or(targets.extent);
        let width = viewport.width().min(targets.extent.width());
        let height = viewport.height().min(targets.extent.height());
        let clear = self.pending_clears.remove(&framebuffer);

        let encoder = self.encoder();
        let mut pass = begin_pass(encoder, &targets, clear);
        pass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
        pass.set_pipeline(&pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.set_vertex_buffer(0, vertices.slice(..));
        pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..index_count, 0, 0..1);
    }

    fn flush(&mut self) {
        let leftover: Vec<(GpuHandle, PendingClear)> =
            std::mem::take(&mut self.pending_clears).into_iter().collect();
        for (framebuffer, clear) in leftover {
            if let Some(targets) = self.pass_targets(framebuffer) {
                let encoder = self.encoder();
                drop(begin_pass(encoder, &targets, Some(clear)));
            }
        }
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(std::iter::once(encoder.finish()));
        }
    }
}
