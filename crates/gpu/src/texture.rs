use crate::backend::{Backend, GpuContext};
use crate::error::GpuError;
use crate::handle::{GpuHandle, ResourceKind};
use crate::object::GpuObject;
use oceanview_common::Extent2d;
use serde::Serialize;
use slotmap::SlotMap;
use std::path::PathBuf;

slotmap::new_key_type! {
    /// Stable identity of a texture inside a [`TextureStore`].
    ///
    /// Unlike [`GpuHandle`], a `TextureId` survives reallocation.
    pub struct TextureId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TextureFormat {
    Rgba8,
    Rgb8,
    Depth24,
    Depth32Float,
    Depth24Stencil8,
}

impl TextureFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            TextureFormat::Rgb8 => 3,
            TextureFormat::Rgba8
            | TextureFormat::Depth24
            | TextureFormat::Depth32Float
            | TextureFormat::Depth24Stencil8 => 4,
        }
    }

    pub fn is_depth(self) -> bool {
        matches!(
            self,
            TextureFormat::Depth24 | TextureFormat::Depth32Float | TextureFormat::Depth24Stencil8
        )
    }

    pub fn has_stencil(self) -> bool {
        self == TextureFormat::Depth24Stencil8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FilterMode {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WrapMode {
    Repeat,
    ClampToEdge,
    MirroredRepeat,
}

/// Where a texture's content comes from. Each variant has its own
/// construction path; only `Empty` textures can be reallocated.
#[derive(Debug, Clone, PartialEq)]
pub enum TextureSource {
    /// Decoded from an image file, immutable afterwards.
    File(PathBuf),
    /// Uninitialised storage, used for render target attachments.
    Empty,
    /// Raw pixels matching the descriptor's size and format.
    Pixels(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureDescriptor {
    pub label: String,
    pub source: TextureSource,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub filter: FilterMode,
    pub wrap: WrapMode,
    pub samples: u32,
}

impl TextureDescriptor {
    /// Size and format are taken from the decoded image.
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            label: path.display().to_string(),
            source: TextureSource::File(path),
            width: 0,
            height: 0,
            format: TextureFormat::Rgba8,
            filter: FilterMode::Nearest,
            wrap: WrapMode::Repeat,
            samples: 1,
        }
    }

    pub fn empty(label: impl Into<String>, extent: Extent2d, format: TextureFormat) -> Self {
        Self {
            label: label.into(),
            source: TextureSource::Empty,
            width: extent.width(),
            height: extent.height(),
            format,
            filter: FilterMode::Linear,
            wrap: WrapMode::ClampToEdge,
            samples: 1,
        }
    }

    pub fn with_pixels(
        label: impl Into<String>,
        extent: Extent2d,
        format: TextureFormat,
        pixels: Vec<u8>,
    ) -> Self {
        Self {
            source: TextureSource::Pixels(pixels),
            filter: FilterMode::Nearest,
            wrap: WrapMode::Repeat,
            ..Self::empty(label, extent, format)
        }
    }

    pub fn filter(mut self, filter: FilterMode) -> Self {
        self.filter = filter;
        self
    }

    pub fn wrap(mut self, wrap: WrapMode) -> Self {
        self.wrap = wrap;
        self
    }

    pub fn samples(mut self, samples: u32) -> Self {
        self.samples = samples.max(1);
        self
    }

    fn extent(&self) -> Result<Extent2d, GpuError> {
        Extent2d::new(self.width, self.height).ok_or(GpuError::InvalidSize {
            width: self.width,
            height: self.height,
        })
    }

    fn storage(&self, extent: Extent2d) -> TextureStorage {
        TextureStorage {
            extent,
            format: self.format,
            samples: self.samples,
            filter: self.filter,
            wrap: self.wrap,
        }
    }
}

/// What the backend needs to allocate one texture's storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TextureStorage {
    pub extent: Extent2d,
    pub format: TextureFormat,
    pub samples: u32,
    pub filter: FilterMode,
    pub wrap: WrapMode,
}

/// One 2-D image resource.
#[derive(Debug)]
pub struct Texture<B: Backend> {
    object: GpuObject<B>,
    descriptor: TextureDescriptor,
}

impl<B: Backend> Texture<B> {
    /// Allocates storage and uploads any initial content.
    ///
    /// A file that cannot be decoded is an error; no texture is created.
    pub fn new(ctx: &GpuContext<B>, descriptor: TextureDescriptor) -> Result<Self, GpuError> {
        let mut descriptor = descriptor;
        let pixels = match &descriptor.source {
            TextureSource::File(path) => {
                let image = image::open(path)
                    .map_err(|source| GpuError::Decode {
                        path: path.clone(),
                        source,
                    })?
                    .to_rgba8();
                let (width, height) = image.dimensions();
                descriptor.width = width;
                descriptor.height = height;
                descriptor.format = TextureFormat::Rgba8;
                tracing::info!(path = %path.display(), width, height, "decoded texture image");
                Some(image.into_raw())
            }
            TextureSource::Empty => None,
            TextureSource::Pixels(bytes) => {
                let expected = descriptor.width as usize
                    * descriptor.height as usize
                    * descriptor.format.bytes_per_pixel();
                if bytes.len() != expected {
                    return Err(GpuError::PixelSizeMismatch {
                        expected,
                        actual: bytes.len(),
                    });
                }
                Some(bytes.clone())
            }
        };

        let extent = descriptor.extent()?;
        let object = allocate(ctx, &descriptor.storage(extent))?;
        if let Some(pixels) = pixels {
            ctx.backend_mut().texture_upload(object.handle(), &pixels);
        }
        tracing::debug!(
            label = %descriptor.label,
            handle = %object.handle(),
            %extent,
            "created texture"
        );
        Ok(Self { object, descriptor })
    }

    /// Replaces the backend resource with a new one of the given size, keeping
    /// format, filter, wrap and sample count.
    ///
    /// The replacement is allocated before the old handle is released, so on
    /// error the texture keeps its previous, valid storage. The handle value
    /// changes on success; anything that bound the old handle must rebind.
    pub fn reallocate(&mut self, width: u32, height: u32) -> Result<(), GpuError> {
        if self.descriptor.source != TextureSource::Empty {
            return Err(GpuError::StaticTexture {
                label: self.descriptor.label.clone(),
            });
        }
        let extent = Extent2d::new(width, height).ok_or(GpuError::InvalidSize { width, height })?;
        let replacement = allocate(self.object.context(), &self.descriptor.storage(extent))?;
        let previous = std::mem::replace(&mut self.object, replacement);
        tracing::debug!(
            label = %self.descriptor.label,
            from = %previous.handle(),
            to = %self.object.handle(),
            %extent,
            "reallocated texture"
        );
        drop(previous);
        self.descriptor.width = width;
        self.descriptor.height = height;
        Ok(())
    }

    /// Makes this texture active at a sampler unit for the next draw.
    pub fn bind(&self, unit: u32) {
        self.object
            .context()
            .backend_mut()
            .bind_texture_unit(unit, self.object.handle());
    }

    pub fn handle(&self) -> GpuHandle {
        self.object.handle()
    }

    pub fn width(&self) -> u32 {
        self.descriptor.width
    }

    pub fn height(&self) -> u32 {
        self.descriptor.height
    }

    pub fn extent(&self) -> Option<Extent2d> {
        Extent2d::new(self.descriptor.width, self.descriptor.height)
    }

    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }
}

fn allocate<B: Backend>(
    ctx: &GpuContext<B>,
    storage: &TextureStorage,
) -> Result<GpuObject<B>, GpuError> {
    let object = GpuObject::new(ctx, ResourceKind::Texture)?;
    let result = ctx.backend_mut().texture_storage(object.handle(), storage);
    result.map(|()| object)
}

/// Owner of texture lifetimes.
///
/// Render targets refer to textures by [`TextureId`] and resolve them here;
/// dropping the store releases every texture it holds.
#[derive(Debug)]
pub struct TextureStore<B: Backend> {
    textures: SlotMap<TextureId, Texture<B>>,
}

impl<B: Backend> TextureStore<B> {
    pub fn new() -> Self {
        Self {
            textures: SlotMap::with_key(),
        }
    }

    pub fn create(
        &mut self,
        ctx: &GpuContext<B>,
        descriptor: TextureDescriptor,
    ) -> Result<TextureId, GpuError> {
        let texture = Texture::new(ctx, descriptor)?;
        Ok(self.insert(texture))
    }

    pub fn insert(&mut self, texture: Texture<B>) -> TextureId {
        self.textures.insert(texture)
    }

    pub fn get(&self, id: TextureId) -> Option<&Texture<B>> {
        self.textures.get(id)
    }

    pub fn get_mut(&mut self, id: TextureId) -> Option<&mut Texture<B>> {
        self.textures.get_mut(id)
    }

    /// Hands ownership back to the caller. Render targets still naming `id`
    /// become incomplete once the texture is dropped.
    pub fn remove(&mut self, id: TextureId) -> Option<Texture<B>> {
        self.textures.remove(id)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TextureId, &Texture<B>)> {
        self.textures.iter()
    }
}

impl<B: Backend> Default for TextureStore<B> {
    fn default() -> Self {
        Self::new()
    }
}
