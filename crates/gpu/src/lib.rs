//! GPU resource lifecycle layer.
//!
//! Every object in this crate owns exactly one backend handle and releases it
//! when dropped. The device itself sits behind the [`Backend`] trait: the
//! in-memory [`HeadlessBackend`] lives here, the wgpu implementation lives in
//! `oceanview-render-wgpu`.
//!
//! # Invariants
//! - A handle is unique among live objects of its [`ResourceKind`].
//! - Objects cannot be cloned; dropping one releases its handle exactly once.
//! - A [`RenderTarget`] never owns its textures. They live in a
//!   [`TextureStore`] and are referenced by [`TextureId`].
//! - After [`RenderTarget::resize`] every attachment reports the new size and
//!   is bound to the texture's current handle.

mod backend;
mod buffer;
mod error;
mod handle;
mod headless;
mod object;
mod program;
mod target;
mod texture;

pub use backend::{Backend, ComponentType, GpuContext, PolygonMode, VertexAttribute};
pub use buffer::{Buffer, StorageBuffer, VertexArray};
pub use error::GpuError;
pub use handle::{GpuHandle, HandleAllocator, ResourceKind};
pub use headless::{DrawCall, HeadlessBackend, MAX_TEXTURE_DIMENSION};
pub use object::GpuObject;
pub use program::{Program, ShaderTable, UniformValue, validate_stages};
pub use target::{
    Attachment, AttachmentInfo, AttachmentPoint, Completeness, RenderTarget, ResizeOutcome,
    evaluate_completeness,
};
pub use texture::{
    FilterMode, Texture, TextureDescriptor, TextureFormat, TextureId, TextureSource,
    TextureStorage, TextureStore, WrapMode,
};
