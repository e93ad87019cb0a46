use crate::handle::ResourceKind;
use crate::texture::TextureId;
use std::path::PathBuf;

/// Errors from GPU object construction and reallocation.
///
/// Incomplete render targets and ignored resizes are not errors; they are
/// reported through [`crate::Completeness`] and [`crate::ResizeOutcome`].
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("backend refused to allocate a {kind} handle")]
    AllocationFailed { kind: ResourceKind },
    #[error("failed to decode image {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("failed to read shader {}: {source}", path.display())]
    ShaderIo {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("shader `{label}` failed to compile: {message}")]
    ShaderCompile { label: String, message: String },
    #[error("invalid texture size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    PixelSizeMismatch { expected: usize, actual: usize },
    #[error("texture {0:?} is not in the store")]
    UnknownTexture(TextureId),
    #[error("texture `{label}` has static content and cannot be reallocated")]
    StaticTexture { label: String },
}
