//! Ocean renderer: composes the GPU object layer into a frame.
//!
//! The renderer is generic over [`oceanview_gpu::Backend`] and never depends
//! on a UI type. The UI consumes [`RenderedFrame`] and reads camera and shader
//! state through accessors.
//!
//! # Invariants
//! - `Renderer::resize` ignores non-positive sizes.
//! - On resize the viewport is updated before the render target, and the
//!   render target before the camera.
//! - A failed shader reload leaves the previous program in use.

mod camera;
mod mesh;
mod renderer;

pub use camera::{Camera, CameraMode, DEFAULT_CAMERA_SPEED};
pub use mesh::{GpuMesh, Mesh, MeshStats, Vertex};
pub use renderer::{RenderError, RenderedFrame, Renderer, RendererConfig, RendererStats};
