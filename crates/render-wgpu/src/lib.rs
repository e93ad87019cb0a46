//! wgpu backend for the oceanview GPU layer.
//!
//! [`WgpuBackend`] implements [`oceanview_gpu::Backend`] on a wgpu device.
//! Programs are WGSL modules with `vs_main` and `fs_main` entry points that
//! read one uniform block at group 0 binding 0.
//!
//! # Invariants
//! - Handles are allocated by the same per-kind allocator as the headless
//!   backend, so both report identical handle values for the same call order.
//! - A draw never reaches the window surface; the presentation layer samples
//!   the offscreen colour texture through [`WgpuBackend::texture_view`].
//! - Pipelines are cached per program and dropped when the program is
//!   recompiled or destroyed.

mod backend;
mod convert;
mod pipeline;

pub use backend::WgpuBackend;
pub use pipeline::UniformBlock;

/// Features the backend uses when the adapter offers them.
pub const OPTIONAL_FEATURES: wgpu::Features = wgpu::Features::POLYGON_MODE_LINE;

/// Opens a device with [`OPTIONAL_FEATURES`] intersected with what the
/// adapter supports.
pub async fn request_device(
    adapter: &wgpu::Adapter,
) -> Result<(wgpu::Device, wgpu::Queue), wgpu::RequestDeviceError> {
    let features = adapter.features() & OPTIONAL_FEATURES;
    tracing::info!(?features, adapter = ?adapter.get_info().name, "requesting device");
    adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("oceanview_device"),
                required_features: features,
                required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
                memory_hints: Default::default(),
            },
            None,
        )
        .await
}
