use glam::Vec3;
use oceanview_common::Extent2d;
use oceanview_gpu::{Completeness, GpuContext, GpuHandle, HeadlessBackend, ResizeOutcome, ResourceKind};
use oceanview_input::{InputState, Key};
use oceanview_render::{CameraMode, Renderer, RendererConfig, RendererStats};
use serde::Serialize;
use std::str::FromStr;

/// A `WIDTHxHEIGHT` pair. Signed so that non-positive sizes can be fed to
/// the renderer and observed being ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeArg {
    pub width: i32,
    pub height: i32,
}

impl FromStr for SizeArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got `{s}`"))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<i32>()
                .map_err(|e| format!("bad dimension `{v}`: {e}"))
        };
        Ok(Self {
            width: parse(w)?,
            height: parse(h)?,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ResizeStep {
    pub requested: (i32, i32),
    pub ignored: bool,
    pub extent: Extent2d,
    pub status: Option<Completeness>,
    pub color: GpuHandle,
    pub camera_aspect: f32,
    pub live_textures: usize,
}

#[derive(Debug, Serialize)]
pub struct ResizeReport {
    pub initial: Extent2d,
    pub steps: Vec<ResizeStep>,
}

/// Feeds each size through [`Renderer::resize`] on the headless backend.
pub fn resize_run(config: RendererConfig, sizes: &[SizeArg]) -> anyhow::Result<ResizeReport> {
    let ctx = GpuContext::new(HeadlessBackend::new());
    let mut renderer = Renderer::new(&ctx, config)?;
    let initial = renderer.extent();
    let mut steps = Vec::with_capacity(sizes.len());
    for size in sizes {
        let outcome = renderer.resize(size.width, size.height)?;
        let (ignored, status) = match outcome {
            ResizeOutcome::Ignored => (true, None),
            ResizeOutcome::Resized { status, .. } => (false, Some(status)),
        };
        steps.push(ResizeStep {
            requested: (size.width, size.height),
            ignored,
            extent: renderer.extent(),
            status,
            color: renderer.color_handle(),
            camera_aspect: renderer.camera().aspect(),
            live_textures: ctx.backend().live_count(ResourceKind::Texture),
        });
    }
    tracing::info!(steps = steps.len(), final_extent = %renderer.extent(), "resize run finished");
    Ok(ResizeReport { initial, steps })
}

#[derive(Debug, Serialize)]
pub struct FrameReport {
    pub stats: RendererStats,
    pub draw_calls: usize,
    pub clears: usize,
    pub flushes: u64,
    pub last_eye: Vec3,
}

/// Renders `count` frames at a fixed step. In free mode the cursor is
/// captured and W is held so the camera actually travels.
pub fn frame_run(
    config: RendererConfig,
    count: u32,
    dt: f32,
    wireframe: bool,
) -> anyhow::Result<FrameReport> {
    let ctx = GpuContext::new(HeadlessBackend::new());
    let mut renderer = Renderer::new(&ctx, config)?;
    renderer.set_wireframe(wireframe);

    let mut input = InputState::new();
    if renderer.camera().mode() == CameraMode::Free {
        input.set_cursor_captured(true);
        input.key_down(Key::W);
    }

    let mut last_eye = renderer.camera().eye();
    for _ in 0..count {
        renderer.update(&input, dt);
        last_eye = renderer.render().eye;
        input.end_frame();
    }

    tracing::info!(frames = count, mode = %renderer.camera().mode(), "frame run finished");
    let backend = ctx.backend();
    Ok(FrameReport {
        stats: renderer.stats(),
        draw_calls: backend.draw_calls().len(),
        clears: backend.clear_count(),
        flushes: backend.flush_count(),
        last_eye,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SHADER: &str = "@vertex fn vs_main() {}\n@fragment fn fs_main() {}\n";

    fn config() -> (TempDir, RendererConfig) {
        let dir = tempfile::tempdir().unwrap();
        for name in ["default", "ocean"] {
            std::fs::write(dir.path().join(format!("{name}.wgsl")), SHADER).unwrap();
        }
        let config = RendererConfig {
            shader_dir: dir.path().to_path_buf(),
            grid_size: 2,
            grid_resolution: 1,
            width: 64,
            height: 32,
            ..RendererConfig::default()
        };
        (dir, config)
    }

    #[test]
    fn size_arg_parses() {
        assert_eq!(
            "800x600".parse::<SizeArg>(),
            Ok(SizeArg {
                width: 800,
                height: 600
            })
        );
        assert_eq!(
            "-1X5".parse::<SizeArg>(),
            Ok(SizeArg {
                width: -1,
                height: 5
            })
        );
        assert!("800".parse::<SizeArg>().is_err());
        assert!("ax3".parse::<SizeArg>().is_err());
    }

    #[test]
    fn resize_run_reports_each_step() {
        let (_dir, config) = config();
        let sizes = [
            SizeArg {
                width: 128,
                height: 64,
            },
            SizeArg {
                width: 0,
                height: 64,
            },
        ];
        let report = resize_run(config, &sizes).unwrap();
        assert_eq!(report.initial, Extent2d::new(64, 32).unwrap());
        assert_eq!(report.steps.len(), 2);

        let grown = &report.steps[0];
        assert!(!grown.ignored);
        assert_eq!(grown.status, Some(Completeness::Complete));
        assert_eq!(grown.extent, Extent2d::new(128, 64).unwrap());
        assert_eq!(grown.camera_aspect, 2.0);
        assert_eq!(grown.live_textures, 2);

        let ignored = &report.steps[1];
        assert!(ignored.ignored);
        assert_eq!(ignored.extent, grown.extent);
        assert_eq!(ignored.color, grown.color);
    }

    #[test]
    fn frame_run_draws_once_per_frame() {
        let (_dir, config) = config();
        let report = frame_run(config, 5, 0.1, true).unwrap();
        assert_eq!(report.draw_calls, 5);
        assert_eq!(report.clears, 5);
        assert_eq!(report.flushes, 5);
        assert_eq!(report.stats.frames, 5);
        assert!(report.stats.wireframe);
    }

    #[test]
    fn free_frame_run_moves_the_camera() {
        let (_dir, config) = config();
        let config = RendererConfig {
            camera_mode: CameraMode::Free,
            ..config
        };
        let report = frame_run(config, 10, 0.1, false).unwrap();
        assert!(report.last_eye.z < 2.0);
    }

    #[test]
    fn reports_serialise() {
        let (_dir, config) = config();
        let report = frame_run(config, 1, 0.016, false).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["draw_calls"], 1);
        assert_eq!(json["stats"]["frames"], 1);
    }
}
