use crate::spectrum::Spectrum;
use crate::viewport::ViewportTracker;
use egui::{Color32, Pos2, Sense, Shape, Stroke, Vec2};
use oceanview_gpu::Backend;
use oceanview_render::{CameraMode, Renderer};

/// UI-only state that survives between frames.
#[derive(Debug, Default)]
pub struct UiState {
    pub tracker: ViewportTracker,
    pub spectrum: Spectrum,
    fps: f32,
}

impl UiState {
    pub fn tick(&mut self, dt: f32) {
        if dt > 0.0 {
            let instant = 1.0 / dt;
            self.fps = if self.fps == 0.0 {
                instant
            } else {
                self.fps * 0.9 + instant * 0.1
            };
        }
        self.spectrum.advance(dt);
    }
}

pub fn side_panel<B: Backend>(ctx: &egui::Context, state: &mut UiState, renderer: &mut Renderer<B>) {
    egui::SidePanel::left("settings")
        .default_width(320.0)
        .show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                info_section(ui, state, renderer);
                camera_section(ui, renderer);
                ocean_section(ui, renderer);
                spectrum_section(ui, &mut state.spectrum);
            });
        });
}

/// The offscreen colour attachment fills the remaining space. Returns a
/// settled new size for the renderer, if any.
pub fn viewport_panel(
    ctx: &egui::Context,
    tracker: &mut ViewportTracker,
    texture: Option<egui::TextureId>,
) -> Option<(i32, i32)> {
    let released = ctx.input(|i| i.pointer.primary_released());
    egui::CentralPanel::default()
        .frame(egui::Frame::NONE)
        .show(ctx, |ui| {
            let size = ui.available_size();
            if let Some(id) = texture {
                ui.add(egui::Image::new(egui::load::SizedTexture::new(id, size)));
            }
            tracker.observe(size, released)
        })
        .inner
}

fn info_section<B: Backend>(ui: &mut egui::Ui, state: &UiState, renderer: &Renderer<B>) {
    egui::CollapsingHeader::new("information")
        .default_open(true)
        .show(ui, |ui| {
            let eye = renderer.camera().eye();
            ui.label(format!("{:.0} fps", state.fps));
            ui.label(format!("eye ({:.1}, {:.1}, {:.1})", eye.x, eye.y, eye.z));
            ui.label(format!("target {}", renderer.extent()));
            ui.label(format!("frame {}", renderer.frame_index()));
            if state.tracker.is_resizing() {
                ui.label("resizing...");
            }
            ui.small("RMB: capture  Esc: release  X: wireframe  R: reload  C: quit");
        });
}

fn camera_section<B: Backend>(ui: &mut egui::Ui, renderer: &mut Renderer<B>) {
    egui::CollapsingHeader::new("camera settings")
        .default_open(true)
        .show(ui, |ui| {
            let mut mode = renderer.camera().mode();
            egui::ComboBox::from_label("camera mode")
                .selected_text(mode.as_str())
                .show_ui(ui, |ui| {
                    for option in CameraMode::ALL {
                        ui.selectable_value(&mut mode, option, option.as_str());
                    }
                });
            if mode != renderer.camera().mode() {
                renderer.camera_mut().set_mode(mode);
            }
            ui.add(
                egui::DragValue::new(&mut renderer.camera_mut().speed)
                    .prefix("speed: ")
                    .range(0.0..=100.0)
                    .speed(0.1),
            );
        });
}

fn ocean_section<B: Backend>(ui: &mut egui::Ui, renderer: &mut Renderer<B>) {
    egui::CollapsingHeader::new("ocean settings")
        .default_open(true)
        .show(ui, |ui| {
            let mut active = renderer.active_program().to_owned();
            egui::ComboBox::from_label("shader")
                .selected_text(active.as_str())
                .show_ui(ui, |ui| {
                    for name in renderer.program_names() {
                        let label = name.clone();
                        ui.selectable_value(&mut active, name, label);
                    }
                });
            if active != renderer.active_program() {
                if let Err(err) = renderer.set_active_program(&active) {
                    tracing::warn!(error = %err, "could not switch program");
                }
            }

            let mut wireframe = renderer.wireframe();
            if ui.checkbox(&mut wireframe, "wireframe").changed() {
                renderer.set_wireframe(wireframe);
            }

            let mut tint = renderer.tint().to_array();
            ui.horizontal(|ui| {
                ui.label("tint");
                if ui.color_edit_button_rgba_unmultiplied(&mut tint).changed() {
                    renderer.set_tint(glam::Vec4::from_array(tint));
                }
            });

            if ui.button("reload shaders").clicked() {
                renderer.reload_shaders();
            }
            for (name, err) in renderer.reload_failures() {
                ui.colored_label(Color32::LIGHT_RED, format!("{name}: {err}"));
            }
        });
}

fn spectrum_section(ui: &mut egui::Ui, spectrum: &mut Spectrum) {
    egui::CollapsingHeader::new("graph preview")
        .default_open(true)
        .show(ui, |ui| {
            ui.horizontal(|ui| {
                ui.label(format!(
                    "bins {}/{}",
                    spectrum.bins_done(),
                    crate::spectrum::BIN_COUNT
                ));
                if spectrum.is_complete() {
                    ui.label(format!("dominant {:?}", spectrum.dominant_bins(4)));
                } else if ui.small_button("finish").clicked() {
                    spectrum.run_to_completion();
                }
            });
            ui.horizontal(|ui| {
                plot(
                    ui,
                    "winding",
                    spectrum.winding(),
                    Some(spectrum.centre_of_mass()),
                    Vec2::splat(140.0),
                );
                plot(ui, "signal", spectrum.signal(), None, Vec2::splat(140.0));
            });
            let wide = Vec2::new(290.0, 90.0);
            plot(ui, "spectrum (dft)", &spectrum.magnitudes(), None, wide);
            plot(ui, "reconstruction (ift)", spectrum.reconstruction(), None, wide);
        });
}

/// Polyline plot fitted to the data bounds, with an optional marker point.
fn plot(ui: &mut egui::Ui, title: &str, points: &[[f64; 2]], marker: Option<[f64; 2]>, size: Vec2) {
    ui.vertical(|ui| {
        ui.small(title);
        let (response, painter) = ui.allocate_painter(size, Sense::hover());
        let rect = response.rect;
        painter.rect_filled(rect, 2.0, Color32::from_gray(24));
        if points.is_empty() {
            return;
        }

        let (mut min, mut max) = ([f64::MAX; 2], [f64::MIN; 2]);
        for p in points.iter().chain(marker.iter()) {
            for axis in 0..2 {
                min[axis] = min[axis].min(p[axis]);
                max[axis] = max[axis].max(p[axis]);
            }
        }
        let to_screen = |p: [f64; 2]| {
            let span = |axis: usize| (max[axis] - min[axis]).max(f64::EPSILON);
            let nx = ((p[0] - min[0]) / span(0)) as f32;
            let ny = ((p[1] - min[1]) / span(1)) as f32;
            let inner = rect.shrink(4.0);
            Pos2::new(
                inner.left() + nx * inner.width(),
                inner.bottom() - ny * inner.height(),
            )
        };

        let line: Vec<Pos2> = points.iter().map(|&p| to_screen(p)).collect();
        painter.add(Shape::line(line, Stroke::new(1.0, Color32::LIGHT_BLUE)));
        if let Some(m) = marker {
            painter.circle_filled(to_screen(m), 3.0, Color32::YELLOW);
        }
    });
}
