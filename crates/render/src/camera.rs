use glam::{Mat4, Vec3};
use oceanview_common::Extent2d;
use oceanview_input::{InputState, Key};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CAMERA_SPEED: f32 = 10.0;

const ORBIT_RADIUS: f32 = 18.0;
const ORBIT_HEIGHT: f32 = 14.0;
const ORBIT_TARGET: Vec3 = Vec3::new(0.0, -5.0, 0.0);
const PITCH_LIMIT_DEGREES: f32 = 80.0;
const Z_NEAR: f32 = 0.01;
const Z_FAR: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CameraMode {
    /// WASD + Space/Ctrl flight with mouse look while the cursor is captured.
    Free,
    /// Circles the ocean at a fixed height, looking slightly below its centre.
    Orbit,
}

impl CameraMode {
    pub const ALL: [CameraMode; 2] = [CameraMode::Free, CameraMode::Orbit];

    pub fn as_str(self) -> &'static str {
        match self {
            CameraMode::Free => "free",
            CameraMode::Orbit => "orbit",
        }
    }
}

impl std::fmt::Display for CameraMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CameraMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "free" => Ok(CameraMode::Free),
            "orbit" => Ok(CameraMode::Orbit),
            other => Err(format!("unknown camera mode `{other}` (expected free or orbit)")),
        }
    }
}

/// Perspective camera with free-flight and orbit modes.
///
/// Angles are kept in degrees. Motion is frame-rate independent: every
/// update is scaled by the frame delta.
#[derive(Debug, Clone)]
pub struct Camera {
    mode: CameraMode,
    position: Vec3,
    yaw: f32,
    pitch: f32,
    fov_degrees: f32,
    aspect: f32,
    pub speed: f32,
    pub sensitivity: f32,
    clock: f64,
    view: Mat4,
    projection: Mat4,
}

impl Camera {
    pub fn new(extent: Extent2d, mode: CameraMode, fov_degrees: f32) -> Self {
        let mut camera = Self {
            mode,
            position: Vec3::new(0.0, 0.0, 2.0),
            yaw: -90.0,
            pitch: 0.0,
            fov_degrees,
            aspect: extent.aspect(),
            speed: DEFAULT_CAMERA_SPEED,
            sensitivity: 0.1,
            clock: 0.0,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        };
        camera.refactor(extent);
        camera.update_view();
        camera
    }

    /// Advances the camera by one frame.
    pub fn update(&mut self, input: &InputState, dt: f32) {
        self.clock += f64::from(dt);
        match self.mode {
            CameraMode::Free => {
                if input.cursor_captured() {
                    self.fly(input, dt);
                }
            }
            CameraMode::Orbit => {
                let angle = (self.clock * f64::from(self.orbit_frequency())) as f32;
                self.position = Vec3::new(
                    ORBIT_RADIUS * angle.cos(),
                    ORBIT_HEIGHT,
                    ORBIT_RADIUS * angle.sin(),
                );
            }
        }
        self.update_view();
    }

    fn fly(&mut self, input: &InputState, dt: f32) {
        let delta = input.mouse_delta() * self.sensitivity;
        self.yaw += delta.x;
        self.pitch = (self.pitch - delta.y).clamp(-PITCH_LIMIT_DEGREES, PITCH_LIMIT_DEGREES);

        let mut axis = Vec3::ZERO;
        let held = |key| if input.is_held(key) { 1.0 } else { 0.0 };
        axis.z = held(Key::W) - held(Key::S);
        axis.x = held(Key::D) - held(Key::A);
        axis.y = held(Key::Space) - held(Key::Control);
        let axis = axis.normalize_or_zero();

        let front = self.front();
        let right = front.cross(Vec3::Y).normalize();
        self.position += dt * self.speed * (axis.z * front + axis.y * Vec3::Y + axis.x * right);
    }

    /// Unit view direction derived from yaw and pitch.
    pub fn front(&self) -> Vec3 {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos()).normalize()
    }

    fn update_view(&mut self) {
        self.view = match self.mode {
            CameraMode::Free => Mat4::look_at_rh(self.position, self.position + self.front(), Vec3::Y),
            CameraMode::Orbit => Mat4::look_at_rh(self.position, ORBIT_TARGET, Vec3::Y),
        };
    }

    /// Recomputes the projection for a new output size.
    pub fn refactor(&mut self, extent: Extent2d) {
        self.aspect = extent.aspect();
        self.projection =
            Mat4::perspective_rh(self.fov_degrees.to_radians(), self.aspect, Z_NEAR, Z_FAR);
    }

    /// Switching to free flight keeps the current eye and looks the way the
    /// orbit was looking, so the view does not jump.
    pub fn set_mode(&mut self, mode: CameraMode) {
        if mode == self.mode {
            return;
        }
        if mode == CameraMode::Free {
            let dir = (ORBIT_TARGET - self.position).normalize_or_zero();
            if dir != Vec3::ZERO {
                self.yaw = dir.z.atan2(dir.x).to_degrees();
                self.pitch = dir
                    .y
                    .asin()
                    .to_degrees()
                    .clamp(-PITCH_LIMIT_DEGREES, PITCH_LIMIT_DEGREES);
            }
        }
        tracing::info!(from = %self.mode, to = %mode, "camera mode changed");
        self.mode = mode;
        self.update_view();
    }

    pub fn mode(&self) -> CameraMode {
        self.mode
    }

    /// Orbit angular speed in radians per second.
    pub fn orbit_frequency(&self) -> f32 {
        self.speed / (DEFAULT_CAMERA_SPEED * 2.0)
    }

    pub fn eye(&self) -> Vec3 {
        self.position
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn fov_degrees(&self) -> f32 {
        self.fov_degrees
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.view
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Vec2;

    fn extent(w: u32, h: u32) -> Extent2d {
        Extent2d::new(w, h).unwrap()
    }

    fn captured() -> InputState {
        let mut input = InputState::new();
        input.set_cursor_captured(true);
        input
    }

    #[test]
    fn refactor_tracks_aspect() {
        let mut cam = Camera::new(extent(800, 600), CameraMode::Orbit, 70.0);
        assert_relative_eq!(cam.aspect(), 800.0 / 600.0);
        cam.refactor(extent(1280, 720));
        assert_relative_eq!(cam.aspect(), 1280.0 / 720.0);
        assert_relative_eq!(cam.fov_degrees(), 70.0);
        let expected = Mat4::perspective_rh(70f32.to_radians(), 1280.0 / 720.0, 0.01, 100.0);
        assert_eq!(cam.projection_matrix(), expected);
    }

    #[test]
    fn orbit_circles_at_fixed_radius_and_height() {
        let mut cam = Camera::new(extent(4, 3), CameraMode::Orbit, 70.0);
        let input = InputState::new();
        for _ in 0..37 {
            cam.update(&input, 0.1);
            let eye = cam.eye();
            assert_relative_eq!(eye.y, 14.0);
            assert_relative_eq!(Vec2::new(eye.x, eye.z).length(), 18.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn orbit_frequency_scales_with_speed() {
        let mut cam = Camera::new(extent(4, 3), CameraMode::Orbit, 70.0);
        assert_relative_eq!(cam.orbit_frequency(), 0.5);
        cam.speed = 20.0;
        assert_relative_eq!(cam.orbit_frequency(), 1.0);

        // After pi seconds at 1 rad/s the eye is on the opposite side.
        cam.update(&InputState::new(), std::f32::consts::PI);
        assert_relative_eq!(cam.eye().x, -18.0, epsilon = 1e-3);
    }

    #[test]
    fn free_camera_ignores_input_without_capture() {
        let mut cam = Camera::new(extent(4, 3), CameraMode::Free, 70.0);
        let start = cam.eye();
        let mut input = InputState::new();
        input.key_down(Key::W);
        cam.update(&input, 1.0);
        assert_eq!(cam.eye(), start);
    }

    #[test]
    fn free_camera_moves_forward() {
        let mut cam = Camera::new(extent(4, 3), CameraMode::Free, 70.0);
        let mut input = captured();
        input.key_down(Key::W);
        cam.update(&input, 0.5);
        // Default yaw looks down -Z.
        assert_relative_eq!(cam.eye().z, 2.0 - 5.0, epsilon = 1e-4);
        assert_relative_eq!(cam.eye().x, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn diagonal_motion_is_normalised() {
        let mut cam = Camera::new(extent(4, 3), CameraMode::Free, 70.0);
        let start = cam.eye();
        let mut input = captured();
        input.key_down(Key::W);
        input.key_down(Key::D);
        cam.update(&input, 1.0);
        assert_relative_eq!((cam.eye() - start).length(), DEFAULT_CAMERA_SPEED, epsilon = 1e-3);
    }

    #[test]
    fn horizontal_mouse_motion_turns_yaw() {
        let mut cam = Camera::new(extent(4, 3), CameraMode::Free, 70.0);
        assert_relative_eq!(cam.yaw(), -90.0);
        let mut input = captured();
        input.mouse_moved(Vec2::new(900.0, 0.0));
        cam.update(&input, 0.016);
        assert_relative_eq!(cam.yaw(), 0.0, epsilon = 1e-4);
        assert_relative_eq!(cam.pitch(), 0.0);
        assert_relative_eq!(cam.front().x, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut cam = Camera::new(extent(4, 3), CameraMode::Free, 70.0);
        let mut input = captured();
        input.mouse_moved(Vec2::new(0.0, -10_000.0));
        cam.update(&input, 0.016);
        assert_relative_eq!(cam.pitch(), 80.0);
        input.end_frame();
        input.mouse_moved(Vec2::new(0.0, 10_000.0));
        cam.update(&input, 0.016);
        assert_relative_eq!(cam.pitch(), -80.0);
    }

    #[test]
    fn switching_to_free_keeps_eye() {
        let mut cam = Camera::new(extent(4, 3), CameraMode::Orbit, 70.0);
        cam.update(&InputState::new(), 1.0);
        let eye = cam.eye();
        cam.set_mode(CameraMode::Free);
        assert_eq!(cam.mode(), CameraMode::Free);
        assert_eq!(cam.eye(), eye);
        let towards_target = (ORBIT_TARGET - eye).normalize();
        assert_relative_eq!(cam.front().dot(towards_target), 1.0, epsilon = 1e-4);
    }

    #[test]
    fn mode_parses_from_str() {
        assert_eq!("Orbit".parse::<CameraMode>(), Ok(CameraMode::Orbit));
        assert_eq!("free".parse::<CameraMode>(), Ok(CameraMode::Free));
        assert!("spin".parse::<CameraMode>().is_err());
    }
}
