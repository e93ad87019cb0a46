use serde::{Deserialize, Serialize};

/// A strictly positive pixel size.
///
/// Window systems and UI layouts report sizes as signed or floating values and
/// happily produce zero while a window is minimized. `Extent2d` can only be
/// built from positive dimensions, so anything holding one never has to guard
/// against a zero-sized allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Extent2d {
    width: u32,
    height: u32,
}

impl Extent2d {
    /// Returns `None` unless both dimensions are positive.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        (width > 0 && height > 0).then_some(Self { width, height })
    }

    /// Accepts the signed sizes reported by resize callbacks.
    pub fn from_signed(width: i32, height: i32) -> Option<Self> {
        let width = u32::try_from(width).ok()?;
        let height = u32::try_from(height).ok()?;
        Self::new(width, height)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

impl std::fmt::Display for Extent2d {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Linear RGBA clear colour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClearColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl ClearColor {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for ClearColor {
    fn default() -> Self {
        Self::new(0.12, 0.12, 0.12, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extent_rejects_zero() {
        assert!(Extent2d::new(0, 10).is_none());
        assert!(Extent2d::new(10, 0).is_none());
        assert!(Extent2d::new(1, 1).is_some());
    }

    #[test]
    fn extent_rejects_negative() {
        assert!(Extent2d::from_signed(-5, -5).is_none());
        assert!(Extent2d::from_signed(-1, 10).is_none());
        let e = Extent2d::from_signed(640, 480).unwrap();
        assert_eq!((e.width(), e.height()), (640, 480));
    }

    #[test]
    fn extent_aspect_and_display() {
        let e = Extent2d::new(1280, 720).unwrap();
        assert!((e.aspect() - 16.0 / 9.0).abs() < 1e-6);
        assert_eq!(e.to_string(), "1280x720");
    }

    #[test]
    fn clear_color_default_is_dark_grey() {
        let c = ClearColor::default();
        assert_eq!(c, ClearColor::new(0.12, 0.12, 0.12, 1.0));
    }
}
