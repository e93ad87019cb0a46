use egui::Vec2;

/// Debounces viewport panel size changes.
///
/// While the user drags a splitter the panel size changes every frame;
/// reallocating the render target each time would be wasteful. A new size is
/// only reported once it has held for a frame and the pointer has been
/// released, or immediately after the very first layout.
#[derive(Debug, Default)]
pub struct ViewportTracker {
    last: Vec2,
    resizing: bool,
    settled_once: bool,
}

impl ViewportTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call once per frame with the panel's available size. Returns the size
    /// to resize to, in whole pixels.
    pub fn observe(&mut self, size: Vec2, pointer_released: bool) -> Option<(i32, i32)> {
        if size != self.last {
            self.last = size;
            self.resizing = true;
            return None;
        }
        if self.resizing && (pointer_released || !self.settled_once) {
            self.settled_once = true;
            self.resizing = false;
            return Some((size.x.round() as i32, size.y.round() as i32));
        }
        None
    }

    pub fn is_resizing(&self) -> bool {
        self.resizing
    }
}
