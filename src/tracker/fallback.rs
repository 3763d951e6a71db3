use crate::model::geometry::{Point, ScreenRect};

use super::{BackendKind, CursorSample, CursorTracker};

/// Last resort: integrates raw device motion delivered by the window event
/// loop, starting from the screen centre.
pub struct DeviceDeltaCursor {
    position: Point,
    bounds: ScreenRect,
    pressed: bool,
}

impl DeviceDeltaCursor {
    pub fn new(bounds: ScreenRect) -> Self {
        Self {
            position: bounds.center(),
            bounds,
            pressed: false,
        }
    }
}

impl CursorTracker for DeviceDeltaCursor {
    fn kind(&self) -> BackendKind {
        BackendKind::Fallback
    }

    fn query(&mut self) -> CursorSample {
        CursorSample::new(self.position.x, self.position.y, self.pressed)
    }

    fn on_device_motion(&mut self, dx: f64, dy: f64) {
        let moved = Point::new(self.position.x + dx, self.position.y + dy);
        self.position = self.bounds.clamp(moved, 0.0);
    }

    fn on_device_button(&mut self, pressed: bool) {
        self.pressed = pressed;
    }
}
