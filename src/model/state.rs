use super::geometry::Point;
use super::pet::PetState;

/// Snapshot of the running pet, published to the control panel.
#[derive(Clone, Debug, PartialEq)]
pub struct PetStatus {
    pub state: PetState,
    pub position: Point,
    pub cursor: Point,
    pub pressed: bool,
    pub mouse_idle_ms: f64,
    pub backend: String,
    pub seal_visible: bool,
    pub move_speed: f64,
    pub screen_height: u32,
}

impl PetStatus {
    pub fn idle_secs(&self) -> f64 {
        self.mouse_idle_ms / 1000.0
    }
}
