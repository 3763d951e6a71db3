use crossterm::event::KeyEvent;

use crate::model::state::PetStatus;

#[derive(Clone, Debug)]
pub enum AppMsg {
    Key(KeyEvent),
    Quit,

    // Panel -> pet
    SetSpeed(f64),

    // Pet -> panel
    Status(PetStatus),

    // Formatted tracing events
    LogMessage(String),
}
