use ratatui::style::Color;

use crate::model::pet::PetState;

#[derive(Debug, Clone)]
pub struct Theme {
    pub border_focused: Color,
    pub border_unfocused: Color,
    pub text_primary: Color,
    pub text_secondary: Color,
    pub text_highlight: Color,
    pub state_moving: Color,
    pub state_resting: Color,
    pub state_dragging: Color,
    pub state_seal: Color,
    pub log_warn: Color,
    pub log_error: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            border_focused: Color::Rgb(118, 227, 73),
            border_unfocused: Color::White,
            text_primary: Color::White,
            text_secondary: Color::Gray,
            text_highlight: Color::Yellow,
            state_moving: Color::Green,
            state_resting: Color::Blue,
            state_dragging: Color::Magenta,
            state_seal: Color::Cyan,
            log_warn: Color::Yellow,
            log_error: Color::Red,
        }
    }
}

impl Theme {
    pub fn state_color(&self, state: PetState) -> Color {
        match state {
            PetState::Chasing | PetState::Wandering => self.state_moving,
            PetState::Idling => self.state_resting,
            PetState::Dragging => self.state_dragging,
            PetState::SealMode => self.state_seal,
        }
    }
}

pub static THEME: std::sync::LazyLock<Theme> = std::sync::LazyLock::new(Theme::default);

pub fn get_theme() -> &'static Theme {
    &THEME
}
