use super::Component;
use crate::config::SpeedPreset;
use crate::event::AppMsg;
use crate::widgets::common::focused_block;
use crate::widgets::theme::get_theme;
use crossterm::event::KeyCode;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem, ListState, Paragraph, StatefulWidget, Widget},
};

/// Preset picker. Enter applies the highlighted preset; left/right step
/// through presets and apply immediately.
pub struct SpeedState {
    presets: [SpeedPreset; 4],
    selected_index: usize,
    list_state: ListState,
    applied: Option<SpeedPreset>,
}

impl Default for SpeedState {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SpeedState {
    pub fn new(applied: Option<SpeedPreset>) -> Self {
        let presets = SpeedPreset::ALL;
        let selected_index = applied
            .and_then(|p| presets.iter().position(|x| *x == p))
            .unwrap_or(1);
        let mut list_state = ListState::default();
        list_state.select(Some(selected_index));
        Self {
            presets,
            selected_index,
            list_state,
            applied,
        }
    }

    pub fn selected(&self) -> SpeedPreset {
        self.presets[self.selected_index]
    }

    pub fn applied(&self) -> Option<SpeedPreset> {
        self.applied
    }

    fn select(&mut self, index: usize) {
        self.selected_index = index % self.presets.len();
        self.list_state.select(Some(self.selected_index));
    }

    fn apply(&mut self) -> Option<AppMsg> {
        let preset = self.selected();
        self.applied = Some(preset);
        Some(AppMsg::SetSpeed(preset.move_speed()))
    }
}

impl Component for SpeedState {
    fn update(&mut self, msg: &AppMsg) -> Option<AppMsg> {
        let AppMsg::Key(key) = msg else {
            return None;
        };
        let len = self.presets.len();
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.select(self.selected_index + len - 1);
                None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.select(self.selected_index + 1);
                None
            }
            KeyCode::Enter | KeyCode::Char(' ') => self.apply(),
            KeyCode::Right | KeyCode::Char('l') => {
                self.select(self.selected_index + 1);
                self.apply()
            }
            KeyCode::Left | KeyCode::Char('h') => {
                self.select(self.selected_index + len - 1);
                self.apply()
            }
            _ => None,
        }
    }

    fn render(&mut self, area: Rect, buf: &mut Buffer, is_focused: bool) {
        let theme = get_theme();
        let block = focused_block("Speed", is_focused);
        let inner = block.inner(area);
        block.render(area, buf);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(inner);

        let items: Vec<ListItem> = self
            .presets
            .iter()
            .enumerate()
            .map(|(i, preset)| {
                let is_applied = self.applied == Some(*preset);
                let marker = if is_applied { "●" } else { " " };
                let text = format!(
                    "{marker} {:<7} {:>4.1} px/tick",
                    preset.label(),
                    preset.move_speed()
                );

                let style = if i == self.selected_index && is_focused {
                    Style::default()
                        .fg(theme.text_highlight)
                        .add_modifier(Modifier::BOLD | Modifier::REVERSED)
                } else if is_applied {
                    Style::default()
                        .fg(theme.state_moving)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(theme.text_primary)
                };
                ListItem::new(text).style(style)
            })
            .collect();

        StatefulWidget::render(List::new(items), chunks[0], buf, &mut self.list_state);

        Paragraph::new(Line::from(Span::styled(
            "↑↓: Select  Enter: Apply  ←→: Step",
            Style::default().fg(theme.text_secondary),
        )))
        .render(chunks[1], buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEvent, KeyModifiers};

    fn key(code: KeyCode) -> AppMsg {
        AppMsg::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn speed_of(msg: Option<AppMsg>) -> Option<f64> {
        match msg {
            Some(AppMsg::SetSpeed(v)) => Some(v),
            _ => None,
        }
    }

    #[test]
    fn test_default_highlights_normal() {
        let state = SpeedState::default();
        assert_eq!(state.selected(), SpeedPreset::Normal);
        assert_eq!(state.applied(), None);
    }

    #[test]
    fn test_navigation_wraps_without_applying() {
        let mut state = SpeedState::new(Some(SpeedPreset::Slow));
        assert!(state.update(&key(KeyCode::Up)).is_none());
        assert_eq!(state.selected(), SpeedPreset::Turbo);
        assert!(state.update(&key(KeyCode::Down)).is_none());
        assert_eq!(state.selected(), SpeedPreset::Slow);
        assert_eq!(state.applied(), Some(SpeedPreset::Slow));
    }

    #[test]
    fn test_enter_applies_selection() {
        let mut state = SpeedState::default();
        state.update(&key(KeyCode::Down));
        assert_eq!(speed_of(state.update(&key(KeyCode::Enter))), Some(7.0));
        assert_eq!(state.applied(), Some(SpeedPreset::Fast));
    }

    #[test]
    fn test_left_right_step_and_apply() {
        let mut state = SpeedState::default();
        assert_eq!(speed_of(state.update(&key(KeyCode::Left))), Some(2.0));
        assert_eq!(speed_of(state.update(&key(KeyCode::Left))), Some(12.0));
        assert_eq!(speed_of(state.update(&key(KeyCode::Right))), Some(2.0));
    }

    #[test]
    fn test_ignores_other_messages() {
        let mut state = SpeedState::default();
        assert!(state.update(&AppMsg::LogMessage("hi".into())).is_none());
    }
}
