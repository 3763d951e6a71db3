use super::Component;
use crate::event::AppMsg;
use crate::model::state::PetStatus;
use crate::widgets::common::{field_line, focused_block};
use crate::widgets::theme::get_theme;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};

#[derive(Debug, Default)]
pub struct StatusState {
    status: Option<PetStatus>,
}

impl StatusState {
    pub fn status(&self) -> Option<&PetStatus> {
        self.status.as_ref()
    }

    pub fn lines(&self) -> Vec<Line<'static>> {
        let Some(s) = &self.status else {
            return vec![Line::from(Span::styled(
                "waiting for the pet...",
                Style::default().fg(get_theme().text_secondary),
            ))];
        };
        let theme = get_theme();

        vec![
            Line::from(vec![
                Span::styled(
                    format!("{:<10}", "state"),
                    Style::default().fg(theme.text_secondary),
                ),
                Span::styled(
                    s.state.label(),
                    Style::default()
                        .fg(theme.state_color(s.state))
                        .add_modifier(Modifier::BOLD),
                ),
            ]),
            field_line("backend", s.backend.clone()),
            field_line("pet", format!("{:.0}, {:.0}", s.position.x, s.position.y)),
            field_line(
                "cursor",
                format!(
                    "{:.0}, {:.0}{}",
                    s.cursor.x,
                    s.cursor.y,
                    if s.pressed { "  [pressed]" } else { "" }
                ),
            ),
            field_line("idle", format!("{:.1}s", s.idle_secs())),
            field_line("seal", if s.seal_visible { "out" } else { "-" }.to_string()),
            field_line(
                "speed",
                format!("{:.1} px/tick @ {}p", s.move_speed, s.screen_height),
            ),
        ]
    }
}

impl Component for StatusState {
    fn update(&mut self, msg: &AppMsg) -> Option<AppMsg> {
        if let AppMsg::Status(status) = msg {
            self.status = Some(status.clone());
        }
        None
    }

    fn render(&mut self, area: Rect, buf: &mut Buffer, is_focused: bool) {
        let block = focused_block("Pet", is_focused);
        let inner = block.inner(area);
        block.render(area, buf);
        Paragraph::new(self.lines()).render(inner, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::geometry::Point;
    use crate::model::pet::PetState;

    fn sample() -> PetStatus {
        PetStatus {
            state: PetState::Idling,
            position: Point::new(640.4, 360.0),
            cursor: Point::new(10.0, 20.0),
            pressed: true,
            mouse_idle_ms: 2500.0,
            backend: "x11".to_string(),
            seal_visible: false,
            move_speed: 4.0,
            screen_height: 1280,
        }
    }

    fn text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_placeholder_before_first_status() {
        let state = StatusState::default();
        assert!(state.status().is_none());
        assert_eq!(text(&state.lines()[0]), "waiting for the pet...");
    }

    #[test]
    fn test_status_lines() {
        let mut state = StatusState::default();
        state.update(&AppMsg::Status(sample()));

        let lines: Vec<String> = state.lines().iter().map(text).collect();
        assert!(lines[0].ends_with("idling"));
        assert!(lines[1].ends_with("x11"));
        assert!(lines[2].ends_with("640, 360"));
        assert!(lines[3].ends_with("[pressed]"));
        assert!(lines[4].ends_with("2.5s"));
    }
}
