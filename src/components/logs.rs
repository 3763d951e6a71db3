use super::Component;
use crate::event::AppMsg;
use crate::widgets::common::focused_block;
use crate::widgets::theme::get_theme;
use crossterm::event::KeyCode;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, StatefulWidget, Widget},
};
use std::collections::VecDeque;

/// Oldest lines are dropped past this.
pub const MAX_LOG_LINES: usize = 500;

#[derive(Debug)]
pub struct LogsState {
    logs: VecDeque<String>,
    scroll_state: ScrollbarState,
    scroll_offset: u16,
    stick_to_bottom: bool,
}

impl Default for LogsState {
    fn default() -> Self {
        Self {
            logs: VecDeque::new(),
            scroll_state: ScrollbarState::default(),
            scroll_offset: 0,
            stick_to_bottom: true,
        }
    }
}

impl LogsState {
    pub fn add_log(&mut self, message: String) {
        if self.logs.len() == MAX_LOG_LINES {
            self.logs.pop_front();
        }
        self.logs.push_back(message);
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.logs.iter().map(String::as_str)
    }

    pub fn is_following(&self) -> bool {
        self.stick_to_bottom
    }

    fn scroll_by(&mut self, delta: i32) {
        if delta < 0 {
            self.stick_to_bottom = false;
            self.scroll_offset = self.scroll_offset.saturating_sub(delta.unsigned_abs() as u16);
        } else {
            self.scroll_offset = self.scroll_offset.saturating_add(delta as u16);
        }
        self.scroll_state = self.scroll_state.position(self.scroll_offset as usize);
    }
}

fn line_style(line: &str) -> Style {
    let theme = get_theme();
    if line.contains("ERROR") {
        Style::default().fg(theme.log_error)
    } else if line.contains("WARN") {
        Style::default().fg(theme.log_warn)
    } else {
        Style::default().fg(theme.text_primary)
    }
}

impl Component for LogsState {
    fn update(&mut self, msg: &AppMsg) -> Option<AppMsg> {
        match msg {
            AppMsg::LogMessage(line) => self.add_log(line.clone()),
            AppMsg::Key(key) => match key.code {
                KeyCode::Up | KeyCode::Char('k') => self.scroll_by(-1),
                KeyCode::Down | KeyCode::Char('j') => self.scroll_by(1),
                KeyCode::PageUp => self.scroll_by(-10),
                KeyCode::PageDown => self.scroll_by(10),
                KeyCode::End => self.stick_to_bottom = true,
                _ => {}
            },
            _ => {}
        }
        None
    }

    fn render(&mut self, area: Rect, buf: &mut Buffer, is_focused: bool) {
        let block = focused_block("Log", is_focused);
        let inner_area = block.inner(area);
        block.render(area, buf);

        let width = (inner_area.width as usize).saturating_sub(2);
        if width == 0 {
            return;
        }

        // a wrapped entry keeps the colour of its first line
        let wrapped: Vec<Line> = self
            .logs
            .iter()
            .flat_map(|entry| {
                let style = line_style(entry);
                textwrap::wrap(entry, width)
                    .into_iter()
                    .map(move |part| Line::from(Span::styled(part.into_owned(), style)))
            })
            .collect();

        let total_height = wrapped.len();
        let max_scroll = total_height.saturating_sub(inner_area.height as usize);
        self.scroll_state = self.scroll_state.content_length(total_height);

        if self.stick_to_bottom || self.scroll_offset as usize >= max_scroll {
            self.scroll_offset = max_scroll as u16;
            self.stick_to_bottom = true;
        }
        self.scroll_state = self.scroll_state.position(self.scroll_offset as usize);

        Paragraph::new(wrapped)
            .scroll((self.scroll_offset, 0))
            .render(inner_area, buf);

        let scrollbar = Scrollbar::default()
            .orientation(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("▲"))
            .end_symbol(Some("▼"));
        StatefulWidget::render(scrollbar, inner_area, buf, &mut self.scroll_state);
    }
}
