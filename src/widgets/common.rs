use super::theme::get_theme;
use ratatui::{
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders},
};

pub fn focused_block<'a>(title: &'a str, is_focused: bool) -> Block<'a> {
    let theme = get_theme();
    let (border_color, border_type, title_style) = if is_focused {
        (
            theme.border_focused,
            BorderType::Thick,
            Style::default()
                .fg(theme.text_highlight)
                .add_modifier(Modifier::BOLD),
        )
    } else {
        (theme.border_unfocused, BorderType::Plain, Style::default())
    };

    Block::default()
        .title(title)
        .title_style(title_style)
        .borders(Borders::ALL)
        .border_type(border_type)
        .border_style(Style::default().fg(border_color))
}

/// `label: value` with the label dimmed.
pub fn field_line(label: &str, value: String) -> Line<'static> {
    let theme = get_theme();
    Line::from(vec![
        Span::styled(format!("{label:<10}"), Style::default().fg(theme.text_secondary)),
        Span::styled(value, Style::default().fg(theme.text_primary)),
    ])
}
