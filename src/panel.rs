// Terminal control panel. Runs on its own thread and talks to the pet
// through the winit event loop proxy; status and log lines come back over
// a crossbeam channel.

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Modifier, Style},
    widgets::Paragraph,
};
use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use winit::event_loop::EventLoopProxy;

use crate::components::Component;
use crate::components::logs::LogsState;
use crate::components::speed::SpeedState;
use crate::components::status::StatusState;
use crate::config::SpeedPreset;
use crate::event::AppMsg;
use crate::widgets::common::focused_block;
use crate::widgets::theme::get_theme;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Focus {
    Speed,
    Logs,
}

pub struct Panel {
    status: StatusState,
    speed: SpeedState,
    logs: LogsState,
    focus: Focus,
}

impl Panel {
    pub fn new(initial_speed: Option<SpeedPreset>) -> Self {
        Self {
            status: StatusState::default(),
            speed: SpeedState::new(initial_speed),
            logs: LogsState::default(),
            focus: Focus::Speed,
        }
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn status(&self) -> &StatusState {
        &self.status
    }

    pub fn logs(&self) -> &LogsState {
        &self.logs
    }

    /// Routes a message from the pet side. Returns false once the pet quit.
    pub fn handle_msg(&mut self, msg: &AppMsg) -> bool {
        match msg {
            AppMsg::Quit => return false,
            AppMsg::Status(_) => {
                self.status.update(msg);
            }
            AppMsg::LogMessage(_) => {
                self.logs.update(msg);
            }
            _ => {}
        }
        true
    }

    /// Returns the command to forward to the pet, if any.
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<AppMsg> {
        match (key.code, key.modifiers) {
            (KeyCode::Char('q'), _) | (KeyCode::Esc, _) => return Some(AppMsg::Quit),
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => return Some(AppMsg::Quit),
            (KeyCode::Tab, _) | (KeyCode::BackTab, _) => {
                self.focus = match self.focus {
                    Focus::Speed => Focus::Logs,
                    Focus::Logs => Focus::Speed,
                };
                return None;
            }
            _ => {}
        }

        let msg = AppMsg::Key(key);
        match self.focus {
            Focus::Speed => self.speed.update(&msg),
            Focus::Logs => self.logs.update(&msg),
        }
    }

    pub fn draw(&mut self, f: &mut Frame) {
        let theme = get_theme();
        let area = f.area();
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(9),
                Constraint::Min(3),
                Constraint::Length(1),
            ])
            .split(area);

        let backend = self
            .status
            .status()
            .map(|s| s.backend.clone())
            .unwrap_or_else(|| "starting".to_string());
        let header = Paragraph::new(format!("Aemeath  ·  cursor via {backend}"))
            .style(
                Style::default()
                    .fg(theme.text_highlight)
                    .add_modifier(Modifier::BOLD),
            )
            .alignment(Alignment::Center)
            .block(focused_block("aemeath", false));
        f.render_widget(header, rows[0]);

        let middle = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(rows[1]);

        let buf = f.buffer_mut();
        self.status.render(middle[0], buf, false);
        self.speed.render(middle[1], buf, self.focus == Focus::Speed);
        self.logs.render(rows[2], buf, self.focus == Focus::Logs);

        let help = Paragraph::new("Tab: switch pane  |  q / Esc / Ctrl+C: quit")
            .style(Style::default().fg(theme.text_secondary));
        f.render_widget(help, rows[3]);
    }
}

/// Starts the panel thread. It owns the terminal until the pet sends
/// [`AppMsg::Quit`] or the user quits from the panel.
pub fn spawn(
    proxy: EventLoopProxy<AppMsg>,
    inbox: Receiver<AppMsg>,
    initial_speed: Option<SpeedPreset>,
) -> Result<JoinHandle<Result<()>>> {
    thread::Builder::new()
        .name("aemeath-panel".into())
        .spawn(move || {
            let res = run(&proxy, &inbox, initial_speed);
            if res.is_err() {
                // without the panel there is no other way to stop the pet
                let _ = proxy.send_event(AppMsg::Quit);
            }
            res
        })
        .context("Failed to spawn panel thread")
}

fn run(
    proxy: &EventLoopProxy<AppMsg>,
    inbox: &Receiver<AppMsg>,
    initial_speed: Option<SpeedPreset>,
) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.hide_cursor()?;

    let mut panel = Panel::new(initial_speed);
    let mut res = event_loop(&mut terminal, &mut panel, proxy, inbox);

    if let Err(e) = restore_terminal(&mut terminal) {
        res = res.and(Err(e));
    }
    res
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    panel: &mut Panel,
    proxy: &EventLoopProxy<AppMsg>,
    inbox: &Receiver<AppMsg>,
) -> Result<()> {
    loop {
        for msg in inbox.try_iter() {
            if !panel.handle_msg(&msg) {
                return Ok(());
            }
        }

        terminal.draw(|f| panel.draw(f))?;

        if !event::poll(POLL_INTERVAL)? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if let Some(cmd) = panel.handle_key(key) {
                let quit = matches!(cmd, AppMsg::Quit);
                if proxy.send_event(cmd).is_err() || quit {
                    return Ok(());
                }
            }
        }
    }
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().ok();
    let mut out = io::stdout();
    execute!(out, LeaveAlternateScreen)?;
    Ok(())
}
