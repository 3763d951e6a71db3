// Global cursor sampling across Windows and the various Linux sessions.
//
// On Wayland the toolkit-level cursor position is only correct while the
// pointer is over one of our own XWayland surfaces, so compositor-native
// backends are tried first.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
#[cfg(target_os = "linux")]
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::model::geometry::ScreenRect;

pub mod env;
pub mod fallback;
#[cfg(target_os = "linux")]
pub mod gnome;
#[cfg(target_os = "linux")]
pub mod hybrid;
#[cfg(unix)]
pub mod hyprland;
#[cfg(target_os = "linux")]
pub mod kde;
pub mod mice;
#[cfg(target_os = "windows")]
pub mod win32;
#[cfg(target_os = "linux")]
pub mod x11;

#[cfg(all(test, target_os = "linux"))]
mod tracker_test;

pub use env::{Platform, SessionEnv};

/// Upper bound for any session bus call made while sampling or setting up.
#[cfg(target_os = "linux")]
const DBUS_CALL_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CursorSample {
    pub x: f64,
    pub y: f64,
    pub pressed: bool,
}

impl CursorSample {
    pub const fn new(x: f64, y: f64, pressed: bool) -> Self {
        Self { x, y, pressed }
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Hyprland,
    Gnome,
    Kde,
    Hybrid,
    X11,
    Win32,
    Fallback,
}

impl BackendKind {
    pub const ALL: [BackendKind; 7] = [
        BackendKind::Hyprland,
        BackendKind::Gnome,
        BackendKind::Kde,
        BackendKind::Hybrid,
        BackendKind::X11,
        BackendKind::Win32,
        BackendKind::Fallback,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BackendKind::Hyprland => "hyprland",
            BackendKind::Gnome => "gnome",
            BackendKind::Kde => "kde",
            BackendKind::Hybrid => "hybrid",
            BackendKind::X11 => "x11",
            BackendKind::Win32 => "win32",
            BackendKind::Fallback => "fallback",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            BackendKind::Hyprland => "Hyprland IPC socket (cursorpos)",
            BackendKind::Gnome => "GNOME Shell Eval over D-Bus",
            BackendKind::Kde => "KWin script reporting over D-Bus",
            BackendKind::Hybrid => "XQueryPointer plus raw /dev/input/mice deltas",
            BackendKind::X11 => "XQueryPointer on the root window",
            BackendKind::Win32 => "GetCursorPos / GetAsyncKeyState",
            BackendKind::Fallback => "raw device motion from the window event loop",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub trait CursorTracker {
    fn kind(&self) -> BackendKind;

    /// Current global position. Backends that fail at runtime report their
    /// last good sample.
    fn query(&mut self) -> CursorSample;

    /// Whether samples are physical pixels that must be divided by the
    /// monitor scale factor.
    fn needs_dpr_scaling(&self) -> bool {
        false
    }

    fn on_device_motion(&mut self, _dx: f64, _dy: f64) {}

    fn on_device_button(&mut self, _pressed: bool) {}

    fn close(&mut self) {}
}

/// Backends to try, best first. The fallback always ends the list.
pub fn candidate_order(env: &SessionEnv, preference: Option<BackendKind>) -> Vec<BackendKind> {
    let mut order = Vec::new();

    match preference {
        Some(kind) => order.push(kind),
        None => match env.platform {
            Platform::Windows => order.push(BackendKind::Win32),
            Platform::Linux => {
                if env.wayland {
                    if env.hyprland_signature.is_some() {
                        order.push(BackendKind::Hyprland);
                    }
                    if env.is_gnome_like() {
                        order.push(BackendKind::Gnome);
                    }
                    if env.is_kde_like() {
                        order.push(BackendKind::Kde);
                    }
                    order.push(BackendKind::Hybrid);
                }
                order.push(BackendKind::X11);
            }
            Platform::Other => {}
        },
    }

    if !order.contains(&BackendKind::Fallback) {
        order.push(BackendKind::Fallback);
    }
    order
}

pub fn open_backend(
    kind: BackendKind,
    env: &SessionEnv,
    screen: ScreenRect,
) -> Result<Box<dyn CursorTracker>> {
    match kind {
        #[cfg(unix)]
        BackendKind::Hyprland => Ok(Box::new(hyprland::HyprlandCursor::connect(env)?)),
        #[cfg(target_os = "linux")]
        BackendKind::Gnome => Ok(Box::new(gnome::GnomeCursor::connect()?)),
        #[cfg(target_os = "linux")]
        BackendKind::Kde => Ok(Box::new(kde::KdeCursor::connect()?)),
        #[cfg(target_os = "linux")]
        BackendKind::Hybrid => Ok(Box::new(hybrid::WaylandHybridCursor::open()?)),
        #[cfg(target_os = "linux")]
        BackendKind::X11 => Ok(Box::new(x11::X11Cursor::connect()?)),
        #[cfg(target_os = "windows")]
        BackendKind::Win32 => Ok(Box::new(win32::Win32Cursor::new()?)),
        BackendKind::Fallback => Ok(Box::new(fallback::DeviceDeltaCursor::new(screen))),
        #[allow(unreachable_patterns)]
        other => {
            let _ = env;
            anyhow::bail!("{} backend is not available on this platform", other)
        }
    }
}

/// Returns the first backend that comes up, ending with the fallback.
pub fn create_cursor_tracker(
    env: &SessionEnv,
    preference: Option<BackendKind>,
    screen: ScreenRect,
) -> Box<dyn CursorTracker> {
    for kind in candidate_order(env, preference) {
        match open_backend(kind, env, screen) {
            Ok(tracker) => {
                info!(backend = %kind, "cursor tracker ready");
                return tracker;
            }
            Err(e) => {
                if preference == Some(kind) {
                    warn!(backend = %kind, "requested cursor backend unavailable: {e:#}");
                } else {
                    debug!(backend = %kind, "cursor backend unavailable: {e:#}");
                }
            }
        }
    }

    // only reachable if the fallback itself failed, which it cannot
    Box::new(fallback::DeviceDeltaCursor::new(screen))
}
