use anyhow::{Context, Result};
use tracing::debug;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{ConnectionExt, KeyButMask, Window};
use x11rb::rust_connection::RustConnection;

use super::{BackendKind, CursorSample, CursorTracker};

/// `XQueryPointer` against the root window of the default screen.
pub struct X11Pointer {
    conn: RustConnection,
    root: Window,
    screen_width: u16,
    screen_height: u16,
}

impl X11Pointer {
    pub fn connect() -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(None).context("Cannot open X display")?;
        let screen = &conn.setup().roots[screen_num];
        let root = screen.root;
        let (screen_width, screen_height) = (screen.width_in_pixels, screen.height_in_pixels);
        Ok(Self {
            conn,
            root,
            screen_width,
            screen_height,
        })
    }

    /// Root-relative position in physical pixels and the Button1 state.
    pub fn query(&self) -> Result<CursorSample> {
        let reply = self.conn.query_pointer(self.root)?.reply()?;
        let pressed = u16::from(reply.mask) & u16::from(KeyButMask::BUTTON1) != 0;
        Ok(CursorSample::new(
            reply.root_x as f64,
            reply.root_y as f64,
            pressed,
        ))
    }

    pub fn screen_size(&self) -> (f64, f64) {
        (self.screen_width as f64, self.screen_height as f64)
    }
}

/// Reliable on native X11. Under XWayland the value goes stale whenever
/// the pointer is over a native Wayland surface.
pub struct X11Cursor {
    pointer: X11Pointer,
    last: CursorSample,
}

impl X11Cursor {
    pub fn connect() -> Result<Self> {
        let pointer = X11Pointer::connect()?;
        let last = pointer.query()?;
        Ok(Self { pointer, last })
    }
}

impl CursorTracker for X11Cursor {
    fn kind(&self) -> BackendKind {
        BackendKind::X11
    }

    fn query(&mut self) -> CursorSample {
        match self.pointer.query() {
            Ok(sample) => self.last = sample,
            Err(e) => debug!("XQueryPointer failed: {e:#}"),
        }
        self.last
    }

    fn needs_dpr_scaling(&self) -> bool {
        true
    }
}
