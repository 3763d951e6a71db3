use anyhow::{Context, Result, anyhow, bail};
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use super::{BackendKind, CursorSample, CursorTracker, SessionEnv};

const IPC_TIMEOUT: Duration = Duration::from_millis(500);
const CURSORPOS_REQUEST: &[u8] = b"cursorpos";

/// Hyprland's request socket. Coordinates are already logical; the IPC has
/// no button state.
pub struct HyprlandCursor {
    socket_path: PathBuf,
    last: CursorSample,
}

/// Newer Hyprland (>= 0.40) lives under the runtime dir, older under /tmp.
pub fn socket_candidates(runtime_dir: Option<&Path>, signature: &str) -> Vec<PathBuf> {
    let runtime = runtime_dir.unwrap_or(Path::new("/tmp"));
    vec![
        runtime.join("hypr").join(signature).join(".socket.sock"),
        Path::new("/tmp").join("hypr").join(signature).join(".socket.sock"),
    ]
}

pub fn parse_cursorpos(response: &str) -> Result<(f64, f64)> {
    let parts: Vec<&str> = response.trim().split(',').collect();
    if parts.len() != 2 {
        bail!("Unexpected cursorpos response: {:?}", response);
    }
    let x = parts[0].trim().parse::<f64>()?;
    let y = parts[1].trim().parse::<f64>()?;
    Ok((x, y))
}

impl HyprlandCursor {
    pub fn connect(env: &SessionEnv) -> Result<Self> {
        let signature = env
            .hyprland_signature
            .as_deref()
            .ok_or_else(|| anyhow!("HYPRLAND_INSTANCE_SIGNATURE is not set"))?;

        let socket_path = socket_candidates(env.runtime_dir.as_deref(), signature)
            .into_iter()
            .find(|p| p.exists())
            .ok_or_else(|| anyhow!("Hyprland IPC socket not found"))?;

        Self::with_socket(socket_path)
    }

    /// Verifies the socket actually answers before handing it out.
    pub fn with_socket(socket_path: PathBuf) -> Result<Self> {
        let mut tracker = Self {
            socket_path,
            last: CursorSample::default(),
        };
        let (x, y) = tracker.request_position().context("Hyprland IPC query failed")?;
        tracker.last = CursorSample::new(x, y, false);
        Ok(tracker)
    }

    fn request_position(&self) -> Result<(f64, f64)> {
        let mut stream = UnixStream::connect(&self.socket_path)?;
        stream.set_read_timeout(Some(IPC_TIMEOUT))?;
        stream.set_write_timeout(Some(IPC_TIMEOUT))?;
        stream.write_all(CURSORPOS_REQUEST)?;

        let mut buf = [0u8; 256];
        let n = stream.read(&mut buf)?;
        parse_cursorpos(&String::from_utf8_lossy(&buf[..n]))
    }
}

impl CursorTracker for HyprlandCursor {
    fn kind(&self) -> BackendKind {
        BackendKind::Hyprland
    }

    fn query(&mut self) -> CursorSample {
        match self.request_position() {
            Ok((x, y)) => self.last = CursorSample::new(x, y, false),
            Err(e) => debug!("hyprland cursorpos failed: {e:#}"),
        }
        self.last
    }
}
