// KWin knows the real cursor position on every surface. A tiny KWin script
// pushes it to a D-Bus object we serve, and the zbus executor thread hands
// the updates over a channel.

use anyhow::{Context, Result, bail};
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, warn};
use zbus::blocking::{Connection, connection};

use super::{BackendKind, CursorSample, CursorTracker, DBUS_CALL_TIMEOUT};

pub const SERVICE_NAME: &str = "com.aemeath.CursorTracker";
pub const OBJECT_PATH: &str = "/cursor";
pub const SCRIPT_NAME: &str = "aemeath-cursor";

const KWIN_DEST: &str = "org.kde.KWin";
const SCRIPTING_PATH: &str = "/Scripting";
const SCRIPTING_IFACE: &str = "org.kde.kwin.Scripting";
const SCRIPT_IFACE: &str = "org.kde.kwin.Script";

const FIRST_UPDATE_TIMEOUT: Duration = Duration::from_millis(1000);

pub const KWIN_CURSOR_JS: &str = r#"// Report the cursor position over D-Bus.
function send() {
    var pos = workspace.cursorPos;
    callDBus(
        "com.aemeath.CursorTracker", "/cursor",
        "com.aemeath.CursorTracker", "update",
        pos.x, pos.y
    );
}
send();
workspace.cursorPosChanged.connect(send);
"#;

struct CursorSink {
    tx: Sender<(i32, i32)>,
}

#[zbus::interface(name = "com.aemeath.CursorTracker")]
impl CursorSink {
    #[zbus(name = "update")]
    fn update(&self, x: i32, y: i32) {
        let _ = self.tx.send((x, y));
    }
}

pub struct KdeCursor {
    conn: Connection,
    rx: Receiver<(i32, i32)>,
    script_dir: Option<TempDir>,
    script_loaded: bool,
    last: CursorSample,
}

/// Writes `main.js` and `metadata.json`, returning the script path.
pub fn write_kwin_script(dir: &Path) -> Result<PathBuf> {
    let script_path = dir.join("main.js");
    fs::write(&script_path, KWIN_CURSOR_JS)?;

    let metadata = serde_json::json!({
        "KPlugin": {
            "Name": "Aemeath Cursor Tracker",
            "Id": SCRIPT_NAME,
        }
    });
    fs::write(
        dir.join("metadata.json"),
        serde_json::to_string_pretty(&metadata)?,
    )?;

    Ok(script_path)
}

pub fn script_object_path(id: i32) -> String {
    format!("{SCRIPTING_PATH}/Script{id}")
}

impl KdeCursor {
    pub fn connect() -> Result<Self> {
        let (tx, rx) = unbounded();
        let conn = connection::Builder::session()?
            .method_timeout(DBUS_CALL_TIMEOUT)
            .name(SERVICE_NAME)?
            .serve_at(OBJECT_PATH, CursorSink { tx })?
            .build()
            .context("Cannot register D-Bus service")?;

        let script_dir = tempfile::Builder::new()
            .prefix("aemeath-kwin-")
            .tempdir()
            .context("Failed to create KWin script directory")?;
        let script_path = write_kwin_script(script_dir.path())?;

        // from here on Drop cleans up whatever was set up
        let mut tracker = Self {
            conn,
            rx,
            script_dir: Some(script_dir),
            script_loaded: false,
            last: CursorSample::default(),
        };

        // a previous run may have left its script behind
        if let Err(e) = tracker.unload_script() {
            debug!("no stale KWin script to unload: {e:#}");
        }

        let reply = tracker
            .conn
            .call_method(
                Some(KWIN_DEST),
                SCRIPTING_PATH,
                Some(SCRIPTING_IFACE),
                "loadScript",
                &(script_path.to_string_lossy().as_ref(), SCRIPT_NAME),
            )
            .context("Failed to load KWin script")?;
        let script_id: i32 = reply.body().deserialize()?;
        tracker.script_loaded = true;

        tracker
            .conn
            .call_method(
                Some(KWIN_DEST),
                script_object_path(script_id).as_str(),
                Some(SCRIPT_IFACE),
                "run",
                &(),
            )
            .context("Failed to start KWin script")?;

        match tracker.rx.recv_timeout(FIRST_UPDATE_TIMEOUT) {
            Ok((x, y)) => tracker.last = CursorSample::new(x as f64, y as f64, false),
            Err(_) => bail!("KWin script loaded but no cursor data received"),
        }

        Ok(tracker)
    }

    fn unload_script(&self) -> Result<()> {
        self.conn.call_method(
            Some(KWIN_DEST),
            SCRIPTING_PATH,
            Some(SCRIPTING_IFACE),
            "unloadScript",
            &(SCRIPT_NAME,),
        )?;
        Ok(())
    }
}

impl CursorTracker for KdeCursor {
    fn kind(&self) -> BackendKind {
        BackendKind::Kde
    }

    fn query(&mut self) -> CursorSample {
        if let Some((x, y)) = self.rx.try_iter().last() {
            self.last = CursorSample::new(x as f64, y as f64, false);
        }
        self.last
    }

    fn close(&mut self) {
        if self.script_loaded {
            if let Err(e) = self.unload_script() {
                warn!("failed to unload KWin script: {e:#}");
            }
            self.script_loaded = false;
        }
        if let Some(dir) = self.script_dir.take() {
            let _ = dir.close();
        }
        let _ = self.conn.release_name(SERVICE_NAME);
    }
}

impl Drop for KdeCursor {
    fn drop(&mut self) {
        if self.script_loaded || self.script_dir.is_some() {
            self.close();
        }
    }
}
