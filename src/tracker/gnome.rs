use anyhow::{Context, Result, anyhow, bail};
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::debug;
use wait_timeout::ChildExt;
use zbus::blocking::{Connection, connection};

use super::{BackendKind, CursorSample, CursorTracker, DBUS_CALL_TIMEOUT};

const SHELL_DEST: &str = "org.gnome.Shell";
const SHELL_PATH: &str = "/org/gnome/Shell";
const SHELL_IFACE: &str = "org.gnome.Shell";
const POINTER_EXPR: &str = "global.get_pointer()";

const GDBUS: &str = "gdbus";
const GDBUS_TIMEOUT: Duration = Duration::from_secs(1);

/// Clutter BUTTON1_MASK.
const BUTTON1_MASK: u32 = 0x100;

enum Transport {
    Bus(Connection),
    /// The `gdbus` command line tool, for sessions where the library call
    /// is refused.
    Cli,
}

/// GNOME Shell's `global.get_pointer()` evaluated over the session bus.
pub struct GnomeCursor {
    transport: Transport,
    last: CursorSample,
}

impl GnomeCursor {
    pub fn connect() -> Result<Self> {
        let bus_attempt = connection::Builder::session()
            .and_then(|b| b.method_timeout(DBUS_CALL_TIMEOUT).build())
            .map_err(anyhow::Error::from)
            .and_then(|conn| query_bus(&conn).map(|sample| (conn, sample)));

        let (transport, last) = match bus_attempt {
            Ok((conn, sample)) => (Transport::Bus(conn), sample),
            Err(e) => {
                debug!("GNOME Shell Eval via D-Bus failed, trying gdbus: {e:#}");
                (Transport::Cli, query_cli()?)
            }
        };

        Ok(Self { transport, last })
    }
}

fn query_bus(conn: &Connection) -> Result<CursorSample> {
    let reply = conn.call_method(
        Some(SHELL_DEST),
        SHELL_PATH,
        Some(SHELL_IFACE),
        "Eval",
        &(POINTER_EXPR,),
    )?;
    let (success, value): (bool, String) = reply.body().deserialize()?;
    if !success {
        bail!("GNOME Shell Eval returned failure");
    }
    parse_pointer_json(&value)
}

fn query_cli() -> Result<CursorSample> {
    run_gdbus(Path::new(GDBUS), GDBUS_TIMEOUT)
}

/// Runs one `gdbus call`, killing it when it outlives `timeout`.
fn run_gdbus(program: &Path, timeout: Duration) -> Result<CursorSample> {
    let mut child = Command::new(program)
        .args([
            "call",
            "--session",
            "--dest",
            SHELL_DEST,
            "--object-path",
            SHELL_PATH,
            "--method",
            "org.gnome.Shell.Eval",
            POINTER_EXPR,
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to run {}", program.display()))?;

    let Some(status) = child
        .wait_timeout(timeout)
        .context("Failed to wait for gdbus")?
    else {
        let _ = child.kill();
        let _ = child.wait();
        bail!("gdbus call timed out after {timeout:?}");
    };

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    if let Some(mut out) = child.stdout.take() {
        out.read_to_end(&mut stdout)?;
    }
    if let Some(mut err) = child.stderr.take() {
        err.read_to_end(&mut stderr)?;
    }

    if !status.success() {
        bail!(
            "gdbus call failed: {}",
            String::from_utf8_lossy(&stderr).trim()
        );
    }
    parse_gdbus_output(&String::from_utf8_lossy(&stdout))
}

/// `[x, y, modifiers]` as returned by Eval.
pub fn parse_pointer_json(value: &str) -> Result<CursorSample> {
    let data: Vec<f64> = serde_json::from_str(value)
        .with_context(|| format!("Unexpected pointer value: {value}"))?;
    if data.len() < 3 {
        bail!("Unexpected pointer value: {value}");
    }
    let pressed = (data[2] as u32) & BUTTON1_MASK != 0;
    Ok(CursorSample::new(data[0], data[1], pressed))
}

/// Finds the first `[x, y, mods]` triple in gdbus' textual output, e.g.
/// `(true, '[812, 433, 0]')`.
pub fn parse_gdbus_output(stdout: &str) -> Result<CursorSample> {
    let mut rest = stdout;
    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        let Some(close) = after.find(']') else {
            break;
        };
        let values: Vec<u32> = after[..close]
            .split(',')
            .map(|s| s.trim().parse::<u32>())
            .collect::<Result<_, _>>()
            .unwrap_or_default();
        if values.len() == 3 {
            return Ok(CursorSample::new(
                values[0] as f64,
                values[1] as f64,
                values[2] & BUTTON1_MASK != 0,
            ));
        }
        rest = after;
    }
    Err(anyhow!("Cannot parse gdbus output: {}", stdout.trim()))
}

impl CursorTracker for GnomeCursor {
    fn kind(&self) -> BackendKind {
        BackendKind::Gnome
    }

    fn query(&mut self) -> CursorSample {
        let result = match &self.transport {
            Transport::Bus(conn) => query_bus(conn),
            Transport::Cli => query_cli(),
        };
        match result {
            Ok(sample) => self.last = sample,
            Err(e) => debug!("GNOME pointer query failed: {e:#}"),
        }
        self.last
    }
}
