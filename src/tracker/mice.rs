// Raw PS/2 packets from /dev/input/mice

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, unbounded};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::thread;

pub const MICE_DEVICE: &str = "/dev/input/mice";

const LEFT_BUTTON: u8 = 0x01;
const X_SIGN: u8 = 0x10;
const Y_SIGN: u8 = 0x20;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MousePacket {
    pub dx: i32,
    /// Already in screen orientation (down is positive).
    pub dy: i32,
    pub left: bool,
}

pub fn decode_packet(packet: [u8; 3]) -> MousePacket {
    let [flags, raw_x, raw_y] = packet;
    let mut dx = raw_x as i32;
    let mut dy = raw_y as i32;
    if flags & X_SIGN != 0 {
        dx -= 256;
    }
    if flags & Y_SIGN != 0 {
        dy -= 256;
    }
    MousePacket {
        dx,
        dy: -dy,
        left: flags & LEFT_BUTTON != 0,
    }
}

/// Accumulated motion since the previous drain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MouseDelta {
    pub dx: i32,
    pub dy: i32,
    pub left: bool,
}

pub fn accumulate<I: IntoIterator<Item = MousePacket>>(packets: I) -> MouseDelta {
    packets.into_iter().fold(MouseDelta::default(), |acc, p| MouseDelta {
        dx: acc.dx + p.dx,
        dy: acc.dy + p.dy,
        left: p.left,
    })
}

/// Reads the device on a helper thread so the tick never blocks.
pub struct MiceReader {
    rx: Receiver<MousePacket>,
}

impl MiceReader {
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path).with_context(|| {
            format!(
                "{} is not readable. Add your user to the 'input' group: sudo usermod -aG input $USER",
                path.display()
            )
        })?;

        let (tx, rx) = unbounded();
        thread::Builder::new()
            .name("aemeath-mice".to_string())
            .spawn(move || {
                let mut packet = [0u8; 3];
                while file.read_exact(&mut packet).is_ok() {
                    if tx.send(decode_packet(packet)).is_err() {
                        break;
                    }
                }
            })
            .context("Failed to spawn mouse reader thread")?;

        Ok(Self { rx })
    }

    pub fn drain(&self) -> MouseDelta {
        accumulate(self.rx.try_iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_positive_motion() {
        let p = decode_packet([0x08, 5, 3]);
        assert_eq!(p, MousePacket { dx: 5, dy: -3, left: false });
    }

    #[test]
    fn test_decode_negative_motion_and_button() {
        // x = -2, y = -4 (down on screen)
        let p = decode_packet([0x08 | X_SIGN | Y_SIGN | LEFT_BUTTON, 254, 252]);
        assert_eq!(p, MousePacket { dx: -2, dy: 4, left: true });
    }

    #[test]
    fn test_accumulate_keeps_last_button() {
        let delta = accumulate([
            MousePacket { dx: 3, dy: 1, left: true },
            MousePacket { dx: -1, dy: 2, left: false },
        ]);
        assert_eq!(delta, MouseDelta { dx: 2, dy: 3, left: false });
        assert_eq!(accumulate(Vec::new()), MouseDelta::default());
    }

    #[test]
    fn test_reader_drains_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mice");
        std::fs::write(&path, [0x08, 10, 0, 0x08, 5, 1]).unwrap();

        let reader = MiceReader::open(&path).unwrap();
        let mut total = MouseDelta::default();
        for _ in 0..100 {
            let d = reader.drain();
            total.dx += d.dx;
            total.dy += d.dy;
            if total.dx == 15 {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert_eq!(total.dx, 15);
        assert_eq!(total.dy, -1);
    }

    #[test]
    fn test_open_missing_device_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(MiceReader::open(&dir.path().join("nope")).is_err());
    }
}
