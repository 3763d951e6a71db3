// XQueryPointer is only live while the pointer is over an XWayland surface.
// In between, raw /dev/input/mice deltas extrapolate the position using a
// sensitivity calibrated whenever X11 reports a fresh value.

use anyhow::Result;
use std::path::Path;
use tracing::debug;

use super::mice::{MICE_DEVICE, MiceReader, MouseDelta};
use super::x11::X11Pointer;
use super::{BackendKind, CursorSample, CursorTracker};

/// Raw movement below this magnitude is too noisy to calibrate from.
const CALIBRATION_MIN_RAW: f64 = 3.0;
const SENSITIVITY_KEEP: f64 = 0.85;

/// Pure position fusion, separated from the devices for testing.
#[derive(Clone, Debug, PartialEq)]
pub struct DeltaFusion {
    pub x: f64,
    pub y: f64,
    last_x11: (f64, f64),
    pub sensitivity: f64,
    screen: (f64, f64),
}

impl DeltaFusion {
    pub fn new(seed: (f64, f64), screen: (f64, f64)) -> Self {
        Self {
            x: seed.0,
            y: seed.1,
            last_x11: seed,
            sensitivity: 1.0,
            screen,
        }
    }

    pub fn update(&mut self, x11: (f64, f64), raw: (i32, i32)) -> (f64, f64) {
        let x11_dx = x11.0 - self.last_x11.0;
        let x11_dy = x11.1 - self.last_x11.1;
        let raw_dx = raw.0 as f64;
        let raw_dy = raw.1 as f64;

        if x11_dx != 0.0 || x11_dy != 0.0 {
            self.x = x11.0;
            self.y = x11.1;
            self.last_x11 = x11;

            let raw_mag = raw_dx.hypot(raw_dy);
            if raw_mag > CALIBRATION_MIN_RAW {
                let ratio = x11_dx.hypot(x11_dy) / raw_mag;
                self.sensitivity =
                    SENSITIVITY_KEEP * self.sensitivity + (1.0 - SENSITIVITY_KEEP) * ratio;
            }
        } else if raw.0 != 0 || raw.1 != 0 {
            self.x = (self.x + raw_dx * self.sensitivity).clamp(0.0, self.screen.0 - 1.0);
            self.y = (self.y + raw_dy * self.sensitivity).clamp(0.0, self.screen.1 - 1.0);
        }

        (self.x, self.y)
    }
}

pub struct WaylandHybridCursor {
    pointer: X11Pointer,
    mice: MiceReader,
    fusion: DeltaFusion,
}

impl WaylandHybridCursor {
    pub fn open() -> Result<Self> {
        let mice = MiceReader::open(Path::new(MICE_DEVICE))?;
        let pointer = X11Pointer::connect()?;
        let seed = pointer.query()?;
        let fusion = DeltaFusion::new((seed.x, seed.y), pointer.screen_size());
        Ok(Self {
            pointer,
            mice,
            fusion,
        })
    }
}

impl CursorTracker for WaylandHybridCursor {
    fn kind(&self) -> BackendKind {
        BackendKind::Hybrid
    }

    fn query(&mut self) -> CursorSample {
        let MouseDelta { dx, dy, left } = self.mice.drain();

        let (x11, x11_pressed) = match self.pointer.query() {
            Ok(s) => ((s.x, s.y), s.pressed),
            Err(e) => {
                debug!("XQueryPointer failed: {e:#}");
                // treat as stale so raw deltas keep the cursor moving
                ((self.fusion.last_x11.0, self.fusion.last_x11.1), false)
            }
        };

        let (x, y) = self.fusion.update(x11, (dx, dy));
        CursorSample::new(x, y, x11_pressed || left)
    }

    fn needs_dpr_scaling(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_x11_value_wins() {
        let mut f = DeltaFusion::new((100.0, 100.0), (1920.0, 1080.0));
        assert_eq!(f.update((110.0, 100.0), (0, 0)), (110.0, 100.0));
        assert_eq!(f.sensitivity, 1.0);
    }

    #[test]
    fn test_stale_x11_extrapolates_and_clamps() {
        let mut f = DeltaFusion::new((100.0, 100.0), (1920.0, 1080.0));
        assert_eq!(f.update((100.0, 100.0), (5, -3)), (105.0, 97.0));
        assert_eq!(f.update((100.0, 100.0), (-500, 0)), (0.0, 97.0));
        assert_eq!(f.update((100.0, 100.0), (0, 5000)), (0.0, 1079.0));
    }

    #[test]
    fn test_sensitivity_calibrates_towards_ratio() {
        let mut f = DeltaFusion::new((0.0, 0.0), (1920.0, 1080.0));
        // X11 moved 20px for 10 raw counts: ratio 2
        f.update((20.0, 0.0), (10, 0));
        assert!((f.sensitivity - 1.15).abs() < 1e-9);

        // small raw movement is ignored for calibration
        f.update((22.0, 0.0), (2, 0));
        assert!((f.sensitivity - 1.15).abs() < 1e-9);

        // then extrapolation uses it
        let (x, _) = f.update((22.0, 0.0), (10, 0));
        assert!((x - 33.5).abs() < 1e-9);
    }
}
