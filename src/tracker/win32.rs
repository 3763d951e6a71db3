use anyhow::Result;
use windows_sys::Win32::Foundation::POINT;
use windows_sys::Win32::UI::Input::KeyboardAndMouse::{GetAsyncKeyState, VK_LBUTTON};
use windows_sys::Win32::UI::WindowsAndMessaging::GetCursorPos;

use super::{BackendKind, CursorSample, CursorTracker};

const KEY_DOWN: u16 = 0x8000;

pub struct Win32Cursor {
    last: CursorSample,
}

impl Win32Cursor {
    pub fn new() -> Result<Self> {
        let mut tracker = Self {
            last: CursorSample::default(),
        };
        tracker.query();
        Ok(tracker)
    }
}

impl CursorTracker for Win32Cursor {
    fn kind(&self) -> BackendKind {
        BackendKind::Win32
    }

    fn query(&mut self) -> CursorSample {
        let mut pt = POINT { x: 0, y: 0 };
        // SAFETY: `pt` is a valid, writable POINT for the duration of the call.
        let ok = unsafe { GetCursorPos(&mut pt) } != 0;
        // SAFETY: plain query of the async key state, no pointers involved.
        let state = unsafe { GetAsyncKeyState(VK_LBUTTON as i32) } as u16;
        if ok {
            self.last = CursorSample::new(pt.x as f64, pt.y as f64, state & KEY_DOWN != 0);
        }
        self.last
    }
}
