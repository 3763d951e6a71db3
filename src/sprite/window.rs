use anyhow::{Context as _, Result, anyhow};
use image::RgbaImage;
use softbuffer::{Context, Surface};
use std::num::NonZeroU32;
use std::rc::Rc;
use tracing::warn;
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window, WindowLevel};

use crate::model::geometry::Point;

/// A frameless, transparent, always-on-top window showing one sprite.
///
/// Positions are given as the sprite centre in logical pixels.
pub struct SpriteWindow {
    window: Rc<Window>,
    _context: Context<Rc<Window>>,
    surface: Surface<Rc<Window>, Rc<Window>>,
    size: (u32, u32),
    center: Point,
    scale_factor: f64,
    visible: bool,
}

impl SpriteWindow {
    pub fn create(event_loop: &ActiveEventLoop, title: &str) -> Result<Self> {
        #[allow(unused_mut)]
        let mut attrs = Window::default_attributes()
            .with_title(title)
            .with_decorations(false)
            .with_transparent(true)
            .with_resizable(false)
            .with_window_level(WindowLevel::AlwaysOnTop)
            .with_active(false)
            .with_visible(false)
            .with_inner_size(PhysicalSize::new(1u32, 1u32));

        #[cfg(target_os = "windows")]
        {
            use winit::platform::windows::WindowAttributesExtWindows;
            attrs = attrs.with_skip_taskbar(true);
        }
        #[cfg(target_os = "linux")]
        {
            use winit::platform::x11::{WindowAttributesExtX11, WindowType};
            attrs = attrs.with_x11_window_type(vec![WindowType::Utility]);
        }

        let window = Rc::new(
            event_loop
                .create_window(attrs)
                .with_context(|| format!("Failed to create {title} window"))?,
        );

        // clicks must reach whatever is under the sprite
        if let Err(e) = window.set_cursor_hittest(false) {
            warn!("{title}: click-through unsupported: {e}");
        }

        let context = Context::new(window.clone()).map_err(|e| anyhow!("softbuffer: {e}"))?;
        let surface =
            Surface::new(&context, window.clone()).map_err(|e| anyhow!("softbuffer: {e}"))?;
        let scale_factor = window.scale_factor();

        Ok(Self {
            window,
            _context: context,
            surface,
            size: (0, 0),
            center: Point::default(),
            scale_factor,
            visible: false,
        })
    }

    pub fn center(&self) -> Point {
        self.center
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn show(&mut self) {
        if !self.visible {
            self.window.set_visible(true);
            self.visible = true;
            self.reposition();
        }
    }

    pub fn hide(&mut self) {
        if self.visible {
            self.window.set_visible(false);
            self.visible = false;
        }
    }

    pub fn set_scale_factor(&mut self, scale_factor: f64) {
        self.scale_factor = scale_factor;
        self.reposition();
    }

    pub fn move_center_to(&mut self, center: Point) {
        if center != self.center {
            self.center = center;
            self.reposition();
        }
    }

    /// Copies `frame` into the surface, resizing the window when the frame
    /// size changed.
    pub fn present(&mut self, frame: &RgbaImage) -> Result<()> {
        let (w, h) = frame.dimensions();
        let (Some(nw), Some(nh)) = (NonZeroU32::new(w), NonZeroU32::new(h)) else {
            return Ok(());
        };

        if (w, h) != self.size {
            let _ = self.window.request_inner_size(PhysicalSize::new(w, h));
            self.size = (w, h);
            self.reposition();
        }

        self.surface
            .resize(nw, nh)
            .map_err(|e| anyhow!("softbuffer resize: {e}"))?;
        let mut buffer = self
            .surface
            .buffer_mut()
            .map_err(|e| anyhow!("softbuffer buffer: {e}"))?;
        pack_premultiplied(frame, &mut buffer);
        buffer
            .present()
            .map_err(|e| anyhow!("softbuffer present: {e}"))?;
        Ok(())
    }

    fn reposition(&self) {
        let (x, y) = top_left_for(self.center, self.size, self.scale_factor);
        self.window.set_outer_position(PhysicalPosition::new(x, y));
    }
}

/// Physical top-left corner that centres a `size` sprite on a logical point.
pub fn top_left_for(center: Point, size: (u32, u32), scale_factor: f64) -> (i32, i32) {
    let cx = center.x * scale_factor;
    let cy = center.y * scale_factor;
    (
        (cx - size.0 as f64 / 2.0).round() as i32,
        (cy - size.1 as f64 / 2.0).round() as i32,
    )
}

/// RGBA to the premultiplied 0xAARRGGBB layout softbuffer expects.
pub fn pack_premultiplied(frame: &RgbaImage, out: &mut [u32]) {
    for (dst, px) in out.iter_mut().zip(frame.pixels()) {
        let [r, g, b, a] = px.0;
        let a32 = a as u32;
        let pm = |c: u8| (c as u32 * a32 + 127) / 255;
        *dst = (a32 << 24) | (pm(r) << 16) | (pm(g) << 8) | pm(b);
    }
}
