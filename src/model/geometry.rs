use rand::Rng;

/// A position in logical screen pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn delta_to(self, other: Point) -> (f64, f64) {
        (other.x - self.x, other.y - self.y)
    }

    pub fn distance_to(self, other: Point) -> f64 {
        let (dx, dy) = self.delta_to(other);
        dx.hypot(dy)
    }

    /// Point at `radius` from `self` in direction `angle` (radians).
    pub fn polar_offset(self, angle: f64, radius: f64) -> Point {
        Point::new(self.x + radius * angle.cos(), self.y + radius * angle.sin())
    }
}

/// Screen area in logical pixels. `right`/`bottom` are inclusive edges.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl ScreenRect {
    pub const fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width - 1.0
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height - 1.0
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.left + self.width / 2.0).floor(),
            (self.top + self.height / 2.0).floor(),
        )
    }

    /// Clamp into the rect shrunk by `margin`. When the margin swallows the
    /// whole rect the near edge wins.
    pub fn clamp(&self, p: Point, margin: f64) -> Point {
        Point::new(
            (self.left + margin).max((self.right() - margin).min(p.x)),
            (self.top + margin).max((self.bottom() - margin).min(p.y)),
        )
    }

    /// Uniform integer position inside the rect shrunk by `margin`, or the
    /// centre if that leaves nothing.
    pub fn random_point<R: Rng + ?Sized>(&self, rng: &mut R, margin: f64) -> Point {
        let (x0, x1) = ((self.left + margin) as i64, (self.right() - margin) as i64);
        let (y0, y1) = ((self.top + margin) as i64, (self.bottom() - margin) as i64);
        if x1 < x0 || y1 < y0 {
            return self.center();
        }
        Point::new(
            rng.random_range(x0..=x1) as f64,
            rng.random_range(y0..=y1) as f64,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_distance() {
        assert_eq!(Point::new(0.0, 0.0).distance_to(Point::new(3.0, 4.0)), 5.0);
    }

    #[test]
    fn test_clamp_inside_margin() {
        let rect = ScreenRect::new(0.0, 0.0, 1920.0, 1080.0);
        let p = rect.clamp(Point::new(-50.0, 5000.0), 30.0);
        assert_eq!(p, Point::new(30.0, 1079.0 - 30.0));
        let inside = rect.clamp(Point::new(400.0, 400.0), 30.0);
        assert_eq!(inside, Point::new(400.0, 400.0));
    }

    #[test]
    fn test_random_point_respects_margin() {
        let rect = ScreenRect::new(100.0, 50.0, 800.0, 600.0);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let p = rect.random_point(&mut rng, 100.0);
            assert!(p.x >= 200.0 && p.x <= rect.right() - 100.0);
            assert!(p.y >= 150.0 && p.y <= rect.bottom() - 100.0);
        }
    }

    #[test]
    fn test_random_point_tiny_rect_uses_center() {
        let rect = ScreenRect::new(0.0, 0.0, 50.0, 50.0);
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(rect.random_point(&mut rng, 100.0), rect.center());
    }
}
