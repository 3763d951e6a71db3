use image::RgbaImage;
use image::imageops::{self, FilterType};
use std::collections::HashMap;
use std::time::Duration;

use super::library::AnimationLibrary;
use crate::model::pet::AnimationKey;

type CacheKey = (AnimationKey, usize, bool);

/// Plays one clip at a time and hands out scaled, optionally mirrored frames.
///
/// Switching to the clip that is already playing is a no-op, so a pet that
/// keeps reporting the same animation does not restart it every tick.
pub struct SpritePlayer {
    key: Option<AnimationKey>,
    flipped: bool,
    frame: usize,
    frame_started: Duration,
    scale: f64,
    cache: HashMap<CacheKey, RgbaImage>,
}

impl Default for SpritePlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpritePlayer {
    pub fn new() -> Self {
        Self {
            key: None,
            flipped: false,
            frame: 0,
            frame_started: Duration::ZERO,
            scale: 1.0,
            cache: HashMap::new(),
        }
    }

    pub fn frame_index(&self) -> usize {
        self.frame
    }

    pub fn flipped(&self) -> bool {
        self.flipped
    }

    /// Returns true when the visible frame changes.
    pub fn set_animation(&mut self, key: AnimationKey, now: Duration) -> bool {
        if self.key == Some(key) {
            return false;
        }
        self.key = Some(key);
        self.frame = 0;
        self.frame_started = now;
        true
    }

    /// Rewinds the current clip to its first frame.
    pub fn restart(&mut self, now: Duration) {
        self.frame = 0;
        self.frame_started = now;
    }

    pub fn set_flipped(&mut self, flipped: bool) -> bool {
        if self.flipped == flipped {
            return false;
        }
        self.flipped = flipped;
        true
    }

    pub fn set_scale(&mut self, scale: f64) -> bool {
        if (self.scale - scale).abs() < f64::EPSILON {
            return false;
        }
        self.scale = scale;
        self.cache.clear();
        true
    }

    /// Steps through as many frames as have elapsed. Returns true when the
    /// frame index moved.
    pub fn advance(&mut self, library: &AnimationLibrary, now: Duration) -> bool {
        let Some(anim) = self.key.and_then(|k| library.get(k)) else {
            return false;
        };
        if anim.len() <= 1 {
            return false;
        }

        // after a long stall just resync instead of replaying every frame
        let total = anim.total_duration();
        if now.saturating_sub(self.frame_started) > total * 2 {
            self.frame_started = now;
            self.frame = (self.frame + 1) % anim.len();
            return true;
        }

        let mut changed = false;
        loop {
            let delay = anim.frames[self.frame % anim.len()].delay;
            if now.saturating_sub(self.frame_started) < delay {
                break;
            }
            self.frame_started += delay;
            self.frame = (self.frame + 1) % anim.len();
            changed = true;
        }
        changed
    }

    /// The current frame, mirrored and scaled. Results are cached until the
    /// scale changes.
    pub fn render(&mut self, library: &AnimationLibrary) -> Option<&RgbaImage> {
        let key = self.key?;
        let anim = library.get(key)?;
        if anim.is_empty() {
            return None;
        }
        let index = self.frame % anim.len();
        let source = &anim.frames.get(index)?.image;
        let scale = self.scale;
        let flipped = self.flipped;

        Some(
            self.cache
                .entry((key, index, flipped))
                .or_insert_with(|| transform_frame(source, flipped, scale)),
        )
    }
}

pub fn scaled_size(width: u32, height: u32, scale: f64) -> (u32, u32) {
    let w = ((width as f64) * scale).round().max(1.0) as u32;
    let h = ((height as f64) * scale).round().max(1.0) as u32;
    (w, h)
}

fn transform_frame(source: &RgbaImage, flipped: bool, scale: f64) -> RgbaImage {
    let mirrored;
    let base = if flipped {
        mirrored = imageops::flip_horizontal(source);
        &mirrored
    } else {
        source
    };

    let (w, h) = scaled_size(base.width(), base.height(), scale);
    if (w, h) == base.dimensions() {
        return base.clone();
    }
    imageops::resize(base, w, h, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sprite::library::tests::solid_animation;
    use image::Rgba;

    fn library() -> AnimationLibrary {
        let mut library = AnimationLibrary::new();
        library.insert(AnimationKey::Move, solid_animation(3, 10, 4, 100));
        library.insert(AnimationKey::Seal, solid_animation(1, 6, 6, 100));
        library
    }

    #[test]
    fn test_set_same_animation_is_noop() {
        let mut player = SpritePlayer::new();
        assert!(player.set_animation(AnimationKey::Move, Duration::ZERO));
        let lib = library();
        player.advance(&lib, Duration::from_millis(150));
        assert_eq!(player.frame_index(), 1);

        assert!(!player.set_animation(AnimationKey::Move, Duration::from_millis(160)));
        assert_eq!(player.frame_index(), 1);

        assert!(player.set_animation(AnimationKey::Seal, Duration::from_millis(170)));
        assert_eq!(player.frame_index(), 0);
    }

    #[test]
    fn test_advance_follows_frame_delays() {
        let lib = library();
        let mut player = SpritePlayer::new();
        player.set_animation(AnimationKey::Move, Duration::ZERO);

        assert!(!player.advance(&lib, Duration::from_millis(99)));
        assert!(player.advance(&lib, Duration::from_millis(100)));
        assert_eq!(player.frame_index(), 1);
        assert!(player.advance(&lib, Duration::from_millis(300)));
        assert_eq!(player.frame_index(), 0);
    }

    #[test]
    fn test_advance_resyncs_after_stall() {
        let lib = library();
        let mut player = SpritePlayer::new();
        player.set_animation(AnimationKey::Move, Duration::ZERO);

        assert!(player.advance(&lib, Duration::from_secs(10)));
        assert_eq!(player.frame_index(), 1);
        assert!(!player.advance(&lib, Duration::from_millis(10_050)));
    }

    #[test]
    fn test_single_frame_never_advances() {
        let lib = library();
        let mut player = SpritePlayer::new();
        player.set_animation(AnimationKey::Seal, Duration::ZERO);
        assert!(!player.advance(&lib, Duration::from_secs(1)));
    }

    #[test]
    fn test_render_scales_and_flips() {
        let mut lib = AnimationLibrary::new();
        let mut img = RgbaImage::from_pixel(4, 2, Rgba([0, 0, 0, 255]));
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        lib.insert(
            AnimationKey::Move,
            crate::sprite::library::Animation::from_frames(vec![
                crate::sprite::library::AnimationFrame {
                    image: img,
                    delay: Duration::from_millis(100),
                },
            ]),
        );

        let mut player = SpritePlayer::new();
        player.set_animation(AnimationKey::Move, Duration::ZERO);
        player.set_flipped(true);
        let frame = player.render(&lib).unwrap();
        assert_eq!(frame.dimensions(), (4, 2));
        assert_eq!(frame.get_pixel(3, 0), &Rgba([255, 0, 0, 255]));

        assert!(player.set_scale(0.5));
        let frame = player.render(&lib).unwrap();
        assert_eq!(frame.dimensions(), (2, 1));
        assert!(!player.set_scale(0.5));
    }

    #[test]
    fn test_render_empty_clip_yields_nothing() {
        let mut lib = AnimationLibrary::new();
        lib.insert(
            AnimationKey::Move,
            crate::sprite::library::Animation::from_frames(Vec::new()),
        );
        let mut player = SpritePlayer::new();
        player.set_animation(AnimationKey::Move, Duration::ZERO);
        assert!(!player.advance(&lib, Duration::from_secs(1)));
        assert!(player.render(&lib).is_none());
    }

    #[test]
    fn test_scaled_size_never_zero() {
        assert_eq!(scaled_size(100, 40, 0.35), (35, 14));
        assert_eq!(scaled_size(1, 1, 0.01), (1, 1));
    }
}
