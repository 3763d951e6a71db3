use anyhow::{Context, Result};
use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, RgbaImage};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::config::AssetPaths;
use crate::model::pet::AnimationKey;

/// GIFs with 0 or tiny delays would otherwise spin; players clamp them.
pub const MIN_FRAME_DELAY: Duration = Duration::from_millis(20);

#[derive(Clone, Debug)]
pub struct AnimationFrame {
    pub image: RgbaImage,
    pub delay: Duration,
}

#[derive(Clone, Debug)]
pub struct Animation {
    pub frames: Vec<AnimationFrame>,
}

impl Animation {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let decoder = GifDecoder::new(BufReader::new(file))
            .with_context(|| format!("Failed to read GIF header of {}", path.display()))?;
        let frames = decoder
            .into_frames()
            .collect_frames()
            .with_context(|| format!("Failed to decode {}", path.display()))?;

        let frames: Vec<AnimationFrame> = frames
            .into_iter()
            .map(|frame| {
                let (numer, denom) = frame.delay().numer_denom_ms();
                let ms = if denom == 0 { 0 } else { numer / denom };
                AnimationFrame {
                    delay: Duration::from_millis(ms as u64).max(MIN_FRAME_DELAY),
                    image: frame.into_buffer(),
                }
            })
            .collect();

        if frames.is_empty() {
            anyhow::bail!("{} contains no frames", path.display());
        }
        Ok(Self { frames })
    }

    pub fn from_frames(frames: Vec<AnimationFrame>) -> Self {
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn total_duration(&self) -> Duration {
        self.frames.iter().map(|f| f.delay).sum()
    }
}

/// Every clip the pet and the seal can show, keyed by [`AnimationKey`].
#[derive(Default)]
pub struct AnimationLibrary {
    clips: HashMap<AnimationKey, Animation>,
    idle_count: usize,
}

impl AnimationLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes all clips in parallel. Move, drag and seal are required;
    /// idle clips stop at the first one that fails.
    pub fn load(assets: &AssetPaths) -> Result<Self> {
        let mut jobs: Vec<(AnimationKey, PathBuf)> = vec![
            (AnimationKey::Move, assets.move_gif.clone()),
            (AnimationKey::Drag, assets.drag_gif.clone()),
            (AnimationKey::Seal, assets.seal_gif.clone()),
        ];
        jobs.extend(
            assets
                .idle
                .iter()
                .enumerate()
                .map(|(i, path)| (AnimationKey::Idle(i + 1), path.clone())),
        );

        let results: Vec<(AnimationKey, Result<Animation>)> = jobs
            .into_par_iter()
            .map(|(key, path)| (key, Animation::load(&path)))
            .collect();

        let mut library = Self::new();
        let mut idle_loaded = Vec::new();
        for (key, result) in results {
            match (key, result) {
                (AnimationKey::Idle(n), Ok(anim)) => {
                    idle_loaded.push(n);
                    library.clips.insert(key, anim);
                }
                (AnimationKey::Idle(n), Err(e)) => {
                    warn!("skipping idle{n}.gif: {e:#}");
                }
                (key, Ok(anim)) => {
                    library.clips.insert(key, anim);
                }
                (key, Err(e)) => {
                    return Err(e.context(format!("Required animation {key:?} is unusable")));
                }
            }
        }

        idle_loaded.sort_unstable();
        library.idle_count = idle_loaded
            .iter()
            .zip(1..)
            .take_while(|(n, expected)| **n == *expected)
            .count();
        library
            .clips
            .retain(|key, _| !matches!(key, AnimationKey::Idle(n) if *n > library.idle_count));

        info!(
            idle_clips = library.idle_count,
            "loaded animations from {}",
            assets.root.display()
        );
        Ok(library)
    }

    pub fn insert(&mut self, key: AnimationKey, animation: Animation) {
        if let AnimationKey::Idle(n) = key {
            self.idle_count = self.idle_count.max(n);
        }
        self.clips.insert(key, animation);
    }

    /// Missing clips fall back to the move animation.
    pub fn get(&self, key: AnimationKey) -> Option<&Animation> {
        self.clips
            .get(&key)
            .or_else(|| self.clips.get(&AnimationKey::Move))
    }

    pub fn idle_count(&self) -> usize {
        self.idle_count
    }
}
