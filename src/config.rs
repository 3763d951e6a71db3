use anyhow::{Context, Result, anyhow, bail};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::tracker::BackendKind;

const CONFIG_DIR_NAME: &str = "aemeath";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Inclusive millisecond range sampled uniformly.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MsRange {
    pub min: u64,
    pub max: u64,
}

impl MsRange {
    pub const fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.max <= self.min {
            return self.min as f64;
        }
        rng.random_range(self.min..=self.max) as f64
    }
}

/// Behaviour and display constants. Distances and speeds are calibrated for
/// a screen `reference_screen_height` logical pixels tall.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tunables {
    pub move_speed: f64,
    pub wander_speed: f64,
    pub near_distance: f64,
    pub far_distance: f64,
    pub wander_duration_ms: MsRange,
    pub wander_radius: f64,
    pub wander_dir_change_ms: MsRange,
    pub idle_duration_ms: MsRange,
    pub mouse_move_threshold: f64,
    pub mouse_idle_t1_ms: u64,
    pub mouse_idle_t2_ms: u64,
    pub idle2_ramp_ms: u64,
    pub seal_wander_radius: f64,
    pub sprite_scale: f64,
    pub reference_screen_height: u32,
    pub tick_interval_ms: u64,
    pub screen_margin: f64,
    pub seal_spawn_margin: f64,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            move_speed: 4.0,
            wander_speed: 1.5,
            near_distance: 80.0,
            far_distance: 250.0,
            wander_duration_ms: MsRange::new(2000, 4000),
            wander_radius: 80.0,
            wander_dir_change_ms: MsRange::new(500, 1500),
            idle_duration_ms: MsRange::new(2000, 6000),
            mouse_move_threshold: 5.0,
            mouse_idle_t1_ms: 30_000,
            mouse_idle_t2_ms: 120_000,
            idle2_ramp_ms: 60_000,
            seal_wander_radius: 120.0,
            sprite_scale: 0.35,
            reference_screen_height: 1280,
            tick_interval_ms: 33,
            screen_margin: 30.0,
            seal_spawn_margin: 100.0,
        }
    }
}

/// Screen-dependent values derived from [`Tunables`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Scaled {
    pub ratio: f64,
    pub move_speed: f64,
    pub wander_speed: f64,
    pub near_distance: f64,
    pub far_distance: f64,
    pub wander_radius: f64,
    pub seal_wander_radius: f64,
    pub mouse_move_threshold: f64,
    pub sprite_scale: f64,
}

impl Tunables {
    /// Always recomputed from the base values, so calling it repeatedly
    /// never compounds.
    pub fn adapt_to_screen(&self, screen_height: u32) -> Scaled {
        let reference = self.reference_screen_height.max(1) as f64;
        let ratio = screen_height as f64 / reference;
        Scaled {
            ratio,
            move_speed: self.move_speed * ratio,
            wander_speed: self.wander_speed * ratio,
            near_distance: self.near_distance * ratio,
            far_distance: self.far_distance * ratio,
            wander_radius: self.wander_radius * ratio,
            seal_wander_radius: self.seal_wander_radius * ratio,
            mouse_move_threshold: self.mouse_move_threshold * ratio,
            sprite_scale: self.sprite_scale * ratio,
        }
    }

    /// Unscaled values, as if the screen matched the reference height.
    pub fn unscaled(&self) -> Scaled {
        self.adapt_to_screen(self.reference_screen_height)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SpeedPreset {
    Slow,
    Normal,
    Fast,
    Turbo,
}

impl SpeedPreset {
    pub const ALL: [SpeedPreset; 4] = [
        SpeedPreset::Slow,
        SpeedPreset::Normal,
        SpeedPreset::Fast,
        SpeedPreset::Turbo,
    ];

    pub fn move_speed(self) -> f64 {
        match self {
            SpeedPreset::Slow => 2.0,
            SpeedPreset::Normal => 4.0,
            SpeedPreset::Fast => 7.0,
            SpeedPreset::Turbo => 12.0,
        }
    }

    /// Wandering is always 40% of the chase speed.
    pub fn wander_speed(self) -> f64 {
        wander_speed_for(self.move_speed())
    }

    pub fn label(self) -> &'static str {
        match self {
            SpeedPreset::Slow => "Slow",
            SpeedPreset::Normal => "Normal",
            SpeedPreset::Fast => "Fast",
            SpeedPreset::Turbo => "Turbo",
        }
    }
}

pub fn wander_speed_for(move_speed: f64) -> f64 {
    move_speed * 0.4
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pet: Tunables,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<SpeedPreset>,
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// An explicit path must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load_from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml_string()?)
            .with_context(|| format!("Failed to write config {}", path.display()))
    }
}

/// Resolved animation files inside an assets directory.
#[derive(Clone, Debug, PartialEq)]
pub struct AssetPaths {
    pub root: PathBuf,
    pub move_gif: PathBuf,
    pub drag_gif: PathBuf,
    pub seal_gif: PathBuf,
    /// `idle1.gif`, `idle2.gif`, ... in order, contiguous from 1.
    pub idle: Vec<PathBuf>,
}

impl AssetPaths {
    pub fn discover(root: &Path) -> Result<Self> {
        let gifs = root.join("gifs");
        if !gifs.is_dir() {
            bail!("No gifs directory in {}", root.display());
        }

        let mut numbered = Vec::new();
        for entry in WalkDir::new(&gifs).max_depth(1).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if let Some(n) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(idle_index)
            {
                numbered.push((n, path.to_path_buf()));
            }
        }
        numbered.sort_by_key(|(n, _)| *n);

        let mut idle = Vec::new();
        for (expected, (n, path)) in (1..).zip(numbered) {
            if n != expected {
                break;
            }
            idle.push(path);
        }

        Ok(Self {
            root: root.to_path_buf(),
            move_gif: gifs.join("move.gif"),
            drag_gif: gifs.join("drag.gif"),
            seal_gif: gifs.join("seal.gif"),
            idle,
        })
    }
}

fn idle_index(file_name: &str) -> Option<usize> {
    let lower = file_name.to_ascii_lowercase();
    let digits = lower.strip_prefix("idle")?.strip_suffix(".gif")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Candidate asset roots in lookup order.
pub fn asset_candidates(explicit: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(path) = explicit {
        candidates.push(path.to_path_buf());
        return candidates;
    }
    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        candidates.push(exe_dir.join("assets"));
    }
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join("assets"));
    }
    if let Some(data) = dirs::data_dir() {
        candidates.push(data.join(CONFIG_DIR_NAME).join("assets"));
    }
    candidates
}

pub fn locate_assets(explicit: Option<&Path>) -> Result<PathBuf> {
    let candidates = asset_candidates(explicit);
    candidates
        .iter()
        .find(|dir| dir.is_dir())
        .cloned()
        .ok_or_else(|| {
            anyhow!(
                "Cannot find 'assets' directory (tried: {})",
                candidates
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })
}
