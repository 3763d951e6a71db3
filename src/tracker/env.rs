use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Linux,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else {
            Platform::Other
        }
    }
}

/// The parts of the desktop session that decide which cursor backend works.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionEnv {
    pub platform: Platform,
    pub wayland: bool,
    pub hyprland_signature: Option<String>,
    /// Upper-cased `XDG_CURRENT_DESKTOP`.
    pub desktop: String,
    pub runtime_dir: Option<PathBuf>,
}

impl SessionEnv {
    pub fn from_process() -> Self {
        Self::from_lookup(Platform::current(), |key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(platform: Platform, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let wayland = non_empty("WAYLAND_DISPLAY").is_some()
            || lookup("XDG_SESSION_TYPE").as_deref() == Some("wayland");

        Self {
            platform,
            wayland,
            hyprland_signature: non_empty("HYPRLAND_INSTANCE_SIGNATURE"),
            desktop: lookup("XDG_CURRENT_DESKTOP")
                .unwrap_or_default()
                .to_uppercase(),
            runtime_dir: non_empty("XDG_RUNTIME_DIR").map(PathBuf::from),
        }
    }

    pub fn is_gnome_like(&self) -> bool {
        ["GNOME", "UBUNTU", "POP", "UNITY"]
            .iter()
            .any(|d| self.desktop.contains(d))
    }

    pub fn is_kde_like(&self) -> bool {
        ["KDE", "PLASMA"].iter().any(|d| self.desktop.contains(d))
    }
}
