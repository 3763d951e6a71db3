// Library exports for aemeath

pub mod app;
pub mod components;
pub mod config;
pub mod event;
pub mod logging;
pub mod model;
pub mod panel;
pub mod sprite;
pub mod tracker;
pub mod widgets;

pub use config::{Config, SpeedPreset};
pub use tracker::{BackendKind, CursorTracker};
