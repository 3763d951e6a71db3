use aemeath::app::{self, PanelChannels};
use aemeath::config::{AssetPaths, Config, SpeedPreset, locate_assets};
use aemeath::logging;
use aemeath::sprite::AnimationLibrary;
use aemeath::tracker::{BackendKind, SessionEnv, candidate_order};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

/// An animated desktop pet that follows your mouse.
#[derive(Parser, Debug)]
#[command(name = "aemeath", version, about)]
struct Cli {
    /// Config file (default: <config dir>/aemeath/config.toml)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory containing gifs/
    #[arg(short, long, value_name = "DIR")]
    assets: Option<PathBuf>,

    /// Cursor backend to try first (auto-detected when omitted)
    #[arg(short, long, value_enum)]
    backend: Option<BackendKind>,

    /// Show the terminal control panel
    #[arg(long)]
    panel: bool,

    /// Movement speed preset
    #[arg(short, long, value_enum)]
    speed: Option<SpeedPreset>,

    /// Write the effective configuration to PATH and exit
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,

    /// List cursor backends and exit
    #[arg(long)]
    list_backends: bool,
}

fn main() {
    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    if cli.list_backends {
        let order = candidate_order(&SessionEnv::from_process(), None);
        for kind in BackendKind::ALL {
            let mark = if order.contains(&kind) { "*" } else { " " };
            println!("{mark} {:<9} {}", kind.name(), kind.description());
        }
        println!("\n* = tried on this session, in list order");
        return Ok(());
    }

    let mut config = Config::load(cli.config.as_deref())?;
    if cli.assets.is_some() {
        config.assets_dir = cli.assets;
    }
    if cli.backend.is_some() {
        config.backend = cli.backend;
    }
    if cli.speed.is_some() {
        config.speed = cli.speed;
    }

    if let Some(path) = cli.write_config {
        config.save(&path)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let panel = cli.panel.then(|| {
        let (tx, rx) = crossbeam_channel::unbounded();
        PanelChannels { tx, rx }
    });
    logging::init(panel.as_ref().map(|c| c.tx.clone()))?;

    let root = locate_assets(config.assets_dir.as_deref())?;
    let assets = AssetPaths::discover(&root)?;
    let library = AnimationLibrary::load(&assets)?;

    app::run(config, library, panel)
}
