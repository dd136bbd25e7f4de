mod app;
mod download;
mod error;
mod image_ops;
mod repository;
mod settings;
mod slideshow;
mod wallpaper;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;

use crate::download::{DownloadSideChannel, HttpTransport};
use crate::slideshow::{ChaChaSource, RotationScheduler};
use crate::wallpaper::SystemWallpaper;

/// Rotate the desktop wallpaper through the pictures in your wallpapers folder.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Change the wallpaper every SECS seconds, starting now.
    #[arg(long, value_name = "SECS", allow_negative_numbers = true)]
    interval: Option<i64>,
    /// Use DIR instead of the OS pictures directory.
    #[arg(long, value_name = "DIR")]
    pictures_root: Option<PathBuf>,
    /// Read settings from FILE instead of the per-user settings.json.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Run the rotation without opening a window.
    #[arg(long)]
    headless: bool,
}

fn init_logger() {
    if std::env::var("RUST_LOG").is_ok() {
        env_logger::init();
        return;
    }
    Builder::new()
        .filter_level(LevelFilter::Warn)
        .filter_module("wallpaper_rotator", LevelFilter::Info)
        .init();
}

fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();

    let mut settings = match &args.config {
        Some(path) => settings::load_from(path),
        None => settings::load(),
    };
    if let Some(root) = args.pictures_root {
        settings.pictures_root = Some(root);
    }
    if args.interval.is_some() {
        settings.interval_secs = args.interval;
    }

    let repository = settings.repository();
    log::info!("wallpapers folder: {}", repository.wallpapers_dir().display());

    let mut scheduler = RotationScheduler::new(
        repository.clone(),
        SystemWallpaper,
        ChaChaSource::from_entropy(),
    );
    if let Some(secs) = settings.interval_secs {
        if let Err(err) = scheduler.configure(secs, Instant::now()) {
            log::error!("ignoring startup interval: {err}");
        }
    }

    if args.headless {
        return scheduler.run_blocking();
    }

    let partial_dir = settings::cache_dir()
        .map(|dir| dir.join("downloads"))
        .unwrap_or_else(|_| std::env::temp_dir().join("wallpaper_rotator"));
    let transport = Arc::new(HttpTransport::new(&settings)?);
    let side_channel = DownloadSideChannel::new(repository, transport, partial_dir);

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1000.0, 700.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Wallpaper Rotator",
        native_options,
        Box::new(move |cc| Box::new(app::WallpaperApp::new(cc, scheduler, side_channel))),
    )?;
    Ok(())
}
