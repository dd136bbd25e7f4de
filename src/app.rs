//! egui shell: picture list, rotation controls and the download surface.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use eframe::CreationContext;
use eframe::egui::{self, RichText};

use crate::download::{DownloadItem, DownloadSideChannel, DownloadState};
use crate::error;
use crate::slideshow::{RotationScheduler, TickOutcome};
use crate::wallpaper::SystemWallpaper;

/// Interval shown in the input before anything is configured.
const DEFAULT_INTERVAL_SECS: i64 = 600;
/// Repaint cadence while downloads report progress.
const PROGRESS_REPAINT: Duration = Duration::from_millis(200);
/// Repaint cadence when no timer is running.
const IDLE_REPAINT: Duration = Duration::from_secs(1);

/// Main window. Owns the scheduler and the download side channel and drives
/// both from the frame loop.
pub struct WallpaperApp {
    scheduler: RotationScheduler<SystemWallpaper>,
    side_channel: DownloadSideChannel,
    entries: Vec<String>,
    interval_input: i64,
    url_input: String,
    surface_url_input: String,
    status: String,
}

impl WallpaperApp {
    pub fn new(
        _cc: &CreationContext<'_>,
        scheduler: RotationScheduler<SystemWallpaper>,
        side_channel: DownloadSideChannel,
    ) -> Self {
        let interval_input = scheduler
            .config()
            .map(|config| config.interval_secs() as i64)
            .unwrap_or(DEFAULT_INTERVAL_SECS);
        let mut app = Self {
            scheduler,
            side_channel,
            entries: Vec::new(),
            interval_input,
            url_input: String::new(),
            surface_url_input: String::new(),
            status: "Idle".to_string(),
        };
        app.reload_pictures();
        app
    }

    pub fn ui(&mut self, ctx: &egui::Context) {
        self.drive_event_loop(ctx);

        egui::TopBottomPanel::top("top").show(ctx, |ui| {
            ui.heading(RichText::new("Wallpaper Rotator").strong());
            ui.label(format!(
                "Pictures: {}",
                self.scheduler.repository().pictures_root().display()
            ));
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label("Change every");
                ui.add(egui::DragValue::new(&mut self.interval_input).suffix(" s"));
                if ui.button("Apply").clicked() {
                    self.apply_interval();
                }
                match self.scheduler.config() {
                    Some(config) => ui.label(format!("(running every {}s)", config.interval_secs())),
                    None => ui.label("(not running)"),
                };
            });

            ui.horizontal(|ui| {
                if ui.button("Shuffle now").clicked() {
                    let outcome = self.scheduler.tick();
                    self.report_tick(outcome);
                }
                if ui.button("Reload").clicked() {
                    self.reload_pictures();
                }
            });

            ui.separator();

            ui.horizontal(|ui| {
                ui.label("Browse");
                ui.text_edit_singleline(&mut self.url_input);
                let url = self.url_input.trim().to_string();
                if ui.add_enabled(!url.is_empty(), egui::Button::new("Open")).clicked() {
                    self.side_channel.open(&url);
                    self.surface_url_input = url;
                }
            });

            ui.separator();

            let mut chosen = None;
            egui::ScrollArea::vertical()
                .id_source("picture_list")
                .show(ui, |ui| {
                    if self.entries.is_empty() {
                        ui.label("No pictures yet");
                    }
                    for name in &self.entries {
                        ui.horizontal(|ui| {
                            if ui.button("Set").clicked() {
                                chosen = Some(name.clone());
                            }
                            ui.label(name);
                        });
                    }
                });
            if let Some(name) = chosen {
                self.status = match self.scheduler.apply_entry(&name) {
                    Ok(path) => format!("Set: {}", path.display()),
                    Err(err) => err.to_string(),
                };
            }

            ui.separator();
            ui.label(format!("Status: {}", self.status));
        });

        self.surface_ui(ctx);
    }

    /// Run due timer ticks, apply download events and schedule the next repaint.
    fn drive_event_loop(&mut self, ctx: &egui::Context) {
        if let Some(outcome) = self.scheduler.poll(Instant::now()) {
            self.report_tick(outcome);
        }
        for outcome in self.side_channel.pump() {
            self.status = describe_outcome(&outcome);
        }

        let mut wait = self
            .scheduler
            .time_until_next_tick(Instant::now())
            .unwrap_or(IDLE_REPAINT);
        if self.side_channel.has_active_downloads() {
            wait = wait.min(PROGRESS_REPAINT);
        }
        ctx.request_repaint_after(wait);
    }

    fn apply_interval(&mut self) {
        self.status = match self.scheduler.configure(self.interval_input, Instant::now()) {
            Ok(()) => format!("Changing wallpaper every {}s", self.interval_input),
            Err(err) => err.to_string(),
        };
    }

    fn reload_pictures(&mut self) {
        match self.scheduler.repository().list_entries() {
            Ok(entries) => self.entries = entries,
            Err(err) => {
                self.entries.clear();
                self.status = err.to_string();
            }
        }
    }

    fn report_tick(&mut self, outcome: TickOutcome) {
        self.status = match outcome {
            TickOutcome::Applied(path) => format!("Set: {}", path.display()),
            TickOutcome::SkippedEmpty => "No pictures to choose from".to_string(),
            TickOutcome::ListingFailed(err) | TickOutcome::ApplyFailed(err) => err.to_string(),
        };
    }

    /// Secondary window for the download side channel.
    fn surface_ui(&mut self, ctx: &egui::Context) {
        let Some(surface) = self.side_channel.surface() else {
            return;
        };
        let builder = egui::ViewportBuilder::default()
            .with_title(format!("Browse - {}", surface.url))
            .with_inner_size([1000.0, 700.0]);

        let mut requested = None;
        let url_input = &mut self.surface_url_input;
        let items = self.side_channel.items();
        let closed = ctx.show_viewport_immediate(
            egui::ViewportId::from_hash_of("download_surface"),
            builder,
            |ctx, class| {
                if matches!(class, egui::ViewportClass::Embedded) {
                    let mut open = true;
                    egui::Window::new("Browse").open(&mut open).show(ctx, |ui| {
                        surface_contents(ui, url_input, items, &mut requested);
                    });
                    return !open;
                }
                egui::CentralPanel::default().show(ctx, |ui| {
                    surface_contents(ui, url_input, items, &mut requested);
                });
                ctx.input(|i| i.viewport().close_requested())
            },
        );

        if let Some(url) = requested {
            self.side_channel.request(&url);
        }
        if closed && self.side_channel.close() {
            self.reload_pictures();
        }
    }
}

fn surface_contents(
    ui: &mut egui::Ui,
    url_input: &mut String,
    items: &[DownloadItem],
    requested: &mut Option<String>,
) {
    ui.horizontal(|ui| {
        ui.text_edit_singleline(url_input);
        let url = url_input.trim();
        if ui.add_enabled(!url.is_empty(), egui::Button::new("Download")).clicked() {
            *requested = Some(url.to_string());
        }
    });
    ui.separator();
    egui::ScrollArea::vertical()
        .id_source("download_list")
        .show(ui, |ui| {
            for item in items.iter().rev() {
                ui.horizontal(|ui| {
                    ui.label(item.url());
                    ui.label(describe_state(item.state()));
                });
            }
        });
}

fn describe_state(state: &DownloadState) -> String {
    match state {
        DownloadState::Requested => "waiting".to_string(),
        DownloadState::Progressing {
            received,
            paused: true,
            ..
        } => format!("paused at {received} bytes"),
        DownloadState::Progressing {
            received,
            total: Some(total),
            ..
        } => format!("{received} / {total} bytes"),
        DownloadState::Progressing { received, .. } => format!("{received} bytes"),
        DownloadState::Interrupted { received } => format!("interrupted after {received} bytes"),
        DownloadState::Completed => "done".to_string(),
        DownloadState::Failed(reason) => format!("failed: {reason}"),
    }
}

fn describe_outcome(outcome: &error::Result<PathBuf>) -> String {
    match outcome {
        Ok(path) => format!("Downloaded: {}", path.display()),
        Err(err) => err.to_string(),
    }
}

impl Drop for WallpaperApp {
    fn drop(&mut self) {
        self.scheduler.stop();
    }
}

impl eframe::App for WallpaperApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.ui(ctx);
    }
}
