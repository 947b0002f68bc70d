//! Fullscreen region selector.
//!
//! Captures the configured monitor, shows the frozen screenshot fullscreen
//! and lets the user drag a rectangle over it. The window runs on the
//! calling (main) thread and closes on release or `Escape`; the outcome is
//! then posted as a single capture event.

use super::rendering::{draw_hint, draw_selection_border, draw_selection_overlay};
use super::selection::{process_drag_event, SelectionEvent};
use crate::capture::{InteractiveCapture, ScreenCapturer};
use crate::error::{AppError, Result};
use crate::event::{AppEvent, EventSender};
use crate::image_processing::ImageProcessor;
use eframe::egui;
use image::DynamicImage;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Region picked by the user, in UI coordinates.
#[derive(Debug, Clone, Copy)]
struct Selection {
    area: egui::Rect,
    ui_size: egui::Vec2,
}

/// [`InteractiveCapture`] backed by an eframe window.
#[derive(Debug, Clone)]
pub struct RegionSelector {
    monitor: usize,
}

impl RegionSelector {
    pub fn new(monitor: usize) -> Self {
        Self { monitor }
    }
}

impl InteractiveCapture for RegionSelector {
    fn start(&mut self, events: EventSender) -> Result<()> {
        // Screens are enumerated per capture so hot-plugged monitors are seen.
        let capturer = ScreenCapturer::new()?;
        let screenshot = capturer.capture_screen_by_index(self.monitor)?;
        debug!(
            monitor = self.monitor,
            width = screenshot.width(),
            height = screenshot.height(),
            "showing region selector"
        );

        let selection = run(screenshot.clone())?;

        let event = match selection {
            None => AppEvent::CaptureCancelled,
            Some(Selection { area, ui_size }) => {
                match ImageProcessor::crop_selection(&screenshot, area, ui_size)
                    .and_then(|region| ImageProcessor::encode_png(&region))
                {
                    Ok(image) => {
                        info!(bytes = image.len(), "region captured");
                        AppEvent::CaptureCompleted(image)
                    }
                    Err(AppError::EmptySelection) => {
                        warn!("selection was empty after scaling, treating as cancel");
                        AppEvent::CaptureCancelled
                    }
                    Err(e) => AppEvent::CaptureFailed(e.to_string()),
                }
            }
        };
        events.post(event);
        Ok(())
    }
}

struct SelectorApp {
    texture: Option<egui::TextureHandle>,
    /// Pre-converted pixels, uploaded on the first frame.
    color_image: Option<egui::ColorImage>,
    selection_start: Option<egui::Pos2>,
    current_pos: Option<egui::Pos2>,
    result: Arc<Mutex<Option<Selection>>>,
}

impl SelectorApp {
    fn new(screenshot: DynamicImage, result: Arc<Mutex<Option<Selection>>>) -> Self {
        let buffer = screenshot.to_rgba8();
        let size = [screenshot.width() as usize, screenshot.height() as usize];
        let color_image =
            egui::ColorImage::from_rgba_unmultiplied(size, buffer.as_flat_samples().as_slice());

        Self {
            texture: None,
            color_image: Some(color_image),
            selection_start: None,
            current_pos: None,
            result,
        }
    }

    fn finish(&mut self, ctx: &egui::Context, selection: Option<Selection>) {
        if let Ok(mut slot) = self.result.lock() {
            *slot = selection;
        }
        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
    }
}

impl eframe::App for SelectorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.texture.is_none() {
            if let Some(color_image) = self.color_image.take() {
                self.texture = Some(ctx.load_texture(
                    "screenshot",
                    color_image,
                    egui::TextureOptions::LINEAR,
                ));
            }
        }

        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            self.finish(ctx, None);
            return;
        }

        let panel_frame = egui::Frame::default()
            .inner_margin(egui::Margin::same(0))
            .outer_margin(egui::Margin::same(0));

        egui::CentralPanel::default()
            .frame(panel_frame)
            .show(ctx, |ui| {
                let rect = ui.max_rect();
                ctx.set_cursor_icon(egui::CursorIcon::Crosshair);

                if let Some(texture) = &self.texture {
                    ui.painter().image(
                        texture.id(),
                        rect,
                        egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                        egui::Color32::WHITE,
                    );
                }

                let response = ui.interact(rect, ui.id(), egui::Sense::click_and_drag());
                let event =
                    process_drag_event(&response, &mut self.selection_start, &mut self.current_pos);
                if event.cancels() {
                    self.finish(ctx, None);
                    return;
                }

                match (self.selection_start, self.current_pos) {
                    (Some(start), Some(current)) => {
                        let selection_rect = egui::Rect::from_two_pos(start, current);
                        draw_selection_overlay(ui.painter(), rect, selection_rect, 150);
                        draw_selection_border(ui.painter(), selection_rect, 2.0, egui::Color32::WHITE);

                        if event == SelectionEvent::Completed {
                            let selection = Selection {
                                area: selection_rect,
                                ui_size: ctx.viewport_rect().size(),
                            };
                            self.finish(ctx, Some(selection));
                        }
                    }
                    _ => {
                        ui.painter()
                            .rect_filled(rect, 0.0, egui::Color32::from_black_alpha(60));
                        draw_hint(ui.painter(), rect, "Drag to select a region, click or Esc to cancel");
                    }
                }
            });
    }
}

/// Shows the selector and blocks until it closes.
///
/// Returns `None` when the user cancelled.
fn run(screenshot: DynamicImage) -> Result<Option<Selection>> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_fullscreen(true)
            .with_decorations(false)
            .with_always_on_top(),
        run_and_return: true,
        ..Default::default()
    };

    let result = Arc::new(Mutex::new(None));
    let app_result = Arc::clone(&result);

    eframe::run_native(
        "snapprompt-selector",
        options,
        Box::new(move |_cc| {
            Ok(Box::new(SelectorApp::new(screenshot, app_result)) as Box<dyn eframe::App>)
        }),
    )
    .map_err(|e| AppError::ui(format!("Failed to run region selector: {}", e)))?;

    let selection = *result
        .lock()
        .map_err(|_| AppError::ui("Failed to acquire selection lock"))?;
    Ok(selection)
}
