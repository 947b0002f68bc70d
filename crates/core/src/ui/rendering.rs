//! Painting helpers for the region selector overlay.

use eframe::egui;

/// Dims everything outside `selection_rect`.
///
/// `alpha` is the darkness of the dimmed area (0-255).
pub fn draw_selection_overlay(
    painter: &egui::Painter,
    screen_rect: egui::Rect,
    selection_rect: egui::Rect,
    alpha: u8,
) {
    let color = egui::Color32::from_black_alpha(alpha);

    let bands = [
        // above
        egui::Rect::from_min_max(
            screen_rect.min,
            egui::pos2(screen_rect.max.x, selection_rect.min.y),
        ),
        // below
        egui::Rect::from_min_max(
            egui::pos2(screen_rect.min.x, selection_rect.max.y),
            screen_rect.max,
        ),
        // left
        egui::Rect::from_min_max(
            egui::pos2(screen_rect.min.x, selection_rect.min.y),
            egui::pos2(selection_rect.min.x, selection_rect.max.y),
        ),
        // right
        egui::Rect::from_min_max(
            egui::pos2(selection_rect.max.x, selection_rect.min.y),
            egui::pos2(screen_rect.max.x, selection_rect.max.y),
        ),
    ];

    for band in bands {
        painter.rect_filled(band, 0.0, color);
    }
}

pub fn draw_selection_border(
    painter: &egui::Painter,
    selection_rect: egui::Rect,
    stroke_width: f32,
    color: egui::Color32,
) {
    painter.rect_stroke(
        selection_rect,
        0.0,
        egui::Stroke::new(stroke_width, color),
        egui::StrokeKind::Middle,
    );
}

/// Centered instruction line at the top of the screen.
pub fn draw_hint(painter: &egui::Painter, screen_rect: egui::Rect, text: &str) {
    let anchor = egui::pos2(screen_rect.center().x, screen_rect.min.y + 24.0);
    let galley_rect = painter.text(
        anchor,
        egui::Align2::CENTER_TOP,
        text,
        egui::FontId::proportional(18.0),
        egui::Color32::WHITE,
    );
    painter.rect_stroke(
        galley_rect.expand(8.0),
        6.0,
        egui::Stroke::new(1.0, egui::Color32::GRAY),
        egui::StrokeKind::Outside,
    );
}
