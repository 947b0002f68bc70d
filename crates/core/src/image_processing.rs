//! Image processing and encoding utilities.
//!
//! This module handles cropping screen captures based on UI selections
//! and encoding them for storage in the history and transmission to the
//! AI providers.
//!
//! # Coordinate Mapping
//!
//! The UI displays images at logical pixel sizes (e.g., 1920x1080) while
//! the actual captured image may be at a different resolution (e.g., 3840x2160).
//! This module handles the coordinate transformation between UI space and
//! image space.

use crate::error::{AppError, Result};
use crate::history::CapturedImage;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use eframe::egui;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

/// Image processing utilities for the capture workflow.
pub struct ImageProcessor;

impl ImageProcessor {
    /// Crops an image based on UI selection coordinates.
    ///
    /// Handles the transformation from UI logical pixels to actual image
    /// pixels, accounting for HiDPI displays where the image resolution may
    /// be higher than the UI resolution.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::EmptySelection`] if the selection has zero area.
    pub fn crop_selection(
        original: &DynamicImage,
        selection: egui::Rect,
        ui_size: egui::Vec2,
    ) -> Result<DynamicImage> {
        if ui_size.x <= 0.0 || ui_size.y <= 0.0 {
            return Err(AppError::EmptySelection);
        }

        // Calculate scaling factors between UI and image coordinates
        let scale_x = original.width() as f32 / ui_size.x;
        let scale_y = original.height() as f32 / ui_size.y;

        // Transform UI coordinates to image coordinates
        let x = (selection.min.x * scale_x).max(0.0) as u32;
        let y = (selection.min.y * scale_y).max(0.0) as u32;

        let mut width = (selection.width() * scale_x).max(0.0) as u32;
        let mut height = (selection.height() * scale_y).max(0.0) as u32;

        // Clamp to image bounds to prevent out-of-bounds errors
        if x.saturating_add(width) > original.width() {
            width = original.width().saturating_sub(x);
        }
        if y.saturating_add(height) > original.height() {
            height = original.height().saturating_sub(y);
        }

        if width == 0 || height == 0 {
            return Err(AppError::EmptySelection);
        }

        Ok(original.crop_imm(x, y, width, height))
    }

    /// Encodes an image as PNG into a history entry.
    pub fn encode_png(image: &DynamicImage) -> Result<CapturedImage> {
        let mut buffer: Vec<u8> = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);

        image
            .write_to(&mut cursor, ImageFormat::Png)
            .map_err(|e| AppError::image(format!("Failed to encode image: {}", e)))?;

        Ok(CapturedImage::from(buffer))
    }
}

/// Base64 (standard alphabet) for inline provider payloads.
pub fn to_base64(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}
