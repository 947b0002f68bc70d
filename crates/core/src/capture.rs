//! Screen capture collaborators.
//!
//! Two ways to obtain a screenshot feed the coordinator:
//!
//! - [`InteractiveCapture`]: a region selector that reports its result
//!   asynchronously through the event channel.
//! - [`ImmediateCapture`]: a synchronous full-screen grab, used directly when
//!   the selector is disabled and as the fallback when it fails.
//!
//! [`ScreenCapturer`] implements the immediate path on top of the
//! `screenshots` crate, supporting X11 and Wayland on Linux as well as
//! Windows and macOS.

use crate::error::{AppError, Result};
use crate::event::EventSender;
use crate::history::CapturedImage;
use crate::image_processing::ImageProcessor;
use image::DynamicImage;
use screenshots::Screen;

/// Synchronous full-screen capture.
pub trait ImmediateCapture {
    fn capture(&mut self) -> Result<CapturedImage>;
}

/// A user-driven capture that finishes later.
pub trait InteractiveCapture {
    /// Starts a capture.
    ///
    /// On `Ok` the implementation posts exactly one of
    /// [`AppEvent::CaptureCompleted`](crate::event::AppEvent::CaptureCompleted),
    /// [`AppEvent::CaptureCancelled`](crate::event::AppEvent::CaptureCancelled) or
    /// [`AppEvent::CaptureFailed`](crate::event::AppEvent::CaptureFailed).
    /// `Err` means the selector could not start and nothing will be posted.
    fn start(&mut self, events: EventSender) -> Result<()>;
}

/// Screen capturer that provides multi-monitor screenshot capabilities.
pub struct ScreenCapturer {
    screens: Vec<Screen>,
    monitor: usize,
}

impl ScreenCapturer {
    /// Initializes the screen capturer by detecting available screens.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::CaptureFailed`] if:
    /// - Screen enumeration fails (e.g., no display server available)
    /// - No screens are detected
    pub fn new() -> Result<Self> {
        let screens = Screen::all()
            .map_err(|e| AppError::capture(format!("Failed to enumerate screens: {}", e)))?;

        if screens.is_empty() {
            return Err(AppError::capture("No screens detected"));
        }

        Ok(Self { screens, monitor: 0 })
    }

    /// Selects the monitor used by [`ImmediateCapture::capture`].
    pub fn with_monitor(mut self, index: usize) -> Self {
        self.monitor = index;
        self
    }

    /// Lists available screens with their dimensions and scale factor.
    pub fn list_screen(&self) -> Vec<String> {
        self.screens
            .iter()
            .enumerate()
            .map(|(i, s)| {
                format!(
                    "Monitor {}: {}x{} (scale: {})",
                    i, s.display_info.width, s.display_info.height, s.display_info.scale_factor
                )
            })
            .collect()
    }

    /// Returns the number of available screens.
    pub fn screen_count(&self) -> usize {
        self.screens.len()
    }

    /// Captures the whole screen at `index`.
    ///
    /// # Errors
    ///
    /// [`AppError::ScreenNotFound`] for an unknown index, otherwise
    /// [`AppError::CaptureFailed`].
    pub fn capture_screen_by_index(&self, index: usize) -> Result<DynamicImage> {
        let screen = self
            .screens
            .get(index)
            .ok_or(AppError::ScreenNotFound(index))?;

        let frame = screen
            .capture()
            .map_err(|e| AppError::capture(format!("Failed to capture monitor {index}: {e}")))?;
        let (width, height) = (frame.width(), frame.height());

        image::RgbaImage::from_raw(width, height, frame.into_raw())
            .map(DynamicImage::ImageRgba8)
            .ok_or_else(|| AppError::capture(format!("Bad {width}x{height} frame from monitor {index}")))
    }

    /// Captures the configured monitor.
    pub fn capture_screen(&self) -> Result<DynamicImage> {
        self.capture_screen_by_index(self.monitor)
    }
}

impl ImmediateCapture for ScreenCapturer {
    fn capture(&mut self) -> Result<CapturedImage> {
        let screenshot = self.capture_screen()?;
        ImageProcessor::encode_png(&screenshot)
    }
}
