//! snapprompt core library
//!
//! Hotkey-driven screenshot assistant: capture a screen region, send it
//! together with recent screenshots and a predefined prompt to an AI
//! provider, render the answer and copy any code it contains.
//!
//! # Overview
//!
//! - **History**: bounded FIFO of recent screenshots via [`history`]
//! - **Providers**: Gemini and OpenAI-compatible backends via [`provider`]
//! - **Capture lifecycle**: at most one request in flight via [`coordinator`]
//! - **Dispatch**: provider calls off the main thread via [`dispatch`]
//! - **Post-processing**: code extraction and clipboard via [`postprocess`]
//! - **Event loop**: main-thread sink via [`orchestrator`]
//!
//! # Quick Start
//!
//! ```ignore
//! use snapprompt_core::{Assistant, SettingsStore};
//!
//! snapprompt_core::init();
//! let mut app = Assistant::new(SettingsStore::load(), Box::new(my_ui))?;
//! app.bind_hotkeys(&mut my_registrar);
//! app.run();
//! ```

pub mod capture;
pub mod config;
pub mod coordinator;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod history;
pub mod hotkey;
pub mod image_processing;
pub mod orchestrator;
pub mod postprocess;
pub mod provider;
pub mod settings;
pub mod ui;

#[cfg(test)]
mod testing;

pub use capture::ScreenCapturer;
pub use config::Config;
pub use error::{AppError, Result};
pub use event::{AppEvent, EventSender};
pub use hotkey::{HotkeyCallback, HotkeyRegistrar, KeyCombo};
pub use orchestrator::{Orchestrator, RenderedResponse, UiSink};
pub use provider::{ProviderGateway, ProviderName};
pub use settings::SettingsStore;

use coordinator::CaptureCoordinator;
use history::HistoryStore;
use postprocess::ArboardClipboard;
use std::sync::Arc;
use tracing::info;
use ui::RegionSelector;

/// The assembled application: real capture, providers and clipboard wired
/// into an [`Orchestrator`].
pub struct Assistant {
    orchestrator: Orchestrator,
    monitors: Vec<String>,
}

impl Assistant {
    /// Builds the application from `settings`.
    ///
    /// Provider credentials come from the settings, falling back to the
    /// environment (including `.env`). A provider without credentials is
    /// left out; requests to it fail with [`AppError::UnknownProvider`].
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No display is available for screen capture
    /// - The configured monitor does not exist
    pub fn new(settings: SettingsStore, ui: Box<dyn UiSink>) -> Result<Self> {
        let config = Config::load(&settings);
        let gateway = Arc::new(ProviderGateway::from_config(&config));

        let monitor = settings.monitor();
        let capturer = ScreenCapturer::new()?.with_monitor(monitor);
        if monitor >= capturer.screen_count() {
            return Err(AppError::ScreenNotFound(monitor));
        }
        let monitors = capturer.list_screen();

        let history = HistoryStore::new(settings.max_history());
        info!(
            monitor,
            max_history = history.max(),
            selector = settings.use_selector(),
            "assistant ready"
        );

        let coordinator = CaptureCoordinator::new(
            history,
            Box::new(RegionSelector::new(monitor)),
            Box::new(capturer),
        )
        .with_selector(settings.use_selector());

        let orchestrator = Orchestrator::new(
            settings,
            coordinator,
            gateway,
            Box::new(ArboardClipboard::default()),
            ui,
        );

        Ok(Self {
            orchestrator,
            monitors,
        })
    }

    /// Sender for posting events from other threads.
    pub fn events(&self) -> EventSender {
        self.orchestrator.events()
    }

    pub fn settings(&self) -> &SettingsStore {
        self.orchestrator.settings()
    }

    /// Installs the hotkeys named in the settings. Returns how many bound.
    pub fn bind_hotkeys(&self, registrar: &mut dyn HotkeyRegistrar) -> usize {
        hotkey::bind_hotkeys(registrar, self.orchestrator.settings(), &self.orchestrator.events())
    }

    /// Runs the event loop until [`AppEvent::Shutdown`].
    pub fn run(&mut self) {
        self.orchestrator.run();
    }

    /// Captures once with the current prompt and waits for the answer.
    pub fn run_once(&mut self) {
        self.orchestrator.run_once();
    }

    /// Human-readable descriptions of the detected monitors.
    pub fn list_monitors(&self) -> &[String] {
        &self.monitors
    }
}

/// Loads `.env` into the process environment, if present.
///
/// Call once at startup, before reading any configuration.
pub fn init() {
    let _ = dotenvy::dotenv();
}
