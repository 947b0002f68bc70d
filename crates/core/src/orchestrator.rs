//! Main-thread event sink.
//!
//! The [`Orchestrator`] is the only owner of settings, history and UI state.
//! Every other thread talks to it by posting an [`AppEvent`]. Failures are
//! logged and rendered here; none of them leaves [`Orchestrator::handle`].

use crate::coordinator::{CaptureCoordinator, CaptureStep};
use crate::dispatch::DispatchWorker;
use crate::error::AppError;
use crate::event::{channel, AppEvent, EventInbox, EventSender, RequestId, ResponseOutcome};
use crate::postprocess::{
    error_html, extract_code_blocks, preview, render_html, write_clipboard_once, ClipboardWriter,
    StreamAssembler,
};
use crate::provider::{ProviderGateway, ProviderName};
use crate::settings::SettingsStore;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const STATUS_IDLE: &str = "Listening";

/// A response ready to be shown in the overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedResponse {
    /// Raw response text (or the error line).
    pub markdown: String,
    pub html: String,
    pub is_error: bool,
}

/// Callbacks into the UI shell. Always invoked on the main thread.
pub trait UiSink {
    fn on_status_changed(&mut self, status: &str, is_running: bool);
    fn on_response_rendered(&mut self, response: &RenderedResponse);
    fn on_chunk(&mut self, text: &str);

    fn on_overlay_visibility(&mut self, _visible: bool) {}

    /// Short-lived notice (prompt switched, history cleared, ...).
    fn on_notice(&mut self, _message: &str) {}
}

pub struct Orchestrator {
    settings: SettingsStore,
    coordinator: CaptureCoordinator,
    worker: DispatchWorker,
    clipboard: Box<dyn ClipboardWriter>,
    ui: Box<dyn UiSink>,
    events: EventSender,
    inbox: EventInbox,
    stream: StreamAssembler,
    overlay_visible: bool,
}

impl Orchestrator {
    pub fn new(
        settings: SettingsStore,
        coordinator: CaptureCoordinator,
        gateway: Arc<ProviderGateway>,
        clipboard: Box<dyn ClipboardWriter>,
        ui: Box<dyn UiSink>,
    ) -> Self {
        let (events, inbox) = channel();
        Self {
            settings,
            coordinator,
            worker: DispatchWorker::new(gateway, events.clone()),
            clipboard,
            ui,
            events,
            inbox,
            stream: StreamAssembler::default(),
            overlay_visible: true,
        }
    }

    /// Sender for hotkey callbacks and other producers.
    pub fn events(&self) -> EventSender {
        self.events.clone()
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn is_idle(&self) -> bool {
        self.coordinator.is_idle()
    }

    /// Processes events until [`AppEvent::Shutdown`].
    pub fn run(&mut self) {
        self.ui.on_status_changed(STATUS_IDLE, false);
        info!(provider = %self.settings.provider_name(), "listening for hotkeys");

        while let Some(event) = self.inbox.recv() {
            if self.handle(event).is_break() {
                break;
            }
        }
        info!("event loop stopped");
    }

    /// Runs a single prompt capture to completion, then returns.
    pub fn run_once(&mut self) {
        if self.handle(AppEvent::CaptureRequested { with_prompt: true }).is_break() {
            return;
        }
        self.pump_until_idle(None);
    }

    /// Handles every queued event without blocking.
    pub fn drain(&mut self) -> ControlFlow<()> {
        while let Some(event) = self.inbox.try_recv() {
            if self.handle(event).is_break() {
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Handles one event. `Break` only for [`AppEvent::Shutdown`].
    pub fn handle(&mut self, event: AppEvent) -> ControlFlow<()> {
        match event {
            AppEvent::CaptureRequested { with_prompt } => self.on_capture_requested(with_prompt),
            AppEvent::PromptSwitchRequested(index) => self.on_prompt_switch(index),
            AppEvent::HistoryClearRequested => self.on_history_clear(),
            AppEvent::OverlayToggleRequested => {
                self.overlay_visible = !self.overlay_visible;
                debug!(visible = self.overlay_visible, "overlay toggled");
                self.ui.on_overlay_visibility(self.overlay_visible);
            }
            AppEvent::ProviderToggleRequested => self.on_provider_toggle(),
            AppEvent::CaptureCompleted(image) => {
                let step = self.coordinator.on_captured(image);
                self.apply(step);
            }
            AppEvent::CaptureCancelled => {
                let step = self.coordinator.on_cancelled();
                self.apply(step);
            }
            AppEvent::CaptureFailed(message) => {
                let step = self.coordinator.on_capture_failed(&message);
                self.apply(step);
            }
            AppEvent::ResponseChunk { request, text } => {
                if self.stream.push(request, &text) {
                    self.ui.on_chunk(&text);
                }
            }
            AppEvent::ResponseReady { request, outcome } => self.on_response_ready(request, outcome),
            AppEvent::Shutdown => {
                info!("shutdown requested");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn on_capture_requested(&mut self, with_prompt: bool) {
        // Busy: leave the prompt selection alone.
        if let Err(e) = self.coordinator.ensure_idle() {
            warn!("{e}");
            return;
        }

        let prompt = if with_prompt {
            match self.settings.current_prompt() {
                Some((index, prompt)) => {
                    debug!(index, prompt = %prompt.name, "capture requested");
                    Some(prompt)
                }
                None => {
                    warn!("no prompts configured, ignoring capture request");
                    self.ui.on_notice("No prompts configured");
                    return;
                }
            }
        } else {
            None
        };

        match self.coordinator.request_capture(prompt, &self.events) {
            Ok(step) => self.apply(step),
            Err(e @ AppError::ConcurrentRequestRejected(_)) => warn!("{e}"),
            Err(e) => error!(error = %e, "capture request failed"),
        }
    }

    fn apply(&mut self, step: CaptureStep) {
        match step {
            CaptureStep::AwaitingSelection => debug!("waiting for region selection"),
            CaptureStep::Stored { count } => {
                let history = self.coordinator.history();
                info!(count, max = history.max(), "screenshot stored");
                self.ui
                    .on_notice(&format!("Screenshot saved ({count}/{})", history.max()));
            }
            CaptureStep::Dispatch(request) => {
                let id = request.id;
                let provider = self.settings.provider_name();
                let streaming = self.settings.streaming_enabled();

                self.ui
                    .on_status_changed(&format!("Analyzing with {provider}..."), true);
                if streaming {
                    self.stream.begin(id);
                }
                if let Err(e) = self.worker.dispatch(request, provider, streaming) {
                    error!(request = id, error = %e, "failed to start dispatch worker");
                    self.on_response_ready(id, ResponseOutcome::Failure(e.to_string()));
                }
            }
            CaptureStep::Cancelled => debug!("capture cancelled"),
            CaptureStep::Abandoned(e) => {
                error!(error = %e, "capture abandoned");
                self.render_error(&e.to_string());
                self.ui.on_status_changed(STATUS_IDLE, false);
            }
            CaptureStep::Ignored => debug!("stale capture event ignored"),
        }
    }

    fn on_response_ready(&mut self, request: RequestId, outcome: ResponseOutcome) {
        match outcome {
            ResponseOutcome::Success(text) => {
                let text = self.stream.finish(request, text.clone()).unwrap_or(text);
                self.deliver(&text);
            }
            ResponseOutcome::Failure(message) => {
                self.stream.finish(request, String::new());
                error!(request, error = %message, "request failed");
                self.render_error(&message);
            }
        }

        if let Some(report) = self.coordinator.complete_dispatch(request) {
            info!(
                count = report.count,
                megabytes = report.megabytes(),
                "screenshot history released"
            );
        }
        self.ui.on_status_changed(STATUS_IDLE, false);
    }

    fn deliver(&mut self, text: &str) {
        let code = extract_code_blocks(text);
        if code.is_empty() {
            info!(preview = %preview(text), "no code blocks in response");
        } else {
            write_clipboard_once(self.clipboard.as_mut(), &code);
        }

        self.ui.on_response_rendered(&RenderedResponse {
            markdown: text.to_string(),
            html: render_html(text),
            is_error: false,
        });
    }

    fn render_error(&mut self, message: &str) {
        self.ui.on_response_rendered(&RenderedResponse {
            markdown: format!("Error: {message}"),
            html: error_html(message),
            is_error: true,
        });
    }

    fn on_prompt_switch(&mut self, index: usize) {
        match self.settings.select_prompt(index) {
            Some(prompt) => {
                info!(index, prompt = %prompt.name, "prompt switched");
                self.ui.on_notice(&format!("Prompt: {}", prompt.name));
            }
            None => warn!(index, "no prompt at this index"),
        }
    }

    fn on_provider_toggle(&mut self) {
        let current = self.settings.provider_name();
        let next = match current.parse::<ProviderName>() {
            Ok(name) => name.toggled(),
            Err(_) => {
                warn!(provider = %current, "unknown provider in settings, switching to the default");
                ProviderName::Gemini
            }
        };

        if let Err(e) = self.settings.set("provider", next.as_str()) {
            warn!(error = %e, "failed to persist provider choice");
        }
        info!(provider = %next, "provider switched");
        self.ui.on_notice(&format!("Provider: {next}"));
    }

    fn on_history_clear(&mut self) {
        match self.coordinator.clear_history() {
            Ok(Some(report)) => {
                info!(
                    count = report.count,
                    megabytes = report.megabytes(),
                    "screenshot history cleared"
                );
                self.ui.on_notice(&format!(
                    "Cleared {} screenshots ({:.2} MB)",
                    report.count,
                    report.megabytes()
                ));
            }
            Ok(None) => self.ui.on_notice("No screenshots to clear"),
            Err(e) => warn!("{e}"),
        }
    }

    /// Handles events until the coordinator is idle again, or `timeout`.
    ///
    /// Returns `true` when idle was reached.
    fn pump_until_idle(&mut self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);

        while !self.coordinator.is_idle() {
            let event = match deadline {
                Some(deadline) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        return false;
                    }
                    self.inbox.recv_timeout(left)
                }
                None => self.inbox.recv(),
            };
            match event {
                Some(event) => {
                    if self.handle(event).is_break() {
                        return false;
                    }
                }
                None if deadline.is_none() => return false,
                None => {}
            }
        }
        true
    }
}
