//! Fakes for the external collaborators, shared by the unit tests.

use crate::capture::{ImmediateCapture, InteractiveCapture};
use crate::error::{AppError, Result};
use crate::event::{AppEvent, EventSender};
use crate::history::CapturedImage;
use crate::orchestrator::{RenderedResponse, UiSink};
use crate::postprocess::ClipboardWriter;
use crate::provider::{Provider, ProviderName};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn image(tag: u8) -> CapturedImage {
    CapturedImage::from(vec![0x89, b'P', b'N', b'G', tag])
}

/// Last byte of a fake image, to identify it in assertions.
pub fn tag(image: &CapturedImage) -> u8 {
    image.bytes()[image.len() - 1]
}

#[derive(Clone)]
enum Reply {
    Text(String),
    Chunks(Vec<String>),
    Fail(String),
    Panic,
}

/// Scripted provider that records what it was asked.
#[derive(Clone)]
pub struct FakeProvider {
    name: ProviderName,
    reply: Reply,
    calls: Arc<Mutex<Vec<(usize, String)>>>,
}

impl FakeProvider {
    fn new(name: ProviderName, reply: Reply) -> Self {
        Self {
            name,
            reply,
            calls: Arc::default(),
        }
    }

    pub fn replying(name: ProviderName, text: &str) -> Self {
        Self::new(name, Reply::Text(text.to_string()))
    }

    pub fn streaming(name: ProviderName, chunks: &[&str]) -> Self {
        Self::new(
            name,
            Reply::Chunks(chunks.iter().map(|c| c.to_string()).collect()),
        )
    }

    pub fn failing(name: ProviderName, message: &str) -> Self {
        Self::new(name, Reply::Fail(message.to_string()))
    }

    pub fn panicking(name: ProviderName) -> Self {
        Self::new(name, Reply::Panic)
    }

    /// `(image count, prompt)` per call.
    pub fn calls(&self) -> Vec<(usize, String)> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, images: &[CapturedImage], prompt: &str) {
        self.calls
            .lock()
            .unwrap()
            .push((images.len(), prompt.to_string()));
    }
}

impl Provider for FakeProvider {
    fn name(&self) -> ProviderName {
        self.name
    }

    fn analyze(&self, images: &[CapturedImage], prompt: &str) -> Result<String> {
        self.record(images, prompt);
        match &self.reply {
            Reply::Text(text) => Ok(text.clone()),
            Reply::Chunks(chunks) => Ok(chunks.concat()),
            Reply::Fail(message) => Err(AppError::provider(self.name.as_str(), message.clone())),
            Reply::Panic => panic!("provider exploded"),
        }
    }

    fn analyze_streaming(
        &self,
        images: &[CapturedImage],
        prompt: &str,
        on_chunk: &mut dyn FnMut(String),
    ) -> Result<String> {
        match &self.reply {
            Reply::Chunks(chunks) => {
                self.record(images, prompt);
                for chunk in chunks {
                    on_chunk(chunk.clone());
                }
                Ok(chunks.concat())
            }
            _ => {
                let text = self.analyze(images, prompt)?;
                on_chunk(text.clone());
                Ok(text)
            }
        }
    }
}

#[derive(Clone)]
pub enum SelectorMode {
    Complete(CapturedImage),
    Cancel,
    FailLater(String),
    FailToStart,
    /// Starts and posts nothing; the test drives the result.
    Silent,
}

#[derive(Clone)]
pub struct FakeSelector {
    mode: SelectorMode,
    starts: Arc<AtomicUsize>,
}

impl FakeSelector {
    pub fn new(mode: SelectorMode) -> Self {
        Self {
            mode,
            starts: Arc::default(),
        }
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }
}

impl InteractiveCapture for FakeSelector {
    fn start(&mut self, events: EventSender) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        match &self.mode {
            SelectorMode::Complete(image) => {
                events.post(AppEvent::CaptureCompleted(image.clone()));
            }
            SelectorMode::Cancel => {
                events.post(AppEvent::CaptureCancelled);
            }
            SelectorMode::FailLater(message) => {
                events.post(AppEvent::CaptureFailed(message.clone()));
            }
            SelectorMode::FailToStart => return Err(AppError::ui("no display")),
            SelectorMode::Silent => {}
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct FakeCapture {
    result: std::result::Result<CapturedImage, String>,
    calls: Arc<AtomicUsize>,
}

impl FakeCapture {
    pub fn ok(image: CapturedImage) -> Self {
        Self {
            result: Ok(image),
            calls: Arc::default(),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ImmediateCapture for FakeCapture {
    fn capture(&mut self) -> Result<CapturedImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone().map_err(|message| AppError::capture(message))
    }
}

#[derive(Clone, Default)]
pub struct RecordingClipboard {
    writes: Arc<Mutex<Vec<String>>>,
}

impl RecordingClipboard {
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }
}

impl ClipboardWriter for RecordingClipboard {
    fn write(&mut self, text: &str) -> bool {
        self.writes.lock().unwrap().push(text.to_string());
        true
    }
}

#[derive(Default)]
pub struct UiLog {
    pub statuses: Vec<(String, bool)>,
    pub rendered: Vec<RenderedResponse>,
    pub chunks: Vec<String>,
    pub notices: Vec<String>,
    pub overlay: Vec<bool>,
}

#[derive(Clone, Default)]
pub struct RecordingUi {
    log: Arc<Mutex<UiLog>>,
}

impl RecordingUi {
    pub fn with<R>(&self, f: impl FnOnce(&UiLog) -> R) -> R {
        f(&self.log.lock().unwrap())
    }
}

impl UiSink for RecordingUi {
    fn on_status_changed(&mut self, status: &str, is_running: bool) {
        self.log
            .lock()
            .unwrap()
            .statuses
            .push((status.to_string(), is_running));
    }

    fn on_response_rendered(&mut self, response: &RenderedResponse) {
        self.log.lock().unwrap().rendered.push(response.clone());
    }

    fn on_chunk(&mut self, text: &str) {
        self.log.lock().unwrap().chunks.push(text.to_string());
    }

    fn on_overlay_visibility(&mut self, visible: bool) {
        self.log.lock().unwrap().overlay.push(visible);
    }

    fn on_notice(&mut self, message: &str) {
        self.log.lock().unwrap().notices.push(message.to_string());
    }
}
