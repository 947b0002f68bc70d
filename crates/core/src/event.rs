//! Cross-thread event delivery.
//!
//! Hotkey callbacks, the region selector and dispatch workers never touch
//! application state. They post an [`AppEvent`] and return; the orchestrator
//! drains the inbox on the main thread. Delivery is FIFO per sender.

use crate::history::CapturedImage;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;
use tracing::warn;

/// Identifies one dispatched request.
pub type RequestId = u64;

/// Terminal result of a dispatched request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseOutcome {
    Success(String),
    Failure(String),
}

impl ResponseOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

#[derive(Debug, Clone)]
pub enum AppEvent {
    /// `true` sends the current prompt, `false` only stores the capture.
    CaptureRequested { with_prompt: bool },
    PromptSwitchRequested(usize),
    HistoryClearRequested,
    OverlayToggleRequested,
    ProviderToggleRequested,
    CaptureCompleted(CapturedImage),
    CaptureCancelled,
    CaptureFailed(String),
    ResponseChunk { request: RequestId, text: String },
    ResponseReady { request: RequestId, outcome: ResponseOutcome },
    Shutdown,
}

/// Posting half of the event channel. Cheap to clone, usable from any thread.
#[derive(Clone, Debug)]
pub struct EventSender {
    tx: Sender<AppEvent>,
}

impl EventSender {
    /// Enqueues `event` without blocking.
    ///
    /// Returns `false` when the main loop has already shut down.
    pub fn post(&self, event: AppEvent) -> bool {
        match self.tx.send(event) {
            Ok(()) => true,
            Err(mpsc::SendError(event)) => {
                warn!(?event, "event loop is gone, dropping event");
                false
            }
        }
    }
}

/// Receiving half, owned by the main thread.
#[derive(Debug)]
pub struct EventInbox {
    rx: Receiver<AppEvent>,
}

impl EventInbox {
    /// Blocks until the next event; `None` once every sender is dropped.
    pub fn recv(&self) -> Option<AppEvent> {
        self.rx.recv().ok()
    }

    pub fn try_recv(&self) -> Option<AppEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<AppEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
}

/// Creates a connected sender/inbox pair.
pub fn channel() -> (EventSender, EventInbox) {
    let (tx, rx) = mpsc::channel();
    (EventSender { tx }, EventInbox { rx })
}
