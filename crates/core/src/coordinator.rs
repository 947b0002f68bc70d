//! Capture lifecycle state machine.
//!
//! ```text
//! Idle ──request_capture──▶ AwaitingCapture ──on_captured(prompt)──▶ Dispatching
//!   ▲                          │  on_captured(no prompt) / cancel / abandon     │
//!   └──────────────────────────┴───────────────◀── complete_dispatch ───────────┘
//! ```
//!
//! At most one request is in flight. Anything requested outside `Idle` is
//! rejected, never queued. The coordinator owns the screenshot history and
//! is driven exclusively from the main thread.

use crate::capture::{ImmediateCapture, InteractiveCapture};
use crate::error::{AppError, Result};
use crate::event::{EventSender, RequestId};
use crate::history::{CapturedImage, ClearReport, HistoryStore};
use crate::settings::Prompt;
use tracing::{error, info, warn};

/// How the pending capture is being obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStrategy {
    Interactive,
    Immediate,
}

/// The single capture in progress. `prompt == None` means capture only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub prompt: Option<Prompt>,
    pub strategy: CaptureStrategy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    AwaitingCapture(PendingRequest),
    Dispatching(RequestId),
}

impl CaptureState {
    fn label(&self) -> &'static str {
        match self {
            CaptureState::Idle => "idle",
            CaptureState::AwaitingCapture(_) => "awaiting capture",
            CaptureState::Dispatching(_) => "dispatching",
        }
    }
}

/// Everything a dispatch worker needs, detached from coordinator state.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub id: RequestId,
    /// History snapshot followed by the fresh capture.
    pub images: Vec<CapturedImage>,
    pub prompt: Prompt,
}

impl DispatchRequest {
    pub fn total_bytes(&self) -> usize {
        self.images.iter().map(CapturedImage::len).sum()
    }
}

/// What the orchestrator should do after a coordinator transition.
#[derive(Debug)]
pub enum CaptureStep {
    /// The selector is up; its result arrives as an event.
    AwaitingSelection,
    /// Capture-only request finished; the history now holds `count` images.
    Stored { count: usize },
    /// Send this request to a dispatch worker.
    Dispatch(DispatchRequest),
    Cancelled,
    /// Both capture paths failed; back to idle.
    Abandoned(AppError),
    /// Event did not match the current state.
    Ignored,
}

pub struct CaptureCoordinator {
    state: CaptureState,
    history: HistoryStore,
    interactive: Box<dyn InteractiveCapture>,
    immediate: Box<dyn ImmediateCapture>,
    use_selector: bool,
    next_request: RequestId,
}

impl CaptureCoordinator {
    pub fn new(
        history: HistoryStore,
        interactive: Box<dyn InteractiveCapture>,
        immediate: Box<dyn ImmediateCapture>,
    ) -> Self {
        Self {
            state: CaptureState::Idle,
            history,
            interactive,
            immediate,
            use_selector: true,
            next_request: 1,
        }
    }

    /// Disables the interactive selector; every capture is immediate.
    pub fn with_selector(mut self, enabled: bool) -> Self {
        self.use_selector = enabled;
        self
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == CaptureState::Idle
    }

    /// [`AppError::ConcurrentRequestRejected`] unless idle.
    pub fn ensure_idle(&self) -> Result<()> {
        if self.is_idle() {
            Ok(())
        } else {
            Err(AppError::ConcurrentRequestRejected(self.state.label()))
        }
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Starts a capture for `prompt` (`None`: store the capture only).
    ///
    /// # Errors
    /// [`AppError::ConcurrentRequestRejected`] unless idle; the active
    /// request is left untouched.
    pub fn request_capture(
        &mut self,
        prompt: Option<Prompt>,
        events: &EventSender,
    ) -> Result<CaptureStep> {
        self.ensure_idle()?;

        if !self.use_selector {
            self.state = CaptureState::AwaitingCapture(PendingRequest {
                prompt,
                strategy: CaptureStrategy::Immediate,
            });
            return Ok(self.capture_immediately());
        }

        self.state = CaptureState::AwaitingCapture(PendingRequest {
            prompt,
            strategy: CaptureStrategy::Interactive,
        });
        match self.interactive.start(events.clone()) {
            Ok(()) => Ok(CaptureStep::AwaitingSelection),
            Err(e) => {
                warn!(error = %e, "region selector failed to start, capturing full screen");
                Ok(self.fall_back_to_immediate())
            }
        }
    }

    /// The selector (or the immediate path) produced `image`.
    pub fn on_captured(&mut self, image: CapturedImage) -> CaptureStep {
        let pending = match std::mem::replace(&mut self.state, CaptureState::Idle) {
            CaptureState::AwaitingCapture(pending) => pending,
            other => {
                warn!(state = other.label(), "capture result arrived with no pending request");
                self.state = other;
                return CaptureStep::Ignored;
            }
        };

        match pending.prompt {
            None => {
                self.history.append(image);
                CaptureStep::Stored {
                    count: self.history.len(),
                }
            }
            Some(prompt) => {
                let mut images = self.history.all();
                images.push(image);

                let id = self.next_request;
                self.next_request += 1;
                self.state = CaptureState::Dispatching(id);

                CaptureStep::Dispatch(DispatchRequest { id, images, prompt })
            }
        }
    }

    /// The user aborted the selector.
    pub fn on_cancelled(&mut self) -> CaptureStep {
        if matches!(self.state, CaptureState::AwaitingCapture(_)) {
            self.state = CaptureState::Idle;
            info!("screenshot cancelled");
            CaptureStep::Cancelled
        } else {
            CaptureStep::Ignored
        }
    }

    /// The selector failed after starting; retries once with the
    /// immediate capture.
    pub fn on_capture_failed(&mut self, message: &str) -> CaptureStep {
        match &self.state {
            CaptureState::AwaitingCapture(pending)
                if pending.strategy == CaptureStrategy::Interactive =>
            {
                warn!(error = message, "region selection failed, capturing full screen");
                self.fall_back_to_immediate()
            }
            CaptureState::AwaitingCapture(_) => {
                self.state = CaptureState::Idle;
                CaptureStep::Abandoned(AppError::capture(message))
            }
            _ => CaptureStep::Ignored,
        }
    }

    /// Releases the dispatching state once request `id`'s outcome has been
    /// handled, clearing the history it was sent with.
    ///
    /// Returns `None` when nothing was cleared, including for a request
    /// that is not the active one (which leaves the state unchanged).
    pub fn complete_dispatch(&mut self, id: RequestId) -> Option<ClearReport> {
        if self.state != CaptureState::Dispatching(id) {
            warn!(request = id, state = self.state.label(), "outcome does not match the active request");
            return None;
        }
        self.state = CaptureState::Idle;
        self.history.clear()
    }

    /// User-requested history clear.
    ///
    /// # Errors
    /// Rejected while a request referencing the history is in flight.
    pub fn clear_history(&mut self) -> Result<Option<ClearReport>> {
        if let CaptureState::Dispatching(_) = self.state {
            return Err(AppError::ConcurrentRequestRejected(self.state.label()));
        }
        Ok(self.history.clear())
    }

    fn fall_back_to_immediate(&mut self) -> CaptureStep {
        if let CaptureState::AwaitingCapture(pending) = &mut self.state {
            pending.strategy = CaptureStrategy::Immediate;
        }
        self.capture_immediately()
    }

    fn capture_immediately(&mut self) -> CaptureStep {
        match self.immediate.capture() {
            Ok(image) => self.on_captured(image),
            Err(e) => {
                error!(error = %e, "screen capture failed, request abandoned");
                self.state = CaptureState::Idle;
                CaptureStep::Abandoned(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{channel, AppEvent};
    use crate::testing::{image, tag, FakeCapture, FakeSelector, SelectorMode};

    fn prompt() -> Prompt {
        Prompt {
            name: "Explain".into(),
            hotkey: "alt+1".into(),
            content: "explain".into(),
        }
    }

    fn coordinator(selector: &FakeSelector, immediate: &FakeCapture) -> CaptureCoordinator {
        CaptureCoordinator::new(
            HistoryStore::new(3),
            Box::new(selector.clone()),
            Box::new(immediate.clone()),
        )
    }

    #[test]
    fn capture_only_appends_to_history_and_returns_to_idle() {
        let selector = FakeSelector::new(SelectorMode::Silent);
        let immediate = FakeCapture::ok(image(0));
        let mut coord = coordinator(&selector, &immediate);
        let (events, _inbox) = channel();

        assert!(matches!(coord.request_capture(None, &events), Ok(CaptureStep::AwaitingSelection)));
        assert!(matches!(coord.on_captured(image(1)), CaptureStep::Stored { count: 1 }));
        assert!(coord.is_idle());
        assert_eq!(tag(&coord.history().all()[0]), 1);
        assert_eq!(immediate.calls(), 0);
    }

    #[test]
    fn second_request_is_rejected_and_first_is_untouched() {
        let selector = FakeSelector::new(SelectorMode::Silent);
        let mut coord = coordinator(&selector, &FakeCapture::ok(image(0)));
        let (events, _inbox) = channel();

        coord.request_capture(Some(prompt()), &events).unwrap();
        let before = coord.state().clone();

        let second = coord.request_capture(None, &events);
        assert!(matches!(second, Err(AppError::ConcurrentRequestRejected("awaiting capture"))));
        assert_eq!(coord.state(), &before);
        assert_eq!(selector.starts(), 1);
    }

    #[test]
    fn prompt_capture_dispatches_history_plus_current() {
        let selector = FakeSelector::new(SelectorMode::Silent);
        let mut coord = coordinator(&selector, &FakeCapture::ok(image(0)));
        let (events, _inbox) = channel();

        for t in [1, 2] {
            coord.request_capture(None, &events).unwrap();
            coord.on_captured(image(t));
        }

        coord.request_capture(Some(prompt()), &events).unwrap();
        let CaptureStep::Dispatch(request) = coord.on_captured(image(9)) else {
            panic!("expected a dispatch");
        };

        let tags: Vec<u8> = request.images.iter().map(tag).collect();
        assert_eq!(tags, vec![1, 2, 9]);
        assert_eq!(request.prompt, prompt());
        assert_eq!(coord.state(), &CaptureState::Dispatching(request.id));
        // history is kept until the outcome is handled
        assert_eq!(coord.history().len(), 2);

        assert!(matches!(coord.request_capture(None, &events), Err(AppError::ConcurrentRequestRejected("dispatching"))));

        let report = coord.complete_dispatch(request.id).unwrap();
        assert_eq!(report.count, 2);
        assert!(coord.is_idle());
        assert!(coord.history().is_empty());
    }

    #[test]
    fn cancel_returns_to_idle_without_side_effects() {
        let selector = FakeSelector::new(SelectorMode::Silent);
        let mut coord = coordinator(&selector, &FakeCapture::ok(image(0)));
        let (events, _inbox) = channel();

        coord.request_capture(Some(prompt()), &events).unwrap();
        assert!(matches!(coord.on_cancelled(), CaptureStep::Cancelled));
        assert!(coord.is_idle());
        assert!(coord.history().is_empty());

        assert!(matches!(coord.on_cancelled(), CaptureStep::Ignored));
        assert!(matches!(coord.on_captured(image(1)), CaptureStep::Ignored));
        assert!(coord.history().is_empty());
    }

    #[test]
    fn selector_start_failure_falls_back_to_immediate_capture() {
        let selector = FakeSelector::new(SelectorMode::FailToStart);
        let immediate = FakeCapture::ok(image(5));
        let mut coord = coordinator(&selector, &immediate);
        let (events, _inbox) = channel();

        let step = coord.request_capture(Some(prompt()), &events).unwrap();
        let CaptureStep::Dispatch(request) = step else {
            panic!("expected a dispatch, got {step:?}");
        };
        assert_eq!(request.images.iter().map(tag).collect::<Vec<_>>(), vec![5]);
        assert_eq!(immediate.calls(), 1);
    }

    #[test]
    fn selector_failure_then_immediate_failure_abandons() {
        let selector = FakeSelector::new(SelectorMode::Silent);
        let immediate = FakeCapture::failing("display gone");
        let mut coord = coordinator(&selector, &immediate);
        let (events, _inbox) = channel();

        coord.request_capture(None, &events).unwrap();
        let step = coord.on_capture_failed("selector crashed");
        assert!(matches!(step, CaptureStep::Abandoned(AppError::CaptureFailed(_))));
        assert!(coord.is_idle());
        assert_eq!(immediate.calls(), 1);

        // the gate is open again
        assert!(coord.request_capture(None, &events).is_ok());
    }

    #[test]
    fn immediate_mode_skips_selector() {
        let selector = FakeSelector::new(SelectorMode::Silent);
        let immediate = FakeCapture::ok(image(3));
        let mut coord = coordinator(&selector, &immediate).with_selector(false);
        let (events, inbox) = channel();

        let step = coord.request_capture(None, &events).unwrap();
        assert!(matches!(step, CaptureStep::Stored { count: 1 }));
        assert_eq!(selector.starts(), 0);
        assert!(inbox.try_recv().is_none());
    }

    #[test]
    fn selector_posts_its_result_as_an_event() {
        let selector = FakeSelector::new(SelectorMode::Complete(image(4)));
        let mut coord = coordinator(&selector, &FakeCapture::ok(image(0)));
        let (events, inbox) = channel();

        coord.request_capture(None, &events).unwrap();
        match inbox.try_recv() {
            Some(AppEvent::CaptureCompleted(img)) => assert_eq!(tag(&img), 4),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn stale_outcome_does_not_release_the_gate() {
        let selector = FakeSelector::new(SelectorMode::Silent);
        let mut coord = coordinator(&selector, &FakeCapture::ok(image(0)));
        let (events, _inbox) = channel();

        coord.request_capture(Some(prompt()), &events).unwrap();
        let CaptureStep::Dispatch(request) = coord.on_captured(image(1)) else {
            panic!("expected a dispatch");
        };

        assert_eq!(coord.complete_dispatch(request.id + 1), None);
        assert_eq!(coord.state(), &CaptureState::Dispatching(request.id));
    }

    #[test]
    fn user_clear_is_rejected_while_dispatching() {
        let selector = FakeSelector::new(SelectorMode::Silent);
        let mut coord = coordinator(&selector, &FakeCapture::ok(image(0)));
        let (events, _inbox) = channel();

        coord.request_capture(None, &events).unwrap();
        coord.on_captured(image(1));
        coord.request_capture(Some(prompt()), &events).unwrap();
        coord.on_captured(image(2));

        assert!(coord.clear_history().is_err());
        assert_eq!(coord.history().len(), 1);
    }
}
