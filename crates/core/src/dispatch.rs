//! Off-main-thread provider calls.

use crate::coordinator::DispatchRequest;
use crate::error::{AppError, Result};
use crate::event::{AppEvent, EventSender, RequestId, ResponseOutcome};
use crate::provider::ProviderGateway;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

/// Runs one provider call per dispatched request on its own thread and
/// reports back through the event channel.
///
/// For every request handed to [`DispatchWorker::dispatch`] exactly one
/// [`AppEvent::ResponseReady`] is posted, preceded by zero or more
/// [`AppEvent::ResponseChunk`] when streaming. The worker never touches the
/// screenshot history; it only reads the snapshot inside the request.
#[derive(Clone)]
pub struct DispatchWorker {
    gateway: Arc<ProviderGateway>,
    events: EventSender,
}

impl DispatchWorker {
    pub fn new(gateway: Arc<ProviderGateway>, events: EventSender) -> Self {
        Self { gateway, events }
    }

    /// Spawns the worker thread for `request`, sending it to `provider`.
    ///
    /// # Errors
    /// Only when the OS refuses to spawn the thread. No outcome is posted in
    /// that case; the caller must release the request itself.
    pub fn dispatch(
        &self,
        request: DispatchRequest,
        provider: String,
        streaming: bool,
    ) -> Result<JoinHandle<()>> {
        let gateway = Arc::clone(&self.gateway);
        let events = self.events.clone();

        info!(
            request = request.id,
            provider = %provider,
            images = request.images.len(),
            bytes = request.total_bytes(),
            prompt = %request.prompt.name,
            "dispatching request"
        );

        thread::Builder::new()
            .name(format!("dispatch-{}", request.id))
            .spawn(move || {
                let id = request.id;
                let outcome = run_request(&gateway, &events, &request, &provider, streaming);
                events.post(AppEvent::ResponseReady { request: id, outcome });
            })
            .map_err(AppError::from)
    }
}

fn run_request(
    gateway: &ProviderGateway,
    events: &EventSender,
    request: &DispatchRequest,
    provider: &str,
    streaming: bool,
) -> ResponseOutcome {
    let service = match gateway.get_service(provider) {
        Ok(service) => service,
        Err(e) => {
            error!(request = request.id, error = %e, "no provider for request");
            return ResponseOutcome::Failure(e.to_string());
        }
    };

    let id: RequestId = request.id;
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        if streaming {
            let mut forward = |text: String| {
                events.post(AppEvent::ResponseChunk { request: id, text });
            };
            service.analyze_streaming(&request.images, &request.prompt.content, &mut forward)
        } else {
            service.analyze(&request.images, &request.prompt.content)
        }
    }));

    match result {
        Ok(Ok(text)) if text.trim().is_empty() => {
            error!(request = id, provider, "provider returned an empty response");
            ResponseOutcome::Failure("empty response".to_string())
        }
        Ok(Ok(text)) => {
            debug!(request = id, chars = text.len(), "provider call finished");
            ResponseOutcome::Success(text)
        }
        Ok(Err(e)) => {
            error!(request = id, error = %e, "provider call failed");
            ResponseOutcome::Failure(e.to_string())
        }
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(request = id, reason = %reason, "provider panicked");
            ResponseOutcome::Failure(format!("{provider} crashed: {reason}"))
        }
    }
}
