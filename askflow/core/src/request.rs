//! Request Controller
//!
//! Owns the single in-flight call to the ask endpoint.
//!
//! # State Machine
//!
//! ```text
//!   Idle ──begin──▶ Sending ──dispatch──▶ AwaitingReply ──▶ Completed
//!    ▲                 │                       │        ├──▶ Failed
//!    │                 └───────cancel──────────┴────────┴──▶ Cancelled
//!    └──────────────── (every terminal state returns to Idle)
//! ```
//!
//! The cancellation token lives inside the in-flight slot, so a handle can
//! only exist while a request is live. Whoever takes the slot decides the
//! outcome: `cancel()` takes it and the dispatch reports `Cancelled` even if a
//! reply raced in, otherwise the dispatch takes it back and reports what the
//! backend said.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::backend::{AskRequest, AskResponse, QueryBackend};
use crate::chart_intent::detect_chart_request;
use crate::conversation::Turn;
use crate::error::{ChatError, ChatResult};

/// Request lifecycle phases
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestPhase {
    /// No request live
    Idle,
    /// Slot reserved, payload being prepared
    Sending,
    /// Call dispatched, waiting for the backend
    AwaitingReply,
    /// The backend answered
    Completed,
    /// The user aborted
    Cancelled,
    /// Transport or backend failure
    Failed,
}

impl RequestPhase {
    /// Whether a request is live in this phase
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Sending | Self::AwaitingReply)
    }
}

/// Cancellation handle bound to one in-flight request
#[derive(Clone, Debug)]
pub struct RequestHandle {
    id: u64,
    token: CancellationToken,
}

impl RequestHandle {
    /// Request generation id
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether this request has been aborted
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// How a dispatched request settled
#[derive(Debug)]
pub enum RequestOutcome {
    /// The backend answered with a success body
    Completed(AskResponse),
    /// The user aborted the request
    Cancelled,
    /// The request failed
    Failed(ChatError),
}

impl RequestOutcome {
    /// Terminal phase for this outcome
    #[must_use]
    pub fn phase(&self) -> RequestPhase {
        match self {
            Self::Completed(_) => RequestPhase::Completed,
            Self::Cancelled => RequestPhase::Cancelled,
            Self::Failed(_) => RequestPhase::Failed,
        }
    }

    /// The response, with cancellation surfaced as [`ChatError::UserAbort`]
    pub fn into_result(self) -> ChatResult<AskResponse> {
        match self {
            Self::Completed(response) => Ok(response),
            Self::Cancelled => Err(ChatError::UserAbort),
            Self::Failed(err) => Err(err),
        }
    }
}

/// The in-flight slot; a token exists only while a request is live
#[derive(Debug, Default)]
enum Slot {
    #[default]
    Idle,
    Sending(RequestHandle),
    AwaitingReply(RequestHandle),
}

impl Slot {
    fn handle(&self) -> Option<&RequestHandle> {
        match self {
            Self::Idle => None,
            Self::Sending(h) | Self::AwaitingReply(h) => Some(h),
        }
    }

    fn phase(&self) -> RequestPhase {
        match self {
            Self::Idle => RequestPhase::Idle,
            Self::Sending(_) => RequestPhase::Sending,
            Self::AwaitingReply(_) => RequestPhase::AwaitingReply,
        }
    }

    fn owned_by(&self, id: u64) -> bool {
        self.handle().is_some_and(|h| h.id == id)
    }
}

#[derive(Debug, Default)]
struct ControllerState {
    slot: Slot,
    next_id: u64,
    last_terminal: Option<RequestPhase>,
}

/// Controller for the single in-flight ask request
pub struct RequestController<B: QueryBackend> {
    backend: Arc<B>,
    state: Mutex<ControllerState>,
    /// Persistent visualization toggle
    visualize: AtomicBool,
}

impl<B: QueryBackend> RequestController<B> {
    /// Create a controller over `backend`
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            state: Mutex::new(ControllerState::default()),
            visualize: AtomicBool::new(false),
        }
    }

    /// The backend this controller talks to
    #[must_use]
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Current phase (`Idle` between requests)
    #[must_use]
    pub fn phase(&self) -> RequestPhase {
        self.state.lock().slot.phase()
    }

    /// Terminal phase of the most recent request
    #[must_use]
    pub fn last_terminal(&self) -> Option<RequestPhase> {
        self.state.lock().last_terminal
    }

    /// Whether a request is live
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.phase().is_in_flight()
    }

    /// Turn the persistent visualization toggle on or off
    pub fn set_visualization(&self, enabled: bool) {
        self.visualize.store(enabled, Ordering::Relaxed);
    }

    /// Whether the persistent visualization toggle is on
    #[must_use]
    pub fn visualization_enabled(&self) -> bool {
        self.visualize.load(Ordering::Relaxed)
    }

    /// Build the ask payload for `query` over `history`
    ///
    /// Charts are requested when the query reads like a chart request or the
    /// visualization toggle is on.
    #[must_use]
    pub fn payload(&self, query: &str, history: Vec<Turn>) -> AskRequest {
        let show_charts = self.visualization_enabled() || detect_chart_request(query);
        AskRequest::new(query, history).with_show_charts(show_charts)
    }

    /// Reserve the in-flight slot (`Idle → Sending`)
    pub fn begin(&self) -> ChatResult<RequestHandle> {
        let mut state = self.state.lock();
        if !matches!(state.slot, Slot::Idle) {
            tracing::warn!(phase = ?state.slot.phase(), "Refused to start a second request");
            return Err(ChatError::AlreadyInFlight);
        }

        state.next_id += 1;
        let handle = RequestHandle {
            id: state.next_id,
            token: CancellationToken::new(),
        };
        state.slot = Slot::Sending(handle.clone());
        tracing::debug!(request = handle.id, "Request slot reserved");
        Ok(handle)
    }

    /// Issue the call for a reserved handle and wait for it to settle
    pub async fn dispatch(&self, handle: RequestHandle, request: AskRequest) -> RequestOutcome {
        {
            let mut state = self.state.lock();
            match std::mem::take(&mut state.slot) {
                Slot::Sending(h) if h.id == handle.id => state.slot = Slot::AwaitingReply(h),
                other => {
                    // Cancelled before dispatch
                    state.slot = other;
                    return RequestOutcome::Cancelled;
                }
            }
        }

        let mut guard = SlotGuard {
            state: &self.state,
            handle: &handle,
            armed: true,
        };

        let settled = tokio::select! {
            biased;
            () = handle.token.cancelled() => None,
            result = self.backend.ask(&request) => Some(result),
        };

        guard.armed = false;
        let mut state = self.state.lock();
        if !state.slot.owned_by(handle.id) {
            tracing::debug!(request = handle.id, "Request cancelled by user");
            return RequestOutcome::Cancelled;
        }
        state.slot = Slot::Idle;

        let outcome = match settled {
            None => RequestOutcome::Cancelled,
            Some(Ok(response)) => RequestOutcome::Completed(response),
            Some(Err(err)) => {
                tracing::warn!(request = handle.id, error = %err, "Ask request failed");
                RequestOutcome::Failed(err.into())
            }
        };
        state.last_terminal = Some(outcome.phase());
        outcome
    }

    /// Reserve, dispatch and wait in one step
    pub async fn send(&self, request: AskRequest) -> ChatResult<RequestOutcome> {
        let handle = self.begin()?;
        Ok(self.dispatch(handle, request).await)
    }

    /// Abort the live request
    ///
    /// Returns `true` if a request was aborted. Calling it again, or after the
    /// request settled, is a no-op returning `false`.
    pub fn cancel(&self) -> bool {
        let mut state = self.state.lock();
        match std::mem::take(&mut state.slot) {
            Slot::Sending(handle) | Slot::AwaitingReply(handle) => {
                handle.token.cancel();
                state.last_terminal = Some(RequestPhase::Cancelled);
                tracing::info!(request = handle.id, "Request cancelled");
                true
            }
            Slot::Idle => false,
        }
    }
}

/// Frees the slot if a dispatch future is dropped mid-flight
struct SlotGuard<'a> {
    state: &'a Mutex<ControllerState>,
    handle: &'a RequestHandle,
    armed: bool,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.state.lock();
        if state.slot.owned_by(self.handle.id) {
            self.handle.token.cancel();
            state.slot = Slot::Idle;
            state.last_terminal = Some(RequestPhase::Cancelled);
            tracing::debug!(request = self.handle.id, "Dispatch dropped, slot released");
        }
    }
}
