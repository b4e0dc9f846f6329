//! Chat Session
//!
//! The session owns everything one conversation needs: history, the turn
//! lifecycle, the single in-flight request and the enrichment poller. Surfaces
//! drive it with `submit`, `cancel` and `commit_edit` and observe it through
//! their [`Presenter`].
//!
//! # Design Philosophy
//!
//! History and rendered bubbles move in lock-step. Every history mutation and
//! the presenter call that mirrors it happen under one lock, and that lock is
//! never held across an `.await`. The only await point per turn is the ask
//! request itself, which the controller makes cancellable.
//!
//! # Example
//!
//! ```ignore
//! let session = ChatSession::new(backend, presenter, &config);
//! match session.submit("Show open jobs").await? {
//!     TurnOutcome::Completed { enrichment: Some(job), .. } => { job.join().await; }
//!     _ => {}
//! }
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::backend::{AskReply, AskRequest, QueryBackend};
use crate::config::AskflowConfig;
use crate::conversation::{ConversationStore, Role, Turn};
use crate::enrichment::{EnrichmentHandle, EnrichmentPoller};
use crate::error::{ChatError, ChatResult};
use crate::lifecycle::{self, ActionControl, EnterAction, TurnLifecycle, TurnState};
use crate::presenter::{describe_result, GroupRef, Presenter};
use crate::request::{RequestController, RequestHandle, RequestOutcome, RequestPhase};

/// Message shown when the backend cannot be reached
pub const TRANSPORT_APOLOGY: &str =
    "Sorry, I couldn't reach the server. Please check your connection and try again.";

/// Unique session identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a new random session ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a user turn settled
#[derive(Debug)]
pub enum TurnOutcome {
    /// Results were rendered
    Completed {
        /// Group the results were rendered into
        group: GroupRef,
        /// Insights job polling in the background, if one was started
        enrichment: Option<EnrichmentHandle>,
    },
    /// The backend asked a clarifying question
    Clarification(String),
    /// The backend reported an error (shown and recorded in history)
    BackendError(String),
    /// The backend could not be reached (apology shown, not recorded)
    TransportFailure(String),
    /// The user cancelled; the bubble is editable
    Cancelled,
}

/// State guarded by the session lock
#[derive(Debug, Default)]
struct SessionState {
    store: ConversationStore,
    lifecycle: TurnLifecycle,
    /// Request whose user turn is in history awaiting a reply
    pending: Option<u64>,
}

/// One conversation with the query backend
pub struct ChatSession<B: QueryBackend> {
    id: SessionId,
    state: Mutex<SessionState>,
    controller: RequestController<B>,
    poller: EnrichmentPoller<B>,
    presenter: Arc<dyn Presenter>,
    max_query_length: usize,
}

impl<B: QueryBackend + 'static> ChatSession<B> {
    /// Create a session over `backend`, rendering through `presenter`
    pub fn new(backend: Arc<B>, presenter: Arc<dyn Presenter>, config: &AskflowConfig) -> Self {
        let backend_name = backend.name().to_string();
        let controller = RequestController::new(Arc::clone(&backend));
        controller.set_visualization(config.visualize_by_default);
        let poller = EnrichmentPoller::new(backend, Arc::clone(&presenter), config.enrichment.clone());
        let id = SessionId::new();
        tracing::debug!(session = %id, backend = %backend_name, "Chat session created");

        Self {
            id,
            state: Mutex::new(SessionState::default()),
            controller,
            poller,
            presenter,
            max_query_length: config.max_query_length,
        }
    }

    /// Session identifier
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Copy of the conversation history
    #[must_use]
    pub fn history(&self) -> Vec<Turn> {
        self.state.lock().store.snapshot()
    }

    /// Number of turns in history
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.state.lock().store.len()
    }

    /// State of the most recent user turn
    #[must_use]
    pub fn turn_state(&self) -> TurnState {
        self.state.lock().lifecycle.state()
    }

    /// Whether a cancelled turn is waiting to be edited
    #[must_use]
    pub fn has_editable_turn(&self) -> bool {
        self.state.lock().lifecycle.editable_turn().is_some()
    }

    /// Current request phase
    #[must_use]
    pub fn request_phase(&self) -> RequestPhase {
        self.controller.phase()
    }

    /// Whether a request is in flight
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.controller.is_in_flight()
    }

    /// The send/stop control to show
    #[must_use]
    pub fn action_control(&self) -> ActionControl {
        lifecycle::action_control(self.is_in_flight())
    }

    /// Route an Enter keypress; `in_edit_mode` is whether the edit surface has focus
    #[must_use]
    pub fn route_enter(&self, shift: bool, in_edit_mode: bool) -> EnterAction {
        lifecycle::route_enter(
            shift,
            in_edit_mode && self.has_editable_turn(),
            self.is_in_flight(),
        )
    }

    /// Turn the persistent visualization toggle on or off
    pub fn set_visualization(&self, enabled: bool) {
        tracing::debug!(session = %self.id, enabled, "Visualization toggle changed");
        self.controller.set_visualization(enabled);
    }

    /// Whether the persistent visualization toggle is on
    #[must_use]
    pub fn visualization_enabled(&self) -> bool {
        self.controller.visualization_enabled()
    }

    /// Whether the backend answers its liveness probe
    pub async fn backend_healthy(&self) -> bool {
        self.controller.backend().health_check().await
    }

    /// Activate the send/stop control with the current input
    ///
    /// Stops the in-flight request, or sends `input` as a new turn.
    pub async fn activate_action(&self, input: &str) -> ChatResult<Option<TurnOutcome>> {
        match self.action_control() {
            ActionControl::Stop => {
                self.cancel();
                Ok(None)
            }
            ActionControl::Send => self.submit(input).await.map(Some),
        }
    }

    /// Send `text` as a new user turn and wait for the reply
    ///
    /// A pending edit is abandoned.
    ///
    /// # Errors
    ///
    /// `EmptyMessage`/`MessageTooLong` for bad input and `AlreadyInFlight` if a
    /// request is live; none of them change any state.
    pub async fn submit(&self, text: &str) -> ChatResult<TurnOutcome> {
        let query = self.validate(text)?;

        let (handle, request) = {
            let mut state = self.state.lock();
            let handle = self.controller.begin()?;

            if let Some(abandoned) = state.lifecycle.discard_edit() {
                tracing::debug!(session = %self.id, ?abandoned, "Pending edit abandoned");
                self.presenter.remove_user_turn(abandoned);
            }

            let request = self.record_user_turn(&mut state, &handle, query)?;
            state.pending = Some(handle.id());
            let turn = self.presenter.render_user_turn(query);
            state.lifecycle.sent(turn);
            self.presenter.set_processing_indicator(true);
            (handle, request)
        };

        self.dispatch(handle, request).await
    }

    /// Commit the pending edit as a resend, reusing its bubble
    ///
    /// # Errors
    ///
    /// `NoEditableTurn` if nothing is editable, `EmptyMessage` for a blank
    /// edit; neither changes any state.
    pub async fn commit_edit(&self, text: &str) -> ChatResult<TurnOutcome> {
        let (handle, request) = {
            let mut state = self.state.lock();
            let turn = state
                .lifecycle
                .editable_turn()
                .ok_or(ChatError::NoEditableTurn)?;
            let query = self.validate(text)?;
            let handle = self.controller.begin()?;

            let request = self.record_user_turn(&mut state, &handle, query)?;
            state.pending = Some(handle.id());
            self.presenter.update_user_turn(turn, query);
            self.presenter.clear_editable(turn);
            state.lifecycle.resent();
            self.presenter.set_processing_indicator(true);
            (handle, request)
        };

        self.dispatch(handle, request).await
    }

    /// Abort the in-flight request
    ///
    /// The user turn is removed from history and its bubble becomes editable.
    /// Returns `false`, changing nothing, when no request is in flight.
    pub fn cancel(&self) -> bool {
        let mut state = self.state.lock();
        if !self.controller.cancel() {
            return false;
        }
        self.roll_back(&mut state);
        tracing::info!(session = %self.id, history_len = state.store.len(), "Turn cancelled");
        true
    }

    /// Undo the pending user turn and make its bubble editable
    fn roll_back(&self, state: &mut SessionState) {
        state.pending = None;
        let popped = state.store.pop_last_if_user();
        if let Some(turn) = state.lifecycle.cancelled() {
            self.presenter.set_editable(turn);
        }
        self.presenter.set_processing_indicator(false);
        tracing::debug!(session = %self.id, removed = popped.is_some(), "Pending turn rolled back");
    }

    /// Roll back request `request` if it is still pending
    ///
    /// Runs when a turn's future is dropped before its reply settled.
    fn abandon(&self, request: u64) {
        let mut state = self.state.lock();
        if state.pending != Some(request) {
            return;
        }
        self.controller.cancel();
        self.roll_back(&mut state);
        tracing::info!(session = %self.id, request, "Turn dropped before reply, rolled back");
    }

    /// Check and trim user input
    fn validate<'a>(&self, text: &'a str) -> ChatResult<&'a str> {
        let query = text.trim();
        if query.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if query.chars().count() > self.max_query_length {
            return Err(ChatError::MessageTooLong(self.max_query_length));
        }
        Ok(query)
    }

    /// Append the user turn and build the payload, releasing the slot on failure
    fn record_user_turn(
        &self,
        state: &mut SessionState,
        handle: &RequestHandle,
        query: &str,
    ) -> ChatResult<AskRequest> {
        if let Err(err) = state.store.append(Turn::user(query)) {
            self.controller.cancel();
            return Err(err);
        }
        let request = self.controller.payload(query, state.store.snapshot());
        tracing::info!(
            session = %self.id,
            request = handle.id(),
            history_len = request.conversation_history.len(),
            show_charts = request.show_charts,
            "Sending query"
        );
        Ok(request)
    }

    async fn dispatch(&self, handle: RequestHandle, request: AskRequest) -> ChatResult<TurnOutcome> {
        let mut guard = PendingTurn {
            session: self,
            request: handle.id(),
            armed: true,
        };
        let outcome = self.controller.dispatch(handle, request).await;
        guard.armed = false;
        Ok(self.settle(outcome))
    }

    /// Apply a settled request to history and the presenter
    fn settle(&self, outcome: RequestOutcome) -> TurnOutcome {
        let mut state = self.state.lock();
        state.pending = None;

        let turn_outcome = match outcome.into_result() {
            Err(ChatError::UserAbort) => return TurnOutcome::Cancelled,
            Ok(response) => {
                let (history, reply) = response.into_reply();
                let adopted = match history {
                    Some(history) if !history.is_empty() => {
                        state.store.replace_all(history);
                        true
                    }
                    _ => false,
                };

                match reply {
                    AskReply::Error(message) => {
                        self.presenter.render_assistant_error(&message);
                        Self::record_reply(&mut state, &message);
                        TurnOutcome::BackendError(message)
                    }
                    AskReply::Clarification(question) => {
                        self.presenter.render_clarification(&question);
                        Self::record_reply(&mut state, &question);
                        TurnOutcome::Clarification(question)
                    }
                    AskReply::Result(result) => {
                        let group = self.presenter.render_assistant_result(&result);
                        if !adopted {
                            Self::append_assistant(&mut state, &describe_result(&result));
                        }

                        let enrichment = if result.has_inline_insights() {
                            self.presenter.render_enrichment(
                                group,
                                result.insights.as_deref().unwrap_or_default(),
                                &result.follow_up_questions,
                            );
                            None
                        } else {
                            result
                                .request_id
                                .as_deref()
                                .map(|request_id| self.poller.start(request_id, group))
                        };
                        TurnOutcome::Completed { group, enrichment }
                    }
                }
            }
            Err(err) if err.is_recorded_in_history() => {
                let detail = err.to_string();
                self.presenter.render_assistant_error(&detail);
                Self::append_assistant(&mut state, &detail);
                TurnOutcome::BackendError(detail)
            }
            Err(err) => {
                tracing::warn!(session = %self.id, error = %err, "Query failed");
                self.presenter.render_assistant_error(TRANSPORT_APOLOGY);
                TurnOutcome::TransportFailure(err.to_string())
            }
        };

        state.lifecycle.resolved();
        self.presenter.set_processing_indicator(false);
        tracing::debug!(session = %self.id, history_len = state.store.len(), "Turn settled");
        turn_outcome
    }

    /// Record a rendered reply unless adopted server history already ends with it
    fn record_reply(state: &mut SessionState, content: &str) {
        let recorded = state
            .store
            .last()
            .is_some_and(|turn| turn.role == Role::Assistant && turn.content == content);
        if !recorded {
            Self::append_assistant(state, content);
        }
    }

    fn append_assistant(state: &mut SessionState, content: &str) {
        if let Err(err) = state.store.append(Turn::assistant(content)) {
            tracing::warn!(error = %err, "Assistant turn not recorded");
        }
    }
}

/// Rolls a turn back if its future is dropped before the reply settles
struct PendingTurn<'a, B: QueryBackend + 'static> {
    session: &'a ChatSession<B>,
    request: u64,
    armed: bool,
}

impl<B: QueryBackend + 'static> Drop for PendingTurn<'_, B> {
    fn drop(&mut self) {
        if self.armed {
            self.session.abandon(self.request);
        }
    }
}
