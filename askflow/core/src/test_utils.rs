//! Shared test doubles for unit tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::backend::{
    AskRequest, AskResponse, BackendError, InsightsStatus, QueryBackend, QueryResult,
};
use crate::presenter::{EnrichmentNotice, GroupRef, Presenter, TurnRef};

/// How the mock answers `ask`
#[derive(Clone)]
pub(crate) enum AskBehavior {
    Respond(AskResponse),
    Fail(BackendError),
    /// Never answers
    Hang,
    /// Answers once the gate is notified
    Gated(Arc<Notify>, AskResponse),
}

/// Scripted query backend
pub(crate) struct MockBackend {
    ask: Mutex<VecDeque<AskBehavior>>,
    fallback: AskBehavior,
    insights: Mutex<VecDeque<Result<InsightsStatus, BackendError>>>,
    ask_requests: Mutex<Vec<AskRequest>>,
    insights_calls: AtomicU32,
}

impl MockBackend {
    pub(crate) fn new(fallback: AskBehavior) -> Self {
        Self {
            ask: Mutex::new(VecDeque::new()),
            fallback,
            insights: Mutex::new(VecDeque::new()),
            ask_requests: Mutex::new(Vec::new()),
            insights_calls: AtomicU32::new(0),
        }
    }

    pub(crate) fn answering_with_data() -> Self {
        Self::new(AskBehavior::Respond(data_response(2)))
    }

    pub(crate) fn hanging() -> Self {
        Self::new(AskBehavior::Hang)
    }

    pub(crate) fn failing_with_status(status: u16, detail: &str) -> Self {
        Self::new(AskBehavior::Fail(BackendError::Status {
            status,
            detail: detail.to_string(),
        }))
    }

    pub(crate) fn unreachable() -> Self {
        Self::new(AskBehavior::Fail(BackendError::Transport(
            "connection refused".to_string(),
        )))
    }

    /// Queue behaviors used before the fallback
    pub(crate) fn then(self, behavior: AskBehavior) -> Self {
        self.ask.lock().push_back(behavior);
        self
    }

    /// Queue insights statuses; `Pending` once they run out
    pub(crate) fn with_insights(self, statuses: Vec<Result<InsightsStatus, BackendError>>) -> Self {
        self.insights.lock().extend(statuses);
        self
    }

    pub(crate) fn ask_requests(&self) -> Vec<AskRequest> {
        self.ask_requests.lock().clone()
    }

    pub(crate) fn insights_calls(&self) -> u32 {
        self.insights_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryBackend for MockBackend {
    fn name(&self) -> &str {
        "Mock"
    }

    async fn health_check(&self) -> bool {
        true
    }

    async fn ask(&self, request: &AskRequest) -> Result<AskResponse, BackendError> {
        self.ask_requests.lock().push(request.clone());
        let behavior = self
            .ask
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match behavior {
            AskBehavior::Respond(response) => Ok(response),
            AskBehavior::Fail(err) => Err(err),
            AskBehavior::Hang => std::future::pending().await,
            AskBehavior::Gated(gate, response) => {
                gate.notified().await;
                Ok(response)
            }
        }
    }

    async fn insights_status(&self, _request_id: &str) -> Result<InsightsStatus, BackendError> {
        self.insights_calls.fetch_add(1, Ordering::SeqCst);
        self.insights
            .lock()
            .pop_front()
            .unwrap_or(Ok(InsightsStatus::Pending))
    }
}

/// A success body with `rows` rows and no chart
pub(crate) fn data_response(rows: usize) -> AskResponse {
    let data = (0..rows)
        .map(|i| {
            let mut row = serde_json::Map::new();
            row.insert("id".to_string(), serde_json::json!(i));
            row
        })
        .collect();
    AskResponse {
        data: Some(data),
        ..AskResponse::default()
    }
}

/// Everything a [`RecordingPresenter`] was asked to render
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Rendered {
    UserTurn { turn: TurnRef, text: String },
    UpdatedUserTurn { turn: TurnRef, text: String },
    RemovedUserTurn(TurnRef),
    Editable(TurnRef),
    EditableCleared(TurnRef),
    AssistantError(String),
    Clarification(String),
    AssistantResult { group: GroupRef, rows: usize, chart: bool },
    Enrichment { group: GroupRef, insights: String, follow_ups: Vec<String> },
    Progress { group: GroupRef, phase: String },
    EnrichmentNotice { group: GroupRef, notice: EnrichmentNotice },
    Processing(bool),
}

/// Presenter that records every call
#[derive(Default)]
pub(crate) struct RecordingPresenter {
    events: Mutex<Vec<Rendered>>,
    next_ref: AtomicU64,
}

impl RecordingPresenter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn events(&self) -> Vec<Rendered> {
        self.events.lock().clone()
    }

    /// Enrichment renders and notices for `group`
    pub(crate) fn terminal_enrichment_count(&self, group: GroupRef) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| match e {
                Rendered::Enrichment { group: g, .. } | Rendered::EnrichmentNotice { group: g, .. } => {
                    *g == group
                }
                _ => false,
            })
            .count()
    }

    pub(crate) fn progress_phases(&self, group: GroupRef) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Rendered::Progress { group: g, phase } if *g == group => Some(phase.clone()),
                _ => None,
            })
            .collect()
    }

    /// Last processing indicator state
    pub(crate) fn processing(&self) -> Option<bool> {
        self.events.lock().iter().rev().find_map(|e| match e {
            Rendered::Processing(on) => Some(*on),
            _ => None,
        })
    }

    fn record(&self, event: Rendered) {
        self.events.lock().push(event);
    }

    fn next(&self) -> u64 {
        self.next_ref.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl Presenter for RecordingPresenter {
    fn render_user_turn(&self, text: &str) -> TurnRef {
        let turn = TurnRef(self.next());
        self.record(Rendered::UserTurn {
            turn,
            text: text.to_string(),
        });
        turn
    }

    fn update_user_turn(&self, turn: TurnRef, text: &str) {
        self.record(Rendered::UpdatedUserTurn {
            turn,
            text: text.to_string(),
        });
    }

    fn remove_user_turn(&self, turn: TurnRef) {
        self.record(Rendered::RemovedUserTurn(turn));
    }

    fn set_editable(&self, turn: TurnRef) {
        self.record(Rendered::Editable(turn));
    }

    fn clear_editable(&self, turn: TurnRef) {
        self.record(Rendered::EditableCleared(turn));
    }

    fn render_assistant_error(&self, text: &str) {
        self.record(Rendered::AssistantError(text.to_string()));
    }

    fn render_clarification(&self, text: &str) {
        self.record(Rendered::Clarification(text.to_string()));
    }

    fn render_assistant_result(&self, result: &QueryResult) -> GroupRef {
        let group = GroupRef(self.next());
        self.record(Rendered::AssistantResult {
            group,
            rows: result.data.len(),
            chart: result.chart.is_some(),
        });
        group
    }

    fn render_enrichment(&self, group: GroupRef, insights: &str, follow_ups: &[String]) {
        self.record(Rendered::Enrichment {
            group,
            insights: insights.to_string(),
            follow_ups: follow_ups.to_vec(),
        });
    }

    fn render_enrichment_progress(&self, group: GroupRef, phase: &str) {
        self.record(Rendered::Progress {
            group,
            phase: phase.to_string(),
        });
    }

    fn render_enrichment_notice(&self, group: GroupRef, notice: EnrichmentNotice) {
        self.record(Rendered::EnrichmentNotice { group, notice });
    }

    fn set_processing_indicator(&self, processing: bool) {
        self.record(Rendered::Processing(processing));
    }
}
