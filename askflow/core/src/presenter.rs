//! Presenter Interface
//!
//! The narrow set of callbacks the engine uses to drive a UI surface. A surface
//! (terminal, web view, test harness) implements [`Presenter`]; the engine
//! never builds widgets itself.
//!
//! # Contract
//!
//! Presenter methods are synchronous sinks. They are called while session
//! state is locked, so an implementation must not call back into the session.

use crate::backend::{ChartData, QueryResult};

/// Handle to a rendered user bubble
///
/// Issued by the presenter; the engine only stores and hands it back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TurnRef(pub u64);

/// Handle to a rendered assistant result group
///
/// Enrichment content is rendered into the group it belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GroupRef(pub u64);

/// Terminal notices rendered in the enrichment slot
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnrichmentNotice {
    /// The insights job failed
    Unavailable,
    /// Polling ran out of attempts
    TookTooLong,
}

impl EnrichmentNotice {
    /// Text shown to the user
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::Unavailable => "Insights are unavailable for this result.",
            Self::TookTooLong => "Insights took too long to generate. Please try again later.",
        }
    }
}

/// Rendering callbacks exposed to the UI layer
pub trait Presenter: Send + Sync {
    /// Render a new user bubble and return its handle
    fn render_user_turn(&self, text: &str) -> TurnRef;

    /// Replace the text of an existing user bubble (after an edit)
    fn update_user_turn(&self, turn: TurnRef, text: &str);

    /// Remove a user bubble that no longer has a history entry
    fn remove_user_turn(&self, turn: TurnRef);

    /// Make a bubble editable in place and attach its edit/copy actions
    fn set_editable(&self, turn: TurnRef);

    /// Detach the edit surface and make the bubble read-only again
    fn clear_editable(&self, turn: TurnRef);

    /// Render an assistant error message
    fn render_assistant_error(&self, text: &str);

    /// Render a clarification question from the backend
    fn render_clarification(&self, text: &str);

    /// Render query results (intro text, table, optional chart)
    fn render_assistant_result(&self, result: &QueryResult) -> GroupRef;

    /// Render insights and follow-up questions into a result group
    fn render_enrichment(&self, group: GroupRef, insights: &str, follow_ups: &[String]);

    /// Show a cosmetic progress phase in a result group's enrichment slot
    fn render_enrichment_progress(&self, group: GroupRef, phase: &str);

    /// Show a terminal notice in a result group's enrichment slot
    fn render_enrichment_notice(&self, group: GroupRef, notice: EnrichmentNotice);

    /// Toggle the loading indicator and the send/stop action control
    fn set_processing_indicator(&self, processing: bool);
}

/// Short description of a result for logs and plain-text surfaces
#[must_use]
pub fn describe_result(result: &QueryResult) -> String {
    let rows = result.data.len();
    let noun = if rows == 1 { "row" } else { "rows" };
    match result.chart {
        Some(ChartData {
            ref chart_type,
            ref title,
            ..
        }) => match title {
            Some(title) => format!("{rows} {noun} with {chart_type} chart \"{title}\""),
            None => format!("{rows} {noun} with {chart_type} chart"),
        },
        None => format!("{rows} {noun}"),
    }
}
