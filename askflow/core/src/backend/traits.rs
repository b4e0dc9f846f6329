//! Query Backend Traits
//!
//! Wire types and the trait the engine uses to reach the query backend. The
//! abstraction lets the session run against the HTTP service, a mock in
//! tests, or anything else that speaks the same two endpoints.
//!
//! # Endpoints
//!
//! - `ask`: submit a query with the full conversation history
//! - `insights_status`: poll a background insights job by request id

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::conversation::Turn;

/// Transport-level failures
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BackendError {
    /// Network unreachable, connection reset, timeout
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status with the extracted error detail
    #[error("backend returned {status}: {detail}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Structured error message from the body
        detail: String,
    },

    /// Body could not be decoded
    #[error("invalid response body: {0}")]
    Decode(String),
}

/// Payload for the ask endpoint
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AskRequest {
    /// The new query text
    pub query: String,
    /// Full history, ending with the user turn for `query`
    pub conversation_history: Vec<Turn>,
    /// Whether the backend should prepare chart data
    pub show_charts: bool,
}

impl AskRequest {
    /// Create a new request
    pub fn new(query: impl Into<String>, conversation_history: Vec<Turn>) -> Self {
        Self {
            query: query.into(),
            conversation_history,
            show_charts: false,
        }
    }

    /// Set the chart visibility flag
    #[must_use]
    pub fn with_show_charts(mut self, show_charts: bool) -> Self {
        self.show_charts = show_charts;
        self
    }
}

/// Chart payload prepared by the backend
///
/// Carried opaquely to the presenter; the engine never interprets it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    /// Chart kind: bar, line, pie, doughnut, area, scatter, kpi, pivot, ...
    #[serde(rename = "type")]
    pub chart_type: String,
    /// Chart title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Category labels (absent for KPI widgets)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    /// Series definitions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datasets: Option<Vec<Map<String, Value>>>,
    /// Single KPI value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// KPI format hint (number, currency, text, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Raw rows for pivot tables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Map<String, Value>>>,
    /// Numeric columns for pivot tables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numeric_columns: Option<Vec<String>>,
    /// Categorical columns for pivot tables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categorical_columns: Option<Vec<String>>,
    /// Renderer options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Map<String, Value>>,
}

/// Raw response from the ask endpoint
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AskResponse {
    /// Result rows
    #[serde(default)]
    pub data: Option<Vec<Map<String, Value>>>,
    /// Error message reported in a success body
    #[serde(default)]
    pub error: Option<String>,
    /// Clarification question
    #[serde(default)]
    pub question: Option<String>,
    /// Authoritative history, adopted verbatim when present
    #[serde(default)]
    pub conversation_history: Option<Vec<Turn>>,
    /// Chart payload
    #[serde(default)]
    pub chart: Option<ChartData>,
    /// Inline insights (older backends compute them synchronously)
    #[serde(default)]
    pub insights: Option<String>,
    /// Inline follow-up questions
    #[serde(default)]
    pub follow_up_questions: Option<Vec<String>>,
    /// Background insights job handle
    #[serde(default)]
    pub request_id: Option<String>,
}

/// A successful query result
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryResult {
    /// Result rows
    pub data: Vec<Map<String, Value>>,
    /// Chart payload
    pub chart: Option<ChartData>,
    /// Background insights job handle
    pub request_id: Option<String>,
    /// Inline insights
    pub insights: Option<String>,
    /// Inline follow-up questions
    pub follow_up_questions: Vec<String>,
}

impl QueryResult {
    /// Whether the response already carries its enrichment
    #[must_use]
    pub fn has_inline_insights(&self) -> bool {
        self.insights.as_deref().is_some_and(|s| !s.trim().is_empty())
            || !self.follow_up_questions.is_empty()
    }
}

/// Classified reply body
#[derive(Clone, Debug, PartialEq)]
pub enum AskReply {
    /// The backend reported an error
    Error(String),
    /// The backend needs clarification
    Clarification(String),
    /// Query results
    Result(QueryResult),
}

impl AskResponse {
    /// Split the response into its authoritative history and classified reply
    ///
    /// Priority follows the backend: error, then question, then data.
    #[must_use]
    pub fn into_reply(self) -> (Option<Vec<Turn>>, AskReply) {
        let history = self.conversation_history;

        if let Some(error) = self.error.filter(|e| !e.trim().is_empty()) {
            return (history, AskReply::Error(error));
        }
        if let Some(question) = self.question.filter(|q| !q.trim().is_empty()) {
            return (history, AskReply::Clarification(question));
        }

        let result = QueryResult {
            data: self.data.unwrap_or_default(),
            chart: self.chart,
            request_id: self.request_id.filter(|id| !id.is_empty()),
            insights: self.insights,
            follow_up_questions: self.follow_up_questions.unwrap_or_default(),
        };
        (history, AskReply::Result(result))
    }
}

/// Status of a background insights job
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InsightsStatus {
    /// Still computing
    Pending,
    /// Insights are available
    Ready {
        /// Insights text
        #[serde(default)]
        insights: Option<String>,
        /// Ordered follow-up questions
        #[serde(default)]
        follow_up_questions: Vec<String>,
    },
    /// The job failed
    Error {
        /// Failure description
        #[serde(default)]
        error: Option<String>,
    },
    /// Unknown or expired job id
    NotFound,
}

/// Query backend trait
///
/// Implement this trait to point the engine at a different service.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool;

    /// Submit a query
    ///
    /// Dropping the returned future aborts the underlying transport.
    async fn ask(&self, request: &AskRequest) -> Result<AskResponse, BackendError>;

    /// Check the status of a background insights job
    async fn insights_status(&self, request_id: &str) -> Result<InsightsStatus, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ask_request_wire_format() {
        let request = AskRequest::new("Show open jobs", vec![Turn::user("Show open jobs")])
            .with_show_charts(true);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "query": "Show open jobs",
                "conversation_history": [{"role": "user", "content": "Show open jobs"}],
                "show_charts": true
            })
        );
    }

    #[test]
    fn test_reply_priority() {
        let response = AskResponse {
            error: Some("boom".to_string()),
            question: Some("which customer?".to_string()),
            data: Some(vec![]),
            ..Default::default()
        };
        assert_eq!(response.into_reply().1, AskReply::Error("boom".to_string()));

        let response = AskResponse {
            question: Some("which customer?".to_string()),
            data: Some(vec![]),
            ..Default::default()
        };
        assert_eq!(
            response.into_reply().1,
            AskReply::Clarification("which customer?".to_string())
        );
    }

    #[test]
    fn test_result_with_chart_and_job() {
        let body = serde_json::json!({
            "data": [{"service_type": "HVAC", "jobs": 12}],
            "chart": {"type": "bar", "title": "Jobs by service", "labels": ["HVAC"],
                      "datasets": [{"label": "Jobs", "data": [12]}]},
            "request_id": "5d1c",
            "conversation_history": [
                {"role": "user", "content": "chart jobs by service"},
                {"role": "assistant", "content": "Here you go"}
            ]
        });
        let response: AskResponse = serde_json::from_value(body).unwrap();
        let (history, reply) = response.into_reply();

        assert_eq!(history.map(|h| h.len()), Some(2));
        let AskReply::Result(result) = reply else {
            panic!("expected result");
        };
        assert_eq!(result.data.len(), 1);
        assert_eq!(result.chart.as_ref().map(|c| c.chart_type.as_str()), Some("bar"));
        assert_eq!(result.request_id.as_deref(), Some("5d1c"));
        assert!(!result.has_inline_insights());
    }

    #[test]
    fn test_empty_body_is_empty_result() {
        let response: AskResponse = serde_json::from_str("{}").unwrap();
        let (history, reply) = response.into_reply();
        assert!(history.is_none());
        assert_eq!(reply, AskReply::Result(QueryResult::default()));
    }

    #[test]
    fn test_insights_status_parsing() {
        let ready: InsightsStatus = serde_json::from_str(
            r#"{"status":"ready","insights":"HVAC dominates","follow_up_questions":["Why?"]}"#,
        )
        .unwrap();
        assert_eq!(
            ready,
            InsightsStatus::Ready {
                insights: Some("HVAC dominates".to_string()),
                follow_up_questions: vec!["Why?".to_string()],
            }
        );

        let pending: InsightsStatus = serde_json::from_str(r#"{"status":"pending"}"#).unwrap();
        assert_eq!(pending, InsightsStatus::Pending);

        let missing: InsightsStatus = serde_json::from_str(r#"{"status":"not_found"}"#).unwrap();
        assert_eq!(missing, InsightsStatus::NotFound);

        let failed: InsightsStatus =
            serde_json::from_str(r#"{"status":"error","error":"Failed to generate insights."}"#)
                .unwrap();
        assert_eq!(
            failed,
            InsightsStatus::Error {
                error: Some("Failed to generate insights.".to_string()),
            }
        );
    }
}
