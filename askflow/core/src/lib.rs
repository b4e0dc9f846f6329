//! Askflow Core - Headless Conversation Engine for askflow
//!
//! This crate holds the conversational turn lifecycle for a natural-language
//! query service, independent of any UI. It can drive a terminal, a web view,
//! or run headless for tests.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          UI Surfaces                              │
//! │        ┌──────────┐     ┌──────────┐     ┌─────────────────┐      │
//! │        │   CLI    │     │   Web    │     │  Test Harness   │      │
//! │        └────┬─────┘     └────┬─────┘     └────────┬────────┘      │
//! │             └────────────────┴────────────────────┘               │
//! │        submit / cancel / commit_edit (up)   Presenter (down)      │
//! └─────────────────────────────┼────────────────────────────────────┘
//!                               │
//! ┌─────────────────────────────┼────────────────────────────────────┐
//! │                        ASKFLOW CORE                               │
//! │  ┌──────────────────────────┴─────────────────────────────────┐   │
//! │  │                        ChatSession                          │   │
//! │  │  ┌──────────────┐ ┌──────────────┐ ┌──────────────────────┐ │   │
//! │  │  │ Conversation │ │     Turn     │ │  RequestController   │ │   │
//! │  │  │    Store     │ │  Lifecycle   │ │  (one in flight)     │ │   │
//! │  │  └──────────────┘ └──────────────┘ └──────────┬───────────┘ │   │
//! │  │                 ┌──────────────────┐          │             │   │
//! │  │                 │ EnrichmentPoller │──────────┤             │   │
//! │  │                 └──────────────────┘          │             │   │
//! │  └───────────────────────────────────────────────┼─────────────┘   │
//! │                                        QueryBackend (HTTP)         │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`ChatSession`]: One conversation; the entry point for surfaces
//! - [`Presenter`]: Rendering callbacks a surface implements
//! - [`ConversationStore`]: Ordered history sent with every query
//! - [`RequestController`]: The single cancellable in-flight request
//! - [`TurnLifecycle`]: Sent / editable / resent state of the latest turn
//! - [`EnrichmentPoller`]: Background polling for deferred insights
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use askflow_core::{config, ChatSession, HttpQueryBackend};
//!
//! let config = config::load_config()?;
//! let backend = Arc::new(HttpQueryBackend::from_config(&config)?);
//! let session = ChatSession::new(backend, Arc::new(MyPresenter::default()), &config);
//!
//! session.submit("Show dispatch tickets from last 30 days").await?;
//! ```
//!
//! # Module Overview
//!
//! - [`backend`]: Query service abstraction and HTTP client
//! - [`chart_intent`]: Detects queries asking for a visualization
//! - [`config`]: TOML/env/CLI configuration
//! - [`conversation`]: Turns and the conversation store
//! - [`enrichment`]: Insights polling and progress ticker
//! - [`error`]: Error taxonomy
//! - [`lifecycle`]: Turn state machine and input routing
//! - [`presenter`]: Presenter trait and render handles
//! - [`request`]: In-flight request controller
//! - [`session`]: Chat session orchestration

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod chart_intent;
pub mod config;
pub mod conversation;
pub mod enrichment;
pub mod error;
pub mod lifecycle;
pub mod presenter;
pub mod request;
pub mod session;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-exports for convenience
pub use backend::{
    AskReply, AskRequest, AskResponse, BackendError, ChartData, HttpQueryBackend, InsightsStatus,
    QueryBackend, QueryResult,
};
pub use chart_intent::detect_chart_request;
pub use config::{AskflowConfig, ConfigError, ConfigOverrides, ConfigSource};
pub use conversation::{ConversationStore, Role, Turn};
pub use enrichment::{
    EnrichmentConfig, EnrichmentHandle, EnrichmentJob, EnrichmentOutcome, EnrichmentPoller,
};
pub use error::{ChatError, ChatResult};
pub use lifecycle::{ActionControl, EnterAction, TurnLifecycle, TurnState};
pub use presenter::{EnrichmentNotice, GroupRef, Presenter, TurnRef};
pub use request::{RequestController, RequestHandle, RequestOutcome, RequestPhase};
pub use session::{ChatSession, SessionId, TurnOutcome};
