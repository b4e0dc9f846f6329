//! Query Backend Integration
//!
//! This module provides access to the remote query service through a common
//! trait interface.
//!
//! # Available Backends
//!
//! - **HTTP**: the ask/insights REST service (default)
//!
//! # Usage
//!
//! ```ignore
//! use askflow_core::backend::{AskRequest, HttpQueryBackend, QueryBackend};
//!
//! let backend = HttpQueryBackend::new("http://localhost:8000", Duration::from_secs(120))?;
//! let response = backend.ask(&AskRequest::new("Show open jobs", history)).await?;
//! ```

mod http;
mod traits;

pub use http::{HttpQueryBackend, DEFAULT_ENVIRONMENT_HEADER};
pub use traits::{
    AskReply, AskRequest, AskResponse, BackendError, ChartData, InsightsStatus, QueryBackend,
    QueryResult,
};
